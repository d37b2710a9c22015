pub mod analyze;
pub mod cache;
pub mod config;
pub mod health;

pub use analyze::run_analyze_command;
pub use cache::handle_cache_command;
pub use config::handle_config_command;
pub use health::run_health_command;
