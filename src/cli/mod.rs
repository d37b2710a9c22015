pub mod args;
pub mod commands;
pub mod root;

pub use args::{AnalyzeArgs, Args, CacheAction, Commands, ConfigAction};
pub use root::RootCommand;
