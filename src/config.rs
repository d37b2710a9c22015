use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use vibe_analyzer::BackendConfig;
use vibe_core::Backend;
use vibe_prompt::{ContextConfig, PresetCatalog, TemplateRegistry, TemplatesConfig, WarningsConfig};

/// Prefix of environment variables that override configuration.
pub const ENV_PREFIX: &str = "VIBE_";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    #[serde(default = "default_codex")]
    pub codex: BackendConfig,

    #[serde(default = "default_gemini")]
    pub gemini: BackendConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub warnings: WarningsConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,
}

fn default_codex() -> BackendConfig {
    BackendConfig::for_backend(Backend::Codex)
}

fn default_gemini() -> BackendConfig {
    BackendConfig::for_backend(Backend::Gemini)
}

/// Where cached results are kept.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheStorage {
    #[default]
    File,
    Memory,
}

impl FromStr for CacheStorage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(CacheStorage::File),
            "memory" => Ok(CacheStorage::Memory),
            other => Err(format!("unknown cache storage '{}' (valid values: file, memory)", other)),
        }
    }
}

impl fmt::Display for CacheStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStorage::File => f.write_str("file"),
            CacheStorage::Memory => f.write_str("memory"),
        }
    }
}

/// Result cache configuration
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Enable the result cache
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Entry lifetime in milliseconds; 0 keeps entries until cleared
    #[serde(default = "default_cache_ttl_ms")]
    pub ttl_ms: u64,

    /// Maximum number of persisted entries; 0 means unbounded
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,

    /// Cache directory for file storage
    #[serde(default = "default_cache_directory")]
    pub directory: PathBuf,

    #[serde(default)]
    pub storage: CacheStorage,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_ms() -> u64 {
    3_600_000
}

fn default_cache_max_size() -> usize {
    1000
}

fn default_cache_directory() -> PathBuf {
    PathBuf::from(".vibe/cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_ms: default_cache_ttl_ms(),
            max_size: default_cache_max_size(),
            directory: default_cache_directory(),
            storage: CacheStorage::default(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            codex: default_codex(),
            gemini: default_gemini(),
            cache: CacheConfig::default(),
            context: ContextConfig::default(),
            warnings: WarningsConfig::default(),
            templates: TemplatesConfig::default(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("TOML parsing error in {}: {source}", .path.display())]
    TomlError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("TOML error: {0}")]
    TomlValueError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn invalid(field: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_value<T: FromStr>(field: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(field, value, e.to_string()))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Overlay `overlay` onto `base`; tables merge key by key, anything else is replaced.
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

impl GatewayConfig {
    pub fn backend(&self, backend: Backend) -> &BackendConfig {
        match backend {
            Backend::Codex => &self.codex,
            Backend::Gemini => &self.gemini,
        }
    }

    pub fn backend_mut(&mut self, backend: Backend) -> &mut BackendConfig {
        match backend {
            Backend::Codex => &mut self.codex,
            Backend::Gemini => &mut self.gemini,
        }
    }

    pub fn generate_default_config() -> String {
        let header = "# vibe-gateway configuration\n\
                      # Precedence: defaults < ~/.config/vibe-gateway/config.toml < ./vibe-gateway.toml\n\
                      #             < --config < VIBE_<SECTION>_<FIELD> < command-line flags\n\n";
        match toml::to_string_pretty(&Self::default()) {
            Ok(body) => format!("{}{}", header, body),
            Err(e) => {
                tracing::warn!("Could not render default config: {}", e);
                header.to_string()
            }
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut merged = toml::Value::try_from(Self::default())?;
        merge_toml(&mut merged, Self::read_toml(path.as_ref())?);
        let config: Self = merged.try_into()?;
        Ok(config)
    }

    fn read_toml(path: &Path) -> Result<toml::Value, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| ConfigError::TomlError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get the user config file path (~/.config/vibe-gateway/config.toml)
    pub fn get_user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/vibe-gateway/config.toml"))
    }

    /// Get the current directory config file path (./vibe-gateway.toml)
    pub fn get_current_config_path() -> PathBuf {
        PathBuf::from("./vibe-gateway.toml")
    }

    /// Load and merge config files, later files winning per key:
    /// built-in defaults, user config, current directory config, `explicit`.
    pub fn load_with_merged_configs(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut merged = toml::Value::try_from(Self::default())?;

        let mut paths: Vec<PathBuf> = Self::get_user_config_path().into_iter().collect();
        paths.push(Self::get_current_config_path());
        for path in paths.iter().filter(|p| p.exists()) {
            merge_toml(&mut merged, Self::read_toml(path)?);
            tracing::debug!("Loaded config from: {}", path.display());
        }

        // An explicit file must exist.
        if let Some(path) = explicit {
            merge_toml(&mut merged, Self::read_toml(path)?);
            tracing::debug!("Loaded config from: {}", path.display());
        }

        let config: Self = merged.try_into()?;
        Ok(config)
    }

    pub fn apply_env_vars(&mut self, env_vars: &HashMap<String, String>) -> Result<(), ConfigError> {
        for (key, value) in env_vars {
            let Some(config_key) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            if let Some((section, field)) = config_key.split_once('_') {
                if let Ok(backend) = section.parse::<Backend>() {
                    self.apply_backend_env(backend, key, field, value)?;
                    continue;
                }
            }

            match config_key {
                "CACHE_ENABLED" => self.cache.enabled = parse_value(key, value)?,
                "CACHE_TTL_MS" => self.cache.ttl_ms = parse_value(key, value)?,
                "CACHE_MAX_SIZE" => self.cache.max_size = parse_value(key, value)?,
                "CACHE_DIRECTORY" => self.cache.directory = PathBuf::from(value),
                "CACHE_STORAGE" => self.cache.storage = parse_value(key, value)?,
                "CONTEXT_PRESET" => {
                    self.context.preset = Some(value.trim().to_string()).filter(|p| !p.is_empty())
                }
                "CONTEXT_AUTO_DETECT" => self.context.auto_detect = parse_value(key, value)?,
                "WARNINGS_SUPPRESS" => self.warnings.suppress = split_list(value),
                _ => {} // Ignore unknown environment variables
            }
        }
        Ok(())
    }

    fn apply_backend_env(
        &mut self,
        backend: Backend,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let config = self.backend_mut(backend);
        match field {
            "CLI_PATH" => config.cli.cli_path = value.to_string(),
            "TIMEOUT_MS" => config.cli.timeout_ms = parse_value(key, value)?,
            "RETRY_ATTEMPTS" => config.cli.retry_attempts = parse_value(key, value)?,
            "RETRY_DELAY_MS" => config.cli.retry_delay_ms = parse_value(key, value)?,
            "MAX_RETRY_DELAY_MS" => config.cli.max_retry_delay_ms = parse_value(key, value)?,
            "MODEL" => config.cli.model = Some(value.to_string()).filter(|m| !m.is_empty()),
            "REASONING_EFFORT" => {
                config.cli.reasoning_effort = Some(value.to_string()).filter(|e| !e.is_empty())
            }
            "ARGS" => config.cli.args = value.split_whitespace().map(str::to_string).collect(),
            "WORKING_DIR" => config.cli.working_dir = Some(PathBuf::from(value)),
            "TEMPLATE" => config.template = Some(value.to_string()).filter(|t| !t.is_empty()),
            _ => {}
        }
        Ok(())
    }

    /// Load configuration with full precedence chain:
    /// 1. Default values (lowest)
    /// 2. User config (~/.config/vibe-gateway/config.toml)
    /// 3. Current directory (./vibe-gateway.toml)
    /// 4. Explicit `--config` file
    /// 5. Environment variables (VIBE_*)
    ///
    /// Command-line flags are applied by the caller afterwards.
    pub fn load_with_precedence(
        config_path: Option<&Path>,
        env_vars: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load_with_merged_configs(config_path)?;
        config.apply_env_vars(env_vars)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let templates = TemplateRegistry::from_config(&self.templates);

        for backend in Backend::ALL {
            let config = self.backend(backend);
            let section = backend.id();

            if config.cli.cli_path.trim().is_empty() {
                return Err(invalid(
                    &format!("{}.cli_path", section),
                    &config.cli.cli_path,
                    "must not be empty",
                ));
            }

            if config.cli.retry_attempts == 0 {
                return Err(invalid(
                    &format!("{}.retry_attempts", section),
                    "0",
                    "at least one attempt is required",
                ));
            }

            if let Some(template) = &config.template {
                if !templates.contains(template) {
                    return Err(invalid(
                        &format!("{}.template", section),
                        template,
                        format!("unknown template (available: {})", templates.ids().join(", ")),
                    ));
                }
            }
        }

        if let Some(preset) = &self.context.preset {
            let presets = PresetCatalog::new(self.context.presets.clone());
            if !presets.contains(preset) {
                return Err(invalid(
                    "context.preset",
                    preset,
                    format!("unknown preset (available: {})", presets.ids().join(", ")),
                ));
            }
        }

        Ok(())
    }

    /// The merged configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
