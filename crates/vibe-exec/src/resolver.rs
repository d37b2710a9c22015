//! Analyzer executable resolution against a whitelist.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use vibe_core::{Backend, GatewayError};

/// Configured value that requests detection instead of a fixed path.
pub const AUTO_DETECT: &str = "auto";

/// Where a resolved path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathSource {
    Configured,
    Detected,
    Env,
    SystemPath,
}

/// A whitelisted analyzer location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCliPath {
    pub path: PathBuf,
    pub source: PathSource,
    pub exists: bool,
}

#[derive(Debug, Default)]
struct Whitelist {
    absolute: Vec<PathBuf>,
    env_override: Option<String>,
}

impl Whitelist {
    fn describe(&self, backend: Backend) -> Vec<String> {
        let mut entries: Vec<String> = self
            .absolute
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        if let Some(env) = &self.env_override {
            entries.push(format!("${}={}", backend.cli_path_env(), env));
        }
        entries.push(format!("<bare name on PATH, e.g. {}>", backend.executable_name()));
        entries
    }
}

/// Resolves and validates analyzer paths for one backend.
///
/// The whitelist and the per-path validation cache live for as long as the
/// resolver does; construct one per gateway instance.
pub struct PathResolver {
    backend: Backend,
    whitelist: RwLock<Whitelist>,
    validated: Mutex<HashMap<String, ResolvedCliPath>>,
}

impl PathResolver {
    /// Create a resolver, reading the backend's override variable from the environment.
    pub fn new(backend: Backend) -> Self {
        let env_override = std::env::var(backend.cli_path_env())
            .ok()
            .filter(|v| !v.trim().is_empty());
        Self::with_env_override(backend, env_override)
    }

    /// Create a resolver with an explicit override value instead of reading the environment.
    pub fn with_env_override(backend: Backend, env_override: Option<String>) -> Self {
        Self::with_known_locations(backend, well_known_locations(backend), env_override)
    }

    /// Create a resolver with an explicit set of trusted install locations.
    pub fn with_known_locations(
        backend: Backend,
        locations: Vec<PathBuf>,
        env_override: Option<String>,
    ) -> Self {
        Self {
            backend,
            whitelist: RwLock::new(Whitelist {
                absolute: locations,
                env_override,
            }),
            validated: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Human-readable whitelist, as reported in security errors.
    pub fn whitelist(&self) -> Vec<String> {
        self.read_whitelist().describe(self.backend)
    }

    /// Resolve a configured CLI path ("auto", bare name or absolute path).
    pub fn resolve(&self, configured: &str) -> Result<ResolvedCliPath, GatewayError> {
        let configured = configured.trim();

        if let Some(cached) = self.cached(configured) {
            debug!("Using validated {} path: {}", self.backend, cached.path.display());
            return Ok(cached);
        }

        let resolved = if configured.eq_ignore_ascii_case(AUTO_DETECT) {
            self.detect()
        } else {
            self.validate(configured)?
        };

        // A missing CLI is looked up again next time so a later install is seen.
        if resolved.exists {
            self.validated
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(configured.to_string(), resolved.clone());
        }

        Ok(resolved)
    }

    /// Resolve a path supplied with a request rather than by configuration.
    ///
    /// Bare names are limited to the backend's own executable and the
    /// configured value; anything else goes through [`resolve`](Self::resolve).
    pub fn resolve_requested(&self, requested: &str, configured: &str) -> Result<ResolvedCliPath, GatewayError> {
        let requested = requested.trim();
        let allowed = requested.eq_ignore_ascii_case(AUTO_DETECT)
            || requested == self.backend.executable_name()
            || requested == configured.trim();
        if is_bare_name(requested) && !allowed {
            return Err(self.reject(requested));
        }
        self.resolve(requested)
    }

    /// Probe the environment override, known install locations and the search path.
    fn detect(&self) -> ResolvedCliPath {
        let env_override = self.read_whitelist().env_override.clone();
        if let Some(env_path) = env_override {
            let path = PathBuf::from(&env_path);
            let exists = if is_bare_name(&env_path) {
                which::which(&env_path).is_ok()
            } else {
                path.is_file()
            };
            info!("Using {} from ${}: {}", self.backend, self.backend.cli_path_env(), env_path);
            return ResolvedCliPath {
                path,
                source: PathSource::Env,
                exists,
            };
        }

        let known = self.read_whitelist().absolute.clone();
        if let Some(path) = known.into_iter().find(|p| p.is_file()) {
            info!("Detected {} at known location: {}", self.backend, path.display());
            return ResolvedCliPath {
                path,
                source: PathSource::Detected,
                exists: true,
            };
        }

        let name = self.backend.executable_name();
        match which::which(name) {
            Ok(found) => {
                info!("Detected {} on PATH: {}", self.backend, found.display());
                self.trust(found.clone());
                ResolvedCliPath {
                    path: found,
                    source: PathSource::SystemPath,
                    exists: true,
                }
            }
            Err(_) => {
                debug!("{} not found; falling back to bare name", self.backend);
                ResolvedCliPath {
                    path: PathBuf::from(name),
                    source: PathSource::SystemPath,
                    exists: false,
                }
            }
        }
    }

    /// Accept an explicit path only if it matches a whitelist pattern.
    fn validate(&self, configured: &str) -> Result<ResolvedCliPath, GatewayError> {
        if is_bare_name(configured) {
            return Ok(ResolvedCliPath {
                path: PathBuf::from(configured),
                source: PathSource::SystemPath,
                exists: which::which(configured).is_ok(),
            });
        }

        let candidate = PathBuf::from(configured);
        if candidate.is_absolute() {
            let whitelist = self.read_whitelist();

            if whitelist.env_override.as_deref() == Some(configured) {
                return Ok(ResolvedCliPath {
                    exists: candidate.is_file(),
                    path: candidate,
                    source: PathSource::Env,
                });
            }

            if whitelist.absolute.iter().any(|p| p == &candidate) {
                return Ok(ResolvedCliPath {
                    exists: candidate.is_file(),
                    path: candidate,
                    source: PathSource::Configured,
                });
            }

            // Symlinked installs (e.g. npm shims) only match after canonicalization.
            if let Ok(canonical) = std::fs::canonicalize(&candidate) {
                let mut trusted = whitelist.absolute.clone();
                if let Some(env_path) = whitelist
                    .env_override
                    .as_deref()
                    .map(PathBuf::from)
                    .filter(|p| p.is_absolute())
                {
                    trusted.push(env_path);
                }
                let matched = trusted
                    .iter()
                    .filter_map(|p| std::fs::canonicalize(p).ok())
                    .any(|p| p == canonical);
                if matched {
                    return Ok(ResolvedCliPath {
                        exists: canonical.is_file(),
                        path: candidate,
                        source: PathSource::Configured,
                    });
                }
            }
        }

        Err(self.reject(configured))
    }

    fn reject(&self, attempted: &str) -> GatewayError {
        let whitelist = self.whitelist();
        error!(
            backend = %self.backend,
            attempted_path = %attempted,
            whitelist = ?whitelist,
            "Security: rejected untrusted analyzer path"
        );
        GatewayError::Security {
            path: attempted.to_string(),
            whitelist,
        }
    }

    fn trust(&self, path: PathBuf) {
        let mut whitelist = self.whitelist.write().unwrap_or_else(|e| e.into_inner());
        if !whitelist.absolute.contains(&path) {
            debug!("Adding detected path to whitelist: {}", path.display());
            whitelist.absolute.push(path);
        }
    }

    fn cached(&self, configured: &str) -> Option<ResolvedCliPath> {
        self.validated
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(configured)
            .cloned()
    }

    fn read_whitelist(&self) -> std::sync::RwLockReadGuard<'_, Whitelist> {
        self.whitelist.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// A plain executable name that the OS resolves through the search path.
fn is_bare_name(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('.')
        && !value.starts_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Well-known install locations for a backend on the current OS.
fn well_known_locations(backend: Backend) -> Vec<PathBuf> {
    let name = backend.executable_name();
    let home = dirs::home_dir();
    let mut locations = Vec::new();

    if cfg!(windows) {
        if let Some(appdata) = dirs::data_dir() {
            locations.push(appdata.join("npm").join(format!("{}.cmd", name)));
        }
        if let Some(local) = dirs::data_local_dir() {
            locations.push(local.join("Programs").join(name).join(format!("{}.exe", name)));
        }
    } else {
        for dir in ["/usr/local/bin", "/usr/bin", "/opt/homebrew/bin"] {
            locations.push(Path::new(dir).join(name));
        }
        if let Some(home) = home {
            for dir in [".local/bin", ".npm-global/bin", ".volta/bin", ".bun/bin"] {
                locations.push(home.join(dir).join(name));
            }
        }
    }

    locations
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver_with(locations: Vec<PathBuf>) -> PathResolver {
        PathResolver::with_known_locations(Backend::Codex, locations, None)
    }

    #[test]
    fn test_bare_name_detection() {
        assert!(is_bare_name("codex"));
        assert!(is_bare_name("gemini-cli"));
        assert!(!is_bare_name("./codex"));
        assert!(!is_bare_name("/usr/bin/codex"));
        assert!(!is_bare_name("--help"));
        assert!(!is_bare_name("codex; rm -rf /"));
        assert!(!is_bare_name(""));
    }

    #[test]
    fn test_bare_name_is_trusted() {
        let resolver = resolver_with(vec![]);
        let resolved = resolver.resolve("tool").unwrap();
        assert_eq!(resolved.path, PathBuf::from("tool"));
        assert_eq!(resolved.source, PathSource::SystemPath);
    }

    #[test]
    fn test_untrusted_absolute_path_rejected() {
        let resolver = resolver_with(vec![PathBuf::from("/usr/local/bin/codex")]);
        let err = resolver.resolve("/tmp/attacker/tool").unwrap_err();
        match err {
            GatewayError::Security { path, whitelist } => {
                assert_eq!(path, "/tmp/attacker/tool");
                assert!(whitelist.iter().any(|w| w == "/usr/local/bin/codex"));
            }
            other => panic!("expected security error, got {:?}", other),
        }
    }

    #[test]
    fn test_relative_path_rejected() {
        let resolver = resolver_with(vec![]);
        assert!(resolver.resolve("../bin/codex").unwrap_err().is_security());
    }

    #[test]
    fn test_whitelisted_absolute_path_accepted() {
        let temp = TempDir::new().unwrap();
        let tool = temp.path().join("codex");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();

        let resolver = resolver_with(vec![tool.clone()]);
        let resolved = resolver.resolve(tool.to_str().unwrap()).unwrap();
        assert_eq!(resolved.source, PathSource::Configured);
        assert!(resolved.exists);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_whitelisted_path_accepted() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("codex");
        std::fs::write(&real, "#!/bin/sh\n").unwrap();
        let link = temp.path().join("codex-link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let resolver = resolver_with(vec![real]);
        let resolved = resolver.resolve(link.to_str().unwrap()).unwrap();
        assert_eq!(resolved.path, link);
    }

    #[test]
    fn test_env_override_is_trusted() {
        let resolver = PathResolver::with_known_locations(
            Backend::Gemini,
            vec![],
            Some("/opt/tools/gemini".to_string()),
        );

        let auto = resolver.resolve("auto").unwrap();
        assert_eq!(auto.source, PathSource::Env);

        let explicit = resolver.resolve("/opt/tools/gemini").unwrap();
        assert_eq!(explicit.source, PathSource::Env);
    }

    #[test]
    fn test_auto_detects_known_location() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing").join("codex");
        let present = temp.path().join("codex");
        std::fs::write(&present, "").unwrap();

        let resolver = resolver_with(vec![missing, present.clone()]);
        let resolved = resolver.resolve("auto").unwrap();
        assert_eq!(resolved.path, present);
        assert_eq!(resolved.source, PathSource::Detected);
        assert!(resolved.exists);
    }

    #[test]
    fn test_validation_is_cached_per_path() {
        let temp = TempDir::new().unwrap();
        let tool = temp.path().join("codex");
        std::fs::write(&tool, "").unwrap();

        let resolver = resolver_with(vec![tool.clone()]);
        let first = resolver.resolve(tool.to_str().unwrap()).unwrap();

        // Removing the file does not change the cached verdict.
        std::fs::remove_file(&tool).unwrap();
        let second = resolver.resolve(tool.to_str().unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_cli_is_not_cached() {
        let temp = TempDir::new().unwrap();
        let later = temp.path().join("codex");

        let resolver = resolver_with(vec![later.clone()]);
        let before = resolver.resolve("auto").unwrap();
        if before.exists {
            // codex is installed on this machine's PATH
            return;
        }

        std::fs::write(&later, "").unwrap();
        let after = resolver.resolve("auto").unwrap();
        assert_eq!(after.path, later);
        assert_eq!(after.source, PathSource::Detected);
        assert!(after.exists);
    }

    #[test]
    fn test_missing_bare_name_is_not_cached() {
        let resolver = resolver_with(vec![]);
        let resolved = resolver.resolve("vibe-no-such-tool").unwrap();
        assert!(!resolved.exists);
        assert!(resolver.cached("vibe-no-such-tool").is_none());
    }

    #[test]
    fn test_requested_bare_names_are_restricted() {
        let resolver = resolver_with(vec![]);

        for interpreter in ["bash", "python3", "sh"] {
            let err = resolver.resolve_requested(interpreter, "auto").unwrap_err();
            assert!(err.is_security(), "{} should be rejected", interpreter);
        }

        assert_eq!(
            resolver.resolve_requested("codex", "auto").unwrap().path,
            PathBuf::from("codex")
        );
        assert_eq!(
            resolver.resolve_requested("tool", "tool").unwrap().path,
            PathBuf::from("tool")
        );
        assert!(resolver.resolve_requested("auto", "tool").is_ok());
        assert!(resolver
            .resolve_requested("/tmp/attacker/tool", "tool")
            .unwrap_err()
            .is_security());
    }
}
