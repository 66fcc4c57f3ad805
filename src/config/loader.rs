//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles TOML file discovery,
//! environment overlays and `HEMOSCAN_*` variable overrides.

use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::HemoscanConfig;

const ENV_PREFIX: &str = "HEMOSCAN";
const CONFIG_FILE_NAME: &str = "hemoscan.toml";

/// Loaded configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: HemoscanConfig,
    environment: String,
    config_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection and file discovery
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_file(None)
    }

    /// Load configuration from an explicit file, or discover one when `None`
    pub fn load_from_file(path: Option<&Path>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_with(path, &environment, None)
    }

    /// Load with an explicit environment name and, optionally, an explicit set
    /// of environment variables instead of the process environment
    pub fn load_with(
        path: Option<&Path>,
        environment: &str,
        env_vars: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_file = match path {
            Some(path) if !path.is_file() => {
                return Err(ConfigurationError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };

        debug!(
            environment = %environment,
            config_file = ?config_file,
            "Loading configuration"
        );

        let mut builder = Config::builder();
        if let Some(file) = &config_file {
            builder = builder.add_source(File::from(file.as_path()).format(FileFormat::Toml));

            let overlay = Self::overlay_path(file, environment);
            if overlay.is_file() {
                debug!(overlay = %overlay.display(), "Applying environment-specific overrides");
                builder =
                    builder.add_source(File::from(overlay.as_path()).format(FileFormat::Toml));
            }
        }

        let mut environment_source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        if let Some(vars) = env_vars {
            environment_source = environment_source.source(Some(vars));
        }
        builder = builder.add_source(environment_source);

        let config: HemoscanConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        let manager = ConfigManager {
            config,
            environment: environment.to_string(),
            config_file,
        };

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string(&manager.debug_config())
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(Arc::new(manager))
    }

    /// Wrap an already-built configuration
    pub fn from_config(config: HemoscanConfig, environment: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            config,
            environment: environment.into(),
            config_file: None,
        })
    }

    pub fn config(&self) -> &HemoscanConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Configuration as JSON with credentials masked
    pub fn debug_config(&self) -> serde_json::Value {
        let mut value = serde_json::json!(self.config);
        Self::sanitize_json_recursive(&mut value, &["secret", "key", "token", "password"]);
        value
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        if !val.is_null() {
                            *val = serde_json::Value::String("[MASKED]".to_string());
                        }
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }

    /// Detect current environment: HEMOSCAN_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("HEMOSCAN_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn find_config_file() -> Option<PathBuf> {
        [
            PathBuf::from(CONFIG_FILE_NAME),
            PathBuf::from("config").join(CONFIG_FILE_NAME),
        ]
        .into_iter()
        .find(|path| path.is_file())
    }

    /// `hemoscan.toml` + `production` -> `hemoscan.production.toml`
    fn overlay_path(base: &Path, environment: &str) -> PathBuf {
        let stem = base
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("hemoscan");
        base.with_file_name(format!("{stem}.{environment}.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassificationMode, CompensationPolicy};
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let manager = ConfigManager::load_with(None, "test", Some(HashMap::new())).unwrap();
        assert_eq!(manager.config(), &HemoscanConfig::default());
        assert_eq!(manager.environment(), "test");
    }

    #[test]
    fn test_file_values_override_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "hemoscan.toml",
            r#"
[backend]
base_url = "https://lab.example.com"
timeout_ms = 5000

[classification]
mode = "per_record"
max_concurrent_classifications = 8

[approval]
compensation = "revert"
"#,
        );

        let manager =
            ConfigManager::load_with(Some(&path), "test", Some(HashMap::new())).unwrap();
        let config = manager.config();
        assert_eq!(config.backend.base_url, "https://lab.example.com");
        assert_eq!(config.backend.timeout_ms, 5000);
        assert_eq!(config.backend.max_retries, 3);
        assert_eq!(config.classification.mode, ClassificationMode::PerRecord);
        assert_eq!(config.classification.max_concurrent_classifications, 8);
        assert_eq!(config.approval.compensation, CompensationPolicy::Revert);
        assert_eq!(config.approval.approve_action, "Approve");
    }

    #[test]
    fn test_environment_overlay() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "hemoscan.toml",
            "[workflow]\nredirect_delay_ms = 1500\n",
        );
        write_config(
            &dir,
            "hemoscan.production.toml",
            "[workflow]\nredirect_delay_ms = 0\n",
        );

        let production =
            ConfigManager::load_with(Some(&path), "production", Some(HashMap::new())).unwrap();
        assert_eq!(production.config().workflow.redirect_delay_ms, 0);

        let staging =
            ConfigManager::load_with(Some(&path), "staging", Some(HashMap::new())).unwrap();
        assert_eq!(staging.config().workflow.redirect_delay_ms, 1500);
    }

    #[test]
    fn test_environment_variables_win() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "hemoscan.toml",
            "[classification]\nwait_timeout_ms = 1000\n",
        );

        let vars = HashMap::from([
            (
                "HEMOSCAN_CLASSIFICATION__WAIT_TIMEOUT_MS".to_string(),
                "0".to_string(),
            ),
            (
                "HEMOSCAN_BACKEND__BASE_URL".to_string(),
                "http://frappe:8000".to_string(),
            ),
        ]);

        let manager = ConfigManager::load_with(Some(&path), "test", Some(vars)).unwrap();
        assert_eq!(manager.config().classification.wait_timeout_ms, 0);
        assert_eq!(manager.config().backend.base_url, "http://frappe:8000");
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        let result = ConfigManager::load_with(Some(&missing), "test", Some(HashMap::new()));
        assert!(matches!(
            result,
            Err(ConfigurationError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "hemoscan.toml", "[backend]\nmax_retries = 0\n");
        let result = ConfigManager::load_with(Some(&path), "test", Some(HashMap::new()));
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_config_sanitization() {
        let mut config = HemoscanConfig::default();
        config.backend.api_key = Some("abcdef123456".to_string());
        config.backend.api_secret = Some("topsecret".to_string());
        let manager = ConfigManager::from_config(config, "test");

        let debug = manager.debug_config();
        assert_eq!(debug["backend"]["api_key"], "[MASKED]");
        assert_eq!(debug["backend"]["api_secret"], "[MASKED]");
        assert_eq!(debug["backend"]["base_url"], "http://localhost:8000");
    }

    #[test]
    fn test_overlay_path() {
        let overlay = ConfigManager::overlay_path(Path::new("/etc/hemoscan.toml"), "test");
        assert_eq!(overlay, PathBuf::from("/etc/hemoscan.test.toml"));
    }
}
