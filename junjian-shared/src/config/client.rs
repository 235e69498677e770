use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use url::Url;

/// Fixed name of the durable session record.
pub const SESSION_STORAGE_NAME: &str = "auth-storage";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_USER_AGENT: &str = "junjian-cli";

const ENV_API_BASE_URL: &str = "JUNJIAN_API_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "JUNJIAN_TIMEOUT_SECS";
const ENV_SESSION_PATH: &str = "JUNJIAN_SESSION_PATH";
const ENV_LOG_LEVEL: &str = "JUNJIAN_LOG_LEVEL";

/// Errors raised while resolving a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported configuration format; use 'yaml', 'json' or 'toml'")]
    UnsupportedFormat,
    #[error("invalid {name} value: {reason}")]
    InvalidEnv { name: &'static str, reason: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for the marketplace client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL every API path is resolved against.
    pub api_base_url: Url,

    /// Upper bound for a single request, in seconds.
    pub timeout_secs: u64,

    /// Location of the persisted session record. `None` selects the
    /// platform configuration directory.
    pub session_path: Option<PathBuf>,

    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,

    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ClientConfig {
    /// Generates a default configuration.
    ///
    /// # Panics
    /// Never; the built-in base URL is a valid constant.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).expect("default base URL is valid"),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            session_path: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// Environment variables only apply to values still at their default, and
    /// `base_url_override` wins over everything.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed, an environment
    /// value is malformed, or the resolved settings fail [`Self::validate`].
    pub fn load_config(
        config_path: Option<PathBuf>,
        base_url_override: Option<Url>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::with_defaults();
        let mut config = match config_path {
            Some(path) => Self::from_file(&path)?,
            None => defaults.clone(),
        };

        if config.api_base_url == defaults.api_base_url {
            if let Ok(value) = env::var(ENV_API_BASE_URL) {
                config.api_base_url =
                    Url::parse(&value).map_err(|err| ConfigError::InvalidEnv {
                        name: ENV_API_BASE_URL,
                        reason: err.to_string(),
                    })?;
            }
        }
        if config.timeout_secs == defaults.timeout_secs {
            if let Ok(value) = env::var(ENV_TIMEOUT_SECS) {
                config.timeout_secs = value.parse().map_err(|_| ConfigError::InvalidEnv {
                    name: ENV_TIMEOUT_SECS,
                    reason: "must be a whole number of seconds".to_string(),
                })?;
            }
        }
        if config.session_path.is_none() {
            if let Ok(value) = env::var(ENV_SESSION_PATH) {
                config.session_path = Some(PathBuf::from(value));
            }
        }
        if config.log_level == defaults.log_level {
            if let Ok(value) = env::var(ENV_LOG_LEVEL) {
                config.log_level = value;
            }
        }

        if let Some(url) = base_url_override {
            config.api_base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Ok(serde_yml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Err(ConfigError::UnsupportedFormat),
        }
    }

    /// Validate the resolved settings.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for a zero timeout or a base URL that
    /// is not `http`/`https`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !matches!(self.api_base_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "api_base_url must use http or https, got '{}'",
                self.api_base_url.scheme()
            )));
        }
        if self.api_base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(
                "api_base_url cannot be used as a base URL".to_string(),
            ));
        }
        Ok(())
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolved location of the persisted session record.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.session_path.clone().unwrap_or_else(default_session_path)
    }
}

/// Platform default for the session record, e.g.
/// `~/.config/junjian/auth-storage.json` on Linux.
#[must_use]
pub fn default_session_path() -> PathBuf {
    let file_name = format!("{SESSION_STORAGE_NAME}.json");
    BaseDirs::new().map_or_else(
        || PathBuf::from(".").join(&file_name),
        |dirs| dirs.config_dir().join("junjian").join(&file_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn cleanup_env_vars() {
        unsafe {
            env::remove_var(ENV_API_BASE_URL);
            env::remove_var(ENV_TIMEOUT_SECS);
            env::remove_var(ENV_SESSION_PATH);
            env::remove_var(ENV_LOG_LEVEL);
        }
    }

    #[test]
    fn test_config_with_defaults() {
        let config = ClientConfig::with_defaults();

        assert_eq!(config.api_base_url.as_str(), "http://localhost:8080/api");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.log_level, "info");
        assert!(config.session_path.is_none());
        assert!(
            config
                .session_path()
                .to_string_lossy()
                .ends_with("auth-storage.json")
        );
    }

    #[test]
    #[serial]
    fn test_load_config_with_defaults() {
        cleanup_env_vars();
        let config = ClientConfig::load_config(None, None).unwrap();
        assert_eq!(config, ClientConfig::with_defaults());
    }

    #[test]
    #[serial]
    fn test_load_config_with_environment_variables() {
        cleanup_env_vars();
        unsafe {
            env::set_var(ENV_API_BASE_URL, "https://api.junjian.example/api");
            env::set_var(ENV_TIMEOUT_SECS, "30");
            env::set_var(ENV_SESSION_PATH, "/tmp/junjian/session.json");
            env::set_var(ENV_LOG_LEVEL, "debug");
        }

        let config = ClientConfig::load_config(None, None).unwrap();
        cleanup_env_vars();

        assert_eq!(
            config.api_base_url.as_str(),
            "https://api.junjian.example/api"
        );
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(
            config.session_path(),
            PathBuf::from("/tmp/junjian/session.json")
        );
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_load_config_invalid_timeout_environment() {
        cleanup_env_vars();
        unsafe {
            env::set_var(ENV_TIMEOUT_SECS, "soon");
        }
        let result = ClientConfig::load_config(None, None);
        cleanup_env_vars();

        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv {
                name: ENV_TIMEOUT_SECS,
                ..
            })
        ));
    }

    #[test]
    #[serial]
    fn test_override_wins_over_environment() {
        cleanup_env_vars();
        unsafe {
            env::set_var(ENV_API_BASE_URL, "https://env.example/api");
        }
        let override_url = Url::parse("http://127.0.0.1:9000/api").unwrap();
        let config = ClientConfig::load_config(None, Some(override_url.clone())).unwrap();
        cleanup_env_vars();

        assert_eq!(config.api_base_url, override_url);
    }

    #[test]
    #[serial]
    fn test_load_config_from_yaml_file() {
        cleanup_env_vars();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "api_base_url: https://yaml.example/api\ntimeout_secs: 5\nlog_level: warn\n",
        )
        .unwrap();

        let config = ClientConfig::load_config(Some(path), None).unwrap();
        assert_eq!(config.api_base_url.as_str(), "https://yaml.example/api");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.user_agent, "junjian-cli");
    }

    #[test]
    #[serial]
    fn test_load_config_from_json_file() {
        cleanup_env_vars();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"api_base_url":"https://json.example/api","session_path":"/var/tmp/s.json"}"#,
        )
        .unwrap();

        let config = ClientConfig::load_config(Some(path), None).unwrap();
        assert_eq!(config.api_base_url.as_str(), "https://json.example/api");
        assert_eq!(config.session_path(), PathBuf::from("/var/tmp/s.json"));
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    #[serial]
    fn test_load_config_from_toml_file() {
        cleanup_env_vars();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout_secs = 3\nuser_agent = \"junjian-test\"\n").unwrap();

        let config = ClientConfig::load_config(Some(path), None).unwrap();
        assert_eq!(config.timeout_secs, 3);
        assert_eq!(config.user_agent, "junjian-test");
    }

    #[test]
    fn test_load_config_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "timeout=1").unwrap();

        assert!(matches!(
            ClientConfig::load_config(Some(path), None),
            Err(ConfigError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_load_config_nonexistent_file() {
        let result = ClientConfig::load_config(Some(PathBuf::from("/nonexistent/config.yaml")), None);
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_config_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            ClientConfig::load_config(Some(path), None),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ClientConfig {
            timeout_secs: 0,
            ..ClientConfig::with_defaults()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let config = ClientConfig {
            api_base_url: Url::parse("ftp://files.example/api").unwrap(),
            ..ClientConfig::with_defaults()
        };
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("http or https"));
    }
}
