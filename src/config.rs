use crate::constants::{CONFIG_PATH_ENV, DEFAULT_BASE_URL, DEFAULT_CONFIG_FILE, DEFAULT_TIMEOUT_SECONDS};
use crate::error::{ImportError, Result};
use crate::pipeline::ConcurrencyMode;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// Keys that are written to a fresh config file
const REQUIRED_KEYS: [&str; 2] = ["login", "password"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub mode: ConcurrencyMode,
    /// Upper bound on in-flight invoices in concurrent mode; unbounded when unset
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(skip)]
    pub path: PathBuf,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

/// Basic-auth pair for the billing API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Config {
    /// Config file location, honouring the environment override
    pub fn default_path() -> PathBuf {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Load the config file, creating it (or adding the missing credential
    /// keys with empty values) when needed. Unknown keys are preserved.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        let mut table: toml::Table = match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config file at {}", path.display());
                toml::Table::new()
            }
            Err(e) => {
                return Err(ImportError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut write = false;
        for key in REQUIRED_KEYS {
            if !table.contains_key(key) {
                table.insert(key.to_string(), toml::Value::String(String::new()));
                write = true;
            }
        }
        if write {
            fs::write(path, toml::to_string(&table)?)?;
            info!("Wrote default config to {}", path.display());
        }

        let mut config: Config = toml::Value::Table(table).try_into()?;
        config.path = path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ImportError::Config("base_url must not be empty".into()));
        }
        if self.timeout_seconds == 0 {
            return Err(ImportError::Config("timeout_seconds must be positive".into()));
        }
        if self.max_concurrency == Some(0) {
            return Err(ImportError::Config("max_concurrency must be positive".into()));
        }
        Ok(())
    }

    /// Login details, or `MissingCredentials` when either one is blank
    pub fn credentials(&self) -> Result<Credentials> {
        if self.login.is_empty() || self.password.is_empty() {
            return Err(ImportError::MissingCredentials {
                path: self.path.display().to_string(),
            });
        }
        Ok(Credentials {
            login: self.login.clone(),
            password: self.password.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_created_with_empty_credentials() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_or_init(&path).unwrap();
        assert!(path.exists());
        let written: toml::Table = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["login"].as_str(), Some(""));
        assert_eq!(written["password"].as_str(), Some(""));

        let err = config.credentials().unwrap_err();
        assert!(matches!(err, ImportError::MissingCredentials { .. }));
        assert!(err.to_string().starts_with("Please provide login details in"));
    }

    #[test]
    fn test_missing_password_key_is_added_and_other_keys_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "login = \"me\"\nmode = \"sequential\"\n").unwrap();

        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config.login, "me");
        assert_eq!(config.mode, ConcurrencyMode::Sequential);

        let written: toml::Table = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["login"].as_str(), Some("me"));
        assert_eq!(written["password"].as_str(), Some(""));
        assert_eq!(written["mode"].as_str(), Some("sequential"));
        assert!(config.credentials().is_err());
    }

    #[test]
    fn test_complete_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let content = "login = \"me\"\npassword = \"secret\"\n";
        fs::write(&path, content).unwrap();

        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.mode, ConcurrencyMode::Concurrent);
        assert_eq!(config.max_concurrency, None);
        assert_eq!(
            config.credentials().unwrap(),
            Credentials { login: "me".into(), password: "secret".into() }
        );
        // untouched when nothing was missing
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "login = \"a\"\npassword = \"b\"\nmax_concurrency = 0\n").unwrap();
        assert!(matches!(
            Config::load_or_init(&path),
            Err(ImportError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "login = ").unwrap();
        assert!(matches!(Config::load_or_init(&path), Err(ImportError::Toml(_))));
    }
}
