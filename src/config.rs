//! Store configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_STORAGE_KEY: &str = "shadow-net-storage";
pub const DEFAULT_CODE_TTL_SECS: u64 = 600;
pub const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 5;
pub const DEFAULT_CATALOG_DELAY_MS: u64 = 800;
pub const DEFAULT_NOTIFY_DELAY_MS: u64 = 800;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SHADOWNET_STORAGE_KEY must be non-empty and contain only [A-Za-z0-9._-], got '{0}'")]
    InvalidStorageKey(String),
    #[error("{var} must be at least 1")]
    ZeroValue { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Key the state snapshot is saved under.
    pub storage_key: String,
    /// Directory for the file-backed store. `None` keeps state in memory.
    pub data_dir: Option<PathBuf>,
    pub code_ttl: Duration,
    pub max_code_attempts: u32,
    pub catalog_delay: Duration,
    pub notify_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_owned(),
            data_dir: None,
            code_ttl: Duration::from_secs(DEFAULT_CODE_TTL_SECS),
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            catalog_delay: Duration::from_millis(DEFAULT_CATALOG_DELAY_MS),
            notify_delay: Duration::from_millis(DEFAULT_NOTIFY_DELAY_MS),
        }
    }
}

impl Config {
    /// Build config from environment variables.
    ///
    /// All optional:
    /// - `SHADOWNET_STORAGE_KEY`: snapshot key, default `shadow-net-storage`
    /// - `SHADOWNET_DATA_DIR`: directory for the file store; in-memory when unset
    /// - `SHADOWNET_CODE_TTL_SECS`: verification code lifetime, default 600
    /// - `SHADOWNET_MAX_CODE_ATTEMPTS`: wrong guesses before a code burns, default 5
    /// - `SHADOWNET_CATALOG_DELAY_MS`: simulated catalog latency, default 800
    /// - `SHADOWNET_NOTIFY_DELAY_MS`: simulated email latency, default 800
    ///
    /// Unparseable numbers fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error for an unusable storage key or a zero TTL/attempt limit.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| match std::env::var(key) {
            Ok(value) => Some(value),
            Err(_) => None,
        })
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_key = lookup("SHADOWNET_STORAGE_KEY").unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_owned());
        if !is_valid_storage_key(&storage_key) {
            return Err(ConfigError::InvalidStorageKey(storage_key));
        }

        let data_dir = lookup("SHADOWNET_DATA_DIR")
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let code_ttl_secs = parse_or(&lookup, "SHADOWNET_CODE_TTL_SECS", DEFAULT_CODE_TTL_SECS);
        if code_ttl_secs == 0 {
            return Err(ConfigError::ZeroValue { var: "SHADOWNET_CODE_TTL_SECS" });
        }
        let max_code_attempts = parse_or(&lookup, "SHADOWNET_MAX_CODE_ATTEMPTS", DEFAULT_MAX_CODE_ATTEMPTS);
        if max_code_attempts == 0 {
            return Err(ConfigError::ZeroValue { var: "SHADOWNET_MAX_CODE_ATTEMPTS" });
        }

        Ok(Self {
            storage_key,
            data_dir,
            code_ttl: Duration::from_secs(code_ttl_secs),
            max_code_attempts,
            catalog_delay: Duration::from_millis(parse_or(&lookup, "SHADOWNET_CATALOG_DELAY_MS", DEFAULT_CATALOG_DELAY_MS)),
            notify_delay: Duration::from_millis(parse_or(&lookup, "SHADOWNET_NOTIFY_DELAY_MS", DEFAULT_NOTIFY_DELAY_MS)),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or(default),
        None => default,
    }
}

/// The key doubles as a file name in the file store.
fn is_valid_storage_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
