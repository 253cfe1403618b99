//! Pool settings read from a configuration source

use std::fmt;
use std::time::Duration;

use connpool_core::{ConfigSource, ConnectParams, Result};
use serde::{Deserialize, Serialize};

/// Driver identifier key
pub const KEY_DRIVER: &str = "db.driver";
/// Connection URL key
pub const KEY_URL: &str = "db.url";
/// User name key
pub const KEY_USER: &str = "db.user";
/// Password key
pub const KEY_PASSWORD: &str = "db.password";
/// Pool size key
pub const KEY_POOL_SIZE: &str = "db.poolsize";
/// Character-encoding hint key
pub const KEY_ENCODING: &str = "db.encoding";
/// Default acquire timeout key, in milliseconds
pub const KEY_ACQUIRE_TIMEOUT_MS: &str = "db.acquire_timeout_ms";

/// Pool size used when none (or an unusable one) is configured
pub const DEFAULT_POOL_SIZE: usize = 5;

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

/// Everything needed to initialize a connection pool
///
/// The password is never printed by the `Debug` implementation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Driver identifier, resolved through a `DriverRegistry`
    driver: String,
    /// Connection URL passed to the driver
    url: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    password: String,
    /// Fixed number of connections in the pool
    #[serde(default = "default_pool_size")]
    pool_size: usize,
    /// Character-encoding hint forwarded to the driver
    #[serde(default)]
    encoding: Option<String>,
    /// Timeout used by `ConnectionPool::acquire_default`
    #[serde(default)]
    acquire_timeout_ms: Option<u64>,
}

impl PoolSettings {
    /// Create settings for the given driver and URL with the default pool size
    pub fn new(driver: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            url: url.into(),
            user: String::new(),
            password: String::new(),
            pool_size: DEFAULT_POOL_SIZE,
            encoding: None,
            acquire_timeout_ms: None,
        }
    }

    /// Read settings from a configuration source
    ///
    /// Driver, URL, user and password are required; a missing one is an
    /// initialization failure. The pool size falls back to
    /// `DEFAULT_POOL_SIZE` when absent, non-numeric or zero.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        let driver = source.require(KEY_DRIVER)?;
        let url = source.require(KEY_URL)?;
        let user = source.require(KEY_USER)?;
        let password = source.require(KEY_PASSWORD)?;

        let pool_size = match source.get(KEY_POOL_SIZE) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    tracing::warn!(
                        value = %raw,
                        default = DEFAULT_POOL_SIZE,
                        "invalid pool size, using default"
                    );
                    DEFAULT_POOL_SIZE
                }
            },
            None => DEFAULT_POOL_SIZE,
        };

        let acquire_timeout_ms = source
            .get(KEY_ACQUIRE_TIMEOUT_MS)
            .and_then(|raw| match raw.trim().parse::<u64>() {
                Ok(ms) => Some(ms),
                Err(_) => {
                    tracing::warn!(value = %raw, "invalid acquire timeout, waiting without limit");
                    None
                }
            });

        Ok(Self {
            driver,
            url,
            user,
            password,
            pool_size,
            encoding: source.get(KEY_ENCODING).filter(|e| !e.trim().is_empty()),
            acquire_timeout_ms,
        })
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Set the pool size
    ///
    /// # Panics
    ///
    /// Panics if `pool_size` is 0.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        assert!(
            pool_size > 0,
            "pool_size must be greater than 0, got {}",
            pool_size
        );
        self.pool_size = pool_size;
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Get the default acquire timeout as a Duration if set
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }

    /// Parameters handed to the driver for every connection
    pub fn connect_params(&self) -> ConnectParams {
        let params = ConnectParams::new(&self.url).with_credentials(&self.user, &self.password);
        match &self.encoding {
            Some(encoding) => params.with_encoding(encoding),
            None => params,
        }
    }
}

impl fmt::Debug for PoolSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolSettings")
            .field("driver", &self.driver)
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("pool_size", &self.pool_size)
            .field("encoding", &self.encoding)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connpool_core::{PoolError, Properties};
    use pretty_assertions::assert_eq;

    fn complete_source() -> Properties {
        Properties::new()
            .with(KEY_DRIVER, "sqlite")
            .with(KEY_URL, "sqlite::memory:")
            .with(KEY_USER, "faculty")
            .with(KEY_PASSWORD, "secret")
    }

    #[test]
    fn test_from_source_defaults() {
        let settings = PoolSettings::from_source(&complete_source()).expect("settings");
        assert_eq!(settings.driver(), "sqlite");
        assert_eq!(settings.url(), "sqlite::memory:");
        assert_eq!(settings.user(), "faculty");
        assert_eq!(settings.pool_size(), DEFAULT_POOL_SIZE);
        assert_eq!(settings.encoding(), None);
        assert_eq!(settings.acquire_timeout(), None);
    }

    #[test]
    fn test_from_source_optional_keys() {
        let source = complete_source()
            .with(KEY_POOL_SIZE, " 12 ")
            .with(KEY_ENCODING, "UTF-8")
            .with(KEY_ACQUIRE_TIMEOUT_MS, "2500");
        let settings = PoolSettings::from_source(&source).expect("settings");
        assert_eq!(settings.pool_size(), 12);
        assert_eq!(settings.encoding(), Some("UTF-8"));
        assert_eq!(settings.acquire_timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_unusable_pool_size_falls_back_to_default() {
        for raw in ["five", "", "0", "-3"] {
            let source = complete_source().with(KEY_POOL_SIZE, raw);
            let settings = PoolSettings::from_source(&source).expect("settings");
            assert_eq!(settings.pool_size(), DEFAULT_POOL_SIZE, "pool size {:?}", raw);
        }
    }

    #[test]
    fn test_missing_required_key() {
        for key in [KEY_DRIVER, KEY_URL, KEY_USER, KEY_PASSWORD] {
            let mut source = std::collections::HashMap::new();
            for (k, v) in [
                (KEY_DRIVER, "sqlite"),
                (KEY_URL, "sqlite::memory:"),
                (KEY_USER, "u"),
                (KEY_PASSWORD, "p"),
            ] {
                if k != key {
                    source.insert(k.to_string(), v.to_string());
                }
            }
            let err = PoolSettings::from_source(&source).unwrap_err();
            assert!(
                matches!(err, PoolError::Initialization(ref msg) if msg.contains(key)),
                "missing {} gave {:?}",
                key,
                err
            );
        }
    }

    #[test]
    fn test_debug_redacts_password() {
        let settings = PoolSettings::from_source(&complete_source()).expect("settings");
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_connect_params() {
        let settings = PoolSettings::new("sqlite", "sqlite:app.db")
            .with_credentials("registrar", "pw")
            .with_encoding("UTF-8");
        let params = settings.connect_params();
        assert_eq!(params.url, "sqlite:app.db");
        assert_eq!(params.user, "registrar");
        assert_eq!(params.password, "pw");
        assert_eq!(params.encoding.as_deref(), Some("UTF-8"));
    }

    #[test]
    #[should_panic(expected = "pool_size must be greater than 0")]
    fn test_zero_pool_size_panics() {
        PoolSettings::new("sqlite", "sqlite::memory:").with_pool_size(0);
    }

    #[test]
    fn test_serialization_round_trip_keeps_defaults() {
        let json = r#"{"driver":"sqlite","url":"sqlite::memory:"}"#;
        let settings: PoolSettings = serde_json::from_str(json).expect("deserialize");
        assert_eq!(settings.pool_size(), DEFAULT_POOL_SIZE);
        assert_eq!(settings, PoolSettings::new("sqlite", "sqlite::memory:"));
    }
}
