use crate::connection::config::ConnectionConfig;
use crate::core::{Result, StoreError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Page-size hint sent with every SCAN.
pub const DEFAULT_SCAN_COUNT: usize = 1024;

/// Entity store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Prefix isolating this store's keys from other tenants
    pub namespace: Option<String>,

    /// SCAN page-size hint
    pub scan_count: usize,

    /// Pool and connection settings
    pub connection: ConnectionConfig,
}

/// On-disk form of [`StoreConfig`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StoreConfigFile {
    namespace: Option<String>,
    scan_count: Option<usize>,
    url: Option<String>,
    max_connections: Option<usize>,
    min_connections: Option<usize>,
    connect_timeout_ms: Option<u64>,
    idle_timeout_secs: Option<u64>,
    test_on_borrow: Option<bool>,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self {
            namespace: None,
            scan_count: DEFAULT_SCAN_COUNT,
            connection: ConnectionConfig::default(),
        }
    }

    /// Set the namespace
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string()).filter(|ns| !ns.is_empty());
        self
    }

    /// Set the SCAN page-size hint
    pub fn scan_count(mut self, count: usize) -> Self {
        self.scan_count = count;
        self
    }

    /// Set the connection configuration
    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Connection settings from [`ConnectionConfig::from_env`], everything else default.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new().connection(ConnectionConfig::from_env()?))
    }

    /// Parse a JSON document such as
    ///
    /// ```json
    /// { "namespace": "prod", "scan_count": 512, "url": "redis://:pw@cache:6379/0" }
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: StoreConfigFile = serde_json::from_str(json)?;

        let mut connection = match &file.url {
            Some(url) => ConnectionConfig::from_url(url)?,
            None => ConnectionConfig::default(),
        };
        if let Some(max) = file.max_connections {
            connection.max_connections = max;
        }
        if let Some(min) = file.min_connections {
            connection.min_connections = min;
        }
        if let Some(ms) = file.connect_timeout_ms {
            connection.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = file.idle_timeout_secs {
            connection.idle_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(enabled) = file.test_on_borrow {
            connection.test_on_borrow = enabled;
        }

        let config = Self {
            namespace: file.namespace.filter(|ns| !ns.is_empty()),
            scan_count: file.scan_count.unwrap_or(DEFAULT_SCAN_COUNT),
            connection,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            StoreError::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.scan_count == 0 {
            return Err(StoreError::Config("scan_count must be > 0".to_string()));
        }

        if let Some(namespace) = &self.namespace {
            if namespace.chars().any(char::is_whitespace) {
                return Err(StoreError::Config(format!(
                    "namespace {:?} cannot contain whitespace",
                    namespace
                )));
            }
        }

        self.connection.validate()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
