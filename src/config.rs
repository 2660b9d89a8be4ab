use std::time::Duration;

use tracing::trace;

use crate::storage::etcd::{EtcdConfig, RemoveMissing, ValueEncoding};

/// Storage backend configuration
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[default]
    Memory,

    /// etcd v2 keys API
    Etcd(EtcdStorageConfig),
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct EtcdStorageConfig {
    /// Namespace all keys are stored under
    pub prefix: String,

    /// `host:port` pairs or URLs
    pub endpoints: Vec<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub encoding: ValueEncoding,

    #[serde(default)]
    pub remove_missing: RemoveMissing,
}

impl EtcdStorageConfig {
    pub fn to_etcd_config(&self) -> EtcdConfig {
        EtcdConfig::new(self.prefix.clone(), self.endpoints.clone())
            .request_timeout(Duration::from_secs(self.request_timeout_secs))
            .encoding(self.encoding)
            .remove_missing(self.remove_missing)
    }
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_prefix() -> String {
    String::from("metrics")
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Config {
    /// Storage configuration (defaults to in-memory)
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Apply endpoint and prefix overrides (usually taken from the environment)
    ///
    /// Endpoints switch the storage to etcd, keeping any other etcd
    /// settings from the file. A prefix alone only affects an etcd backend.
    pub fn with_overrides(mut self, endpoints: Option<Vec<String>>, prefix: Option<String>) -> Self {
        if let Some(endpoints) = endpoints {
            self.storage = match self.storage {
                StorageConfig::Etcd(etcd) => StorageConfig::Etcd(EtcdStorageConfig { endpoints, ..etcd }),
                StorageConfig::Memory => StorageConfig::Etcd(EtcdStorageConfig {
                    prefix: default_prefix(),
                    endpoints,
                    request_timeout_secs: default_request_timeout_secs(),
                    encoding: ValueEncoding::default(),
                    remove_missing: RemoveMissing::default(),
                }),
            };
        }

        if let (Some(prefix), StorageConfig::Etcd(etcd)) = (prefix, &mut self.storage) {
            etcd.prefix = prefix;
        }

        self
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    parse_config(&file_content)
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
