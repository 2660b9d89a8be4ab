//! Backend selection
//!
//! `KvHandle` is the value consumers hold. It is cheap to clone and hides
//! which backend is in effect. Build one at startup and pass it to whatever
//! needs storage.
//!
//! For code that cannot take a handle, a process-wide handle is available
//! through [`global`]. It defaults to an in-memory backend and can be
//! replaced once, before the first read, with [`install_global`] or
//! [`init_etcd_storage`].

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::StorageConfig;

use super::backend::{HealthStatus, KeyValue};
use super::context::CallContext;
use super::error::{StorageError, StorageResult};
use super::etcd::{EtcdBackend, EtcdConfig};
use super::memory::MemoryBackend;

static GLOBAL: OnceLock<KvHandle> = OnceLock::new();

/// Shared handle to the active key-value backend
#[derive(Clone)]
pub struct KvHandle {
    backend: Arc<dyn KeyValue>,
}

impl KvHandle {
    pub fn new(backend: Arc<dyn KeyValue>) -> Self {
        Self { backend }
    }

    /// A handle to a fresh in-memory backend
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// A handle to an etcd backend
    pub fn etcd(config: EtcdConfig) -> StorageResult<Self> {
        Ok(Self::new(Arc::new(EtcdBackend::new(config)?)))
    }

    /// Build the backend described by `config`
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let handle = match config {
            StorageConfig::Memory => Self::memory(),
            StorageConfig::Etcd(etcd) => Self::etcd(etcd.to_etcd_config())?,
        };
        info!("using {} storage backend", handle.backend_name());
        Ok(handle)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl Default for KvHandle {
    fn default() -> Self {
        Self::memory()
    }
}

impl std::fmt::Debug for KvHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvHandle")
            .field("backend", &self.backend.name())
            .finish()
    }
}

#[async_trait]
impl KeyValue for KvHandle {
    async fn get(&self, ctx: &CallContext, key: &str) -> StorageResult<f64> {
        self.backend.get(ctx, key).await
    }

    async fn set(&self, ctx: &CallContext, key: &str, value: f64) -> StorageResult<()> {
        self.backend.set(ctx, key, value).await
    }

    async fn remove(&self, ctx: &CallContext, key: &str) -> StorageResult<()> {
        self.backend.remove(ctx, key).await
    }

    async fn health_check(&self, ctx: &CallContext) -> StorageResult<HealthStatus> {
        self.backend.health_check(ctx).await
    }

    fn name(&self) -> &'static str {
        self.backend.name()
    }
}

/// The process-wide handle
///
/// Installs an in-memory backend on first use if nothing was installed.
pub fn global() -> &'static KvHandle {
    GLOBAL.get_or_init(|| {
        debug!("no storage backend installed, defaulting to memory");
        KvHandle::memory()
    })
}

/// Install the process-wide handle
///
/// Succeeds at most once, and only before [`global`] was first called.
pub fn install_global(handle: KvHandle) -> StorageResult<()> {
    let name = handle.backend_name();
    GLOBAL
        .set(handle)
        .map_err(|_| StorageError::AlreadyInstalled)?;
    info!("installed process-wide {name} storage backend");
    Ok(())
}

/// Install an etcd backend with default settings as the process-wide handle
pub fn init_etcd_storage(prefix: &str, hosts: &[String]) -> StorageResult<()> {
    install_global(KvHandle::etcd(EtcdConfig::new(prefix, hosts.to_vec()))?)
}
