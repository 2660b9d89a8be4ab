//! In-memory key-value backend (no persistence)
//!
//! This is the default backend. Values live in a `HashMap` for the
//! lifetime of the process and are lost on exit.
//!
//! - No size bound, no eviction
//! - Values round-trip exactly
//! - Removing an absent key is a no-op

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use super::backend::{HealthStatus, KeyValue};
use super::context::CallContext;
use super::error::{StorageError, StorageResult};

/// In-memory key-value backend
///
/// The map is guarded by an `RwLock`, so concurrent callers are safe.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: RwLock<HashMap<String, f64>>,
}

impl MemoryBackend {
    /// Create a new, empty in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    /// Whether no key is stored
    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValue for MemoryBackend {
    async fn get(&self, ctx: &CallContext, key: &str) -> StorageResult<f64> {
        ctx.check()?;

        let values = self.values.read().await;
        values.get(key).copied().ok_or_else(|| StorageError::NotFound {
            key: key.to_string(),
        })
    }

    async fn set(&self, ctx: &CallContext, key: &str, value: f64) -> StorageResult<()> {
        ctx.check()?;

        trace!("memory: set {key} = {value}");
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, ctx: &CallContext, key: &str) -> StorageResult<()> {
        ctx.check()?;

        if self.values.write().await.remove(key).is_none() {
            trace!("memory: remove of absent key {key} ignored");
        }
        Ok(())
    }

    async fn health_check(&self, _ctx: &CallContext) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("keys".to_string(), self.len().await.to_string()),
            ]),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
