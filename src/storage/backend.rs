//! Key-value contract shared by all backends
//!
//! This module defines the `KeyValue` trait that every metric value
//! store implements.

use std::collections::HashMap;

use async_trait::async_trait;

use super::context::CallContext;
use super::error::StorageResult;

/// Health status of a key-value backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Storage for scalar metric values under string keys
///
/// Implementations are interchangeable: callers hold an
/// `Arc<dyn KeyValue>` (usually via [`KvHandle`](super::KvHandle)) and never
/// learn which variant is in effect.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared across tasks.
///
/// ## Error Handling
///
/// A missing key is always reported as `StorageError::NotFound`, never as a
/// substituted zero. Nothing is retried or logged at error level; the
/// caller owns the retry policy.
#[async_trait]
pub trait KeyValue: Send + Sync {
    /// Fetch the value stored under `key`
    ///
    /// Fails with `StorageError::NotFound` if the key was never set or
    /// has been removed.
    async fn get(&self, ctx: &CallContext, key: &str) -> StorageResult<f64>;

    /// Store `value` under `key`, overwriting any previous value
    ///
    /// Any float is accepted, including NaN and infinities; validation is
    /// the caller's concern.
    async fn set(&self, ctx: &CallContext, key: &str, value: f64) -> StorageResult<()>;

    /// Delete `key`
    ///
    /// Whether removing an absent key is an error depends on the backend;
    /// see the backend's documentation.
    async fn remove(&self, ctx: &CallContext, key: &str) -> StorageResult<()>;

    /// Check backend health
    async fn health_check(&self, ctx: &CallContext) -> StorageResult<HealthStatus>;

    /// Short backend identifier used in logs ("memory", "etcd")
    fn name(&self) -> &'static str;
}
