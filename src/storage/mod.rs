//! Key-value storage for metric values
//!
//! This module provides a trait-based abstraction for persisting scalar
//! metric values under string keys.
//!
//! ## Design
//!
//! - **Trait-based**: `KeyValue` allows swapping implementations
//! - **Async**: All operations are async for compatibility with Tokio
//! - **Caller-scoped**: Every call takes a `CallContext` carrying its
//!   deadline and cancellation
//!
//! ## Backends
//!
//! - **In-Memory** (default): No persistence, exact values
//! - **etcd**: Shared across processes via the etcd v2 keys API
//!
//! ## Usage
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use metrics_kv::storage::{CallContext, EtcdConfig, KeyValue, KvHandle};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = KvHandle::etcd(EtcdConfig::new(
//!         "metrics",
//!         vec!["127.0.0.1:2379".to_string()],
//!     ))?;
//!
//!     let ctx = CallContext::with_timeout(Duration::from_secs(2));
//!     store.set(&ctx, "requests", 42.0).await?;
//!     println!("{}", store.get(&ctx, "requests").await?);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod context;
pub mod error;
pub mod etcd;
pub mod handle;
pub mod memory;

pub use backend::{HealthStatus, KeyValue};
pub use context::CallContext;
pub use error::{EtcdError, StorageError, StorageResult};
pub use etcd::{EtcdBackend, EtcdConfig, RemoveMissing, ValueEncoding};
pub use handle::{KvHandle, global, init_etcd_storage, install_global};
pub use memory::MemoryBackend;
