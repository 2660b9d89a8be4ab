//! Concurrent access through shared handles
//!
//! These tests verify that a single handle can be shared across tasks:
//! - Concurrent writers on the memory backend
//! - Concurrent writers on the etcd backend
//! - Handles injected into independent consumers

use std::sync::Arc;

use metrics_kv::storage::{CallContext, KeyValue, KvHandle, MemoryBackend};
use pretty_assertions::assert_eq;

use crate::helpers::*;

async fn record_requests(store: KvHandle, worker: usize, count: usize) {
    let ctx = CallContext::background();
    for i in 0..count {
        store
            .set(&ctx, &format!("worker-{worker}/requests"), (i + 1) as f64)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_memory_handle_shared_across_tasks() {
    let store = KvHandle::memory();

    let mut tasks = vec![];
    for worker in 0..8 {
        tasks.push(tokio::spawn(record_requests(store.clone(), worker, 50)));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let ctx = CallContext::background();
    for worker in 0..8 {
        let value = store.get(&ctx, &format!("worker-{worker}/requests")).await.unwrap();
        assert_eq!(value, 50.0);
    }
}

#[tokio::test]
async fn test_etcd_handle_shared_across_tasks() {
    let (server, etcd) = start_fake_etcd().await;
    let store = KvHandle::etcd(etcd_config(&server, "metrics")).unwrap();

    let mut tasks = vec![];
    for worker in 0..4 {
        tasks.push(tokio::spawn(record_requests(store.clone(), worker, 10)));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(etcd.paths().len(), 4);
    assert_eq!(etcd.raw("/metrics/worker-2/requests").as_deref(), Some("10"));
}

#[tokio::test]
async fn test_last_writer_wins_on_same_key() {
    let backend = Arc::new(MemoryBackend::new());
    let store = KvHandle::new(backend.clone());
    let ctx = CallContext::background();

    let writers: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let ctx = CallContext::background();
                store.set(&ctx, "gauge", i as f64).await
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    let value = store.get(&ctx, "gauge").await.unwrap();
    assert!((0.0..16.0).contains(&value));
    assert_eq!(backend.len().await, 1);
}
