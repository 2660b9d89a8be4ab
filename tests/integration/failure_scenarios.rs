//! Failure tests for the etcd backend
//!
//! These tests verify that failures are reported, not hidden:
//! - Unreachable endpoints
//! - Service-side errors
//! - Slow responses against deadlines and cancellation
//! - Endpoint failover

use std::time::Duration;

use assert_matches::assert_matches;
use metrics_kv::storage::{CallContext, EtcdBackend, EtcdConfig, EtcdError, KeyValue, StorageError};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_unreachable_endpoint_fails_on_first_use() {
    // Construction succeeds, nothing listens on port 1
    let backend = EtcdBackend::new(EtcdConfig::new("metrics", vec!["127.0.0.1:1".to_string()]))
        .expect("construction must not contact the cluster");
    let ctx = CallContext::background();

    assert_matches!(backend.get(&ctx, "k").await, Err(StorageError::Transport(_)));
    assert_matches!(backend.set(&ctx, "k", 1.0).await, Err(StorageError::Transport(_)));
    assert_matches!(backend.remove(&ctx, "k").await, Err(StorageError::Transport(_)));
}

#[tokio::test]
async fn test_service_error_is_propagated_verbatim() {
    let server = MockServer::start().await;
    Mock::given(path_regex("^/v2/keys/"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "errorCode": 300,
            "message": "Raft Internal Error",
            "cause": "leader changed",
            "index": 12,
        })))
        .mount(&server)
        .await;

    let backend = etcd_backend(&server, "metrics");
    let ctx = CallContext::background();

    let err = backend.set(&ctx, "k", 1.0).await.unwrap_err();
    assert_matches!(
        err,
        StorageError::Remote(EtcdError { code: 300, ref message, ref cause, index: 12 })
            if message == "Raft Internal Error" && cause == "leader changed"
    );
}

#[tokio::test]
async fn test_non_etcd_error_body_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let backend = etcd_backend(&server, "metrics");
    let ctx = CallContext::background();

    let err = backend.get(&ctx, "k").await.unwrap_err();
    assert_matches!(
        err,
        StorageError::Remote(EtcdError { code: 0, ref message, ref cause, .. })
            if message.contains("502") && cause == "bad gateway"
    );
}

#[tokio::test]
async fn test_invalid_success_body_is_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{invalid json"))
        .mount(&server)
        .await;

    let backend = etcd_backend(&server, "metrics");
    let ctx = CallContext::background();

    assert_matches!(backend.get(&ctx, "k").await, Err(StorageError::Remote(_)));
}

#[tokio::test]
async fn test_call_deadline_interrupts_slow_service() {
    let server = MockServer::start().await;
    Mock::given(path_regex("^/v2/keys/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let backend = etcd_backend(&server, "metrics");
    let ctx = CallContext::with_timeout(Duration::from_millis(50));

    let started = std::time::Instant::now();
    assert_matches!(backend.set(&ctx, "k", 1.0).await, Err(StorageError::DeadlineExceeded));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_request_timeout_surfaces_as_transport_error() {
    let server = MockServer::start().await;
    Mock::given(path_regex("^/v2/keys/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let backend = EtcdBackend::new(
        etcd_config(&server, "metrics").request_timeout(Duration::from_millis(100)),
    )
    .unwrap();
    let ctx = CallContext::background();

    let err = backend.get(&ctx, "k").await.unwrap_err();
    assert_matches!(err, StorageError::Transport(ref e) if e.is_timeout());
}

#[tokio::test]
async fn test_caller_cancellation_interrupts_call() {
    let server = MockServer::start().await;
    Mock::given(path_regex("^/v2/keys/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let backend = etcd_backend(&server, "metrics");
    let token = CancellationToken::new();
    let ctx = CallContext::background().with_cancellation(token.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    assert_matches!(backend.remove(&ctx, "k").await, Err(StorageError::Cancelled));
}

#[tokio::test]
async fn test_slow_call_does_not_affect_other_calls() {
    let (server, _etcd) = start_fake_etcd().await;
    let backend = etcd_backend(&server, "metrics");

    let expired = CallContext::with_timeout(Duration::ZERO);
    let fresh = CallContext::with_timeout(Duration::from_secs(5));

    assert_matches!(backend.get(&expired, "k").await, Err(StorageError::DeadlineExceeded));
    backend.set(&fresh, "k", 3.0).await.unwrap();
    assert_eq!(backend.get(&fresh, "k").await.unwrap(), 3.0);
}

#[tokio::test]
async fn test_failover_to_next_endpoint() {
    let (server, etcd) = start_fake_etcd().await;
    let backend = EtcdBackend::new(EtcdConfig::new(
        "metrics",
        vec!["127.0.0.1:1".to_string(), server.uri()],
    ))
    .unwrap();
    let ctx = CallContext::background();

    backend.set(&ctx, "requests", 7.0).await.unwrap();
    assert_eq!(etcd.raw("/metrics/requests").as_deref(), Some("7"));
    assert_eq!(backend.get(&ctx, "requests").await.unwrap(), 7.0);
}

#[tokio::test]
async fn test_http_errors_do_not_fail_over() {
    let failing = MockServer::start().await;
    Mock::given(path_regex("^/v2/keys/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&failing)
        .await;
    let (healthy, _etcd) = start_fake_etcd().await;

    let backend = EtcdBackend::new(EtcdConfig::new(
        "metrics",
        vec![failing.uri(), healthy.uri()],
    ))
    .unwrap();
    let ctx = CallContext::background();

    assert_matches!(backend.set(&ctx, "k", 1.0).await, Err(StorageError::Remote(_)));
    assert!(healthy.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_health_check_reports_cluster_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"health": "true"})))
        .mount(&server)
        .await;

    let backend = etcd_backend(&server, "metrics");
    let ctx = CallContext::background();

    let status = backend.health_check(&ctx).await.unwrap();
    assert!(status.healthy);
    assert_eq!(status.metadata.get("prefix").map(String::as_str), Some("metrics"));
}

#[tokio::test]
async fn test_health_check_reports_unhealthy_cluster() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({"health": "false"})))
        .mount(&server)
        .await;

    let backend = etcd_backend(&server, "metrics");
    let ctx = CallContext::background();

    let status = backend.health_check(&ctx).await.unwrap();
    assert!(!status.healthy);
    assert!(status.message.contains("unhealthy"));
}
