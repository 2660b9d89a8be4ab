//! etcd-backed key-value store
//!
//! This backend speaks the etcd v2 keys HTTP API. Each logical key is
//! stored under `<prefix>/<key>`, so several stores can share one etcd
//! cluster without seeing each other's values.
//!
//! ## Wire format
//!
//! ```text
//! GET    /v2/keys/<prefix>/<key>            → {"action":"get","node":{"value":"42",...}}
//! PUT    /v2/keys/<prefix>/<key>  value=42  → 200 / 201
//! DELETE /v2/keys/<prefix>/<key>            → 200, or 404 {"errorCode":100,...}
//! ```
//!
//! ## Value encoding
//!
//! By default values are written with zero decimal places (`3.7` is
//! stored as `"4"`), so fractional precision does not survive a round
//! trip. [`ValueEncoding::Exact`] stores the shortest representation that
//! parses back to the same float instead.
//!
//! ## Endpoints
//!
//! The backend pins the last endpoint that answered. Connection failures
//! move on to the next endpoint; any HTTP response, including errors, is
//! final for the call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, instrument, trace, warn};

use super::backend::{HealthStatus, KeyValue};
use super::context::CallContext;
use super::error::{EtcdError, StorageError, StorageResult};

/// Per-request header timeout used when none is configured
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How values are rendered into etcd's string payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueEncoding {
    /// Fixed-point with zero decimal places (lossy, ties round half to even)
    #[default]
    Integer,

    /// Shortest representation that round-trips exactly
    Exact,
}

impl ValueEncoding {
    pub fn encode(self, value: f64) -> String {
        match self {
            ValueEncoding::Integer => format!("{value:.0}"),
            ValueEncoding::Exact => format!("{value}"),
        }
    }
}

/// What `remove` does when etcd reports the key as missing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoveMissing {
    /// Return `StorageError::NotFound`
    #[default]
    Error,

    /// Treat the removal as successful
    Ignore,
}

/// Connection settings for [`EtcdBackend`]
#[derive(Debug, Clone)]
pub struct EtcdConfig {
    /// Namespace every key is stored under
    pub prefix: String,

    /// `host:port` pairs or full URLs
    pub endpoints: Vec<String>,

    /// Timeout for each HTTP request
    pub request_timeout: Duration,

    pub encoding: ValueEncoding,

    pub remove_missing: RemoveMissing,
}

impl EtcdConfig {
    pub fn new(prefix: impl Into<String>, endpoints: Vec<String>) -> Self {
        Self {
            prefix: prefix.into(),
            endpoints,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            encoding: ValueEncoding::default(),
            remove_missing: RemoveMissing::default(),
        }
    }

    /// Set the per-request HTTP timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set how values are written
    pub fn encoding(mut self, encoding: ValueEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set what `remove` does for keys etcd does not have
    pub fn remove_missing(mut self, remove_missing: RemoveMissing) -> Self {
        self.remove_missing = remove_missing;
        self
    }
}

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: Node,
}

#[derive(Debug, Deserialize)]
struct Node {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    health: String,
}

/// etcd v2 key-value backend
///
/// Construction never contacts the cluster; unreachable endpoints surface
/// on the first operation.
#[derive(Debug)]
pub struct EtcdBackend {
    client: reqwest::Client,
    endpoints: Vec<Url>,
    pinned: AtomicUsize,
    prefix: String,
    encoding: ValueEncoding,
    remove_missing: RemoveMissing,
}

impl EtcdBackend {
    /// Create a new etcd backend
    ///
    /// Fails only on invalid configuration: an empty endpoint list or an
    /// endpoint that is not a usable HTTP base URL.
    pub fn new(config: EtcdConfig) -> StorageResult<Self> {
        if config.endpoints.is_empty() {
            return Err(StorageError::InvalidConfig(
                "at least one etcd endpoint is required".to_string(),
            ));
        }

        let endpoints = config
            .endpoints
            .iter()
            .map(|endpoint| parse_endpoint(endpoint))
            .collect::<StorageResult<Vec<_>>>()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StorageError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        debug!(
            "etcd backend for prefix {:?} with {} endpoint(s)",
            config.prefix,
            endpoints.len()
        );

        Ok(Self {
            client,
            endpoints,
            pinned: AtomicUsize::new(0),
            prefix: config.prefix,
            encoding: config.encoding,
            remove_missing: config.remove_missing,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }

    /// Remote path of a logical key
    pub fn key_path(&self, key: &str) -> String {
        format!("{}/{}", self.prefix, key)
    }

    /// Send a request, failing over between endpoints on connection errors
    async fn send(
        &self,
        method: Method,
        locate: impl Fn(&Url) -> StorageResult<Url>,
        value: Option<&str>,
    ) -> StorageResult<reqwest::Response> {
        let count = self.endpoints.len();
        let start = self.pinned.load(Ordering::Relaxed) % count;
        let mut last_error = None;

        for attempt in 0..count {
            let index = (start + attempt) % count;
            let endpoint = &self.endpoints[index];
            let url = locate(endpoint)?;

            trace!("{method} {url}");

            let mut request = self.client.request(method.clone(), url);
            if let Some(value) = value {
                request = request.form(&[("value", value)]);
            }

            match request.send().await {
                Ok(response) => {
                    if index != start {
                        debug!("pinning etcd endpoint {endpoint}");
                        self.pinned.store(index, Ordering::Relaxed);
                    }
                    return Ok(response);
                }
                Err(e) if e.is_connect() => {
                    warn!("etcd endpoint {endpoint} unreachable: {e}");
                    last_error = Some(e);
                }
                Err(e) => return Err(StorageError::Transport(e)),
            }
        }

        Err(last_error
            .map(StorageError::Transport)
            .unwrap_or_else(|| StorageError::InvalidConfig("no etcd endpoints".to_string())))
    }

    /// Issue a keys request for `key` and return the body of a successful response
    async fn keys_request(&self, method: Method, key: &str, value: Option<&str>) -> StorageResult<String> {
        let path = self.key_path(key);
        let response = self
            .send(method, |endpoint| keys_url(endpoint, &path), value)
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(remote_error(status, &body, key))
        }
    }
}

#[async_trait]
impl KeyValue for EtcdBackend {
    #[instrument(skip(self, ctx), fields(prefix = %self.prefix))]
    async fn get(&self, ctx: &CallContext, key: &str) -> StorageResult<f64> {
        let body = ctx.run(self.keys_request(Method::GET, key, None)).await?;

        let response: KeysResponse = serde_json::from_str(&body)
            .map_err(|e| StorageError::Remote(EtcdError::invalid_body(e)))?;
        let value = response.node.value.unwrap_or_default();

        value
            .parse::<f64>()
            .map_err(|source| StorageError::MalformedValue {
                key: key.to_string(),
                value,
                source,
            })
    }

    #[instrument(skip(self, ctx), fields(prefix = %self.prefix))]
    async fn set(&self, ctx: &CallContext, key: &str, value: f64) -> StorageResult<()> {
        let encoded = self.encoding.encode(value);
        ctx.run(self.keys_request(Method::PUT, key, Some(&encoded)))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(prefix = %self.prefix))]
    async fn remove(&self, ctx: &CallContext, key: &str) -> StorageResult<()> {
        match ctx.run(self.keys_request(Method::DELETE, key, None)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() && self.remove_missing == RemoveMissing::Ignore => {
                debug!("remove of absent key {key} ignored");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, ctx))]
    async fn health_check(&self, ctx: &CallContext) -> StorageResult<HealthStatus> {
        let response = ctx
            .run(self.send(Method::GET, health_url, None))
            .await?;

        let status = response.status();
        let body = ctx.run(async { Ok(response.text().await?) }).await?;
        let healthy = status.is_success()
            && serde_json::from_str::<HealthResponse>(&body)
                .map(|health| health.health == "true")
                .unwrap_or(false);

        let endpoint = &self.endpoints[self.pinned.load(Ordering::Relaxed) % self.endpoints.len()];

        Ok(HealthStatus {
            healthy,
            message: if healthy {
                "etcd cluster healthy".to_string()
            } else {
                format!("etcd reported unhealthy ({status}): {}", body.trim())
            },
            metadata: HashMap::from([
                ("backend".to_string(), "etcd".to_string()),
                ("endpoint".to_string(), endpoint.to_string()),
                ("prefix".to_string(), self.prefix.clone()),
            ]),
        })
    }

    fn name(&self) -> &'static str {
        "etcd"
    }
}

/// Turn `host:port` or a full URL into a base URL
fn parse_endpoint(endpoint: &str) -> StorageResult<Url> {
    let endpoint = endpoint.trim();
    let raw = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    };

    let url = Url::parse(&raw)
        .map_err(|e| StorageError::InvalidConfig(format!("invalid etcd endpoint {endpoint:?}: {e}")))?;

    let is_http = matches!(url.scheme(), "http" | "https");
    if !is_http || url.cannot_be_a_base() || url.host().is_none() {
        return Err(StorageError::InvalidConfig(format!(
            "invalid etcd endpoint {endpoint:?}: expected an http(s) address"
        )));
    }

    Ok(url)
}

/// `<endpoint>/v2/keys/<path>` with empty segments dropped and each segment escaped
fn keys_url(endpoint: &Url, path: &str) -> StorageResult<Url> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|_| StorageError::InvalidConfig(format!("{endpoint} cannot be a base URL")))?
        .pop_if_empty()
        .extend(["v2", "keys"])
        .extend(path.split('/').filter(|segment| !segment.is_empty()));
    Ok(url)
}

fn health_url(endpoint: &Url) -> StorageResult<Url> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|_| StorageError::InvalidConfig(format!("{endpoint} cannot be a base URL")))?
        .pop_if_empty()
        .push("health");
    Ok(url)
}

fn remote_error(status: StatusCode, body: &str, key: &str) -> StorageError {
    match serde_json::from_str::<EtcdError>(body) {
        Ok(err) if err.code == EtcdError::KEY_NOT_FOUND => StorageError::NotFound {
            key: key.to_string(),
        },
        Ok(err) => StorageError::Remote(err),
        Err(_) => StorageError::Remote(EtcdError::from_status(status.as_u16(), body)),
    }
}
