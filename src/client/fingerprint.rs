//! Public IP resolution and one-way fingerprinting.
//!
//! The caller's address is truncated to its /24 prefix (for dotted addresses)
//! and hashed with SHA-256. Users sharing a prefix share a fingerprint, which
//! blunts address rotation inside one ISP block at the cost of occasionally
//! rate limiting unrelated users behind the same CGNAT.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::error::{Result, SitevoteError};

/// Default IP echo endpoint.
pub const DEFAULT_IP_LOOKUP_URL: &str = "https://api.ipify.org?format=json";

/// Keep the first three components of a dotted address.
///
/// `"203.0.113.42"` becomes `"203.0.113"`. Anything without a dot (IPv6, for
/// instance) is returned unchanged.
pub fn truncate_ip(ip: &str) -> &str {
    match ip.match_indices('.').nth(2) {
        Some((idx, _)) => &ip[..idx],
        None => ip,
    }
}

/// Hash an already truncated address.
pub fn fingerprint_of(truncated: &str) -> IpFingerprint {
    IpFingerprint(hex::encode(Sha256::digest(truncated.as_bytes())))
}

/// Lowercase hex SHA-256 of a truncated public IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IpFingerprint(String);

impl IpFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for IpFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the caller's public IP address.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Resolve the current public IP. Failures are `SitevoteError::Network`.
    async fn public_ip(&self) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    ip: String,
}

/// Resolver backed by an HTTP echo service returning `{"ip": "..."}`.
pub struct IpifyResolver {
    url: String,
    client: ReqwestClient,
}

impl IpifyResolver {
    pub fn new(url: &str) -> Self {
        Self::with_client(url, ReqwestClient::new())
    }

    pub fn with_client(url: &str, client: ReqwestClient) -> Self {
        Self {
            url: url.to_string(),
            client,
        }
    }
}

impl Default for IpifyResolver {
    fn default() -> Self {
        Self::new(DEFAULT_IP_LOOKUP_URL)
    }
}

#[async_trait]
impl IpResolver for IpifyResolver {
    async fn public_ip(&self) -> Result<String> {
        let res = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SitevoteError::Network(format!("IP lookup failed: {}", e)))?;

        if !res.status().is_success() {
            return Err(SitevoteError::Network(format!(
                "IP lookup returned {}",
                res.status()
            )));
        }

        let body: IpLookupResponse = res
            .json()
            .await
            .map_err(|e| SitevoteError::Network(format!("IP lookup body unreadable: {}", e)))?;

        let ip = body.ip.trim();
        if ip.is_empty() {
            return Err(SitevoteError::Network("IP lookup returned an empty address".to_string()));
        }
        Ok(ip.to_string())
    }
}

/// Resolver returning a fixed answer, for tests and offline use.
///
/// Counts how often it was asked so callers can assert that no lookup
/// happened.
#[derive(Debug, Default)]
pub struct MockIpResolver {
    ip: Option<String>,
    calls: AtomicUsize,
}

impl MockIpResolver {
    /// Always resolve to `ip`.
    pub fn new(ip: &str) -> Self {
        Self {
            ip: Some(ip.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail with a network error.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Number of lookups performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpResolver for MockIpResolver {
    async fn public_ip(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ip
            .clone()
            .ok_or_else(|| SitevoteError::Network("IP lookup unavailable".to_string()))
    }
}

/// Turns the caller's network identity into an [`IpFingerprint`].
pub struct Fingerprinter {
    resolver: Arc<dyn IpResolver>,
}

impl Fingerprinter {
    pub fn new(resolver: Arc<dyn IpResolver>) -> Self {
        Self { resolver }
    }

    /// Resolve, truncate and hash the public IP. The raw address is dropped
    /// here and never logged.
    pub async fn fingerprint(&self) -> Result<IpFingerprint> {
        let ip = self.resolver.public_ip().await?;
        let fingerprint = fingerprint_of(truncate_ip(&ip));
        trace!(fingerprint = %fingerprint, "Derived IP fingerprint");
        Ok(fingerprint)
    }
}
