//! Security adapter (§4.10) — external collaborator, interface only
//!
//! An optional object handed to the two-tier engine at construction. The
//! engine calls through it to obtain a remote client (instead of connecting
//! directly) and to report on connection security; it never inspects or
//! holds credentials itself. Authentication, TLS, and certificate handling
//! live entirely behind this trait — this crate only defines the seam and a
//! pass-through default for deployments that don't need one.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::CacheResult;
use crate::remote::RemoteClient;

/// Coarse security posture, independent of the tri-state cache health in
/// `cache_trait::CacheHealth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Secure,
    Degraded,
    Insecure,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SecurityStatus {
    pub level: SecurityLevel,
    pub summary: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectionSecurityReport {
    pub is_secure: bool,
    pub vulnerabilities: Vec<String>,
    pub recommendations: Vec<String>,
}

#[async_trait]
pub trait SecurityAdapter: Send + Sync {
    /// Build an authenticated, TLS-validated remote client for `redis_url`.
    async fn create_secure_client(&self, redis_url: &str) -> CacheResult<Arc<dyn RemoteClient>>;

    /// Inspect an already-connected client's transport security.
    async fn validate_connection(&self, client: &dyn RemoteClient) -> CacheResult<ConnectionSecurityReport>;

    fn status(&self) -> SecurityStatus;
}

/// No-op adapter used when the cache is constructed without a security
/// configuration. Connects via a plain [`crate::remote::RedisRemoteClient`]
/// and reports itself as insecure rather than silently claiming otherwise.
pub struct PassthroughSecurityAdapter;

#[async_trait]
impl SecurityAdapter for PassthroughSecurityAdapter {
    async fn create_secure_client(&self, redis_url: &str) -> CacheResult<Arc<dyn RemoteClient>> {
        let client = crate::remote::RedisRemoteClient::connect(redis_url).await?;
        Ok(Arc::new(client))
    }

    async fn validate_connection(&self, _client: &dyn RemoteClient) -> CacheResult<ConnectionSecurityReport> {
        Ok(ConnectionSecurityReport {
            is_secure: false,
            vulnerabilities: vec!["no security adapter configured; connection is unauthenticated plaintext".to_string()],
            recommendations: vec!["supply a SecurityAdapter for TLS and credential management in production".to_string()],
        })
    }

    fn status(&self) -> SecurityStatus {
        SecurityStatus {
            level: SecurityLevel::Insecure,
            summary: "no security adapter configured".to_string(),
        }
    }
}
