use crate::auth::AuthKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

const RECENT_ERRORS_REPORTED: usize = 10;

/// How many times each login strategy was used, counted per `get_token` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuthMethodUsage {
    pub token: u64,
    pub approle: u64,
    pub kubernetes: u64,
}

/// A failed secret fetch, as recorded at the time of the failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub path: String,
    pub error: String,
}

/// Point-in-time view of the collector state.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub access_patterns: HashMap<String, u64>,
    pub last_access: HashMap<String, DateTime<Utc>>,
    pub auth_method_usage: AuthMethodUsage,
    pub recent_errors: Vec<ErrorRecord>,
    pub total_requests: u64,
}

#[derive(Default)]
struct MetricsState {
    access_count: HashMap<String, u64>,
    last_access: HashMap<String, DateTime<Utc>>,
    auth_methods: AuthMethodUsage,
    errors: Vec<ErrorRecord>,
}

/// Secret access metrics.
///
/// Owned by whoever constructs the clients; several clients share one
/// collector by sharing the `Arc` handed to their builders. Paths are
/// recorded exactly as passed to `get_secret`, without normalization.
#[derive(Default)]
pub struct VaultMetrics {
    state: RwLock<MetricsState>,
}

impl VaultMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn record_access(&self, path: &str) {
        let mut state = self.state.write().await;
        *state.access_count.entry(path.to_string()).or_insert(0) += 1;
        state.last_access.insert(path.to_string(), Utc::now());
    }

    pub(crate) async fn record_auth(&self, kind: AuthKind) {
        let mut state = self.state.write().await;
        match kind {
            AuthKind::Token => state.auth_methods.token += 1,
            AuthKind::AppRole => state.auth_methods.approle += 1,
            AuthKind::Kubernetes => state.auth_methods.kubernetes += 1,
        }
    }

    pub(crate) async fn record_error(&self, path: &str, error: &str) {
        let mut state = self.state.write().await;
        state.errors.push(ErrorRecord {
            timestamp: Utc::now(),
            path: path.to_string(),
            error: error.to_string(),
        });
    }

    /// Snapshot the current state. The error history is kept in full
    /// internally; only the most recent ten entries are reported.
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.read().await;
        let skip = state.errors.len().saturating_sub(RECENT_ERRORS_REPORTED);

        MetricsSnapshot {
            access_patterns: state.access_count.clone(),
            last_access: state.last_access.clone(),
            auth_method_usage: state.auth_methods,
            recent_errors: state.errors[skip..].to_vec(),
            total_requests: state.access_count.values().sum(),
        }
    }

    /// Clear all counts, timestamps and recorded errors.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        *state = MetricsState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_access_counts_attempts() {
        let metrics = VaultMetrics::new();
        metrics.record_access("/secret/data/db").await;
        metrics.record_access("/secret/data/db").await;
        metrics.record_access("/secret/data/api").await;

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.access_patterns["/secret/data/db"], 2);
        assert_eq!(snapshot.access_patterns["/secret/data/api"], 1);
        assert_eq!(snapshot.total_requests, 3);
        assert!(snapshot.last_access.contains_key("/secret/data/db"));
    }

    #[tokio::test]
    async fn test_record_auth_per_kind() {
        let metrics = VaultMetrics::new();
        metrics.record_auth(AuthKind::AppRole).await;
        metrics.record_auth(AuthKind::Token).await;
        metrics.record_auth(AuthKind::Token).await;

        let usage = metrics.snapshot().await.auth_method_usage;
        assert_eq!(usage.approle, 1);
        assert_eq!(usage.token, 2);
        assert_eq!(usage.kubernetes, 0);
    }

    #[tokio::test]
    async fn test_recent_errors_reports_last_ten() {
        let metrics = VaultMetrics::new();
        for i in 0..12 {
            metrics
                .record_error("/secret/data/db", &format!("Vault error 404: {}", i))
                .await;
        }

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.recent_errors.len(), 10);
        assert_eq!(snapshot.recent_errors[0].error, "Vault error 404: 2");
        assert_eq!(snapshot.recent_errors[9].error, "Vault error 404: 11");
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let metrics = VaultMetrics::new();
        metrics.record_access("/p").await;
        metrics.record_auth(AuthKind::Kubernetes).await;
        metrics.record_error("/p", "Vault error 500: down").await;
        metrics.reset().await;

        let snapshot = metrics.snapshot().await;
        assert!(snapshot.access_patterns.is_empty());
        assert!(snapshot.last_access.is_empty());
        assert_eq!(snapshot.auth_method_usage, AuthMethodUsage::default());
        assert!(snapshot.recent_errors.is_empty());
        assert_eq!(snapshot.total_requests, 0);
    }
}
