use crate::auth::{
    AppRoleAuth, AuthKind, AuthMethod, KubernetesAuth, StaticTokenAuth, DEFAULT_JWT_PATH,
};
use crate::error::VaultError;
use crate::mask::mask_value;
use crate::metrics::VaultMetrics;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const DEFAULT_KEY: &str = "value";

pub struct VaultClientBuilder {
    address: Option<String>,
    token: Option<String>,
    role_id: Option<String>,
    secret_id: Option<String>,
    kubernetes_role: Option<String>,
    kubernetes_token_path: Option<String>,
    log_masked: bool,
    track_metrics: bool,
    metrics: Option<Arc<VaultMetrics>>,
}

impl Default for VaultClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultClientBuilder {
    pub fn new() -> Self {
        Self {
            address: None,
            token: None,
            role_id: None,
            secret_id: None,
            kubernetes_role: None,
            kubernetes_token_path: None,
            log_masked: false,
            track_metrics: false,
            metrics: None,
        }
    }

    pub fn address(mut self, url: impl Into<String>) -> Self {
        self.address = Some(url.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn role_id(mut self, role_id: impl Into<String>) -> Self {
        self.role_id = Some(role_id.into());
        self
    }

    pub fn secret_id(mut self, secret_id: impl Into<String>) -> Self {
        self.secret_id = Some(secret_id.into());
        self
    }

    pub fn kubernetes_role(mut self, role: impl Into<String>) -> Self {
        self.kubernetes_role = Some(role.into());
        self
    }

    pub fn kubernetes_token_path(mut self, path: impl Into<String>) -> Self {
        self.kubernetes_token_path = Some(path.into());
        self
    }

    pub fn log_masked(mut self, enabled: bool) -> Self {
        self.log_masked = enabled;
        self
    }

    pub fn track_metrics(mut self, enabled: bool) -> Self {
        self.track_metrics = enabled;
        self
    }

    /// Record into an existing collector instead of a private one. Several
    /// clients pointed at the same collector share its counters.
    pub fn metrics(mut self, metrics: Arc<VaultMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<VaultClient, VaultError> {
        let address = self
            .address
            .or_else(|| std::env::var("VAULT_ADDR").ok())
            .ok_or(VaultError::AddressNotConfigured)?;

        let token = self.token.or_else(|| std::env::var("VAULT_TOKEN").ok());
        let role_id = self.role_id.or_else(|| std::env::var("VAULT_ROLE_ID").ok());
        let secret_id = self
            .secret_id
            .or_else(|| std::env::var("VAULT_SECRET_ID").ok());
        let kubernetes_role = self
            .kubernetes_role
            .or_else(|| std::env::var("VAULT_K8S_ROLE").ok());
        let jwt_path = self
            .kubernetes_token_path
            .or_else(|| std::env::var("VAULT_K8S_TOKEN_PATH").ok())
            .unwrap_or_else(|| DEFAULT_JWT_PATH.to_string());

        let log_masked = self.log_masked || env_flag("VAULT_LOG_MASKED");
        let track_metrics = self.track_metrics || env_flag("VAULT_TRACK_METRICS");

        // Static token beats AppRole beats Kubernetes.
        let auth: Arc<dyn AuthMethod> = if let Some(token) = token {
            Arc::new(StaticTokenAuth::new(token))
        } else if let (Some(role_id), Some(secret_id)) = (role_id, secret_id) {
            Arc::new(AppRoleAuth::new(role_id, secret_id))
        } else if let Some(role) = kubernetes_role {
            Arc::new(KubernetesAuth::new(role).with_jwt_path(jwt_path))
        } else {
            return Err(VaultError::NoAuthMethod);
        };

        let metrics = match (self.metrics, track_metrics) {
            (Some(metrics), _) => Some(metrics),
            (None, true) => Some(Arc::new(VaultMetrics::new())),
            (None, false) => None,
        };

        Ok(VaultClient {
            address,
            auth,
            token: RwLock::new(None),
            log_masked,
            metrics,
        })
    }
}

pub struct VaultClient {
    address: String,
    auth: Arc<dyn AuthMethod>,
    token: RwLock<Option<String>>,
    log_masked: bool,
    metrics: Option<Arc<VaultMetrics>>,
}

impl VaultClient {
    pub fn builder() -> VaultClientBuilder {
        VaultClientBuilder::new()
    }

    pub fn from_env() -> Result<Self, VaultError> {
        VaultClientBuilder::new().build()
    }

    /// The metrics collector, if metrics are enabled for this client.
    pub fn metrics(&self) -> Option<&Arc<VaultMetrics>> {
        self.metrics.as_ref()
    }

    /// Return the bearer token, logging in on first use.
    ///
    /// A memoized token is reused for the life of the client; there is no
    /// expiry or re-authentication on a later 401. A failed login caches
    /// nothing, so the next call runs the login again.
    pub async fn get_token(&self) -> Result<String, VaultError> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if let Some(metrics) = &self.metrics {
                    metrics.record_auth(AuthKind::Token).await;
                }
                return Ok(token.clone());
            }
        }

        // Counted before the login attempt, so failed logins show up too.
        if let Some(metrics) = &self.metrics {
            metrics.record_auth(self.auth.kind()).await;
        }

        let token = self.auth.authenticate(&self.address).await?;
        let mut cached = self.token.write().await;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Read one value from a secret at the given store-relative path.
    ///
    /// Accepts both KV v2 (`data.data[key]`) and KV v1 (`data[key]`)
    /// response shapes.
    pub async fn get_secret(&self, path: &str, key: &str) -> Result<serde_json::Value, VaultError> {
        let token = self.get_token().await?;

        // Attempts are recorded before the request, whatever its outcome.
        if let Some(metrics) = &self.metrics {
            metrics.record_access(path).await;
        }

        let client = reqwest::Client::new();
        let url = format!("{}{}", self.address, path);

        let response = client
            .get(&url)
            .header("X-Vault-Token", token.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| VaultError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            let error = VaultError::SecretFetch { status, message };
            if let Some(metrics) = &self.metrics {
                metrics.record_error(path, &error.to_string()).await;
            }
            return Err(error);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VaultError::Request(format!("Invalid response: {}", e)))?;

        let value = lookup_key(&body, key).ok_or_else(|| VaultError::KeyNotFound {
            path: path.to_string(),
            key: key.to_string(),
        })?;

        if self.log_masked {
            if let Some(rendered) = render_for_log(&value) {
                tracing::info!(
                    path = %path,
                    key = %key,
                    value = %mask_value(&rendered),
                    "Loaded secret"
                );
            }
        }

        Ok(value)
    }

    /// Resolve a mapping of output name to `"path"` or `"path:key"`
    /// specifier, one entry at a time.
    ///
    /// Entries failing individually do not stop the pass, but any failure
    /// fails the whole call with the collected per-entry messages; the
    /// caller never sees a partial result. Null and empty values are
    /// omitted rather than treated as errors.
    pub async fn load_secrets(
        &self,
        mapping: &HashMap<String, String>,
    ) -> Result<HashMap<String, serde_json::Value>, VaultError> {
        let mut results = HashMap::new();
        let mut errors = Vec::new();

        for (name, spec) in mapping {
            let (path, key) = split_specifier(spec);
            match self.get_secret(path, key).await {
                Ok(value) => {
                    if !is_empty_value(&value) {
                        results.insert(name.clone(), value);
                    }
                }
                Err(err) => errors.push(format!("Failed to load {} from {}: {}", name, spec, err)),
            }
        }

        if !errors.is_empty() {
            return Err(VaultError::BatchLoad { errors });
        }

        Ok(results)
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "true").unwrap_or(false)
}

/// Split a specifier on its last colon, so paths may themselves contain
/// colons. A bare path reads the default key.
fn split_specifier(spec: &str) -> (&str, &str) {
    spec.rsplit_once(':').unwrap_or((spec, DEFAULT_KEY))
}

/// KV v2 nests the secret map one `data` level deeper than KV v1; a key
/// present with a null value still counts as found.
fn lookup_key(body: &serde_json::Value, key: &str) -> Option<serde_json::Value> {
    if let Some(value) = body
        .get("data")
        .and_then(|data| data.get("data"))
        .and_then(|data| data.get(key))
    {
        return Some(value.clone());
    }
    body.get("data").and_then(|data| data.get(key)).cloned()
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    value.is_null() || value.as_str() == Some("")
}

fn render_for_log(value: &serde_json::Value) -> Option<String> {
    let rendered = match value.as_str() {
        Some(s) => s.to_string(),
        None if value.is_null() => return None,
        None => value.to_string(),
    };
    if rendered.is_empty() {
        None
    } else {
        Some(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let builder = VaultClientBuilder::new();
        assert!(builder.address.is_none());
        assert!(builder.token.is_none());
        assert!(!builder.log_masked);
        assert!(!builder.track_metrics);
    }

    #[test]
    fn test_builder_chain() {
        let builder = VaultClientBuilder::new()
            .address("http://vault:8200")
            .role_id("my-role")
            .secret_id("my-secret")
            .log_masked(true);

        assert_eq!(builder.address, Some("http://vault:8200".to_string()));
        assert_eq!(builder.role_id, Some("my-role".to_string()));
        assert_eq!(builder.secret_id, Some("my-secret".to_string()));
        assert!(builder.log_masked);
    }

    #[test]
    fn test_split_specifier_bare_path() {
        assert_eq!(split_specifier("/secret/data/db"), ("/secret/data/db", "value"));
    }

    #[test]
    fn test_split_specifier_path_and_key() {
        assert_eq!(
            split_specifier("/secret/data/db:password"),
            ("/secret/data/db", "password")
        );
    }

    #[test]
    fn test_split_specifier_last_colon_wins() {
        assert_eq!(split_specifier("a:b:custom"), ("a:b", "custom"));
    }

    #[test]
    fn test_lookup_key_kv2_shape() {
        let body = json!({"data": {"data": {"password": "hunter2"}}});
        assert_eq!(lookup_key(&body, "password"), Some(json!("hunter2")));
    }

    #[test]
    fn test_lookup_key_kv1_shape() {
        let body = json!({"data": {"password": "hunter2"}});
        assert_eq!(lookup_key(&body, "password"), Some(json!("hunter2")));
    }

    #[test]
    fn test_lookup_key_null_value_counts_as_found() {
        let body = json!({"data": {"data": {"password": null}}});
        assert_eq!(lookup_key(&body, "password"), Some(json!(null)));
    }

    #[test]
    fn test_lookup_key_missing() {
        let body = json!({"data": {"data": {"username": "admin"}}});
        assert_eq!(lookup_key(&body, "password"), None);
    }

    #[test]
    fn test_is_empty_value() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("")));
        assert!(!is_empty_value(&json!("x")));
        assert!(!is_empty_value(&json!(0)));
    }

    #[test]
    fn test_render_for_log() {
        assert_eq!(render_for_log(&json!("hunter2")), Some("hunter2".to_string()));
        assert_eq!(render_for_log(&json!(42)), Some("42".to_string()));
        assert_eq!(render_for_log(&json!(null)), None);
        assert_eq!(render_for_log(&json!("")), None);
    }
}
