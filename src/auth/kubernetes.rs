use super::{AuthKind, AuthMethod};
use crate::VaultError;
use async_trait::async_trait;
use serde::Serialize;

const LOGIN_PATH: &str = "/v1/auth/kubernetes/login";

pub const DEFAULT_JWT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Kubernetes service account authentication
pub struct KubernetesAuth {
    pub role: String,
    pub jwt_path: String,
}

impl KubernetesAuth {
    pub fn new(role: String) -> Self {
        Self {
            role,
            jwt_path: DEFAULT_JWT_PATH.to_string(),
        }
    }

    pub fn with_jwt_path(mut self, path: String) -> Self {
        self.jwt_path = path;
        self
    }

    fn read_jwt(&self) -> Result<String, VaultError> {
        std::fs::read_to_string(&self.jwt_path)
            .map(|s| s.trim().to_string())
            .map_err(|source| VaultError::JwtRead {
                path: self.jwt_path.clone(),
                source,
            })
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    role: &'a str,
    jwt: &'a str,
}

#[async_trait]
impl AuthMethod for KubernetesAuth {
    async fn authenticate(&self, address: &str) -> Result<String, VaultError> {
        let jwt = self.read_jwt()?;

        let client = reqwest::Client::new();
        let url = format!("{}{}", address, LOGIN_PATH);

        let response = client
            .post(&url)
            .json(&LoginRequest {
                role: &self.role,
                jwt: &jwt,
            })
            .send()
            .await
            .map_err(|e| VaultError::Request(e.to_string()))?;

        let token = super::client_token(response, "Kubernetes").await?;
        tracing::debug!(role = %self.role, "Authenticated to Vault via Kubernetes");
        Ok(token)
    }

    fn kind(&self) -> AuthKind {
        AuthKind::Kubernetes
    }
}
