mod approle;
mod kubernetes;
mod token;

pub use approle::AppRoleAuth;
pub use kubernetes::{KubernetesAuth, DEFAULT_JWT_PATH};
pub use token::StaticTokenAuth;

use crate::VaultError;
use async_trait::async_trait;
use serde::Deserialize;

/// Which login strategy a client was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Token,
    AppRole,
    Kubernetes,
}

/// Trait for authentication methods
#[async_trait]
pub trait AuthMethod: Send + Sync {
    /// Exchange the configured credentials for a client token.
    async fn authenticate(&self, address: &str) -> Result<String, VaultError>;

    fn kind(&self) -> AuthKind;
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: Option<LoginAuth>,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: Option<String>,
}

/// Shared handling of a login response: non-2xx fails with the store's
/// status and body, a 2xx body must carry `auth.client_token`.
async fn client_token(
    response: reqwest::Response,
    method: &'static str,
) -> Result<String, VaultError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        return Err(VaultError::LoginFailed {
            method,
            status,
            message,
        });
    }

    let login: LoginResponse = response
        .json()
        .await
        .map_err(|e| VaultError::Request(format!("Invalid login response: {}", e)))?;

    login
        .auth
        .and_then(|auth| auth.client_token)
        .ok_or(VaultError::MissingClientToken)
}
