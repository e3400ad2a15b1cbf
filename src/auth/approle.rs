use super::{AuthKind, AuthMethod};
use crate::VaultError;
use async_trait::async_trait;
use serde::Serialize;

const LOGIN_PATH: &str = "/v1/auth/approle/login";

/// AppRole authentication
pub struct AppRoleAuth {
    pub role_id: String,
    pub secret_id: String,
}

impl AppRoleAuth {
    pub fn new(role_id: String, secret_id: String) -> Self {
        Self { role_id, secret_id }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    role_id: &'a str,
    secret_id: &'a str,
}

#[async_trait]
impl AuthMethod for AppRoleAuth {
    async fn authenticate(&self, address: &str) -> Result<String, VaultError> {
        let client = reqwest::Client::new();
        let url = format!("{}{}", address, LOGIN_PATH);

        let response = client
            .post(&url)
            .json(&LoginRequest {
                role_id: &self.role_id,
                secret_id: &self.secret_id,
            })
            .send()
            .await
            .map_err(|e| VaultError::Request(e.to_string()))?;

        let token = super::client_token(response, "AppRole").await?;
        tracing::debug!("Authenticated to Vault via AppRole");
        Ok(token)
    }

    fn kind(&self) -> AuthKind {
        AuthKind::AppRole
    }
}
