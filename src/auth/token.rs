use super::{AuthKind, AuthMethod};
use crate::VaultError;
use async_trait::async_trait;

/// Static token authentication
pub struct StaticTokenAuth {
    token: String,
}

impl StaticTokenAuth {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

#[async_trait]
impl AuthMethod for StaticTokenAuth {
    async fn authenticate(&self, _address: &str) -> Result<String, VaultError> {
        Ok(self.token.clone())
    }

    fn kind(&self) -> AuthKind {
        AuthKind::Token
    }
}
