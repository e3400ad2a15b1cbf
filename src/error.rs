use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Vault address not configured: VAULT_ADDR not set")]
    AddressNotConfigured,

    #[error("No valid auth method configured")]
    NoAuthMethod,

    #[error("Vault {method} login failed {status}: {message}")]
    LoginFailed {
        method: &'static str,
        status: u16,
        message: String,
    },

    #[error("No client_token in Vault login response")]
    MissingClientToken,

    #[error("Failed to read service account JWT from {path}: {source}")]
    JwtRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Vault error {status}: {message}")]
    SecretFetch { status: u16, message: String },

    #[error("Secret key \"{key}\" not found at {path}")]
    KeyNotFound { path: String, key: String },

    #[error("One or more secrets failed to load")]
    BatchLoad { errors: Vec<String> },

    #[error("Vault request error: {0}")]
    Request(String),
}
