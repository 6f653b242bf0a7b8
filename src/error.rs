use thiserror::Error;

/// Errors that can occur while reading or writing repository content
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Content not found: {path}")]
    NotFound { path: String },

    #[error("Rate limited by remote service: {message}")]
    RateLimited {
        message: String,
        /// Epoch seconds at which the remote quota resets, when reported
        reset_at: Option<u64>,
    },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid credential format: {reason}")]
    InvalidCredentialFormat { reason: String },

    #[error("Remote rejected request ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Contents API returned {path} with unsupported encoding '{encoding}'")]
    UnsupportedEncoding { path: String, encoding: String },

    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Unknown resource: {name}")]
    UnknownResource { name: String },

    #[error("Record {id} not found in {resource}")]
    RecordNotFound { resource: String, id: u64 },

    #[error("{name} is not a collection resource")]
    NotACollection { name: String },

    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },
}

impl StoreError {
    /// Stale revision markers come back as 409 or 422
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::RemoteRejected {
                status: 409 | 422,
                ..
            }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, StoreError::RateLimited { .. })
    }
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
