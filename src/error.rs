//! Error types for Browser Services Kit

use thiserror::Error;

use crate::auth::{OAuthClientError, OAuthServiceError};
use crate::remote_messaging::ConfigError;

/// Main error type for Browser Services Kit
///
/// Each subsystem has its own error enum; this type wraps them for callers
/// that use several subsystems through one `?` chain.
#[derive(Error, Debug)]
pub enum Error {
    /// Token lifecycle failure
    #[error("Authentication error: {0}")]
    Auth(#[from] OAuthClientError),

    /// Auth API failure outside the token lifecycle
    #[error("Auth service error: {0}")]
    Service(#[from] OAuthServiceError),

    /// Remote messaging configuration could not be decoded
    #[error(transparent)]
    RemoteConfig(#[from] ConfigError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for Browser Services Kit operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether the user has to sign in again to recover
    #[must_use]
    pub fn requires_reauthentication(&self) -> bool {
        match self {
            Self::Auth(e) => e.requires_reauthentication(),
            Self::Service(e) => e.is_dead_token(),
            Self::RemoteConfig(_) | Self::InvalidConfig(_) => false,
        }
    }
}
