//! Token persistence seams
//!
//! Persistence itself lives outside this crate (keychain, user defaults, ...).
//! [`OAuthClient`](super::OAuthClient) only sees these traits. The in-memory
//! implementations back tests and short-lived processes.

use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use super::token::TokenContainer;

/// Errors reported by a token store
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store could not be read
    #[error("Failed to read token store: {0}")]
    Read(String),

    /// The backing store could not be written
    #[error("Failed to write token store: {0}")]
    Write(String),

    /// Stored data did not decode
    #[error("Stored token data is invalid: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Store for the current [`TokenContainer`]
///
/// Last writer wins; the client does not assume atomicity across a
/// read-decide-write sequence.
pub trait TokenStore: Send + Sync {
    /// Load the stored container
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self) -> Result<Option<TokenContainer>, StorageError>;

    /// Replace the stored container, `None` clears it
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, container: Option<TokenContainer>) -> Result<(), StorageError>;
}

/// Store for a pre-migration access token
pub trait LegacyTokenStore: Send + Sync {
    /// Load the legacy access token
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self) -> Result<Option<String>, StorageError>;

    /// Replace the legacy access token, `None` clears it
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, token: Option<String>) -> Result<(), StorageError>;
}

/// In-memory [`TokenStore`]
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    container: Mutex<Option<TokenContainer>>,
}

impl InMemoryTokenStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `container`
    #[must_use]
    pub fn with_container(container: TokenContainer) -> Self {
        Self {
            container: Mutex::new(Some(container)),
        }
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self) -> Result<Option<TokenContainer>, StorageError> {
        Ok(self
            .container
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set(&self, container: Option<TokenContainer>) -> Result<(), StorageError> {
        *self.container.lock().unwrap_or_else(PoisonError::into_inner) = container;
        Ok(())
    }
}

/// In-memory [`LegacyTokenStore`]
#[derive(Debug, Default)]
pub struct InMemoryLegacyTokenStore {
    token: Mutex<Option<String>>,
}

impl InMemoryLegacyTokenStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding a legacy access token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl LegacyTokenStore for InMemoryLegacyTokenStore {
    fn get(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set(&self, token: Option<String>) -> Result<(), StorageError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
        Ok(())
    }
}
