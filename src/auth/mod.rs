//! Subscription OAuth authentication
//!
//! Implements the Authorization Code flow with PKCE against the subscription
//! auth API and manages the resulting token pair.
//!
//! # Overview
//!
//! [`OAuthClient`] is the entry point. Callers ask it for a [`TokenContainer`]
//! under a [`TokensCachePolicy`]:
//!
//! - `Local` returns whatever is stored
//! - `LocalValid` refreshes first if the access token has expired
//! - `LocalForceRefresh` always refreshes
//! - `CreateIfNeeded` falls back to creating a new account
//!
//! Before any policy runs, a token left in the [`LegacyTokenStore`] is
//! exchanged for a new container. Migration never fails the call.
//!
//! The client talks to the network only through [`AuthTransport`]
//! ([`HttpAuthTransport`] is the HTTP implementation) and persists through
//! [`TokenStore`]. Token signatures are checked by a [`TokenVerifier`]
//! supplied by the host application.
//!
//! # Example
//!
//! ```no_run
//! use browser_services_kit::auth::{
//!     HttpAuthTransport, InMemoryTokenStore, OAuthClient, OAuthConfig, TokenVerifier,
//!     TokensCachePolicy,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(verifier: Arc<dyn TokenVerifier>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = OAuthConfig::from_env();
//! let transport = Arc::new(HttpAuthTransport::new(config.clone())?);
//! let client = OAuthClient::builder(transport, Arc::new(InMemoryTokenStore::new()), verifier)
//!     .config(config)
//!     .build();
//!
//! let tokens = client.get_token_container(TokensCachePolicy::CreateIfNeeded).await?;
//! println!("Authorization: {}", tokens.authorization_header());
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! [`OAuthClientError::requires_reauthentication`] separates failures the user
//! has to resolve by signing in again (missing or dead tokens) from temporary
//! ones (network, server errors).

mod claims;
mod client;
mod config;
mod http;
mod pkce;
mod service;
mod storage;
mod token;

pub use claims::{
    AccessTokenClaims, Entitlement, EntitlementProduct, Jwk, JwkSet, RefreshTokenClaims,
    TokenVerifier, VerificationError, decode_access_token, decode_refresh_token,
};
pub use client::{
    AuthResult, EmailLoginSession, OAuthClient, OAuthClientBuilder, OAuthClientError,
};
pub use config::{ACCESS_TOKEN_SCOPE, OAuthConfig, OAuthEnvironment, REFRESH_TOKEN_SCOPE};
pub use http::HttpAuthTransport;
pub use pkce::PkceChallenge;
pub use service::{
    ApiErrorCode, AuthTransport, LoginMethod, OAuthServiceError, ServiceResult, TokenPair,
};
pub use storage::{
    InMemoryLegacyTokenStore, InMemoryTokenStore, LegacyTokenStore, StorageError, TokenStore,
};
pub use token::{Clock, SystemClock, TokenContainer, TokensCachePolicy};
