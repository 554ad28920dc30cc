//! # Browser Services Kit
//!
//! Client-side services shared by the browser apps: subscription
//! authentication and remote message selection.
//! Async/await, strong typing, tokio-based.
//!
//! ## Quick Start
//!
//! Get a valid access token, creating an account on first use:
//!
//! ```no_run
//! use browser_services_kit::auth::{
//!     HttpAuthTransport, InMemoryTokenStore, OAuthClient, OAuthConfig, TokenVerifier,
//!     TokensCachePolicy,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(verifier: Arc<dyn TokenVerifier>) -> browser_services_kit::Result<()> {
//! let config = OAuthConfig::from_env();
//! config.validate()?;
//!
//! let transport = Arc::new(HttpAuthTransport::new(config.clone())?);
//! let client = OAuthClient::builder(transport, Arc::new(InMemoryTokenStore::new()), verifier)
//!     .config(config)
//!     .build();
//!
//! let tokens = client
//!     .get_token_container(TokensCachePolicy::CreateIfNeeded)
//!     .await?;
//! println!("Signed in as {}", tokens.decoded_access_token.sub);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`auth`]: OAuth 2.0 + PKCE client and token lifecycle
//! - [`remote_messaging`]: remote message rules and selection
//! - [`error`]: crate-wide error type
//! - [`utils`]: string helpers
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Tracing events are always emitted but are zero-cost when no subscriber is attached.
//! Token values are never logged. To see logs, attach a tracing subscriber in your
//! application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Error Handling
//!
//! Each subsystem returns its own error type. [`Error`] wraps them all:
//!
//! ```no_run
//! # use browser_services_kit::auth::{OAuthClient, TokensCachePolicy};
//! # async fn example(client: &OAuthClient) {
//! match client.get_token_container(TokensCachePolicy::LocalValid).await {
//!     Ok(tokens) => { /* ... */ }
//!     Err(e) if e.requires_reauthentication() => {
//!         eprintln!("Please sign in again: {e}");
//!     }
//!     Err(e) => {
//!         eprintln!("Temporary failure: {e}");
//!     }
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod error;
pub mod remote_messaging;
pub mod utils;

// Re-export commonly used types
pub use auth::{OAuthClient, OAuthConfig, TokenContainer, TokensCachePolicy};
pub use error::{Error, Result};
pub use remote_messaging::{RemoteMessagingConfigMatcher, RemoteMessagingConfigProcessor};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
