//! Token container and cache policy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::claims::{AccessTokenClaims, RefreshTokenClaims};

/// Source of the current time, in Unix seconds
pub trait Clock: Send + Sync {
    /// Current Unix time in seconds
    fn now(&self) -> u64;
}

/// The system clock as provided by `std::time::SystemTime`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }
}

/// How [`super::OAuthClient::get_token_container`] should obtain tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokensCachePolicy {
    /// Return the stored container as-is, failing if there is none
    Local,
    /// Return the stored container, refreshing it first if the access token expired
    LocalValid,
    /// Always refresh before returning
    LocalForceRefresh,
    /// Like `LocalValid`, creating a new account if that fails
    CreateIfNeeded,
}

/// Access and refresh tokens with their verified claims
///
/// Never mutated in place: a refresh produces a new container that replaces
/// the stored one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenContainer {
    /// Access token for API calls
    pub access_token: String,
    /// Refresh token used to mint new access tokens
    pub refresh_token: String,
    /// Verified access token claims
    pub decoded_access_token: AccessTokenClaims,
    /// Verified refresh token claims
    pub decoded_refresh_token: RefreshTokenClaims,
}

// Token values are credentials, keep them out of debug output and logs.
impl fmt::Debug for TokenContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenContainer")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("decoded_access_token", &self.decoded_access_token)
            .field("decoded_refresh_token", &self.decoded_refresh_token)
            .finish()
    }
}

impl TokenContainer {
    /// Whether the access token expiry is at or before `now`
    #[must_use]
    pub fn is_access_token_expired(&self, now: u64) -> bool {
        self.decoded_access_token.exp <= now
    }

    /// Whether the refresh token expiry is at or before `now`
    #[must_use]
    pub fn is_refresh_token_expired(&self, now: u64) -> bool {
        self.decoded_refresh_token.exp <= now
    }

    /// Get the Authorization header value
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Remaining access token validity at `now`, `None` once expired
    #[must_use]
    pub fn remaining_validity(&self, now: u64) -> Option<Duration> {
        let exp = self.decoded_access_token.exp;
        (exp > now).then(|| Duration::from_secs(exp - now))
    }
}
