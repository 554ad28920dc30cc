//! Auth transport contract
//!
//! [`AuthTransport`] performs the individual OAuth protocol operations. The
//! token manager composes them; it never talks HTTP directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::claims::JwkSet;

/// Error codes reported in auth API error bodies
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ApiErrorCode {
    /// `invalid_authorization_request`
    InvalidAuthorizationRequest,
    /// `authorization_failed`
    AuthorizationFailed,
    /// `invalid_request`
    InvalidRequest,
    /// `account_create_failed`
    AccountCreateFailed,
    /// `invalid_email_address`
    InvalidEmailAddress,
    /// `invalid_session_id`
    InvalidSessionId,
    /// `suspended_account`
    SuspendedAccount,
    /// `email_sending_error`
    EmailSendingError,
    /// `invalid_login_credentials`
    InvalidLoginCredentials,
    /// `unknown_account`
    UnknownAccount,
    /// `invalid_token_request`: the refresh token is dead
    InvalidTokenRequest,
    /// `unverified_account`
    UnverifiedAccount,
    /// `invalid_token`
    InvalidToken,
    /// `expired_token`
    ExpiredToken,
    /// Any code this version does not know
    Other(String),
}

impl ApiErrorCode {
    /// Parse the `error` field of an error body
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code {
            "invalid_authorization_request" => Self::InvalidAuthorizationRequest,
            "authorization_failed" => Self::AuthorizationFailed,
            "invalid_request" => Self::InvalidRequest,
            "account_create_failed" => Self::AccountCreateFailed,
            "invalid_email_address" => Self::InvalidEmailAddress,
            "invalid_session_id" => Self::InvalidSessionId,
            "suspended_account" => Self::SuspendedAccount,
            "email_sending_error" => Self::EmailSendingError,
            "invalid_login_credentials" => Self::InvalidLoginCredentials,
            "unknown_account" => Self::UnknownAccount,
            "invalid_token_request" => Self::InvalidTokenRequest,
            "unverified_account" => Self::UnverifiedAccount,
            "invalid_token" => Self::InvalidToken,
            "expired_token" => Self::ExpiredToken,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire representation of the code
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidAuthorizationRequest => "invalid_authorization_request",
            Self::AuthorizationFailed => "authorization_failed",
            Self::InvalidRequest => "invalid_request",
            Self::AccountCreateFailed => "account_create_failed",
            Self::InvalidEmailAddress => "invalid_email_address",
            Self::InvalidSessionId => "invalid_session_id",
            Self::SuspendedAccount => "suspended_account",
            Self::EmailSendingError => "email_sending_error",
            Self::InvalidLoginCredentials => "invalid_login_credentials",
            Self::UnknownAccount => "unknown_account",
            Self::InvalidTokenRequest => "invalid_token_request",
            Self::UnverifiedAccount => "unverified_account",
            Self::InvalidToken => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while talking to the auth API
#[derive(Debug, Error)]
pub enum OAuthServiceError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The server answered with a status the operation does not expect
    #[error("Unexpected status code {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The server reported an API error
    #[error("Auth API error {code}: {}", description.as_deref().unwrap_or("no description"))]
    Api {
        /// Error code
        code: ApiErrorCode,
        /// Optional human readable description
        description: Option<String>,
    },

    /// A required part of the response was missing
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OAuthServiceError {
    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create an API error without description
    #[must_use]
    pub fn api(code: ApiErrorCode) -> Self {
        Self::Api {
            code,
            description: None,
        }
    }

    /// The API error code, if this is an API error
    #[must_use]
    pub fn api_code(&self) -> Option<&ApiErrorCode> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the server declared the token used in the request permanently invalid
    #[must_use]
    pub fn is_dead_token(&self) -> bool {
        matches!(self.api_code(), Some(ApiErrorCode::InvalidTokenRequest))
    }
}

impl From<reqwest::Error> for OAuthServiceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

/// Result type for auth API operations
pub type ServiceResult<T> = Result<T, OAuthServiceError>;

/// Raw token pair returned by the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token (JWT)
    pub access_token: String,
    /// Refresh token (JWT)
    pub refresh_token: String,
}

/// Credentials presented at login
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum LoginMethod {
    /// Purchase signature from the platform store
    Signature {
        /// Signed purchase receipt
        signature: String,
        /// Store that produced the signature
        source: String,
    },
    /// One-time password sent by email
    Otp {
        /// Account email
        email: String,
        /// Code received by email
        otp: String,
    },
}

impl LoginMethod {
    /// App Store purchase signature
    pub fn app_store_signature(signature: impl Into<String>) -> Self {
        Self::Signature {
            signature: signature.into(),
            source: "apple_app_store".to_string(),
        }
    }
}

/// The OAuth v2 operations the token manager builds on
#[async_trait]
pub trait AuthTransport: Send + Sync {
    /// Start an authorization session bound to `code_challenge`, returning its session id
    async fn authorize(&self, code_challenge: &str) -> ServiceResult<String>;

    /// Create a new account in the session, returning an authorization code
    async fn create_account(&self, session_id: &str) -> ServiceResult<String>;

    /// Send a one-time password to `email` for the session
    async fn request_otp(&self, session_id: &str, email: &str) -> ServiceResult<()>;

    /// Log into an existing account, returning an authorization code
    async fn login(&self, session_id: &str, method: &LoginMethod) -> ServiceResult<String>;

    /// Redeem an authorization code for tokens
    async fn get_access_token(
        &self,
        client_id: &str,
        code_verifier: &str,
        code: &str,
        redirect_uri: &str,
    ) -> ServiceResult<TokenPair>;

    /// Mint new tokens from a refresh token
    async fn refresh_access_token(
        &self,
        client_id: &str,
        refresh_token: &str,
    ) -> ServiceResult<TokenPair>;

    /// Exchange a legacy access token for an authorization code
    async fn exchange_token(
        &self,
        legacy_access_token: &str,
        session_id: &str,
    ) -> ServiceResult<String>;

    /// Revoke the session behind `access_token`
    async fn logout(&self, access_token: &str) -> ServiceResult<()>;

    /// Fetch the published signing keys
    async fn get_signing_keys(&self) -> ServiceResult<JwkSet>;
}
