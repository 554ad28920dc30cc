//! JWT claim models and the signature verification seam
//!
//! Signature checking itself is delegated to a [`TokenVerifier`]. This module
//! turns the verified payload into typed claims and enforces the scope
//! invariants of access and refresh tokens.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config::{ACCESS_TOKEN_SCOPE, REFRESH_TOKEN_SCOPE};

/// Errors raised while verifying or decoding a token
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The verifier rejected the token signature or structure
    #[error("Token signature verification failed: {0}")]
    Signature(String),

    /// The payload did not decode into the expected claims
    #[error("Invalid token claims: {0}")]
    Claims(#[from] serde_json::Error),

    /// The token carries a scope other than the one required
    #[error("Unexpected token scope: expected {expected}, got {actual}")]
    ScopeMismatch {
        /// Scope that was required
        expected: &'static str,
        /// Scope found in the token
        actual: String,
    },
}

impl VerificationError {
    /// Create a signature verification error
    pub fn signature(msg: impl Into<String>) -> Self {
        Self::Signature(msg.into())
    }
}

/// A single JSON Web Key as published by the auth server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (`RSA`, `EC`, ...)
    pub kty: String,
    /// Key id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Signing algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Intended use (`sig`)
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// RSA modulus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// EC curve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// EC x coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// EC y coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// Published signing keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// Keys in the set
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Look a key up by id
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }
}

/// Signature verification primitive
///
/// Implementations check `token` against `keys` and return the verified
/// payload. Claim typing and scope checks happen in this crate.
pub trait TokenVerifier: Send + Sync {
    /// Verify `token` and return its payload
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::Signature`] if the token cannot be verified.
    fn verify(&self, token: &str, keys: &JwkSet) -> Result<serde_json::Value, VerificationError>;
}

/// Subscription products an entitlement may grant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntitlementProduct {
    /// VPN
    NetworkProtection,
    /// Personal information removal
    DataBrokerProtection,
    /// Identity theft restoration (US)
    IdentityTheftRestoration,
    /// Identity theft restoration (outside the US)
    IdentityTheftRestorationGlobal,
    /// Paid AI chat
    PaidAiChat,
    /// A product this version does not know about
    Unknown,
}

impl EntitlementProduct {
    /// Product name as it appears in token claims
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkProtection => "Network Protection",
            Self::DataBrokerProtection => "Data Broker Protection",
            Self::IdentityTheftRestoration => "Identity Theft Restoration",
            Self::IdentityTheftRestorationGlobal => "Global Identity Theft Restoration",
            Self::PaidAiChat => "Duck.ai",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for EntitlementProduct {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Network Protection" => Self::NetworkProtection,
            "Data Broker Protection" => Self::DataBrokerProtection,
            "Identity Theft Restoration" => Self::IdentityTheftRestoration,
            "Global Identity Theft Restoration" => Self::IdentityTheftRestorationGlobal,
            "Duck.ai" => Self::PaidAiChat,
            _ => Self::Unknown,
        }
    }
}

impl From<EntitlementProduct> for String {
    fn from(product: EntitlementProduct) -> Self {
        product.as_str().to_string()
    }
}

/// Entitlement granted to the account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entitlement {
    /// Product the entitlement is for
    pub product: EntitlementProduct,
    /// Entitlement name, usually `subscriber`
    pub name: String,
}

/// Claims of a subscription access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Expiry, Unix seconds
    pub exp: u64,
    /// Issued at, Unix seconds
    #[serde(default)]
    pub iat: Option<u64>,
    /// Subject
    pub sub: String,
    /// Scope
    pub scope: String,
    /// External account id
    #[serde(default)]
    pub external_id: Option<String>,
    /// Account email, if one is attached
    #[serde(default)]
    pub email: Option<String>,
    /// Granted entitlements
    #[serde(default)]
    pub entitlements: Vec<Entitlement>,
}

impl AccessTokenClaims {
    /// Whether any entitlement grants `product`
    #[must_use]
    pub fn has_entitlement(&self, product: &EntitlementProduct) -> bool {
        self.entitlements.iter().any(|e| &e.product == product)
    }
}

/// Claims of a refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// Expiry, Unix seconds
    pub exp: u64,
    /// Subject
    #[serde(default)]
    pub sub: Option<String>,
    /// Scope
    pub scope: String,
}

/// Verify `token` and decode it as access token claims
///
/// # Errors
///
/// Fails if verification fails, the payload is malformed, or the scope is not
/// the access token scope.
pub fn decode_access_token(
    verifier: &dyn TokenVerifier,
    token: &str,
    keys: &JwkSet,
) -> Result<AccessTokenClaims, VerificationError> {
    let claims: AccessTokenClaims = serde_json::from_value(verifier.verify(token, keys)?)?;
    check_scope(ACCESS_TOKEN_SCOPE, &claims.scope)?;
    Ok(claims)
}

/// Verify `token` and decode it as refresh token claims
///
/// # Errors
///
/// Fails if verification fails, the payload is malformed, or the scope is not
/// the refresh token scope.
pub fn decode_refresh_token(
    verifier: &dyn TokenVerifier,
    token: &str,
    keys: &JwkSet,
) -> Result<RefreshTokenClaims, VerificationError> {
    let claims: RefreshTokenClaims = serde_json::from_value(verifier.verify(token, keys)?)?;
    check_scope(REFRESH_TOKEN_SCOPE, &claims.scope)?;
    Ok(claims)
}

fn check_scope(expected: &'static str, actual: &str) -> Result<(), VerificationError> {
    if actual == expected {
        Ok(())
    } else {
        Err(VerificationError::ScopeMismatch {
            expected,
            actual: actual.to_string(),
        })
    }
}
