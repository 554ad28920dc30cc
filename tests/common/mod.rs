//! Shared fixtures for integration tests
//!
//! Test tokens are unsigned JWT-shaped strings: `header.payload.signature`
//! with a base64url JSON payload. [`UnsignedVerifier`] accepts them unless the
//! signature segment is `bad`.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use browser_services_kit::auth::{
    AccessTokenClaims, AuthTransport, Clock, JwkSet, LoginMethod, OAuthServiceError,
    RefreshTokenClaims, ServiceResult, TokenContainer, TokenPair, TokenVerifier,
    VerificationError,
};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Send library logs to the test output, filtered by `RUST_LOG`
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // Several tests share one process; only the first install wins
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Fixed "current time" used by all tests
pub const NOW: u64 = 1_700_000_000;

/// Build an unsigned test token around `claims`
pub fn make_jwt(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

pub fn access_claims(sub: &str, exp: u64) -> Value {
    json!({
        "exp": exp,
        "iat": exp.saturating_sub(14_400),
        "sub": sub,
        "scope": "privacypro",
        "entitlements": [{"product": "Network Protection", "name": "subscriber"}]
    })
}

pub fn refresh_claims(sub: &str) -> Value {
    json!({"exp": NOW + 30 * 86_400, "sub": sub, "scope": "refresh"})
}

/// Token pair for `sub` whose access token expires at `exp`
pub fn token_pair(sub: &str, exp: u64) -> TokenPair {
    TokenPair {
        access_token: make_jwt(&access_claims(sub, exp)),
        refresh_token: make_jwt(&refresh_claims(sub)),
    }
}

/// Stored container for `sub` whose access token expires at `exp`
pub fn container(sub: &str, exp: u64) -> TokenContainer {
    let pair = token_pair(sub, exp);
    let decoded_access_token: AccessTokenClaims =
        serde_json::from_value(access_claims(sub, exp)).unwrap();
    let decoded_refresh_token: RefreshTokenClaims =
        serde_json::from_value(refresh_claims(sub)).unwrap();
    TokenContainer {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        decoded_access_token,
        decoded_refresh_token,
    }
}

pub fn valid_container(sub: &str) -> TokenContainer {
    container(sub, NOW + 3_600)
}

pub fn expired_container(sub: &str) -> TokenContainer {
    container(sub, NOW - 1)
}

/// Clock frozen at [`NOW`], movable by tests
#[derive(Debug)]
pub struct FixedClock(AtomicU64);

impl FixedClock {
    pub fn new() -> Self {
        Self(AtomicU64::new(NOW))
    }

    pub fn advance(&self, seconds: u64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Verifier for [`make_jwt`] tokens
#[derive(Debug, Default)]
pub struct UnsignedVerifier;

impl TokenVerifier for UnsignedVerifier {
    fn verify(&self, token: &str, _keys: &JwkSet) -> Result<Value, VerificationError> {
        let mut parts = token.split('.');
        let (Some(_), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VerificationError::signature("malformed token"));
        };
        if signature == "bad" {
            return Err(VerificationError::signature("signature mismatch"));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| VerificationError::signature(e.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Scriptable [`AuthTransport`] that records every call
///
/// Unscripted calls succeed. Authorization codes name the flow that produced
/// them (`created`, `exchanged`, `logged-in`) and become the subject of the
/// issued access token, so tests can tell where a container came from.
#[derive(Default)]
pub struct MockTransport {
    calls: Mutex<Vec<&'static str>>,
    refresh_results: Mutex<VecDeque<ServiceResult<TokenPair>>>,
    token_results: Mutex<VecDeque<ServiceResult<TokenPair>>>,
    create_account_errors: Mutex<VecDeque<OAuthServiceError>>,
    exchange_errors: Mutex<VecDeque<OAuthServiceError>>,
    logout_errors: Mutex<VecDeque<OAuthServiceError>>,
    refresh_delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of calls made to `method`
    pub fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| **m == method)
            .count()
    }

    /// Every call in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn push_refresh(&self, result: ServiceResult<TokenPair>) {
        self.refresh_results.lock().unwrap().push_back(result);
    }

    pub fn push_token(&self, result: ServiceResult<TokenPair>) {
        self.token_results.lock().unwrap().push_back(result);
    }

    pub fn fail_create_account(&self, error: OAuthServiceError) {
        self.create_account_errors.lock().unwrap().push_back(error);
    }

    pub fn fail_exchange(&self, error: OAuthServiceError) {
        self.exchange_errors.lock().unwrap().push_back(error);
    }

    pub fn fail_logout(&self, error: OAuthServiceError) {
        self.logout_errors.lock().unwrap().push_back(error);
    }

    pub fn delay_refresh(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = Some(delay);
    }

    fn record(&self, method: &'static str) {
        self.calls.lock().unwrap().push(method);
    }
}

#[async_trait]
impl AuthTransport for MockTransport {
    async fn authorize(&self, code_challenge: &str) -> ServiceResult<String> {
        self.record("authorize");
        assert!(!code_challenge.is_empty());
        Ok("session-1".to_string())
    }

    async fn create_account(&self, session_id: &str) -> ServiceResult<String> {
        self.record("create_account");
        assert_eq!(session_id, "session-1");
        match self.create_account_errors.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok("created".to_string()),
        }
    }

    async fn request_otp(&self, session_id: &str, email: &str) -> ServiceResult<()> {
        self.record("request_otp");
        assert_eq!(session_id, "session-1");
        assert!(email.contains('@'));
        Ok(())
    }

    async fn login(&self, session_id: &str, method: &LoginMethod) -> ServiceResult<String> {
        self.record("login");
        assert_eq!(session_id, "session-1");
        match method {
            LoginMethod::Otp { otp, .. } if otp != "123456" => Err(OAuthServiceError::Api {
                code: browser_services_kit::auth::ApiErrorCode::InvalidLoginCredentials,
                description: None,
            }),
            _ => Ok("logged-in".to_string()),
        }
    }

    async fn get_access_token(
        &self,
        _client_id: &str,
        code_verifier: &str,
        code: &str,
        _redirect_uri: &str,
    ) -> ServiceResult<TokenPair> {
        self.record("get_access_token");
        assert!(!code_verifier.is_empty());
        match self.token_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(token_pair(code, NOW + 3_600)),
        }
    }

    async fn refresh_access_token(
        &self,
        _client_id: &str,
        refresh_token: &str,
    ) -> ServiceResult<TokenPair> {
        self.record("refresh_access_token");
        assert!(!refresh_token.is_empty());
        let delay = *self.refresh_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.refresh_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(token_pair("refreshed", NOW + 3_600)),
        }
    }

    async fn exchange_token(
        &self,
        legacy_access_token: &str,
        session_id: &str,
    ) -> ServiceResult<String> {
        self.record("exchange_token");
        assert_eq!(session_id, "session-1");
        assert!(!legacy_access_token.is_empty());
        match self.exchange_errors.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok("exchanged".to_string()),
        }
    }

    async fn logout(&self, access_token: &str) -> ServiceResult<()> {
        self.record("logout");
        assert!(!access_token.is_empty());
        match self.logout_errors.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn get_signing_keys(&self) -> ServiceResult<JwkSet> {
        self.record("get_signing_keys");
        Ok(JwkSet::default())
    }
}
