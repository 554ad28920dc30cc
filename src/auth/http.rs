//! [`AuthTransport`] over the OAuth v2 HTTP API

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderMap, LOCATION, SET_COOKIE};
use serde::Deserialize;

use super::claims::JwkSet;
use super::config::OAuthConfig;
use super::service::{
    ApiErrorCode, AuthTransport, LoginMethod, OAuthServiceError, ServiceResult, TokenPair,
};
use crate::utils::truncate_for_display;

const SESSION_COOKIE: &str = "ddg_auth_session_id";
const MAX_ERROR_BODY_BYTES: usize = 512;

/// Error body returned by the auth API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Response from the token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

/// HTTP implementation of [`AuthTransport`]
///
/// Redirects are never followed: several endpoints answer `302` and carry
/// their result in the `Location` header or in a session cookie.
#[derive(Debug, Clone)]
pub struct HttpAuthTransport {
    config: OAuthConfig,
    http_client: reqwest::Client,
}

impl HttpAuthTransport {
    /// Create a transport for `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn new(config: OAuthConfig) -> ServiceResult<Self> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Get the OAuth configuration
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    fn session_cookie(session_id: &str) -> String {
        format!("{SESSION_COOKIE}={session_id}")
    }

    /// Return the response if its status is `expected`, otherwise map it to an error
    async fn expect_status(
        response: reqwest::Response,
        expected: StatusCode,
    ) -> ServiceResult<reqwest::Response> {
        let status = response.status();
        if status == expected {
            return Ok(response);
        }

        let body = response.text().await?;
        Err(error_from_body(status, &body))
    }

    /// Read the authorization code out of a redirect response
    fn code_from_redirect(&self, response: &reqwest::Response) -> ServiceResult<String> {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| OAuthServiceError::invalid_response("missing Location header"))?;
        code_from_location(&self.config.base_url, location)
            .ok_or_else(|| OAuthServiceError::invalid_response("missing authorization code"))
    }

    async fn request_tokens(&self, params: &[(&str, &str)]) -> ServiceResult<TokenPair> {
        let response = self
            .http_client
            .get(self.config.endpoint("token"))
            .query(params)
            .send()
            .await?;
        let response = Self::expect_status(response, StatusCode::OK).await?;
        let response_text = response.text().await?;

        let token_response: TokenResponse = serde_json::from_str(&response_text).map_err(|e| {
            OAuthServiceError::invalid_response(format!("Failed to parse token response: {e}"))
        })?;

        Ok(TokenPair {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
        })
    }
}

#[async_trait]
impl AuthTransport for HttpAuthTransport {
    async fn authorize(&self, code_challenge: &str) -> ServiceResult<String> {
        tracing::debug!("Requesting authorization session");
        let params = [
            ("response_type", "code"),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "S256"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", self.config.scope.as_str()),
        ];
        let response = self
            .http_client
            .get(self.config.endpoint("authorize"))
            .query(&params)
            .send()
            .await?;
        let response = Self::expect_status(response, StatusCode::FOUND).await?;

        session_id_from_cookies(response.headers())
            .ok_or_else(|| OAuthServiceError::invalid_response("missing auth session cookie"))
    }

    async fn create_account(&self, session_id: &str) -> ServiceResult<String> {
        tracing::debug!("Creating account");
        let response = self
            .http_client
            .post(self.config.endpoint("account/create"))
            .header(COOKIE, Self::session_cookie(session_id))
            .send()
            .await?;
        let response = Self::expect_status(response, StatusCode::FOUND).await?;
        self.code_from_redirect(&response)
    }

    async fn request_otp(&self, session_id: &str, email: &str) -> ServiceResult<()> {
        tracing::debug!("Requesting one-time password");
        let response = self
            .http_client
            .post(self.config.endpoint("otp"))
            .header(COOKIE, Self::session_cookie(session_id))
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;
        Self::expect_status(response, StatusCode::OK).await?;
        Ok(())
    }

    async fn login(&self, session_id: &str, method: &LoginMethod) -> ServiceResult<String> {
        tracing::debug!("Logging in");
        let response = self
            .http_client
            .post(self.config.endpoint("login"))
            .header(COOKIE, Self::session_cookie(session_id))
            .json(method)
            .send()
            .await?;
        let response = Self::expect_status(response, StatusCode::FOUND).await?;
        self.code_from_redirect(&response)
    }

    async fn get_access_token(
        &self,
        client_id: &str,
        code_verifier: &str,
        code: &str,
        redirect_uri: &str,
    ) -> ServiceResult<TokenPair> {
        tracing::debug!("Redeeming authorization code");
        self.request_tokens(&[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("code_verifier", code_verifier),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    async fn refresh_access_token(
        &self,
        client_id: &str,
        refresh_token: &str,
    ) -> ServiceResult<TokenPair> {
        tracing::debug!("Refreshing access token");
        self.request_tokens(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn exchange_token(
        &self,
        legacy_access_token: &str,
        session_id: &str,
    ) -> ServiceResult<String> {
        tracing::debug!("Exchanging legacy access token");
        let response = self
            .http_client
            .post(self.config.endpoint("exchange"))
            .bearer_auth(legacy_access_token)
            .header(COOKIE, Self::session_cookie(session_id))
            .send()
            .await?;
        let response = Self::expect_status(response, StatusCode::FOUND).await?;
        self.code_from_redirect(&response)
    }

    async fn logout(&self, access_token: &str) -> ServiceResult<()> {
        tracing::debug!("Revoking session");
        let response = self
            .http_client
            .post(self.config.endpoint("logout"))
            .bearer_auth(access_token)
            .send()
            .await?;
        Self::expect_status(response, StatusCode::OK).await?;
        Ok(())
    }

    async fn get_signing_keys(&self) -> ServiceResult<JwkSet> {
        let response = self
            .http_client
            .get(self.config.endpoint(".well-known/jwks.json"))
            .send()
            .await?;
        let response = Self::expect_status(response, StatusCode::OK).await?;
        let response_text = response.text().await?;
        Ok(serde_json::from_str(&response_text)?)
    }
}

/// Map a non-success response to an error, preferring the API error body
fn error_from_body(status: StatusCode, body: &str) -> OAuthServiceError {
    if let Ok(error) = serde_json::from_str::<ErrorResponse>(body) {
        return OAuthServiceError::Api {
            code: ApiErrorCode::parse(&error.error),
            description: error.error_description,
        };
    }

    OAuthServiceError::UnexpectedStatus {
        status: status.as_u16(),
        body: truncate_for_display(body, MAX_ERROR_BODY_BYTES),
    }
}

/// Find the auth session id among the `Set-Cookie` headers
fn session_id_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim() == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Extract the `code` query parameter of a redirect location
///
/// Relative locations are resolved against `base_url`.
fn code_from_location(base_url: &str, location: &str) -> Option<String> {
    let url = match url::Url::parse(location) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            url::Url::parse(base_url).ok()?.join(location).ok()?
        }
        Err(_) => return None,
    };
    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
