//! OAuth client configuration

use typed_builder::TypedBuilder;

use crate::error::{Error, Result};

const DEFAULT_CLIENT_ID: &str = "f4311287-0121-40e6-8bbd-85c36daf1837";
const DEFAULT_REDIRECT_URI: &str = "com.duckduckgo:/authcb";
const PRODUCTION_BASE_URL: &str = "https://duckduckgo.com";
const STAGING_BASE_URL: &str = "https://quackdev.duckduckgo.com";

/// Scope carried by every subscription access token
pub const ACCESS_TOKEN_SCOPE: &str = "privacypro";
/// Scope carried by every refresh token
pub const REFRESH_TOKEN_SCOPE: &str = "refresh";

const ENV_BASE_URL: &str = "BSK_AUTH_BASE_URL";
const ENV_CLIENT_ID: &str = "BSK_AUTH_CLIENT_ID";
const ENV_REDIRECT_URI: &str = "BSK_AUTH_REDIRECT_URI";

/// Auth backend environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OAuthEnvironment {
    /// Production auth servers
    #[default]
    Production,
    /// Staging auth servers
    Staging,
}

impl OAuthEnvironment {
    /// Base URL of the auth API for this environment
    #[must_use]
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_BASE_URL,
            Self::Staging => STAGING_BASE_URL,
        }
    }
}

/// OAuth configuration
///
/// Passed explicitly to the transport and to [`super::OAuthClient`] so that
/// several clients with different settings can coexist in one process.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct OAuthConfig {
    /// OAuth client ID
    #[builder(default = DEFAULT_CLIENT_ID.to_string(), setter(into))]
    pub client_id: String,
    /// Redirect URI registered for the client
    #[builder(default = DEFAULT_REDIRECT_URI.to_string(), setter(into))]
    pub redirect_uri: String,
    /// Base URL of the auth API, without trailing slash
    #[builder(default = PRODUCTION_BASE_URL.to_string(), setter(into))]
    pub base_url: String,
    /// Scope requested at authorization time
    #[builder(default = ACCESS_TOKEN_SCOPE.to_string(), setter(into))]
    pub scope: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl OAuthConfig {
    /// Default configuration pointed at the given environment
    #[must_use]
    pub fn for_environment(environment: OAuthEnvironment) -> Self {
        Self::builder().base_url(environment.base_url()).build()
    }

    /// Default configuration with overrides from `BSK_AUTH_BASE_URL`,
    /// `BSK_AUTH_CLIENT_ID` and `BSK_AUTH_REDIRECT_URI`
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(client_id) = lookup(ENV_CLIENT_ID).filter(|v| !v.is_empty()) {
            self.client_id = client_id;
        }
        if let Some(redirect_uri) = lookup(ENV_REDIRECT_URI).filter(|v| !v.is_empty()) {
            self.redirect_uri = redirect_uri;
        }
        self
    }

    /// Check that the configuration can be used for requests
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the client id or redirect URI is
    /// empty, or the base URL is not an absolute `http(s)` URL.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::invalid_config("client_id is empty"));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(Error::invalid_config("redirect_uri is empty"));
        }
        let base_url = url::Url::parse(&self.base_url)
            .map_err(|e| Error::invalid_config(format!("base_url {:?}: {e}", self.base_url)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::invalid_config(format!(
                "base_url must be http or https, got {}",
                base_url.scheme()
            )));
        }
        Ok(())
    }

    /// Absolute URL of an auth API path such as `token`
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/api/auth/v2/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
