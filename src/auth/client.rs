//! Subscription OAuth client: token cache, refresh, creation and migration

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::claims::{TokenVerifier, VerificationError, decode_access_token, decode_refresh_token};
use super::config::OAuthConfig;
use super::pkce::PkceChallenge;
use super::service::{AuthTransport, LoginMethod, OAuthServiceError, TokenPair};
use super::storage::{LegacyTokenStore, StorageError, TokenStore};
use super::token::{Clock, SystemClock, TokenContainer, TokensCachePolicy};

/// Errors returned by [`OAuthClient`]
#[derive(Debug, Error)]
pub enum OAuthClientError {
    /// No token container is stored
    #[error("No token available")]
    NoToken,

    /// The stored container has no usable refresh token
    #[error("Missing refresh token")]
    MissingRefreshToken,

    /// The server permanently rejected the refresh token
    #[error("Refresh token is no longer valid, re-authentication required")]
    Unrefreshable,

    /// Refreshing failed for a reason that may be temporary
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[source] OAuthServiceError),

    /// A new account could not be created
    #[error("Account creation failed: {0}")]
    AccountCreationFailed(#[source] Box<OAuthClientError>),

    /// Legacy token exchange failed
    #[error("Legacy token migration failed: {0}")]
    MigrationFailed(#[source] OAuthServiceError),

    /// Token verification failed
    #[error("Token verification failed: {0}")]
    Verification(#[from] VerificationError),

    /// Auth API error
    #[error("Auth service error: {0}")]
    Service(#[from] OAuthServiceError),

    /// Token store error
    #[error("Token storage error: {0}")]
    Storage(#[from] StorageError),

    /// The operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

impl OAuthClientError {
    /// Whether the user has to authenticate again to recover
    ///
    /// `false` means the failure is worth retrying later.
    #[must_use]
    pub fn requires_reauthentication(&self) -> bool {
        match self {
            Self::NoToken | Self::MissingRefreshToken | Self::Unrefreshable => true,
            Self::AccountCreationFailed(inner) => inner.requires_reauthentication(),
            Self::RefreshFailed(_)
            | Self::MigrationFailed(_)
            | Self::Verification(_)
            | Self::Service(_)
            | Self::Storage(_)
            | Self::Cancelled => false,
        }
    }
}

/// Result type for OAuth client operations
pub type AuthResult<T> = Result<T, OAuthClientError>;

/// State carried between [`OAuthClient::request_otp`] and
/// [`OAuthClient::activate_with_otp`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailLoginSession {
    /// Authorization session id
    pub session_id: String,
    /// PKCE verifier bound to the session
    pub code_verifier: String,
    /// Email the one-time password was sent to
    pub email: String,
}

/// Builder for [`OAuthClient`]
pub struct OAuthClientBuilder {
    config: Option<OAuthConfig>,
    transport: Arc<dyn AuthTransport>,
    token_store: Arc<dyn TokenStore>,
    legacy_token_store: Option<Arc<dyn LegacyTokenStore>>,
    verifier: Arc<dyn TokenVerifier>,
    clock: Option<Arc<dyn Clock>>,
    cancellation_token: Option<CancellationToken>,
}

impl OAuthClientBuilder {
    /// Create a builder from the required collaborators
    #[must_use]
    pub fn new(
        transport: Arc<dyn AuthTransport>,
        token_store: Arc<dyn TokenStore>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            config: None,
            transport,
            token_store,
            legacy_token_store: None,
            verifier,
            clock: None,
            cancellation_token: None,
        }
    }

    /// Set custom OAuth configuration
    #[must_use]
    pub fn config(mut self, config: OAuthConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the store holding a pre-migration token
    #[must_use]
    pub fn legacy_token_store(mut self, store: Arc<dyn LegacyTokenStore>) -> Self {
        self.legacy_token_store = Some(store);
        self
    }

    /// Set the clock used for expiry checks (default: system clock)
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the token that shuts the client down
    ///
    /// Once it is cancelled, every current and future operation returns
    /// [`OAuthClientError::Cancelled`]. Use [`OAuthClient::cancel`] to abort
    /// only the operations in flight.
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the OAuth client
    #[must_use]
    pub fn build(self) -> OAuthClient {
        let shutdown = self.cancellation_token.unwrap_or_default();
        OAuthClient {
            config: self.config.unwrap_or_default(),
            transport: self.transport,
            token_store: self.token_store,
            legacy_token_store: self.legacy_token_store,
            verifier: self.verifier,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            in_flight: Mutex::new(shutdown.child_token()),
            shutdown,
        }
    }
}

/// OAuth client managing the subscription token lifecycle
///
/// Every operation that obtains tokens verifies both of them, writes the new
/// container to the token store and only then returns it. Concurrent callers
/// are not serialised: two simultaneous forced refreshes issue two refresh
/// requests and the later write wins.
///
/// Each operation runs under its own child of the current in-flight token,
/// which is passed through every transport call. [`OAuthClient::cancel`]
/// aborts those operations and starts a fresh in-flight token for later ones.
pub struct OAuthClient {
    config: OAuthConfig,
    transport: Arc<dyn AuthTransport>,
    token_store: Arc<dyn TokenStore>,
    legacy_token_store: Option<Arc<dyn LegacyTokenStore>>,
    verifier: Arc<dyn TokenVerifier>,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
    in_flight: Mutex<CancellationToken>,
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("config", &self.config)
            .field("has_legacy_store", &self.legacy_token_store.is_some())
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl OAuthClient {
    /// Create a builder from the required collaborators
    #[must_use]
    pub fn builder(
        transport: Arc<dyn AuthTransport>,
        token_store: Arc<dyn TokenStore>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> OAuthClientBuilder {
        OAuthClientBuilder::new(transport, token_store, verifier)
    }

    /// Get the OAuth configuration
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Token that fires when the operations now in flight are cancelled
    ///
    /// Fires on [`cancel`](Self::cancel) or shutdown. Cancelling the returned
    /// token only affects tasks that watch it, not the client.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.operation_token()
    }

    /// Abort every operation in flight
    ///
    /// Operations started afterwards are unaffected.
    pub fn cancel(&self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.cancel();
        *in_flight = self.shutdown.child_token();
        tracing::debug!("Cancelled in-flight operations");
    }

    fn operation_token(&self) -> CancellationToken {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token()
    }

    /// Stored container, without refreshing or migrating
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read.
    pub fn current_token_container(&self) -> AuthResult<Option<TokenContainer>> {
        Ok(self.token_store.get()?)
    }

    /// Whether a token container is stored
    #[must_use]
    pub fn is_user_authenticated(&self) -> bool {
        matches!(self.token_store.get(), Ok(Some(_)))
    }

    /// Persist an externally obtained container
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be written.
    pub fn adopt(&self, container: TokenContainer) -> AuthResult<()> {
        self.token_store.set(Some(container))?;
        Ok(())
    }

    /// Get a token container according to `policy`
    ///
    /// A legacy token, if present, is exchanged first. Migration failures are
    /// logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// - [`OAuthClientError::NoToken`] when nothing is stored and `policy` does not create
    /// - [`OAuthClientError::Unrefreshable`] when the refresh token is dead
    /// - [`OAuthClientError::RefreshFailed`] when refreshing failed otherwise
    /// - [`OAuthClientError::AccountCreationFailed`] when `CreateIfNeeded` could not create
    pub async fn get_token_container(
        &self,
        policy: TokensCachePolicy,
    ) -> AuthResult<TokenContainer> {
        let cancel = self.operation_token();
        let local = match self.migrate_legacy_token_if_needed(&cancel).await {
            Ok(Some(migrated)) => Some(migrated),
            Ok(None) => self.token_store.get()?,
            Err(OAuthClientError::Cancelled) => return Err(OAuthClientError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "Legacy token migration failed, continuing");
                self.token_store.get()?
            }
        };

        self.resolve(policy, local, &cancel).await
    }

    async fn resolve(
        &self,
        policy: TokensCachePolicy,
        local: Option<TokenContainer>,
        cancel: &CancellationToken,
    ) -> AuthResult<TokenContainer> {
        tracing::debug!(policy = ?policy, has_local = local.is_some(), "Resolving token container");

        match policy {
            TokensCachePolicy::Local => local.ok_or(OAuthClientError::NoToken),
            TokensCachePolicy::LocalValid => self.local_valid(local, cancel).await,
            TokensCachePolicy::LocalForceRefresh => self.force_refresh(local, cancel).await,
            TokensCachePolicy::CreateIfNeeded => match self.local_valid(local, cancel).await {
                Ok(container) => Ok(container),
                Err(OAuthClientError::Cancelled) => Err(OAuthClientError::Cancelled),
                Err(e) => {
                    tracing::info!(error = %e, "No usable local token, creating account");
                    self.create_account_with(cancel).await.map_err(|e| match e {
                        OAuthClientError::Cancelled => OAuthClientError::Cancelled,
                        other => OAuthClientError::AccountCreationFailed(Box::new(other)),
                    })
                }
            },
        }
    }

    async fn local_valid(
        &self,
        local: Option<TokenContainer>,
        cancel: &CancellationToken,
    ) -> AuthResult<TokenContainer> {
        let container = local.ok_or(OAuthClientError::NoToken)?;
        if container.is_access_token_expired(self.clock.now()) {
            tracing::debug!("Access token expired, refreshing");
            self.force_refresh(Some(container), cancel).await
        } else {
            Ok(container)
        }
    }

    async fn force_refresh(
        &self,
        local: Option<TokenContainer>,
        cancel: &CancellationToken,
    ) -> AuthResult<TokenContainer> {
        let container = local.ok_or(OAuthClientError::NoToken)?;
        if container.refresh_token.is_empty() {
            return Err(OAuthClientError::MissingRefreshToken);
        }

        let refreshed = self
            .cancellable(
                self.transport
                    .refresh_access_token(&self.config.client_id, &container.refresh_token),
                cancel,
            )
            .await?;
        let pair = match refreshed {
            Ok(pair) => pair,
            Err(e) if e.is_dead_token() => {
                tracing::error!("Refresh token rejected by server");
                return Err(OAuthClientError::Unrefreshable);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                return Err(OAuthClientError::RefreshFailed(e));
            }
        };

        let refreshed = self.decode(pair, cancel).await?;
        self.token_store.set(Some(refreshed.clone()))?;
        tracing::debug!("Tokens refreshed");
        Ok(refreshed)
    }

    /// Create a brand new account and store its tokens
    ///
    /// # Errors
    ///
    /// Returns an error if any step of the flow fails or is cancelled.
    pub async fn create_account(&self) -> AuthResult<TokenContainer> {
        self.create_account_with(&self.operation_token()).await
    }

    async fn create_account_with(&self, cancel: &CancellationToken) -> AuthResult<TokenContainer> {
        let pkce = PkceChallenge::generate();
        let session_id = self.call(self.transport.authorize(&pkce.challenge), cancel).await?;
        let code = self.call(self.transport.create_account(&session_id), cancel).await?;
        let container = self.redeem(&pkce.verifier, &code, cancel).await?;
        self.token_store.set(Some(container.clone()))?;
        tracing::info!("Account created");
        Ok(container)
    }

    /// Log in with a store purchase signature
    ///
    /// # Errors
    ///
    /// Returns an error if any step of the flow fails or is cancelled.
    pub async fn activate_account(&self, signature: &str) -> AuthResult<TokenContainer> {
        let cancel = &self.operation_token();
        let pkce = PkceChallenge::generate();
        let session_id = self.call(self.transport.authorize(&pkce.challenge), cancel).await?;
        let method = LoginMethod::app_store_signature(signature);
        let code = self.call(self.transport.login(&session_id, &method), cancel).await?;
        let container = self.redeem(&pkce.verifier, &code, cancel).await?;
        self.token_store.set(Some(container.clone()))?;
        tracing::info!("Account activated with purchase signature");
        Ok(container)
    }

    /// Start an email login: open a session and send a one-time password
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened or the email not sent.
    pub async fn request_otp(&self, email: &str) -> AuthResult<EmailLoginSession> {
        let cancel = &self.operation_token();
        let pkce = PkceChallenge::generate();
        let session_id = self.call(self.transport.authorize(&pkce.challenge), cancel).await?;
        self.call(self.transport.request_otp(&session_id, email), cancel)
            .await?;
        Ok(EmailLoginSession {
            session_id,
            code_verifier: pkce.verifier,
            email: email.to_string(),
        })
    }

    /// Finish an email login with the one-time password received
    ///
    /// # Errors
    ///
    /// Returns an error if login or token redemption fails.
    pub async fn activate_with_otp(
        &self,
        session: EmailLoginSession,
        otp: &str,
    ) -> AuthResult<TokenContainer> {
        let cancel = &self.operation_token();
        let method = LoginMethod::Otp {
            email: session.email,
            otp: otp.to_string(),
        };
        let code = self
            .call(self.transport.login(&session.session_id, &method), cancel)
            .await?;
        let container = self.redeem(&session.code_verifier, &code, cancel).await?;
        self.token_store.set(Some(container.clone()))?;
        tracing::info!("Account activated with one-time password");
        Ok(container)
    }

    /// Exchange a legacy access token for a new token container and store it
    ///
    /// # Errors
    ///
    /// Returns [`OAuthClientError::MigrationFailed`] if the server refuses the exchange.
    pub async fn exchange_legacy_token(
        &self,
        legacy_access_token: &str,
    ) -> AuthResult<TokenContainer> {
        self.exchange_legacy_token_with(legacy_access_token, &self.operation_token())
            .await
    }

    async fn exchange_legacy_token_with(
        &self,
        legacy_access_token: &str,
        cancel: &CancellationToken,
    ) -> AuthResult<TokenContainer> {
        let pkce = PkceChallenge::generate();
        let session_id = self.call(self.transport.authorize(&pkce.challenge), cancel).await?;
        let code = self
            .cancellable(
                self.transport
                    .exchange_token(legacy_access_token, &session_id),
                cancel,
            )
            .await?
            .map_err(OAuthClientError::MigrationFailed)?;
        let container = self.redeem(&pkce.verifier, &code, cancel).await?;
        self.token_store.set(Some(container.clone()))?;
        Ok(container)
    }

    async fn migrate_legacy_token_if_needed(
        &self,
        cancel: &CancellationToken,
    ) -> AuthResult<Option<TokenContainer>> {
        let Some(legacy_store) = &self.legacy_token_store else {
            return Ok(None);
        };
        let Some(legacy_token) = legacy_store.get()? else {
            return Ok(None);
        };

        tracing::info!("Migrating legacy access token");
        let container = self.exchange_legacy_token_with(&legacy_token, cancel).await?;
        legacy_store.set(None)?;
        tracing::info!("Legacy access token migrated");
        Ok(Some(container))
    }

    /// Revoke the session server-side, then clear local tokens
    ///
    /// Local tokens are cleared even when revocation fails; the revocation
    /// error is returned afterwards.
    ///
    /// # Errors
    ///
    /// Returns the revocation error, or a storage error if clearing fails.
    pub async fn logout(&self) -> AuthResult<()> {
        let cancel = &self.operation_token();
        let revoked = match self.token_store.get() {
            Ok(Some(container)) => {
                self.call(self.transport.logout(&container.access_token), cancel)
                    .await
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &revoked {
            tracing::warn!(error = %e, "Session revocation failed");
        }

        self.remove_local_account()?;
        revoked
    }

    /// Clear stored tokens without contacting the server
    ///
    /// # Errors
    ///
    /// Returns an error if a store cannot be written.
    pub fn remove_local_account(&self) -> AuthResult<()> {
        self.token_store.set(None)?;
        if let Some(legacy_store) = &self.legacy_token_store {
            legacy_store.set(None)?;
        }
        tracing::debug!("Local account removed");
        Ok(())
    }

    /// Redeem an authorization code and verify the resulting tokens
    async fn redeem(
        &self,
        code_verifier: &str,
        code: &str,
        cancel: &CancellationToken,
    ) -> AuthResult<TokenContainer> {
        let pair = self
            .call(
                self.transport.get_access_token(
                    &self.config.client_id,
                    code_verifier,
                    code,
                    &self.config.redirect_uri,
                ),
                cancel,
            )
            .await?;
        self.decode(pair, cancel).await
    }

    /// Verify both tokens against freshly fetched signing keys
    async fn decode(
        &self,
        pair: TokenPair,
        cancel: &CancellationToken,
    ) -> AuthResult<TokenContainer> {
        let keys = self.call(self.transport.get_signing_keys(), cancel).await?;
        let decoded_access_token =
            decode_access_token(self.verifier.as_ref(), &pair.access_token, &keys)?;
        let decoded_refresh_token =
            decode_refresh_token(self.verifier.as_ref(), &pair.refresh_token, &keys)?;

        Ok(TokenContainer {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            decoded_access_token,
            decoded_refresh_token,
        })
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, OAuthServiceError>>,
        cancel: &CancellationToken,
    ) -> AuthResult<T> {
        Ok(self.cancellable(request, cancel).await??)
    }

    /// Run a transport call, checking for cancellation before and after it
    ///
    /// A late response that arrives after cancellation is discarded.
    async fn cancellable<T>(
        &self,
        request: impl Future<Output = T>,
        cancel: &CancellationToken,
    ) -> AuthResult<T> {
        if cancel.is_cancelled() {
            return Err(OAuthClientError::Cancelled);
        }

        let output = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(OAuthClientError::Cancelled),
            output = request => output,
        };

        if cancel.is_cancelled() {
            return Err(OAuthClientError::Cancelled);
        }
        Ok(output)
    }
}
