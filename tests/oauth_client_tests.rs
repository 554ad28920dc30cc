//! Integration tests for the token lifecycle: cache policies, refresh,
//! account creation, legacy migration, logout and cancellation

mod common;

use browser_services_kit::auth::{
    ApiErrorCode, EntitlementProduct, InMemoryLegacyTokenStore, InMemoryTokenStore,
    LegacyTokenStore, OAuthClient, OAuthClientError, OAuthServiceError, TokenContainer,
    TokenPair, TokenStore, TokensCachePolicy, VerificationError,
};
use common::{
    FixedClock, MockTransport, NOW, UnsignedVerifier, expired_container, make_jwt,
    refresh_claims, token_pair, valid_container,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

struct Harness {
    transport: Arc<MockTransport>,
    store: Arc<InMemoryTokenStore>,
    legacy: Arc<InMemoryLegacyTokenStore>,
    clock: Arc<FixedClock>,
    client: OAuthClient,
}

fn harness(stored: Option<TokenContainer>, legacy_token: Option<&str>) -> Harness {
    common::init_tracing();
    let transport = MockTransport::new();
    let store = Arc::new(match stored {
        Some(container) => InMemoryTokenStore::with_container(container),
        None => InMemoryTokenStore::new(),
    });
    let legacy = Arc::new(match legacy_token {
        Some(token) => InMemoryLegacyTokenStore::with_token(token),
        None => InMemoryLegacyTokenStore::new(),
    });
    let clock = Arc::new(FixedClock::new());
    let client = OAuthClient::builder(transport.clone(), store.clone(), Arc::new(UnsignedVerifier))
        .legacy_token_store(legacy.clone())
        .clock(clock.clone())
        .build();
    Harness {
        transport,
        store,
        legacy,
        clock,
        client,
    }
}

fn stored(h: &Harness) -> Option<TokenContainer> {
    h.store.get().unwrap()
}

// ============================================================================
// Cache policies
// ============================================================================

#[tokio::test]
async fn test_local_valid_returns_stored_container_untouched() {
    let original = valid_container("alice");
    let h = harness(Some(original.clone()), None);

    let tokens = h
        .client
        .get_token_container(TokensCachePolicy::LocalValid)
        .await
        .unwrap();

    assert_eq!(tokens, original);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn test_local_valid_refreshes_expired_token_once() {
    let h = harness(Some(expired_container("alice")), None);

    let tokens = h
        .client
        .get_token_container(TokensCachePolicy::LocalValid)
        .await
        .unwrap();

    assert_eq!(h.transport.count("refresh_access_token"), 1);
    assert!(!tokens.is_access_token_expired(NOW));
    assert_eq!(tokens.decoded_access_token.sub, "refreshed");
    assert_eq!(tokens.decoded_access_token.exp, NOW + 3_600);
    assert!(
        tokens
            .decoded_access_token
            .has_entitlement(&EntitlementProduct::NetworkProtection)
    );
    assert_eq!(stored(&h), Some(tokens));
}

#[tokio::test]
async fn test_expiry_is_exact() {
    let h = harness(Some(valid_container("alice")), None);

    h.clock.advance(3_599);
    h.client
        .get_token_container(TokensCachePolicy::LocalValid)
        .await
        .unwrap();
    assert_eq!(h.transport.count("refresh_access_token"), 0);

    h.clock.advance(1);
    h.client
        .get_token_container(TokensCachePolicy::LocalValid)
        .await
        .unwrap();
    assert_eq!(h.transport.count("refresh_access_token"), 1);
}

#[tokio::test]
async fn test_local_policy_never_refreshes() {
    let original = expired_container("alice");
    let h = harness(Some(original.clone()), None);

    let tokens = h
        .client
        .get_token_container(TokensCachePolicy::Local)
        .await
        .unwrap();

    assert_eq!(tokens, original);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn test_no_token_without_stored_container() {
    let h = harness(None, None);

    for policy in [
        TokensCachePolicy::Local,
        TokensCachePolicy::LocalValid,
        TokensCachePolicy::LocalForceRefresh,
    ] {
        let err = h.client.get_token_container(policy).await.unwrap_err();
        assert!(matches!(err, OAuthClientError::NoToken), "{policy:?}: {err}");
        assert!(err.requires_reauthentication());
    }
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn test_force_refresh_refreshes_valid_token() {
    let h = harness(Some(valid_container("alice")), None);

    let tokens = h
        .client
        .get_token_container(TokensCachePolicy::LocalForceRefresh)
        .await
        .unwrap();

    assert_eq!(tokens.decoded_access_token.sub, "refreshed");
    assert_eq!(
        h.transport.calls(),
        ["refresh_access_token", "get_signing_keys"]
    );
}

#[tokio::test]
async fn test_missing_refresh_token() {
    let mut container = expired_container("alice");
    container.refresh_token.clear();
    let h = harness(Some(container), None);

    let err = h
        .client
        .get_token_container(TokensCachePolicy::LocalValid)
        .await
        .unwrap_err();

    assert!(matches!(err, OAuthClientError::MissingRefreshToken));
    assert_eq!(h.transport.count("refresh_access_token"), 0);
}

// ============================================================================
// Refresh failures
// ============================================================================

#[tokio::test]
async fn test_dead_refresh_token_fails_distinctly_every_time() {
    let original = expired_container("alice");
    let h = harness(Some(original.clone()), None);
    for _ in 0..2 {
        h.transport.push_refresh(Err(OAuthServiceError::api(
            ApiErrorCode::InvalidTokenRequest,
        )));
    }

    for attempt in 1..=2 {
        let err = h
            .client
            .get_token_container(TokensCachePolicy::LocalValid)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthClientError::Unrefreshable), "{err}");
        assert!(err.requires_reauthentication());
        assert_eq!(h.transport.count("refresh_access_token"), attempt);
    }

    assert_eq!(h.transport.count("create_account"), 0);
    assert_eq!(h.transport.count("authorize"), 0);
    assert_eq!(stored(&h), Some(original));
}

#[tokio::test]
async fn test_temporary_refresh_failure() {
    let h = harness(Some(expired_container("alice")), None);
    h.transport
        .push_refresh(Err(OAuthServiceError::http("connection reset")));

    let err = h
        .client
        .get_token_container(TokensCachePolicy::LocalValid)
        .await
        .unwrap_err();

    assert!(matches!(err, OAuthClientError::RefreshFailed(_)));
    assert!(!err.requires_reauthentication());
}

#[tokio::test]
async fn test_refresh_with_wrong_scope_is_rejected() {
    let original = expired_container("alice");
    let h = harness(Some(original.clone()), None);
    h.transport.push_refresh(Ok(TokenPair {
        access_token: make_jwt(&refresh_claims("alice")),
        refresh_token: make_jwt(&refresh_claims("alice")),
    }));

    let err = h
        .client
        .get_token_container(TokensCachePolicy::LocalValid)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OAuthClientError::Verification(VerificationError::ScopeMismatch { expected: "privacypro", .. })
    ));
    assert_eq!(stored(&h), Some(original));
}

#[tokio::test]
async fn test_refresh_with_bad_signature_is_rejected() {
    let h = harness(Some(expired_container("alice")), None);
    let mut pair = token_pair("alice", NOW + 3_600);
    pair.refresh_token = pair.refresh_token.replace(".sig", ".bad");
    h.transport.push_refresh(Ok(pair));

    let err = h
        .client
        .get_token_container(TokensCachePolicy::LocalValid)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OAuthClientError::Verification(VerificationError::Signature(_))
    ));
}

// ============================================================================
// Account creation
// ============================================================================

#[tokio::test]
async fn test_create_if_needed_creates_once_and_persists() {
    let h = harness(None, None);

    let created = h
        .client
        .get_token_container(TokensCachePolicy::CreateIfNeeded)
        .await
        .unwrap();
    assert_eq!(created.decoded_access_token.sub, "created");
    assert_eq!(
        h.transport.calls(),
        [
            "authorize",
            "create_account",
            "get_access_token",
            "get_signing_keys"
        ]
    );
    assert_eq!(stored(&h), Some(created.clone()));

    let again = h
        .client
        .get_token_container(TokensCachePolicy::CreateIfNeeded)
        .await
        .unwrap();
    assert_eq!(again, created);
    assert_eq!(h.transport.count("create_account"), 1);
}

#[tokio::test]
async fn test_create_if_needed_replaces_dead_account() {
    let h = harness(Some(expired_container("alice")), None);
    h.transport.push_refresh(Err(OAuthServiceError::api(
        ApiErrorCode::InvalidTokenRequest,
    )));

    let tokens = h
        .client
        .get_token_container(TokensCachePolicy::CreateIfNeeded)
        .await
        .unwrap();

    assert_eq!(tokens.decoded_access_token.sub, "created");
    assert_eq!(h.transport.count("create_account"), 1);
}

#[tokio::test]
async fn test_account_creation_failure() {
    let h = harness(None, None);
    h.transport.fail_create_account(OAuthServiceError::api(
        ApiErrorCode::AccountCreateFailed,
    ));

    let err = h
        .client
        .get_token_container(TokensCachePolicy::CreateIfNeeded)
        .await
        .unwrap_err();

    assert!(matches!(err, OAuthClientError::AccountCreationFailed(_)));
    assert!(stored(&h).is_none());
}

#[tokio::test]
async fn test_created_tokens_are_verified() {
    let h = harness(None, None);
    let mut pair = token_pair("created", NOW + 3_600);
    pair.access_token = pair.access_token.replace(".sig", ".bad");
    h.transport.push_token(Ok(pair));

    let err = h
        .client
        .get_token_container(TokensCachePolicy::CreateIfNeeded)
        .await
        .unwrap_err();

    match err {
        OAuthClientError::AccountCreationFailed(cause) => {
            assert!(matches!(*cause, OAuthClientError::Verification(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(stored(&h).is_none());
}

// ============================================================================
// Activation
// ============================================================================

#[tokio::test]
async fn test_activate_account_with_signature() {
    let h = harness(None, None);

    let tokens = h.client.activate_account("receipt-signature").await.unwrap();

    assert_eq!(tokens.decoded_access_token.sub, "logged-in");
    assert!(h.client.is_user_authenticated());
}

#[tokio::test]
async fn test_email_otp_login() -> anyhow::Result<()> {
    let h = harness(None, None);

    let session = h.client.request_otp("user@example.com").await?;
    assert_eq!(session.email, "user@example.com");
    assert!(!session.code_verifier.is_empty());
    assert_eq!(h.transport.calls(), ["authorize", "request_otp"]);

    let tokens = h.client.activate_with_otp(session, "123456").await?;
    assert_eq!(tokens.decoded_access_token.sub, "logged-in");
    assert_eq!(h.store.get()?, Some(tokens));
    Ok(())
}

#[tokio::test]
async fn test_email_otp_login_with_wrong_code() {
    let h = harness(None, None);

    let session = h.client.request_otp("user@example.com").await.unwrap();
    let err = h
        .client
        .activate_with_otp(session, "000000")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OAuthClientError::Service(OAuthServiceError::Api {
            code: ApiErrorCode::InvalidLoginCredentials,
            ..
        })
    ));
    assert!(!h.client.is_user_authenticated());
}

#[tokio::test]
async fn test_adopt_external_container() {
    let h = harness(None, None);
    let container = valid_container("bob");

    h.client.adopt(container.clone()).unwrap();

    assert_eq!(h.client.current_token_container().unwrap(), Some(container));
}

// ============================================================================
// Legacy migration
// ============================================================================

#[tokio::test]
async fn test_legacy_token_is_migrated_first() -> anyhow::Result<()> {
    let h = harness(Some(valid_container("alice")), Some("legacy-token"));

    let tokens = h
        .client
        .get_token_container(TokensCachePolicy::Local)
        .await?;

    assert_eq!(tokens.decoded_access_token.sub, "exchanged");
    assert_eq!(
        h.transport.calls(),
        [
            "authorize",
            "exchange_token",
            "get_access_token",
            "get_signing_keys"
        ]
    );
    assert_eq!(h.legacy.get()?, None);
    assert_eq!(stored(&h), Some(tokens));

    h.client
        .get_token_container(TokensCachePolicy::Local)
        .await?;
    assert_eq!(h.transport.count("exchange_token"), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_migration_falls_through() {
    let original = valid_container("alice");
    let h = harness(Some(original.clone()), Some("legacy-token"));
    h.transport
        .fail_exchange(OAuthServiceError::api(ApiErrorCode::InvalidToken));

    let tokens = h
        .client
        .get_token_container(TokensCachePolicy::LocalValid)
        .await
        .unwrap();

    assert_eq!(tokens, original);
    assert_eq!(h.legacy.get().unwrap().as_deref(), Some("legacy-token"));
}

#[tokio::test]
async fn test_exchange_legacy_token_reports_refusal() {
    let h = harness(None, None);
    h.transport
        .fail_exchange(OAuthServiceError::api(ApiErrorCode::InvalidToken));

    let err = h
        .client
        .exchange_legacy_token("legacy-token")
        .await
        .unwrap_err();

    assert!(matches!(err, OAuthClientError::MigrationFailed(_)));
    assert!(stored(&h).is_none());
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_clears_stores() {
    let h = harness(Some(valid_container("alice")), Some("legacy-token"));

    h.client.logout().await.unwrap();

    assert_eq!(h.transport.calls(), ["logout"]);
    assert!(stored(&h).is_none());
    assert!(h.legacy.get().unwrap().is_none());
    assert!(!h.client.is_user_authenticated());
}

#[tokio::test]
async fn test_logout_clears_even_when_revoke_fails() {
    let h = harness(Some(valid_container("alice")), None);
    h.transport
        .fail_logout(OAuthServiceError::http("network unreachable"));

    let err = h.client.logout().await.unwrap_err();

    assert!(matches!(err, OAuthClientError::Service(_)));
    assert!(stored(&h).is_none());
}

#[tokio::test]
async fn test_remove_local_account_is_offline() {
    let h = harness(Some(valid_container("alice")), Some("legacy-token"));

    h.client.remove_local_account().unwrap();

    assert!(h.transport.calls().is_empty());
    assert!(stored(&h).is_none());
    assert!(h.legacy.get().unwrap().is_none());
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_shut_down_client_makes_no_calls() {
    common::init_tracing();
    let transport = MockTransport::new();
    let legacy = Arc::new(InMemoryLegacyTokenStore::with_token("legacy-token"));
    let shutdown = CancellationToken::new();
    let client = OAuthClient::builder(
        transport.clone(),
        Arc::new(InMemoryTokenStore::with_container(expired_container("alice"))),
        Arc::new(UnsignedVerifier),
    )
    .legacy_token_store(legacy.clone())
    .cancellation_token(shutdown.clone())
    .build();
    shutdown.cancel();
    client.cancel();

    for _ in 0..2 {
        let err = client
            .get_token_container(TokensCachePolicy::CreateIfNeeded)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthClientError::Cancelled));
    }

    assert!(transport.calls().is_empty());
    assert_eq!(legacy.get().unwrap().as_deref(), Some("legacy-token"));
}

#[tokio::test]
async fn test_client_recovers_after_cancel() {
    let h = harness(Some(expired_container("alice")), None);
    h.client.cancel();
    h.client.cancellation_token().cancel();

    for _ in 0..2 {
        let tokens = h
            .client
            .get_token_container(TokensCachePolicy::LocalValid)
            .await
            .unwrap();
        assert_eq!(tokens.decoded_access_token.sub, "refreshed");
    }
    assert_eq!(h.transport.count("refresh_access_token"), 1);
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_refresh() {
    let original = expired_container("alice");
    let h = harness(Some(original.clone()), None);
    h.transport.delay_refresh(Duration::from_secs(10));

    let start = Instant::now();
    let (result, ()) = tokio::join!(
        h.client.get_token_container(TokensCachePolicy::LocalValid),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            h.client.cancel();
        }
    );
    let err = result.unwrap_err();

    assert!(matches!(err, OAuthClientError::Cancelled));
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "cancellation took {:?}",
        start.elapsed()
    );
    assert_eq!(h.transport.count("get_signing_keys"), 0);
    assert_eq!(stored(&h), Some(original));

    // The next call is not affected by the earlier cancel
    h.transport.delay_refresh(Duration::ZERO);
    let tokens = h
        .client
        .get_token_container(TokensCachePolicy::LocalValid)
        .await
        .unwrap();
    assert_eq!(tokens.decoded_access_token.sub, "refreshed");
}

#[tokio::test]
async fn test_token_container_debug_hides_secrets() {
    let container = valid_container("alice");
    let debug = format!("{container:?}");
    assert!(!debug.contains(&container.access_token));
    assert!(!debug.contains(&container.refresh_token));
    assert!(debug.contains("alice"));
}
