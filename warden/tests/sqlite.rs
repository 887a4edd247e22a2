use std::sync::Arc;

use warden::{
    AttemptFilter, Error, FailureReason, LoginRequest, RedirectHint, Registration, RequestContext,
    Role, SqliteRepositoryProvider, SuspiciousReason, TokenConfig, Warden,
};

const TEST_SECRET: &[u8] = b"integration_test_secret_for_hs256_signing";
const CHROME_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

async fn setup_warden() -> Warden<SqliteRepositoryProvider> {
    let _ = tracing_subscriber::fmt().try_init();

    // Each pooled in-memory connection is a distinct database, so keep the
    // pool at one connection.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let warden = Warden::new(
        Arc::new(SqliteRepositoryProvider::new(pool)),
        TokenConfig::new(TEST_SECRET.to_vec()),
    );
    warden.migrate().await.unwrap();
    warden
}

fn registration(email: &str, phone: &str, role: Role) -> Registration {
    Registration {
        email: email.to_string(),
        phone: phone.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        password: "secret1-long-enough".to_string(),
        role,
    }
}

fn login_request(identity: &str, secret: &str) -> LoginRequest {
    LoginRequest {
        identity: identity.to_string(),
        secret: secret.to_string(),
    }
}

fn ctx(ip: &str) -> RequestContext {
    RequestContext::new(Some(ip.to_string()), Some(CHROME_UA.to_string()))
}

#[tokio::test]
async fn test_register_and_login() {
    let warden = setup_warden().await;

    let account = warden
        .register(registration("a@x.com", "+15550001111", Role::Student))
        .await
        .unwrap();
    assert_eq!(account.email, "a@x.com");

    let success = warden
        .login(login_request("a@x.com", "secret1-long-enough"), ctx("10.0.0.1"))
        .await
        .unwrap();

    assert_eq!(success.account.email, "a@x.com");
    assert_eq!(success.redirect_hint, RedirectHint::NeutralArea);
    assert_eq!(success.cookie.name, "warden_token");
    assert!(success.cookie.http_only);

    // 7-day lifetime straight from the claims
    assert_eq!(
        success.claims.exp - success.claims.iat,
        chrono::Duration::days(7).num_seconds()
    );

    let verified = warden.verify_token(&success.token).unwrap();
    assert_eq!(verified.email, "a@x.com");
}

#[tokio::test]
async fn test_lockout_end_to_end() {
    let warden = setup_warden().await;
    warden
        .register(registration("a@x.com", "+15550001111", Role::Student))
        .await
        .unwrap();

    for _ in 0..4 {
        let failure = warden
            .login(login_request("a@x.com", "wrong-password"), ctx("10.0.0.1"))
            .await
            .unwrap_err();
        assert_eq!(failure.reason, FailureReason::InvalidCredentials);
    }

    let failure = warden
        .login(login_request("a@x.com", "wrong-password"), ctx("10.0.0.1"))
        .await
        .unwrap_err();
    assert_eq!(failure.reason, FailureReason::AccountLocked);
    let retry_after = failure.retry_after.expect("lock carries retry hint");
    let expected = chrono::Utc::now() + chrono::Duration::hours(2);
    assert!((retry_after - expected).num_seconds().abs() < 10);

    // Lock takes precedence over correct credentials
    let failure = warden
        .login(
            login_request("a@x.com", "secret1-long-enough"),
            ctx("10.0.0.1"),
        )
        .await
        .unwrap_err();
    assert_eq!(failure.reason, FailureReason::AccountLocked);
}

#[tokio::test]
async fn test_sixth_attempt_rate_limited() {
    let warden = setup_warden().await;

    // An unknown identity never locks, so the limiter is what trips
    for _ in 0..5 {
        let failure = warden
            .login(login_request("ghost@x.com", "whatever-pass"), ctx("10.0.0.1"))
            .await
            .unwrap_err();
        assert_eq!(failure.reason, FailureReason::InvalidCredentials);
    }

    let failure = warden
        .login(login_request("ghost@x.com", "whatever-pass"), ctx("10.0.0.1"))
        .await
        .unwrap_err();
    assert_eq!(failure.reason, FailureReason::RateLimited);
    assert!(failure.retry_after.is_some());
}

#[tokio::test]
async fn test_origin_rate_limited_across_identities() {
    let warden = setup_warden().await;

    for i in 0..5 {
        let _ = warden
            .login(
                login_request(&format!("u{i}@x.com"), "whatever-pass"),
                ctx("10.0.0.9"),
            )
            .await;
    }

    let failure = warden
        .login(login_request("fresh@x.com", "whatever-pass"), ctx("10.0.0.9"))
        .await
        .unwrap_err();
    assert_eq!(failure.reason, FailureReason::RateLimited);
}

#[tokio::test]
async fn test_burst_of_failures_classified_suspicious() {
    let warden = setup_warden().await;
    warden
        .register(registration("a@x.com", "+15550001111", Role::Student))
        .await
        .unwrap();

    for _ in 0..5 {
        let _ = warden
            .login(login_request("a@x.com", "wrong-password"), ctx("10.0.0.1"))
            .await;
    }

    let filter = AttemptFilter {
        suspicious: Some(true),
        ..Default::default()
    };
    let report = warden.audit(&filter).await.unwrap();
    assert!(report.page.total >= 1);

    let flagged = &report.page.attempts[0];
    assert!(
        flagged
            .suspicious_reasons
            .contains(&SuspiciousReason::MultipleFailedAttempts)
    );
    assert!(
        flagged
            .suspicious_reasons
            .contains(&SuspiciousReason::BruteForcePattern)
    );
}

#[tokio::test]
async fn test_refresh_round_trip_and_refresh_after_lock() {
    let warden = setup_warden().await;
    warden
        .register(registration("a@x.com", "+15550001111", Role::Student))
        .await
        .unwrap();

    let success = warden
        .login(login_request("a@x.com", "secret1-long-enough"), ctx("10.0.0.1"))
        .await
        .unwrap();

    let refreshed = warden.refresh_token(&success.token).await.unwrap();
    assert_eq!(refreshed.claims.sub, success.claims.sub);
    assert!(warden.verify_token(&refreshed.token).is_ok());

    // Lock the account, then the same token must no longer refresh
    for _ in 0..5 {
        let _ = warden
            .login(login_request("a@x.com", "wrong-password"), ctx("10.0.0.1"))
            .await;
    }
    let result = warden.refresh_token(&refreshed.token).await;
    assert!(matches!(
        result,
        Err(Error::Auth(
            warden::error::AuthError::AccountLocked { .. }
        ))
    ));
}

#[tokio::test]
async fn test_concurrent_failures_never_lose_increments() {
    let warden = Arc::new(setup_warden().await);
    let account = warden
        .register(registration("a@x.com", "+15550001111", Role::Student))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let warden = warden.clone();
        handles.push(tokio::spawn(async move {
            let _ = warden
                .login(login_request("a@x.com", "wrong-password"), ctx("10.0.0.1"))
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stored = warden.account(&account.id).await.unwrap().unwrap();
    assert_eq!(stored.failed_login_attempts, 3);
}

#[tokio::test]
async fn test_access_grant_changes_redirect() {
    let warden = setup_warden().await;
    let account = warden
        .register(registration("a@x.com", "+15550001111", Role::Student))
        .await
        .unwrap();
    let admin = warden
        .register(registration("admin@x.com", "+15550009999", Role::Admin))
        .await
        .unwrap();

    warden
        .set_access(&account.id, true, &admin.id)
        .await
        .unwrap();

    let success = warden
        .login(login_request("a@x.com", "secret1-long-enough"), ctx("10.0.0.1"))
        .await
        .unwrap();
    assert_eq!(success.redirect_hint, RedirectHint::ProtectedArea);
    assert!(success.claims.has_access);
}

#[tokio::test]
async fn test_audit_trail_and_session_close() {
    let warden = setup_warden().await;
    warden
        .register(registration("a@x.com", "+15550001111", Role::Student))
        .await
        .unwrap();

    let _ = warden
        .login(login_request("a@x.com", "wrong-password"), ctx("10.0.0.1"))
        .await;
    let success = warden
        .login(login_request("a@x.com", "secret1-long-enough"), ctx("10.0.0.1"))
        .await
        .unwrap();

    let attempt_id = success.attempt_id.expect("audit row recorded");
    warden.close_session(attempt_id, 1800).await.unwrap();

    let report = warden.audit(&AttemptFilter::default()).await.unwrap();
    assert_eq!(report.page.total, 2);
    let closed = report
        .page
        .attempts
        .iter()
        .find(|a| a.id == attempt_id)
        .unwrap();
    assert_eq!(closed.session_duration_secs, Some(1800));
    assert_eq!(closed.device.browser.as_deref(), Some("Chrome"));

    let successes: i64 = report.daily.iter().map(|d| d.successes).sum();
    let failures: i64 = report.daily.iter().map(|d| d.failures).sum();
    assert_eq!(successes, 1);
    assert_eq!(failures, 1);

    assert_eq!(warden.dropped_audit_records(), 0);
}

#[tokio::test]
async fn test_health_check() {
    let warden = setup_warden().await;
    warden.health_check().await.unwrap();
}
