//! Service-level flows over the in-memory store.

mod common;

use auth_core::*;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use uuid::Uuid;

use common::{service, ACCESS_SECRET, REFRESH_SECRET};

fn ana() -> RegisterRequest {
    RegisterRequest {
        fullname: "Ana Li".into(),
        email: "Ana@X.com".into(),
        password: "p@ss1234".into(),
        role: "user".into(),
    }
}

fn login_request(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.into(),
        password: password.into(),
    }
}

fn refresh_request(token: &str) -> RefreshTokenRequest {
    RefreshTokenRequest {
        refresh_token: token.into(),
    }
}

fn bearer(token: &str) -> TokenSources {
    TokenSources::new(Some(token.to_string()), None, None)
}

#[tokio::test]
async fn test_registration_and_login_scenario() {
    let (auth, store) = service();

    let user = auth.register(ana()).await.unwrap();
    assert_eq!(user.email, "ana@x.com");
    assert_eq!(user.fullname, "Ana Li");
    assert_eq!(user.role, UserRole::User);

    for email in ["ana@x.com", "ANA@X.COM", "  aNa@x.CoM "] {
        let mut req = ana();
        req.email = email.into();
        assert_eq!(auth.register(req).await.unwrap_err(), AuthError::DuplicateEmail);
    }
    assert_eq!(store.user_count().await, 1);

    let session = auth
        .login(login_request("ANA@X.COM", "p@ss1234"), TokenMetadata::default())
        .await
        .unwrap();
    assert_eq!(session.user, user);
    assert!(!session.access_token.is_empty());
    assert!(!session.refresh_token.is_empty());
    assert_eq!(session.token_type, "Bearer");
    assert_eq!(session.expires_in, 15 * 60);

    assert_eq!(
        auth.login(login_request("ana@x.com", "wrong"), TokenMetadata::default())
            .await
            .unwrap_err(),
        AuthError::InvalidCredentials
    );

    auth.logout(refresh_request(&session.refresh_token)).await.unwrap();
    auth.logout(refresh_request(&session.refresh_token)).await.unwrap();
    assert_eq!(store.refresh_token_count(user.id).await, 0);
}

#[tokio::test]
async fn test_access_token_carries_identity() {
    let (auth, _) = service();
    let user = auth.register(ana()).await.unwrap();

    let session = auth
        .login(login_request("ana@x.com", "p@ss1234"), TokenMetadata::default())
        .await
        .unwrap();

    let verified = auth.verify_token(&bearer(&session.access_token)).unwrap();
    assert_eq!(verified.id, user.id);
    assert_eq!(verified.role, UserRole::User);
    assert_eq!(verified.name, "Ana Li");

    // A refresh token is not an access token
    assert_eq!(
        auth.verify_token(&bearer(&session.refresh_token)).unwrap_err(),
        AuthError::Malformed
    );
}

#[tokio::test]
async fn test_back_to_back_logins_keep_one_session() {
    let (auth, store) = service();
    let user = auth.register(ana()).await.unwrap();

    let first = auth
        .login(login_request("ana@x.com", "p@ss1234"), TokenMetadata::default())
        .await
        .unwrap();
    let second = auth
        .login(login_request("ana@x.com", "p@ss1234"), TokenMetadata::default())
        .await
        .unwrap();

    assert_ne!(first.refresh_token, second.refresh_token);
    assert_eq!(store.refresh_token_count(user.id).await, 1);

    // The superseded token can neither refresh nor end the newer session
    assert_eq!(
        auth.refresh(refresh_request(&first.refresh_token)).await.unwrap_err(),
        AuthError::Malformed
    );
    auth.logout(refresh_request(&first.refresh_token)).await.unwrap();
    assert_eq!(store.refresh_token_count(user.id).await, 1);

    let refreshed = auth.refresh(refresh_request(&second.refresh_token)).await.unwrap();
    let verified = auth.verify_token(&bearer(&refreshed.access_token)).unwrap();
    assert_eq!(verified.id, user.id);
}

#[tokio::test]
async fn test_concurrent_logins_leave_one_record() {
    let (auth, store) = service();
    let user = auth.register(ana()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let auth = auth.clone();
        handles.push(tokio::spawn(async move {
            auth.login(login_request("ana@x.com", "p@ss1234"), TokenMetadata::default())
                .await
        }));
    }

    let mut tokens = Vec::new();
    for handle in handles {
        tokens.push(handle.await.unwrap().unwrap().refresh_token);
    }

    assert_eq!(store.refresh_token_count(user.id).await, 1);

    let mut live = 0;
    for token in &tokens {
        if auth.refresh(refresh_request(token)).await.is_ok() {
            live += 1;
        }
    }
    assert_eq!(live, 1);
}

#[tokio::test]
async fn test_concurrent_registrations_with_same_email() {
    let (auth, store) = service();

    let mut handles = Vec::new();
    for email in ["ana@x.com", "ANA@x.com", "Ana@X.com", "ana@X.COM"] {
        let auth = auth.clone();
        let mut req = ana();
        req.email = email.into();
        handles.push(tokio::spawn(async move { auth.register(req).await }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(e, AuthError::DuplicateEmail),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(store.user_count().await, 1);
}

#[tokio::test]
async fn test_logout_unknown_token_is_success() {
    let (auth, _) = service();
    auth.logout(refresh_request("never-issued")).await.unwrap();
}

#[tokio::test]
async fn test_refresh_after_logout_rejected() {
    let (auth, _) = service();
    auth.register(ana()).await.unwrap();

    let session = auth
        .login(login_request("ana@x.com", "p@ss1234"), TokenMetadata::default())
        .await
        .unwrap();
    auth.logout(refresh_request(&session.refresh_token)).await.unwrap();

    assert_eq!(
        auth.refresh(refresh_request(&session.refresh_token)).await.unwrap_err(),
        AuthError::Malformed
    );
}

#[test]
fn test_wrong_key_and_expired_tokens_rejected() {
    let (auth, _) = service();
    let now = Utc::now().timestamp();
    let claims = |iat: i64, exp: i64| {
        json!({ "id": Uuid::new_v4(), "role": "user", "name": "Ana Li", "iat": iat, "exp": exp })
    };

    let forged = encode(
        &Header::default(),
        &claims(now, now + 900),
        &EncodingKey::from_secret(b"some-other-key"),
    )
    .unwrap();
    assert_eq!(auth.verify_token(&bearer(&forged)).unwrap_err(), AuthError::Malformed);

    // Signed with the refresh key
    let wrong_kind = encode(
        &Header::default(),
        &claims(now, now + 900),
        &EncodingKey::from_secret(REFRESH_SECRET.as_bytes()),
    )
    .unwrap();
    assert_eq!(auth.verify_token(&bearer(&wrong_kind)).unwrap_err(), AuthError::Malformed);

    let expired = encode(
        &Header::default(),
        &claims(now - 3600, now - 60),
        &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
    )
    .unwrap();
    assert_eq!(auth.verify_token(&bearer(&expired)).unwrap_err(), AuthError::Expired);

    let mut not_yet = claims(now, now + 900);
    not_yet["nbf"] = json!(now + 600);
    let not_yet = encode(
        &Header::default(),
        &not_yet,
        &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
    )
    .unwrap();
    assert_eq!(auth.verify_token(&bearer(&not_yet)).unwrap_err(), AuthError::NotYetValid);

    assert_eq!(auth.verify_token(&bearer("not.a.jwt")).unwrap_err(), AuthError::Malformed);
}

#[tokio::test]
async fn test_login_records_client_metadata() {
    let (auth, store) = service();
    auth.register(ana()).await.unwrap();

    let metadata = TokenMetadata {
        user_agent: Some("curl/8.0".into()),
        ip_address: Some("203.0.113.7".into()),
    };
    let session = auth
        .login(login_request("ana@x.com", "p@ss1234"), metadata.clone())
        .await
        .unwrap();

    let record = store.find_by_token(&session.refresh_token).await.unwrap().unwrap();
    assert_eq!(record.user_id, session.user.id);
    assert_eq!(record.metadata, metadata);
    assert!(!record.is_expired());
}

#[tokio::test]
async fn test_storage_outage_surfaces_as_unavailable() {
    let (auth, store) = service();
    store.set_unavailable(true);

    assert!(matches!(
        auth.register(ana()).await,
        Err(AuthError::StorageUnavailable(_))
    ));
}

#[tokio::test]
async fn test_oversized_registration_fields_rejected() {
    let (auth, store) = service();

    let mut req = ana();
    req.fullname = "a".repeat(101);
    assert!(matches!(
        auth.register(req).await,
        Err(AuthError::Validation { field: "fullname", .. })
    ));

    let mut req = ana();
    req.email = format!("{}@x.com", "a".repeat(250));
    assert!(matches!(
        auth.register(req).await,
        Err(AuthError::Validation { field: "email", .. })
    ));
    assert_eq!(store.user_count().await, 0);

    let mut req = ana();
    req.fullname = "a".repeat(100);
    assert_eq!(auth.register(req).await.unwrap().fullname.len(), 100);
}
