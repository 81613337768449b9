use chrono::{Duration, Utc};
use mockito::Matcher;
use newsbot::auth::{AuthError, Credential, CredentialManager};
use std::path::Path;
use tokio::io::BufReader;

const SCOPE: &str = "https://www.googleapis.com/auth/blogger";

fn manager(dir: &Path) -> CredentialManager {
    CredentialManager::new(
        dir.join("client_secret.json"),
        dir.join("credentials.storage"),
        SCOPE,
        std::time::Duration::from_secs(5),
    )
    .unwrap()
}

fn stored(token_uri: &str, expires_in_minutes: i64, refresh: Option<&str>) -> Credential {
    Credential {
        access_token: "ya29.old".to_string(),
        refresh_token: refresh.map(str::to_string),
        token_expiry: Some(Utc::now() + Duration::minutes(expires_in_minutes)),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        token_uri: token_uri.to_string(),
        scopes: vec![SCOPE.to_string()],
    }
}

async fn write_store(dir: &Path, credential: &Credential) {
    tokio::fs::write(
        dir.join("credentials.storage"),
        serde_json::to_vec(credential).unwrap(),
    )
    .await
    .unwrap();
}

async fn read_store(dir: &Path) -> Credential {
    let data = tokio::fs::read_to_string(dir.join("credentials.storage")).await.unwrap();
    serde_json::from_str(&data).unwrap()
}

#[tokio::test]
async fn valid_stored_token_is_used_without_refresh() {
    let mut server = mockito::Server::new_async().await;
    let token_mock = server.mock("POST", "/token").expect(0).create_async().await;

    let dir = tempfile::tempdir().unwrap();
    let original = stored(&format!("{}/token", server.url()), 30, Some("1//refresh"));
    write_store(dir.path(), &original).await;

    let credential = manager(dir.path()).obtain_credential().await.expect("credential");

    assert_eq!(credential, original);
    token_mock.assert_async().await;
}

#[tokio::test]
async fn expired_token_is_refreshed_and_persisted() {
    let mut server = mockito::Server::new_async().await;
    let token_mock = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "1//refresh".into()),
            Matcher::UrlEncoded("client_id".into(), "client-id".into()),
            Matcher::UrlEncoded("client_secret".into(), "client-secret".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "ya29.new", "expires_in": 3599, "token_type": "Bearer"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_store(dir.path(), &stored(&format!("{}/token", server.url()), -5, Some("1//refresh"))).await;

    let credential = manager(dir.path()).obtain_credential().await.expect("credential");

    assert_eq!(credential.access_token, "ya29.new");
    assert_eq!(credential.refresh_token.as_deref(), Some("1//refresh"));
    assert!(credential.is_valid_at(Utc::now()));

    let on_disk = read_store(dir.path()).await;
    assert_eq!(on_disk, credential);
    assert!(!dir.path().join("credentials.storage.tmp").exists());

    token_mock.assert_async().await;
}

#[tokio::test]
async fn missing_store_requires_consent() {
    let dir = tempfile::tempdir().unwrap();

    let err = manager(dir.path()).obtain_credential().await.unwrap_err();

    assert!(matches!(err, AuthError::ConsentRequired { .. }));
    assert!(err.to_string().contains("newsbot authorize"));
}

#[tokio::test]
async fn expired_token_without_refresh_token_requires_consent() {
    let dir = tempfile::tempdir().unwrap();
    write_store(dir.path(), &stored("http://127.0.0.1:9/token", -5, None)).await;

    let err = manager(dir.path()).obtain_credential().await.unwrap_err();
    assert!(matches!(err, AuthError::ConsentRequired { .. }));
}

#[tokio::test]
async fn revoked_refresh_token_requires_consent() {
    let mut server = mockito::Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let original = stored(&format!("{}/token", server.url()), -5, Some("1//revoked"));
    write_store(dir.path(), &original).await;

    let err = manager(dir.path()).obtain_credential().await.unwrap_err();

    assert!(matches!(err, AuthError::ConsentRequired { .. }));
    // Store untouched
    assert_eq!(read_store(dir.path()).await, original);
}

#[tokio::test]
async fn rejected_client_is_a_token_endpoint_error() {
    let mut server = mockito::Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/token")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "invalid_client", "error_description": "The OAuth client was not found."}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let original = stored(&format!("{}/token", server.url()), -5, Some("1//refresh"));
    write_store(dir.path(), &original).await;

    let err = manager(dir.path()).obtain_credential().await.unwrap_err();

    match err {
        AuthError::TokenEndpoint(message) => assert!(message.contains("invalid_client")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(read_store(dir.path()).await, original);
}

#[tokio::test]
async fn out_of_range_expiry_is_an_error_not_a_crash() {
    let mut server = mockito::Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "ya29.new", "expires_in": 9223372036854775807, "token_type": "Bearer"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let original = stored(&format!("{}/token", server.url()), -5, Some("1//refresh"));
    write_store(dir.path(), &original).await;

    let err = manager(dir.path()).obtain_credential().await.unwrap_err();

    assert!(matches!(err, AuthError::TokenEndpoint(_)));
    assert!(err.to_string().contains("expires_in"));
    assert_eq!(read_store(dir.path()).await, original);
}

#[tokio::test]
async fn corrupt_store_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("credentials.storage"), "not json").await.unwrap();

    let err = manager(dir.path()).obtain_credential().await.unwrap_err();
    assert!(matches!(err, AuthError::CorruptStore { .. }));
}

#[tokio::test]
async fn interactive_authorization_exchanges_code_and_writes_store() {
    let mut server = mockito::Server::new_async().await;
    let token_mock = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "4/0Ab-code".into()),
            Matcher::UrlEncoded("redirect_uri".into(), "http://localhost".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "ya29.first", "expires_in": 3599, "refresh_token": "1//first", "token_type": "Bearer"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let secret = serde_json::json!({
        "installed": {
            "client_id": "abc.apps.googleusercontent.com",
            "client_secret": "shh",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": format!("{}/token", server.url()),
            "redirect_uris": ["http://localhost"]
        }
    });
    tokio::fs::write(dir.path().join("client_secret.json"), secret.to_string())
        .await
        .unwrap();

    let mut input = BufReader::new(&b"  4/0Ab-code  \n"[..]);
    let mut output: Vec<u8> = Vec::new();

    let credential = manager(dir.path())
        .authorize_interactive(&mut input, &mut output)
        .await
        .expect("authorize");

    let printed = String::from_utf8(output).unwrap();
    assert!(printed.contains("https://accounts.google.com/o/oauth2/auth?"));
    assert!(printed.contains("access_type=offline"));

    assert_eq!(credential.access_token, "ya29.first");
    assert_eq!(credential.refresh_token.as_deref(), Some("1//first"));
    assert_eq!(credential.client_id, "abc.apps.googleusercontent.com");
    assert_eq!(credential.scopes, vec![SCOPE.to_string()]);
    assert_eq!(read_store(dir.path()).await, credential);

    token_mock.assert_async().await;
}

#[tokio::test]
async fn interactive_authorization_requires_a_code() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(
        dir.path().join("client_secret.json"),
        r#"{"web": {"client_id": "id", "client_secret": "s"}}"#,
    )
    .await
    .unwrap();

    let mut input = BufReader::new(&b"\n"[..]);
    let mut output: Vec<u8> = Vec::new();

    let err = manager(dir.path())
        .authorize_interactive(&mut input, &mut output)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::MissingCode));
}

#[tokio::test]
async fn client_secret_without_known_section_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("client_secret.json"), r#"{"other": {}}"#)
        .await
        .unwrap();

    let err = manager(dir.path()).load_client_secret().await.unwrap_err();
    assert!(matches!(err, AuthError::ClientSecret { .. }));
}
