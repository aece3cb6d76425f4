use std::sync::Arc;

use mockito::Matcher;
use serde_json::json;

use reqflow::{ApiService, ErrorKind, InMemoryTokenStore, ServiceOptions, TokenStorage};

fn service_with_store(base_url: &str, store: InMemoryTokenStore) -> (ApiService, Arc<InMemoryTokenStore>) {
    let store = Arc::new(store);
    let service = ApiService::new(
        ServiceOptions::new(base_url),
        store.clone() as Arc<dyn TokenStorage>,
    )
    .unwrap();
    (service, store)
}

#[tokio::test]
async fn bearer_token_attached_from_storage() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer access-1")
        .with_status(200)
        .with_body(r#"{"code": 0, "data": {"name": "alice"}}"#)
        .create_async()
        .await;

    let (service, _store) =
        service_with_store(&server.url(), InMemoryTokenStore::with_tokens(Some("access-1"), None));
    service.get("/profile").await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn missing_access_token_triggers_refresh_before_request() {
    let mut server = mockito::Server::new_async().await;
    let refresh = server
        .mock("POST", "/api/user/refresh")
        .match_body(Matcher::Json(json!({"refreshToken": "refresh-1"})))
        .with_status(200)
        .with_body(r#"{"accessToken": "fresh-access"}"#)
        .expect(1)
        .create_async()
        .await;
    let data = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer fresh-access")
        .with_status(200)
        .with_body(r#"{"code": 0}"#)
        .expect(1)
        .create_async()
        .await;

    let (service, store) =
        service_with_store(&server.url(), InMemoryTokenStore::with_tokens(None, Some("refresh-1")));
    service.get("/profile").await.unwrap();

    refresh.assert_async().await;
    data.assert_async().await;
    assert_eq!(store.access_token().as_deref(), Some("fresh-access"));
}

#[tokio::test]
async fn unauthenticated_request_fails_without_transport() {
    let mut server = mockito::Server::new_async().await;
    let data = server.mock("GET", "/profile").expect(0).create_async().await;
    let refresh = server
        .mock("POST", "/api/user/refresh")
        .expect(0)
        .create_async()
        .await;

    let (service, _store) = service_with_store(&server.url(), InMemoryTokenStore::new());
    let mut rx = service.events().subscribe();

    let error = service.get("/profile").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Auth);
    assert_eq!(error.message(), "no refresh token");

    data.assert_async().await;
    refresh.assert_async().await;
    assert_eq!(rx.try_recv().unwrap().kind, ErrorKind::Auth);
}

#[tokio::test]
async fn unauthorized_response_refreshes_and_retries_once() {
    let mut server = mockito::Server::new_async().await;
    let stale = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/user/refresh")
        .match_body(Matcher::Json(json!({"refreshToken": "refresh-1"})))
        .with_status(200)
        .with_body(r#"{"accessToken": "fresh-access"}"#)
        .expect(1)
        .create_async()
        .await;
    let fresh = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer fresh-access")
        .with_status(200)
        .with_body(r#"{"code": 0, "data": "ok"}"#)
        .expect(1)
        .create_async()
        .await;

    let (service, store) = service_with_store(
        &server.url(),
        InMemoryTokenStore::with_tokens(Some("stale"), Some("refresh-1")),
    );
    let mut rx = service.events().subscribe();

    let body = service.get("/profile").await.unwrap();
    assert_eq!(body, json!({"code": 0, "data": "ok"}));

    stale.assert_async().await;
    refresh.assert_async().await;
    fresh.assert_async().await;
    assert_eq!(store.access_token().as_deref(), Some("fresh-access"));
    // the healed 401 is not surfaced to subscribers
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn second_unauthorized_after_refresh_is_terminal() {
    let mut server = mockito::Server::new_async().await;
    let data = server
        .mock("GET", "/profile")
        .with_status(401)
        .expect(2)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/user/refresh")
        .with_status(200)
        .with_body(r#"{"accessToken": "still-rejected"}"#)
        .expect(1)
        .create_async()
        .await;

    let (service, _store) = service_with_store(
        &server.url(),
        InMemoryTokenStore::with_tokens(Some("stale"), Some("refresh-1")),
    );

    let error = service.get("/profile").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Auth);
    assert_eq!(error.status(), Some(401));

    data.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn refresh_rejection_clears_tokens() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/user/refresh")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let (service, store) =
        service_with_store(&server.url(), InMemoryTokenStore::with_tokens(None, Some("refresh-1")));

    let error = service.get("/profile").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Auth);
    assert!(store.access_token().is_none());
    assert!(store.refresh_token().is_none());
}

#[tokio::test]
async fn concurrent_requests_share_one_refresh() {
    let mut server = mockito::Server::new_async().await;
    let refresh = server
        .mock("POST", "/api/user/refresh")
        .with_status(200)
        .with_body(r#"{"accessToken": "fresh-access"}"#)
        .expect(1)
        .create_async()
        .await;
    let first = server
        .mock("GET", "/a")
        .match_header("authorization", "Bearer fresh-access")
        .with_status(200)
        .with_body(r#"{"code": 0}"#)
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/b")
        .match_header("authorization", "Bearer fresh-access")
        .with_status(200)
        .with_body(r#"{"code": 0}"#)
        .expect(1)
        .create_async()
        .await;

    let (service, _store) =
        service_with_store(&server.url(), InMemoryTokenStore::with_tokens(None, Some("refresh-1")));

    let (a, b) = tokio::join!(service.get("/a"), service.get("/b"));
    a.unwrap();
    b.unwrap();

    refresh.assert_async().await;
    first.assert_async().await;
    second.assert_async().await;
    assert!(!service.auth().unwrap().is_refreshing().await);
}
