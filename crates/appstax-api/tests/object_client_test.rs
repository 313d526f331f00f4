// Integration tests for `ObjectClient` using wiremock.
#![allow(clippy::unwrap_used)]

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appstax_api::{Error, ObjectClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ObjectClient) {
    let server = MockServer::start().await;
    let client = ObjectClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_find_all_unwraps_envelope() {
    let (server, client) = setup().await;

    let body = json!({
        "objects": [
            { "sysObjectId": "a1", "title": "Buy milk", "sysCreated": "2021" },
            { "sysObjectId": "a2", "title": "Walk dog", "sysCreated": "2020" },
        ]
    });

    Mock::given(method("GET"))
        .and(path("/objects/todos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let objects = client.find_all("todos", None).await.unwrap();

    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0]["sysObjectId"], "a1");
    assert_eq!(objects[1]["title"], "Walk dog");
}

#[tokio::test]
async fn test_find_sends_filter_and_expand() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/objects/todos"))
        .and(query_param("filter", "done = false"))
        .and(query_param("expand", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "objects": [{ "sysObjectId": "a1", "done": false }]
        })))
        .mount(&server)
        .await;

    let objects = client.find("todos", "done = false", Some(2)).await.unwrap();

    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0]["done"], false);
}

#[tokio::test]
async fn test_get_single_object_with_expand() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/objects/todos/a1"))
        .and(query_param("expand", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sysObjectId": "a1",
            "owner": {
                "sysDatatype": "relation",
                "sysRelationType": "single",
                "sysCollection": "users",
                "sysObjects": [{ "sysObjectId": "u1", "name": "Ada" }]
            }
        })))
        .mount(&server)
        .await;

    let object = client.get("todos", "a1", Some(1)).await.unwrap();

    assert_eq!(object["owner"]["sysCollection"], "users");
    assert_eq!(object["owner"]["sysObjects"][0]["name"], "Ada");
}

#[tokio::test]
async fn test_missing_objects_key_is_empty_list() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/objects/todos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let objects = client.find_all("todos", None).await.unwrap();
    assert!(objects.is_empty());
}

#[tokio::test]
async fn test_transport_config_sends_credential_headers() {
    let server = MockServer::start().await;
    let transport = TransportConfig::new(SecretString::from("app-key-1".to_owned()))
        .with_session(SecretString::from("session-7".to_owned()));
    let client = ObjectClient::new(server.uri().parse().unwrap(), &transport).unwrap();

    Mock::given(method("GET"))
        .and(path("/objects/notes"))
        .and(header("x-appstax-appkey", "app-key-1"))
        .and(header("x-appstax-sessionid", "session-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "objects": [] })))
        .expect(1)
        .mount(&server)
        .await;

    client.find_all("notes", None).await.unwrap();
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_error_401_without_session_is_invalid_app_key() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.find_all("todos", None).await;

    assert!(
        matches!(result, Err(Error::InvalidAppKey)),
        "expected InvalidAppKey, got: {result:?}"
    );
}

#[tokio::test]
async fn test_error_404_uses_error_message() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/objects/nope"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "errorMessage": "Collection not found" })),
        )
        .mount(&server)
        .await;

    let err = client.find_all("nope", None).await.unwrap_err();
    assert!(err.is_not_found());

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Collection not found");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_500_with_plain_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client.find("todos", "x = 1", None).await.unwrap_err();
    assert!(err.is_transient());

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let result = client.find_all("todos", None).await;

    match result {
        Err(Error::Deserialization { body, .. }) => assert_eq!(body, "<html>"),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}
