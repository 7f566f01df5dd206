//! End-to-end calls through the reqwest transport against a mock HTTP server.

mod common;

use common::{init_tracing, GlobalAudit};
use mockito::{Matcher, Server, ServerGuard};
use retrofit_rust::convert::HttpResponse;
use retrofit_rust::{
    BuiltClient, ClientBuilder, ClientDescriptor, Error, MapEnvironment, OperationDescriptor,
    RetrofitConfig, RetrofitContext, ReturnType, RetrySpec,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

/// Mock server plus a client whose base url points at it.
struct MockServerFixture {
    server: ServerGuard,
    client: Arc<BuiltClient>,
}

impl MockServerFixture {
    async fn new(config: RetrofitConfig) -> Self {
        init_tracing();
        let server = Server::new_async().await;
        let env = MapEnvironment::new().with("users.base-url", server.url());
        let ctx = RetrofitContext::builder()
            .config(config)
            .environment(Arc::new(env))
            .global_interceptor(Arc::new(GlobalAudit))
            .build()
            .unwrap();
        let descriptor = ClientDescriptor::new("users")
            .with_base_url("${users.base-url}/api")
            .with_operation(OperationDescriptor::get("get_user", "users/{id}"))
            .with_operation(
                OperationDescriptor::get("get_user_response", "users/{id}")
                    .returning(ReturnType::response("User")),
            )
            .with_operation(
                OperationDescriptor::get("flaky", "flaky").with_retry(RetrySpec::new(2, 10)),
            )
            .with_operation(OperationDescriptor::post("create_user", "users"))
            .with_operation(
                OperationDescriptor::get("ping", "ping").returning(ReturnType::body("String")),
            );
        let client = ClientBuilder::new(ctx).build(&Arc::new(descriptor)).unwrap();
        Self { server, client }
    }
}

#[tokio::test]
async fn test_get_with_path_and_query() {
    let mut fx = MockServerFixture::new(RetrofitConfig::default()).await;
    let mock = fx
        .server
        .mock("GET", "/api/users/7")
        .match_query(Matcher::UrlEncoded("expand".into(), "profile".into()))
        .match_header("x-audit", "1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":7,"name":"ada"}"#)
        .create_async()
        .await;

    let user: User = fx
        .client
        .call("get_user")
        .path_param("id", 7)
        .query("expand", "profile")
        .send()
        .await
        .unwrap();

    assert_eq!(user, User { id: 7, name: "ada".into() });
    mock.assert_async().await;
}

#[tokio::test]
async fn test_response_envelope() {
    let mut fx = MockServerFixture::new(RetrofitConfig::default()).await;
    let _mock = fx
        .server
        .mock("GET", "/api/users/1")
        .with_status(200)
        .with_header("x-request-id", "abc")
        .with_body(r#"{"id":1,"name":"bob"}"#)
        .create_async()
        .await;

    let response: HttpResponse<User> = fx
        .client
        .call("get_user_response")
        .path_param("id", 1)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.headers.get("x-request-id").map(String::as_str), Some("abc"));
    assert_eq!(response.body.name, "bob");
}

#[tokio::test]
async fn test_non_2xx_is_decoded_as_status_error() {
    let mut fx = MockServerFixture::new(RetrofitConfig::default()).await;
    let _mock = fx
        .server
        .mock("GET", "/api/users/404")
        .with_status(404)
        .with_body("no such user")
        .create_async()
        .await;

    let err = fx
        .client
        .call("get_user")
        .path_param("id", 404)
        .send::<User>()
        .await
        .unwrap_err();

    match err {
        Error::Status { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "no such user");
        }
        other => panic!("expected status error, got {other}"),
    }
}

#[tokio::test]
async fn test_declared_retry_recovers_from_503() {
    let mut fx = MockServerFixture::new(RetrofitConfig::default()).await;
    let unavailable = fx
        .server
        .mock("GET", "/api/flaky")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    let ok = fx
        .server
        .mock("GET", "/api/flaky")
        .with_status(200)
        .with_body(r#"{"id":2,"name":"eve"}"#)
        .expect(1)
        .create_async()
        .await;

    let user: User = fx.client.call("flaky").send().await.unwrap();

    assert_eq!(user.name, "eve");
    unavailable.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_post_json_body() {
    let mut fx = MockServerFixture::new(RetrofitConfig::default()).await;
    let mock = fx
        .server
        .mock("POST", "/api/users")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(serde_json::json!({"id": 5, "name": "kim"})))
        .with_status(201)
        .with_body(r#"{"id":5,"name":"kim"}"#)
        .create_async()
        .await;

    let created: User = fx
        .client
        .call("create_user")
        .json(&User { id: 5, name: "kim".into() })
        .send()
        .await
        .unwrap();

    assert_eq!(created.id, 5);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_string_body_uses_text_converter() {
    let mut fx = MockServerFixture::new(RetrofitConfig::default()).await;
    let _mock = fx
        .server
        .mock("GET", "/api/ping")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("pong")
        .create_async()
        .await;

    let pong: String = fx.client.call("ping").send().await.unwrap();
    assert_eq!(pong, "pong");
}

#[tokio::test]
async fn test_unfilled_path_parameter_is_rejected_locally() {
    let fx = MockServerFixture::new(RetrofitConfig::default()).await;
    let err = fx.client.call("get_user").send::<User>().await.unwrap_err();
    assert!(!err.is_configuration());
    assert!(err.to_string().contains("{id}"));
}
