use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo, Item, SAMPLE_JSON, SAMPLE_XML};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

// --- echo ---

#[tokio::test]
async fn echo_reports_method_path_query_and_body() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/echo/a/b?x=1&y=2")
                .header("X-Trace", "abc")
                .header("Cookie", "session=s1")
                .body("payload".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.path, "/echo/a/b");
    assert_eq!(echo.query.as_deref(), Some("x=1&y=2"));
    assert_eq!(echo.headers["x-trace"], "abc");
    assert_eq!(echo.headers["cookie"], "session=s1");
    assert_eq!(echo.body, "payload");
}

#[tokio::test]
async fn echo_accepts_non_standard_methods() {
    let resp = app().oneshot(empty("MERGE", "/anything")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "MERGE");
    assert_eq!(echo.query, None);
}

#[tokio::test]
async fn echo_joins_repeated_headers() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/echo")
                .header("Accept", "application/json")
                .header("Accept", "application/xml")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.headers["accept"], "application/json, application/xml");
}

// --- fixtures ---

#[tokio::test]
async fn json_fixture() {
    let resp = app().oneshot(empty("GET", "/json")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/json");
    assert_eq!(resp.headers()[http::header::SERVER], "mock-server");
    assert_eq!(body_bytes(resp).await, SAMPLE_JSON.as_bytes());
}

#[tokio::test]
async fn xml_fixture() {
    let resp = app().oneshot(empty("GET", "/xml")).await.unwrap();

    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/xml");
    assert_eq!(body_bytes(resp).await, SAMPLE_XML.as_bytes());
}

#[tokio::test]
async fn cookies_are_set_separately() {
    let resp = app().oneshot(empty("GET", "/cookies")).await.unwrap();

    let cookies: Vec<&str> = resp
        .headers()
        .get_all(http::header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(cookies, ["session=abc123; Path=/; HttpOnly", "theme=dark"]);
}

#[tokio::test]
async fn redirect_points_at_echo() {
    let resp = app().oneshot(empty("GET", "/redirect")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[http::header::LOCATION], "/echo");
}

#[tokio::test]
async fn status_returns_the_requested_code() {
    let resp = app().oneshot(empty("GET", "/status/418")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(body_bytes(resp).await, "status 418");

    let resp = app().oneshot(empty("GET", "/status/42")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn slow_answers_after_the_delay() {
    let started = std::time::Instant::now();
    let resp = app().oneshot(empty("GET", "/slow/50")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(started.elapsed() >= std::time::Duration::from_millis(50));
    assert_eq!(body_bytes(resp).await, "done");
}

#[tokio::test]
async fn bytes_returns_the_requested_length() {
    let resp = app().oneshot(empty("GET", "/bytes/5")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, "xxxxx");
}

// --- items ---

#[tokio::test]
async fn create_item_returns_201() {
    let resp = app()
        .oneshot(json_request("POST", "/items", r#"{"name":"wall","tags":["l1"]}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let item: Item = body_json(resp).await;
    assert_eq!(item.name, "wall");
    assert_eq!(item.tags, ["l1"]);
}

#[tokio::test]
async fn create_item_malformed_json_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/items", r#"{"not_name":1}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn get_item_bad_uuid_returns_400() {
    let resp = app().oneshot(empty("GET", "/items/not-a-uuid")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_item_is_not_found() {
    let nil = "/items/00000000-0000-0000-0000-000000000000";
    for method in ["GET", "DELETE"] {
        let resp = app().oneshot(empty(method, nil)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{method}");
    }
    let resp = app()
        .oneshot(json_request("PATCH", nil, r#"{"name":"x"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn item_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/items", r#"{"name":"wall"}"#))
        .await
        .unwrap();
    let created: Item = body_json(resp).await;
    let id = created.id;

    // patch keeps fields it does not mention
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("PATCH", &format!("/items/{id}"), r#"{"tags":["exterior"]}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Item = body_json(resp).await;
    assert_eq!(updated.name, "wall");
    assert_eq!(updated.tags, ["exterior"]);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("PUT", &format!("/items/{id}"), r#"{"name":"slab"}"#))
        .await
        .unwrap();
    let updated: Item = body_json(resp).await;
    assert_eq!(updated.name, "slab");
    assert_eq!(updated.tags, ["exterior"]);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty("GET", "/items"))
        .await
        .unwrap();
    let items: Vec<Item> = body_json(resp).await;
    assert_eq!(items, [updated]);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty("DELETE", &format!("/items/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty("GET", &format!("/items/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
