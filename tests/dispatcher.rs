//! Dispatcher integration tests over a real loopback listener.

mod common;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{json, Value};
use std::net::SocketAddr;

use local_share::config::ServerConfig;
use local_share::http::{send_html, send_json, Dispatcher, ServerError};
use local_share::routing::Method;

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn sample_dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new(ServerConfig::default());
    dispatcher
        .register_route(Method::Get, "/pages/:slug", |_req, params| async move {
            let slug = params.get("slug").unwrap_or_default().to_string();
            send_html(format!("<h1>{}</h1>", slug), StatusCode::OK)
        })
        .unwrap();
    dispatcher
        .register_route(Method::Get, "/images/*", |_req, params| async move {
            send_json(&json!({ "file": params.wildcard() }), StatusCode::OK)
        })
        .unwrap();
    dispatcher
        .register_route(Method::Post, "/echo", |req, _params| async move {
            match axum::body::to_bytes(req.into_body(), 64 * 1024).await {
                Ok(body) => (StatusCode::CREATED, body).into_response(),
                Err(_) => StatusCode::BAD_REQUEST.into_response(),
            }
        })
        .unwrap();
    dispatcher
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

#[tokio::test]
async fn test_named_param_reaches_handler() {
    let dispatcher = sample_dispatcher();
    let addr = dispatcher.start(0).await.unwrap();
    assert!(addr.ip().is_loopback());

    let response = client().get(url(addr, "/pages/about")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "text/html; charset=utf-8"
    );
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(response.text().await.unwrap(), "<h1>about</h1>");

    dispatcher.stop().await;
}

#[tokio::test]
async fn test_wildcard_captures_remaining_path() {
    let dispatcher = sample_dispatcher();
    let addr = dispatcher.start(0).await.unwrap();

    let response = client()
        .get(url(addr, "/images/a/b/c.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["file"], "a/b/c.png");

    dispatcher.stop().await;
}

#[tokio::test]
async fn test_post_route_receives_body() {
    let dispatcher = sample_dispatcher();
    let addr = dispatcher.start(0).await.unwrap();

    let response = client()
        .post(url(addr, "/echo"))
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    assert_eq!(response.headers()["access-control-max-age"], "86400");
    assert_eq!(response.text().await.unwrap(), "hello");

    dispatcher.stop().await;
}

#[tokio::test]
async fn test_preflight_answers_without_routing() {
    let dispatcher = sample_dispatcher();
    let addr = dispatcher.start(0).await.unwrap();

    let response = client()
        .request(reqwest::Method::OPTIONS, url(addr, "/anything/at/all"))
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Private-Network", "true")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let headers = response.headers().clone();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "GET, POST, OPTIONS");
    assert_eq!(
        headers["access-control-allow-headers"],
        "Content-Type, Access-Control-Request-Private-Network"
    );
    assert_eq!(headers["access-control-max-age"], "86400");
    assert_eq!(headers["access-control-allow-private-network"], "true");
    assert!(response.bytes().await.unwrap().is_empty());

    dispatcher.stop().await;
}

#[tokio::test]
async fn test_unmatched_request_is_json_404() {
    let dispatcher = sample_dispatcher();
    let addr = dispatcher.start(0).await.unwrap();

    // Right path, wrong method.
    let response = client().post(url(addr, "/pages/about")).send().await.unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        response.headers()["content-type"],
        "application/json; charset=utf-8"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No route for POST /pages/about");

    dispatcher.stop().await;
}

#[tokio::test]
async fn test_second_start_is_rejected_and_first_keeps_serving() {
    let dispatcher = sample_dispatcher();
    let addr = dispatcher.start(0).await.unwrap();

    match dispatcher.start(0).await {
        Err(ServerError::AlreadyRunning(current)) => assert_eq!(current, addr),
        other => panic!("expected AlreadyRunning, got {:?}", other),
    }

    let response = client().get(url(addr, "/pages/still-up")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    dispatcher.stop().await;
}

#[tokio::test]
async fn test_port_in_use_is_reported() {
    let holder = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = holder.local_addr().unwrap().port();

    let dispatcher = sample_dispatcher();
    match dispatcher.start(port).await {
        Err(ServerError::AddressInUse { port: reported }) => assert_eq!(reported, port),
        other => panic!("expected AddressInUse, got {:?}", other),
    }
    assert!(!dispatcher.is_listening().await);
}

#[tokio::test]
async fn test_stop_is_idempotent_and_restart_works() {
    let dispatcher = sample_dispatcher();
    dispatcher.stop().await;

    let addr = dispatcher.start(0).await.unwrap();
    dispatcher.stop().await;
    dispatcher.stop().await;
    assert!(!dispatcher.is_listening().await);
    assert!(client().get(url(addr, "/pages/x")).send().await.is_err());

    let again = dispatcher.start(addr.port()).await.unwrap();
    assert_eq!(again.port(), addr.port());
    assert_eq!(dispatcher.local_addr().await, Some(again));

    let response = client().get(url(again, "/pages/back")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "<h1>back</h1>");

    dispatcher.stop().await;
}
