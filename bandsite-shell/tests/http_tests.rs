//! HTTP content fetching and backend API client against a local axum server

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bandsite_shell::loading::{ContentFetcher, HttpFetcher};
use bandsite_shell::services::{ApiClient, ContactForm};
use bandsite_shell::{ApiError, FetchError};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Request bodies the server received, newest last
type Received = Arc<Mutex<Vec<Value>>>;

async fn record(State(received): State<Received>, Json(body): Json<Value>) -> Json<Value> {
    received.lock().unwrap().push(body);
    Json(json!({ "success": true }))
}

/// Start the test server, returning its base URL
async fn serve(received: Received) -> String {
    let app = Router::new()
        .route("/site/pages/bio.html", get(|| async { "<h1>Bio</h1>" }))
        .route(
            "/site/pages/broken.html",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route("/api/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .route(
            "/api/tour-dates",
            get(|| async { Json(json!({ "dates": [{ "city": "Austin" }, { "city": "Denver" }] })) }),
        )
        .route("/api/music/latest", get(|| async { Json(json!({ "unexpected": 1 })) }))
        .route("/api/subscribe", post(record))
        .route("/api/contact", post(record))
        .route(
            "/api/booking",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, Json(json!({}))) }),
        )
        .with_state(received);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_http_fetcher_resolves_against_base_url() {
    let base = serve(Received::default()).await;
    let fetcher = HttpFetcher::new(&format!("{}/site/", base)).unwrap();

    assert_eq!(fetcher.fetch("pages/bio.html").await.unwrap(), "<h1>Bio</h1>");
    assert_eq!(
        fetcher.fetch("pages/missing.html").await,
        Err(FetchError::Status(404))
    );
    assert_eq!(
        fetcher.fetch("pages/broken.html").await,
        Err(FetchError::Status(500))
    );
}

#[tokio::test]
async fn test_http_fetcher_network_failure() {
    // Nothing listens on the port once the listener is dropped
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = HttpFetcher::new(&format!("http://{}/", addr)).unwrap();
    assert!(matches!(
        fetcher.fetch("pages/bio.html").await,
        Err(FetchError::Network(_))
    ));
}

#[tokio::test]
async fn test_api_reads() {
    let base = serve(Received::default()).await;
    let api = ApiClient::new(&format!("{}/api", base), Duration::from_secs(5)).unwrap();

    assert!(api.health_check().await);
    let dates = api.get_tour_dates().await;
    assert_eq!(dates.len(), 2);
    assert_eq!(dates[0]["city"], "Austin");
    // Missing `tracks` field reads as empty
    assert!(api.get_latest_music().await.is_empty());
}

#[tokio::test]
async fn test_api_posts_expected_payloads() {
    let received = Received::default();
    let base = serve(received.clone()).await;
    let api = ApiClient::new(&format!("{}/api", base), Duration::from_secs(5))
        .unwrap()
        .with_list_ids(vec![3, 7]);

    api.subscribe_email("fan@example.com").await.unwrap();
    api.submit_contact_form(&ContactForm {
        name: "Sam".to_string(),
        email: "sam@example.com".to_string(),
        message: "Would love to book you".to_string(),
        ..Default::default()
    })
    .await
    .unwrap();

    let bodies = received.lock().unwrap().clone();
    assert_eq!(bodies[0]["email"], "fan@example.com");
    assert_eq!(bodies[0]["list_ids"], json!([3, 7]));
    assert_eq!(bodies[0]["status"], "enabled");
    assert_eq!(bodies[0]["preconfirm_subscriptions"], false);
    assert_eq!(bodies[1]["subject"], "General Inquiry");
    assert_eq!(bodies[1]["type"], "general");
}

#[tokio::test]
async fn test_api_status_errors() {
    let base = serve(Received::default()).await;
    let api = ApiClient::new(&format!("{}/api", base), Duration::from_secs(5)).unwrap();

    let result = api.submit_booking_request(&Default::default()).await;
    assert_eq!(result.unwrap_err(), ApiError::Status(503));

    let unreachable = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
    assert!(!unreachable.health_check().await);
    assert!(unreachable.get_tour_dates().await.is_empty());
}
