//! Integration tests for the HTTP surface.
//!
//! Each test spins up an Axum server on a random port and drives it with a
//! real HTTP client.

mod support;

use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use inbox_sync::routes::{AppState, sync_routes};

use support::{ACCOUNT, Harness, harness, push_body, test_config};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start an Axum server on a random port, return (base url, harness).
async fn start_server() -> (String, Harness) {
    let h = harness(test_config());
    let app = sync_routes(AppState {
        engine: h.engine.clone(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), h)
}

#[tokio::test]
async fn health_reports_ok() {
    timeout(TEST_TIMEOUT, async {
        let (base, _h) = start_server().await;
        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn push_is_acknowledged_and_processed() {
    timeout(TEST_TIMEOUT, async {
        let (base, h) = start_server().await;
        let client = reqwest::Client::new();

        h.mailbox.set_watch_history_id(100);
        let resp = client
            .post(format!("{base}/watch/start?userEmail={ACCOUNT}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let started: Value = resp.json().await.unwrap();
        assert_eq!(started["status"], "watch_started");
        assert_eq!(started["history_id"], 100);
        assert_eq!(started["expiration"], 1_763_000_000_000i64);

        h.mailbox
            .deliver(101, "201", "Credit card alert", "Rs.99 spent at Cafe on 1 Jan 2025");
        let resp = client
            .post(format!("{base}/gmail/push"))
            .header("content-type", "application/json")
            .body(push_body(ACCOUNT, json!(101)))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"status": "ok"}));

        assert_eq!(h.sink.ids(), vec!["201"]);
        assert_eq!(h.engine.cursor(ACCOUNT).await.unwrap(), Some(101));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn push_errors_map_to_status_classes() {
    timeout(TEST_TIMEOUT, async {
        let (base, _h) = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/gmail/push"))
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("envelope"));

        let resp = client
            .post(format!("{base}/gmail/push"))
            .body(push_body("stranger@example.com", json!("7")))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn missing_user_email_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (base, _h) = start_server().await;
        let client = reqwest::Client::new();

        for url in [
            format!("{base}/watch/start"),
            format!("{base}/emails/summary"),
            format!("{base}/emails/summary?userEmail="),
        ] {
            let resp = client.get(&url).send().await.unwrap();
            assert_eq!(resp.status(), 400, "{url}");
            let body: Value = resp.json().await.unwrap();
            assert_eq!(body["error"], "Missing userEmail parameter");
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn summary_endpoint_returns_latest_email() {
    timeout(TEST_TIMEOUT, async {
        let (base, h) = start_server().await;
        h.mailbox.deliver(5, "m5", "Weekly digest", "Nothing new");

        let resp = reqwest::get(format!("{base}/emails/summary?userEmail={ACCOUNT}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["user_email"], ACCOUNT);
        assert_eq!(body["count_last_30_days"], 1);
        assert_eq!(body["latest_email"]["id"], "m5");
        assert_eq!(body["latest_email"]["subject"], "Weekly digest");
        assert_eq!(body["latest_email"]["body"], "Nothing new");
    })
    .await
    .expect("test timed out");
}
