//! HTTP surface tests against a server on a loopback listener.

mod common;

use common::{client, spawn_server};
use pulse_lib::metrics::MetricsBackend;
use reqwest::{header, StatusCode};

#[tokio::test]
async fn test_gauge_round_trip() {
    let server = spawn_server().await;
    let client = client();

    let response = client
        .post(format!("{}/update/gauge/temperature/23.5", server.url()))
        .header(header::CONTENT_TYPE, "text/plain")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().is_empty());

    let response = client
        .get(format!("{}/value/gauge/temperature", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    assert_eq!(response.text().await.unwrap(), "23.5");

    server.shutdown().await;
}

#[tokio::test]
async fn test_counter_accumulates() {
    let server = spawn_server().await;
    let client = client();

    for delta in ["100", "50"] {
        let status = client
            .post(format!("{}/update/counter/requests/{delta}", server.url()))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, StatusCode::OK);
    }

    let body = client
        .get(format!("{}/value/counter/requests", server.url()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "150");

    server.shutdown().await;
}

#[tokio::test]
async fn test_gauge_is_replaced() {
    let server = spawn_server().await;
    let client = client();

    for value in ["23.5", "25"] {
        client
            .post(format!("{}/update/gauge/t/{value}", server.url()))
            .send()
            .await
            .unwrap();
    }

    let body = client
        .get(format!("{}/value/gauge/t", server.url()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "25");

    server.shutdown().await;
}

#[tokio::test]
async fn test_validation_statuses() {
    let server = spawn_server().await;
    let client = client();
    let url = server.url();

    let cases = [
        ("/update/invalid/x/1", StatusCode::BAD_REQUEST),
        ("/update/gauge//1", StatusCode::NOT_FOUND),
        ("/update/counter/x/abc", StatusCode::BAD_REQUEST),
        ("/update/gauge/x/1.5.2", StatusCode::BAD_REQUEST),
        ("/update/counter/x/1.5", StatusCode::BAD_REQUEST),
        ("/update/gauge/x", StatusCode::BAD_REQUEST),
        ("/update/gauge/x/1/extra", StatusCode::NOT_FOUND),
        ("/update/", StatusCode::BAD_REQUEST),
        ("/update", StatusCode::BAD_REQUEST),
    ];
    for (path, expected) in cases {
        let status = client.post(format!("{url}{path}")).send().await.unwrap().status();
        assert_eq!(status, expected, "POST {path}");
    }

    let status = client
        .get(format!("{url}/update/gauge/x/1"))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let status = client
        .post(format!("{url}/value/gauge/x"))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    // nothing was stored by the rejected requests
    assert!(server.storage.is_empty());
    server.shutdown().await;
}

#[tokio::test]
async fn test_error_bodies_are_short_reasons() {
    let server = spawn_server().await;
    let response = client()
        .post(format!("{}/update/histogram/x/1", server.url()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.text().await.unwrap(),
        "invalid metric type: \"histogram\""
    );
    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_reads() {
    let server = spawn_server().await;
    let client = client();

    let status = client
        .get(format!("{}/value/gauge/missing", server.url()))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, StatusCode::NOT_FOUND);

    // a counter is not visible as a gauge
    client
        .post(format!("{}/update/counter/hits/1", server.url()))
        .send()
        .await
        .unwrap();
    let status = client
        .get(format!("{}/value/gauge/hits", server.url()))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, StatusCode::NOT_FOUND);

    let status = client
        .get(format!("{}/value/summary/hits", server.url()))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    server.shutdown().await;
}

#[tokio::test]
async fn test_encoded_names() {
    let server = spawn_server().await;
    let client = client();

    client
        .post(format!("{}/update/gauge/cpu%2Fuser/0.25", server.url()))
        .send()
        .await
        .unwrap();

    assert_eq!(server.storage.gauge("cpu/user"), Some(0.25));
    let body = client
        .get(format!("{}/value/gauge/cpu%2Fuser", server.url()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "0.25");

    server.shutdown().await;
}

#[tokio::test]
async fn test_dashboard() {
    let server = spawn_server().await;
    let client = client();

    client
        .post(format!("{}/update/gauge/Alloc/2048", server.url()))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{}/update/counter/PollCount/4", server.url()))
        .send()
        .await
        .unwrap();

    let response = client.get(server.url()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    let html = response.text().await.unwrap();
    assert!(html.contains("<td>Alloc</td><td>2048</td>"));
    assert!(html.contains("<td>PollCount</td><td>4</td>"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_counter_updates() {
    const TASKS: usize = 8;
    const UPDATES: usize = 25;

    let server = spawn_server().await;
    let client = client();

    let mut handles = Vec::new();
    for _ in 0..TASKS {
        let client = client.clone();
        let url = format!("{}/update/counter/hits/1", server.url());
        handles.push(tokio::spawn(async move {
            for _ in 0..UPDATES {
                let status = client.post(&url).send().await.unwrap().status();
                assert_eq!(status, StatusCode::OK);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(server.storage.counter("hits"), Some((TASKS * UPDATES) as i64));
    server.shutdown().await;
}

#[tokio::test]
async fn test_health() {
    let server = spawn_server().await;
    let body = client()
        .get(format!("{}/health", server.url()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();

    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "pulse-server");
    server.shutdown().await;
}
