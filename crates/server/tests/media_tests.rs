//! Integration tests for direct upload, record lookup, preview URLs,
//! health and metrics.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{TestServer, digest_hex, seeded_bytes};
use tower::ServiceExt;

#[tokio::test]
async fn test_direct_upload_commits_record() {
    let server = TestServer::new().await;
    let data = seeded_bytes(1, 10_000);
    let digest = digest_hex(&data);

    let (status, record) = server
        .request(
            "POST",
            "/v1/media?file_name=cover.png&tags=banner",
            Body::from(data.to_vec()),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "upload failed: {record}");
    assert_eq!(record["id"], digest.as_str());
    assert_eq!(record["file_type"], "001001");
    assert_eq!(record["mime_type"], "image/png");
    assert_eq!(record["byte_size"], 10_000);
    assert_eq!(record["tags"], "banner");
    assert_eq!(record["status"], "1");
    assert_eq!(record["audit_status"], "002003");

    let (status, fetched) = server.get(&format!("/v1/media/{digest}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], record["id"]);
    assert_eq!(fetched["storage_path"], record["storage_path"]);
}

#[tokio::test]
async fn test_direct_upload_dedups_identical_content() {
    let server = TestServer::new().await;
    let data = seeded_bytes(2, 4_000);

    let (_, first) = server
        .request("POST", "/v1/media?file_name=a.jpg", Body::from(data.to_vec()))
        .await;
    let (status, second) = server
        .request("POST", "/v1/media?file_name=b.jpg", Body::from(data.to_vec()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["storage_path"], first["storage_path"]);
    assert_eq!(second["filename"], "b.jpg");
    assert_eq!(second["created_at"], first["created_at"]);
    assert_eq!(server.object_count().await, 1);
}

#[tokio::test]
async fn test_direct_upload_restores_missing_object() {
    let server = TestServer::new().await;
    let data = seeded_bytes(3, 2_000);

    let (_, first) = server
        .request("POST", "/v1/media?file_name=a.gif", Body::from(data.to_vec()))
        .await;
    let storage_path = first["storage_path"].as_str().unwrap().to_string();
    server.state.storage.delete(&storage_path).await.unwrap();

    let (status, second) = server
        .request("POST", "/v1/media?file_name=a.gif", Body::from(data.to_vec()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["storage_path"], storage_path.as_str());
    assert!(server.state.storage.exists(&storage_path).await.unwrap());
}

#[tokio::test]
async fn test_direct_upload_limits() {
    let server = TestServer::with_config(|config| {
        config.server.max_direct_upload_size = 1_000;
    })
    .await;

    let (status, body) = server
        .request("POST", "/v1/media?file_name=big.png", Body::from(vec![1u8; 2_000]))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "payload_too_large");

    let (status, body) = server
        .request("POST", "/v1/media?file_name=empty.png", Body::empty())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let (status, _) = server
        .request("POST", "/v1/media?file_name=a%2Fb.png", Body::from(vec![1u8; 10]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_unknown_media() {
    let server = TestServer::new().await;
    let (status, body) = server
        .get(&format!("/v1/media/{}", digest_hex(b"unknown")))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_preview_url() {
    let server = TestServer::new().await;
    let data = seeded_bytes(4, 1_000);
    let digest = digest_hex(&data);
    server
        .request("POST", "/v1/media?file_name=p.png", Body::from(data.to_vec()))
        .await;

    let (status, body) = server.get(&format!("/v1/media/{digest}/url")).await;
    assert_eq!(status, StatusCode::OK, "preview failed: {body}");
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("file://"));
    assert!(url.contains(&digest));
    assert!(url.contains("expires="));
    assert!(body["expires_at"].is_string());

    let (status, _) = server
        .get(&format!("/v1/media/{digest}/url?ttl_secs=60"))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server
        .get(&format!("/v1/media/{digest}/url?ttl_secs=0"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .get(&format!("/v1/media/{}/url", digest_hex(b"missing")))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;
    let (status, body) = server.get("/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage_backend"], "filesystem");
    assert_eq!(body["staging_root_exists"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_upload_counters() {
    let server = TestServer::new().await;
    let data = seeded_bytes(5, 100);
    server.put_chunk(&digest_hex(&data), 0, &data).await;

    let response = server
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("stash_chunks_received_total"));
    assert!(text.contains("stash_chunk_bytes_received_total"));
}

#[tokio::test]
async fn test_metrics_endpoint_can_be_disabled() {
    let server = TestServer::with_config(|config| {
        config.server.metrics_enabled = false;
    })
    .await;
    let (status, _) = server.get("/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
