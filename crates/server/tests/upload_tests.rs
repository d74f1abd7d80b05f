//! Integration tests for the chunked upload protocol.

mod common;

use axum::body::Body;
use axum::http::StatusCode;
use common::{TestServer, digest_hex, seeded_bytes, split_into_chunks};
use serde_json::json;

const MIB: usize = 1024 * 1024;

#[tokio::test]
async fn test_end_to_end_five_chunk_merge() {
    let server = TestServer::new().await;
    let data = seeded_bytes(1, 5 * MIB);
    let digest = digest_hex(&data);

    let (status, body) = server.get(&format!("/v1/media/{digest}/exists")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exists"], false);

    for (index, chunk) in split_into_chunks(&data, MIB).iter().enumerate() {
        let receipt = server.put_chunk(&digest, index as u32, chunk).await;
        assert_eq!(receipt["index"], index as u64);
        assert_eq!(receipt["size"], MIB as u64);
        assert_eq!(receipt["digest"], digest.as_str());
    }

    let (status, record) = server.merge(&digest, "lecture.mp4", 5).await;
    assert_eq!(status, StatusCode::OK, "merge failed: {record}");
    assert_eq!(record["id"], digest.as_str());
    assert_eq!(record["byte_size"], (5 * MIB) as u64);
    assert_eq!(record["filename"], "lecture.mp4");
    assert_eq!(record["file_type"], "001002");
    assert_eq!(record["mime_type"], "video/mp4");
    assert!(
        record["storage_path"]
            .as_str()
            .unwrap()
            .ends_with(&format!("/{digest}.mp4"))
    );
    assert!(!server.staging_path.join(&digest).exists());

    let stored = server
        .state
        .storage
        .get(record["storage_path"].as_str().unwrap())
        .await
        .unwrap();
    assert_eq!(stored, data);

    // Repeating the merge returns the same record and stores nothing new.
    let (status, again) = server.merge(&digest, "lecture.mp4", 5).await;
    assert_eq!(status, StatusCode::OK, "second merge failed: {again}");
    assert_eq!(again["id"], record["id"]);
    assert_eq!(again["storage_path"], record["storage_path"]);
    assert_eq!(again["created_at"], record["created_at"]);
    assert_eq!(server.object_count().await, 1);

    let (_, body) = server.get(&format!("/v1/media/{digest}/exists")).await;
    assert_eq!(body["exists"], true);
}

#[tokio::test]
async fn test_chunk_receipt_is_idempotent() {
    let server = TestServer::new().await;
    let data = seeded_bytes(2, 4096);
    let digest = digest_hex(&data);

    server.put_chunk(&digest, 0, &data).await;
    server.put_chunk(&digest, 0, &data).await;

    let session = server.staging_path.join(&digest);
    let entries: Vec<_> = std::fs::read_dir(&session)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(entries, vec!["0".to_string()]);
    assert_eq!(std::fs::read(session.join("0")).unwrap(), data.as_ref());

    let (status, body) = server
        .get(&format!("/v1/uploads/{digest}/chunks/0"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exists"], true);
}

#[tokio::test]
async fn test_replayed_chunk_overwrites_previous_bytes() {
    let server = TestServer::new().await;
    let data = seeded_bytes(3, 2048);
    let digest = digest_hex(&data);

    // A corrupt first attempt is replaced by the retry.
    server.put_chunk(&digest, 0, &seeded_bytes(99, 2048)).await;
    server.put_chunk(&digest, 0, &data).await;

    let (status, record) = server.merge(&digest, "clip.mov", 1).await;
    assert_eq!(status, StatusCode::OK, "merge failed: {record}");
    assert_eq!(record["byte_size"], 2048);
}

#[tokio::test]
async fn test_chunk_check_requires_non_empty_chunk() {
    let server = TestServer::new().await;
    let digest = digest_hex(b"whatever");

    let (_, body) = server
        .get(&format!("/v1/uploads/{digest}/chunks/0"))
        .await;
    assert_eq!(body["exists"], false);

    let (status, receipt) = server
        .request(
            "PUT",
            &format!("/v1/uploads/{digest}/chunks/0"),
            Body::empty(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["size"], 0);

    let (_, body) = server
        .get(&format!("/v1/uploads/{digest}/chunks/0"))
        .await;
    assert_eq!(body["exists"], false);
}

#[tokio::test]
async fn test_out_of_order_receipt_merges_in_index_order() {
    let server = TestServer::new().await;
    let data = seeded_bytes(4, 10_000);
    let digest = digest_hex(&data);
    let chunks = split_into_chunks(&data, 2_500);

    for index in [3usize, 1, 0, 2] {
        server.put_chunk(&digest, index as u32, &chunks[index]).await;
    }

    let (status, record) = server.merge(&digest, "notes.pdf", 4).await;
    assert_eq!(status, StatusCode::OK, "merge failed: {record}");

    let stored = server
        .state
        .storage
        .get(record["storage_path"].as_str().unwrap())
        .await
        .unwrap();
    assert_eq!(stored, data);
    assert_eq!(record["mime_type"], "application/pdf");
}

#[tokio::test]
async fn test_missing_chunk_is_named_and_nothing_is_stored() {
    let server = TestServer::new().await;
    let data = seeded_bytes(5, 5_000);
    let digest = digest_hex(&data);
    let chunks = split_into_chunks(&data, 1_000);

    for index in [0usize, 1, 2, 4] {
        server.put_chunk(&digest, index as u32, &chunks[index]).await;
    }

    let (status, body) = server.merge(&digest, "movie.mp4", 5).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "missing_chunk");
    assert!(body["message"].as_str().unwrap().contains("chunk 3"));

    assert_eq!(server.object_count().await, 0);
    assert!(server.metadata().get_record(&digest).await.unwrap().is_none());
    // Staged chunks stay for the client to complete.
    assert!(server.staging_path.join(&digest).join("4").exists());

    server.put_chunk(&digest, 3, &chunks[3]).await;
    let (status, record) = server.merge(&digest, "movie.mp4", 5).await;
    assert_eq!(status, StatusCode::OK, "merge failed: {record}");
    assert_eq!(record["byte_size"], 5_000);
}

#[tokio::test]
async fn test_empty_chunk_is_reported_missing_at_merge() {
    let server = TestServer::new().await;
    let data = seeded_bytes(15, 3_000);
    let digest = digest_hex(&data);
    let chunks = split_into_chunks(&data, 1_000);

    server.put_chunk(&digest, 0, &chunks[0]).await;
    server.put_chunk(&digest, 1, &[]).await;
    server.put_chunk(&digest, 2, &chunks[2]).await;

    let (status, body) = server.merge(&digest, "clip.mp4", 3).await;
    assert_eq!(status, StatusCode::CONFLICT, "unexpected: {body}");
    assert_eq!(body["code"], "missing_chunk");
    assert!(body["message"].as_str().unwrap().contains("chunk 1"));

    // Only the empty chunk needs restaging.
    assert!(server.staging_path.join(&digest).join("0").exists());
    assert!(server.staging_path.join(&digest).join("2").exists());
    assert_eq!(server.object_count().await, 0);

    server.put_chunk(&digest, 1, &chunks[1]).await;
    let (status, record) = server.merge(&digest, "clip.mp4", 3).await;
    assert_eq!(status, StatusCode::OK, "merge failed: {record}");
    assert_eq!(record["byte_size"], 3_000);
}

#[tokio::test]
async fn test_integrity_mismatch_rejects_and_commits_nothing() {
    let server = TestServer::new().await;
    let declared = seeded_bytes(6, 3_000);
    let digest = digest_hex(&declared);
    let actual = seeded_bytes(7, 3_000);

    for (index, chunk) in split_into_chunks(&actual, 1_000).iter().enumerate() {
        server.put_chunk(&digest, index as u32, chunk).await;
    }

    let (status, body) = server.merge(&digest, "video.mp4", 3).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "integrity_mismatch");

    assert!(server.metadata().get_record(&digest).await.unwrap().is_none());
    assert_eq!(server.object_count().await, 0);
    // The session is discarded; the client restages from scratch.
    assert!(!server.staging_path.join(&digest).exists());
}

#[tokio::test]
async fn test_dedup_convergence_across_file_names() {
    let server = TestServer::new().await;
    let data = seeded_bytes(8, 4_000);
    let digest = digest_hex(&data);

    for (index, chunk) in split_into_chunks(&data, 1_000).iter().enumerate() {
        server.put_chunk(&digest, index as u32, chunk).await;
    }
    let (status, first) = server.merge(&digest, "first.mp4", 4).await;
    assert_eq!(status, StatusCode::OK, "merge failed: {first}");

    // A second client checks before staging anything and skips the upload.
    let (_, body) = server.get(&format!("/v1/media/{digest}/exists")).await;
    assert_eq!(body["exists"], true);

    let (status, second) = server.merge(&digest, "second.mp4", 4).await;
    assert_eq!(status, StatusCode::OK, "dedup merge failed: {second}");
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["storage_path"], first["storage_path"]);
    assert_eq!(second["filename"], "second.mp4");
    assert_eq!(server.object_count().await, 1);
}

#[tokio::test]
async fn test_upper_case_digest_resolves_to_same_session() {
    let server = TestServer::new().await;
    let data = seeded_bytes(9, 1_500);
    let digest = digest_hex(&data);

    server.put_chunk(&digest.to_uppercase(), 0, &data).await;
    let (status, record) = server.merge(&digest, "a.bin", 1).await;
    assert_eq!(status, StatusCode::OK, "merge failed: {record}");
    assert_eq!(record["id"], digest.as_str());
}

#[tokio::test]
async fn test_merge_without_staged_chunks() {
    let server = TestServer::new().await;
    let digest = digest_hex(b"never staged");

    let (status, body) = server.merge(&digest, "a.mp4", 2).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "no_staged_chunks");
}

#[tokio::test]
async fn test_merge_rejects_invalid_requests() {
    let server = TestServer::new().await;
    let digest = digest_hex(b"x");
    server.put_chunk(&digest, 0, b"x").await;

    let (status, body) = server.merge(&digest, "a.mp4", 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let (status, _) = server.merge(&digest, "../escape.mp4", 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server.merge("not-a-digest", "a.mp4", 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_invalid_chunk_index_rejected() {
    let server = TestServer::new().await;
    let digest = digest_hex(b"x");

    let (status, body) = server
        .get(&format!("/v1/uploads/{digest}/chunks/minus-one"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_oversized_chunk_rejected() {
    let server = TestServer::with_config(|config| {
        config.server.max_chunk_size = 1024;
    })
    .await;
    let digest = digest_hex(b"big");

    let (status, body) = server
        .request(
            "PUT",
            &format!("/v1/uploads/{digest}/chunks/0"),
            Body::from(vec![7u8; 4096]),
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "chunk_too_large");

    let (_, body) = server
        .get(&format!("/v1/uploads/{digest}/chunks/0"))
        .await;
    assert_eq!(body["exists"], false);
}

#[tokio::test]
async fn test_merge_records_optional_metadata() {
    let server = TestServer::with_config(|config| {
        config.catalog.public_base_url = Some("https://cdn.example.com/media/".to_string());
        config.catalog.bucket = Some("video".to_string());
    })
    .await;
    let data = seeded_bytes(10, 2_000);
    let digest = digest_hex(&data);
    server.put_chunk(&digest, 0, &data).await;

    let (status, record) = server
        .post_json(
            &format!("/v1/uploads/{digest}/merge"),
            &json!({
                "file_name": "intro.webm",
                "chunk_total": 1,
                "file_type": "001003",
                "file_size": 999,
                "tags": "course,intro",
                "remark": "first cut"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "merge failed: {record}");
    assert_eq!(record["file_type"], "001003");
    // Declared size is advisory.
    assert_eq!(record["byte_size"], 2_000);
    assert_eq!(record["tags"], "course,intro");
    assert_eq!(record["remark"], "first cut");
    assert_eq!(record["bucket"], "video");
    let storage_path = record["storage_path"].as_str().unwrap();
    assert_eq!(
        record["url"],
        format!("https://cdn.example.com/media/{storage_path}")
    );
    assert_eq!(record["owner_id"], 1232141425);
}

#[tokio::test]
async fn test_concurrent_merges_of_same_digest_converge() {
    let server = TestServer::new().await;
    let data = seeded_bytes(11, 8_000);
    let digest = digest_hex(&data);

    for (index, chunk) in split_into_chunks(&data, 2_000).iter().enumerate() {
        server.put_chunk(&digest, index as u32, chunk).await;
    }

    let (a, b) = tokio::join!(
        server.merge(&digest, "a.mp4", 4),
        server.merge(&digest, "b.mp4", 4)
    );

    // One merge commits. The other either sees the record or finds the
    // session already cleared. Neither duplicates anything.
    let successes: Vec<_> = [&a, &b]
        .into_iter()
        .filter(|(status, _)| *status == StatusCode::OK)
        .collect();
    assert!(!successes.is_empty());
    for (_, record) in &successes {
        assert_eq!(record["id"], digest.as_str());
    }
    for (status, body) in [&a, &b] {
        if *status != StatusCode::OK {
            let code = body["code"].as_str().unwrap();
            assert!(
                code == "no_staged_chunks" || code == "missing_chunk",
                "unexpected failure: {body}"
            );
        }
    }

    let record = server.metadata().get_record(&digest).await.unwrap().unwrap();
    assert_eq!(record.byte_size, 8_000);
    assert_eq!(server.object_count().await, 1);
}
