//! Object storage backend against an S3-compatible mock endpoint.

use std::sync::Arc;

use series_downloader::storage::{ObjectStorageBackend, ObjectStorageConfig, StorageBackend};
use series_downloader::{ExistenceLedger, StorageKind};
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BUCKET: &str = "comics";

fn list_page(keys: &[&str], next_token: Option<&str>) -> String {
    let contents: String = keys
        .iter()
        .map(|key| format!("<Contents><Key>{key}</Key><Size>3126</Size><StorageClass>STANDARD</StorageClass></Contents>"))
        .collect();
    let truncated = match next_token {
        Some(token) => format!("<IsTruncated>true</IsTruncated><NextContinuationToken>{token}</NextContinuationToken>"),
        None => "<IsTruncated>false</IsTruncated>".to_string(),
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>{BUCKET}</Name><Prefix>Series/Member_1/</Prefix><Delimiter>/</Delimiter><MaxKeys>1000</MaxKeys><KeyCount>{}</KeyCount>{truncated}{contents}</ListBucketResult>"#,
        keys.len()
    )
}

fn xml(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/xml")
        .set_body_string(body)
}

async fn backend(server: &MockServer) -> ObjectStorageBackend {
    let config = ObjectStorageConfig {
        access_key: "test-access".to_string(),
        secret_key: "test-secret".to_string(),
        endpoint_url: server.uri(),
        bucket: BUCKET.to_string(),
        region: "us-east-1".to_string(),
    };
    ObjectStorageBackend::connect(config).await.unwrap()
}

#[tokio::test]
async fn test_list_follows_continuation_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .and(query_param("list-type", "2"))
        .and(query_param("prefix", "Series/Member_1/"))
        .and(query_param("delimiter", "/"))
        .and(query_param_is_missing("continuation-token"))
        .respond_with(xml(list_page(&["Series/Member_1/", "Series/Member_1/002.jpg"], Some("page-2"))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .and(query_param("list-type", "2"))
        .and(query_param("continuation-token", "page-2"))
        .respond_with(xml(list_page(
            &["Series/Member_1/001.jpg", "Series/Member_1/notes.txt"],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let storage = backend(&server).await;
    let keys = storage.list("Series/Member_1").await.unwrap();
    assert_eq!(
        keys,
        vec![
            "Series/Member_1/001.jpg",
            "Series/Member_1/002.jpg",
            "Series/Member_1/notes.txt",
        ]
    );

    let ledger = ExistenceLedger::new(Arc::new(storage));
    let (exists, items) = ledger.member_exists("Series", "1").await;
    assert!(exists);
    assert_eq!(items, vec!["001.jpg", "002.jpg"]);
}

#[tokio::test]
async fn test_head_not_found_means_absent() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("/{BUCKET}/Series/Member_1/001.jpg")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path(format!("/{BUCKET}/Series/Member_1/002.jpg")))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", "3126"))
        .mount(&server)
        .await;

    let storage = backend(&server).await;
    assert!(!storage.exists("Series/Member_1/001.jpg").await.unwrap());
    assert!(storage.exists("Series/Member_1/002.jpg").await.unwrap());
}

#[tokio::test]
async fn test_head_server_error_fails_open_in_ledger() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("/{BUCKET}/Series/Member_1/001.jpg")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let storage = backend(&server).await;
    assert!(storage.exists("Series/Member_1/001.jpg").await.is_err());

    let ledger = ExistenceLedger::new(Arc::new(storage));
    assert_eq!(ledger.storage_kind(), StorageKind::Cloud);
    assert!(!ledger.item_exists("Series", "1", "001.jpg").await);
}

#[tokio::test]
async fn test_put_returns_object_url() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("/{BUCKET}/Series/Member_1/001.jpg")))
        .and(header("content-type", "image/jpeg"))
        .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"abc123\""))
        .expect(1)
        .mount(&server)
        .await;

    let storage = backend(&server).await;
    let location = storage
        .write_item("Series/Member_1/001.jpg", b"not really a jpeg", "image/jpeg")
        .await
        .unwrap();
    assert_eq!(location, format!("{}/{BUCKET}/Series/Member_1/001.jpg", server.uri()));
}

#[tokio::test]
async fn test_missing_metadata_reads_as_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}/Series/progress/Member_1.json")))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("content-type", "application/xml")
                .set_body_string(
                    r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Key>Series/progress/Member_1.json</Key><RequestId>r1</RequestId></Error>"#,
                ),
        )
        .mount(&server)
        .await;

    let storage = backend(&server).await;
    assert_eq!(storage.read_metadata("Series/progress/Member_1.json").await.unwrap(), None);
}
