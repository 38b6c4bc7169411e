//! End-to-end upload tests: the multipart uploader against a live image server.

use booty::config::ServerConfig;
use booty::context::AppContext;
use booty::core::{IMAGE_FIELD_NAME, TransferError, upload_multipart_file};
use booty::web::ImageServer;
use reqwest::StatusCode;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;
use tokio::net::TcpListener;

/// Start a server on an ephemeral port, returning its address.
async fn spawn_server(config: ServerConfig) -> (SocketAddr, Arc<ImageServer>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(ImageServer::new(AppContext::new(config)));

    let running = server.clone();
    tokio::spawn(async move { running.serve(listener).await });

    (addr, server)
}

fn server_config(upload_directory: &Path, images_directory: &Path) -> ServerConfig {
    ServerConfig {
        upload_directory: upload_directory.to_path_buf(),
        images_directory: images_directory.to_path_buf(),
        ..Default::default()
    }
}

/// All `.img` files in `dir`.
fn stored_images(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "img"))
        .collect()
}

async fn upload(addr: SocketAddr, field: &str, source: &Path) -> Result<reqwest::Response, TransferError> {
    let client = reqwest::Client::new();
    let uri = format!("http://{}/image", addr);
    upload_multipart_file(&client, &uri, field, source).await
}

#[tokio::test]
async fn test_ten_byte_upload_is_stored_under_client_address() {
    let temp = tempdir().unwrap();
    let uploads = temp.path().join("uploads");
    std::fs::create_dir(&uploads).unwrap();
    let (addr, server) = spawn_server(server_config(&uploads, temp.path())).await;

    let source = temp.path().join("disk.img");
    std::fs::write(&source, b"0123456789").unwrap();

    let response = upload(addr, IMAGE_FIELD_NAME, &source).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.bytes().await.unwrap().is_empty());

    let stored = stored_images(&uploads);
    assert_eq!(stored.len(), 1);

    let name = stored[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("127.0.0.1:"), "unexpected name {}", name);
    assert!(name.ends_with(".img"));
    assert_eq!(std::fs::read(&stored[0]).unwrap(), b"0123456789");

    server.shutdown();
}

#[tokio::test]
async fn test_uploads_of_various_sizes_are_byte_identical() {
    for size in [0usize, 1, 65_535, 1024 * 1024 + 17] {
        let temp = tempdir().unwrap();
        let (addr, server) = spawn_server(server_config(temp.path(), temp.path())).await;

        let content: Vec<u8> = (0..size).map(|i| (i * 31 % 256) as u8).collect();
        let source = temp.path().join("source.bin");
        std::fs::write(&source, &content).unwrap();

        let response = upload(addr, IMAGE_FIELD_NAME, &source).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "size {}", size);

        let stored = stored_images(temp.path());
        assert_eq!(stored.len(), 1, "size {}", size);
        let received = std::fs::read(&stored[0]).unwrap();
        assert_eq!(received.len(), size);
        assert!(received == content, "content mismatch for size {}", size);

        server.shutdown();
    }
}

#[tokio::test]
async fn test_missing_source_fails_before_any_request() {
    let temp = tempdir().unwrap();
    let (addr, server) = spawn_server(server_config(temp.path(), temp.path())).await;

    let err = upload(addr, IMAGE_FIELD_NAME, &temp.path().join("nope.img"))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Open { .. }));
    assert!(stored_images(temp.path()).is_empty());

    server.shutdown();
}

#[tokio::test]
async fn test_wrong_field_name_is_rejected_without_writing() {
    let temp = tempdir().unwrap();
    let (addr, server) = spawn_server(server_config(temp.path(), temp.path())).await;

    let source = temp.path().join("disk.bin");
    std::fs::write(&source, b"payload").unwrap();

    let response = upload(addr, "NotTheImage", &source).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(stored_images(temp.path()).is_empty());

    server.shutdown();
}

#[tokio::test]
async fn test_non_multipart_body_is_rejected() {
    let temp = tempdir().unwrap();
    let (addr, server) = spawn_server(server_config(temp.path(), temp.path())).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/image", addr))
        .body("just some bytes")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(stored_images(temp.path()).is_empty());

    server.shutdown();
}

#[tokio::test]
async fn test_unwritable_upload_directory_fails_only_that_request() {
    let temp = tempdir().unwrap();
    let missing = temp.path().join("does-not-exist");
    let (addr, server) = spawn_server(server_config(&missing, temp.path())).await;

    let source = temp.path().join("disk.bin");
    std::fs::write(&source, b"0123456789").unwrap();

    let response = upload(addr, IMAGE_FIELD_NAME, &source).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!missing.exists());

    // The server is still up for the next client
    let again = upload(addr, IMAGE_FIELD_NAME, &source).await.unwrap();
    assert_eq!(again.status(), StatusCode::INTERNAL_SERVER_ERROR);

    server.shutdown();
}

#[tokio::test]
async fn test_connection_refused_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let temp = tempdir().unwrap();
    let source = temp.path().join("disk.bin");
    std::fs::write(&source, b"0123456789").unwrap();

    let err = upload(addr, IMAGE_FIELD_NAME, &source).await.unwrap_err();
    match err {
        TransferError::Upload { http, .. } => assert!(http.is_some()),
        other => panic!("expected combined upload error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_static_images_are_served_under_prefix() {
    let temp = tempdir().unwrap();
    let images = temp.path().join("images");
    std::fs::create_dir(&images).unwrap();
    std::fs::write(images.join("ubuntu.img"), b"raw disk bytes").unwrap();
    let (addr, server) = spawn_server(server_config(temp.path(), &images)).await;

    let client = reqwest::Client::new();

    let found = client
        .get(format!("http://{}/images/ubuntu.img", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(found.status(), StatusCode::OK);
    assert_eq!(found.bytes().await.unwrap().as_ref(), b"raw disk bytes");

    let missing = client
        .get(format!("http://{}/images/absent.img", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    server.shutdown();
}
