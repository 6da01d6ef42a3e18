//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use picstash_core::config::{AppConfig, MetadataConfig, StorageConfig};
use picstash_metadata::{MetadataStore, SqliteStore};
use picstash_server::{AppState, create_router};
use picstash_storage::{FilesystemBackend, ImageStore};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "picstash-test-boundary";

/// A test server over SQLite and a filesystem upload dir in a temp directory.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub upload_dir: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with default configuration.
    pub async fn new() -> Self {
        Self::build(|_| {}, |storage, metadata| (storage, metadata)).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        Self::build(modifier, |storage, metadata| (storage, metadata)).await
    }

    /// Create a test server whose stores are wrapped, e.g. for fault injection.
    pub async fn with_stores<W>(wrap: W) -> Self
    where
        W: FnOnce(
            Arc<dyn ImageStore>,
            Arc<dyn MetadataStore>,
        ) -> (Arc<dyn ImageStore>, Arc<dyn MetadataStore>),
    {
        Self::build(|_| {}, wrap).await
    }

    pub async fn build<F, W>(modifier: F, wrap: W) -> Self
    where
        F: FnOnce(&mut AppConfig),
        W: FnOnce(
            Arc<dyn ImageStore>,
            Arc<dyn MetadataStore>,
        ) -> (Arc<dyn ImageStore>, Arc<dyn MetadataStore>),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let upload_dir = temp_dir.path().join("images");
        let storage: Arc<dyn ImageStore> = Arc::new(
            FilesystemBackend::new(&upload_dir)
                .await
                .expect("Failed to create storage backend"),
        );

        let mut config = AppConfig::for_testing();
        let db_path = temp_dir.path().join("metadata.db");
        config.storage = StorageConfig {
            upload_dir: upload_dir.clone(),
        };
        config.metadata = MetadataConfig::Sqlite {
            path: db_path.clone(),
        };
        modifier(&mut config);

        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path, &config.pool)
                .await
                .expect("Failed to create metadata store"),
        );

        let (storage, metadata) = wrap(storage, metadata);

        let state = AppState::new(config, storage, metadata);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            upload_dir,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Names of all files in the upload directory, sorted.
    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.upload_dir)
            .expect("Failed to read upload dir")
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Send a request and decode the JSON body (`Value::Null` when not JSON).
    pub async fn json_request(&self, method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        send(&self.router, request).await
    }

    /// Upload `data` as multipart field `file`.
    pub async fn upload(
        &self,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let body = multipart_body("file", Some(filename), Some(content_type), data);
        self.upload_raw(body).await
    }

    /// POST a prebuilt multipart body to `/api/upload`.
    pub async fn upload_raw(&self, body: Vec<u8>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        send(&self.router, request).await
    }

    /// Upload a small PNG and return the created image id.
    pub async fn upload_png(&self, name: &str) -> i64 {
        let (status, body) = self.upload(name, "image/png", &png_bytes(name)).await;
        assert_eq!(status, StatusCode::CREATED, "upload failed: {body}");
        body["image"]["id"].as_i64().unwrap()
    }
}

async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Build a single-part multipart body.
#[allow(dead_code)]
pub fn multipart_body(
    field: &str,
    filename: Option<&str>,
    content_type: Option<&str>,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());

    let mut disposition = format!("Content-Disposition: form-data; name=\"{field}\"");
    if let Some(filename) = filename {
        disposition.push_str(&format!("; filename=\"{filename}\""));
    }
    body.extend_from_slice(disposition.as_bytes());
    body.extend_from_slice(b"\r\n");

    if let Some(content_type) = content_type {
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// PNG signature followed by a payload unique to `seed`.
#[allow(dead_code)]
pub fn png_bytes(seed: &str) -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend_from_slice(seed.as_bytes());
    data
}
