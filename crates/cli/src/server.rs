//! HTTP surface for the dashboard.
//!
//! `GET /health`, `GET /api/preview`, `POST /api/execute`, plus an optional
//! static directory at `/`. The service is blocking; every call into it runs
//! on the blocking pool.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::services::ServeDir;

use autoreply_recon::{AutoReply, ExecuteReport, Preview, ReconError};

/// Error body is always `{"error": "<message>"}`.
#[derive(Debug)]
pub enum ApiError {
    /// Preview failures are reported uniformly
    Preview(ReconError),
    Execute(ReconError),
    /// Blocking task panicked or was cancelled
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Preview(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Execute(ReconError::MissingRequiredField { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Execute(ReconError::RunInProgress) => StatusCode::CONFLICT,
            ApiError::Execute(ReconError::SourceUnavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Preview(e) | ApiError::Execute(e) => e.to_string(),
            ApiError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            log::error!("{}", message);
        } else {
            log::warn!("{}", message);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(service: Arc<AutoReply>, static_dir: Option<PathBuf>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/api/preview", get(preview))
        .route("/api/execute", post(execute))
        .with_state(service);

    match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn preview(State(service): State<Arc<AutoReply>>) -> Result<Json<Preview>, ApiError> {
    let result = tokio::task::spawn_blocking(move || service.preview())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    result.map(Json).map_err(ApiError::Preview)
}

async fn execute(State(service): State<Arc<AutoReply>>) -> Result<Json<ExecuteReport>, ApiError> {
    let result = tokio::task::spawn_blocking(move || service.execute())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let batch = result.map_err(ApiError::Execute)?;
    Ok(Json(ExecuteReport::from(&batch)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("shutdown requested");
}

/// Bind and serve until Ctrl-C.
pub async fn serve(app: Router, bind: SocketAddr) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| format!("cannot bind {}: {}", bind, e))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("cannot read bound address: {}", e))?;

    log::info!("server is running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("server error: {}", e))?;

    log::info!("server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use autoreply_recon::{FieldNames, MemoryStore, RecordingNotifier};

    const HEADERS: &[&str] = &["姓名", "Email", "是否自動回覆"];

    fn app(store: &Arc<MemoryStore>, notifier: &Arc<RecordingNotifier>) -> Router {
        let service = AutoReply::new(store.clone(), notifier.clone());
        router(Arc::new(service), None)
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let (status, json) = call(app(&store, &notifier), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn preview_returns_headers_and_rows() {
        let store = Arc::new(MemoryStore::from_strs(&[HEADERS, &["Alice", "a@x.com"]]));
        let notifier = Arc::new(RecordingNotifier::new());
        let (status, json) = call(app(&store, &notifier), "GET", "/api/preview").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["headers"], json!(HEADERS));
        assert_eq!(
            json["data"][0],
            json!({ "_rowIndex": 2, "姓名": "Alice", "Email": "a@x.com", "是否自動回覆": "" })
        );
    }

    #[tokio::test]
    async fn preview_failure_is_500() {
        let store = Arc::new(MemoryStore::default());
        store.set_unavailable("quota exceeded");
        let notifier = Arc::new(RecordingNotifier::new());
        let (status, json) = call(app(&store, &notifier), "GET", "/api/preview").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn execute_reports_processed_count() {
        let store = Arc::new(MemoryStore::from_strs(&[
            HEADERS,
            &["Alice", "a@x.com", ""],
            &["Bob", "b@x.com", "Y"],
        ]));
        let notifier = Arc::new(RecordingNotifier::new());
        let (status, json) = call(app(&store, &notifier), "POST", "/api/execute").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "message": "執行完成", "processed": 1 }));
        assert_eq!(store.cell(2, 2), "Y");
    }

    #[tokio::test]
    async fn execute_with_row_failure_still_succeeds() {
        let store = Arc::new(MemoryStore::from_strs(&[
            HEADERS,
            &["Alice", "a@x.com", ""],
            &["Bob", "b@x.com", ""],
        ]));
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_for("a@x.com");
        let (status, json) = call(app(&store, &notifier), "POST", "/api/execute").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["processed"], 1);
    }

    #[tokio::test]
    async fn execute_missing_column_is_400() {
        let store = Arc::new(MemoryStore::from_strs(&[&["Name", "Email"], &["Alice", "a@x.com"]]));
        let notifier = Arc::new(RecordingNotifier::new());
        let service = AutoReply::new(store.clone(), notifier.clone()).with_fields(FieldNames {
            name: "Name".into(),
            email: "Email".into(),
            status: "Replied".into(),
        });
        let app = router(Arc::new(service), None);

        let (status, json) = call(app, "POST", "/api/execute").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({ "error": "missing required column(s): Replied" }));
        assert!(notifier.attempts().is_empty());
    }

    #[tokio::test]
    async fn execute_unavailable_source_is_500() {
        let store = Arc::new(MemoryStore::default());
        store.set_unavailable("connection refused");
        let notifier = Arc::new(RecordingNotifier::new());
        let (status, _) = call(app(&store, &notifier), "POST", "/api/execute").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn execute_requires_post() {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let req = Request::builder()
            .uri("/api/execute")
            .body(Body::empty())
            .unwrap();
        let resp = app(&store, &notifier).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn run_in_progress_maps_to_conflict() {
        assert_eq!(
            ApiError::Execute(ReconError::RunInProgress).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Preview(ReconError::MissingRequiredField { fields: vec![] }).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn static_dir_is_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>dashboard</h1>").unwrap();
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let service = AutoReply::new(store, notifier);
        let app = router(Arc::new(service), Some(dir.path().to_path_buf()));

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"<h1>dashboard</h1>");
    }
}
