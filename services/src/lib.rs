use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, get, post};
use axum::Router;
use paperdrop_utils::version_info::{RuntimeEnv, format_version_for_runtime_env};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod database;
pub mod error;
pub mod files;
pub mod qr;
pub mod sanitize;
pub mod uploads;

use crate::config::Config;
use crate::database::MetadataStore;
use crate::qr::LinkArtifact;
use crate::uploads::UploadStore;

/// Uploads are capped at 25 MiB, enough headroom for scanned documents.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared state for all request handlers.
#[derive(Debug, Clone)]
pub struct AppState<S, A> {
    pub store: S,
    pub uploads: UploadStore,
    pub artifact: A,
    pub config: Config,
}

/// Build the application router over any metadata store and artifact
/// generator implementation.
pub fn routes<S, A>(store: S, uploads: UploadStore, artifact: A, config: Config) -> Router
where
    S: MetadataStore,
    A: LinkArtifact,
{
    let serve_pdfs = ServeDir::new(uploads.root());
    let state = AppState {
        store,
        uploads,
        artifact,
        config,
    };

    Router::new()
        .route("/upload", post(files::upload::<S, A>))
        .route("/tags", get(files::list_tags::<S, A>))
        .route("/is-health", get(health_check::<S, A>))
        .nest_service("/pdfs", serve_pdfs)
        .fallback(any(catch_all))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check<S, A>(State(state): State<AppState<S, A>>) -> impl IntoResponse
where
    S: MetadataStore,
    A: LinkArtifact,
{
    let mut response = if state.store.is_connected().await {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::BAD_GATEWAY, "502").into_response()
    };

    let env_value = state.config.environment().to_string();
    response.headers_mut().insert(
        HeaderName::from_static("x-service-env"),
        HeaderValue::from_str(&env_value).expect("environment header is valid ASCII"),
    );

    let runtime_env: RuntimeEnv = state.config.environment().into();
    let version_value = format_version_for_runtime_env(runtime_env);
    response.headers_mut().insert(
        HeaderName::from_static("x-service-version"),
        HeaderValue::from_str(&version_value).expect("version header is valid ASCII"),
    );

    response
}

async fn catch_all() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{FileRecord, MetadataResult, NewFile};
    use crate::qr::QrGenerator;
    use axum_test::TestServer;

    /// In-memory store stub for router-level tests that do not need SQLite.
    #[derive(Debug, Clone)]
    struct StubStore {
        connected: bool,
        tags: Vec<String>,
    }

    impl MetadataStore for StubStore {
        async fn is_connected(&self) -> bool {
            self.connected
        }

        async fn create_file_with_tags(
            &self,
            file: NewFile,
            _tags: &[String],
        ) -> MetadataResult<FileRecord> {
            Ok(FileRecord {
                id: 1,
                original_name: file.original_name,
                custom_name: file.custom_name,
                saved_filename: file.saved_filename,
                file_url: file.file_url,
                created_at: "2024-01-01 00:00:00".to_string(),
            })
        }

        async fn list_tag_names(&self) -> MetadataResult<Vec<String>> {
            Ok(self.tags.clone())
        }

        async fn get_file(&self, _id: i64) -> MetadataResult<Option<FileRecord>> {
            Ok(None)
        }

        async fn tags_for_file(&self, _id: i64) -> MetadataResult<Vec<String>> {
            Ok(self.tags.clone())
        }
    }

    async fn server(store: StubStore) -> (tempfile::TempDir, TestServer) {
        let dir = tempfile::tempdir().expect("tempdir");
        let uploads = UploadStore::new(dir.path().join("uploads"))
            .await
            .expect("upload dir");
        let router = routes(store, uploads, QrGenerator, Config::new_for_test());
        (dir, TestServer::new(router).expect("test server"))
    }

    #[tokio::test]
    async fn health_reports_ok_with_service_headers() {
        let (_dir, server) = server(StubStore {
            connected: true,
            tags: vec![],
        })
        .await;

        let response = server.get("/is-health").await;
        response.assert_status_ok();
        response.assert_text("OK");
        assert_eq!(response.header("x-service-env"), "test");
        assert!(!response.header("x-service-version").is_empty());
    }

    #[tokio::test]
    async fn health_reports_bad_gateway_when_store_is_down() {
        let (_dir, server) = server(StubStore {
            connected: false,
            tags: vec![],
        })
        .await;

        let response = server.get("/is-health").await;
        response.assert_status(StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn tags_endpoint_returns_store_contents() {
        let (_dir, server) = server(StubStore {
            connected: true,
            tags: vec!["invoices".to_string(), "reports".to_string()],
        })
        .await;

        let response = server.get("/tags").await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!(["invoices", "reports"]));
    }

    #[tokio::test]
    async fn unknown_routes_fall_through_to_404() {
        let (_dir, server) = server(StubStore {
            connected: true,
            tags: vec![],
        })
        .await;

        let response = server.get("/definitely-not-a-route").await;
        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_text("nothing to see here");
    }
}
