use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use super::api::{self, AppState};
use super::db::{BoardDb, DbHandle};
use super::title::{EntityRegistry, EntityResolver};
use super::ws;

/// Configuration for the board server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    pub title_attribute: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3141,
            db_path: PathBuf::from(".kanban/kanban.db"),
            dev_mode: false,
            title_attribute: "title".to_string(),
        }
    }
}

/// Build the full application router with API and WebSocket routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

/// Start the board server with an empty entity registry.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    start_server_with(config, Arc::new(EntityRegistry::new())).await
}

/// Start the board server, resolving card titles through `entities`.
pub async fn start_server_with(
    config: ServerConfig,
    entities: Arc<dyn EntityResolver>,
) -> Result<()> {
    // Ensure parent directory exists for DB
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let db = BoardDb::new(&config.db_path).context("Failed to initialize board database")?;
    let (ws_tx, _rx) = broadcast::channel::<String>(256);
    let state = Arc::new(AppState::new(
        DbHandle::new(db),
        ws_tx,
        entities,
        config.title_attribute.clone(),
    ));

    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        db = %config.db_path.display(),
        "kanban server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let db = BoardDb::new_in_memory().unwrap();
        let (ws_tx, _) = broadcast::channel(16);
        let state = Arc::new(AppState::new(
            DbHandle::new(db),
            ws_tx,
            Arc::new(EntityRegistry::new()),
            "title",
        ));
        build_router(state)
    }

    #[tokio::test]
    async fn test_health_via_full_router() {
        let app = test_router();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_routes_mounted() {
        let app = test_router();
        let req = Request::builder()
            .uri("/api/boards")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ws_route_mounted() {
        let app = test_router();
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        // A plain GET is not an upgrade request, but the route must exist.
        assert_ne!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = test_router();
        let req = Request::builder()
            .uri("/some/client/route")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_api_create_board_via_full_router() {
        let app = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/api/boards")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"name": "server-test"}).to_string(),
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let board: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(board["name"], "server-test");
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3141);
        assert_eq!(config.db_path, PathBuf::from(".kanban/kanban.db"));
        assert_eq!(config.title_attribute, "title");
        assert!(!config.dev_mode);
    }
}
