use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use serde::Deserialize;
use tokio::sync::broadcast;

use super::attach::{NewCard, attach_card, detach_card};
use super::coordinator::{BoardServices, MoveCoordinator, MoveOutcome, load_board_view};
use super::db::DbHandle;
#[cfg(test)]
use super::db::BoardDb;
use super::models::{CardView, EntityRef};
use super::store::BoardStore;
use super::title::EntityResolver;
use crate::errors::KanbanError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub ws_tx: broadcast::Sender<String>,
    pub services: BoardServices,
}

impl AppState {
    /// State whose move events are forwarded to the WebSocket channel.
    pub fn new(
        db: DbHandle,
        ws_tx: broadcast::Sender<String>,
        entities: Arc<dyn EntityResolver>,
        title_attribute: impl Into<String>,
    ) -> Self {
        let services = BoardServices::new(Arc::new(ws_tx.clone()), entities, title_attribute);
        Self {
            db,
            ws_tx,
            services,
        }
    }
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateBoardRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateColumnRequest {
    pub name: String,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct AttachCardRequest {
    pub column_id: i64,
    pub entity_type: String,
    pub entity_id: i64,
}

#[derive(Deserialize)]
pub struct MoveCardRequest {
    pub column_id: i64,
    pub index: i64,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<KanbanError> for ApiError {
    fn from(err: KanbanError) -> Self {
        match err {
            e if e.is_not_found() => ApiError::NotFound(e.to_string()),
            KanbanError::ConstraintViolation(msg) => ApiError::Conflict(msg),
            e => {
                tracing::error!(error = %e, "request failed");
                ApiError::Internal(e.to_string())
            }
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/boards", get(list_boards).post(create_board))
        .route("/api/boards/{id}", get(get_board))
        .route("/api/boards/{id}/columns", post(create_column))
        .route("/api/boards/{id}/cards", post(create_card))
        .route("/api/boards/{id}/cards/{card_id}/move", patch(move_card))
        .route("/api/cards/{id}", delete(delete_card))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_boards(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let boards = state.db.run(|db| BoardStore::list_boards(db)).await?;
    Ok(Json(boards))
}

async fn create_board(
    State(state): State<SharedState>,
    Json(req): Json<CreateBoardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Board name must not be empty".into()));
    }
    let description = req.description;
    let board = state
        .db
        .run(move |db| {
            db.create_board(&name, description.as_deref())
                .map_err(KanbanError::from_db)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(board)))
}

async fn get_board(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let titles = state.services.titles.clone();
    let view = state
        .db
        .run(move |db| load_board_view(db, id, &titles))
        .await?;
    Ok(Json(view))
}

async fn create_column(
    State(state): State<SharedState>,
    Path(board_id): Path<i64>,
    Json(req): Json<CreateColumnRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Column name must not be empty".into()));
    }
    let color = req.color;
    let column = state
        .db
        .run(move |db| {
            BoardStore::get_board(db, board_id)?
                .ok_or(KanbanError::BoardNotFound { id: board_id })?;
            db.create_column(board_id, &name, color.as_deref())
                .map_err(KanbanError::from_db)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(column)))
}

async fn create_card(
    State(state): State<SharedState>,
    Path(board_id): Path<i64>,
    Json(req): Json<AttachCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.entity_type.trim().is_empty() {
        return Err(ApiError::BadRequest("entity_type must not be empty".into()));
    }
    let new = NewCard {
        board_id,
        column_id: req.column_id,
        entity: EntityRef::new(req.entity_type, req.entity_id),
    };
    let card = state.db.run(move |db| attach_card(db, &new)).await?;
    let title = state.services.titles.title_for(&card);
    Ok((StatusCode::CREATED, Json(CardView { card, title })))
}

/// Returns the board after the move. A card from another board leaves
/// everything untouched and the unchanged board is returned.
async fn move_card(
    State(state): State<SharedState>,
    Path((board_id, card_id)): Path<(i64, i64)>,
    Json(req): Json<MoveCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let services = state.services.clone();
    let view = state
        .db
        .run(move |db| {
            let coordinator = MoveCoordinator::mount(db, board_id, &services)?;
            match coordinator.move_card(card_id, req.column_id, req.index)? {
                MoveOutcome::Moved(view) => Ok(view),
                MoveOutcome::Ignored => coordinator.board_view(),
            }
        })
        .await?;
    Ok(Json(view))
}

async fn delete_card(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.run(move |db| detach_card(db, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::title::{EntityRegistry, ResolvedEntity};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_state() -> (SharedState, Arc<EntityRegistry>) {
        let db = BoardDb::new_in_memory().unwrap();
        let (ws_tx, _) = broadcast::channel(64);
        let registry = Arc::new(EntityRegistry::new());
        let state = Arc::new(AppState::new(
            DbHandle::new(db),
            ws_tx,
            registry.clone(),
            "title",
        ));
        (state, registry)
    }

    fn test_app() -> Router {
        api_router().with_state(test_state().0)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn id(value: &Value) -> i64 {
        value["id"].as_i64().unwrap()
    }

    fn column_cards(view: &Value, column: usize) -> Vec<(i64, i64)> {
        view["columns"][column]["cards"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| (c["id"].as_i64().unwrap(), c["position"].as_i64().unwrap()))
            .collect()
    }

    /// Board "Main" with Todo = [A, B, C] and Done = [D]. Returns
    /// (board id, todo id, done id, [A, B, C, D]).
    async fn seed(app: &Router) -> (i64, i64, i64, Vec<i64>) {
        let (_, board) = send(app, "POST", "/api/boards", Some(json!({"name": "Main"}))).await;
        let board_id = id(&board);
        let cols = format!("/api/boards/{}/columns", board_id);
        let (_, todo) = send(app, "POST", &cols, Some(json!({"name": "Todo"}))).await;
        let (_, done) = send(app, "POST", &cols, Some(json!({"name": "Done"}))).await;

        let cards_uri = format!("/api/boards/{}/cards", board_id);
        let mut ids = Vec::new();
        // Attaching prepends, so C goes in first.
        for (entity_id, column) in [(3, &todo), (2, &todo), (1, &todo), (4, &done)] {
            let (status, card) = send(
                app,
                "POST",
                &cards_uri,
                Some(json!({"column_id": id(column), "entity_type": "task", "entity_id": entity_id})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(id(&card));
        }
        let (c, b, a, d) = (ids[0], ids[1], ids[2], ids[3]);
        (board_id, id(&todo), id(&done), vec![a, b, c, d])
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();

        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_create_and_list_boards() {
        let app = test_app();

        let (status, boards) = send(&app, "GET", "/api/boards", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(boards.as_array().unwrap().is_empty());

        let (status, board) = send(
            &app,
            "POST",
            "/api/boards",
            Some(json!({"name": "Main", "description": "Team board"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(board["name"], "Main");
        assert_eq!(board["description"], "Team board");

        let (_, boards) = send(&app, "GET", "/api/boards", None).await;
        assert_eq!(boards.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_board_requires_name() {
        let app = test_app();
        let (status, body) = send(&app, "POST", "/api/boards", Some(json!({"name": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("name"));
    }

    #[tokio::test]
    async fn test_missing_board_is_404() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/api/boards/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Board 999 not found");

        let (status, _) = send(
            &app,
            "POST",
            "/api/boards/999/columns",
            Some(json!({"name": "Todo"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_board_view_orders_columns_and_cards() {
        let (state, registry) = test_state();
        registry.insert(ResolvedEntity::new("task", 1).with_field("title", "Fix bug"));
        let app = api_router().with_state(state);
        let (board_id, _, _, cards) = seed(&app).await;

        let (status, view) = send(&app, "GET", &format!("/api/boards/{}", board_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["columns"][0]["column"]["name"], "Todo");
        assert_eq!(view["columns"][1]["column"]["name"], "Done");
        assert_eq!(
            column_cards(&view, 0),
            vec![(cards[0], 0), (cards[1], 1), (cards[2], 2)]
        );
        assert_eq!(view["columns"][0]["cards"][0]["title"], "Fix bug");
        assert_eq!(
            view["columns"][0]["cards"][1]["title"],
            format!("Card #{}", cards[1])
        );
    }

    #[tokio::test]
    async fn test_move_card_across_columns() {
        let (state, _) = test_state();
        let mut rx = state.ws_tx.subscribe();
        let app = api_router().with_state(state);
        let (board_id, _, done, cards) = seed(&app).await;
        let (a, b, c, d) = (cards[0], cards[1], cards[2], cards[3]);
        // Creating boards, columns and cards publishes nothing.
        assert!(rx.try_recv().is_err());

        let (status, view) = send(
            &app,
            "PATCH",
            &format!("/api/boards/{}/cards/{}/move", board_id, b),
            Some(json!({"column_id": done, "index": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(column_cards(&view, 0), vec![(a, 0), (c, 1)]);
        assert_eq!(column_cards(&view, 1), vec![(b, 0), (d, 1)]);
        assert_eq!(view["columns"][1]["cards"][0]["column_id"], done);

        let msg: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["type"], "CardMoved");
        assert_eq!(msg["data"]["card"]["id"], b);
        assert_eq!(msg["data"]["previous_column"]["name"], "Todo");
        assert_eq!(msg["data"]["new_column"]["id"], done);
    }

    #[tokio::test]
    async fn test_move_card_clamps_index() {
        let app = test_app();
        let (board_id, todo, _, cards) = seed(&app).await;
        let (a, b, c) = (cards[0], cards[1], cards[2]);
        let uri = format!("/api/boards/{}/cards/{}/move", board_id, c);

        let (_, view) = send(&app, "PATCH", &uri, Some(json!({"column_id": todo, "index": -5}))).await;
        assert_eq!(column_cards(&view, 0), vec![(c, 0), (a, 1), (b, 2)]);

        let (_, view) = send(&app, "PATCH", &uri, Some(json!({"column_id": todo, "index": 1000}))).await;
        assert_eq!(column_cards(&view, 0), vec![(a, 0), (b, 1), (c, 2)]);
    }

    #[tokio::test]
    async fn test_move_card_from_other_board_is_ignored() {
        let (state, _) = test_state();
        let mut rx = state.ws_tx.subscribe();
        let app = api_router().with_state(state);
        let (board_id, todo, _, cards) = seed(&app).await;

        let (_, other) = send(&app, "POST", "/api/boards", Some(json!({"name": "Other"}))).await;
        let other_id = id(&other);
        let (_, other_col) = send(
            &app,
            "POST",
            &format!("/api/boards/{}/columns", other_id),
            Some(json!({"name": "Inbox"})),
        )
        .await;
        let (_, foreign) = send(
            &app,
            "POST",
            &format!("/api/boards/{}/cards", other_id),
            Some(json!({"column_id": id(&other_col), "entity_type": "task", "entity_id": 1})),
        )
        .await;

        let (status, view) = send(
            &app,
            "PATCH",
            &format!("/api/boards/{}/cards/{}/move", board_id, id(&foreign)),
            Some(json!({"column_id": todo, "index": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            column_cards(&view, 0),
            vec![(cards[0], 0), (cards[1], 1), (cards[2], 2)]
        );
        assert!(rx.try_recv().is_err());

        let (_, other_view) = send(&app, "GET", &format!("/api/boards/{}", other_id), None).await;
        assert_eq!(column_cards(&other_view, 0), vec![(id(&foreign), 0)]);
    }

    #[tokio::test]
    async fn test_move_card_not_found() {
        let app = test_app();
        let (board_id, todo, _, cards) = seed(&app).await;

        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/api/boards/{}/cards/9999/move", board_id),
            Some(json!({"column_id": todo, "index": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/api/boards/{}/cards/{}/move", board_id, cards[0]),
            Some(json!({"column_id": 9999, "index": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Column 9999 not found");
    }

    #[tokio::test]
    async fn test_duplicate_attach_is_conflict() {
        let app = test_app();
        let (board_id, todo, _, _) = seed(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/boards/{}/cards", board_id),
            Some(json!({"column_id": todo, "entity_type": "task", "entity_id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("UNIQUE"));
    }

    #[tokio::test]
    async fn test_delete_card_closes_gap() {
        let (state, _) = test_state();
        let mut rx = state.ws_tx.subscribe();
        let app = api_router().with_state(state);
        let (board_id, _, _, cards) = seed(&app).await;

        let (status, _) = send(&app, "DELETE", &format!("/api/cards/{}", cards[1]), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(rx.try_recv().is_err());

        let (_, view) = send(&app, "GET", &format!("/api/boards/{}", board_id), None).await;
        assert_eq!(column_cards(&view, 0), vec![(cards[0], 0), (cards[2], 1)]);

        let (status, _) = send(&app, "DELETE", &format!("/api/cards/{}", cards[1]), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
