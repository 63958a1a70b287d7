mod config;
mod rooms;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use engine::{Action, Player, Ruleset, SerializedState, VariantName};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::rooms::{LegalMove, RoomError, RoomStore, RoomView, Seated};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CreateRoomRequest {
    player_name: String,
    room: String,
    /// `seven_column` (default), `five_column` or `portal`.
    #[serde(default)]
    ruleset: Option<String>,
    #[serde(default = "default_secure_throne")]
    secure_throne: bool,
}

fn default_secure_throne() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JoinRequest {
    player_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActionRequest {
    session: String,
    action: Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreRequest {
    session: String,
    state: SerializedState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LeaveRequest {
    session: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LegalQuery {
    origin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LegalMovesResponse {
    id: String,
    turn: Player,
    origin: Option<String>,
    moves: Vec<LegalMove>,
}

#[derive(Clone)]
struct AppState {
    rooms: Arc<RoomStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    let state = AppState {
        rooms: Arc::new(RoomStore::new(config.broadcast_capacity)),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/rooms", post(create_room))
        .route("/rooms/:id", get(get_room))
        .route("/rooms/:id/join", post(join_room))
        .route("/rooms/:id/legal", get(get_legal))
        .route("/rooms/:id/action", post(play_action))
        .route("/rooms/:id/state", put(store_state))
        .route("/rooms/:id/leave", post(leave_room))
        .route("/ws/rooms/:id", get(ws_room))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = config.addr()?;
    info!("Starting server on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn create_room(
    State(app): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Json<Seated>, ApiError> {
    let variant = match req.ruleset.as_deref() {
        Some(name) => name
            .parse::<VariantName>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
        None => VariantName::SevenColumn,
    };
    let rules = Ruleset::preset(variant, req.secure_throne);
    Ok(Json(app.rooms.create(&req.room, &req.player_name, rules)?))
}

async fn join_room(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<Seated>, ApiError> {
    Ok(Json(app.rooms.join(&id, &req.player_name)?))
}

async fn get_room(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RoomView>, ApiError> {
    Ok(Json(app.rooms.get(&id)?))
}

async fn get_legal(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LegalQuery>,
) -> Result<Json<LegalMovesResponse>, ApiError> {
    let (turn, moves) = app.rooms.legal(&id, query.origin.as_deref())?;
    Ok(Json(LegalMovesResponse {
        id: id.trim().to_uppercase(),
        turn,
        origin: query.origin.as_ref().map(|v| v.trim().to_ascii_uppercase()),
        moves,
    }))
}

async fn play_action(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<RoomView>, ApiError> {
    Ok(Json(app.rooms.apply(&id, &req.session, req.action)?))
}

async fn store_state(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StoreRequest>,
) -> Result<Json<RoomView>, ApiError> {
    Ok(Json(app.rooms.store(&id, &req.session, &req.state)?))
}

async fn leave_room(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LeaveRequest>,
) -> Result<Json<RoomView>, ApiError> {
    Ok(Json(app.rooms.leave(&id, &req.session)?))
}

async fn ws_room(
    State(app): State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(app, id, socket))
}

async fn handle_ws(app: AppState, id: String, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (current, mut rx) = match app.rooms.subscribe(&id) {
        Ok(pair) => pair,
        Err(err) => {
            let _ = sender.send(Message::Text(err.to_string())).await;
            return;
        }
    };
    // Send current state once.
    if send_view(&mut sender, &current).await.is_err() {
        return;
    }

    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(view) => {
                    if send_view(&mut sender, &view).await.is_err() {
                        break;
                    }
                }
                // A later snapshot supersedes the dropped ones.
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }
}

async fn send_view<S>(sender: &mut S, view: &RoomView) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = serde_json::to_string(view).map_err(|_| ())?;
    sender.send(Message::Text(text)).await.map_err(|_| ())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }
}

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        let status = match &err {
            RoomError::NotFound => StatusCode::NOT_FOUND,
            RoomError::NameTaken(_)
            | RoomError::NotJoinable
            | RoomError::NotActive
            | RoomError::StaleWrite { .. } => StatusCode::CONFLICT,
            RoomError::UnknownSession | RoomError::NotYourTurn => StatusCode::FORBIDDEN,
            RoomError::InvalidName | RoomError::InvalidSnapshot(_) | RoomError::Engine(_) => {
                StatusCode::BAD_REQUEST
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "detail": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::EngineError;

    #[test]
    fn room_errors_map_to_statuses() {
        let cases = [
            (RoomError::NotFound, StatusCode::NOT_FOUND),
            (RoomError::NameTaken("FJORD".into()), StatusCode::CONFLICT),
            (RoomError::StaleWrite { expected: 3, got: 2 }, StatusCode::CONFLICT),
            (RoomError::NotYourTurn, StatusCode::FORBIDDEN),
            (RoomError::InvalidSnapshot("replay differs".into()), StatusCode::BAD_REQUEST),
            (RoomError::Engine(EngineError::IllegalMove), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn create_request_defaults() {
        let req: CreateRoomRequest =
            serde_json::from_str(r#"{"player_name":"Astrid","room":"fjord"}"#).unwrap();
        assert!(req.secure_throne);
        assert!(req.ruleset.is_none());
    }
}
