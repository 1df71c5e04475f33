use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::AppState;
use crate::progress::{ChannelKey, ProgressHub};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/progress/ws", get(progress_socket))
        .with_state(state)
}

async fn progress_socket(
    State(state): State<AppState>,
    user: AuthUser,
    ws: WebSocketUpgrade,
) -> Response {
    let hub = state.progress.clone();
    ws.on_upgrade(move |socket| forward_progress(socket, hub, user.id))
}

/// Relay the owner's progress events until either side goes away.
async fn forward_progress(mut socket: WebSocket, hub: ProgressHub, owner_id: Uuid) {
    let mut events = hub.subscribe(ChannelKey::owner(owner_id)).await;
    debug!(owner_id = %owner_id, "Progress subscriber connected");

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode progress event");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(owner_id = %owner_id, skipped, "Progress subscriber lagging");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(owner_id = %owner_id, "Progress subscriber disconnected");
}
