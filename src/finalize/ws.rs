//! Finalization trigger endpoint and the live progress WebSocket.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use super::orchestrator::Finalizer;
use crate::error::FinalizeError;

#[derive(Clone)]
pub struct FinalizeRouteState {
    pub finalizer: Arc<Finalizer>,
}

/// Build the finalization routes plus `/health`.
pub fn finalize_routes(finalizer: Arc<Finalizer>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/onboarding/finalize", post(finalize))
        .route("/ws/onboarding/progress", get(ws_handler))
        .with_state(FinalizeRouteState { finalizer })
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "property-onboarding"
    }))
}

/// POST /api/onboarding/finalize
///
/// Runs one attempt and returns its report. A fatal outcome is still a
/// 200: the report says what failed. 409 when an attempt is in flight.
///
/// The attempt runs on its own task, so a client hanging up mid-request
/// does not stop the pipeline halfway.
async fn finalize(State(state): State<FinalizeRouteState>) -> impl IntoResponse {
    let finalizer = Arc::clone(&state.finalizer);
    let handle = tokio::spawn(async move { finalizer.finalize().await });

    match handle.await {
        Ok(Ok(report)) => (StatusCode::OK, Json(serde_json::json!(report))),
        Ok(Err(FinalizeError::AlreadyRunning)) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": FinalizeError::AlreadyRunning.to_string()})),
        ),
        Err(e) => {
            error!(error = %e, "Finalization task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Finalization task failed"})),
            )
        }
    }
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<FinalizeRouteState>,
) -> impl IntoResponse {
    info!("Progress WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state.finalizer))
}

fn sync_message(finalizer: &Finalizer) -> String {
    serde_json::json!({
        "type": "sync",
        "running": finalizer.is_running(),
    })
    .to_string()
}

async fn handle_socket(mut socket: WebSocket, finalizer: Arc<Finalizer>) {
    // Subscribe before the sync frame so no event falls in between.
    let mut rx = finalizer.subscribe();

    if socket
        .send(Message::Text(sync_message(&finalizer).into()))
        .await
        .is_err()
    {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if socket.send(Message::Text(json.into())).await.is_err() {
                                debug!("Client disconnected during send");
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "Progress client lagged behind broadcast");
                        if socket
                            .send(Message::Text(sync_message(&finalizer).into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("Progress channel closed");
                        break;
                    }
                }
            }

            // Clients only listen; inbound frames are pings or close.
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Progress WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Progress WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
}
