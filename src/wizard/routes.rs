//! REST endpoints for the draft and wizard navigation.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::engine::Wizard;
use super::step::{Mode, WizardStep};
use crate::draft::{AttachmentSummary, DraftFields, DraftPatch, DraftStore, is_supported_mime};
use crate::error::ApiError;

/// Shared state for wizard routes.
#[derive(Clone)]
pub struct WizardRouteState {
    pub wizard: Wizard,
}

impl WizardRouteState {
    pub fn new(draft: Arc<DraftStore>) -> Self {
        Self {
            wizard: Wizard::new(draft),
        }
    }

    fn draft(&self) -> &DraftStore {
        self.wizard.draft()
    }
}

/// Everything a client needs to render the current wizard screen.
#[derive(Debug, Serialize)]
pub struct DraftView {
    pub mode: Mode,
    pub current_step: WizardStep,
    pub steps: &'static [WizardStep],
    pub progress: f32,
    pub is_last_step: bool,
    pub fields: DraftFields,
    pub attachments: Vec<AttachmentSummary>,
}

impl DraftView {
    fn from_wizard(wizard: &Wizard) -> Self {
        let draft = wizard.draft().snapshot();
        Self {
            mode: draft.mode,
            current_step: draft.current_step,
            steps: draft.mode.steps(),
            progress: wizard.progress_fraction(),
            is_last_step: wizard.is_last_step(),
            attachments: draft.fields.attachments.iter().map(|a| a.summary()).collect(),
            fields: draft.fields,
        }
    }
}

fn view(state: &WizardRouteState) -> Response {
    Json(DraftView::from_wizard(&state.wizard)).into_response()
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

// ── Draft ───────────────────────────────────────────────────────────────

async fn get_draft(State(state): State<WizardRouteState>) -> impl IntoResponse {
    view(&state)
}

async fn patch_draft(
    State(state): State<WizardRouteState>,
    Json(patch): Json<DraftPatch>,
) -> impl IntoResponse {
    state.draft().patch(patch);
    view(&state)
}

async fn delete_draft(State(state): State<WizardRouteState>) -> impl IntoResponse {
    state.draft().reset();
    info!("Draft discarded by client");
    view(&state)
}

// ── Navigation ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ModeRequest {
    mode: Mode,
}

async fn set_mode(
    State(state): State<WizardRouteState>,
    Json(body): Json<ModeRequest>,
) -> impl IntoResponse {
    state.wizard.set_mode(body.mode);
    view(&state)
}

async fn next_step(State(state): State<WizardRouteState>) -> impl IntoResponse {
    state.wizard.next();
    view(&state)
}

async fn prev_step(State(state): State<WizardRouteState>) -> impl IntoResponse {
    state.wizard.prev();
    view(&state)
}

#[derive(Deserialize)]
struct JumpRequest {
    step: WizardStep,
}

async fn jump(
    State(state): State<WizardRouteState>,
    Json(body): Json<JumpRequest>,
) -> impl IntoResponse {
    match state.wizard.jump_to(body.step) {
        Ok(_) => view(&state),
        Err(e) => error(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

// ── Attachments ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AttachmentRequest {
    file_name: String,
    mime_type: String,
    data_base64: String,
}

/// POST /api/onboarding/attachments
///
/// Files stay local until finalization. Unsupported types are refused
/// here so they never reach the upload stage.
async fn add_attachment(
    State(state): State<WizardRouteState>,
    Json(body): Json<AttachmentRequest>,
) -> impl IntoResponse {
    if !is_supported_mime(&body.mime_type) {
        let e = ApiError::UnsupportedMediaType {
            mime_type: body.mime_type,
        };
        warn!(file_name = %body.file_name, error = %e, "Attachment refused");
        return error(StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string());
    }

    let bytes = match BASE64.decode(body.data_base64.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => return error(StatusCode::BAD_REQUEST, format!("Invalid base64 data: {e}")),
    };

    let size = bytes.len();
    let id = state
        .draft()
        .add_attachment(body.file_name, body.mime_type, bytes);
    info!(attachment_id = %id, size, "Attachment stored locally");
    (StatusCode::CREATED, Json(serde_json::json!({"id": id}))).into_response()
}

fn parse_id(id: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(id).map_err(|_| error(StatusCode::BAD_REQUEST, "Invalid attachment ID"))
}

async fn remove_attachment(
    State(state): State<WizardRouteState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if state.draft().remove_attachment(id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error(StatusCode::NOT_FOUND, "Attachment not found")
    }
}

async fn make_primary(
    State(state): State<WizardRouteState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if state.draft().set_primary_attachment(id) {
        view(&state)
    } else {
        error(StatusCode::NOT_FOUND, "Attachment not found")
    }
}

/// Build the draft and navigation routes.
pub fn wizard_routes(state: WizardRouteState) -> Router {
    Router::new()
        .route(
            "/api/onboarding/draft",
            get(get_draft).patch(patch_draft).delete(delete_draft),
        )
        .route("/api/onboarding/mode", post(set_mode))
        .route("/api/onboarding/next", post(next_step))
        .route("/api/onboarding/prev", post(prev_step))
        .route("/api/onboarding/jump", post(jump))
        .route("/api/onboarding/attachments", post(add_attachment))
        .route(
            "/api/onboarding/attachments/{id}",
            axum::routing::delete(remove_attachment),
        )
        .route(
            "/api/onboarding/attachments/{id}/primary",
            post(make_primary),
        )
        .with_state(state)
}
