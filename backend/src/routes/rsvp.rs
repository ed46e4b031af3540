use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::AppState;
use crate::auth::middleware::GuestSession;
use crate::error::AppError;
use crate::identity::Identity;
use crate::models::guest::{Guest, SubmitRsvpRequest};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/rsvp", get(current))
        .route("/api/rsvp/submit", post(submit))
}

/// A token carrying neither a phone nor an email counts as no session.
fn session_identity(session: &GuestSession) -> Result<Identity, AppError> {
    Identity::from_session(&session.0).ok_or(AppError::Unauthorized)
}

async fn current(
    State(state): State<AppState>,
    session: GuestSession,
) -> Result<Json<Guest>, AppError> {
    let identity = session_identity(&session)?;
    let guest = state
        .directory
        .find(&identity)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(guest))
}

async fn submit(
    State(state): State<AppState>,
    session: GuestSession,
    Json(body): Json<SubmitRsvpRequest>,
) -> Result<Json<Value>, AppError> {
    let identity = session_identity(&session)?;
    let rsvp = body.validate()?;

    if !state.directory.update_rsvp(&identity, &rsvp).await? {
        return Err(AppError::Unauthorized);
    }

    tracing::info!(
        name = %session.0.name,
        status = rsvp.status.as_str(),
        "RSVP recorded"
    );
    Ok(Json(json!({ "success": true })))
}
