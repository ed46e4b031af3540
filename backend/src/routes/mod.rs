pub mod auth;
pub mod calendar;
pub mod rsvp;

use axum::Router;
use crate::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(rsvp::router())
        .merge(calendar::router())
}
