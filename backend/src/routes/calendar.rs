use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;

use crate::AppState;
use crate::models::event::EventDetails;

const EVENT_HOURS: i64 = 4;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/calendar", get(calendar))
}

async fn calendar(State(state): State<AppState>) -> Response {
    match render_ics(&state.config.event) {
        Ok(ics) => (
            [
                (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"wedding.ics\""),
                (header::CACHE_CONTROL, "no-store"),
            ],
            ics,
        )
            .into_response(),
        Err(message) => {
            tracing::warn!(reason = message, "calendar requested but not available");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": message })),
            )
                .into_response()
        }
    }
}

fn ics_datetime(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn render_ics(event: &EventDetails) -> Result<String, &'static str> {
    let raw = event.datetime.as_deref().ok_or("Calendar not configured")?;
    let start = DateTime::parse_from_rfc3339(raw)
        .map_err(|_| "Invalid WEDDING_DATETIME")?
        .with_timezone(&Utc);
    let end = start + TimeDelta::hours(EVENT_HOURS);

    let location = [&event.venue_address, &event.venue_city, &event.venue_name]
        .into_iter()
        .filter(|part| !part.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//wedding-invite//calendar//EN".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("DTSTART:{}", ics_datetime(start)),
        format!("DTEND:{}", ics_datetime(end)),
        format!("SUMMARY:{} Wedding", event.couple_names),
    ];
    if !location.is_empty() {
        lines.push(format!("LOCATION:{location}"));
    }
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    let mut ics = lines.join("\r\n");
    ics.push_str("\r\n");
    Ok(ics)
}
