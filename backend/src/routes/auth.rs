use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde_json::{Value, json};

use crate::AppState;
use crate::auth::jwt::{SESSION_EXPIRY_DAYS, SessionPayload};
use crate::auth::login::SendCodeOutcome;
use crate::auth::middleware::{ClientIp, GuestSession, SESSION_COOKIE};
use crate::error::AppError;
use crate::models::auth::{SendCodeRequest, SendCodeResponse, VerifyCodeRequest};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/send-otp", post(send_otp))
        .route("/api/auth/verify-otp", post(verify_otp))
        .route("/api/auth/me", get(me))
        .route("/api/auth/logout", post(logout))
        .route("/logout", get(logout_redirect))
}

async fn send_otp(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    body: Result<Json<SendCodeRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<SendCodeResponse>), AppError> {
    // A body that does not deserialize is answered like an unknown guest.
    let Json(body) = body.map_err(|rejection| {
        tracing::debug!(%rejection, "unreadable send-otp body");
        AppError::NotOnGuestList
    })?;
    let outcome = state
        .login
        .send_code(body.phone.as_deref(), body.email.as_deref(), &ip)
        .await?;

    match outcome {
        SendCodeOutcome::CodeSent { mock } => Ok((
            jar,
            Json(SendCodeResponse {
                mock,
                ..Default::default()
            }),
        )),
        SendCodeOutcome::Authenticated(session) => {
            let cookie = build_session_cookie(session.token, state.config.secure_cookies());
            Ok((
                jar.add(cookie),
                Json(SendCodeResponse {
                    skip_otp: true,
                    ..Default::default()
                }),
            ))
        }
    }
}

async fn verify_otp(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Json(body): Json<VerifyCodeRequest>,
) -> Result<(CookieJar, Json<Value>), AppError> {
    let session = state
        .login
        .verify_code(body.phone.as_deref(), body.email.as_deref(), &body.code, &ip)
        .await?;

    tracing::info!(name = %session.payload.name, "guest signed in");
    let cookie = build_session_cookie(session.token, state.config.secure_cookies());
    Ok((jar.add(cookie), Json(json!({ "success": true }))))
}

async fn me(GuestSession(session): GuestSession) -> Json<SessionPayload> {
    Json(session)
}

async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    (jar.remove(Cookie::build(SESSION_COOKIE).path("/")), StatusCode::NO_CONTENT)
}

async fn logout_redirect(jar: CookieJar) -> (CookieJar, Redirect) {
    (jar.remove(Cookie::build(SESSION_COOKIE).path("/")), Redirect::to("/"))
}

fn build_session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_EXPIRY_DAYS))
        .build()
}
