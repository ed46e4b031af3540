//! Test doubles shared by unit and router tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use tower::ServiceExt;

use crate::AppState;
use crate::auth::jwt::SessionCodec;
use crate::auth::login::{LoginMode, LoginService};
use crate::config::Config;
use crate::delivery::CodeTransport;
use crate::directory::{GuestDirectory, matches_identity};
use crate::error::AppError;
use crate::identity::Identity;
use crate::models::guest::{Guest, RsvpData};
use crate::otp::stored::StoredOtpEngine;
use crate::otp::{OtpEngine, SendOutcome};
use crate::rate_limit::RateLimiter;

pub struct MutableClock(Mutex<DateTime<Utc>>);

impl Default for MutableClock {
    fn default() -> Self {
        Self(Mutex::new(Utc.with_ymd_and_hms(2026, 10, 14, 9, 3, 0).unwrap()))
    }
}

impl MutableClock {
    pub fn advance_seconds(&self, seconds: i64) {
        *self.0.lock().unwrap() += TimeDelta::seconds(seconds);
    }

    pub fn advance_millis(&self, millis: i64) {
        *self.0.lock().unwrap() += TimeDelta::milliseconds(millis);
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Records every code handed over for delivery.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Identity, String)>>,
    fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn last_code(&self, to: &Identity) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(who, _)| who == to)
            .map(|(_, code)| code.clone())
    }

    pub fn deliveries(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl CodeTransport for RecordingTransport {
    async fn deliver(&self, to: &Identity, code: &str) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::Internal("provider unavailable".into()));
        }
        self.sent.lock().unwrap().push((to.clone(), code.to_string()));
        Ok(())
    }
}

/// Stands in for a provider-backed engine such as Twilio Verify.
pub struct RecordingEngine {
    sent: Mutex<Vec<Identity>>,
    verify_calls: AtomicUsize,
    accepted: String,
    fail: bool,
}

impl RecordingEngine {
    pub fn accepting(code: &str) -> Self {
        Self {
            sent: Mutex::default(),
            verify_calls: AtomicUsize::new(0),
            accepted: code.to_string(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::accepting("")
        }
    }

    pub fn sent(&self) -> Vec<Identity> {
        self.sent.lock().unwrap().clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OtpEngine for RecordingEngine {
    async fn send(&self, identity: &Identity) -> Result<SendOutcome, AppError> {
        if self.fail {
            return Err(AppError::Internal("provider unavailable".into()));
        }
        self.sent.lock().unwrap().push(identity.clone());
        Ok(SendOutcome::default())
    }

    async fn verify(&self, _identity: &Identity, code: &str) -> Result<bool, AppError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(code == self.accepted)
    }
}

/// An in-memory guest list.
#[derive(Default)]
pub struct MemoryDirectory {
    guests: Mutex<Vec<Guest>>,
}

impl MemoryDirectory {
    pub fn with_phone_guests(guests: &[(&str, &str)]) -> Self {
        let guests = guests
            .iter()
            .map(|(name, phone)| Guest {
                phone: phone.to_string(),
                ..Guest::pending(*name)
            })
            .collect();
        Self {
            guests: Mutex::new(guests),
        }
    }

    pub fn insert(&self, guest: Guest) {
        self.guests.lock().unwrap().push(guest);
    }

    pub fn guest(&self, identity: &Identity) -> Option<Guest> {
        self.guests
            .lock()
            .unwrap()
            .iter()
            .find(|g| matches_identity(&g.phone, &g.email, identity))
            .cloned()
    }

    pub fn remove(&self, identity: &Identity) {
        self.guests
            .lock()
            .unwrap()
            .retain(|g| !matches_identity(&g.phone, &g.email, identity));
    }
}

#[async_trait]
impl GuestDirectory for MemoryDirectory {
    async fn find(&self, identity: &Identity) -> Result<Option<Guest>, AppError> {
        Ok(self.guest(identity))
    }

    async fn update_rsvp(&self, identity: &Identity, rsvp: &RsvpData) -> Result<bool, AppError> {
        let mut guests = self.guests.lock().unwrap();
        let Some(guest) = guests
            .iter_mut()
            .find(|g| matches_identity(&g.phone, &g.email, identity))
        else {
            return Ok(false);
        };

        guest.rsvp_status = rsvp.status;
        guest.rsvp_submitted_at = Some(Utc::now().to_rfc3339());
        guest.dietary_notes = rsvp.dietary_notes.clone();
        guest.plus_one_attending = rsvp.plus_one_attending;
        guest.plus_one_name = rsvp.plus_one_name.clone();
        guest.notes = rsvp.notes.clone();
        Ok(true)
    }
}

pub const ADA_PHONE: &str = "+6598765432";
pub const ADA_EMAIL: &str = "ada@example.com";

pub fn test_config(vars: &[(&str, &str)]) -> Config {
    Config::from_lookup(|name| {
        vars.iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.to_string())
            .or_else(|| (name == "MOCK_MODE").then(|| "true".to_string()))
    })
    .unwrap()
}

/// The real router wired to in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub transport: Arc<RecordingTransport>,
    pub directory: Arc<MemoryDirectory>,
    pub sessions: Arc<SessionCodec>,
}

impl TestApp {
    /// Stored codes delivered through a recording transport.
    pub fn new(vars: &[(&str, &str)]) -> Self {
        let config = test_config(vars);
        let clock = Arc::new(MutableClock::default());
        let transport = Arc::new(RecordingTransport::default());
        let mode = if config.bypass_otp {
            LoginMode::Bypass
        } else {
            LoginMode::Challenge(Arc::new(StoredOtpEngine::new(
                transport.clone(),
                clock.clone(),
            )))
        };
        Self::assemble(config, mode, transport, clock)
    }

    pub fn with_engine(vars: &[(&str, &str)], engine: Arc<dyn OtpEngine>) -> Self {
        let config = test_config(vars);
        let clock = Arc::new(MutableClock::default());
        let transport = Arc::new(RecordingTransport::default());
        Self::assemble(config, LoginMode::Challenge(engine), transport, clock)
    }

    fn assemble(
        config: Config,
        mode: LoginMode,
        transport: Arc<RecordingTransport>,
        clock: Arc<MutableClock>,
    ) -> Self {
        let directory = Arc::new(MemoryDirectory::default());
        directory.insert(Guest {
            phone: ADA_PHONE.to_string(),
            email: ADA_EMAIL.to_string(),
            ..Guest::pending("Ada Lovelace")
        });

        let sessions = Arc::new(SessionCodec::new(&config.jwt_secret));
        let login = LoginService::new(
            config.identity_kind,
            mode,
            RateLimiter::new(clock),
            directory.clone(),
            sessions.clone(),
        );
        let state = AppState {
            config: Arc::new(config),
            login: Arc::new(login),
            directory: directory.clone(),
            sessions: sessions.clone(),
        };

        Self {
            router: crate::app(state),
            transport,
            directory,
            sessions,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.7");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// The `name=value` part of the session `Set-Cookie`, ready to send back.
    pub fn session_cookie(&self) -> Option<String> {
        self.set_cookie()
            .and_then(|c| c.split(';').next())
            .map(str::to_string)
    }

    pub fn set_cookie(&self) -> Option<&str> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("session="))
    }
}
