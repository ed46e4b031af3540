mod auth;
mod clock;
mod config;
mod delivery;
mod directory;
mod error;
mod identity;
mod models;
mod otp;
mod rate_limit;
mod routes;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, header};
use axum::{Json, Router, routing::get};
use clap::Parser;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use auth::jwt::SessionCodec;
use auth::login::{LoginMode, LoginService};
use clock::SharedClock;
use config::{Config, ConfigError, EmailOtpMode, OtpChannel, PhoneChannel};
use delivery::{CodeTransport, EmailApiTransport};
use directory::GuestDirectory;
use directory::mock::MockDirectory;
use directory::sheets::SheetsDirectory;
use otp::OtpEngine;
use otp::derived::DerivedOtpEngine;
use otp::mock::MockOtpEngine;
use otp::stored::StoredOtpEngine;
use otp::twilio::TwilioVerifyEngine;
use rate_limit::RateLimiter;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self' 'unsafe-inline'; \
    style-src 'self' 'unsafe-inline'; img-src 'self' data: https://images.pexels.com; \
    font-src 'self'; connect-src 'self'; frame-ancestors 'none'";

#[derive(Parser)]
#[command(name = "rsvp-backend", about = "Wedding invite guest login and RSVP server")]
struct Args {
    /// Overrides HOST
    #[arg(long)]
    host: Option<String>,

    /// Overrides PORT
    #[arg(long)]
    port: Option<u16>,

    /// Directory of built frontend assets to serve (overrides STATIC_DIR)
    #[arg(long)]
    static_dir: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub login: Arc<LoginService>,
    pub directory: Arc<dyn GuestDirectory>,
    pub sessions: Arc<SessionCodec>,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::Startup(format!("failed to build HTTP client: {e}")))?;
        let clock = clock::system();

        let directory: Arc<dyn GuestDirectory> = if config.mock_sheets {
            tracing::warn!(guest = %config.mock_guest_name, "using mock guest directory");
            Arc::new(MockDirectory::new(config.mock_guest_name.clone()))
        } else {
            let sheets = config.sheets.as_ref().ok_or(ConfigError::Missing(
                "GOOGLE_SHEET_ID, GOOGLE_SERVICE_ACCOUNT_EMAIL and GOOGLE_PRIVATE_KEY",
            ))?;
            Arc::new(SheetsDirectory::new(http.clone(), sheets, clock.clone())?)
        };

        let sessions = Arc::new(SessionCodec::new(&config.jwt_secret));
        let login = LoginService::new(
            config.identity_kind,
            login_mode(&config, &http, &clock)?,
            RateLimiter::new(clock),
            directory.clone(),
            sessions.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            login: Arc::new(login),
            directory,
            sessions,
        })
    }
}

fn login_mode(
    config: &Config,
    http: &reqwest::Client,
    clock: &SharedClock,
) -> Result<LoginMode, ConfigError> {
    if config.bypass_otp {
        tracing::warn!("OTP verification is disabled, guests sign in on lookup alone");
        return Ok(LoginMode::Bypass);
    }
    if config.mock_otp {
        tracing::warn!("using mock OTP engine");
        return Ok(LoginMode::Challenge(Arc::new(MockOtpEngine::new(
            config.mock_otp_code.clone(),
        ))));
    }

    let engine: Arc<dyn OtpEngine> = match config.otp_channel {
        OtpChannel::Sms | OtpChannel::Whatsapp => {
            let channel = if config.otp_channel == OtpChannel::Sms {
                PhoneChannel::Sms
            } else {
                PhoneChannel::Whatsapp
            };
            let twilio = config.twilio.clone().ok_or(ConfigError::Missing(
                "TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_VERIFY_SERVICE_SID",
            ))?;
            Arc::new(TwilioVerifyEngine::new(http.clone(), twilio, channel))
        }
        OtpChannel::Email => {
            let email = config
                .email
                .clone()
                .ok_or(ConfigError::Missing("EMAIL_API_KEY and EMAIL_FROM"))?;
            let transport: Arc<dyn CodeTransport> =
                Arc::new(EmailApiTransport::new(http.clone(), email));
            match config.email_otp_mode {
                EmailOtpMode::Derived => Arc::new(DerivedOtpEngine::new(
                    config.otp_secret.as_bytes(),
                    transport,
                    clock.clone(),
                )),
                EmailOtpMode::Stored => Arc::new(StoredOtpEngine::new(transport, clock.clone())),
            }
        }
        OtpChannel::Skip => return Ok(LoginMode::Bypass),
    };
    Ok(LoginMode::Challenge(engine))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn security_header(name: header::HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(name, HeaderValue::from_static(value))
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/health", get(health))
        .merge(routes::api_router());

    if let Some(dir) = &state.config.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router = router
        .layer(security_header(header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .layer(security_header(header::X_FRAME_OPTIONS, "DENY"))
        .layer(security_header(
            header::REFERRER_POLICY,
            "strict-origin-when-cross-origin",
        ))
        .layer(security_header(
            header::STRICT_TRANSPORT_SECURITY,
            "max-age=31536000; includeSubDomains",
        ));

    if state.config.production {
        router = router.layer(security_header(
            header::CONTENT_SECURITY_POLICY,
            CONTENT_SECURITY_POLICY,
        ));
    } else {
        router = router.layer(CorsLayer::permissive());
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.static_dir.is_some() {
        config.static_dir = args.static_dir;
    }

    tracing::info!(
        identity = config.identity_kind.as_str(),
        channel = ?config.otp_channel,
        production = config.production,
        mock_otp = config.mock_otp,
        mock_sheets = config.mock_sheets,
        "starting"
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::from_config(config)?;
    let app = app(state);

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
