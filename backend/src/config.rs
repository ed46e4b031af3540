use std::env;

use crate::identity::IdentityKind;
use crate::models::event::EventDetails;

const DEV_JWT_SECRET: &str = "dev-secret-change-in-production";
const TWILIO_VERIFY_URL: &str = "https://verify.twilio.com/v2";
const EMAIL_API_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpChannel {
    Sms,
    Whatsapp,
    Email,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneChannel {
    Sms,
    Whatsapp,
}

impl PhoneChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Whatsapp => "whatsapp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailOtpMode {
    /// HMAC of identity and time window; nothing stored.
    Derived,
    /// Random code held in process memory.
    Stored,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub verify_service_sid: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct EmailApiConfig {
    pub url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub sheet_id: String,
    pub client_email: String,
    pub private_key: String,
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    Missing(&'static str),
    Incompatible(&'static str),
    Startup(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid {
                name,
                value,
                expected,
            } => write!(f, "invalid {name}: \"{value}\", expected one of: {expected}"),
            Self::Missing(name) => write!(f, "{name} must be set"),
            Self::Incompatible(msg) => write!(f, "{msg}"),
            Self::Startup(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<String>,
    pub production: bool,
    pub identity_kind: IdentityKind,
    pub otp_channel: OtpChannel,
    pub bypass_otp: bool,
    pub email_otp_mode: EmailOtpMode,
    pub jwt_secret: String,
    pub otp_secret: String,
    pub mock_otp: bool,
    pub mock_sheets: bool,
    pub mock_otp_code: String,
    pub mock_guest_name: String,
    pub twilio: Option<TwilioConfig>,
    pub email: Option<EmailApiConfig>,
    pub sheets: Option<SheetsConfig>,
    pub event: EventDetails,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |name: &str| var(name).is_some_and(|v| v == "true" || v == "1");

        let production = var("APP_ENV").is_some_and(|v| v == "production");
        let mock_mode = flag("MOCK_MODE");

        let otp_channel = match var("OTP_CHANNEL").as_deref() {
            None | Some("sms") => OtpChannel::Sms,
            Some("whatsapp") => OtpChannel::Whatsapp,
            Some("email") => OtpChannel::Email,
            Some("skip") => OtpChannel::Skip,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "OTP_CHANNEL",
                    value: other.to_string(),
                    expected: "sms, whatsapp, email, skip",
                });
            }
        };

        let identity_kind = match var("IDENTITY_KIND").as_deref() {
            None if otp_channel == OtpChannel::Email => IdentityKind::Email,
            None | Some("phone") => IdentityKind::Phone,
            Some("email") => IdentityKind::Email,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "IDENTITY_KIND",
                    value: other.to_string(),
                    expected: "phone, email",
                });
            }
        };

        let email_otp_mode = match var("EMAIL_OTP_MODE").as_deref() {
            None | Some("derived") => EmailOtpMode::Derived,
            Some("stored") => EmailOtpMode::Stored,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "EMAIL_OTP_MODE",
                    value: other.to_string(),
                    expected: "derived, stored",
                });
            }
        };

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if production => return Err(ConfigError::Missing("JWT_SECRET")),
            None => DEV_JWT_SECRET.to_string(),
        };

        let twilio = match (
            var("TWILIO_ACCOUNT_SID"),
            var("TWILIO_AUTH_TOKEN"),
            var("TWILIO_VERIFY_SERVICE_SID"),
        ) {
            (Some(account_sid), Some(auth_token), Some(verify_service_sid)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                verify_service_sid,
                base_url: var("TWILIO_VERIFY_URL").unwrap_or_else(|| TWILIO_VERIFY_URL.to_string()),
            }),
            _ => None,
        };

        let email = match (var("EMAIL_API_KEY"), var("EMAIL_FROM")) {
            (Some(api_key), Some(from)) => Some(EmailApiConfig {
                url: var("EMAIL_API_URL").unwrap_or_else(|| EMAIL_API_URL.to_string()),
                api_key,
                from,
            }),
            _ => None,
        };

        let sheets = match (
            var("GOOGLE_SHEET_ID"),
            var("GOOGLE_SERVICE_ACCOUNT_EMAIL"),
            var("GOOGLE_PRIVATE_KEY"),
        ) {
            (Some(sheet_id), Some(client_email), Some(key)) => Some(SheetsConfig {
                sheet_id,
                client_email,
                private_key: key.replace("\\n", "\n"),
            }),
            _ => None,
        };

        let config = Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
            static_dir: var("STATIC_DIR"),
            production,
            identity_kind,
            otp_channel,
            bypass_otp: otp_channel == OtpChannel::Skip || flag("SKIP_OTP"),
            email_otp_mode,
            otp_secret: var("OTP_SECRET").unwrap_or_else(|| jwt_secret.clone()),
            jwt_secret,
            mock_otp: mock_mode || flag("MOCK_OTP"),
            mock_sheets: mock_mode || flag("MOCK_SHEETS"),
            mock_otp_code: var("MOCK_OTP_CODE").unwrap_or_else(|| "000000".to_string()),
            mock_guest_name: var("MOCK_GUEST_NAME").unwrap_or_else(|| "Guest Name".to_string()),
            twilio,
            email,
            sheets,
            event: EventDetails {
                couple_names: var("COUPLE_NAMES").unwrap_or_default(),
                venue_name: var("VENUE_NAME").unwrap_or_default(),
                venue_city: var("VENUE_CITY").unwrap_or_default(),
                venue_address: var("VENUE_ADDRESS").unwrap_or_default(),
                datetime: var("WEDDING_DATETIME"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// The backend the login flow will talk to must be reachable with what we were given.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.identity_kind, self.otp_channel) {
            (IdentityKind::Email, OtpChannel::Sms | OtpChannel::Whatsapp) => {
                return Err(ConfigError::Incompatible(
                    "IDENTITY_KIND=email cannot be used with OTP_CHANNEL sms or whatsapp",
                ));
            }
            (IdentityKind::Phone, OtpChannel::Email) => {
                return Err(ConfigError::Incompatible(
                    "IDENTITY_KIND=phone cannot be used with OTP_CHANNEL=email",
                ));
            }
            _ => {}
        }

        if !self.bypass_otp && !self.mock_otp {
            match self.otp_channel {
                OtpChannel::Sms | OtpChannel::Whatsapp if self.twilio.is_none() => {
                    return Err(ConfigError::Missing(
                        "TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_VERIFY_SERVICE_SID",
                    ));
                }
                OtpChannel::Email if self.email.is_none() => {
                    return Err(ConfigError::Missing("EMAIL_API_KEY and EMAIL_FROM"));
                }
                _ => {}
            }
        }

        if !self.mock_sheets && self.sheets.is_none() {
            return Err(ConfigError::Missing(
                "GOOGLE_SHEET_ID, GOOGLE_SERVICE_ACCOUNT_EMAIL and GOOGLE_PRIVATE_KEY",
            ));
        }

        Ok(())
    }

    /// Cookies get `Secure` outside local development.
    pub fn secure_cookies(&self) -> bool {
        self.production
    }
}
