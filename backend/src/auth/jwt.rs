use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const SESSION_EXPIRY_DAYS: i64 = 30;

/// What a session proves: which guest is logged in, and with which identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    session: SessionPayload,
    iat: i64,
    exp: i64,
}

/// HS256 session tokens. Changing the secret invalidates every outstanding session.
pub struct SessionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn sign(&self, payload: &SessionPayload) -> Result<String, AppError> {
        self.sign_at(payload, Utc::now())
    }

    fn sign_at(&self, payload: &SessionPayload, issued_at: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims {
            session: payload.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::days(SESSION_EXPIRY_DAYS)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Token creation failed: {e}")))
    }

    /// `None` for anything that is not a live token signed with our secret.
    pub fn verify(&self, token: &str) -> Option<SessionPayload> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.session)
            .ok()
    }
}
