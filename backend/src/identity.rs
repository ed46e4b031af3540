//! Guest identities: the phone number or email address a guest logs in with.
//!
//! A deployment accepts exactly one [`IdentityKind`]. Values are normalized at
//! the boundary so that rate-limit keys, stored codes and directory lookups all
//! compare the same string.

use std::sync::LazyLock;

use regex::Regex;

use crate::auth::jwt::SessionPayload;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9][0-9]{7,14}$").expect("phone regex is valid"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Phone,
    Email,
}

impl IdentityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Email => "email",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Phone(String),
    Email(String),
}

impl Identity {
    /// Picks the field matching `kind` and validates it. A request that also
    /// fills in the other kind's field is rejected rather than guessed at.
    pub fn parse(kind: IdentityKind, phone: Option<&str>, email: Option<&str>) -> Option<Self> {
        let phone = phone.map(str::trim).filter(|p| !p.is_empty());
        let email = email.map(str::trim).filter(|e| !e.is_empty());

        match (kind, phone, email) {
            (IdentityKind::Phone, Some(phone), None) => Self::phone(phone),
            (IdentityKind::Email, None, Some(email)) => Self::email(email),
            _ => None,
        }
    }

    pub fn phone(raw: &str) -> Option<Self> {
        let phone = raw.trim();
        PHONE_RE
            .is_match(phone)
            .then(|| Self::Phone(phone.to_string()))
    }

    pub fn email(raw: &str) -> Option<Self> {
        let email = raw.trim().to_lowercase();
        EMAIL_RE.is_match(&email).then_some(Self::Email(email))
    }

    /// The identity a session was issued for. Phone wins when both are set.
    pub fn from_session(session: &SessionPayload) -> Option<Self> {
        match (&session.phone, &session.email) {
            (Some(phone), _) => Self::phone(phone),
            (None, Some(email)) => Self::email(email),
            (None, None) => None,
        }
    }

    pub fn kind(&self) -> IdentityKind {
        match self {
            Self::Phone(_) => IdentityKind::Phone,
            Self::Email(_) => IdentityKind::Email,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Phone(value) | Self::Email(value) => value,
        }
    }

    /// Rate-limit subject, e.g. `phone:+6591234567`.
    pub fn limiter_subject(&self) -> String {
        format!("{}:{}", self.kind().as_str(), self.as_str())
    }
}
