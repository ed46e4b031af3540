//! The two guest-facing login steps: "send me a code" and "here is my code".
//!
//! Malformed identities and identities missing from the guest list get the
//! same [`AppError::NotOnGuestList`] at send time, so responses can't be used
//! to enumerate the list.

use std::sync::Arc;

use crate::directory::GuestDirectory;
use crate::error::AppError;
use crate::identity::{Identity, IdentityKind};
use crate::models::guest::Guest;
use crate::otp::{OtpEngine, is_well_formed_code};
use crate::rate_limit::{
    RateLimiter, SEND_OTP_PER_IDENTITY, SEND_OTP_PER_IP, VERIFY_OTP_PER_IDENTITY, VERIFY_OTP_PER_IP,
};

use super::jwt::{SessionCodec, SessionPayload};

/// Chosen once at startup.
pub enum LoginMode {
    Challenge(Arc<dyn OtpEngine>),
    /// Operational escape hatch: a guest-list match alone logs the guest in.
    Bypass,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub payload: SessionPayload,
}

#[derive(Debug)]
pub enum SendCodeOutcome {
    CodeSent { mock: bool },
    Authenticated(IssuedSession),
}

pub struct LoginService {
    kind: IdentityKind,
    mode: LoginMode,
    limiter: RateLimiter,
    directory: Arc<dyn GuestDirectory>,
    sessions: Arc<SessionCodec>,
}

impl LoginService {
    pub fn new(
        kind: IdentityKind,
        mode: LoginMode,
        limiter: RateLimiter,
        directory: Arc<dyn GuestDirectory>,
        sessions: Arc<SessionCodec>,
    ) -> Self {
        Self {
            kind,
            mode,
            limiter,
            directory,
            sessions,
        }
    }

    pub async fn send_code(
        &self,
        phone: Option<&str>,
        email: Option<&str>,
        client_ip: &str,
    ) -> Result<SendCodeOutcome, AppError> {
        let identity = Identity::parse(self.kind, phone, email).ok_or(AppError::NotOnGuestList)?;

        self.limiter
            .enforce(SEND_OTP_PER_IP, &format!("ip:{client_ip}"))?;
        self.limiter
            .enforce(SEND_OTP_PER_IDENTITY, &identity.limiter_subject())?;

        let guest = self
            .directory
            .find(&identity)
            .await?
            .ok_or(AppError::NotOnGuestList)?;

        match &self.mode {
            LoginMode::Bypass => {
                tracing::info!(kind = self.kind.as_str(), "OTP bypassed, issuing session");
                Ok(SendCodeOutcome::Authenticated(self.issue(&identity, &guest)?))
            }
            LoginMode::Challenge(engine) => {
                let outcome = engine.send(&identity).await?;
                Ok(SendCodeOutcome::CodeSent { mock: outcome.mock })
            }
        }
    }

    pub async fn verify_code(
        &self,
        phone: Option<&str>,
        email: Option<&str>,
        code: &str,
        client_ip: &str,
    ) -> Result<IssuedSession, AppError> {
        let identity = Identity::parse(self.kind, phone, email).ok_or(AppError::NotOnGuestList)?;
        let code = code.trim();
        if !is_well_formed_code(code) {
            return Err(AppError::BadRequest("Code must be 6 digits.".into()));
        }

        let LoginMode::Challenge(engine) = &self.mode else {
            // Bypass deployments never hand out codes, so none can be right.
            return Err(AppError::IncorrectCode);
        };

        self.limiter
            .enforce(VERIFY_OTP_PER_IDENTITY, &identity.limiter_subject())?;
        self.limiter
            .enforce(VERIFY_OTP_PER_IP, &format!("ip:{client_ip}"))?;

        if !engine.verify(&identity, code).await? {
            return Err(AppError::IncorrectCode);
        }

        // The guest may have been removed from the list since the code went out.
        let guest = self
            .directory
            .find(&identity)
            .await?
            .ok_or(AppError::NotOnGuestList)?;

        self.issue(&identity, &guest)
    }

    fn issue(&self, identity: &Identity, guest: &Guest) -> Result<IssuedSession, AppError> {
        let payload = match identity {
            Identity::Phone(phone) => SessionPayload {
                name: guest.name.clone(),
                phone: Some(phone.clone()),
                email: None,
            },
            Identity::Email(email) => SessionPayload {
                name: guest.name.clone(),
                phone: None,
                email: Some(email.clone()),
            },
        };
        let token = self.sessions.sign(&payload)?;
        Ok(IssuedSession { token, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::stored::StoredOtpEngine;
    use crate::testing::{MemoryDirectory, MutableClock, RecordingEngine, RecordingTransport};

    const ADA: &str = "+6598765432";

    fn directory() -> Arc<MemoryDirectory> {
        Arc::new(MemoryDirectory::with_phone_guests(&[("Ada Lovelace", ADA)]))
    }

    fn service(
        mode: LoginMode,
        directory: Arc<MemoryDirectory>,
        clock: Arc<MutableClock>,
    ) -> LoginService {
        LoginService::new(
            IdentityKind::Phone,
            mode,
            RateLimiter::new(clock),
            directory,
            Arc::new(SessionCodec::new("test-secret")),
        )
    }

    fn stored_service() -> (Arc<RecordingTransport>, Arc<MemoryDirectory>, LoginService) {
        let clock = Arc::new(MutableClock::default());
        let transport = Arc::new(RecordingTransport::default());
        let engine = Arc::new(StoredOtpEngine::new(transport.clone(), clock.clone()));
        let directory = directory();
        let service = service(LoginMode::Challenge(engine), directory.clone(), clock);
        (transport, directory, service)
    }

    #[tokio::test]
    async fn sends_code_to_listed_guest() {
        let engine = Arc::new(RecordingEngine::accepting("123456"));
        let service = service(
            LoginMode::Challenge(engine.clone()),
            directory(),
            Arc::new(MutableClock::default()),
        );

        let outcome = service.send_code(Some(ADA), None, "10.0.0.1").await.unwrap();
        assert!(matches!(outcome, SendCodeOutcome::CodeSent { mock: false }));
        assert_eq!(engine.sent(), vec![Identity::Phone(ADA.into())]);
    }

    #[tokio::test]
    async fn unknown_and_malformed_identities_look_the_same() {
        let engine = Arc::new(RecordingEngine::accepting("123456"));
        let service = service(
            LoginMode::Challenge(engine.clone()),
            directory(),
            Arc::new(MutableClock::default()),
        );

        let missing = service.send_code(Some("+6500000000"), None, "10.0.0.1").await;
        let malformed = service.send_code(Some("12"), None, "10.0.0.1").await;
        let wrong_kind = service.send_code(None, Some("ada@example.com"), "10.0.0.1").await;

        assert!(matches!(missing, Err(AppError::NotOnGuestList)));
        assert!(matches!(malformed, Err(AppError::NotOnGuestList)));
        assert!(matches!(wrong_kind, Err(AppError::NotOnGuestList)));
        assert!(engine.sent().is_empty());
    }

    #[tokio::test]
    async fn fourth_send_within_window_is_limited() {
        let engine = Arc::new(RecordingEngine::accepting("123456"));
        let service = service(
            LoginMode::Challenge(engine.clone()),
            directory(),
            Arc::new(MutableClock::default()),
        );

        for _ in 0..3 {
            service.send_code(Some(ADA), None, "10.0.0.1").await.unwrap();
        }
        let err = service.send_code(Some(ADA), None, "10.0.0.2").await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited { retry_after_seconds, .. } if retry_after_seconds > 0));
        assert_eq!(engine.sent().len(), 3);
    }

    #[tokio::test]
    async fn per_ip_limit_spans_identities() {
        let engine = Arc::new(RecordingEngine::accepting("123456"));
        let service = service(
            LoginMode::Challenge(engine),
            directory(),
            Arc::new(MutableClock::default()),
        );

        for n in 0..SEND_OTP_PER_IP.max_requests {
            let phone = format!("+65900000{n:02}");
            let _ = service.send_code(Some(&phone), None, "10.0.0.9").await;
        }
        let err = service.send_code(Some(ADA), None, "10.0.0.9").await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn verified_code_issues_session_once() {
        let (transport, _, service) = stored_service();
        service.send_code(Some(ADA), None, "10.0.0.1").await.unwrap();
        let code = transport.last_code(&Identity::Phone(ADA.into())).unwrap();

        let session = service.verify_code(Some(ADA), None, &code, "10.0.0.1").await.unwrap();
        assert_eq!(session.payload.name, "Ada Lovelace");
        assert_eq!(session.payload.phone.as_deref(), Some(ADA));

        let again = service.verify_code(Some(ADA), None, &code, "10.0.0.1").await;
        assert!(matches!(again, Err(AppError::IncorrectCode)));
    }

    #[tokio::test]
    async fn malformed_code_is_rejected_before_the_engine() {
        let engine = Arc::new(RecordingEngine::accepting("123456"));
        let service = service(
            LoginMode::Challenge(engine.clone()),
            directory(),
            Arc::new(MutableClock::default()),
        );

        let err = service.verify_code(Some(ADA), None, "12345", "10.0.0.1").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(engine.verify_calls(), 0);
    }

    #[tokio::test]
    async fn verify_attempts_are_capped_per_identity() {
        let (_, _, service) = stored_service();
        service.send_code(Some(ADA), None, "10.0.0.1").await.unwrap();

        for _ in 0..VERIFY_OTP_PER_IDENTITY.max_requests {
            let _ = service.verify_code(Some(ADA), None, "000001", "10.0.0.1").await;
        }
        let err = service
            .verify_code(Some(ADA), None, "000001", "10.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn guest_removed_after_send_gets_generic_failure() {
        let (transport, directory, service) = stored_service();
        service.send_code(Some(ADA), None, "10.0.0.1").await.unwrap();
        let code = transport.last_code(&Identity::Phone(ADA.into())).unwrap();

        directory.remove(&Identity::Phone(ADA.into()));
        let err = service.verify_code(Some(ADA), None, &code, "10.0.0.1").await.unwrap_err();
        assert!(matches!(err, AppError::NotOnGuestList));
    }

    #[tokio::test]
    async fn bypass_issues_session_after_lookup() {
        let service = service(LoginMode::Bypass, directory(), Arc::new(MutableClock::default()));

        let outcome = service.send_code(Some(ADA), None, "10.0.0.1").await.unwrap();
        let SendCodeOutcome::Authenticated(session) = outcome else {
            panic!("expected a session");
        };
        assert_eq!(session.payload.name, "Ada Lovelace");

        let missing = service.send_code(Some("+6500000000"), None, "10.0.0.1").await;
        assert!(matches!(missing, Err(AppError::NotOnGuestList)));
    }

    #[tokio::test]
    async fn provider_failures_propagate() {
        let engine = Arc::new(RecordingEngine::failing());
        let service = service(
            LoginMode::Challenge(engine),
            directory(),
            Arc::new(MutableClock::default()),
        );

        let err = service.send_code(Some(ADA), None, "10.0.0.1").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
