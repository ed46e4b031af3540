use async_trait::async_trait;

use crate::error::AppError;
use crate::identity::Identity;

use super::{OtpEngine, SendOutcome};

/// Test mode: nothing is sent and one fixed code is accepted for everyone.
pub struct MockOtpEngine {
    code: String,
}

impl MockOtpEngine {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

#[async_trait]
impl OtpEngine for MockOtpEngine {
    async fn send(&self, _identity: &Identity) -> Result<SendOutcome, AppError> {
        tracing::info!("mock OTP mode, no code dispatched");
        Ok(SendOutcome { mock: true })
    }

    async fn verify(&self, _identity: &Identity, code: &str) -> Result<bool, AppError> {
        Ok(code == self.code)
    }
}
