//! One-time passcodes.
//!
//! Every strategy sits behind [`OtpEngine`]; which one runs is decided once at
//! startup from configuration.

pub mod derived;
pub mod mock;
pub mod stored;
pub mod twilio;

use async_trait::async_trait;
use rand::Rng;

use crate::error::AppError;
use crate::identity::Identity;

pub const CODE_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOutcome {
    /// Nothing was actually delivered (test mode).
    pub mock: bool,
}

#[async_trait]
pub trait OtpEngine: Send + Sync {
    async fn send(&self, identity: &Identity) -> Result<SendOutcome, AppError>;

    /// `Ok(false)` for a wrong, expired or unknown code. Errors are reserved
    /// for provider failures.
    async fn verify(&self, identity: &Identity, code: &str) -> Result<bool, AppError>;
}

pub fn is_well_formed_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// Uniform over 100000..=999999.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999u32).to_string()
}
