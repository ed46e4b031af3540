use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::{PhoneChannel, TwilioConfig};
use crate::error::AppError;
use crate::identity::Identity;

use super::{OtpEngine, SendOutcome};

/// Delegates SMS / WhatsApp codes to Twilio Verify. Twilio owns the code,
/// its expiry and its single use; we only relay its verdict.
pub struct TwilioVerifyEngine {
    http: reqwest::Client,
    config: TwilioConfig,
    channel: PhoneChannel,
}

#[derive(Deserialize)]
struct VerificationCheck {
    status: String,
}

impl TwilioVerifyEngine {
    pub fn new(http: reqwest::Client, config: TwilioConfig, channel: PhoneChannel) -> Self {
        Self {
            http,
            config,
            channel,
        }
    }

    fn service_url(&self, resource: &str) -> String {
        format!(
            "{}/Services/{}/{resource}",
            self.config.base_url.trim_end_matches('/'),
            self.config.verify_service_sid
        )
    }

    fn phone(identity: &Identity) -> Result<&str, AppError> {
        match identity {
            Identity::Phone(phone) => Ok(phone),
            Identity::Email(_) => Err(AppError::Internal(
                "Twilio Verify is configured for phone identities only".into(),
            )),
        }
    }
}

#[async_trait]
impl OtpEngine for TwilioVerifyEngine {
    async fn send(&self, identity: &Identity) -> Result<SendOutcome, AppError> {
        let phone = Self::phone(identity)?;

        self.http
            .post(self.service_url("Verifications"))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", phone), ("Channel", self.channel.as_str())])
            .send()
            .await?
            .error_for_status()?;

        tracing::info!(channel = self.channel.as_str(), "verification created");
        Ok(SendOutcome::default())
    }

    async fn verify(&self, identity: &Identity, code: &str) -> Result<bool, AppError> {
        let phone = Self::phone(identity)?;

        let response = self
            .http
            .post(self.service_url("VerificationCheck"))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", phone), ("Code", code)])
            .send()
            .await?;

        // Twilio answers 404 once a verification is approved, expired or never existed.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        let check: VerificationCheck = response.error_for_status()?.json().await?;
        Ok(check.status == "approved")
    }
}
