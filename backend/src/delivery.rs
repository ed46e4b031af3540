//! Getting a code to a guest. Engines that generate their own codes hand them
//! to a [`CodeTransport`]; provider-backed engines deliver by themselves.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::EmailApiConfig;
use crate::error::AppError;
use crate::identity::Identity;

#[async_trait]
pub trait CodeTransport: Send + Sync {
    async fn deliver(&self, to: &Identity, code: &str) -> Result<(), AppError>;
}

#[derive(Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: String,
}

/// Sends codes through a JSON email API (Resend-compatible request shape).
pub struct EmailApiTransport {
    http: reqwest::Client,
    config: EmailApiConfig,
}

impl EmailApiTransport {
    pub fn new(http: reqwest::Client, config: EmailApiConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl CodeTransport for EmailApiTransport {
    async fn deliver(&self, to: &Identity, code: &str) -> Result<(), AppError> {
        let Identity::Email(address) = to else {
            return Err(AppError::Internal(
                "email transport cannot reach a phone number".into(),
            ));
        };

        let message = OutgoingEmail {
            from: &self.config.from,
            to: [address],
            subject: "Your invitation code",
            text: format!("Your code is {code}. It expires in 10 minutes."),
        };

        self.http
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .json(&message)
            .send()
            .await?
            .error_for_status()?;

        tracing::info!("login code emailed");
        Ok(())
    }
}
