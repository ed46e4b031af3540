use async_trait::async_trait;

use crate::error::AppError;
use crate::identity::Identity;
use crate::models::guest::{Guest, RsvpData};

use super::GuestDirectory;

/// Test mode: every identity is on the guest list under one configured name,
/// and RSVPs are only logged.
pub struct MockDirectory {
    guest_name: String,
}

impl MockDirectory {
    pub fn new(guest_name: impl Into<String>) -> Self {
        Self {
            guest_name: guest_name.into(),
        }
    }
}

#[async_trait]
impl GuestDirectory for MockDirectory {
    async fn find(&self, identity: &Identity) -> Result<Option<Guest>, AppError> {
        let mut guest = Guest::pending(self.guest_name.clone());
        match identity {
            Identity::Phone(phone) => guest.phone = phone.clone(),
            Identity::Email(email) => guest.email = email.clone(),
        }
        Ok(Some(guest))
    }

    async fn update_rsvp(&self, _identity: &Identity, rsvp: &RsvpData) -> Result<bool, AppError> {
        tracing::info!(
            status = rsvp.status.as_str(),
            plus_one = rsvp.plus_one_attending,
            "mock RSVP submitted"
        );
        Ok(true)
    }
}
