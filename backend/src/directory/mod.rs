//! The guest list. The login flow only needs two things from it: look a guest
//! up by identity, and write their RSVP back.

pub mod mock;
pub mod sheets;

use async_trait::async_trait;

use crate::error::AppError;
use crate::identity::Identity;
use crate::models::guest::{Guest, RsvpData};

#[async_trait]
pub trait GuestDirectory: Send + Sync {
    async fn find(&self, identity: &Identity) -> Result<Option<Guest>, AppError>;

    /// Returns `false` when no guest matches `identity`.
    async fn update_rsvp(&self, identity: &Identity, rsvp: &RsvpData) -> Result<bool, AppError>;
}

/// Sheets often hold phones without the leading `+`; compare without it.
fn normalize_phone(phone: &str) -> &str {
    let phone = phone.trim();
    phone.strip_prefix('+').unwrap_or(phone)
}

/// Whether a stored phone/email pair belongs to `identity`.
pub fn matches_identity(phone: &str, email: &str, identity: &Identity) -> bool {
    match identity {
        Identity::Phone(wanted) => {
            let stored = normalize_phone(phone);
            !stored.is_empty() && stored == normalize_phone(wanted)
        }
        Identity::Email(wanted) => email.trim().eq_ignore_ascii_case(wanted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phones_match_with_or_without_plus() {
        let who = Identity::Phone("+6591234567".into());
        assert!(matches_identity("6591234567", "", &who));
        assert!(matches_identity(" +6591234567 ", "", &who));
        assert!(!matches_identity("6598765432", "", &who));
        assert!(!matches_identity("", "", &who));
    }

    #[test]
    fn emails_match_case_insensitively() {
        let who = Identity::Email("ada@example.com".into());
        assert!(matches_identity("", " Ada@Example.com", &who));
        assert!(!matches_identity("", "", &who));
    }
}
