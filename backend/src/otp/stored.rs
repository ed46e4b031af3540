use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::clock::SharedClock;
use crate::delivery::CodeTransport;
use crate::error::AppError;
use crate::identity::Identity;

use super::{OtpEngine, SendOutcome, generate_code};

pub const CODE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone)]
struct OtpRecord {
    code: String,
    expires_at: DateTime<Utc>,
}

/// Server-held codes: one live record per identity, consumed on first success.
///
/// There is no cap on wrong guesses here; brute force is bounded only by the
/// verify rate limits applied by the caller.
pub struct StoredOtpEngine {
    codes: DashMap<Identity, OtpRecord>,
    transport: Arc<dyn CodeTransport>,
    clock: SharedClock,
}

impl StoredOtpEngine {
    pub fn new(transport: Arc<dyn CodeTransport>, clock: SharedClock) -> Self {
        Self {
            codes: DashMap::new(),
            transport,
            clock,
        }
    }
}

#[async_trait]
impl OtpEngine for StoredOtpEngine {
    async fn send(&self, identity: &Identity) -> Result<SendOutcome, AppError> {
        let code = generate_code();
        let record = OtpRecord {
            code: code.clone(),
            expires_at: self.clock.utc() + Duration::minutes(CODE_TTL_MINUTES),
        };
        self.codes.insert(identity.clone(), record);

        if let Err(e) = self.transport.deliver(identity, &code).await {
            // Only forget the code we just issued, not one from a newer send.
            self.codes.remove_if(identity, |_, r| r.code == code);
            return Err(e);
        }

        Ok(SendOutcome::default())
    }

    async fn verify(&self, identity: &Identity, code: &str) -> Result<bool, AppError> {
        let now = self.clock.utc();

        let verified = match self.codes.entry(identity.clone()) {
            Entry::Vacant(_) => false,
            Entry::Occupied(record) if record.get().expires_at <= now => {
                record.remove();
                false
            }
            Entry::Occupied(record) if record.get().code == code => {
                record.remove();
                true
            }
            Entry::Occupied(_) => false,
        };

        Ok(verified)
    }
}
