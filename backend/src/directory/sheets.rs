//! Guest list backed by a Google Sheet.
//!
//! Layout of the `Guests` tab (row 1 is a header):
//!
//! | A    | B     | C     | D      | E            | F       | G        | H             | I     |
//! |------|-------|-------|--------|--------------|---------|----------|---------------|-------|
//! | name | phone | email | status | submitted at | dietary | plus-one | plus-one name | notes |
//!
//! Columns A–C are filled in by hand before launch; D–I are written here.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock};

use crate::clock::SharedClock;
use crate::config::{ConfigError, SheetsConfig};
use crate::error::AppError;
use crate::identity::Identity;
use crate::models::guest::{Guest, RsvpData, RsvpStatus};

use super::{GuestDirectory, matches_identity};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const GUESTS_TAB: &str = "Guests";
const ROWS_TTL_MINUTES: i64 = 5;

mod col {
    pub const NAME: usize = 0;
    pub const PHONE: usize = 1;
    pub const EMAIL: usize = 2;
    pub const STATUS: usize = 3;
    pub const SUBMITTED_AT: usize = 4;
    pub const DIETARY: usize = 5;
    pub const PLUS_ONE: usize = 6;
    pub const PLUS_ONE_NAME: usize = 7;
    pub const NOTES: usize = 8;
}

type Row = Vec<String>;

struct CachedRows {
    rows: Vec<Row>,
    fetched_at: DateTime<Utc>,
}

struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct ServiceAccountClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Row>,
}

pub struct SheetsDirectory {
    http: reqwest::Client,
    sheet_id: String,
    client_email: String,
    key: EncodingKey,
    token: Mutex<Option<AccessToken>>,
    rows: RwLock<Option<CachedRows>>,
    clock: SharedClock,
}

impl SheetsDirectory {
    pub fn new(
        http: reqwest::Client,
        config: &SheetsConfig,
        clock: SharedClock,
    ) -> Result<Self, ConfigError> {
        let key = EncodingKey::from_rsa_pem(config.private_key.as_bytes())
            .map_err(|e| ConfigError::Startup(format!("invalid GOOGLE_PRIVATE_KEY: {e}")))?;

        Ok(Self {
            http,
            sheet_id: config.sheet_id.clone(),
            client_email: config.client_email.clone(),
            key,
            token: Mutex::new(None),
            rows: RwLock::new(None),
            clock,
        })
    }

    /// Service-account JWT bearer grant; the token is reused until a minute before expiry.
    async fn access_token(&self) -> Result<String, AppError> {
        let mut cached = self.token.lock().await;
        let now = self.clock.utc();

        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > now) {
            return Ok(token.value.clone());
        }

        let claims = ServiceAccountClaims {
            iss: &self.client_email,
            scope: SCOPE,
            aud: TOKEN_URL,
            iat: now.timestamp(),
            exp: (now + TimeDelta::hours(1)).timestamp(),
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.key)?;

        let response: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let token = AccessToken {
            value: response.access_token,
            expires_at: now + TimeDelta::seconds(response.expires_in - 60),
        };
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn guest_rows(&self) -> Result<Vec<Row>, AppError> {
        let now = self.clock.utc();
        if let Some(cache) = self.rows.read().await.as_ref() {
            if now - cache.fetched_at < TimeDelta::minutes(ROWS_TTL_MINUTES) {
                return Ok(cache.rows.clone());
            }
        }

        tracing::info!("guest sheet cache miss, fetching rows");
        let token = self.access_token().await?;
        let range: ValueRange = self
            .http
            .get(format!(
                "{SHEETS_API}/{}/values/{GUESTS_TAB}!A2:I",
                self.sheet_id
            ))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::info!(rows = range.values.len(), "guest sheet cache populated");
        *self.rows.write().await = Some(CachedRows {
            rows: range.values.clone(),
            fetched_at: now,
        });
        Ok(range.values)
    }
}

#[async_trait]
impl GuestDirectory for SheetsDirectory {
    async fn find(&self, identity: &Identity) -> Result<Option<Guest>, AppError> {
        let rows = self.guest_rows().await?;
        Ok(find_row(&rows, identity).map(|(_, row)| row_to_guest(row)))
    }

    async fn update_rsvp(&self, identity: &Identity, rsvp: &RsvpData) -> Result<bool, AppError> {
        let rows = self.guest_rows().await?;
        let Some((index, _)) = find_row(&rows, identity) else {
            return Ok(false);
        };

        let token = self.access_token().await?;
        let body = rsvp_update_body(index, rsvp, self.clock.utc());
        self.http
            .post(format!(
                "{SHEETS_API}/{}/values:batchUpdate",
                self.sheet_id
            ))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        *self.rows.write().await = None;
        tracing::info!("guest sheet cache invalidated after RSVP write");
        Ok(true)
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or_default()
}

fn find_row<'a>(rows: &'a [Row], identity: &Identity) -> Option<(usize, &'a Row)> {
    rows.iter()
        .enumerate()
        .find(|(_, row)| matches_identity(cell(row, col::PHONE), cell(row, col::EMAIL), identity))
}

fn row_to_guest(row: &[String]) -> Guest {
    Guest {
        name: cell(row, col::NAME).to_string(),
        phone: cell(row, col::PHONE).to_string(),
        email: cell(row, col::EMAIL).to_string(),
        rsvp_status: RsvpStatus::from_cell(cell(row, col::STATUS)),
        rsvp_submitted_at: Some(cell(row, col::SUBMITTED_AT))
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        dietary_notes: cell(row, col::DIETARY).to_string(),
        plus_one_attending: cell(row, col::PLUS_ONE) == "yes",
        plus_one_name: cell(row, col::PLUS_ONE_NAME).to_string(),
        notes: cell(row, col::NOTES).to_string(),
    }
}

/// `index` is the 0-based position among data rows; the sheet is 1-based
/// with a header, hence `+ 2`.
fn rsvp_update_body(index: usize, rsvp: &RsvpData, now: DateTime<Utc>) -> Value {
    let row = index + 2;
    json!({
        "valueInputOption": "USER_ENTERED",
        "data": [{
            "range": format!("{GUESTS_TAB}!D{row}:I{row}"),
            "values": [[
                rsvp.status.as_str(),
                now.to_rfc3339_opts(SecondsFormat::Millis, true),
                rsvp.dietary_notes,
                if rsvp.plus_one_attending { "yes" } else { "no" },
                rsvp.plus_one_name,
                rsvp.notes,
            ]],
        }],
    })
}
