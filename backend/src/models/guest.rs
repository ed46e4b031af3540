use serde::{Deserialize, Serialize};

use crate::error::AppError;

const MAX_NOTES_CHARS: usize = 500;
const MAX_PLUS_ONE_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsvpStatus {
    Attending,
    Declined,
    Pending,
}

impl RsvpStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attending => "attending",
            Self::Declined => "declined",
            Self::Pending => "pending",
        }
    }

    /// Anything unrecognised in the sheet reads as `pending`.
    pub fn from_cell(value: &str) -> Self {
        match value.trim() {
            "attending" => Self::Attending,
            "declined" => Self::Declined,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub rsvp_status: RsvpStatus,
    pub rsvp_submitted_at: Option<String>,
    pub dietary_notes: String,
    pub plus_one_attending: bool,
    pub plus_one_name: String,
    pub notes: String,
}

impl Guest {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: String::new(),
            email: String::new(),
            rsvp_status: RsvpStatus::Pending,
            rsvp_submitted_at: None,
            dietary_notes: String::new(),
            plus_one_attending: false,
            plus_one_name: String::new(),
            notes: String::new(),
        }
    }
}

/// A validated RSVP, ready to be written to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsvpData {
    pub status: RsvpStatus,
    pub dietary_notes: String,
    pub plus_one_attending: bool,
    pub plus_one_name: String,
    pub notes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRsvpRequest {
    pub status: RsvpStatus,
    #[serde(default)]
    pub dietary_notes: String,
    #[serde(default)]
    pub plus_one_attending: bool,
    #[serde(default)]
    pub plus_one_name: String,
    #[serde(default)]
    pub notes: String,
}

impl SubmitRsvpRequest {
    pub fn validate(self) -> Result<RsvpData, AppError> {
        if self.status == RsvpStatus::Pending {
            return Err(AppError::BadRequest(
                "Status must be attending or declined".into(),
            ));
        }
        if self.dietary_notes.chars().count() > MAX_NOTES_CHARS {
            return Err(AppError::BadRequest(format!(
                "Dietary notes must be at most {MAX_NOTES_CHARS} characters"
            )));
        }
        if self.plus_one_name.chars().count() > MAX_PLUS_ONE_NAME_CHARS {
            return Err(AppError::BadRequest(format!(
                "Plus-one name must be at most {MAX_PLUS_ONE_NAME_CHARS} characters"
            )));
        }
        if self.notes.chars().count() > MAX_NOTES_CHARS {
            return Err(AppError::BadRequest(format!(
                "Notes must be at most {MAX_NOTES_CHARS} characters"
            )));
        }

        // A plus-one name only means something when the plus-one is coming.
        let plus_one_name = if self.plus_one_attending {
            self.plus_one_name.trim().to_string()
        } else {
            String::new()
        };

        Ok(RsvpData {
            status: self.status,
            dietary_notes: self.dietary_notes.trim().to_string(),
            plus_one_attending: self.plus_one_attending,
            plus_one_name,
            notes: self.notes.trim().to_string(),
        })
    }
}
