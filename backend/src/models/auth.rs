use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub code: String,
}

/// Serializes to `{}` for an ordinary send.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeResponse {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skip_otp: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub mock: bool,
}
