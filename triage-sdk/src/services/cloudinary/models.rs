//! Cloudinary upload API data models

use serde::{Deserialize, Serialize};

/// Successful upload response (only the fields the pipeline uses)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub public_id: String,

    #[serde(default)]
    pub secure_url: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub bytes: Option<u64>,

    #[serde(default)]
    pub format: Option<String>,
}

impl UploadResponse {
    /// Prefer the HTTPS URL
    pub fn public_url(&self) -> Option<&str> {
        self.secure_url.as_deref().or(self.url.as_deref())
    }
}

/// Destroy response: `{"result": "ok"}` or `{"result": "not found"}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestroyResponse {
    pub result: String,
}
