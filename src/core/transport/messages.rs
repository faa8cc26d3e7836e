//! Request and response bodies of the HTTP endpoints.
//!
//! - `POST {base}/iam` takes an [`AuthRequest`] as JSON and returns an [`AuthResponse`]
//! - `POST {base}/process/audio` takes a [`ProcessingRequest`] as a multipart form and
//!   returns a [`ProcessingResult`]
//!
//! Unknown response fields are ignored.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::ProcessingDefaults;

/// Grant type sent with every authentication request.
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

/// MIME type of the uploaded recording part.
pub const AUDIO_MIME_TYPE: &str = "audio/wav";

// =============================================================================
// Authentication
// =============================================================================

/// Client credentials exchange body.
#[derive(Clone, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct AuthRequest {
    pub client_id: String,
    pub client_secret: String,
    pub grant_type: String,
    /// Doctor the issued token acts on behalf of.
    pub doctor: String,
}

impl AuthRequest {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        doctor_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            grant_type: CLIENT_CREDENTIALS_GRANT.to_string(),
            doctor: doctor_id.into(),
        }
    }
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("grant_type", &self.grant_type)
            .field("doctor", &self.doctor)
            .finish()
    }
}

/// Successful `/iam` response. Only the token is consumed.
#[derive(Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse").field("token", &"***").finish()
    }
}

// =============================================================================
// Audio Processing
// =============================================================================

/// One recording plus the metadata the service needs to summarize it.
#[derive(Clone, PartialEq, Eq)]
pub struct ProcessingRequest {
    /// Encoded recording, uploaded as the `file` part
    pub audio: Vec<u8>,
    /// File name reported in the `file` part
    pub filename: String,
    pub prompt: String,
    pub language: String,
    /// Numeric speciality code, sent as a decimal string
    pub speciality: i32,
    pub category: String,
    /// Caller formatted date label, sent as `datetime` without validation
    pub timestamp_label: String,
}

impl ProcessingRequest {
    /// Request with the built-in processing defaults and the current time as label.
    pub fn new(audio: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self::with_defaults(audio, filename, &ProcessingDefaults::default())
    }

    pub fn with_defaults(
        audio: impl Into<Vec<u8>>,
        filename: impl Into<String>,
        defaults: &ProcessingDefaults,
    ) -> Self {
        Self {
            audio: audio.into(),
            filename: filename.into(),
            prompt: defaults.prompt.clone(),
            language: defaults.language.clone(),
            speciality: defaults.speciality,
            category: defaults.category.clone(),
            timestamp_label: timestamp_label(now()),
        }
    }

    /// Read a recording from disk, keeping its file name.
    pub async fn from_file(path: &Path, defaults: &ProcessingDefaults) -> std::io::Result<Self> {
        let audio = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio_record.wav".to_string());
        Ok(Self::with_defaults(audio, filename, defaults))
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_speciality(mut self, speciality: i32) -> Self {
        self.speciality = speciality;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_timestamp_label(mut self, label: impl Into<String>) -> Self {
        self.timestamp_label = label.into();
        self
    }
}

impl fmt::Debug for ProcessingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingRequest")
            .field("audio_bytes", &self.audio.len())
            .field("filename", &self.filename)
            .field("prompt", &self.prompt)
            .field("language", &self.language)
            .field("speciality", &self.speciality)
            .field("category", &self.category)
            .field("timestamp_label", &self.timestamp_label)
            .finish()
    }
}

/// Result of `/process/audio`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
}

// =============================================================================
// Timestamp Labels
// =============================================================================

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Render the default `datetime` label: `05 March 2025, 14:07`.
pub fn timestamp_label(at: OffsetDateTime) -> String {
    let format = format_description!("[day] [month repr:long] [year], [hour]:[minute]");
    // Formatting a fully populated OffsetDateTime with this description cannot fail
    at.format(&format).unwrap_or_default()
}
