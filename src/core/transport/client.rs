//! reqwest implementation of [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::messages::{
    AUDIO_MIME_TYPE, AuthRequest, AuthResponse, ProcessingRequest, ProcessingResult,
};
use super::{API_KEY_HEADER, Transport};
use crate::config::ClientConfig;
use crate::core::state::SessionState;
use crate::errors::{ClientError, ClientResult};

/// HTTP transport backed by a pooled [`reqwest::Client`].
///
/// The client is built lazily and dropped by [`Transport::release`]; the next
/// request builds a fresh one.
pub struct HttpTransport {
    iam_url: String,
    process_audio_url: String,
    request_timeout: Duration,
    connect_timeout: Duration,
    http_client: Mutex<Option<Client>>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            iam_url: config.iam_url()?,
            process_audio_url: config.process_audio_url()?,
            request_timeout: config.request_timeout(),
            connect_timeout: config.connect_timeout(),
            http_client: Mutex::new(None),
        })
    }

    pub fn iam_url(&self) -> &str {
        &self.iam_url
    }

    pub fn process_audio_url(&self) -> &str {
        &self.process_audio_url
    }

    /// Whether a pooled client is currently held.
    pub fn is_pooled(&self) -> bool {
        self.http_client.lock().is_some()
    }

    fn client(&self) -> ClientResult<Client> {
        let mut guard = self.http_client.lock();
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| ClientError::network(format!("Failed to build HTTP client: {e}")))?;
        *guard = Some(client.clone());
        Ok(client)
    }
}

/// Read the body for an error message, falling back to the status reason.
async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(text) if !text.trim().is_empty() => text,
        _ => status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn authenticate(
        &self,
        request: &AuthRequest,
        credentials: &SessionState,
    ) -> ClientResult<AuthResponse> {
        let api_key = credentials.api_key()?;
        let client = self.client()?;

        debug!(
            "Authenticating client {} for doctor {}",
            request.client_id, request.doctor
        );

        let response = client
            .post(&self.iam_url)
            .header(API_KEY_HEADER, api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let text = response
                    .text()
                    .await
                    .map_err(|e| ClientError::network(format!("Failed to read response: {e}")))?;
                let auth: AuthResponse = serde_json::from_str(&text).map_err(|e| {
                    ClientError::status(status.as_u16(), format!("Failed to parse response: {e}"))
                })?;
                info!("Authentication succeeded for client {}", request.client_id);
                Ok(auth)
            }
            StatusCode::UNAUTHORIZED => {
                warn!("Authentication rejected for client {}", request.client_id);
                Err(ClientError::Unauthorized(error_body(response).await))
            }
            _ => {
                let body = error_body(response).await;
                warn!("Authentication failed with status {}", status);
                Err(ClientError::status(status.as_u16(), body))
            }
        }
    }

    async fn submit_audio(
        &self,
        request: ProcessingRequest,
        credentials: &SessionState,
    ) -> ClientResult<ProcessingResult> {
        let creds = credentials.authorized()?;
        let client = self.client()?;

        debug!("Submitting {:?}", request);

        let ProcessingRequest {
            audio,
            filename,
            prompt,
            language,
            speciality,
            category,
            timestamp_label,
        } = request;

        let file_part = Part::bytes(audio)
            .file_name(filename)
            .mime_str(AUDIO_MIME_TYPE)
            .map_err(|e| ClientError::network(format!("Invalid MIME type: {e}")))?;

        let form = Form::new()
            .part("file", file_part)
            .text("prompt", prompt)
            .text("language", language)
            .text("speciality", speciality.to_string())
            .text("category", category)
            .text("datetime", timestamp_label);

        let response = client
            .post(&self.process_audio_url)
            .header(API_KEY_HEADER, creds.api_key)
            .bearer_auth(creds.bearer_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            warn!("Audio processing failed with status {}", status);
            return Err(ClientError::status(status.as_u16(), body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ClientError::network(format!("Failed to read response: {e}")))?;
        let result: ProcessingResult = serde_json::from_str(&text).map_err(|e| {
            ClientError::status(status.as_u16(), format!("Failed to parse response: {e}"))
        })?;

        info!(
            "Audio processed (summary {} chars, transcription {})",
            result.summary.len(),
            if result.transcription.is_some() {
                "present"
            } else {
                "absent"
            }
        );
        Ok(result)
    }

    fn release(&self) {
        if self.http_client.lock().take().is_some() {
            debug!("Released pooled HTTP client");
        }
    }
}
