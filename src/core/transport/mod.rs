//! Request/response transport.
//!
//! Two endpoints are used:
//!
//! | Endpoint | Body | Headers |
//! |----------|------|---------|
//! | `POST {base}/iam` | JSON [`AuthRequest`] | `x-api-key` |
//! | `POST {base}/process/audio` | multipart [`ProcessingRequest`] | `x-api-key`, `Authorization: Bearer` |
//!
//! The [`Transport`] trait is the seam the session talks to; [`HttpTransport`]
//! is the reqwest implementation. Transports never mutate [`SessionState`]:
//! the session stores the returned token itself.

mod client;
pub mod messages;

use async_trait::async_trait;

pub use client::HttpTransport;
pub use messages::{
    AUDIO_MIME_TYPE, AuthRequest, AuthResponse, CLIENT_CREDENTIALS_GRANT, ProcessingRequest,
    ProcessingResult, timestamp_label,
};

use crate::core::state::SessionState;
use crate::errors::ClientResult;

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "x-api-key";

#[async_trait]
pub trait Transport: Send + Sync {
    /// Exchange client credentials for a bearer token.
    ///
    /// Requires the API key. `401` maps to [`ClientError::Unauthorized`], any other
    /// non-200 status to [`ClientError::Transport`] carrying the code.
    ///
    /// [`ClientError::Unauthorized`]: crate::errors::ClientError::Unauthorized
    /// [`ClientError::Transport`]: crate::errors::ClientError::Transport
    async fn authenticate(
        &self,
        request: &AuthRequest,
        credentials: &SessionState,
    ) -> ClientResult<AuthResponse>;

    /// Upload a recording for processing.
    ///
    /// Requires both credentials; a missing one fails before any request is sent.
    async fn submit_audio(
        &self,
        request: ProcessingRequest,
        credentials: &SessionState,
    ) -> ClientResult<ProcessingResult>;

    /// Drop pooled connections. In-flight requests are not aborted.
    fn release(&self);
}
