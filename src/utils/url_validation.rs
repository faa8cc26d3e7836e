//! Base URL validation and endpoint derivation
//!
//! The service exposes all endpoints under a single base URL such as
//! `https://api-beta.listen.doctor/v1`:
//! - HTTP endpoints are appended to the base path (`{base}/iam`)
//! - The realtime channel lives at the host root (`/socket.io/`), with the
//!   base path used as the Socket.IO namespace (`/v1`)

use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be http or https, got: {0}")]
    UnsupportedScheme(String),

    #[error("URL must have a host")]
    MissingHost,

    #[error("URL must not carry a query or fragment")]
    UnexpectedQuery,
}

/// Parse and validate a service base URL.
///
/// Trailing slashes are trimmed from the path so that joined endpoints never
/// contain `//`.
pub fn validate_base_url(raw: &str) -> Result<Url, UrlValidationError> {
    let mut url = Url::parse(raw.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(UrlValidationError::UnexpectedQuery);
    }

    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(&trimmed);
    Ok(url)
}

/// Join an endpoint path onto a validated base URL.
pub fn endpoint_url(base: &Url, endpoint: &str) -> String {
    let base = base.as_str().trim_end_matches('/');
    format!("{}/{}", base, endpoint.trim_start_matches('/'))
}

/// Socket.IO namespace addressed by the base URL path.
///
/// `https://host/v1` maps to `/v1`; a bare host maps to the root namespace `/`.
pub fn channel_namespace(base: &Url) -> String {
    let path = base.path().trim_end_matches('/');
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// WebSocket URL of the realtime channel.
///
/// The scheme is upgraded (`http` to `ws`, `https` to `wss`), the path is
/// replaced by `socket_path` and the Engine.IO query is attached.
pub fn channel_url(base: &Url, socket_path: &str) -> Result<Url, UrlValidationError> {
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    };
    let host = base.host_str().ok_or(UrlValidationError::MissingHost)?;

    let authority = match base.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let mut path = socket_path.to_string();
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    if !path.ends_with('/') {
        path.push('/');
    }

    let url = Url::parse(&format!(
        "{scheme}://{authority}{path}?EIO=4&transport=websocket"
    ))?;
    Ok(url)
}
