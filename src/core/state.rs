//! Session credentials.
//!
//! [`SessionState`] is the single source of truth for the API key and the
//! bearer token. The key is set by `initialize`, the token only after a
//! successful authentication. Operations that need a credential ask for it
//! through the accessors here, which fail fast with a
//! [`ClientError::Precondition`] naming what is missing.

use crate::errors::{ClientResult, MissingCredential};
use crate::utils::SecretString;

/// API key and bearer token held by one session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    api_key: Option<SecretString>,
    bearer_token: Option<SecretString>,
}

/// Both credentials, borrowed for one authorized request.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizedCredentials<'a> {
    pub api_key: &'a str,
    pub bearer_token: &'a str,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API key. No validation, last write wins.
    pub fn set_api_key(&mut self, api_key: impl Into<SecretString>) {
        self.api_key = Some(api_key.into());
    }

    /// Store the bearer token returned by a successful authentication.
    pub fn set_token(&mut self, token: impl Into<SecretString>) {
        self.bearer_token = Some(token.into());
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn has_token(&self) -> bool {
        self.bearer_token.is_some()
    }

    pub fn api_key(&self) -> ClientResult<&str> {
        self.api_key
            .as_ref()
            .map(SecretString::expose)
            .ok_or_else(|| MissingCredential::ApiKey.into())
    }

    pub fn bearer_token(&self) -> ClientResult<&str> {
        self.bearer_token
            .as_ref()
            .map(SecretString::expose)
            .ok_or_else(|| MissingCredential::BearerToken.into())
    }

    /// Both credentials, or the first missing one (API key checked first).
    pub fn authorized(&self) -> ClientResult<AuthorizedCredentials<'_>> {
        Ok(AuthorizedCredentials {
            api_key: self.api_key()?,
            bearer_token: self.bearer_token()?,
        })
    }
}
