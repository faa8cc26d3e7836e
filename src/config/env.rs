use std::env;

use super::ClientConfig;
use crate::errors::{ClientError, ClientResult};
use crate::utils::SecretString;

pub(super) const BASE_URL: &str = "LISTENDOCTOR_BASE_URL";
pub(super) const API_KEY: &str = "LISTENDOCTOR_API_KEY";
pub(super) const CLIENT_ID: &str = "LISTENDOCTOR_CLIENT_ID";
pub(super) const CLIENT_SECRET: &str = "LISTENDOCTOR_CLIENT_SECRET";
pub(super) const DOCTOR_ID: &str = "LISTENDOCTOR_DOCTOR_ID";
pub(super) const REQUEST_TIMEOUT_SECS: &str = "LISTENDOCTOR_REQUEST_TIMEOUT_SECS";
pub(super) const CONNECT_TIMEOUT_SECS: &str = "LISTENDOCTOR_CONNECT_TIMEOUT_SECS";

/// Read a variable, treating empty values as unset.
fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_secs(name: &str) -> ClientResult<Option<u64>> {
    var(name)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|e| {
                ClientError::Configuration(format!("{name} must be a whole number of seconds: {e}"))
            })
        })
        .transpose()
}

/// Overlay environment variables onto `config`.
pub(super) fn apply_env(mut config: ClientConfig) -> ClientResult<ClientConfig> {
    if let Some(base_url) = var(BASE_URL) {
        config.base_url = base_url;
    }
    if let Some(api_key) = var(API_KEY) {
        config.api_key = Some(SecretString::new(api_key));
    }
    if let Some(client_id) = var(CLIENT_ID) {
        config.client_id = Some(client_id);
    }
    if let Some(secret) = var(CLIENT_SECRET) {
        config.client_secret = Some(SecretString::new(secret));
    }
    if let Some(doctor_id) = var(DOCTOR_ID) {
        config.doctor_id = Some(doctor_id);
    }
    if let Some(secs) = parse_secs(REQUEST_TIMEOUT_SECS)? {
        config.request_timeout_secs = secs;
    }
    if let Some(secs) = parse_secs(CONNECT_TIMEOUT_SECS)? {
        config.connect_timeout_secs = secs;
    }
    Ok(config)
}
