use serde::Deserialize;
use std::path::Path;

use super::ClientConfig;
use crate::errors::{ClientError, ClientResult};
use crate::utils::SecretString;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   base_url: "https://api-beta.listen.doctor/v1"
///   request_timeout_secs: 120
///   connect_timeout_secs: 10
///
/// credentials:
///   api_key: "your-api-key"
///   client_id: "your-client-id"
///   client_secret: "your-client-secret"
///   doctor_id: "0f8fad5bd9cb469fa16570867728950e"
///
/// channel:
///   socket_path: "/socket.io/"
///   handshake_timeout_secs: 10
///
/// processing:
///   prompt: "default-prompt"
///   language: "ES"
///   speciality: 10
///   category: "V"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub credentials: Option<CredentialsYaml>,
    pub channel: Option<ChannelYaml>,
    pub processing: Option<ProcessingYaml>,
}

/// Service endpoint configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

/// Credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CredentialsYaml {
    pub api_key: Option<SecretString>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub doctor_id: Option<String>,
}

/// Realtime channel configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ChannelYaml {
    pub socket_path: Option<String>,
    pub handshake_timeout_secs: Option<u64>,
}

/// Default processing form values from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProcessingYaml {
    pub prompt: Option<String>,
    pub language: Option<String>,
    pub speciality: Option<i32>,
    pub category: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &Path) -> ClientResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Configuration(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> ClientResult<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| ClientError::Configuration(format!("Failed to parse YAML config: {e}")))
    }

    /// Overlay the values present in this file onto `config`.
    pub fn apply(self, mut config: ClientConfig) -> ClientConfig {
        if let Some(server) = self.server {
            if let Some(base_url) = server.base_url {
                config.base_url = base_url;
            }
            if let Some(secs) = server.request_timeout_secs {
                config.request_timeout_secs = secs;
            }
            if let Some(secs) = server.connect_timeout_secs {
                config.connect_timeout_secs = secs;
            }
        }

        if let Some(credentials) = self.credentials {
            if credentials.api_key.is_some() {
                config.api_key = credentials.api_key;
            }
            if credentials.client_id.is_some() {
                config.client_id = credentials.client_id;
            }
            if credentials.client_secret.is_some() {
                config.client_secret = credentials.client_secret;
            }
            if credentials.doctor_id.is_some() {
                config.doctor_id = credentials.doctor_id;
            }
        }

        if let Some(channel) = self.channel {
            if let Some(path) = channel.socket_path {
                config.channel.socket_path = path;
            }
            if let Some(secs) = channel.handshake_timeout_secs {
                config.channel.handshake_timeout_secs = secs;
            }
        }

        if let Some(processing) = self.processing {
            if let Some(prompt) = processing.prompt {
                config.processing.prompt = prompt;
            }
            if let Some(language) = processing.language {
                config.processing.language = language;
            }
            if let Some(speciality) = processing.speciality {
                config.processing.speciality = speciality;
            }
            if let Some(category) = processing.category {
                config.processing.category = category;
            }
        }

        config
    }
}
