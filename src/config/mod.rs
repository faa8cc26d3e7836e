//! Configuration module for the Listen Doctor client
//!
//! This module handles client configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//!
//! # Example
//! ```rust,no_run
//! use listendoctor_client::config::ClientConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("listendoctor.yaml");
//! let config = ClientConfig::from_file(&config_path)?;
//!
//! println!("Talking to {}", config.base_url);
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use url::Url;

mod env;
mod yaml;

use crate::errors::{ClientError, ClientResult};
use crate::utils::{self, SecretString};

/// Default service base URL.
pub const DEFAULT_BASE_URL: &str = "https://api-beta.listen.doctor/v1";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default HTTP connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default Socket.IO handshake timeout in seconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Default Engine.IO path on the channel host.
pub const DEFAULT_SOCKET_PATH: &str = "/socket.io/";

/// Realtime channel settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Engine.IO path on the channel host
    pub socket_path: String,
    /// Time allowed for WebSocket upgrade plus namespace connect
    pub handshake_timeout_secs: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
        }
    }
}

/// Form values submitted with a recording when the caller does not override them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingDefaults {
    pub prompt: String,
    pub language: String,
    pub speciality: i32,
    pub category: String,
}

impl Default for ProcessingDefaults {
    fn default() -> Self {
        Self {
            prompt: "default-prompt".to_string(),
            language: "ES".to_string(),
            speciality: 10,
            category: "V".to_string(),
        }
    }
}

/// Client configuration
///
/// Contains everything needed to drive one remote session:
/// - Service base URL
/// - API key and client credentials (all optional, they can be supplied at call time)
/// - HTTP timeouts
/// - Channel settings
/// - Default processing form values
///
/// Secret values are held in [`SecretString`], wiped on drop and redacted in `Debug`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,

    // Credentials
    pub api_key: Option<SecretString>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub doctor_id: Option<String>,

    // HTTP
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,

    pub channel: ChannelConfig,
    pub processing: ProcessingDefaults,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            client_id: None,
            client_secret: None,
            doctor_id: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            channel: ChannelConfig::default(),
            processing: ProcessingDefaults::default(),
        }
    }
}

impl ClientConfig {
    /// Configuration pointing at a specific base URL, everything else defaulted.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults. The `.env` file is expected to have been
    /// loaded by the binary before this is called.
    pub fn from_env() -> ClientResult<Self> {
        let config = env::apply_env(Self::default())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    ///
    /// Environment variables provide the base configuration and YAML values override them.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &Path) -> ClientResult<Self> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = env::apply_env(Self::default())?;
        let config = yaml_config.apply(config);
        config.validate()?;
        Ok(config)
    }

    /// Check the base URL and timeouts.
    pub fn validate(&self) -> ClientResult<()> {
        self.parsed_base_url()?;

        if self.request_timeout_secs == 0 {
            return Err(ClientError::Configuration(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ClientError::Configuration(
                "connect_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.channel.handshake_timeout_secs == 0 {
            return Err(ClientError::Configuration(
                "channel.handshake_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn parsed_base_url(&self) -> ClientResult<Url> {
        utils::validate_base_url(&self.base_url).map_err(|e| {
            ClientError::Configuration(format!("Invalid base URL '{}': {e}", self.base_url))
        })
    }

    /// `POST` endpoint exchanging client credentials for a bearer token.
    pub fn iam_url(&self) -> ClientResult<String> {
        Ok(utils::endpoint_url(&self.parsed_base_url()?, "iam"))
    }

    /// `POST` endpoint accepting multipart audio submissions.
    pub fn process_audio_url(&self) -> ClientResult<String> {
        Ok(utils::endpoint_url(&self.parsed_base_url()?, "process/audio"))
    }

    /// WebSocket URL of the realtime channel.
    pub fn channel_url(&self) -> ClientResult<Url> {
        utils::channel_url(&self.parsed_base_url()?, &self.channel.socket_path)
            .map_err(|e| ClientError::Configuration(format!("Invalid channel URL: {e}")))
    }

    /// Socket.IO namespace of the realtime channel.
    pub fn channel_namespace(&self) -> ClientResult<String> {
        Ok(utils::channel_namespace(&self.parsed_base_url()?))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.channel.handshake_timeout_secs)
    }
}
