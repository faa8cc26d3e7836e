//! Session orchestration.
//!
//! [`ClientSession`] ties the credential state, the HTTP transport and the
//! event channel together into the authenticate, connect, join, submit flow.
//! Every step is invoked explicitly by the caller and returns a typed error;
//! nothing is retried.
//!
//! # Example
//! ```rust,no_run
//! use listendoctor_client::{ClientConfig, ClientSession, Room, observer_fn};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let session = ClientSession::new(ClientConfig::default())?;
//! session.add_observer(observer_fn(|message| println!("{message}")));
//!
//! session.initialize("api-key");
//! session.authenticate("client-id", "client-secret", "doctor-id").await?;
//! session.connect_channel().await?;
//!
//! let room = Room::generate();
//! session.join_room(room.as_str()).await?;
//!
//! let audio = std::fs::read("visit.wav")?;
//! let result = session
//!     .submit_audio(session.processing_request(audio, "visit.wav"))
//!     .await?;
//! println!("{}", result.summary);
//!
//! session.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::channel::{
    ChannelHandle, ConnectionState, EventChannel, ObserverCallback, ObserverId, ObserverRegistry,
    SocketIoChannel,
};
use super::state::SessionState;
use super::transport::{AuthRequest, HttpTransport, ProcessingRequest, ProcessingResult, Transport};
use crate::config::ClientConfig;
use crate::errors::{ChannelError, ClientError, ClientResult};
use crate::utils::SecretString;

/// Coarse progress of a session through its workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No API key yet
    Unconfigured,
    /// API key set, not authenticated
    Configured,
    /// Bearer token held, channel not connected
    Authenticated,
    ChannelConnected,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Unconfigured => write!(f, "Unconfigured"),
            SessionPhase::Configured => write!(f, "Configured"),
            SessionPhase::Authenticated => write!(f, "Authenticated"),
            SessionPhase::ChannelConnected => write!(f, "Channel connected"),
        }
    }
}

/// One client session against the Listen Doctor service.
pub struct ClientSession {
    config: ClientConfig,
    state: RwLock<SessionState>,
    transport: Arc<dyn Transport>,
    channel: Arc<dyn EventChannel>,
    /// Never held across an await, so observers can call back in
    handle: RwLock<Option<Arc<dyn ChannelHandle>>>,
    observers: Arc<ObserverRegistry>,
    auth_lock: Mutex<()>,
    connect_lock: Mutex<()>,
    connecting: AtomicBool,
    /// Bumped by every `disconnect`
    epoch: AtomicU64,
}

/// Clears the connecting flag even if the connect future is dropped.
struct ConnectingGuard<'a>(&'a AtomicBool);

impl<'a> ConnectingGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ClientSession {
    /// Session using the HTTP transport and Socket.IO channel for `config`.
    ///
    /// An API key present in the configuration is applied as if passed to
    /// [`initialize`](Self::initialize).
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        let channel = Arc::new(SocketIoChannel::new(&config)?);
        Ok(Self::with_components(config, transport, channel))
    }

    pub fn with_components(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        channel: Arc<dyn EventChannel>,
    ) -> Self {
        let mut state = SessionState::new();
        if let Some(api_key) = &config.api_key {
            state.set_api_key(api_key.clone());
        }

        Self {
            config,
            state: RwLock::new(state),
            transport,
            channel,
            handle: RwLock::new(None),
            observers: Arc::new(ObserverRegistry::new()),
            auth_lock: Mutex::new(()),
            connect_lock: Mutex::new(()),
            connecting: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Set the API key. Last write wins.
    pub fn initialize(&self, api_key: impl Into<SecretString>) {
        self.state.write().set_api_key(api_key);
        debug!("API key set");
    }

    /// Exchange client credentials for a bearer token and store it.
    ///
    /// On failure the stored token, if any, is left as it was. Concurrent
    /// calls run one at a time.
    pub async fn authenticate(
        &self,
        client_id: &str,
        client_secret: &str,
        doctor_id: &str,
    ) -> ClientResult<()> {
        let _single_flight = self.auth_lock.lock().await;

        let credentials = self.credentials();
        credentials.api_key()?;

        let request = AuthRequest::new(client_id, client_secret, doctor_id);
        let response = self.transport.authenticate(&request, &credentials).await?;

        self.state.write().set_token(response.token);
        info!("Session authenticated for doctor {}", doctor_id);
        Ok(())
    }

    /// [`authenticate`](Self::authenticate) with the credentials from the configuration.
    pub async fn authenticate_from_config(&self) -> ClientResult<()> {
        let client_id = self.config.client_id.clone().ok_or_else(|| {
            ClientError::Configuration("client_id is not configured".to_string())
        })?;
        let client_secret = self.config.client_secret.clone().ok_or_else(|| {
            ClientError::Configuration("client_secret is not configured".to_string())
        })?;
        let doctor_id = self.config.doctor_id.clone().ok_or_else(|| {
            ClientError::Configuration("doctor_id is not configured".to_string())
        })?;

        self.authenticate(&client_id, client_secret.expose(), &doctor_id)
            .await
    }

    /// Open the event channel with the current credentials.
    ///
    /// A connected channel is kept as is. A channel that dropped is replaced.
    /// Observers start receiving the new channel's notifications only once
    /// it is in place, so they may use the session from the first one.
    ///
    /// A [`disconnect`](Self::disconnect) that lands while the connection is
    /// being opened wins: the new channel is closed again and this call fails.
    pub async fn connect_channel(&self) -> ClientResult<()> {
        let _single_flight = self.connect_lock.lock().await;
        if let Some(existing) = self.current_handle()
            && existing.state() == ConnectionState::Connected
        {
            debug!("Channel already connected");
            return Ok(());
        }

        let credentials = self.credentials();
        credentials.authorized()?;

        let epoch = self.epoch.load(Ordering::SeqCst);
        let stale = self.handle.write().take();
        if let Some(stale) = stale
            && let Err(e) = stale.disconnect().await
        {
            warn!("Failed to close stale channel: {}", e);
        }

        let connecting = ConnectingGuard::set(&self.connecting);
        let connected: Arc<dyn ChannelHandle> = Arc::from(
            self.channel
                .connect(&credentials, self.observers.clone())
                .await?,
        );
        let stored = {
            let mut handle = self.handle.write();
            let current = self.epoch.load(Ordering::SeqCst) == epoch;
            if current {
                *handle = Some(connected.clone());
            }
            current
        };
        drop(connecting);

        if !stored {
            warn!("Session disconnected while the channel was connecting");
            if let Err(e) = connected.disconnect().await {
                warn!("Failed to close channel: {}", e);
            }
            return Err(ChannelError::ConnectionFailed(
                "Session disconnected while connecting".to_string(),
            )
            .into());
        }

        connected.start_notifications();
        Ok(())
    }

    /// Emit `join` for `room` on the open channel.
    pub async fn join_room(&self, room: &str) -> ClientResult<()> {
        match self.current_handle() {
            Some(channel) => channel.join(room).await,
            None => Err(ChannelError::NotConnected.into()),
        }
    }

    /// Request for `audio` filled with the configured processing defaults.
    pub fn processing_request(
        &self,
        audio: impl Into<Vec<u8>>,
        filename: impl Into<String>,
    ) -> ProcessingRequest {
        ProcessingRequest::with_defaults(audio, filename, &self.config.processing)
    }

    /// Upload a recording. Fails without any request if not authenticated.
    pub async fn submit_audio(&self, request: ProcessingRequest) -> ClientResult<ProcessingResult> {
        let credentials = self.credentials();
        credentials.authorized()?;
        self.transport.submit_audio(request, &credentials).await
    }

    pub fn add_observer(&self, callback: ObserverCallback) -> ObserverId {
        self.observers.add(callback)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Close the channel, release the transport and drop every observer.
    ///
    /// Safe to call any number of times. In-flight requests are not aborted.
    pub async fn disconnect(&self) -> ClientResult<()> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let handle = self.handle.write().take();
        if let Some(handle) = handle
            && let Err(e) = handle.disconnect().await
        {
            warn!("Error while closing channel: {}", e);
        }

        self.transport.release();
        self.observers.clear();
        info!("Session disconnected");
        Ok(())
    }

    pub fn has_token(&self) -> bool {
        self.state.read().has_token()
    }

    pub async fn channel_state(&self) -> ConnectionState {
        if self.connecting.load(Ordering::SeqCst) {
            return ConnectionState::Connecting;
        }
        self.current_handle()
            .map(|handle| handle.state())
            .unwrap_or_default()
    }

    pub async fn phase(&self) -> SessionPhase {
        let (has_key, has_token) = {
            let state = self.state.read();
            (state.has_api_key(), state.has_token())
        };

        if !has_key {
            SessionPhase::Unconfigured
        } else if !has_token {
            SessionPhase::Configured
        } else if self.channel_state().await == ConnectionState::Connected {
            SessionPhase::ChannelConnected
        } else {
            SessionPhase::Authenticated
        }
    }

    fn credentials(&self) -> SessionState {
        self.state.read().clone()
    }

    fn current_handle(&self) -> Option<Arc<dyn ChannelHandle>> {
        self.handle.read().clone()
    }
}

impl fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSession")
            .field("base_url", &self.config.base_url)
            .field("state", &*self.state.read())
            .field("observers", &self.observers.len())
            .finish()
    }
}
