//! Persistent event channel.
//!
//! The channel is a Socket.IO connection authenticated at connect time with
//! `{token, x-api-key}`. Lifecycle and progress events are turned into one
//! string each and handed to the session's [`ObserverRegistry`].
//!
//! ```text
//! Disconnected --connect()--> Connecting --CONNECT--> Connected
//!      ^                                                  |
//!      +------ disconnect() / server close / timeout -----+
//! ```
//!
//! There is no reconnection. A dropped connection is reported once as
//! `"Socket disconnected"` and the caller decides whether to connect again.
//!
//! Notifications are delivered from a task of their own, never from the one
//! reading the socket, so an observer may call back into the handle.

mod client;
pub mod events;
pub mod observers;
pub mod packet;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use client::{SocketIoChannel, SocketIoHandle};
pub use events::ChannelEvent;
pub use observers::{ObserverCallback, ObserverId, ObserverRegistry, observer, observer_fn};

use crate::core::state::SessionState;
use crate::errors::ClientResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Opens channel connections.
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Connect using the session's API key and bearer token.
    ///
    /// Fails with a precondition error if either credential is missing. On
    /// success `"Socket connected"` is queued for `observers`; it and every
    /// later notification wait for [`ChannelHandle::start_notifications`].
    async fn connect(
        &self,
        credentials: &SessionState,
        observers: Arc<ObserverRegistry>,
    ) -> ClientResult<Box<dyn ChannelHandle>>;
}

/// One open connection.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Emit `join` for `room`. No acknowledgement is awaited.
    async fn join(&self, room: &str) -> ClientResult<()>;

    /// Close the connection. Calling it on a closed handle does nothing.
    async fn disconnect(&self) -> ClientResult<()>;

    fn state(&self) -> ConnectionState;

    /// Release queued notifications to observers, in order. Until then they
    /// are held, which lets the owner publish the handle first.
    fn start_notifications(&self);
}
