pub mod channel;
pub mod room;
pub mod session;
pub mod state;
pub mod transport;

// Re-export commonly used types for convenience
pub use channel::{
    ChannelEvent, ChannelHandle, ConnectionState, EventChannel, ObserverCallback, ObserverId,
    ObserverRegistry, SocketIoChannel, observer, observer_fn,
};
pub use room::{Room, generate_doctor_id};
pub use session::{ClientSession, SessionPhase};
pub use state::SessionState;
pub use transport::{
    AuthRequest, AuthResponse, HttpTransport, ProcessingRequest, ProcessingResult, Transport,
    timestamp_label,
};
