pub mod channel_error;
pub mod client_error;

pub use channel_error::ChannelError;
pub use client_error::{ClientError, ClientResult, MissingCredential};
