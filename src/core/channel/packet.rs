//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! Every WebSocket text frame is one Engine.IO packet: a type digit followed
//! by its data. Socket.IO packets travel inside Engine.IO `message` packets:
//!
//! ```text
//! 4 2 /v1, 12 ["transcription_progress","40%"]
//! | | |    |  +-- JSON payload (optional)
//! | | |    +----- ack id (optional)
//! | | +---------- namespace, omitted for "/"
//! | +------------ Socket.IO packet type
//! +-------------- Engine.IO packet type (message)
//! ```
//!
//! Binary attachments are not used by this service and are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ChannelError;

/// Default Socket.IO namespace.
pub const ROOT_NAMESPACE: &str = "/";

// =============================================================================
// Engine.IO
// =============================================================================

/// Handshake data sent by the server in the `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPayload {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

impl OpenPayload {
    /// How long the client may go without hearing a ping before the
    /// connection is considered lost.
    pub fn heartbeat_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(OpenPayload),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, ChannelError> {
        let Some(kind) = frame.chars().next() else {
            return Err(ChannelError::Protocol("Empty Engine.IO packet".to_string()));
        };
        let data = &frame[kind.len_utf8()..];

        match kind {
            '0' => serde_json::from_str(data).map(EnginePacket::Open).map_err(|e| {
                ChannelError::Protocol(format!("Invalid Engine.IO open payload: {e}"))
            }),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(data.to_string())),
            '3' => Ok(EnginePacket::Pong(data.to_string())),
            '4' => Ok(EnginePacket::Message(data.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(ChannelError::Protocol(format!(
                "Unknown Engine.IO packet type '{other}'"
            ))),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(payload) => {
                format!("0{}", serde_json::to_string(payload).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{data}"),
            EnginePacket::Pong(data) => format!("3{data}"),
            EnginePacket::Message(data) => format!("4{data}"),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

// =============================================================================
// Socket.IO
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
}

impl SocketPacketKind {
    fn digit(self) -> char {
        match self {
            SocketPacketKind::Connect => '0',
            SocketPacketKind::Disconnect => '1',
            SocketPacketKind::Event => '2',
            SocketPacketKind::Ack => '3',
            SocketPacketKind::ConnectError => '4',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub kind: SocketPacketKind,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    /// Namespace CONNECT, optionally carrying connection-time auth.
    pub fn connect(namespace: &str, auth: Option<Value>) -> Self {
        Self {
            kind: SocketPacketKind::Connect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: auth,
        }
    }

    pub fn disconnect(namespace: &str) -> Self {
        Self {
            kind: SocketPacketKind::Disconnect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: None,
        }
    }

    /// EVENT packet `["name", args...]` without an ack id.
    pub fn event(namespace: &str, name: &str, args: Vec<Value>) -> Self {
        let mut items = Vec::with_capacity(args.len() + 1);
        items.push(Value::String(name.to_string()));
        items.extend(args);
        Self {
            kind: SocketPacketKind::Event,
            namespace: namespace.to_string(),
            ack_id: None,
            data: Some(Value::Array(items)),
        }
    }

    pub fn decode(payload: &str) -> Result<Self, ChannelError> {
        let kind = match payload.as_bytes().first() {
            Some(b'0') => SocketPacketKind::Connect,
            Some(b'1') => SocketPacketKind::Disconnect,
            Some(b'2') => SocketPacketKind::Event,
            Some(b'3') => SocketPacketKind::Ack,
            Some(b'4') => SocketPacketKind::ConnectError,
            Some(b'5') | Some(b'6') => {
                return Err(ChannelError::Protocol(
                    "Binary Socket.IO packets are not supported".to_string(),
                ));
            }
            Some(_) => {
                return Err(ChannelError::Protocol(format!(
                    "Unknown Socket.IO packet: {payload}"
                )));
            }
            None => return Err(ChannelError::Protocol("Empty Socket.IO packet".to_string())),
        };
        let mut rest = &payload[1..];

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => {
                    let namespace = &rest[..idx];
                    rest = &rest[idx + 1..];
                    namespace.to_string()
                }
                None => {
                    let namespace = rest.to_string();
                    rest = "";
                    namespace
                }
            }
        } else {
            ROOT_NAMESPACE.to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            Some(
                rest[..digits]
                    .parse::<u64>()
                    .map_err(|e| ChannelError::Protocol(format!("Invalid ack id: {e}")))?,
            )
        } else {
            None
        };
        rest = &rest[digits..];

        let data = if rest.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(rest)
                    .map_err(|e| ChannelError::Protocol(format!("Invalid packet payload: {e}")))?,
            )
        };

        Ok(Self {
            kind,
            namespace,
            ack_id,
            data,
        })
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.digit());
        if self.namespace != ROOT_NAMESPACE {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// Encode wrapped in an Engine.IO message, ready to send as a text frame.
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }

    /// Event name and arguments, if this is a well-formed EVENT.
    pub fn event_parts(&self) -> Option<(&str, &[Value])> {
        if self.kind != SocketPacketKind::Event {
            return None;
        }
        let items = self.data.as_ref()?.as_array()?;
        let (name, args) = items.split_first()?;
        Some((name.as_str()?, args))
    }

    /// Reason carried by a CONNECT_ERROR packet.
    pub fn error_message(&self) -> String {
        match &self.data {
            Some(Value::Object(map)) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => "Connection refused".to_string(),
        }
    }
}
