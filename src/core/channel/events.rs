//! Channel events and their observer-facing text.

use serde_json::Value;

use super::packet::SocketPacket;

pub const EVENT_TRANSCRIPTION_PROGRESS: &str = "transcription_progress";
pub const EVENT_SUMMARY_PROGRESS: &str = "summary_progress";

/// Event emitted by the client to enter a room.
pub const EVENT_JOIN: &str = "join";

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    /// First argument of the event, `Null` when absent
    TranscriptionProgress(Value),
    SummaryProgress(Value),
}

impl ChannelEvent {
    /// Map a server event to a progress event. Other names, including the
    /// reserved `connect` and `disconnect`, yield `None`: lifecycle events
    /// only come from the connection itself.
    pub fn from_event(name: &str, args: &[Value]) -> Option<Self> {
        let first = || args.first().cloned().unwrap_or(Value::Null);
        match name {
            EVENT_TRANSCRIPTION_PROGRESS => Some(ChannelEvent::TranscriptionProgress(first())),
            EVENT_SUMMARY_PROGRESS => Some(ChannelEvent::SummaryProgress(first())),
            _ => None,
        }
    }

    pub fn from_packet(packet: &SocketPacket) -> Option<Self> {
        let (name, args) = packet.event_parts()?;
        Self::from_event(name, args)
    }

    /// Single-line message delivered to observers.
    pub fn describe(&self) -> String {
        match self {
            ChannelEvent::Connected => "Socket connected".to_string(),
            ChannelEvent::Disconnected => "Socket disconnected".to_string(),
            ChannelEvent::TranscriptionProgress(payload) => {
                format!("Transcription progress: {}", render(payload))
            }
            ChannelEvent::SummaryProgress(payload) => {
                format!("Summary progress: {}", render(payload))
            }
        }
    }
}

fn render(payload: &Value) -> String {
    match payload {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifecycle_messages() {
        assert_eq!(ChannelEvent::Connected.describe(), "Socket connected");
        assert_eq!(ChannelEvent::Disconnected.describe(), "Socket disconnected");
    }

    #[test]
    fn test_progress_rendering() {
        let event = ChannelEvent::from_event(EVENT_TRANSCRIPTION_PROGRESS, &[json!("40%")]).unwrap();
        assert_eq!(event.describe(), "Transcription progress: 40%");

        let event =
            ChannelEvent::from_event(EVENT_SUMMARY_PROGRESS, &[json!({"step": 2})]).unwrap();
        assert_eq!(event.describe(), r#"Summary progress: {"step":2}"#);

        let event = ChannelEvent::from_event(EVENT_SUMMARY_PROGRESS, &[]).unwrap();
        assert_eq!(event.describe(), "Summary progress: null");
    }

    #[test]
    fn test_unknown_event_ignored() {
        assert!(ChannelEvent::from_event("room_joined", &[json!("roomA")]).is_none());
    }

    #[test]
    fn test_reserved_names_are_not_lifecycle_events() {
        assert!(ChannelEvent::from_event("connect", &[]).is_none());
        assert!(ChannelEvent::from_event("disconnect", &[json!("io server disconnect")]).is_none());

        let packet = SocketPacket::decode(r#"2/v1,["disconnect"]"#).unwrap();
        assert!(ChannelEvent::from_packet(&packet).is_none());
    }

    #[test]
    fn test_from_packet() {
        let packet = SocketPacket::decode(r#"2/v1,["transcription_progress","hola",1]"#).unwrap();
        assert_eq!(
            ChannelEvent::from_packet(&packet),
            Some(ChannelEvent::TranscriptionProgress(json!("hola")))
        );
    }
}
