use std::fmt;

use uuid::Uuid;

/// Room name scoping progress notifications to one processing session.
///
/// Opaque to the client; any string the service accepts will do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Room(String);

impl Room {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Fresh random room name.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Room {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Room {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for Room {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Random doctor identifier in the service's hyphen-less form.
pub fn generate_doctor_id() -> String {
    Uuid::new_v4().simple().to_string()
}
