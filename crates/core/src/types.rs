//! Gemeinsame Identifikationstypen fuer Duett
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Raum-IDs und Verbindungs-IDs zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DuettError;

/// Vom Aufrufer gewaehlte Raum-ID (nicht leer, ohne umgebende Leerzeichen)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Erstellt eine RoomId aus beliebigem Text
    ///
    /// Fuehrende und nachfolgende Leerzeichen werden entfernt. Eine nach dem
    /// Trimmen leere ID wird abgelehnt.
    pub fn parse(roh: impl AsRef<str>) -> Result<Self, DuettError> {
        let getrimmt = roh.as_ref().trim();
        if getrimmt.is_empty() {
            return Err(DuettError::UngueltigeRaumId(roh.as_ref().to_string()));
        }
        Ok(Self(getrimmt.to_string()))
    }

    /// Gibt die ID als String-Slice zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = DuettError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport-Identitaet einer Verbindung (vom Relay vergeben)
///
/// Fuer das Relay ist der Inhalt opak. Neue IDs sind UUID-v4-Text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Gibt die ID als String-Slice zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b, "Zwei neue ConnectionIds muessen verschieden sein");
    }

    #[test]
    fn room_id_wird_getrimmt() {
        let id = RoomId::parse("  r1 ").unwrap();
        assert_eq!(id.as_str(), "r1");
    }

    #[test]
    fn leere_room_id_abgelehnt() {
        assert!(RoomId::parse("").is_err());
        assert!(RoomId::parse("   ").is_err());
    }

    #[test]
    fn room_id_serde_validiert() {
        let id: RoomId = serde_json::from_str("\"test-room\"").unwrap();
        assert_eq!(id.to_string(), "test-room");
        assert!(serde_json::from_str::<RoomId>("\"  \"").is_err());
    }

    #[test]
    fn connection_id_ist_transparent() {
        let id = ConnectionId::from("sock-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"sock-1\"");
    }
}
