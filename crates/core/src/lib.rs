//! duett-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Relay und Client
//! gemeinsam nutzen: Raum- und Verbindungs-IDs sowie den zentralen
//! Fehlertyp.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::DuettError;
pub use types::{ConnectionId, RoomId};
