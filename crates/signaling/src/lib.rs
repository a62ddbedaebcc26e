//! duett-signaling – Raum-basiertes Signaling-Relay
//!
//! Dieser Crate implementiert das Relay zwischen zwei Teilnehmern. Es
//! verwaltet TCP-Verbindungen und Raum-Mitgliedschaften und leitet
//! Offer/Answer/Kandidaten an die anderen Mitglieder eines Raums weiter.
//! Den Inhalt der Verhandlungsnachrichten liest es nie.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer, LocalSet)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein lokaler Task)
//!     |  connected -> Frames lesen -> Ping/Timeout -> Cleanup
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- join-room / leave-room   -> RoomRegistry
//!     +-- offer / answer / ice-candidate -> an den Raum ausser Absender
//!
//! RoomRegistry     – Wer ist in welchem Raum, Kapazitaets-Regel
//! EventBroadcaster – Send-Queues aller verbundenen Clients
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod rooms;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use connection::ClientConnection;
pub use dispatcher::MessageDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use rooms::{RaumKapazitaet, RoomRegistry, UeberlaufPolitik};
pub use server_state::{RelayConfig, SignalingState, VerbindungsPlatz};
pub use tcp::SignalingServer;
