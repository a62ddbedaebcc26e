//! duett-protocol – Signaling-Protokoll-Definitionen
//!
//! Dieses Crate definiert alle Ereignisse die zwischen Client und Relay
//! ausgetauscht werden, sowie das Frame-Format auf dem Draht.

pub mod events;
pub mod wire;

pub use events::{ClientEvent, IceCandidate, NegotiationKind, ServerEvent, SessionDescription};
pub use wire::{ClientCodec, RelayCodec};
