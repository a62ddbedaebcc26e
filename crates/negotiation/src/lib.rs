//! duett-negotiation – Client-seitige Verhandlungs-Engine
//!
//! Tritt ueber das Signaling-Relay einem Raum bei und baut mit genau einem
//! Gegenueber eine direkte Medienverbindung auf.
//!
//! ## Architektur
//!
//! ```text
//! EngineHandle ──Befehle──> NegotiationEngine (run-Schleife, &mut self)
//!                               │        │           │
//!                    SignalingChannel  PeerConnection  MediaSource
//!                     (TCP-Relay)       (webrtc)      (lokale Spuren)
//! ```
//!
//! Die drei Schnittstellen sind Traits, damit die Engine ohne Netzwerk
//! und ohne Medienhardware getestet werden kann.

pub mod config;
pub mod engine;
pub mod error;
pub mod media;
pub mod peer;
pub mod rtc;
pub mod session;
pub mod transport;

pub use config::{EngineConfig, Kamerarichtung, MedienVorgaben, VideoVorgaben};
pub use engine::{EngineHandle, EngineStatus, NegotiationEngine, Phase};
pub use error::{MediaError, NegotiationError, NegotiationResult, TransportError};
pub use media::{LocalMedia, LocalTrack, MediaSource, RemoteMedia, RemoteTrack, StaticTrackSource, TrackArt};
pub use peer::{GenerationEvent, PeerConnection, PeerConnectionFactory, PeerEvent, PeerEventSender, VerbindungsZustand};
pub use rtc::RtcPeerConnectionFactory;
pub use session::PeerSession;
pub use transport::{SignalingChannel, SignalingClient, SignalingConnector, TcpConnector, Transport, TransportStatus};
