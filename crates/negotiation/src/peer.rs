//! Verbindungsobjekt (Peer-Connection) als austauschbare Schnittstelle
//!
//! Die Engine spricht nur mit `PeerConnection`/`PeerConnectionFactory`.
//! Ereignisse des Verbindungsobjekts (lokale Kandidaten, Zustand,
//! entfernte Spuren) laufen ueber einen Kanal zurueck und tragen die
//! Generation der Sitzung, damit Nachzuegler verworfen werden koennen.

use async_trait::async_trait;
use duett_protocol::{IceCandidate, SessionDescription};
use tokio::sync::mpsc;

use crate::error::NegotiationResult;
use crate::media::{LocalMedia, RemoteTrack};

/// Verbindungszustand des Verbindungsobjekts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    Neu,
    Verbindend,
    Verbunden,
    Getrennt,
    Fehlgeschlagen,
    Geschlossen,
}

/// Ereignis des Verbindungsobjekts
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// Lokal gefundener Netzwerk-Kandidat
    Kandidat(IceCandidate),
    /// Zustandswechsel
    Zustand(VerbindungsZustand),
    /// Spur des Gegenuebers eingetroffen
    RemoteTrack(RemoteTrack),
}

/// Ereignis mit Sitzungs-Generation
#[derive(Debug, Clone)]
pub struct GenerationEvent {
    pub generation: u64,
    pub event: PeerEvent,
}

/// Sender fuer Ereignisse eines Verbindungsobjekts
///
/// Stempelt jedes Ereignis mit der Generation, fuer die das
/// Verbindungsobjekt erstellt wurde.
#[derive(Debug, Clone)]
pub struct PeerEventSender {
    generation: u64,
    tx: mpsc::UnboundedSender<GenerationEvent>,
}

impl PeerEventSender {
    pub fn neu(generation: u64, tx: mpsc::UnboundedSender<GenerationEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Gibt das Ereignis an die Engine weiter
    ///
    /// Ist die Engine bereits beendet, wird das Ereignis verworfen.
    pub fn senden(&self, event: PeerEvent) {
        let _ = self.tx.send(GenerationEvent {
            generation: self.generation,
            event,
        });
    }
}

/// Verbindungsobjekt fuer genau ein Gegenueber
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Haengt die lokalen Spuren an
    async fn add_local_media(&self, medien: &LocalMedia) -> NegotiationResult<()>;

    async fn create_offer(&self) -> NegotiationResult<SessionDescription>;

    async fn create_answer(&self) -> NegotiationResult<SessionDescription>;

    async fn set_local_description(&self, beschreibung: &SessionDescription) -> NegotiationResult<()>;

    async fn set_remote_description(&self, beschreibung: &SessionDescription) -> NegotiationResult<()>;

    /// Wendet einen entfernten Kandidaten an
    async fn add_ice_candidate(&self, kandidat: &IceCandidate) -> NegotiationResult<()>;

    /// Schliesst die Verbindung und gibt alle Ressourcen frei
    async fn close(&self) -> NegotiationResult<()>;
}

/// Erstellt Verbindungsobjekte
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        stun_server: &[String],
        events: PeerEventSender,
    ) -> NegotiationResult<Box<dyn PeerConnection>>;
}
