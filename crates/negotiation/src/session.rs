//! Sitzung eines Raumbeitritts
//!
//! Eine `PeerSession` gehoert exklusiv der Engine. Sie haelt die lokalen
//! Medien, das Verbindungsobjekt und die entfernten Medien. Beim Abbau
//! werden alle Ressourcen freigegeben, bevor eine neue Sitzung entsteht.

use duett_core::types::{ConnectionId, RoomId};

use crate::media::{LocalMedia, RemoteMedia, RemoteTrack};
use crate::peer::PeerConnection;

pub struct PeerSession {
    room_id: RoomId,
    /// Generation des aktuellen Verbindungsobjekts
    generation: u64,
    lokale_medien: Option<LocalMedia>,
    remote_medien: Option<RemoteMedia>,
    verbindung: Option<Box<dyn PeerConnection>>,
    remote_peer: Option<ConnectionId>,
}

impl PeerSession {
    pub fn neu(room_id: RoomId, generation: u64, lokale_medien: Option<LocalMedia>) -> Self {
        Self {
            room_id,
            generation,
            lokale_medien,
            remote_medien: None,
            verbindung: None,
            remote_peer: None,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn lokale_medien(&self) -> Option<&LocalMedia> {
        self.lokale_medien.as_ref()
    }

    pub fn remote_medien(&self) -> Option<&RemoteMedia> {
        self.remote_medien.as_ref()
    }

    pub fn remote_peer(&self) -> Option<&ConnectionId> {
        self.remote_peer.as_ref()
    }

    pub fn remote_peer_setzen(&mut self, peer: ConnectionId) {
        self.remote_peer = Some(peer);
    }

    pub fn hat_verbindung(&self) -> bool {
        self.verbindung.is_some()
    }

    pub fn verbindung(&self) -> Option<&dyn PeerConnection> {
        self.verbindung.as_deref()
    }

    /// Uebernimmt ein neues Verbindungsobjekt mit seiner Generation
    pub fn verbindung_setzen(&mut self, verbindung: Box<dyn PeerConnection>, generation: u64) {
        self.verbindung = Some(verbindung);
        self.generation = generation;
        self.remote_medien = Some(RemoteMedia::default());
    }

    pub fn remote_track_hinzufuegen(&mut self, track: RemoteTrack) {
        self.remote_medien
            .get_or_insert_with(RemoteMedia::default)
            .hinzufuegen(track);
    }

    /// Schliesst nur das Verbindungsobjekt, lokale Medien bleiben erhalten
    pub async fn verbindung_schliessen(&mut self) {
        if let Some(verbindung) = self.verbindung.take() {
            if let Err(e) = verbindung.close().await {
                tracing::warn!(raum = %self.room_id, fehler = %e, "Schliessen der Verbindung fehlgeschlagen");
            }
        }
        self.remote_medien = None;
        self.remote_peer = None;
    }

    /// Gibt alle Ressourcen der Sitzung frei
    pub async fn freigeben(mut self) {
        self.verbindung_schliessen().await;
        if let Some(medien) = self.lokale_medien.take() {
            medien.stoppen();
        }
        tracing::debug!(raum = %self.room_id, "Sitzung freigegeben");
    }
}
