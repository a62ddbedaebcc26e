//! Verhandlungs-Engine (Zustandsautomat des Clients)
//!
//! Die Engine besitzt Transport, Sitzung und Verbindungsobjekt exklusiv.
//! Alle Zustandsaenderungen laufen ueber `&mut self`; in Betrieb treibt
//! eine einzelne `run`-Schleife die Engine mit Befehlen, Relay-Ereignissen
//! und Ereignissen des Verbindungsobjekts.
//!
//! ## Ablauf
//! ```text
//! Idle -> AcquiringMedia -> AwaitingTransport -> Joined
//!      -> Offering | Answering -> Negotiating -> Connected
//! ```
//! `Closed` ist von ueberall erreichbar und verhaelt sich wie `Idle`.

use duett_core::types::{ConnectionId, RoomId};
use duett_protocol::{ClientEvent, IceCandidate, ServerEvent, SessionDescription};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::error::{NegotiationError, NegotiationResult, TransportError};
use crate::media::{MediaSource, StaticTrackSource};
use crate::peer::{
    GenerationEvent, PeerConnectionFactory, PeerEvent, PeerEventSender, VerbindungsZustand,
};
use crate::rtc::RtcPeerConnectionFactory;
use crate::session::PeerSession;
use crate::transport::{SignalingChannel, SignalingConnector, TcpConnector};

/// Queue-Groesse fuer Befehle an die Engine
const BEFEHL_QUEUE_GROESSE: usize = 16;

/// Phase des Zustandsautomaten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AcquiringMedia,
    AwaitingTransport,
    Joined,
    Offering,
    Answering,
    Negotiating,
    Connected,
    Closed,
}

impl Phase {
    /// Keine Sitzung aktiv (Beitritt moeglich)
    pub fn ist_ruhend(&self) -> bool {
        matches!(self, Self::Idle | Self::Closed)
    }
}

/// Fuer die Oberflaeche sichtbarer Zustand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub phase: Phase,
    /// Statuszeile
    pub text: String,
    pub raum: Option<RoomId>,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            text: "Not connected".to_string(),
            raum: None,
        }
    }
}

pub struct NegotiationEngine {
    config: EngineConfig,
    connector: Arc<dyn SignalingConnector>,
    fabrik: Arc<dyn PeerConnectionFactory>,
    medienquelle: Arc<dyn MediaSource>,

    transport: Option<Arc<dyn SignalingChannel>>,
    server_events: Option<mpsc::Receiver<ServerEvent>>,
    eigene_id: Option<ConnectionId>,

    sitzung: Option<PeerSession>,
    phase: Phase,
    /// Wird pro Sitzung, Verbindungsobjekt und Abbau erhoeht
    generation: u64,

    peer_tx: mpsc::UnboundedSender<GenerationEvent>,
    peer_rx: mpsc::UnboundedReceiver<GenerationEvent>,
    status_tx: watch::Sender<EngineStatus>,
}

impl NegotiationEngine {
    pub fn neu(
        config: EngineConfig,
        connector: Arc<dyn SignalingConnector>,
        fabrik: Arc<dyn PeerConnectionFactory>,
        medienquelle: Arc<dyn MediaSource>,
    ) -> Self {
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(EngineStatus::default());
        Self {
            config,
            connector,
            fabrik,
            medienquelle,
            transport: None,
            server_events: None,
            eigene_id: None,
            sitzung: None,
            phase: Phase::Idle,
            generation: 0,
            peer_tx,
            peer_rx,
            status_tx,
        }
    }

    /// Engine mit TCP-Relay-Client, WebRTC-Verbindungsobjekt und
    /// sample-gespeisten Spuren
    pub fn mit_webrtc(config: EngineConfig) -> Self {
        let connector = Arc::new(TcpConnector::neu(config.relay_adresse.clone()));
        Self::neu(
            config,
            connector,
            Arc::new(RtcPeerConnectionFactory::neu()),
            Arc::new(StaticTrackSource::default()),
        )
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sitzung(&self) -> Option<&PeerSession> {
        self.sitzung.as_ref()
    }

    pub fn eigene_id(&self) -> Option<&ConnectionId> {
        self.eigene_id.as_ref()
    }

    pub fn status_abonnieren(&self) -> watch::Receiver<EngineStatus> {
        self.status_tx.subscribe()
    }

    // -----------------------------------------------------------------------
    // Beitreten / Verlassen
    // -----------------------------------------------------------------------

    /// Tritt einem Raum bei
    ///
    /// Beschafft lokale Medien, wartet auf die Relay-Verbindung und sendet
    /// `join-room`. Nur aus `Idle` oder `Closed` erlaubt.
    pub async fn beitreten(&mut self, raum: &str) -> NegotiationResult<()> {
        if !self.phase.ist_ruhend() {
            return Err(NegotiationError::BereitsAktiv);
        }
        let room_id = match RoomId::parse(raum) {
            Ok(id) => id,
            Err(_) => {
                self.text_setzen("Please enter a room id");
                return Err(NegotiationError::UngueltigeRaumId(raum.to_string()));
            }
        };

        // Lokale Medien
        self.zustand_setzen(Phase::AcquiringMedia, "Requesting camera and microphone");
        let lokale_medien = match self.medienquelle.acquire(&self.config.medien).await {
            Ok(medien) => Some(medien),
            Err(e) if self.config.ohne_medien_fortfahren => {
                tracing::warn!(fehler = %e, "Keine lokalen Medien, trete ohne Medien bei");
                None
            }
            Err(e) => {
                self.zustand_setzen(Phase::Idle, format!("Media access denied: {e}"));
                return Err(e.into());
            }
        };

        self.generation += 1;
        self.sitzung = Some(PeerSession::neu(room_id.clone(), self.generation, lokale_medien));

        // Relay-Verbindung
        self.zustand_setzen(Phase::AwaitingTransport, "Connecting to relay");
        let kanal = match self.transport_sicherstellen().await {
            Ok(kanal) => kanal,
            Err(e) => {
                self.abbauen(format!("Connection error: {e}")).await;
                return Err(e.into());
            }
        };

        let id = match tokio::time::timeout(self.config.transport_timeout(), kanal.bereit()).await {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => {
                self.transport_trennen();
                self.abbauen(format!("Connection error: {e}")).await;
                return Err(e.into());
            }
            Err(_) => {
                self.transport_trennen();
                self.abbauen("Connection timeout").await;
                return Err(TransportError::Timeout.into());
            }
        };
        self.eigene_id = Some(id.clone());
        self.text_setzen(format!("Connected as {id}"));

        if let Err(e) = kanal.senden(ClientEvent::join_room(room_id.clone())) {
            self.transport_trennen();
            self.abbauen(format!("Connection error: {e}")).await;
            return Err(e.into());
        }

        tracing::info!(raum = %room_id, verbindung = %id, "Raum beigetreten");
        self.zustand_setzen(Phase::Joined, format!("Joined room: {room_id}"));
        Ok(())
    }

    /// Verlaesst den Raum und trennt die Relay-Verbindung
    ///
    /// In `Idle` und `Closed` ohne Wirkung. Vor `Joined` wurde noch kein
    /// `join-room` gesendet, dann entfaellt auch `leave-room`.
    pub async fn verlassen(&mut self) {
        if self.phase.ist_ruhend() {
            return;
        }
        let beigetreten = !matches!(self.phase, Phase::AcquiringMedia | Phase::AwaitingTransport);
        if let Some(sitzung) = self.sitzung.as_ref().filter(|_| beigetreten) {
            let leave = ClientEvent::leave_room(sitzung.room_id().clone());
            if let Err(e) = self.nachricht_senden(leave) {
                tracing::debug!(fehler = %e, "leave-room nicht gesendet");
            }
        }
        self.transport_trennen();
        self.abbauen("Not connected").await;
    }

    // -----------------------------------------------------------------------
    // Relay-Ereignisse
    // -----------------------------------------------------------------------

    /// Verarbeitet ein Ereignis vom Relay
    pub async fn server_event_verarbeiten(&mut self, event: ServerEvent) {
        tracing::debug!(event = event.name(), phase = ?self.phase, "Relay-Ereignis");
        match event {
            ServerEvent::UserJoined(hinweis) => self.angebot_starten(hinweis.socket_id).await,
            ServerEvent::OfferReceived(nachricht) => {
                self.angebot_empfangen(nachricht.sdp, nachricht.from).await
            }
            ServerEvent::AnswerReceived(nachricht) => {
                self.antwort_empfangen(nachricht.sdp, nachricht.from).await
            }
            ServerEvent::IceCandidateReceived(nachricht) => {
                self.kandidat_empfangen(nachricht.candidate).await
            }
            ServerEvent::PeerLeft(hinweis) => self.peer_verlassen(hinweis.socket_id).await,
            ServerEvent::RoomFull(hinweis) => {
                tracing::warn!(raum = %hinweis.room_id, "Raum ist voll");
                self.abbauen(format!("Room is full: {}", hinweis.room_id)).await;
            }
            ServerEvent::Evicted(hinweis) => {
                tracing::warn!(raum = %hinweis.room_id, "Aus dem Raum verdraengt");
                self.abbauen(format!("Removed from room: {}", hinweis.room_id)).await;
            }
            // Vom Transport verbraucht
            ServerEvent::Connected(_) | ServerEvent::Ping(_) => {}
        }
    }

    /// Relay-Verbindung ist weggebrochen
    pub async fn transport_verloren(&mut self) {
        tracing::warn!(phase = ?self.phase, "Relay-Verbindung verloren");
        self.transport_trennen();
        if self.phase.ist_ruhend() {
            self.text_setzen("Disconnected");
        } else {
            self.abbauen("Disconnected").await;
        }
    }

    async fn angebot_starten(&mut self, peer: ConnectionId) {
        match &self.sitzung {
            None => {
                tracing::debug!(peer = %peer, "user-joined ohne Sitzung verworfen");
                return;
            }
            Some(sitzung) if sitzung.hat_verbindung() => {
                tracing::debug!(peer = %peer, "user-joined bei bestehender Verbindung ignoriert");
                return;
            }
            Some(_) => {}
        }

        self.phase_setzen(Phase::Offering);
        match self.angebot_erstellen(peer).await {
            Ok(()) => self.phase_setzen(Phase::Negotiating),
            Err(e) => self.abbauen(format!("Connection error: {e}")).await,
        }
    }

    async fn angebot_erstellen(&mut self, peer: ConnectionId) -> NegotiationResult<()> {
        self.verbindung_sicherstellen().await?;
        let absender = self.absender()?;

        let sitzung = self.sitzung.as_mut().ok_or(NegotiationError::Beendet)?;
        sitzung.remote_peer_setzen(peer);
        let verbindung = sitzung.verbindung().ok_or(NegotiationError::Beendet)?;
        let offer = verbindung.create_offer().await?;
        verbindung.set_local_description(&offer).await?;
        let raum = sitzung.room_id().clone();

        self.nachricht_senden(ClientEvent::offer(raum, offer, absender))
    }

    async fn angebot_empfangen(&mut self, sdp: SessionDescription, von: ConnectionId) {
        let Some(sitzung) = &self.sitzung else {
            tracing::debug!(von = %von, "offer ohne Sitzung verworfen");
            return;
        };
        let neu_verhandeln = sitzung.hat_verbindung()
            && matches!(self.phase, Phase::Negotiating | Phase::Connected);

        if !neu_verhandeln {
            self.phase_setzen(Phase::Answering);
        }
        match self.antwort_erstellen(sdp, von).await {
            Ok(()) if !neu_verhandeln => self.phase_setzen(Phase::Negotiating),
            Ok(()) => tracing::debug!("Neuverhandlung beantwortet"),
            Err(e) => self.abbauen(format!("Connection error: {e}")).await,
        }
    }

    async fn antwort_erstellen(&mut self, sdp: SessionDescription, von: ConnectionId) -> NegotiationResult<()> {
        self.verbindung_sicherstellen().await?;
        let absender = self.absender()?;

        let sitzung = self.sitzung.as_mut().ok_or(NegotiationError::Beendet)?;
        sitzung.remote_peer_setzen(von);
        let verbindung = sitzung.verbindung().ok_or(NegotiationError::Beendet)?;
        verbindung.set_remote_description(&sdp).await?;
        let answer = verbindung.create_answer().await?;
        verbindung.set_local_description(&answer).await?;
        let raum = sitzung.room_id().clone();

        self.nachricht_senden(ClientEvent::answer(raum, answer, absender))
    }

    async fn antwort_empfangen(&mut self, sdp: SessionDescription, von: ConnectionId) {
        let Some(sitzung) = self.sitzung.as_ref() else {
            tracing::debug!(von = %von, "answer ohne Sitzung verworfen");
            return;
        };
        if sitzung.remote_peer().is_some_and(|peer| peer != &von) {
            tracing::debug!(von = %von, "answer von fremder Verbindung ignoriert");
            return;
        }
        let Some(verbindung) = sitzung.verbindung() else {
            tracing::debug!(von = %von, "answer ohne Verbindungsobjekt verworfen");
            return;
        };
        let ergebnis = verbindung.set_remote_description(&sdp).await;
        if let Err(e) = ergebnis {
            self.abbauen(format!("Connection error: {e}")).await;
        }
    }

    async fn kandidat_empfangen(&mut self, kandidat: IceCandidate) {
        let Some(verbindung) = self.sitzung.as_ref().and_then(|s| s.verbindung()) else {
            tracing::debug!("Kandidat ohne Verbindungsobjekt verworfen");
            return;
        };
        if let Err(e) = verbindung.add_ice_candidate(&kandidat).await {
            tracing::warn!(fehler = %e, "Kandidat konnte nicht angewendet werden");
        }
    }

    async fn peer_verlassen(&mut self, peer: ConnectionId) {
        let Some(sitzung) = self.sitzung.as_mut() else {
            return;
        };
        if sitzung.remote_peer() != Some(&peer) {
            tracing::debug!(peer = %peer, "peer-left fuer fremde Verbindung ignoriert");
            return;
        }
        tracing::info!(peer = %peer, raum = %sitzung.room_id(), "Gegenueber hat den Raum verlassen");
        sitzung.verbindung_schliessen().await;
        self.zustand_setzen(Phase::Joined, "Peer left");
    }

    // -----------------------------------------------------------------------
    // Ereignisse des Verbindungsobjekts
    // -----------------------------------------------------------------------

    /// Verarbeitet ein Ereignis des Verbindungsobjekts
    ///
    /// Ereignisse aus einer frueheren Generation werden verworfen.
    pub async fn peer_event_verarbeiten(&mut self, ev: GenerationEvent) {
        let aktuell = self
            .sitzung
            .as_ref()
            .is_some_and(|s| s.hat_verbindung() && s.generation() == ev.generation);
        if !aktuell {
            tracing::trace!(generation = ev.generation, "Veraltetes Ereignis verworfen");
            return;
        }

        match ev.event {
            PeerEvent::Kandidat(kandidat) => {
                let Some(sitzung) = &self.sitzung else {
                    return;
                };
                let ergebnis = self.absender().and_then(|absender| {
                    self.nachricht_senden(ClientEvent::ice_candidate(
                        sitzung.room_id().clone(),
                        kandidat,
                        absender,
                    ))
                });
                if let Err(e) = ergebnis {
                    tracing::warn!(fehler = %e, "Lokaler Kandidat nicht gesendet");
                }
            }
            PeerEvent::Zustand(VerbindungsZustand::Verbunden) => {
                if self.phase != Phase::Connected {
                    tracing::info!("Verbindung zum Gegenueber steht");
                    self.zustand_setzen(Phase::Connected, "Connected to peer");
                }
            }
            PeerEvent::Zustand(VerbindungsZustand::Fehlgeschlagen) => {
                self.abbauen("Connection error: peer connection failed").await;
            }
            PeerEvent::Zustand(VerbindungsZustand::Getrennt) => {
                self.text_setzen("Peer connection interrupted");
            }
            PeerEvent::Zustand(zustand) => {
                tracing::debug!(zustand = ?zustand, "Verbindungszustand");
            }
            PeerEvent::RemoteTrack(track) => {
                if let Some(sitzung) = self.sitzung.as_mut() {
                    tracing::debug!(spur = %track.id, art = track.art.as_str(), "Entfernte Spur gesammelt");
                    sitzung.remote_track_hinzufuegen(track);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Interne Hilfen
    // -----------------------------------------------------------------------

    async fn transport_sicherstellen(&mut self) -> Result<Arc<dyn SignalingChannel>, TransportError> {
        if let Some(kanal) = &self.transport {
            return Ok(Arc::clone(kanal));
        }
        let transport = self.connector.verbinden().await?;
        self.transport = Some(Arc::clone(&transport.kanal));
        self.server_events = Some(transport.events);
        Ok(transport.kanal)
    }

    fn transport_trennen(&mut self) {
        self.transport = None;
        self.server_events = None;
        self.eigene_id = None;
    }

    /// Erstellt das Verbindungsobjekt, falls noch keines existiert
    async fn verbindung_sicherstellen(&mut self) -> NegotiationResult<()> {
        let sitzung = self.sitzung.as_mut().ok_or(NegotiationError::Beendet)?;
        if sitzung.hat_verbindung() {
            return Ok(());
        }

        self.generation += 1;
        let events = PeerEventSender::neu(self.generation, self.peer_tx.clone());
        let verbindung = self.fabrik.create(&self.config.stun_server, events).await?;
        if let Some(medien) = sitzung.lokale_medien() {
            if let Err(e) = verbindung.add_local_media(medien).await {
                let _ = verbindung.close().await;
                return Err(e);
            }
        }
        sitzung.verbindung_setzen(verbindung, self.generation);
        tracing::debug!(generation = self.generation, "Verbindungsobjekt erstellt");
        Ok(())
    }

    fn absender(&self) -> NegotiationResult<ConnectionId> {
        self.eigene_id.clone().ok_or_else(|| {
            TransportError::Getrennt("keine Verbindungs-ID".to_string()).into()
        })
    }

    fn nachricht_senden(&self, event: ClientEvent) -> NegotiationResult<()> {
        let kanal = self
            .transport
            .as_ref()
            .ok_or_else(|| TransportError::Getrennt("keine Relay-Verbindung".to_string()))?;
        kanal.senden(event)?;
        Ok(())
    }

    /// Gibt die Sitzung frei und wechselt nach `Closed`
    async fn abbauen(&mut self, text: impl Into<String>) {
        if let Some(sitzung) = self.sitzung.take() {
            sitzung.freigeben().await;
        }
        self.generation += 1;
        self.zustand_setzen(Phase::Closed, text);
    }

    fn zustand_setzen(&mut self, phase: Phase, text: impl Into<String>) {
        if self.phase != phase {
            tracing::info!(von = ?self.phase, nach = ?phase, "Phasenwechsel");
        }
        self.phase = phase;
        self.status_senden(text.into());
    }

    fn phase_setzen(&mut self, phase: Phase) {
        let text = self.status_tx.borrow().text.clone();
        self.zustand_setzen(phase, text);
    }

    fn text_setzen(&mut self, text: impl Into<String>) {
        self.status_senden(text.into());
    }

    fn status_senden(&self, text: String) {
        let raum = self.sitzung.as_ref().map(|s| s.room_id().clone());
        self.status_tx.send_replace(EngineStatus {
            phase: self.phase,
            text,
            raum,
        });
    }

    // -----------------------------------------------------------------------
    // Betrieb als Task
    // -----------------------------------------------------------------------

    /// Startet die Engine als Task und gibt einen Handle zurueck
    pub fn starten(self) -> (EngineHandle, JoinHandle<()>) {
        let (befehl_tx, befehl_rx) = mpsc::channel(BEFEHL_QUEUE_GROESSE);
        let handle = EngineHandle {
            befehle: befehl_tx,
            status: self.status_abonnieren(),
        };
        let task = tokio::spawn(self.run(befehl_rx));
        (handle, task)
    }

    /// Hauptschleife
    ///
    /// Endet, wenn alle Handles verworfen wurden.
    async fn run(mut self, mut befehle: mpsc::Receiver<Befehl>) {
        loop {
            tokio::select! {
                befehl = befehle.recv() => {
                    match befehl {
                        Some(Befehl::Beitreten { raum, antwort }) => {
                            let ergebnis = self.beitritt_treiben(&raum, &mut befehle).await;
                            let _ = antwort.send(ergebnis);
                        }
                        Some(Befehl::Verlassen { antwort }) => {
                            self.verlassen().await;
                            let _ = antwort.send(());
                        }
                        None => break,
                    }
                }

                event = naechstes_server_event(&mut self.server_events) => {
                    match event {
                        Some(event) => self.server_event_verarbeiten(event).await,
                        None => self.transport_verloren().await,
                    }
                }

                Some(ev) = self.peer_rx.recv() => {
                    self.peer_event_verarbeiten(ev).await;
                }
            }
        }

        self.verlassen().await;
        tracing::debug!("Engine beendet");
    }

    /// Fuehrt einen Beitritt aus, bleibt dabei aber fuer Befehle erreichbar
    ///
    /// Ein `Verlassen` waehrend Medienbeschaffung oder Warten auf das Relay
    /// bricht den Beitritt sofort ab und gibt die Sitzung frei. Ein weiterer
    /// Beitritt wird mit `BereitsAktiv` beantwortet.
    async fn beitritt_treiben(
        &mut self,
        raum: &str,
        befehle: &mut mpsc::Receiver<Befehl>,
    ) -> NegotiationResult<()> {
        let mut verlassen_antwort = None;
        {
            let beitritt = self.beitreten(raum);
            tokio::pin!(beitritt);
            loop {
                tokio::select! {
                    ergebnis = &mut beitritt => return ergebnis,
                    befehl = befehle.recv() => match befehl {
                        Some(Befehl::Beitreten { antwort, .. }) => {
                            let _ = antwort.send(Err(NegotiationError::BereitsAktiv));
                        }
                        Some(Befehl::Verlassen { antwort }) => {
                            verlassen_antwort = Some(antwort);
                            break;
                        }
                        None => break,
                    },
                }
            }
        }

        tracing::info!(phase = ?self.phase, "Beitritt abgebrochen");
        self.verlassen().await;
        if let Some(antwort) = verlassen_antwort {
            let _ = antwort.send(());
        }
        Err(NegotiationError::Abgebrochen)
    }
}

/// Wartet auf das naechste Relay-Ereignis
///
/// Ohne Transport bleibt das Future haengen. `None` heisst: Verbindung weg.
async fn naechstes_server_event(events: &mut Option<mpsc::Receiver<ServerEvent>>) -> Option<ServerEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

enum Befehl {
    Beitreten {
        raum: String,
        antwort: oneshot::Sender<NegotiationResult<()>>,
    },
    Verlassen {
        antwort: oneshot::Sender<()>,
    },
}

/// Handle auf eine laufende Engine
#[derive(Clone)]
pub struct EngineHandle {
    befehle: mpsc::Sender<Befehl>,
    status: watch::Receiver<EngineStatus>,
}

impl EngineHandle {
    pub async fn beitreten(&self, raum: impl Into<String>) -> NegotiationResult<()> {
        let (antwort, rx) = oneshot::channel();
        self.befehle
            .send(Befehl::Beitreten {
                raum: raum.into(),
                antwort,
            })
            .await
            .map_err(|_| NegotiationError::Beendet)?;
        rx.await.map_err(|_| NegotiationError::Beendet)?
    }

    pub async fn verlassen(&self) -> NegotiationResult<()> {
        let (antwort, rx) = oneshot::channel();
        self.befehle
            .send(Befehl::Verlassen { antwort })
            .await
            .map_err(|_| NegotiationError::Beendet)?;
        rx.await.map_err(|_| NegotiationError::Beendet)
    }

    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    pub fn status_abonnieren(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    /// Wartet bis der Status die Bedingung erfuellt
    pub async fn warten_bis(
        &self,
        bedingung: impl FnMut(&EngineStatus) -> bool,
    ) -> NegotiationResult<EngineStatus> {
        let mut status = self.status.clone();
        status
            .wait_for(bedingung)
            .await
            .map(|s| s.clone())
            .map_err(|_| NegotiationError::Beendet)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
