//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! lokalen Task. Das Relay vergibt beim Verbindungsaufbau eine
//! Verbindungs-ID und schickt sie dem Client als `connected`.
//!
//! ## Keepalive
//! - Relay sendet alle `keepalive_sek` einen Ping
//! - Jedes eingehende Frame zaehlt als Lebenszeichen
//! - Nach `verbindungs_timeout_sek` ohne Frame wird die Verbindung getrennt

use duett_core::types::ConnectionId;
use duett_protocol::events::jetzt_ms;
use duett_protocol::{RelayCodec, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;

use crate::dispatcher::MessageDispatcher;
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

type RelayFramed = Framed<TcpStream, RelayCodec>;

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `RelayCodec`, dispatcht an den `MessageDispatcher` und
/// schreibt die Send-Queue der Verbindung auf den Socket.
pub struct ClientConnection {
    state: Arc<SignalingState>,
    dispatcher: MessageDispatcher,
    peer_addr: SocketAddr,
    connection_id: ConnectionId,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection mit frischer Verbindungs-ID
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr) -> Self {
        Self {
            dispatcher: MessageDispatcher::neu(Arc::clone(&state)),
            state,
            peer_addr,
            connection_id: ConnectionId::new(),
        }
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal
    /// eingeht. Danach wird die Verbindung aus allen Raeumen entfernt.
    pub async fn verarbeiten(self, stream: TcpStream, shutdown_rx: watch::Receiver<bool>) {
        let peer_addr = self.peer_addr;
        let id = self.connection_id.clone();

        let codec = RelayCodec::with_max_size(self.state.config.max_frame_size);
        let mut framed = Framed::new(stream, codec);

        let sende_rx = self.state.broadcaster.client_registrieren(id.clone());
        self.state.metriken.connections_active.inc();
        tracing::info!(peer = %peer_addr, verbindung = %id, "Neue Verbindung");

        let ergebnis = match framed.send(ServerEvent::connected(id.clone())).await {
            Ok(()) => self.schleife(&mut framed, sende_rx, shutdown_rx).await,
            Err(e) => Err(e.into()),
        };

        match ergebnis {
            Ok(()) => {}
            Err(e) if e.ist_regulaer() => {
                tracing::info!(peer = %peer_addr, verbindung = %id, grund = %e, "Verbindung beendet");
            }
            Err(e) => {
                tracing::warn!(peer = %peer_addr, verbindung = %id, fehler = %e, "Verbindung abgebrochen");
            }
        }

        // Cleanup beim Verbindungsende
        self.dispatcher.verbindung_trennen(&id);
        self.state.broadcaster.client_entfernen(&id);
        self.state.metriken.connections_active.dec();

        tracing::debug!(peer = %peer_addr, verbindung = %id, "Verbindungs-Task beendet");
    }

    async fn schleife(
        &self,
        framed: &mut RelayFramed,
        mut sende_rx: mpsc::Receiver<ServerEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> SignalingResult<()> {
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek.max(1));
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek.max(1));

        // Zeitpunkt des letzten empfangenen Frames
        let mut letzter_empfang = Instant::now();
        // Zeitpunkt des naechsten Ping
        let mut naechster_ping = Instant::now() + keepalive_intervall;

        loop {
            let jetzt = Instant::now();

            // Timeout-Pruefung
            if jetzt.duration_since(letzter_empfang) > timeout_dauer {
                return Err(SignalingError::Timeout);
            }

            // Naechsten Weckzeitpunkt berechnen (Ping oder Timeout)
            let frist = naechster_ping.min(letzter_empfang + timeout_dauer);
            let verzoegerung = frist
                .checked_duration_since(jetzt)
                .unwrap_or(Duration::from_millis(1));

            tokio::select! {
                // Eingehende Nachricht vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(event)) => {
                            letzter_empfang = Instant::now();
                            tracing::trace!(
                                verbindung = %self.connection_id,
                                event = event.name(),
                                "Nachricht empfangen"
                            );
                            self.dispatcher.dispatch(event, &self.connection_id);
                        }
                        Some(Err(e)) => {
                            return Err(SignalingError::protokoll(e.to_string()));
                        }
                        None => return Err(SignalingError::VerbindungGetrennt),
                    }
                }

                // Ausgehende Nachricht aus dem Broadcaster
                Some(ausgehend) = sende_rx.recv() => {
                    framed.send(ausgehend).await?;
                }

                // Keepalive-Ping / Timeout
                _ = tokio::time::sleep(verzoegerung) => {
                    if Instant::now() >= naechster_ping {
                        framed.send(ServerEvent::ping(jetzt_ms())).await?;
                        naechster_ping = Instant::now() + keepalive_intervall;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        return Err(SignalingError::Shutdown);
                    }
                }
            }
        }
    }
}
