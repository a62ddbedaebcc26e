//! Relay-Client (Transport der Verhandlungsnachrichten)
//!
//! Der `SignalingClient` haelt eine TCP-Verbindung zum Relay. Ein
//! Hintergrund-Task liest Frames ueber den `ClientCodec`, beantwortet
//! Pings selbst und reicht alle anderen Ereignisse an die Engine weiter.
//!
//! Bereitschaft: das Relay schickt nach dem Verbindungsaufbau genau ein
//! `connected` mit der vergebenen Verbindungs-ID. Bis dahin wartet
//! [`SignalingChannel::bereit`].

use async_trait::async_trait;
use duett_core::types::ConnectionId;
use duett_protocol::events::Heartbeat;
use duett_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use duett_protocol::{ClientCodec, ClientEvent, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;

use crate::error::TransportError;

/// Groesse der Queue Richtung Engine
const EREIGNIS_QUEUE_GROESSE: usize = 64;

/// Zustand der Relay-Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    /// TCP steht, `connected` steht noch aus
    Verbindend,
    /// Relay hat die Verbindungs-ID vergeben
    Bereit { connection_id: ConnectionId },
    /// Verbindung beendet
    Getrennt { grund: String },
}

/// Nachrichtenkanal zum Relay
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Wartet bis das Relay die Verbindung bestaetigt hat
    async fn bereit(&self) -> Result<ConnectionId, TransportError>;

    /// Sendet ein Ereignis ohne auf Zustellung zu warten
    fn senden(&self, event: ClientEvent) -> Result<(), TransportError>;
}

/// Aufgebaute Relay-Verbindung: Sendekanal und Ereignisstrom
pub struct Transport {
    pub kanal: Arc<dyn SignalingChannel>,
    pub events: mpsc::Receiver<ServerEvent>,
}

/// Baut Relay-Verbindungen auf
#[async_trait]
pub trait SignalingConnector: Send + Sync {
    async fn verbinden(&self) -> Result<Transport, TransportError>;
}

// ---------------------------------------------------------------------------
// TCP-Client
// ---------------------------------------------------------------------------

/// TCP-Verbindung zum Relay
///
/// Wird der Client verworfen, beendet der Hintergrund-Task die Verbindung.
pub struct SignalingClient {
    ausgang: mpsc::UnboundedSender<ClientEvent>,
    status: watch::Receiver<TransportStatus>,
}

impl SignalingClient {
    /// Verbindet mit dem Relay und startet den Hintergrund-Task
    pub async fn verbinden(
        adresse: &str,
        max_frame_size: usize,
    ) -> Result<(Self, mpsc::Receiver<ServerEvent>), TransportError> {
        tracing::info!(adresse = adresse, "Verbinde mit Relay");
        let stream = TcpStream::connect(adresse)
            .await
            .map_err(|e| TransportError::Verbindung(e.to_string()))?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(fehler = %e, "TCP_NODELAY nicht gesetzt");
        }

        let framed = Framed::new(stream, ClientCodec::with_max_size(max_frame_size));
        let (ausgang_tx, ausgang_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(EREIGNIS_QUEUE_GROESSE);
        let (status_tx, status_rx) = watch::channel(TransportStatus::Verbindend);

        tokio::spawn(verbindungs_task(framed, ausgang_rx, events_tx, status_tx));

        Ok((
            Self {
                ausgang: ausgang_tx,
                status: status_rx,
            },
            events_rx,
        ))
    }

    /// Aktueller Verbindungszustand
    pub fn status(&self) -> TransportStatus {
        self.status.borrow().clone()
    }
}

#[async_trait]
impl SignalingChannel for SignalingClient {
    async fn bereit(&self) -> Result<ConnectionId, TransportError> {
        let mut status = self.status.clone();
        let ergebnis = status
            .wait_for(|s| !matches!(s, TransportStatus::Verbindend))
            .await
            .map(|s| s.clone());

        match ergebnis {
            Ok(TransportStatus::Bereit { connection_id }) => Ok(connection_id),
            Ok(TransportStatus::Getrennt { grund }) => Err(TransportError::Getrennt(grund)),
            Ok(TransportStatus::Verbindend) | Err(_) => Err(TransportError::Getrennt(
                "Verbindungs-Task beendet".to_string(),
            )),
        }
    }

    fn senden(&self, event: ClientEvent) -> Result<(), TransportError> {
        self.ausgang
            .send(event)
            .map_err(|e| TransportError::Senden(format!("{}: Verbindung geschlossen", e.0.name())))
    }
}

async fn verbindungs_task(
    mut framed: Framed<TcpStream, ClientCodec>,
    mut ausgang_rx: mpsc::UnboundedReceiver<ClientEvent>,
    events_tx: mpsc::Sender<ServerEvent>,
    status_tx: watch::Sender<TransportStatus>,
) {
    let grund = loop {
        tokio::select! {
            frame = framed.next() => {
                match frame {
                    Some(Ok(ServerEvent::Connected(hinweis))) => {
                        tracing::info!(verbindung = %hinweis.socket_id, "Relay hat Verbindung bestaetigt");
                        status_tx.send_replace(TransportStatus::Bereit {
                            connection_id: hinweis.socket_id,
                        });
                    }
                    // Ping automatisch beantworten
                    Some(Ok(ServerEvent::Ping(hb))) => {
                        let pong = ClientEvent::Pong(Heartbeat { timestamp_ms: hb.timestamp_ms });
                        if let Err(e) = framed.send(pong).await {
                            break e.to_string();
                        }
                    }
                    Some(Ok(event)) => {
                        tracing::trace!(event = event.name(), "Ereignis vom Relay");
                        if events_tx.send(event).await.is_err() {
                            break "Engine beendet".to_string();
                        }
                    }
                    Some(Err(e)) => break e.to_string(),
                    None => break "Relay hat die Verbindung geschlossen".to_string(),
                }
            }

            ausgehend = ausgang_rx.recv() => {
                match ausgehend {
                    Some(event) => {
                        tracing::trace!(event = event.name(), "Sende an Relay");
                        if let Err(e) = framed.send(event).await {
                            break e.to_string();
                        }
                    }
                    None => break "Client geschlossen".to_string(),
                }
            }
        }
    };

    tracing::info!(grund = %grund, "Relay-Verbindung beendet");
    status_tx.send_replace(TransportStatus::Getrennt { grund });
}

/// Verbindet per TCP mit einer festen Relay-Adresse
#[derive(Debug, Clone)]
pub struct TcpConnector {
    adresse: String,
    max_frame_size: usize,
}

impl TcpConnector {
    pub fn neu(adresse: impl Into<String>) -> Self {
        Self {
            adresse: adresse.into(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn mit_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }
}

#[async_trait]
impl SignalingConnector for TcpConnector {
    async fn verbinden(&self) -> Result<Transport, TransportError> {
        let (client, events) = SignalingClient::verbinden(&self.adresse, self.max_frame_size).await?;
        Ok(Transport {
            kanal: Arc::new(client),
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duett_core::types::RoomId;
    use duett_protocol::RelayCodec;
    use tokio::net::TcpListener;

    async fn fake_relay() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let adresse = listener.local_addr().unwrap().to_string();
        (listener, adresse)
    }

    #[tokio::test]
    async fn bereit_nach_connected() {
        let (listener, adresse) = fake_relay().await;
        let relay = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, RelayCodec::new());
            framed.send(ServerEvent::connected(ConnectionId::from("abc"))).await.unwrap();
            framed.send(ServerEvent::user_joined(ConnectionId::from("xyz"))).await.unwrap();
            // Auf join-room vom Client warten
            framed.next().await.unwrap().unwrap()
        });

        let (client, mut events) = SignalingClient::verbinden(&adresse, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap();
        assert_eq!(client.bereit().await.unwrap(), ConnectionId::from("abc"));

        // connected wird verbraucht, user-joined weitergereicht
        let ev = events.recv().await.unwrap();
        assert_eq!(ev, ServerEvent::user_joined(ConnectionId::from("xyz")));

        client
            .senden(ClientEvent::join_room(RoomId::parse("r1").unwrap()))
            .unwrap();
        let empfangen = relay.await.unwrap();
        assert_eq!(empfangen.name(), "join-room");
    }

    #[tokio::test]
    async fn ping_wird_mit_gleichem_zeitstempel_beantwortet() {
        let (listener, adresse) = fake_relay().await;
        let relay = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, RelayCodec::new());
            framed.send(ServerEvent::ping(4242)).await.unwrap();
            framed.next().await.unwrap().unwrap()
        });

        let (_client, _events) = SignalingClient::verbinden(&adresse, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap();
        let antwort = relay.await.unwrap();
        assert_eq!(antwort, ClientEvent::Pong(Heartbeat { timestamp_ms: 4242 }));
    }

    #[tokio::test]
    async fn trennung_vor_connected() {
        let (listener, adresse) = fake_relay().await;
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let (client, _events) = SignalingClient::verbinden(&adresse, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap();
        let ergebnis = client.bereit().await;
        assert!(matches!(ergebnis, Err(TransportError::Getrennt(_))));
        assert!(matches!(client.status(), TransportStatus::Getrennt { .. }));
    }

    #[tokio::test]
    async fn verbindungsfehler() {
        // Port binden und sofort wieder freigeben
        let (listener, adresse) = fake_relay().await;
        drop(listener);

        let ergebnis = TcpConnector::neu(adresse).verbinden().await;
        assert!(matches!(ergebnis, Err(TransportError::Verbindung(_))));
    }
}
