//! Event-Broadcaster – Sendet Relay-Ereignisse an verbundene Clients
//!
//! Der EventBroadcaster verwaltet die Send-Queues aller verbundenen Clients.
//! Zustellung ist best-effort: eine volle Queue verwirft die Nachricht.

use dashmap::DashMap;
use duett_core::types::ConnectionId;
use duett_protocol::ServerEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Client
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Clients
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub connection_id: ConnectionId,
    pub tx: mpsc::Sender<ServerEvent>,
}

impl ClientSender {
    /// Sendet eine Nachricht nicht-blockierend an den Client
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, nachricht: ServerEvent) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(n)) => {
                tracing::warn!(
                    verbindung = %self.connection_id,
                    event = n.name(),
                    "Send-Queue voll – Nachricht verworfen"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(verbindung = %self.connection_id, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Event-Broadcaster fuer alle verbundenen Clients
///
/// Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

#[derive(Default)]
struct EventBroadcasterInner {
    clients: DashMap<ConnectionId, ClientSender>,
}

impl EventBroadcaster {
    /// Erstellt einen neuen EventBroadcaster
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert einen neuen Client und gibt seine Empfangs-Queue zurueck
    ///
    /// Die `ClientConnection` liest aus dieser Queue und sendet via TCP.
    pub fn client_registrieren(&self, connection_id: ConnectionId) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        let sender = ClientSender {
            connection_id: connection_id.clone(),
            tx,
        };
        self.inner.clients.insert(connection_id.clone(), sender);
        tracing::debug!(verbindung = %connection_id, "Client im Broadcaster registriert");
        rx
    }

    /// Entfernt einen Client aus dem Broadcaster
    pub fn client_entfernen(&self, connection_id: &ConnectionId) {
        if self.inner.clients.remove(connection_id).is_some() {
            tracing::debug!(verbindung = %connection_id, "Client aus Broadcaster entfernt");
        }
    }

    /// Sendet eine Nachricht an einen einzelnen Client
    ///
    /// Gibt `true` zurueck wenn der Client gefunden und die Nachricht eingereiht wurde.
    pub fn an_client_senden(&self, connection_id: &ConnectionId, nachricht: ServerEvent) -> bool {
        match self.inner.clients.get(connection_id) {
            Some(sender) => sender.senden(nachricht),
            None => {
                tracing::debug!(verbindung = %connection_id, "Senden an unbekannten Client");
                false
            }
        }
    }

    /// Sendet eine Nachricht an mehrere Clients
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_clients_senden(&self, empfaenger: &[ConnectionId], nachricht: ServerEvent) -> usize {
        let mut gesendet = 0;
        for connection_id in empfaenger {
            if let Some(sender) = self.inner.clients.get(connection_id) {
                if sender.senden(nachricht.clone()) {
                    gesendet += 1;
                }
            }
        }
        gesendet
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
