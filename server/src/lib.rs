//! duett-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Signaling-Relay und Observability-Server und
//! stellt den Einstiegspunkt fuer Tests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use duett_observability::{observability_server_starten, HealthState, RelayMetrics};
use duett_signaling::{SignalingServer, SignalingState};
use std::net::SocketAddr;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
                Err(e) => tracing::error!(fehler = %e, "Ctrl-C-Handler fehlgeschlagen"),
            }
            let _ = shutdown_tx.send(true);
        });

        self.ausfuehren(shutdown_rx).await
    }

    /// Laeuft bis `shutdown_rx` auf `true` wechselt
    ///
    /// Reihenfolge:
    /// 1. Metriken und Health-Zustand anlegen
    /// 2. Relay-Listener binden
    /// 3. Observability-Server starten (falls aktiviert)
    /// 4. Accept-Loop des Relays bis zum Shutdown
    pub async fn ausfuehren(self, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let metriken = RelayMetrics::neu()?;
        let health = HealthState::neu(metriken.clone());

        let relay_addr: SocketAddr = self
            .config
            .relay_bind_adresse()
            .parse()
            .with_context(|| format!("Ungueltige Relay-Adresse '{}'", self.config.relay_bind_adresse()))?;

        let relay_config = self.config.relay_config();
        tracing::info!(
            adresse = %relay_addr,
            max_mitglieder = relay_config.kapazitaet.max_mitglieder,
            ueberlauf = ?relay_config.kapazitaet.ueberlauf,
            peer_left = relay_config.peer_left_melden,
            "Relay startet"
        );

        let state = SignalingState::neu(relay_config, metriken.clone());
        let server = SignalingServer::binden(state, relay_addr)
            .await
            .with_context(|| format!("Relay-Port {relay_addr} nicht bindbar"))?;

        let observability = if self.config.observability.aktiviert {
            let addr: SocketAddr = self
                .config
                .observability_bind_adresse()
                .parse()
                .context("Ungueltige Observability-Adresse")?;
            let health = health.clone();
            let shutdown_rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = observability_server_starten(addr, metriken, health, shutdown_rx).await {
                    tracing::error!(fehler = %e, "Observability-Server fehlgeschlagen");
                }
            }))
        } else {
            None
        };

        let ergebnis = server.starten(shutdown_rx).await;
        health.listener_status_setzen(false);

        if let Some(task) = observability {
            if let Err(e) = task.await {
                tracing::warn!(fehler = %e, "Observability-Task abgebrochen");
            }
        }

        ergebnis.context("Relay beendet mit Fehler")?;
        tracing::info!("Server beendet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_faehrt_nach_shutdown_herunter() {
        let mut config = ServerConfig::default();
        config.netzwerk.bind_adresse = "127.0.0.1".into();
        config.netzwerk.port = 0;
        config.observability.aktiviert = false;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();

        Server::neu(config).ausfuehren(shutdown_rx).await.unwrap();
    }

    #[tokio::test]
    async fn ungueltige_adresse_ist_fehler() {
        let mut config = ServerConfig::default();
        config.netzwerk.bind_adresse = "kein host".into();
        let (_tx, rx) = watch::channel(false);
        assert!(Server::neu(config).ausfuehren(rx).await.is_err());
    }
}
