//! Gemeinsamer Relay-Zustand
//!
//! Haelt Konfiguration, Raum-Registry, Broadcaster und Metriken als
//! Arc-Referenzen, die zwischen den Verbindungs-Tasks geteilt werden.

use duett_observability::RelayMetrics;
use duett_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::broadcast::EventBroadcaster;
use crate::rooms::{RaumKapazitaet, RoomRegistry};

/// Konfiguration fuer das Signaling-Relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximale gleichzeitige Verbindungen
    pub max_verbindungen: u32,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_size: usize,
    /// Kapazitaets-Regel fuer Raeume
    pub kapazitaet: RaumKapazitaet,
    /// Verbleibende Mitglieder ueber Abgaenge informieren (`peer-left`)
    pub peer_left_melden: bool,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_verbindungen: 1024,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            kapazitaet: RaumKapazitaet::default(),
            peer_left_melden: true,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Gemeinsamer Relay-Zustand
pub struct SignalingState {
    /// Relay-Konfiguration
    pub config: Arc<RelayConfig>,
    /// Raum-Mitgliedschaften
    pub raeume: RoomRegistry,
    /// Send-Queues aller verbundenen Clients
    pub broadcaster: EventBroadcaster,
    /// Prometheus-Metriken
    pub metriken: RelayMetrics,
    /// Belegte Verbindungsplaetze, gezaehlt ab dem Accept
    belegte_plaetze: AtomicU32,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: RelayConfig, metriken: RelayMetrics) -> Arc<Self> {
        let raeume = RoomRegistry::neu(config.kapazitaet);
        Arc::new(Self {
            config: Arc::new(config),
            raeume,
            broadcaster: EventBroadcaster::neu(),
            metriken,
            belegte_plaetze: AtomicU32::new(0),
        })
    }

    /// Reserviert einen Verbindungsplatz
    ///
    /// `None` wenn `max_verbindungen` erreicht ist. Der Platz wird frei,
    /// sobald der zurueckgegebene Guard verworfen wird.
    pub fn platz_reservieren(self: &Arc<Self>) -> Option<VerbindungsPlatz> {
        let max = self.config.max_verbindungen;
        self.belegte_plaetze
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |belegt| {
                (belegt < max).then_some(belegt + 1)
            })
            .ok()?;
        Some(VerbindungsPlatz {
            state: Arc::clone(self),
        })
    }

    /// Anzahl belegter Verbindungsplaetze
    pub fn belegte_plaetze(&self) -> u32 {
        self.belegte_plaetze.load(Ordering::Acquire)
    }

    /// Uebertraegt die aktuelle Raum-Anzahl in die Metriken
    pub(crate) fn raum_metrik_aktualisieren(&self) {
        self.metriken
            .rooms_active
            .set(self.raeume.raum_anzahl() as i64);
    }
}

/// Belegter Verbindungsplatz, siehe [`SignalingState::platz_reservieren`]
pub struct VerbindungsPlatz {
    state: Arc<SignalingState>,
}

impl Drop for VerbindungsPlatz {
    fn drop(&mut self) {
        self.state.belegte_plaetze.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::UeberlaufPolitik;

    #[test]
    fn standard_konfiguration() {
        let config = RelayConfig::default();
        assert_eq!(config.kapazitaet.max_mitglieder, 2);
        assert_eq!(config.kapazitaet.ueberlauf, UeberlaufPolitik::Unbounded);
        assert!(config.peer_left_melden);
        assert_eq!(config.max_frame_size, 1024 * 1024);
    }

    #[test]
    fn registry_uebernimmt_kapazitaet() {
        let config = RelayConfig {
            kapazitaet: RaumKapazitaet {
                max_mitglieder: 3,
                ueberlauf: UeberlaufPolitik::Reject,
            },
            ..Default::default()
        };
        let state = SignalingState::neu(config, RelayMetrics::neu().unwrap());
        assert_eq!(state.raeume.kapazitaet().max_mitglieder, 3);
        assert_eq!(state.raeume.kapazitaet().ueberlauf, UeberlaufPolitik::Reject);
    }

    #[test]
    fn plaetze_werden_beim_reservieren_gezaehlt() {
        let config = RelayConfig {
            max_verbindungen: 2,
            ..Default::default()
        };
        let state = SignalingState::neu(config, RelayMetrics::neu().unwrap());

        let a = state.platz_reservieren().expect("erster Platz");
        let _b = state.platz_reservieren().expect("zweiter Platz");
        assert!(state.platz_reservieren().is_none());
        assert_eq!(state.belegte_plaetze(), 2);

        drop(a);
        assert_eq!(state.belegte_plaetze(), 1);
        assert!(state.platz_reservieren().is_some());
    }
}
