//! Relay-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass das Relay ohne Konfigurationsdatei
//! lauffaehig ist.

use duett_signaling::{RaumKapazitaet, RelayConfig, UeberlaufPolitik};
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Raum- und Keepalive-Regeln
    pub relay: RelayEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer Relay und Observability
    pub bind_adresse: String,
    /// TCP-Port des Relays
    pub port: u16,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_verbindungen: u32,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_size: usize,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3000,
            max_verbindungen: 1024,
            max_frame_size: 1024 * 1024,
        }
    }
}

/// Raum- und Keepalive-Regeln
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayEinstellungen {
    /// Ab dieser Mitgliederzahl greift `ueberlauf`
    pub max_mitglieder: usize,
    /// "unbounded", "reject" oder "evict-oldest"
    pub ueberlauf: UeberlaufPolitik,
    /// Verbleibende Mitglieder ueber Abgaenge informieren
    pub peer_left: bool,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for RelayEinstellungen {
    fn default() -> Self {
        Self {
            max_mitglieder: 2,
            ueberlauf: UeberlaufPolitik::Unbounded,
            peer_left: true,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config
                    .pruefen()
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if !duett_observability::log_level_gueltig(&self.logging.level) {
            anyhow::bail!("ungueltiger Log-Level '{}'", self.logging.level);
        }
        if !duett_observability::log_format_gueltig(&self.logging.format) {
            anyhow::bail!(
                "ungueltiges Log-Format '{}' (erlaubt: text, json)",
                self.logging.format
            );
        }
        if self.relay.max_mitglieder == 0 {
            anyhow::bail!("relay.max_mitglieder muss mindestens 1 sein");
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse des Relays zurueck
    pub fn relay_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }

    /// Uebersetzt die Datei-Konfiguration in die Relay-Konfiguration
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            max_verbindungen: self.netzwerk.max_verbindungen,
            max_frame_size: self.netzwerk.max_frame_size,
            kapazitaet: RaumKapazitaet {
                max_mitglieder: self.relay.max_mitglieder,
                ueberlauf: self.relay.ueberlauf,
            },
            peer_left_melden: self.relay.peer_left,
            keepalive_sek: self.relay.keepalive_sek,
            verbindungs_timeout_sek: self.relay.verbindungs_timeout_sek,
        }
    }
}
