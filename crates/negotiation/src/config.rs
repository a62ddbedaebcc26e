//! Client-Konfiguration der Verhandlungs-Engine
//!
//! Wird aus einer TOML-Datei geladen. Fehlende Felder erhalten
//! Standardwerte, eine fehlende Datei ergibt die Standardkonfiguration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{NegotiationError, NegotiationResult};

/// Vollstaendige Engine-Konfiguration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Adresse des Signaling-Relays (host:port)
    pub relay_adresse: String,
    /// STUN-Server fuer die Netzwerk-Traversierung
    pub stun_server: Vec<String>,
    /// Wartezeit auf die Bestaetigung des Relays in Sekunden
    pub transport_timeout_sek: u64,
    /// Bei verweigerten Medien trotzdem beitreten
    pub ohne_medien_fortfahren: bool,
    /// Angeforderte lokale Medien
    pub medien: MedienVorgaben,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            relay_adresse: "127.0.0.1:3000".to_string(),
            stun_server: vec!["stun:stun.l.google.com:19302".to_string()],
            transport_timeout_sek: 10,
            ohne_medien_fortfahren: false,
            medien: MedienVorgaben::default(),
        }
    }
}

/// Welche Medien beim Beitritt angefordert werden
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedienVorgaben {
    pub audio: bool,
    /// `None` = kein Video
    pub video: Option<VideoVorgaben>,
}

impl Default for MedienVorgaben {
    fn default() -> Self {
        Self {
            audio: true,
            video: Some(VideoVorgaben::default()),
        }
    }
}

/// Ideal-Werte fuer die Kamera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoVorgaben {
    pub breite: u32,
    pub hoehe: u32,
    pub bildrate: u32,
    pub kamera: Kamerarichtung,
}

impl Default for VideoVorgaben {
    fn default() -> Self {
        Self {
            breite: 1280,
            hoehe: 720,
            bildrate: 30,
            kamera: Kamerarichtung::User,
        }
    }
}

/// Front- oder Rueckkamera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kamerarichtung {
    /// Frontkamera
    User,
    /// Rueckkamera
    Environment,
}

impl EngineConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei
    pub fn laden(pfad: &str) -> NegotiationResult<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map_err(|e| NegotiationError::Konfiguration(format!("'{pfad}': {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(NegotiationError::Konfiguration(format!(
                "Datei '{pfad}' nicht lesbar: {e}"
            ))),
        }
    }

    /// Parst die Konfiguration aus einem TOML-String
    pub fn aus_toml(inhalt: &str) -> NegotiationResult<Self> {
        toml::from_str(inhalt).map_err(|e| NegotiationError::Konfiguration(e.to_string()))
    }

    pub fn transport_timeout(&self) -> Duration {
        Duration::from_secs(self.transport_timeout_sek.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardwerte() {
        let config = EngineConfig::default();
        assert_eq!(config.relay_adresse, "127.0.0.1:3000");
        assert_eq!(config.stun_server, vec!["stun:stun.l.google.com:19302"]);
        assert!(config.medien.audio);
        let video = config.medien.video.unwrap();
        assert_eq!((video.breite, video.hoehe, video.bildrate), (1280, 720, 30));
        assert_eq!(video.kamera, Kamerarichtung::User);
        assert!(!config.ohne_medien_fortfahren);
    }

    #[test]
    fn teilweise_toml_fuellt_standardwerte() {
        let config = EngineConfig::aus_toml(
            r#"
            relay_adresse = "10.0.0.5:4000"
            ohne_medien_fortfahren = true

            [medien.video]
            kamera = "environment"
            "#,
        )
        .unwrap();
        assert_eq!(config.relay_adresse, "10.0.0.5:4000");
        assert!(config.ohne_medien_fortfahren);
        assert_eq!(config.transport_timeout_sek, 10);
        let video = config.medien.video.unwrap();
        assert_eq!(video.kamera, Kamerarichtung::Environment);
        assert_eq!(video.breite, 1280);
    }

    #[test]
    fn ungueltiges_toml_ist_fehler() {
        let ergebnis = EngineConfig::aus_toml("relay_adresse = [");
        assert!(matches!(ergebnis, Err(NegotiationError::Konfiguration(_))));
    }

    #[test]
    fn fehlende_datei_ergibt_standard() {
        let config = EngineConfig::laden("/nicht/vorhanden/duett-client.toml").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn timeout_mindestens_eine_sekunde() {
        let config = EngineConfig {
            transport_timeout_sek: 0,
            ..Default::default()
        };
        assert_eq!(config.transport_timeout(), Duration::from_secs(1));
    }
}
