//! Fehlertypen fuer die Verhandlungs-Engine

use thiserror::Error;

/// Fehler beim Beschaffen lokaler Medien
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    /// Zugriff auf Kamera/Mikrofon verweigert
    #[error("Zugriff auf Kamera/Mikrofon verweigert")]
    Verweigert,

    /// Kein passendes Geraet vorhanden
    #[error("Kein Geraet verfuegbar: {0}")]
    KeinGeraet(String),

    /// Spur wurde bereits gestoppt
    #[error("Spur gestoppt")]
    Gestoppt,

    /// Sonstiger Medienfehler
    #[error("Medienfehler: {0}")]
    Intern(String),
}

/// Fehler der Relay-Verbindung
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Verbindungsaufbau fehlgeschlagen
    #[error("Verbindung zum Relay fehlgeschlagen: {0}")]
    Verbindung(String),

    /// Verbindung wurde getrennt
    #[error("Verbindung zum Relay getrennt: {0}")]
    Getrennt(String),

    /// Relay hat die Verbindung nicht rechtzeitig bestaetigt
    #[error("Zeitueberschreitung beim Verbindungsaufbau")]
    Timeout,

    /// Nachricht konnte nicht uebergeben werden
    #[error("Senden fehlgeschlagen: {0}")]
    Senden(String),
}

/// Fehlertyp fuer die Verhandlungs-Engine
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// Raum-ID leer oder ungueltig
    #[error("Ungueltige Raum-ID: {0}")]
    UngueltigeRaumId(String),

    /// Es laeuft bereits eine Sitzung
    #[error("Sitzung bereits aktiv")]
    BereitsAktiv,

    /// Lokale Medien nicht verfuegbar
    #[error(transparent)]
    Medien(#[from] MediaError),

    /// Relay-Verbindung
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Fehler im Verbindungsobjekt
    #[error("Verbindungsobjekt: {0}")]
    PeerConnection(String),

    /// Fehler aus dem WebRTC-Stack
    #[error("WebRTC-Fehler: {0}")]
    Webrtc(#[from] webrtc::Error),

    /// Session-Beschreibung oder Kandidat nicht lesbar
    #[error("Ungueltige Verhandlungsnachricht: {0}")]
    Nachricht(String),

    /// Konfiguration nicht lesbar
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    /// Beitritt wurde durch Verlassen abgebrochen
    #[error("Beitritt abgebrochen")]
    Abgebrochen,

    /// Engine laeuft nicht mehr
    #[error("Engine beendet")]
    Beendet,
}

impl NegotiationError {
    /// Erstellt einen Fehler des Verbindungsobjekts
    pub fn peer(msg: impl Into<String>) -> Self {
        Self::PeerConnection(msg.into())
    }

    /// Erstellt einen Nachrichtenfehler
    pub fn nachricht(msg: impl Into<String>) -> Self {
        Self::Nachricht(msg.into())
    }
}

/// Result-Typ fuer die Verhandlungs-Engine
pub type NegotiationResult<T> = Result<T, NegotiationError>;
