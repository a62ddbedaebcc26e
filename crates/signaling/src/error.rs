//! Fehlertypen fuer das Signaling-Relay

use thiserror::Error;

/// Fehlertyp fuer das Signaling-Relay
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Protokollfehler (ungueltiges Frame, unbekanntes Ereignis)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Keepalive-Timeout
    #[error("Timeout")]
    Timeout,

    /// Server wird heruntergefahren
    #[error("Server wird heruntergefahren")]
    Shutdown,
}

impl SignalingError {
    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }

    /// Regulaeres Verbindungsende (kein Fehler im eigentlichen Sinn)
    pub fn ist_regulaer(&self) -> bool {
        matches!(self, Self::VerbindungGetrennt | Self::Shutdown)
    }
}

/// Result-Typ fuer das Signaling-Relay
pub type SignalingResult<T> = Result<T, SignalingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_fehler_wird_konvertiert() {
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "kaputt");
        let fehler: SignalingError = io.into();
        assert!(matches!(fehler, SignalingError::Io(_)));
        assert!(fehler.to_string().contains("kaputt"));
    }

    #[test]
    fn regulaeres_ende() {
        assert!(SignalingError::VerbindungGetrennt.ist_regulaer());
        assert!(SignalingError::Shutdown.ist_regulaer());
        assert!(!SignalingError::Timeout.ist_regulaer());
        assert!(!SignalingError::protokoll("x").ist_regulaer());
    }
}
