//! Fehlertypen fuer gemeinsam genutzte Typen
//!
//! Relay und Client definieren eigene Fehler und konvertieren bei Bedarf.

use thiserror::Error;

/// Fehler beim Erzeugen gemeinsamer Typen
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DuettError {
    #[error("Ungueltige Raum-ID: '{0}'")]
    UngueltigeRaumId(String),
}
