//! Raum-Registry – Wer ist in welchem Raum?
//!
//! Raeume entstehen implizit beim ersten Beitritt und verschwinden, sobald
//! das letzte Mitglied gegangen ist. Die Mitglieder stehen in
//! Beitrittsreihenfolge in der Liste, ohne Duplikate.
//!
//! ## Kapazitaet
//! Die Obergrenze pro Raum ist konfigurierbar. Was bei Ueberlauf passiert,
//! legt [`UeberlaufPolitik`] fest:
//! - `unbounded`: keine Grenze (Standard)
//! - `reject`: der Neue wird abgewiesen
//! - `evict-oldest`: das aelteste Mitglied wird verdraengt

use dashmap::DashMap;
use duett_core::types::{ConnectionId, RoomId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Kapazitaet
// ---------------------------------------------------------------------------

/// Verhalten bei einem Beitritt in einen vollen Raum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UeberlaufPolitik {
    /// Keine Grenze, jeder Beitritt wird angenommen
    #[default]
    Unbounded,
    /// Beitritt ablehnen, der Raum bleibt unveraendert
    Reject,
    /// Aeltestes Mitglied entfernen, dann beitreten
    EvictOldest,
}

/// Kapazitaets-Regel fuer alle Raeume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaumKapazitaet {
    pub max_mitglieder: usize,
    pub ueberlauf: UeberlaufPolitik,
}

impl Default for RaumKapazitaet {
    fn default() -> Self {
        Self {
            max_mitglieder: 2,
            ueberlauf: UeberlaufPolitik::Unbounded,
        }
    }
}

impl RaumKapazitaet {
    /// Ist ein Raum mit `anzahl` Mitgliedern fuer einen weiteren voll?
    fn ist_voll(&self, anzahl: usize) -> bool {
        self.ueberlauf != UeberlaufPolitik::Unbounded && anzahl >= self.max_mitglieder.max(1)
    }
}

// ---------------------------------------------------------------------------
// Ergebnisse
// ---------------------------------------------------------------------------

/// Ergebnis eines Beitritts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeitrittsErgebnis {
    /// Neu beigetreten
    Beigetreten {
        /// Mitglieder die schon vorher im Raum waren (ohne Verdraengten)
        bisherige: Vec<ConnectionId>,
        /// Mitglieder die fuer den Beitritt entfernt wurden, aelteste zuerst
        verdraengt: Vec<ConnectionId>,
    },
    /// War schon Mitglied, nichts geaendert
    BereitsMitglied,
    /// Raum voll, Beitritt abgelehnt
    Abgelehnt,
}

/// Ein verlassener Raum mit den verbleibenden Mitgliedern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abgang {
    pub room_id: RoomId,
    pub verbleibende: Vec<ConnectionId>,
}

// ---------------------------------------------------------------------------
// RoomRegistry
// ---------------------------------------------------------------------------

/// Mitgliedschaften aller Raeume
///
/// Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RoomRegistryInner>,
}

struct RoomRegistryInner {
    raeume: DashMap<RoomId, Vec<ConnectionId>>,
    kapazitaet: RaumKapazitaet,
}

impl RoomRegistry {
    /// Erstellt eine leere Registry mit der gegebenen Kapazitaets-Regel
    pub fn neu(kapazitaet: RaumKapazitaet) -> Self {
        Self {
            inner: Arc::new(RoomRegistryInner {
                raeume: DashMap::new(),
                kapazitaet,
            }),
        }
    }

    /// Fuegt eine Verbindung einem Raum hinzu
    ///
    /// Legt den Raum bei Bedarf an. Ein wiederholter Beitritt aendert nichts.
    pub fn beitreten(&self, room_id: &RoomId, verbindung: &ConnectionId) -> BeitrittsErgebnis {
        let mut mitglieder = self.inner.raeume.entry(room_id.clone()).or_default();

        if mitglieder.contains(verbindung) {
            return BeitrittsErgebnis::BereitsMitglied;
        }

        let mut verdraengt = Vec::new();
        if self.inner.kapazitaet.ist_voll(mitglieder.len()) {
            match self.inner.kapazitaet.ueberlauf {
                UeberlaufPolitik::Reject => return BeitrittsErgebnis::Abgelehnt,
                UeberlaufPolitik::EvictOldest => {
                    // Ein ueberfuellter Raum gibt alle ueberzaehligen Mitglieder ab
                    let ueberzaehlig = mitglieder.len() + 1 - self.inner.kapazitaet.max_mitglieder.max(1);
                    verdraengt.extend(mitglieder.drain(..ueberzaehlig));
                }
                UeberlaufPolitik::Unbounded => {}
            }
        }

        let bisherige = mitglieder.clone();
        mitglieder.push(verbindung.clone());

        BeitrittsErgebnis::Beigetreten {
            bisherige,
            verdraengt,
        }
    }

    /// Entfernt eine Verbindung aus einem Raum
    ///
    /// Gibt `None` zurueck wenn die Verbindung kein Mitglied war.
    pub fn verlassen(&self, room_id: &RoomId, verbindung: &ConnectionId) -> Option<Abgang> {
        let verbleibende = {
            let mut mitglieder = self.inner.raeume.get_mut(room_id)?;
            let vorher = mitglieder.len();
            mitglieder.retain(|id| id != verbindung);
            if mitglieder.len() == vorher {
                return None;
            }
            mitglieder.clone()
        };

        if verbleibende.is_empty() {
            self.inner.raeume.remove_if(room_id, |_, m| m.is_empty());
        }

        Some(Abgang {
            room_id: room_id.clone(),
            verbleibende,
        })
    }

    /// Entfernt eine Verbindung aus allen Raeumen
    pub fn alle_verlassen(&self, verbindung: &ConnectionId) -> Vec<Abgang> {
        let mut abgaenge = Vec::new();

        self.inner.raeume.iter_mut().for_each(|mut entry| {
            let vorher = entry.value().len();
            entry.value_mut().retain(|id| id != verbindung);
            if entry.value().len() != vorher {
                abgaenge.push(Abgang {
                    room_id: entry.key().clone(),
                    verbleibende: entry.value().clone(),
                });
            }
        });

        // Leere Raeume aufraeumen
        self.inner.raeume.retain(|_, mitglieder| !mitglieder.is_empty());
        abgaenge
    }

    /// Alle Mitglieder eines Raums ausser `absender`
    ///
    /// `None` wenn der Raum nicht existiert oder `absender` kein Mitglied ist.
    pub fn andere_mitglieder(
        &self,
        room_id: &RoomId,
        absender: &ConnectionId,
    ) -> Option<Vec<ConnectionId>> {
        let mitglieder = self.inner.raeume.get(room_id)?;
        if !mitglieder.contains(absender) {
            return None;
        }
        Some(
            mitglieder
                .iter()
                .filter(|id| *id != absender)
                .cloned()
                .collect(),
        )
    }

    /// Mitglieder eines Raums in Beitrittsreihenfolge
    pub fn mitglieder(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.inner
            .raeume
            .get(room_id)
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Anzahl aktiver Raeume
    pub fn raum_anzahl(&self) -> usize {
        self.inner.raeume.len()
    }

    pub fn kapazitaet(&self) -> RaumKapazitaet {
        self.inner.kapazitaet
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::neu(RaumKapazitaet::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn raum(id: &str) -> RoomId {
        RoomId::parse(id).unwrap()
    }

    fn id(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    fn registry(max: usize, ueberlauf: UeberlaufPolitik) -> RoomRegistry {
        RoomRegistry::neu(RaumKapazitaet {
            max_mitglieder: max,
            ueberlauf,
        })
    }

    #[test]
    fn erster_beitritt_legt_raum_an() {
        let reg = RoomRegistry::default();
        let ergebnis = reg.beitreten(&raum("r1"), &id("X"));
        assert_eq!(
            ergebnis,
            BeitrittsErgebnis::Beigetreten {
                bisherige: vec![],
                verdraengt: vec![]
            }
        );
        assert_eq!(reg.raum_anzahl(), 1);
        assert_eq!(reg.mitglieder(&raum("r1")), vec![id("X")]);
    }

    #[test]
    fn zweiter_beitritt_meldet_bisherige() {
        let reg = RoomRegistry::default();
        reg.beitreten(&raum("r1"), &id("X"));
        match reg.beitreten(&raum("r1"), &id("Y")) {
            BeitrittsErgebnis::Beigetreten { bisherige, .. } => assert_eq!(bisherige, vec![id("X")]),
            andere => panic!("Unerwartet: {:?}", andere),
        }
    }

    #[test]
    fn wiederholter_beitritt_ist_idempotent() {
        let reg = RoomRegistry::default();
        reg.beitreten(&raum("r1"), &id("X"));
        assert_eq!(
            reg.beitreten(&raum("r1"), &id("X")),
            BeitrittsErgebnis::BereitsMitglied
        );
        assert_eq!(reg.mitglieder(&raum("r1")).len(), 1);
    }

    #[test]
    fn unbegrenzt_nimmt_dritten_auf() {
        let reg = RoomRegistry::default();
        for name in ["A", "B", "C"] {
            reg.beitreten(&raum("r1"), &id(name));
        }
        assert_eq!(reg.mitglieder(&raum("r1")).len(), 3);
    }

    #[test]
    fn ablehnen_laesst_raum_unveraendert() {
        let reg = registry(2, UeberlaufPolitik::Reject);
        reg.beitreten(&raum("r1"), &id("A"));
        reg.beitreten(&raum("r1"), &id("B"));
        assert_eq!(
            reg.beitreten(&raum("r1"), &id("C")),
            BeitrittsErgebnis::Abgelehnt
        );
        assert_eq!(reg.mitglieder(&raum("r1")), vec![id("A"), id("B")]);
    }

    #[test]
    fn verdraengen_entfernt_aeltestes_mitglied() {
        let reg = registry(2, UeberlaufPolitik::EvictOldest);
        reg.beitreten(&raum("r1"), &id("A"));
        reg.beitreten(&raum("r1"), &id("B"));
        assert_eq!(
            reg.beitreten(&raum("r1"), &id("C")),
            BeitrittsErgebnis::Beigetreten {
                bisherige: vec![id("B")],
                verdraengt: vec![id("A")]
            }
        );
        assert_eq!(reg.mitglieder(&raum("r1")), vec![id("B"), id("C")]);
    }

    #[test]
    fn ueberfuellter_raum_meldet_alle_verdraengten() {
        let reg = registry(2, UeberlaufPolitik::EvictOldest);
        reg.inner
            .raeume
            .insert(raum("r1"), vec![id("A"), id("B"), id("C")]);
        assert_eq!(
            reg.beitreten(&raum("r1"), &id("D")),
            BeitrittsErgebnis::Beigetreten {
                bisherige: vec![id("C")],
                verdraengt: vec![id("A"), id("B")]
            }
        );
        assert_eq!(reg.mitglieder(&raum("r1")), vec![id("C"), id("D")]);
    }

    #[test]
    fn verlassen_entfernt_leeren_raum() {
        let reg = RoomRegistry::default();
        reg.beitreten(&raum("r1"), &id("X"));
        let abgang = reg.verlassen(&raum("r1"), &id("X")).unwrap();
        assert!(abgang.verbleibende.is_empty());
        assert_eq!(reg.raum_anzahl(), 0);
    }

    #[test]
    fn verlassen_ohne_mitgliedschaft() {
        let reg = RoomRegistry::default();
        reg.beitreten(&raum("r1"), &id("X"));
        assert!(reg.verlassen(&raum("r1"), &id("Y")).is_none());
        assert!(reg.verlassen(&raum("r2"), &id("X")).is_none());
        assert_eq!(reg.raum_anzahl(), 1);
    }

    #[test]
    fn alle_verlassen_raeumt_jeden_raum() {
        let reg = RoomRegistry::default();
        reg.beitreten(&raum("r1"), &id("X"));
        reg.beitreten(&raum("r2"), &id("X"));
        reg.beitreten(&raum("r2"), &id("Y"));

        let mut abgaenge = reg.alle_verlassen(&id("X"));
        abgaenge.sort_by(|a, b| a.room_id.cmp(&b.room_id));

        assert_eq!(abgaenge.len(), 2);
        assert_eq!(abgaenge[0].room_id, raum("r1"));
        assert!(abgaenge[0].verbleibende.is_empty());
        assert_eq!(abgaenge[1].verbleibende, vec![id("Y")]);
        assert_eq!(reg.mitglieder(&raum("r2")), vec![id("Y")]);
        assert_eq!(reg.raum_anzahl(), 1);
    }

    #[test]
    fn andere_mitglieder_nur_fuer_mitglieder() {
        let reg = RoomRegistry::default();
        reg.beitreten(&raum("r1"), &id("X"));
        reg.beitreten(&raum("r1"), &id("Y"));

        assert_eq!(reg.andere_mitglieder(&raum("r1"), &id("X")), Some(vec![id("Y")]));
        assert_eq!(reg.andere_mitglieder(&raum("r1"), &id("Z")), None);
        assert_eq!(reg.andere_mitglieder(&raum("r9"), &id("X")), None);
    }
}
