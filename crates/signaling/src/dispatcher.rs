//! Message-Dispatcher – Fuehrt Client-Ereignisse gegen die Raum-Registry aus
//!
//! Alle Operationen sind synchron: jedes Ereignis wird vollstaendig
//! verarbeitet bevor das naechste drankommt. Es gibt keine Antworten an den
//! Absender; Fehlzustellungen werden still verworfen.
//!
//! ## Zustellregel
//! Weitergeleitet wird immer "an den Raum, ausser an den Absender". Der
//! Absender wird mit der vom Relay vergebenen Verbindungs-ID markiert.

use duett_core::types::{ConnectionId, RoomId};
use duett_protocol::events::{
    CandidateMessage, DescriptionMessage, RelayedCandidate, RelayedDescription,
};
use duett_protocol::{ClientEvent, NegotiationKind, ServerEvent};
use std::sync::Arc;

use crate::rooms::{Abgang, BeitrittsErgebnis};
use crate::server_state::SignalingState;

/// Zentraler Message-Dispatcher
///
/// Teilt den Relay-Zustand mit allen Verbindungen.
#[derive(Clone)]
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Verarbeitet ein eingehendes Ereignis einer Verbindung
    pub fn dispatch(&self, event: ClientEvent, absender: &ConnectionId) {
        match event {
            ClientEvent::JoinRoom(req) => self.raum_beitreten(&req.room_id, absender),
            ClientEvent::LeaveRoom(req) => self.raum_verlassen(&req.room_id, absender),
            ClientEvent::Offer(msg) => self.offer_weiterleiten(msg, absender),
            ClientEvent::Answer(msg) => self.answer_weiterleiten(msg, absender),
            ClientEvent::IceCandidate(msg) => self.kandidat_weiterleiten(msg, absender),
            ClientEvent::Pong(hb) => {
                let rtt = duett_protocol::events::jetzt_ms().saturating_sub(hb.timestamp_ms);
                tracing::trace!(verbindung = %absender, rtt_ms = rtt, "Pong empfangen");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Mitgliedschaft
    // -----------------------------------------------------------------------

    /// Fuegt eine Verbindung einem Raum hinzu und benachrichtigt die anderen
    pub fn raum_beitreten(&self, room_id: &RoomId, verbindung: &ConnectionId) {
        let broadcaster = &self.state.broadcaster;

        match self.state.raeume.beitreten(room_id, verbindung) {
            BeitrittsErgebnis::BereitsMitglied => {
                tracing::debug!(raum = %room_id, verbindung = %verbindung, "Bereits im Raum");
            }
            BeitrittsErgebnis::Abgelehnt => {
                tracing::info!(raum = %room_id, verbindung = %verbindung, "Raum voll – Beitritt abgelehnt");
                self.state.metriken.joins_rejected_total.inc();
                broadcaster.an_client_senden(verbindung, ServerEvent::room_full(room_id.clone()));
            }
            BeitrittsErgebnis::Beigetreten {
                bisherige,
                verdraengt,
            } => {
                for alt in &verdraengt {
                    tracing::info!(raum = %room_id, verbindung = %alt, "Aeltestes Mitglied verdraengt");
                    broadcaster.an_client_senden(alt, ServerEvent::evicted(room_id.clone()));
                    self.abgang_melden(alt, &bisherige);
                }

                tracing::info!(
                    raum = %room_id,
                    verbindung = %verbindung,
                    mitglieder = bisherige.len() + 1,
                    "Raum beigetreten"
                );
                broadcaster.an_clients_senden(&bisherige, ServerEvent::user_joined(verbindung.clone()));
                self.state.raum_metrik_aktualisieren();
            }
        }
    }

    /// Explizites Verlassen eines Raums (`leave-room`)
    pub fn raum_verlassen(&self, room_id: &RoomId, verbindung: &ConnectionId) {
        match self.state.raeume.verlassen(room_id, verbindung) {
            Some(abgang) => {
                tracing::info!(raum = %room_id, verbindung = %verbindung, "Raum verlassen");
                self.abgang_melden(verbindung, &abgang.verbleibende);
                self.state.raum_metrik_aktualisieren();
            }
            None => {
                tracing::debug!(raum = %room_id, verbindung = %verbindung, "Verlassen ohne Mitgliedschaft ignoriert");
            }
        }
    }

    /// Entfernt eine getrennte Verbindung aus allen Raeumen
    pub fn verbindung_trennen(&self, verbindung: &ConnectionId) {
        let abgaenge = self.state.raeume.alle_verlassen(verbindung);
        for Abgang {
            room_id,
            verbleibende,
        } in &abgaenge
        {
            tracing::info!(raum = %room_id, verbindung = %verbindung, "Mitglied getrennt");
            self.abgang_melden(verbindung, verbleibende);
        }
        if !abgaenge.is_empty() {
            self.state.raum_metrik_aktualisieren();
        }
    }

    fn abgang_melden(&self, gegangen: &ConnectionId, verbleibende: &[ConnectionId]) {
        if !self.state.config.peer_left_melden || verbleibende.is_empty() {
            return;
        }
        self.state
            .broadcaster
            .an_clients_senden(verbleibende, ServerEvent::peer_left(gegangen.clone()));
    }

    // -----------------------------------------------------------------------
    // Weiterleitung
    // -----------------------------------------------------------------------

    /// Leitet eine Offer an die anderen Raummitglieder weiter
    pub fn offer_weiterleiten(&self, msg: DescriptionMessage, absender: &ConnectionId) {
        self.absender_pruefen(&msg.from, absender);
        let event = ServerEvent::OfferReceived(RelayedDescription {
            sdp: msg.sdp,
            from: absender.clone(),
        });
        self.weiterleiten(NegotiationKind::Offer, &msg.room_id, absender, event);
    }

    /// Leitet eine Answer an die anderen Raummitglieder weiter
    pub fn answer_weiterleiten(&self, msg: DescriptionMessage, absender: &ConnectionId) {
        self.absender_pruefen(&msg.from, absender);
        let event = ServerEvent::AnswerReceived(RelayedDescription {
            sdp: msg.sdp,
            from: absender.clone(),
        });
        self.weiterleiten(NegotiationKind::Answer, &msg.room_id, absender, event);
    }

    /// Leitet einen ICE-Kandidaten an die anderen Raummitglieder weiter
    pub fn kandidat_weiterleiten(&self, msg: CandidateMessage, absender: &ConnectionId) {
        self.absender_pruefen(&msg.from, absender);
        let event = ServerEvent::IceCandidateReceived(RelayedCandidate {
            candidate: msg.candidate,
            from: absender.clone(),
        });
        self.weiterleiten(NegotiationKind::Candidate, &msg.room_id, absender, event);
    }

    fn weiterleiten(
        &self,
        art: NegotiationKind,
        room_id: &RoomId,
        absender: &ConnectionId,
        event: ServerEvent,
    ) {
        let empfaenger = match self.state.raeume.andere_mitglieder(room_id, absender) {
            Some(andere) if !andere.is_empty() => andere,
            _ => {
                tracing::debug!(
                    raum = %room_id,
                    verbindung = %absender,
                    art = art.as_str(),
                    "Kein Empfaenger – Nachricht verworfen"
                );
                self.state.metriken.verworfen(art.as_str());
                return;
            }
        };

        let gesendet = self.state.broadcaster.an_clients_senden(&empfaenger, event);
        tracing::trace!(raum = %room_id, art = art.as_str(), empfaenger = gesendet, "Weitergeleitet");
        self.state.metriken.weitergeleitet(art.as_str(), gesendet);
    }

    fn absender_pruefen(&self, angegeben: &ConnectionId, tatsaechlich: &ConnectionId) {
        if angegeben != tatsaechlich {
            tracing::debug!(
                angegeben = %angegeben,
                verbindung = %tatsaechlich,
                "Absender-Angabe weicht ab – Verbindungs-ID wird verwendet"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::{RaumKapazitaet, UeberlaufPolitik};
    use crate::server_state::RelayConfig;
    use duett_observability::RelayMetrics;
    use duett_protocol::{IceCandidate, SessionDescription};
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Aufbau {
        dispatcher: MessageDispatcher,
        state: Arc<SignalingState>,
    }

    impl Aufbau {
        fn neu(config: RelayConfig) -> Self {
            let state = SignalingState::neu(config, RelayMetrics::neu().unwrap());
            Self {
                dispatcher: MessageDispatcher::neu(Arc::clone(&state)),
                state,
            }
        }

        fn verbinden(&self, name: &str) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
            let id = ConnectionId::from(name);
            let rx = self.state.broadcaster.client_registrieren(id.clone());
            (id, rx)
        }
    }

    fn raum(id: &str) -> RoomId {
        RoomId::parse(id).unwrap()
    }

    fn sdp(text: &str) -> SessionDescription {
        SessionDescription(json!({"type": "offer", "sdp": text}))
    }

    fn alle(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        events
    }

    #[test]
    fn beitritt_benachrichtigt_nur_bisherige() {
        let a = Aufbau::neu(RelayConfig::default());
        let (x, mut rx_x) = a.verbinden("X");
        let (y, mut rx_y) = a.verbinden("Y");

        a.dispatcher.raum_beitreten(&raum("r1"), &x);
        assert!(alle(&mut rx_x).is_empty());

        a.dispatcher.raum_beitreten(&raum("r1"), &y);
        assert_eq!(alle(&mut rx_x), vec![ServerEvent::user_joined(y.clone())]);
        assert!(alle(&mut rx_y).is_empty());
        assert_eq!(a.state.metriken.rooms_active.get(), 1);
    }

    #[test]
    fn wiederholter_beitritt_ohne_benachrichtigung() {
        let a = Aufbau::neu(RelayConfig::default());
        let (x, mut rx_x) = a.verbinden("X");
        let (y, _rx_y) = a.verbinden("Y");

        a.dispatcher.raum_beitreten(&raum("r1"), &x);
        a.dispatcher.raum_beitreten(&raum("r1"), &y);
        alle(&mut rx_x);

        a.dispatcher.raum_beitreten(&raum("r1"), &y);
        assert!(alle(&mut rx_x).is_empty());
    }

    #[test]
    fn offer_wird_mit_echtem_absender_weitergeleitet() {
        let a = Aufbau::neu(RelayConfig::default());
        let (x, mut rx_x) = a.verbinden("X");
        let (y, mut rx_y) = a.verbinden("Y");
        a.dispatcher.raum_beitreten(&raum("r1"), &x);
        a.dispatcher.raum_beitreten(&raum("r1"), &y);
        alle(&mut rx_x);

        // Gefaelschter Absender wird ersetzt
        a.dispatcher.dispatch(
            ClientEvent::offer(raum("r1"), sdp("S1"), ConnectionId::from("falsch")),
            &x,
        );

        assert_eq!(
            alle(&mut rx_y),
            vec![ServerEvent::OfferReceived(RelayedDescription {
                sdp: sdp("S1"),
                from: x.clone(),
            })]
        );
        assert!(alle(&mut rx_x).is_empty());
        let zugestellt = a
            .state
            .metriken
            .messages_relayed_total
            .with_label_values(&["offer"])
            .get();
        assert_eq!(zugestellt, 1);
    }

    #[test]
    fn kandidat_im_leeren_raum_wird_verworfen() {
        let a = Aufbau::neu(RelayConfig::default());
        let (x, mut rx_x) = a.verbinden("X");
        a.dispatcher.raum_beitreten(&raum("r1"), &x);

        a.dispatcher.dispatch(
            ClientEvent::ice_candidate(raum("r1"), IceCandidate(json!({"candidate": "c"})), x.clone()),
            &x,
        );

        assert!(alle(&mut rx_x).is_empty());
        let verworfen = a
            .state
            .metriken
            .messages_dropped_total
            .with_label_values(&["candidate"])
            .get();
        assert_eq!(verworfen, 1);
    }

    #[test]
    fn nachricht_von_nichtmitglied_wird_verworfen() {
        let a = Aufbau::neu(RelayConfig::default());
        let (x, mut rx_x) = a.verbinden("X");
        let (y, mut rx_y) = a.verbinden("Y");
        let (z, _rx_z) = a.verbinden("Z");
        a.dispatcher.raum_beitreten(&raum("r1"), &x);
        a.dispatcher.raum_beitreten(&raum("r1"), &y);
        alle(&mut rx_x);

        a.dispatcher
            .dispatch(ClientEvent::answer(raum("r1"), sdp("S2"), z.clone()), &z);

        assert!(alle(&mut rx_x).is_empty());
        assert!(alle(&mut rx_y).is_empty());
    }

    #[test]
    fn raeume_sind_isoliert() {
        let a = Aufbau::neu(RelayConfig::default());
        let (x, _rx_x) = a.verbinden("X");
        let (y, mut rx_y) = a.verbinden("Y");
        let (z, mut rx_z) = a.verbinden("Z");
        a.dispatcher.raum_beitreten(&raum("A"), &x);
        a.dispatcher.raum_beitreten(&raum("A"), &y);
        a.dispatcher.raum_beitreten(&raum("B"), &z);

        a.dispatcher
            .dispatch(ClientEvent::offer(raum("A"), sdp("S"), x.clone()), &x);

        assert_eq!(alle(&mut rx_y).len(), 1);
        assert!(alle(&mut rx_z).is_empty());
    }

    #[test]
    fn trennen_meldet_peer_left() {
        let a = Aufbau::neu(RelayConfig::default());
        let (x, mut rx_x) = a.verbinden("X");
        let (y, mut rx_y) = a.verbinden("Y");
        a.dispatcher.raum_beitreten(&raum("r1"), &x);
        a.dispatcher.raum_beitreten(&raum("r1"), &y);
        alle(&mut rx_x);

        a.dispatcher.verbindung_trennen(&x);

        assert_eq!(alle(&mut rx_y), vec![ServerEvent::peer_left(x.clone())]);
        assert_eq!(a.state.raeume.mitglieder(&raum("r1")), vec![y.clone()]);
        assert_eq!(a.state.metriken.rooms_active.get(), 1);
    }

    #[test]
    fn peer_left_abschaltbar() {
        let a = Aufbau::neu(RelayConfig {
            peer_left_melden: false,
            ..Default::default()
        });
        let (x, _rx_x) = a.verbinden("X");
        let (y, mut rx_y) = a.verbinden("Y");
        a.dispatcher.raum_beitreten(&raum("r1"), &x);
        a.dispatcher.raum_beitreten(&raum("r1"), &y);

        a.dispatcher.raum_verlassen(&raum("r1"), &x);
        assert!(alle(&mut rx_y).is_empty());
        assert_eq!(a.state.raeume.mitglieder(&raum("r1")), vec![y]);
    }

    #[test]
    fn voller_raum_lehnt_ab() {
        let a = Aufbau::neu(RelayConfig {
            kapazitaet: RaumKapazitaet {
                max_mitglieder: 2,
                ueberlauf: UeberlaufPolitik::Reject,
            },
            ..Default::default()
        });
        let (x, mut rx_x) = a.verbinden("X");
        let (y, mut rx_y) = a.verbinden("Y");
        let (z, mut rx_z) = a.verbinden("Z");
        a.dispatcher.raum_beitreten(&raum("r1"), &x);
        a.dispatcher.raum_beitreten(&raum("r1"), &y);
        alle(&mut rx_x);

        a.dispatcher.raum_beitreten(&raum("r1"), &z);

        assert_eq!(alle(&mut rx_z), vec![ServerEvent::room_full(raum("r1"))]);
        assert!(alle(&mut rx_x).is_empty());
        assert!(alle(&mut rx_y).is_empty());
        assert_eq!(a.state.metriken.joins_rejected_total.get(), 1);
    }

    #[test]
    fn verdraengung_benachrichtigt_alle_seiten() {
        let a = Aufbau::neu(RelayConfig {
            kapazitaet: RaumKapazitaet {
                max_mitglieder: 2,
                ueberlauf: UeberlaufPolitik::EvictOldest,
            },
            ..Default::default()
        });
        let (x, mut rx_x) = a.verbinden("X");
        let (y, mut rx_y) = a.verbinden("Y");
        let (z, mut rx_z) = a.verbinden("Z");
        a.dispatcher.raum_beitreten(&raum("r1"), &x);
        a.dispatcher.raum_beitreten(&raum("r1"), &y);
        alle(&mut rx_x);

        a.dispatcher.raum_beitreten(&raum("r1"), &z);

        assert_eq!(alle(&mut rx_x), vec![ServerEvent::evicted(raum("r1"))]);
        assert_eq!(
            alle(&mut rx_y),
            vec![
                ServerEvent::peer_left(x.clone()),
                ServerEvent::user_joined(z.clone())
            ]
        );
        assert!(alle(&mut rx_z).is_empty());
        assert_eq!(a.state.raeume.mitglieder(&raum("r1")), vec![y, z]);
    }
}
