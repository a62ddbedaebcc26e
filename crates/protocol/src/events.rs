//! Signaling-Ereignisse (Client <-> Relay)
//!
//! Definiert alle Nachrichten die ueber die Relay-Verbindung laufen.
//!
//! ## Design
//! - Ein Tagged Enum pro Richtung: `{"event": "<name>", "data": {...}}`
//! - Feldnamen in camelCase (`roomId`, `socketId`)
//! - `sdp` und `candidate` sind opake JSON-Werte, das Relay liest sie nie

use duett_core::types::{ConnectionId, RoomId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Opake Nutzlasten
// ---------------------------------------------------------------------------

/// Session-Beschreibung (SDP-Objekt, z.B. `{"type": "offer", "sdp": "..."}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDescription(pub serde_json::Value);

/// Netzwerk-Kandidat (ICE-Kandidat als JSON-Objekt)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IceCandidate(pub serde_json::Value);

/// Art einer weitergeleiteten Verhandlungsnachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationKind {
    Offer,
    Answer,
    Candidate,
}

impl NegotiationKind {
    /// Label fuer Logs und Metriken
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Candidate => "candidate",
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> Relay
// ---------------------------------------------------------------------------

/// Raum beitreten oder verlassen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRequest {
    pub room_id: RoomId,
}

/// Offer oder Answer an den Raum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionMessage {
    pub room_id: RoomId,
    pub sdp: SessionDescription,
    /// Vom Client angegebener Absender (das Relay setzt den echten Absender)
    pub from: ConnectionId,
}

/// ICE-Kandidat an den Raum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMessage {
    pub room_id: RoomId,
    pub candidate: IceCandidate,
    pub from: ConnectionId,
}

/// Keepalive (Ping vom Relay, Pong vom Client)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    /// Unix-Timestamp in Millisekunden
    pub timestamp_ms: u64,
}

/// Alle Nachrichten vom Client an das Relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(RoomRequest),
    LeaveRoom(RoomRequest),
    Offer(DescriptionMessage),
    Answer(DescriptionMessage),
    IceCandidate(CandidateMessage),
    Pong(Heartbeat),
}

impl ClientEvent {
    pub fn join_room(room_id: RoomId) -> Self {
        Self::JoinRoom(RoomRequest { room_id })
    }

    pub fn leave_room(room_id: RoomId) -> Self {
        Self::LeaveRoom(RoomRequest { room_id })
    }

    pub fn offer(room_id: RoomId, sdp: SessionDescription, from: ConnectionId) -> Self {
        Self::Offer(DescriptionMessage { room_id, sdp, from })
    }

    pub fn answer(room_id: RoomId, sdp: SessionDescription, from: ConnectionId) -> Self {
        Self::Answer(DescriptionMessage { room_id, sdp, from })
    }

    pub fn ice_candidate(room_id: RoomId, candidate: IceCandidate, from: ConnectionId) -> Self {
        Self::IceCandidate(CandidateMessage {
            room_id,
            candidate,
            from,
        })
    }

    /// Ereignisname auf dem Draht
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "join-room",
            Self::LeaveRoom(_) => "leave-room",
            Self::Offer(_) => "offer",
            Self::Answer(_) => "answer",
            Self::IceCandidate(_) => "ice-candidate",
            Self::Pong(_) => "pong",
        }
    }
}

// ---------------------------------------------------------------------------
// Relay -> Client
// ---------------------------------------------------------------------------

/// Hinweis ueber eine Verbindung (eigene ID, Beitritt, Abgang)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerNotice {
    pub socket_id: ConnectionId,
}

/// Hinweis ueber einen Raum (voll, verdraengt)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomNotice {
    pub room_id: RoomId,
}

/// Weitergeleitete Offer/Answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedDescription {
    pub sdp: SessionDescription,
    pub from: ConnectionId,
}

/// Weitergeleiteter ICE-Kandidat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedCandidate {
    pub candidate: IceCandidate,
    pub from: ConnectionId,
}

/// Alle Nachrichten vom Relay an einen Client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Verbindung steht, enthaelt die eigene Verbindungs-ID
    Connected(PeerNotice),
    UserJoined(PeerNotice),
    OfferReceived(RelayedDescription),
    AnswerReceived(RelayedDescription),
    IceCandidateReceived(RelayedCandidate),
    PeerLeft(PeerNotice),
    RoomFull(RoomNotice),
    Evicted(RoomNotice),
    Ping(Heartbeat),
}

impl ServerEvent {
    pub fn connected(socket_id: ConnectionId) -> Self {
        Self::Connected(PeerNotice { socket_id })
    }

    pub fn user_joined(socket_id: ConnectionId) -> Self {
        Self::UserJoined(PeerNotice { socket_id })
    }

    pub fn peer_left(socket_id: ConnectionId) -> Self {
        Self::PeerLeft(PeerNotice { socket_id })
    }

    pub fn room_full(room_id: RoomId) -> Self {
        Self::RoomFull(RoomNotice { room_id })
    }

    pub fn evicted(room_id: RoomId) -> Self {
        Self::Evicted(RoomNotice { room_id })
    }

    pub fn ping(timestamp_ms: u64) -> Self {
        Self::Ping(Heartbeat { timestamp_ms })
    }

    /// Ereignisname auf dem Draht
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::UserJoined(_) => "user-joined",
            Self::OfferReceived(_) => "offer-received",
            Self::AnswerReceived(_) => "answer-received",
            Self::IceCandidateReceived(_) => "ice-candidate-received",
            Self::PeerLeft(_) => "peer-left",
            Self::RoomFull(_) => "room-full",
            Self::Evicted(_) => "evicted",
            Self::Ping(_) => "ping",
        }
    }
}

/// Aktueller Unix-Timestamp in Millisekunden
pub fn jetzt_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
