//! WebRTC-Anbindung des Verbindungsobjekts
//!
//! `RtcPeerConnectionFactory` baut pro Sitzung eine `RTCPeerConnection`
//! mit Standard-Codecs und -Interceptoren. Session-Beschreibungen und
//! Kandidaten werden im Browser-Format (`{"type", "sdp"}` bzw.
//! `{"candidate", "sdpMid", "sdpMLineIndex"}`) ueber das Relay geschickt.

use async_trait::async_trait;
use duett_protocol::{IceCandidate, SessionDescription};
use serde_json::{json, Value};
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;

use crate::error::{NegotiationError, NegotiationResult};
use crate::media::{LocalMedia, RemoteTrack, TrackArt};
use crate::peer::{PeerConnection, PeerConnectionFactory, PeerEvent, PeerEventSender, VerbindungsZustand};

/// Erstellt `RTCPeerConnection`-basierte Verbindungsobjekte
#[derive(Debug, Clone, Default)]
pub struct RtcPeerConnectionFactory;

impl RtcPeerConnectionFactory {
    pub fn neu() -> Self {
        Self
    }
}

#[async_trait]
impl PeerConnectionFactory for RtcPeerConnectionFactory {
    async fn create(
        &self,
        stun_server: &[String],
        events: PeerEventSender,
    ) -> NegotiationResult<Box<dyn PeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: stun_server
                .iter()
                .map(|url| RTCIceServer {
                    urls: vec![url.clone()],
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await?);
        callbacks_registrieren(&pc, events);

        tracing::debug!(stun = ?stun_server, "RTCPeerConnection erstellt");
        Ok(Box::new(RtcPeerConnection { pc }))
    }
}

/// Leitet Kandidaten, Zustandswechsel und entfernte Spuren an die Engine
fn callbacks_registrieren(pc: &Arc<RTCPeerConnection>, events: PeerEventSender) {
    let tx = events.clone();
    pc.on_ice_candidate(Box::new(move |kandidat| {
        let tx = tx.clone();
        Box::pin(async move {
            let Some(kandidat) = kandidat else {
                return;
            };
            match kandidat.to_json() {
                Ok(init) => tx.senden(PeerEvent::Kandidat(kandidat_nach_json(&init))),
                Err(e) => tracing::warn!(fehler = %e, "Lokaler Kandidat nicht serialisierbar"),
            }
        })
    }));

    let tx = events.clone();
    pc.on_peer_connection_state_change(Box::new(move |zustand| {
        let tx = tx.clone();
        tracing::debug!(generation = tx.generation(), zustand = %zustand, "Verbindungszustand geaendert");
        Box::pin(async move {
            tx.senden(PeerEvent::Zustand(zustand_abbilden(zustand)));
        })
    }));

    let tx = events;
    pc.on_track(Box::new(move |track, _receiver, _transceiver| {
        let tx = tx.clone();
        Box::pin(async move {
            let art = match track.kind() {
                RTPCodecType::Video => TrackArt::Video,
                _ => TrackArt::Audio,
            };
            tracing::info!(
                spur = %track.id(),
                codec = %track.codec().capability.mime_type,
                "Entfernte Spur empfangen"
            );
            tx.senden(PeerEvent::RemoteTrack(RemoteTrack {
                id: track.id(),
                art,
                stream_id: track.stream_id(),
                rtc: Some(track),
            }));
        })
    }));
}

/// Verbindungsobjekt auf Basis von `RTCPeerConnection`
pub struct RtcPeerConnection {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerConnection for RtcPeerConnection {
    async fn add_local_media(&self, medien: &LocalMedia) -> NegotiationResult<()> {
        for track in medien.tracks() {
            if let Some(rtc) = track.rtc_track() {
                self.pc
                    .add_track(Arc::clone(rtc) as Arc<dyn TrackLocal + Send + Sync>)
                    .await?;
            }
        }
        Ok(())
    }

    async fn create_offer(&self) -> NegotiationResult<SessionDescription> {
        let offer = self.pc.create_offer(None).await?;
        Ok(beschreibung_nach_json(&offer))
    }

    async fn create_answer(&self) -> NegotiationResult<SessionDescription> {
        let answer = self.pc.create_answer(None).await?;
        Ok(beschreibung_nach_json(&answer))
    }

    async fn set_local_description(&self, beschreibung: &SessionDescription) -> NegotiationResult<()> {
        let desc = beschreibung_aus_json(beschreibung)?;
        self.pc.set_local_description(desc).await?;
        Ok(())
    }

    async fn set_remote_description(&self, beschreibung: &SessionDescription) -> NegotiationResult<()> {
        let desc = beschreibung_aus_json(beschreibung)?;
        self.pc.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, kandidat: &IceCandidate) -> NegotiationResult<()> {
        let init = kandidat_aus_json(kandidat)?;
        // Leerer Kandidat markiert das Ende der Suche
        if init.candidate.is_empty() {
            return Ok(());
        }
        self.pc.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn close(&self) -> NegotiationResult<()> {
        self.pc.close().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Konvertierung Browser-JSON <-> webrtc
// ---------------------------------------------------------------------------

fn zustand_abbilden(zustand: RTCPeerConnectionState) -> VerbindungsZustand {
    match zustand {
        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => VerbindungsZustand::Neu,
        RTCPeerConnectionState::Connecting => VerbindungsZustand::Verbindend,
        RTCPeerConnectionState::Connected => VerbindungsZustand::Verbunden,
        RTCPeerConnectionState::Disconnected => VerbindungsZustand::Getrennt,
        RTCPeerConnectionState::Failed => VerbindungsZustand::Fehlgeschlagen,
        RTCPeerConnectionState::Closed => VerbindungsZustand::Geschlossen,
    }
}

fn sdp_typ_name(typ: RTCSdpType) -> &'static str {
    match typ {
        RTCSdpType::Offer => "offer",
        RTCSdpType::Answer => "answer",
        RTCSdpType::Pranswer => "pranswer",
        RTCSdpType::Rollback => "rollback",
        RTCSdpType::Unspecified => "unspecified",
    }
}

fn beschreibung_nach_json(desc: &RTCSessionDescription) -> SessionDescription {
    SessionDescription(json!({
        "type": sdp_typ_name(desc.sdp_type),
        "sdp": desc.sdp,
    }))
}

fn beschreibung_aus_json(beschreibung: &SessionDescription) -> NegotiationResult<RTCSessionDescription> {
    let wert = &beschreibung.0;
    let typ = wert
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| NegotiationError::nachricht("Session-Beschreibung ohne 'type'"))?;
    let sdp = wert
        .get("sdp")
        .and_then(Value::as_str)
        .ok_or_else(|| NegotiationError::nachricht("Session-Beschreibung ohne 'sdp'"))?
        .to_string();

    let desc = match typ {
        "offer" => RTCSessionDescription::offer(sdp)?,
        "answer" => RTCSessionDescription::answer(sdp)?,
        "pranswer" => RTCSessionDescription::pranswer(sdp)?,
        anderer => {
            return Err(NegotiationError::nachricht(format!(
                "Nicht unterstuetzter Beschreibungstyp: {anderer}"
            )))
        }
    };
    Ok(desc)
}

fn kandidat_nach_json(init: &RTCIceCandidateInit) -> IceCandidate {
    IceCandidate(json!({
        "candidate": init.candidate,
        "sdpMid": init.sdp_mid,
        "sdpMLineIndex": init.sdp_mline_index,
        "usernameFragment": init.username_fragment,
    }))
}

fn kandidat_aus_json(kandidat: &IceCandidate) -> NegotiationResult<RTCIceCandidateInit> {
    let wert = &kandidat.0;
    let candidate = wert
        .get("candidate")
        .and_then(Value::as_str)
        .ok_or_else(|| NegotiationError::nachricht("Kandidat ohne 'candidate'"))?
        .to_string();
    let text = |feld: &str| wert.get(feld).and_then(Value::as_str).map(str::to_string);

    Ok(RTCIceCandidateInit {
        candidate,
        sdp_mid: text("sdpMid"),
        sdp_mline_index: wert
            .get("sdpMLineIndex")
            .and_then(Value::as_u64)
            .and_then(|i| u16::try_from(i).ok()),
        username_fragment: text("usernameFragment"),
    })
}
