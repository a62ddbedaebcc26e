//! Ende-zu-Ende-Tests: zwei Engines verhandeln ueber ein echtes Relay
//!
//! Das Verbindungsobjekt ist eine In-Memory-Attrappe, Relay, Transport,
//! Engine und Medienquelle sind echt.

use async_trait::async_trait;
use duett_core::types::RoomId;
use duett_negotiation::{
    EngineConfig, EngineHandle, LocalMedia, NegotiationEngine, NegotiationResult,
    PeerConnection, PeerConnectionFactory, PeerEvent, PeerEventSender, Phase, StaticTrackSource,
    TcpConnector, VerbindungsZustand,
};
use duett_observability::RelayMetrics;
use duett_protocol::{IceCandidate, SessionDescription};
use duett_signaling::{RaumKapazitaet, RelayConfig, SignalingServer, SignalingState, UeberlaufPolitik};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

struct TestRelay {
    addr: SocketAddr,
    state: Arc<SignalingState>,
    shutdown_tx: watch::Sender<bool>,
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

fn relay_starten(config: RelayConfig) -> TestRelay {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let state = SignalingState::neu(config, RelayMetrics::neu().unwrap());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (addr_tx, addr_rx) = std::sync::mpsc::channel();

    let server_state = Arc::clone(&state);
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let server = SignalingServer::binden(server_state, "127.0.0.1:0".parse().unwrap())
                .await
                .unwrap();
            addr_tx.send(server.lokale_adresse().unwrap()).unwrap();
            server.starten(shutdown_rx).await.unwrap();
        });
    });

    TestRelay {
        addr: addr_rx.recv().unwrap(),
        state,
        shutdown_tx,
    }
}

impl TestRelay {
    async fn warten_auf_mitglieder(&self, raum: &str, anzahl: usize) {
        let raum = RoomId::parse(raum).unwrap();
        for _ in 0..200 {
            if self.state.raeume.mitglieder(&raum).len() == anzahl {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Raum {raum} hat nicht {anzahl} Mitglieder erreicht");
    }
}

// ---------------------------------------------------------------------------
// Verbindungsobjekt-Attrappe
// ---------------------------------------------------------------------------

/// Meldet einen lokalen Kandidaten nach `set_local_description` und
/// `Verbunden`, sobald Remote-Beschreibung und ein Kandidat vorliegen.
struct SimulierteVerbindung {
    events: PeerEventSender,
    zustand: Mutex<(bool, usize)>,
}

impl SimulierteVerbindung {
    fn pruefen(&self) {
        let (remote, kandidaten) = *self.zustand.lock().unwrap();
        if remote && kandidaten > 0 {
            self.events
                .senden(PeerEvent::Zustand(VerbindungsZustand::Verbunden));
        }
    }
}

#[async_trait]
impl PeerConnection for SimulierteVerbindung {
    async fn add_local_media(&self, medien: &LocalMedia) -> NegotiationResult<()> {
        assert!(!medien.ist_leer());
        Ok(())
    }

    async fn create_offer(&self) -> NegotiationResult<SessionDescription> {
        Ok(SessionDescription(json!({"type": "offer", "sdp": "v=0"})))
    }

    async fn create_answer(&self) -> NegotiationResult<SessionDescription> {
        Ok(SessionDescription(json!({"type": "answer", "sdp": "v=0"})))
    }

    async fn set_local_description(&self, _: &SessionDescription) -> NegotiationResult<()> {
        self.events.senden(PeerEvent::Kandidat(IceCandidate(json!({
            "candidate": "candidate:1 1 udp 2122260223 127.0.0.1 50000 typ host",
            "sdpMid": "0",
            "sdpMLineIndex": 0,
        }))));
        Ok(())
    }

    async fn set_remote_description(&self, _: &SessionDescription) -> NegotiationResult<()> {
        self.zustand.lock().unwrap().0 = true;
        self.pruefen();
        Ok(())
    }

    async fn add_ice_candidate(&self, _: &IceCandidate) -> NegotiationResult<()> {
        self.zustand.lock().unwrap().1 += 1;
        self.pruefen();
        Ok(())
    }

    async fn close(&self) -> NegotiationResult<()> {
        self.events
            .senden(PeerEvent::Zustand(VerbindungsZustand::Geschlossen));
        Ok(())
    }
}

struct SimulierteFabrik;

#[async_trait]
impl PeerConnectionFactory for SimulierteFabrik {
    async fn create(
        &self,
        _stun: &[String],
        events: PeerEventSender,
    ) -> NegotiationResult<Box<dyn PeerConnection>> {
        Ok(Box::new(SimulierteVerbindung {
            events,
            zustand: Mutex::new((false, 0)),
        }))
    }
}

fn engine_starten(relay: &TestRelay) -> EngineHandle {
    let config = EngineConfig {
        relay_adresse: relay.addr.to_string(),
        transport_timeout_sek: 5,
        ..Default::default()
    };
    let engine = NegotiationEngine::neu(
        config,
        Arc::new(TcpConnector::neu(relay.addr.to_string())),
        Arc::new(SimulierteFabrik),
        Arc::new(StaticTrackSource::default()),
    );
    let (handle, _task) = engine.starten();
    handle
}

async fn warten_auf_phase(handle: &EngineHandle, phase: Phase) {
    tokio::time::timeout(Duration::from_secs(5), handle.warten_bis(|s| s.phase == phase))
        .await
        .unwrap_or_else(|_| panic!("Phase {phase:?} nicht erreicht, Status: {:?}", handle.status()))
        .unwrap();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zwei_engines_erreichen_connected() {
    let relay = relay_starten(RelayConfig::default());
    let x = engine_starten(&relay);
    let y = engine_starten(&relay);

    x.beitreten("r1").await.unwrap();
    relay.warten_auf_mitglieder("r1", 1).await;
    assert_eq!(x.status().phase, Phase::Joined);
    assert!(x.status().text.starts_with("Joined room: r1"));

    y.beitreten("r1").await.unwrap();

    warten_auf_phase(&x, Phase::Connected).await;
    warten_auf_phase(&y, Phase::Connected).await;
    assert_eq!(x.status().text, "Connected to peer");
}

#[tokio::test]
async fn abgang_fuehrt_zurueck_zu_joined() {
    let relay = relay_starten(RelayConfig::default());
    let x = engine_starten(&relay);
    let y = engine_starten(&relay);

    x.beitreten("r1").await.unwrap();
    relay.warten_auf_mitglieder("r1", 1).await;
    y.beitreten("r1").await.unwrap();
    warten_auf_phase(&x, Phase::Connected).await;
    warten_auf_phase(&y, Phase::Connected).await;

    y.verlassen().await.unwrap();
    assert_eq!(y.status().phase, Phase::Closed);
    assert_eq!(y.status().text, "Not connected");

    warten_auf_phase(&x, Phase::Joined).await;
    assert_eq!(x.status().text, "Peer left");
    relay.warten_auf_mitglieder("r1", 1).await;

    // Erneuter Beitritt verhandelt eine neue Verbindung
    y.beitreten("r1").await.unwrap();
    warten_auf_phase(&x, Phase::Connected).await;
    warten_auf_phase(&y, Phase::Connected).await;
}

#[tokio::test]
async fn voller_raum_schliesst_dritte_engine() {
    let relay = relay_starten(RelayConfig {
        kapazitaet: RaumKapazitaet {
            max_mitglieder: 2,
            ueberlauf: UeberlaufPolitik::Reject,
        },
        ..Default::default()
    });
    let x = engine_starten(&relay);
    let y = engine_starten(&relay);
    let z = engine_starten(&relay);

    x.beitreten("r1").await.unwrap();
    relay.warten_auf_mitglieder("r1", 1).await;
    y.beitreten("r1").await.unwrap();
    relay.warten_auf_mitglieder("r1", 2).await;

    z.beitreten("r1").await.unwrap();
    warten_auf_phase(&z, Phase::Closed).await;
    assert_eq!(z.status().text, "Room is full: r1");
    relay.warten_auf_mitglieder("r1", 2).await;
}

#[tokio::test]
async fn relay_nicht_erreichbar() {
    let adresse = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let engine = NegotiationEngine::neu(
        EngineConfig::default(),
        Arc::new(TcpConnector::neu(adresse.to_string())),
        Arc::new(SimulierteFabrik),
        Arc::new(StaticTrackSource::default()),
    );
    let (handle, _task) = engine.starten();

    assert!(handle.beitreten("r1").await.is_err());
    let status = handle.status();
    assert_eq!(status.phase, Phase::Closed);
    assert!(status.text.starts_with("Connection error"));
}
