//! Lokale und entfernte Medien
//!
//! `LocalMedia` ist der opake Handle auf die lokalen Spuren (Audio/Video),
//! `RemoteMedia` sammelt die Spuren des Gegenuebers. Woher die lokalen
//! Spuren kommen, bestimmt eine `MediaSource`.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::config::MedienVorgaben;
use crate::error::MediaError;

/// Art einer Medienspur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackArt {
    Audio,
    Video,
}

impl TrackArt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

// ---------------------------------------------------------------------------
// Lokale Medien
// ---------------------------------------------------------------------------

/// Eine lokale Spur
///
/// Mit WebRTC-Anbindung traegt sie eine `TrackLocalStaticSample`, in die
/// der Aufrufer Samples schreibt. Ohne Anbindung (Tests) ist sie nur ein
/// Platzhalter mit Aktiv-Flag.
#[derive(Clone)]
pub struct LocalTrack {
    id: String,
    art: TrackArt,
    rtc: Option<Arc<TrackLocalStaticSample>>,
    aktiv: Arc<AtomicBool>,
}

impl std::fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("art", &self.art)
            .field("rtc", &self.rtc.is_some())
            .field("aktiv", &self.ist_aktiv())
            .finish()
    }
}

impl LocalTrack {
    /// Spur ohne WebRTC-Anbindung
    pub fn neu(id: impl Into<String>, art: TrackArt) -> Self {
        Self {
            id: id.into(),
            art,
            rtc: None,
            aktiv: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Spur mit WebRTC-Anbindung
    pub fn mit_rtc(art: TrackArt, track: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            id: track.id().to_string(),
            art,
            rtc: Some(track),
            aktiv: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn art(&self) -> TrackArt {
        self.art
    }

    pub fn rtc_track(&self) -> Option<&Arc<TrackLocalStaticSample>> {
        self.rtc.as_ref()
    }

    pub fn stoppen(&self) {
        self.aktiv.store(false, Ordering::Release);
    }

    pub fn ist_aktiv(&self) -> bool {
        self.aktiv.load(Ordering::Acquire)
    }

    /// Schreibt ein kodiertes Sample in die Spur
    ///
    /// Gestoppte Spuren lehnen weitere Samples ab.
    pub async fn sample_schreiben(&self, daten: Bytes, dauer: Duration) -> Result<(), MediaError> {
        if !self.ist_aktiv() {
            return Err(MediaError::Gestoppt);
        }
        let Some(track) = &self.rtc else {
            return Ok(());
        };
        let sample = Sample {
            data: daten,
            duration: dauer,
            ..Default::default()
        };
        track
            .write_sample(&sample)
            .await
            .map_err(|e| MediaError::Intern(e.to_string()))
    }
}

/// Handle auf alle lokalen Spuren einer Sitzung
#[derive(Debug, Clone, Default)]
pub struct LocalMedia {
    tracks: Vec<LocalTrack>,
}

impl LocalMedia {
    pub fn neu(tracks: Vec<LocalTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn ist_leer(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Stoppt alle Spuren (Kamera/Mikrofon freigeben)
    pub fn stoppen(&self) {
        for track in &self.tracks {
            track.stoppen();
        }
        tracing::debug!(spuren = self.tracks.len(), "Lokale Medien gestoppt");
    }
}

// ---------------------------------------------------------------------------
// Entfernte Medien
// ---------------------------------------------------------------------------

/// Vom Gegenueber empfangene Spur
#[derive(Clone)]
pub struct RemoteTrack {
    pub id: String,
    pub art: TrackArt,
    pub stream_id: String,
    pub rtc: Option<Arc<TrackRemote>>,
}

impl std::fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("art", &self.art)
            .field("stream_id", &self.stream_id)
            .finish()
    }
}

/// Alle entfernten Spuren einer Verbindung
#[derive(Debug, Clone, Default)]
pub struct RemoteMedia {
    tracks: Vec<RemoteTrack>,
}

impl RemoteMedia {
    pub fn hinzufuegen(&mut self, track: RemoteTrack) {
        self.tracks.push(track);
    }

    pub fn tracks(&self) -> &[RemoteTrack] {
        &self.tracks
    }
}

// ---------------------------------------------------------------------------
// Medienquelle
// ---------------------------------------------------------------------------

/// Beschafft lokale Medien fuer eine Sitzung
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Fordert die gewuenschten Medien an
    ///
    /// `MediaError::Verweigert` signalisiert, dass der Benutzer den Zugriff
    /// abgelehnt hat.
    async fn acquire(&self, vorgaben: &MedienVorgaben) -> Result<LocalMedia, MediaError>;
}

/// Medienquelle mit sample-gespeisten WebRTC-Spuren
///
/// Audio wird als Opus (48 kHz, Stereo), Video als VP8 angelegt. Die
/// Samples liefert der Aufrufer ueber [`LocalTrack::sample_schreiben`].
#[derive(Debug, Clone)]
pub struct StaticTrackSource {
    stream_id: String,
}

impl StaticTrackSource {
    pub fn neu(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
        }
    }
}

impl Default for StaticTrackSource {
    fn default() -> Self {
        Self::neu("duett")
    }
}

#[async_trait]
impl MediaSource for StaticTrackSource {
    async fn acquire(&self, vorgaben: &MedienVorgaben) -> Result<LocalMedia, MediaError> {
        let mut tracks = Vec::new();

        if vorgaben.audio {
            let track = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    ..Default::default()
                },
                "audio".to_owned(),
                self.stream_id.clone(),
            ));
            tracks.push(LocalTrack::mit_rtc(TrackArt::Audio, track));
        }

        if let Some(video) = &vorgaben.video {
            tracing::debug!(
                breite = video.breite,
                hoehe = video.hoehe,
                bildrate = video.bildrate,
                kamera = ?video.kamera,
                "Video-Spur angelegt"
            );
            let track = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    clock_rate: 90000,
                    ..Default::default()
                },
                "video".to_owned(),
                self.stream_id.clone(),
            ));
            tracks.push(LocalTrack::mit_rtc(TrackArt::Video, track));
        }

        if tracks.is_empty() {
            return Err(MediaError::KeinGeraet(
                "weder Audio noch Video angefordert".to_string(),
            ));
        }

        Ok(LocalMedia::neu(tracks))
    }
}
