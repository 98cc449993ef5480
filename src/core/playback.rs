//! Real-time playback pacing and the redirect-play fallback store.
//!
//! Streaming transports expect audio at wall-clock cadence, one companded
//! frame per telephony frame interval, not as a burst. The pacer resamples
//! synthesized PCM to the call's native rate, compands it, and sleeps
//! between frames. When pacing fails the session falls back to a
//! call-control redirect pointing at a clip hosted by this process.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::codec::{downsample_x2, encode_frame, upsample_x2};
use crate::core::transport::CallTransport;
use crate::core::tts::AudioData;
use crate::errors::PlaybackError;

/// Streams one audio buffer into the call at real-time rate.
pub struct PlaybackPacer {
    transport: Arc<dyn CallTransport>,
    /// The call's native sample rate, fixed at session start.
    call_rate: u32,
    frame_interval: Duration,
}

impl PlaybackPacer {
    pub fn new(transport: Arc<dyn CallTransport>, call_rate: u32, frame_interval: Duration) -> Self {
        Self {
            transport,
            call_rate,
            frame_interval,
        }
    }

    /// Bring source PCM to the call's rate. Only unity and x2 conversions
    /// are supported; telephony is 8 kHz and the speech stack runs at
    /// 16 kHz, so anything else indicates a misconfigured synthesizer.
    fn resample(&self, audio: &AudioData) -> Result<Vec<i16>, PlaybackError> {
        if audio.sample_rate == self.call_rate {
            Ok(audio.samples.clone())
        } else if audio.sample_rate == self.call_rate * 2 {
            Ok(downsample_x2(&audio.samples))
        } else if audio.sample_rate * 2 == self.call_rate {
            Ok(upsample_x2(&audio.samples))
        } else {
            Err(PlaybackError::UnsupportedRate {
                source_rate: audio.sample_rate,
                call_rate: self.call_rate,
            })
        }
    }

    /// Transmit the buffer frame by frame at wall-clock pace. Returns the
    /// duration of audio transmitted, which the session uses to size its
    /// echo-suppression window. A send failure aborts the stream; callers
    /// fall back to redirect playback.
    pub async fn play(&self, audio: &AudioData) -> Result<Duration, PlaybackError> {
        if !self.transport.is_open() {
            return Err(PlaybackError::ChannelNotOpen);
        }

        let samples = self.resample(audio)?;
        let companded = encode_frame(&samples);

        let samples_per_frame =
            (u64::from(self.call_rate) * self.frame_interval.as_millis() as u64 / 1000) as usize;
        let samples_per_frame = samples_per_frame.max(1);

        let mut ticker = interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sent = 0usize;
        for frame in companded.chunks(samples_per_frame) {
            ticker.tick().await;
            self.transport
                .send_media(Bytes::copy_from_slice(frame))
                .await?;
            sent += frame.len();
        }

        let played = Duration::from_micros(
            (sent as u64).saturating_mul(1_000_000) / u64::from(self.call_rate),
        );
        debug!(frames = companded.len().div_ceil(samples_per_frame), ?played, "playback paced");
        Ok(played)
    }
}

/// A clip placed in the store: its id for later eviction and the URL the
/// transport is redirected to.
#[derive(Debug, Clone)]
pub struct HostedClip {
    pub id: Uuid,
    pub url: String,
}

/// In-memory store of WAV clips served over HTTP for redirect playback.
/// Each session evicts the clips it hosted when it tears down, so the map
/// never outgrows the set of live calls.
pub struct ClipStore {
    clips: DashMap<Uuid, Bytes>,
    /// Externally reachable base URL of this process.
    public_url: String,
}

impl ClipStore {
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            clips: DashMap::new(),
            public_url: public_url.into(),
        }
    }

    /// Store audio as a WAV clip and return its id and serving URL.
    pub fn host(&self, audio: &AudioData) -> Result<HostedClip, PlaybackError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: audio.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| PlaybackError::ClipEncoding(e.to_string()))?;
            for &sample in &audio.samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| PlaybackError::ClipEncoding(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| PlaybackError::ClipEncoding(e.to_string()))?;
        }

        let id = Uuid::new_v4();
        self.clips.insert(id, Bytes::from(cursor.into_inner()));
        let url = format!("{}/clips/{}", self.public_url.trim_end_matches('/'), id);
        warn!(%id, "hosting fallback clip");
        Ok(HostedClip { id, url })
    }

    pub fn get(&self, id: &Uuid) -> Option<Bytes> {
        self.clips.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &Uuid) {
        self.clips.remove(id);
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::core::language::Locale;
    use crate::errors::TransportError;

    #[derive(Default)]
    struct RecordingTransport {
        frames: Mutex<Vec<Bytes>>,
        fail_after: Option<usize>,
        closed: bool,
    }

    #[async_trait]
    impl CallTransport for RecordingTransport {
        async fn send_media(&self, frame: Bytes) -> Result<(), TransportError> {
            let mut frames = self.frames.lock();
            if let Some(limit) = self.fail_after
                && frames.len() >= limit
            {
                return Err(TransportError::SendFailed("socket gone".into()));
            }
            frames.push(frame);
            Ok(())
        }

        async fn redirect_play(&self, _url: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn say(&self, _text: &str, _language: Locale) -> Result<(), TransportError> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            !self.closed
        }
    }

    fn audio(samples: usize, rate: u32) -> AudioData {
        AudioData {
            samples: vec![0; samples],
            sample_rate: rate,
        }
    }

    #[tokio::test]
    async fn paces_fixed_size_frames_and_reports_duration() {
        let transport = Arc::new(RecordingTransport::default());
        let pacer = PlaybackPacer::new(transport.clone(), 8_000, Duration::from_millis(20));

        // 60 ms at 8 kHz.
        let played = pacer.play(&audio(480, 8_000)).await.unwrap();
        assert_eq!(played, Duration::from_millis(60));

        let frames = transport.frames.lock();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() == 160));
    }

    #[tokio::test]
    async fn downsamples_wideband_sources() {
        let transport = Arc::new(RecordingTransport::default());
        let pacer = PlaybackPacer::new(transport.clone(), 8_000, Duration::from_millis(20));

        // 40 ms at 16 kHz becomes 40 ms at 8 kHz.
        let played = pacer.play(&audio(640, 16_000)).await.unwrap();
        assert_eq!(played, Duration::from_millis(40));
        assert_eq!(transport.frames.lock().len(), 2);
    }

    #[tokio::test]
    async fn rejects_rates_it_cannot_convert() {
        let transport = Arc::new(RecordingTransport::default());
        let pacer = PlaybackPacer::new(transport, 8_000, Duration::from_millis(20));

        let err = pacer.play(&audio(441, 44_100)).await.unwrap_err();
        assert!(matches!(
            err,
            PlaybackError::UnsupportedRate {
                source_rate: 44_100,
                call_rate: 8_000,
            }
        ));
    }

    #[tokio::test]
    async fn closed_channel_fails_before_sending() {
        let transport = Arc::new(RecordingTransport {
            closed: true,
            ..Default::default()
        });
        let pacer = PlaybackPacer::new(transport.clone(), 8_000, Duration::from_millis(20));

        let err = pacer.play(&audio(160, 8_000)).await.unwrap_err();
        assert!(matches!(err, PlaybackError::ChannelNotOpen));
        assert!(transport.frames.lock().is_empty());
    }

    #[tokio::test]
    async fn send_failure_aborts_the_stream() {
        let transport = Arc::new(RecordingTransport {
            fail_after: Some(1),
            ..Default::default()
        });
        let pacer = PlaybackPacer::new(transport.clone(), 8_000, Duration::from_millis(20));

        let err = pacer.play(&audio(480, 8_000)).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Transport(_)));
        assert_eq!(transport.frames.lock().len(), 1);
    }

    #[test]
    fn hosted_clips_are_retrievable_wavs() {
        let store = ClipStore::new("https://bridge.example.com/");
        let clip = store.host(&audio(160, 16_000)).unwrap();
        assert_eq!(
            clip.url,
            format!("https://bridge.example.com/clips/{}", clip.id)
        );

        let bytes = store.get(&clip.id).expect("clip");
        let reader = hound::WavReader::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.len(), 160);

        store.remove(&clip.id);
        assert!(store.get(&clip.id).is_none());
        assert!(store.is_empty());
    }
}
