//! Session runner: one task per call.
//!
//! The runner owns the event channel, the recognizer route, and the reply
//! task. All I/O lives here; the state machine in the parent module stays
//! pure. Frame delivery must never block on recognizer or reply work, so
//! batch transcription and the reply pipeline run in spawned tasks that
//! feed their results back through the same event channel.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Effect, Session, SessionConfig, SessionEvent};
use crate::core::playback::{ClipStore, PlaybackPacer};
use crate::core::reply::ReplyPipeline;
use crate::core::stt::{BatchRecognizer, RecognizerRoute, StreamingRecognizerFactory, select_route};
use crate::core::transport::CallTransport;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const RECOGNIZER_CHANNEL_CAPACITY: usize = 64;

/// Shared collaborators a session needs; cloned per call.
#[derive(Clone)]
pub struct SessionDeps {
    pub transport: Arc<dyn CallTransport>,
    pub streaming_factory: Option<Arc<dyn StreamingRecognizerFactory>>,
    pub batch: Arc<dyn BatchRecognizer>,
    pub pipeline: Arc<ReplyPipeline>,
    pub clips: Arc<ClipStore>,
    pub frame_interval: Duration,
}

/// Handle held by the transport handler for one running session.
pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Deliver one inbound companded frame, stamped on arrival.
    pub async fn media(&self, payload: Bytes) {
        let event = SessionEvent::Media {
            payload,
            at: Instant::now(),
        };
        if self.events.send(event).await.is_err() {
            debug!("media dropped, session already gone");
        }
    }

    pub async fn stop(&self) {
        let _ = self.events.send(SessionEvent::Stop).await;
    }

    /// Wait for the runner task to finish (after `stop`).
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Spawn the runner task for one call and hand back its control handle.
pub fn spawn_session(config: SessionConfig, deps: SessionDeps) -> SessionHandle {
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let task = tokio::spawn(run(config, deps, events_tx.clone(), events_rx));
    SessionHandle {
        events: events_tx,
        task,
    }
}

async fn run(
    config: SessionConfig,
    deps: SessionDeps,
    events_tx: mpsc::Sender<SessionEvent>,
    mut events_rx: mpsc::Receiver<SessionEvent>,
) {
    let (rec_tx, mut rec_rx) = mpsc::channel(RECOGNIZER_CHANNEL_CAPACITY);
    let call_rate = config.sample_rate;
    let processing_rate = config.sample_rate * 2;

    let mut route = select_route(
        deps.streaming_factory.as_ref(),
        &deps.batch,
        processing_rate,
        rec_tx,
    )
    .await;
    let mut session = Session::new(config, route.is_streaming());

    // Clips hosted for this call's redirect fallbacks; evicted at teardown.
    let hosted_clips: Arc<Mutex<Vec<Uuid>>> = Arc::new(Mutex::new(Vec::new()));
    let mut reply_task: Option<JoinHandle<()>> = None;

    loop {
        let event = tokio::select! {
            event = events_rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
            Some(rec_event) = rec_rx.recv() => SessionEvent::Recognizer(rec_event),
        };

        // An effect can surface a follow-up event (a failed forward turns
        // into a stream error) that must go through the machine before the
        // next inbound event.
        let mut pending = VecDeque::from([event]);
        let mut teardown = false;
        while let Some(event) = pending.pop_front() {
            for effect in session.on_event(event) {
                match perform(
                    effect,
                    &mut route,
                    &deps,
                    &events_tx,
                    &hosted_clips,
                    &mut reply_task,
                    call_rate,
                    processing_rate,
                )
                .await
                {
                    Outcome::Continue => {}
                    Outcome::FollowUp(event) => pending.push_back(event),
                    Outcome::Teardown => teardown = true,
                }
            }
        }
        if teardown {
            break;
        }
    }

    // Abandon any in-flight reply, then release this call's hosted clips.
    if let Some(task) = reply_task.take() {
        task.abort();
        let _ = task.await;
    }
    let hosted: Vec<Uuid> = hosted_clips.lock().drain(..).collect();
    for id in &hosted {
        deps.clips.remove(id);
    }
}

enum Outcome {
    Continue,
    FollowUp(SessionEvent),
    Teardown,
}

async fn perform(
    effect: Effect,
    route: &mut RecognizerRoute,
    deps: &SessionDeps,
    events_tx: &mpsc::Sender<SessionEvent>,
    hosted_clips: &Arc<Mutex<Vec<Uuid>>>,
    reply_task: &mut Option<JoinHandle<()>>,
    call_rate: u32,
    processing_rate: u32,
) -> Outcome {
    match effect {
        Effect::ForwardAudio(pcm) => {
            if let RecognizerRoute::Streaming(conn) = route
                && let Err(e) = conn.send_audio(pcm).await
            {
                return Outcome::FollowUp(SessionEvent::Recognizer(
                    crate::core::stt::RecognizerEvent::StreamError {
                        message: e.to_string(),
                    },
                ));
            }
            Outcome::Continue
        }
        Effect::Transcribe(chunk) => {
            let batch = Arc::clone(&deps.batch);
            let events_tx = events_tx.clone();
            tokio::spawn(async move {
                match batch.transcribe(chunk, processing_rate).await {
                    Ok(transcript) if !transcript.text.trim().is_empty() => {
                        let _ = events_tx
                            .send(SessionEvent::BatchTranscript {
                                text: transcript.text,
                                language_tag: transcript.language_tag,
                            })
                            .await;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "batch transcription failed"),
                }
            });
            Outcome::Continue
        }
        Effect::BeginReply { transcript, language } => {
            let pipeline = Arc::clone(&deps.pipeline);
            let transport = Arc::clone(&deps.transport);
            let clips = Arc::clone(&deps.clips);
            let hosted = Arc::clone(hosted_clips);
            let frame_interval = deps.frame_interval;
            let events_tx = events_tx.clone();
            *reply_task = Some(tokio::spawn(async move {
                let played = run_reply(
                    &pipeline,
                    transport,
                    &clips,
                    &hosted,
                    call_rate,
                    frame_interval,
                    &transcript,
                    language,
                )
                .await;
                let _ = events_tx
                    .send(SessionEvent::ReplyFinished {
                        played,
                        at: Instant::now(),
                    })
                    .await;
            }));
            Outcome::Continue
        }
        Effect::CloseRecognizer => {
            let batch = Arc::clone(&deps.batch);
            if let RecognizerRoute::Streaming(conn) =
                std::mem::replace(route, RecognizerRoute::Batch(batch))
            {
                conn.close().await;
            }
            Outcome::Continue
        }
        Effect::Teardown => Outcome::Teardown,
    }
}

/// One turn's reply work, with the full degradation chain: paced playback,
/// then redirect to a hosted clip, then the transport's built-in voice.
/// Returns the duration of audio delivered, for the echo window.
async fn run_reply(
    pipeline: &ReplyPipeline,
    transport: Arc<dyn CallTransport>,
    clips: &ClipStore,
    hosted_clips: &Mutex<Vec<Uuid>>,
    call_rate: u32,
    frame_interval: Duration,
    transcript: &str,
    language: crate::core::language::Locale,
) -> Duration {
    let reply = pipeline.generate(transcript, language).await;

    let Some(audio) = pipeline.synthesize(&reply).await else {
        // No audio at all; let the telephony provider speak the text.
        if let Err(e) = transport.say(&reply.text, reply.language).await {
            warn!(error = %e, "spoken-text fallback failed, dropping turn");
        }
        return Duration::ZERO;
    };

    let pacer = PlaybackPacer::new(Arc::clone(&transport), call_rate, frame_interval);
    match pacer.play(&audio).await {
        Ok(played) => played,
        Err(e) => {
            warn!(error = %e, "paced playback failed, redirecting to hosted clip");
            let redirected = match clips.host(&audio) {
                Ok(clip) => {
                    hosted_clips.lock().push(clip.id);
                    transport.redirect_play(&clip.url).await.is_ok()
                }
                Err(host_err) => {
                    warn!(error = %host_err, "could not host fallback clip");
                    false
                }
            };
            if redirected { audio.duration() } else { Duration::ZERO }
        }
    }
}
