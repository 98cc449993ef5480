//! WebSocket media stream handler.
//!
//! One socket carries one call. The reader half feeds start/media/stop
//! events into the session; the writer half drains outbound messages from
//! the session's transport. The socket never blocks on recognizer or reply
//! work, which all happens inside the session runner.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::messages::{IncomingMessage, OutgoingMessage, decode_payload};
use crate::core::language::Locale;
use crate::core::session::{SessionHandle, spawn_session};
use crate::core::transport::CallTransport;
use crate::errors::TransportError;
use crate::state::AppState;

const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

pub async fn media_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_media_stream(socket, state))
}

/// Call transport over the socket's outbound channel.
struct WsCallTransport {
    outbound: mpsc::Sender<OutgoingMessage>,
}

#[async_trait]
impl CallTransport for WsCallTransport {
    async fn send_media(&self, frame: Bytes) -> Result<(), TransportError> {
        self.outbound
            .send(OutgoingMessage::media(&frame))
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    async fn redirect_play(&self, url: &str) -> Result<(), TransportError> {
        self.outbound
            .send(OutgoingMessage::Play {
                url: url.to_owned(),
            })
            .await
            .map_err(|_| TransportError::ControlFailed("play command not delivered".into()))
    }

    async fn say(&self, text: &str, language: Locale) -> Result<(), TransportError> {
        self.outbound
            .send(OutgoingMessage::Say {
                text: text.to_owned(),
                language: language.code().to_owned(),
            })
            .await
            .map_err(|_| TransportError::ControlFailed("say command not delivered".into()))
    }

    fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}

async fn handle_media_stream(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<OutgoingMessage>(OUTBOUND_CHANNEL_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize outbound message"),
            }
        }
        let _ = sink.close().await;
    });

    let mut session: Option<SessionHandle> = None;
    let mut call_id: Option<String> = None;

    while let Some(message) = stream.next().await {
        let Ok(message) = message else { break };
        match message {
            Message::Text(text) => match serde_json::from_str::<IncomingMessage>(&text) {
                Ok(IncomingMessage::Start {
                    call_id: id,
                    sample_rate,
                    channel_count,
                }) => {
                    if session.is_some() {
                        warn!(call_id = %id, "duplicate start event ignored");
                        continue;
                    }
                    info!(call_id = %id, sample_rate, channel_count, "call started");
                    let transport = Arc::new(WsCallTransport {
                        outbound: out_tx.clone(),
                    });
                    let config = state.session_config(id.clone(), sample_rate, channel_count);
                    state.active_calls.insert(id.clone(), ());
                    session = Some(spawn_session(config, state.session_deps(transport)));
                    call_id = Some(id);
                }
                Ok(IncomingMessage::Media { payload }) => match (&session, decode_payload(&payload)) {
                    (Some(handle), Some(frame)) => handle.media(frame).await,
                    (None, _) => debug!("media before start dropped"),
                    (_, None) => debug!("undecodable media payload dropped"),
                },
                Ok(IncomingMessage::Stop) => break,
                Err(e) => debug!(error = %e, "unparseable inbound message dropped"),
            },
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames are not part of
            // this protocol.
            _ => {}
        }
    }

    if let Some(handle) = session.take() {
        handle.stop().await;
        handle.join().await;
    }
    if let Some(id) = call_id {
        state.active_calls.remove(&id);
        info!(call_id = %id, "call ended");
    }
    drop(out_tx);
    let _ = writer.await;
}
