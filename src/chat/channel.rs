//! Room channel: one WebSocket per active conversation
//!
//! The channel owns at most one socket. Switching rooms closes the old socket
//! before opening the new one, and a generation counter guarantees that no
//! message handler runs for a socket that has been torn down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};
use url::Url;

use super::wire::{normalize_frame, parse_frame, NormalizeContext, OutboundFrame};
use crate::models::ChatMessage;

/// Callback for normalized inbound messages.
///
/// Runs on the socket task while the channel state is locked, so it must not call
/// back into the `RoomChannel`.
pub type MessageHandler = Arc<dyn Fn(ChatMessage) + Send + Sync>;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("chat socket is not connected")]
    NotConnected,

    #[error("failed to encode chat frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a socket went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed by either side with a normal code, or by us.
    Normal,
    /// 1006: connection dropped without a close frame.
    Network,
    /// 1011: server hit an internal error.
    ServerError,
    /// 1009: a frame exceeded the size limit.
    MessageTooBig,
    Other(u16),
}

impl CloseReason {
    pub fn from_code(code: u16) -> Self {
        match code {
            1000 | 1001 | 1005 => CloseReason::Normal,
            1006 => CloseReason::Network,
            1009 => CloseReason::MessageTooBig,
            1011 => CloseReason::ServerError,
            other => CloseReason::Other(other),
        }
    }

    fn from_error(e: &tungstenite::Error) -> Self {
        match e {
            tungstenite::Error::Capacity(_) => CloseReason::MessageTooBig,
            _ => CloseReason::Network,
        }
    }
}

/// State shared between the channel handle and its socket task.
#[derive(Default)]
struct Shared {
    /// Bumped on every teardown; a task only acts while its generation is current.
    generation: u64,
    connected: bool,
}

/// Per-socket parameters handed to the socket task.
struct SocketTask {
    url: Url,
    generation: u64,
    room: String,
    conversation_id: String,
    current_user_id: Option<String>,
    shared: Arc<Mutex<Shared>>,
    on_message: MessageHandler,
}

/// Manager for the socket of the currently open conversation.
pub struct RoomChannel {
    api_base: Url,
    token: Option<String>,
    current_user_id: Option<String>,
    on_message: MessageHandler,
    room: Option<String>,
    shared: Arc<Mutex<Shared>>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
}

impl RoomChannel {
    /// Create a channel with no room selected.
    pub fn new(
        api_base: &Url,
        token: Option<String>,
        current_user_id: Option<String>,
        on_message: MessageHandler,
    ) -> Self {
        Self {
            api_base: api_base.clone(),
            token,
            current_user_id,
            on_message,
            room: None,
            shared: Arc::new(Mutex::new(Shared::default())),
            outbound: None,
        }
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    /// Whether the socket for the current room is open.
    pub fn is_connected(&self) -> bool {
        self.shared.lock().map(|s| s.connected).unwrap_or(false)
    }

    /// Select the active room. Any change, including to `None`, closes the previous
    /// socket; selecting a room opens exactly one new socket. Re-selecting the
    /// current room does nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn set_room(&mut self, room: Option<String>, conversation_id: &str) -> Result<()> {
        let room = room.filter(|r| !r.trim().is_empty());
        if room == self.room {
            return Ok(());
        }

        self.close();
        self.room = room.clone();

        let Some(room) = room else {
            return Ok(());
        };

        let url = room_url(&self.api_base, &room, self.token.as_deref())?;
        let generation = self.shared.lock().map_err(|_| anyhow!("channel state poisoned"))?.generation;

        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound = Some(tx);

        let task = SocketTask {
            url,
            generation,
            room,
            conversation_id: conversation_id.to_string(),
            current_user_id: self.current_user_id.clone(),
            shared: Arc::clone(&self.shared),
            on_message: Arc::clone(&self.on_message),
        };
        tokio::spawn(run_socket(task, rx));
        Ok(())
    }

    /// Send a chat message over the open socket.
    ///
    /// Fails immediately when the socket is not open; nothing is queued, so the
    /// caller decides whether to fall back to REST.
    pub fn send(&self, message: &str, recipient_id: i64) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        let tx = self.outbound.as_ref().ok_or(ChannelError::NotConnected)?;
        let frame = serde_json::to_string(&OutboundFrame::message(message, recipient_id))?;
        tx.send(Message::Text(frame))
            .map_err(|_| ChannelError::NotConnected)
    }

    /// Wait until the socket opens, up to `timeout`.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_connected() {
                return true;
            }
            if self.outbound.is_none() || tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Close the current socket, if any. Handlers stop firing before this returns.
    pub fn close(&mut self) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.generation += 1;
            shared.connected = false;
        }
        if let Some(tx) = self.outbound.take() {
            let _ = tx.send(Message::Close(None));
        }
    }
}

impl Drop for RoomChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// WebSocket URL for a room: REST origin with `http→ws` / `https→wss`, path
/// `/ws/chat/{room}/`, and the bearer token as a query parameter.
pub fn room_url(api_base: &Url, room: &str, token: Option<&str>) -> Result<Url> {
    let mut url = api_base.clone();
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(anyhow!("Unsupported API scheme for chat socket: {}", other)),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("Cannot derive socket URL from {}", api_base))?;
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| anyhow!("API base URL cannot carry a path: {}", api_base))?
        .clear()
        .push("ws")
        .push("chat")
        .push(room)
        .push("");
    if let Some(token) = token {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url)
}

/// Mark the socket closed if it is still the current one.
fn mark_closed(shared: &Mutex<Shared>, generation: u64) {
    if let Ok(mut s) = shared.lock() {
        if s.generation == generation {
            s.connected = false;
        }
    }
}

/// Normalize a text frame and hand it to the handler if the socket is still current.
fn dispatch_text(task: &SocketTask, text: &str) {
    let frame = match parse_frame(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!("Unparseable chat frame ({}): {}", e, text);
            return;
        }
    };

    let ctx = NormalizeContext {
        room_name: Some(&task.room),
        conversation_id: &task.conversation_id,
        current_user_id: task.current_user_id.as_deref(),
    };
    let Some(msg) = normalize_frame(frame, &ctx) else {
        return;
    };

    // Lock held across the call so teardown cannot interleave with delivery.
    if let Ok(shared) = task.shared.lock() {
        if shared.generation == task.generation {
            (task.on_message)(msg);
        }
    }
}

async fn run_socket(task: SocketTask, mut outbound: mpsc::UnboundedReceiver<Message>) {
    tracing::info!("Connecting chat socket for room {}", task.room);

    let stream = match connect_async(task.url.as_str())
        .await
        .context("WebSocket connection failed")
    {
        Ok((stream, response)) => {
            tracing::info!("Chat socket connected (status={})", response.status());
            stream
        }
        Err(e) => {
            tracing::warn!("Chat socket for room {} failed: {:#}", task.room, e);
            mark_closed(&task.shared, task.generation);
            return;
        }
    };

    {
        let Ok(mut shared) = task.shared.lock() else {
            return;
        };
        if shared.generation != task.generation {
            tracing::debug!("Room {} closed while connecting", task.room);
            return;
        }
        shared.connected = true;
    }

    let (mut sink, mut source) = stream.split();

    let reason = loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(msg) => {
                    let closing = matches!(msg, Message::Close(_));
                    if let Err(e) = sink.send(msg).await {
                        tracing::warn!("Chat socket send failed: {}", e);
                        break CloseReason::from_error(&e);
                    }
                    if closing {
                        break CloseReason::Normal;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break CloseReason::Normal;
                }
            },
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("WS recv: {}", text);
                    dispatch_text(&task, &text);
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sink.send(Message::Pong(data)).await {
                        break CloseReason::from_error(&e);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("Chat socket closed by server: {:?}", frame);
                    break frame
                        .map(|f| CloseReason::from_code(u16::from(f.code)))
                        .unwrap_or(CloseReason::Normal);
                }
                Some(Ok(other)) => {
                    tracing::debug!("WS frame (ignored): {:?}", other);
                }
                Some(Err(e)) => {
                    tracing::warn!("Chat socket receive error: {}", e);
                    break CloseReason::from_error(&e);
                }
                None => break CloseReason::Network,
            },
        }
    };

    match reason {
        CloseReason::Normal => tracing::info!("Chat socket for room {} closed", task.room),
        CloseReason::Network => tracing::warn!("Chat socket for room {} lost (1006)", task.room),
        CloseReason::ServerError => {
            tracing::warn!("Chat socket for room {} closed by server error (1011)", task.room)
        }
        CloseReason::MessageTooBig => {
            tracing::warn!("Chat socket for room {} closed: message too big (1009)", task.room)
        }
        CloseReason::Other(code) => {
            tracing::warn!("Chat socket for room {} closed with code {}", task.room, code)
        }
    }
    mark_closed(&task.shared, task.generation);
}
