//! Async backend: runs REST calls off the event loop.
//!
//! The TUI sends `BackendCommand` values over an mpsc channel; a background
//! tokio task executes them and sends `BackendResponse` values back.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{with_cancel, ApiError, PortalClient};
use crate::auth::Role;
use crate::chat::{self, ChatBackend};
use crate::models::{ChatContact, ChatMessage};

/// Commands sent from the TUI event loop to the async backend.
pub enum BackendCommand {
    LoadContacts,
    LoadMessages { contact: ChatContact },
    /// REST send, used when the room socket is not open.
    SendMessage { contact: ChatContact, text: String },
}

/// Responses from the async backend to the TUI.
#[derive(Debug)]
pub enum BackendResponse {
    Contacts(Result<Vec<ChatContact>, ApiError>),
    Messages {
        contact: ChatContact,
        result: Result<Vec<ChatMessage>, ApiError>,
    },
    MessageSent {
        contact: ChatContact,
        text: String,
        result: Result<ChatMessage, ApiError>,
    },
}

/// Handle for interacting with the backend from the TUI side.
pub struct Backend {
    cmd_tx: mpsc::UnboundedSender<BackendCommand>,
    resp_rx: mpsc::UnboundedReceiver<BackendResponse>,
    cancel: CancellationToken,
}

impl Backend {
    /// Start the backend task for a logged-in user.
    pub fn start(client: Arc<PortalClient>, role: Role, current_user_id: Option<String>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(backend_loop(
            client,
            role,
            current_user_id,
            cmd_rx,
            resp_tx,
            cancel.clone(),
        ));

        Self {
            cmd_tx,
            resp_rx,
            cancel,
        }
    }

    /// Send a command to the backend (non-blocking).
    pub fn send(&self, cmd: BackendCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Backend channel closed -- command dropped");
        }
    }

    /// Receive the next response. Designed to be used inside `tokio::select!`.
    pub async fn recv(&mut self) -> Option<BackendResponse> {
        self.resp_rx.recv().await
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        // In-flight requests stop; their results are never applied.
        self.cancel.cancel();
    }
}

async fn backend_loop(
    client: Arc<PortalClient>,
    role: Role,
    current_user_id: Option<String>,
    mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>,
    resp_tx: mpsc::UnboundedSender<BackendResponse>,
    cancel: CancellationToken,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        let client = Arc::clone(&client);
        let resp_tx = resp_tx.clone();
        let cancel = cancel.clone();
        let me = current_user_id.clone();

        // Each command runs in its own task so a slow request does not block the loop.
        tokio::spawn(async move {
            let resp = match cmd {
                BackendCommand::LoadContacts => {
                    BackendResponse::Contacts(with_cancel(&cancel, client.list_contacts(role)).await)
                }
                BackendCommand::LoadMessages { contact } => {
                    let result =
                        with_cancel(&cancel, client.list_messages(&contact, me.as_deref())).await;
                    BackendResponse::Messages { contact, result }
                }
                BackendCommand::SendMessage { contact, text } => {
                    let result = with_cancel(
                        &cancel,
                        chat::rest_send(client.as_ref(), &contact, &text, me.as_deref()),
                    )
                    .await;
                    BackendResponse::MessageSent {
                        contact,
                        text,
                        result,
                    }
                }
            };
            if matches!(
                resp,
                BackendResponse::Contacts(Err(ApiError::Cancelled))
                    | BackendResponse::Messages {
                        result: Err(ApiError::Cancelled),
                        ..
                    }
                    | BackendResponse::MessageSent {
                        result: Err(ApiError::Cancelled),
                        ..
                    }
            ) {
                return;
            }
            let _ = resp_tx.send(resp);
        });
    }
}
