//! Events posted from download tasks to the UI loop.
//!
//! Background work never talks to the user directly. It posts a [`UiEvent`]
//! through a [`UiHandle`]; whoever owns the [`UiReceiver`] (the CLI, or a
//! test) renders toasts, progress, notifications and dialogs.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::download::{ConfirmationPrompt, ConfirmationRequest};

/// A finished download as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedDownload {
    pub file_name: String,
    pub path: PathBuf,
    pub mime_type: String,
}

#[derive(Debug)]
pub enum UiEvent {
    /// Short transient message.
    Toast(String),
    /// Byte progress of a download streamed by this process.
    Progress {
        file_name: String,
        bytes: u64,
        total: Option<u64>,
    },
    /// "Download complete" notification; selecting it opens the file.
    Notification(CompletedDownload),
    /// Ask the user whether to open the file right away.
    OpenPrompt(CompletedDownload),
    /// Ask the user to confirm a download. Dropping `reply` cancels.
    ConfirmDownload {
        request: ConfirmationRequest,
        reply: oneshot::Sender<bool>,
    },
}

/// Sending half, cheap to clone into tasks.
#[derive(Debug, Clone)]
pub struct UiHandle {
    events: mpsc::UnboundedSender<UiEvent>,
}

impl UiHandle {
    /// Posts an event. Events posted after the UI loop has gone are dropped.
    pub fn post(&self, event: UiEvent) {
        if self.events.send(event).is_err() {
            debug!("UI loop closed, event dropped");
        }
    }

    pub fn toast(&self, message: impl Into<String>) {
        self.post(UiEvent::Toast(message.into()));
    }
}

/// Receiving half, owned by the UI loop.
#[derive(Debug)]
pub struct UiReceiver {
    events: mpsc::UnboundedReceiver<UiEvent>,
}

impl UiReceiver {
    pub async fn recv(&mut self) -> Option<UiEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<UiEvent> {
        self.events.try_recv().ok()
    }
}

/// Creates a connected handle/receiver pair.
#[must_use]
pub fn channel() -> (UiHandle, UiReceiver) {
    let (events, receiver) = mpsc::unbounded_channel();
    (UiHandle { events }, UiReceiver { events: receiver })
}

/// Confirmation dialog shown by the UI loop.
///
/// Posts [`UiEvent::ConfirmDownload`] and waits for the answer. A UI loop
/// that drops the reply counts as a cancel.
#[derive(Debug, Clone)]
pub struct UiConfirmationPrompt {
    ui: UiHandle,
}

impl UiConfirmationPrompt {
    #[must_use]
    pub fn new(ui: UiHandle) -> Self {
        Self { ui }
    }
}

#[async_trait]
impl ConfirmationPrompt for UiConfirmationPrompt {
    async fn confirm(&self, request: ConfirmationRequest) -> bool {
        let (reply, answer) = oneshot::channel();
        self.ui.post(UiEvent::ConfirmDownload { request, reply });
        answer.await.unwrap_or(false)
    }
}
