//! Receive/send halves handed to an application for one interaction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::protocol::message::Message;

/// Default queue depth for a message channel.
pub const DEFAULT_CAPACITY: usize = 16;

/// Create a bounded message channel.
///
/// A capacity of zero is bumped to one.
pub fn channel(capacity: usize) -> (MessageSender, MessageReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        MessageSender { tx },
        MessageReceiver {
            rx,
            first_read: None,
        },
    )
}

/// Sending half. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MessageSender {
    tx: mpsc::Sender<Message>,
}

impl MessageSender {
    /// Send a message, waiting for queue capacity.
    ///
    /// Fails with [`AppError::Disconnected`] once the receiving side is gone.
    pub async fn send(&self, message: impl Into<Message>) -> Result<(), AppError> {
        self.tx
            .send(message.into())
            .await
            .map_err(|_| AppError::Disconnected)
    }

    /// Non-blocking send, used where awaiting is impossible (drop paths).
    pub fn try_send(&self, message: impl Into<Message>) -> Result<(), AppError> {
        self.tx
            .try_send(message.into())
            .map_err(|_| AppError::Disconnected)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half.
#[derive(Debug)]
pub struct MessageReceiver {
    rx: mpsc::Receiver<Message>,
    /// Raised on the first call to `recv`, used to tell "never listened" apart
    /// from "failed mid-handshake".
    first_read: Option<Arc<AtomicBool>>,
}

impl MessageReceiver {
    /// Wait for the next message.
    ///
    /// Fails with [`AppError::Disconnected`] once every sender is gone and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Result<Message, AppError> {
        if let Some(flag) = &self.first_read {
            flag.store(true, Ordering::SeqCst);
        }
        self.rx.recv().await.ok_or(AppError::Disconnected)
    }

    /// Take a message that is already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        if let Some(flag) = &self.first_read {
            flag.store(true, Ordering::SeqCst);
        }
        self.rx.try_recv().ok()
    }

    /// Attach a flag that flips on the first `recv` call.
    pub(crate) fn observe_reads(mut self, flag: Arc<AtomicBool>) -> Self {
        self.first_read = Some(flag);
        self
    }
}
