//! Outbound transport toward the remote engine.
//!
//! Sending is fire-and-forget: the coordinator never waits for a reply, and
//! replies come back separately through `QueryCoordinator::handle_result`.

use super::message::TransportMessage;
use tokio::sync::mpsc;
use tracing::warn;

pub trait Transport {
    fn send(&mut self, message: TransportMessage);
}

/// Buffers every message in memory. Used by tests and by the simulator,
/// which drains the buffer into its network after each activation.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Vec<TransportMessage>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> &[TransportMessage] {
        &self.sent
    }

    /// Take every buffered message, oldest first
    pub fn drain(&mut self) -> Vec<TransportMessage> {
        std::mem::take(&mut self.sent)
    }

    pub fn count_set_range(&self) -> usize {
        self.sent
            .iter()
            .filter(|m| matches!(m, TransportMessage::SetRange { .. }))
            .count()
    }

    pub fn count_loads(&self) -> usize {
        self.sent
            .iter()
            .filter(|m| matches!(m, TransportMessage::Load { .. }))
            .count()
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, message: TransportMessage) {
        self.sent.push(message);
    }
}

pub type TransportSender = mpsc::UnboundedSender<TransportMessage>;
pub type TransportReceiver = mpsc::UnboundedReceiver<TransportMessage>;

/// Forwards messages into a tokio channel drained by the connection task
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: TransportSender,
}

impl ChannelTransport {
    pub fn new() -> (Self, TransportReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelTransport { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, message: TransportMessage) {
        if let Err(e) = self.tx.send(message) {
            warn!("Transport channel closed, dropping {:?}", e.0);
        }
    }
}
