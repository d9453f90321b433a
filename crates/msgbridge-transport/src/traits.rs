use tokio::sync::mpsc;

use crate::error::Result;

/// A bidirectional message channel endpoint.
///
/// Implementations guarantee FIFO delivery per direction and make no
/// delivery promise once either side has torn down. `post_message` takes the
/// message by value: buffers inside it are moved to the port, which either
/// hands them over as-is (in-process) or serializes a copy.
pub trait Port<M>: Send + Sync {
    /// Post one message to the peer.
    ///
    /// Fails synchronously when the message cannot be handed to the
    /// transport; in that case nothing reached the wire.
    fn post_message(&self, message: M) -> Result<()>;

    /// Start receiving inbound messages.
    fn subscribe(&self) -> Result<Subscription<M>>;
}

/// Inbound side of a [`Port`].
///
/// Dropping the subscription detaches it: the port stops delivering to it.
#[derive(Debug)]
pub struct Subscription<M> {
    rx: mpsc::UnboundedReceiver<M>,
}

impl<M> Subscription<M> {
    /// Wrap a receiver fed by a port implementation.
    pub fn from_receiver(rx: mpsc::UnboundedReceiver<M>) -> Self {
        Self { rx }
    }

    /// Wait for the next inbound message.
    ///
    /// Returns `None` once the port is closed and every queued message has
    /// been delivered.
    pub async fn recv(&mut self) -> Option<M> {
        self.rx.recv().await
    }

    /// Take an already queued message without waiting.
    pub fn try_recv(&mut self) -> Option<M> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting new messages; already queued ones remain readable.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
