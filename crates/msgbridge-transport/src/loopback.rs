use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Port, Subscription};

/// In-process port shared by every peer that subscribes to it.
///
/// Each posted message is cloned to every live subscriber, the way a single
/// message port with several listeners behaves. Peers sharing one loopback
/// port tell their traffic apart by addressing, not by the port.
pub struct LoopbackPort<M> {
    state: Mutex<LoopbackState<M>>,
}

struct LoopbackState<M> {
    listeners: Vec<mpsc::UnboundedSender<M>>,
    closed: bool,
}

impl<M> LoopbackPort<M> {
    /// Create an open port with no subscribers.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoopbackState {
                listeners: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Close the port. Later posts fail; subscribers drain what is queued.
    pub fn close(&self) {
        let mut state = lock(&self.state);
        state.closed = true;
        state.listeners.clear();
    }

    /// Number of subscribers that are still attached.
    pub fn subscriber_count(&self) -> usize {
        let mut state = lock(&self.state);
        state.listeners.retain(|tx| !tx.is_closed());
        state.listeners.len()
    }
}

impl<M> Default for LoopbackPort<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Clone + Send> Port<M> for LoopbackPort<M> {
    fn post_message(&self, message: M) -> Result<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(TransportError::Closed);
        }
        state
            .listeners
            .retain(|tx| tx.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Result<Subscription<M>> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(TransportError::Closed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.listeners.push(tx);
        debug!(subscribers = state.listeners.len(), "loopback subscriber attached");
        Ok(Subscription::from_receiver(rx))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
