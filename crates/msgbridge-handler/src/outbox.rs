use std::sync::Arc;

use msgbridge_transport::{Port, TransportError};
use msgbridge_wire::{Frame, FrameBody, StreamSignal};

/// Addressed sending half shared by the handler, its sinks and its streams.
#[derive(Clone)]
pub(crate) struct Outbox {
    source_name: Arc<str>,
    target_name: Arc<str>,
    port: Arc<dyn Port<Frame>>,
}

impl Outbox {
    pub(crate) fn new(source_name: &str, target_name: &str, port: Arc<dyn Port<Frame>>) -> Self {
        Self {
            source_name: Arc::from(source_name),
            target_name: Arc::from(target_name),
            port,
        }
    }

    /// Same port and identity, addressed to another peer.
    pub(crate) fn to_peer(&self, target_name: &str) -> Self {
        if *self.target_name == *target_name {
            return self.clone();
        }
        Self {
            source_name: Arc::clone(&self.source_name),
            target_name: Arc::from(target_name),
            port: Arc::clone(&self.port),
        }
    }

    pub(crate) fn source_name(&self) -> &str {
        &self.source_name
    }

    pub(crate) fn target_name(&self) -> &str {
        &self.target_name
    }

    pub(crate) fn post(&self, body: FrameBody) -> Result<(), TransportError> {
        self.port.post_message(Frame::new(
            self.source_name.as_ref(),
            self.target_name.as_ref(),
            body,
        ))
    }

    pub(crate) fn stream(&self, stream_id: u64, signal: StreamSignal) -> Result<(), TransportError> {
        self.post(FrameBody::Stream { stream_id, signal })
    }
}
