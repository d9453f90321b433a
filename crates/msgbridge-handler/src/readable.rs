//! Consumer side of a stream.
//!
//! [`StreamSource`] is the controller state the dispatch loop drives from
//! inbound stream frames. [`ReadableStream`] is the reader handed to the
//! caller of `send_with_stream`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures_core::Stream;
use msgbridge_wire::{Completion, Reason, StreamSignal};
use serde_json::Value;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, warn};

use crate::error::{HandlerError, Result};
use crate::outbox::Outbox;
use crate::sink::lock;
use crate::strategy::QueueingStrategy;

#[derive(Debug, Clone)]
enum Phase {
    Readable,
    Closed,
    Errored(HandlerError),
}

struct StreamState {
    phase: Phase,
    queue: VecDeque<(Value, i64)>,
    queue_size: i64,
    started: bool,
    close_requested: bool,
    pulling: bool,
    pull_again: bool,
    waiting_read: bool,
    /// No further chunks are accepted from the peer.
    is_closed: bool,
    start_pending: bool,
    cancel_call: Option<oneshot::Sender<Result<()>>>,
}

impl StreamState {
    fn settled(&self) -> bool {
        self.is_closed && !self.start_pending && !self.pulling && self.cancel_call.is_none()
    }
}

pub(crate) struct StreamSource {
    stream_id: u64,
    outbox: Outbox,
    strategy: QueueingStrategy,
    state: Mutex<StreamState>,
    notify: Notify,
}

impl StreamSource {
    pub(crate) fn new(stream_id: u64, outbox: Outbox, strategy: QueueingStrategy) -> Self {
        Self {
            stream_id,
            outbox,
            strategy,
            state: Mutex::new(StreamState {
                phase: Phase::Readable,
                queue: VecDeque::new(),
                queue_size: 0,
                started: false,
                close_requested: false,
                pulling: false,
                pull_again: false,
                waiting_read: false,
                is_closed: false,
                start_pending: true,
                cancel_call: None,
            }),
            notify: Notify::new(),
        }
    }

    pub(crate) fn stream_id(&self) -> u64 {
        self.stream_id
    }

    pub(crate) fn initial_desired_size(&self) -> i64 {
        self.strategy.high_water_mark
    }

    fn desired_size(&self, state: &StreamState) -> i64 {
        self.strategy.high_water_mark - state.queue_size
    }

    /// Apply one inbound consumer-side signal. Returns true once nothing more
    /// is expected for this stream and the controller can be released.
    pub(crate) fn handle(&self, signal: StreamSignal) -> bool {
        let mut state = lock(&self.state);
        match signal {
            StreamSignal::StartComplete(done) => {
                state.start_pending = false;
                match done.into_result() {
                    Ok(()) => {
                        state.started = true;
                        self.call_pull_if_needed(&mut state);
                    }
                    Err(reason) => self.error_stream(&mut state, HandlerError::Remote(reason)),
                }
            }
            StreamSignal::PullComplete(done) => {
                state.pulling = false;
                match done.into_result() {
                    Ok(()) => {
                        if state.pull_again {
                            state.pull_again = false;
                            self.call_pull_if_needed(&mut state);
                        }
                    }
                    Err(reason) => self.error_stream(&mut state, HandlerError::Remote(reason)),
                }
            }
            StreamSignal::Enqueue { chunk } => {
                if state.is_closed {
                    debug!(stream_id = self.stream_id, "dropping chunk for closed stream");
                } else {
                    let size = self.strategy.size_of(&chunk);
                    state.queue.push_back((chunk, size));
                    state.queue_size += size;
                    self.notify.notify_one();
                    self.call_pull_if_needed(&mut state);
                }
            }
            StreamSignal::Close => {
                if !state.is_closed {
                    state.is_closed = true;
                    state.close_requested = true;
                    if state.queue.is_empty() {
                        state.phase = Phase::Closed;
                    }
                    self.notify.notify_one();
                }
            }
            StreamSignal::Error { reason } => {
                self.error_stream(&mut state, HandlerError::Remote(reason));
            }
            StreamSignal::CancelComplete(done) => self.settle_cancel(&mut state, done),
            other => {
                warn!(
                    stream_id = self.stream_id,
                    stream = other.kind().as_str(),
                    "producer-side signal routed to a reader"
                );
            }
        }
        state.settled()
    }

    /// Fail the stream without hearing from the peer.
    pub(crate) fn fail(&self, err: HandlerError) {
        let mut state = lock(&self.state);
        self.error_stream(&mut state, err.clone());
        state.start_pending = false;
        state.pulling = false;
        if let Some(cancel) = state.cancel_call.take() {
            let _ = cancel.send(Err(err));
        }
    }

    fn settle_cancel(&self, state: &mut StreamState, done: Completion) {
        let Some(cancel) = state.cancel_call.take() else {
            debug!(stream_id = self.stream_id, "unexpected cancel_complete");
            return;
        };
        let result = if done.success {
            if let Some(reason) = done.reason {
                warn!(
                    stream_id = self.stream_id,
                    error = %reason,
                    "producer cancel hook failed"
                );
            }
            Ok(())
        } else {
            Err(HandlerError::Remote(
                done.reason
                    .unwrap_or_else(|| Reason::unknown("cancel failed", "")),
            ))
        };
        let _ = cancel.send(result);
    }

    fn should_call_pull(&self, state: &StreamState) -> bool {
        matches!(state.phase, Phase::Readable)
            && state.started
            && !state.close_requested
            && !state.is_closed
            && (state.waiting_read || self.desired_size(state) > 0)
    }

    fn call_pull_if_needed(&self, state: &mut StreamState) {
        if !self.should_call_pull(state) {
            return;
        }
        if state.pulling {
            state.pull_again = true;
            return;
        }
        state.pulling = true;
        let desired_size = self.desired_size(state);
        if let Err(err) = self
            .outbox
            .stream(self.stream_id, StreamSignal::Pull { desired_size })
        {
            state.pulling = false;
            self.error_stream(state, err.into());
        }
    }

    fn error_stream(&self, state: &mut StreamState, err: HandlerError) {
        state.is_closed = true;
        if !matches!(state.phase, Phase::Readable) {
            return;
        }
        debug!(stream_id = self.stream_id, error = %err, "stream errored");
        state.phase = Phase::Errored(err);
        state.queue.clear();
        state.queue_size = 0;
        self.notify.notify_one();
    }
}

/// Reader for a stream opened with
/// [`MessageHandler::send_with_stream`](crate::MessageHandler::send_with_stream).
///
/// Chunks are buffered up to the strategy's high-water mark; reading frees
/// credit, which is granted back to the producer with a pull frame.
pub struct ReadableStream {
    source: Arc<StreamSource>,
}

impl ReadableStream {
    pub(crate) fn new(source: Arc<StreamSource>) -> Self {
        Self { source }
    }

    pub fn stream_id(&self) -> u64 {
        self.source.stream_id
    }

    /// `None` once errored, 0 once closed.
    pub fn desired_size(&self) -> Option<i64> {
        let state = lock(&self.source.state);
        match state.phase {
            Phase::Readable => Some(self.source.desired_size(&state)),
            Phase::Closed => Some(0),
            Phase::Errored(_) => None,
        }
    }

    /// Next chunk, `None` at end of stream, or the error the stream failed with.
    pub async fn read(&mut self) -> Result<Option<Value>> {
        loop {
            {
                let mut state = lock(&self.source.state);
                if let Some((chunk, size)) = state.queue.pop_front() {
                    state.queue_size -= size;
                    state.waiting_read = false;
                    if state.close_requested && state.queue.is_empty() {
                        state.phase = Phase::Closed;
                    } else {
                        self.source.call_pull_if_needed(&mut state);
                    }
                    return Ok(Some(chunk));
                }
                match state.phase.clone() {
                    Phase::Closed => {
                        state.waiting_read = false;
                        return Ok(None);
                    }
                    Phase::Errored(err) => {
                        state.waiting_read = false;
                        return Err(err);
                    }
                    Phase::Readable => {
                        state.waiting_read = true;
                        self.source.call_pull_if_needed(&mut state);
                    }
                }
            }
            self.source.notify.notified().await;
        }
    }

    /// Stop reading and tell the producer why.
    ///
    /// Resolves once the producer acknowledged the cancel. Cancelling a closed
    /// stream succeeds without a round trip, including one the producer closed
    /// while chunks were still queued; cancelling an errored stream returns
    /// its error.
    pub async fn cancel(&mut self, reason: Reason) -> Result<()> {
        let settled = {
            let mut state = lock(&self.source.state);
            match &state.phase {
                Phase::Closed => return Ok(()),
                Phase::Errored(err) => return Err(err.clone()),
                Phase::Readable => {}
            }
            state.phase = Phase::Closed;
            state.queue.clear();
            state.queue_size = 0;
            if state.is_closed {
                // The producer already closed; only queued chunks were left.
                return Ok(());
            }
            state.is_closed = true;
            state.close_requested = true;
            self.source
                .outbox
                .stream(self.source.stream_id, StreamSignal::Cancel { reason })?;
            let (tx, rx) = oneshot::channel();
            state.cancel_call = Some(tx);
            rx
        };
        self.source.notify.notify_one();
        settled
            .await
            .unwrap_or(Err(HandlerError::Detached("stream cancel")))
    }

    /// Adapt the reader into a [`Stream`] of chunks. The stream ends after
    /// the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Value>> + Send {
        futures_util::stream::unfold(Some(self), |reader| async move {
            let mut reader = reader?;
            match reader.read().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(reader))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}
