//! Producer side of a stream.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures_core::future::BoxFuture;
use msgbridge_wire::{BoxError, Completion, Reason, StreamSignal};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{HandlerError, Result};
use crate::outbox::Outbox;

type PullHook = Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send + Sync>;
type CancelHook =
    Arc<dyn Fn(Reason) -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send + Sync>;

/// Sinks currently able to receive pull and cancel frames, by stream id.
#[derive(Default)]
pub(crate) struct SinkRegistry {
    sinks: Mutex<HashMap<u64, StreamSink>>,
}

impl SinkRegistry {
    pub(crate) fn insert(&self, sink: StreamSink) {
        lock(&self.sinks).insert(sink.stream_id(), sink);
    }

    pub(crate) fn get(&self, stream_id: u64) -> Option<StreamSink> {
        lock(&self.sinks).get(&stream_id).cloned()
    }

    pub(crate) fn remove(&self, stream_id: u64) -> Option<StreamSink> {
        lock(&self.sinks).remove(&stream_id)
    }

    pub(crate) fn drain(&self) -> Vec<StreamSink> {
        lock(&self.sinks).drain().map(|(_, sink)| sink).collect()
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.sinks).len()
    }
}

#[derive(Debug, Clone)]
enum Gate {
    Open,
    Blocked,
    Rejected(Reason),
}

/// Readiness slot. The epoch bumps every time a fresh pending slot is
/// installed, so a waiter on an old slot is released by the change alone.
#[derive(Debug, Clone)]
struct Readiness {
    epoch: u64,
    gate: Gate,
}

struct SinkState {
    desired_size: i64,
    is_cancelled: bool,
    on_pull: Option<PullHook>,
    on_cancel: Option<CancelHook>,
}

struct SinkInner {
    stream_id: u64,
    outbox: Outbox,
    registry: Weak<SinkRegistry>,
    state: Mutex<SinkState>,
    ready: watch::Sender<Readiness>,
}

/// Handle given to a stream action handler for pushing chunks to the peer.
///
/// Cheap to clone. The producer should wait on [`ready`](Self::ready) before
/// each chunk; the peer's pull frames reopen it as the consumer drains.
#[derive(Clone)]
pub struct StreamSink {
    inner: Arc<SinkInner>,
}

impl StreamSink {
    pub(crate) fn new(
        stream_id: u64,
        desired_size: i64,
        outbox: Outbox,
        registry: Weak<SinkRegistry>,
    ) -> Self {
        let gate = if desired_size > 0 { Gate::Open } else { Gate::Blocked };
        let (ready, _) = watch::channel(Readiness { epoch: 0, gate });
        Self {
            inner: Arc::new(SinkInner {
                stream_id,
                outbox,
                registry,
                state: Mutex::new(SinkState {
                    desired_size,
                    is_cancelled: false,
                    on_pull: None,
                    on_cancel: None,
                }),
                ready,
            }),
        }
    }

    pub fn stream_id(&self) -> u64 {
        self.inner.stream_id
    }

    /// Credit granted by the consumer minus what was enqueued since.
    pub fn desired_size(&self) -> i64 {
        lock(&self.inner.state).desired_size
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.inner.state).is_cancelled
    }

    /// Resolves when the consumer has credit, or fails with the cancel reason.
    pub async fn ready(&self) -> std::result::Result<(), Reason> {
        let mut rx = self.inner.ready.subscribe();
        let epoch = {
            let current = rx.borrow_and_update();
            match &current.gate {
                Gate::Open => return Ok(()),
                Gate::Rejected(reason) => return Err(reason.clone()),
                Gate::Blocked => current.epoch,
            }
        };

        let settled = rx
            .wait_for(|slot| slot.epoch != epoch || !matches!(slot.gate, Gate::Blocked))
            .await
            .map(|slot| slot.clone());
        match settled {
            Ok(slot) if slot.epoch != epoch => Ok(()),
            Ok(Readiness {
                gate: Gate::Rejected(reason),
                ..
            }) => Err(reason),
            Ok(_) => Ok(()),
            Err(_) => Err(Reason::abort("stream sink dropped")),
        }
    }

    /// Send one chunk counting as 1 against the consumer's credit.
    pub fn enqueue(&self, chunk: impl Serialize) -> Result<()> {
        self.enqueue_sized(chunk, 1)
    }

    /// Send one chunk of the given size. A no-op once the sink is cancelled.
    ///
    /// Credit is only spent on a chunk that was posted.
    pub fn enqueue_sized(&self, chunk: impl Serialize, size: i64) -> Result<()> {
        let chunk = serde_json::to_value(chunk).map_err(HandlerError::encode)?;
        let mut state = lock(&self.inner.state);
        if state.is_cancelled {
            return Ok(());
        }
        self.inner
            .outbox
            .stream(self.inner.stream_id, StreamSignal::Enqueue { chunk })?;
        let last = state.desired_size;
        state.desired_size -= size;
        if last > 0 && state.desired_size <= 0 {
            self.inner.ready.send_modify(|slot| {
                slot.epoch += 1;
                slot.gate = Gate::Blocked;
            });
        }
        Ok(())
    }

    /// End the stream gracefully. Idempotent, and a no-op after cancel.
    pub fn close(&self) -> Result<()> {
        self.finish(StreamSignal::Close)
    }

    /// Fail the stream on the consumer side. Idempotent, and a no-op after cancel.
    pub fn error(&self, err: impl Into<BoxError>) -> Result<()> {
        let reason = Reason::wrap_boxed(err.into());
        self.finish(StreamSignal::Error { reason })
    }

    /// Called from the dispatch loop when the consumer pulls; the returned
    /// future runs on its own task.
    pub fn set_on_pull<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        let hook: PullHook = Arc::new(move || -> BoxFuture<'static, _> { Box::pin(hook()) });
        lock(&self.inner.state).on_pull = Some(hook);
    }

    /// Called from the dispatch loop when the consumer cancels.
    pub fn set_on_cancel<F, Fut>(&self, hook: F)
    where
        F: Fn(Reason) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        let hook: CancelHook =
            Arc::new(move |reason| -> BoxFuture<'static, _> { Box::pin(hook(reason)) });
        lock(&self.inner.state).on_cancel = Some(hook);
    }

    fn finish(&self, signal: StreamSignal) -> Result<()> {
        let posted = {
            let mut state = lock(&self.inner.state);
            if state.is_cancelled {
                return Ok(());
            }
            state.is_cancelled = true;
            self.inner.outbox.stream(self.inner.stream_id, signal)
        };
        // The sink is finished locally whether or not the peer heard about it.
        self.release();
        posted?;
        Ok(())
    }

    fn release(&self) {
        if let Some(registry) = self.inner.registry.upgrade() {
            registry.remove(self.inner.stream_id);
        }
    }

    /// Apply a pull frame: grant credit, reopen the gate, start the hook.
    pub(crate) fn handle_pull(
        &self,
        desired_size: i64,
    ) -> Option<BoxFuture<'static, std::result::Result<(), BoxError>>> {
        let hook = {
            let mut state = lock(&self.inner.state);
            state.desired_size = desired_size;
            state.on_pull.clone()
        };
        if desired_size > 0 {
            self.inner.ready.send_if_modified(|slot| {
                if matches!(slot.gate, Gate::Blocked) {
                    slot.gate = Gate::Open;
                    true
                } else {
                    false
                }
            });
        }
        hook.map(|hook| hook())
    }

    /// Apply a cancel frame: run the hook, reject the gate, stop the sink.
    pub(crate) fn handle_cancel(
        &self,
        reason: Reason,
    ) -> Option<BoxFuture<'static, std::result::Result<(), BoxError>>> {
        let hook = lock(&self.inner.state).on_cancel.clone();
        let pending = hook.map(|hook| hook(reason.clone()));
        self.abort(reason);
        pending
    }

    /// Stop the sink locally without telling the peer.
    pub(crate) fn abort(&self, reason: Reason) {
        self.inner.ready.send_modify(|slot| slot.gate = Gate::Rejected(reason));
        lock(&self.inner.state).is_cancelled = true;
        self.release();
        debug!(stream_id = self.inner.stream_id, "stream sink stopped");
    }
}

/// Reply for a pull or cancel once its hook settled.
pub(crate) fn completion(
    result: Option<std::result::Result<(), BoxError>>,
    acknowledge: bool,
) -> Completion {
    let failure = match result {
        Some(Err(err)) => Some(Reason::wrap_boxed(err)),
        _ => None,
    };
    if acknowledge {
        Completion::acknowledged(failure)
    } else {
        failure.map_or_else(Completion::ok, Completion::failed)
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use msgbridge_transport::{LoopbackPort, Port};
    use msgbridge_wire::{Frame, FrameBody};
    use serde_json::json;

    use super::*;

    fn sink_on(port: &Arc<LoopbackPort<Frame>>, desired: i64) -> (StreamSink, Arc<SinkRegistry>) {
        let registry = Arc::new(SinkRegistry::default());
        let outbox = Outbox::new("worker", "main", port.clone());
        let sink = StreamSink::new(1, desired, outbox, Arc::downgrade(&registry));
        registry.insert(sink.clone());
        (sink, registry)
    }

    fn signal(frame: Frame) -> StreamSignal {
        match frame.body {
            FrameBody::Stream { signal, .. } => signal,
            other => panic!("expected a stream frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ready_blocks_when_credit_runs_out() {
        let port = Arc::new(LoopbackPort::<Frame>::new());
        let mut wire = port.subscribe().unwrap();
        let (sink, _registry) = sink_on(&port, 2);

        sink.ready().await.unwrap();
        sink.enqueue_sized(json!([1, 2]), 2).unwrap();
        assert_eq!(sink.desired_size(), 0);
        assert_eq!(
            signal(wire.recv().await.unwrap()),
            StreamSignal::Enqueue {
                chunk: json!([1, 2])
            }
        );

        let waiter = tokio::spawn({
            let sink = sink.clone();
            async move { sink.ready().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        assert!(sink.handle_pull(3).is_none());
        assert_eq!(waiter.await.unwrap(), Ok(()));
        assert_eq!(sink.desired_size(), 3);
    }

    #[tokio::test]
    async fn cancel_rejects_ready_and_silences_the_sink() {
        let port = Arc::new(LoopbackPort::<Frame>::new());
        let mut wire = port.subscribe().unwrap();
        let (sink, registry) = sink_on(&port, 0);

        let waiter = tokio::spawn({
            let sink = sink.clone();
            async move { sink.ready().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(sink.handle_cancel(Reason::abort("reader cancelled.")).is_none());

        assert_eq!(waiter.await.unwrap(), Err(Reason::abort("reader cancelled.")));
        assert!(sink.is_cancelled());
        assert_eq!(registry.len(), 0);

        sink.enqueue("late").unwrap();
        sink.close().unwrap();
        assert!(wire.try_recv().is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let port = Arc::new(LoopbackPort::<Frame>::new());
        let mut wire = port.subscribe().unwrap();
        let (sink, registry) = sink_on(&port, 1);

        sink.close().unwrap();
        sink.close().unwrap();
        sink.error("too late").unwrap();

        assert_eq!(signal(wire.recv().await.unwrap()), StreamSignal::Close);
        assert!(wire.try_recv().is_none());
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn failed_posts_spend_no_credit_and_still_release() {
        let port = Arc::new(LoopbackPort::<Frame>::new());
        let (sink, registry) = sink_on(&port, 2);
        port.close();

        assert!(matches!(sink.enqueue("lost"), Err(HandlerError::Send(_))));
        assert_eq!(sink.desired_size(), 2);
        sink.ready().await.unwrap();

        assert!(matches!(sink.close(), Err(HandlerError::Send(_))));
        assert!(sink.is_cancelled());
        assert_eq!(registry.len(), 0);
        // Already finished, so a retry is a quiet no-op.
        sink.close().unwrap();
    }

    #[tokio::test]
    async fn error_wraps_foreign_errors_as_unknown() {
        let port = Arc::new(LoopbackPort::<Frame>::new());
        let mut wire = port.subscribe().unwrap();
        let (sink, _registry) = sink_on(&port, 1);

        sink.error("should not read when errored").unwrap();
        match signal(wire.recv().await.unwrap()) {
            StreamSignal::Error { reason } => {
                assert!(matches!(reason, Reason::Unknown { .. }));
                assert_eq!(reason.message(), "should not read when errored");
            }
            other => panic!("unexpected signal {other:?}"),
        }
    }

    #[tokio::test]
    async fn pull_hook_runs_and_reports_failure() {
        let port = Arc::new(LoopbackPort::<Frame>::new());
        let (sink, _registry) = sink_on(&port, 1);
        sink.set_on_pull(|| async { Err::<(), BoxError>("pull failed".into()) });

        let pending = sink.handle_pull(1);
        let done = completion(Some(pending.unwrap().await), false);
        assert!(!done.success);
        assert_eq!(done.reason.unwrap().message(), "pull failed");
    }

    #[test]
    fn cancel_completion_is_acknowledged_even_when_hook_fails() {
        let done = completion(Some(Err("cleanup failed".into())), true);
        assert!(done.success);
        assert_eq!(done.reason.unwrap().message(), "cleanup failed");
        assert!(completion(None, true).success);
    }
}
