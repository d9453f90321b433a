use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures_core::future::BoxFuture;
use futures_util::FutureExt;
use msgbridge_transport::{Port, Subscription};
use msgbridge_wire::{
    ActionFrame, ActionKind, BoxError, Completion, Frame, FrameBody, Reason, StreamSignal,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{HandlerError, ProtocolViolation, Result};
use crate::outbox::Outbox;
use crate::readable::{ReadableStream, StreamSource};
use crate::sink::{completion, lock, SinkRegistry, StreamSink};
use crate::strategy::QueueingStrategy;

type CallFn = dyn Fn(Value) -> BoxFuture<'static, std::result::Result<Value, BoxError>> + Send + Sync;
type StreamFn =
    dyn Fn(Value, StreamSink) -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send + Sync;

enum ActionHandler {
    Call(Box<CallFn>),
    Stream(Box<StreamFn>),
}

struct RegisteredAction {
    name: String,
    handler: ActionHandler,
}

type PendingCall = oneshot::Sender<Result<Value>>;

struct Shared {
    outbox: Outbox,
    actions: Mutex<HashMap<String, Arc<RegisteredAction>>>,
    calls: Mutex<HashMap<u64, PendingCall>>,
    streams: Mutex<HashMap<u64, Arc<StreamSource>>>,
    sinks: Arc<SinkRegistry>,
    next_callback_id: AtomicU64,
    next_stream_id: AtomicU64,
    destroyed: AtomicBool,
    fault: watch::Sender<Option<ProtocolViolation>>,
    finished: watch::Sender<bool>,
}

/// One endpoint of a message channel.
///
/// Registers named actions the peer can invoke and invokes the peer's actions
/// as notifications, calls or flow-controlled streams. Frames not addressed to
/// `source_name` are ignored, so several handlers can share one port.
///
/// Must be created inside a tokio runtime: inbound frames are dispatched on a
/// background task, and action handlers run on tasks of their own.
pub struct MessageHandler {
    shared: Arc<Shared>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl MessageHandler {
    /// Attach a handler named `source_name` that talks to `target_name`.
    pub fn new(
        source_name: impl Into<String>,
        target_name: impl Into<String>,
        port: Arc<dyn Port<Frame>>,
    ) -> Result<Self> {
        let source_name = source_name.into();
        let target_name = target_name.into();
        let inbound = port.subscribe()?;
        let (fault, _) = watch::channel(None);
        let (finished, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            outbox: Outbox::new(&source_name, &target_name, port),
            actions: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            streams: Mutex::new(HashMap::new()),
            sinks: Arc::new(SinkRegistry::default()),
            next_callback_id: AtomicU64::new(1),
            next_stream_id: AtomicU64::new(1),
            destroyed: AtomicBool::new(false),
            fault,
            finished,
        });
        let dispatcher = tokio::spawn(run_dispatch(Arc::clone(&shared), inbound));
        debug!(source = %source_name, target = %target_name, "message handler attached");

        Ok(Self {
            shared,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    pub fn source_name(&self) -> &str {
        self.shared.outbox.source_name()
    }

    pub fn target_name(&self) -> &str {
        self.shared.outbox.target_name()
    }

    /// Register a handler for notifications and calls named `action`.
    ///
    /// The handler's value answers a call; its error is reduced to a
    /// [`Reason`] and sent back as a failed reply.
    pub fn on<F, Fut>(&self, action: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, BoxError>> + Send + 'static,
    {
        self.register(
            action.into(),
            ActionHandler::Call(Box::new(move |data| -> BoxFuture<'static, _> {
                Box::pin(handler(data))
            })),
        )
    }

    /// Register a handler for streams named `action`.
    ///
    /// The peer is told the stream started once the handler's future
    /// resolves, and it will not pull before that. Producers that wait on
    /// [`StreamSink::ready`] should do so from a spawned task or through the
    /// sink's hooks.
    pub fn on_stream<F, Fut>(&self, action: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(Value, StreamSink) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        self.register(
            action.into(),
            ActionHandler::Stream(Box::new(move |data, sink| -> BoxFuture<'static, _> {
                Box::pin(handler(data, sink))
            })),
        )
    }

    fn register(&self, name: String, handler: ActionHandler) -> Result<()> {
        let mut actions = lock(&self.shared.actions);
        if actions.contains_key(&name) {
            return Err(ProtocolViolation::DuplicateAction(name).into());
        }
        actions.insert(name.clone(), Arc::new(RegisteredAction { name, handler }));
        Ok(())
    }

    /// Fire-and-forget notification.
    pub fn send(&self, action: &str, data: impl Serialize) -> Result<()> {
        let data = serde_json::to_value(data).map_err(HandlerError::encode)?;
        self.shared.outbox.post(FrameBody::Action(ActionFrame {
            action: action.to_string(),
            data,
            kind: ActionKind::Notify,
        }))?;
        Ok(())
    }

    /// Invoke `action` on the peer and wait for its reply.
    ///
    /// The frame is posted before this returns; a frame that cannot be
    /// posted yields a future that fails immediately and leaves no pending
    /// call behind.
    pub fn send_with_promise(&self, action: &str, data: impl Serialize) -> ReplyFuture {
        let callback_id = self.shared.next_callback_id.fetch_add(1, Ordering::Relaxed);
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(err) => return ReplyFuture::failed(callback_id, HandlerError::encode(err)),
        };

        let (tx, rx) = oneshot::channel();
        lock(&self.shared.calls).insert(callback_id, tx);
        let posted = self.shared.outbox.post(FrameBody::Action(ActionFrame {
            action: action.to_string(),
            data,
            kind: ActionKind::Call { callback_id },
        }));
        if let Err(err) = posted {
            lock(&self.shared.calls).remove(&callback_id);
            return ReplyFuture::failed(callback_id, err.into());
        }

        ReplyFuture {
            callback_id,
            inner: Box::pin(async move { rx.await.unwrap_or(Err(HandlerError::Detached("call"))) }),
        }
    }

    /// Open a flow-controlled stream from the peer's `action` handler.
    ///
    /// The producer starts with `strategy.high_water_mark` credit. A frame
    /// that cannot be posted yields an already errored stream.
    pub fn send_with_stream(
        &self,
        action: &str,
        data: impl Serialize,
        strategy: QueueingStrategy,
    ) -> ReadableStream {
        let stream_id = self.shared.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let source = Arc::new(StreamSource::new(
            stream_id,
            self.shared.outbox.clone(),
            strategy,
        ));
        let stream = ReadableStream::new(Arc::clone(&source));

        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(err) => {
                source.fail(HandlerError::encode(err));
                return stream;
            }
        };

        lock(&self.shared.streams).insert(stream_id, Arc::clone(&source));
        let posted = self.shared.outbox.post(FrameBody::Action(ActionFrame {
            action: action.to_string(),
            data,
            kind: ActionKind::Stream {
                stream_id,
                desired_size: source.initial_desired_size(),
            },
        }));
        if let Err(err) = posted {
            lock(&self.shared.streams).remove(&stream_id);
            source.fail(err.into());
        }
        stream
    }

    /// Settle every outstanding call and stream with `reason`.
    ///
    /// Calls fail, reader streams error, and producer sinks stop as if
    /// cancelled. Nothing is sent to the peer.
    pub fn reject_pending(&self, reason: Reason) {
        let calls: Vec<_> = lock(&self.shared.calls).drain().collect();
        for (_, pending) in calls {
            let _ = pending.send(Err(HandlerError::Remote(reason.clone())));
        }
        let streams: Vec<_> = lock(&self.shared.streams).drain().collect();
        for (_, source) in streams {
            source.fail(HandlerError::Remote(reason.clone()));
        }
        for sink in self.shared.sinks.drain() {
            sink.abort(reason.clone());
        }
    }

    /// Detach from the port. No frame is dispatched afterwards.
    ///
    /// Outstanding calls and streams are left as they are; see
    /// [`reject_pending`](Self::reject_pending).
    pub fn destroy(&self) {
        self.shared.destroyed.store(true, Ordering::Release);
        if let Some(dispatcher) = lock(&self.dispatcher).take() {
            dispatcher.abort();
            debug!(source = %self.source_name(), "message handler destroyed");
        }
        self.shared.finished.send_replace(true);
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::Acquire)
    }

    /// The violation that stopped dispatch, if any.
    pub fn fault(&self) -> Option<ProtocolViolation> {
        self.shared.fault.borrow().clone()
    }

    /// Wait until a protocol violation stops dispatch.
    pub async fn faulted(&self) -> ProtocolViolation {
        let mut rx = self.shared.fault.subscribe();
        loop {
            if let Some(violation) = rx.borrow_and_update().clone() {
                return violation;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Wait until dispatch stops: the port closed, the handler was
    /// destroyed, or the peer violated the protocol.
    pub async fn closed(&self) {
        let mut rx = self.shared.finished.subscribe();
        let _ = rx.wait_for(|finished| *finished).await;
    }

    /// Calls still waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        lock(&self.shared.calls).len()
    }

    /// Reader streams still registered for inbound frames.
    pub fn open_streams(&self) -> usize {
        lock(&self.shared.streams).len()
    }

    /// Producer sinks still accepting pull and cancel frames.
    pub fn open_sinks(&self) -> usize {
        self.shared.sinks.len()
    }
}

impl Drop for MessageHandler {
    fn drop(&mut self) {
        if let Some(dispatcher) = lock(&self.dispatcher).take() {
            dispatcher.abort();
        }
    }
}

/// Reply to [`MessageHandler::send_with_promise`].
///
/// Dropping it does not withdraw the call; a late reply is discarded.
pub struct ReplyFuture {
    callback_id: u64,
    inner: BoxFuture<'static, Result<Value>>,
}

impl ReplyFuture {
    fn failed(callback_id: u64, err: HandlerError) -> Self {
        Self {
            callback_id,
            inner: Box::pin(std::future::ready(Err(err))),
        }
    }

    pub fn callback_id(&self) -> u64 {
        self.callback_id
    }

    /// Wait for the reply and deserialize it.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let value = self.await?;
        serde_json::from_value(value).map_err(|err| HandlerError::Decode(Arc::new(err)))
    }
}

impl Future for ReplyFuture {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

async fn run_dispatch(shared: Arc<Shared>, mut inbound: Subscription<Frame>) {
    while let Some(frame) = inbound.recv().await {
        if shared.destroyed.load(Ordering::Acquire) {
            break;
        }
        if let Err(violation) = shared.dispatch(frame) {
            error!(
                source = %shared.outbox.source_name(),
                error = %violation,
                "protocol violation, dispatch stopped"
            );
            shared.fault.send_replace(Some(violation));
            break;
        }
    }
    shared.finished.send_replace(true);
    debug!(source = %shared.outbox.source_name(), "dispatch loop finished");
}

impl Shared {
    fn dispatch(self: &Arc<Self>, frame: Frame) -> std::result::Result<(), ProtocolViolation> {
        if frame.target_name != self.outbox.source_name() {
            debug!(
                source = %frame.source_name,
                target = %frame.target_name,
                "ignoring frame for another handler"
            );
            return Ok(());
        }
        let peer = frame.source_name;

        match frame.body {
            FrameBody::Stream { stream_id, signal } => {
                self.process_stream(&peer, stream_id, signal);
                Ok(())
            }
            FrameBody::Reply {
                callback_id,
                result,
            } => {
                let pending = lock(&self.calls)
                    .remove(&callback_id)
                    .ok_or(ProtocolViolation::UnknownCallback(callback_id))?;
                debug!(callback_id, ok = result.is_ok(), "reply received");
                // The caller may have dropped its future; that is fine.
                let _ = pending.send(result.map_err(HandlerError::Remote));
                Ok(())
            }
            FrameBody::Action(action) => self.dispatch_action(&peer, action),
        }
    }

    fn dispatch_action(
        self: &Arc<Self>,
        peer: &str,
        frame: ActionFrame,
    ) -> std::result::Result<(), ProtocolViolation> {
        let action = lock(&self.actions)
            .get(&frame.action)
            .cloned()
            .ok_or_else(|| ProtocolViolation::UnknownAction(frame.action.clone()))?;
        let outbox = self.outbox.to_peer(peer);
        debug!(action = %action.name, source = %peer, "dispatching action");

        match frame.kind {
            ActionKind::Notify => {
                if matches!(action.handler, ActionHandler::Stream(_)) {
                    warn!(action = %action.name, "notification for a stream action ignored");
                    return Ok(());
                }
                tokio::spawn(async move {
                    if let Err(reason) = invoke_call(&action, frame.data).await {
                        warn!(action = %action.name, error = %reason, "notification handler failed");
                    }
                });
            }
            ActionKind::Call { callback_id } => {
                tokio::spawn(async move {
                    let result = invoke_call(&action, frame.data).await;
                    if let Err(err) = outbox.post(FrameBody::Reply {
                        callback_id,
                        result,
                    }) {
                        warn!(action = %action.name, callback_id, error = %err, "failed to post reply");
                    }
                });
            }
            ActionKind::Stream {
                stream_id,
                desired_size,
            } => {
                let sink = StreamSink::new(
                    stream_id,
                    desired_size,
                    outbox.clone(),
                    Arc::downgrade(&self.sinks),
                );
                self.sinks.insert(sink.clone());
                let sinks = Arc::clone(&self.sinks);
                tokio::spawn(async move {
                    let started = invoke_stream(&action, frame.data, sink).await;
                    if let Err(reason) = &started {
                        warn!(action = %action.name, stream_id, error = %reason, "stream handler failed");
                        if let Some(sink) = sinks.remove(stream_id) {
                            sink.abort(reason.clone());
                        }
                    }
                    let signal = StreamSignal::StartComplete(Completion::from(started));
                    if let Err(err) = outbox.stream(stream_id, signal) {
                        warn!(action = %action.name, stream_id, error = %err, "failed to post start_complete");
                    }
                });
            }
        }
        Ok(())
    }

    fn process_stream(self: &Arc<Self>, peer: &str, stream_id: u64, signal: StreamSignal) {
        debug!(stream_id, stream = signal.kind().as_str(), "stream frame");
        match signal {
            StreamSignal::Pull { desired_size } => {
                let outbox = self.outbox.to_peer(peer);
                let pending = self
                    .sinks
                    .get(stream_id)
                    .and_then(|sink| sink.handle_pull(desired_size));
                tokio::spawn(async move {
                    let result = match pending {
                        Some(hook) => Some(guard_hook(hook).await),
                        None => None,
                    };
                    let done = completion(result, false);
                    if let Err(err) = outbox.stream(stream_id, StreamSignal::PullComplete(done)) {
                        warn!(stream_id, error = %err, "failed to post pull_complete");
                    }
                });
            }
            StreamSignal::Cancel { reason } => {
                let outbox = self.outbox.to_peer(peer);
                let pending = self
                    .sinks
                    .get(stream_id)
                    .and_then(|sink| sink.handle_cancel(reason));
                tokio::spawn(async move {
                    let result = match pending {
                        Some(hook) => Some(guard_hook(hook).await),
                        None => None,
                    };
                    if let Some(Err(err)) = &result {
                        warn!(stream_id, error = %err, "cancel hook failed");
                    }
                    let done = completion(result, true);
                    if let Err(err) = outbox.stream(stream_id, StreamSignal::CancelComplete(done)) {
                        warn!(stream_id, error = %err, "failed to post cancel_complete");
                    }
                });
            }
            signal => {
                let source = lock(&self.streams).get(&stream_id).cloned();
                let Some(source) = source else {
                    debug!(stream_id, "frame for unknown stream dropped");
                    return;
                };
                if source.handle(signal) {
                    lock(&self.streams).remove(&source.stream_id());
                    debug!(stream_id, "stream released");
                }
            }
        }
    }
}

async fn invoke_call(action: &RegisteredAction, data: Value) -> std::result::Result<Value, Reason> {
    match &action.handler {
        ActionHandler::Call(handler) => guarded(async move { handler(data).await }).await,
        ActionHandler::Stream(_) => Err(Reason::unknown(
            format!("action {} only answers streams", action.name),
            "",
        )),
    }
}

async fn invoke_stream(
    action: &RegisteredAction,
    data: Value,
    sink: StreamSink,
) -> std::result::Result<(), Reason> {
    match &action.handler {
        ActionHandler::Stream(handler) => guarded(async move { handler(data, sink).await }).await,
        ActionHandler::Call(_) => Err(Reason::unknown(
            format!("action {} does not produce streams", action.name),
            "",
        )),
    }
}

/// Run a handler future, reducing both its error and a panic to a [`Reason`].
async fn guarded<T, F>(fut: F) -> std::result::Result<T, Reason>
where
    F: Future<Output = std::result::Result<T, BoxError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Reason::wrap_boxed(err)),
        Err(panic) => Err(Reason::unknown("action handler panicked", panic_message(&*panic))),
    }
}

async fn guard_hook(
    fut: BoxFuture<'static, std::result::Result<(), BoxError>>,
) -> std::result::Result<(), BoxError> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(panic_message(&*panic).into()),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use msgbridge_transport::LoopbackPort;
    use serde_json::json;

    use super::*;

    fn port() -> Arc<LoopbackPort<Frame>> {
        Arc::new(LoopbackPort::new())
    }

    #[tokio::test]
    async fn duplicate_action_is_rejected() {
        let port = port();
        let handler = MessageHandler::new("main", "worker", port).unwrap();
        handler
            .on("Echo", |data| async move { Ok::<_, BoxError>(data) })
            .unwrap();

        let err = handler
            .on_stream("Echo", |_data, _sink| async { Ok::<_, BoxError>(()) })
            .unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Protocol(ProtocolViolation::DuplicateAction(name)) if name == "Echo"
        ));
    }

    #[tokio::test]
    async fn call_round_trip() {
        let port = port();
        let main = MessageHandler::new("main", "worker", port.clone()).unwrap();
        let worker = MessageHandler::new("worker", "main", port).unwrap();
        worker
            .on("Add", |data| async move {
                let a = data["a"].as_i64().unwrap_or(0);
                let b = data["b"].as_i64().unwrap_or(0);
                Ok::<_, BoxError>(json!(a + b))
            })
            .unwrap();

        let sum: i64 = main
            .send_with_promise("Add", json!({"a": 2, "b": 3}))
            .json()
            .await
            .unwrap();
        assert_eq!(sum, 5);
        assert_eq!(main.pending_calls(), 0);
    }

    #[tokio::test]
    async fn handler_panic_becomes_unknown_reason() {
        let port = port();
        let main = MessageHandler::new("main", "worker", port.clone()).unwrap();
        let worker = MessageHandler::new("worker", "main", port).unwrap();
        worker
            .on("Explode", |data| async move {
                if data.is_null() {
                    panic!("kaboom");
                }
                Ok::<_, BoxError>(data)
            })
            .unwrap();

        let err = main.send_with_promise("Explode", ()).await.unwrap_err();
        match err.reason() {
            Some(Reason::Unknown { message, details }) => {
                assert_eq!(message, "action handler panicked");
                assert_eq!(details, "kaboom");
            }
            other => panic!("unexpected reason {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_post_leaves_no_pending_call() {
        let port = port();
        let main = MessageHandler::new("main", "worker", port.clone()).unwrap();
        port.close();

        let err = main.send_with_promise("Anything", ()).await.unwrap_err();
        assert!(matches!(err, HandlerError::Send(_)));
        assert_eq!(main.pending_calls(), 0);
    }

    #[tokio::test]
    async fn frames_for_other_targets_are_ignored() {
        let port = port();
        let main = MessageHandler::new("main", "worker", port.clone()).unwrap();
        port.post_message(Frame::action(
            "worker",
            "someone-else",
            "Unregistered",
            Value::Null,
            ActionKind::Notify,
        ))
        .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(main.fault().is_none());
    }

    #[tokio::test]
    async fn unknown_callback_faults_the_handler() {
        let port = port();
        let main = MessageHandler::new("main", "worker", port.clone()).unwrap();
        port.post_message(Frame::reply("worker", "main", 42, Ok(Value::Null)))
            .unwrap();

        let violation = tokio::time::timeout(Duration::from_secs(1), main.faulted())
            .await
            .unwrap();
        assert_eq!(violation, ProtocolViolation::UnknownCallback(42));
        tokio::time::timeout(Duration::from_secs(1), main.closed())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn closed_resolves_when_the_port_closes() {
        let port = port();
        let main = MessageHandler::new("main", "worker", port.clone()).unwrap();
        port.close();
        tokio::time::timeout(Duration::from_secs(1), main.closed())
            .await
            .unwrap();
        assert!(main.fault().is_none());
    }

    #[tokio::test]
    async fn pull_for_unknown_sink_completes_successfully() {
        let port = port();
        let _worker = MessageHandler::new("worker", "main", port.clone()).unwrap();
        let mut wire = port.subscribe().unwrap();
        port.post_message(Frame::stream(
            "main",
            "worker",
            9,
            StreamSignal::Pull { desired_size: 1 },
        ))
        .unwrap();

        loop {
            let frame = wire.recv().await.unwrap();
            if frame.source_name != "worker" {
                continue;
            }
            assert_eq!(frame.target_name, "main");
            assert_eq!(
                frame.body,
                FrameBody::Stream {
                    stream_id: 9,
                    signal: StreamSignal::PullComplete(Completion::ok()),
                }
            );
            break;
        }
    }

    #[tokio::test]
    async fn reject_pending_fails_calls_and_streams() {
        let port = port();
        let main = MessageHandler::new("main", "worker", port).unwrap();
        let call = main.send_with_promise("NoAnswer", ());
        let mut stream = main.send_with_stream("NoStream", (), QueueingStrategy::default());

        main.reject_pending(Reason::abort("worker terminated"));

        assert_eq!(
            call.await.unwrap_err().reason(),
            Some(&Reason::abort("worker terminated"))
        );
        assert!(stream.read().await.is_err());
        assert_eq!(main.pending_calls(), 0);
        assert_eq!(main.open_streams(), 0);
    }

    #[test]
    fn panic_message_handles_both_payload_types() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "panic");
    }
}
