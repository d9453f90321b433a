use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WireError;
use crate::reason::Reason;

/// Stream control kinds, tagged by string on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Carried implicitly by the streaming Action frame; accepted inbound.
    Start,
    StartComplete,
    Pull,
    PullComplete,
    Enqueue,
    Close,
    Error,
    Cancel,
    CancelComplete,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::StartComplete => "start_complete",
            Self::Pull => "pull",
            Self::PullComplete => "pull_complete",
            Self::Enqueue => "enqueue",
            Self::Close => "close",
            Self::Error => "error",
            Self::Cancel => "cancel",
            Self::CancelComplete => "cancel_complete",
        }
    }
}

/// Outcome carried by `start_complete`, `pull_complete` and `cancel_complete`.
///
/// A cancel acknowledgement may be successful and still carry the reason the
/// producer's cancel hook failed with.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub success: bool,
    pub reason: Option<Reason>,
}

impl Completion {
    pub fn ok() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn failed(reason: Reason) -> Self {
        Self {
            success: false,
            reason: Some(reason),
        }
    }

    /// Successful acknowledgement that still reports a hook failure.
    pub fn acknowledged(hook_failure: Option<Reason>) -> Self {
        Self {
            success: true,
            reason: hook_failure,
        }
    }

    pub fn into_result(self) -> Result<(), Reason> {
        if self.success {
            return Ok(());
        }
        Err(self
            .reason
            .unwrap_or_else(|| Reason::unknown("peer reported failure without a reason", "")))
    }
}

impl From<Result<(), Reason>> for Completion {
    fn from(result: Result<(), Reason>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(reason) => Self::failed(reason),
        }
    }
}

/// One step of a stream's lifecycle, addressed by `streamId`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSignal {
    StartComplete(Completion),
    Pull { desired_size: i64 },
    PullComplete(Completion),
    Enqueue { chunk: Value },
    Close,
    Error { reason: Reason },
    Cancel { reason: Reason },
    CancelComplete(Completion),
}

impl StreamSignal {
    pub fn kind(&self) -> StreamKind {
        match self {
            Self::StartComplete(_) => StreamKind::StartComplete,
            Self::Pull { .. } => StreamKind::Pull,
            Self::PullComplete(_) => StreamKind::PullComplete,
            Self::Enqueue { .. } => StreamKind::Enqueue,
            Self::Close => StreamKind::Close,
            Self::Error { .. } => StreamKind::Error,
            Self::Cancel { .. } => StreamKind::Cancel,
            Self::CancelComplete(_) => StreamKind::CancelComplete,
        }
    }
}

/// What the sender of an Action frame expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Fire-and-forget.
    Notify,
    /// Exactly one Reply with the same id.
    Call { callback_id: u64 },
    /// A stream; `desired_size` is the consumer's high-water mark.
    Stream { stream_id: u64, desired_size: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionFrame {
    pub action: String,
    pub data: Value,
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    Action(ActionFrame),
    Reply {
        callback_id: u64,
        result: Result<Value, Reason>,
    },
    Stream {
        stream_id: u64,
        signal: StreamSignal,
    },
}

/// One message on the port: an addressed [`FrameBody`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFrame", into = "RawFrame")]
pub struct Frame {
    pub source_name: String,
    pub target_name: String,
    pub body: FrameBody,
}

impl Frame {
    pub fn new(
        source_name: impl Into<String>,
        target_name: impl Into<String>,
        body: FrameBody,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            target_name: target_name.into(),
            body,
        }
    }

    pub fn action(
        source_name: &str,
        target_name: &str,
        action: impl Into<String>,
        data: Value,
        kind: ActionKind,
    ) -> Self {
        Self::new(
            source_name,
            target_name,
            FrameBody::Action(ActionFrame {
                action: action.into(),
                data,
                kind,
            }),
        )
    }

    pub fn reply(
        source_name: &str,
        target_name: &str,
        callback_id: u64,
        result: Result<Value, Reason>,
    ) -> Self {
        Self::new(
            source_name,
            target_name,
            FrameBody::Reply {
                callback_id,
                result,
            },
        )
    }

    pub fn stream(
        source_name: &str,
        target_name: &str,
        stream_id: u64,
        signal: StreamSignal,
    ) -> Self {
        Self::new(
            source_name,
            target_name,
            FrameBody::Stream { stream_id, signal },
        )
    }
}

/// Flat serialized shape shared by every frame kind.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFrame {
    source_name: String,
    target_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    callback_id: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_reply: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<Reason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stream: Option<StreamKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stream_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chunk: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<Reason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    desired_size: Option<i64>,
}

fn completion(success: Option<bool>, reason: Option<Reason>) -> Completion {
    Completion {
        success: success.unwrap_or(false),
        reason,
    }
}

fn malformed(msg: impl Into<String>) -> WireError {
    WireError::MalformedFrame(msg.into())
}

impl TryFrom<RawFrame> for Frame {
    type Error = WireError;

    fn try_from(raw: RawFrame) -> Result<Self, Self::Error> {
        let body = if let Some(kind) = raw.stream {
            let stream_id = raw
                .stream_id
                .ok_or_else(|| malformed(format!("{} frame without streamId", kind.as_str())))?;
            let signal = match kind {
                StreamKind::Start => {
                    let action = raw
                        .action
                        .ok_or_else(|| malformed("start frame without action"))?;
                    return Ok(Frame::action(
                        &raw.source_name,
                        &raw.target_name,
                        action,
                        raw.data.unwrap_or(Value::Null),
                        ActionKind::Stream {
                            stream_id,
                            desired_size: raw.desired_size.unwrap_or(0),
                        },
                    ));
                }
                StreamKind::StartComplete => StreamSignal::StartComplete(completion(raw.success, raw.reason)),
                StreamKind::Pull => StreamSignal::Pull {
                    desired_size: raw
                        .desired_size
                        .ok_or_else(|| malformed("pull frame without desiredSize"))?,
                },
                StreamKind::PullComplete => StreamSignal::PullComplete(completion(raw.success, raw.reason)),
                StreamKind::Enqueue => StreamSignal::Enqueue {
                    chunk: raw.chunk.unwrap_or(Value::Null),
                },
                StreamKind::Close => StreamSignal::Close,
                StreamKind::Error => StreamSignal::Error {
                    reason: raw
                        .reason
                        .ok_or_else(|| malformed("error frame without reason"))?,
                },
                StreamKind::Cancel => StreamSignal::Cancel {
                    reason: raw
                        .reason
                        .ok_or_else(|| malformed("cancel frame without reason"))?,
                },
                StreamKind::CancelComplete => StreamSignal::CancelComplete(completion(raw.success, raw.reason)),
            };
            FrameBody::Stream { stream_id, signal }
        } else if raw.is_reply {
            let callback_id = raw
                .callback_id
                .ok_or_else(|| malformed("reply frame without callbackId"))?;
            let result = match raw.error {
                Some(reason) => Err(reason),
                None => Ok(raw.data.unwrap_or(Value::Null)),
            };
            FrameBody::Reply {
                callback_id,
                result,
            }
        } else {
            let action = raw
                .action
                .ok_or_else(|| malformed("frame is neither action, reply nor stream control"))?;
            let kind = match (raw.callback_id, raw.stream_id) {
                (Some(callback_id), _) => ActionKind::Call { callback_id },
                (None, Some(stream_id)) => ActionKind::Stream {
                    stream_id,
                    desired_size: raw.desired_size.unwrap_or(0),
                },
                (None, None) => ActionKind::Notify,
            };
            FrameBody::Action(ActionFrame {
                action,
                data: raw.data.unwrap_or(Value::Null),
                kind,
            })
        };

        Ok(Frame {
            source_name: raw.source_name,
            target_name: raw.target_name,
            body,
        })
    }
}

impl From<Frame> for RawFrame {
    fn from(frame: Frame) -> Self {
        let mut raw = RawFrame {
            source_name: frame.source_name,
            target_name: frame.target_name,
            ..RawFrame::default()
        };
        match frame.body {
            FrameBody::Action(ActionFrame { action, data, kind }) => {
                raw.action = Some(action);
                raw.data = Some(data);
                match kind {
                    ActionKind::Notify => {}
                    ActionKind::Call { callback_id } => raw.callback_id = Some(callback_id),
                    ActionKind::Stream {
                        stream_id,
                        desired_size,
                    } => {
                        raw.stream_id = Some(stream_id);
                        raw.desired_size = Some(desired_size);
                    }
                }
            }
            FrameBody::Reply {
                callback_id,
                result,
            } => {
                raw.is_reply = true;
                raw.callback_id = Some(callback_id);
                match result {
                    Ok(data) => raw.data = Some(data),
                    Err(reason) => raw.error = Some(reason),
                }
            }
            FrameBody::Stream { stream_id, signal } => {
                raw.stream = Some(signal.kind());
                raw.stream_id = Some(stream_id);
                match signal {
                    StreamSignal::StartComplete(done)
                    | StreamSignal::PullComplete(done)
                    | StreamSignal::CancelComplete(done) => {
                        raw.success = Some(done.success);
                        raw.reason = done.reason;
                    }
                    StreamSignal::Pull { desired_size } => raw.desired_size = Some(desired_size),
                    StreamSignal::Enqueue { chunk } => raw.chunk = Some(chunk),
                    StreamSignal::Close => {}
                    StreamSignal::Error { reason } | StreamSignal::Cancel { reason } => {
                        raw.reason = Some(reason)
                    }
                }
            }
        }
        raw
    }
}
