//! Frame schema, reason codec and length-prefixed framing for msgbridge.
//!
//! Three kinds of frame cross the port:
//! - Action frames invoke a named handler on the peer (notification, call or
//!   stream start)
//! - Reply frames settle a call, correlated by `callbackId`
//! - Stream control frames drive one flow-controlled stream, keyed by `streamId`
//!
//! Field names on the wire are fixed (`sourceName`, `targetName`, `action`,
//! `data`, `callbackId`, `isReply`, `stream`, `streamId`, `chunk`, `success`,
//! `reason`, `desiredSize`) so existing peers interoperate.

pub mod codec;
pub mod error;
pub mod frame;
pub mod framed;
pub mod reason;

pub use codec::{
    decode_frame, encode_frame, encode_payload, FrameCodec, FrameConfig, DEFAULT_MAX_PAYLOAD,
    HEADER_SIZE,
};
pub use error::{Result, WireError};
pub use frame::{ActionFrame, ActionKind, Completion, Frame, FrameBody, StreamKind, StreamSignal};
pub use framed::FramedPort;
pub use reason::{BoxError, Reason};
