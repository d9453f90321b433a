//! Named-action RPC and flow-controlled streams over a message port.
//!
//! A [`MessageHandler`] sits on one end of a [`Port`](msgbridge_transport::Port)
//! and offers three ways to reach the peer:
//!
//! - [`send`](MessageHandler::send): fire-and-forget notification
//! - [`send_with_promise`](MessageHandler::send_with_promise): call with one reply
//! - [`send_with_stream`](MessageHandler::send_with_stream): a stream of chunks
//!   with credit-based backpressure
//!
//! The peer answers through actions registered with [`MessageHandler::on`] and
//! [`MessageHandler::on_stream`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use msgbridge_handler::{MessageHandler, QueueingStrategy};
//! use msgbridge_transport::LoopbackPort;
//! use msgbridge_wire::{BoxError, Frame};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let port = Arc::new(LoopbackPort::<Frame>::new());
//! let main = MessageHandler::new("main", "worker", port.clone())?;
//! let worker = MessageHandler::new("worker", "main", port)?;
//!
//! worker.on("Echo", |data| async move { Ok::<_, BoxError>(data) })?;
//! worker.on_stream("Count", |_data, sink| async move {
//!     for n in 0..3 {
//!         sink.enqueue(n)?;
//!     }
//!     sink.close()?;
//!     Ok::<_, BoxError>(())
//! })?;
//!
//! let echoed = main.send_with_promise("Echo", json!({"hello": "world"})).await?;
//! assert_eq!(echoed, json!({"hello": "world"}));
//!
//! let mut numbers = main.send_with_stream("Count", (), QueueingStrategy::count(8));
//! while let Some(n) = numbers.read().await? {
//!     println!("{n}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handler;
mod outbox;
pub mod readable;
pub mod sink;
pub mod strategy;

pub use error::{HandlerError, ProtocolViolation, Result};
pub use handler::{MessageHandler, ReplyFuture};
pub use readable::ReadableStream;
pub use sink::StreamSink;
pub use strategy::{QueueingStrategy, SizeFn};
