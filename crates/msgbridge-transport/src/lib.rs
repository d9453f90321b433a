//! Channel abstraction for msgbridge.
//!
//! A [`Port`] delivers discrete messages in order, per direction, with no
//! shared memory and no synchronous round trips. Posting is synchronous and
//! may fail locally; delivery is observed through a [`Subscription`].
//!
//! This is the lowest layer of msgbridge. The wire crate provides a byte-stream
//! backed port; [`LoopbackPort`] connects peers living in one process.

pub mod error;
pub mod loopback;
pub mod traits;

pub use error::{Result, TransportError};
pub use loopback::LoopbackPort;
pub use traits::{Port, Subscription};
