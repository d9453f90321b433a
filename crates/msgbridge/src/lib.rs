//! Named-action RPC and flow-controlled streams between two message endpoints.
//!
//! Two peers share a port and exchange small self-describing frames:
//! notifications, calls correlated with their replies, and streams whose
//! producer is paced by credit granted from the consumer.
//!
//! # Crate Structure
//!
//! - [`transport`]: the port abstraction and an in-process loopback port
//! - [`wire`]: frame schema, failure reasons and byte-stream framing
//! - [`handler`]: the message handler, stream sinks and readers (behind the
//!   `handler` feature)

/// Re-export transport types.
pub mod transport {
    pub use msgbridge_transport::*;
}

/// Re-export wire types.
pub mod wire {
    pub use msgbridge_wire::*;
}

/// Re-export handler types (requires `handler` feature).
#[cfg(feature = "handler")]
pub mod handler {
    pub use msgbridge_handler::*;
}
