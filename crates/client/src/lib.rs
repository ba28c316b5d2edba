//! Client-side consumption of the hub's event stream.
//!
//! [`ReconnectingClient`] wraps a [`StreamTransport`] in a reconnect state
//! machine: exponential backoff with jitter between connection attempts, a
//! bounded number of consecutive failures before giving up, and immediate
//! teardown on disposal. The wire format is server-sent events; see
//! [`wire`] for the frame parser.

pub mod backoff;
pub mod client;
pub mod error;
pub mod transport;
pub mod wire;

pub use backoff::BackoffPolicy;
pub use client::{ConnectionState, ReconnectingClient};
pub use error::ClientError;
pub use transport::{EventStream, StreamTransport};
