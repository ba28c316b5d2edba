//! Transport port — how the client reaches the hub.
//!
//! The reconnect state machine is transport-agnostic: anything that can
//! open a connection and yield wire lines works, which also keeps the
//! state machine testable without a network.

use async_trait::async_trait;

use crate::error::ClientError;

/// An established event-stream connection.
#[async_trait]
pub trait EventStream: Send {
    /// Next wire line, without its trailing newline. `Ok(None)` means the
    /// server closed the stream cleanly.
    ///
    /// # Errors
    ///
    /// [`ClientError::Stream`] when the connection breaks mid-read.
    async fn next_line(&mut self) -> Result<Option<String>, ClientError>;
}

/// Opens event-stream connections to the hub.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a fresh connection.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connect`] when the hub cannot be reached.
    async fn connect(&self) -> Result<Box<dyn EventStream>, ClientError>;
}
