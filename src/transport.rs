//! Delivery seam for queued crash events.
//!
//! The SDK does not ship events over the network itself. The main process
//! entry point hands each queued event to a [`Transport`] when it flushes;
//! an implementation might post to an HTTP endpoint or publish to a relay.

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::event::CrashEvent;

/// Errors a transport can report for a single event.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The backend refused the event; it stays queued for the next flush.
    #[error("Event rejected: {0}")]
    Rejected(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Sends one event to the backend.
pub trait Transport: Send + Sync {
    fn send<'a>(&'a self, event: &'a CrashEvent) -> BoxFuture<'a, Result<(), TransportError>>;
}
