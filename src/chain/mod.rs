//! Substrate node access.
//!
//! Wraps the `subxt` online client behind a small surface:
//! - `NodeClient`: the connection handle, created once and kept for the
//!   lifetime of the process
//! - `EventBatch` stream: one batch per new best block, each event decoded
//!   into a plain `EventRecord` with its section, method, phase and fields

pub mod node;
pub mod types;

pub use node::NodeClient;
pub use types::{EventBatch, EventField, EventRecord, Phase};

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("connection to {url} failed: {source}")]
    Connection {
        url: String,
        #[source]
        source: subxt::Error,
    },
    #[error("node at {url} not ready after {timeout:?}")]
    ConnectTimeout { url: String, timeout: Duration },
    #[error("event subscription failed: {0}")]
    Subscription(#[source] subxt::Error),
    #[error("event stream error: {0}")]
    Stream(#[source] subxt::Error),
    #[error("failed to decode event: {0}")]
    Decode(#[source] subxt::Error),
}
