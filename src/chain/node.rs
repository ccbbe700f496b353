//! Connection handle to a Substrate node.
//!
//! Connects over websocket RPC through `subxt`, then exposes the events of
//! every new best block as a stream of decoded `EventBatch`es. No
//! reconnection: when the underlying subscription ends, the stream ends.

use crate::chain::types::{section_name, EventBatch, EventField, EventRecord, Phase};
use crate::chain::ChainError;

use futures::stream::BoxStream;
use futures::StreamExt;
use std::time::Duration;
use subxt::events::{EventDetails, Events};
use subxt::{OnlineClient, PolkadotConfig};
use tracing::{debug, info};

/// Rendered in place of a field type the metadata leaves unnamed.
pub const UNKNOWN_TYPE: &str = "Unknown";

/// A ready session to a node. Cheap to clone.
#[derive(Clone)]
pub struct NodeClient {
    url: String,
    api: OnlineClient<PolkadotConfig>,
}

impl NodeClient {
    /// Open the websocket and wait until the client has fetched metadata.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, ChainError> {
        info!(url = %url, timeout_secs = timeout.as_secs(), "connecting to substrate node");

        let api = match tokio::time::timeout(timeout, OnlineClient::<PolkadotConfig>::from_url(url)).await {
            Ok(Ok(api)) => api,
            Ok(Err(source)) => {
                return Err(ChainError::Connection {
                    url: url.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(ChainError::ConnectTimeout {
                    url: url.to_string(),
                    timeout,
                })
            }
        };

        info!(url = %url, genesis = ?api.genesis_hash(), "substrate node ready");

        Ok(Self {
            url: url.to_string(),
            api,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subscribe to system events. Each item holds every event of one new
    /// best block.
    pub async fn subscribe_events(
        &self,
    ) -> Result<BoxStream<'static, Result<EventBatch, ChainError>>, ChainError> {
        let blocks = self
            .api
            .blocks()
            .subscribe_best()
            .await
            .map_err(ChainError::Subscription)?;

        info!(url = %self.url, "subscribed to system events");

        let batches = blocks
            .then(|block| async move {
                let block = block.map_err(ChainError::Stream)?;
                debug!(block = block.number(), hash = ?block.hash(), "new best block");
                let events = block.events().await.map_err(ChainError::Stream)?;
                decode_batch(&events)
            })
            .boxed();

        Ok(batches)
    }
}

fn decode_batch(events: &Events<PolkadotConfig>) -> Result<EventBatch, ChainError> {
    events
        .iter()
        .map(|event| {
            let event = event.map_err(decode_error)?;
            decode_event(&event)
        })
        .collect()
}

fn decode_event(event: &EventDetails<PolkadotConfig>) -> Result<EventRecord, ChainError> {
    let type_names: Vec<String> = event
        .event_metadata()
        .variant
        .fields
        .iter()
        .map(|field| {
            field
                .type_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_TYPE.to_string())
        })
        .collect();

    let values = event.field_values().map_err(decode_error)?;
    let fields = values
        .values()
        .enumerate()
        .map(|(index, value)| EventField {
            type_name: type_names
                .get(index)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_TYPE.to_string()),
            value: value.to_string(),
        })
        .collect();

    Ok(EventRecord {
        section: section_name(event.pallet_name()),
        method: event.variant_name().to_string(),
        phase: event.phase().into(),
        fields,
    })
}

fn decode_error(err: subxt::ext::subxt_core::Error) -> ChainError {
    ChainError::Decode(err.into())
}

impl From<subxt::events::Phase> for Phase {
    fn from(phase: subxt::events::Phase) -> Self {
        match phase {
            subxt::events::Phase::ApplyExtrinsic(index) => Phase::ApplyExtrinsic(index),
            subxt::events::Phase::Finalization => Phase::Finalization,
            subxt::events::Phase::Initialization => Phase::Initialization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_from_subxt() {
        assert_eq!(
            Phase::from(subxt::events::Phase::ApplyExtrinsic(7)),
            Phase::ApplyExtrinsic(7)
        );
        assert_eq!(Phase::from(subxt::events::Phase::Finalization), Phase::Finalization);
        assert_eq!(Phase::from(subxt::events::Phase::Initialization), Phase::Initialization);
    }

    #[test]
    fn test_decode_error_mapping() {
        let core = subxt::ext::subxt_core::Error::Codec(subxt::ext::codec::Error::from("truncated event"));
        let err = decode_error(core);
        assert!(matches!(err, ChainError::Decode(_)));
        assert!(err.to_string().starts_with("failed to decode event"));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Nothing listens on port 1.
        let result = NodeClient::connect("ws://127.0.0.1:1", Duration::from_secs(10)).await;
        assert!(matches!(
            result,
            Err(ChainError::Connection { .. }) | Err(ChainError::ConnectTimeout { .. })
        ));
    }
}
