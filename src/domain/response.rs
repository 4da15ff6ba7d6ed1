use super::event::{Message, Metadata};
use serde::{Deserialize, Serialize};

/// Status attached to synthesized failure records when a batch request could
/// not be completed.
pub const TRANSFORMER_REQUEST_FAILURE: i32 = 909;

/// Status attached to synthesized failure records when a batch request timed out.
pub const TRANSFORMER_REQUEST_TIMEOUT: i32 = 919;

/// Per-event result returned by the transformation service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformerResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub output: Message,
    #[serde(default)]
    pub metadata: Metadata,
    pub status_code: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl TransformerResponse {
    /// Status codes below 400 are successes.
    pub fn is_success(&self) -> bool {
        self.status_code < 400
    }

    /// Failure record for an event whose batch never got a usable response.
    pub fn synthesized_failure(metadata: Metadata, status_code: i32, error: String) -> Self {
        Self {
            output: Message::new(),
            metadata,
            status_code,
            error,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Message, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Message>::deserialize(deserializer)?.unwrap_or_default())
}

/// Aggregate result of one transform call, partitioned by status code.
///
/// Ordering inside either list carries no meaning; only membership does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub events: Vec<TransformerResponse>,
    pub failed_events: Vec<TransformerResponse>,
}

impl Response {
    pub fn len(&self) -> usize {
        self.events.len() + self.failed_events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends another partial result.
    pub fn merge(&mut self, other: Response) {
        self.events.extend(other.events);
        self.failed_events.extend(other.failed_events);
    }
}
