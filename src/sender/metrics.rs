use super::endpoint::get_endpoint_from_url;
use crate::domain::TransformerEvent;
use crate::reliability::metrics::Tags;

pub const STAGE_DEST_TRANSFORMER: &str = "dest_transformer";

pub const REQUEST_TIME: &str = "processor_transformer_request_time";
pub const REQUEST_TOTAL_BYTES: &str = "transformer_client_request_total_bytes";
pub const RESPONSE_TOTAL_BYTES: &str = "transformer_client_response_total_bytes";
pub const REQUEST_TOTAL_EVENTS: &str = "transformer_client_request_total_events";
pub const RESPONSE_TOTAL_EVENTS: &str = "transformer_client_response_total_events";
pub const TOTAL_DURATIONS: &str = "transformer_client_total_durations_seconds";
pub const REQUEST_ATTEMPTS: &str = "transformer_client_request_attempts";

/// Tag set shared by every measurement of one transform call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformerMetricLabels {
    pub endpoint: String,
    pub stage: String,
    pub source_id: String,
    pub source_type: String,
    pub destination_type: String,
    pub destination_id: String,
    pub workspace_id: String,
    pub language: String,
    pub transformation_id: String,
    pub mirroring: bool,
}

impl TransformerMetricLabels {
    /// Labels for a call, taken from its first event.
    pub fn for_call(base_url: &str, first: &TransformerEvent) -> Self {
        Self {
            endpoint: get_endpoint_from_url(base_url),
            stage: STAGE_DEST_TRANSFORMER.to_string(),
            source_id: first.metadata.source_id.clone(),
            source_type: first.metadata.source_type.clone(),
            destination_type: first.destination.destination_definition.name.clone(),
            destination_id: first.destination.id.clone(),
            workspace_id: first.metadata.workspace_id.clone(),
            ..Default::default()
        }
    }

    pub fn to_stats_tags(&self) -> Tags {
        [
            ("endpoint", self.endpoint.as_str()),
            ("stage", self.stage.as_str()),
            ("sourceId", self.source_id.as_str()),
            ("sourceType", self.source_type.as_str()),
            ("destinationType", self.destination_type.as_str()),
            ("destinationId", self.destination_id.as_str()),
            ("workspaceId", self.workspace_id.as_str()),
            ("language", self.language.as_str()),
            ("transformationId", self.transformation_id.as_str()),
            ("mirroring", if self.mirroring { "true" } else { "false" }),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Tags for the per-request timer, which still carries the old names.
    pub fn to_request_time_tags(&self) -> Tags {
        let mut tags = self.to_stats_tags();
        // legacy
        tags.insert("dest_type".into(), self.destination_type.clone());
        tags.insert("dest_id".into(), self.destination_id.clone());
        tags.insert("src_id".into(), self.source_id.clone());
        tags
    }
}
