use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque event payload. Keys are kept in sorted order.
pub type Message = Map<String, Value>;

/// Pass-through correlation data attached to every event.
///
/// The transformer never interprets these fields; it only forwards them to the
/// service and matches them back on the response side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_category: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transformation_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transformation_version_id: String,
    /// Any JSON value. `null` and an absent key are the same and never serialized.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub record_id: Value,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub received_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub job_id: i64,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationDefinition {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "DisplayName", default)]
    pub display_name: String,
}

/// A user transformation attached to a destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "VersionID", default)]
    pub version_id: String,
}

/// Already-resolved destination descriptor, produced upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "DestinationDefinition", default)]
    pub destination_definition: DestinationDefinition,
    #[serde(rename = "Config", default)]
    pub config: Map<String, Value>,
    #[serde(rename = "Enabled", default)]
    pub enabled: bool,
    #[serde(rename = "WorkspaceID", default)]
    pub workspace_id: String,
    #[serde(rename = "Transformations", default)]
    pub transformations: Vec<Transformation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub is_secret: bool,
}

/// One event record bound for a destination, as sent to the transformation service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformerEvent {
    #[serde(default)]
    pub message: Message,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub destination: Destination,
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

impl TransformerEvent {
    /// Destination type name used for endpoint resolution.
    pub fn destination_type(&self) -> &str {
        &self.destination.destination_definition.name
    }
}
