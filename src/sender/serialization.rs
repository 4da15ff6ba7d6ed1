use crate::domain::{Credential, Destination, Message, Metadata, TransformerEvent, TransformerResponse};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Header announcing a non-default request body format.
pub const CONTENT_FORMAT_HEADER: &str = "X-Content-Format";
/// Value of [`CONTENT_FORMAT_HEADER`] for compacted bodies.
pub const COMPACTED_CONTENT_FORMAT: &str = "json+compactedv1";

const ESTIMATED_EVENT_SIZE: usize = 512; // bytes per event
const MAX_PREALLOCATION: usize = 16 * 1024 * 1024; // 16MB

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("metadata did not serialize to an object")]
    MetadataShape,
    #[error("compacted request references unknown {kind} key {key:?}")]
    UnknownKey { kind: &'static str, key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SerializationFormat {
    /// JSON array of full event records.
    JsonArray,
    /// Shared metadata, destinations and credentials factored out.
    Compacted,
}

/// One event in a compacted request.
///
/// `metadata` only holds the fields that differ from the request's common metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactedTransformerEvent {
    #[serde(default)]
    pub message: Message,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub destination_key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credential_keys: Vec<String>,
}

/// Body sent with `X-Content-Format: json+compactedv1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactedTransformRequest {
    pub input: Vec<CompactedTransformerEvent>,
    #[serde(default)]
    pub common_metadata: Map<String, Value>,
    #[serde(default)]
    pub destinations: BTreeMap<String, Destination>,
    #[serde(default)]
    pub credentials: BTreeMap<String, Credential>,
}

impl CompactedTransformRequest {
    pub fn from_events(events: &[TransformerEvent]) -> Result<Self, SerializationError> {
        let metadata = events
            .iter()
            .map(|event| metadata_object(&event.metadata))
            .collect::<Result<Vec<_>, _>>()?;
        let common_metadata = common_fields(&metadata);

        let mut destinations = Interner::default();
        let mut credentials = Interner::default();
        let input = events
            .iter()
            .zip(metadata)
            .map(|(event, mut fields)| {
                fields.retain(|key, _| !common_metadata.contains_key(key));
                CompactedTransformerEvent {
                    message: event.message.clone(),
                    metadata: fields,
                    destination_key: destinations.intern(&event.destination.id, &event.destination),
                    credential_keys: event
                        .credentials
                        .iter()
                        .map(|credential| credentials.intern(&credential.id, credential))
                        .collect(),
                }
            })
            .collect();

        Ok(Self {
            input,
            common_metadata,
            destinations: destinations.into_owned(),
            credentials: credentials.into_owned(),
        })
    }

    /// Rebuilds the full event array this request was compacted from.
    pub fn into_transformer_events(self) -> Result<Vec<TransformerEvent>, SerializationError> {
        let Self {
            input,
            common_metadata,
            destinations,
            credentials,
        } = self;

        input
            .into_iter()
            .map(|event| {
                let mut fields = common_metadata.clone();
                fields.extend(event.metadata);
                let metadata: Metadata = serde_json::from_value(Value::Object(fields))?;

                let destination = destinations
                    .get(&event.destination_key)
                    .cloned()
                    .ok_or_else(|| SerializationError::UnknownKey {
                        kind: "destination",
                        key: event.destination_key.clone(),
                    })?;

                let credentials = event
                    .credential_keys
                    .iter()
                    .map(|key| {
                        credentials.get(key).cloned().ok_or_else(|| {
                            SerializationError::UnknownKey {
                                kind: "credential",
                                key: key.clone(),
                            }
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(TransformerEvent {
                    message: event.message,
                    metadata,
                    destination,
                    credentials,
                })
            })
            .collect()
    }
}

fn metadata_object(metadata: &Metadata) -> Result<Map<String, Value>, SerializationError> {
    match serde_json::to_value(metadata)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(SerializationError::MetadataShape),
    }
}

/// Fields present with an identical value in every object.
fn common_fields(objects: &[Map<String, Value>]) -> Map<String, Value> {
    let Some((first, rest)) = objects.split_first() else {
        return Map::new();
    };
    let mut common = first.clone();
    for object in rest {
        common.retain(|key, value| object.get(key) == Some(value));
        if common.is_empty() {
            break;
        }
    }
    common
}

/// Assigns stable keys to shared values, preferring their own id.
///
/// Two different values with the same id get suffixed keys.
struct Interner<'a, T> {
    entries: BTreeMap<String, &'a T>,
}

impl<T> Default for Interner<'_, T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<'a, T: PartialEq + Clone> Interner<'a, T> {
    fn intern(&mut self, id: &str, value: &'a T) -> String {
        let base = if id.is_empty() { "_" } else { id };
        let mut key = base.to_string();
        let mut suffix = 1;
        loop {
            match self.entries.get(&key) {
                None => {
                    self.entries.insert(key.clone(), value);
                    return key;
                }
                Some(existing) if *existing == value => return key,
                Some(_) => {
                    key = format!("{base}#{suffix}");
                    suffix += 1;
                }
            }
        }
    }

    fn into_owned(self) -> BTreeMap<String, T> {
        self.entries
            .into_iter()
            .map(|(key, value)| (key, value.clone()))
            .collect()
    }
}

/// Encodes batches into request bodies.
#[derive(Debug, Clone, Copy)]
pub struct BatchSerializer {
    format: SerializationFormat,
}

impl BatchSerializer {
    pub fn new(format: SerializationFormat) -> Self {
        Self { format }
    }

    pub fn from_compaction(compaction_enabled: bool) -> Self {
        if compaction_enabled {
            Self::new(SerializationFormat::Compacted)
        } else {
            Self::new(SerializationFormat::JsonArray)
        }
    }

    /// Extra header the receiving service needs to pick the right decoder.
    pub fn content_format_header(&self) -> Option<(&'static str, &'static str)> {
        match self.format {
            SerializationFormat::JsonArray => None,
            SerializationFormat::Compacted => Some((CONTENT_FORMAT_HEADER, COMPACTED_CONTENT_FORMAT)),
        }
    }

    pub fn serialize(&self, events: &[TransformerEvent]) -> Result<Bytes, SerializationError> {
        let mut buffer = Vec::with_capacity(self.estimate_serialized_size(events.len()));
        match self.format {
            SerializationFormat::JsonArray => serde_json::to_writer(&mut buffer, events)?,
            SerializationFormat::Compacted => {
                let request = CompactedTransformRequest::from_events(events)?;
                serde_json::to_writer(&mut buffer, &request)?
            }
        }
        Ok(Bytes::from(buffer))
    }

    pub fn estimate_serialized_size(&self, events: usize) -> usize {
        events
            .saturating_mul(ESTIMATED_EVENT_SIZE)
            .min(MAX_PREALLOCATION)
    }
}

impl Default for BatchSerializer {
    fn default() -> Self {
        Self::new(SerializationFormat::JsonArray)
    }
}

/// Decodes the response array of a 2xx reply.
pub fn deserialize_responses(body: &[u8]) -> Result<Vec<TransformerResponse>, SerializationError> {
    Ok(serde_json::from_slice(body)?)
}
