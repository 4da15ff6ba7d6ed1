#![allow(dead_code)]

use dest_transformer::domain::{
    Credential, Destination, DestinationDefinition, Metadata, TransformerEvent,
};
use dest_transformer::sender::serialization::{
    COMPACTED_CONTENT_FORMAT, CONTENT_FORMAT_HEADER, CompactedTransformRequest,
};
use dest_transformer::{RetryConfig, TransformerConfig};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::{Request, Respond, ResponseTemplate};

/// In-process stand-in for the transformation service.
///
/// Echoes every event back with `echo-key-1` copied from `src-key-1`. A
/// `forceStatusCode` field in the message sets that record's status.
#[derive(Clone)]
pub struct FakeTransformer {
    attempts: Arc<AtomicUsize>,
    failing_attempts: usize,
    failing_status: u16,
    api_version: Option<String>,
    delay: Option<Duration>,
    drop_last: bool,
    malformed: bool,
}

impl Default for FakeTransformer {
    fn default() -> Self {
        Self {
            attempts: Arc::new(AtomicUsize::new(0)),
            failing_attempts: 0,
            failing_status: 200,
            api_version: Some("2".into()),
            delay: None,
            drop_last: false,
            malformed: false,
        }
    }
}

impl FakeTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers the first `attempts` requests with `status` and an empty body.
    pub fn failing(mut self, attempts: usize, status: u16) -> Self {
        self.failing_attempts = attempts;
        self.failing_status = status;
        self
    }

    pub fn always_failing(self, status: u16) -> Self {
        self.failing(usize::MAX, status)
    }

    pub fn api_version(mut self, version: Option<&str>) -> Self {
        self.api_version = version.map(str::to_string);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn drop_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    pub fn malformed(mut self) -> Self {
        self.malformed = true;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn decode(request: &Request) -> Vec<TransformerEvent> {
        let compacted = request
            .headers
            .get(CONTENT_FORMAT_HEADER)
            .and_then(|value| value.to_str().ok())
            == Some(COMPACTED_CONTENT_FORMAT);

        if compacted {
            let body: CompactedTransformRequest = serde_json::from_slice(&request.body).unwrap();
            body.into_transformer_events().unwrap()
        } else {
            serde_json::from_slice(&request.body).unwrap()
        }
    }
}

impl Respond for FakeTransformer {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        let mut template = if attempt < self.failing_attempts {
            ResponseTemplate::new(self.failing_status)
        } else if self.malformed {
            ResponseTemplate::new(200).set_body_string("not json")
        } else {
            let mut records: Vec<Value> = Self::decode(request)
                .into_iter()
                .map(|event| {
                    let mut output = event.message.clone();
                    if let Some(value) = event.message.get("src-key-1") {
                        output.insert("echo-key-1".into(), value.clone());
                    }
                    let status = output
                        .remove("forceStatusCode")
                        .and_then(|v| v.as_i64())
                        .unwrap_or(200);
                    let error = if status >= 400 { "error" } else { "" };
                    json!({
                        "output": output,
                        "metadata": event.metadata,
                        "statusCode": status,
                        "error": error,
                    })
                })
                .collect();
            if self.drop_last {
                records.pop();
            }
            ResponseTemplate::new(200).set_body_json(records)
        };

        if let Some(version) = &self.api_version {
            template = template.insert_header("apiVersion", version.as_str());
        }
        if let Some(delay) = self.delay {
            template = template.set_delay(delay);
        }
        template
    }
}

pub fn test_config(base_url: &str) -> TransformerConfig {
    TransformerConfig {
        dest_transform_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
        batch_size: 10,
        retry: RetryConfig {
            max_retry: 3,
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            jitter: false,
        },
        ..Default::default()
    }
}

pub fn event(index: usize, destination_type: &str) -> TransformerEvent {
    let mut message = serde_json::Map::new();
    message.insert("src-key-1".into(), json!(format!("msg-{index}")));

    TransformerEvent {
        message,
        metadata: Metadata {
            message_id: format!("messageID-{index}"),
            source_id: "sourceID".into(),
            source_type: "sourceType".into(),
            destination_id: "destinationID".into(),
            destination_type: destination_type.into(),
            workspace_id: "workspaceID".into(),
            job_id: index as i64 + 1,
            ..Default::default()
        },
        destination: Destination {
            id: "destinationID".into(),
            name: "destination".into(),
            workspace_id: "workspaceID".into(),
            destination_definition: DestinationDefinition {
                id: "definitionID".into(),
                name: destination_type.into(),
                display_name: destination_type.into(),
            },
            enabled: true,
            ..Default::default()
        },
        credentials: vec![Credential {
            id: "credentialID".into(),
            key: "api_key".into(),
            value: "secret".into(),
            is_secret: true,
        }],
    }
}

pub fn events(n: usize, destination_type: &str) -> Vec<TransformerEvent> {
    (0..n).map(|i| event(i, destination_type)).collect()
}

/// Forces status 400 on every `every`-th event, starting with the first.
pub fn with_failures(mut events: Vec<TransformerEvent>, every: usize) -> Vec<TransformerEvent> {
    for event in events.iter_mut().step_by(every) {
        event.message.insert("forceStatusCode".into(), json!(400));
    }
    events
}
