use super::client::{ClientError, HttpTransport, TransportRequest, TransportResponse};
use super::metrics::{
    REQUEST_ATTEMPTS, REQUEST_TIME, REQUEST_TOTAL_BYTES, REQUEST_TOTAL_EVENTS,
    RESPONSE_TOTAL_BYTES, RESPONSE_TOTAL_EVENTS, STAGE_DEST_TRANSFORMER, TOTAL_DURATIONS,
    TransformerMetricLabels,
};
use super::serialization::{BatchSerializer, deserialize_responses};
use super::version::check_api_version;
use crate::app::config::TransformerConfig;
use crate::buffer::Batch;
use crate::domain::{
    FaultKind, TRANSFORMER_REQUEST_FAILURE, TRANSFORMER_REQUEST_TIMEOUT, TransformerError,
    TransformerResponse,
};
use crate::reliability::metrics::Stats;
use crate::reliability::retry::RetryPolicy;
use crate::reliability::watchdog::track_long_running_transformation;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why an attempt did not produce a usable reply.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttemptFailure {
    Status(u16),
    Timeout(String),
    Transport(String),
}

impl AttemptFailure {
    fn from_client_error(err: &ClientError) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// 429 and 5xx are worth another try; every other non-2xx status is final.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Per-call request context shared by every batch.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub url: String,
    pub labels: TransformerMetricLabels,
}

/// Drives one batch through send, retry and decode.
#[derive(Clone)]
pub struct BatchTransmitter {
    transport: Arc<dyn HttpTransport>,
    serializer: BatchSerializer,
    retry: RetryPolicy,
    stats: Arc<dyn Stats>,
    fail_on_error: bool,
    fail_on_user_transform_timeout: bool,
    long_running_threshold: Duration,
}

impl BatchTransmitter {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: &TransformerConfig,
        stats: Arc<dyn Stats>,
    ) -> Self {
        Self {
            transport,
            serializer: BatchSerializer::from_compaction(config.compaction_enabled),
            retry: RetryPolicy::new(&config.retry),
            stats,
            fail_on_error: config.fail_on_error,
            fail_on_user_transform_timeout: config.fail_on_user_transform_timeout,
            long_running_threshold: config.long_running_threshold,
        }
    }

    /// Sends `batch` and returns exactly one record per event in it.
    ///
    /// Records are either the service's replies or, when the failure policy
    /// allows it, synthesized failures. Everything else is an irrecoverable fault.
    pub async fn send_batch(
        &self,
        cancel: &CancellationToken,
        call: &CallContext,
        batch: &Batch,
    ) -> Result<Vec<TransformerResponse>, TransformerError> {
        let tags = call.labels.to_stats_tags();
        let start = Instant::now();

        let body = self
            .serializer
            .serialize(batch.events())
            .map_err(|e| self.fault(call, FaultKind::Encoding(e.to_string())))?;
        self.stats.count(REQUEST_TOTAL_BYTES, &tags, body.len() as u64);
        self.stats.count(REQUEST_TOTAL_EVENTS, &tags, batch.size() as u64);

        let mut request = TransportRequest::new(call.url.clone(), body);
        if let Some((name, value)) = self.serializer.content_format_header() {
            request = request.with_header(name, value);
        }

        let result = self.send_with_retry(cancel, call, batch, request).await;
        self.stats.timing(TOTAL_DURATIONS, &tags, start.elapsed());

        match result? {
            Ok(response) => self.decode(call, batch, response),
            Err(failure) => self.terminal_failure(call, batch, failure),
        }
    }

    /// Retry loop. The outer error is cancellation, the inner one the final failed attempt.
    async fn send_with_retry(
        &self,
        cancel: &CancellationToken,
        call: &CallContext,
        batch: &Batch,
        request: TransportRequest,
    ) -> Result<Result<TransportResponse, AttemptFailure>, TransformerError> {
        let request_time_tags = call.labels.to_request_time_tags();
        let tags = call.labels.to_stats_tags();
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(
                batch_id = %batch.id(),
                events = batch.size(),
                attempt = attempts,
                url = %call.url,
                "Sending batch to transformer"
            );

            let attempt_start = Instant::now();
            let result = self.attempt(cancel, request.clone()).await?;
            self.stats.timing(REQUEST_TIME, &request_time_tags, attempt_start.elapsed());
            self.stats.count(REQUEST_ATTEMPTS, &tags, 1);

            let failure = match result {
                Ok(response) if response.is_success() => return Ok(Ok(response)),
                Ok(response) if is_retryable_status(response.status) => {
                    AttemptFailure::Status(response.status)
                }
                Ok(response) => return Ok(Err(AttemptFailure::Status(response.status))),
                Err(ClientError::InvalidConfiguration(message)) => {
                    return Ok(Err(AttemptFailure::Transport(message)));
                }
                Err(err) => AttemptFailure::from_client_error(&err),
            };

            if self.retry.should_give_up(attempts) {
                warn!(
                    batch_id = %batch.id(),
                    attempts,
                    failure = ?failure,
                    "Transformer retries exhausted"
                );
                return Ok(Err(failure));
            }

            let delay = self.retry.calculate_delay(attempts - 1);
            warn!(
                batch_id = %batch.id(),
                attempt = attempts,
                failure = ?failure,
                "Transformer request failed, retrying in {:?}",
                delay
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransformerError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One HTTP exchange, watched for long runs and aborted on cancellation.
    async fn attempt(
        &self,
        cancel: &CancellationToken,
        request: TransportRequest,
    ) -> Result<Result<TransportResponse, ClientError>, TransformerError> {
        let watchdog = track_long_running_transformation(
            cancel.child_token(),
            STAGE_DEST_TRANSFORMER,
            self.long_running_threshold,
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransformerError::Cancelled),
            result = self.transport.execute(request) => Ok(result),
            // only finishes once the parent token is cancelled
            _ = watchdog => Err(TransformerError::Cancelled),
        }
    }

    fn decode(
        &self,
        call: &CallContext,
        batch: &Batch,
        response: TransportResponse,
    ) -> Result<Vec<TransformerResponse>, TransformerError> {
        check_api_version(&response).map_err(|kind| self.fault(call, kind))?;

        let mut records = deserialize_responses(&response.body)
            .map_err(|e| self.fault(call, FaultKind::MalformedResponse(e.to_string())))?;
        if records.len() != batch.size() {
            return Err(self.fault(
                call,
                FaultKind::ResponseCountMismatch {
                    expected: batch.size(),
                    actual: records.len(),
                },
            ));
        }

        let tags = call.labels.to_stats_tags();
        self.stats.count(RESPONSE_TOTAL_BYTES, &tags, response.body.len() as u64);
        self.stats.count(RESPONSE_TOTAL_EVENTS, &tags, records.len() as u64);

        for record in &mut records {
            if !record.is_success() && record.error.is_empty() {
                record.error = format!("transformer returned status code: {}", record.status_code);
            }
        }
        Ok(records)
    }

    fn terminal_failure(
        &self,
        call: &CallContext,
        batch: &Batch,
        failure: AttemptFailure,
    ) -> Result<Vec<TransformerResponse>, TransformerError> {
        let (status, error) = match failure {
            AttemptFailure::Timeout(detail) if self.fail_on_user_transform_timeout => (
                TRANSFORMER_REQUEST_TIMEOUT,
                format!("transformer request timed out: {detail}"),
            ),
            AttemptFailure::Timeout(detail) if self.fail_on_error => (
                TRANSFORMER_REQUEST_FAILURE,
                format!("transformer request failed: {detail}"),
            ),
            AttemptFailure::Timeout(detail) => {
                return Err(self.fault(call, FaultKind::TimedOut(detail)));
            }
            AttemptFailure::Status(code) if self.fail_on_error => (
                TRANSFORMER_REQUEST_FAILURE,
                format!("transformer request failed: transformer returned status code: {code}"),
            ),
            AttemptFailure::Status(code) => {
                return Err(self.fault(call, FaultKind::RequestFailed { status: code }));
            }
            AttemptFailure::Transport(detail) if self.fail_on_error => (
                TRANSFORMER_REQUEST_FAILURE,
                format!("transformer request failed: {detail}"),
            ),
            AttemptFailure::Transport(detail) => {
                return Err(self.fault(call, FaultKind::Transport(detail)));
            }
        };

        warn!(
            batch_id = %batch.id(),
            events = batch.size(),
            status,
            error = %error,
            "Marking batch as failed"
        );
        Ok(batch
            .events()
            .iter()
            .map(|event| {
                TransformerResponse::synthesized_failure(event.metadata.clone(), status, error.clone())
            })
            .collect())
    }

    fn fault(&self, call: &CallContext, kind: FaultKind) -> TransformerError {
        TransformerError::irrecoverable(STAGE_DEST_TRANSFORMER, call.url.clone(), kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::RetryConfig;
    use crate::domain::TransformerEvent;
    use crate::reliability::metrics::MemoryStats;
    use crate::sender::client::MockHttpTransport;
    use bytes::Bytes;
    use reqwest::header::{HeaderMap, HeaderValue};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(fail_on_error: bool, fail_on_timeout: bool) -> TransformerConfig {
        TransformerConfig {
            fail_on_error,
            fail_on_user_transform_timeout: fail_on_timeout,
            retry: RetryConfig {
                max_retry: 3,
                min_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
                jitter: false,
            },
            ..Default::default()
        }
    }

    fn batch(n: usize) -> Batch {
        let events = (0..n)
            .map(|i| {
                let mut event = TransformerEvent::default();
                event.metadata.message_id = format!("messageID-{i}");
                event
            })
            .collect();
        Batch::new(0, events)
    }

    fn call() -> CallContext {
        CallContext {
            url: "http://localhost:9090/v0/destinations/webhook".into(),
            labels: TransformerMetricLabels {
                stage: STAGE_DEST_TRANSFORMER.into(),
                ..Default::default()
            },
        }
    }

    fn reply(status: u16, version: Option<&'static str>, body: serde_json::Value) -> TransportResponse {
        let mut headers = HeaderMap::new();
        if let Some(version) = version {
            headers.insert("apiversion", HeaderValue::from_static(version));
        }
        TransportResponse {
            status,
            headers,
            body: Bytes::from(body.to_string()),
        }
    }

    fn ok_reply(n: usize) -> TransportResponse {
        let records: Vec<_> = (0..n)
            .map(|i| json!({"output": {}, "metadata": {"messageId": format!("messageID-{i}")}, "statusCode": 200}))
            .collect();
        reply(200, Some("2"), json!(records))
    }

    fn transmitter(mock: MockHttpTransport, config: &TransformerConfig) -> (BatchTransmitter, Arc<MemoryStats>) {
        let stats = Arc::new(MemoryStats::new());
        let transmitter = BatchTransmitter::new(Arc::new(mock), config, stats.clone());
        (transmitter, stats)
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let mut mock = MockHttpTransport::new();
        mock.expect_execute()
            .times(1)
            .withf(|request| request.headers.is_empty() && request.url.ends_with("/webhook"))
            .returning(|_| Ok(ok_reply(2)));

        let (transmitter, stats) = transmitter(mock, &config(false, false));
        let records = transmitter
            .send_batch(&CancellationToken::new(), &call(), &batch(2))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(stats.get_by_name(REQUEST_ATTEMPTS)[0].value, 1);
        assert_eq!(stats.get_by_name(RESPONSE_TOTAL_EVENTS)[0].value, 2);
    }

    #[tokio::test]
    async fn test_compacted_requests_carry_content_format() {
        let mut mock = MockHttpTransport::new();
        mock.expect_execute()
            .times(1)
            .withf(|request| request.headers == vec![("X-Content-Format", "json+compactedv1")])
            .returning(|_| Ok(ok_reply(1)));

        let mut config = config(false, false);
        config.compaction_enabled = true;
        let (transmitter, _) = transmitter(mock, &config);

        transmitter
            .send_batch(&CancellationToken::new(), &call(), &batch(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut mock = MockHttpTransport::new();
        mock.expect_execute().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(reply(429, None, json!("too many requests")))
            } else {
                Ok(ok_reply(1))
            }
        });

        let (transmitter, stats) = transmitter(mock, &config(false, false));
        let records = transmitter
            .send_batch(&CancellationToken::new(), &call(), &batch(1))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats.get_by_name(REQUEST_ATTEMPTS)[0].value, 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_fatal_without_fail_on_error() {
        let mut mock = MockHttpTransport::new();
        mock.expect_execute()
            .times(4)
            .returning(|_| Ok(reply(429, None, json!("too many requests"))));

        let (transmitter, _) = transmitter(mock, &config(false, false));
        let err = transmitter
            .send_batch(&CancellationToken::new(), &call(), &batch(1))
            .await
            .unwrap_err();

        assert_eq!(err.fault_kind(), Some(&FaultKind::RequestFailed { status: 429 }));
    }

    #[tokio::test]
    async fn test_exhausted_retries_with_fail_on_error() {
        let mut mock = MockHttpTransport::new();
        mock.expect_execute()
            .times(4)
            .returning(|_| Ok(reply(429, None, json!("too many requests"))));

        let (transmitter, _) = transmitter(mock, &config(true, false));
        let records = transmitter
            .send_batch(&CancellationToken::new(), &call(), &batch(2))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.status_code, TRANSFORMER_REQUEST_FAILURE);
            assert_eq!(
                record.error,
                "transformer request failed: transformer returned status code: 429"
            );
            assert!(record.output.is_empty());
        }
        assert_eq!(records[1].metadata.message_id, "messageID-1");
    }

    #[tokio::test]
    async fn test_client_error_status_is_not_retried() {
        let mut mock = MockHttpTransport::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(reply(404, None, json!("not found"))));

        let (transmitter, _) = transmitter(mock, &config(true, false));
        let records = transmitter
            .send_batch(&CancellationToken::new(), &call(), &batch(1))
            .await
            .unwrap();

        assert_eq!(
            records[0].error,
            "transformer request failed: transformer returned status code: 404"
        );
    }

    #[tokio::test]
    async fn test_timeouts_follow_failure_switches() {
        // (fail_on_error, fail_on_timeout, expected status, None when fatal)
        for (fail_on_error, fail_on_timeout, expected) in [
            (false, true, Some(TRANSFORMER_REQUEST_TIMEOUT)),
            (true, true, Some(TRANSFORMER_REQUEST_TIMEOUT)),
            (true, false, Some(TRANSFORMER_REQUEST_FAILURE)),
            (false, false, None),
        ] {
            let mut mock = MockHttpTransport::new();
            mock.expect_execute()
                .times(4)
                .returning(|_| Err(ClientError::RequestTimeout("operation timed out".into())));

            let (transmitter, _) = transmitter(mock, &config(fail_on_error, fail_on_timeout));
            let result = transmitter
                .send_batch(&CancellationToken::new(), &call(), &batch(2))
                .await;

            match expected {
                None => assert!(matches!(
                    result.unwrap_err().fault_kind(),
                    Some(FaultKind::TimedOut(_))
                )),
                Some(status) => {
                    let records = result.unwrap();
                    assert_eq!(records.len(), 2);
                    for record in &records {
                        assert_eq!(record.status_code, status);
                    }
                    let prefix = if status == TRANSFORMER_REQUEST_TIMEOUT {
                        "transformer request timed out: "
                    } else {
                        "transformer request failed: "
                    };
                    assert!(records[0].error.starts_with(prefix), "{}", records[0].error);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_connection_failure_with_fail_on_error() {
        let mut mock = MockHttpTransport::new();
        mock.expect_execute()
            .times(4)
            .returning(|_| Err(ClientError::ConnectionFailed("connection refused".into())));

        let (transmitter, _) = transmitter(mock, &config(true, false));
        let records = transmitter
            .send_batch(&CancellationToken::new(), &call(), &batch(1))
            .await
            .unwrap();

        assert_eq!(
            records[0].error,
            "transformer request failed: Connection failed: connection refused"
        );
    }

    #[tokio::test]
    async fn test_contract_violations_are_always_fatal() {
        let cases = [
            (reply(200, Some("1"), json!([])), "version"),
            (reply(200, None, json!([])), "missing"),
            (reply(200, Some("2"), json!({"oops": true})), "malformed"),
            (ok_reply(2), "count"),
        ];

        for (response, case) in cases {
            let mut mock = MockHttpTransport::new();
            mock.expect_execute()
                .times(1)
                .returning(move |_| Ok(response.clone()));

            let (transmitter, _) = transmitter(mock, &config(true, true));
            let err = transmitter
                .send_batch(&CancellationToken::new(), &call(), &batch(1))
                .await
                .unwrap_err();

            let kind = err.fault_kind().cloned();
            match case {
                "version" => assert!(matches!(kind, Some(FaultKind::IncompatibleApiVersion { .. }))),
                "missing" => assert_eq!(kind, Some(FaultKind::MissingApiVersion)),
                "malformed" => assert!(matches!(kind, Some(FaultKind::MalformedResponse(_)))),
                _ => assert_eq!(
                    kind,
                    Some(FaultKind::ResponseCountMismatch {
                        expected: 1,
                        actual: 2
                    })
                ),
            }
        }
    }

    #[tokio::test]
    async fn test_service_failures_get_default_error() {
        let mut mock = MockHttpTransport::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(reply(
                200,
                Some("2"),
                json!([{"output": {}, "metadata": {}, "statusCode": 400}]),
            ))
        });

        let (transmitter, _) = transmitter(mock, &config(false, false));
        let records = transmitter
            .send_batch(&CancellationToken::new(), &call(), &batch(1))
            .await
            .unwrap();

        assert_eq!(records[0].error, "transformer returned status code: 400");
    }

    #[tokio::test]
    async fn test_cancelled_during_backoff() {
        let mut config = config(false, false);
        config.retry.min_backoff = Duration::from_secs(3600);
        config.retry.max_backoff = Duration::from_secs(3600);

        let token = CancellationToken::new();
        let canceller = token.clone();
        let mut mock = MockHttpTransport::new();
        mock.expect_execute().times(1).returning(move |_| {
            canceller.cancel();
            Ok(reply(503, None, json!("unavailable")))
        });

        let (transmitter, _) = transmitter(mock, &config);
        let err = transmitter
            .send_batch(&token, &call(), &batch(1))
            .await
            .unwrap_err();

        assert_eq!(err, TransformerError::Cancelled);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
    }
}
