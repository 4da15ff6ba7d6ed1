use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Warns every `interval` while the call governed by `token` is still running.
///
/// Returns as soon as `token` is cancelled. A token that is already cancelled
/// returns without logging. Never affects the call itself.
pub async fn track_long_running_transformation(
    token: CancellationToken,
    stage: &str,
    interval: Duration,
) {
    let start = Instant::now();
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = sleep(interval) => {
                let elapsed = start.elapsed();
                warn!(
                    stage = stage,
                    duration = %format!("{elapsed:?}"),
                    "Long running transformation detected"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_cancelled_before_first_tick_logs_nothing() {
        let token = CancellationToken::new();
        token.cancel();

        track_long_running_transformation(token, "stage", Duration::from_secs(3600)).await;

        assert!(!logs_contain("Long running transformation detected"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_warns_until_cancelled() {
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            async move {
                sleep(Duration::from_millis(55)).await;
                token.cancel();
            }
        };

        tokio::join!(
            track_long_running_transformation(
                token,
                "dest_transformer",
                Duration::from_millis(10),
            ),
            canceller
        );

        assert!(logs_contain("Long running transformation detected"));
        assert!(logs_contain("dest_transformer"));
        assert!(logs_contain("duration="));
    }
}
