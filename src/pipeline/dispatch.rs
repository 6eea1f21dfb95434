use crate::component::{NamedSink, SinkError};
use crate::domain::LogRecord;
use crate::reliability::RetryPolicy;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Result of delivering one batch to one sink.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DispatchOutcome {
    pub attempts: u32,
    pub result: Result<(), SinkError>,
}

impl DispatchOutcome {
    pub fn retries(&self) -> u64 {
        u64::from(self.attempts.saturating_sub(1))
    }
}

/// Deliver `records` to a single sink, retrying with linear backoff.
///
/// `timeout` bounds the whole dispatch including backoff sleeps. When it fires the in-flight
/// call is dropped and the dispatch is reported as a timeout with the attempts made so far.
pub(crate) async fn dispatch(
    target: &NamedSink,
    records: &[LogRecord],
    policy: RetryPolicy,
    timeout: Duration,
    batch_id: Uuid,
) -> DispatchOutcome {
    let mut attempts = 0u32;

    let delivery = async {
        let mut last_error = None;
        for attempt in 0..policy.max_attempts() {
            if attempt > 0 {
                let delay = policy.delay_for(attempt);
                debug!(
                    sink = %target.name,
                    %batch_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying sink delivery"
                );
                tokio::time::sleep(delay).await;
            }

            attempts += 1;
            match target.sink.deliver(records).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        sink = %target.name,
                        %batch_id,
                        attempt = attempt + 1,
                        max_attempts = policy.max_attempts(),
                        error = %e,
                        "Sink delivery attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| SinkError::Delivery("no attempts made".to_string())))
    };

    let result = match tokio::time::timeout(timeout, delivery).await {
        Ok(result) => result,
        Err(_) => Err(SinkError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    };

    DispatchOutcome { attempts, result }
}
