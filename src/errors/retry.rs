use std::future::Future;
use std::time::Duration;

use super::classification::ErrorClassification;
use super::types::WafsmithError;
use tracing::warn;

impl ErrorClassification {
    /// Backoff before the next attempt (`attempt` is 0-indexed).
    ///
    /// Rate limits wait 30s plus 10s per attempt, capped at 120s. Everything
    /// else backs off exponentially with up to one second of jitter, capped at 30s.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        if self.error_type == "RateLimitError" {
            let secs = 30 + attempt as u64 * 10;
            return Duration::from_secs(secs.min(120));
        }
        let exponential = 2.0_f64.powi(attempt as i32);
        let jitter = rand::random::<f64>();
        Duration::from_secs_f64((exponential + jitter).min(30.0))
    }
}

/// How hard LLM transport calls are retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Single attempt only, used for fast dry runs of the pipeline.
    pub pipeline_testing: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            pipeline_testing: false,
        }
    }
}

impl RetryConfig {
    fn max_attempts(&self) -> u32 {
        if self.pipeline_testing {
            1
        } else {
            self.max_retries + 1
        }
    }
}

/// Run `factory` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    mut factory: F,
) -> Result<T, WafsmithError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WafsmithError>>,
{
    let max_attempts = config.max_attempts();
    let mut attempt = 0;

    loop {
        let error = match factory().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let classification = error.classify();
        attempt += 1;

        if !classification.retryable {
            warn!(
                operation = operation_name,
                error_type = classification.error_type,
                "Non-retryable error, failing immediately"
            );
            return Err(error);
        }
        if attempt >= max_attempts {
            warn!(
                operation = operation_name,
                attempts = attempt,
                "Max retries exhausted"
            );
            return Err(error);
        }

        let delay = classification.retry_delay(attempt - 1);
        warn!(
            operation = operation_name,
            attempt,
            max = max_attempts,
            error_type = classification.error_type,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retrying after error"
        );
        tokio::time::sleep(delay).await;
    }
}
