use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use stepflow_core::config::RetryConfig;
use stepflow_core::error::{Result, StepflowError};
use stepflow_core::traits::Generator;
use stepflow_core::types::{Generation, GenerationRequest};

/// A generator that retries transient provider failures with jittered
/// exponential backoff.
pub struct RetryingGenerator {
    inner: Arc<dyn Generator>,
    retry_config: RetryConfig,
}

impl RetryingGenerator {
    pub fn new(inner: Arc<dyn Generator>, retry_config: RetryConfig) -> Self {
        Self {
            inner,
            retry_config,
        }
    }
}

fn is_retryable(e: &StepflowError) -> bool {
    match e {
        StepflowError::Generation { message, .. } => {
            message.contains("429")
                || message.contains("500")
                || message.contains("502")
                || message.contains("503")
                || message.contains("timeout")
                || message.contains("connection")
        }
        _ => false,
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl Generator for RetryingGenerator {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<Generation>> {
        Box::pin(async move {
            let max_retries = self.retry_config.max_retries;
            let mut attempt = 0;
            loop {
                match self.inner.generate(request.clone()).await {
                    Ok(generation) => return Ok(generation),
                    Err(e) if is_retryable(&e) && attempt < max_retries => {
                        let backoff = calculate_backoff(attempt, &self.retry_config);
                        warn!(
                            provider = %request.provider,
                            attempt = attempt + 1,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %e,
                            "Retrying generation"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
    }
}
