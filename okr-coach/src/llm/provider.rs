use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{LlmConfig, LlmProviderType};
use crate::error::OkrError;

use super::{OpenAiLlmProvider, StubLlmProvider};

/// Information about an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmProviderInfo {
    pub name: String,
    pub model: String,
}

/// Single-completion text model. Implementations must be cheap to share
/// behind an `Arc` and safe to call concurrently.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one prompt, return the raw model text. Transport, auth and
    /// decoding failures all map to [`OkrError::ModelUnavailable`].
    async fn complete(&self, prompt: &str) -> Result<String, OkrError>;

    fn info(&self) -> LlmProviderInfo;
}

/// Factory for creating providers from configuration.
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, OkrError> {
        match config.provider_type {
            LlmProviderType::Stub => Ok(Arc::new(StubLlmProvider::new(config.model.clone()))),
            LlmProviderType::OpenAi | LlmProviderType::Local => {
                Ok(Arc::new(OpenAiLlmProvider::new(config.clone())?))
            }
        }
    }
}

/// Counters for the generation loop, shared across concurrent runs.
/// An "attempt" is one model round-trip; a "retry" is any attempt after
/// the first within one generate call.
#[derive(Debug, Default)]
pub struct RetryMetrics {
    total_attempts: AtomicU64,
    total_retries: AtomicU64,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
}

impl RetryMetrics {
    pub fn record_attempt(&self) {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.total_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> RetryMetricsSummary {
        RetryMetricsSummary {
            total_attempts: self.total_attempts.load(Ordering::Relaxed),
            total_retries: self.total_retries.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of [`RetryMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryMetricsSummary {
    pub total_attempts: u64,
    pub total_retries: u64,
    pub total_successes: u64,
    pub total_failures: u64,
}

impl RetryMetricsSummary {
    /// Fraction of generate calls that ended with a valid structure.
    pub fn success_rate(&self) -> f64 {
        let runs = self.total_successes + self.total_failures;
        if runs == 0 {
            return 0.0;
        }
        self.total_successes as f64 / runs as f64
    }

    /// Average model round-trips per finished run.
    pub fn attempts_per_run(&self) -> f64 {
        let runs = self.total_successes + self.total_failures;
        if runs == 0 {
            return 0.0;
        }
        self.total_attempts as f64 / runs as f64
    }
}
