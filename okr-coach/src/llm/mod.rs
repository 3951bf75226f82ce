//! LLM provider abstraction.
//!
//! The engine talks to exactly one seam: [`LlmProvider::complete`]. Every
//! transport concern (auth, timeouts, response envelopes) stays behind it,
//! and every transport failure surfaces as `OkrError::ModelUnavailable`.

mod openai;
mod provider;
mod stub;

pub use openai::OpenAiLlmProvider;
pub use provider::{LlmProvider, LlmProviderFactory, LlmProviderInfo, RetryMetrics, RetryMetricsSummary};
pub use stub::StubLlmProvider;
