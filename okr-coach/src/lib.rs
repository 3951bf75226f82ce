//! OKR drafting engine built around a generation-validation-repair loop.
//!
//! A free-form request becomes a typed OKR structure (objectives, key
//! results, risks, KPIs, initiatives) through one or more model
//! round-trips: render a prompt, parse the fenced yaml answer, validate
//! it against the coaching rules, and feed violations back to the model
//! until the draft passes or the iteration budget runs out.
//!
//! Entry points:
//! - [`generator::OkrGenerator`] for generating and iterating on drafts
//! - [`rules::RuleEngine`] for standalone validation
//! - [`similar::SimilarityAnalyzer`] for indicator duplicate detection

pub mod codec;
pub mod config;
pub mod error;
pub mod generator;
pub mod llm;
pub mod prompts;
pub mod rules;
pub mod similar;
pub mod types;

pub use config::{CoachConfig, LlmConfig, RetryConfig, RuleConfig};
pub use error::OkrError;
pub use generator::{GenerationOutcome, IterationOutcome, OkrGenerator};
pub use llm::{LlmProvider, LlmProviderFactory, StubLlmProvider};
pub use rules::RuleEngine;
pub use similar::{Indicator, IndicatorStore, SimilarityAnalyzer};
pub use types::{
    Category, CategoryAnalysis, GenerationContext, OkrSet, PartialOkrSet, ValidationResult,
};
