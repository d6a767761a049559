//! External text-generation collaborators: the topic validator and the question generator.
//!
//! Both are opaque asynchronous operations that may fail or time out. The
//! pipeline only ever sees a [`Verdict`], a [`Question`], or an [`OracleError`].

mod openai;

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use thiserror::Error;

use crate::{config::LlmConfig, state::topic::Question};

pub use openai::OpenAiOracle;

/// Outcome of vetting a proposed topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The topic is fit for a question.
    Accept,
    /// The topic breaks the quality rules.
    Reject,
}

/// Failure of a validator or generator call.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Request(String),
    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for the logs.
        body: String,
    },
    /// The response did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The call exceeded its time budget.
    #[error("call timed out")]
    Timeout,
    /// No backend is configured.
    #[error("no language model backend configured")]
    Disabled,
}

/// Decides whether a proposed topic may become a question.
pub trait TopicValidator: Send + Sync {
    /// Vet `topic`.
    fn validate(&self, topic: &str) -> BoxFuture<'static, Result<Verdict, OracleError>>;
}

/// Writes a four-option question about a topic.
pub trait QuestionGenerator: Send + Sync {
    /// Generate a question for `topic`.
    fn generate(&self, topic: &str) -> BoxFuture<'static, Result<Question, OracleError>>;
}

/// Stand-in used when no backend is configured; every call fails, so player topics end up `failed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOracle;

impl TopicValidator for DisabledOracle {
    fn validate(&self, _topic: &str) -> BoxFuture<'static, Result<Verdict, OracleError>> {
        Box::pin(async { Err(OracleError::Disabled) })
    }
}

impl QuestionGenerator for DisabledOracle {
    fn generate(&self, _topic: &str) -> BoxFuture<'static, Result<Question, OracleError>> {
        Box::pin(async { Err(OracleError::Disabled) })
    }
}

/// Validator and generator pair handed to the shared state.
#[derive(Clone)]
pub struct Oracles {
    /// Topic validator.
    pub validator: Arc<dyn TopicValidator>,
    /// Question generator.
    pub generator: Arc<dyn QuestionGenerator>,
}

impl Oracles {
    /// Build the pair from configuration, falling back to [`DisabledOracle`].
    pub fn from_config(config: &LlmConfig) -> Result<Self, OracleError> {
        match OpenAiOracle::from_config(config)? {
            Some(oracle) => {
                let oracle = Arc::new(oracle);
                Ok(Self {
                    validator: oracle.clone(),
                    generator: oracle,
                })
            }
            None => Ok(Self::disabled()),
        }
    }

    /// Pair where every call fails.
    pub fn disabled() -> Self {
        Self {
            validator: Arc::new(DisabledOracle),
            generator: Arc::new(DisabledOracle),
        }
    }
}

/// Bound an oracle call by `limit`, mapping expiry to [`OracleError::Timeout`].
pub async fn within<T>(
    limit: Duration,
    call: BoxFuture<'static, Result<T, OracleError>>,
) -> Result<T, OracleError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(OracleError::Timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let call: BoxFuture<'static, Result<Verdict, OracleError>> = Box::pin(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Verdict::Accept)
        });
        let result = within(Duration::from_secs(1), call).await;
        assert!(matches!(result, Err(OracleError::Timeout)));
    }

    #[tokio::test]
    async fn disabled_oracle_always_fails() {
        let oracles = Oracles::disabled();
        assert!(matches!(
            oracles.validator.validate("Rust").await,
            Err(OracleError::Disabled)
        ));
        assert!(matches!(
            oracles.generator.generate("Rust").await,
            Err(OracleError::Disabled)
        ));
    }

    #[test]
    fn missing_url_disables_the_backend() {
        assert!(OpenAiOracle::from_config(&LlmConfig::default()).unwrap().is_none());
    }
}
