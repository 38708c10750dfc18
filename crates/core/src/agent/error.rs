use stepwise_model::ModelProviderError;

use crate::step::StepError;
use crate::tool::UnknownToolError;

/// Why a query failed.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The completion provider kept failing.
    #[error("provider error: {0}")]
    Provider(Box<dyn ModelProviderError>),
    /// The model replied with something that isn't a usable step.
    #[error(transparent)]
    Step(#[from] StepError),
    /// The model called a tool that isn't registered.
    #[error(transparent)]
    UnknownTool(#[from] UnknownToolError),
    /// The model didn't produce a result within the step budget.
    #[error("no result after {max_steps} steps")]
    BudgetExceeded {
        /// The configured budget.
        max_steps: usize,
    },
    /// The session has ended; no more input is accepted.
    #[error("session has ended")]
    SessionEnded,
}

impl From<Box<dyn ModelProviderError>> for AgentError {
    #[inline]
    fn from(err: Box<dyn ModelProviderError>) -> Self {
        AgentError::Provider(err)
    }
}
