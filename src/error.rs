//! Errors surfaced by the optimizer.

use thiserror::Error;

use crate::cascades::GroupId;

pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Error)]
pub enum OptError {
    /// No optimization context, or no winner in it, for the requested pair.
    #[error("could not generate an execution plan: no plan found for group {group} with required properties {required}")]
    NoPlanFound { group: GroupId, required: String },

    /// A recorded winner does not deliver what its context requires.
    #[error("could not generate an execution plan: winner of group {group} does not satisfy required properties {required}")]
    UnsatisfiedRequiredProperties { group: GroupId, required: String },

    #[error("optimizer invariant violated: {0}")]
    InvariantViolation(String),

    #[error("plan depth exceeds limit {limit}")]
    PlanDepthExceeded { limit: usize },

    #[error("group merge did not reach a fixed point after {passes} passes")]
    MergeDidNotConverge { passes: usize },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OptError {
    pub(crate) fn invariant<S: Into<String>>(msg: S) -> Self {
        let msg = msg.into();
        log::warn!("Optimizer invariant violated: {}", msg);
        OptError::InvariantViolation(msg)
    }

    /// Whether the user should see this as "could not generate an execution plan".
    pub fn is_plan_generation_failure(&self) -> bool {
        matches!(
            self,
            OptError::NoPlanFound { .. } | OptError::UnsatisfiedRequiredProperties { .. }
        )
    }
}
