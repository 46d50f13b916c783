//! Actions that fail, always or for a while.

use crate::action::{Action, ActionContext, ActionOutput};
use crate::error::ActionError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};

/// An action that always fails with a non-retryable error.
pub struct FailingAction {
    name: String,
    message: String,
}

impl FailingAction {
    /// Create a failing action.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Action for FailingAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, _params: Value, _ctx: ActionContext) -> Result<ActionOutput, ActionError> {
        Err(ActionError::Failed(self.message.clone()))
    }
}

/// An action that fails with a retryable error for its first
/// `failures` invocations, then echoes its params.
pub struct FlakyAction {
    name: String,
    failures: u32,
    calls: AtomicU32,
}

impl FlakyAction {
    /// Create an action that fails `failures` times before succeeding.
    pub fn new(name: impl Into<String>, failures: u32) -> Self {
        Self {
            name: name.into(),
            failures,
            calls: AtomicU32::new(0),
        }
    }

    /// How many times the action was invoked.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Action for FlakyAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, params: Value, ctx: ActionContext) -> Result<ActionOutput, ActionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(ActionError::Retryable(format!(
                "attempt {} failed",
                ctx.attempt
            )));
        }
        Ok(ActionOutput::new(params))
    }
}
