//! SlowAction — sleeps before echoing its params.

use crate::action::{Action, ActionContext, ActionOutput};
use crate::error::ActionError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// An action that sleeps for a fixed delay, then echoes its params.
/// Used to prove the worker never waits on actions.
pub struct SlowAction {
    name: String,
    delay: Duration,
}

impl SlowAction {
    /// Create a slow action.
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

#[async_trait]
impl Action for SlowAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, params: Value, _ctx: ActionContext) -> Result<ActionOutput, ActionError> {
        tokio::time::sleep(self.delay).await;
        Ok(ActionOutput::new(params))
    }
}
