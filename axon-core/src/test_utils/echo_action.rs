//! EchoAction — returns its params as the result.

use crate::action::{Action, ActionContext, ActionOutput};
use crate::error::ActionError;
use async_trait::async_trait;
use serde_json::Value;

/// An action that echoes its params back as the result.
pub struct EchoAction {
    name: String,
}

impl EchoAction {
    /// Create an echo action registered as `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for EchoAction {
    fn default() -> Self {
        Self::new("echo")
    }
}

#[async_trait]
impl Action for EchoAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, params: Value, _ctx: ActionContext) -> Result<ActionOutput, ActionError> {
        Ok(ActionOutput::new(params))
    }
}
