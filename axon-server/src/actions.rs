//! Running actions off the turn path.

use axon_core::{Action, ActionContext, ActionError, ActionName, ActionOutput, RunOpts};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::AbortHandle;

/// In-flight action tasks, so shutdown can abort them.
#[derive(Default)]
pub(crate) struct ActionTasks {
    running: HashMap<u64, AbortHandle>,
    next: u64,
}

impl ActionTasks {
    pub(crate) fn next_id(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    pub(crate) fn insert(&mut self, task: u64, handle: AbortHandle) {
        self.running.insert(task, handle);
    }

    pub(crate) fn finish(&mut self, task: u64) {
        self.running.remove(&task);
    }

    pub(crate) fn len(&self) -> usize {
        self.running.len()
    }

    pub(crate) fn abort_all(&mut self) {
        for (_, handle) in self.running.drain() {
            handle.abort();
        }
    }
}

/// Invoke `action` under `opts`: each attempt is bounded by the timeout,
/// and retryable failures are retried with linear backoff.
pub(crate) async fn invoke(
    action: &dyn Action,
    name: &ActionName,
    params: Value,
    mut ctx: ActionContext,
    opts: &RunOpts,
) -> Result<ActionOutput, ActionError> {
    let mut attempt = 1u32;
    loop {
        ctx.attempt = attempt;
        let call = action.invoke(params.clone(), ctx.clone());
        let result = match opts.timeout_ms {
            Some(timeout_ms) => tokio::time::timeout(Duration::from_millis(timeout_ms), call)
                .await
                .unwrap_or_else(|_| {
                    Err(ActionError::Timeout {
                        action: name.clone(),
                        timeout_ms,
                    })
                }),
            None => call.await,
        };
        match result {
            Err(error) if error.is_retryable() && attempt <= opts.retries => {
                tracing::debug!(action = %name, attempt, %error, "axon.action.retry");
                let backoff = opts.backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Serialize an action's directives for the `action_result` payload.
/// A failure is an action failure, not an empty list.
pub(crate) fn directives_payload<T: Serialize + ?Sized>(
    directives: &T,
) -> Result<Value, ActionError> {
    serde_json::to_value(directives).map_err(|error| ActionError::Other(Box::new(error)))
}
