#![deny(missing_docs)]
//! Hook registry and composition for axon.
//!
//! The [`HookRegistry`] collects multiple [`Hook`] implementations into
//! an ordered pipeline. At each hook point, hooks registered for that
//! point are called in registration order. Hooks observe only, so the
//! pipeline never short-circuits: every hook sees every event it asked
//! for. Hook errors are logged and the pipeline continues.
//!
//! [`TracingHook`] is the stock observer that mirrors events into
//! `tracing`.

mod tracing_hook;

pub use tracing_hook::TracingHook;

use axon_core::hook::{Hook, HookContext, HookPoint};
use std::sync::Arc;

/// A registry that dispatches hook events to an ordered pipeline of hooks.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookRegistry {
    /// Create a new empty hook registry.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add a hook to the end of the pipeline.
    pub fn add(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    /// Builder-style [`add`](Self::add).
    pub fn with(mut self, hook: Arc<dyn Hook>) -> Self {
        self.add(hook);
        self
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Whether any hook listens at `point`. Lets callers skip building
    /// expensive contexts (full traces) nobody will read.
    pub fn wants(&self, point: HookPoint) -> bool {
        self.hooks.iter().any(|h| h.points().contains(&point))
    }

    /// Dispatch a hook event through the pipeline.
    pub async fn dispatch(&self, ctx: &HookContext) {
        for hook in &self.hooks {
            if !hook.points().contains(&ctx.point) {
                continue;
            }
            if let Err(error) = hook.on_event(ctx).await {
                tracing::warn!(
                    agent = %ctx.agent,
                    point = ?ctx.point,
                    %error,
                    "axon.hook.failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
