//! Concrete [`Hook`] using the [`tracing`] crate.
//!
//! Emits one structured `tracing` event per hook point. Wire to any
//! `tracing`-compatible subscriber.

use async_trait::async_trait;
use axon_core::error::HookError;
use axon_core::hook::{Hook, HookContext, HookPoint};

/// A [`Hook`] that emits structured [`tracing`] events.
///
/// # Levels
///
/// | Point | Level | Event |
/// |-------|-------|-------|
/// | TurnStarted, TurnCompleted, Trace | `DEBUG` | `axon.turn.start`, `axon.turn.complete`, `axon.turn.trace` |
/// | ModeChanged | `INFO` | `axon.mode.changed` |
/// | EffectFailed, SignalDropped | `WARN` | `axon.effect.failed`, `axon.signal.dropped` |
/// | RunnerPanicked | `ERROR` | `axon.runner.panicked` |
///
/// # Example
///
/// ```no_run
/// use axon_hooks::{HookRegistry, TracingHook};
/// use std::sync::Arc;
///
/// let hooks = HookRegistry::new().with(Arc::new(TracingHook::new()));
/// ```
pub struct TracingHook;

impl TracingHook {
    /// Create a new `TracingHook`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Hook for TracingHook {
    fn points(&self) -> &[HookPoint] {
        &HookPoint::ALL
    }

    async fn on_event(&self, ctx: &HookContext) -> Result<(), HookError> {
        let agent = ctx.agent.as_str();
        let signal = ctx.signal_type.as_deref().unwrap_or_default();
        match ctx.point {
            HookPoint::TurnStarted => {
                tracing::debug!(agent, turn = ctx.turn, signal, "axon.turn.start");
            }
            HookPoint::TurnCompleted => {
                tracing::debug!(
                    agent,
                    turn = ctx.turn,
                    signal,
                    effects = ctx.effect_count.unwrap_or_default(),
                    "axon.turn.complete"
                );
            }
            HookPoint::Trace => {
                if let Some(trace) = &ctx.trace {
                    tracing::debug!(
                        agent,
                        turn = ctx.turn,
                        signal,
                        state_before = %trace.state_before,
                        state_after = %trace.state_after,
                        effects = ?trace.effects,
                        "axon.turn.trace"
                    );
                }
            }
            HookPoint::ModeChanged => {
                tracing::info!(
                    agent,
                    mode = ctx.mode.as_deref().unwrap_or_default(),
                    "axon.mode.changed"
                );
            }
            HookPoint::EffectFailed => {
                let (kind, error) = error_fields(ctx);
                tracing::warn!(
                    agent,
                    turn = ctx.turn,
                    signal,
                    effect = ctx.effect.as_deref().unwrap_or_default(),
                    index = ?ctx.effect_index,
                    kind,
                    error,
                    "axon.effect.failed"
                );
            }
            HookPoint::SignalDropped => {
                let (kind, error) = error_fields(ctx);
                tracing::warn!(agent, signal, kind, error, "axon.signal.dropped");
            }
            HookPoint::RunnerPanicked => {
                let (_, error) = error_fields(ctx);
                tracing::error!(agent, turn = ctx.turn, signal, error, "axon.runner.panicked");
            }
            _ => {}
        }
        Ok(())
    }
}

fn error_fields(ctx: &HookContext) -> (&'static str, &str) {
    match &ctx.error {
        Some((kind, message)) => (kind.as_str(), message.as_str()),
        None => ("", ""),
    }
}
