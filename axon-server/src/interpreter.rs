//! The effect interpreter.
//!
//! Effects run strictly in the order the runner returned them, after the
//! turn's state is committed. `StateModification` is already folded and
//! is skipped here. The first effect that fails halts the rest of the
//! turn; earlier effects are not rolled back.

use crate::actions;
use crate::error::EffectError;
use crate::handle::Command;
use crate::worker::Worker;
use axon_core::hook::HookPoint;
use axon_core::{
    ActionContext, ActionError, ChildSpec, ChildTag, CorrelationId, Destination, DispatchError,
    Effect, Instruction, Signal, TimerKey,
};
use serde_json::{Value, json};

/// Adapter name subscribers see on the destination of fanned-out signals.
pub const SUBSCRIPTION_ADAPTER: &str = "subscription";

impl Worker {
    pub(crate) async fn execute(&mut self, cause: &Signal, effects: &[Effect]) {
        for (index, effect) in effects.iter().enumerate() {
            let Err(error) = self.apply(cause, effect).await else {
                continue;
            };
            tracing::warn!(
                agent = %self.agent.id(),
                effect = effect.kind(),
                index,
                %error,
                "axon.effect.failed"
            );
            let ctx = self
                .hook(HookPoint::EffectFailed)
                .with_signal(cause)
                .with_effect(effect, index)
                .with_error(error.kind(), error.to_string());
            self.hooks.dispatch(&ctx).await;
            break;
        }
    }

    async fn apply(&mut self, cause: &Signal, effect: &Effect) -> Result<(), EffectError> {
        match effect {
            Effect::Run(instruction) => {
                self.run_action(cause, instruction).await;
                Ok(())
            }
            Effect::StateModification { .. } => Ok(()),
            Effect::Emit {
                signal_type,
                data,
                source,
                destination,
            } => {
                let source = source
                    .clone()
                    .unwrap_or_else(|| self.agent.id().to_string());
                let mut signal = Signal::new(signal_type.clone(), data.clone()).with_source(source);
                signal.correlation_id = cause.correlation_id.clone();
                self.emit(signal, destination.clone()).await
            }
            Effect::Reply { to, signal } => {
                self.reply(to, signal.clone());
                Ok(())
            }
            Effect::Timer {
                delay_ms,
                signal,
                dedup_key,
            } => {
                self.arm_timer(dedup_key.clone(), *delay_ms, signal.clone());
                Ok(())
            }
            Effect::Spawn { spec, args } => self.spawn_child(spec, args.clone()).await,
            Effect::Kill { child } => self.kill_child(child).await,
            Effect::RegisterAction { action } => {
                if !self.registry.contains(action) {
                    return Err(EffectError::UnregisteredAction(action.clone()));
                }
                self.agent = self.agent.with_action(action.clone());
                Ok(())
            }
            Effect::DeregisterAction { action } => {
                self.agent = self.agent.without_action(action);
                Ok(())
            }
            Effect::AddRoute { path, target } => {
                self.agent = self.agent.with_route(path.clone(), target.clone());
                Ok(())
            }
            Effect::RemoveRoute { path } => {
                self.agent = self.agent.without_route(path);
                Ok(())
            }
        }
    }

    /// Start the action on its own task. Refusals come back as an
    /// `action_error` signal, just like failures do.
    async fn run_action(&mut self, cause: &Signal, instruction: &Instruction) {
        let agent = self.agent.id().clone();
        let name = instruction.action.clone();
        let action = if !self.agent.can_run(&name) {
            Err(ActionError::NotAllowed(name.clone()))
        } else {
            self.registry
                .get(&name)
                .ok_or_else(|| ActionError::NotFound(name.clone()))
        };
        let action = match action {
            Ok(action) => action,
            Err(error) => {
                tracing::debug!(agent = %agent, action = %name, %error, "axon.action.refused");
                let signal = Signal::action_error(&agent, instruction, &error, cause);
                let _ = self.enqueue(signal, false).await;
                return;
            }
        };
        let Some(commands) = self.commands.upgrade() else {
            return;
        };

        let task = self.actions.next_id();
        let instruction = instruction.clone();
        let ctx = ActionContext::new(agent.clone(), cause, instruction.context.clone());
        let cause = cause.clone();
        tracing::debug!(agent = %agent, action = %name, task, "axon.action.started");
        let handle = tokio::spawn(async move {
            let outcome = actions::invoke(
                action.as_ref(),
                &name,
                instruction.params.clone(),
                ctx,
                &instruction.opts,
            )
            .await;
            let signal = match outcome {
                Ok(output) => match actions::directives_payload(&output.directives) {
                    Ok(directives) => {
                        Signal::action_result(&agent, &instruction, output.result, directives, &cause)
                    }
                    Err(error) => {
                        tracing::warn!(
                            agent = %agent,
                            action = %name,
                            %error,
                            "axon.action.directives_invalid"
                        );
                        Signal::action_error(&agent, &instruction, &error, &cause)
                    }
                },
                Err(error) => Signal::action_error(&agent, &instruction, &error, &cause),
            };
            let _ = commands.send(Command::ActionFinished { task, signal });
        });
        self.actions.insert(task, handle.abort_handle());
    }

    /// Hand the signal to the dispatcher, then fan it out to matching
    /// subscribers. Only the dispatcher's failure halts the turn.
    async fn emit(
        &mut self,
        signal: Signal,
        destination: Option<Destination>,
    ) -> Result<(), EffectError> {
        let destination = destination.or_else(|| self.config.default_destination.clone());
        if let Some(destination) = destination {
            let dispatcher = self
                .dispatcher
                .clone()
                .ok_or_else(|| DispatchError::UnknownAdapter(destination.adapter.clone()))?;
            dispatcher.deliver(signal.clone(), &destination).await?;
        }

        let subscribers: Vec<_> = self
            .subscriptions
            .iter()
            .filter(|(pattern, _)| pattern.matches(&signal.signal_type))
            .map(|(pattern, subscriber)| (pattern.clone(), subscriber.clone()))
            .collect();
        for (pattern, subscriber) in subscribers {
            let destination = Destination::new(SUBSCRIPTION_ADAPTER)
                .with_config(json!({ "pattern": pattern.as_str() }));
            if let Err(error) = subscriber.deliver(signal.clone(), &destination).await {
                tracing::warn!(
                    agent = %self.agent.id(),
                    pattern = pattern.as_str(),
                    signal = %signal.signal_type,
                    %error,
                    "axon.subscription.failed"
                );
            }
        }
        Ok(())
    }

    fn reply(&mut self, to: &CorrelationId, signal: Signal) {
        match self.pending_calls.remove(to) {
            Some(waiter) => {
                let _ = waiter.send(Ok(signal));
            }
            None => {
                tracing::debug!(agent = %self.agent.id(), correlation_id = %to, "axon.reply.unclaimed");
            }
        }
    }

    fn arm_timer(&mut self, key: Option<TimerKey>, delay_ms: u64, signal: Signal) {
        let Some(commands) = self.commands.upgrade() else {
            return;
        };
        let (key, replaced) = self.timers.arm(key, delay_ms, signal, commands);
        tracing::debug!(
            agent = %self.agent.id(),
            timer = %key,
            delay_ms,
            replaced,
            "axon.timer.armed"
        );
    }

    /// Spawning under a tag that is already tracked replaces that child.
    async fn spawn_child(&mut self, spec: &ChildSpec, args: Value) -> Result<(), EffectError> {
        if let Some(previous) = self.children.remove(&spec.tag) {
            if let Err(error) = self.supervisor.stop(&previous).await {
                tracing::warn!(
                    agent = %self.agent.id(),
                    child = %spec.tag,
                    %error,
                    "axon.child.stop_failed"
                );
            }
        }
        let child = self.supervisor.start(spec, args).await?;
        self.children.insert(spec.tag.clone(), child);
        Ok(())
    }

    async fn kill_child(&mut self, tag: &ChildTag) -> Result<(), EffectError> {
        match self.children.remove(tag) {
            Some(child) => self.supervisor.stop(&child).await?,
            None => {
                tracing::debug!(agent = %self.agent.id(), child = %tag, "axon.child.unknown");
            }
        }
        Ok(())
    }
}
