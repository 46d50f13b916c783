use axon_core::error::{ErrorKind, HookError};
use axon_core::hook::{Hook, HookContext, HookPoint, TurnTrace};
use axon_core::test_utils::RecordingHook;
use axon_core::{AgentId, Effect, Signal};
use axon_hooks::{HookRegistry, TracingHook};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn ctx(point: HookPoint) -> HookContext {
    HookContext::new(point, AgentId::new("agent-1"), 0)
}

// --- Empty registry ---

#[tokio::test]
async fn empty_registry_dispatches_nothing() {
    let registry = HookRegistry::new();
    assert!(registry.is_empty());
    assert!(!registry.wants(HookPoint::Trace));
    registry.dispatch(&ctx(HookPoint::TurnStarted)).await;
}

// --- Single hook ---

#[tokio::test]
async fn single_hook_dispatches() {
    let hook = Arc::new(RecordingHook::new());
    let registry = HookRegistry::new().with(hook.clone());

    let signal = Signal::new("order.placed", json!({}));
    registry
        .dispatch(&ctx(HookPoint::TurnStarted).with_signal(&signal))
        .await;

    let events = hook.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].point, HookPoint::TurnStarted);
    assert_eq!(events[0].signal_type.as_deref(), Some("order.placed"));
}

// --- Hook ordering ---

struct NamedHook {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl Hook for NamedHook {
    fn points(&self) -> &[HookPoint] {
        &[HookPoint::TurnStarted, HookPoint::TurnCompleted]
    }

    async fn on_event(&self, _ctx: &HookContext) -> Result<(), HookError> {
        self.log.lock().unwrap().push(self.name.clone());
        Ok(())
    }
}

#[tokio::test]
async fn hooks_execute_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = HookRegistry::new();
    for name in ["first", "second", "third"] {
        registry.add(Arc::new(NamedHook {
            name: name.into(),
            log: log.clone(),
        }));
    }

    registry.dispatch(&ctx(HookPoint::TurnStarted)).await;
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
}

// --- Point filtering ---

#[tokio::test]
async fn hooks_only_see_their_points() {
    let traces = Arc::new(RecordingHook::at(&[HookPoint::Trace]));
    let all = Arc::new(RecordingHook::new());
    let registry = HookRegistry::new().with(traces.clone()).with(all.clone());

    assert!(registry.wants(HookPoint::Trace));
    registry.dispatch(&ctx(HookPoint::TurnStarted)).await;
    registry
        .dispatch(&ctx(HookPoint::Trace).with_trace(TurnTrace::new(
            json!({}),
            json!({"n": 1}),
            vec![Effect::set("n", json!(1))],
        )))
        .await;

    assert_eq!(traces.events().len(), 1);
    assert!(traces.events()[0].traced);
    assert_eq!(all.events().len(), 2);
}

// --- Errors don't halt the pipeline ---

struct BrokenHook;

#[async_trait::async_trait]
impl Hook for BrokenHook {
    fn points(&self) -> &[HookPoint] {
        &HookPoint::ALL
    }

    async fn on_event(&self, _ctx: &HookContext) -> Result<(), HookError> {
        Err(HookError::Failed("boom".into()))
    }
}

#[tokio::test]
async fn failing_hook_does_not_stop_later_hooks() {
    let recorder = Arc::new(RecordingHook::new());
    let registry = HookRegistry::new()
        .with(Arc::new(BrokenHook))
        .with(recorder.clone());

    registry
        .dispatch(
            &ctx(HookPoint::EffectFailed)
                .with_effect(&Effect::emit("x", json!({})), 2)
                .with_error(ErrorKind::Internal, "no route"),
        )
        .await;

    let events = recorder.events_at(HookPoint::EffectFailed);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].effect.as_deref(), Some("emit"));
    assert_eq!(
        events[0].error,
        Some((ErrorKind::Internal, "no route".to_owned()))
    );
}

// --- TracingHook ---

#[tokio::test]
async fn tracing_hook_accepts_every_point() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let hook = TracingHook::new();
    assert_eq!(hook.points(), &HookPoint::ALL);
    let signal = Signal::new("tick", json!({}));
    for point in HookPoint::ALL {
        let ctx = ctx(point)
            .with_signal(&signal)
            .with_mode("debug")
            .with_effect_count(0)
            .with_error(ErrorKind::Overflow, "queue full")
            .with_trace(TurnTrace::new(json!({}), json!({}), vec![]));
        assert!(hook.on_event(&ctx).await.is_ok());
    }
}
