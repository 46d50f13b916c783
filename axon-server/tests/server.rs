use axon_core::test_utils::{
    EchoAction, RecordingDispatcher, RecordingHook, RecordingSupervisor, SlowAction,
};
use axon_core::{
    Agent, AgentHooks, ChildSpec, ChildTag, Decision, Destination, Effect, ErrorKind, HookPoint,
    Instruction, MemoryReplayLog, RunOpts, Signal, StopReason, TimerKey,
};
use axon_runner_simple::SimpleRunner;
use axon_server::{AgentRef, AgentServer, Mode, ServerConfig, ServerError, Status};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

// --- Helpers ---

/// Records every signal type it sees under `seen` and counts `inc`.
fn recorder() -> SimpleRunner {
    SimpleRunner::new("recorder", |mut state, signal| {
        if !state["seen"].is_array() {
            state["seen"] = json!([]);
        }
        if let Some(seen) = state["seen"].as_array_mut() {
            seen.push(json!(signal.signal_type));
        }
        if signal.is("inc") {
            let count = state["count"].as_u64().unwrap_or(0);
            state["count"] = json!(count + 1);
        }
        Decision::state_only(state)
    })
}

fn agent(id: &str, runner: SimpleRunner) -> Agent {
    Agent::builder(id, Arc::new(runner)).build()
}

fn step_mode() -> ServerConfig {
    ServerConfig::default().with_mode(Mode::Step)
}

async fn eventually<F>(agent: &AgentRef, what: &str, check: F) -> Agent
where
    F: Fn(&Agent) -> bool,
{
    for _ in 0..400 {
        let snapshot = agent.get_state().await.unwrap();
        if check(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

async fn turns(agent: &AgentRef, expected: u64) {
    for _ in 0..400 {
        if agent.info().await.unwrap().turns >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {expected} turns");
}

fn sig(signal_type: &str) -> Signal {
    Signal::new(signal_type, json!({}))
}

// --- Queue and ordering ---

#[tokio::test]
async fn signals_are_processed_in_delivery_order() {
    let agent = AgentServer::new(agent("a", recorder())).start().unwrap();
    for t in ["s1", "s2", "s3"] {
        agent.deliver(sig(t)).await.unwrap();
    }
    let snapshot = eventually(&agent, "three turns", |a| {
        a.state()["seen"].as_array().is_some_and(|s| s.len() == 3)
    })
    .await;
    assert_eq!(snapshot.state()["seen"], json!(["s1", "s2", "s3"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_never_overlap_turns() {
    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 25;

    let in_turn = Arc::new(AtomicBool::new(false));
    let overlapped = Arc::new(AtomicBool::new(false));
    let runner = {
        let in_turn = in_turn.clone();
        let overlapped = overlapped.clone();
        SimpleRunner::new("exclusive", move |mut state, signal| {
            if in_turn.swap(true, Ordering::SeqCst) {
                overlapped.store(true, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_micros(200));
            if !state["seen"].is_array() {
                state["seen"] = json!([]);
            }
            if let Some(seen) = state["seen"].as_array_mut() {
                seen.push(signal.data.clone());
            }
            in_turn.store(false, Ordering::SeqCst);
            Decision::state_only(state)
        })
    };
    let agent = AgentServer::new(agent("a", runner)).start().unwrap();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let agent = agent.clone();
            tokio::spawn(async move {
                for seq in 0..PER_PRODUCER {
                    let signal = Signal::new("work", json!({"producer": producer, "seq": seq}));
                    if producer % 2 == 0 {
                        agent.send(signal).unwrap();
                        tokio::task::yield_now().await;
                    } else {
                        agent.deliver(signal).await.unwrap();
                    }
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    let total = (PRODUCERS * PER_PRODUCER) as usize;
    let snapshot = eventually(&agent, "every signal", |a| {
        a.state()["seen"].as_array().is_some_and(|s| s.len() == total)
    })
    .await;
    assert!(!overlapped.load(Ordering::SeqCst));
    assert_eq!(agent.info().await.unwrap().turns, PRODUCERS * PER_PRODUCER);

    let seen = snapshot.state()["seen"].as_array().unwrap();
    for producer in 0..PRODUCERS {
        let order: Vec<u64> = seen
            .iter()
            .filter(|d| d["producer"] == json!(producer))
            .filter_map(|d| d["seq"].as_u64())
            .collect();
        assert_eq!(order, (0..PER_PRODUCER).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn overflow_rejects_and_leaves_queue_unchanged() {
    let hook = Arc::new(RecordingHook::at(&[HookPoint::SignalDropped]));
    let agent = AgentServer::new(agent("a", recorder()))
        .config(step_mode().with_max_queue_size(2))
        .hook(hook.clone())
        .start()
        .unwrap();

    agent.deliver(sig("a")).await.unwrap();
    agent.deliver(sig("b")).await.unwrap();
    let err = agent.deliver(sig("c")).await.unwrap_err();
    assert!(matches!(err, ServerError::QueueOverflow { capacity: 2 }));
    assert_eq!(err.kind(), ErrorKind::Overflow);
    assert_eq!(agent.info().await.unwrap().queue_len, 2);

    let dropped = hook.events_at(HookPoint::SignalDropped);
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].signal_type.as_deref(), Some("c"));

    assert!(agent.step().await.unwrap());
    assert!(agent.step().await.unwrap());
    assert!(!agent.step().await.unwrap());
    assert_eq!(agent.get_state().await.unwrap().state()["seen"], json!(["a", "b"]));
}

#[tokio::test]
async fn malformed_signals_are_rejected() {
    let agent = AgentServer::new(agent("a", recorder())).start().unwrap();
    let err = agent.deliver(sig("")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// --- Modes ---

#[tokio::test]
async fn unknown_mode_leaves_mode_unchanged() {
    let agent = AgentServer::new(agent("a", recorder()))
        .config(step_mode())
        .start()
        .unwrap();
    let err = agent.set_mode("bogus").await.unwrap_err();
    assert!(matches!(err, ServerError::UnsupportedMode(ref m) if m == "bogus"));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(agent.info().await.unwrap().mode, Mode::Step);
}

#[tokio::test]
async fn step_then_auto_drains_each_signal_once() {
    let agent = AgentServer::new(agent("a", recorder()))
        .config(step_mode())
        .start()
        .unwrap();
    for _ in 0..3 {
        agent.deliver(sig("inc")).await.unwrap();
    }
    assert!(agent.step().await.unwrap());
    let info = agent.info().await.unwrap();
    assert_eq!(info.turns, 1);
    assert_eq!(info.queue_len, 2);

    assert_eq!(agent.set_mode("auto").await.unwrap(), Mode::Auto);
    turns(&agent, 3).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let info = agent.info().await.unwrap();
    assert_eq!(info.turns, 3);
    assert_eq!(info.queue_len, 0);
    assert_eq!(agent.get_state().await.unwrap().state()["count"], json!(3));
    assert!(!agent.step().await.unwrap());
}

#[tokio::test]
async fn debug_mode_traces_every_turn() {
    let hook = Arc::new(RecordingHook::new());
    let agent = AgentServer::new(agent("a", recorder()))
        .config(ServerConfig::default().with_mode(Mode::Debug))
        .hook(hook.clone())
        .start()
        .unwrap();
    agent.deliver(sig("inc")).await.unwrap();
    assert_eq!(agent.info().await.unwrap().turns, 0);
    assert!(agent.step().await.unwrap());

    let traces = hook.events_at(HookPoint::Trace);
    assert_eq!(traces.len(), 1);
    assert!(traces[0].traced);
    assert_eq!(traces[0].signal_type.as_deref(), Some("inc"));

    agent.set_mode("step").await.unwrap();
    agent.deliver(sig("inc")).await.unwrap();
    agent.step().await.unwrap();
    assert_eq!(hook.events_at(HookPoint::Trace).len(), 1);
    assert_eq!(hook.events_at(HookPoint::ModeChanged).len(), 1);
    assert_eq!(hook.events_at(HookPoint::TurnCompleted).len(), 2);
}

// --- Timers ---

fn timer_runner(delay_ms: u64) -> SimpleRunner {
    SimpleRunner::new("timers", move |mut state, signal| match signal.signal_type.as_str() {
        "arm" => Decision::state_only(state)
            .with_effect(Effect::timer_keyed(delay_ms, sig("tick"), "retry")),
        "tick" => {
            let ticks = state["ticks"].as_u64().unwrap_or(0);
            state["ticks"] = json!(ticks + 1);
            Decision::state_only(state)
        }
        _ => Decision::state_only(state),
    })
}

#[tokio::test]
async fn rearming_a_timer_key_keeps_one_timer() {
    let agent = AgentServer::new(agent("a", timer_runner(10_000)))
        .start()
        .unwrap();
    agent.deliver(sig("arm")).await.unwrap();
    agent.deliver(sig("arm")).await.unwrap();
    turns(&agent, 2).await;
    assert_eq!(agent.info().await.unwrap().timers, vec![TimerKey::new("retry")]);
}

#[tokio::test]
async fn deduplicated_timer_fires_once() {
    let agent = AgentServer::new(agent("a", timer_runner(60)))
        .start()
        .unwrap();
    agent.deliver(sig("arm")).await.unwrap();
    agent.deliver(sig("arm")).await.unwrap();
    eventually(&agent, "a tick", |a| a.state()["ticks"] == json!(1)).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(agent.get_state().await.unwrap().state()["ticks"], json!(1));
    assert!(agent.info().await.unwrap().timers.is_empty());
}

// --- Actions ---

/// Runs `action` on `go` and stores every outcome signal's data.
fn action_runner(run: Effect) -> SimpleRunner {
    SimpleRunner::new("actions", move |mut state, signal| match signal.signal_type.as_str() {
        "go" => Decision::state_only(state).with_effect(run.clone()),
        "action_result" | "action_error" | "timeout_fired" => {
            state[signal.signal_type.as_str()] = signal.data.clone();
            Decision::state_only(state)
        }
        _ => Decision::state_only(state),
    })
}

#[tokio::test]
async fn action_result_arrives_in_a_later_turn() {
    let runner = action_runner(Effect::run("echo", json!({"x": 1})));
    let agent = Agent::builder("a", Arc::new(runner)).action("echo").build();
    let agent = AgentServer::new(agent)
        .action(Arc::new(EchoAction::new("echo")))
        .start()
        .unwrap();
    agent.deliver(sig("go")).await.unwrap();
    let snapshot = eventually(&agent, "action_result", |a| {
        !a.state()["action_result"].is_null()
    })
    .await;
    assert_eq!(snapshot.state()["action_result"]["action"], json!("echo"));
    assert_eq!(snapshot.state()["action_result"]["result"], json!({"x": 1}));
    assert_eq!(snapshot.state()["action_result"]["directives"], json!([]));
    assert_eq!(
        snapshot.state()["action_result"]["instruction"],
        json!({"action": "echo", "params": {"x": 1}, "context": null})
    );
    assert_eq!(agent.info().await.unwrap().turns, 2);
}

#[tokio::test]
async fn disallowed_action_reports_action_error() {
    let runner = action_runner(Effect::run("echo", json!({})));
    let agent = AgentServer::new(agent("a", runner))
        .action(Arc::new(EchoAction::new("echo")))
        .start()
        .unwrap();
    agent.deliver(sig("go")).await.unwrap();
    let snapshot = eventually(&agent, "action_error", |a| {
        !a.state()["action_error"].is_null()
    })
    .await;
    assert_eq!(snapshot.state()["action_error"]["action"], json!("echo"));
    assert_eq!(snapshot.state()["action_error"]["kind"], json!("action"));
}

#[tokio::test]
async fn unregistered_action_reports_action_error() {
    let runner = action_runner(Effect::run("ghost", json!({})));
    let agent = Agent::builder("a", Arc::new(runner)).action("ghost").build();
    let agent = AgentServer::new(agent).start().unwrap();
    agent.deliver(sig("go")).await.unwrap();
    eventually(&agent, "action_error", |a| !a.state()["action_error"].is_null()).await;
}

#[tokio::test]
async fn slow_action_reports_timeout_fired() {
    let run = Effect::Run(
        Instruction::new("slow", json!({})).with_opts(RunOpts::default().with_timeout_ms(20)),
    );
    let agent = Agent::builder("a", Arc::new(action_runner(run)))
        .action("slow")
        .build();
    let agent = AgentServer::new(agent)
        .action(Arc::new(SlowAction::new("slow", Duration::from_secs(5))))
        .start()
        .unwrap();
    agent.deliver(sig("go")).await.unwrap();
    let snapshot = eventually(&agent, "timeout_fired", |a| {
        !a.state()["timeout_fired"].is_null()
    })
    .await;
    assert_eq!(snapshot.state()["timeout_fired"]["kind"], json!("timeout"));
    assert_eq!(snapshot.state()["timeout_fired"]["timeout_ms"], json!(20));
    assert_eq!(snapshot.state()["timeout_fired"]["instruction"]["action"], json!("slow"));
    assert_eq!(agent.info().await.unwrap().actions_in_flight, 0);
}

#[tokio::test]
async fn routes_pick_an_action_for_ignored_signals() {
    let runner = SimpleRunner::new("routed", |mut state, signal| {
        if signal.is("action_result") {
            state["routed"] = signal.data["result"].clone();
        }
        Decision::state_only(state)
    });
    let agent = Agent::builder("a", Arc::new(runner))
        .action("echo")
        .route("order.*", "echo")
        .build();
    let agent = AgentServer::new(agent)
        .action(Arc::new(EchoAction::new("echo")))
        .start()
        .unwrap();
    agent
        .deliver(Signal::new("order.placed", json!({"id": 7})))
        .await
        .unwrap();
    eventually(&agent, "routed result", |a| a.state()["routed"] == json!({"id": 7})).await;
}

// --- Calls ---

fn pinger() -> SimpleRunner {
    SimpleRunner::new("pinger", |mut state, signal| match signal.signal_type.as_str() {
        "ping" => Decision::state_only(state).with_effect(Effect::reply(signal, "pong", json!({"n": 1}))),
        "mute" => {
            state["muted"] = json!(true);
            Decision::state_only(state)
        }
        _ => Decision::state_only(state),
    })
}

#[tokio::test]
async fn call_gets_the_reply() {
    let agent = AgentServer::new(agent("a", pinger())).start().unwrap();
    let request = sig("ping").with_correlation_id("req-1");
    let reply = agent.call(request).await.unwrap();
    assert_eq!(reply.signal_type, "pong");
    assert_eq!(reply.data, json!({"n": 1}));
    assert_eq!(reply.correlation_id.as_ref().map(|c| c.as_str()), Some("req-1"));
    assert_eq!(agent.info().await.unwrap().pending_calls, 0);
}

#[tokio::test]
async fn duplicate_pending_correlation_id_is_rejected() {
    let agent = AgentServer::new(agent("a", pinger()))
        .config(step_mode())
        .start()
        .unwrap();
    let first = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.call(sig("ping").with_correlation_id("req-1")).await })
    };
    for _ in 0..400 {
        if agent.info().await.unwrap().pending_calls == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(agent.info().await.unwrap().pending_calls, 1);

    let err = agent
        .call(sig("ping").with_correlation_id("req-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::DuplicateCall(ref id) if id.as_str() == "req-1"));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(agent.info().await.unwrap().queue_len, 1);

    assert!(agent.step().await.unwrap());
    let reply = first.await.unwrap().unwrap();
    assert_eq!(reply.signal_type, "pong");
}

#[tokio::test]
async fn call_without_any_outcome_fails_fast_with_routing() {
    let agent = AgentServer::new(agent("a", pinger()))
        .config(ServerConfig::default().with_call_timeout_ms(10_000))
        .start()
        .unwrap();
    let err = agent.call(sig("nobody.home")).await.unwrap_err();
    assert!(matches!(err, ServerError::Routing(ref t) if t == "nobody.home"));
    assert_eq!(err.kind(), ErrorKind::Routing);
}

#[tokio::test]
async fn call_without_reply_times_out() {
    let agent = AgentServer::new(agent("a", pinger())).start().unwrap();
    let err = agent
        .call_with_timeout(sig("mute"), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::Timeout(50)));
    for _ in 0..100 {
        if agent.info().await.unwrap().pending_calls == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("pending call was not cancelled");
}

// --- Effects ---

#[tokio::test]
async fn failing_emit_halts_the_rest_of_the_turn() {
    let runner = SimpleRunner::new("emitter", |state, signal| {
        if !signal.is("go") {
            return Decision::state_only(state);
        }
        Decision::state_only(state)
            .with_effect(Effect::emit("first", json!({})))
            .with_effect(Effect::Emit {
                signal_type: "second".into(),
                data: json!({}),
                source: None,
                destination: Some(Destination::new("fail")),
            })
            .with_effect(Effect::emit("third", json!({})))
    });
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let hook = Arc::new(RecordingHook::new());
    let agent = AgentServer::new(agent("a", runner))
        .config(step_mode().with_default_destination(Destination::new("log")))
        .dispatcher(dispatcher.clone())
        .hook(hook.clone())
        .start()
        .unwrap();
    agent.deliver(sig("go")).await.unwrap();
    agent.step().await.unwrap();

    assert_eq!(dispatcher.signal_types(), vec!["first"]);
    let failed = hook.events_at(HookPoint::EffectFailed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].effect.as_deref(), Some("emit"));
    assert_eq!(failed[0].error.as_ref().map(|(k, _)| *k), Some(ErrorKind::Internal));
    assert_eq!(hook.events_at(HookPoint::TurnCompleted).len(), 1);
    assert_eq!(agent.info().await.unwrap().status, Status::Idle);
}

#[tokio::test]
async fn emitted_signals_carry_source_and_correlation() {
    let runner = SimpleRunner::new("emitter", |state, signal| {
        Decision::state_only(state).with_effect(Effect::emit(
            format!("{}.done", signal.signal_type),
            json!({}),
        ))
    });
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let agent = AgentServer::new(agent("emitter-1", runner))
        .config(step_mode().with_default_destination(Destination::new("log")))
        .dispatcher(dispatcher.clone())
        .start()
        .unwrap();
    agent
        .deliver(sig("job").with_correlation_id("c-9"))
        .await
        .unwrap();
    agent.step().await.unwrap();

    let delivered = dispatcher.delivered();
    assert_eq!(delivered.len(), 1);
    let (signal, destination) = &delivered[0];
    assert_eq!(signal.signal_type, "job.done");
    assert_eq!(signal.source.as_deref(), Some("emitter-1"));
    assert_eq!(signal.correlation_id.as_ref().map(|c| c.as_str()), Some("c-9"));
    assert_eq!(destination.adapter, "log");
}

#[tokio::test]
async fn registering_an_unknown_action_halts_the_turn() {
    let runner = SimpleRunner::new("registrar", |state, _| {
        Decision::state_only(state)
            .with_effect(Effect::RegisterAction {
                action: "echo".into(),
            })
            .with_effect(Effect::RegisterAction {
                action: "ghost".into(),
            })
            .with_effect(Effect::RegisterAction {
                action: "never".into(),
            })
    });
    let hook = Arc::new(RecordingHook::at(&[HookPoint::EffectFailed]));
    let agent = AgentServer::new(agent("a", runner))
        .config(step_mode())
        .action(Arc::new(EchoAction::new("echo")))
        .action(Arc::new(EchoAction::new("never")))
        .hook(hook.clone())
        .start()
        .unwrap();
    agent.deliver(sig("go")).await.unwrap();
    agent.step().await.unwrap();

    let snapshot = agent.get_state().await.unwrap();
    assert!(snapshot.can_run(&"echo".into()));
    assert!(!snapshot.can_run(&"ghost".into()));
    assert!(!snapshot.can_run(&"never".into()));
    assert_eq!(hook.events_at(HookPoint::EffectFailed).len(), 1);
}

#[tokio::test]
async fn routes_and_actions_change_through_effects() {
    let runner = SimpleRunner::new("wiring", |state, signal| match signal.signal_type.as_str() {
        "wire" => Decision::state_only(state)
            .with_effect(Effect::AddRoute {
                path: "job.*".into(),
                target: "echo".into(),
            })
            .with_effect(Effect::DeregisterAction {
                action: "old".into(),
            }),
        "unwire" => Decision::state_only(state).with_effect(Effect::RemoveRoute {
            path: "job.*".into(),
        }),
        _ => Decision::state_only(state),
    });
    let agent = Agent::builder("a", Arc::new(runner)).action("old").build();
    let agent = AgentServer::new(agent).config(step_mode()).start().unwrap();

    agent.deliver(sig("wire")).await.unwrap();
    agent.step().await.unwrap();
    let snapshot = agent.get_state().await.unwrap();
    assert_eq!(snapshot.route("job.run").map(|a| a.as_str()), Some("echo"));
    assert!(!snapshot.can_run(&"old".into()));

    agent.deliver(sig("unwire")).await.unwrap();
    agent.step().await.unwrap();
    assert!(agent.get_state().await.unwrap().routes().is_empty());
}

// --- Children ---

#[tokio::test]
async fn spawn_replaces_and_kill_stops_children() {
    let runner = SimpleRunner::new("parent", |state, signal| match signal.signal_type.as_str() {
        "spawn" => Decision::state_only(state).with_effect(Effect::Spawn {
            spec: ChildSpec::new("worker", "task"),
            args: Value::Null,
        }),
        "kill" => Decision::state_only(state).with_effect(Effect::Kill {
            child: "worker".into(),
        }),
        _ => Decision::state_only(state),
    });
    let supervisor = Arc::new(RecordingSupervisor::new());
    let agent = AgentServer::new(agent("a", runner))
        .config(step_mode())
        .supervisor(supervisor.clone())
        .start()
        .unwrap();

    agent.deliver(sig("spawn")).await.unwrap();
    agent.step().await.unwrap();
    assert_eq!(agent.info().await.unwrap().children, vec![ChildTag::new("worker")]);
    assert_eq!(supervisor.running().len(), 1);

    agent.deliver(sig("spawn")).await.unwrap();
    agent.step().await.unwrap();
    assert_eq!(supervisor.running().len(), 1);
    assert_eq!(supervisor.stopped().len(), 1);

    agent.deliver(sig("kill")).await.unwrap();
    agent.step().await.unwrap();
    assert!(agent.info().await.unwrap().children.is_empty());
    assert!(supervisor.running().is_empty());

    agent.deliver(sig("kill")).await.unwrap();
    agent.step().await.unwrap();
    assert_eq!(supervisor.stopped().len(), 2);
}

// --- Failure and lifecycle ---

#[tokio::test]
async fn runner_panic_moves_to_error_until_resumed() {
    let runner = SimpleRunner::new("fragile", |mut state, signal| {
        if signal.is("boom") {
            panic!("boom");
        }
        state["ok"] = json!(true);
        Decision::state_only(state)
    });
    let hook = Arc::new(RecordingHook::at(&[HookPoint::RunnerPanicked]));
    let agent = AgentServer::new(agent("a", runner))
        .hook(hook.clone())
        .start()
        .unwrap();
    let before = agent.get_state().await.unwrap();

    agent.deliver(sig("boom")).await.unwrap();
    let mut status = Status::Idle;
    for _ in 0..200 {
        status = agent.info().await.unwrap().status;
        if status == Status::Error {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(status, Status::Error);
    assert_eq!(hook.events_at(HookPoint::RunnerPanicked).len(), 1);
    assert_eq!(agent.get_state().await.unwrap().state(), before.state());

    let err = agent.step().await.unwrap_err();
    assert!(matches!(err, ServerError::InvalidState { status: Status::Error }));

    agent.deliver(sig("fine")).await.unwrap();
    assert_eq!(agent.info().await.unwrap().queue_len, 1);
    agent.resume().await.unwrap();
    eventually(&agent, "recovery", |a| a.state()["ok"] == json!(true)).await;
}

#[tokio::test]
async fn pause_holds_turns_until_resume() {
    let agent = AgentServer::new(agent("a", recorder())).start().unwrap();
    agent.pause().await.unwrap();
    agent.deliver(sig("inc")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    let info = agent.info().await.unwrap();
    assert_eq!(info.status, Status::Paused);
    assert_eq!(info.turns, 0);
    assert!(matches!(
        agent.step().await,
        Err(ServerError::InvalidState { status: Status::Paused })
    ));

    agent.resume().await.unwrap();
    turns(&agent, 1).await;
}

struct Lifecycle {
    terminated: Arc<AtomicBool>,
}

impl AgentHooks for Lifecycle {
    fn mount(&self, mut state: Value) -> Decision {
        state["mounted"] = json!(true);
        Decision::state_only(state).with_effect(Effect::emit("agent.mounted", json!({})))
    }

    fn terminate(&self, _reason: &StopReason, _state: &Value) {
        self.terminated.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn mount_effects_run_before_the_first_signal() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let agent = Agent::builder("a", Arc::new(recorder()))
        .hooks(Arc::new(Lifecycle {
            terminated: Arc::new(AtomicBool::new(false)),
        }))
        .build();
    let agent = AgentServer::new(agent)
        .config(ServerConfig::default().with_default_destination(Destination::new("log")))
        .dispatcher(dispatcher.clone())
        .start()
        .unwrap();

    let snapshot = agent.get_state().await.unwrap();
    assert_eq!(snapshot.state()["mounted"], json!(true));
    assert_eq!(dispatcher.signal_types(), vec!["agent.mounted"]);
}

#[tokio::test]
async fn stop_cleans_up_everything() {
    let runner = SimpleRunner::new("busy", |state, signal| {
        if !signal.is("start") {
            return Decision::state_only(state);
        }
        Decision::state_only(state)
            .with_effect(Effect::Spawn {
                spec: ChildSpec::new("worker", "task"),
                args: Value::Null,
            })
            .with_effect(Effect::timer_keyed(10_000, sig("later"), "t"))
            .with_effect(Effect::run("slow", json!({})))
    });
    let terminated = Arc::new(AtomicBool::new(false));
    let agent = Agent::builder("a", Arc::new(runner))
        .action("slow")
        .hooks(Arc::new(Lifecycle {
            terminated: terminated.clone(),
        }))
        .build();
    let supervisor = Arc::new(RecordingSupervisor::new());
    let agent = AgentServer::new(agent)
        .config(step_mode())
        .action(Arc::new(SlowAction::new("slow", Duration::from_secs(60))))
        .supervisor(supervisor.clone())
        .start()
        .unwrap();

    agent.deliver(sig("start")).await.unwrap();
    agent.step().await.unwrap();
    let info = agent.info().await.unwrap();
    assert_eq!(info.children.len(), 1);
    assert_eq!(info.timers.len(), 1);
    assert_eq!(info.actions_in_flight, 1);

    agent.deliver(sig("queued")).await.unwrap();
    agent.stop(StopReason::Normal).await.unwrap();

    assert!(terminated.load(Ordering::SeqCst));
    assert!(supervisor.running().is_empty());
    assert_eq!(supervisor.stopped().len(), 1);
    let err = agent.deliver(sig("late")).await.unwrap_err();
    assert!(matches!(err, ServerError::InvalidState { status: Status::Terminated }));
    assert!(agent.info().await.is_err());
}

#[tokio::test]
async fn stop_fails_pending_calls() {
    let agent = AgentServer::new(agent("a", pinger()))
        .config(step_mode())
        .start()
        .unwrap();
    let caller = agent.clone();
    let call = tokio::spawn(async move { caller.call(sig("ping")).await });
    for _ in 0..200 {
        if agent.info().await.unwrap().pending_calls == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    agent.stop(StopReason::Normal).await.unwrap();
    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, ServerError::InvalidState { status: Status::Terminated }));
}

// --- Replay ---

#[tokio::test]
async fn replay_log_reproduces_every_turn() {
    let log = Arc::new(MemoryReplayLog::new());
    let agent = AgentServer::new(agent("a", recorder()))
        .replay_log(log.clone())
        .start()
        .unwrap();
    for t in ["inc", "other", "inc"] {
        agent.deliver(sig(t)).await.unwrap();
    }
    turns(&agent, 3).await;

    let snapshot = agent.get_state().await.unwrap();
    let records = log.records();
    assert_eq!(records.len(), 3);
    assert_eq!(
        records.iter().map(|r| r.turn).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    for record in &records {
        snapshot.verify_replay(record).unwrap();
    }
    assert_eq!(&records[2].state_after, snapshot.state());
}

#[tokio::test]
async fn routed_turns_replay_after_the_route_is_removed() {
    let runner = SimpleRunner::new("router", |state, signal| {
        if signal.is("unwire") {
            return Decision::state_only(state).with_effect(Effect::RemoveRoute {
                path: "order.*".into(),
            });
        }
        Decision::state_only(state)
    });
    let agent = Agent::builder("a", Arc::new(runner))
        .action("echo")
        .route("order.*", "echo")
        .build();
    let log = Arc::new(MemoryReplayLog::new());
    let agent = AgentServer::new(agent)
        .config(step_mode())
        .action(Arc::new(EchoAction::new("echo")))
        .replay_log(log.clone())
        .start()
        .unwrap();

    agent
        .deliver(Signal::new("order.placed", json!({"id": 7})))
        .await
        .unwrap();
    agent.deliver(sig("unwire")).await.unwrap();
    assert!(agent.step().await.unwrap());
    assert!(agent.step().await.unwrap());

    let snapshot = agent.get_state().await.unwrap();
    assert!(snapshot.routes().is_empty());
    let records = log.records();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].effects,
        vec![Effect::Run(
            Instruction::new("echo", json!({"id": 7}))
                .with_context(json!({"routed": "order.placed"}))
        )]
    );
    for record in &records {
        snapshot.verify_replay(record).unwrap();
    }
}
