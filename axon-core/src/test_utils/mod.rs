//! In-memory doubles for testing.
//!
//! Available behind the `test-utils` feature flag. Each double records
//! what it saw so tests can assert on it afterwards.

mod echo_action;
mod failing_action;
mod recording_dispatcher;
mod recording_hook;
mod recording_supervisor;
mod slow_action;

pub use echo_action::EchoAction;
pub use failing_action::{FailingAction, FlakyAction};
pub use recording_dispatcher::RecordingDispatcher;
pub use recording_hook::{RecordedEvent, RecordingHook};
pub use recording_supervisor::RecordingSupervisor;
pub use slow_action::SlowAction;
