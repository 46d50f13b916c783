//! RecordingSupervisor — tracks starts and stops without running anything.

use crate::effect::ChildSpec;
use crate::error::SupervisorError;
use crate::id::ChildRef;
use crate::supervisor::ChildSupervisor;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Mutex;

/// A supervisor that only bookkeeps. Child kind `broken` fails to start.
#[derive(Default)]
pub struct RecordingSupervisor {
    next: Mutex<u64>,
    running: Mutex<BTreeSet<ChildRef>>,
    stopped: Mutex<Vec<ChildRef>>,
}

impl RecordingSupervisor {
    /// Create an empty supervisor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Children started and not yet stopped.
    pub fn running(&self) -> Vec<ChildRef> {
        self.running.lock().unwrap().iter().cloned().collect()
    }

    /// Children stopped so far, in order.
    pub fn stopped(&self) -> Vec<ChildRef> {
        self.stopped.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChildSupervisor for RecordingSupervisor {
    async fn start(&self, spec: &ChildSpec, _args: Value) -> Result<ChildRef, SupervisorError> {
        if spec.kind == "broken" {
            return Err(SupervisorError::StartFailed(format!("{} is broken", spec.tag)));
        }
        let mut next = self.next.lock().unwrap();
        *next += 1;
        let child = ChildRef::new(format!("{}#{}", spec.tag, *next));
        self.running.lock().unwrap().insert(child.clone());
        Ok(child)
    }

    async fn stop(&self, child: &ChildRef) -> Result<(), SupervisorError> {
        self.running.lock().unwrap().remove(child);
        self.stopped.lock().unwrap().push(child.clone());
        Ok(())
    }
}
