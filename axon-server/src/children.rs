//! A child supervisor backed by tokio tasks.

use async_trait::async_trait;
use axon_core::{ChildRef, ChildSpec, ChildSupervisor, SupervisorError};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;

/// The body of a child task.
pub type ChildFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type ChildFactory = dyn Fn(ChildSpec, Value) -> ChildFuture + Send + Sync;

/// Runs each child as a tokio task built by a factory registered for
/// the child's kind.
///
/// Stopping aborts the task. A child that finished on its own stays
/// registered until it is stopped; stopping it then is a no-op.
#[derive(Default)]
pub struct TaskSupervisor {
    kinds: BTreeMap<String, Arc<ChildFactory>>,
    running: Mutex<HashMap<ChildRef, AbortHandle>>,
}

impl TaskSupervisor {
    /// Create a supervisor that knows no kinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for `kind`.
    pub fn kind<F, Fut>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        F: Fn(ChildSpec, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed = move |spec: ChildSpec, args: Value| -> ChildFuture {
            Box::pin(factory(spec, args))
        };
        self.kinds.insert(kind.into(), Arc::new(boxed));
        self
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// Children whose task is still running.
    pub fn running(&self) -> Vec<ChildRef> {
        let mut running: Vec<ChildRef> = self
            .lock()
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(child, _)| child.clone())
            .collect();
        running.sort();
        running
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChildRef, AbortHandle>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChildSupervisor for TaskSupervisor {
    async fn start(&self, spec: &ChildSpec, args: Value) -> Result<ChildRef, SupervisorError> {
        let factory = self
            .kinds
            .get(&spec.kind)
            .ok_or_else(|| SupervisorError::UnknownKind(spec.kind.clone()))?;
        let child = ChildRef::new(format!("{}-{}", spec.tag, uuid::Uuid::new_v4()));
        let task = tokio::spawn(factory(spec.clone(), args));
        self.lock().insert(child.clone(), task.abort_handle());
        tracing::debug!(child = %child, kind = %spec.kind, "axon.child.started");
        Ok(child)
    }

    async fn stop(&self, child: &ChildRef) -> Result<(), SupervisorError> {
        let handle = self.lock().remove(child);
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!(child = %child, "axon.child.stopped");
        }
        Ok(())
    }
}

impl std::fmt::Debug for TaskSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSupervisor")
            .field("kinds", &self.kinds.keys().collect::<Vec<_>>())
            .field("children", &self.lock().len())
            .finish()
    }
}
