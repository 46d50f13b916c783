//! The child supervision boundary.

use crate::effect::ChildSpec;
use crate::error::SupervisorError;
use crate::id::ChildRef;
use async_trait::async_trait;
use serde_json::Value;

/// Starts and stops tracked children on behalf of an agent server.
///
/// The server records the returned [`ChildRef`] under the spec's tag and
/// hands it back to [`stop`](ChildSupervisor::stop) on `Kill` or
/// shutdown. Restart policies are the supervisor's business.
#[async_trait]
pub trait ChildSupervisor: Send + Sync {
    /// Start a child.
    async fn start(&self, spec: &ChildSpec, args: Value) -> Result<ChildRef, SupervisorError>;

    /// Stop a child. Stopping an already finished child is not an error.
    async fn stop(&self, child: &ChildRef) -> Result<(), SupervisorError>;
}
