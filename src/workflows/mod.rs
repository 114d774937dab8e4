/*!

The three lifecycle workflows: cluster creation, cluster deletion, and
rolling node group replacement. Each is a deterministic sequence of
dispatched steps with fixed per-step budgets; all side effects happen inside
steps, so a run interrupted at any point resumes without repeating committed
work.

!*/

mod create;
mod delete;
mod update;

pub use create::{create_cluster, CreateClusterInput};
pub use delete::{delete_cluster, DeleteClusterInput};
pub use update::{update_node_group, UpdateNodeGroupInput};

use std::time::Duration;

/// Budget for steps that complete in one request.
pub(crate) const QUICK_STEP_TIMEOUT: Duration = Duration::from_secs(15);

/// Budget for waiting on stack and control plane transitions.
pub(crate) const PROVISION_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Liveness budget during long waits.
pub(crate) const WAIT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);

/// Budget for draining one node.
pub(crate) const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Budget for detaching an instance from its scaling group.
pub(crate) const DETACH_TIMEOUT: Duration = Duration::from_secs(60);

/// Budget for waiting on one instance to terminate.
pub(crate) const TERMINATION_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Pause after each node replacement, standing in for a readiness check on
/// the replacement node.
pub(crate) const NODE_REPLACEMENT_PAUSE: Duration = Duration::from_secs(60);
