use super::{PROVISION_WAIT_TIMEOUT, QUICK_STEP_TIMEOUT, WAIT_HEARTBEAT_TIMEOUT};
use crate::cluster::ClusterSpec;
use crate::error::Result;
use crate::step::RunContext;
use crate::steps::{ClusterTarget, StackTarget, StepRegistry};
use serde::{Deserialize, Serialize};

/// Input of the [`delete_cluster`] workflow.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteClusterInput {
    pub cluster: ClusterSpec,
}

/// Tear down a cluster in reverse dependency order: node group stacks, then
/// the control plane, then the network stack.
///
/// Workloads are not drained first; that is the caller's responsibility.
pub async fn delete_cluster(
    run: &RunContext,
    steps: &StepRegistry,
    input: DeleteClusterInput,
) -> Result<()> {
    input.cluster.validate()?;

    let cluster = &input.cluster;

    for node_group in &cluster.node_groups {
        let stack_name = cluster.node_group_stack_name(node_group);

        {
            let ctx = run.step("delete-node-group-stack", QUICK_STEP_TIMEOUT);
            steps.stacks.delete_stack(&ctx, &stack_name).await?;
        }

        {
            let ctx = run.waiting_step(
                "await-node-group-stack-deleted",
                PROVISION_WAIT_TIMEOUT,
                WAIT_HEARTBEAT_TIMEOUT,
            );
            steps
                .stacks
                .wait_for_stack(&ctx, &stack_name, StackTarget::DeleteComplete)
                .await?;
        }
    }

    {
        let ctx = run.step("delete-cluster", QUICK_STEP_TIMEOUT);
        steps.control_plane.delete_cluster(&ctx, &cluster.name).await?;
    }

    {
        let ctx = run.waiting_step(
            "await-cluster-deleted",
            PROVISION_WAIT_TIMEOUT,
            WAIT_HEARTBEAT_TIMEOUT,
        );
        steps
            .control_plane
            .wait_for_cluster(&ctx, &cluster.name, ClusterTarget::Deleted)
            .await?;
    }

    let network_stack_name = cluster.network_stack_name();

    {
        let ctx = run.step("delete-network-stack", QUICK_STEP_TIMEOUT);
        steps.stacks.delete_stack(&ctx, &network_stack_name).await?;
    }

    {
        let ctx = run.waiting_step(
            "await-network-stack-deleted",
            PROVISION_WAIT_TIMEOUT,
            WAIT_HEARTBEAT_TIMEOUT,
        );
        steps
            .stacks
            .wait_for_stack(&ctx, &network_stack_name, StackTarget::DeleteComplete)
            .await?;
    }

    Ok(())
}
