use super::{
    DETACH_TIMEOUT, DRAIN_TIMEOUT, NODE_REPLACEMENT_PAUSE, PROVISION_WAIT_TIMEOUT,
    QUICK_STEP_TIMEOUT, TERMINATION_WAIT_TIMEOUT, WAIT_HEARTBEAT_TIMEOUT,
};
use crate::error::{Error, Result};
use crate::outputs::StackOutputs;
use crate::step::RunContext;
use crate::steps::nodes::NodeIdentity;
use crate::steps::{StackParameter, StackTarget, StepRegistry, UpdateStackRequest};
use crate::templates;
use log::info;
use serde::{Deserialize, Serialize};

/// Input of the [`update_node_group`] workflow.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNodeGroupInput {
    pub cluster_name: String,
    pub node_group_name: String,
    pub kubernetes_version: String,
}

impl UpdateNodeGroupInput {
    pub fn validate(&self) -> Result<()> {
        if self.cluster_name.is_empty() {
            return Err(Error::MissingClusterName);
        }

        if self.node_group_name.is_empty() {
            return Err(Error::MissingTargetNodeGroup);
        }

        if self.kubernetes_version.is_empty() {
            return Err(Error::MissingKubernetesVersion);
        }

        Ok(())
    }
}

/// Roll a node group onto the machine image of a new Kubernetes version
/// without recreating the group.
///
/// The stack update pins every parameter to its previous value except the
/// image parameter. Nodes are then replaced strictly one at a time - drain,
/// remove from the cluster, detach from the scaling group (which launches a
/// replacement), terminate - to bound the blast radius of a bad image.
pub async fn update_node_group(
    run: &RunContext,
    steps: &StepRegistry,
    input: UpdateNodeGroupInput,
) -> Result<()> {
    input.validate()?;

    let stack_name = format!("{}-{}", input.cluster_name, input.node_group_name);

    // Update the node group stack with the new machine image.
    {
        let previous = [
            "ClusterName",
            "NodeGroupName",
            "VpcId",
            "Subnets",
            "ClusterControlPlaneSecurityGroup",
            "KeyName",
        ];
        let mut parameters: Vec<StackParameter> = previous
            .iter()
            .map(|key| StackParameter::Previous {
                key: key.to_string(),
            })
            .collect();
        parameters.push(StackParameter::Value {
            key: "NodeImageIdSSMParam".to_string(),
            value: format!(
                "/aws/service/eks/optimized-ami/{}/amazon-linux-2/recommended/image_id",
                input.kubernetes_version
            ),
        });

        let ctx = run.step("update-node-group-stack", QUICK_STEP_TIMEOUT);
        steps
            .stacks
            .update_stack(
                &ctx,
                UpdateStackRequest {
                    stack_name: stack_name.clone(),
                    template_body: templates::node_group().to_string(),
                    parameters,
                    iam_capability: true,
                    client_request_token: None,
                },
            )
            .await?;
    }

    // Wait for the stack update.
    {
        let ctx = run.waiting_step(
            "await-node-group-stack-updated",
            PROVISION_WAIT_TIMEOUT,
            WAIT_HEARTBEAT_TIMEOUT,
        );
        steps
            .stacks
            .wait_for_stack(&ctx, &stack_name, StackTarget::UpdateComplete)
            .await?;
    }

    // Grab the scaling group behind the node group.
    let scaling_group = {
        let ctx = run.step("read-scaling-group-name", QUICK_STEP_TIMEOUT);
        let stacks = steps.stacks.describe_stacks(&ctx, &stack_name).await?;
        StackOutputs::parse(&stack_name, &stacks)?
            .node_auto_scaling_group
            .unwrap_or_default()
    };

    info!("Node group details: scaling group '{}'", scaling_group);

    let nodes = {
        let ctx = run.step("list-cluster-nodes", QUICK_STEP_TIMEOUT);
        steps.nodes.list_nodes(&ctx, &input.cluster_name).await?
    };

    for node in nodes {
        if node.provider_id.is_empty() {
            return Err(Error::MissingProviderId { node: node.name });
        }
        let identity = NodeIdentity::parse(&node.provider_id)?;

        info!(
            "Replacing node '{}' (region '{}', instance '{}')",
            node.name, identity.region, identity.instance_id
        );

        {
            let ctx = run.waiting_step("drain-node", DRAIN_TIMEOUT, WAIT_HEARTBEAT_TIMEOUT);
            steps
                .nodes
                .drain_node(&ctx, &input.cluster_name, &node.name)
                .await?;
        }

        {
            let ctx = run.step("delete-node", QUICK_STEP_TIMEOUT);
            steps
                .nodes
                .delete_node(&ctx, &input.cluster_name, &node.name)
                .await?;
        }

        {
            let ctx = run.step("detach-instance", DETACH_TIMEOUT);
            steps
                .scaling_groups
                .detach_instance(&ctx, &scaling_group, &identity.instance_id)
                .await?;
        }

        {
            let ctx = run.step("terminate-instance", QUICK_STEP_TIMEOUT);
            steps
                .instances
                .terminate_instance(&ctx, &identity.instance_id)
                .await?;
        }

        {
            let ctx = run.waiting_step(
                "await-instance-terminated",
                TERMINATION_WAIT_TIMEOUT,
                WAIT_HEARTBEAT_TIMEOUT,
            );
            steps
                .instances
                .wait_for_instance_terminated(&ctx, &identity.instance_id)
                .await?;
        }

        // Stand-in for confirming the replacement joined the cluster.
        run.pause(NODE_REPLACEMENT_PAUSE).await;
    }

    Ok(())
}
