use super::{PROVISION_WAIT_TIMEOUT, QUICK_STEP_TIMEOUT, WAIT_HEARTBEAT_TIMEOUT};
use crate::cluster::ClusterSpec;
use crate::error::Result;
use crate::outputs::StackOutputs;
use crate::step::RunContext;
use crate::steps::{
    ClusterTarget, CreateClusterRequest, CreateStackRequest, StackTarget, StepRegistry,
};
use crate::templates;
use log::info;
use serde::{Deserialize, Serialize};

/// Input of the [`create_cluster`] workflow.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterInput {
    pub cluster: ClusterSpec,
}

/// Create a new EKS cluster: network stack, control plane, one stack per
/// node group, then the node-authentication mapping.
///
/// The first unrecovered step error aborts the run; resources created before
/// the failing step are left in place.
pub async fn create_cluster(
    run: &RunContext,
    steps: &StepRegistry,
    input: CreateClusterInput,
) -> Result<()> {
    input.cluster.validate()?;

    let cluster = &input.cluster;
    let network_stack_name = cluster.network_stack_name();

    // Create the network stack.
    {
        let ctx = run.step("create-network-stack", QUICK_STEP_TIMEOUT);
        steps
            .stacks
            .create_stack(
                &ctx,
                CreateStackRequest {
                    stack_name: network_stack_name.clone(),
                    template_body: templates::vpc().to_string(),
                    ..CreateStackRequest::default()
                },
            )
            .await?;
    }

    // Wait for the network stack.
    {
        let ctx = run.waiting_step(
            "await-network-stack",
            PROVISION_WAIT_TIMEOUT,
            WAIT_HEARTBEAT_TIMEOUT,
        );
        steps
            .stacks
            .wait_for_stack(&ctx, &network_stack_name, StackTarget::CreateComplete)
            .await?;
    }

    // Grab the network identifiers.
    let network = {
        let ctx = run.step("read-network-outputs", QUICK_STEP_TIMEOUT);
        let stacks = steps.stacks.describe_stacks(&ctx, &network_stack_name).await?;
        StackOutputs::parse(&network_stack_name, &stacks)?
    };

    info!(
        "Network details: vpc '{}', subnets '{}', security groups '{}'",
        network.vpc_id, network.subnet_ids, network.security_groups
    );

    // Create the control plane.
    {
        let ctx = run.step("create-cluster", QUICK_STEP_TIMEOUT);
        steps
            .control_plane
            .create_cluster(
                &ctx,
                CreateClusterRequest {
                    name: cluster.name.clone(),
                    role_arn: cluster.cloud.role_arn.clone(),
                    version: cluster.kubernetes.version.clone(),
                    subnet_ids: network.subnet_id_list(),
                    security_group_ids: network.security_group_list(),
                    client_request_token: None,
                },
            )
            .await?;
    }

    // Wait for the control plane.
    {
        let ctx = run.waiting_step(
            "await-cluster-active",
            PROVISION_WAIT_TIMEOUT,
            WAIT_HEARTBEAT_TIMEOUT,
        );
        steps
            .control_plane
            .wait_for_cluster(&ctx, &cluster.name, ClusterTarget::Active)
            .await?;
    }

    let mut node_instance_role_arns = Vec::new();

    for node_group in &cluster.node_groups {
        let stack_name = cluster.node_group_stack_name(node_group);

        // Create the self-managed node group stack.
        {
            let mut parameters = vec![
                ("ClusterName".to_string(), cluster.name.clone()),
                ("NodeGroupName".to_string(), stack_name.clone()),
                ("VpcId".to_string(), network.vpc_id.clone()),
                ("Subnets".to_string(), network.subnet_ids.clone()),
                (
                    "ClusterControlPlaneSecurityGroup".to_string(),
                    network.security_groups.clone(),
                ),
            ];
            if !node_group.key_name.is_empty() {
                parameters.push(("KeyName".to_string(), node_group.key_name.clone()));
            }

            let ctx = run.step("create-node-group-stack", QUICK_STEP_TIMEOUT);
            steps
                .stacks
                .create_stack(
                    &ctx,
                    CreateStackRequest {
                        stack_name: stack_name.clone(),
                        template_body: templates::node_group().to_string(),
                        parameters,
                        // The stack creates the node instance role.
                        iam_capability: true,
                        client_request_token: None,
                    },
                )
                .await?;
        }

        // Wait for the node group stack.
        {
            let ctx = run.waiting_step(
                "await-node-group-stack",
                PROVISION_WAIT_TIMEOUT,
                WAIT_HEARTBEAT_TIMEOUT,
            );
            steps
                .stacks
                .wait_for_stack(&ctx, &stack_name, StackTarget::CreateComplete)
                .await?;
        }

        // Grab the node group details.
        {
            let ctx = run.step("read-node-group-outputs", QUICK_STEP_TIMEOUT);
            let stacks = steps.stacks.describe_stacks(&ctx, &stack_name).await?;
            let outputs = StackOutputs::parse(&stack_name, &stacks)?;
            if let Some(node_instance_role) = outputs.node_instance_role {
                node_instance_role_arns.push(node_instance_role);
            }
        }
    }

    // Register the node instance roles so the nodes can join.
    {
        let ctx = run.step("publish-cluster-auth", QUICK_STEP_TIMEOUT);
        steps
            .auth
            .publish_node_auth(&ctx, &cluster.name, &node_instance_role_arns)
            .await?;
    }

    Ok(())
}
