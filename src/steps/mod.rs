/*!

Thin, heartbeat-aware wrappers around the external create/read/delete/wait
operations the lifecycle workflows dispatch. Each trait covers one
collaborator client; the [`StepRegistry`] bundles them so workflows receive
every step implementation explicitly instead of reaching for process-global
state. Tests substitute fakes for any of them.

!*/

pub mod auth;
pub mod control_plane;
pub mod instances;
pub mod kube;
pub mod nodes;
pub mod scaling;
pub mod stacks;

use crate::error::Result;
use crate::outputs::DescribedStack;
use crate::step::StepContext;
use std::sync::Arc;

/// Parameters for creating an infrastructure stack. The template body is an
/// opaque payload passed verbatim to the provider.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateStackRequest {
    pub stack_name: String,
    pub template_body: String,
    pub parameters: Vec<(String, String)>,
    /// Allow the stack to create IAM resources (node instance roles).
    pub iam_capability: bool,
    /// Explicit request token; derived from step identity when absent.
    pub client_request_token: Option<String>,
}

/// Parameters for updating an infrastructure stack. Every parameter either
/// pins its previous value or carries a new one.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UpdateStackRequest {
    pub stack_name: String,
    pub template_body: String,
    pub parameters: Vec<StackParameter>,
    pub iam_capability: bool,
    pub client_request_token: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StackParameter {
    Previous { key: String },
    Value { key: String, value: String },
}

/// Target states a stack wait can resolve to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StackTarget {
    CreateComplete,
    UpdateComplete,
    DeleteComplete,
}

/// Target states a control plane wait can resolve to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClusterTarget {
    Active,
    Deleted,
}

/// Parameters for creating a managed control plane.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateClusterRequest {
    pub name: String,
    pub role_arn: String,
    pub version: String,
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
    pub client_request_token: Option<String>,
}

/// A cluster node as the update workflow sees it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeRecord {
    pub name: String,
    pub provider_id: String,
}

/// Infrastructure stack operations (CloudFormation).
#[async_trait::async_trait]
pub trait Stacks: Send + Sync {
    async fn create_stack(&self, ctx: &StepContext, request: CreateStackRequest) -> Result<()>;

    async fn update_stack(&self, ctx: &StepContext, request: UpdateStackRequest) -> Result<()>;

    async fn delete_stack(&self, ctx: &StepContext, stack_name: &str) -> Result<()>;

    async fn describe_stacks(
        &self,
        ctx: &StepContext,
        stack_name: &str,
    ) -> Result<Vec<DescribedStack>>;

    async fn wait_for_stack(
        &self,
        ctx: &StepContext,
        stack_name: &str,
        target: StackTarget,
    ) -> Result<()>;
}

/// Managed control plane operations (EKS).
#[async_trait::async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_cluster(&self, ctx: &StepContext, request: CreateClusterRequest) -> Result<()>;

    async fn delete_cluster(&self, ctx: &StepContext, cluster_name: &str) -> Result<()>;

    async fn wait_for_cluster(
        &self,
        ctx: &StepContext,
        cluster_name: &str,
        target: ClusterTarget,
    ) -> Result<()>;
}

/// Compute instance operations (EC2).
#[async_trait::async_trait]
pub trait Instances: Send + Sync {
    async fn terminate_instance(&self, ctx: &StepContext, instance_id: &str) -> Result<()>;

    async fn wait_for_instance_terminated(
        &self,
        ctx: &StepContext,
        instance_id: &str,
    ) -> Result<()>;
}

/// Scaling group operations (Auto Scaling).
#[async_trait::async_trait]
pub trait ScalingGroups: Send + Sync {
    /// Detach an instance without decrementing the group's desired capacity,
    /// so a replacement is launched.
    async fn detach_instance(
        &self,
        ctx: &StepContext,
        group_name: &str,
        instance_id: &str,
    ) -> Result<()>;
}

/// Node operations against the cluster API.
#[async_trait::async_trait]
pub trait ClusterNodes: Send + Sync {
    async fn list_nodes(&self, ctx: &StepContext, cluster_name: &str) -> Result<Vec<NodeRecord>>;

    /// Cordon the node, then force-evict its evictable workloads. Emits one
    /// liveness signal per deleted pod.
    async fn drain_node(&self, ctx: &StepContext, cluster_name: &str, node_name: &str)
        -> Result<()>;

    /// Remove the node object. Does not terminate the underlying machine.
    async fn delete_node(
        &self,
        ctx: &StepContext,
        cluster_name: &str,
        node_name: &str,
    ) -> Result<()>;
}

/// Node-authentication mapping operations against the cluster API.
#[async_trait::async_trait]
pub trait ClusterAuth: Send + Sync {
    /// Register node instance roles in the cluster's node-authentication
    /// mapping, granting them permission to join as nodes.
    async fn publish_node_auth(
        &self,
        ctx: &StepContext,
        cluster_name: &str,
        node_instance_role_arns: &[String],
    ) -> Result<()>;
}

/// Every step implementation a workflow can dispatch, wired up by the caller
/// and handed in explicitly.
#[derive(Clone)]
pub struct StepRegistry {
    pub stacks: Arc<dyn Stacks>,
    pub control_plane: Arc<dyn ControlPlane>,
    pub instances: Arc<dyn Instances>,
    pub scaling_groups: Arc<dyn ScalingGroups>,
    pub nodes: Arc<dyn ClusterNodes>,
    pub auth: Arc<dyn ClusterAuth>,
}
