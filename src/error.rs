use aws_sdk_cloudformation::error::{
    CreateStackError, DeleteStackError, DescribeStacksError, UpdateStackError,
};
use aws_sdk_ec2::error::{DescribeInstancesError, TerminateInstancesError};
use aws_sdk_ec2::types::SdkError;
use aws_sdk_eks::error::{CreateClusterError, DeleteClusterError, DescribeClusterError};
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    // Validation failures. These are raised before any side effect and must
    // never be retried.
    #[snafu(display("cluster name is required"))]
    MissingClusterName,

    #[snafu(display("cloud: role ARN is required"))]
    MissingRoleArn,

    #[snafu(display("kubernetes: version is required"))]
    MissingKubernetesVersion,

    #[snafu(display("node group {}: name is required", index))]
    MissingNodeGroupName { index: usize },

    #[snafu(display("node group '{}': key name is required", name))]
    MissingNodeGroupKeyName { name: String },

    #[snafu(display("node group name is required"))]
    MissingTargetNodeGroup,

    #[snafu(display("stack '{}' not found", stack_name))]
    StackNotFound { stack_name: String },

    #[snafu(display("node '{}' has no provider id", node))]
    MissingProviderId { node: String },

    #[snafu(display("malformed provider id '{}'", provider_id))]
    MalformedProviderId { provider_id: String },

    // A wait observed an explicit failure or rollback state. Retrying cannot
    // succeed, the resource has to be inspected and removed by hand.
    #[snafu(display("{} reached terminal state '{}'", resource, state))]
    TerminalResourceState { resource: String, state: String },

    #[snafu(display("timed out waiting for {}", resource))]
    WaitTimeout { resource: String },

    #[snafu(display("CloudFormation CreateStack failed: {}", source))]
    CreateStack { source: SdkError<CreateStackError> },

    #[snafu(display("CloudFormation UpdateStack failed: {}", source))]
    UpdateStack { source: SdkError<UpdateStackError> },

    #[snafu(display("CloudFormation DeleteStack failed: {}", source))]
    DeleteStack { source: SdkError<DeleteStackError> },

    #[snafu(display("CloudFormation DescribeStacks failed: {}", source))]
    DescribeStacks {
        source: SdkError<DescribeStacksError>,
    },

    #[snafu(display("EKS CreateCluster failed: {}", source))]
    CreateCluster {
        source: SdkError<CreateClusterError>,
    },

    #[snafu(display("EKS DeleteCluster failed: {}", source))]
    DeleteCluster {
        source: SdkError<DeleteClusterError>,
    },

    #[snafu(display("EKS DescribeCluster failed: {}", source))]
    DescribeCluster {
        source: SdkError<DescribeClusterError>,
    },

    #[snafu(display("DescribeCluster response missing {}", field))]
    MissingClusterField { field: &'static str },

    #[snafu(display("EC2 TerminateInstances failed: {}", source))]
    TerminateInstances {
        source: SdkError<TerminateInstancesError>,
    },

    #[snafu(display("EC2 DescribeInstances failed: {}", source))]
    DescribeInstances {
        source: SdkError<DescribeInstancesError>,
    },

    #[snafu(display("Auto Scaling DetachInstances failed: {}", source))]
    DetachInstances {
        source: SdkError<aws_sdk_autoscaling::error::DetachInstancesError>,
    },

    #[snafu(display("Kubernetes API request failed: {}", source))]
    Kube { source: kube::Error },

    #[snafu(display("Unable to load kubeconfig: {}", source))]
    Kubeconfig {
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("Unable to parse kubeconfig: {}", source))]
    KubeconfigParse { source: serde_yaml::Error },

    #[snafu(display("Failed to create '{}' process: {}", what, source))]
    Process {
        what: String,
        source: std::io::Error,
    },

    #[snafu(display("'aws eks get-token' failed: {}", message))]
    GetToken { message: String },

    #[snafu(display("{}", source))]
    DeserializeJson { source: serde_json::Error },
}
