//! Embedded CloudFormation templates, passed verbatim to the provider.

/// The network stack: a VPC with public subnets and a control plane
/// security group.
pub fn vpc() -> &'static str {
    include_str!("../templates/vpc.yaml")
}

/// A self-managed node group: instance role, security groups, launch
/// template, and auto scaling group.
pub fn node_group() -> &'static str {
    include_str!("../templates/nodegroup.yaml")
}
