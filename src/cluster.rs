use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Desired state of a cluster, as handed to the create and delete workflows.
/// Built once per run by the caller and never persisted here.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    pub name: String,
    pub cloud: CloudSpec,
    pub kubernetes: KubernetesSpec,
    #[serde(default)]
    pub node_groups: Vec<NodeGroupSpec>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSpec {
    /// IAM role assumed by the EKS control plane.
    pub role_arn: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesSpec {
    pub version: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupSpec {
    pub name: String,

    /// EC2 key pair granting SSH access to the group's instances.
    pub key_name: String,

    /// Kubernetes version override for this group. Falls back to the
    /// cluster-wide version when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
}

impl ClusterSpec {
    /// Structural validation. Runs before any cloud side effect; failures are
    /// not retryable. Node group names are not checked for uniqueness.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::MissingClusterName);
        }

        if self.cloud.role_arn.is_empty() {
            return Err(Error::MissingRoleArn);
        }

        if self.kubernetes.version.is_empty() {
            return Err(Error::MissingKubernetesVersion);
        }

        for (index, node_group) in self.node_groups.iter().enumerate() {
            node_group.validate(index)?;
        }

        Ok(())
    }

    /// Name of the network stack backing this cluster.
    pub fn network_stack_name(&self) -> String {
        format!("{}-vpc", self.name)
    }

    /// Name of the stack backing one of this cluster's node groups.
    pub fn node_group_stack_name(&self, node_group: &NodeGroupSpec) -> String {
        format!("{}-{}", self.name, node_group.name)
    }
}

impl NodeGroupSpec {
    fn validate(&self, index: usize) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::MissingNodeGroupName { index });
        }

        if self.key_name.is_empty() {
            return Err(Error::MissingNodeGroupKeyName {
                name: self.name.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn spec() -> ClusterSpec {
        ClusterSpec {
            name: "demo".to_string(),
            cloud: CloudSpec {
                role_arn: "arn:aws:iam::111122223333:role/eks-service-role".to_string(),
            },
            kubernetes: KubernetesSpec {
                version: "1.24".to_string(),
            },
            node_groups: vec![NodeGroupSpec {
                name: "pool1".to_string(),
                key_name: "ops".to_string(),
                kubernetes_version: None,
            }],
        }
    }

    #[test]
    fn valid_spec() {
        spec().validate().unwrap();
    }

    #[test]
    fn empty_cluster_name() {
        let mut spec = spec();
        spec.name = String::new();
        assert!(matches!(
            spec.validate().unwrap_err(),
            Error::MissingClusterName
        ));
    }

    #[test]
    fn empty_role_arn() {
        let mut spec = spec();
        spec.cloud.role_arn = String::new();
        assert!(matches!(spec.validate().unwrap_err(), Error::MissingRoleArn));
    }

    #[test]
    fn empty_version() {
        let mut spec = spec();
        spec.kubernetes.version = String::new();
        assert!(matches!(
            spec.validate().unwrap_err(),
            Error::MissingKubernetesVersion
        ));
    }

    #[test]
    fn empty_node_group_name() {
        let mut spec = spec();
        spec.node_groups[0].name = String::new();
        assert!(matches!(
            spec.validate().unwrap_err(),
            Error::MissingNodeGroupName { index: 0 }
        ));
    }

    #[test]
    fn empty_node_group_key() {
        let mut spec = spec();
        spec.node_groups[0].key_name = String::new();
        match spec.validate().unwrap_err() {
            Error::MissingNodeGroupKeyName { name } => assert_eq!(name, "pool1"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn stack_names() {
        let spec = spec();
        assert_eq!(spec.network_stack_name(), "demo-vpc");
        assert_eq!(
            spec.node_group_stack_name(&spec.node_groups[0]),
            "demo-pool1"
        );
    }
}
