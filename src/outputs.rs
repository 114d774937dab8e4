use crate::error::{Error, Result};

/// One key/value pair from a described CloudFormation stack.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StackOutput {
    pub key: String,
    pub value: String,
}

/// A described stack, reduced to the parts the workflows read.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DescribedStack {
    pub outputs: Vec<StackOutput>,
    pub status: String,
}

/// The typed fields workflows extract from a stack's outputs.
///
/// Keys are matched exactly; unknown keys are skipped. A missing key leaves
/// its field empty rather than failing, so callers see the same zero values
/// the stack would have produced before its outputs existed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StackOutputs {
    /// `VpcId` output.
    pub vpc_id: String,

    /// `SubnetIds` output, a comma-separated id list.
    pub subnet_ids: String,

    /// `SecurityGroups` output, a comma-separated id list.
    pub security_groups: String,

    /// `NodeInstanceRole` output of a node group stack.
    pub node_instance_role: Option<String>,

    /// `NodeAutoScalingGroup` output of a node group stack.
    pub node_auto_scaling_group: Option<String>,
}

impl StackOutputs {
    /// Parse the first stack of a DescribeStacks result. An empty stack set
    /// means the stack does not exist.
    pub fn parse(stack_name: &str, stacks: &[DescribedStack]) -> Result<Self> {
        let stack = stacks.first().ok_or_else(|| Error::StackNotFound {
            stack_name: stack_name.to_string(),
        })?;

        let mut outputs = Self::default();
        for output in &stack.outputs {
            match output.key.as_str() {
                "VpcId" => outputs.vpc_id = output.value.clone(),
                "SubnetIds" => outputs.subnet_ids = output.value.clone(),
                "SecurityGroups" => outputs.security_groups = output.value.clone(),
                "NodeInstanceRole" => outputs.node_instance_role = Some(output.value.clone()),
                "NodeAutoScalingGroup" => {
                    outputs.node_auto_scaling_group = Some(output.value.clone())
                }
                _ => {}
            }
        }

        Ok(outputs)
    }

    /// `SubnetIds` split into individual ids.
    pub fn subnet_id_list(&self) -> Vec<String> {
        split_ids(&self.subnet_ids)
    }

    /// `SecurityGroups` split into individual ids.
    pub fn security_group_list(&self) -> Vec<String> {
        split_ids(&self.security_groups)
    }
}

fn split_ids(ids: &str) -> Vec<String> {
    ids.split(',')
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn stack(outputs: &[(&str, &str)]) -> DescribedStack {
        DescribedStack {
            outputs: outputs
                .iter()
                .map(|(key, value)| StackOutput {
                    key: key.to_string(),
                    value: value.to_string(),
                })
                .collect(),
            status: "CREATE_COMPLETE".to_string(),
        }
    }

    #[test]
    fn parses_network_outputs() {
        let stacks = vec![stack(&[
            ("VpcId", "vpc-1"),
            ("SubnetIds", "subnet-1,subnet-2"),
        ])];
        let outputs = StackOutputs::parse("demo-vpc", &stacks).unwrap();
        assert_eq!(outputs.vpc_id, "vpc-1");
        assert_eq!(outputs.subnet_id_list(), vec!["subnet-1", "subnet-2"]);
        assert_eq!(outputs.security_groups, "");
        assert!(outputs.security_group_list().is_empty());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let stacks = vec![stack(&[
            ("SomethingElse", "whatever"),
            ("NodeInstanceRole", "arn:aws:iam::111122223333:role/node"),
        ])];
        let outputs = StackOutputs::parse("demo-pool1", &stacks).unwrap();
        assert_eq!(
            outputs.node_instance_role.as_deref(),
            Some("arn:aws:iam::111122223333:role/node")
        );
        assert_eq!(outputs.node_auto_scaling_group, None);
    }

    #[test]
    fn empty_stack_set_is_not_found() {
        match StackOutputs::parse("demo-vpc", &[]).unwrap_err() {
            Error::StackNotFound { stack_name } => assert_eq!(stack_name, "demo-vpc"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn only_first_stack_is_read() {
        let stacks = vec![stack(&[("VpcId", "vpc-1")]), stack(&[("VpcId", "vpc-2")])];
        let outputs = StackOutputs::parse("demo-vpc", &stacks).unwrap();
        assert_eq!(outputs.vpc_id, "vpc-1");
    }
}
