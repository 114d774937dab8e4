/*!

Runs the lifecycle workflows against a recording fake step registry and
checks the dispatch order each workflow promises: create builds network,
control plane, node groups, then auth; delete tears down in reverse; the
node group update replaces nodes strictly one at a time.

!*/

use eks_lifecycle_worker::cluster::{ClusterSpec, CloudSpec, KubernetesSpec, NodeGroupSpec};
use eks_lifecycle_worker::outputs::{DescribedStack, StackOutput};
use eks_lifecycle_worker::step::{LivenessSink, RunContext, StepContext};
use eks_lifecycle_worker::steps::{
    ClusterAuth, ClusterNodes, ClusterTarget, ControlPlane, CreateClusterRequest,
    CreateStackRequest, Instances, NodeRecord, ScalingGroups, StackTarget, Stacks, StepRegistry,
    UpdateStackRequest,
};
use eks_lifecycle_worker::workflows::{
    create_cluster, delete_cluster, update_node_group, CreateClusterInput, DeleteClusterInput,
    UpdateNodeGroupInput,
};
use eks_lifecycle_worker::{Error, Result};
use std::sync::{Arc, Mutex};

/// Records every dispatched step call and optionally fails one of them.
struct Recorder {
    calls: Mutex<Vec<String>>,
    fail_on: Option<String>,
    nodes: Vec<NodeRecord>,
}

impl Recorder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
            nodes: Vec::new(),
        })
    }

    fn failing_on(call: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(call.to_string()),
            nodes: Vec::new(),
        })
    }

    fn with_nodes(nodes: Vec<NodeRecord>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
            nodes,
        })
    }

    fn record(&self, call: String) -> Result<()> {
        let failing = self.fail_on.as_deref() == Some(call.as_str());
        self.calls.lock().unwrap().push(call.clone());
        if failing {
            return Err(Error::WaitTimeout { resource: call });
        }
        Ok(())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn registry(recorder: &Arc<Recorder>) -> StepRegistry {
    StepRegistry {
        stacks: recorder.clone(),
        control_plane: recorder.clone(),
        instances: recorder.clone(),
        scaling_groups: recorder.clone(),
        nodes: recorder.clone(),
        auth: recorder.clone(),
    }
}

fn stack_target(target: StackTarget) -> &'static str {
    match target {
        StackTarget::CreateComplete => "create-complete",
        StackTarget::UpdateComplete => "update-complete",
        StackTarget::DeleteComplete => "delete-complete",
    }
}

#[async_trait::async_trait]
impl Stacks for Recorder {
    async fn create_stack(&self, _: &StepContext, request: CreateStackRequest) -> Result<()> {
        self.record(format!("create-stack {}", request.stack_name))
    }

    async fn update_stack(&self, _: &StepContext, request: UpdateStackRequest) -> Result<()> {
        self.record(format!("update-stack {}", request.stack_name))
    }

    async fn delete_stack(&self, _: &StepContext, stack_name: &str) -> Result<()> {
        self.record(format!("delete-stack {}", stack_name))
    }

    async fn describe_stacks(
        &self,
        _: &StepContext,
        stack_name: &str,
    ) -> Result<Vec<DescribedStack>> {
        self.record(format!("describe-stacks {}", stack_name))?;
        let outputs = if stack_name.ends_with("-vpc") {
            vec![
                output("VpcId", "vpc-1"),
                output("SubnetIds", "subnet-1,subnet-2"),
                output("SecurityGroups", "sg-1"),
            ]
        } else {
            vec![
                output("NodeInstanceRole", "arn:aws:iam::111122223333:role/node"),
                output("NodeAutoScalingGroup", "demo-pool1-asg"),
            ]
        };
        Ok(vec![DescribedStack {
            outputs,
            status: "CREATE_COMPLETE".to_string(),
        }])
    }

    async fn wait_for_stack(
        &self,
        _: &StepContext,
        stack_name: &str,
        target: StackTarget,
    ) -> Result<()> {
        self.record(format!("wait-stack {} {}", stack_name, stack_target(target)))
    }
}

#[async_trait::async_trait]
impl ControlPlane for Recorder {
    async fn create_cluster(&self, _: &StepContext, request: CreateClusterRequest) -> Result<()> {
        self.record(format!("create-cluster {}", request.name))
    }

    async fn delete_cluster(&self, _: &StepContext, cluster_name: &str) -> Result<()> {
        self.record(format!("delete-cluster {}", cluster_name))
    }

    async fn wait_for_cluster(
        &self,
        _: &StepContext,
        cluster_name: &str,
        target: ClusterTarget,
    ) -> Result<()> {
        let target = match target {
            ClusterTarget::Active => "active",
            ClusterTarget::Deleted => "deleted",
        };
        self.record(format!("wait-cluster {} {}", cluster_name, target))
    }
}

#[async_trait::async_trait]
impl Instances for Recorder {
    async fn terminate_instance(&self, _: &StepContext, instance_id: &str) -> Result<()> {
        self.record(format!("terminate-instance {}", instance_id))
    }

    async fn wait_for_instance_terminated(
        &self,
        _: &StepContext,
        instance_id: &str,
    ) -> Result<()> {
        self.record(format!("wait-instance-terminated {}", instance_id))
    }
}

#[async_trait::async_trait]
impl ScalingGroups for Recorder {
    async fn detach_instance(
        &self,
        _: &StepContext,
        group_name: &str,
        instance_id: &str,
    ) -> Result<()> {
        self.record(format!("detach-instance {} {}", group_name, instance_id))
    }
}

#[async_trait::async_trait]
impl ClusterNodes for Recorder {
    async fn list_nodes(&self, _: &StepContext, cluster_name: &str) -> Result<Vec<NodeRecord>> {
        self.record(format!("list-nodes {}", cluster_name))?;
        Ok(self.nodes.clone())
    }

    async fn drain_node(
        &self,
        _: &StepContext,
        cluster_name: &str,
        node_name: &str,
    ) -> Result<()> {
        self.record(format!("drain-node {} {}", cluster_name, node_name))
    }

    async fn delete_node(
        &self,
        _: &StepContext,
        cluster_name: &str,
        node_name: &str,
    ) -> Result<()> {
        self.record(format!("delete-node {} {}", cluster_name, node_name))
    }
}

#[async_trait::async_trait]
impl ClusterAuth for Recorder {
    async fn publish_node_auth(
        &self,
        _: &StepContext,
        cluster_name: &str,
        node_instance_role_arns: &[String],
    ) -> Result<()> {
        self.record(format!(
            "publish-node-auth {} {}",
            cluster_name,
            node_instance_role_arns.join(",")
        ))
    }
}

struct NullLiveness;

#[async_trait::async_trait]
impl LivenessSink for NullLiveness {
    async fn record_heartbeat(&self) {}
}

fn run_context() -> RunContext {
    RunContext::new("run-1", Arc::new(NullLiveness))
}

fn output(key: &str, value: &str) -> StackOutput {
    StackOutput {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn cluster_spec() -> ClusterSpec {
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

#[tokio::test]
async fn create_cluster_dispatches_in_order() {
    let recorder = Recorder::new();
    let steps = registry(&recorder);

    create_cluster(
        &run_context(),
        &steps,
        CreateClusterInput {
            cluster: cluster_spec(),
        },
    )
    .await
    .unwrap();

    assert_eq!(
        recorder.calls(),
        vec![
            "create-stack demo-vpc",
            "wait-stack demo-vpc create-complete",
            "describe-stacks demo-vpc",
            "create-cluster demo",
            "wait-cluster demo active",
            "create-stack demo-pool1",
            "wait-stack demo-pool1 create-complete",
            "describe-stacks demo-pool1",
            "publish-node-auth demo arn:aws:iam::111122223333:role/node",
        ]
    );
}

#[tokio::test]
async fn delete_cluster_tears_down_in_reverse_order() {
    let recorder = Recorder::new();
    let steps = registry(&recorder);

    delete_cluster(
        &run_context(),
        &steps,
        DeleteClusterInput {
            cluster: cluster_spec(),
        },
    )
    .await
    .unwrap();

    assert_eq!(
        recorder.calls(),
        vec![
            "delete-stack demo-pool1",
            "wait-stack demo-pool1 delete-complete",
            "delete-cluster demo",
            "wait-cluster demo deleted",
            "delete-stack demo-vpc",
            "wait-stack demo-vpc delete-complete",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn update_node_group_replaces_nodes_one_at_a_time() {
    let nodes = vec![
        NodeRecord {
            name: "node-a".to_string(),
            provider_id: "aws:///us-west-2a/i-aaa".to_string(),
        },
        NodeRecord {
            name: "node-b".to_string(),
            provider_id: "aws:///us-west-2b/i-bbb".to_string(),
        },
        NodeRecord {
            name: "node-c".to_string(),
            provider_id: "aws:///us-west-2c/i-ccc".to_string(),
        },
    ];
    let recorder = Recorder::with_nodes(nodes);
    let steps = registry(&recorder);

    update_node_group(
        &run_context(),
        &steps,
        UpdateNodeGroupInput {
            cluster_name: "demo".to_string(),
            node_group_name: "pool1".to_string(),
            kubernetes_version: "1.25".to_string(),
        },
    )
    .await
    .unwrap();

    let mut expected = vec![
        "update-stack demo-pool1".to_string(),
        "wait-stack demo-pool1 update-complete".to_string(),
        "describe-stacks demo-pool1".to_string(),
        "list-nodes demo".to_string(),
    ];
    for (node, instance) in [("node-a", "i-aaa"), ("node-b", "i-bbb"), ("node-c", "i-ccc")] {
        expected.push(format!("drain-node demo {}", node));
        expected.push(format!("delete-node demo {}", node));
        expected.push(format!("detach-instance demo-pool1-asg {}", instance));
        expected.push(format!("terminate-instance {}", instance));
        expected.push(format!("wait-instance-terminated {}", instance));
    }
    assert_eq!(recorder.calls(), expected);
}

#[tokio::test(start_paused = true)]
async fn update_stops_at_first_malformed_provider_id() {
    let nodes = vec![
        NodeRecord {
            name: "node-a".to_string(),
            provider_id: "gce://something/else".to_string(),
        },
        NodeRecord {
            name: "node-b".to_string(),
            provider_id: "aws:///us-west-2b/i-bbb".to_string(),
        },
    ];
    let recorder = Recorder::with_nodes(nodes);
    let steps = registry(&recorder);

    let error = update_node_group(
        &run_context(),
        &steps,
        UpdateNodeGroupInput {
            cluster_name: "demo".to_string(),
            node_group_name: "pool1".to_string(),
            kubernetes_version: "1.25".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(error, Error::MalformedProviderId { .. }));

    // Nothing was drained or terminated, not even for the well-formed node.
    assert_eq!(
        recorder.calls(),
        vec![
            "update-stack demo-pool1",
            "wait-stack demo-pool1 update-complete",
            "describe-stacks demo-pool1",
            "list-nodes demo",
        ]
    );
}

#[tokio::test]
async fn create_cluster_stops_at_first_failed_step() {
    let recorder = Recorder::failing_on("wait-stack demo-vpc create-complete");
    let steps = registry(&recorder);

    let error = create_cluster(
        &run_context(),
        &steps,
        CreateClusterInput {
            cluster: cluster_spec(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(error, Error::WaitTimeout { .. }));

    assert_eq!(
        recorder.calls(),
        vec!["create-stack demo-vpc", "wait-stack demo-vpc create-complete"]
    );
}

#[tokio::test]
async fn create_cluster_rejects_invalid_input() {
    let recorder = Recorder::new();
    let steps = registry(&recorder);

    let mut cluster = cluster_spec();
    cluster.cloud.role_arn = String::new();

    let error = create_cluster(&run_context(), &steps, CreateClusterInput { cluster })
        .await
        .unwrap_err();
    assert!(matches!(error, Error::MissingRoleArn));
    assert!(recorder.calls().is_empty());
}
