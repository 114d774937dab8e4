/*!

Entry point for the lifecycle worker. Reads the requested workflow, run
identity, and input payload from the environment, wires the step
implementations to live AWS and cluster API clients, and executes the run.
Connecting this binary to a durable execution substrate (which would supply
run identity, persistence, and heartbeat delivery) happens outside the
orchestration core.

Environment:

- `LIFECYCLE_WORKFLOW`: `create-cluster`, `delete-cluster`, or
  `update-node-group`.
- `LIFECYCLE_RUN_ID`: durable identity of this run; request tokens derive
  from it.
- `LIFECYCLE_INPUT`: JSON input for the selected workflow.
- Standard AWS environment for credentials and region.

!*/

use aws_config::retry::RetryConfig;
use aws_smithy_types::retry::RetryMode;
use env_logger::Builder;
use eks_lifecycle_worker::step::{LivenessSink, RunContext};
use eks_lifecycle_worker::steps::auth::AwsAuthPublisher;
use eks_lifecycle_worker::steps::control_plane::EksControlPlane;
use eks_lifecycle_worker::steps::instances::Ec2Instances;
use eks_lifecycle_worker::steps::kube::KubeClientFactory;
use eks_lifecycle_worker::steps::nodes::KubeNodes;
use eks_lifecycle_worker::steps::scaling::AutoScalingGroups;
use eks_lifecycle_worker::steps::stacks::CloudFormationStacks;
use eks_lifecycle_worker::steps::StepRegistry;
use eks_lifecycle_worker::workflows::{
    create_cluster, delete_cluster, update_node_group, CreateClusterInput, DeleteClusterInput,
    UpdateNodeGroupInput,
};
use log::{info, trace, LevelFilter};
use snafu::{ResultExt, Snafu};
use std::env;
use std::sync::Arc;

const WORKFLOW_ENV: &str = "LIFECYCLE_WORKFLOW";
const RUN_ID_ENV: &str = "LIFECYCLE_RUN_ID";
const INPUT_ENV: &str = "LIFECYCLE_INPUT";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("Environment variable '{}' is required", var))]
    MissingEnv { var: String },

    #[snafu(display(
        "Unknown workflow '{}', expected create-cluster, delete-cluster, or update-node-group",
        workflow
    ))]
    UnknownWorkflow { workflow: String },

    #[snafu(display("Unable to parse workflow input: {}", source))]
    ParseInput { source: serde_json::Error },

    #[snafu(display("{}", source))]
    Workflow {
        source: eks_lifecycle_worker::Error,
    },
}

#[derive(Debug)]
struct RunRequest {
    workflow: String,
    run_id: String,
    input: String,
}

impl RunRequest {
    fn from_env() -> Result<Self, Error> {
        Ok(Self {
            workflow: require_env(WORKFLOW_ENV)?,
            run_id: require_env(RUN_ID_ENV)?,
            input: require_env(INPUT_ENV)?,
        })
    }
}

fn require_env(var: &str) -> Result<String, Error> {
    env::var(var).map_err(|_| Error::MissingEnv {
        var: var.to_string(),
    })
}

/// Forwards liveness signals to the log. A substrate adapter would forward
/// them as step heartbeats instead.
struct LogLiveness;

#[async_trait::async_trait]
impl LivenessSink for LogLiveness {
    async fn record_heartbeat(&self) {
        trace!("Liveness signal recorded");
    }
}

fn init_logger() {
    match env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            Builder::new()
                .filter_level(LevelFilter::Error)
                .filter(Some(env!("CARGO_CRATE_NAME")), LevelFilter::Info)
                .filter(Some("eks_lifecycle_worker"), LevelFilter::Info)
                .init();
        }
    }
}

#[tokio::main]
async fn main() {
    init_logger();

    let request = match RunRequest::from_env() {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Unable to read run request: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(request).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(request: RunRequest) -> Result<(), Error> {
    let shared_config = aws_config::from_env()
        .retry_config(
            RetryConfig::standard()
                .with_retry_mode(RetryMode::Adaptive)
                .with_max_attempts(15),
        )
        .load()
        .await;
    let region = shared_config.region().map(|region| region.to_string());

    let kube_factory =
        KubeClientFactory::new(aws_sdk_eks::Client::new(&shared_config), region);

    let steps = StepRegistry {
        stacks: Arc::new(CloudFormationStacks::new(aws_sdk_cloudformation::Client::new(
            &shared_config,
        ))),
        control_plane: Arc::new(EksControlPlane::new(aws_sdk_eks::Client::new(
            &shared_config,
        ))),
        instances: Arc::new(Ec2Instances::new(aws_sdk_ec2::Client::new(&shared_config))),
        scaling_groups: Arc::new(AutoScalingGroups::new(aws_sdk_autoscaling::Client::new(
            &shared_config,
        ))),
        nodes: Arc::new(KubeNodes::new(kube_factory.clone())),
        auth: Arc::new(AwsAuthPublisher::new(kube_factory)),
    };

    let run = RunContext::new(request.run_id.clone(), Arc::new(LogLiveness));

    info!(
        "Starting workflow '{}' (run '{}')",
        request.workflow, request.run_id
    );

    match request.workflow.as_str() {
        "create-cluster" => {
            let input: CreateClusterInput =
                serde_json::from_str(&request.input).context(ParseInputSnafu)?;
            create_cluster(&run, &steps, input).await.context(WorkflowSnafu)?;
        }
        "delete-cluster" => {
            let input: DeleteClusterInput =
                serde_json::from_str(&request.input).context(ParseInputSnafu)?;
            delete_cluster(&run, &steps, input).await.context(WorkflowSnafu)?;
        }
        "update-node-group" => {
            let input: UpdateNodeGroupInput =
                serde_json::from_str(&request.input).context(ParseInputSnafu)?;
            update_node_group(&run, &steps, input)
                .await
                .context(WorkflowSnafu)?;
        }
        workflow => {
            return UnknownWorkflowSnafu { workflow }.fail();
        }
    }

    info!("Workflow '{}' completed", request.workflow);
    Ok(())
}
