use crate::error::{DescribeInstancesSnafu, Result, TerminateInstancesSnafu};
use crate::step::StepContext;
use crate::steps::Instances;
use crate::wait::{wait_until, WaitState};
use aws_sdk_ec2::model::{InstanceStateName, Reservation};
use snafu::ResultExt;

/// Compute instance steps backed by EC2.
#[derive(Clone, Debug)]
pub struct Ec2Instances {
    client: aws_sdk_ec2::Client,
}

impl Ec2Instances {
    pub fn new(client: aws_sdk_ec2::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Instances for Ec2Instances {
    async fn terminate_instance(&self, _ctx: &StepContext, instance_id: &str) -> Result<()> {
        self.client
            .terminate_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .context(TerminateInstancesSnafu)?;
        Ok(())
    }

    async fn wait_for_instance_terminated(
        &self,
        ctx: &StepContext,
        instance_id: &str,
    ) -> Result<()> {
        let client = self.client.clone();
        let id = instance_id.to_string();
        let what = format!("instance '{}'", instance_id);

        wait_until(ctx, &what, move || {
            let client = client.clone();
            let id = id.clone();
            async move {
                let output = client
                    .describe_instances()
                    .instance_ids(&id)
                    .send()
                    .await
                    .context(DescribeInstancesSnafu)?;

                Ok(termination_state(output.reservations().unwrap_or_default()))
            }
        })
        .await
    }
}

/// Ready only once at least one instance was observed and every observed
/// instance is terminated. A response with no instances stays pending; an
/// unknown instance id must not read as already gone.
fn termination_state(reservations: &[Reservation]) -> WaitState {
    let mut observed = false;
    for instance in reservations
        .iter()
        .flat_map(|reservation| reservation.instances().unwrap_or_default())
    {
        observed = true;
        if !matches!(
            instance.state().and_then(|state| state.name()),
            Some(InstanceStateName::Terminated)
        ) {
            return WaitState::Pending;
        }
    }

    if observed {
        WaitState::Ready
    } else {
        WaitState::Pending
    }
}
