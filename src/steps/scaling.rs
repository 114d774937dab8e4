use crate::error::{DetachInstancesSnafu, Result};
use crate::step::StepContext;
use crate::steps::ScalingGroups;
use snafu::ResultExt;

/// Scaling group steps backed by EC2 Auto Scaling.
#[derive(Clone, Debug)]
pub struct AutoScalingGroups {
    client: aws_sdk_autoscaling::Client,
}

impl AutoScalingGroups {
    pub fn new(client: aws_sdk_autoscaling::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ScalingGroups for AutoScalingGroups {
    async fn detach_instance(
        &self,
        _ctx: &StepContext,
        group_name: &str,
        instance_id: &str,
    ) -> Result<()> {
        self.client
            .detach_instances()
            .auto_scaling_group_name(group_name)
            .instance_ids(instance_id)
            // Keep the desired capacity, so the group launches a replacement.
            .should_decrement_desired_capacity(false)
            .send()
            .await
            .context(DetachInstancesSnafu)?;
        Ok(())
    }
}
