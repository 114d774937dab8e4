use crate::error::{CreateClusterSnafu, DeleteClusterSnafu, DescribeClusterSnafu, Result};
use crate::step::StepContext;
use crate::steps::{ClusterTarget, ControlPlane, CreateClusterRequest};
use crate::wait::{wait_until, WaitState};
use aws_sdk_eks::error::{DescribeClusterError, DescribeClusterErrorKind};
use aws_sdk_eks::model::{ClusterStatus, VpcConfigRequest};
use aws_sdk_eks::types::SdkError;
use snafu::ResultExt;

/// Managed control plane steps backed by EKS.
#[derive(Clone, Debug)]
pub struct EksControlPlane {
    client: aws_sdk_eks::Client,
}

impl EksControlPlane {
    pub fn new(client: aws_sdk_eks::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ControlPlane for EksControlPlane {
    async fn create_cluster(&self, ctx: &StepContext, request: CreateClusterRequest) -> Result<()> {
        let token = request
            .client_request_token
            .unwrap_or_else(|| ctx.request_token());

        self.client
            .create_cluster()
            .name(&request.name)
            .role_arn(&request.role_arn)
            .version(&request.version)
            .resources_vpc_config(
                VpcConfigRequest::builder()
                    .set_subnet_ids(Some(request.subnet_ids.clone()))
                    .set_security_group_ids(Some(request.security_group_ids.clone()))
                    .build(),
            )
            .client_request_token(token)
            .send()
            .await
            .context(CreateClusterSnafu)?;
        Ok(())
    }

    async fn delete_cluster(&self, _ctx: &StepContext, cluster_name: &str) -> Result<()> {
        self.client
            .delete_cluster()
            .name(cluster_name)
            .send()
            .await
            .context(DeleteClusterSnafu)?;
        Ok(())
    }

    async fn wait_for_cluster(
        &self,
        ctx: &StepContext,
        cluster_name: &str,
        target: ClusterTarget,
    ) -> Result<()> {
        let client = self.client.clone();
        let name = cluster_name.to_string();
        let what = format!("cluster '{}'", cluster_name);

        wait_until(ctx, &what, move || {
            let client = client.clone();
            let name = name.clone();
            async move {
                let output = match client.describe_cluster().name(&name).send().await {
                    Ok(output) => output,
                    Err(error) => {
                        if target == ClusterTarget::Deleted && cluster_gone(&error) {
                            return Ok(WaitState::Ready);
                        }
                        return Err(error).context(DescribeClusterSnafu);
                    }
                };

                let status = output.cluster().and_then(|cluster| cluster.status()).cloned();

                Ok(match (target, status) {
                    (ClusterTarget::Active, Some(ClusterStatus::Active)) => WaitState::Ready,
                    (_, Some(ClusterStatus::Failed)) => WaitState::Terminal {
                        state: ClusterStatus::Failed.as_str().to_string(),
                    },
                    _ => WaitState::Pending,
                })
            }
        })
        .await
    }
}

fn cluster_gone(error: &SdkError<DescribeClusterError>) -> bool {
    if let SdkError::ServiceError(service_error) = error {
        return cluster_missing(service_error.err());
    }
    false
}

fn cluster_missing(error: &DescribeClusterError) -> bool {
    matches!(
        &error.kind,
        DescribeClusterErrorKind::ResourceNotFoundException(_)
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use aws_sdk_eks::error::ResourceNotFoundException;

    #[test]
    fn not_found_is_a_missing_cluster() {
        let error = DescribeClusterError::new(
            DescribeClusterErrorKind::ResourceNotFoundException(
                ResourceNotFoundException::builder()
                    .message("No cluster found for name: demo.")
                    .build(),
            ),
            aws_smithy_types::Error::builder().build(),
        );
        assert!(cluster_missing(&error));
    }

    #[test]
    fn other_describe_errors_are_not_a_missing_cluster() {
        let error = DescribeClusterError::generic(
            aws_smithy_types::Error::builder()
                .code("Throttling")
                .message("Rate exceeded")
                .build(),
        );
        assert!(!cluster_missing(&error));
    }
}
