use crate::error::{
    CreateStackSnafu, DeleteStackSnafu, DescribeStacksSnafu, Result, UpdateStackSnafu,
};
use crate::outputs::{DescribedStack, StackOutput};
use crate::step::StepContext;
use crate::steps::{CreateStackRequest, StackParameter, StackTarget, Stacks, UpdateStackRequest};
use crate::wait::{wait_until, WaitState};
use aws_sdk_cloudformation::error::DescribeStacksError;
use aws_sdk_cloudformation::model::{Capability, Parameter, StackStatus};
use aws_sdk_cloudformation::types::SdkError;
use snafu::ResultExt;

/// Infrastructure stack steps backed by CloudFormation.
#[derive(Clone, Debug)]
pub struct CloudFormationStacks {
    client: aws_sdk_cloudformation::Client,
}

impl CloudFormationStacks {
    pub fn new(client: aws_sdk_cloudformation::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Stacks for CloudFormationStacks {
    async fn create_stack(&self, ctx: &StepContext, request: CreateStackRequest) -> Result<()> {
        let token = request
            .client_request_token
            .unwrap_or_else(|| ctx.request_token());

        let mut call = self
            .client
            .create_stack()
            .stack_name(&request.stack_name)
            .template_body(&request.template_body)
            .client_request_token(token);

        for (key, value) in &request.parameters {
            call = call.parameters(
                Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value)
                    .build(),
            );
        }

        if request.iam_capability {
            call = call.capabilities(Capability::CapabilityIam);
        }

        call.send().await.context(CreateStackSnafu)?;
        Ok(())
    }

    async fn update_stack(&self, ctx: &StepContext, request: UpdateStackRequest) -> Result<()> {
        let token = request
            .client_request_token
            .unwrap_or_else(|| ctx.request_token());

        let mut call = self
            .client
            .update_stack()
            .stack_name(&request.stack_name)
            .template_body(&request.template_body)
            .client_request_token(token);

        for parameter in &request.parameters {
            call = call.parameters(match parameter {
                StackParameter::Previous { key } => Parameter::builder()
                    .parameter_key(key)
                    .use_previous_value(true)
                    .build(),
                StackParameter::Value { key, value } => Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value)
                    .build(),
            });
        }

        if request.iam_capability {
            call = call.capabilities(Capability::CapabilityIam);
        }

        call.send().await.context(UpdateStackSnafu)?;
        Ok(())
    }

    async fn delete_stack(&self, ctx: &StepContext, stack_name: &str) -> Result<()> {
        self.client
            .delete_stack()
            .stack_name(stack_name)
            .client_request_token(ctx.request_token())
            .send()
            .await
            .context(DeleteStackSnafu)?;
        Ok(())
    }

    async fn describe_stacks(
        &self,
        _ctx: &StepContext,
        stack_name: &str,
    ) -> Result<Vec<DescribedStack>> {
        let output = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .context(DescribeStacksSnafu)?;

        Ok(output
            .stacks()
            .unwrap_or_default()
            .iter()
            .map(|stack| DescribedStack {
                status: stack
                    .stack_status()
                    .map(|status| status.as_str().to_string())
                    .unwrap_or_default(),
                outputs: stack
                    .outputs()
                    .unwrap_or_default()
                    .iter()
                    .map(|output| StackOutput {
                        key: output.output_key().unwrap_or_default().to_string(),
                        value: output.output_value().unwrap_or_default().to_string(),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn wait_for_stack(
        &self,
        ctx: &StepContext,
        stack_name: &str,
        target: StackTarget,
    ) -> Result<()> {
        let client = self.client.clone();
        let name = stack_name.to_string();
        let what = format!("stack '{}'", stack_name);

        wait_until(ctx, &what, move || {
            let client = client.clone();
            let name = name.clone();
            async move {
                let output = match client.describe_stacks().stack_name(&name).send().await {
                    Ok(output) => output,
                    Err(error) => {
                        // A deleted stack stops being describable.
                        if target == StackTarget::DeleteComplete && stack_gone(&error) {
                            return Ok(WaitState::Ready);
                        }
                        return Err(error).context(DescribeStacksSnafu);
                    }
                };

                let status = output
                    .stacks()
                    .and_then(|stacks| stacks.first())
                    .and_then(|stack| stack.stack_status())
                    .cloned();

                Ok(match status {
                    Some(status) => classify(target, status),
                    None if target == StackTarget::DeleteComplete => WaitState::Ready,
                    None => WaitState::Pending,
                })
            }
        })
        .await
    }
}

fn classify(target: StackTarget, status: StackStatus) -> WaitState {
    let terminal = || WaitState::Terminal {
        state: status.as_str().to_string(),
    };

    match target {
        StackTarget::CreateComplete => match status {
            StackStatus::CreateComplete => WaitState::Ready,
            StackStatus::CreateFailed
            | StackStatus::DeleteComplete
            | StackStatus::DeleteFailed
            | StackStatus::RollbackComplete
            | StackStatus::RollbackFailed
            | StackStatus::RollbackInProgress => terminal(),
            _ => WaitState::Pending,
        },
        StackTarget::UpdateComplete => match status {
            StackStatus::UpdateComplete => WaitState::Ready,
            StackStatus::UpdateFailed
            | StackStatus::UpdateRollbackComplete
            | StackStatus::UpdateRollbackFailed
            | StackStatus::UpdateRollbackInProgress => terminal(),
            _ => WaitState::Pending,
        },
        StackTarget::DeleteComplete => match status {
            StackStatus::DeleteComplete => WaitState::Ready,
            StackStatus::CreateFailed | StackStatus::DeleteFailed | StackStatus::RollbackFailed => {
                terminal()
            }
            _ => WaitState::Pending,
        },
    }
}

fn stack_gone(error: &SdkError<DescribeStacksError>) -> bool {
    if let SdkError::ServiceError(service_error) = error {
        return stack_missing(service_error.err());
    }
    false
}

fn stack_missing(error: &DescribeStacksError) -> bool {
    error
        .message()
        .map(|message| message.contains("does not exist"))
        .unwrap_or(false)
}
