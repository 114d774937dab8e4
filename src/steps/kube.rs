use crate::error::{
    DescribeClusterSnafu, DeserializeJsonSnafu, GetTokenSnafu, KubeSnafu, KubeconfigParseSnafu,
    KubeconfigSnafu, MissingClusterFieldSnafu, ProcessSnafu, Result,
};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Config;
use log::debug;
use snafu::{OptionExt, ResultExt};
use std::convert::TryFrom;
use std::process::Command;

/// Builds authenticated clients for a cluster's API server.
///
/// The API endpoint and certificate authority come from describing the
/// control plane; the bearer token is a cluster-scoped signed token from
/// `aws eks get-token`.
#[derive(Clone, Debug)]
pub struct KubeClientFactory {
    eks_client: aws_sdk_eks::Client,
    region: Option<String>,
}

impl KubeClientFactory {
    pub fn new(eks_client: aws_sdk_eks::Client, region: Option<String>) -> Self {
        Self { eks_client, region }
    }

    pub async fn client_for(&self, cluster_name: &str) -> Result<kube::Client> {
        let cluster = self
            .eks_client
            .describe_cluster()
            .name(cluster_name)
            .send()
            .await
            .context(DescribeClusterSnafu)?
            .cluster
            .context(MissingClusterFieldSnafu { field: "cluster" })?;

        let endpoint = cluster
            .endpoint()
            .context(MissingClusterFieldSnafu { field: "endpoint" })?;
        let certificate_authority = cluster
            .certificate_authority()
            .and_then(|ca| ca.data())
            .context(MissingClusterFieldSnafu {
                field: "certificateAuthority.data",
            })?;

        debug!("Building client for cluster API at '{}'", endpoint);
        let token = self.bearer_token(cluster_name)?;

        let kubeconfig: Kubeconfig =
            serde_yaml::from_str(&kubeconfig_yaml(endpoint, certificate_authority, &token))
                .context(KubeconfigParseSnafu)?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context(KubeconfigSnafu)?;
        kube::Client::try_from(config).context(KubeSnafu)
    }

    fn bearer_token(&self, cluster_name: &str) -> Result<String> {
        let mut args = vec![
            "eks",
            "get-token",
            "--cluster-name",
            cluster_name,
            "--output",
            "json",
        ];
        if let Some(region) = &self.region {
            args.push("--region");
            args.push(region);
        }

        let output = Command::new("aws").args(&args).output().context(ProcessSnafu {
            what: "aws eks get-token",
        })?;
        if !output.status.success() {
            return GetTokenSnafu {
                message: String::from_utf8_lossy(&output.stderr).to_string(),
            }
            .fail();
        }

        let credential: serde_json::Value =
            serde_json::from_slice(&output.stdout).context(DeserializeJsonSnafu)?;
        credential
            .pointer("/status/token")
            .and_then(|token| token.as_str())
            .map(|token| token.to_string())
            .context(GetTokenSnafu {
                message: "missing token in output",
            })
    }
}

fn kubeconfig_yaml(endpoint: &str, certificate_authority_data: &str, token: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: Config
clusters:
- name: cluster
  cluster:
    server: {}
    certificate-authority-data: {}
users:
- name: user
  user:
    token: {}
contexts:
- name: context
  context:
    cluster: cluster
    user: user
current-context: context
"#,
        endpoint, certificate_authority_data, token
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kubeconfig_yaml_parses() {
        let kubeconfig: Kubeconfig = serde_yaml::from_str(&kubeconfig_yaml(
            "https://ABCDEF.gr7.us-east-1.eks.amazonaws.com",
            "dGVzdC1jYS1kYXRh",
            "k8s-aws-v1.token",
        ))
        .unwrap();
        assert_eq!(kubeconfig.clusters.len(), 1);
        assert_eq!(
            kubeconfig.current_context.as_deref(),
            Some("context")
        );
    }

    #[tokio::test]
    async fn client_builds_from_config() {
        let config = Config::new("https://localhost:6443".parse::<http::Uri>().unwrap());
        kube::Client::try_from(config).unwrap();
    }
}
