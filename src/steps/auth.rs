use crate::error::{KubeSnafu, Result};
use crate::step::StepContext;
use crate::steps::kube::KubeClientFactory;
use crate::steps::ClusterAuth;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, ObjectMeta, Patch, PatchParams, PostParams};
use log::info;
use snafu::ResultExt;
use std::collections::BTreeMap;

const AUTH_CONFIG_MAP: &str = "aws-auth";
const AUTH_NAMESPACE: &str = "kube-system";

/// Publishes the node-authentication mapping that lets node instance roles
/// join the cluster.
#[derive(Clone, Debug)]
pub struct AwsAuthPublisher {
    factory: KubeClientFactory,
}

impl AwsAuthPublisher {
    pub fn new(factory: KubeClientFactory) -> Self {
        Self { factory }
    }
}

#[async_trait::async_trait]
impl ClusterAuth for AwsAuthPublisher {
    async fn publish_node_auth(
        &self,
        _ctx: &StepContext,
        cluster_name: &str,
        node_instance_role_arns: &[String],
    ) -> Result<()> {
        let client = self.factory.client_for(cluster_name).await?;
        let config_maps: Api<ConfigMap> = Api::namespaced(client, AUTH_NAMESPACE);

        let mut data = BTreeMap::new();
        data.insert("mapRoles".to_string(), map_roles(node_instance_role_arns));

        let config_map = ConfigMap {
            metadata: ObjectMeta {
                name: Some(AUTH_CONFIG_MAP.to_string()),
                namespace: Some(AUTH_NAMESPACE.to_string()),
                ..ObjectMeta::default()
            },
            data: Some(data),
            ..ConfigMap::default()
        };

        match config_maps.create(&PostParams::default(), &config_map).await {
            Ok(_) => {
                info!("Created '{}' config map", AUTH_CONFIG_MAP);
                Ok(())
            }
            // The mapping already exists; merge the roles in.
            Err(kube::Error::Api(response)) if response.code == 409 => {
                info!("'{}' config map exists, patching", AUTH_CONFIG_MAP);
                config_maps
                    .patch(
                        AUTH_CONFIG_MAP,
                        &PatchParams::default(),
                        &Patch::Merge(&config_map),
                    )
                    .await
                    .context(KubeSnafu)?;
                Ok(())
            }
            Err(error) => Err(error).context(KubeSnafu),
        }
    }
}

fn map_roles(node_instance_role_arns: &[String]) -> String {
    let mut map_roles = String::new();
    for arn in node_instance_role_arns {
        map_roles.push_str(&format!(
            "  - rolearn: {}\n    username: system:node:{{{{EC2PrivateDNSName}}}}\n    groups:\n      - system:bootstrappers\n      - system:nodes\n",
            arn
        ));
    }
    map_roles
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn map_roles_entry_format() {
        let arns = vec!["arn:aws:iam::111122223333:role/node".to_string()];
        assert_eq!(
            map_roles(&arns),
            "  - rolearn: arn:aws:iam::111122223333:role/node\n    username: system:node:{{EC2PrivateDNSName}}\n    groups:\n      - system:bootstrappers\n      - system:nodes\n"
        );
    }

    #[test]
    fn map_roles_accumulates_in_order() {
        let arns = vec!["arn:a".to_string(), "arn:b".to_string()];
        let rendered = map_roles(&arns);
        let first = rendered.find("arn:a").unwrap();
        let second = rendered.find("arn:b").unwrap();
        assert!(first < second);
    }
}
