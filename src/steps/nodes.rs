use crate::error::{Error, KubeSnafu, Result};
use crate::step::StepContext;
use crate::steps::kube::KubeClientFactory;
use crate::steps::{ClusterNodes, NodeRecord};
use crate::wait::StepBudget;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::ResourceExt;
use log::{debug, info};
use snafu::ResultExt;

const MIRROR_POD_ANNOTATION: &str = "kubernetes.io/config.mirror";

/// The (region, instance id) pair encoded in a node's provider id, of the
/// form `aws:///<region>/<instance-id>`. Exists only while one node is being
/// replaced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeIdentity {
    pub region: String,
    pub instance_id: String,
}

impl NodeIdentity {
    pub fn parse(provider_id: &str) -> Result<Self> {
        let segments = provider_id
            .strip_prefix("aws:///")
            .ok_or_else(|| malformed(provider_id))?;
        let (region, instance_id) = segments.split_once('/').ok_or_else(|| malformed(provider_id))?;
        if region.is_empty() || instance_id.is_empty() || instance_id.contains('/') {
            return Err(malformed(provider_id));
        }
        Ok(Self {
            region: region.to_string(),
            instance_id: instance_id.to_string(),
        })
    }
}

fn malformed(provider_id: &str) -> Error {
    Error::MalformedProviderId {
        provider_id: provider_id.to_string(),
    }
}

/// Node steps backed by the cluster API.
#[derive(Clone, Debug)]
pub struct KubeNodes {
    factory: KubeClientFactory,
}

impl KubeNodes {
    pub fn new(factory: KubeClientFactory) -> Self {
        Self { factory }
    }
}

#[async_trait::async_trait]
impl ClusterNodes for KubeNodes {
    async fn list_nodes(&self, _ctx: &StepContext, cluster_name: &str) -> Result<Vec<NodeRecord>> {
        let client = self.factory.client_for(cluster_name).await?;
        let nodes: Api<Node> = Api::all(client);
        let node_list = nodes
            .list(&ListParams::default())
            .await
            .context(KubeSnafu)?;

        Ok(node_list
            .items
            .into_iter()
            .map(|node| NodeRecord {
                name: node.name_any(),
                provider_id: node
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.provider_id.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn drain_node(
        &self,
        ctx: &StepContext,
        cluster_name: &str,
        node_name: &str,
    ) -> Result<()> {
        let client = self.factory.client_for(cluster_name).await?;
        let nodes: Api<Node> = Api::all(client.clone());

        let node = nodes.get(node_name).await.context(KubeSnafu)?;
        let unschedulable = node
            .spec
            .as_ref()
            .and_then(|spec| spec.unschedulable)
            .unwrap_or(false);
        if !unschedulable {
            info!("Cordoning node '{}'", node_name);
            nodes
                .patch(
                    node_name,
                    &PatchParams::default(),
                    &Patch::Merge(serde_json::json!({ "spec": { "unschedulable": true } })),
                )
                .await
                .context(KubeSnafu)?;
        }

        let pods: Api<Pod> = Api::all(client.clone());
        let pod_list = pods
            .list(&ListParams::default().fields(&format!("spec.nodeName={}", node_name)))
            .await
            .context(KubeSnafu)?;

        // Zero grace, so workloads come down fast; daemon-managed and mirror
        // pods stay put.
        let delete_params = DeleteParams {
            grace_period_seconds: Some(0),
            ..DeleteParams::default()
        };

        for pod in pod_list.items.iter().filter(|pod| is_evictable(pod)) {
            let namespace = pod.namespace().unwrap_or_else(|| "default".to_string());
            let name = pod.name_any();
            debug!("Deleting pod '{}/{}'", namespace, name);

            let namespaced_pods: Api<Pod> = Api::namespaced(client.clone(), &namespace);
            match namespaced_pods.delete(&name, &delete_params).await {
                Ok(_) => {}
                // Pod already gone, nothing to evict.
                Err(kube::Error::Api(response)) if response.code == 404 => {}
                Err(error) => return Err(error).context(KubeSnafu),
            }
            ctx.record_heartbeat().await;
        }

        Ok(())
    }

    async fn delete_node(
        &self,
        _ctx: &StepContext,
        cluster_name: &str,
        node_name: &str,
    ) -> Result<()> {
        let client = self.factory.client_for(cluster_name).await?;
        let nodes: Api<Node> = Api::all(client);
        nodes
            .delete(node_name, &DeleteParams::default())
            .await
            .context(KubeSnafu)?;
        Ok(())
    }
}

fn is_evictable(pod: &Pod) -> bool {
    let daemon_managed = pod
        .metadata
        .owner_references
        .as_ref()
        .map(|owners| owners.iter().any(|owner| owner.kind == "DaemonSet"))
        .unwrap_or(false);
    let mirror = pod
        .metadata
        .annotations
        .as_ref()
        .map(|annotations| annotations.contains_key(MIRROR_POD_ANNOTATION))
        .unwrap_or(false);
    !daemon_managed && !mirror
}

#[cfg(test)]
mod test {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

    #[test]
    fn parses_provider_id() {
        let identity = NodeIdentity::parse("aws:///us-east-1/i-0123456789abcdef0").unwrap();
        assert_eq!(identity.region, "us-east-1");
        assert_eq!(identity.instance_id, "i-0123456789abcdef0");
    }

    #[test]
    fn rejects_malformed_provider_ids() {
        for provider_id in [
            "",
            "aws:///",
            "aws:///us-east-1",
            "aws:///us-east-1/",
            "gce:///us-east-1/i-0123456789abcdef0",
        ] {
            assert!(matches!(
                NodeIdentity::parse(provider_id).unwrap_err(),
                Error::MalformedProviderId { .. }
            ));
        }
    }

    #[test]
    fn daemon_set_pods_are_not_evictable() {
        let mut pod = Pod::default();
        pod.metadata.owner_references = Some(vec![OwnerReference {
            kind: "DaemonSet".to_string(),
            ..OwnerReference::default()
        }]);
        assert!(!is_evictable(&pod));
    }

    #[test]
    fn mirror_pods_are_not_evictable() {
        let mut pod = Pod::default();
        pod.metadata.annotations = Some(
            vec![(MIRROR_POD_ANNOTATION.to_string(), "hash".to_string())]
                .into_iter()
                .collect(),
        );
        assert!(!is_evictable(&pod));
    }

    #[test]
    fn workload_pods_are_evictable() {
        let mut pod = Pod::default();
        pod.metadata.owner_references = Some(vec![OwnerReference {
            kind: "ReplicaSet".to_string(),
            ..OwnerReference::default()
        }]);
        assert!(is_evictable(&pod));
    }
}
