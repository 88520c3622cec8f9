//! `kube`-backed [`ClusterClient`].

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::{debug, instrument};

use super::{ClusterClient, ClusterError, ServiceConfig, StatefulSetConfig, VolumeClaimConfig};

const KIND_SERVICE: &str = "Service";
const KIND_STATEFUL_SET: &str = "StatefulSet";
const KIND_VOLUME_CLAIM: &str = "PersistentVolumeClaim";

/// Cluster client talking to the Kubernetes API server.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    field_manager: String,
}

impl KubeClusterClient {
    #[must_use]
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    /// Connect using the ambient kubeconfig or in-cluster service account.
    pub async fn try_default(field_manager: impl Into<String>) -> Result<Self, ClusterError> {
        let client = Client::try_default().await?;
        Ok(Self::new(client, field_manager))
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn stateful_sets(&self, namespace: &str) -> Api<StatefulSet> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn volume_claims(&self, namespace: &str) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..PostParams::default()
        }
    }
}

/// Server-side apply as the sole owner of every field we send, so keys
/// dropped from the declared state are removed from the live object.
fn apply_params(field_manager: &str) -> PatchParams {
    PatchParams::apply(field_manager).force()
}

/// Map a 404 from the API server to [`ClusterError::NotFound`].
fn classify(err: kube::Error, kind: &'static str, name: &str) -> ClusterError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound {
            kind,
            name: name.to_string(),
        },
        other => ClusterError::Kube(other),
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ClusterError> {
        Ok(self.services(namespace).get_opt(name).await?)
    }

    #[instrument(skip(self, config), fields(name = %config.name))]
    async fn create_service(&self, config: &ServiceConfig) -> Result<Service, ClusterError> {
        let service = config.to_service()?;
        let created = self
            .services(&config.namespace)
            .create(&self.post_params(), &service)
            .await?;
        debug!("Created service");
        Ok(created)
    }

    #[instrument(skip(self, config), fields(name = %config.name))]
    async fn patch_service(&self, config: &ServiceConfig) -> Result<Service, ClusterError> {
        let service = config.to_service()?;
        let patched = self
            .services(&config.namespace)
            .patch(&config.name, &apply_params(&self.field_manager), &Patch::Apply(&service))
            .await
            .map_err(|e| classify(e, KIND_SERVICE, &config.name))?;
        debug!("Patched service");
        Ok(patched)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.services(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| classify(e, KIND_SERVICE, name))?;
        Ok(())
    }

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, ClusterError> {
        Ok(self.stateful_sets(namespace).get_opt(name).await?)
    }

    #[instrument(skip(self, config), fields(name = %config.name))]
    async fn create_stateful_set(
        &self,
        config: &StatefulSetConfig,
    ) -> Result<StatefulSet, ClusterError> {
        let stateful_set = config.to_stateful_set()?;
        let created = self
            .stateful_sets(&config.namespace)
            .create(&self.post_params(), &stateful_set)
            .await?;
        debug!("Created stateful set");
        Ok(created)
    }

    #[instrument(skip(self, config), fields(name = %config.name))]
    async fn patch_stateful_set(
        &self,
        config: &StatefulSetConfig,
    ) -> Result<StatefulSet, ClusterError> {
        let stateful_set = config.to_stateful_set()?;
        let patched = self
            .stateful_sets(&config.namespace)
            .patch(&config.name, &apply_params(&self.field_manager), &Patch::Apply(&stateful_set))
            .await
            .map_err(|e| classify(e, KIND_STATEFUL_SET, &config.name))?;
        debug!("Patched stateful set");
        Ok(patched)
    }

    async fn delete_stateful_set(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: u32,
    ) -> Result<(), ClusterError> {
        let params = DeleteParams {
            grace_period_seconds: Some(grace_period_seconds),
            ..DeleteParams::default()
        };
        self.stateful_sets(namespace)
            .delete(name, &params)
            .await
            .map_err(|e| classify(e, KIND_STATEFUL_SET, name))?;
        Ok(())
    }

    #[instrument(skip(self, config), fields(name = %config.name, size = %config.size.0))]
    async fn create_volume_claim(
        &self,
        config: &VolumeClaimConfig,
    ) -> Result<PersistentVolumeClaim, ClusterError> {
        let claim = config.to_volume_claim()?;
        let created = self
            .volume_claims(&config.namespace)
            .create(&self.post_params(), &claim)
            .await?;
        debug!("Created persistent volume claim");
        Ok(created)
    }

    async fn delete_volume_claim(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.volume_claims(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| classify(e, KIND_VOLUME_CLAIM, name))?;
        Ok(())
    }
}
