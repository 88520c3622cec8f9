//! Deploy, patch and teardown of an instance's cluster resources.
//!
//! Each resource kind moves independently through
//! `Absent -> Deployed -> (Patched)* -> Destroyed`. Deploys look the
//! resource up first and branch on existence rather than relying on
//! conflict errors from the API server.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::cluster::{
    ClusterClient, ClusterError, PodConfig, ServiceConfig, StatefulSetConfig, VolumeClaimConfig,
};
use crate::config::{KnuuConfig, RunContext};
use crate::error::{InstanceError, Result};
use crate::image;
use crate::instance::{Instance, InstanceState};
use crate::quantity;

/// Workloads are deleted without waiting for a drain.
const POD_GRACE_PERIOD_SECONDS: u32 = 0;

/// Applies instances' declared state to the cluster.
///
/// Holds no per-instance state: every operation reads the instance it is
/// given and writes the resulting handles back onto it.
#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn ClusterClient>,
    run: Arc<RunContext>,
    config: KnuuConfig,
}

impl Orchestrator {
    #[must_use]
    pub fn new(client: Arc<dyn ClusterClient>, run: Arc<RunContext>, config: KnuuConfig) -> Self {
        Self {
            client,
            run,
            config,
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    fn service_config(&self, instance: &Instance) -> ServiceConfig {
        let labels = instance.labels(&self.run);
        ServiceConfig {
            namespace: self.config.namespace.clone(),
            name: instance.cluster_name().to_string(),
            selector: labels.clone(),
            labels,
            ports_tcp: instance.ports_tcp().iter().copied().collect(),
            ports_udp: instance.ports_udp().iter().copied().collect(),
        }
    }

    fn stateful_set_config(&self, instance: &Instance, image: String) -> StatefulSetConfig {
        let labels = instance.labels(&self.run);
        let pod = PodConfig {
            namespace: self.config.namespace.clone(),
            name: instance.cluster_name().to_string(),
            labels: labels.clone(),
            image,
            command: instance.command().to_vec(),
            args: instance.args().to_vec(),
            env: instance.env().clone(),
            volumes: instance.volumes().to_vec(),
            memory_request: instance.memory_request().map(str::to_string),
            memory_limit: instance.memory_limit().map(str::to_string),
            cpu_request: instance.cpu_request().map(str::to_string),
            service_account_name: instance.service_account_name().map(str::to_string),
        };
        StatefulSetConfig {
            namespace: self.config.namespace.clone(),
            name: instance.cluster_name().to_string(),
            labels,
            replicas: 1,
            pod,
        }
    }

    /// Create the instance's service, or patch it if it already exists.
    #[instrument(skip_all, fields(cluster_name = %instance.cluster_name()))]
    pub async fn deploy_service(&self, instance: &mut Instance) -> Result<()> {
        let name = instance.cluster_name().to_string();
        let existing = self
            .client
            .get_service(self.namespace(), &name)
            .await
            .map_err(|source| InstanceError::ServiceDeployment {
                name: name.clone(),
                source,
            })?;

        if let Some(service) = existing {
            debug!("Service already exists, patching");
            instance.set_service_handle(Some(service));
            return self.patch_service(instance).await;
        }

        let service = self
            .client
            .create_service(&self.service_config(instance))
            .await
            .map_err(|source| InstanceError::ServiceDeployment { name, source })?;
        instance.set_service_handle(Some(service));
        debug!("Started service");
        Ok(())
    }

    /// Apply the instance's labels, selector and ports to its existing service.
    #[instrument(skip_all, fields(cluster_name = %instance.cluster_name()))]
    pub async fn patch_service(&self, instance: &mut Instance) -> Result<()> {
        let name = instance.cluster_name().to_string();
        if instance.service_handle().is_none() {
            let service = self
                .client
                .get_service(self.namespace(), &name)
                .await
                .and_then(|found| {
                    found.ok_or_else(|| ClusterError::NotFound {
                        kind: "Service",
                        name: name.clone(),
                    })
                })
                .map_err(|source| InstanceError::ServiceLookup {
                    name: name.clone(),
                    source,
                })?;
            instance.set_service_handle(Some(service));
        }

        let service = self
            .client
            .patch_service(&self.service_config(instance))
            .await
            .map_err(|source| InstanceError::ServicePatch { name, source })?;
        instance.set_service_handle(Some(service));
        debug!("Patched service");
        Ok(())
    }

    /// Delete the instance's service. A missing service is not an error.
    #[instrument(skip_all, fields(cluster_name = %instance.cluster_name()))]
    pub async fn destroy_service(&self, instance: &mut Instance) -> Result<()> {
        let name = instance.cluster_name().to_string();
        match self.client.delete_service(self.namespace(), &name).await {
            Ok(()) => debug!("Destroyed service"),
            Err(err) if err.is_not_found() => debug!("Service already absent"),
            Err(source) => return Err(InstanceError::ServiceDeletion { name, source }),
        }
        instance.set_service_handle(None);
        Ok(())
    }

    /// Deploy the single-replica stateful set running the instance.
    ///
    /// Resolves and caches the image first. An existing stateful set is
    /// overwritten with the current declared state.
    #[instrument(skip_all, fields(cluster_name = %instance.cluster_name()))]
    pub async fn deploy_pod(&self, instance: &mut Instance) -> Result<()> {
        let name = instance.cluster_name().to_string();
        if !instance.state().can_transition_to(InstanceState::Started) {
            return Err(InstanceError::InvalidStateTransition {
                name: instance.name().to_string(),
                from: instance.state(),
                to: InstanceState::Started,
            });
        }

        let image = image::resolve_image(instance, &self.config)?;
        instance.cache_image_name(image.clone());
        let config = self.stateful_set_config(instance, image);

        let pod_error = |source: ClusterError| InstanceError::PodDeployment {
            name: name.clone(),
            source,
        };
        let existing = self
            .client
            .get_stateful_set(self.namespace(), &name)
            .await
            .map_err(pod_error)?;
        let stateful_set = if existing.is_some() {
            debug!("StatefulSet already exists, replacing its spec");
            self.client.patch_stateful_set(&config).await
        } else {
            self.client.create_stateful_set(&config).await
        }
        .map_err(pod_error)?;

        instance.set_workload_handle(Some(stateful_set));
        instance.transition(InstanceState::Started)?;
        debug!(image = %config.pod.image, "Started statefulSet");
        Ok(())
    }

    /// Delete the instance's stateful set with no grace period.
    ///
    /// Only valid once the instance has been started. Unlike the service and
    /// volume teardowns, a missing stateful set is reported as an error.
    #[instrument(skip_all, fields(cluster_name = %instance.cluster_name()))]
    pub async fn destroy_pod(&self, instance: &mut Instance) -> Result<()> {
        let name = instance.cluster_name().to_string();
        if !instance.state().has_been_started() {
            return Err(InstanceError::InvalidStateTransition {
                name: instance.name().to_string(),
                from: instance.state(),
                to: InstanceState::Stopped,
            });
        }

        self.client
            .delete_stateful_set(self.namespace(), &name, POD_GRACE_PERIOD_SECONDS)
            .await
            .map_err(|source| InstanceError::PodDeletion { name, source })?;
        instance.set_workload_handle(None);
        instance.transition(InstanceState::Stopped)?;
        debug!("Destroyed statefulSet");
        Ok(())
    }

    /// Request one claim sized to the sum of all declared volumes.
    ///
    /// Not idempotent: calling again after adding volumes requests a new
    /// claim of the new total under the same name.
    #[instrument(skip_all, fields(cluster_name = %instance.cluster_name()))]
    pub async fn deploy_volume(&self, instance: &mut Instance) -> Result<()> {
        let name = instance.cluster_name().to_string();
        if instance.volumes().is_empty() {
            debug!("No volumes declared, skipping claim");
            return Ok(());
        }

        let volume_error = |source: ClusterError| InstanceError::VolumeDeployment {
            name: name.clone(),
            source,
        };
        let size = quantity::sum(instance.volumes().iter().map(|v| v.size.as_str()))
            .map_err(|e| volume_error(e.into()))?;

        let config = VolumeClaimConfig {
            namespace: self.config.namespace.clone(),
            name: name.clone(),
            labels: instance.labels(&self.run),
            size: size.to_quantity(),
        };
        self.client
            .create_volume_claim(&config)
            .await
            .map_err(volume_error)?;
        debug!(size = %size, "Deployed persistent volume");
        Ok(())
    }

    /// Delete the instance's claim. A missing claim is not an error.
    #[instrument(skip_all, fields(cluster_name = %instance.cluster_name()))]
    pub async fn destroy_volume(&self, instance: &mut Instance) -> Result<()> {
        let name = instance.cluster_name().to_string();
        match self.client.delete_volume_claim(self.namespace(), &name).await {
            Ok(()) => debug!("Destroyed persistent volume"),
            Err(err) if err.is_not_found() => debug!("Persistent volume already absent"),
            Err(source) => return Err(InstanceError::VolumeDeletion { name, source }),
        }
        Ok(())
    }

    /// Deploy everything the instance declares: the service when it has
    /// ports, the claim when it has volumes, then the workload.
    pub async fn deploy_resources(&self, instance: &mut Instance) -> Result<()> {
        if !instance.ports_tcp().is_empty() || !instance.ports_udp().is_empty() {
            self.deploy_service(instance).await?;
        }
        if !instance.volumes().is_empty() {
            self.deploy_volume(instance).await?;
        }
        self.deploy_pod(instance).await
    }

    /// Tear down every resource of the instance and mark it destroyed.
    ///
    /// Calling this on an already destroyed instance does nothing.
    pub async fn destroy_resources(&self, instance: &mut Instance) -> Result<()> {
        match instance.state() {
            InstanceState::Destroyed => {
                warn!(cluster_name = %instance.cluster_name(), "Instance already destroyed");
                return Ok(());
            }
            InstanceState::Started => self.destroy_pod(instance).await?,
            _ => {}
        }
        self.destroy_service(instance).await?;
        self.destroy_volume(instance).await?;
        instance.transition(InstanceState::Destroyed)
    }
}
