//! Cluster resource client boundary.
//!
//! The orchestrator talks to the cluster only through [`ClusterClient`].
//! [`KubeClusterClient`] is the production implementation on top of `kube`.

pub mod client;
pub mod resources;

pub use client::KubeClusterClient;
pub use resources::{PodConfig, ServiceConfig, StatefulSetConfig, VolumeClaimConfig};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use thiserror::Error;

use crate::quantity::QuantityError;

/// Errors raised by a [`ClusterClient`].
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The resource does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// Kubernetes API call failed.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Manifest could not be built.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A resource quantity failed to parse.
    #[error(transparent)]
    Quantity(#[from] QuantityError),
}

impl ClusterError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Namespaced create/get/patch/delete primitives for instance resources.
///
/// Deletes of a missing resource must return [`ClusterError::NotFound`];
/// callers decide whether that counts as success.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, ClusterError>;

    async fn create_service(&self, config: &ServiceConfig) -> Result<Service, ClusterError>;

    /// Overwrite labels, selector and ports of an existing service.
    async fn patch_service(&self, config: &ServiceConfig) -> Result<Service, ClusterError>;

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, ClusterError>;

    async fn create_stateful_set(
        &self,
        config: &StatefulSetConfig,
    ) -> Result<StatefulSet, ClusterError>;

    /// Overwrite the spec of an existing stateful set.
    async fn patch_stateful_set(
        &self,
        config: &StatefulSetConfig,
    ) -> Result<StatefulSet, ClusterError>;

    async fn delete_stateful_set(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: u32,
    ) -> Result<(), ClusterError>;

    async fn create_volume_claim(
        &self,
        config: &VolumeClaimConfig,
    ) -> Result<PersistentVolumeClaim, ClusterError>;

    async fn delete_volume_claim(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}
