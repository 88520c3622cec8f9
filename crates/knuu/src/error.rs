//! Error types for instance orchestration.

use thiserror::Error;

use crate::cluster::ClusterError;
use crate::instance::InstanceState;
use crate::staging::BuilderError;

/// Result alias used across the crate.
pub type Result<T, E = InstanceError> = std::result::Result<T, E>;

/// Errors surfaced by instance orchestration operations.
///
/// Every cluster-facing variant carries the instance's cluster name so a
/// failure can be traced back to the resource it concerned.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// The random identifier source failed.
    #[error("failed to generate identifier: {0}")]
    IdentityGeneration(#[from] getrandom::Error),

    /// The OS would not hand out an ephemeral TCP port.
    #[error("failed to discover a free TCP port: {0}")]
    FreePortDiscovery(#[source] std::io::Error),

    /// Port is outside `1..=65535`.
    #[error("port number '{port}' is out of range")]
    InvalidPort { port: i32 },

    /// Port is already declared on the instance.
    #[error("{protocol} port '{port}' is already registered on instance '{name}'")]
    PortAlreadyRegistered {
        name: String,
        protocol: &'static str,
        port: i32,
    },

    /// File staging arguments failed validation.
    #[error("invalid file arguments: {0}")]
    InvalidFileArgs(String),

    /// Operation is not allowed from the instance's current state.
    #[error("instance '{name}' cannot move from '{from}' to '{to}'")]
    InvalidStateTransition {
        name: String,
        from: InstanceState,
        to: InstanceState,
    },

    #[error("error deploying service '{name}': {source}")]
    ServiceDeployment {
        name: String,
        #[source]
        source: ClusterError,
    },

    #[error("error patching service '{name}': {source}")]
    ServicePatch {
        name: String,
        #[source]
        source: ClusterError,
    },

    #[error("error getting service '{name}': {source}")]
    ServiceLookup {
        name: String,
        #[source]
        source: ClusterError,
    },

    #[error("error deleting service '{name}': {source}")]
    ServiceDeletion {
        name: String,
        #[source]
        source: ClusterError,
    },

    #[error("failed to deploy pod '{name}': {source}")]
    PodDeployment {
        name: String,
        #[source]
        source: ClusterError,
    },

    #[error("failed to delete pod '{name}': {source}")]
    PodDeletion {
        name: String,
        #[source]
        source: ClusterError,
    },

    #[error("failed to deploy volume '{name}': {source}")]
    VolumeDeployment {
        name: String,
        #[source]
        source: ClusterError,
    },

    #[error("failed to delete volume '{name}': {source}")]
    VolumeDeletion {
        name: String,
        #[source]
        source: ClusterError,
    },

    #[error("error adding file '{dest}' to instance '{name}': {source}")]
    FileStaging {
        name: String,
        dest: String,
        #[source]
        source: BuilderError,
    },
}
