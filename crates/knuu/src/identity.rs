//! Cluster naming and the canonical label set.

use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::RunContext;
use crate::error::Result;

pub const LABEL_APP: &str = "app";
pub const LABEL_MANAGED_BY: &str = "k8s.kubernetes.io/managed-by";
pub const LABEL_RUN_ID: &str = "test-run-id";
pub const LABEL_STARTED: &str = "test-started";
pub const LABEL_NAME: &str = "name";
pub const LABEL_CLUSTER_NAME: &str = "k8s-name";
pub const LABEL_TYPE: &str = "type";

pub const MANAGED_BY: &str = "knuu";

const SUFFIX_LENGTH: usize = 8;

/// Generate a random v4 UUID, surfacing entropy-source failures.
pub fn random_uuid() -> Result<Uuid> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes)?;
    Ok(uuid::Builder::from_random_bytes(bytes).into_uuid())
}

/// First eight hex characters of a fresh UUID.
pub(crate) fn short_id() -> Result<String> {
    let id = random_uuid()?.to_string();
    Ok(id[..SUFFIX_LENGTH].to_string())
}

/// Derive a cluster-unique resource name from a logical name.
///
/// ```
/// let name = knuu::identity::derive_cluster_name("validator").unwrap();
/// assert!(name.starts_with("validator-"));
/// ```
pub fn derive_cluster_name(logical_name: &str) -> Result<String> {
    Ok(format!("{logical_name}-{}", short_id()?))
}

/// Label set attached to every resource of an instance.
///
/// The same map is used as the service selector, so every value here must
/// stay fixed for as long as the instance is deployed.
#[must_use]
pub fn labels(
    run: &RunContext,
    name: &str,
    cluster_name: &str,
    instance_type: &str,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_APP.to_string(), cluster_name.to_string()),
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY.to_string()),
        (LABEL_RUN_ID.to_string(), run.identifier().to_string()),
        (LABEL_STARTED.to_string(), run.start_time().to_string()),
        (LABEL_NAME.to_string(), name.to_string()),
        (LABEL_CLUSTER_NAME.to_string(), cluster_name.to_string()),
        (LABEL_TYPE.to_string(), instance_type.to_string()),
    ])
}
