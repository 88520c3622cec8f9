//! Resource specifications sent to the cluster.
//!
//! Each config renders the manifest for one resource kind. Manifests are
//! assembled as JSON and deserialized into the typed `k8s-openapi` objects.

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::instance::Volume;
use crate::ports::Protocol;

/// Name of the pod volume backed by the instance's claim.
pub const STORAGE_VOLUME_NAME: &str = "storage";

/// Service manifest inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub selector: BTreeMap<String, String>,
    pub ports_tcp: Vec<i32>,
    pub ports_udp: Vec<i32>,
}

impl ServiceConfig {
    fn ports(&self) -> Vec<Value> {
        let tcp = self.ports_tcp.iter().map(|p| (Protocol::Tcp, *p));
        let udp = self.ports_udp.iter().map(|p| (Protocol::Udp, *p));
        tcp.chain(udp)
            .map(|(protocol, port)| {
                json!({
                    "name": format!("{}-{port}", protocol.as_str().to_lowercase()),
                    "protocol": protocol.as_str(),
                    "port": port,
                    "targetPort": port,
                })
            })
            .collect()
    }

    pub fn to_service(&self) -> Result<Service, serde_json::Error> {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": self.name,
                "namespace": self.namespace,
                "labels": self.labels,
            },
            "spec": {
                "selector": self.selector,
                "ports": self.ports(),
            }
        }))
    }
}

/// Pod template inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodConfig {
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub volumes: Vec<Volume>,
    pub memory_request: Option<String>,
    pub memory_limit: Option<String>,
    pub cpu_request: Option<String>,
    pub service_account_name: Option<String>,
}

impl PodConfig {
    fn resources(&self) -> Value {
        let mut requests = Map::new();
        if let Some(memory) = &self.memory_request {
            requests.insert("memory".into(), json!(memory));
        }
        if let Some(cpu) = &self.cpu_request {
            requests.insert("cpu".into(), json!(cpu));
        }
        let mut limits = Map::new();
        if let Some(memory) = &self.memory_limit {
            limits.insert("memory".into(), json!(memory));
        }

        let mut resources = Map::new();
        if !requests.is_empty() {
            resources.insert("requests".into(), Value::Object(requests));
        }
        if !limits.is_empty() {
            resources.insert("limits".into(), Value::Object(limits));
        }
        Value::Object(resources)
    }

    fn container(&self) -> Value {
        let mut container = json!({
            "name": self.name,
            "image": self.image,
            "resources": self.resources(),
        });

        if !self.command.is_empty() {
            container["command"] = json!(self.command);
        }
        if !self.args.is_empty() {
            container["args"] = json!(self.args);
        }
        if !self.env.is_empty() {
            let env: Vec<Value> = self
                .env
                .iter()
                .map(|(name, value)| json!({ "name": name, "value": value }))
                .collect();
            container["env"] = json!(env);
        }
        if !self.volumes.is_empty() {
            // One claim backs every volume; each path gets its own subPath.
            let mounts: Vec<Value> = self
                .volumes
                .iter()
                .map(|volume| {
                    json!({
                        "name": STORAGE_VOLUME_NAME,
                        "mountPath": volume.path,
                        "subPath": volume.path.trim_start_matches('/'),
                    })
                })
                .collect();
            container["volumeMounts"] = json!(mounts);
        }
        container
    }

    fn pod_spec(&self) -> Value {
        let mut spec = json!({
            "containers": [self.container()],
        });

        if let Some(account) = &self.service_account_name {
            spec["serviceAccountName"] = json!(account);
        }
        if !self.volumes.is_empty() {
            spec["volumes"] = json!([{
                "name": STORAGE_VOLUME_NAME,
                "persistentVolumeClaim": { "claimName": self.name },
            }]);
        }
        if let Some(owner) = self.volumes.first().map(|v| v.owner).filter(|o| *o != 0) {
            spec["securityContext"] = json!({ "fsGroup": owner });
        }
        spec
    }
}

/// StatefulSet manifest inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatefulSetConfig {
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub replicas: i32,
    pub pod: PodConfig,
}

impl StatefulSetConfig {
    pub fn to_stateful_set(&self) -> Result<StatefulSet, serde_json::Error> {
        serde_json::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "StatefulSet",
            "metadata": {
                "name": self.name,
                "namespace": self.namespace,
                "labels": self.labels,
            },
            "spec": {
                "replicas": self.replicas,
                "serviceName": self.name,
                "selector": { "matchLabels": self.labels },
                "template": {
                    "metadata": { "labels": self.pod.labels },
                    "spec": self.pod.pod_spec(),
                }
            }
        }))
    }
}

/// PersistentVolumeClaim manifest inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeClaimConfig {
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub size: Quantity,
}

impl VolumeClaimConfig {
    pub fn to_volume_claim(&self) -> Result<PersistentVolumeClaim, serde_json::Error> {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "PersistentVolumeClaim",
            "metadata": {
                "name": self.name,
                "namespace": self.namespace,
                "labels": self.labels,
            },
            "spec": {
                "accessModes": ["ReadWriteOnce"],
                "resources": {
                    "requests": { "storage": self.size.0 }
                }
            }
        }))
    }
}
