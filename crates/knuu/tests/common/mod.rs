//! In-memory cluster used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use knuu::cluster::{ServiceConfig, StatefulSetConfig, VolumeClaimConfig};
use knuu::{BuilderError, ClusterClient, ClusterError, ImageBuilder};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

/// Operation names accepted by [`FakeCluster::fail`].
pub const GET_SERVICE: &str = "get_service";
pub const PATCH_SERVICE: &str = "patch_service";
pub const DELETE_SERVICE: &str = "delete_service";
pub const CREATE_STATEFUL_SET: &str = "create_stateful_set";
pub const DELETE_STATEFUL_SET: &str = "delete_stateful_set";
pub const DELETE_VOLUME_CLAIM: &str = "delete_volume_claim";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetService(String),
    CreateService(String),
    PatchService(String),
    DeleteService(String),
    GetStatefulSet(String),
    CreateStatefulSet(String),
    PatchStatefulSet(String),
    DeleteStatefulSet { name: String, grace: u32 },
    CreateVolumeClaim { name: String, size: String },
    DeleteVolumeClaim(String),
}

#[derive(Default)]
pub struct FakeCluster {
    services: Mutex<BTreeMap<String, Service>>,
    stateful_sets: Mutex<BTreeMap<String, StatefulSet>>,
    claims: Mutex<BTreeMap<String, PersistentVolumeClaim>>,
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<&'static str>>,
}

fn api_error(code: u16, reason: &str) -> ClusterError {
    ClusterError::Kube(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: reason.to_string(),
        reason: reason.to_string(),
        code,
    }))
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call of `operation` fail with a 500.
    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.services.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn stateful_set(&self, namespace: &str, name: &str) -> Option<StatefulSet> {
        self.stateful_sets.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn claim(&self, namespace: &str, name: &str) -> Option<PersistentVolumeClaim> {
        self.claims.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn insert_service(&self, namespace: &str, name: &str, service: Service) {
        self.services.lock().unwrap().insert(key(namespace, name), service);
    }

    fn record(&self, call: Call, operation: &'static str) -> Result<(), ClusterError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(operation) {
            return Err(api_error(500, "InternalError"));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, ClusterError> {
        self.record(Call::GetService(name.to_string()), GET_SERVICE)?;
        Ok(self.service(namespace, name))
    }

    async fn create_service(&self, config: &ServiceConfig) -> Result<Service, ClusterError> {
        self.record(Call::CreateService(config.name.clone()), "create_service")?;
        let mut services = self.services.lock().unwrap();
        let k = key(&config.namespace, &config.name);
        if services.contains_key(&k) {
            return Err(api_error(409, "AlreadyExists"));
        }
        let service = config.to_service()?;
        services.insert(k, service.clone());
        Ok(service)
    }

    async fn patch_service(&self, config: &ServiceConfig) -> Result<Service, ClusterError> {
        self.record(Call::PatchService(config.name.clone()), PATCH_SERVICE)?;
        let mut services = self.services.lock().unwrap();
        let k = key(&config.namespace, &config.name);
        if !services.contains_key(&k) {
            return Err(ClusterError::NotFound {
                kind: "Service",
                name: config.name.clone(),
            });
        }
        let service = config.to_service()?;
        services.insert(k, service.clone());
        Ok(service)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.record(Call::DeleteService(name.to_string()), DELETE_SERVICE)?;
        self.services
            .lock()
            .unwrap()
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| ClusterError::NotFound {
                kind: "Service",
                name: name.to_string(),
            })
    }

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, ClusterError> {
        self.record(Call::GetStatefulSet(name.to_string()), "get_stateful_set")?;
        Ok(self.stateful_set(namespace, name))
    }

    async fn create_stateful_set(&self, config: &StatefulSetConfig) -> Result<StatefulSet, ClusterError> {
        self.record(Call::CreateStatefulSet(config.name.clone()), CREATE_STATEFUL_SET)?;
        let mut sets = self.stateful_sets.lock().unwrap();
        let k = key(&config.namespace, &config.name);
        if sets.contains_key(&k) {
            return Err(api_error(409, "AlreadyExists"));
        }
        let sts = config.to_stateful_set()?;
        sets.insert(k, sts.clone());
        Ok(sts)
    }

    async fn patch_stateful_set(&self, config: &StatefulSetConfig) -> Result<StatefulSet, ClusterError> {
        self.record(Call::PatchStatefulSet(config.name.clone()), "patch_stateful_set")?;
        let sts = config.to_stateful_set()?;
        self.stateful_sets
            .lock()
            .unwrap()
            .insert(key(&config.namespace, &config.name), sts.clone());
        Ok(sts)
    }

    async fn delete_stateful_set(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: u32,
    ) -> Result<(), ClusterError> {
        self.record(
            Call::DeleteStatefulSet {
                name: name.to_string(),
                grace: grace_period_seconds,
            },
            DELETE_STATEFUL_SET,
        )?;
        self.stateful_sets
            .lock()
            .unwrap()
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| ClusterError::NotFound {
                kind: "StatefulSet",
                name: name.to_string(),
            })
    }

    async fn create_volume_claim(
        &self,
        config: &VolumeClaimConfig,
    ) -> Result<PersistentVolumeClaim, ClusterError> {
        self.record(
            Call::CreateVolumeClaim {
                name: config.name.clone(),
                size: config.size.0.clone(),
            },
            "create_volume_claim",
        )?;
        let mut claims = self.claims.lock().unwrap();
        let k = key(&config.namespace, &config.name);
        if claims.contains_key(&k) {
            return Err(api_error(409, "AlreadyExists"));
        }
        let claim = config.to_volume_claim()?;
        claims.insert(k, claim.clone());
        Ok(claim)
    }

    async fn delete_volume_claim(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.record(Call::DeleteVolumeClaim(name.to_string()), DELETE_VOLUME_CLAIM)?;
        self.claims
            .lock()
            .unwrap()
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| ClusterError::NotFound {
                kind: "PersistentVolumeClaim",
                name: name.to_string(),
            })
    }
}

/// Builder for instances whose image is supplied up front.
pub struct NoopBuilder;

impl ImageBuilder for NoopBuilder {
    fn add_to_builder(&self, _src: &str, _dest: &str, _chown: &str) -> Result<(), BuilderError> {
        Ok(())
    }
}
