//! Declared state of a test instance.
//!
//! An [`Instance`] is built up through its setters while it is not deployed,
//! then handed to the [`Orchestrator`](crate::orchestrator::Orchestrator),
//! which reads the declared state and records the resulting cluster handles.

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::config::RunContext;
use crate::error::{InstanceError, Result};
use crate::identity;
use crate::ports::{self, PortSet, Protocol};
use crate::staging::ImageBuilder;

/// Root of the per-instance build-staging directories.
pub const BUILD_ROOT: &str = "/tmp/knuu";

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Freshly created, nothing declared yet.
    Created,
    /// Image and declared state are being configured.
    Preparing,
    /// Image is built and declared state is frozen.
    Committed,
    /// Workload is deployed.
    Started,
    /// Workload was deleted, other resources may remain.
    Stopped,
    /// All resources were torn down.
    Destroyed,
}

impl InstanceState {
    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use InstanceState::{Committed, Created, Destroyed, Preparing, Started, Stopped};
        matches!(
            (self, next),
            (Created, Preparing | Committed | Started | Destroyed)
                | (Preparing, Preparing | Committed | Started | Destroyed)
                | (Committed, Started | Destroyed)
                | (Started | Stopped, Started | Stopped | Destroyed)
                | (Destroyed, Destroyed)
        )
    }

    /// Whether a workload may exist in the cluster for this state.
    #[must_use]
    pub const fn has_been_started(self) -> bool {
        matches!(self, Self::Started | Self::Stopped)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Preparing => write!(f, "preparing"),
            Self::Committed => write!(f, "committed"),
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Classification of an instance. Only affects labeling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceType {
    #[default]
    Basic,
    Executor,
    TimeoutHandler,
}

impl InstanceType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "BasicInstance",
            Self::Executor => "ExecutorInstance",
            Self::TimeoutHandler => "TimeoutHandlerInstance",
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persistent volume declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Mount path inside the container
    pub path: String,
    /// Requested size as a Kubernetes quantity (e.g. `1Gi`)
    pub size: String,
    /// Group id that should own the mounted files
    pub owner: i64,
}

impl Volume {
    #[must_use]
    pub fn new(path: impl Into<String>, size: impl Into<String>, owner: i64) -> Self {
        Self {
            path: path.into(),
            size: size.into(),
            owner,
        }
    }
}

/// A named test instance and its declared state.
pub struct Instance {
    name: String,
    cluster_name: String,
    image_name: Option<String>,
    state: InstanceState,
    instance_type: InstanceType,
    service: Option<Service>,
    stateful_set: Option<StatefulSet>,
    ports_tcp: PortSet,
    ports_udp: PortSet,
    command: Vec<String>,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    volumes: Vec<Volume>,
    memory_request: Option<String>,
    memory_limit: Option<String>,
    cpu_request: Option<String>,
    service_account_name: Option<String>,
    builder: Arc<dyn ImageBuilder>,
}

impl Instance {
    /// Create an empty instance with a freshly derived cluster name.
    pub fn new(
        name: impl Into<String>,
        instance_type: InstanceType,
        builder: Arc<dyn ImageBuilder>,
    ) -> Result<Self> {
        let name = name.into();
        let cluster_name = identity::derive_cluster_name(&name)?;
        debug!(name = %name, cluster_name = %cluster_name, "Created instance");
        Ok(Self {
            name,
            cluster_name,
            image_name: None,
            state: InstanceState::Created,
            instance_type,
            service: None,
            stateful_set: None,
            ports_tcp: PortSet::new(),
            ports_udp: PortSet::new(),
            command: Vec::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            volumes: Vec::new(),
            memory_request: None,
            memory_limit: None,
            cpu_request: None,
            service_account_name: None,
            builder,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    #[must_use]
    pub fn image_name(&self) -> Option<&str> {
        self.image_name.as_deref()
    }

    #[must_use]
    pub fn state(&self) -> InstanceState {
        self.state
    }

    #[must_use]
    pub fn instance_type(&self) -> InstanceType {
        self.instance_type
    }

    #[must_use]
    pub fn ports_tcp(&self) -> &PortSet {
        &self.ports_tcp
    }

    #[must_use]
    pub fn ports_udp(&self) -> &PortSet {
        &self.ports_udp
    }

    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    #[must_use]
    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    #[must_use]
    pub fn memory_request(&self) -> Option<&str> {
        self.memory_request.as_deref()
    }

    #[must_use]
    pub fn memory_limit(&self) -> Option<&str> {
        self.memory_limit.as_deref()
    }

    #[must_use]
    pub fn cpu_request(&self) -> Option<&str> {
        self.cpu_request.as_deref()
    }

    #[must_use]
    pub fn service_account_name(&self) -> Option<&str> {
        self.service_account_name.as_deref()
    }

    /// Last observed Service object, if any. A cache, not ownership.
    #[must_use]
    pub fn service_handle(&self) -> Option<&Service> {
        self.service.as_ref()
    }

    /// Last observed StatefulSet object, if any. A cache, not ownership.
    #[must_use]
    pub fn workload_handle(&self) -> Option<&StatefulSet> {
        self.stateful_set.as_ref()
    }

    pub(crate) fn builder(&self) -> &Arc<dyn ImageBuilder> {
        &self.builder
    }

    /// Label set for every resource of this instance.
    #[must_use]
    pub fn labels(&self, run: &RunContext) -> BTreeMap<String, String> {
        identity::labels(
            run,
            &self.name,
            &self.cluster_name,
            self.instance_type.as_str(),
        )
    }

    /// Directory the image build context for this instance is staged in.
    #[must_use]
    pub fn build_dir(&self) -> PathBuf {
        PathBuf::from(BUILD_ROOT).join(&self.cluster_name)
    }

    pub fn add_port_tcp(&mut self, port: i32) -> Result<()> {
        self.add_port(Protocol::Tcp, port)
    }

    pub fn add_port_udp(&mut self, port: i32) -> Result<()> {
        self.add_port(Protocol::Udp, port)
    }

    #[must_use]
    pub fn is_tcp_port_registered(&self, port: i32) -> bool {
        ports::is_registered(&self.ports_tcp, port)
    }

    #[must_use]
    pub fn is_udp_port_registered(&self, port: i32) -> bool {
        ports::is_registered(&self.ports_udp, port)
    }

    fn add_port(&mut self, protocol: Protocol, port: i32) -> Result<()> {
        ports::validate_port(port)?;
        let set = match protocol {
            Protocol::Tcp => &mut self.ports_tcp,
            Protocol::Udp => &mut self.ports_udp,
        };
        if !set.insert(port) {
            return Err(InstanceError::PortAlreadyRegistered {
                name: self.name.clone(),
                protocol: protocol.as_str(),
                port,
            });
        }
        debug!(cluster_name = %self.cluster_name, %protocol, port, "Added port");
        Ok(())
    }

    /// Use a prebuilt image instead of a generated registry reference.
    pub fn set_image(&mut self, image: impl Into<String>) -> Result<()> {
        self.transition(InstanceState::Preparing)?;
        self.image_name = Some(image.into());
        Ok(())
    }

    pub fn set_command<I, S>(&mut self, command: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
    }

    pub fn set_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
    }

    pub fn set_env_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    pub fn add_volume(&mut self, volume: Volume) {
        self.volumes.push(volume);
    }

    pub fn set_memory(&mut self, request: impl Into<String>, limit: impl Into<String>) {
        self.memory_request = Some(request.into());
        self.memory_limit = Some(limit.into());
    }

    pub fn set_cpu(&mut self, request: impl Into<String>) {
        self.cpu_request = Some(request.into());
    }

    pub fn set_service_account_name(&mut self, name: impl Into<String>) {
        self.service_account_name = Some(name.into());
    }

    /// Copy this instance's declared state under `name + suffix`.
    ///
    /// Collections are copied by value. Cluster handles are left empty: the
    /// clone owns no resources until it is deployed itself.
    #[must_use]
    pub fn clone_with_suffix(&self, suffix: &str) -> Self {
        Self {
            name: format!("{}{suffix}", self.name),
            cluster_name: format!("{}{suffix}", self.cluster_name),
            image_name: self.image_name.clone(),
            state: self.state,
            instance_type: self.instance_type,
            service: None,
            stateful_set: None,
            ports_tcp: self.ports_tcp.clone(),
            ports_udp: self.ports_udp.clone(),
            command: self.command.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            volumes: self.volumes.clone(),
            memory_request: self.memory_request.clone(),
            memory_limit: self.memory_limit.clone(),
            cpu_request: self.cpu_request.clone(),
            service_account_name: self.service_account_name.clone(),
            builder: Arc::clone(&self.builder),
        }
    }

    pub(crate) fn transition(&mut self, next: InstanceState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(InstanceError::InvalidStateTransition {
                name: self.name.clone(),
                from: self.state,
                to: next,
            });
        }
        if self.state != next {
            debug!(cluster_name = %self.cluster_name, from = %self.state, to = %next, "State transition");
        }
        self.state = next;
        Ok(())
    }

    pub(crate) fn cache_image_name(&mut self, image: String) {
        self.image_name = Some(image);
    }

    pub(crate) fn set_service_handle(&mut self, service: Option<Service>) {
        self.service = service;
    }

    pub(crate) fn set_workload_handle(&mut self, stateful_set: Option<StatefulSet>) {
        self.stateful_set = stateful_set;
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.name)
            .field("cluster_name", &self.cluster_name)
            .field("image_name", &self.image_name)
            .field("state", &self.state)
            .field("instance_type", &self.instance_type)
            .field("ports_tcp", &self.ports_tcp)
            .field("ports_udp", &self.ports_udp)
            .field("volumes", &self.volumes)
            .finish_non_exhaustive()
    }
}
