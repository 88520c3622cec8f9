//! Lifecycle orchestration for ephemeral Kubernetes test instances.
//!
//! An [`Instance`] is a named unit made of a single-replica `StatefulSet`,
//! an optional `Service` exposing its declared ports, and an optional
//! `PersistentVolumeClaim` backing its declared volumes. Instances are used
//! as building blocks of integration and end-to-end test networks.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use knuu::{
//!     BuilderError, ImageBuilder, Instance, InstanceType, KnuuConfig, KubeClusterClient,
//!     Orchestrator, RunContext, Volume,
//! };
//!
//! struct Prebuilt;
//!
//! impl ImageBuilder for Prebuilt {
//!     fn add_to_builder(&self, _: &str, _: &str, _: &str) -> Result<(), BuilderError> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = KnuuConfig::from_env();
//! let client = KubeClusterClient::try_default(config.field_manager.clone()).await?;
//! let orchestrator = Orchestrator::new(Arc::new(client), Arc::new(RunContext::from_env()?), config);
//!
//! let mut validator = Instance::new("validator", InstanceType::Basic, Arc::new(Prebuilt))?;
//! validator.set_image("ghcr.io/celestiaorg/celestia-app:v1.0.0")?;
//! validator.add_port_tcp(26656)?;
//! validator.add_volume(Volume::new("/home/celestia", "1Gi", 10001));
//!
//! orchestrator.deploy_resources(&mut validator).await?;
//! orchestrator.destroy_resources(&mut validator).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! - `KNUU_NAMESPACE`: namespace for all resources (default `test`)
//! - `KNUU_IMAGE_REGISTRY` / `KNUU_IMAGE_TTL`: generated image references
//!   (default `ttl.sh` / `1h`)
//! - `KNUU_RUN_ID`: run identifier label (generated when unset)
//!
//! # Concurrency
//!
//! Nothing here spawns tasks or takes locks. Instances own their state, so
//! different instances may be driven concurrently by the caller; the same
//! instance must not be.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cluster;
pub mod config;
pub mod error;
pub mod identity;
pub mod image;
pub mod instance;
pub mod orchestrator;
pub mod ports;
pub mod quantity;
pub mod staging;
pub mod telemetry;

pub use cluster::{ClusterClient, ClusterError, KubeClusterClient};
pub use config::{KnuuConfig, RunContext};
pub use error::{InstanceError, Result};
pub use instance::{Instance, InstanceState, InstanceType, Volume};
pub use orchestrator::Orchestrator;
pub use ports::discover_free_tcp_port;
pub use staging::{stage_file, BuilderError, ImageBuilder};
