//! EKS Component SDK
//!
//! Compose a managed EKS cluster, its node groups, IAM roles, add-ons and
//! access entries on top of a remote resource provider.
//!
//! # Overview
//!
//! - **Configuration types**: [`ClusterConfig`], [`NodeGroupConfig`],
//!   [`AccessEntryConfig`], loaded from JSON via [`Composition`]
//! - **Resolution**: node group defaults filled from the cluster ([`resolve()`])
//! - **Validation**: every configuration problem reported at once, before any
//!   remote call ([`validate`])
//! - **Composition**: dependency-ordered, concurrent create requests with
//!   partial-failure reporting ([`compose()`])
//! - **ResourceProvider trait**: the remote contract, with a gRPC adapter
//! - **aws-auth**: IAM role and user mappings for `CONFIG_MAP` clusters
//!   ([`awsauth`])
//! - **Kubeconfig**: deterministic kubeconfig generation
//! - **Logging**: `tracing` to stderr
//!
//! # Quick Start
//!
//! ```ignore
//! use eks_component_sdk::{
//!     compose, ClusterConfig, GrpcResourceProvider, NodeGroupConfig,
//!     iam::IamRoleSpec,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provider = GrpcResourceProvider::connect("http://127.0.0.1:50051").await?;
//!
//!     let cluster = ClusterConfig::new("demo", "arn:aws:iam::123456789012:role/eks-service")
//!         .with_version("1.31")
//!         .with_private_subnets(["subnet-a", "subnet-b"]);
//!     let workers = NodeGroupConfig::new("workers")
//!         .with_node_role(IamRoleSpec::node_role("workers-instanceRole"))
//!         .with_instance_types(["t4g.medium"]);
//!
//!     let result = compose(&provider, &cluster, &[workers], &[]).await?;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! A provider plugin announces where it listens with one line on stdout:
//!
//! ```text
//! EKS_RESOURCE_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `EKS_RESOURCE_PROVIDER|<protocol_version>|<address>`.
//! [`GrpcResourceProvider::from_handshake`] parses it and connects.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod ami;
pub mod awsauth;
pub mod cluster;
pub mod compose;
pub mod environment;
pub mod error;
pub mod iam;
pub mod kubeconfig;
pub mod logging;
pub mod nodegroup;
pub mod properties;
pub mod provider;
pub mod resolve;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

// Re-export main types at crate root
pub use access::{AccessEntryConfig, AccessEntryType, Principal};
pub use ami::{AmiType, CpuArchitecture, OperatingSystem};
pub use awsauth::{RoleMapping, UserMapping};
pub use cluster::{AddonConfig, AuthenticationMode, ClusterConfig};
pub use compose::{compose, execute, plan, Composition, CompositionPlan};
pub use environment::AwsEnvironment;
pub use error::{ConfigError, EnvironmentError, ProviderError};
pub use iam::{IamRoleRef, IamRoleSpec};
pub use kubeconfig::{Kubeconfig, KubeconfigAuth, KubeconfigOptions};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use nodegroup::{NodeGroupConfig, NodeGroupKind, ResolvedNodeGroup, ScalingConfig};
pub use provider::{GrpcResourceProvider, ResourceProvider};
pub use resolve::resolve;
pub use types::{
    ProvisionResult, ResourceKind, ResourceOptions, ResourceOutputs, HANDSHAKE_PREFIX,
    PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result, Validate, ValidationError, ValidationErrors};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tonic;
pub use tracing;
