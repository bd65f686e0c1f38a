//! Types shared by the composer and resource providers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::ProviderError;
use crate::kubeconfig::Kubeconfig;

/// The protocol version for the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// The handshake prefix output by providers.
pub const HANDSHAKE_PREFIX: &str = "EKS_RESOURCE_PROVIDER";

/// The remote resource types the composer creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// EKS control plane.
    Cluster,
    /// EKS managed node group.
    ManagedNodeGroup,
    /// Auto scaling group joined through an instance profile.
    SelfManagedNodeGroup,
    /// IAM role.
    IamRole,
    /// IAM instance profile.
    InstanceProfile,
    /// EKS add-on.
    Addon,
    /// EKS access entry.
    AccessEntry,
    /// Access policy attached to an access entry.
    AccessPolicyAssociation,
    /// Kubernetes ConfigMap, used for the `aws-auth` mappings.
    ConfigMap,
}

impl ResourceKind {
    /// Every resource kind.
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Cluster,
        ResourceKind::ManagedNodeGroup,
        ResourceKind::SelfManagedNodeGroup,
        ResourceKind::IamRole,
        ResourceKind::InstanceProfile,
        ResourceKind::Addon,
        ResourceKind::AccessEntry,
        ResourceKind::AccessPolicyAssociation,
        ResourceKind::ConfigMap,
    ];

    /// The type token the provider dispatches on.
    pub fn type_token(&self) -> &'static str {
        match self {
            Self::Cluster => "aws:eks/cluster:Cluster",
            Self::ManagedNodeGroup => "eks:index:ManagedNodeGroup",
            Self::SelfManagedNodeGroup => "eks:index:NodeGroupV2",
            Self::IamRole => "aws:iam/role:Role",
            Self::InstanceProfile => "aws:iam/instanceProfile:InstanceProfile",
            Self::Addon => "aws:eks/addon:Addon",
            Self::AccessEntry => "aws:eks/accessEntry:AccessEntry",
            Self::AccessPolicyAssociation => {
                "aws:eks/accessPolicyAssociation:AccessPolicyAssociation"
            },
            Self::ConfigMap => "kubernetes:core/v1:ConfigMap",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_token())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.type_token() == s)
            .ok_or_else(|| format!("unknown resource type '{}'", s))
    }
}

/// Parent and dependency hints sent with a create request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOptions {
    /// Logical name of the parent resource.
    pub parent: Option<String>,
    /// Logical names of resources that must exist first.
    pub depends_on: Vec<String>,
}

impl ResourceOptions {
    /// Set the parent.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Add a dependency.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }
}

impl From<crate::generated::ResourceOptions> for ResourceOptions {
    fn from(proto: crate::generated::ResourceOptions) -> Self {
        Self {
            parent: if proto.parent.is_empty() {
                None
            } else {
                Some(proto.parent)
            },
            depends_on: proto.depends_on,
        }
    }
}

impl From<ResourceOptions> for crate::generated::ResourceOptions {
    fn from(options: ResourceOptions) -> Self {
        Self {
            parent: options.parent.unwrap_or_default(),
            depends_on: options.depends_on,
        }
    }
}

/// Identifier and output attributes returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOutputs {
    /// Provider-assigned id.
    pub id: String,
    /// Output attributes, snake_case keys.
    pub outputs: serde_json::Value,
}

impl ResourceOutputs {
    /// Create outputs.
    pub fn new(id: impl Into<String>, outputs: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            outputs,
        }
    }

    /// A string output, if present.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.outputs.get(name).and_then(|v| v.as_str())
    }
}

/// A resource that was created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedResource {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Logical name.
    pub name: String,
    /// Provider-assigned id.
    pub id: String,
    /// Output attributes.
    pub outputs: serde_json::Value,
}

/// A resource whose create request failed.
#[derive(Debug, Clone, Serialize)]
pub struct FailedResource {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Logical name.
    pub name: String,
    /// The provider's error.
    #[serde(serialize_with = "serialize_error")]
    pub error: Arc<ProviderError>,
}

fn serialize_error<S: Serializer>(error: &Arc<ProviderError>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// A resource that was never requested because a dependency failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedResource {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Logical name.
    pub name: String,
    /// Logical name of the failed dependency.
    pub blocked_by: String,
}

/// The outcome of a composition run.
///
/// No rollback is attempted; a partially failed run lists what exists.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvisionResult {
    /// EKS cluster name, when the cluster was created.
    pub cluster_name: Option<String>,
    /// Kubeconfig for the cluster.
    pub kubeconfig: Option<Kubeconfig>,
    /// VPC the cluster runs in.
    pub vpc_id: Option<String>,
    /// Resources created, cluster first.
    pub succeeded: Vec<CreatedResource>,
    /// Resources that failed.
    pub failed: Vec<FailedResource>,
    /// Resources skipped because a dependency failed.
    pub skipped: Vec<SkippedResource>,
}

impl ProvisionResult {
    /// Whether every resource was created.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// A created resource by kind and name.
    pub fn created(&self, kind: ResourceKind, name: &str) -> Option<&CreatedResource> {
        self.succeeded
            .iter()
            .find(|r| r.kind == kind && r.name == name)
    }

    /// A failed resource by name.
    pub fn failure(&self, name: &str) -> Option<&FailedResource> {
        self.failed.iter().find(|r| r.name == name)
    }
}

/// The line a provider plugin prints on stdout once it is listening.
///
/// Format: `EKS_RESOURCE_PROVIDER|<protocol_version>|<address>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Protocol version.
    pub version: u32,
    /// Listen address, `host:port` or a URI.
    pub address: String,
}

impl Handshake {
    /// Parse a handshake line.
    pub fn parse(line: &str) -> Result<Self, ProviderError> {
        let mut parts = line.trim().splitn(3, '|');
        let (Some(prefix), Some(version), Some(address)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ProviderError::Handshake(format!(
                "expected {}|<version>|<address>, got '{}'",
                HANDSHAKE_PREFIX, line
            )));
        };

        if prefix != HANDSHAKE_PREFIX {
            return Err(ProviderError::Handshake(format!(
                "unexpected prefix '{}'",
                prefix
            )));
        }
        let version: u32 = version
            .parse()
            .map_err(|_| ProviderError::Handshake(format!("invalid version '{}'", version)))?;
        if version != PROTOCOL_VERSION {
            return Err(ProviderError::Handshake(format!(
                "unsupported protocol version {} (expected {})",
                version, PROTOCOL_VERSION
            )));
        }
        if address.is_empty() {
            return Err(ProviderError::Handshake("empty address".to_string()));
        }

        Ok(Self {
            version,
            address: address.to_string(),
        })
    }

    /// The address as a connectable URI.
    pub fn endpoint(&self) -> String {
        if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("http://{}", self.address)
        }
    }
}

impl fmt::Display for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", HANDSHAKE_PREFIX, self.version, self.address)
    }
}
