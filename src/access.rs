//! EKS access entries and their access-policy associations.
//!
//! An access entry maps an IAM principal to Kubernetes permissions without
//! going through the `aws-auth` ConfigMap. It requires the cluster to run in
//! `API` or `API_AND_CONFIG_MAP` authentication mode.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of principal an access entry grants access to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessEntryType {
    /// Regular IAM users and roles.
    #[default]
    Standard,
    /// Fargate pod execution roles.
    FargateLinux,
    /// Linux EC2 node roles.
    Ec2Linux,
    /// Windows EC2 node roles.
    Ec2Windows,
    /// EKS Auto Mode node roles.
    Ec2,
}

impl AccessEntryType {
    /// Wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::FargateLinux => "FARGATE_LINUX",
            Self::Ec2Linux => "EC2_LINUX",
            Self::Ec2Windows => "EC2_WINDOWS",
            Self::Ec2 => "EC2",
        }
    }

    /// Node and Fargate entries get fixed permissions from EKS; they may not
    /// carry Kubernetes groups, a username or access policies.
    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::FargateLinux | Self::Ec2Linux | Self::Ec2Windows)
    }
}

impl fmt::Display for AccessEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The IAM principal an access entry refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principal {
    /// An explicit user or role ARN.
    Arn(String),
    /// The node role of the named node group in the same composition.
    NodeGroupRole(String),
}

/// Whether an access policy applies to the whole cluster or to namespaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessScopeType {
    /// Cluster-wide.
    #[default]
    Cluster,
    /// Limited to `namespaces`.
    Namespace,
}

/// The scope of an access policy association.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessScope {
    /// Scope kind.
    #[serde(rename = "type")]
    pub scope_type: AccessScopeType,
    /// Namespaces, required for namespace scope and forbidden otherwise.
    #[serde(default)]
    pub namespaces: Vec<String>,
}

impl AccessScope {
    /// Cluster-wide scope.
    pub fn cluster() -> Self {
        Self::default()
    }

    /// Scope limited to the given namespaces.
    pub fn namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scope_type: AccessScopeType::Namespace,
            namespaces: namespaces.into_iter().map(Into::into).collect(),
        }
    }
}

/// An EKS access policy attached to an access entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessPolicyAssociation {
    /// e.g. `arn:aws:eks::aws:cluster-access-policy/AmazonEKSViewPolicy`.
    pub policy_arn: String,
    /// Where the policy applies.
    #[serde(default)]
    pub access_scope: AccessScope,
}

/// Configuration of a single access entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessEntryConfig {
    /// Logical name, unique within the cluster.
    pub name: String,
    /// Principal the entry grants access to.
    pub principal: Principal,
    /// Entry type.
    #[serde(default)]
    pub entry_type: AccessEntryType,
    /// Kubernetes groups the principal is mapped into.
    #[serde(default)]
    pub kubernetes_groups: Vec<String>,
    /// Kubernetes username.
    #[serde(default)]
    pub username: Option<String>,
    /// Access policies, keyed by a logical association name.
    #[serde(default)]
    pub access_policies: BTreeMap<String, AccessPolicyAssociation>,
    /// Tags applied to the entry.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl AccessEntryConfig {
    /// Create a STANDARD entry for a principal.
    pub fn new(name: impl Into<String>, principal: Principal) -> Self {
        Self {
            name: name.into(),
            principal,
            entry_type: AccessEntryType::Standard,
            kubernetes_groups: Vec::new(),
            username: None,
            access_policies: BTreeMap::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Set the entry type.
    pub fn with_type(mut self, entry_type: AccessEntryType) -> Self {
        self.entry_type = entry_type;
        self
    }

    /// Add a Kubernetes group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.kubernetes_groups.push(group.into());
        self
    }

    /// Set the Kubernetes username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Attach an access policy.
    pub fn with_policy(
        mut self,
        name: impl Into<String>,
        policy_arn: impl Into<String>,
        access_scope: AccessScope,
    ) -> Self {
        self.access_policies.insert(
            name.into(),
            AccessPolicyAssociation {
                policy_arn: policy_arn.into(),
                access_scope,
            },
        );
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}
