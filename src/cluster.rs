//! Cluster-level configuration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::access::AccessEntryConfig;
use crate::awsauth::{RoleMapping, UserMapping};
use crate::iam::IamRoleRef;
use crate::kubeconfig::KubeconfigOptions;

/// How the cluster authenticates IAM principals.
///
/// EKS uses `CONFIG_MAP` when the mode is left unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationMode {
    /// Only the `aws-auth` ConfigMap.
    #[default]
    ConfigMap,
    /// Only access entries.
    Api,
    /// Both access entries and the ConfigMap.
    ApiAndConfigMap,
}

impl AuthenticationMode {
    /// Wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigMap => "CONFIG_MAP",
            Self::Api => "API",
            Self::ApiAndConfigMap => "API_AND_CONFIG_MAP",
        }
    }

    /// Whether access entries can be created in this mode.
    pub fn supports_access_entries(&self) -> bool {
        matches!(self, Self::Api | Self::ApiAndConfigMap)
    }

    /// Whether the `aws-auth` ConfigMap is honoured in this mode.
    pub fn supports_config_map(&self) -> bool {
        matches!(self, Self::ConfigMap | Self::ApiAndConfigMap)
    }
}

impl fmt::Display for AuthenticationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How EKS resolves conflicts with existing add-on configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ResolveConflicts {
    None,
    Overwrite,
    Preserve,
}

/// A managed EKS add-on such as `vpc-cni` or `coredns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddonConfig {
    /// Add-on name as published by EKS.
    pub name: String,
    /// Add-on version; EKS picks the default for the cluster version when unset.
    #[serde(default)]
    pub version: Option<String>,
    /// Conflict handling when the add-on is created.
    #[serde(default)]
    pub resolve_conflicts_on_create: Option<ResolveConflicts>,
    /// Conflict handling when the add-on is updated.
    #[serde(default)]
    pub resolve_conflicts_on_update: Option<ResolveConflicts>,
    /// Add-on configuration, sent to EKS as a JSON string.
    #[serde(default)]
    pub configuration_values: Option<serde_json::Value>,
    /// Tags applied to the add-on.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl AddonConfig {
    /// An add-on with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            resolve_conflicts_on_create: None,
            resolve_conflicts_on_update: None,
            configuration_values: None,
            tags: BTreeMap::new(),
        }
    }

    /// Pin the add-on version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the add-on configuration values.
    pub fn with_configuration(mut self, values: serde_json::Value) -> Self {
        self.configuration_values = Some(values);
        self
    }
}

/// Configuration of the EKS control plane and its cluster-wide defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    /// Cluster name.
    pub name: String,
    /// Role assumed by the EKS control plane.
    pub service_role_arn: String,
    /// Kubernetes version.
    #[serde(default)]
    pub version: Option<String>,
    /// VPC the cluster runs in.
    #[serde(default)]
    pub vpc_id: Option<String>,
    /// Public subnets, used for nodes when no private subnets are given.
    #[serde(default)]
    pub public_subnet_ids: Vec<String>,
    /// Private subnets, preferred for nodes.
    #[serde(default)]
    pub private_subnet_ids: Vec<String>,
    /// Whether the API server endpoint is reachable from the internet.
    #[serde(default)]
    pub endpoint_public_access: Option<bool>,
    /// Whether the API server endpoint is reachable from inside the VPC.
    #[serde(default)]
    pub endpoint_private_access: Option<bool>,
    /// Authentication mode; `CONFIG_MAP` when unset.
    #[serde(default)]
    pub authentication_mode: Option<AuthenticationMode>,
    /// Access entries created with the cluster.
    #[serde(default)]
    pub access_entries: Vec<AccessEntryConfig>,
    /// IAM roles mapped through the `aws-auth` ConfigMap.
    #[serde(default)]
    pub role_mappings: Vec<RoleMapping>,
    /// IAM users mapped through the `aws-auth` ConfigMap.
    #[serde(default)]
    pub user_mappings: Vec<UserMapping>,
    /// Node role inherited by node groups that name none.
    #[serde(default)]
    pub instance_role: Option<IamRoleRef>,
    /// Managed add-ons.
    #[serde(default)]
    pub addons: Vec<AddonConfig>,
    /// Options for the generated kubeconfig.
    #[serde(default)]
    pub kubeconfig: KubeconfigOptions,
    /// Tags applied to the cluster.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ClusterConfig {
    /// Create a cluster configuration with only the required fields.
    pub fn new(name: impl Into<String>, service_role_arn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_role_arn: service_role_arn.into(),
            version: None,
            vpc_id: None,
            public_subnet_ids: Vec::new(),
            private_subnet_ids: Vec::new(),
            endpoint_public_access: None,
            endpoint_private_access: None,
            authentication_mode: None,
            access_entries: Vec::new(),
            role_mappings: Vec::new(),
            user_mappings: Vec::new(),
            instance_role: None,
            addons: Vec::new(),
            kubeconfig: KubeconfigOptions::default(),
            tags: BTreeMap::new(),
        }
    }

    /// Set the Kubernetes version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the VPC id.
    pub fn with_vpc_id(mut self, vpc_id: impl Into<String>) -> Self {
        self.vpc_id = Some(vpc_id.into());
        self
    }

    /// Set the public subnets.
    pub fn with_public_subnets<I, S>(mut self, subnets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_subnet_ids = subnets.into_iter().map(Into::into).collect();
        self
    }

    /// Set the private subnets.
    pub fn with_private_subnets<I, S>(mut self, subnets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.private_subnet_ids = subnets.into_iter().map(Into::into).collect();
        self
    }

    /// Set the authentication mode.
    pub fn with_authentication_mode(mut self, mode: AuthenticationMode) -> Self {
        self.authentication_mode = Some(mode);
        self
    }

    /// Add an access entry.
    pub fn with_access_entry(mut self, entry: AccessEntryConfig) -> Self {
        self.access_entries.push(entry);
        self
    }

    /// Add an `aws-auth` role mapping.
    pub fn with_role_mapping(mut self, mapping: RoleMapping) -> Self {
        self.role_mappings.push(mapping);
        self
    }

    /// Add an `aws-auth` user mapping.
    pub fn with_user_mapping(mut self, mapping: UserMapping) -> Self {
        self.user_mappings.push(mapping);
        self
    }

    /// Set the default node role.
    pub fn with_instance_role(mut self, role: IamRoleRef) -> Self {
        self.instance_role = Some(role);
        self
    }

    /// Add a managed add-on.
    pub fn with_addon(mut self, addon: AddonConfig) -> Self {
        self.addons.push(addon);
        self
    }

    /// Set the kubeconfig options.
    pub fn with_kubeconfig(mut self, options: KubeconfigOptions) -> Self {
        self.kubeconfig = options;
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// The authentication mode EKS will apply.
    pub fn effective_authentication_mode(&self) -> AuthenticationMode {
        self.authentication_mode.unwrap_or_default()
    }

    /// Subnets for the control plane: private and public combined.
    pub fn all_subnet_ids(&self) -> Vec<String> {
        self.private_subnet_ids
            .iter()
            .chain(self.public_subnet_ids.iter())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_mode() {
        assert_eq!(
            ClusterConfig::new("demo", "arn:aws:iam::123456789012:role/eks")
                .effective_authentication_mode(),
            AuthenticationMode::ConfigMap
        );
        assert!(!AuthenticationMode::ConfigMap.supports_access_entries());
        assert!(AuthenticationMode::Api.supports_access_entries());
        assert!(AuthenticationMode::ApiAndConfigMap.supports_access_entries());
        assert!(AuthenticationMode::ConfigMap.supports_config_map());
        assert!(AuthenticationMode::ApiAndConfigMap.supports_config_map());
        assert!(!AuthenticationMode::Api.supports_config_map());
        assert_eq!(
            serde_json::to_value(AuthenticationMode::ApiAndConfigMap).unwrap(),
            serde_json::json!("API_AND_CONFIG_MAP")
        );
    }

    #[test]
    fn test_cluster_deserialize_minimal() {
        let json = serde_json::json!({
            "name": "demo",
            "service_role_arn": "arn:aws:iam::123456789012:role/eks",
            "private_subnet_ids": ["subnet-a", "subnet-b"]
        });
        let cluster: ClusterConfig = serde_json::from_value(json).unwrap();
        assert_eq!(cluster.name, "demo");
        assert!(cluster.public_subnet_ids.is_empty());
        assert!(cluster.access_entries.is_empty());
        assert!(cluster.role_mappings.is_empty());
        assert_eq!(cluster.kubeconfig, KubeconfigOptions::default());
    }

    #[test]
    fn test_cluster_rejects_unknown_fields() {
        let json = serde_json::json!({
            "name": "demo",
            "service_role_arn": "arn:aws:iam::123456789012:role/eks",
            "subnets": ["subnet-a"]
        });
        assert!(serde_json::from_value::<ClusterConfig>(json).is_err());
    }

    #[test]
    fn test_all_subnets_private_first() {
        let cluster = ClusterConfig::new("demo", "arn:aws:iam::123456789012:role/eks")
            .with_public_subnets(["subnet-pub"])
            .with_private_subnets(["subnet-priv"]);
        assert_eq!(cluster.all_subnet_ids(), vec!["subnet-priv", "subnet-pub"]);
    }
}
