//! Node group configuration, before and after default resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ami::{AmiType, OperatingSystem};
use crate::iam::{IamRoleRef, IamRoleSpec};
use crate::validation::{RoleConflict, ValidationError};

/// Desired size used when none is given.
pub const DEFAULT_DESIRED_SIZE: u32 = 2;
/// Minimum size used when none is given.
pub const DEFAULT_MIN_SIZE: u32 = 1;
/// Maximum size used when none is given.
pub const DEFAULT_MAX_SIZE: u32 = 2;
/// Root volume size in GiB used when no launch template is given.
pub const DEFAULT_DISK_SIZE: u32 = 20;

/// Who manages the lifecycle of the nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeGroupKind {
    /// An EKS managed node group.
    #[default]
    Managed,
    /// An auto scaling group joined to the cluster through an instance profile.
    SelfManaged,
}

/// Scaling bounds. Unset fields are filled independently by the resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalingConfig {
    /// Desired number of nodes.
    #[serde(default)]
    pub desired_size: Option<u32>,
    /// Minimum number of nodes.
    #[serde(default)]
    pub min_size: Option<u32>,
    /// Maximum number of nodes.
    #[serde(default)]
    pub max_size: Option<u32>,
}

impl ScalingConfig {
    /// Bounds with every field set.
    pub fn new(desired_size: u32, min_size: u32, max_size: u32) -> Self {
        Self {
            desired_size: Some(desired_size),
            min_size: Some(min_size),
            max_size: Some(max_size),
        }
    }
}

/// Scaling bounds after defaults were applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedScaling {
    /// Desired number of nodes.
    pub desired_size: u32,
    /// Minimum number of nodes.
    pub min_size: u32,
    /// Maximum number of nodes.
    pub max_size: u32,
}

/// Kubernetes taint effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum TaintEffect {
    NoSchedule,
    NoExecute,
    PreferNoSchedule,
}

/// A taint applied to every node in the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Taint {
    /// Taint key.
    pub key: String,
    /// Taint value.
    #[serde(default)]
    pub value: Option<String>,
    /// Taint effect.
    pub effect: TaintEffect,
}

/// A launch template used instead of the node group's own disk and AMI settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchTemplateSpec {
    /// Launch template id. Exactly one of `id` and `name` is required.
    #[serde(default)]
    pub id: Option<String>,
    /// Launch template name.
    #[serde(default)]
    pub name: Option<String>,
    /// Launch template version.
    pub version: String,
}

/// Capacity purchase option for managed node groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum CapacityType {
    OnDemand,
    Spot,
}

/// A node group as written by the user.
///
/// Most fields are optional; [`resolve`](crate::resolve::resolve) fills them
/// from the cluster and from fixed defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeGroupConfig {
    /// Node group name, unique within the composition.
    pub name: String,
    /// Managed or self-managed.
    #[serde(default)]
    pub kind: NodeGroupKind,
    /// EC2 instance types. All must share one CPU architecture.
    #[serde(default)]
    pub instance_types: Vec<String>,
    /// Root volume size in GiB.
    #[serde(default)]
    pub disk_size: Option<u32>,
    /// Scaling bounds.
    #[serde(default)]
    pub scaling_config: Option<ScalingConfig>,
    /// EKS AMI type.
    #[serde(default)]
    pub ami_type: Option<AmiType>,
    /// Custom AMI id. Excludes `ami_type` and `gpu`.
    #[serde(default)]
    pub ami_id: Option<String>,
    /// Operating system family.
    #[serde(default)]
    pub operating_system: Option<OperatingSystem>,
    /// Whether GPU-enabled AMIs are required.
    #[serde(default)]
    pub gpu: Option<bool>,
    /// Subnets for the nodes.
    #[serde(default)]
    pub subnet_ids: Option<Vec<String>>,
    /// A node role for the composer to create. Excludes `node_role_arn`.
    #[serde(default)]
    pub node_role: Option<IamRoleSpec>,
    /// An existing node role. Excludes `node_role`.
    #[serde(default)]
    pub node_role_arn: Option<String>,
    /// Kubernetes labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Kubernetes taints.
    #[serde(default)]
    pub taints: Vec<Taint>,
    /// Launch template.
    #[serde(default)]
    pub launch_template: Option<LaunchTemplateSpec>,
    /// Kubernetes version of the nodes.
    #[serde(default)]
    pub version: Option<String>,
    /// On-demand or spot capacity.
    #[serde(default)]
    pub capacity_type: Option<CapacityType>,
    /// Tags applied to the node group.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl NodeGroupConfig {
    /// A managed node group with every optional field unset.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeGroupKind::Managed,
            instance_types: Vec::new(),
            disk_size: None,
            scaling_config: None,
            ami_type: None,
            ami_id: None,
            operating_system: None,
            gpu: None,
            subnet_ids: None,
            node_role: None,
            node_role_arn: None,
            labels: BTreeMap::new(),
            taints: Vec::new(),
            launch_template: None,
            version: None,
            capacity_type: None,
            tags: BTreeMap::new(),
        }
    }

    /// Set the node group kind.
    pub fn with_kind(mut self, kind: NodeGroupKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the instance types.
    pub fn with_instance_types<I, S>(mut self, instance_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instance_types = instance_types.into_iter().map(Into::into).collect();
        self
    }

    /// Set the disk size in GiB.
    pub fn with_disk_size(mut self, disk_size: u32) -> Self {
        self.disk_size = Some(disk_size);
        self
    }

    /// Set the scaling bounds.
    pub fn with_scaling(mut self, scaling: ScalingConfig) -> Self {
        self.scaling_config = Some(scaling);
        self
    }

    /// Set the AMI type.
    pub fn with_ami_type(mut self, ami_type: AmiType) -> Self {
        self.ami_type = Some(ami_type);
        self
    }

    /// Use a custom AMI.
    pub fn with_ami_id(mut self, ami_id: impl Into<String>) -> Self {
        self.ami_id = Some(ami_id.into());
        self
    }

    /// Pin the operating system.
    pub fn with_operating_system(mut self, os: OperatingSystem) -> Self {
        self.operating_system = Some(os);
        self
    }

    /// Require or refuse GPU-enabled AMIs.
    pub fn with_gpu(mut self, gpu: bool) -> Self {
        self.gpu = Some(gpu);
        self
    }

    /// Set the subnets.
    pub fn with_subnets<I, S>(mut self, subnets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subnet_ids = Some(subnets.into_iter().map(Into::into).collect());
        self
    }

    /// Have the composer create a node role.
    pub fn with_node_role(mut self, role: IamRoleSpec) -> Self {
        self.node_role = Some(role);
        self
    }

    /// Use an existing node role.
    pub fn with_node_role_arn(mut self, arn: impl Into<String>) -> Self {
        self.node_role_arn = Some(arn.into());
        self
    }

    /// Add a Kubernetes label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add a taint.
    pub fn with_taint(mut self, taint: Taint) -> Self {
        self.taints.push(taint);
        self
    }

    /// Use a launch template.
    pub fn with_launch_template(mut self, launch_template: LaunchTemplateSpec) -> Self {
        self.launch_template = Some(launch_template);
        self
    }

    /// Pin the Kubernetes version of the nodes.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the capacity type.
    pub fn with_capacity_type(mut self, capacity_type: CapacityType) -> Self {
        self.capacity_type = Some(capacity_type);
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// A node group ready for the composer.
///
/// Subnets, scaling and the node role are no longer optional.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedNodeGroup {
    /// Node group name.
    pub name: String,
    /// Managed or self-managed.
    pub kind: NodeGroupKind,
    /// EC2 instance types.
    pub instance_types: Vec<String>,
    /// Root volume size in GiB; `None` with a launch template.
    pub disk_size: Option<u32>,
    /// Scaling bounds.
    pub scaling: ResolvedScaling,
    /// EKS AMI type; `None` with a custom AMI or launch template.
    pub ami_type: Option<AmiType>,
    /// Custom AMI id.
    pub ami_id: Option<String>,
    /// Operating system family.
    pub operating_system: Option<OperatingSystem>,
    /// Non-empty subnet list.
    pub subnet_ids: Vec<String>,
    /// Node role.
    pub role: IamRoleRef,
    /// Kubernetes labels.
    pub labels: BTreeMap<String, String>,
    /// Kubernetes taints.
    pub taints: Vec<Taint>,
    /// Launch template.
    pub launch_template: Option<LaunchTemplateSpec>,
    /// Kubernetes version.
    pub version: Option<String>,
    /// Capacity type.
    pub capacity_type: Option<CapacityType>,
    /// Tags.
    pub tags: BTreeMap<String, String>,
}

impl TryFrom<NodeGroupConfig> for ResolvedNodeGroup {
    type Error = ValidationError;

    fn try_from(config: NodeGroupConfig) -> Result<Self, Self::Error> {
        let role = match (config.node_role, config.node_role_arn) {
            (Some(spec), None) => IamRoleRef::Owned(spec),
            (None, Some(arn)) => IamRoleRef::Arn(arn),
            (Some(_), Some(_)) => {
                return Err(ValidationError::ConflictingRoleReference {
                    node_group: config.name,
                    conflict: RoleConflict::Both,
                })
            },
            (None, None) => {
                return Err(ValidationError::ConflictingRoleReference {
                    node_group: config.name,
                    conflict: RoleConflict::Neither,
                })
            },
        };

        let subnet_ids = match config.subnet_ids {
            Some(subnets) if !subnets.is_empty() => subnets,
            _ => {
                return Err(ValidationError::MissingSubnets {
                    resource: config.name,
                })
            },
        };

        let scaling = config.scaling_config.unwrap_or_default();
        let scaling = ResolvedScaling {
            desired_size: scaling.desired_size.unwrap_or(DEFAULT_DESIRED_SIZE),
            min_size: scaling.min_size.unwrap_or(DEFAULT_MIN_SIZE),
            max_size: scaling.max_size.unwrap_or(DEFAULT_MAX_SIZE),
        };

        Ok(Self {
            name: config.name,
            kind: config.kind,
            instance_types: config.instance_types,
            disk_size: config.disk_size,
            scaling,
            ami_type: config.ami_type,
            ami_id: config.ami_id,
            operating_system: config.operating_system,
            subnet_ids,
            role,
            labels: config.labels,
            taints: config.taints,
            launch_template: config.launch_template,
            version: config.version,
            capacity_type: config.capacity_type,
            tags: config.tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_group_deserialize() {
        let json = serde_json::json!({
            "name": "workers",
            "kind": "self_managed",
            "instance_types": ["t4g.medium"],
            "ami_type": "AL2023_ARM_64_STANDARD",
            "scaling_config": { "max_size": 5 },
            "node_role_arn": "arn:aws:iam::123456789012:role/nodes",
            "taints": [{ "key": "dedicated", "effect": "NO_SCHEDULE" }]
        });
        let ng: NodeGroupConfig = serde_json::from_value(json).unwrap();
        assert_eq!(ng.kind, NodeGroupKind::SelfManaged);
        assert_eq!(ng.ami_type, Some(AmiType::Al2023Arm64Standard));
        assert_eq!(ng.scaling_config.unwrap().max_size, Some(5));
        assert_eq!(ng.taints[0].effect, TaintEffect::NoSchedule);
        assert!(ng.subnet_ids.is_none());
    }

    #[test]
    fn test_node_group_rejects_unknown_ami_type() {
        let json = serde_json::json!({ "name": "workers", "ami_type": "WINDOWS_FULL_2022_x86_64" });
        assert!(serde_json::from_value::<NodeGroupConfig>(json).is_err());
    }

    #[test]
    fn test_resolved_from_complete_config() {
        let config = NodeGroupConfig::new("workers")
            .with_subnets(["subnet-a"])
            .with_node_role(IamRoleSpec::node_role("workers-role"))
            .with_scaling(ScalingConfig::new(3, 1, 5));
        let resolved = ResolvedNodeGroup::try_from(config).unwrap();
        assert_eq!(resolved.subnet_ids, vec!["subnet-a"]);
        assert_eq!(
            resolved.role,
            IamRoleRef::Owned(IamRoleSpec::node_role("workers-role"))
        );
        assert_eq!(resolved.scaling.desired_size, 3);
        assert_eq!(resolved.scaling.max_size, 5);
    }

    #[test]
    fn test_resolved_requires_role_and_subnets() {
        let err = ResolvedNodeGroup::try_from(NodeGroupConfig::new("workers")).unwrap_err();
        assert_eq!(
            err,
            ValidationError::ConflictingRoleReference {
                node_group: "workers".to_string(),
                conflict: RoleConflict::Neither,
            }
        );

        let config = NodeGroupConfig::new("workers")
            .with_subnets(Vec::<String>::new())
            .with_node_role_arn("arn:aws:iam::123456789012:role/nodes");
        assert_eq!(
            ResolvedNodeGroup::try_from(config).unwrap_err(),
            ValidationError::MissingSubnets {
                resource: "workers".to_string(),
            }
        );
    }
}
