//! Configuration validation.
//!
//! Validation never stops at the first problem: every rule runs and all
//! violations are returned, so a configuration can be fixed in one pass.
//!
//! # Example
//!
//! ```
//! use eks_component_sdk::access::{AccessEntryConfig, AccessEntryType, Principal};
//! use eks_component_sdk::validation::{validate, ValidationError};
//!
//! let entry = AccessEntryConfig::new(
//!     "nodes",
//!     Principal::Arn("arn:aws:iam::123456789012:role/nodes".to_string()),
//! )
//! .with_type(AccessEntryType::Ec2Linux)
//! .with_group("system:masters");
//!
//! let errors = validate(&entry);
//! assert_eq!(errors.len(), 1);
//! assert!(matches!(errors[0], ValidationError::InvalidAccessEntry { .. }));
//! ```

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::access::{AccessEntryConfig, AccessScopeType, Principal};
use crate::ami::{self, ArchitectureError, CpuArchitecture, InstanceType, OperatingSystem};
use crate::cluster::{AuthenticationMode, ClusterConfig};
use crate::iam::{is_arn, is_role_arn, IamRoleRef};
use crate::nodegroup::NodeGroupConfig;

/// Which side of the role/role-ARN exclusivity was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleConflict {
    /// Both `node_role` and `node_role_arn` are set.
    Both,
    /// Neither is set and the cluster has no default role.
    Neither,
}

impl fmt::Display for RoleConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Both => f.write_str("both are set"),
            Self::Neither => f.write_str("neither is set"),
        }
    }
}

/// A configuration problem found before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A node group must reference exactly one role.
    #[error(
        "Node group '{node_group}' must set exactly one of node_role or node_role_arn: {conflict}"
    )]
    ConflictingRoleReference {
        /// Node group name.
        node_group: String,
        /// What was wrong.
        conflict: RoleConflict,
    },

    /// Access entries need an authentication mode that includes the API.
    #[error(
        "Cluster '{cluster}' defines access entries but its authentication mode is {mode}; use API or API_AND_CONFIG_MAP"
    )]
    IncompatibleAuthMode {
        /// Cluster name.
        cluster: String,
        /// The effective mode.
        mode: AuthenticationMode,
    },

    /// `aws-auth` mappings need an authentication mode that includes the ConfigMap.
    #[error(
        "Cluster '{cluster}' defines {field} but its authentication mode is {mode}; use CONFIG_MAP or API_AND_CONFIG_MAP"
    )]
    IncompatibleConfigMapMappings {
        /// Cluster name.
        cluster: String,
        /// The effective mode.
        mode: AuthenticationMode,
        /// `role_mappings` or `user_mappings`.
        field: &'static str,
    },

    /// An access entry violates an EKS constraint.
    #[error("Access entry '{entry}' is invalid: {reason}")]
    InvalidAccessEntry {
        /// Access entry name.
        entry: String,
        /// What was wrong.
        reason: String,
    },

    /// AMI and instance type architectures disagree.
    #[error("Node group '{node_group}' has an architecture mismatch: {reason}")]
    ArchitectureMismatch {
        /// Node group name.
        node_group: String,
        /// What was wrong.
        reason: String,
    },

    /// No subnet could be selected.
    #[error("No subnets available for '{resource}'")]
    MissingSubnets {
        /// Cluster or node group name.
        resource: String,
    },

    /// An instance type does not follow the EC2 naming scheme.
    #[error("Node group '{node_group}' has an invalid instance type '{instance_type}'")]
    InvalidInstanceType {
        /// Node group name.
        node_group: String,
        /// The offending instance type.
        instance_type: String,
    },

    /// Scaling bounds are inconsistent.
    #[error("Node group '{node_group}' has an invalid scaling config: {reason}")]
    InvalidScalingConfig {
        /// Node group name.
        node_group: String,
        /// What was wrong.
        reason: String,
    },

    /// A custom AMI was combined with EKS AMI selection.
    #[error("Node group '{node_group}' has a conflicting AMI selection: {reason}")]
    ConflictingAmiSelection {
        /// Node group name.
        node_group: String,
        /// What was wrong.
        reason: String,
    },

    /// The pinned operating system does not match the AMI type.
    #[error(
        "Node group '{node_group}' pins operating system {operating_system} but AMI type {ami_type} runs {ami_operating_system}"
    )]
    OperatingSystemMismatch {
        /// Node group name.
        node_group: String,
        /// The pinned operating system.
        operating_system: OperatingSystem,
        /// The AMI type.
        ami_type: ami::AmiType,
        /// The operating system of the AMI type.
        ami_operating_system: OperatingSystem,
    },

    /// EKS publishes no AMI for the requested combination.
    #[error(
        "Node group '{node_group}' has no AMI type for {operating_system} on {architecture} (gpu: {gpu})"
    )]
    NoMatchingAmiType {
        /// Node group name.
        node_group: String,
        /// Operating system.
        operating_system: OperatingSystem,
        /// Architecture of the instance types.
        architecture: CpuArchitecture,
        /// Whether GPU support was required.
        gpu: bool,
    },

    /// A launch template was combined with settings it replaces.
    #[error("Node group '{node_group}' has a conflicting launch template: {reason}")]
    ConflictingLaunchTemplate {
        /// Node group name.
        node_group: String,
        /// What was wrong.
        reason: String,
    },

    /// A required field is missing or empty.
    #[error("'{resource}' is missing required field '{field}'")]
    MissingField {
        /// Owning resource.
        resource: String,
        /// Field path.
        field: String,
    },

    /// Two resources of the same kind share a name.
    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName {
        /// Resource kind, e.g. `node group`.
        kind: &'static str,
        /// The duplicated name.
        name: String,
    },

    /// An access entry references a node group that does not exist.
    #[error("Access entry '{entry}' references unknown node group '{node_group}'")]
    UnknownNodeGroup {
        /// Access entry name.
        entry: String,
        /// The unknown node group.
        node_group: String,
    },

    /// A field expected to hold an IAM role ARN does not.
    #[error("'{resource}' field '{field}' is not an IAM role ARN: {value}")]
    InvalidRoleArn {
        /// Owning resource.
        resource: String,
        /// Field name.
        field: String,
        /// The offending value.
        value: String,
    },
}

impl ValidationError {
    /// Name of the resource the error refers to.
    pub fn resource(&self) -> &str {
        match self {
            Self::ConflictingRoleReference { node_group, .. }
            | Self::ArchitectureMismatch { node_group, .. }
            | Self::InvalidInstanceType { node_group, .. }
            | Self::InvalidScalingConfig { node_group, .. }
            | Self::ConflictingAmiSelection { node_group, .. }
            | Self::OperatingSystemMismatch { node_group, .. }
            | Self::NoMatchingAmiType { node_group, .. }
            | Self::ConflictingLaunchTemplate { node_group, .. } => node_group,
            Self::IncompatibleAuthMode { cluster, .. }
            | Self::IncompatibleConfigMapMappings { cluster, .. } => cluster,
            Self::InvalidAccessEntry { entry, .. } | Self::UnknownNodeGroup { entry, .. } => entry,
            Self::MissingSubnets { resource }
            | Self::MissingField { resource, .. }
            | Self::InvalidRoleArn { resource, .. } => resource,
            Self::DuplicateName { name, .. } => name,
        }
    }
}

/// Every problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    /// The individual errors.
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    /// Whether no problem was found.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of problems.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), Self> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.len() {
            0 => f.write_str("no validation errors"),
            1 => write!(f, "{}", self.0[0]),
            n => {
                write!(f, "{} validation errors:", n)?;
                for error in &self.0 {
                    write!(f, "\n  - {}", error)?;
                }
                Ok(())
            },
        }
    }
}

impl std::error::Error for ValidationErrors {}

/// A configuration that can check itself.
pub trait Validate {
    /// Return every rule violation. An empty list means the value is valid.
    fn validate(&self) -> Vec<ValidationError>;
}

/// Validate a configuration, returning every problem found.
pub fn validate<T: Validate + ?Sized>(config: &T) -> Vec<ValidationError> {
    config.validate()
}

/// Validate a configuration, returning `Ok` if valid or every problem found.
pub fn validate_result<T: Validate + ?Sized>(config: &T) -> Result<(), ValidationErrors> {
    ValidationErrors(config.validate()).into_result()
}

/// Check whether a configuration is valid.
pub fn is_valid<T: Validate + ?Sized>(config: &T) -> bool {
    config.validate().is_empty()
}

fn missing_field(resource: &str, field: &str) -> ValidationError {
    ValidationError::MissingField {
        resource: resource.to_string(),
        field: field.to_string(),
    }
}

fn require_non_empty(
    resource: &str,
    field: &str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) {
    if value.trim().is_empty() {
        errors.push(missing_field(resource, field));
    }
}

fn require_role_arn(resource: &str, field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    if !is_role_arn(value) {
        errors.push(ValidationError::InvalidRoleArn {
            resource: resource.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

fn check_duplicates<'a>(
    kind: &'static str,
    names: impl IntoIterator<Item = &'a str>,
    errors: &mut Vec<ValidationError>,
) {
    let mut seen = BTreeSet::new();
    let mut reported = BTreeSet::new();
    for name in names {
        if !seen.insert(name) && reported.insert(name) {
            errors.push(ValidationError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
}

impl Validate for ClusterConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        require_non_empty(&self.name, "name", &self.name, &mut errors);
        if self.service_role_arn.trim().is_empty() {
            errors.push(missing_field(&self.name, "service_role_arn"));
        } else {
            require_role_arn(
                &self.name,
                "service_role_arn",
                &self.service_role_arn,
                &mut errors,
            );
        }

        if self.public_subnet_ids.is_empty() && self.private_subnet_ids.is_empty() {
            errors.push(ValidationError::MissingSubnets {
                resource: self.name.clone(),
            });
        }

        match &self.instance_role {
            Some(IamRoleRef::Arn(arn)) => {
                require_role_arn(&self.name, "instance_role", arn, &mut errors)
            },
            Some(IamRoleRef::Owned(spec)) => {
                require_non_empty(&self.name, "instance_role.name", &spec.name, &mut errors)
            },
            None => {},
        }

        let mode = self.effective_authentication_mode();
        if !self.access_entries.is_empty() && !mode.supports_access_entries() {
            errors.push(ValidationError::IncompatibleAuthMode {
                cluster: self.name.clone(),
                mode,
            });
        }
        for entry in &self.access_entries {
            errors.extend(entry.validate());
        }

        if !mode.supports_config_map() {
            let mappings = [
                ("role_mappings", self.role_mappings.is_empty()),
                ("user_mappings", self.user_mappings.is_empty()),
            ];
            for (field, empty) in mappings {
                if !empty {
                    errors.push(ValidationError::IncompatibleConfigMapMappings {
                        cluster: self.name.clone(),
                        mode,
                        field,
                    });
                }
            }
        }
        for mapping in &self.role_mappings {
            require_role_arn(&self.name, "role_mappings.role_arn", &mapping.role_arn, &mut errors);
            require_non_empty(&self.name, "role_mappings.username", &mapping.username, &mut errors);
        }
        for mapping in &self.user_mappings {
            require_non_empty(&self.name, "user_mappings.user_arn", &mapping.user_arn, &mut errors);
            require_non_empty(&self.name, "user_mappings.username", &mapping.username, &mut errors);
        }
        check_duplicates(
            "access entry",
            self.access_entries.iter().map(|e| e.name.as_str()),
            &mut errors,
        );

        for addon in &self.addons {
            require_non_empty(&self.name, "addons.name", &addon.name, &mut errors);
        }
        check_duplicates(
            "addon",
            self.addons.iter().map(|a| a.name.as_str()),
            &mut errors,
        );

        errors
    }
}

impl Validate for AccessEntryConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let invalid = |reason: String| ValidationError::InvalidAccessEntry {
            entry: self.name.clone(),
            reason,
        };

        require_non_empty(&self.name, "name", &self.name, &mut errors);

        match &self.principal {
            Principal::Arn(arn) if !is_arn(arn) => {
                errors.push(invalid(format!("principal '{}' is not an ARN", arn)));
            },
            Principal::NodeGroupRole(node_group) if node_group.trim().is_empty() => {
                errors.push(missing_field(&self.name, "principal.node_group_role"));
            },
            _ => {},
        }

        if self.entry_type.is_restricted() {
            if !self.kubernetes_groups.is_empty() {
                errors.push(invalid(format!(
                    "{} entries cannot set kubernetes_groups",
                    self.entry_type
                )));
            }
            if !self.access_policies.is_empty() {
                errors.push(invalid(format!(
                    "{} entries cannot have access policies",
                    self.entry_type
                )));
            }
            if self.username.is_some() {
                errors.push(invalid(format!(
                    "{} entries cannot set a username",
                    self.entry_type
                )));
            }
        }

        for (name, association) in &self.access_policies {
            require_non_empty(
                &self.name,
                &format!("access_policies.{}.policy_arn", name),
                &association.policy_arn,
                &mut errors,
            );
            let scope = &association.access_scope;
            match scope.scope_type {
                AccessScopeType::Namespace if scope.namespaces.is_empty() => {
                    errors.push(invalid(format!(
                        "access policy '{}' has namespace scope but no namespaces",
                        name
                    )));
                },
                AccessScopeType::Cluster if !scope.namespaces.is_empty() => {
                    errors.push(invalid(format!(
                        "access policy '{}' has cluster scope but lists namespaces",
                        name
                    )));
                },
                _ => {},
            }
        }

        errors
    }
}

/// Rules for a node group after default resolution.
///
/// Running them on an unresolved node group reports the fields the resolver
/// would have filled (subnets, role) as missing.
impl Validate for NodeGroupConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let name = self.name.as_str();

        require_non_empty(name, "name", name, &mut errors);

        match (&self.node_role, &self.node_role_arn) {
            (Some(_), Some(_)) => errors.push(ValidationError::ConflictingRoleReference {
                node_group: name.to_string(),
                conflict: RoleConflict::Both,
            }),
            (None, None) => errors.push(ValidationError::ConflictingRoleReference {
                node_group: name.to_string(),
                conflict: RoleConflict::Neither,
            }),
            (Some(spec), None) => {
                require_non_empty(name, "node_role.name", &spec.name, &mut errors)
            },
            (None, Some(arn)) => require_role_arn(name, "node_role_arn", arn, &mut errors),
        }

        if self.subnet_ids.as_ref().map_or(true, Vec::is_empty) {
            errors.push(ValidationError::MissingSubnets {
                resource: name.to_string(),
            });
        }

        let mut instance_types_valid = true;
        for instance_type in &self.instance_types {
            if InstanceType::parse(instance_type).is_none() {
                instance_types_valid = false;
                errors.push(ValidationError::InvalidInstanceType {
                    node_group: name.to_string(),
                    instance_type: instance_type.clone(),
                });
            }
        }

        let architecture = if instance_types_valid {
            match ami::architecture_of(&self.instance_types) {
                Ok(arch) => Some(arch),
                Err(ArchitectureError::Mixed) => {
                    errors.push(ValidationError::ArchitectureMismatch {
                        node_group: name.to_string(),
                        reason: "instance types mix arm64 and x86_64".to_string(),
                    });
                    None
                },
                Err(ArchitectureError::InvalidInstanceType(_)) => None,
            }
        } else {
            None
        };

        self.validate_ami(architecture, &mut errors);
        self.validate_scaling(&mut errors);
        self.validate_launch_template(&mut errors);

        for taint in &self.taints {
            require_non_empty(name, "taints.key", &taint.key, &mut errors);
        }

        errors
    }
}

impl NodeGroupConfig {
    fn validate_ami(&self, architecture: Option<CpuArchitecture>, errors: &mut Vec<ValidationError>) {
        let name = &self.name;
        let conflict = |reason: String| ValidationError::ConflictingAmiSelection {
            node_group: name.clone(),
            reason,
        };

        if self.ami_id.is_some() {
            if self.ami_type.is_some() {
                errors.push(conflict("ami_id and ami_type are mutually exclusive".to_string()));
            }
            if self.gpu == Some(true) {
                errors.push(conflict("ami_id and gpu are mutually exclusive".to_string()));
            }
            return;
        }

        match self.ami_type {
            Some(ami_type) => {
                if let Some(arch) = architecture {
                    if !self.instance_types.is_empty() && ami_type.architecture() != arch {
                        errors.push(ValidationError::ArchitectureMismatch {
                            node_group: name.clone(),
                            reason: format!(
                                "AMI type {} is built for {} but the instance types are {}",
                                ami_type,
                                ami_type.architecture(),
                                arch
                            ),
                        });
                    }
                }
                if let Some(os) = self.operating_system {
                    if os != ami_type.operating_system() {
                        errors.push(ValidationError::OperatingSystemMismatch {
                            node_group: name.clone(),
                            operating_system: os,
                            ami_type,
                            ami_operating_system: ami_type.operating_system(),
                        });
                    }
                }
                if self.gpu == Some(true) && !ami_type.gpu_support() {
                    errors.push(conflict(format!(
                        "gpu is requested but AMI type {} has no GPU support",
                        ami_type
                    )));
                }
            },
            None if self.launch_template.is_none() => {
                // Only reachable when the resolver found no AMI for a valid architecture.
                if let Some(arch) = architecture {
                    let operating_system = self.operating_system.unwrap_or(OperatingSystem::RECOMMENDED);
                    let selected =
                        ami::AmiType::select(operating_system, self.gpu, arch, &self.instance_types);
                    if selected.is_none() {
                        errors.push(ValidationError::NoMatchingAmiType {
                            node_group: name.clone(),
                            operating_system,
                            architecture: arch,
                            gpu: self.gpu.unwrap_or(false),
                        });
                    }
                }
            },
            None => {},
        }
    }

    fn validate_scaling(&self, errors: &mut Vec<ValidationError>) {
        let Some(scaling) = self.scaling_config else {
            return;
        };
        let invalid = |reason: String| ValidationError::InvalidScalingConfig {
            node_group: self.name.clone(),
            reason,
        };

        if scaling.max_size == Some(0) {
            errors.push(invalid("max_size must be at least 1".to_string()));
        }
        if let (Some(min), Some(max)) = (scaling.min_size, scaling.max_size) {
            if min > max {
                errors.push(invalid(format!("min_size {} exceeds max_size {}", min, max)));
            }
        }
        if let (Some(desired), Some(min)) = (scaling.desired_size, scaling.min_size) {
            if desired < min {
                errors.push(invalid(format!(
                    "desired_size {} is below min_size {}",
                    desired, min
                )));
            }
        }
        if let (Some(desired), Some(max)) = (scaling.desired_size, scaling.max_size) {
            if desired > max {
                errors.push(invalid(format!(
                    "desired_size {} exceeds max_size {}",
                    desired, max
                )));
            }
        }
    }

    fn validate_launch_template(&self, errors: &mut Vec<ValidationError>) {
        let Some(template) = &self.launch_template else {
            return;
        };
        let conflict = |reason: &str| ValidationError::ConflictingLaunchTemplate {
            node_group: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.disk_size.is_some() {
            errors.push(conflict(
                "disk_size must be set in the launch template instead",
            ));
        }
        match (&template.id, &template.name) {
            (Some(_), Some(_)) => errors.push(conflict("set either id or name, not both")),
            (None, None) => errors.push(missing_field(&self.name, "launch_template.id")),
            _ => {},
        }
        require_non_empty(
            &self.name,
            "launch_template.version",
            &template.version,
            errors,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessEntryType, AccessScope};
    use crate::awsauth::{RoleMapping, UserMapping};
    use crate::ami::AmiType;
    use crate::iam::IamRoleSpec;
    use crate::nodegroup::{LaunchTemplateSpec, ScalingConfig};

    const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/nodes";

    fn node_group() -> NodeGroupConfig {
        NodeGroupConfig::new("workers")
            .with_subnets(["subnet-a"])
            .with_node_role_arn(ROLE_ARN)
            .with_instance_types(["t3.medium"])
            .with_ami_type(AmiType::Al2023X86_64Standard)
            .with_scaling(ScalingConfig::new(2, 1, 2))
    }

    fn cluster() -> ClusterConfig {
        ClusterConfig::new("demo", "arn:aws:iam::123456789012:role/eks")
            .with_private_subnets(["subnet-a"])
    }

    fn is_role_error(error: &ValidationError) -> bool {
        matches!(
            error,
            ValidationError::ConflictingRoleReference { .. } | ValidationError::InvalidRoleArn { .. }
        ) || matches!(error, ValidationError::MissingField { field, .. } if field.starts_with("node_role"))
    }

    #[test]
    fn test_valid_node_group() {
        assert!(is_valid(&node_group()));
        assert!(validate_result(&node_group()).is_ok());
    }

    #[test]
    fn test_both_roles_single_role_error() {
        let ng = node_group().with_node_role(IamRoleSpec::node_role("workers"));
        let errors = validate(&ng);
        let role_errors: Vec<_> = errors.iter().filter(|e| is_role_error(e)).collect();
        assert_eq!(
            role_errors,
            vec![&ValidationError::ConflictingRoleReference {
                node_group: "workers".to_string(),
                conflict: RoleConflict::Both,
            }]
        );
    }

    #[test]
    fn test_neither_role() {
        let mut ng = node_group();
        ng.node_role_arn = None;
        assert_eq!(
            validate(&ng),
            vec![ValidationError::ConflictingRoleReference {
                node_group: "workers".to_string(),
                conflict: RoleConflict::Neither,
            }]
        );
    }

    #[test]
    fn test_invalid_role_arn() {
        let mut ng = node_group();
        ng.node_role_arn = Some("nodes".to_string());
        assert!(matches!(
            validate(&ng).as_slice(),
            [ValidationError::InvalidRoleArn { field, .. }] if field == "node_role_arn"
        ));
    }

    #[test]
    fn test_architecture_mismatch() {
        let ng = node_group()
            .with_instance_types(["t4g.medium"])
            .with_ami_type(AmiType::Al2X86_64);
        let errors = validate(&ng);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ValidationError::ArchitectureMismatch { .. }
        ));
    }

    #[test]
    fn test_mixed_instance_architectures() {
        let mut ng = node_group().with_instance_types(["t4g.medium", "t3.medium"]);
        ng.ami_type = None;
        let errors = validate(&ng);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::ArchitectureMismatch { reason, .. } if reason.contains("mix")
        ));
    }

    #[test]
    fn test_invalid_instance_type() {
        let ng = node_group().with_instance_types(["large"]);
        assert_eq!(
            validate(&ng),
            vec![ValidationError::InvalidInstanceType {
                node_group: "workers".to_string(),
                instance_type: "large".to_string(),
            }]
        );
    }

    #[test]
    fn test_operating_system_mismatch() {
        let ng = node_group().with_operating_system(OperatingSystem::Bottlerocket);
        assert!(matches!(
            validate(&ng).as_slice(),
            [ValidationError::OperatingSystemMismatch { .. }]
        ));
    }

    #[test]
    fn test_ami_id_conflicts() {
        let ng = node_group().with_ami_id("ami-0123456789").with_gpu(true);
        let errors = validate(&ng);
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ValidationError::ConflictingAmiSelection { .. })));
    }

    #[test]
    fn test_no_matching_ami_type() {
        let mut ng = node_group()
            .with_instance_types(["g5g.xlarge"])
            .with_operating_system(OperatingSystem::Al2023)
            .with_gpu(true);
        ng.ami_type = None;
        assert!(matches!(
            validate(&ng).as_slice(),
            [ValidationError::NoMatchingAmiType {
                architecture: CpuArchitecture::Arm64,
                gpu: true,
                ..
            }]
        ));
    }

    #[test]
    fn test_inferred_gpu_falls_back_to_standard_image() {
        let mut ng = node_group()
            .with_instance_types(["g5g.xlarge"])
            .with_operating_system(OperatingSystem::Al2023);
        ng.ami_type = None;
        assert!(!validate(&ng)
            .iter()
            .any(|e| matches!(e, ValidationError::NoMatchingAmiType { .. })));
    }

    #[test]
    fn test_scaling_bounds() {
        let ng = node_group().with_scaling(ScalingConfig::new(5, 3, 2));
        let errors = validate(&ng);
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ValidationError::InvalidScalingConfig { .. })));

        let ng = node_group().with_scaling(ScalingConfig::new(0, 0, 0));
        assert_eq!(validate(&ng).len(), 1);
    }

    #[test]
    fn test_launch_template_conflicts() {
        let mut ng = node_group()
            .with_disk_size(50)
            .with_launch_template(LaunchTemplateSpec {
                id: None,
                name: None,
                version: "1".to_string(),
            });
        ng.ami_type = None;
        let errors = validate(&ng);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::ConflictingLaunchTemplate { .. })));
        assert!(errors.iter().any(
            |e| matches!(e, ValidationError::MissingField { field, .. } if field == "launch_template.id")
        ));
    }

    #[test]
    fn test_missing_subnets_on_node_group() {
        let mut ng = node_group();
        ng.subnet_ids = None;
        assert_eq!(
            validate(&ng),
            vec![ValidationError::MissingSubnets {
                resource: "workers".to_string(),
            }]
        );
    }

    #[test]
    fn test_restricted_access_entry() {
        for entry_type in [
            AccessEntryType::Ec2Linux,
            AccessEntryType::Ec2Windows,
            AccessEntryType::FargateLinux,
        ] {
            let entry = AccessEntryConfig::new("nodes", Principal::Arn(ROLE_ARN.to_string()))
                .with_type(entry_type)
                .with_group("system:nodes");
            assert!(matches!(
                validate(&entry).as_slice(),
                [ValidationError::InvalidAccessEntry { .. }]
            ));
        }

        let entry = AccessEntryConfig::new("nodes", Principal::Arn(ROLE_ARN.to_string()))
            .with_type(AccessEntryType::Ec2Linux)
            .with_username("system:node:{{EC2PrivateDNSName}}")
            .with_policy(
                "admin",
                "arn:aws:eks::aws:cluster-access-policy/AmazonEKSClusterAdminPolicy",
                AccessScope::cluster(),
            );
        assert_eq!(validate(&entry).len(), 2);

        let entry = AccessEntryConfig::new("nodes", Principal::Arn(ROLE_ARN.to_string()))
            .with_type(AccessEntryType::Ec2Linux);
        assert!(is_valid(&entry));
    }

    #[test]
    fn test_access_scope_rules() {
        let entry = AccessEntryConfig::new("devs", Principal::Arn(ROLE_ARN.to_string()))
            .with_policy(
                "view",
                "arn:aws:eks::aws:cluster-access-policy/AmazonEKSViewPolicy",
                AccessScope::namespaces(Vec::<String>::new()),
            )
            .with_policy(
                "edit",
                "arn:aws:eks::aws:cluster-access-policy/AmazonEKSEditPolicy",
                AccessScope {
                    scope_type: AccessScopeType::Cluster,
                    namespaces: vec!["default".to_string()],
                },
            );
        assert_eq!(validate(&entry).len(), 2);
    }

    #[test]
    fn test_access_entry_principal_must_be_arn() {
        let entry = AccessEntryConfig::new("devs", Principal::Arn("devs".to_string()));
        assert!(matches!(
            validate(&entry).as_slice(),
            [ValidationError::InvalidAccessEntry { reason, .. }] if reason.contains("not an ARN")
        ));
    }

    #[test]
    fn test_incompatible_auth_mode() {
        let entry = AccessEntryConfig::new("devs", Principal::Arn(ROLE_ARN.to_string()));
        let config = cluster().with_access_entry(entry.clone());
        assert_eq!(
            validate(&config),
            vec![ValidationError::IncompatibleAuthMode {
                cluster: "demo".to_string(),
                mode: AuthenticationMode::ConfigMap,
            }]
        );

        let config = cluster()
            .with_authentication_mode(AuthenticationMode::Api)
            .with_access_entry(entry);
        assert!(is_valid(&config));
    }

    #[test]
    fn test_config_map_mappings_need_config_map_mode() {
        let config = cluster()
            .with_authentication_mode(AuthenticationMode::Api)
            .with_role_mapping(RoleMapping::new(ROLE_ARN, "devs").with_group("devs"))
            .with_user_mapping(UserMapping::new("arn:aws:iam::123456789012:user/alice", "alice"));
        assert_eq!(
            validate(&config),
            vec![
                ValidationError::IncompatibleConfigMapMappings {
                    cluster: "demo".to_string(),
                    mode: AuthenticationMode::Api,
                    field: "role_mappings",
                },
                ValidationError::IncompatibleConfigMapMappings {
                    cluster: "demo".to_string(),
                    mode: AuthenticationMode::Api,
                    field: "user_mappings",
                },
            ]
        );

        for mode in [AuthenticationMode::ConfigMap, AuthenticationMode::ApiAndConfigMap] {
            let config = cluster()
                .with_authentication_mode(mode)
                .with_role_mapping(RoleMapping::new(ROLE_ARN, "devs"));
            assert!(is_valid(&config));
        }
    }

    #[test]
    fn test_mapping_fields() {
        let config = cluster()
            .with_role_mapping(RoleMapping::new("devs", ""))
            .with_user_mapping(UserMapping::new("", "alice"));
        let errors = validate(&config);
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::InvalidRoleArn {
            resource: "demo".to_string(),
            field: "role_mappings.role_arn".to_string(),
            value: "devs".to_string(),
        }));
        assert!(errors.contains(&ValidationError::MissingField {
            resource: "demo".to_string(),
            field: "role_mappings.username".to_string(),
        }));
        assert!(errors.contains(&ValidationError::MissingField {
            resource: "demo".to_string(),
            field: "user_mappings.user_arn".to_string(),
        }));
    }

    #[test]
    fn test_cluster_rules() {
        let config = ClusterConfig::new("", "eks-role");
        let errors = validate(&config);
        assert!(errors.contains(&ValidationError::MissingField {
            resource: String::new(),
            field: "name".to_string(),
        }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidRoleArn { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::MissingSubnets { .. })));
    }

    #[test]
    fn test_duplicate_access_entries() {
        let entry = AccessEntryConfig::new("devs", Principal::Arn(ROLE_ARN.to_string()));
        let config = cluster()
            .with_authentication_mode(AuthenticationMode::ApiAndConfigMap)
            .with_access_entry(entry.clone())
            .with_access_entry(entry.clone())
            .with_access_entry(entry);
        assert_eq!(
            validate(&config),
            vec![ValidationError::DuplicateName {
                kind: "access entry",
                name: "devs".to_string(),
            }]
        );
    }

    #[test]
    fn test_errors_display() {
        let errors = ValidationErrors(vec![
            ValidationError::MissingSubnets {
                resource: "workers".to_string(),
            },
            ValidationError::DuplicateName {
                kind: "node group",
                name: "workers".to_string(),
            },
        ]);
        assert_eq!(
            errors.to_string(),
            "2 validation errors:\n  - No subnets available for 'workers'\n  - Duplicate node group name 'workers'"
        );
        assert_eq!(errors.errors()[0].resource(), "workers");
    }
}
