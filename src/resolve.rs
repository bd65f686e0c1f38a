//! Default resolution for node groups.
//!
//! [`resolve`] is pure: the same node group and cluster always produce the same
//! result, and every default is built fresh per call.

use crate::ami::{self, AmiType, OperatingSystem, DEFAULT_INSTANCE_TYPE};
use crate::cluster::ClusterConfig;
use crate::iam::IamRoleRef;
use crate::nodegroup::{
    NodeGroupConfig, ScalingConfig, DEFAULT_DESIRED_SIZE, DEFAULT_DISK_SIZE, DEFAULT_MAX_SIZE,
    DEFAULT_MIN_SIZE,
};
use crate::validation::ValidationError;

/// Fill the unset fields of a node group from the cluster and fixed defaults.
///
/// Subnets are taken from the first non-empty of: the node group's own list,
/// the cluster's private subnets, the cluster's public subnets. When all three
/// are empty this fails with [`ValidationError::MissingSubnets`].
///
/// Other problems (conflicting roles, mixed architectures, ...) are left in
/// place for [`validate`](crate::validation::validate) to report.
pub fn resolve(
    node_group: &NodeGroupConfig,
    cluster: &ClusterConfig,
) -> Result<NodeGroupConfig, ValidationError> {
    let resolved = apply_defaults(node_group, cluster);
    if resolved.subnet_ids.as_ref().map_or(true, Vec::is_empty) {
        return Err(ValidationError::MissingSubnets {
            resource: node_group.name.clone(),
        });
    }
    Ok(resolved)
}

/// Like [`resolve`], but leaves the subnets empty instead of failing, so the
/// validator can report subnet problems alongside everything else.
pub(crate) fn apply_defaults(node_group: &NodeGroupConfig, cluster: &ClusterConfig) -> NodeGroupConfig {
    let mut resolved = node_group.clone();

    resolved.subnet_ids = Some(select_subnets(node_group, cluster).to_vec());
    resolved.scaling_config = Some(resolve_scaling(node_group.scaling_config));

    if resolved.instance_types.is_empty() {
        resolved.instance_types = vec![DEFAULT_INSTANCE_TYPE.to_string()];
    }

    let custom_image = resolved.launch_template.is_some() || resolved.ami_id.is_some();
    if resolved.launch_template.is_none() && resolved.disk_size.is_none() {
        resolved.disk_size = Some(DEFAULT_DISK_SIZE);
    }
    if !custom_image && resolved.version.is_none() {
        resolved.version = cluster.version.clone();
    }

    if resolved.node_role.is_none() && resolved.node_role_arn.is_none() {
        match &cluster.instance_role {
            Some(IamRoleRef::Owned(spec)) => resolved.node_role = Some(spec.clone()),
            Some(IamRoleRef::Arn(arn)) => resolved.node_role_arn = Some(arn.clone()),
            None => {},
        }
    }

    resolve_ami(&mut resolved);
    resolved
}

fn select_subnets<'a>(node_group: &'a NodeGroupConfig, cluster: &'a ClusterConfig) -> &'a [String] {
    [
        node_group.subnet_ids.as_deref().unwrap_or_default(),
        cluster.private_subnet_ids.as_slice(),
        cluster.public_subnet_ids.as_slice(),
    ]
    .into_iter()
    .find(|subnets| !subnets.is_empty())
    .unwrap_or_default()
}

fn resolve_scaling(scaling: Option<ScalingConfig>) -> ScalingConfig {
    let scaling = scaling.unwrap_or_default();
    ScalingConfig {
        desired_size: Some(scaling.desired_size.unwrap_or(DEFAULT_DESIRED_SIZE)),
        min_size: Some(scaling.min_size.unwrap_or(DEFAULT_MIN_SIZE)),
        max_size: Some(scaling.max_size.unwrap_or(DEFAULT_MAX_SIZE)),
    }
}

fn resolve_ami(node_group: &mut NodeGroupConfig) {
    if node_group.ami_id.is_some() {
        return;
    }

    if let Some(ami_type) = node_group.ami_type {
        if node_group.operating_system.is_none() {
            node_group.operating_system = Some(ami_type.operating_system());
        }
        return;
    }

    // A launch template may carry its own image.
    if node_group.launch_template.is_some() && node_group.operating_system.is_none() {
        return;
    }

    let operating_system = *node_group
        .operating_system
        .get_or_insert(OperatingSystem::RECOMMENDED);
    let Ok(architecture) = ami::architecture_of(&node_group.instance_types) else {
        return;
    };
    node_group.ami_type = AmiType::select(
        operating_system,
        node_group.gpu,
        architecture,
        &node_group.instance_types,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ami::CpuArchitecture;
    use crate::iam::IamRoleSpec;
    use crate::nodegroup::LaunchTemplateSpec;

    fn cluster() -> ClusterConfig {
        ClusterConfig::new("demo", "arn:aws:iam::123456789012:role/eks")
            .with_version("1.31")
            .with_private_subnets(["subnet-priv-a", "subnet-priv-b"])
            .with_public_subnets(["subnet-pub-a"])
    }

    fn node_group() -> NodeGroupConfig {
        NodeGroupConfig::new("workers").with_node_role_arn("arn:aws:iam::123456789012:role/nodes")
    }

    #[test]
    fn test_private_subnets_preferred() {
        let resolved = resolve(&node_group(), &cluster()).unwrap();
        assert_eq!(
            resolved.subnet_ids,
            Some(vec![
                "subnet-priv-a".to_string(),
                "subnet-priv-b".to_string()
            ])
        );
    }

    #[test]
    fn test_public_subnets_fallback() {
        let mut cluster = cluster();
        cluster.private_subnet_ids.clear();
        let resolved = resolve(&node_group(), &cluster).unwrap();
        assert_eq!(resolved.subnet_ids, Some(vec!["subnet-pub-a".to_string()]));
    }

    #[test]
    fn test_explicit_subnets_win() {
        let ng = node_group().with_subnets(["subnet-own"]);
        let resolved = resolve(&ng, &cluster()).unwrap();
        assert_eq!(resolved.subnet_ids, Some(vec!["subnet-own".to_string()]));

        // An explicitly empty list falls through to the cluster.
        let ng = node_group().with_subnets(Vec::<String>::new());
        let resolved = resolve(&ng, &cluster()).unwrap();
        assert_eq!(resolved.subnet_ids.unwrap().len(), 2);
    }

    #[test]
    fn test_missing_subnets() {
        let cluster = ClusterConfig::new("demo", "arn:aws:iam::123456789012:role/eks");
        assert_eq!(
            resolve(&node_group(), &cluster),
            Err(ValidationError::MissingSubnets {
                resource: "workers".to_string(),
            })
        );
    }

    #[test]
    fn test_scaling_defaults_per_field() {
        let resolved = resolve(&node_group(), &cluster()).unwrap();
        assert_eq!(resolved.scaling_config, Some(ScalingConfig::new(2, 1, 2)));

        let ng = node_group().with_scaling(ScalingConfig {
            desired_size: None,
            min_size: None,
            max_size: Some(10),
        });
        let resolved = resolve(&ng, &cluster()).unwrap();
        assert_eq!(resolved.scaling_config, Some(ScalingConfig::new(2, 1, 10)));
    }

    #[test]
    fn test_independent_defaults() {
        let cluster = cluster();
        let mut first = resolve(&NodeGroupConfig::new("a"), &cluster).unwrap();
        let second = resolve(&NodeGroupConfig::new("b"), &cluster).unwrap();

        if let Some(scaling) = first.scaling_config.as_mut() {
            scaling.desired_size = Some(7);
        }
        first.instance_types.push("m5.large".to_string());

        assert_eq!(second.scaling_config, Some(ScalingConfig::new(2, 1, 2)));
        assert_eq!(second.instance_types, vec![DEFAULT_INSTANCE_TYPE]);
    }

    #[test]
    fn test_defaults_applied() {
        let resolved = resolve(&node_group(), &cluster()).unwrap();
        assert_eq!(resolved.instance_types, vec!["t3.medium"]);
        assert_eq!(resolved.disk_size, Some(20));
        assert_eq!(resolved.version.as_deref(), Some("1.31"));
        assert_eq!(resolved.operating_system, Some(OperatingSystem::Al2023));
        assert_eq!(resolved.ami_type, Some(AmiType::Al2023X86_64Standard));
    }

    #[test]
    fn test_graviton_selects_arm_ami() {
        let ng = node_group().with_instance_types(["t4g.medium", "m7g.large"]);
        let resolved = resolve(&ng, &cluster()).unwrap();
        assert_eq!(resolved.ami_type, Some(AmiType::Al2023Arm64Standard));
        assert_eq!(
            resolved.ami_type.map(|a| a.architecture()),
            Some(CpuArchitecture::Arm64)
        );
    }

    #[test]
    fn test_gpu_instances_select_nvidia_ami() {
        let ng = node_group().with_instance_types(["g5.xlarge"]);
        let resolved = resolve(&ng, &cluster()).unwrap();
        assert_eq!(resolved.ami_type, Some(AmiType::Al2023X86_64Nvidia));

        let ng = node_group()
            .with_instance_types(["g5.xlarge"])
            .with_gpu(false);
        let resolved = resolve(&ng, &cluster()).unwrap();
        assert_eq!(resolved.ami_type, Some(AmiType::Al2023X86_64Standard));
    }

    #[test]
    fn test_graviton_gpu_instances_use_standard_image() {
        let ng = node_group().with_instance_types(["g5g.xlarge"]);
        let resolved = resolve(&ng, &cluster()).unwrap();
        assert_eq!(resolved.ami_type, Some(AmiType::Al2023Arm64Standard));
        assert_eq!(resolved.operating_system, Some(OperatingSystem::Al2023));
    }

    #[test]
    fn test_pinned_operating_system() {
        let ng = node_group()
            .with_instance_types(["c7g.large"])
            .with_operating_system(OperatingSystem::Bottlerocket);
        let resolved = resolve(&ng, &cluster()).unwrap();
        assert_eq!(resolved.ami_type, Some(AmiType::BottlerocketArm64));
    }

    #[test]
    fn test_explicit_ami_type_kept() {
        let ng = node_group()
            .with_instance_types(["t4g.medium"])
            .with_ami_type(AmiType::Al2X86_64);
        let resolved = resolve(&ng, &cluster()).unwrap();
        assert_eq!(resolved.ami_type, Some(AmiType::Al2X86_64));
        assert_eq!(resolved.operating_system, Some(OperatingSystem::Al2));
    }

    #[test]
    fn test_mixed_architectures_left_unresolved() {
        let ng = node_group().with_instance_types(["t4g.medium", "t3.medium"]);
        let resolved = resolve(&ng, &cluster()).unwrap();
        assert_eq!(resolved.ami_type, None);
    }

    #[test]
    fn test_custom_ami_derives_nothing() {
        let ng = node_group().with_ami_id("ami-0123456789abcdef0");
        let resolved = resolve(&ng, &cluster()).unwrap();
        assert_eq!(resolved.ami_type, None);
        assert_eq!(resolved.operating_system, None);
        assert_eq!(resolved.version, None);
    }

    #[test]
    fn test_launch_template_skips_disk_and_version() {
        let ng = node_group().with_launch_template(LaunchTemplateSpec {
            id: Some("lt-0123".to_string()),
            name: None,
            version: "$Latest".to_string(),
        });
        let resolved = resolve(&ng, &cluster()).unwrap();
        assert_eq!(resolved.disk_size, None);
        assert_eq!(resolved.version, None);
        assert_eq!(resolved.ami_type, None);
    }

    #[test]
    fn test_instance_role_inherited() {
        let cluster =
            cluster().with_instance_role(IamRoleRef::Owned(IamRoleSpec::node_role("shared")));
        let resolved = resolve(&NodeGroupConfig::new("workers"), &cluster).unwrap();
        assert_eq!(resolved.node_role, Some(IamRoleSpec::node_role("shared")));
        assert_eq!(resolved.node_role_arn, None);

        // A node group with its own role keeps it.
        let resolved = resolve(&node_group(), &cluster).unwrap();
        assert_eq!(resolved.node_role, None);
        assert!(resolved.node_role_arn.is_some());
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let ng = node_group().with_instance_types(["c6gn.xlarge"]);
        assert_eq!(resolve(&ng, &cluster()), resolve(&ng, &cluster()));
    }
}
