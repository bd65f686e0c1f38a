//! IAM role references used by node groups and access entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Managed policies attached to node roles created by the composer.
pub const DEFAULT_NODE_POLICY_ARNS: [&str; 3] = [
    "arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy",
    "arn:aws:iam::aws:policy/AmazonEKS_CNI_Policy",
    "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly",
];

fn default_node_policy_arns() -> Vec<String> {
    DEFAULT_NODE_POLICY_ARNS
        .iter()
        .map(|arn| arn.to_string())
        .collect()
}

/// An IAM role the composer creates on behalf of the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IamRoleSpec {
    /// Role name. Node groups naming the same role share one role.
    pub name: String,
    /// Managed policies to attach.
    #[serde(default = "default_node_policy_arns")]
    pub managed_policy_arns: Vec<String>,
    /// Tags applied to the role.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl IamRoleSpec {
    /// A node role with the standard EKS worker policies.
    pub fn node_role(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            managed_policy_arns: default_node_policy_arns(),
            tags: BTreeMap::new(),
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Trust policy allowing EC2 instances to assume the role.
    pub fn assume_role_policy(&self) -> String {
        serde_json::json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Action": "sts:AssumeRole",
                "Effect": "Allow",
                "Principal": { "Service": "ec2.amazonaws.com" },
            }],
        })
        .to_string()
    }
}

/// A role that is either created by the composer or owned elsewhere.
///
/// Only the ARN of an owned role is known before creation; consumers obtain it
/// through the composer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IamRoleRef {
    /// Created by the composer.
    Owned(IamRoleSpec),
    /// Externally managed role, referenced by ARN.
    Arn(String),
}

impl IamRoleRef {
    /// The role name, when it can be known without a remote call.
    pub fn role_name(&self) -> Option<&str> {
        match self {
            Self::Owned(spec) => Some(&spec.name),
            Self::Arn(arn) => role_name_from_arn(arn),
        }
    }
}

/// Whether `value` looks like an IAM role ARN (`arn:<partition>:iam::<account>:role/<name>`).
pub fn is_role_arn(value: &str) -> bool {
    let mut parts = value.splitn(6, ':');
    let (Some("arn"), Some(partition), Some("iam"), Some(""), Some(account), Some(resource)) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    !partition.is_empty()
        && !account.is_empty()
        && account.chars().all(|c| c.is_ascii_digit())
        && resource
            .strip_prefix("role/")
            .is_some_and(|name| !name.is_empty())
}

/// Whether `value` looks like any ARN (`arn:<partition>:<service>:...`).
pub fn is_arn(value: &str) -> bool {
    let parts: Vec<&str> = value.splitn(6, ':').collect();
    parts.len() == 6 && parts[0] == "arn" && !parts[1].is_empty() && !parts[2].is_empty()
}

/// The role name from a role ARN, dropping any path.
pub fn role_name_from_arn(arn: &str) -> Option<&str> {
    if !is_role_arn(arn) {
        return None;
    }
    arn.rsplit('/').next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_arn_detection() {
        assert!(is_role_arn("arn:aws:iam::123456789012:role/eks-nodes"));
        assert!(is_role_arn("arn:aws-cn:iam::123456789012:role/path/to/nodes"));
        assert!(!is_role_arn("arn:aws:iam::123456789012:user/alice"));
        assert!(!is_role_arn("arn:aws:iam::123456789012:role/"));
        assert!(!is_role_arn("eks-nodes"));
        assert!(!is_role_arn("arn:aws:iam::abc:role/eks-nodes"));
    }

    #[test]
    fn test_generic_arn_detection() {
        assert!(is_arn("arn:aws:iam::123456789012:user/alice"));
        assert!(is_arn("arn:aws:sts::123456789012:assumed-role/admin/session"));
        assert!(!is_arn("alice"));
    }

    #[test]
    fn test_role_name() {
        assert_eq!(
            role_name_from_arn("arn:aws:iam::123456789012:role/path/to/nodes"),
            Some("nodes")
        );
        assert_eq!(
            IamRoleRef::Owned(IamRoleSpec::node_role("workers")).role_name(),
            Some("workers")
        );
        assert_eq!(IamRoleRef::Arn("bogus".to_string()).role_name(), None);
    }

    #[test]
    fn test_role_ref_serde() {
        let json = serde_json::json!({ "owned": { "name": "workers" } });
        let role: IamRoleRef = serde_json::from_value(json).unwrap();
        match role {
            IamRoleRef::Owned(spec) => {
                assert_eq!(spec.name, "workers");
                assert_eq!(spec.managed_policy_arns.len(), 3);
            },
            IamRoleRef::Arn(_) => panic!("expected owned role"),
        }

        let json = serde_json::json!({ "arn": "arn:aws:iam::123456789012:role/nodes" });
        let role: IamRoleRef = serde_json::from_value(json).unwrap();
        assert_eq!(
            role,
            IamRoleRef::Arn("arn:aws:iam::123456789012:role/nodes".to_string())
        );
    }

    #[test]
    fn test_assume_role_policy() {
        let policy: serde_json::Value =
            serde_json::from_str(&IamRoleSpec::node_role("workers").assume_role_policy()).unwrap();
        assert_eq!(
            policy["Statement"][0]["Principal"]["Service"],
            "ec2.amazonaws.com"
        );
    }
}
