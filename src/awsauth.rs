//! IAM mappings written to the `aws-auth` ConfigMap.
//!
//! Clusters in `CONFIG_MAP` or `API_AND_CONFIG_MAP` mode authorize IAM
//! principals through `kube-system/aws-auth`. The composer writes it with the
//! node roles of every node group plus the mappings set on the cluster.

use serde::{Deserialize, Serialize};

/// Name of the ConfigMap EKS reads IAM mappings from.
pub const AWS_AUTH_NAME: &str = "aws-auth";

/// Namespace of the `aws-auth` ConfigMap.
pub const AWS_AUTH_NAMESPACE: &str = "kube-system";

/// Kubernetes username given to nodes joining through a role mapping.
pub const NODE_USERNAME: &str = "system:node:{{EC2PrivateDNSName}}";

/// Groups nodes need to register with the cluster.
pub const NODE_GROUPS: [&str; 2] = ["system:bootstrappers", "system:nodes"];

/// Maps an IAM role to a Kubernetes user and groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleMapping {
    /// ARN of the IAM role.
    pub role_arn: String,
    /// Kubernetes username.
    pub username: String,
    /// Kubernetes groups.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl RoleMapping {
    /// A mapping without groups.
    pub fn new(role_arn: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            username: username.into(),
            groups: Vec::new(),
        }
    }

    /// The mapping that lets instances with this role join as nodes.
    pub fn node(role_arn: impl Into<String>) -> Self {
        NODE_GROUPS
            .iter()
            .fold(Self::new(role_arn, NODE_USERNAME), |mapping, group| {
                mapping.with_group(*group)
            })
    }

    /// Add a Kubernetes group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }
}

/// Maps an IAM user to a Kubernetes user and groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserMapping {
    /// ARN of the IAM user.
    pub user_arn: String,
    /// Kubernetes username.
    pub username: String,
    /// Kubernetes groups.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserMapping {
    /// A mapping without groups.
    pub fn new(user_arn: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_arn: user_arn.into(),
            username: username.into(),
            groups: Vec::new(),
        }
    }

    /// Add a Kubernetes group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }
}

// Entry layouts expected by the aws-iam-authenticator.

#[derive(Serialize)]
struct MapRolesEntry<'a> {
    rolearn: &'a str,
    username: &'a str,
    groups: &'a [String],
}

#[derive(Serialize)]
struct MapUsersEntry<'a> {
    userarn: &'a str,
    username: &'a str,
    groups: &'a [String],
}

/// The `data` section of the `aws-auth` ConfigMap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsAuthData {
    /// YAML list of role mappings.
    pub map_roles: String,
    /// YAML list of user mappings; `None` when there are none.
    pub map_users: Option<String>,
}

impl AwsAuthData {
    /// Render role and user mappings as the YAML documents EKS expects.
    pub fn new(roles: &[RoleMapping], users: &[UserMapping]) -> Result<Self, serde_yaml::Error> {
        let roles: Vec<MapRolesEntry<'_>> = roles
            .iter()
            .map(|m| MapRolesEntry {
                rolearn: &m.role_arn,
                username: &m.username,
                groups: &m.groups,
            })
            .collect();
        let map_roles = serde_yaml::to_string(&roles)?;

        let map_users = if users.is_empty() {
            None
        } else {
            let users: Vec<MapUsersEntry<'_>> = users
                .iter()
                .map(|m| MapUsersEntry {
                    userarn: &m.user_arn,
                    username: &m.username,
                    groups: &m.groups,
                })
                .collect();
            Some(serde_yaml::to_string(&users)?)
        };

        Ok(Self {
            map_roles,
            map_users,
        })
    }
}
