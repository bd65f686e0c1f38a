//! Kubeconfig generation.
//!
//! Documents are built from serde structs whose field order is fixed, so the
//! same cluster, profile and role always serialize to the same bytes.

use serde::{Deserialize, Serialize};

const CLUSTER_NAME: &str = "kubernetes";
const USER_NAME: &str = "aws";
const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

/// Credentials baked into the generated kubeconfig.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KubeconfigOptions {
    /// AWS profile exported to the token generator as `AWS_PROFILE`.
    #[serde(default)]
    pub profile_name: Option<String>,
    /// Role assumed by the token generator.
    #[serde(default)]
    pub role_arn: Option<String>,
}

impl KubeconfigOptions {
    /// Use a named AWS profile.
    pub fn with_profile(mut self, profile_name: impl Into<String>) -> Self {
        self.profile_name = Some(profile_name.into());
        self
    }

    /// Assume a role when fetching tokens.
    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }
}

/// How the kubeconfig user authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KubeconfigAuth {
    /// A static bearer token.
    Token(String),
    /// `aws eks get-token`, run by kubectl on demand.
    Exec(KubeconfigOptions),
}

/// A kubeconfig document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kubeconfig {
    #[serde(rename = "apiVersion")]
    api_version: String,
    clusters: Vec<NamedCluster>,
    contexts: Vec<NamedContext>,
    #[serde(rename = "current-context")]
    current_context: String,
    kind: String,
    users: Vec<NamedUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct NamedCluster {
    cluster: ClusterEntry,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ClusterEntry {
    server: String,
    #[serde(rename = "certificate-authority-data")]
    certificate_authority_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct NamedContext {
    context: ContextEntry,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ContextEntry {
    cluster: String,
    user: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct NamedUser {
    name: String,
    user: UserEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum UserEntry {
    Token { token: String },
    Exec { exec: ExecConfig },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ExecConfig {
    #[serde(rename = "apiVersion")]
    api_version: String,
    command: String,
    args: Vec<String>,
    env: Vec<EnvVar>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct EnvVar {
    name: String,
    value: String,
}

impl Kubeconfig {
    /// Build a kubeconfig for a cluster endpoint.
    pub fn new(
        cluster_name: &str,
        endpoint: &str,
        certificate_authority_data: &str,
        auth: &KubeconfigAuth,
    ) -> Self {
        let user = match auth {
            KubeconfigAuth::Token(token) => UserEntry::Token {
                token: token.clone(),
            },
            KubeconfigAuth::Exec(options) => UserEntry::Exec {
                exec: exec_config(cluster_name, options),
            },
        };

        Self {
            api_version: "v1".to_string(),
            clusters: vec![NamedCluster {
                cluster: ClusterEntry {
                    server: endpoint.to_string(),
                    certificate_authority_data: certificate_authority_data.to_string(),
                },
                name: CLUSTER_NAME.to_string(),
            }],
            contexts: vec![NamedContext {
                context: ContextEntry {
                    cluster: CLUSTER_NAME.to_string(),
                    user: USER_NAME.to_string(),
                },
                name: USER_NAME.to_string(),
            }],
            current_context: USER_NAME.to_string(),
            kind: "Config".to_string(),
            users: vec![NamedUser {
                name: USER_NAME.to_string(),
                user,
            }],
        }
    }

    /// Serialize as compact JSON.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize as a JSON value.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

fn exec_config(cluster_name: &str, options: &KubeconfigOptions) -> ExecConfig {
    let mut args = vec![
        "eks".to_string(),
        "get-token".to_string(),
        "--cluster-name".to_string(),
        cluster_name.to_string(),
    ];
    if let Some(role_arn) = &options.role_arn {
        args.push("--role-arn".to_string());
        args.push(role_arn.clone());
    }

    let mut env = vec![EnvVar {
        name: "KUBERNETES_EXEC_INFO".to_string(),
        value: format!(r#"{{"apiVersion": "{}"}}"#, EXEC_API_VERSION),
    }];
    if let Some(profile) = &options.profile_name {
        env.push(EnvVar {
            name: "AWS_PROFILE".to_string(),
            value: profile.clone(),
        });
    }

    ExecConfig {
        api_version: EXEC_API_VERSION.to_string(),
        command: "aws".to_string(),
        args,
        env,
    }
}
