//! Planning and executing a cluster composition.
//!
//! [`plan`] validates and resolves the configuration without touching the
//! provider. [`execute`] then issues create requests in dependency order:
//!
//! 1. the cluster, awaited before anything else;
//! 2. concurrently: owned IAM roles (once each), add-ons, node groups
//!    (role, then instance profile for self-managed groups, then the group)
//!    and access entries (after the role they reference) followed by their
//!    access-policy associations;
//! 3. when the authentication mode honours it, the `aws-auth` ConfigMap,
//!    once every node role it maps has an ARN.
//!
//! A failed request never aborts its siblings. Its dependents are reported as
//! skipped and nothing is rolled back.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::access::{AccessEntryConfig, AccessPolicyAssociation, Principal};
use crate::awsauth::{AwsAuthData, RoleMapping, AWS_AUTH_NAME, AWS_AUTH_NAMESPACE};
use crate::cluster::{AddonConfig, ClusterConfig};
use crate::error::{ConfigError, ProviderError};
use crate::iam::{IamRoleRef, IamRoleSpec};
use crate::kubeconfig::{Kubeconfig, KubeconfigAuth};
use crate::nodegroup::{NodeGroupConfig, NodeGroupKind, ResolvedNodeGroup};
use crate::provider::ResourceProvider;
use crate::resolve::apply_defaults;
use crate::types::{
    CreatedResource, FailedResource, ProvisionResult, ResourceKind, ResourceOptions,
    SkippedResource,
};
use crate::validation::{validate, ValidationError, ValidationErrors};

/// A complete composition definition, as loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Composition {
    /// The cluster.
    pub cluster: ClusterConfig,
    /// Node groups attached to the cluster.
    #[serde(default)]
    pub node_groups: Vec<NodeGroupConfig>,
    /// Access entries in addition to `cluster.access_entries`.
    #[serde(default)]
    pub access_entries: Vec<AccessEntryConfig>,
}

impl Composition {
    /// Load a composition from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate and resolve the composition.
    pub fn plan(&self) -> Result<CompositionPlan, ValidationErrors> {
        plan(&self.cluster, &self.node_groups, &self.access_entries)
    }
}

/// An access entry whose principal is known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedAccessEntry {
    /// The entry as configured.
    pub config: AccessEntryConfig,
    /// The principal. `Owned` when it is a role the composer creates.
    pub principal: IamRoleRef,
}

/// A resource the plan will request, with the logical names it waits for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedResource {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Logical name.
    pub name: String,
    /// Logical names that must exist first.
    pub depends_on: Vec<String>,
}

/// A validated composition, ready to execute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionPlan {
    /// The cluster, with all access entries merged in.
    pub cluster: ClusterConfig,
    /// IAM roles to create, deduplicated by name.
    pub roles: Vec<IamRoleSpec>,
    /// Resolved node groups.
    pub node_groups: Vec<ResolvedNodeGroup>,
    /// Access entries with their principals.
    pub access_entries: Vec<PlannedAccessEntry>,
}

impl CompositionPlan {
    /// Logical name of the instance profile of a self-managed node group.
    pub fn instance_profile_name(node_group: &ResolvedNodeGroup) -> String {
        format!("{}-instanceProfile", node_group.name)
    }

    /// Logical name of an add-on.
    pub fn addon_name(&self, addon: &AddonConfig) -> String {
        format!("{}-{}", self.cluster.name, addon.name)
    }

    /// Logical name of an access entry.
    pub fn access_entry_name(&self, entry: &AccessEntryConfig) -> String {
        format!("{}-{}", self.cluster.name, entry.name)
    }

    /// Logical name of an access-policy association.
    pub fn policy_association_name(&self, entry: &AccessEntryConfig, policy: &str) -> String {
        format!("{}-{}-{}", self.cluster.name, entry.name, policy)
    }

    /// Logical name of the `aws-auth` ConfigMap.
    pub fn node_access_name(&self) -> String {
        format!("{}-nodeAccess", self.cluster.name)
    }

    /// Whether the plan writes the `aws-auth` ConfigMap.
    ///
    /// Only in modes that honour it, and only when there is something to map.
    pub fn manages_aws_auth(&self) -> bool {
        self.cluster.effective_authentication_mode().supports_config_map()
            && !(self.node_groups.is_empty()
                && self.cluster.role_mappings.is_empty()
                && self.cluster.user_mappings.is_empty())
    }

    /// Node roles to map in `aws-auth`, first occurrence first.
    fn node_roles(&self) -> Vec<&IamRoleRef> {
        let mut roles: Vec<&IamRoleRef> = Vec::new();
        for ng in &self.node_groups {
            if !roles.contains(&&ng.role) {
                roles.push(&ng.role);
            }
        }
        roles
    }

    /// Every resource the plan will request, cluster first.
    pub fn resources(&self) -> Vec<PlannedResource> {
        let cluster = self.cluster.name.clone();
        let planned = |kind, name: String, depends_on: Vec<String>| PlannedResource {
            kind,
            name,
            depends_on,
        };

        let mut resources = vec![planned(ResourceKind::Cluster, cluster.clone(), Vec::new())];
        for role in &self.roles {
            resources.push(planned(ResourceKind::IamRole, role.name.clone(), vec![cluster.clone()]));
        }
        for addon in &self.cluster.addons {
            resources.push(planned(
                ResourceKind::Addon,
                self.addon_name(addon),
                vec![cluster.clone()],
            ));
        }
        for ng in &self.node_groups {
            let mut depends_on = vec![cluster.clone()];
            if let IamRoleRef::Owned(spec) = &ng.role {
                depends_on.push(spec.name.clone());
            }
            let kind = match ng.kind {
                NodeGroupKind::Managed => ResourceKind::ManagedNodeGroup,
                NodeGroupKind::SelfManaged => {
                    let profile = Self::instance_profile_name(ng);
                    resources.push(planned(
                        ResourceKind::InstanceProfile,
                        profile.clone(),
                        depends_on[1..].to_vec(),
                    ));
                    depends_on.push(profile);
                    ResourceKind::SelfManagedNodeGroup
                },
            };
            resources.push(planned(kind, ng.name.clone(), depends_on));
        }
        for entry in &self.access_entries {
            let entry_name = self.access_entry_name(&entry.config);
            let mut depends_on = vec![cluster.clone()];
            if let IamRoleRef::Owned(spec) = &entry.principal {
                depends_on.push(spec.name.clone());
            }
            resources.push(planned(
                ResourceKind::AccessEntry,
                entry_name.clone(),
                depends_on,
            ));
            for policy in entry.config.access_policies.keys() {
                resources.push(planned(
                    ResourceKind::AccessPolicyAssociation,
                    self.policy_association_name(&entry.config, policy),
                    vec![entry_name.clone()],
                ));
            }
        }
        if self.manages_aws_auth() {
            let mut depends_on = vec![cluster.clone()];
            depends_on.extend(self.node_roles().into_iter().filter_map(|role| match role {
                IamRoleRef::Owned(spec) => Some(spec.name.clone()),
                IamRoleRef::Arn(_) => None,
            }));
            resources.push(planned(
                ResourceKind::ConfigMap,
                self.node_access_name(),
                depends_on,
            ));
        }
        resources
    }
}

/// Validate, resolve and validate again.
///
/// Access entries passed here are merged with `cluster.access_entries`.
/// Returns every configuration problem at once; nothing is sent to a provider.
pub fn plan(
    cluster: &ClusterConfig,
    node_groups: &[NodeGroupConfig],
    access_entries: &[AccessEntryConfig],
) -> Result<CompositionPlan, ValidationErrors> {
    let mut cluster = cluster.clone();
    cluster.access_entries.extend(access_entries.iter().cloned());

    let mut errors = validate(&cluster);

    let mut seen = BTreeSet::new();
    for ng in node_groups {
        if !seen.insert(ng.name.as_str()) {
            errors.push(ValidationError::DuplicateName {
                kind: "node group",
                name: ng.name.clone(),
            });
        }
    }

    let resolved: Vec<NodeGroupConfig> = node_groups
        .iter()
        .map(|ng| apply_defaults(ng, &cluster))
        .collect();
    for ng in &resolved {
        errors.extend(validate(ng));
    }

    let mut roles: Vec<IamRoleSpec> = Vec::new();
    for spec in resolved.iter().filter_map(|ng| ng.node_role.as_ref()) {
        match roles.iter().find(|r| r.name == spec.name) {
            Some(existing) if existing != spec => errors.push(ValidationError::DuplicateName {
                kind: "IAM role",
                name: spec.name.clone(),
            }),
            Some(_) => {},
            None => roles.push(spec.clone()),
        }
    }

    let mut planned_entries = Vec::with_capacity(cluster.access_entries.len());
    for entry in &cluster.access_entries {
        let principal = match &entry.principal {
            Principal::Arn(arn) => Some(IamRoleRef::Arn(arn.clone())),
            Principal::NodeGroupRole(name) => {
                match resolved.iter().find(|ng| &ng.name == name) {
                    Some(ng) => node_role(ng),
                    None => {
                        errors.push(ValidationError::UnknownNodeGroup {
                            entry: entry.name.clone(),
                            node_group: name.clone(),
                        });
                        None
                    },
                }
            },
        };
        if let Some(principal) = principal {
            planned_entries.push(PlannedAccessEntry {
                config: entry.clone(),
                principal,
            });
        }
    }

    if !errors.is_empty() {
        warn!(
            cluster = %cluster.name,
            errors = errors.len(),
            "Composition failed validation"
        );
        return Err(ValidationErrors(errors));
    }

    let node_groups = resolved
        .into_iter()
        .map(ResolvedNodeGroup::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ValidationErrors(vec![e]))?;

    info!(
        cluster = %cluster.name,
        node_groups = node_groups.len(),
        access_entries = planned_entries.len(),
        roles = roles.len(),
        "Composition plan ready"
    );

    Ok(CompositionPlan {
        cluster,
        roles,
        node_groups,
        access_entries: planned_entries,
    })
}

fn node_role(ng: &NodeGroupConfig) -> Option<IamRoleRef> {
    match (&ng.node_role, &ng.node_role_arn) {
        (Some(spec), None) => Some(IamRoleRef::Owned(spec.clone())),
        (None, Some(arn)) => Some(IamRoleRef::Arn(arn.clone())),
        _ => None,
    }
}

/// Plan and execute a composition.
///
/// Configuration errors are returned before any remote call. Once planning
/// succeeds the result is always a [`ProvisionResult`], possibly partial.
pub async fn compose<P: ResourceProvider + ?Sized>(
    provider: &P,
    cluster: &ClusterConfig,
    node_groups: &[NodeGroupConfig],
    access_entries: &[AccessEntryConfig],
) -> Result<ProvisionResult, ValidationErrors> {
    let plan = plan(cluster, node_groups, access_entries)?;
    Ok(execute(provider, &plan).await)
}

enum Outcome {
    Created(CreatedResource),
    Failed(FailedResource),
    Skipped(SkippedResource),
}

type RoleOutcome = Result<CreatedResource, FailedResource>;
type RoleFuture<'a> = Shared<BoxFuture<'a, RoleOutcome>>;

/// Where a dependent gets its role ARN from.
enum RoleArn {
    Known(String),
    /// The role failed; dependents are skipped.
    Blocked(String),
    /// The role was created without reporting an ARN.
    Missing(ProviderError),
}

async fn create_resource<P: ResourceProvider + ?Sized>(
    provider: &P,
    kind: ResourceKind,
    name: String,
    properties: Value,
    options: ResourceOptions,
) -> Result<CreatedResource, FailedResource> {
    debug!(kind = %kind, name = %name, "Requesting create");
    match provider.create(kind, &name, properties, &options).await {
        Ok(created) => {
            debug!(kind = %kind, name = %name, id = %created.id, "Created");
            Ok(CreatedResource {
                kind,
                name,
                id: created.id,
                outputs: created.outputs,
            })
        },
        Err(e) => {
            warn!(kind = %kind, name = %name, error = %e, "Create failed");
            Err(FailedResource {
                kind,
                name,
                error: Arc::new(e),
            })
        },
    }
}

fn output_str(resource: &CreatedResource, key: &str) -> Option<String> {
    resource
        .outputs
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

async fn role_arn(role: &IamRoleRef, roles: &BTreeMap<String, RoleFuture<'_>>) -> RoleArn {
    let spec = match role {
        IamRoleRef::Arn(arn) => return RoleArn::Known(arn.clone()),
        IamRoleRef::Owned(spec) => spec,
    };
    let Some(future) = roles.get(&spec.name) else {
        return RoleArn::Blocked(spec.name.clone());
    };
    match future.clone().await {
        Ok(created) => match output_str(&created, "arn") {
            Some(arn) => RoleArn::Known(arn),
            None => RoleArn::Missing(ProviderError::MissingOutput {
                resource: created.name,
                output: "arn".to_string(),
            }),
        },
        Err(failed) => RoleArn::Blocked(failed.name),
    }
}

fn skipped(kind: ResourceKind, name: String, blocked_by: &str) -> Outcome {
    Outcome::Skipped(SkippedResource {
        kind,
        name,
        blocked_by: blocked_by.to_string(),
    })
}

fn failed(kind: ResourceKind, name: String, error: ProviderError) -> Outcome {
    Outcome::Failed(FailedResource {
        kind,
        name,
        error: Arc::new(error),
    })
}

fn cluster_properties(cluster: &ClusterConfig) -> Value {
    json!({
        "name": cluster.name,
        "role_arn": cluster.service_role_arn,
        "version": cluster.version,
        "vpc_config": {
            "subnet_ids": cluster.all_subnet_ids(),
            "endpoint_public_access": cluster.endpoint_public_access,
            "endpoint_private_access": cluster.endpoint_private_access,
        },
        "access_config": cluster.authentication_mode.map(|mode| json!({
            "authentication_mode": mode.as_str(),
        })),
        "tags": cluster.tags,
    })
}

fn role_properties(spec: &IamRoleSpec) -> Value {
    json!({
        "name": spec.name,
        "assume_role_policy": spec.assume_role_policy(),
        "managed_policy_arns": spec.managed_policy_arns,
        "tags": spec.tags,
    })
}

fn addon_properties(cluster_name: &str, addon: &AddonConfig) -> Value {
    json!({
        "cluster_name": cluster_name,
        "addon_name": addon.name,
        "addon_version": addon.version,
        "resolve_conflicts_on_create": addon.resolve_conflicts_on_create,
        "resolve_conflicts_on_update": addon.resolve_conflicts_on_update,
        "configuration_values": addon.configuration_values.as_ref().map(Value::to_string),
        "tags": addon.tags,
    })
}

fn node_group_properties(
    cluster_name: &str,
    ng: &ResolvedNodeGroup,
    node_role_arn: &str,
    instance_profile_name: Option<&str>,
) -> Value {
    json!({
        "cluster_name": cluster_name,
        "node_group_name": ng.name,
        "node_role_arn": node_role_arn,
        "instance_profile_name": instance_profile_name,
        "subnet_ids": ng.subnet_ids,
        "scaling_config": {
            "desired_size": ng.scaling.desired_size,
            "min_size": ng.scaling.min_size,
            "max_size": ng.scaling.max_size,
        },
        "instance_types": ng.instance_types,
        "disk_size": ng.disk_size,
        "ami_type": ng.ami_type,
        "ami_id": ng.ami_id,
        "operating_system": ng.operating_system,
        "labels": ng.labels,
        "taints": ng.taints,
        "launch_template": ng.launch_template,
        "version": ng.version,
        "capacity_type": ng.capacity_type,
        "tags": ng.tags,
    })
}

fn access_entry_properties(cluster_name: &str, entry: &AccessEntryConfig, principal_arn: &str) -> Value {
    json!({
        "cluster_name": cluster_name,
        "principal_arn": principal_arn,
        "type": entry.entry_type.as_str(),
        "kubernetes_groups": (!entry.kubernetes_groups.is_empty()).then_some(&entry.kubernetes_groups),
        "user_name": entry.username,
        "tags": entry.tags,
    })
}

fn policy_association_properties(
    cluster_name: &str,
    principal_arn: &str,
    association: &AccessPolicyAssociation,
) -> Value {
    json!({
        "cluster_name": cluster_name,
        "principal_arn": principal_arn,
        "policy_arn": association.policy_arn,
        "access_scope": association.access_scope,
    })
}

fn aws_auth_properties(data: &AwsAuthData) -> Value {
    json!({
        "metadata": {
            "name": AWS_AUTH_NAME,
            "namespace": AWS_AUTH_NAMESPACE,
        },
        "data": {
            "map_roles": data.map_roles,
            "map_users": data.map_users,
        },
    })
}

async fn create_node_group<P: ResourceProvider + ?Sized>(
    provider: &P,
    plan: &CompositionPlan,
    cluster_name: &str,
    ng: &ResolvedNodeGroup,
    roles: &BTreeMap<String, RoleFuture<'_>>,
) -> Vec<Outcome> {
    let mut outcomes = Vec::new();
    let kind = match ng.kind {
        NodeGroupKind::Managed => ResourceKind::ManagedNodeGroup,
        NodeGroupKind::SelfManaged => ResourceKind::SelfManagedNodeGroup,
    };
    let profile_name = (ng.kind == NodeGroupKind::SelfManaged)
        .then(|| CompositionPlan::instance_profile_name(ng));

    let node_role_arn = match role_arn(&ng.role, roles).await {
        RoleArn::Known(arn) => arn,
        RoleArn::Blocked(role) => {
            if let Some(profile) = profile_name {
                outcomes.push(skipped(ResourceKind::InstanceProfile, profile, &role));
            }
            outcomes.push(skipped(kind, ng.name.clone(), &role));
            return outcomes;
        },
        RoleArn::Missing(error) => {
            outcomes.push(failed(kind, ng.name.clone(), error));
            return outcomes;
        },
    };

    let mut options = ResourceOptions::default().with_parent(plan.cluster.name.clone());
    if let IamRoleRef::Owned(spec) = &ng.role {
        options = options.depends_on(spec.name.clone());
    }

    let mut instance_profile = None;
    if let Some(profile) = profile_name {
        let role_name = ng.role.role_name().unwrap_or_default();
        let properties = json!({ "name": profile, "role": role_name });
        match create_resource(
            provider,
            ResourceKind::InstanceProfile,
            profile.clone(),
            properties,
            options.clone(),
        )
        .await
        {
            Ok(created) => {
                instance_profile = Some(output_str(&created, "name").unwrap_or(profile.clone()));
                outcomes.push(Outcome::Created(created));
                options = options.depends_on(profile);
            },
            Err(failure) => {
                outcomes.push(Outcome::Failed(failure));
                outcomes.push(skipped(kind, ng.name.clone(), &profile));
                return outcomes;
            },
        }
    }

    let properties =
        node_group_properties(cluster_name, ng, &node_role_arn, instance_profile.as_deref());
    outcomes.push(
        match create_resource(provider, kind, ng.name.clone(), properties, options).await {
            Ok(created) => Outcome::Created(created),
            Err(failure) => Outcome::Failed(failure),
        },
    );
    outcomes
}

async fn create_access_entry<P: ResourceProvider + ?Sized>(
    provider: &P,
    plan: &CompositionPlan,
    cluster_name: &str,
    entry: &PlannedAccessEntry,
    roles: &BTreeMap<String, RoleFuture<'_>>,
) -> Vec<Outcome> {
    let config = &entry.config;
    let entry_name = plan.access_entry_name(config);
    let policy_names: Vec<(String, &AccessPolicyAssociation)> = config
        .access_policies
        .iter()
        .map(|(name, association)| (plan.policy_association_name(config, name), association))
        .collect();
    let skip_policies = |outcomes: &mut Vec<Outcome>, blocked_by: &str| {
        for (name, _) in &policy_names {
            outcomes.push(skipped(
                ResourceKind::AccessPolicyAssociation,
                name.clone(),
                blocked_by,
            ));
        }
    };

    let mut outcomes = Vec::new();
    let principal_arn = match role_arn(&entry.principal, roles).await {
        RoleArn::Known(arn) => arn,
        RoleArn::Blocked(role) => {
            outcomes.push(skipped(ResourceKind::AccessEntry, entry_name, &role));
            skip_policies(&mut outcomes, &role);
            return outcomes;
        },
        RoleArn::Missing(error) => {
            outcomes.push(failed(ResourceKind::AccessEntry, entry_name.clone(), error));
            skip_policies(&mut outcomes, &entry_name);
            return outcomes;
        },
    };

    let mut options = ResourceOptions::default().with_parent(plan.cluster.name.clone());
    if let IamRoleRef::Owned(spec) = &entry.principal {
        options = options.depends_on(spec.name.clone());
    }
    let properties = access_entry_properties(cluster_name, config, &principal_arn);
    match create_resource(
        provider,
        ResourceKind::AccessEntry,
        entry_name.clone(),
        properties,
        options,
    )
    .await
    {
        Ok(created) => outcomes.push(Outcome::Created(created)),
        Err(failure) => {
            outcomes.push(Outcome::Failed(failure));
            skip_policies(&mut outcomes, &entry_name);
            return outcomes;
        },
    }

    let associations = policy_names.iter().map(|(name, association)| {
        let options = ResourceOptions::default()
            .with_parent(plan.cluster.name.clone())
            .depends_on(entry_name.clone());
        create_resource(
            provider,
            ResourceKind::AccessPolicyAssociation,
            name.clone(),
            policy_association_properties(cluster_name, &principal_arn, association),
            options,
        )
    });
    for result in join_all(associations).await {
        outcomes.push(match result {
            Ok(created) => Outcome::Created(created),
            Err(failure) => Outcome::Failed(failure),
        });
    }
    outcomes
}

/// Write the `aws-auth` ConfigMap once every mapped node role has an ARN.
async fn create_aws_auth<P: ResourceProvider + ?Sized>(
    provider: &P,
    plan: &CompositionPlan,
    roles: &BTreeMap<String, RoleFuture<'_>>,
) -> Outcome {
    let name = plan.node_access_name();
    let mut options = ResourceOptions::default().with_parent(plan.cluster.name.clone());
    let mut role_mappings = plan.cluster.role_mappings.clone();

    for role in plan.node_roles() {
        match role_arn(role, roles).await {
            RoleArn::Known(arn) => role_mappings.push(RoleMapping::node(arn)),
            RoleArn::Blocked(role) => return skipped(ResourceKind::ConfigMap, name, &role),
            RoleArn::Missing(error) => return failed(ResourceKind::ConfigMap, name, error),
        }
        if let IamRoleRef::Owned(spec) = role {
            options = options.depends_on(spec.name.clone());
        }
    }

    let data = match AwsAuthData::new(&role_mappings, &plan.cluster.user_mappings) {
        Ok(data) => data,
        Err(e) => return failed(ResourceKind::ConfigMap, name, e.into()),
    };
    match create_resource(
        provider,
        ResourceKind::ConfigMap,
        name,
        aws_auth_properties(&data),
        options,
    )
    .await
    {
        Ok(created) => Outcome::Created(created),
        Err(failure) => Outcome::Failed(failure),
    }
}

/// Issue the create requests of a plan.
///
/// The cluster is created first. If it fails every other resource is skipped.
#[instrument(skip_all, fields(cluster = %plan.cluster.name))]
pub async fn execute<P: ResourceProvider + ?Sized>(provider: &P, plan: &CompositionPlan) -> ProvisionResult {
    let mut result = ProvisionResult::default();

    let cluster = match create_resource(
        provider,
        ResourceKind::Cluster,
        plan.cluster.name.clone(),
        cluster_properties(&plan.cluster),
        ResourceOptions::default(),
    )
    .await
    {
        Ok(created) => created,
        Err(failure) => {
            warn!(error = %failure.error, "Cluster creation failed; skipping dependents");
            for resource in plan.resources().into_iter().skip(1) {
                result.skipped.push(SkippedResource {
                    kind: resource.kind,
                    name: resource.name,
                    blocked_by: plan.cluster.name.clone(),
                });
            }
            result.failed.push(failure);
            return result;
        },
    };

    let cluster_name = output_str(&cluster, "name").unwrap_or_else(|| plan.cluster.name.clone());
    info!(cluster_name = %cluster_name, id = %cluster.id, "Cluster created");

    result.vpc_id = plan.cluster.vpc_id.clone().or_else(|| {
        cluster
            .outputs
            .pointer("/vpc_config/vpc_id")
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    let endpoint = output_str(&cluster, "endpoint");
    let certificate_authority = cluster
        .outputs
        .pointer("/certificate_authority/data")
        .and_then(Value::as_str);
    result.kubeconfig = match (endpoint, certificate_authority) {
        (Some(endpoint), Some(ca)) => Some(Kubeconfig::new(
            &cluster_name,
            &endpoint,
            ca,
            &KubeconfigAuth::Exec(plan.cluster.kubeconfig.clone()),
        )),
        _ => {
            warn!("Cluster did not report endpoint and certificate authority; no kubeconfig");
            None
        },
    };
    result.cluster_name = Some(cluster_name.clone());
    result.succeeded.push(cluster);

    let roles: BTreeMap<String, RoleFuture<'_>> = plan
        .roles
        .iter()
        .map(|spec| {
            let options = ResourceOptions::default().with_parent(plan.cluster.name.clone());
            let future = create_resource(
                provider,
                ResourceKind::IamRole,
                spec.name.clone(),
                role_properties(spec),
                options,
            )
            .boxed()
            .shared();
            (spec.name.clone(), future)
        })
        .collect();

    let cluster_name = cluster_name.as_str();
    let addons = plan.cluster.addons.iter().map(|addon| {
        let options = ResourceOptions::default().with_parent(plan.cluster.name.clone());
        create_resource(
            provider,
            ResourceKind::Addon,
            plan.addon_name(addon),
            addon_properties(cluster_name, addon),
            options,
        )
    });
    let node_groups = plan
        .node_groups
        .iter()
        .map(|ng| create_node_group(provider, plan, cluster_name, ng, &roles));
    let access_entries = plan
        .access_entries
        .iter()
        .map(|entry| create_access_entry(provider, plan, cluster_name, entry, &roles));

    let aws_auth = async {
        if plan.manages_aws_auth() {
            Some(create_aws_auth(provider, plan, &roles).await)
        } else {
            None
        }
    };

    let (role_results, addon_results, node_group_outcomes, access_entry_outcomes, aws_auth_outcome) =
        futures::join!(
            join_all(roles.values().cloned()),
            join_all(addons),
            join_all(node_groups),
            join_all(access_entries),
            aws_auth,
        );

    let outcomes = role_results
        .into_iter()
        .chain(addon_results)
        .map(|r| match r {
            Ok(created) => Outcome::Created(created),
            Err(failure) => Outcome::Failed(failure),
        })
        .chain(node_group_outcomes.into_iter().flatten())
        .chain(access_entry_outcomes.into_iter().flatten())
        .chain(aws_auth_outcome);
    for outcome in outcomes {
        match outcome {
            Outcome::Created(created) => result.succeeded.push(created),
            Outcome::Failed(failure) => result.failed.push(failure),
            Outcome::Skipped(skip) => result.skipped.push(skip),
        }
    }

    if result.is_complete() {
        info!(created = result.succeeded.len(), "Composition complete");
    } else {
        warn!(
            created = result.succeeded.len(),
            failed = result.failed.len(),
            skipped = result.skipped.len(),
            "Composition finished with failures"
        );
    }
    result
}
