//! Testing utilities for compositions.
//!
//! [`RecordingProvider`] is an in-memory [`ResourceProvider`] that records
//! every request and answers with plausible outputs, so compositions can be
//! exercised without an orchestration engine.
//!
//! # Example
//!
//! ```ignore
//! use eks_component_sdk::testing::{assert_created_before, RecordingProvider};
//! use eks_component_sdk::compose;
//!
//! #[tokio::test]
//! async fn test_node_group_waits_for_role() {
//!     let provider = RecordingProvider::new();
//!     let result = compose(&provider, &cluster, &[node_group], &[]).await.unwrap();
//!
//!     assert!(result.is_complete());
//!     assert_created_before(&provider, "workers-instanceRole", "workers");
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::provider::ResourceProvider;
use crate::types::{ResourceKind, ResourceOptions, ResourceOutputs};
use crate::validation::ValidationError;

/// Account id used in generated ARNs.
pub const TEST_ACCOUNT_ID: &str = "123456789012";
/// Region used in generated ARNs and endpoints.
pub const TEST_REGION: &str = "us-west-2";

/// The provider operation a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `create`
    Create,
    /// `read`
    Read,
    /// `update`
    Update,
    /// `delete`
    Delete,
}

/// One request received by a [`RecordingProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Operation.
    pub operation: Operation,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Logical name for creates, id otherwise.
    pub name: String,
    /// Properties as sent (`news` for updates).
    pub properties: Value,
    /// Options, only set for creates.
    pub options: ResourceOptions,
}

/// An in-memory provider that records requests.
///
/// Every create succeeds unless a failure was registered with
/// [`fail_on`](Self::fail_on). Outputs echo the request properties and add
/// an `arn`. Clusters also report an `endpoint`, a `certificate_authority`
/// and a VPC id.
#[derive(Debug, Default)]
pub struct RecordingProvider {
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<HashMap<(ResourceKind, String), ProviderError>>,
    omitted: Mutex<HashMap<(ResourceKind, String), Vec<String>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingProvider {
    /// A provider on which every request succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first create of `name` with `error`.
    pub fn fail_on(self, kind: ResourceKind, name: impl Into<String>, error: ProviderError) -> Self {
        lock(&self.failures).insert((kind, name.into()), error);
        self
    }

    /// Leave `output` out of the outputs of `name`.
    pub fn omit_output(
        self,
        kind: ResourceKind,
        name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        lock(&self.omitted)
            .entry((kind, name.into()))
            .or_default()
            .push(output.into());
        self
    }

    /// Every call, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Every create call, in arrival order.
    pub fn create_calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation == Operation::Create)
            .cloned()
            .collect()
    }

    /// The create call for a logical name.
    pub fn create_call(&self, name: &str) -> Option<RecordedCall> {
        lock(&self.calls)
            .iter()
            .find(|c| c.operation == Operation::Create && c.name == name)
            .cloned()
    }

    /// Logical names of create calls, in arrival order.
    pub fn created_names(&self) -> Vec<String> {
        self.create_calls().into_iter().map(|c| c.name).collect()
    }

    fn record(
        &self,
        operation: Operation,
        kind: ResourceKind,
        name: &str,
        properties: &Value,
        options: ResourceOptions,
    ) {
        lock(&self.calls).push(RecordedCall {
            operation,
            kind,
            name: name.to_string(),
            properties: properties.clone(),
            options,
        });
    }

    fn outputs(&self, kind: ResourceKind, name: &str, properties: Value) -> Value {
        let mut outputs = match properties {
            Value::Object(map) => map,
            _ => Default::default(),
        };
        let resource_name = outputs
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(name)
            .to_string();

        let arn = match kind {
            ResourceKind::IamRole => {
                format!("arn:aws:iam::{}:role/{}", TEST_ACCOUNT_ID, resource_name)
            },
            ResourceKind::InstanceProfile => format!(
                "arn:aws:iam::{}:instance-profile/{}",
                TEST_ACCOUNT_ID, resource_name
            ),
            ResourceKind::Cluster => {
                outputs.insert(
                    "endpoint".to_string(),
                    json!(format!(
                        "https://{}.gr7.{}.eks.amazonaws.com",
                        resource_name.to_uppercase(),
                        TEST_REGION
                    )),
                );
                outputs.insert(
                    "certificate_authority".to_string(),
                    json!({ "data": "LS0tLS1CRUdJTiBDRVJUSUZJQ0FURS0tLS0t" }),
                );
                let vpc_config = outputs
                    .entry("vpc_config")
                    .or_insert_with(|| json!({}));
                if let Value::Object(vpc_config) = vpc_config {
                    vpc_config.insert("vpc_id".to_string(), json!("vpc-0recorded"));
                }
                format!(
                    "arn:aws:eks:{}:{}:cluster/{}",
                    TEST_REGION, TEST_ACCOUNT_ID, resource_name
                )
            },
            other => format!(
                "arn:aws:eks:{}:{}:{:?}/{}",
                TEST_REGION, TEST_ACCOUNT_ID, other, name
            ),
        };
        outputs.insert("arn".to_string(), json!(arn));

        if let Some(omitted) = lock(&self.omitted).get(&(kind, name.to_string())) {
            for output in omitted {
                outputs.remove(output);
            }
        }
        Value::Object(outputs)
    }
}

#[async_trait::async_trait]
impl ResourceProvider for RecordingProvider {
    async fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        properties: Value,
        options: &ResourceOptions,
    ) -> Result<ResourceOutputs, ProviderError> {
        self.record(Operation::Create, kind, name, &properties, options.clone());
        // Let sibling requests interleave.
        tokio::task::yield_now().await;

        if let Some(error) = lock(&self.failures).remove(&(kind, name.to_string())) {
            return Err(error);
        }
        let outputs = self.outputs(kind, name, properties);
        Ok(ResourceOutputs::new(format!("{}-id", name), outputs))
    }

    async fn read(
        &self,
        kind: ResourceKind,
        id: &str,
        properties: Value,
    ) -> Result<ResourceOutputs, ProviderError> {
        self.record(Operation::Read, kind, id, &properties, ResourceOptions::default());
        Ok(ResourceOutputs::new(id, properties))
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        _olds: Value,
        news: Value,
    ) -> Result<Value, ProviderError> {
        self.record(Operation::Update, kind, id, &news, ResourceOptions::default());
        Ok(news)
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        id: &str,
        properties: Value,
    ) -> Result<(), ProviderError> {
        self.record(Operation::Delete, kind, id, &properties, ResourceOptions::default());
        Ok(())
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that validation produced no errors.
///
/// # Panics
///
/// Panics if `errors` is not empty.
pub fn assert_no_errors(errors: &[ValidationError]) {
    assert!(
        errors.is_empty(),
        "Expected no validation errors, but got {}: {:?}",
        errors.len(),
        errors.iter().map(ToString::to_string).collect::<Vec<_>>()
    );
}

/// Assert that validation produced at least one error.
///
/// # Panics
///
/// Panics if `errors` is empty.
pub fn assert_has_errors(errors: &[ValidationError]) {
    assert!(
        !errors.is_empty(),
        "Expected validation errors, but got none"
    );
}

/// Assert that some error matches `predicate`.
///
/// # Panics
///
/// Panics if no error matches.
pub fn assert_has_error(errors: &[ValidationError], predicate: impl Fn(&ValidationError) -> bool) {
    assert!(
        errors.iter().any(predicate),
        "No validation error matched; got: {:?}",
        errors.iter().map(ToString::to_string).collect::<Vec<_>>()
    );
}

/// Assert that some error message contains `text`.
///
/// # Panics
///
/// Panics if no message contains `text`.
pub fn assert_error_contains(errors: &[ValidationError], text: &str) {
    let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
    assert!(
        messages.iter().any(|m| m.contains(text)),
        "Expected an error containing '{}', but got: {:?}",
        text,
        messages
    );
}

/// Assert that `first` was requested before `second`.
///
/// # Panics
///
/// Panics if either was never requested, or if `second` came first.
pub fn assert_created_before(provider: &RecordingProvider, first: &str, second: &str) {
    let names = provider.created_names();
    let position = |name: &str| {
        names
            .iter()
            .position(|n| n == name)
            .unwrap_or_else(|| panic!("'{}' was never created; created: {:?}", name, names))
    };
    assert!(
        position(first) < position(second),
        "Expected '{}' to be created before '{}', but order was {:?}",
        first,
        second,
        names
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_role() -> ValidationError {
        ValidationError::MissingField {
            resource: "workers".to_string(),
            field: "node_role".to_string(),
        }
    }

    #[tokio::test]
    async fn test_records_creates_in_order() {
        let provider = RecordingProvider::new();
        let options = ResourceOptions::default().with_parent("demo");
        provider
            .create(ResourceKind::Cluster, "demo", json!({ "name": "demo" }), &ResourceOptions::default())
            .await
            .unwrap();
        provider
            .create(ResourceKind::IamRole, "nodes", json!({ "name": "nodes" }), &options)
            .await
            .unwrap();

        assert_eq!(provider.created_names(), vec!["demo", "nodes"]);
        assert_eq!(
            provider.create_call("nodes").unwrap().options.parent.as_deref(),
            Some("demo")
        );
        assert_created_before(&provider, "demo", "nodes");
    }

    #[tokio::test]
    async fn test_generated_outputs() {
        let provider = RecordingProvider::new();
        let role = provider
            .create(ResourceKind::IamRole, "nodes", json!({ "name": "nodes" }), &ResourceOptions::default())
            .await
            .unwrap();
        assert_eq!(role.id, "nodes-id");
        assert_eq!(
            role.get_str("arn"),
            Some("arn:aws:iam::123456789012:role/nodes")
        );

        let cluster = provider
            .create(
                ResourceKind::Cluster,
                "demo",
                json!({ "name": "demo", "vpc_config": { "subnet_ids": ["subnet-a"] } }),
                &ResourceOptions::default(),
            )
            .await
            .unwrap();
        assert!(cluster.get_str("endpoint").unwrap().starts_with("https://DEMO."));
        assert_eq!(cluster.outputs["vpc_config"]["vpc_id"], "vpc-0recorded");
        assert_eq!(cluster.outputs["vpc_config"]["subnet_ids"][0], "subnet-a");
    }

    #[test]
    fn test_failure_is_taken_once() {
        let provider = RecordingProvider::new().fail_on(
            ResourceKind::IamRole,
            "nodes",
            ProviderError::Unavailable("throttled".to_string()),
        );
        let options = ResourceOptions::default();
        let create = || provider.create(ResourceKind::IamRole, "nodes", json!({}), &options);

        let first = tokio_test::block_on(create());
        assert!(matches!(first, Err(ProviderError::Unavailable(_))));

        let second = tokio_test::block_on(create());
        assert!(second.is_ok());
        assert_eq!(provider.create_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_omit_output() {
        let provider = RecordingProvider::new().omit_output(ResourceKind::IamRole, "nodes", "arn");
        let role = provider
            .create(ResourceKind::IamRole, "nodes", json!({ "name": "nodes" }), &ResourceOptions::default())
            .await
            .unwrap();
        assert!(role.get_str("arn").is_none());
        assert_eq!(role.get_str("name"), Some("nodes"));
    }

    #[tokio::test]
    async fn test_other_operations_are_recorded() {
        let provider = RecordingProvider::new();
        provider
            .read(ResourceKind::Addon, "demo-coredns-id", json!({}))
            .await
            .unwrap();
        provider
            .update(ResourceKind::Addon, "demo-coredns-id", json!({}), json!({ "addon_version": "v1.11.1" }))
            .await
            .unwrap();
        provider
            .delete(ResourceKind::Addon, "demo-coredns-id", json!({}))
            .await
            .unwrap();

        let operations: Vec<_> = provider.calls().into_iter().map(|c| c.operation).collect();
        assert_eq!(
            operations,
            vec![Operation::Read, Operation::Update, Operation::Delete]
        );
        assert!(provider.create_calls().is_empty());
    }

    #[test]
    fn test_assert_no_errors() {
        assert_no_errors(&[]);
    }

    #[test]
    #[should_panic(expected = "Expected no validation errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[missing_role()]);
    }

    #[test]
    fn test_assert_has_errors() {
        assert_has_errors(&[missing_role()]);
        assert_has_error(&[missing_role()], |e| {
            matches!(e, ValidationError::MissingField { .. })
        });
    }

    #[test]
    fn test_assert_error_contains() {
        assert_error_contains(&[missing_role()], "workers");
        assert_error_contains(&[missing_role()], "node_role");
    }

    #[test]
    #[should_panic(expected = "to be created before")]
    fn test_assert_created_before_fails() {
        let provider = RecordingProvider::new();
        lock(&provider.calls).extend(["b", "a"].map(|name| RecordedCall {
            operation: Operation::Create,
            kind: ResourceKind::IamRole,
            name: name.to_string(),
            properties: json!({}),
            options: ResourceOptions::default(),
        }));
        assert_created_before(&provider, "a", "b");
    }
}
