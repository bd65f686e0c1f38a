//! Property name translation between Rust-side `snake_case` and wire-side
//! `camelCase`.
//!
//! The table is fixed at compile time. Translation only happens at the wire
//! boundary ([`to_wire`] / [`from_wire`]). Keys inside free-form maps (`tags`,
//! `labels`) belong to the user and are never rewritten. Keys missing from the
//! table pass through unchanged.

use serde_json::{Map, Value};

/// Every known property, as `(snake_case, camelCase)`.
pub const PROPERTY_NAMES: &[(&str, &str)] = &[
    ("access_config", "accessConfig"),
    ("access_scope", "accessScope"),
    ("addon_name", "addonName"),
    ("addon_version", "addonVersion"),
    ("ami_id", "amiId"),
    ("ami_type", "amiType"),
    ("arn", "arn"),
    ("assume_role_policy", "assumeRolePolicy"),
    ("authentication_mode", "authenticationMode"),
    ("capacity_type", "capacityType"),
    ("certificate_authority", "certificateAuthority"),
    ("cluster_name", "clusterName"),
    ("cluster_security_group_id", "clusterSecurityGroupId"),
    ("configuration_values", "configurationValues"),
    ("data", "data"),
    ("desired_size", "desiredSize"),
    ("disk_size", "diskSize"),
    ("effect", "effect"),
    ("endpoint", "endpoint"),
    ("endpoint_private_access", "endpointPrivateAccess"),
    ("endpoint_public_access", "endpointPublicAccess"),
    ("id", "id"),
    ("instance_profile_name", "instanceProfileName"),
    ("instance_types", "instanceTypes"),
    ("key", "key"),
    ("kubernetes_groups", "kubernetesGroups"),
    ("labels", "labels"),
    ("launch_template", "launchTemplate"),
    ("managed_policy_arns", "managedPolicyArns"),
    ("map_roles", "mapRoles"),
    ("map_users", "mapUsers"),
    ("max_size", "maxSize"),
    ("metadata", "metadata"),
    ("min_size", "minSize"),
    ("name", "name"),
    ("namespace", "namespace"),
    ("namespaces", "namespaces"),
    ("node_group_name", "nodeGroupName"),
    ("node_role_arn", "nodeRoleArn"),
    ("operating_system", "operatingSystem"),
    ("platform_version", "platformVersion"),
    ("policy_arn", "policyArn"),
    ("principal_arn", "principalArn"),
    ("resolve_conflicts_on_create", "resolveConflictsOnCreate"),
    ("resolve_conflicts_on_update", "resolveConflictsOnUpdate"),
    ("role", "role"),
    ("role_arn", "roleArn"),
    ("scaling_config", "scalingConfig"),
    ("status", "status"),
    ("subnet_ids", "subnetIds"),
    ("tags", "tags"),
    ("taints", "taints"),
    ("type", "type"),
    ("user_name", "userName"),
    ("value", "value"),
    ("version", "version"),
    ("vpc_config", "vpcConfig"),
    ("vpc_id", "vpcId"),
];

/// Properties whose values are user-keyed maps.
pub(crate) const OPAQUE_MAPS: &[&str] = &["tags", "labels"];

/// Translate a Rust-side property name to its wire name.
pub fn translate_input(name: &str) -> &str {
    PROPERTY_NAMES
        .iter()
        .find(|(snake, _)| *snake == name)
        .map(|(_, camel)| *camel)
        .unwrap_or(name)
}

/// Translate a wire property name to its Rust-side name.
pub fn translate_output(name: &str) -> &str {
    PROPERTY_NAMES
        .iter()
        .find(|(_, camel)| *camel == name)
        .map(|(snake, _)| *snake)
        .unwrap_or(name)
}

/// Convert a Rust-side property bag to wire form.
///
/// Null values are dropped, so unset optional fields are never sent.
pub fn to_wire(value: &Value) -> Value {
    rewrite(value, translate_input, true)
}

/// Convert a wire property bag to Rust-side form.
pub fn from_wire(value: &Value) -> Value {
    rewrite(value, translate_output, false)
}

fn rewrite(value: &Value, translate: fn(&str) -> &str, drop_nulls: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                if drop_nulls && child.is_null() {
                    continue;
                }
                let child = if OPAQUE_MAPS.contains(&translate_output(key)) {
                    child.clone()
                } else {
                    rewrite(child, translate, drop_nulls)
                };
                out.insert(translate(key).to_string(), child);
            }
            Value::Object(out)
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| rewrite(item, translate, drop_nulls))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn camel_case(snake: &str) -> String {
        let mut out = String::with_capacity(snake.len());
        let mut upper = false;
        for c in snake.chars() {
            if c == '_' {
                upper = true;
            } else if upper {
                out.push(c.to_ascii_uppercase());
                upper = false;
            } else {
                out.push(c);
            }
        }
        out
    }

    #[test]
    fn test_table_is_consistent() {
        let mut snakes = HashSet::new();
        let mut camels = HashSet::new();
        for (snake, camel) in PROPERTY_NAMES {
            assert!(snakes.insert(*snake), "duplicate snake_case key {}", snake);
            assert!(camels.insert(*camel), "duplicate camelCase key {}", camel);
            assert!(
                snake.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{} is not snake_case",
                snake
            );
            assert_eq!(camel_case(snake), *camel, "{} maps to {}", snake, camel);
        }
    }

    #[test]
    fn test_translation_is_inverse() {
        for (snake, camel) in PROPERTY_NAMES {
            assert_eq!(translate_input(snake), *camel);
            assert_eq!(translate_output(camel), *snake);
            assert_eq!(translate_input(translate_output(camel)), *camel);
            assert_eq!(translate_output(translate_input(snake)), *snake);
        }
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        assert_eq!(translate_input("some_future_field"), "some_future_field");
        assert_eq!(translate_output("someFutureField"), "someFutureField");
    }

    #[test]
    fn test_to_wire_nested() {
        let props = json!({
            "cluster_name": "demo",
            "scaling_config": { "desired_size": 2, "min_size": 1, "max_size": 2 },
            "taints": [{ "key": "dedicated", "value": null, "effect": "NO_SCHEDULE" }],
            "disk_size": null,
        });
        assert_eq!(
            to_wire(&props),
            json!({
                "clusterName": "demo",
                "scalingConfig": { "desiredSize": 2, "minSize": 1, "maxSize": 2 },
                "taints": [{ "key": "dedicated", "effect": "NO_SCHEDULE" }],
            })
        );
    }

    #[test]
    fn test_opaque_maps_untouched() {
        let props = json!({
            "tags": { "cost_center": "infra", "vpc_id": "keep-me" },
            "labels": { "node_role": "worker" },
        });
        let wire = to_wire(&props);
        assert_eq!(wire, props);

        let back = from_wire(&json!({ "tags": { "clusterName": "x" } }));
        assert_eq!(back, json!({ "tags": { "clusterName": "x" } }));
    }

    #[test]
    fn test_from_wire() {
        let outputs = json!({
            "arn": "arn:aws:eks:us-west-2:123456789012:cluster/demo",
            "certificateAuthority": { "data": "LS0t" },
            "vpcConfig": { "vpcId": "vpc-1", "clusterSecurityGroupId": "sg-1" },
        });
        assert_eq!(
            from_wire(&outputs),
            json!({
                "arn": "arn:aws:eks:us-west-2:123456789012:cluster/demo",
                "certificate_authority": { "data": "LS0t" },
                "vpc_config": { "vpc_id": "vpc-1", "cluster_security_group_id": "sg-1" },
            })
        );
    }
}
