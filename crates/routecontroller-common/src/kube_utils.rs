//! Shared Kubernetes helpers for compiled resources
//!
//! Compiled resources are plain serde structs rather than `k8s-openapi`
//! types so the wire shape stays under our control (the Istio types are not
//! in `k8s-openapi` at all). Each type pins its apiVersion and kind through
//! [`HasApiResource`], and the controller derives the matching
//! [`ApiResource`] from the same constants when applying them.

use std::collections::BTreeMap;

use kube::discovery::ApiResource;
use serde::{Deserialize, Serialize};

// =============================================================================
// ObjectMeta - metadata for all compiled resources
// =============================================================================

/// Kubernetes metadata for compiled resources.
///
/// Unlike `kube::api::ObjectMeta` every field that the route compiler
/// populates is required, so a compiled resource can never be emitted
/// without a name or namespace.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Resource namespace
    pub namespace: String,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Create metadata with no labels or annotations
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// HasApiResource Trait
// =============================================================================

/// Trait for types that have a known API group, version, and kind.
///
/// # Example
/// ```ignore
/// impl HasApiResource for VirtualService {
///     const API_VERSION: &'static str = "networking.istio.io/v1alpha3";
///     const KIND: &'static str = "VirtualService";
/// }
///
/// let ar = VirtualService::api_resource();
/// ```
pub trait HasApiResource {
    /// Full API version (e.g., "networking.istio.io/v1alpha3", "v1")
    const API_VERSION: &'static str;
    /// Resource kind (e.g., "VirtualService")
    const KIND: &'static str;

    /// Build an ApiResource from the type's constants.
    fn api_resource() -> ApiResource {
        build_api_resource(Self::API_VERSION, Self::KIND)
    }
}

/// Build an ApiResource from an apiVersion string and kind.
///
/// Core resources (`v1`) have an empty group.
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Split an apiVersion into (group, version).
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Lowercase plural resource name for a kind.
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    struct FakeVirtualService;

    impl HasApiResource for FakeVirtualService {
        const API_VERSION: &'static str = "networking.istio.io/v1alpha3";
        const KIND: &'static str = "VirtualService";
    }

    #[test]
    fn api_resource_from_constants() {
        let ar = FakeVirtualService::api_resource();
        assert_eq!(ar.group, "networking.istio.io");
        assert_eq!(ar.version, "v1alpha3");
        assert_eq!(ar.kind, "VirtualService");
        assert_eq!(ar.plural, "virtualservices");
        assert_eq!(ar.api_version, "networking.istio.io/v1alpha3");
    }

    #[test]
    fn core_api_version_has_empty_group() {
        let ar = build_api_resource("v1", "Service");
        assert_eq!(ar.group, "");
        assert_eq!(ar.version, "v1");
        assert_eq!(ar.plural, "services");
    }

    #[rstest]
    #[case("Service", "services")]
    #[case("VirtualService", "virtualservices")]
    #[case("Route", "routes")]
    #[case("Policy", "policies")]
    #[case("Gateway", "gateways")]
    fn pluralizes_kinds(#[case] kind: &str, #[case] plural: &str) {
        assert_eq!(pluralize_kind(kind), plural);
    }

    #[test]
    fn metadata_builders_accumulate() {
        let meta = ObjectMeta::new("s-dest", "workload-ns")
            .with_label("a", "1")
            .with_annotation("b", "2");
        assert_eq!(meta.labels.get("a").map(String::as_str), Some("1"));
        assert_eq!(meta.annotations.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn empty_maps_are_not_serialized() {
        let meta = ObjectMeta::new("vs-abc", "ns");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({"name": "vs-abc", "namespace": "ns"}));
    }
}
