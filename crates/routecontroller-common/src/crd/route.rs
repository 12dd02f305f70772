//! Route CRD: a routing intent from Cloud Controller
//!
//! A Route maps `host.domain/path` to one or more weighted backend
//! destinations. Routes are written by an upstream authority and are
//! read-only to the route controller.

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{LABEL_ORG_GUID, LABEL_SPACE_GUID};

// =============================================================================
// CRD
// =============================================================================

/// Spec for a Route: desired routing from an FQDN and path to backends
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "networking.cloudfoundry.org",
    version = "v1alpha1",
    kind = "Route",
    plural = "routes",
    shortname = "rt",
    namespaced,
    status = "RouteStatus",
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".spec.url"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Host label prepended to the domain (empty for apex routes)
    #[serde(default)]
    pub host: String,

    /// URL path prefix; empty matches every path
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Composed `host.domain/path` string
    #[serde(default)]
    pub url: String,

    /// Domain the route lives under
    pub domain: RouteDomain,

    /// Backends receiving traffic for this route
    #[serde(default)]
    pub destinations: Vec<RouteDestination>,
}

/// Domain of a route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RouteDomain {
    /// Domain name (e.g. "apps.example.com")
    pub name: String,
    /// Whether the domain is only reachable from inside the mesh
    #[serde(default)]
    pub internal: bool,
}

/// A weighted backend of a route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RouteDestination {
    /// Destination guid, unique across all routes
    pub guid: String,
    /// Traffic percentage; `None` on every destination means "split evenly"
    #[serde(default)]
    pub weight: Option<u32>,
    /// Backend port
    #[serde(default)]
    #[schemars(range(min = 1, max = 65535))]
    pub port: Option<u16>,
    /// Backend app identity
    pub app: DestinationApp,
    /// Label selector for the backend pods
    #[serde(default)]
    pub selector: DestinationSelector,
}

/// App backing a destination
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct DestinationApp {
    /// App guid
    pub guid: String,
    /// Process of the app receiving traffic
    pub process: AppProcess,
}

/// Process of an app
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct AppProcess {
    /// Process type (e.g. "web")
    #[serde(rename = "type")]
    pub type_: String,
}

/// Pod selector for a destination
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DestinationSelector {
    /// Labels the backend pods must carry
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

// =============================================================================
// Status
// =============================================================================

/// Status of a Route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct RouteStatus {
    /// Observed conditions
    #[serde(default)]
    pub conditions: Vec<RouteCondition>,
}

/// A single status condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RouteCondition {
    /// Condition type (e.g. "Ready")
    #[serde(rename = "type")]
    pub type_: String,
    /// Whether the condition holds
    pub status: bool,
}

// =============================================================================
// Accessors
// =============================================================================

impl Route {
    /// Fully-qualified domain name: `host.domain`, or just `domain` when the
    /// host is empty.
    pub fn fqdn(&self) -> String {
        if self.spec.host.is_empty() {
            self.spec.domain.name.clone()
        } else {
            format!("{}.{}", self.spec.host, self.spec.domain.name)
        }
    }

    /// Route guid (the object name)
    pub fn guid(&self) -> String {
        self.name_any()
    }

    /// Namespace of the route, empty if unset
    pub fn namespace_or_default(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// `namespace/name` for log and error context
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace_or_default(), self.name_any())
    }

    /// Space guid from the route's labels, empty if unset
    pub fn space_guid(&self) -> &str {
        self.label(LABEL_SPACE_GUID)
    }

    /// Organization guid from the route's labels, empty if unset
    pub fn org_guid(&self) -> &str {
        self.label(LABEL_ORG_GUID)
    }

    /// Whether the route has any backends
    pub fn has_destinations(&self) -> bool {
        !self.spec.destinations.is_empty()
    }

    fn label(&self, key: &str) -> &str {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
            .unwrap_or_default()
    }
}
