//! Istio VirtualService generation
//!
//! One VirtualService is generated per FQDN. Each route sharing the FQDN
//! becomes one HTTP route inside it, ordered so that longer path prefixes
//! are matched first, and each destination becomes a weighted backend that
//! points at the Service generated for it by [`crate::service`].
//!
//! A validation failure drops the VirtualService for the whole FQDN. It is
//! logged and reported in [`GeneratedVirtualServices::skipped`], and the
//! remaining FQDNs are still compiled.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use routecontroller_common::crd::Route;
use routecontroller_common::kube_utils::{HasApiResource, ObjectMeta};
use routecontroller_common::mesh::{
    HEADER_APP_ID, HEADER_ORG_ID, HEADER_PROCESS_TYPE, HEADER_SPACE_ID, MESH_INTERNAL_GATEWAY,
};
use routecontroller_common::ANNOTATION_FQDN;

use crate::error::CompileError;
use crate::index::RouteIndex;
use crate::naming::{service_name, virtual_service_name};
use crate::weights::resolve_weights;

// =============================================================================
// VirtualService Types
// =============================================================================

/// Istio VirtualService resource
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualService {
    /// API version (networking.istio.io/v1alpha3)
    #[serde(default = "VirtualService::default_api_version")]
    pub api_version: String,
    /// Resource kind (VirtualService)
    #[serde(default = "VirtualService::default_kind")]
    pub kind: String,
    /// Resource metadata
    pub metadata: ObjectMeta,
    /// VirtualService spec
    pub spec: VirtualServiceSpec,
}

impl HasApiResource for VirtualService {
    const API_VERSION: &'static str = "networking.istio.io/v1alpha3";
    const KIND: &'static str = "VirtualService";
}

impl_api_defaults!(VirtualService);

impl VirtualService {
    /// Create a new VirtualService
    pub fn new(metadata: ObjectMeta, spec: VirtualServiceSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
        }
    }

    /// FQDN this VirtualService routes
    pub fn fqdn(&self) -> Option<&str> {
        self.metadata
            .annotations
            .get(ANNOTATION_FQDN)
            .map(String::as_str)
    }
}

/// VirtualService spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceSpec {
    /// Hosts this VirtualService applies to (always the single FQDN)
    pub hosts: Vec<String>,
    /// Gateways exposing the hosts
    pub gateways: Vec<String>,
    /// HTTP routes, matched in order
    #[serde(default)]
    pub http: Vec<HttpRoute>,
}

/// One path rule of a VirtualService
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpRoute {
    /// Request matches; empty matches every request
    #[serde(rename = "match", default, skip_serializing_if = "Vec::is_empty")]
    pub match_: Vec<HttpMatchRequest>,
    /// Weighted backends
    pub route: Vec<HttpRouteDestination>,
}

/// Request match
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpMatchRequest {
    /// URI match
    pub uri: StringMatch,
}

/// Prefix match on a string
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StringMatch {
    /// Required prefix
    pub prefix: String,
}

/// Weighted backend of an HTTP route
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpRouteDestination {
    /// Backend Service
    pub destination: Destination,
    /// Header manipulation
    pub headers: Headers,
    /// Traffic percentage
    pub weight: u32,
}

/// Backend host reference
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Destination {
    /// Service name
    pub host: String,
}

/// Header manipulation rules
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Headers {
    /// Operations on request headers
    pub request: HeaderOperations,
}

/// Header operations
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeaderOperations {
    /// Headers to overwrite
    #[serde(default)]
    pub set: BTreeMap<String, String>,
}

// =============================================================================
// Generated Resources
// =============================================================================

/// An FQDN whose VirtualService was dropped
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedFqdn {
    /// The FQDN
    pub fqdn: String,
    /// Why it was dropped
    pub error: CompileError,
}

/// Output of [`TrafficRuleBuilder::build`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeneratedVirtualServices {
    /// VirtualServices in ascending FQDN order
    pub virtual_services: Vec<VirtualService>,
    /// FQDNs that failed validation, in ascending order
    pub skipped: Vec<SkippedFqdn>,
}

impl GeneratedVirtualServices {
    /// Check if nothing was generated or skipped
    pub fn is_empty(&self) -> bool {
        self.virtual_services.is_empty() && self.skipped.is_empty()
    }
}

// =============================================================================
// TrafficRuleBuilder
// =============================================================================

/// Builds one VirtualService per FQDN
#[derive(Clone, Debug, Default)]
pub struct TrafficRuleBuilder {
    istio_gateways: Vec<String>,
}

impl TrafficRuleBuilder {
    /// Create a builder exposing external FQDNs through `istio_gateways`,
    /// in the given order
    pub fn new<I, S>(istio_gateways: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            istio_gateways: istio_gateways.into_iter().map(Into::into).collect(),
        }
    }

    /// Gateways used for external FQDNs
    pub fn istio_gateways(&self) -> &[String] {
        &self.istio_gateways
    }

    /// Compile routes into VirtualServices, one per FQDN with at least one
    /// destination
    pub fn build<'a, I>(&self, routes: I) -> GeneratedVirtualServices
    where
        I: IntoIterator<Item = &'a Route>,
    {
        let index = RouteIndex::group_by_fqdn(routes);
        let mut output = GeneratedVirtualServices::default();

        for fqdn in index.sorted_fqdns() {
            if index.destinations_for(fqdn).next().is_none() {
                debug!(fqdn = %fqdn, "no destinations for fqdn, skipping VirtualService");
                continue;
            }

            let Some((first, rest)) = index.routes_for(fqdn).split_first() else {
                continue;
            };

            match self.compile_fqdn(fqdn, first, rest) {
                Ok(virtual_service) => output.virtual_services.push(virtual_service),
                Err(err) => {
                    error!(
                        fqdn = %fqdn,
                        route = %err.route(),
                        error = %err,
                        "unable to create VirtualService for fqdn"
                    );
                    output.skipped.push(SkippedFqdn {
                        fqdn: fqdn.to_string(),
                        error: err,
                    });
                }
            }
        }

        output
    }

    fn compile_fqdn(
        &self,
        fqdn: &str,
        first: &Route,
        rest: &[&Route],
    ) -> Result<VirtualService, CompileError> {
        validate_routes_for_fqdn(fqdn, first, rest)?;

        let gateways = if first.spec.domain.internal {
            vec![MESH_INTERNAL_GATEWAY.to_string()]
        } else {
            self.istio_gateways.clone()
        };

        let mut ordered = Vec::with_capacity(rest.len() + 1);
        ordered.push(first);
        ordered.extend_from_slice(rest);
        sort_routes(&mut ordered);

        let http = ordered
            .into_iter()
            .filter(|route| route.has_destinations())
            .map(compile_http_route)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(VirtualService::new(
            ObjectMeta::new(virtual_service_name(fqdn), first.namespace_or_default())
                .with_annotation(ANNOTATION_FQDN, fqdn),
            VirtualServiceSpec {
                hosts: vec![fqdn.to_string()],
                gateways,
                http,
            },
        ))
    }
}

/// Check that every route of an FQDN agrees with the first one on domain
/// visibility and namespace.
fn validate_routes_for_fqdn(
    fqdn: &str,
    first: &Route,
    rest: &[&Route],
) -> Result<(), CompileError> {
    for route in rest {
        if route.spec.domain.internal != first.spec.domain.internal {
            return Err(CompileError::DomainMismatch {
                fqdn: fqdn.to_string(),
                route: first.guid(),
                other_route: route.guid(),
            });
        }
    }

    for route in rest {
        if route.namespace_or_default() != first.namespace_or_default() {
            return Err(CompileError::NamespaceMismatch {
                fqdn: fqdn.to_string(),
                route: first.guid(),
                namespace: first.namespace_or_default().to_string(),
                other_route: route.guid(),
                other_namespace: route.namespace_or_default().to_string(),
            });
        }
    }

    Ok(())
}

/// Order routes by URL, descending.
///
/// Istio takes the first matching HTTP route, and for paths sharing a prefix
/// the descending order puts the longer one (`/path0/deeper`) before the
/// shorter (`/path0`). Equal URLs fall back to the route name.
fn sort_routes(routes: &mut [&Route]) {
    routes.sort_by(|a, b| match b.spec.url.cmp(&a.spec.url) {
        Ordering::Equal => a.metadata.name.cmp(&b.metadata.name),
        other => other,
    });
}

fn compile_http_route(route: &Route) -> Result<HttpRoute, CompileError> {
    let guid = route.guid();
    let weights = resolve_weights(&guid, &route.spec.destinations)?;

    let match_ = if route.spec.path.is_empty() {
        vec![]
    } else {
        vec![HttpMatchRequest {
            uri: StringMatch {
                prefix: route.spec.path.clone(),
            },
        }]
    };

    let destinations = route
        .spec
        .destinations
        .iter()
        .zip(weights)
        .map(|(destination, weight)| HttpRouteDestination {
            destination: Destination {
                host: service_name(&destination.guid),
            },
            headers: Headers {
                request: HeaderOperations {
                    set: BTreeMap::from([
                        (HEADER_APP_ID.to_string(), destination.app.guid.clone()),
                        (
                            HEADER_PROCESS_TYPE.to_string(),
                            destination.app.process.type_.clone(),
                        ),
                        (HEADER_SPACE_ID.to_string(), route.space_guid().to_string()),
                        (HEADER_ORG_ID.to_string(), route.org_guid().to_string()),
                    ]),
                },
            },
            weight,
        })
        .collect();

    Ok(HttpRoute {
        match_,
        route: destinations,
    })
}

// =============================================================================
// Tests
// =============================================================================
