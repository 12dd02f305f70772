//! Kubernetes Service generation
//!
//! Every route destination gets its own Service named after the destination
//! guid. The Service selects the destination's pods and exposes its port
//! under the `http` name, which is what the VirtualService backends refer to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use routecontroller_common::crd::{Route, RouteDestination};
use routecontroller_common::kube_utils::{HasApiResource, ObjectMeta};
use routecontroller_common::mesh::HTTP_PORT_NAME;
use routecontroller_common::{
    ANNOTATION_ROUTE_FQDN, LABEL_APP_GUID, LABEL_PROCESS_TYPE, LABEL_ROUTE_GUID,
};

use crate::error::CompileError;
use crate::naming::service_name;

/// Kubernetes v1 Service
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// API version (v1)
    #[serde(default = "Service::default_api_version")]
    pub api_version: String,
    /// Resource kind (Service)
    #[serde(default = "Service::default_kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: ServiceSpec,
}

impl HasApiResource for Service {
    const API_VERSION: &'static str = "v1";
    const KIND: &'static str = "Service";
}

impl_api_defaults!(Service);

impl Service {
    /// Create a new Service
    pub fn new(metadata: ObjectMeta, spec: ServiceSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
        }
    }
}

/// Service spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Pod selector
    pub selector: BTreeMap<String, String>,
    /// Ports
    pub ports: Vec<ServicePort>,
}

/// Service port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServicePort {
    /// Port name
    pub name: String,
    /// Port number
    pub port: u16,
}

/// A destination whose Service was not generated
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedDestination {
    /// Destination guid
    pub destination: String,
    /// Why it was skipped
    pub error: CompileError,
}

/// Output of [`EndpointBuilder::build`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeneratedServices {
    /// Services in route order, then destination order
    pub services: Vec<Service>,
    /// Destinations without a Service
    pub skipped: Vec<SkippedDestination>,
}

impl GeneratedServices {
    /// Check if nothing was generated or skipped
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.skipped.is_empty()
    }
}

/// Builds one Service per route destination
#[derive(Clone, Copy, Debug, Default)]
pub struct EndpointBuilder;

impl EndpointBuilder {
    /// Create a builder
    pub fn new() -> Self {
        Self
    }

    /// Compile every destination of every route into a Service, preserving
    /// input order
    pub fn build<'a, I>(&self, routes: I) -> GeneratedServices
    where
        I: IntoIterator<Item = &'a Route>,
    {
        let mut output = GeneratedServices::default();

        for route in routes {
            let fqdn = route.fqdn();
            for destination in &route.spec.destinations {
                match compile_service(route, &fqdn, destination) {
                    Ok(service) => {
                        debug!(
                            route = %route.qualified_name(),
                            service = %service.metadata.name,
                            "compiled Service"
                        );
                        output.services.push(service);
                    }
                    Err(err) => {
                        error!(
                            route = %route.qualified_name(),
                            destination = %destination.guid,
                            error = %err,
                            "unable to create Service for destination"
                        );
                        output.skipped.push(SkippedDestination {
                            destination: destination.guid.clone(),
                            error: err,
                        });
                    }
                }
            }
        }

        output
    }
}

fn compile_service(
    route: &Route,
    fqdn: &str,
    destination: &RouteDestination,
) -> Result<Service, CompileError> {
    let port = destination.port.ok_or_else(|| CompileError::MissingPort {
        route: route.guid(),
        destination: destination.guid.clone(),
    })?;
    if port == 0 {
        return Err(CompileError::InvalidPort {
            route: route.guid(),
            destination: destination.guid.clone(),
            port,
        });
    }

    Ok(Service::new(
        ObjectMeta::new(service_name(&destination.guid), route.namespace_or_default())
            .with_label(LABEL_ROUTE_GUID, route.guid())
            .with_label(LABEL_APP_GUID, destination.app.guid.as_str())
            .with_label(LABEL_PROCESS_TYPE, destination.app.process.type_.as_str())
            .with_annotation(ANNOTATION_ROUTE_FQDN, fqdn),
        ServiceSpec {
            selector: destination.selector.match_labels.clone(),
            ports: vec![ServicePort {
                name: HTTP_PORT_NAME.to_string(),
                port,
            }],
        },
    ))
}
