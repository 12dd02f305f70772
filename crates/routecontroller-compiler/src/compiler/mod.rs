//! Route compiler facade
//!
//! Runs the [`TrafficRuleBuilder`] and [`EndpointBuilder`] over one snapshot
//! of routes and bundles what they produce.
//!
//! # Ordering
//!
//! Routes are first sorted by namespace and name. The builders only look at
//! input order for tie-breaks and error attribution, so sorting up front makes
//! the output a function of the route set alone: two controller passes over the
//! same routes, listed in any order, produce identical resources.
//!
//! # Usage
//!
//! ```text
//! let compiler = RouteCompiler::new(["istio-ingress/cf-gateway"]);
//! let output = compiler.compile(&routes);
//! // output.virtual_services, output.services
//! ```

use tracing::{debug, info};

use routecontroller_common::crd::Route;

use crate::service::{EndpointBuilder, GeneratedServices, Service, SkippedDestination};
use crate::virtual_service::{
    GeneratedVirtualServices, SkippedFqdn, TrafficRuleBuilder, VirtualService,
};

/// Combined output from compiling a set of routes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompiledRoutes {
    /// One VirtualService per valid FQDN, ascending by FQDN
    pub virtual_services: Vec<VirtualService>,
    /// One Service per destination with a port
    pub services: Vec<Service>,
    /// FQDNs dropped by validation
    pub skipped_fqdns: Vec<SkippedFqdn>,
    /// Destinations dropped by validation
    pub skipped_destinations: Vec<SkippedDestination>,
}

impl CompiledRoutes {
    /// Create empty output
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if no resources were generated
    pub fn is_empty(&self) -> bool {
        self.virtual_services.is_empty() && self.services.is_empty()
    }

    /// Total number of generated resources
    pub fn resource_count(&self) -> usize {
        self.virtual_services.len() + self.services.len()
    }

    /// Whether any FQDN or destination was dropped
    pub fn has_skipped(&self) -> bool {
        !self.skipped_fqdns.is_empty() || !self.skipped_destinations.is_empty()
    }
}

/// Compiles routes into VirtualServices and Services
#[derive(Clone, Debug, Default)]
pub struct RouteCompiler {
    traffic_rules: TrafficRuleBuilder,
    endpoints: EndpointBuilder,
}

impl RouteCompiler {
    /// Create a compiler exposing external FQDNs through `istio_gateways`
    pub fn new<I, S>(istio_gateways: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            traffic_rules: TrafficRuleBuilder::new(istio_gateways),
            endpoints: EndpointBuilder::new(),
        }
    }

    /// Gateways used for external FQDNs
    pub fn istio_gateways(&self) -> &[String] {
        self.traffic_rules.istio_gateways()
    }

    /// Compile a snapshot of routes
    pub fn compile(&self, routes: &[Route]) -> CompiledRoutes {
        let mut ordered: Vec<&Route> = routes.iter().collect();
        ordered.sort_by(|a, b| {
            (a.namespace_or_default(), a.metadata.name.as_deref())
                .cmp(&(b.namespace_or_default(), b.metadata.name.as_deref()))
        });

        let GeneratedVirtualServices {
            virtual_services,
            skipped: skipped_fqdns,
        } = self.traffic_rules.build(ordered.iter().copied());
        let GeneratedServices {
            services,
            skipped: skipped_destinations,
        } = self.endpoints.build(ordered.iter().copied());

        let output = CompiledRoutes {
            virtual_services,
            services,
            skipped_fqdns,
            skipped_destinations,
        };

        debug!(
            skipped_fqdns = output.skipped_fqdns.len(),
            skipped_destinations = output.skipped_destinations.len(),
            "route compilation finished"
        );
        info!(
            routes = routes.len(),
            virtual_services = output.virtual_services.len(),
            services = output.services.len(),
            "compiled routes"
        );

        output
    }
}
