//! Route compiler for the route controller
//!
//! This crate turns a flat, unordered collection of Route CRDs into the
//! resources that make them routable:
//!
//! - **TrafficRuleBuilder**: one Istio VirtualService per FQDN (path matches,
//!   weighted backends, gateway exposure)
//! - **EndpointBuilder**: one Kubernetes Service per route destination
//! - **RouteCompiler**: runs both over a canonically ordered snapshot
//!
//! Compilation is a pure function of its input. It performs no I/O and keeps
//! no state between calls, and its output order depends only on the input set.

/// Default `apiVersion` and `kind` for serde, taken from [`HasApiResource`]
///
/// [`HasApiResource`]: routecontroller_common::kube_utils::HasApiResource
macro_rules! impl_api_defaults {
    ($type:ty) => {
        impl $type {
            fn default_api_version() -> String {
                <Self as HasApiResource>::API_VERSION.to_string()
            }
            fn default_kind() -> String {
                <Self as HasApiResource>::KIND.to_string()
            }
        }
    };
}

pub mod compiler;
pub mod error;
pub mod index;
pub mod naming;
pub mod service;
pub mod virtual_service;
pub mod weights;

pub use compiler::{CompiledRoutes, RouteCompiler};
pub use error::CompileError;
pub use index::RouteIndex;
pub use service::{EndpointBuilder, GeneratedServices, Service, SkippedDestination};
pub use virtual_service::{
    GeneratedVirtualServices, SkippedFqdn, TrafficRuleBuilder, VirtualService,
};

#[cfg(test)]
pub(crate) mod fixtures;
