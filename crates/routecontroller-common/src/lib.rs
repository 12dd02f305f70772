//! Common types for the route controller: the Route CRD, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod mesh;
pub mod telemetry;

pub use error::Error;

/// Field manager used for server-side apply of generated resources
pub const FIELD_MANAGER: &str = "routecontroller";

/// Label on a Route carrying the owning Cloud Foundry space guid
pub const LABEL_SPACE_GUID: &str = "cloudfoundry.org/space_guid";

/// Label on a Route carrying the owning Cloud Foundry organization guid
pub const LABEL_ORG_GUID: &str = "cloudfoundry.org/org_guid";

/// Label on a generated Service recording the route it was built for
pub const LABEL_ROUTE_GUID: &str = "cloudfoundry.org/route_guid";

/// Label on a generated Service recording the backend app guid
pub const LABEL_APP_GUID: &str = "cloudfoundry.org/app_guid";

/// Label on a generated Service recording the backend process type
pub const LABEL_PROCESS_TYPE: &str = "cloudfoundry.org/process_type";

/// Annotation on a generated VirtualService recording its FQDN
pub const ANNOTATION_FQDN: &str = "cloudfoundry.org/fqdn";

/// Annotation on a generated Service recording the FQDN of its owning route
pub const ANNOTATION_ROUTE_FQDN: &str = "cloudfoundry.org/route-fqdn";
