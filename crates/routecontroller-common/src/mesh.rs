//! Service mesh constants for Istio traffic routing
//!
//! Single source of truth for the values the route compiler writes into
//! generated VirtualServices and Services.

// =============================================================================
// Gateways and weights
// =============================================================================

/// Reserved Istio gateway name selecting sidecars for east-west traffic.
///
/// See <https://istio.io/docs/reference/config/networking/virtual-service/#VirtualService>
pub const MESH_INTERNAL_GATEWAY: &str = "mesh";

/// Istio destination weights are percentages and must sum to this value.
pub const EXPECTED_WEIGHT_TOTAL: u32 = 100;

// =============================================================================
// Name prefixes
// =============================================================================

/// Prefix for VirtualService names (the rest is a SHA-256 hex digest).
pub const VIRTUAL_SERVICE_NAME_PREFIX: &str = "vs-";

/// Prefix for Service names; destination guids may start with a digit.
pub const SERVICE_NAME_PREFIX: &str = "s-";

/// Name of the single port on every generated Service.
pub const HTTP_PORT_NAME: &str = "http";

// =============================================================================
// Request headers
// =============================================================================

/// Header carrying the backend app guid.
pub const HEADER_APP_ID: &str = "CF-App-Id";

/// Header carrying the backend process type.
pub const HEADER_PROCESS_TYPE: &str = "CF-App-Process-Type";

/// Header carrying the space guid of the route.
pub const HEADER_SPACE_ID: &str = "CF-Space-Id";

/// Header carrying the organization guid of the route.
pub const HEADER_ORG_ID: &str = "CF-Organization-Id";
