//! Errors reported while compiling routes
//!
//! Every variant is local to a single FQDN or destination. The builders log
//! and collect them, then carry on with the rest of the batch.

/// Reason a VirtualService or Service could not be generated
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// Routes sharing an FQDN disagree on whether the domain is internal
    #[error(
        "route {route} and route {other_route} disagree on whether or not the domain is internal"
    )]
    DomainMismatch {
        /// FQDN the routes share
        fqdn: String,
        /// First route of the FQDN
        route: String,
        /// Route that disagrees with it
        other_route: String,
    },

    /// Routes sharing an FQDN live in different namespaces
    #[error(
        "route {route} in namespace {namespace} and route {other_route} in namespace {other_namespace} share an fqdn"
    )]
    NamespaceMismatch {
        /// FQDN the routes share
        fqdn: String,
        /// First route of the FQDN
        route: String,
        /// Its namespace
        namespace: String,
        /// Route in a different namespace
        other_route: String,
        /// That route's namespace
        other_namespace: String,
    },

    /// A route mixes weighted and unweighted destinations
    #[error("invalid destinations for route {route}: weights must be set on all or none")]
    WeightPresenceMismatch {
        /// Offending route
        route: String,
    },

    /// A route's explicit weights do not add up to 100
    #[error("invalid destinations for route {route}: weights must sum up to 100, got {sum}")]
    WeightSumInvalid {
        /// Offending route
        route: String,
        /// Sum of the declared weights
        sum: u32,
    },

    /// A destination has no port
    #[error("invalid destination {destination} for route {route}: port is required")]
    MissingPort {
        /// Route owning the destination
        route: String,
        /// Destination guid
        destination: String,
    },

    /// A destination's port is not a usable Service port
    #[error("invalid destination {destination} for route {route}: port {port} is out of range 1-65535")]
    InvalidPort {
        /// Route owning the destination
        route: String,
        /// Destination guid
        destination: String,
        /// Declared port
        port: u16,
    },
}

impl CompileError {
    /// Route the error is reported against
    pub fn route(&self) -> &str {
        match self {
            Self::DomainMismatch { route, .. }
            | Self::NamespaceMismatch { route, .. }
            | Self::WeightPresenceMismatch { route }
            | Self::WeightSumInvalid { route, .. }
            | Self::MissingPort { route, .. }
            | Self::InvalidPort { route, .. } => route,
        }
    }

    /// FQDN the error is reported against, for errors that span routes
    pub fn fqdn(&self) -> Option<&str> {
        match self {
            Self::DomainMismatch { fqdn, .. } | Self::NamespaceMismatch { fqdn, .. } => {
                Some(fqdn.as_str())
            }
            _ => None,
        }
    }
}

impl From<CompileError> for routecontroller_common::Error {
    fn from(err: CompileError) -> Self {
        routecontroller_common::Error::validation_for(err.route().to_string(), err.to_string())
    }
}
