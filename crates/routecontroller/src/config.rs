//! Controller configuration
//!
//! Flags are parsed with clap and can also be set from the environment, which
//! is how the Deployment manifest configures the controller.

use std::time::Duration;

use clap::Args;
use thiserror::Error;

/// Resync interval used when none is configured
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 60;

/// Invalid controller configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No gateway to expose external routes through
    #[error("at least one istio gateway must be configured (--istio-gateways / ISTIO_GATEWAYS)")]
    NoGateways,

    /// A gateway entry is blank
    #[error("istio gateway at position {0} is empty")]
    EmptyGateway(usize),

    /// Resync interval of zero
    #[error("resync interval must be greater than zero")]
    ZeroResyncInterval,
}

/// Command line arguments shared by the controller and offline compilation
///
/// Global, so they parse on either side of the subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct RouteArgs {
    /// Istio gateways for external routes, comma-separated, in order
    #[arg(long, global = true, env = "ISTIO_GATEWAYS", value_delimiter = ',')]
    pub istio_gateways: Vec<String>,

    /// Seconds between full resync passes
    #[arg(
        long,
        global = true,
        env = "RESYNC_INTERVAL_SECS",
        default_value_t = DEFAULT_RESYNC_INTERVAL_SECS
    )]
    pub resync_interval_secs: u64,
}

/// Validated controller configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Gateways for external routes, in configured order
    pub istio_gateways: Vec<String>,
    /// Interval between full resync passes
    pub resync_interval: Duration,
}

impl TryFrom<RouteArgs> for ControllerConfig {
    type Error = ConfigError;

    fn try_from(args: RouteArgs) -> Result<Self, Self::Error> {
        let istio_gateways: Vec<String> = args
            .istio_gateways
            .into_iter()
            .map(|g| g.trim().to_string())
            .collect();

        if istio_gateways.is_empty() {
            return Err(ConfigError::NoGateways);
        }
        if let Some(position) = istio_gateways.iter().position(String::is_empty) {
            return Err(ConfigError::EmptyGateway(position));
        }
        if args.resync_interval_secs == 0 {
            return Err(ConfigError::ZeroResyncInterval);
        }

        Ok(Self {
            istio_gateways,
            resync_interval: Duration::from_secs(args.resync_interval_secs),
        })
    }
}
