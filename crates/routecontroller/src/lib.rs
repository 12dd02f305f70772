//! Route controller: watches Route intents and keeps the Istio
//! VirtualServices and Kubernetes Services generated from them in sync

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod offline;
pub mod runner;

pub use config::{ConfigError, ControllerConfig, RouteArgs};
pub use controller::{error_policy, reconcile, RouteContext};
