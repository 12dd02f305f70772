//! Custom Resource Definitions read by the route controller

mod route;

pub use route::{
    AppProcess, DestinationApp, DestinationSelector, Route, RouteCondition, RouteDestination,
    RouteDomain, RouteSpec, RouteStatus,
};
