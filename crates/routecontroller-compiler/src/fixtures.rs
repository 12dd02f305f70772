//! Route fixtures shared by the unit tests

use std::collections::BTreeMap;

use kube::api::ObjectMeta;
use routecontroller_common::crd::{
    AppProcess, DestinationApp, DestinationSelector, Route, RouteDestination, RouteDomain,
    RouteSpec,
};
use routecontroller_common::{LABEL_APP_GUID, LABEL_ORG_GUID, LABEL_PROCESS_TYPE, LABEL_SPACE_GUID};

pub const NAMESPACE: &str = "workload-namespace";

/// External route in [`NAMESPACE`] with no destinations
pub fn route(name: &str, host: &str, domain: &str, path: &str) -> Route {
    let fqdn = if host.is_empty() {
        domain.to_string()
    } else {
        format!("{host}.{domain}")
    };

    Route {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            labels: Some(BTreeMap::from([
                (LABEL_SPACE_GUID.to_string(), format!("space-{name}")),
                (LABEL_ORG_GUID.to_string(), format!("org-{name}")),
            ])),
            ..Default::default()
        },
        spec: RouteSpec {
            host: host.to_string(),
            path: path.to_string(),
            url: format!("{fqdn}{path}"),
            domain: RouteDomain {
                name: domain.to_string(),
                internal: false,
            },
            destinations: vec![],
        },
        status: None,
    }
}

/// Destination for app `app-<guid>` with process type `web`
pub fn destination(guid: &str, weight: Option<u32>, port: u16) -> RouteDestination {
    let app_guid = format!("app-{guid}");
    RouteDestination {
        guid: guid.to_string(),
        weight,
        port: Some(port),
        app: DestinationApp {
            guid: app_guid.clone(),
            process: AppProcess {
                type_: "web".to_string(),
            },
        },
        selector: DestinationSelector {
            match_labels: BTreeMap::from([
                (LABEL_APP_GUID.to_string(), app_guid),
                (LABEL_PROCESS_TYPE.to_string(), "web".to_string()),
            ]),
        },
    }
}

/// `route` with the given destinations attached
pub fn route_with(
    name: &str,
    host: &str,
    domain: &str,
    path: &str,
    destinations: Vec<RouteDestination>,
) -> Route {
    let mut r = route(name, host, domain, path);
    r.spec.destinations = destinations;
    r
}
