//! Offline compilation of route manifests
//!
//! Reads Route objects from YAML, either as individual documents or wrapped
//! in a `RouteList`/`List`, and renders the compiled resources as a
//! multi-document YAML stream. Nothing here talks to a cluster.

use serde::Deserialize;
use serde::Serialize;
use serde_yaml::Value;

use routecontroller_common::crd::Route;
use routecontroller_common::Error;
use routecontroller_compiler::CompiledRoutes;

const ROUTE_KIND: &str = "Route";

/// Parse every Route in a YAML stream
///
/// Documents of other kinds are ignored so a whole directory of manifests can
/// be piped in.
pub fn load_routes(yaml: &str) -> Result<Vec<Route>, Error> {
    let mut routes = Vec::new();

    for document in serde_yaml::Deserializer::from_str(yaml) {
        let value = Value::deserialize(document)
            .map_err(|e| Error::serialization_for_kind(ROUTE_KIND, e.to_string()))?;
        collect_routes(value, &mut routes)?;
    }

    Ok(routes)
}

fn collect_routes(value: Value, routes: &mut Vec<Route>) -> Result<(), Error> {
    if let Some(items) = value.get("items").and_then(Value::as_sequence) {
        for item in items {
            collect_routes(item.clone(), routes)?;
        }
        return Ok(());
    }

    if value.get("kind").and_then(Value::as_str) != Some(ROUTE_KIND) {
        return Ok(());
    }

    let route: Route = serde_yaml::from_value(value)
        .map_err(|e| Error::serialization_for_kind(ROUTE_KIND, e.to_string()))?;
    routes.push(route);
    Ok(())
}

/// Render compiled resources as a YAML stream, VirtualServices first
pub fn render(compiled: &CompiledRoutes) -> Result<String, Error> {
    let mut documents = Vec::with_capacity(compiled.resource_count());
    for virtual_service in &compiled.virtual_services {
        documents.push(to_document("VirtualService", virtual_service)?);
    }
    for service in &compiled.services {
        documents.push(to_document("Service", service)?);
    }
    Ok(documents.join("---\n"))
}

fn to_document<T: Serialize>(kind: &str, resource: &T) -> Result<String, Error> {
    serde_yaml::to_string(resource).map_err(|e| Error::serialization_for_kind(kind, e.to_string()))
}
