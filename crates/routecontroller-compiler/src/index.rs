//! Grouping of routes by FQDN
//!
//! Many routes may share an FQDN (one per path). Istio wants a single
//! VirtualService per host, so routes are grouped before compilation. The
//! FQDNs come back in ascending order so that the generated resources are
//! emitted in the same order on every pass.

use std::collections::BTreeMap;

use routecontroller_common::crd::{Route, RouteDestination};

/// Routes grouped by FQDN, preserving input order within each group
#[derive(Clone, Debug, Default)]
pub struct RouteIndex<'a> {
    by_fqdn: BTreeMap<String, Vec<&'a Route>>,
}

impl<'a> RouteIndex<'a> {
    /// Group routes by their FQDN
    pub fn group_by_fqdn<I>(routes: I) -> Self
    where
        I: IntoIterator<Item = &'a Route>,
    {
        let mut by_fqdn: BTreeMap<String, Vec<&'a Route>> = BTreeMap::new();
        for route in routes {
            by_fqdn.entry(route.fqdn()).or_default().push(route);
        }
        Self { by_fqdn }
    }

    /// FQDNs in ascending lexicographic order
    pub fn sorted_fqdns(&self) -> Vec<&str> {
        self.by_fqdn.keys().map(String::as_str).collect()
    }

    /// Routes sharing an FQDN, in input order
    pub fn routes_for(&self, fqdn: &str) -> &[&'a Route] {
        self.by_fqdn.get(fqdn).map(Vec::as_slice).unwrap_or_default()
    }

    /// All destinations across the routes sharing an FQDN
    pub fn destinations_for(&self, fqdn: &str) -> impl Iterator<Item = &'a RouteDestination> + '_ {
        self.routes_for(fqdn)
            .iter()
            .copied()
            .flat_map(|route| route.spec.destinations.iter())
    }

    /// Number of distinct FQDNs
    pub fn len(&self) -> usize {
        self.by_fqdn.len()
    }

    /// Whether no routes were indexed
    pub fn is_empty(&self) -> bool {
        self.by_fqdn.is_empty()
    }
}
