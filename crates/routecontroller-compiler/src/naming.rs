//! Resource name derivation
//!
//! Names must be stable across runs and valid Kubernetes object names:
//! lowercase alphanumerics and '-', starting with a letter, at most 253
//! characters (63 for Services, which are DNS labels).

use std::fmt::Write;

use aws_lc_rs::digest;

use routecontroller_common::mesh::{SERVICE_NAME_PREFIX, VIRTUAL_SERVICE_NAME_PREFIX};

/// Length of every VirtualService name: prefix plus 64 hex chars.
pub const VIRTUAL_SERVICE_NAME_LEN: usize = VIRTUAL_SERVICE_NAME_PREFIX.len() + 64;

/// VirtualService name for an FQDN: `vs-` followed by the lowercase hex
/// SHA-256 of the FQDN.
///
/// Hashing condenses wildcard, Unicode and arbitrarily long FQDNs into a
/// fixed-length name.
pub fn virtual_service_name(fqdn: &str) -> String {
    let hash = digest::digest(&digest::SHA256, fqdn.as_bytes());
    let mut name = String::with_capacity(VIRTUAL_SERVICE_NAME_LEN);
    name.push_str(VIRTUAL_SERVICE_NAME_PREFIX);
    hash.as_ref().iter().fold(name, |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    })
}

/// Service name for a destination: `s-` followed by the destination guid.
pub fn service_name(destination_guid: &str) -> String {
    format!("{}{}", SERVICE_NAME_PREFIX, destination_guid)
}
