//! Destination weight validation and inference
//!
//! Istio splits traffic by percentage, so the weights of one HTTP route must
//! add up to exactly 100. A route either declares a weight on every
//! destination or on none of them; in the latter case the split is even.

use routecontroller_common::crd::RouteDestination;
use routecontroller_common::mesh::EXPECTED_WEIGHT_TOTAL;

use crate::error::CompileError;

/// Weights for a route's destinations, in destination order.
///
/// Declared weights are returned verbatim once validated; undeclared weights
/// are inferred with [`infer_weights`].
pub fn resolve_weights(
    route: &str,
    destinations: &[RouteDestination],
) -> Result<Vec<u32>, CompileError> {
    let declared: Vec<u32> = destinations.iter().filter_map(|d| d.weight).collect();

    if declared.is_empty() {
        return Ok(infer_weights(destinations.len()));
    }

    if declared.len() != destinations.len() {
        return Err(CompileError::WeightPresenceMismatch {
            route: route.to_string(),
        });
    }

    let sum = declared.iter().fold(0u32, |acc, w| acc.saturating_add(*w));
    if sum != EXPECTED_WEIGHT_TOTAL {
        return Err(CompileError::WeightSumInvalid {
            route: route.to_string(),
            sum,
        });
    }

    Ok(declared)
}

/// Split 100 evenly across `count` destinations.
///
/// Every destination gets `100 / count`; the remainder of the integer
/// division goes to the first destination so the total is always 100.
pub fn infer_weights(count: usize) -> Vec<u32> {
    if count == 0 {
        return Vec::new();
    }

    let n = u32::try_from(count).unwrap_or(u32::MAX);
    let base = EXPECTED_WEIGHT_TOTAL / n;
    let remainder = EXPECTED_WEIGHT_TOTAL - n * base;

    let mut weights = vec![base; count];
    weights[0] += remainder;
    weights
}
