//! Controller runner - builds the futures that make up the controller
//!
//! Construction is kept separate from `main` so the wiring stays pure and the
//! caller decides how to drive the futures.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use routecontroller_common::crd::Route;

use crate::controller::{error_policy, periodic_resync, reconcile, RouteContext};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// A controller future, ready to be driven by the caller
pub type BoxedController = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Build the Route controller and its periodic resync
pub fn build_route_controllers(
    client: Client,
    ctx: Arc<RouteContext>,
) -> Vec<BoxedController> {
    let routes: Api<Route> = Api::all(client);

    tracing::info!(
        gateways = ?ctx.compiler.istio_gateways(),
        resync_interval_secs = ctx.resync_interval.as_secs(),
        "- Route controller"
    );

    let controller: BoxedController = Box::pin(
        Controller::new(routes, WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS))
            .shutdown_on_signal()
            .run(reconcile, error_policy, ctx.clone())
            .for_each(log_reconcile_result("Route")),
    );
    let resync: BoxedController = Box::pin(periodic_resync(ctx));

    vec![controller, resync]
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
