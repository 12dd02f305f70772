//! Route controller implementation
//!
//! Every Route event triggers a full pass instead of an incremental update.
//! A VirtualService aggregates all routes sharing an FQDN, so the only safe
//! unit of work is the whole route set:
//!
//! 1. list all Routes
//! 2. compile them with [`RouteCompiler`]
//! 3. server-side apply every generated resource
//! 4. delete previously generated resources that are no longer desired
//!
//! Passes are serialized through a lock in [`RouteContext`], so concurrent
//! reconciles of different Routes never interleave their applies and deletes.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use k8s_openapi::api::core::v1::Service as K8sService;
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, ListParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use routecontroller_common::crd::Route;
use routecontroller_common::kube_utils::HasApiResource;
use routecontroller_common::{
    Error, ANNOTATION_FQDN, ANNOTATION_ROUTE_FQDN, FIELD_MANAGER, LABEL_ROUTE_GUID,
};
use routecontroller_compiler::naming::service_name;
use routecontroller_compiler::{CompiledRoutes, RouteCompiler, Service, VirtualService};

use crate::config::ControllerConfig;

/// Requeue delay after a retryable failure
pub const RETRY_INTERVAL: Duration = Duration::from_secs(30);

// =============================================================================
// Traits for dependency injection and testability
// =============================================================================

/// A generated resource found in the cluster
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ManagedResource {
    /// Namespace
    pub namespace: String,
    /// Name
    pub name: String,
    /// FQDN recorded in the resource's annotation
    pub fqdn: String,
}

/// Trait abstracting Kubernetes client operations for the route controller
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RouteKubeClient: Send + Sync {
    /// List all Routes across namespaces
    async fn list_routes(&self) -> Result<Vec<Route>, Error>;

    /// Server-side apply a VirtualService
    async fn apply_virtual_service(&self, virtual_service: &VirtualService) -> Result<(), Error>;

    /// Server-side apply a Service
    async fn apply_service(&self, service: &Service) -> Result<(), Error>;

    /// List VirtualServices carrying the FQDN annotation
    async fn list_managed_virtual_services(&self) -> Result<Vec<ManagedResource>, Error>;

    /// List Services carrying the route FQDN annotation
    async fn list_managed_services(&self) -> Result<Vec<ManagedResource>, Error>;

    /// Delete a VirtualService; a missing object is not an error
    async fn delete_virtual_service(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Delete a Service; a missing object is not an error
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct RouteKubeClientImpl {
    client: Client,
}

impl RouteKubeClientImpl {
    /// Create a new RouteKubeClientImpl wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn virtual_services(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = VirtualService::api_resource();
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }
}

fn managed_resource<K: ResourceExt>(object: &K, annotation: &str) -> Option<ManagedResource> {
    let fqdn = object.annotations().get(annotation)?;
    Some(ManagedResource {
        namespace: object.namespace()?,
        name: object.name_any(),
        fqdn: fqdn.clone(),
    })
}

/// Decode listed Route objects one by one, dropping those that do not parse.
///
/// Routes stored before the schema gained its validation rules may still
/// carry values the typed client rejects; one such Route must not hide
/// every other Route from the pass.
pub fn decode_routes(objects: Vec<DynamicObject>) -> Vec<Route> {
    objects
        .into_iter()
        .filter_map(|object| {
            let name = object.name_any();
            let namespace = object.namespace().unwrap_or_default();
            match serde_json::to_value(&object).and_then(serde_json::from_value::<Route>) {
                Ok(route) => Some(route),
                Err(e) => {
                    warn!(
                        route = %format!("{namespace}/{name}"),
                        error = %e,
                        "ignoring route that does not decode"
                    );
                    None
                }
            }
        })
        .collect()
}

fn ignore_not_found(result: Result<(), kube::Error>) -> Result<(), Error> {
    match result {
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        other => other.map_err(Error::from),
    }
}

#[async_trait]
impl RouteKubeClient for RouteKubeClientImpl {
    async fn list_routes(&self) -> Result<Vec<Route>, Error> {
        let api: Api<DynamicObject> =
            Api::all_with(self.client.clone(), &ApiResource::erase::<Route>(&()));
        let list = api.list(&ListParams::default()).await?;
        Ok(decode_routes(list.items))
    }

    async fn apply_virtual_service(&self, virtual_service: &VirtualService) -> Result<(), Error> {
        let json = serde_json::to_value(virtual_service)
            .map_err(|e| Error::serialization_for_kind("VirtualService", e.to_string()))?;
        let api = self.virtual_services(Some(&virtual_service.metadata.namespace));

        api.patch(
            &virtual_service.metadata.name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&json),
        )
        .await?;

        debug!(
            name = %virtual_service.metadata.name,
            namespace = %virtual_service.metadata.namespace,
            "applied VirtualService"
        );
        Ok(())
    }

    async fn apply_service(&self, service: &Service) -> Result<(), Error> {
        let json = serde_json::to_value(service)
            .map_err(|e| Error::serialization_for_kind("Service", e.to_string()))?;
        let api: Api<K8sService> =
            Api::namespaced(self.client.clone(), &service.metadata.namespace);

        api.patch(
            &service.metadata.name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&json),
        )
        .await?;

        debug!(
            name = %service.metadata.name,
            namespace = %service.metadata.namespace,
            "applied Service"
        );
        Ok(())
    }

    async fn list_managed_virtual_services(&self) -> Result<Vec<ManagedResource>, Error> {
        let list = self
            .virtual_services(None)
            .list(&ListParams::default())
            .await?;
        Ok(list
            .items
            .iter()
            .filter_map(|vs| managed_resource(vs, ANNOTATION_FQDN))
            .collect())
    }

    async fn list_managed_services(&self) -> Result<Vec<ManagedResource>, Error> {
        let api: Api<K8sService> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default().labels(LABEL_ROUTE_GUID))
            .await?;
        Ok(list
            .items
            .iter()
            .filter_map(|svc| managed_resource(svc, ANNOTATION_ROUTE_FQDN))
            .collect())
    }

    async fn delete_virtual_service(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let result = self
            .virtual_services(Some(namespace))
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ());
        ignore_not_found(result)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api: Api<K8sService> = Api::namespaced(self.client.clone(), namespace);
        let result = api
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ());
        ignore_not_found(result)
    }
}

// =============================================================================
// Context
// =============================================================================

/// Shared state for route reconciliation
pub struct RouteContext {
    /// Kubernetes client for API operations
    pub kube: Arc<dyn RouteKubeClient>,
    /// Compiler configured with the external gateways
    pub compiler: RouteCompiler,
    /// Delay before the next full pass after a successful one
    pub resync_interval: Duration,
    pass_lock: Mutex<()>,
}

impl RouteContext {
    /// Create a new RouteContext with the given dependencies
    pub fn new(kube: Arc<dyn RouteKubeClient>, config: &ControllerConfig) -> Self {
        Self {
            kube,
            compiler: RouteCompiler::new(config.istio_gateways.iter().cloned()),
            resync_interval: config.resync_interval,
            pass_lock: Mutex::new(()),
        }
    }

    /// Create a new RouteContext from a Kubernetes client
    pub fn from_client(client: Client, config: &ControllerConfig) -> Self {
        Self::new(Arc::new(RouteKubeClientImpl::new(client)), config)
    }

    /// Create a context for testing with mock clients
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn RouteKubeClient>) -> Self {
        Self::new(
            kube,
            &ControllerConfig {
                istio_gateways: vec!["istio-ingress/cf-gateway".to_string()],
                resync_interval: Duration::from_secs(60),
            },
        )
    }
}

// =============================================================================
// Full pass
// =============================================================================

/// Outcome of one full pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Routes listed
    pub routes: usize,
    /// VirtualServices applied
    pub applied_virtual_services: usize,
    /// Services applied
    pub applied_services: usize,
    /// VirtualServices deleted
    pub pruned_virtual_services: usize,
    /// Services deleted
    pub pruned_services: usize,
    /// FQDNs left untouched because they failed validation
    pub skipped_fqdns: usize,
    /// Destinations left untouched because they failed validation
    pub skipped_destinations: usize,
}

/// Generated resources to delete
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrunePlan {
    /// VirtualServices to delete
    pub virtual_services: Vec<ManagedResource>,
    /// Services to delete
    pub services: Vec<ManagedResource>,
}

impl PrunePlan {
    /// Work out which existing resources are stale.
    ///
    /// A resource is stale when it is not in the compiled output. Resources
    /// belonging to skipped FQDNs or destinations are kept so that an invalid
    /// update never removes routing that used to work: the last applied
    /// VirtualService of a skipped FQDN still points at its Services.
    pub fn new(
        compiled: &CompiledRoutes,
        existing_virtual_services: Vec<ManagedResource>,
        existing_services: Vec<ManagedResource>,
    ) -> Self {
        let desired_virtual_services: BTreeSet<(&str, &str)> = compiled
            .virtual_services
            .iter()
            .map(|vs| (vs.metadata.namespace.as_str(), vs.metadata.name.as_str()))
            .collect();
        let skipped_fqdns: BTreeSet<&str> = compiled
            .skipped_fqdns
            .iter()
            .map(|s| s.fqdn.as_str())
            .collect();

        let desired_services: BTreeSet<(&str, &str)> = compiled
            .services
            .iter()
            .map(|s| (s.metadata.namespace.as_str(), s.metadata.name.as_str()))
            .collect();
        let skipped_services: BTreeSet<String> = compiled
            .skipped_destinations
            .iter()
            .map(|s| service_name(&s.destination))
            .collect();

        let mut virtual_services: Vec<ManagedResource> = existing_virtual_services
            .into_iter()
            .filter(|vs| {
                !desired_virtual_services.contains(&(vs.namespace.as_str(), vs.name.as_str()))
                    && !skipped_fqdns.contains(vs.fqdn.as_str())
            })
            .collect();
        virtual_services.sort();

        let mut services: Vec<ManagedResource> = existing_services
            .into_iter()
            .filter(|svc| {
                !desired_services.contains(&(svc.namespace.as_str(), svc.name.as_str()))
                    && !skipped_services.contains(&svc.name)
                    && !skipped_fqdns.contains(svc.fqdn.as_str())
            })
            .collect();
        services.sort();

        Self {
            virtual_services,
            services,
        }
    }

    /// Check if nothing needs deleting
    pub fn is_empty(&self) -> bool {
        self.virtual_services.is_empty() && self.services.is_empty()
    }
}

/// Apply all compiled resources concurrently
async fn apply_compiled(kube: &dyn RouteKubeClient, compiled: &CompiledRoutes) -> Result<(), Error> {
    try_join_all(
        compiled
            .services
            .iter()
            .map(|service| kube.apply_service(service)),
    )
    .await?;

    try_join_all(
        compiled
            .virtual_services
            .iter()
            .map(|vs| kube.apply_virtual_service(vs)),
    )
    .await?;

    Ok(())
}

/// Delete stale resources concurrently
async fn prune(kube: &dyn RouteKubeClient, plan: &PrunePlan) -> Result<(), Error> {
    try_join_all(plan.virtual_services.iter().map(|vs| async move {
        info!(name = %vs.name, namespace = %vs.namespace, fqdn = %vs.fqdn, "deleting stale VirtualService");
        kube.delete_virtual_service(&vs.namespace, &vs.name).await
    }))
    .await?;

    try_join_all(plan.services.iter().map(|svc| async move {
        info!(name = %svc.name, namespace = %svc.namespace, fqdn = %svc.fqdn, "deleting stale Service");
        kube.delete_service(&svc.namespace, &svc.name).await
    }))
    .await?;

    Ok(())
}

/// Run one full pass: list, compile, apply, prune
pub async fn run_pass(ctx: &RouteContext) -> Result<PassSummary, Error> {
    let _guard = ctx.pass_lock.lock().await;

    let routes = ctx.kube.list_routes().await?;
    let compiled = ctx.compiler.compile(&routes);

    for skipped in &compiled.skipped_fqdns {
        let error = Error::from(skipped.error.clone());
        warn!(fqdn = %skipped.fqdn, %error, "leaving fqdn unchanged");
    }
    for skipped in &compiled.skipped_destinations {
        let error = Error::from(skipped.error.clone());
        warn!(destination = %skipped.destination, %error, "leaving destination unchanged");
    }

    // Services first so VirtualService backends resolve as soon as they exist
    apply_compiled(ctx.kube.as_ref(), &compiled).await?;

    let plan = PrunePlan::new(
        &compiled,
        ctx.kube.list_managed_virtual_services().await?,
        ctx.kube.list_managed_services().await?,
    );
    if !plan.is_empty() {
        prune(ctx.kube.as_ref(), &plan).await?;
    }

    Ok(PassSummary {
        routes: routes.len(),
        applied_virtual_services: compiled.virtual_services.len(),
        applied_services: compiled.services.len(),
        pruned_virtual_services: plan.virtual_services.len(),
        pruned_services: plan.services.len(),
        skipped_fqdns: compiled.skipped_fqdns.len(),
        skipped_destinations: compiled.skipped_destinations.len(),
    })
}

// =============================================================================
// Route reconciliation
// =============================================================================

/// Reconcile a Route resource
///
/// The triggering Route only identifies the event; the pass always covers
/// every Route in the cluster. Timed passes belong to [`periodic_resync`],
/// so a successful reconcile waits for the next change.
#[instrument(skip(route, ctx), fields(route = %route.qualified_name()))]
pub async fn reconcile(route: Arc<Route>, ctx: Arc<RouteContext>) -> Result<Action, Error> {
    debug!("route changed, running full pass");

    let summary = run_pass(&ctx).await?;

    info!(
        routes = summary.routes,
        virtual_services = summary.applied_virtual_services,
        services = summary.applied_services,
        pruned_virtual_services = summary.pruned_virtual_services,
        pruned_services = summary.pruned_services,
        skipped_fqdns = summary.skipped_fqdns,
        skipped_destinations = summary.skipped_destinations,
        "full pass complete"
    );

    Ok(Action::await_change())
}

/// Error policy for the controller
///
/// Determines how to handle reconciliation errors.
pub fn error_policy(route: Arc<Route>, error: &Error, _ctx: Arc<RouteContext>) -> Action {
    error!(
        ?error,
        route = %route.qualified_name(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(RETRY_INTERVAL)
    } else {
        Action::await_change()
    }
}

/// Run a full pass every resync interval, independent of Route events.
///
/// Route deletions only show up here: the controller never reconciles an
/// object that is gone, and with no Routes left there is nothing to requeue.
pub async fn periodic_resync(ctx: Arc<RouteContext>) {
    let mut interval = tokio::time::interval(ctx.resync_interval);
    interval.tick().await;
    loop {
        interval.tick().await;
        match run_pass(&ctx).await {
            Ok(summary) => debug!(
                routes = summary.routes,
                pruned_virtual_services = summary.pruned_virtual_services,
                pruned_services = summary.pruned_services,
                "periodic resync complete"
            ),
            Err(e) => error!(error = %e, "periodic resync failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;
    use mockall::predicate::eq;
    use routecontroller_common::crd::{
        AppProcess, DestinationApp, DestinationSelector, RouteDestination, RouteDomain, RouteSpec,
    };
    use routecontroller_compiler::naming::virtual_service_name;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // =========================================================================
    // Test Fixtures
    // =========================================================================

    fn sample_destination(guid: &str, weight: Option<u32>) -> RouteDestination {
        RouteDestination {
            guid: guid.to_string(),
            weight,
            port: Some(8080),
            app: DestinationApp {
                guid: format!("app-{guid}"),
                process: AppProcess {
                    type_: "web".to_string(),
                },
            },
            selector: DestinationSelector {
                match_labels: BTreeMap::from([(
                    "cloudfoundry.org/app_guid".to_string(),
                    format!("app-{guid}"),
                )]),
            },
        }
    }

    fn sample_route(name: &str, host: &str, destinations: Vec<RouteDestination>) -> Route {
        Route {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("workload-namespace".to_string()),
                ..Default::default()
            },
            spec: RouteSpec {
                host: host.to_string(),
                path: String::new(),
                url: format!("{host}.apps.example.com"),
                domain: RouteDomain {
                    name: "apps.example.com".to_string(),
                    internal: false,
                },
                destinations,
            },
            status: None,
        }
    }

    fn managed(name: &str, fqdn: &str) -> ManagedResource {
        ManagedResource {
            namespace: "workload-namespace".to_string(),
            name: name.to_string(),
            fqdn: fqdn.to_string(),
        }
    }

    fn api_error(code: u16) -> Error {
        Error::from(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "test".to_string(),
            reason: "Test".to_string(),
            code,
        }))
    }

    // =========================================================================
    // Mock Setup
    // =========================================================================

    fn mock_kube_with(routes: Vec<Route>) -> MockRouteKubeClient {
        let mut mock = MockRouteKubeClient::new();
        mock.expect_list_routes()
            .returning(move || Ok(routes.clone()));
        mock.expect_apply_virtual_service().returning(|_| Ok(()));
        mock.expect_apply_service().returning(|_| Ok(()));
        mock.expect_list_managed_virtual_services()
            .returning(|| Ok(vec![]));
        mock.expect_list_managed_services().returning(|| Ok(vec![]));
        mock
    }

    // =========================================================================
    // Reconciliation Story Tests
    // =========================================================================

    /// Story: A route change applies every generated resource
    #[tokio::test]
    async fn story_route_change_applies_everything() {
        let routes = vec![
            sample_route(
                "route-0",
                "a",
                vec![
                    sample_destination("d-0", Some(50)),
                    sample_destination("d-1", Some(50)),
                ],
            ),
            sample_route("route-1", "b", vec![sample_destination("d-2", None)]),
        ];
        let trigger = Arc::new(routes[0].clone());

        let vs_applied = Arc::new(AtomicUsize::new(0));
        let svc_applied = Arc::new(AtomicUsize::new(0));
        let mut mock = MockRouteKubeClient::new();
        mock.expect_list_routes()
            .times(1)
            .returning(move || Ok(routes.clone()));
        let counter = vs_applied.clone();
        mock.expect_apply_virtual_service().returning(move |vs| {
            assert_eq!(vs.spec.gateways, vec!["istio-ingress/cf-gateway"]);
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let counter = svc_applied.clone();
        mock.expect_apply_service().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        mock.expect_list_managed_virtual_services()
            .returning(|| Ok(vec![]));
        mock.expect_list_managed_services().returning(|| Ok(vec![]));
        mock.expect_delete_virtual_service().never();
        mock.expect_delete_service().never();

        let ctx = Arc::new(RouteContext::for_testing(Arc::new(mock)));
        let action = reconcile(trigger, ctx).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(vs_applied.load(Ordering::SeqCst), 2);
        assert_eq!(svc_applied.load(Ordering::SeqCst), 3);
    }

    /// Story: Resources for a removed route are deleted
    #[tokio::test]
    async fn story_stale_resources_are_pruned() {
        let routes = vec![sample_route(
            "route-0",
            "a",
            vec![sample_destination("d-0", None)],
        )];
        let stale_vs = virtual_service_name("gone.apps.example.com");
        let stale_vs_for_list = stale_vs.clone();
        let kept_vs = virtual_service_name("a.apps.example.com");

        let mut mock = MockRouteKubeClient::new();
        mock.expect_list_routes()
            .returning(move || Ok(routes.clone()));
        mock.expect_apply_virtual_service().returning(|_| Ok(()));
        mock.expect_apply_service().returning(|_| Ok(()));
        mock.expect_list_managed_virtual_services()
            .returning(move || {
                Ok(vec![
                    managed(&kept_vs, "a.apps.example.com"),
                    managed(&stale_vs_for_list, "gone.apps.example.com"),
                ])
            });
        mock.expect_list_managed_services().returning(|| {
            Ok(vec![
                managed("s-d-0", "a.apps.example.com"),
                managed("s-d-9", "gone.apps.example.com"),
            ])
        });
        mock.expect_delete_virtual_service()
            .with(eq("workload-namespace"), eq(stale_vs))
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_delete_service()
            .with(eq("workload-namespace"), eq("s-d-9"))
            .times(1)
            .returning(|_, _| Ok(()));

        let ctx = RouteContext::for_testing(Arc::new(mock));
        let summary = run_pass(&ctx).await.unwrap();

        assert_eq!(summary.pruned_virtual_services, 1);
        assert_eq!(summary.pruned_services, 1);
    }

    /// Story: An invalid update keeps the previously applied VirtualService
    #[tokio::test]
    async fn story_invalid_fqdn_is_not_pruned() {
        let routes = vec![sample_route(
            "route-0",
            "a",
            vec![
                sample_destination("d-0", Some(80)),
                sample_destination("d-1", Some(80)),
            ],
        )];
        let existing = virtual_service_name("a.apps.example.com");

        let mut mock = MockRouteKubeClient::new();
        mock.expect_list_routes()
            .returning(move || Ok(routes.clone()));
        mock.expect_apply_virtual_service().never();
        mock.expect_apply_service().times(2).returning(|_| Ok(()));
        mock.expect_list_managed_virtual_services()
            .returning(move || Ok(vec![managed(&existing, "a.apps.example.com")]));
        mock.expect_list_managed_services().returning(|| Ok(vec![]));
        mock.expect_delete_virtual_service().never();

        let ctx = RouteContext::for_testing(Arc::new(mock));
        let summary = run_pass(&ctx).await.unwrap();

        assert_eq!(summary.skipped_fqdns, 1);
        assert_eq!(summary.pruned_virtual_services, 0);
    }

    /// Story: Services behind a skipped FQDN survive while its old
    /// VirtualService still routes to them
    #[tokio::test]
    async fn story_services_of_skipped_fqdn_are_not_pruned() {
        let routes = vec![sample_route(
            "route-0",
            "a",
            vec![
                sample_destination("d-0", Some(80)),
                sample_destination("d-1", Some(80)),
            ],
        )];
        let existing = virtual_service_name("a.apps.example.com");

        let mut mock = MockRouteKubeClient::new();
        mock.expect_list_routes()
            .returning(move || Ok(routes.clone()));
        mock.expect_apply_virtual_service().never();
        mock.expect_apply_service().times(2).returning(|_| Ok(()));
        mock.expect_list_managed_virtual_services()
            .returning(move || Ok(vec![managed(&existing, "a.apps.example.com")]));
        mock.expect_list_managed_services().returning(|| {
            Ok(vec![
                managed("s-d-0", "a.apps.example.com"),
                managed("s-old", "a.apps.example.com"),
                managed("s-d-9", "gone.apps.example.com"),
            ])
        });
        mock.expect_delete_virtual_service().never();
        mock.expect_delete_service()
            .with(eq("workload-namespace"), eq("s-d-9"))
            .times(1)
            .returning(|_, _| Ok(()));

        let ctx = RouteContext::for_testing(Arc::new(mock));
        let summary = run_pass(&ctx).await.unwrap();

        assert_eq!(summary.skipped_fqdns, 1);
        assert_eq!(summary.pruned_services, 1);
    }

    /// Story: No routes means nothing to apply
    #[tokio::test]
    async fn story_empty_cluster_applies_nothing() {
        let mut mock = mock_kube_with(vec![]);
        mock.expect_apply_virtual_service().never();
        mock.expect_apply_service().never();

        let ctx = RouteContext::for_testing(Arc::new(mock));
        let summary = run_pass(&ctx).await.unwrap();

        assert_eq!(summary, PassSummary::default());
    }

    /// Story: A failed apply fails the pass before anything is pruned
    #[tokio::test]
    async fn story_apply_failure_skips_prune() {
        let routes = vec![sample_route(
            "route-0",
            "a",
            vec![sample_destination("d-0", None)],
        )];

        let mut mock = MockRouteKubeClient::new();
        mock.expect_list_routes()
            .returning(move || Ok(routes.clone()));
        mock.expect_apply_service()
            .returning(|_| Err(api_error(500)));
        mock.expect_apply_virtual_service().returning(|_| Ok(()));
        mock.expect_list_managed_virtual_services().never();
        mock.expect_list_managed_services().never();

        let ctx = Arc::new(RouteContext::for_testing(Arc::new(mock)));
        let trigger = Arc::new(sample_route("route-0", "a", vec![]));
        let err = reconcile(trigger, ctx).await.unwrap_err();

        assert!(err.is_retryable());
    }

    // =========================================================================
    // Prune Plan Tests
    // =========================================================================

    #[test]
    fn prune_plan_keeps_desired_and_skipped_resources() {
        let routes = vec![
            sample_route("route-0", "a", vec![sample_destination("d-0", None)]),
            sample_route(
                "route-1",
                "b",
                vec![
                    sample_destination("d-1", Some(10)),
                    sample_destination("d-2", None),
                ],
            ),
        ];
        let mut portless = routes.clone();
        portless[0].spec.destinations[0].port = None;
        let compiled = RouteCompiler::new(["gw"]).compile(&portless);

        let plan = PrunePlan::new(
            &compiled,
            vec![
                managed(&virtual_service_name("a.apps.example.com"), "a.apps.example.com"),
                managed(&virtual_service_name("b.apps.example.com"), "b.apps.example.com"),
                managed(&virtual_service_name("c.apps.example.com"), "c.apps.example.com"),
            ],
            vec![
                managed("s-d-0", "a.apps.example.com"),
                managed("s-d-1", "b.apps.example.com"),
                managed("s-d-7", "c.apps.example.com"),
            ],
        );

        assert_eq!(
            plan.virtual_services,
            vec![managed(
                &virtual_service_name("c.apps.example.com"),
                "c.apps.example.com"
            )]
        );
        assert_eq!(plan.services, vec![managed("s-d-7", "c.apps.example.com")]);
    }

    #[test]
    fn prune_plan_matches_on_namespace_too() {
        let routes = vec![sample_route(
            "route-0",
            "a",
            vec![sample_destination("d-0", None)],
        )];
        let compiled = RouteCompiler::new(["gw"]).compile(&routes);
        let mut moved = managed("s-d-0", "a.apps.example.com");
        moved.namespace = "old-namespace".to_string();

        let plan = PrunePlan::new(&compiled, vec![], vec![moved.clone()]);

        assert_eq!(plan.services, vec![moved]);
    }

    // =========================================================================
    // Route Decoding Tests
    // =========================================================================

    fn route_object(name: &str, port: u32) -> DynamicObject {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "networking.cloudfoundry.org/v1alpha1",
            "kind": "Route",
            "metadata": {"name": name, "namespace": "workload-namespace"},
            "spec": {
                "host": "a",
                "path": "",
                "url": "a.apps.example.com",
                "domain": {"name": "apps.example.com", "internal": false},
                "destinations": [{
                    "guid": "d-0",
                    "port": port,
                    "app": {"guid": "app-d-0", "process": {"type": "web"}},
                    "selector": {"matchLabels": {"cloudfoundry.org/app_guid": "app-d-0"}}
                }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn undecodable_route_is_dropped_alone() {
        let routes = decode_routes(vec![
            route_object("route-0", 8080),
            route_object("route-1", 70000),
            route_object("route-2", 9000),
        ]);

        let names: Vec<String> = routes.iter().map(|r| r.name_any()).collect();
        assert_eq!(names, vec!["route-0", "route-2"]);
        assert_eq!(routes[1].spec.destinations[0].port, Some(9000));
    }

    // =========================================================================
    // Error Policy Tests
    // =========================================================================

    #[test]
    fn retryable_errors_requeue() {
        let route = Arc::new(sample_route("route-0", "a", vec![]));
        let ctx = Arc::new(RouteContext::for_testing(Arc::new(MockRouteKubeClient::new())));

        let action = error_policy(route, &api_error(503), ctx);

        assert_eq!(action, Action::requeue(RETRY_INTERVAL));
    }

    #[test]
    fn permanent_errors_await_change() {
        let route = Arc::new(sample_route("route-0", "a", vec![]));
        let ctx = Arc::new(RouteContext::for_testing(Arc::new(MockRouteKubeClient::new())));

        let action = error_policy(route, &api_error(403), ctx);

        assert_eq!(action, Action::await_change());
    }
}
