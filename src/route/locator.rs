//! Registry-driven route locator with atomic snapshot swaps.
//!
//! [`RouteLocator`] generates one route per live registry instance under
//! `{base_path}{api_prefix}{id}/` (or one per allowed endpoint when an
//! allow-list is in effect) and answers lookups from an immutable
//! [`RouteTable`] snapshot. A staleness flag set by the refresh controller
//! triggers a lazy rebuild on the next lookup; the rebuild is claimed with
//! a compare-and-swap so at most one runs at a time while every other
//! caller keeps resolving against the previous snapshot. A rebuild that
//! fails leaves the last good table in place and the flag set, so the next
//! lookup retries.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::GangwayError;
use crate::registry::{ApplicationInstance, Registry};

use super::table::{Route, RouteTable};

pub struct RouteLocator {
    registry: Arc<dyn Registry>,
    base_path: String,
    api_prefix: String,
    endpoints: Vec<String>,
    table: RwLock<Arc<RouteTable>>,
    stale: AtomicBool,
    rebuilding: AtomicBool,
    next_version: AtomicU64,
}

impl RouteLocator {
    /// `base_path` is empty or `/prefix` without a trailing slash;
    /// `api_prefix` starts and ends with `/`. Both are validated at config
    /// load. `endpoints` is the global allow-list; empty exposes all
    /// sub-paths.
    pub fn new(
        registry: Arc<dyn Registry>,
        base_path: impl Into<String>,
        api_prefix: impl Into<String>,
        endpoints: Vec<String>,
    ) -> Self {
        Self {
            registry,
            base_path: base_path.into(),
            api_prefix: api_prefix.into(),
            endpoints,
            table: RwLock::new(Arc::new(RouteTable::default())),
            // A fresh locator has no table yet; the first lookup (or the
            // startup rebuild) populates it.
            stale: AtomicBool::new(true),
            rebuilding: AtomicBool::new(false),
            next_version: AtomicU64::new(0),
        }
    }

    /// Clone the current snapshot pointer. The snapshot stays consistent
    /// for the whole lookup even if a rebuild swaps the table meanwhile.
    pub async fn snapshot(&self) -> Arc<RouteTable> {
        Arc::clone(&*self.table.read().await)
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Idempotent: repeated notifications before the next rebuild coalesce
    /// into a single flag.
    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    /// Resolve a request path to its route, rebuilding first when the table
    /// is stale. A failed rebuild is logged and the previous snapshot keeps
    /// answering, so resolver trouble degrades to misses, never to errors.
    pub async fn resolve(&self, path: &str) -> Option<Route> {
        if self.is_stale() {
            if let Err(e) = self.try_rebuild().await {
                tracing::warn!(error = %e, "route table rebuild failed, serving previous table");
            }
        }
        let table = self.snapshot().await;
        table.resolve(path).cloned()
    }

    /// Rebuild the table unless another task already claimed the rebuild.
    /// Returns `Ok(true)` when this call performed the swap.
    pub async fn try_rebuild(&self) -> Result<bool, GangwayError> {
        if self
            .rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Another task owns the rebuild; use the current snapshot.
            return Ok(false);
        }

        // Clear before listing so a signal arriving mid-rebuild re-marks
        // the table instead of being swallowed.
        self.stale.store(false, Ordering::Release);

        let result = self.registry.list_instances().await;
        let outcome = match result {
            Ok(instances) => {
                let routes = self.build_routes(&instances);
                let version = self.next_version.fetch_add(1, Ordering::Relaxed) + 1;
                let table = Arc::new(RouteTable::new(version, routes));
                let count = table.len();
                *self.table.write().await = table;
                tracing::debug!(version, routes = count, "route table rebuilt");
                Ok(true)
            }
            Err(e) => {
                self.stale.store(true, Ordering::Release);
                Err(e)
            }
        };

        self.rebuilding.store(false, Ordering::Release);
        outcome
    }

    fn build_routes(&self, instances: &[Arc<ApplicationInstance>]) -> Vec<Route> {
        let mut routes = Vec::with_capacity(instances.len());

        for instance in instances {
            if !instance.healthy {
                tracing::debug!(id = %instance.id, "skipping unhealthy instance");
                continue;
            }

            let allowed = instance.endpoints.as_deref().unwrap_or(&self.endpoints);
            let mount = format!("{}{}{}/", self.base_path, self.api_prefix, instance.id);

            if allowed.is_empty() {
                routes.push(Route {
                    id: instance.id.clone(),
                    strip_len: mount.len(),
                    prefix: mount,
                    instance: Arc::clone(instance),
                    strip_prefix: true,
                });
            } else {
                // Allow-lists filter at route-generation time: no catch-all
                // route exists for the instance, so anything outside the
                // list is a plain miss. Stripping removes only the mount,
                // so the backend still sees the endpoint segment.
                for endpoint in allowed {
                    routes.push(Route {
                        id: format!("{}/{}", instance.id, endpoint),
                        prefix: format!("{mount}{endpoint}/"),
                        strip_len: mount.len(),
                        instance: Arc::clone(instance),
                        strip_prefix: true,
                    });
                }
            }
        }

        routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::memory::InMemoryRegistry;
    use async_trait::async_trait;
    use url::Url;

    fn instance(id: &str, url: &str) -> ApplicationInstance {
        ApplicationInstance {
            id: id.into(),
            url: Url::parse(url).unwrap(),
            version: None,
            endpoints: None,
            healthy: true,
        }
    }

    fn locator_for(instances: Vec<ApplicationInstance>) -> RouteLocator {
        RouteLocator::new(
            Arc::new(InMemoryRegistry::new(instances)),
            "",
            "/api/applications/",
            vec![],
        )
    }

    struct FlakyRegistry {
        inner: InMemoryRegistry,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Registry for FlakyRegistry {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn list_instances(
            &self,
        ) -> Result<Vec<Arc<ApplicationInstance>>, GangwayError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(GangwayError::Registry {
                    source: "listing unavailable".into(),
                });
            }
            self.inner.list_instances().await
        }
    }

    #[tokio::test]
    async fn one_route_per_live_instance() {
        let locator = locator_for(vec![
            instance("svc-a", "http://10.0.0.5:8080"),
            instance("svc-b", "http://10.0.0.6:8080"),
        ]);
        locator.try_rebuild().await.unwrap();

        let table = locator.snapshot().await;
        assert_eq!(table.len(), 2);
        let prefixes: Vec<_> = table.routes().iter().map(|r| r.prefix.as_str()).collect();
        assert!(prefixes.contains(&"/api/applications/svc-a/"));
        assert!(prefixes.contains(&"/api/applications/svc-b/"));
    }

    #[tokio::test]
    async fn unhealthy_instances_get_no_route() {
        let mut down = instance("svc-b", "http://10.0.0.6:8080");
        down.healthy = false;
        let locator = locator_for(vec![instance("svc-a", "http://10.0.0.5:8080"), down]);
        locator.try_rebuild().await.unwrap();

        let table = locator.snapshot().await;
        assert_eq!(table.len(), 1);
        assert_eq!(table.routes()[0].id, "svc-a");
    }

    #[tokio::test]
    async fn resolves_and_strips_prefix() {
        let locator = locator_for(vec![instance("svc-a", "http://10.0.0.5:8080")]);

        // Lazy: the locator starts stale, resolve triggers the build.
        let route = locator.resolve("/api/applications/svc-a/health").await.unwrap();
        assert_eq!(route.instance.url.as_str(), "http://10.0.0.5:8080/");
        assert_eq!(route.forward_path("/api/applications/svc-a/health"), "/health");

        assert!(locator.resolve("/unknown/path").await.is_none());
    }

    #[tokio::test]
    async fn base_path_prefixes_routes() {
        let registry = Arc::new(InMemoryRegistry::new(vec![instance(
            "svc-a",
            "http://10.0.0.5:8080",
        )]));
        let locator = RouteLocator::new(registry, "/admin", "/api/applications/", vec![]);
        locator.try_rebuild().await.unwrap();

        assert!(locator
            .resolve("/admin/api/applications/svc-a/health")
            .await
            .is_some());
        assert!(locator.resolve("/api/applications/svc-a/health").await.is_none());
    }

    #[tokio::test]
    async fn global_allow_list_restricts_endpoints() {
        let registry = Arc::new(InMemoryRegistry::new(vec![instance(
            "svc-a",
            "http://10.0.0.5:8080",
        )]));
        let locator = RouteLocator::new(
            registry,
            "",
            "/api/applications/",
            vec!["health".into(), "metrics".into()],
        );
        locator.try_rebuild().await.unwrap();

        assert!(locator
            .resolve("/api/applications/svc-a/health/live")
            .await
            .is_some());
        assert!(locator
            .resolve("/api/applications/svc-a/metrics")
            .await
            .is_some());
        // Not on the list: the route was never generated.
        assert!(locator.resolve("/api/applications/svc-a/env").await.is_none());
    }

    #[tokio::test]
    async fn allow_list_routes_forward_endpoint_relative_path() {
        let registry = Arc::new(InMemoryRegistry::new(vec![instance(
            "svc-a",
            "http://10.0.0.5:8080",
        )]));
        let locator = RouteLocator::new(
            registry,
            "",
            "/api/applications/",
            vec!["health".into()],
        );
        locator.try_rebuild().await.unwrap();

        // The endpoint segment survives stripping: the backend sees its own
        // relative path, not the remainder below the endpoint.
        let route = locator
            .resolve("/api/applications/svc-a/health/live")
            .await
            .unwrap();
        assert_eq!(
            route.forward_path("/api/applications/svc-a/health/live"),
            "/health/live"
        );

        let route = locator
            .resolve("/api/applications/svc-a/health")
            .await
            .unwrap();
        assert_eq!(route.forward_path("/api/applications/svc-a/health"), "/health");
    }

    #[tokio::test]
    async fn instance_allow_list_overrides_global() {
        let mut restricted = instance("svc-a", "http://10.0.0.5:8080");
        restricted.endpoints = Some(vec!["health".into()]);
        let registry = Arc::new(InMemoryRegistry::new(vec![restricted]));
        let locator = RouteLocator::new(
            registry,
            "",
            "/api/applications/",
            vec!["health".into(), "metrics".into()],
        );
        locator.try_rebuild().await.unwrap();

        assert!(locator.resolve("/api/applications/svc-a/health").await.is_some());
        assert!(locator
            .resolve("/api/applications/svc-a/metrics")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn rebuild_is_idempotent() {
        let locator = locator_for(vec![
            instance("svc-a", "http://10.0.0.5:8080"),
            instance("svc-b", "http://10.0.0.6:8080"),
        ]);

        locator.try_rebuild().await.unwrap();
        let first = locator.snapshot().await;

        locator.mark_stale();
        locator.try_rebuild().await.unwrap();
        let second = locator.snapshot().await;

        let mut a: Vec<_> = first.routes().iter().map(|r| r.prefix.clone()).collect();
        let mut b: Vec<_> = second.routes().iter().map(|r| r.prefix.clone()).collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
        assert!(second.version() > first.version());
    }

    #[tokio::test]
    async fn coalesced_signals_cause_one_rebuild() {
        let locator = locator_for(vec![instance("svc-a", "http://10.0.0.5:8080")]);
        locator.try_rebuild().await.unwrap();
        let before = locator.snapshot().await.version();

        locator.mark_stale();
        locator.mark_stale();

        locator.resolve("/api/applications/svc-a/health").await;
        locator.resolve("/api/applications/svc-a/health").await;

        assert_eq!(locator.snapshot().await.version(), before + 1);
        assert!(!locator.is_stale());
    }

    #[tokio::test]
    async fn lookup_reflects_registry_change_after_signal() {
        let registry = Arc::new(InMemoryRegistry::new(vec![instance(
            "svc-a",
            "http://10.0.0.5:8080",
        )]));
        let locator = RouteLocator::new(
            Arc::clone(&registry) as Arc<dyn Registry>,
            "",
            "/api/applications/",
            vec![],
        );
        locator.try_rebuild().await.unwrap();
        assert!(locator.resolve("/api/applications/svc-b/ping").await.is_none());

        registry
            .set_instances(vec![
                instance("svc-a", "http://10.0.0.5:8080"),
                instance("svc-b", "http://10.0.0.7:8080"),
            ])
            .await;
        locator.mark_stale();

        let route = locator.resolve("/api/applications/svc-b/ping").await.unwrap();
        assert_eq!(route.instance.url.as_str(), "http://10.0.0.7:8080/");
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_table_and_stays_stale() {
        let registry = Arc::new(FlakyRegistry {
            inner: InMemoryRegistry::new(vec![instance("svc-a", "http://10.0.0.5:8080")]),
            fail: AtomicBool::new(false),
        });
        let locator = RouteLocator::new(
            Arc::clone(&registry) as Arc<dyn Registry>,
            "",
            "/api/applications/",
            vec![],
        );
        locator.try_rebuild().await.unwrap();

        registry.fail.store(true, Ordering::Relaxed);
        locator.mark_stale();

        // The old table keeps answering through the failure.
        assert!(locator.resolve("/api/applications/svc-a/health").await.is_some());
        assert!(locator.is_stale());

        // Once the registry recovers, the next lookup rebuilds.
        registry.fail.store(false, Ordering::Relaxed);
        assert!(locator.resolve("/api/applications/svc-a/health").await.is_some());
        assert!(!locator.is_stale());
    }

    #[tokio::test]
    async fn concurrent_lookups_never_see_empty_flash() {
        let locator = Arc::new(locator_for(vec![instance("svc-a", "http://10.0.0.5:8080")]));
        locator.try_rebuild().await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locator = Arc::clone(&locator);
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    locator.mark_stale();
                    let table = {
                        if locator.is_stale() {
                            let _ = locator.try_rebuild().await;
                        }
                        locator.snapshot().await
                    };
                    assert!(!table.is_empty(), "observed empty table after non-empty one");
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
