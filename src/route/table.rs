//! Immutable route table snapshots and prefix matching.
//!
//! A [`RouteTable`] is built wholesale by the locator and never mutated
//! afterwards: concurrent readers clone the `Arc` pointing at the current
//! snapshot and a rebuild swaps the pointer. Routes are kept sorted by
//! prefix length, longest first, so [`RouteTable::resolve`] returns the
//! most specific match with a single linear scan.

use std::sync::Arc;

use crate::registry::ApplicationInstance;

/// A rule mapping a path prefix to one backend instance.
///
/// `prefix` always ends with `/`; the rule matches the prefix itself
/// (without the trailing slash) and everything below it.
#[derive(Debug, Clone)]
pub struct Route {
    pub id: String,
    pub prefix: String,
    pub instance: Arc<ApplicationInstance>,
    pub strip_prefix: bool,
    /// Byte length of the leading path portion removed by
    /// [`forward_path`](Self::forward_path). Equals `prefix.len()` except
    /// for allow-list routes, where only the application mount is stripped
    /// and the endpoint segment stays on the forwarded path.
    pub strip_len: usize,
}

impl Route {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix) || path == &self.prefix[..self.prefix.len() - 1]
    }

    /// The path to forward to the backend: the remainder after the stripped
    /// portion, with its leading slash, or the full path when stripping is
    /// disabled.
    #[must_use]
    pub fn forward_path<'a>(&self, path: &'a str) -> &'a str {
        if !self.strip_prefix {
            return path;
        }
        if path.len() < self.strip_len {
            "/"
        } else {
            &path[self.strip_len - 1..]
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    version: u64,
    routes: Vec<Route>,
}

impl RouteTable {
    /// Build a snapshot; routes are re-ordered longest prefix first so
    /// resolution picks the most specific rule.
    #[must_use]
    pub fn new(version: u64, mut routes: Vec<Route>) -> Self {
        routes.sort_by(|a, b| {
            b.prefix
                .len()
                .cmp(&a.prefix.len())
                .then_with(|| a.prefix.cmp(&b.prefix))
        });
        Self { version, routes }
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Longest-prefix lookup. `None` is a resolution miss, not an error.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn instance(id: &str, url: &str) -> Arc<ApplicationInstance> {
        Arc::new(ApplicationInstance {
            id: id.into(),
            url: Url::parse(url).unwrap(),
            version: None,
            endpoints: None,
            healthy: true,
        })
    }

    fn route(id: &str, prefix: &str) -> Route {
        Route {
            id: id.into(),
            prefix: prefix.into(),
            instance: instance(id, "http://localhost:8080"),
            strip_prefix: true,
            strip_len: prefix.len(),
        }
    }

    #[test]
    fn prefix_match() {
        let table = RouteTable::new(1, vec![route("svc-a", "/api/applications/svc-a/")]);
        let matched = table.resolve("/api/applications/svc-a/health").unwrap();
        assert_eq!(matched.id, "svc-a");
    }

    #[test]
    fn bare_prefix_without_trailing_slash_matches() {
        let table = RouteTable::new(1, vec![route("svc-a", "/api/applications/svc-a/")]);
        assert!(table.resolve("/api/applications/svc-a").is_some());
    }

    #[test]
    fn no_match_is_none() {
        let table = RouteTable::new(1, vec![route("svc-a", "/api/applications/svc-a/")]);
        assert!(table.resolve("/unknown/path").is_none());
        assert!(table.resolve("/api/applications/svc-b/health").is_none());
    }

    #[test]
    fn longest_prefix_wins() {
        let table = RouteTable::new(
            1,
            vec![
                route("svc-a", "/api/applications/svc-a/"),
                route("svc-a-health", "/api/applications/svc-a/health/"),
            ],
        );
        let matched = table.resolve("/api/applications/svc-a/health/live").unwrap();
        assert_eq!(matched.id, "svc-a-health");

        let matched = table.resolve("/api/applications/svc-a/metrics").unwrap();
        assert_eq!(matched.id, "svc-a");
    }

    #[test]
    fn similar_id_is_not_a_prefix_collision() {
        let table = RouteTable::new(
            1,
            vec![
                route("svc", "/api/applications/svc/"),
                route("svc-a", "/api/applications/svc-a/"),
            ],
        );
        let matched = table.resolve("/api/applications/svc-a/health").unwrap();
        assert_eq!(matched.id, "svc-a");
        let matched = table.resolve("/api/applications/svc/health").unwrap();
        assert_eq!(matched.id, "svc");
    }

    #[test]
    fn forward_path_strips_prefix() {
        let r = route("svc-a", "/api/applications/svc-a/");
        assert_eq!(r.forward_path("/api/applications/svc-a/health"), "/health");
        assert_eq!(
            r.forward_path("/api/applications/svc-a/health/live"),
            "/health/live"
        );
        assert_eq!(r.forward_path("/api/applications/svc-a/"), "/");
        assert_eq!(r.forward_path("/api/applications/svc-a"), "/");
    }

    #[test]
    fn endpoint_route_keeps_endpoint_segment_when_stripping() {
        // Allow-list route: only the application mount is stripped, the
        // endpoint segment stays on the forwarded path.
        let r = Route {
            id: "svc-a/health".into(),
            prefix: "/api/applications/svc-a/health/".into(),
            instance: instance("svc-a", "http://localhost:8080"),
            strip_prefix: true,
            strip_len: "/api/applications/svc-a/".len(),
        };
        assert_eq!(
            r.forward_path("/api/applications/svc-a/health/live"),
            "/health/live"
        );
        assert_eq!(r.forward_path("/api/applications/svc-a/health"), "/health");
        assert_eq!(r.forward_path("/api/applications/svc-a/health/"), "/health/");
    }

    #[test]
    fn forward_path_keeps_full_path_when_not_stripping() {
        let mut r = route("svc-a", "/api/applications/svc-a/");
        r.strip_prefix = false;
        assert_eq!(
            r.forward_path("/api/applications/svc-a/health"),
            "/api/applications/svc-a/health"
        );
    }

    #[test]
    fn empty_table_resolves_nothing() {
        let table = RouteTable::default();
        assert!(table.is_empty());
        assert!(table.resolve("/anything").is_none());
    }
}
