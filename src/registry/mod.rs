//! Application registry: the directory of live backend instances.
//!
//! Defines the [`Registry`] trait consumed by the route locator and the
//! [`ApplicationInstance`] view it hands out. Submodules provide the
//! config-file-backed registry used by `gangway run` ([`file`]) and an
//! in-memory registry for tests and embedding ([`memory`]).

pub mod file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::config::model::ApplicationConfig;
use crate::error::GangwayError;

/// Read-only view of a registered backend application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInstance {
    pub id: String,
    pub url: Url,
    pub version: Option<String>,
    /// Per-instance endpoint allow-list; `None` defers to the global list.
    pub endpoints: Option<Vec<String>>,
    pub healthy: bool,
}

impl ApplicationInstance {
    pub fn from_config(app: &ApplicationConfig) -> Result<Self, GangwayError> {
        let url = Url::parse(&app.url).map_err(|e| GangwayError::UriParse {
            source: Box::new(e),
        })?;
        Ok(Self {
            id: app.id.clone(),
            url,
            version: app.version.clone(),
            endpoints: app.endpoints.clone(),
            healthy: app.healthy,
        })
    }
}

// async_trait is required here because Registry is used as Arc<dyn Registry>
// and native async fn in traits (Rust 1.75+) does not support dyn dispatch.
#[async_trait]
pub trait Registry: Send + Sync {
    fn name(&self) -> &'static str;

    /// Enumerate the currently known instances. Must be safe to call
    /// concurrently with request handling.
    async fn list_instances(&self) -> Result<Vec<Arc<ApplicationInstance>>, GangwayError>;
}

/// Convert config entries into instance views, failing on the first bad URL.
pub fn instances_from_config(
    apps: &[ApplicationConfig],
) -> Result<Vec<Arc<ApplicationInstance>>, GangwayError> {
    apps.iter()
        .map(|app| ApplicationInstance::from_config(app).map(Arc::new))
        .collect()
}
