//! Config-file-backed registry with hash-based change detection.
//!
//! [`FileRegistry`] serves the application list parsed at startup and
//! re-reads the config file from a background poll loop. When the file's
//! SHA-256 hash changes and the new contents validate, the cached instance
//! list is swapped and a [`RefreshSignal`] is published so the route table
//! is rebuilt. A file that stops validating is logged and ignored — the
//! last good list keeps serving.
//!
//! Only the `applications` section hot-reloads this way; server, proxy,
//! and refresh settings require a restart.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};

use crate::config::model::Config;
use crate::config::{self, ConfigVersion};
use crate::error::GangwayError;
use crate::route::refresh::RefreshSignal;

use super::{instances_from_config, ApplicationInstance, Registry};

pub struct FileRegistry {
    path: PathBuf,
    instances: RwLock<Vec<Arc<ApplicationInstance>>>,
    version: RwLock<ConfigVersion>,
}

impl FileRegistry {
    pub fn new(
        path: PathBuf,
        config: &Config,
        version: ConfigVersion,
    ) -> Result<Self, GangwayError> {
        let instances = instances_from_config(&config.applications)?;
        Ok(Self {
            path,
            instances: RwLock::new(instances),
            version: RwLock::new(version),
        })
    }

    async fn reload(&self) -> Result<bool, GangwayError> {
        let current = self.version.read().await.clone();
        if config::file_version(&self.path).await? == current {
            return Ok(false);
        }

        let (config, version) = config::load_file(&self.path).await?;
        let instances = instances_from_config(&config.applications)?;
        let count = instances.len();

        *self.instances.write().await = instances;
        *self.version.write().await = version;

        tracing::info!(
            path = %self.path.display(),
            applications = count,
            "registry reloaded"
        );
        Ok(true)
    }

    /// Poll the config file until shutdown, publishing a topology-change
    /// signal whenever the application list is replaced.
    pub async fn poll_loop(
        self: Arc<Self>,
        interval_secs: u64,
        refresh_tx: watch::Sender<RefreshSignal>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => {
                    tracing::debug!("registry poll loop shutting down");
                    return;
                }
            }

            match self.reload().await {
                Ok(true) => {
                    let _ = refresh_tx.send(RefreshSignal);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "registry reload failed, keeping current instances");
                }
            }
        }
    }
}

#[async_trait]
impl Registry for FileRegistry {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn list_instances(&self) -> Result<Vec<Arc<ApplicationInstance>>, GangwayError> {
        Ok(self.instances.read().await.clone())
    }
}
