//! In-memory registry for tests and embedded use.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::GangwayError;

use super::{ApplicationInstance, Registry};

#[derive(Default)]
pub struct InMemoryRegistry {
    instances: RwLock<Vec<Arc<ApplicationInstance>>>,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new(instances: Vec<ApplicationInstance>) -> Self {
        Self {
            instances: RwLock::new(instances.into_iter().map(Arc::new).collect()),
        }
    }

    /// Replace the full instance list. Callers are responsible for firing a
    /// refresh signal afterwards, mirroring a real topology-change event.
    pub async fn set_instances(&self, instances: Vec<ApplicationInstance>) {
        *self.instances.write().await = instances.into_iter().map(Arc::new).collect();
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_instances(&self) -> Result<Vec<Arc<ApplicationInstance>>, GangwayError> {
        Ok(self.instances.read().await.clone())
    }
}
