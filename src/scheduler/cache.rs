//! In-memory snapshot of registered sites.

use crate::db::Site;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Site snapshot, replaced wholesale on every scheduling tick.
///
/// The scheduler is the only writer. Readers either see the previous
/// snapshot or the new one, never a mix.
#[derive(Default)]
pub struct SiteCache {
    sites: RwLock<Arc<HashMap<i64, Site>>>,
}

impl SiteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot. Sites missing from `sites` disappear.
    pub async fn refresh(&self, sites: &[Site]) {
        let snapshot: HashMap<i64, Site> = sites.iter().map(|s| (s.id, s.clone())).collect();
        *self.sites.write().await = Arc::new(snapshot);
    }

    pub async fn get(&self, id: i64) -> Option<Site> {
        self.sites.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sites.read().await.len()
    }
}
