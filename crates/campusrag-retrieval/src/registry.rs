//! Collection registry: the set of knowledge bases known at startup, their
//! routing metadata and a health cache.
//!
//! Request handling works on an immutable [`RegistrySnapshot`]; `reload`
//! swaps in a new one for maintenance windows while in-flight queries keep
//! the snapshot they started with. The health cache is the only shared
//! mutable state: one entry per collection, written by probes only, last
//! write wins, readers never wait on a retrieval. Query-time failures stay
//! with the request that saw them.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use campusrag_core::config::{DepartmentSettings, HealthSettings, Settings};
use campusrag_core::error::{Error, Result};
use campusrag_core::traits::{CollectionSource, Embedder, VectorIndex};
use campusrag_core::types::{normalize_name, CollectionId, HealthStatus, GENERAL_COLLECTION};

use crate::cancel::CancellationToken;

/// A registered knowledge base with uniform search capability.
pub struct Collection {
    pub id: CollectionId,
    pub label: String,
    /// Phrases the router matches against questions (label and name included).
    pub keywords: Vec<String>,
    /// Embedding of the label text, when the registry was given an embedder.
    pub label_vector: Option<Vec<f32>>,
    pub index: Arc<dyn VectorIndex>,
    pub registration_order: usize,
    /// Passage count observed at registration; used as routing tie-break.
    pub passage_count: usize,
    /// Set for regulation-scoped collections (`cse_vr23`) whose plain
    /// department is also registered. These are reached by hint only.
    pub regulation_of: Option<CollectionId>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("registration_order", &self.registration_order)
            .field("passage_count", &self.passage_count)
            .field("regulation_of", &self.regulation_of)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthEntry {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
}

/// Immutable view of the registered collections. The general collection
/// is registered first, departments follow in discovery order.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    collections: Vec<Arc<Collection>>,
    by_name: HashMap<String, usize>,
}

impl RegistrySnapshot {
    pub fn resolve(&self, name: &str) -> Result<Arc<Collection>> {
        let key = normalize_name(name);
        self.by_name.get(&key).map(|&i| Arc::clone(&self.collections[i])).ok_or(Error::NotFound(key))
    }

    pub fn get(&self, id: &CollectionId) -> Option<Arc<Collection>> {
        self.by_name.get(id.name()).map(|&i| Arc::clone(&self.collections[i]))
    }

    pub fn list_departments(&self) -> BTreeSet<String> {
        self.collections.iter().filter(|c| !c.id.is_general()).map(|c| c.id.name().to_string()).collect()
    }

    pub fn departments(&self) -> impl Iterator<Item = &Arc<Collection>> { self.collections.iter().filter(|c| !c.id.is_general()) }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Collection>> { self.collections.iter() }

    pub fn registration_order(&self, id: &CollectionId) -> usize {
        self.by_name.get(id.name()).copied().unwrap_or(usize::MAX)
    }

    pub fn len(&self) -> usize { self.collections.len() }
    pub fn is_empty(&self) -> bool { self.collections.is_empty() }
}

pub struct CollectionRegistry {
    source: Arc<dyn CollectionSource>,
    departments: BTreeMap<String, DepartmentSettings>,
    health_settings: HealthSettings,
    label_embedder: Option<Arc<dyn Embedder>>,
    snapshot: RwLock<Arc<RegistrySnapshot>>,
    health: DashMap<CollectionId, HealthEntry>,
}

impl CollectionRegistry {
    /// Discover collections and probe their health once.
    pub async fn init(
        source: Arc<dyn CollectionSource>,
        settings: &Settings,
        label_embedder: Option<Arc<dyn Embedder>>,
    ) -> anyhow::Result<Self> {
        let departments = settings.departments.iter().map(|(k, v)| (normalize_name(k), v.clone())).collect();
        let registry = Self {
            source,
            departments,
            health_settings: settings.health.clone(),
            label_embedder,
            snapshot: RwLock::new(Arc::new(RegistrySnapshot::default())),
            health: DashMap::new(),
        };
        registry.reload().await?;
        Ok(registry)
    }

    /// Re-run discovery and swap the snapshot. Returns the collection count.
    pub async fn reload(&self) -> anyhow::Result<usize> {
        let discovered = self.source.discover().await?;
        let probe_timeout = Duration::from_millis(self.health_settings.probe_timeout_ms);

        let mut seen = BTreeSet::new();
        let mut entries = Vec::new();
        for d in discovered {
            if !seen.insert(d.id.clone()) {
                warn!(collection = %d.id, "duplicate collection discovered, keeping the first");
                continue;
            }
            entries.push(d);
        }
        entries.sort_by_key(|d| !d.id.is_general());
        let names: BTreeSet<String> = entries.iter().map(|d| d.id.name().to_string()).collect();

        let mut collections = Vec::with_capacity(entries.len());
        let mut by_name = HashMap::new();
        for (order, d) in entries.into_iter().enumerate() {
            let status = probe(d.index.as_ref(), probe_timeout).await;
            let (label, keywords) = self.routing_metadata(&d.id);
            let label_vector = self.embed_label(&label);
            let regulation_of = regulation_parent(d.id.name(), &names);
            self.store_health(&d.id, status.0);
            by_name.insert(d.id.name().to_string(), order);
            collections.push(Arc::new(Collection {
                id: d.id,
                label,
                keywords,
                label_vector,
                index: d.index,
                registration_order: order,
                passage_count: status.1,
                regulation_of,
            }));
        }
        let snapshot = Arc::new(RegistrySnapshot { collections, by_name });
        self.health.retain(|id, _| snapshot.get(id).is_some());
        let count = snapshot.len();
        if snapshot.get(&CollectionId::General).is_none() {
            warn!("no general collection registered; questions will only reach department collections");
        }
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
        info!(collections = count, "collection registry loaded");
        Ok(count)
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<Collection>> { self.snapshot().resolve(name) }

    pub fn list_departments(&self) -> BTreeSet<String> { self.snapshot().list_departments() }

    /// Cached health of a registered collection; `NotFound` for unknown names.
    pub fn health(&self, name: &str) -> Result<HealthStatus> {
        let collection = self.resolve(name)?;
        Ok(self.health_of(&collection.id))
    }

    /// Cached health; collections never probed count as available.
    pub fn health_of(&self, id: &CollectionId) -> HealthStatus {
        self.health.get(id).map(|e| e.status).unwrap_or(HealthStatus::Available)
    }

    pub fn health_entry(&self, id: &CollectionId) -> Option<HealthEntry> { self.health.get(id).map(|e| *e) }

    /// Probe every registered collection concurrently and update the cache.
    pub async fn refresh_health(&self) {
        let snapshot = self.snapshot();
        let probe_timeout = Duration::from_millis(self.health_settings.probe_timeout_ms);
        let mut set = JoinSet::new();
        for collection in snapshot.iter() {
            let collection = Arc::clone(collection);
            set.spawn(async move {
                let (status, _) = probe(collection.index.as_ref(), probe_timeout).await;
                (collection.id.clone(), status)
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, status)) => {
                    debug!(collection = %id, ?status, "health probed");
                    self.store_health(&id, status);
                }
                Err(e) => warn!(error = %e, "health probe task failed"),
            }
        }
    }

    /// Periodically refresh health until `cancel` fires.
    pub fn spawn_health_monitor(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let period = Duration::from_secs(self.health_settings.refresh_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => self.refresh_health().await,
                }
            }
            debug!("health monitor stopped");
        })
    }

    fn store_health(&self, id: &CollectionId, status: HealthStatus) {
        self.health.insert(id.clone(), HealthEntry { status, checked_at: Utc::now() });
    }

    fn routing_metadata(&self, id: &CollectionId) -> (String, Vec<String>) {
        let name_phrase = id.name().replace('_', " ");
        let configured = self.departments.get(id.name());
        let label = configured.map(|d| d.label.trim()).filter(|l| !l.is_empty()).map(str::to_string).unwrap_or_else(|| name_phrase.clone());
        let mut keywords = vec![name_phrase];
        if let Some(d) = configured { keywords.extend(d.keywords.iter().cloned()); }
        if !keywords.contains(&label) { keywords.push(label.clone()); }
        (label, keywords)
    }

    fn embed_label(&self, label: &str) -> Option<Vec<f32>> {
        let embedder = self.label_embedder.as_ref()?;
        match embedder.embed(label) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(label, error = %e, "label embedding failed; routing falls back to keywords");
                None
            }
        }
    }
}

/// The registered department `name` extends with a `_<regulation>` suffix,
/// longest match first.
fn regulation_parent(name: &str, registered: &BTreeSet<String>) -> Option<CollectionId> {
    registered
        .iter()
        .filter(|base| base.as_str() != name && base.as_str() != GENERAL_COLLECTION)
        .filter(|base| name.strip_prefix(base.as_str()).is_some_and(|rest| rest.len() > 1 && rest.starts_with('_')))
        .max_by_key(|base| base.len())
        .map(|base| CollectionId::from_name(base))
}

async fn probe(index: &dyn VectorIndex, timeout: Duration) -> (HealthStatus, usize) {
    match tokio::time::timeout(timeout, index.count()).await {
        Ok(Ok(0)) => (HealthStatus::Empty, 0),
        Ok(Ok(n)) => (HealthStatus::Available, n),
        Ok(Err(e)) => {
            warn!(error = %e, "collection probe failed");
            (HealthStatus::Unavailable, 0)
        }
        Err(_) => (HealthStatus::Unavailable, 0),
    }
}
