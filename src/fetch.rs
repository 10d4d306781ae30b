//! Data Fetchers
//!
//! `CatalogSource` is the request/response seam for the three detail-page
//! fetches (plus the browse listing). The transport behind it is not our
//! concern; `MemoryCatalog` is the in-process backend used by the demo and tests.
//!
//! A `FetchSubscription` runs the three fetches for one identifier and reports
//! each completion through a callback tagged with the `FetchTicket` it was
//! issued under. Dropping the subscription aborts whatever is still in flight.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::error::FetchKind;
use crate::types::{CatalogEntry, Entity, EntityId, InventoryRecord, Variant};

/// Catalog access for the configurator.
///
/// Each method may be called again for the same id (refetch) and may be
/// superseded by a call for another id before it responds.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_entity(&self, id: &EntityId) -> Result<Entity>;
    /// Variants in display order; the first one is the default selection
    async fn fetch_variants(&self, id: &EntityId) -> Result<Vec<Variant>>;
    async fn fetch_inventory(&self, id: &EntityId) -> Result<Vec<InventoryRecord>>;
    /// Browse listing of every entity
    async fn list_entities(&self) -> Result<Vec<CatalogEntry>>;
}

// =============================================================================
// TICKETS AND SUBSCRIPTIONS
// =============================================================================

/// Identifier and generation a fetch was issued under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub entity_id: EntityId,
    /// Bumped on every identifier change, never on refetch
    pub generation: u64,
}

/// Completion of one fetch
#[derive(Debug)]
pub enum FetchOutcome {
    Entity(Result<Entity>),
    Variants(Result<Vec<Variant>>),
    Inventory(Result<Vec<InventoryRecord>>),
}

impl FetchOutcome {
    pub fn kind(&self) -> FetchKind {
        match self {
            FetchOutcome::Entity(_) => FetchKind::Entity,
            FetchOutcome::Variants(_) => FetchKind::Variants,
            FetchOutcome::Inventory(_) => FetchKind::Inventory,
        }
    }
}

/// Callback receiving tagged completions
pub type FetchCallback = Arc<dyn Fn(FetchTicket, FetchOutcome) + Send + Sync>;

/// Handle over the in-flight fetches for one ticket
#[derive(Debug)]
pub struct FetchSubscription {
    handles: Vec<AbortHandle>,
}

impl FetchSubscription {
    /// Spawn the three fetches for `ticket` on the current tokio runtime
    pub fn start(
        source: Arc<dyn CatalogSource>,
        ticket: FetchTicket,
        callback: FetchCallback,
    ) -> Self {
        debug!(entity_id = %ticket.entity_id, generation = ticket.generation, "Starting fetches");

        let handles = [FetchKind::Entity, FetchKind::Variants, FetchKind::Inventory]
            .into_iter()
            .map(|kind| {
                let source = source.clone();
                let ticket = ticket.clone();
                let callback = callback.clone();
                tokio::spawn(async move {
                    let id = &ticket.entity_id;
                    let outcome = match kind {
                        FetchKind::Entity => FetchOutcome::Entity(source.fetch_entity(id).await),
                        FetchKind::Variants => {
                            FetchOutcome::Variants(source.fetch_variants(id).await)
                        }
                        FetchKind::Inventory => {
                            FetchOutcome::Inventory(source.fetch_inventory(id).await)
                        }
                    };
                    callback(ticket, outcome);
                })
                .abort_handle()
            })
            .collect();

        Self { handles }
    }

    /// Abort every fetch still in flight
    pub fn cancel(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for FetchSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

// =============================================================================
// IN-MEMORY CATALOG
// =============================================================================

#[derive(Default)]
struct CatalogData {
    entities: HashMap<EntityId, Entity>,
    variants: HashMap<EntityId, Vec<Variant>>,
    inventory: HashMap<EntityId, Vec<InventoryRecord>>,
    latency: HashMap<(EntityId, FetchKind), Duration>,
    failing: HashSet<(EntityId, FetchKind)>,
    calls: HashMap<FetchKind, usize>,
}

/// In-process catalog with per-fetch latency and failure injection
#[derive(Default)]
pub struct MemoryCatalog {
    data: RwLock<CatalogData>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity together with its variants and inventory
    pub async fn insert(
        &self,
        entity: Entity,
        variants: Vec<Variant>,
        inventory: Vec<InventoryRecord>,
    ) {
        let mut data = self.data.write().await;
        let id = entity.id.clone();
        data.variants.insert(id.clone(), variants);
        data.inventory.insert(id.clone(), inventory);
        data.entities.insert(id, entity);
    }

    pub async fn set_inventory(&self, id: &EntityId, inventory: Vec<InventoryRecord>) {
        self.data.write().await.inventory.insert(id.clone(), inventory);
    }

    /// Delay every `kind` fetch for `id` by `delay`
    pub async fn set_latency(&self, id: &EntityId, kind: FetchKind, delay: Duration) {
        self.data
            .write()
            .await
            .latency
            .insert((id.clone(), kind), delay);
    }

    /// Make every `kind` fetch for `id` fail until cleared
    pub async fn set_failing(&self, id: &EntityId, kind: FetchKind, failing: bool) {
        let mut data = self.data.write().await;
        if failing {
            data.failing.insert((id.clone(), kind));
        } else {
            data.failing.remove(&(id.clone(), kind));
        }
    }

    /// Number of `kind` fetches served so far
    pub async fn calls(&self, kind: FetchKind) -> usize {
        self.data.read().await.calls.get(&kind).copied().unwrap_or(0)
    }

    /// Count the call, wait out any latency, then report injected failure
    async fn begin(&self, id: &EntityId, kind: FetchKind) -> Result<()> {
        let (delay, failing) = {
            let mut data = self.data.write().await;
            *data.calls.entry(kind).or_insert(0) += 1;
            let key = (id.clone(), kind);
            (data.latency.get(&key).copied(), data.failing.contains(&key))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(anyhow!("{kind} fetch failed for {id}"));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for MemoryCatalog {
    async fn fetch_entity(&self, id: &EntityId) -> Result<Entity> {
        self.begin(id, FetchKind::Entity).await?;
        self.data
            .read()
            .await
            .entities
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("entity {id} not found"))
    }

    async fn fetch_variants(&self, id: &EntityId) -> Result<Vec<Variant>> {
        self.begin(id, FetchKind::Variants).await?;
        Ok(self
            .data
            .read()
            .await
            .variants
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_inventory(&self, id: &EntityId) -> Result<Vec<InventoryRecord>> {
        self.begin(id, FetchKind::Inventory).await?;
        Ok(self
            .data
            .read()
            .await
            .inventory
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_entities(&self) -> Result<Vec<CatalogEntry>> {
        let data = self.data.read().await;
        let mut entries: Vec<CatalogEntry> = data.entities.values().map(CatalogEntry::from).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
