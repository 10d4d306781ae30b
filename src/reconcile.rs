//! Reconciliation Engine
//!
//! Merges the three independently arriving fetch results into one immutable
//! `ConfiguratorView`, rebuilt from scratch after every accepted event.
//!
//! Rules:
//! 1. An identifier change bumps the generation and clears entity, variants,
//!    inventory and selection before any new result is accepted.
//! 2. Results carry the `FetchTicket` they were issued under; anything from an
//!    older generation is discarded.
//! 3. A failed fetch is logged and leaves its collection as it was (empty on
//!    first load). Derivations run on whatever is present.
//! 4. Only `SelectionMachine` mutates the selection.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ConfiguratorConfig;
use crate::error::{ConfiguratorError, ConfiguratorResult, FetchKind};
use crate::fetch::{FetchOutcome, FetchTicket};
use crate::lead::LeadSubmission;
use crate::selection::{SelectionMachine, SelectionPhase, SelectionTransition};
use crate::types::{
    ColorId, ColorSwatch, Entity, EntityId, InventoryRecord, Selection, Variant, VariantId,
};
use crate::view::{self, DerivedView};

/// Progress of one fetch for the current identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LoadState {
    #[default]
    Pending,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStatus {
    pub entity: LoadState,
    pub variants: LoadState,
    pub inventory: LoadState,
}

impl LoadStatus {
    fn slot(&mut self, kind: FetchKind) -> &mut LoadState {
        match kind {
            FetchKind::Entity => &mut self.entity,
            FetchKind::Variants => &mut self.variants,
            FetchKind::Inventory => &mut self.inventory,
        }
    }

    pub fn is_settled(&self) -> bool {
        [self.entity, self.variants, self.inventory]
            .iter()
            .all(|s| *s != LoadState::Pending)
    }
}

/// Read-only view model published after every transition
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfiguratorView {
    pub entity_id: Option<EntityId>,
    pub generation: u64,
    pub entity: Option<Entity>,
    pub selection: Selection,
    pub phase: SelectionPhase,
    pub loads: LoadStatus,
    pub derived: DerivedView,
}

impl ConfiguratorView {
    pub fn price_label(&self, currency_symbol: &str) -> String {
        self.derived.price_label(currency_symbol)
    }

    /// What the "submit configuration" action hands to lead capture
    pub fn submission(&self) -> Option<LeadSubmission> {
        Some(LeadSubmission {
            entity_id: self.entity_id.clone()?,
            selected_variant_id: self.selection.variant_id.clone(),
            selected_color_id: self.selection.color_id.clone(),
        })
    }

    /// "Buying Honda City - Variant: ZX, Color: White"
    pub fn purchase_summary(&self) -> Option<String> {
        let entity = self.entity.as_ref()?;
        let variant = self
            .derived
            .selected_variant()
            .map(|v| v.name.as_str())
            .unwrap_or_default();
        let color = self
            .derived
            .selected_color()
            .map(|c| c.label.as_str())
            .unwrap_or_default();
        Some(format!(
            "Buying {} - Variant: {}, Color: {}",
            entity.name, variant, color
        ))
    }
}

pub struct ReconciliationEngine {
    colors: Vec<ColorSwatch>,
    generation: u64,
    current: Option<FetchTicket>,
    entity: Option<Entity>,
    variants: Vec<Variant>,
    inventory: Vec<InventoryRecord>,
    loads: LoadStatus,
    selection: SelectionMachine,
    view: Arc<ConfiguratorView>,
}

impl ReconciliationEngine {
    pub fn new(config: &ConfiguratorConfig) -> Self {
        Self {
            colors: config.colors.clone(),
            generation: 0,
            current: None,
            entity: None,
            variants: Vec::new(),
            inventory: Vec::new(),
            loads: LoadStatus::default(),
            selection: SelectionMachine::new(config.default_color.clone()),
            view: Arc::new(ConfiguratorView::default()),
        }
    }

    pub fn view(&self) -> Arc<ConfiguratorView> {
        self.view.clone()
    }

    /// Ticket for the identifier currently being configured
    pub fn current_ticket(&self) -> Option<&FetchTicket> {
        self.current.as_ref()
    }

    /// Switch to a new identifier.
    ///
    /// Returns the ticket to issue fetches under, or None if `id` is already current.
    pub fn on_identifier_changed(&mut self, id: EntityId) -> Option<FetchTicket> {
        if self.current.as_ref().map(|t| &t.entity_id) == Some(&id) {
            return None;
        }

        self.generation += 1;
        info!(entity_id = %id, generation = self.generation, "Identifier changed");

        let ticket = FetchTicket {
            entity_id: id,
            generation: self.generation,
        };
        self.current = Some(ticket.clone());
        self.entity = None;
        self.variants.clear();
        self.inventory.clear();
        self.loads = LoadStatus::default();

        // Only picks can be rejected; list and reset transitions always succeed
        let _ = self.selection.apply(SelectionTransition::IdentifierChanged);
        let _ = self
            .selection
            .apply(SelectionTransition::ColorEnumerationReady(self.colors.clone()));

        // Nothing from the previous identifier may survive, the image included
        self.view = Arc::new(ConfiguratorView::default());
        self.rebuild();
        Some(ticket)
    }

    /// Dispatch a tagged fetch completion
    pub fn on_fetch(&mut self, ticket: &FetchTicket, outcome: FetchOutcome) -> ConfiguratorResult<()> {
        match outcome {
            FetchOutcome::Entity(result) => self.on_entity_loaded(ticket, result),
            FetchOutcome::Variants(result) => self.on_variants_loaded(ticket, result),
            FetchOutcome::Inventory(result) => self.on_inventory_loaded(ticket, result),
        }
    }

    pub fn on_entity_loaded(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Entity>,
    ) -> ConfiguratorResult<()> {
        self.accept(ticket, FetchKind::Entity)?;
        let entity = self.loaded(ticket, FetchKind::Entity, result)?;
        self.entity = Some(entity);
        self.rebuild();
        Ok(())
    }

    pub fn on_variants_loaded(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<Variant>>,
    ) -> ConfiguratorResult<()> {
        self.accept(ticket, FetchKind::Variants)?;
        let variants = self.loaded(ticket, FetchKind::Variants, result)?;
        let ids = variants.iter().map(|v| v.id.clone()).collect();
        self.variants = variants;
        // Never rejected, see `on_identifier_changed`
        let _ = self
            .selection
            .apply(SelectionTransition::VariantListLoaded(ids));
        self.rebuild();
        Ok(())
    }

    pub fn on_inventory_loaded(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<InventoryRecord>>,
    ) -> ConfiguratorResult<()> {
        self.accept(ticket, FetchKind::Inventory)?;
        self.inventory = self.loaded(ticket, FetchKind::Inventory, result)?;
        self.rebuild();
        Ok(())
    }

    /// User clicked a variant. Ids not in the current list are ignored.
    pub fn on_variant_clicked(&mut self, id: VariantId) -> ConfiguratorResult<()> {
        self.select(SelectionTransition::SelectVariant(id))
    }

    /// User clicked a color. Ids not in the enumeration are ignored.
    pub fn on_color_clicked(&mut self, id: ColorId) -> ConfiguratorResult<()> {
        self.select(SelectionTransition::SelectColor(id))
    }

    fn select(&mut self, transition: SelectionTransition) -> ConfiguratorResult<()> {
        if let Err(e) = self.selection.apply(transition) {
            debug!(error = %e, "Ignoring selection");
            return Err(e);
        }
        self.rebuild();
        Ok(())
    }

    /// Reject results that were not issued under the current ticket
    fn accept(&self, ticket: &FetchTicket, kind: FetchKind) -> ConfiguratorResult<()> {
        let Some(current) = &self.current else {
            debug!(%kind, entity_id = %ticket.entity_id, "Result arrived with no identifier set");
            return Err(ConfiguratorError::NoIdentifier);
        };
        if current != ticket {
            debug!(
                %kind,
                entity_id = %ticket.entity_id,
                generation = ticket.generation,
                current = current.generation,
                "Discarding stale result"
            );
            return Err(ConfiguratorError::StaleResult {
                kind,
                result_for: ticket.entity_id.clone(),
                generation: ticket.generation,
                current: current.generation,
            });
        }
        Ok(())
    }

    /// Record load state; failures keep whatever was loaded before
    fn loaded<T>(
        &mut self,
        ticket: &FetchTicket,
        kind: FetchKind,
        result: Result<T>,
    ) -> ConfiguratorResult<T> {
        match result {
            Ok(value) => {
                *self.loads.slot(kind) = LoadState::Loaded;
                Ok(value)
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!(%kind, entity_id = %ticket.entity_id, error = %message, "Fetch failed");
                let slot = self.loads.slot(kind);
                if *slot == LoadState::Pending {
                    *slot = LoadState::Failed;
                }
                // The view still reflects the new load state
                self.rebuild();
                Err(ConfiguratorError::fetch_failure(kind, &ticket.entity_id, &e))
            }
        }
    }

    fn rebuild(&mut self) {
        let selection = self.selection.selection().clone();
        let derived = view::build(
            self.entity.as_ref(),
            &self.variants,
            &self.colors,
            &self.inventory,
            &selection,
            &self.view.derived.image_url,
        );
        self.view = Arc::new(ConfiguratorView {
            entity_id: self.current.as_ref().map(|t| t.entity_id.clone()),
            generation: self.generation,
            entity: self.entity.clone(),
            selection,
            phase: self.selection.phase(),
            loads: self.loads,
            derived,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn entity(id: &str) -> Entity {
        Entity {
            id: id.into(),
            name: "Honda City".to_string(),
            description: "Sedan".to_string(),
            base_price: Some(Decimal::from(500_000)),
            warranty_years: Some(3),
            services: vec!["Roadside assistance".to_string()],
            image_url: None,
        }
    }

    fn variants(entity_id: &str) -> Vec<Variant> {
        vec![
            Variant {
                id: "V1".into(),
                entity_id: entity_id.into(),
                name: "SV".to_string(),
                price: Some(Decimal::from(600_000)),
            },
            Variant {
                id: "V2".into(),
                entity_id: entity_id.into(),
                name: "ZX".to_string(),
                price: Some(Decimal::from(650_000)),
            },
        ]
    }

    fn inventory() -> Vec<InventoryRecord> {
        vec![InventoryRecord {
            id: "INV1".into(),
            variant_id: "V1".into(),
            color: "White".to_string(),
            image_url: "u1".to_string(),
            quantity: 5,
        }]
    }

    fn engine() -> ReconciliationEngine {
        ReconciliationEngine::new(&ConfiguratorConfig::default())
    }

    #[derive(Clone, Copy)]
    enum Load {
        Entity,
        Variants,
        Inventory,
    }

    fn deliver(engine: &mut ReconciliationEngine, ticket: &FetchTicket, load: Load) {
        let result = match load {
            Load::Entity => engine.on_entity_loaded(ticket, Ok(entity("CAR1"))),
            Load::Variants => engine.on_variants_loaded(ticket, Ok(variants("CAR1"))),
            Load::Inventory => engine.on_inventory_loaded(ticket, Ok(inventory())),
        };
        result.unwrap();
    }

    #[test]
    fn test_fetch_order_commutes() {
        let (e, v, i) = (Load::Entity, Load::Variants, Load::Inventory);
        let orders = [
            [e, v, i],
            [e, i, v],
            [v, e, i],
            [v, i, e],
            [i, e, v],
            [i, v, e],
        ];

        let mut views = Vec::new();
        for order in orders {
            let mut engine = engine();
            let ticket = engine.on_identifier_changed("CAR1".into()).unwrap();
            for load in order {
                deliver(&mut engine, &ticket, load);
            }
            views.push(engine.view());
        }

        let first = &views[0];
        assert_eq!(first.derived.price, Some(Decimal::from(600_000)));
        assert_eq!(first.derived.quantity, 5);
        assert_eq!(first.derived.image_url, "u1");
        assert_eq!(first.selection.variant_id, Some("V1".into()));
        assert_eq!(first.selection.color_id, Some("white".into()));
        for view in &views[1..] {
            assert_eq!(view, first);
        }
    }

    #[test]
    fn test_price_example() {
        let mut engine = engine();
        let ticket = engine.on_identifier_changed("CAR1".into()).unwrap();
        engine.on_entity_loaded(&ticket, Ok(entity("CAR1"))).unwrap();
        assert_eq!(engine.view().derived.price, Some(Decimal::from(500_000)));

        engine.on_variants_loaded(&ticket, Ok(variants("CAR1"))).unwrap();
        assert_eq!(engine.view().derived.price, Some(Decimal::from(600_000)));
        assert_eq!(engine.view().phase, SelectionPhase::DefaultSelected);

        engine.on_variant_clicked("V2".into()).unwrap();
        let view = engine.view();
        assert_eq!(view.derived.price, Some(Decimal::from(650_000)));
        assert_eq!(view.price_label("₹"), "₹650000");
        assert_eq!(view.phase, SelectionPhase::UserSelected);
    }

    #[test]
    fn test_color_without_record_keeps_image() {
        let mut engine = engine();
        let ticket = engine.on_identifier_changed("CAR1".into()).unwrap();
        deliver(&mut engine, &ticket, Load::Variants);
        deliver(&mut engine, &ticket, Load::Inventory);
        assert_eq!(engine.view().derived.quantity, 5);

        engine.on_color_clicked("black".into()).unwrap();
        let view = engine.view();
        assert_eq!(view.derived.quantity, 0);
        assert_eq!(view.derived.image_url, "u1");
    }

    #[test]
    fn test_invalid_click_leaves_view_untouched() {
        let mut engine = engine();
        let ticket = engine.on_identifier_changed("CAR1".into()).unwrap();
        deliver(&mut engine, &ticket, Load::Variants);
        let before = engine.view();

        assert!(matches!(
            engine.on_variant_clicked("V9".into()),
            Err(ConfiguratorError::InvalidSelectionReference { .. })
        ));
        assert_eq!(engine.view(), before);
    }

    #[test]
    fn test_stale_results_discarded_after_identifier_change() {
        let mut engine = engine();
        let old = engine.on_identifier_changed("CAR1".into()).unwrap();
        deliver(&mut engine, &old, Load::Entity);
        deliver(&mut engine, &old, Load::Variants);

        let new = engine.on_identifier_changed("CAR2".into()).unwrap();
        let view = engine.view();
        assert_eq!(view.entity, None);
        assert!(view.selection.is_empty());
        assert!(view.derived.variant_options.is_empty());
        assert_eq!(view.derived.price, None);

        let err = engine
            .on_inventory_loaded(&old, Ok(inventory()))
            .unwrap_err();
        assert!(matches!(err, ConfiguratorError::StaleResult { .. }));
        assert!(engine.on_entity_loaded(&old, Ok(entity("CAR1"))).is_err());
        assert_eq!(engine.view().entity, None);
        assert_eq!(engine.view().derived.image_url, "");

        engine.on_entity_loaded(&new, Ok(entity("CAR2"))).unwrap();
        assert_eq!(engine.view().entity_id, Some("CAR2".into()));
    }

    #[test]
    fn test_same_identifier_is_idempotent() {
        let mut engine = engine();
        let ticket = engine.on_identifier_changed("CAR1".into()).unwrap();
        deliver(&mut engine, &ticket, Load::Variants);
        engine.on_variant_clicked("V2".into()).unwrap();

        assert_eq!(engine.on_identifier_changed("CAR1".into()), None);
        assert_eq!(engine.view().selection.variant_id, Some("V2".into()));
    }

    #[test]
    fn test_late_refetch_does_not_override_user_choice() {
        let mut engine = engine();
        let ticket = engine.on_identifier_changed("CAR1".into()).unwrap();
        deliver(&mut engine, &ticket, Load::Variants);
        engine.on_variant_clicked("V2".into()).unwrap();
        engine.on_color_clicked("brown".into()).unwrap();

        deliver(&mut engine, &ticket, Load::Variants);
        deliver(&mut engine, &ticket, Load::Inventory);
        let view = engine.view();
        assert_eq!(view.selection.variant_id, Some("V2".into()));
        assert_eq!(view.selection.color_id, Some("brown".into()));
    }

    #[test]
    fn test_fetch_failure_degrades_gracefully() {
        let mut engine = engine();
        let ticket = engine.on_identifier_changed("CAR1".into()).unwrap();
        engine.on_entity_loaded(&ticket, Ok(entity("CAR1"))).unwrap();

        let err = engine
            .on_variants_loaded(&ticket, Err(anyhow!("timeout")))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfiguratorError::FetchFailure {
                kind: FetchKind::Variants,
                ..
            }
        ));
        let view = engine.view();
        assert_eq!(view.loads.variants, LoadState::Failed);
        assert!(view.derived.variant_options.is_empty());
        assert!(view.derived.color_options.is_empty());
        assert_eq!(view.derived.price, Some(Decimal::from(500_000)));
        assert_eq!(view.phase, SelectionPhase::Uninitialized);
    }

    #[test]
    fn test_refetch_failure_keeps_loaded_data() {
        let mut engine = engine();
        let ticket = engine.on_identifier_changed("CAR1".into()).unwrap();
        deliver(&mut engine, &ticket, Load::Variants);
        assert!(engine
            .on_variants_loaded(&ticket, Err(anyhow!("timeout")))
            .is_err());
        let view = engine.view();
        assert_eq!(view.loads.variants, LoadState::Loaded);
        assert_eq!(view.derived.variant_options.len(), 2);
    }

    #[test]
    fn test_results_before_any_identifier() {
        let mut engine = engine();
        let ticket = FetchTicket {
            entity_id: "CAR1".into(),
            generation: 1,
        };
        assert_eq!(
            engine.on_entity_loaded(&ticket, Ok(entity("CAR1"))),
            Err(ConfiguratorError::NoIdentifier)
        );
    }

    #[test]
    fn test_submission_and_summary() {
        let mut engine = engine();
        assert_eq!(engine.view().submission(), None);

        let ticket = engine.on_identifier_changed("CAR1".into()).unwrap();
        deliver(&mut engine, &ticket, Load::Entity);
        deliver(&mut engine, &ticket, Load::Variants);
        engine.on_variant_clicked("V2".into()).unwrap();

        let view = engine.view();
        let submission = view.submission().unwrap();
        assert_eq!(submission.entity_id, EntityId::new("CAR1"));
        assert_eq!(submission.selected_variant_id, Some("V2".into()));
        assert_eq!(submission.selected_color_id, Some("white".into()));
        assert_eq!(
            view.purchase_summary().unwrap(),
            "Buying Honda City - Variant: ZX, Color: White"
        );
        assert!(view.loads.entity == LoadState::Loaded && !view.loads.is_settled());
    }
}
