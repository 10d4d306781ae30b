//! Configurator Engine - product detail page state
//!
//! Reconciles three independently fetched data sets (entity, variants,
//! inventory) into one consistent (variant, color) selection with derived
//! price, quantity and image, and schedules image transitions when the
//! selection changes.
//!
//! Layers, leaves first:
//! - `identifier` / `fetch`: where the entity id and its data come from
//! - `selection`: the only owner of the selection pair
//! - `view`: pure derivation of options, price, quantity and image
//! - `reconcile`: merges tagged fetch results into an immutable view model
//! - `transition`: latest-wins image swap scheduling
//! - `session`: the serialized event loop tying it all together

pub mod config;
pub mod error;
pub mod fetch;
pub mod identifier;
pub mod lead;
pub mod reconcile;
pub mod selection;
pub mod session;
pub mod transition;
pub mod types;
pub mod view;

pub use config::{ConfigError, ConfiguratorConfig};
pub use error::{ConfiguratorError, ConfiguratorResult, FetchKind, SelectionKind};
pub use fetch::{CatalogSource, FetchSubscription, FetchTicket, MemoryCatalog};
pub use identifier::{
    detail_link, identifier_channel, IdentifierPublisher, IdentifierSource, PageReference,
};
pub use lead::{
    ContactForm, ContactFormCapture, DealRequest, LeadCapture, LeadError, LeadSubmission,
};
pub use reconcile::{ConfiguratorView, LoadState, LoadStatus, ReconciliationEngine};
pub use selection::{SelectionMachine, SelectionPhase, SelectionTransition};
pub use session::{ConfiguratorHandle, ConfiguratorSession, SessionEvent, SessionSnapshot};
pub use transition::{ImageState, TransitionPhase, TransitionScheduler};
pub use types::{
    CatalogEntry, ColorId, ColorSwatch, Entity, EntityId, InventoryRecord, Selection, Variant,
    VariantId,
};
pub use view::{format_price, ColorOption, DerivedView, VariantOption};
