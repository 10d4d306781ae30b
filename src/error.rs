//! Error types for the configurator engine
//!
//! None of these are fatal to a configurator session. Fetch failures degrade
//! the view, stale results and invalid selections are dropped.

use std::fmt;

use thiserror::Error;

use crate::lead::LeadError;
use crate::types::EntityId;

/// Which of the three detail-page fetches a result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Entity,
    Variants,
    Inventory,
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchKind::Entity => "entity",
            FetchKind::Variants => "variants",
            FetchKind::Inventory => "inventory",
        };
        f.write_str(name)
    }
}

/// Which half of the selection a click referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Variant,
    Color,
}

impl fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionKind::Variant => f.write_str("variant"),
            SelectionKind::Color => f.write_str("color"),
        }
    }
}

/// Main error type for the configurator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfiguratorError {
    #[error("Failed to fetch {kind} for {entity_id}: {message}")]
    FetchFailure {
        kind: FetchKind,
        entity_id: EntityId,
        message: String,
    },

    #[error("Discarded {kind} result for {result_for} (generation {generation}, current {current})")]
    StaleResult {
        kind: FetchKind,
        result_for: EntityId,
        generation: u64,
        current: u64,
    },

    #[error("No {kind} '{id}' in the current list")]
    InvalidSelectionReference { kind: SelectionKind, id: String },

    #[error("No entity identifier is set")]
    NoIdentifier,

    #[error("Lead capture rejected the submission: {0}")]
    Lead(#[from] LeadError),

    #[error("Configurator session has shut down")]
    SessionClosed,
}

impl ConfiguratorError {
    /// Build a fetch failure from a fetcher's error chain
    pub fn fetch_failure(kind: FetchKind, entity_id: &EntityId, error: &anyhow::Error) -> Self {
        ConfiguratorError::FetchFailure {
            kind,
            entity_id: entity_id.clone(),
            message: format!("{error:#}"),
        }
    }
}

/// Result type for engine operations
pub type ConfiguratorResult<T> = Result<T, ConfiguratorError>;
