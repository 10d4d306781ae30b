//! Selection State Machine
//!
//! Owns the (variant, color) pair. Every mutation of the selection goes through
//! `SelectionMachine::apply`, which takes a declarative `SelectionTransition`.
//!
//! Defaults are applied exactly once per identifier lifetime, by whichever of
//! the variant list and the color enumeration becomes available second. After
//! that, late-arriving lists never override what is selected.

use serde::Serialize;

use crate::error::{ConfiguratorError, ConfiguratorResult, SelectionKind};
use crate::types::{ColorId, ColorSwatch, Selection, VariantId};

/// Where the machine is in the identifier lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SelectionPhase {
    /// Variant list or color enumeration not yet available
    #[default]
    Uninitialized,
    /// Defaults applied, user has not picked anything
    DefaultSelected,
    /// User picked a variant or color
    UserSelected,
}

/// Describes a selection transition
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionTransition {
    /// Variant ids in fetch order
    VariantListLoaded(Vec<VariantId>),
    /// The fixed color enumeration became available for this identifier
    ColorEnumerationReady(Vec<ColorSwatch>),
    SelectVariant(VariantId),
    SelectColor(ColorId),
    /// Return to `Uninitialized`, dropping the selection and both lists
    IdentifierChanged,
}

#[derive(Debug, Clone)]
pub struct SelectionMachine {
    phase: SelectionPhase,
    selection: Selection,
    variant_ids: Vec<VariantId>,
    colors: Vec<ColorSwatch>,
    /// Preferred default color label
    default_color: String,
    /// A pick arrived before defaults could be applied
    picked_early: bool,
}

impl SelectionMachine {
    pub fn new(default_color: impl Into<String>) -> Self {
        Self {
            phase: SelectionPhase::Uninitialized,
            selection: Selection::default(),
            variant_ids: Vec::new(),
            colors: Vec::new(),
            default_color: default_color.into(),
            picked_early: false,
        }
    }

    pub fn phase(&self) -> SelectionPhase {
        self.phase
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Apply a transition.
    ///
    /// A pick referencing an id that is not in the current list returns
    /// `InvalidSelectionReference` and leaves the machine untouched.
    pub fn apply(&mut self, transition: SelectionTransition) -> ConfiguratorResult<&Selection> {
        match transition {
            SelectionTransition::VariantListLoaded(ids) => {
                self.variant_ids = ids;
                if self.phase != SelectionPhase::Uninitialized {
                    self.repair_variant();
                }
                self.try_apply_defaults();
            }

            SelectionTransition::ColorEnumerationReady(colors) => {
                self.colors = colors;
                if self.phase != SelectionPhase::Uninitialized {
                    self.repair_color();
                }
                self.try_apply_defaults();
            }

            SelectionTransition::SelectVariant(id) => {
                if !self.variant_ids.contains(&id) {
                    return Err(ConfiguratorError::InvalidSelectionReference {
                        kind: SelectionKind::Variant,
                        id: id.0,
                    });
                }
                self.selection.variant_id = Some(id);
                self.mark_user_pick();
            }

            SelectionTransition::SelectColor(id) => {
                if !self.colors.iter().any(|c| c.id == id) {
                    return Err(ConfiguratorError::InvalidSelectionReference {
                        kind: SelectionKind::Color,
                        id: id.0,
                    });
                }
                self.selection.color_id = Some(id);
                self.mark_user_pick();
            }

            SelectionTransition::IdentifierChanged => {
                self.phase = SelectionPhase::Uninitialized;
                self.selection = Selection::default();
                self.variant_ids.clear();
                self.colors.clear();
                self.picked_early = false;
            }
        }

        Ok(&self.selection)
    }

    fn mark_user_pick(&mut self) {
        if self.phase == SelectionPhase::Uninitialized {
            self.picked_early = true;
        } else {
            self.phase = SelectionPhase::UserSelected;
        }
    }

    /// Fill whichever halves are still empty, once both lists are available
    fn try_apply_defaults(&mut self) {
        if self.phase != SelectionPhase::Uninitialized
            || self.variant_ids.is_empty()
            || self.colors.is_empty()
        {
            return;
        }

        if self.selection.variant_id.is_none() {
            self.selection.variant_id = self.variant_ids.first().cloned();
        }
        if self.selection.color_id.is_none() {
            self.selection.color_id = self.default_color_id();
        }
        self.phase = if self.picked_early {
            SelectionPhase::UserSelected
        } else {
            SelectionPhase::DefaultSelected
        };
    }

    /// "White" (or the configured label) if present, else the first swatch
    fn default_color_id(&self) -> Option<ColorId> {
        self.colors
            .iter()
            .find(|c| c.label.eq_ignore_ascii_case(&self.default_color))
            .or_else(|| self.colors.first())
            .map(|c| c.id.clone())
    }

    /// A refetched list no longer contains the selected variant
    fn repair_variant(&mut self) {
        let missing = match &self.selection.variant_id {
            Some(id) => !self.variant_ids.contains(id),
            None => true,
        };
        if missing {
            tracing::debug!(
                previous = ?self.selection.variant_id,
                "Selected variant missing from refetched list, falling back to first"
            );
            self.selection.variant_id = self.variant_ids.first().cloned();
        }
    }

    fn repair_color(&mut self) {
        let missing = match &self.selection.color_id {
            Some(id) => !self.colors.iter().any(|c| &c.id == id),
            None => true,
        };
        if missing {
            self.selection.color_id = self.default_color_id();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::default_swatches;

    fn ids(list: &[&str]) -> Vec<VariantId> {
        list.iter().map(|s| VariantId::from(*s)).collect()
    }

    #[test]
    fn test_defaults_wait_for_both_lists() {
        let mut machine = SelectionMachine::new("White");

        machine
            .apply(SelectionTransition::VariantListLoaded(ids(&["V1", "V2"])))
            .unwrap();
        assert_eq!(machine.phase(), SelectionPhase::Uninitialized);
        assert!(machine.selection().is_empty());

        machine
            .apply(SelectionTransition::ColorEnumerationReady(default_swatches()))
            .unwrap();
        assert_eq!(machine.phase(), SelectionPhase::DefaultSelected);
        assert_eq!(machine.selection().variant_id, Some("V1".into()));
        assert_eq!(machine.selection().color_id, Some("white".into()));
    }

    #[test]
    fn test_defaults_colors_first() {
        let mut machine = SelectionMachine::new("White");
        machine
            .apply(SelectionTransition::ColorEnumerationReady(default_swatches()))
            .unwrap();
        assert_eq!(machine.phase(), SelectionPhase::Uninitialized);
        machine
            .apply(SelectionTransition::VariantListLoaded(ids(&["V1"])))
            .unwrap();
        assert_eq!(machine.phase(), SelectionPhase::DefaultSelected);
    }

    #[test]
    fn test_empty_variant_list_stays_pending() {
        let mut machine = SelectionMachine::new("White");
        machine
            .apply(SelectionTransition::ColorEnumerationReady(default_swatches()))
            .unwrap();
        machine
            .apply(SelectionTransition::VariantListLoaded(vec![]))
            .unwrap();
        assert_eq!(machine.phase(), SelectionPhase::Uninitialized);
        assert!(machine.selection().is_empty());
    }

    #[test]
    fn test_default_color_falls_back_to_first() {
        let mut machine = SelectionMachine::new("White");
        machine
            .apply(SelectionTransition::ColorEnumerationReady(vec![
                ColorSwatch::new("red", "Red"),
                ColorSwatch::new("blue", "Blue"),
            ]))
            .unwrap();
        machine
            .apply(SelectionTransition::VariantListLoaded(ids(&["V1"])))
            .unwrap();
        assert_eq!(machine.selection().color_id, Some("red".into()));
    }

    #[test]
    fn test_invalid_pick_is_rejected_without_change() {
        let mut machine = SelectionMachine::new("White");
        machine
            .apply(SelectionTransition::ColorEnumerationReady(default_swatches()))
            .unwrap();
        machine
            .apply(SelectionTransition::VariantListLoaded(ids(&["V1", "V2"])))
            .unwrap();
        let before = machine.selection().clone();

        let err = machine
            .apply(SelectionTransition::SelectVariant("V9".into()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfiguratorError::InvalidSelectionReference {
                kind: SelectionKind::Variant,
                ..
            }
        ));
        assert!(machine
            .apply(SelectionTransition::SelectColor("teal".into()))
            .is_err());
        assert_eq!(machine.selection(), &before);
        assert_eq!(machine.phase(), SelectionPhase::DefaultSelected);
    }

    #[test]
    fn test_user_pick_survives_refetch() {
        let mut machine = SelectionMachine::new("White");
        machine
            .apply(SelectionTransition::ColorEnumerationReady(default_swatches()))
            .unwrap();
        machine
            .apply(SelectionTransition::VariantListLoaded(ids(&["V1", "V2"])))
            .unwrap();
        machine
            .apply(SelectionTransition::SelectVariant("V2".into()))
            .unwrap();
        machine
            .apply(SelectionTransition::SelectColor("black".into()))
            .unwrap();
        assert_eq!(machine.phase(), SelectionPhase::UserSelected);

        machine
            .apply(SelectionTransition::VariantListLoaded(ids(&["V1", "V2"])))
            .unwrap();
        assert_eq!(machine.selection().variant_id, Some("V2".into()));
        assert_eq!(machine.selection().color_id, Some("black".into()));
        assert_eq!(machine.phase(), SelectionPhase::UserSelected);
    }

    #[test]
    fn test_refetch_without_selected_variant_falls_back() {
        let mut machine = SelectionMachine::new("White");
        machine
            .apply(SelectionTransition::ColorEnumerationReady(default_swatches()))
            .unwrap();
        machine
            .apply(SelectionTransition::VariantListLoaded(ids(&["V1", "V2"])))
            .unwrap();
        machine
            .apply(SelectionTransition::SelectVariant("V2".into()))
            .unwrap();
        machine
            .apply(SelectionTransition::VariantListLoaded(ids(&["V3"])))
            .unwrap();
        assert_eq!(machine.selection().variant_id, Some("V3".into()));
        assert_eq!(machine.phase(), SelectionPhase::UserSelected);
    }

    #[test]
    fn test_early_color_pick_is_kept_by_defaults() {
        let mut machine = SelectionMachine::new("White");
        machine
            .apply(SelectionTransition::ColorEnumerationReady(default_swatches()))
            .unwrap();
        machine
            .apply(SelectionTransition::SelectColor("brown".into()))
            .unwrap();
        assert_eq!(machine.phase(), SelectionPhase::Uninitialized);

        machine
            .apply(SelectionTransition::VariantListLoaded(ids(&["V1"])))
            .unwrap();
        assert_eq!(machine.selection().color_id, Some("brown".into()));
        assert_eq!(machine.selection().variant_id, Some("V1".into()));
        assert_eq!(machine.phase(), SelectionPhase::UserSelected);
    }

    #[test]
    fn test_identifier_change_resets() {
        let mut machine = SelectionMachine::new("White");
        machine
            .apply(SelectionTransition::ColorEnumerationReady(default_swatches()))
            .unwrap();
        machine
            .apply(SelectionTransition::VariantListLoaded(ids(&["V1"])))
            .unwrap();
        machine.apply(SelectionTransition::IdentifierChanged).unwrap();

        assert_eq!(machine.phase(), SelectionPhase::Uninitialized);
        assert!(machine.selection().is_empty());
        assert!(machine
            .apply(SelectionTransition::SelectVariant("V1".into()))
            .is_err());
    }

    #[test]
    fn test_list_transitions_never_reject() {
        let mut machine = SelectionMachine::new("White");
        machine
            .apply(SelectionTransition::SelectColor("black".into()))
            .unwrap_err();

        // Empty, shrinking and reset lists are all accepted
        for transition in [
            SelectionTransition::VariantListLoaded(vec![]),
            SelectionTransition::ColorEnumerationReady(vec![]),
            SelectionTransition::ColorEnumerationReady(default_swatches()),
            SelectionTransition::VariantListLoaded(ids(&["V1", "V2"])),
            SelectionTransition::VariantListLoaded(ids(&["V2"])),
            SelectionTransition::ColorEnumerationReady(vec![]),
            SelectionTransition::IdentifierChanged,
            SelectionTransition::IdentifierChanged,
        ] {
            assert!(machine.apply(transition).is_ok());
        }
        assert!(machine.selection().is_empty());
    }
}
