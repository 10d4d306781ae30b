//! Configurator Data Types
//!
//! Records fetched from the catalog (entity, variants, inventory) plus the
//! design-time color swatches and the selection pair they are reconciled into.
//!
//! Fetched records are never modified locally; a refetch replaces them wholesale.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of the product being configured (e.g. a car model)
    EntityId
);
string_id!(
    /// Identifier of a purchasable variant
    VariantId
);
string_id!(
    /// Identifier of a color swatch in the configured enumeration
    ColorId
);
string_id!(
    /// Identifier of an inventory record
    InventoryId
);

// =============================================================================
// FETCHED RECORDS
// =============================================================================

/// The product record being configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_price: Option<Decimal>,
    /// Warranty in years
    pub warranty_years: Option<u32>,
    #[serde(default)]
    pub services: Vec<String>,
    /// Hero image shown until a color image resolves
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A purchasable configuration of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub entity_id: EntityId,
    pub name: String,
    pub price: Option<Decimal>,
}

/// Stock and image data for one (variant, color) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: InventoryId,
    pub variant_id: VariantId,
    /// Free-form color label, matched case-insensitively against swatches
    pub color: String,
    #[serde(default)]
    pub image_url: String,
    pub quantity: u32,
}

impl InventoryRecord {
    pub fn matches_color(&self, label: &str) -> bool {
        self.color.eq_ignore_ascii_case(label)
    }
}

// =============================================================================
// DESIGN-TIME COLORS
// =============================================================================

/// One entry of the fixed color enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSwatch {
    pub id: ColorId,
    pub label: String,
}

impl ColorSwatch {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: ColorId::new(id),
            label: label.into(),
        }
    }
}

/// The stock enumeration: Black, Brown, White
pub fn default_swatches() -> Vec<ColorSwatch> {
    vec![
        ColorSwatch::new("black", "Black"),
        ColorSwatch::new("brown", "Brown"),
        ColorSwatch::new("white", "White"),
    ]
}

// =============================================================================
// SELECTION
// =============================================================================

/// Current (variant, color) choice. Both halves stay empty until defaults apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub variant_id: Option<VariantId>,
    pub color_id: Option<ColorId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.variant_id.is_none() && self.color_id.is_none()
    }
}

// =============================================================================
// BROWSE LISTING
// =============================================================================

/// Summary card for the browse page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: EntityId,
    pub name: String,
    pub image: String,
    pub description: String,
    pub base_price: Option<Decimal>,
    pub warranty_years: Option<u32>,
    pub services: Vec<String>,
}

impl From<&Entity> for CatalogEntry {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            name: entity.name.clone(),
            image: entity.image_url.clone().unwrap_or_default(),
            description: entity.description.clone(),
            base_price: entity.base_price,
            warranty_years: entity.warranty_years,
            services: entity.services.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_match_ignores_case() {
        let record = InventoryRecord {
            id: "INV1".into(),
            variant_id: "V1".into(),
            color: "WHITE".to_string(),
            image_url: String::new(),
            quantity: 1,
        };
        assert!(record.matches_color("White"));
        assert!(!record.matches_color("Black"));
    }

    #[test]
    fn test_catalog_entry_without_image() {
        let entity = Entity {
            id: "CAR1".into(),
            name: "Honda City".to_string(),
            description: "Sedan".to_string(),
            base_price: Some(Decimal::from(500_000)),
            warranty_years: Some(3),
            services: vec!["Free service".to_string()],
            image_url: None,
        };
        let entry = CatalogEntry::from(&entity);
        assert_eq!(entry.image, "");
        assert_eq!(entry.base_price, Some(Decimal::from(500_000)));
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&VariantId::new("V1")).unwrap();
        assert_eq!(json, "\"V1\"");
    }
}
