//! Derived View Builder
//!
//! Pure functions from (entity, variants, colors, inventory, selection) to
//! the renderable option lists and the dependent price/quantity/image values.
//! Nothing here is cached; the engine rebuilds the view after every transition.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{
    ColorId, ColorSwatch, Entity, InventoryRecord, Selection, Variant, VariantId,
};

/// A variant button
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantOption {
    pub id: VariantId,
    pub name: String,
    pub price: Option<Decimal>,
    pub selected: bool,
}

/// A color swatch resolved against inventory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorOption {
    pub id: ColorId,
    pub label: String,
    /// Empty when no inventory record carries this color
    pub image_url: String,
    /// Stock for (selected variant, this color)
    pub quantity: u32,
    pub selected: bool,
}

impl ColorOption {
    pub fn in_stock(&self) -> bool {
        self.quantity > 0
    }
}

/// Everything that depends on the current selection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedView {
    pub variant_options: Vec<VariantOption>,
    pub color_options: Vec<ColorOption>,
    pub price: Option<Decimal>,
    pub quantity: u32,
    pub image_url: String,
}

impl DerivedView {
    pub fn price_label(&self, currency_symbol: &str) -> String {
        format_price(self.price, currency_symbol)
    }

    pub fn selected_variant(&self) -> Option<&VariantOption> {
        self.variant_options.iter().find(|v| v.selected)
    }

    pub fn selected_color(&self) -> Option<&ColorOption> {
        self.color_options.iter().find(|c| c.selected)
    }
}

/// "₹600000"; empty when there is no price to show
pub fn format_price(price: Option<Decimal>, currency_symbol: &str) -> String {
    match price {
        Some(price) => format!("{currency_symbol}{}", price.normalize()),
        None => String::new(),
    }
}

/// Build the derived view.
///
/// `previous_image` is the image shown before this rebuild. It is kept when
/// the selected color has no image of its own so the page never blanks on
/// sparse inventory data.
pub fn build(
    entity: Option<&Entity>,
    variants: &[Variant],
    colors: &[ColorSwatch],
    inventory: &[InventoryRecord],
    selection: &Selection,
    previous_image: &str,
) -> DerivedView {
    let selected_variant = selection
        .variant_id
        .as_ref()
        .and_then(|id| variants.iter().find(|v| &v.id == id));

    let variant_options = variants
        .iter()
        .map(|v| VariantOption {
            id: v.id.clone(),
            name: v.name.clone(),
            price: v.price,
            selected: selection.variant_id.as_ref() == Some(&v.id),
        })
        .collect();

    // Colors are a choice within a variant; nothing to pick until variants exist
    let color_options: Vec<ColorOption> = if variants.is_empty() {
        Vec::new()
    } else {
        colors
            .iter()
            .map(|swatch| {
                let pair = exact_record(inventory, selection.variant_id.as_ref(), &swatch.label);
                let image_url = pair
                    .or_else(|| inventory.iter().find(|r| r.matches_color(&swatch.label)))
                    .map(|r| r.image_url.clone())
                    .unwrap_or_default();
                ColorOption {
                    id: swatch.id.clone(),
                    label: swatch.label.clone(),
                    image_url,
                    quantity: pair.map(|r| r.quantity).unwrap_or(0),
                    selected: selection.color_id.as_ref() == Some(&swatch.id),
                }
            })
            .collect()
    };

    let price = selected_variant
        .and_then(|v| v.price)
        .or_else(|| entity.and_then(|e| e.base_price));

    let selected_color = color_options.iter().find(|c| c.selected);
    let quantity = selected_color.map(|c| c.quantity).unwrap_or(0);

    let image_url = match selected_color {
        Some(color) if !color.image_url.is_empty() => color.image_url.clone(),
        _ if !previous_image.is_empty() => previous_image.to_string(),
        _ => entity
            .and_then(|e| e.image_url.clone())
            .unwrap_or_default(),
    };

    DerivedView {
        variant_options,
        color_options,
        price,
        quantity,
        image_url,
    }
}

/// Inventory record for exactly (variant, color label)
fn exact_record<'a>(
    inventory: &'a [InventoryRecord],
    variant_id: Option<&VariantId>,
    label: &str,
) -> Option<&'a InventoryRecord> {
    let variant_id = variant_id?;
    inventory
        .iter()
        .find(|r| &r.variant_id == variant_id && r.matches_color(label))
}
