use serde_json::{json, Value};

use crate::behavior::{ItemBehavior, ItemView, RenderContext, RenderMode};
use crate::catalog::{self, CatalogItem};
use crate::error::CoreError;
use crate::item::ItemData;

use super::only_keys;

/// Upper bound on strokes kept in one drawing.
pub const MAX_STROKES: usize = 500;

/// Shared drawing surface. Lockable so two people never draw over each other.
pub struct Sketchpad;

fn strokes(data: &ItemData) -> &[Value] {
    data.get("strokes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

impl ItemBehavior for Sketchpad {
    fn catalog_entry(&self) -> &'static CatalogItem {
        &catalog::SKETCHPAD
    }

    fn initial_data(&self) -> ItemData {
        let mut data = ItemData::new();
        data.insert("strokes".into(), json!([]));
        data.insert("background".into(), json!("#ffffff"));
        data
    }

    fn render_inactive(&self, ctx: &RenderContext<'_>) -> ItemView {
        ItemView::new(
            self.item_type_id(),
            RenderMode::Inactive,
            "Sketchpad",
            json!({ "stroke_count": strokes(ctx.item_data).len() }),
        )
    }

    fn render_active(&self, ctx: &RenderContext<'_>) -> ItemView {
        ItemView::new(
            self.item_type_id(),
            RenderMode::Active,
            "Sketchpad",
            json!({
                "strokes": strokes(ctx.item_data),
                "background": ctx.item_data.get("background"),
            }),
        )
    }

    fn validate_update(&self, partial: &ItemData) -> Result<(), CoreError> {
        only_keys(self.item_type_id(), partial, &["strokes", "background"])?;
        match partial.get("strokes") {
            None => Ok(()),
            Some(Value::Array(list)) if list.len() <= MAX_STROKES => Ok(()),
            Some(Value::Array(_)) => Err(CoreError::Validation(format!(
                "a drawing holds at most {MAX_STROKES} strokes"
            ))),
            Some(_) => Err(CoreError::Validation("strokes must be an array".into())),
        }
    }
}
