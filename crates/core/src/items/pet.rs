use serde_json::json;

use crate::behavior::{ItemBehavior, ItemView, RenderContext, RenderMode};
use crate::catalog::{self, CatalogItem};
use crate::error::CoreError;
use crate::item::ItemData;

use super::{int_field, int_in_range, only_keys, str_field};

pub const MAX_HUNGER: i64 = 100;

pub struct Pet;

impl ItemBehavior for Pet {
    fn catalog_entry(&self) -> &'static CatalogItem {
        &catalog::PET
    }

    fn initial_data(&self) -> ItemData {
        let mut data = ItemData::new();
        data.insert("name".into(), json!("Mochi"));
        data.insert("hunger".into(), json!(50));
        data.insert("last_fed_by".into(), json!(null));
        data
    }

    fn render_inactive(&self, ctx: &RenderContext<'_>) -> ItemView {
        ItemView::new(
            self.item_type_id(),
            RenderMode::Inactive,
            str_field(ctx.item_data, "name"),
            json!({ "hungry": int_field(ctx.item_data, "hunger") > 70 }),
        )
    }

    fn render_active(&self, ctx: &RenderContext<'_>) -> ItemView {
        ItemView::new(
            self.item_type_id(),
            RenderMode::Active,
            str_field(ctx.item_data, "name"),
            json!({
                "hunger": int_field(ctx.item_data, "hunger"),
                "max_hunger": MAX_HUNGER,
                "last_fed_by": ctx.item_data.get("last_fed_by"),
            }),
        )
    }

    fn validate_update(&self, partial: &ItemData) -> Result<(), CoreError> {
        only_keys(self.item_type_id(), partial, &["name", "hunger", "last_fed_by"])?;
        int_in_range(partial, "hunger", 0..=MAX_HUNGER)?;
        if let Some(name) = partial.get("name") {
            if !matches!(name.as_str(), Some(n) if !n.trim().is_empty()) {
                return Err(CoreError::Validation("pet name must be a non-empty string".into()));
            }
        }
        Ok(())
    }
}
