use serde_json::json;

use crate::behavior::{ItemBehavior, ItemView, RenderContext, RenderMode};
use crate::catalog::{self, CatalogItem};
use crate::error::CoreError;
use crate::item::ItemData;

use super::{int_field, int_in_range, only_keys};

/// Highest water level a plant can hold.
pub const MAX_WATER_LEVEL: i64 = 10;

pub struct Plant;

impl ItemBehavior for Plant {
    fn catalog_entry(&self) -> &'static CatalogItem {
        &catalog::PLANT
    }

    fn initial_data(&self) -> ItemData {
        let mut data = ItemData::new();
        data.insert("water_level".into(), json!(MAX_WATER_LEVEL / 2));
        data.insert("growth_stage".into(), json!(0));
        data
    }

    fn render_inactive(&self, ctx: &RenderContext<'_>) -> ItemView {
        ItemView::new(
            self.item_type_id(),
            RenderMode::Inactive,
            "Plant",
            json!({ "growth_stage": int_field(ctx.item_data, "growth_stage") }),
        )
    }

    fn render_active(&self, ctx: &RenderContext<'_>) -> ItemView {
        let water = int_field(ctx.item_data, "water_level");
        ItemView::new(
            self.item_type_id(),
            RenderMode::Active,
            "Plant",
            json!({
                "water_level": water,
                "max_water_level": MAX_WATER_LEVEL,
                "growth_stage": int_field(ctx.item_data, "growth_stage"),
                "thirsty": water <= 2,
            }),
        )
    }

    fn validate_update(&self, partial: &ItemData) -> Result<(), CoreError> {
        only_keys(self.item_type_id(), partial, &["water_level", "growth_stage"])?;
        int_in_range(partial, "water_level", 0..=MAX_WATER_LEVEL)?;
        int_in_range(partial, "growth_stage", 0..=5)
    }
}
