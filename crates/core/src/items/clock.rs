use serde_json::json;

use crate::behavior::{ItemBehavior, ItemView, RenderContext, RenderMode};
use crate::catalog::{self, CatalogItem};
use crate::item::ItemData;

use super::str_field;

/// Wall clock. Not lockable: everyone can open it at once.
pub struct Clock;

impl ItemBehavior for Clock {
    fn catalog_entry(&self) -> &'static CatalogItem {
        &catalog::CLOCK
    }

    fn initial_data(&self) -> ItemData {
        let mut data = ItemData::new();
        data.insert("timezone".into(), json!("UTC"));
        data
    }

    fn render_inactive(&self, ctx: &RenderContext<'_>) -> ItemView {
        ItemView::new(
            self.item_type_id(),
            RenderMode::Inactive,
            "Clock",
            json!({ "timezone": str_field(ctx.item_data, "timezone") }),
        )
    }

    fn render_active(&self, ctx: &RenderContext<'_>) -> ItemView {
        ItemView::new(
            self.item_type_id(),
            RenderMode::Active,
            format!("Clock ({})", str_field(ctx.item_data, "timezone")),
            json!({
                "timezone": str_field(ctx.item_data, "timezone"),
                "room": ctx.room.name,
            }),
        )
    }
}
