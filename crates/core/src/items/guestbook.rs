use serde_json::{json, Value};

use crate::behavior::{ItemBehavior, ItemView, RenderContext, RenderMode};
use crate::catalog::{self, CatalogItem};
use crate::error::CoreError;
use crate::item::ItemData;

use super::only_keys;

/// Entries shown in the inactive view.
const PREVIEW_ENTRIES: usize = 3;

/// Guestbook anyone can sign. Not lockable, so two visitors signing at
/// once race and the last write wins.
pub struct Guestbook;

fn entries(data: &ItemData) -> &[Value] {
    data.get("entries")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

impl ItemBehavior for Guestbook {
    fn catalog_entry(&self) -> &'static CatalogItem {
        &catalog::GUESTBOOK
    }

    fn initial_data(&self) -> ItemData {
        let mut data = ItemData::new();
        data.insert("entries".into(), json!([]));
        data
    }

    fn render_inactive(&self, ctx: &RenderContext<'_>) -> ItemView {
        let all = entries(ctx.item_data);
        let preview = &all[all.len().saturating_sub(PREVIEW_ENTRIES)..];
        ItemView::new(
            self.item_type_id(),
            RenderMode::Inactive,
            "Guestbook",
            json!({ "count": all.len(), "latest": preview }),
        )
    }

    fn render_active(&self, ctx: &RenderContext<'_>) -> ItemView {
        ItemView::new(
            self.item_type_id(),
            RenderMode::Active,
            format!("Guestbook of {}", ctx.room.name),
            json!({ "entries": entries(ctx.item_data) }),
        )
    }

    fn validate_update(&self, partial: &ItemData) -> Result<(), CoreError> {
        only_keys(self.item_type_id(), partial, &["entries"])?;
        match partial.get("entries") {
            None | Some(Value::Array(_)) => Ok(()),
            Some(_) => Err(CoreError::Validation("entries must be an array".into())),
        }
    }
}
