//! Item behavior contract and the static registry that resolves item type ids
//! to behaviors.
//!
//! A behavior owns everything item-type-specific: the shape of its
//! `item_data`, the inactive and active views, and which partial updates it
//! accepts. The hosting runtime owns persistence and locking.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{self, CatalogItem};
use crate::error::CoreError;
use crate::item::ItemData;
use crate::items;
use crate::room::RoomInfo;

/// Which of the two views is being produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    Inactive,
    Active,
}

/// Inputs for rendering one item.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub item_data: &'a ItemData,
    pub room: &'a RoomInfo,
    pub is_active: bool,
}

/// Serializable view model produced by a behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    pub item_type_id: String,
    pub mode: RenderMode,
    pub title: String,
    /// Behavior-specific content for the client to draw.
    pub body: Value,
}

impl ItemView {
    pub fn new(
        item_type_id: &str,
        mode: RenderMode,
        title: impl Into<String>,
        body: Value,
    ) -> Self {
        Self {
            item_type_id: item_type_id.to_string(),
            mode,
            title: title.into(),
            body,
        }
    }
}

/// Behavior of one item type.
pub trait ItemBehavior: Send + Sync {
    /// Catalog entry for this behavior's item type.
    fn catalog_entry(&self) -> &'static CatalogItem;

    /// Seed for `PlacedItem::item_data`. Called exactly once, at placement.
    fn initial_data(&self) -> ItemData;

    fn render_inactive(&self, ctx: &RenderContext<'_>) -> ItemView;

    fn render_active(&self, ctx: &RenderContext<'_>) -> ItemView;

    /// Reject partial updates this item type does not understand.
    fn validate_update(&self, _partial: &ItemData) -> Result<(), CoreError> {
        Ok(())
    }

    fn item_type_id(&self) -> &'static str {
        self.catalog_entry().item_type_id
    }

    fn should_lock(&self) -> bool {
        self.catalog_entry().should_lock
    }

    fn render(&self, ctx: &RenderContext<'_>) -> ItemView {
        if ctx.is_active {
            self.render_active(ctx)
        } else {
            self.render_inactive(ctx)
        }
    }
}

/// Static mapping from item type id to behavior, resolved once at startup.
#[derive(Clone, Default)]
pub struct ItemRegistry {
    behaviors: HashMap<&'static str, Arc<dyn ItemBehavior>>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in item type.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(items::clock::Clock));
        registry.register(Arc::new(items::plant::Plant));
        registry.register(Arc::new(items::pet::Pet));
        registry.register(Arc::new(items::sketchpad::Sketchpad));
        registry.register(Arc::new(items::guestbook::Guestbook));
        registry
    }

    /// Register a behavior, replacing any previous one for the same type.
    pub fn register(&mut self, behavior: Arc<dyn ItemBehavior>) {
        self.behaviors.insert(behavior.item_type_id(), behavior);
    }

    pub fn get(&self, item_type_id: &str) -> Option<&Arc<dyn ItemBehavior>> {
        self.behaviors.get(item_type_id)
    }

    pub fn resolve(&self, item_type_id: &str) -> Result<&Arc<dyn ItemBehavior>, CoreError> {
        self.get(item_type_id)
            .ok_or_else(|| CoreError::not_found("ItemType", item_type_id))
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// Catalog entries that have no registered behavior.
    pub fn missing_behaviors(&self) -> Vec<&'static str> {
        catalog::CATALOG
            .iter()
            .map(|c| c.item_type_id)
            .filter(|id| !self.behaviors.contains_key(id))
            .collect()
    }
}

impl std::fmt::Debug for ItemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.behaviors.keys().collect();
        ids.sort();
        f.debug_struct("ItemRegistry").field("types", &ids).finish()
    }
}
