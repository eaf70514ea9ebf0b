//! Query handlers for the Inventory context.
//!
//! Queries go through the same unit of work as commands, so a query inside
//! a scope sees changes that are recorded but not yet committed.

use chronicle_core::error::ChronicleError;
use chronicle_runtime::{AggregateHandle, UnitOfWork};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::Inventory;

/// One held item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemView {
    /// The item identifier.
    pub item_id: Uuid,
    /// Units held.
    pub quantity: u32,
    /// Whether the item is equipped.
    pub equipped: bool,
}

/// Read-only view of an inventory aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryView {
    /// The inventory identifier.
    pub inventory_id: String,
    /// Display name, if one was set.
    pub name: Option<String>,
    /// Held items, ordered by item.
    pub items: Vec<ItemView>,
    /// Version including recorded but unsaved events.
    pub version: i64,
}

fn view(handle: &AggregateHandle<Inventory>) -> InventoryView {
    let (name, items) = handle.read(|inventory| {
        let items = inventory
            .items()
            .map(|(item_id, quantity)| ItemView {
                item_id,
                quantity,
                equipped: inventory.equipped(item_id),
            })
            .collect();
        (inventory.name().map(str::to_owned), items)
    });
    InventoryView {
        inventory_id: handle.id(),
        name,
        items,
        version: handle.local_version(),
    }
}

/// Retrieves an inventory by its identifier.
///
/// # Errors
///
/// Returns `ChronicleError::AggregateNotFound` if the inventory has no
/// history, or the store's error if loading fails.
pub async fn get_inventory(
    inventory_id: &str,
    uow: &UnitOfWork,
) -> Result<InventoryView, ChronicleError> {
    let handle = uow.find::<Inventory>(inventory_id).await?;
    Ok(view(&handle))
}

/// Lists every stored inventory.
///
/// # Errors
///
/// Returns the store's error if loading fails.
pub async fn list_inventories(uow: &UnitOfWork) -> Result<Vec<InventoryView>, ChronicleError> {
    let handles = uow.all::<Inventory>().await?;
    Ok(handles.iter().map(view).collect())
}
