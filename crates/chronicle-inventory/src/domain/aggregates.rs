//! Aggregate root for the Inventory context.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use chronicle_core::aggregate::{Aggregate, Operation, OperationInput};
use chronicle_core::error::DetailsError;
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

/// Domain failures raised by [`Inventory`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// The item is not held.
    #[error("item {0} not found in inventory")]
    ItemNotFound(Uuid),

    /// More units were removed than are held.
    #[error("cannot remove {requested} of item {item_id}: only {held} held")]
    InsufficientQuantity {
        /// The item.
        item_id: Uuid,
        /// Units held.
        held: u32,
        /// Units requested.
        requested: u32,
    },

    /// A command argument is out of range.
    #[error("validation error: {0}")]
    Validation(String),

    /// A recorded argument did not decode.
    #[error(transparent)]
    Details(#[from] DetailsError),
}

/// The aggregate root for an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Inventory {
    name: Option<String>,
    /// Item quantities, keyed by item.
    items: BTreeMap<Uuid, u32>,
    equipped: BTreeSet<Uuid>,
    updated_at: Option<DateTime<Utc>>,
}

impl Inventory {
    /// Display name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Units held of `item_id`; zero if none.
    #[must_use]
    pub fn quantity(&self, item_id: Uuid) -> u32 {
        self.items.get(&item_id).copied().unwrap_or_default()
    }

    /// Returns `true` if `item_id` is equipped.
    #[must_use]
    pub fn equipped(&self, item_id: Uuid) -> bool {
        self.equipped.contains(&item_id)
    }

    /// Held items and their quantities, ordered by item.
    pub fn items(&self) -> impl Iterator<Item = (Uuid, u32)> + '_ {
        self.items.iter().map(|(id, quantity)| (*id, *quantity))
    }

    /// Logical time of the latest change.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn rename(&mut self, input: &OperationInput<'_>) -> Result<(), InventoryError> {
        let name: String = input.arg("name")?;
        if name.trim().is_empty() {
            return Err(InventoryError::Validation("name must not be blank".into()));
        }
        self.name = Some(name);
        self.updated_at = Some(input.at());
        Ok(())
    }

    fn add_item(&mut self, input: &OperationInput<'_>) -> Result<(), InventoryError> {
        let item_id: Uuid = input.arg("item_id")?;
        let quantity: u32 = input.arg("quantity")?;
        if quantity == 0 {
            return Err(InventoryError::Validation(
                "quantity must be positive".into(),
            ));
        }
        let held = self
            .quantity(item_id)
            .checked_add(quantity)
            .ok_or_else(|| InventoryError::Validation("quantity overflows item count".into()))?;
        self.items.insert(item_id, held);
        self.updated_at = Some(input.at());
        Ok(())
    }

    fn remove_item(&mut self, input: &OperationInput<'_>) -> Result<(), InventoryError> {
        let item_id: Uuid = input.arg("item_id")?;
        let requested: u32 = input.arg("quantity")?;
        let held = self.quantity(item_id);
        if held == 0 {
            return Err(InventoryError::ItemNotFound(item_id));
        }
        if requested > held {
            return Err(InventoryError::InsufficientQuantity {
                item_id,
                held,
                requested,
            });
        }
        if requested == held {
            self.items.remove(&item_id);
            self.equipped.remove(&item_id);
        } else {
            self.items.insert(item_id, held - requested);
        }
        self.updated_at = Some(input.at());
        Ok(())
    }

    fn equip_item(&mut self, input: &OperationInput<'_>) -> Result<(), InventoryError> {
        let item_id: Uuid = input.arg("item_id")?;
        if !self.items.contains_key(&item_id) {
            return Err(InventoryError::ItemNotFound(item_id));
        }
        self.equipped.insert(item_id);
        self.updated_at = Some(input.at());
        Ok(())
    }

    fn item_count(&self, input: &OperationInput<'_>) -> Result<Value, InventoryError> {
        let item_id: Uuid = input.arg("item_id")?;
        Ok(json!(self.quantity(item_id)))
    }

    fn is_equipped(&self, input: &OperationInput<'_>) -> Result<Value, InventoryError> {
        let item_id: Uuid = input.arg("item_id")?;
        Ok(json!(self.equipped(item_id)))
    }
}

static INVENTORY_OPERATIONS: [Operation<Inventory>; 6] = [
    Operation::command("rename", &["name"], Inventory::rename),
    Operation::command("add_item", &["item_id", "quantity"], Inventory::add_item),
    Operation::command("remove_item", &["item_id", "quantity"], Inventory::remove_item),
    Operation::command("equip_item", &["item_id"], Inventory::equip_item),
    Operation::query("item_count", &["item_id"], Inventory::item_count),
    Operation::query("is_equipped", &["item_id"], Inventory::is_equipped),
];

impl Aggregate for Inventory {
    const AGGREGATE_TYPE: &'static str = "Inventory";
    type Error = InventoryError;

    fn operations() -> &'static [Operation<Self>] {
        &INVENTORY_OPERATIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chronicle_core::aggregate::OperationKind;
    use chronicle_core::event::Details;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn details(item_id: Uuid, quantity: Option<u32>) -> Details {
        let mut details = Details::new();
        details.insert("item_id".to_owned(), json!(item_id));
        if let Some(quantity) = quantity {
            details.insert("quantity".to_owned(), json!(quantity));
        }
        details
    }

    fn run(inventory: &mut Inventory, name: &str, details: &Details) -> Result<(), InventoryError> {
        let OperationKind::Command(handler) = Inventory::operation(name).unwrap().kind() else {
            panic!("{name} must be a command");
        };
        handler(inventory, &OperationInput::new(details, fixed_now()))
    }

    #[test]
    fn test_add_item_accumulates_quantity() {
        // Arrange
        let mut inventory = Inventory::default();
        let item_id = Uuid::new_v4();

        // Act
        run(&mut inventory, "add_item", &details(item_id, Some(2))).unwrap();
        run(&mut inventory, "add_item", &details(item_id, Some(3))).unwrap();

        // Assert
        assert_eq!(inventory.quantity(item_id), 5);
        assert_eq!(inventory.updated_at(), Some(fixed_now()));
    }

    #[test]
    fn test_add_item_rejects_zero_quantity() {
        let mut inventory = Inventory::default();

        let result = run(&mut inventory, "add_item", &details(Uuid::new_v4(), Some(0)));

        assert!(matches!(result, Err(InventoryError::Validation(_))));
    }

    #[test]
    fn test_add_item_rejects_quantity_overflow() {
        // Arrange
        let mut inventory = Inventory::default();
        let item_id = Uuid::new_v4();
        run(&mut inventory, "add_item", &details(item_id, Some(u32::MAX))).unwrap();

        // Act
        let result = run(&mut inventory, "add_item", &details(item_id, Some(1)));

        // Assert
        assert!(matches!(result, Err(InventoryError::Validation(_))));
        assert_eq!(inventory.quantity(item_id), u32::MAX);
    }

    #[test]
    fn test_remove_item_returns_error_when_item_not_present() {
        let mut inventory = Inventory::default();
        let item_id = Uuid::new_v4();

        let result = run(&mut inventory, "remove_item", &details(item_id, Some(1)));

        assert_eq!(result, Err(InventoryError::ItemNotFound(item_id)));
    }

    #[test]
    fn test_remove_item_rejects_more_than_held() {
        let mut inventory = Inventory::default();
        let item_id = Uuid::new_v4();
        run(&mut inventory, "add_item", &details(item_id, Some(1))).unwrap();

        let result = run(&mut inventory, "remove_item", &details(item_id, Some(2)));

        assert_eq!(
            result,
            Err(InventoryError::InsufficientQuantity {
                item_id,
                held: 1,
                requested: 2
            })
        );
    }

    #[test]
    fn test_removing_last_unit_unequips_item() {
        // Arrange
        let mut inventory = Inventory::default();
        let item_id = Uuid::new_v4();
        run(&mut inventory, "add_item", &details(item_id, Some(1))).unwrap();
        run(&mut inventory, "equip_item", &details(item_id, None)).unwrap();

        // Act
        run(&mut inventory, "remove_item", &details(item_id, Some(1))).unwrap();

        // Assert
        assert_eq!(inventory.quantity(item_id), 0);
        assert!(!inventory.equipped(item_id));
        assert_eq!(inventory.items().count(), 0);
    }

    #[test]
    fn test_equip_item_returns_error_when_item_not_present() {
        let mut inventory = Inventory::default();
        let item_id = Uuid::new_v4();

        let result = run(&mut inventory, "equip_item", &details(item_id, None));

        assert_eq!(result, Err(InventoryError::ItemNotFound(item_id)));
    }

    #[test]
    fn test_queries_are_registered_as_non_commands() {
        assert!(Inventory::is_command("add_item"));
        assert!(!Inventory::is_command("item_count"));
        assert!(!Inventory::is_command("is_equipped"));
    }
}
