//! Commands for the Inventory context.

use chronicle_core::command::Command;
use uuid::Uuid;

/// Command to open a new, named inventory.
#[derive(Debug, Clone)]
pub struct CreateInventory {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Display name.
    pub name: String,
}

impl Command for CreateInventory {
    fn command_type(&self) -> &'static str {
        "inventory.create_inventory"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to rename an inventory.
#[derive(Debug, Clone)]
pub struct RenameInventory {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The inventory identifier.
    pub inventory_id: String,
    /// New display name.
    pub name: String,
}

impl Command for RenameInventory {
    fn command_type(&self) -> &'static str {
        "inventory.rename_inventory"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to add units of an item to an inventory.
#[derive(Debug, Clone)]
pub struct AddItem {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The inventory identifier.
    pub inventory_id: String,
    /// The item identifier.
    pub item_id: Uuid,
    /// Units to add.
    pub quantity: u32,
}

impl Command for AddItem {
    fn command_type(&self) -> &'static str {
        "inventory.add_item"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to remove units of an item from an inventory.
#[derive(Debug, Clone)]
pub struct RemoveItem {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The inventory identifier.
    pub inventory_id: String,
    /// The item identifier.
    pub item_id: Uuid,
    /// Units to remove.
    pub quantity: u32,
}

impl Command for RemoveItem {
    fn command_type(&self) -> &'static str {
        "inventory.remove_item"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to equip an item.
#[derive(Debug, Clone)]
pub struct EquipItem {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The inventory identifier.
    pub inventory_id: String,
    /// The item identifier.
    pub item_id: Uuid,
}

impl Command for EquipItem {
    fn command_type(&self) -> &'static str {
        "inventory.equip_item"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
