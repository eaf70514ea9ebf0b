//! Command handlers for the Inventory context.
//!
//! Each handler finds the inventory through the caller's unit of work,
//! invokes one operation on it, and saves it with the command's metadata.
//! Under a scoped unit of work the save is only queued; the caller decides
//! when the scope commits.

use chronicle_core::command::Command;
use chronicle_core::error::{ChronicleError, InvokeError};
use chronicle_runtime::{AggregateHandle, CallArgs, SaveReceipt, UnitOfWork};
use thiserror::Error;

use crate::domain::aggregates::{Inventory, InventoryError};
use crate::domain::commands::{AddItem, CreateInventory, EquipItem, RemoveItem, RenameInventory};

/// Failure of an inventory command.
#[derive(Debug, Error)]
pub enum InventoryServiceError {
    /// Loading, saving or publishing failed.
    #[error(transparent)]
    Runtime(#[from] ChronicleError),

    /// The inventory rejected the operation.
    #[error(transparent)]
    Rejected(#[from] InvokeError<InventoryError>),
}

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct InventoryCommandResult {
    /// The inventory affected by the command.
    pub inventory_id: String,
    /// Version after the command, committed or queued.
    pub version: i64,
    /// Receipt of an immediate save; `None` when the save was queued.
    pub receipt: Option<SaveReceipt>,
}

async fn record(
    uow: &UnitOfWork,
    inventory: &AggregateHandle<Inventory>,
    command: &dyn Command,
    operation: &str,
    args: CallArgs,
) -> Result<InventoryCommandResult, InventoryServiceError> {
    inventory.invoke(operation, args)?;
    let receipt = inventory.save_with(uow, command.metadata()).await?;
    tracing::debug!(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        "handled command"
    );
    Ok(InventoryCommandResult {
        inventory_id: inventory.id(),
        version: inventory.local_version(),
        receipt,
    })
}

/// Handles the `CreateInventory` command: creates an inventory under a
/// fresh identity and names it.
///
/// # Errors
///
/// Returns `InventoryServiceError` if the name is rejected or saving fails.
pub async fn handle_create_inventory(
    command: &CreateInventory,
    uow: &UnitOfWork,
) -> Result<InventoryCommandResult, InventoryServiceError> {
    let inventory = uow.create::<Inventory>();
    record(
        uow,
        &inventory,
        command,
        "rename",
        CallArgs::new().arg(command.name.as_str()),
    )
    .await
}

/// Handles the `RenameInventory` command.
///
/// # Errors
///
/// Returns `InventoryServiceError` if the inventory does not exist, the name
/// is rejected, or saving fails.
pub async fn handle_rename_inventory(
    command: &RenameInventory,
    uow: &UnitOfWork,
) -> Result<InventoryCommandResult, InventoryServiceError> {
    let inventory = uow.find::<Inventory>(&command.inventory_id).await?;
    record(
        uow,
        &inventory,
        command,
        "rename",
        CallArgs::new().arg(command.name.as_str()),
    )
    .await
}

/// Handles the `AddItem` command.
///
/// # Errors
///
/// Returns `InventoryServiceError` if the inventory does not exist, the
/// quantity is rejected, or saving fails.
pub async fn handle_add_item(
    command: &AddItem,
    uow: &UnitOfWork,
) -> Result<InventoryCommandResult, InventoryServiceError> {
    let inventory = uow.find::<Inventory>(&command.inventory_id).await?;
    record(
        uow,
        &inventory,
        command,
        "add_item",
        CallArgs::new()
            .arg(command.item_id.to_string())
            .arg(command.quantity),
    )
    .await
}

/// Handles the `RemoveItem` command.
///
/// # Errors
///
/// Returns `InventoryServiceError` if the inventory does not exist, does
/// not hold enough of the item, or saving fails.
pub async fn handle_remove_item(
    command: &RemoveItem,
    uow: &UnitOfWork,
) -> Result<InventoryCommandResult, InventoryServiceError> {
    let inventory = uow.find::<Inventory>(&command.inventory_id).await?;
    record(
        uow,
        &inventory,
        command,
        "remove_item",
        CallArgs::new()
            .arg(command.item_id.to_string())
            .arg(command.quantity),
    )
    .await
}

/// Handles the `EquipItem` command.
///
/// # Errors
///
/// Returns `InventoryServiceError` if the inventory does not exist, does
/// not hold the item, or saving fails.
pub async fn handle_equip_item(
    command: &EquipItem,
    uow: &UnitOfWork,
) -> Result<InventoryCommandResult, InventoryServiceError> {
    let inventory = uow.find::<Inventory>(&command.inventory_id).await?;
    record(
        uow,
        &inventory,
        command,
        "equip_item",
        CallArgs::new().arg(command.item_id.to_string()),
    )
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use chronicle_runtime::Chronicle;
    use chronicle_test_support::{
        FailingEventStore, FixedClock, RecordingEventStore, RecordingMessageBus,
        SequenceIdGenerator,
    };
    use uuid::Uuid;

    use super::*;

    struct Harness {
        store: Arc<RecordingEventStore>,
        bus: Arc<RecordingMessageBus>,
        chronicle: Chronicle,
    }

    fn harness() -> Harness {
        let store = Arc::new(RecordingEventStore::new());
        let bus = Arc::new(RecordingMessageBus::new());
        let chronicle = Chronicle::builder()
            .event_store(store.clone())
            .message_bus(bus.clone())
            .id_generator(Arc::new(SequenceIdGenerator::new("inv")))
            .clock(Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            )))
            .build()
            .unwrap();
        Harness {
            store,
            bus,
            chronicle,
        }
    }

    async fn create(h: &Harness) -> String {
        let command = CreateInventory {
            correlation_id: Uuid::new_v4(),
            name: "backpack".into(),
        };
        handle_create_inventory(&command, &h.chronicle.immediate())
            .await
            .unwrap()
            .inventory_id
    }

    #[tokio::test]
    async fn test_handle_create_inventory_persists_rename_event() {
        // Arrange
        let h = harness();
        let correlation_id = Uuid::new_v4();
        let command = CreateInventory {
            correlation_id,
            name: "backpack".into(),
        };

        // Act
        let result = handle_create_inventory(&command, &h.chronicle.immediate())
            .await
            .unwrap();

        // Assert
        assert_eq!(result.inventory_id, "inv-1");
        assert_eq!(result.version, 1);
        let appends = h.store.appends();
        assert_eq!(appends.len(), 1);
        assert_eq!(appends[0].events[0].name(), "rename");
        let published = h.bus.published();
        assert_eq!(published[0].metadata["command_type"], "inventory.create_inventory");
        assert_eq!(
            published[0].metadata["correlation_id"],
            correlation_id.to_string()
        );
    }

    #[tokio::test]
    async fn test_handle_add_item_records_item_and_quantity() {
        // Arrange
        let h = harness();
        let inventory_id = create(&h).await;
        let item_id = Uuid::new_v4();
        let command = AddItem {
            correlation_id: Uuid::new_v4(),
            inventory_id: inventory_id.clone(),
            item_id,
            quantity: 3,
        };

        // Act
        let result = handle_add_item(&command, &h.chronicle.immediate())
            .await
            .unwrap();

        // Assert
        assert_eq!(result.version, 2);
        let appends = h.store.appends();
        assert_eq!(appends[1].expected_version, 1);
        let details = appends[1].events[0].details();
        assert_eq!(details["item_id"], item_id.to_string());
        assert_eq!(details["quantity"], 3);
    }

    #[tokio::test]
    async fn test_handle_add_item_returns_not_found_for_unknown_inventory() {
        let h = harness();
        let command = AddItem {
            correlation_id: Uuid::new_v4(),
            inventory_id: "inv-404".into(),
            item_id: Uuid::new_v4(),
            quantity: 1,
        };

        let result = handle_add_item(&command, &h.chronicle.immediate()).await;

        assert!(matches!(
            result,
            Err(InventoryServiceError::Runtime(ChronicleError::AggregateNotFound { .. }))
        ));
        assert!(h.store.appends().is_empty());
    }

    #[tokio::test]
    async fn test_handle_remove_item_returns_error_when_item_not_present() {
        // Arrange
        let h = harness();
        let inventory_id = create(&h).await;
        let item_id = Uuid::new_v4();
        let command = RemoveItem {
            correlation_id: Uuid::new_v4(),
            inventory_id,
            item_id,
            quantity: 1,
        };

        // Act
        let result = handle_remove_item(&command, &h.chronicle.immediate()).await;

        // Assert
        match result {
            Err(InventoryServiceError::Rejected(InvokeError::Domain(
                InventoryError::ItemNotFound(id),
            ))) => assert_eq!(id, item_id),
            other => panic!("expected ItemNotFound, got {other:?}"),
        }
        assert_eq!(h.store.appends().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_equip_item_in_scope_is_queued_until_executed() {
        // Arrange
        let h = harness();
        let inventory_id = create(&h).await;
        let item_id = Uuid::new_v4();
        let uow = h.chronicle.unit_of_work();
        let add = AddItem {
            correlation_id: Uuid::new_v4(),
            inventory_id: inventory_id.clone(),
            item_id,
            quantity: 1,
        };
        let equip = EquipItem {
            correlation_id: Uuid::new_v4(),
            inventory_id,
            item_id,
        };

        // Act
        handle_add_item(&add, &uow).await.unwrap();
        let result = handle_equip_item(&equip, &uow).await.unwrap();
        let queued = h.store.appends().len();
        uow.execute_work().await.unwrap();

        // Assert
        assert!(result.receipt.is_none());
        assert_eq!(result.version, 3);
        assert_eq!(queued, 1);
        let appends = h.store.appends();
        assert_eq!(appends.len(), 3);
        assert_eq!(appends[2].events[0].name(), "equip_item");
        assert_eq!(appends[2].expected_version, 2);
    }

    #[tokio::test]
    async fn test_handle_rename_inventory_rejects_blank_name() {
        let h = harness();
        let inventory_id = create(&h).await;
        let command = RenameInventory {
            correlation_id: Uuid::new_v4(),
            inventory_id,
            name: "   ".into(),
        };

        let result = handle_rename_inventory(&command, &h.chronicle.immediate()).await;

        assert!(matches!(
            result,
            Err(InventoryServiceError::Rejected(InvokeError::Domain(
                InventoryError::Validation(_)
            )))
        ));
    }

    #[tokio::test]
    async fn test_handle_add_item_propagates_repository_error() {
        let chronicle = Chronicle::builder()
            .event_store(Arc::new(FailingEventStore))
            .message_bus(Arc::new(RecordingMessageBus::new()))
            .build()
            .unwrap();
        let command = AddItem {
            correlation_id: Uuid::new_v4(),
            inventory_id: "inv-1".into(),
            item_id: Uuid::new_v4(),
            quantity: 1,
        };

        let result = handle_add_item(&command, &chronicle.immediate()).await;

        assert!(matches!(
            result,
            Err(InventoryServiceError::Runtime(ChronicleError::Infrastructure(_)))
        ));
    }
}
