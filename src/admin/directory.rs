use anyhow::{Result, bail};

use crate::{
    binding::validators::is_valid_email,
    model::{ClientConfig, Inventory, InventoryItem, ItemAction},
    store::CollectionSnapshot,
};

pub const ITEM_ID_LENGTH: usize = 5;

/// `available` of an item the backend has not looked up yet.
pub const UNKNOWN_AVAILABILITY: i64 = -1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientSummary {
    pub id: String,
    pub has_paid: bool,
}

impl ClientSummary {
    pub fn status_label(&self) -> &'static str {
        if self.has_paid { "Active" } else { "Inactive" }
    }
}

/// One row per client document. Documents whose payment flag is missing or
/// unreadable count as unpaid.
pub fn client_summaries(snapshot: &CollectionSnapshot) -> Vec<ClientSummary> {
    snapshot
        .docs
        .iter()
        .map(|doc| {
            let has_paid = match doc.get(&ClientConfig::has_paid()) {
                Ok(value) => value.unwrap_or(false),
                Err(e) => {
                    log::warn!("CLIENTS: unreadable payment flag for '{}': {:#}", doc.id(), e);
                    false
                }
            };
            ClientSummary {
                id: doc.id().to_string(),
                has_paid,
            }
        })
        .collect()
}

pub fn validate_new_client_id(client_id: &str, existing: &CollectionSnapshot) -> Result<()> {
    if !is_valid_email(client_id) {
        bail!("'{}' is not a valid email address", client_id);
    }
    if existing.get(client_id).is_some() {
        bail!("Client '{}' already exists", client_id);
    }
    Ok(())
}

pub fn validate_new_item_id(item_id: &str, inventory: &Inventory) -> Result<()> {
    if item_id.chars().count() != ITEM_ID_LENGTH {
        bail!("Item id must be {} characters", ITEM_ID_LENGTH);
    }
    if inventory.contains(item_id) {
        bail!("Item '{}' already exists", item_id);
    }
    Ok(())
}

/// Item created by hand from the inventory list. Its availability is filled
/// in by the backend.
pub fn new_inventory_item(name: &str, tracking: bool) -> InventoryItem {
    let action = if tracking { ItemAction::Tracking } else { ItemAction::Untracked };
    InventoryItem::new(name.trim(), UNKNOWN_AVAILABILITY, action)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::{DocPath, DocumentSnapshot};

    fn snapshot(docs: Vec<(&str, serde_json::Value)>) -> CollectionSnapshot {
        CollectionSnapshot {
            collection: "clients".into(),
            docs: docs
                .into_iter()
                .map(|(id, data)| DocumentSnapshot::initial(DocPath::new("clients", id), Some(data)))
                .collect(),
            origin: None,
        }
    }

    #[test]
    fn summaries_default_to_unpaid() {
        let clients = snapshot(vec![
            ("a@example.com", json!({ "accounting": { "hasPaid": true } })),
            ("b@example.com", json!({})),
            ("c@example.com", json!({ "accounting": { "hasPaid": "yes" } })),
        ]);
        let summaries = client_summaries(&clients);
        assert_eq!(
            summaries.iter().map(|s| (s.id.as_str(), s.has_paid)).collect::<Vec<_>>(),
            vec![("a@example.com", true), ("b@example.com", false), ("c@example.com", false)]
        );
        assert_eq!(summaries[0].status_label(), "Active");
    }

    #[test]
    fn new_client_must_be_unique_email() {
        let clients = snapshot(vec![("a@example.com", json!({}))]);
        assert!(validate_new_client_id("b@example.com", &clients).is_ok());
        assert!(validate_new_client_id("a@example.com", &clients).is_err());
        assert!(validate_new_client_id("not-an-email", &clients).is_err());
    }

    #[test]
    fn new_item_id_rules() {
        let mut inventory = Inventory::default();
        inventory
            .items
            .insert("12345".into(), InventoryItem::new("", 0, ItemAction::Tracking));
        assert!(validate_new_item_id("54321", &inventory).is_ok());
        assert!(validate_new_item_id("12345", &inventory).is_err());
        assert!(validate_new_item_id("1234", &inventory).is_err());
        assert!(validate_new_item_id("123456", &inventory).is_err());
    }

    #[test]
    fn hand_added_items_await_availability() {
        let item = new_inventory_item("  Widget ", true);
        assert_eq!(item, InventoryItem::new("Widget", UNKNOWN_AVAILABILITY, ItemAction::Tracking));
    }
}
