use anyhow::Result;

use crate::{
    model::{ClientConfig, InventoryItem, ItemAction},
    store::{DocPath, Mutation},
};

use super::KeyedAction;

/// Actions on a client's inventory list. Keys are item ids and the scope is
/// the client's config document.
#[derive(Clone, Debug, PartialEq)]
pub enum InventoryAction {
    Add(InventoryItem),
    Track,
    Untrack,
    Delete,
}

impl KeyedAction for InventoryAction {
    type Scope = DocPath;

    fn mutation(&self, doc: &DocPath, item_id: &str) -> Result<Mutation> {
        match self {
            InventoryAction::Add(item) => ClientConfig::item(item_id).update(doc, item),
            InventoryAction::Track => ClientConfig::item_action(item_id).update(doc, &ItemAction::Tracking),
            InventoryAction::Untrack => ClientConfig::item_action(item_id).update(doc, &ItemAction::Untracked),
            InventoryAction::Delete => Ok(ClientConfig::item(item_id).delete(doc)),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            InventoryAction::Add(_) => "add item",
            InventoryAction::Track => "track item",
            InventoryAction::Untrack => "untrack item",
            InventoryAction::Delete => "delete item",
        }
    }
}
