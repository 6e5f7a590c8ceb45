use anyhow::Result;

use crate::{
    model::ClientConfig,
    store::{DocPath, Mutation},
};

use super::KeyedAction;

/// Admin actions on the clients list. Keys are client emails and the scope
/// is the clients collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientAction {
    Add,
    Delete,
    MarkPaid,
    MarkUnpaid,
}

impl KeyedAction for ClientAction {
    type Scope = String;

    fn mutation(&self, collection: &String, client_id: &str) -> Result<Mutation> {
        let doc = DocPath::new(collection.as_str(), client_id);
        match self {
            ClientAction::Add => Ok(Mutation::set(doc, serde_json::to_value(ClientConfig::default())?)),
            ClientAction::Delete => Ok(Mutation::delete(doc)),
            ClientAction::MarkPaid => ClientConfig::has_paid().update(&doc, &true),
            ClientAction::MarkUnpaid => ClientConfig::has_paid().update(&doc, &false),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ClientAction::Add => "add client",
            ClientAction::Delete => "delete client",
            ClientAction::MarkPaid => "mark paid",
            ClientAction::MarkUnpaid => "mark unpaid",
        }
    }
}
