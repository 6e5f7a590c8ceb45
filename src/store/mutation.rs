use std::fmt;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{DocPath, FieldPath};

/// Identifies one write. Snapshots produced by a write carry its id so the
/// writer can recognize its own changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WriteId(Uuid);

impl WriteId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for WriteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MutationKind {
    Set(Value),
    Update(FieldPath, Value),
    DeleteField(FieldPath),
    Delete,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mutation {
    pub id: WriteId,
    pub path: DocPath,
    pub kind: MutationKind,
}

impl Mutation {
    pub fn set(path: DocPath, value: Value) -> Self {
        Self::with_kind(path, MutationKind::Set(value))
    }

    pub fn update(path: DocPath, field: FieldPath, value: Value) -> Self {
        Self::with_kind(path, MutationKind::Update(field, value))
    }

    pub fn delete_field(path: DocPath, field: FieldPath) -> Self {
        Self::with_kind(path, MutationKind::DeleteField(field))
    }

    pub fn delete(path: DocPath) -> Self {
        Self::with_kind(path, MutationKind::Delete)
    }

    fn with_kind(path: DocPath, kind: MutationKind) -> Self {
        Self {
            id: WriteId::new(),
            path,
            kind,
        }
    }

    pub fn with_id(mut self, id: WriteId) -> Self {
        self.id = id;
        self
    }

    /// Computes the document body after this mutation. `None` means the
    /// document no longer exists. Partial writes require an existing document.
    pub fn apply_to(&self, current: Option<Value>) -> Result<Option<Value>> {
        match &self.kind {
            MutationKind::Set(value) => Ok(Some(value.clone())),
            MutationKind::Update(field, value) => {
                let mut doc = current.ok_or_else(|| anyhow!("No document to update: {}", self.path))?;
                field.set(&mut doc, value.clone())?;
                Ok(Some(doc))
            }
            MutationKind::DeleteField(field) => {
                let mut doc = current.ok_or_else(|| anyhow!("No document to update: {}", self.path))?;
                field.remove(&mut doc);
                Ok(Some(doc))
            }
            MutationKind::Delete => Ok(None),
        }
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            MutationKind::Set(_) => format!("set {}", self.path),
            MutationKind::Update(field, _) => format!("update {} {}", self.path, field),
            MutationKind::DeleteField(field) => format!("delete field {} {}", self.path, field),
            MutationKind::Delete => format!("delete {}", self.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_requires_existing_document() {
        let mutation = Mutation::update(
            DocPath::new("clients", "a@b.com"),
            FieldPath::from_dotted("accounting.hasPaid"),
            json!(true),
        );
        assert!(mutation.apply_to(None).is_err());
        assert_eq!(
            mutation.apply_to(Some(json!({ "accounting": { "hasPaid": false } }))).unwrap(),
            Some(json!({ "accounting": { "hasPaid": true } }))
        );
    }

    #[test]
    fn delete_of_missing_document_succeeds() -> Result<()> {
        let mutation = Mutation::delete(DocPath::new("clients", "a@b.com"));
        assert_eq!(mutation.apply_to(None)?, None);
        Ok(())
    }

    #[test]
    fn write_ids_are_unique() {
        assert_ne!(WriteId::new(), WriteId::new());
    }
}
