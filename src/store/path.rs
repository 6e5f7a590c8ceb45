use std::{fmt, marker::PhantomData};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Entity, Mutation};

/// Address of one document: a collection name and a document id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Parses `collection/id`. The id may not contain further slashes.
    pub fn parse(path: &str) -> Result<Self> {
        match path.split_once('/') {
            Some((collection, id)) if !collection.is_empty() && !id.is_empty() && !id.contains('/') => {
                Ok(Self::new(collection, id))
            }
            _ => bail!("Invalid document path '{}'", path),
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Path to a field nested inside a document, one segment per map level.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Splits on `.`. Use `from_segments` when a segment itself contains a
    /// dot, e.g. an email address used as a map key.
    pub fn from_dotted(path: &str) -> Self {
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn get<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(doc, |value, segment| value.as_object()?.get(segment))
    }

    /// Sets the value, creating intermediate maps as needed. Fails if an
    /// intermediate segment holds a non-map value.
    pub fn set(&self, doc: &mut Value, value: Value) -> Result<()> {
        let Some((last, parents)) = self.segments.split_last() else {
            bail!("Cannot set an empty field path");
        };
        let mut current = doc;
        for segment in parents {
            let Some(map) = current.as_object_mut() else {
                bail!("Field '{}' is not a map at '{}'", self, segment);
            };
            current = map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        match current.as_object_mut() {
            Some(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            None => bail!("Field '{}' is not a map at '{}'", self, last),
        }
    }

    /// Removes the field. Missing paths are left alone.
    pub fn remove(&self, doc: &mut Value) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut current = doc;
        for segment in parents {
            current = current.as_object_mut()?.get_mut(segment)?;
        }
        current.as_object_mut()?.remove(last)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// A field of document type `D` holding values of type `V`. Constructors
/// for the known fields live next to the document types, so a binding can
/// only pair a path with the value type the schema declares for it.
pub struct Field<D, V> {
    path: FieldPath,
    _marker: PhantomData<fn(&D) -> V>,
}

impl<D, V> Clone for Field<D, V> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

impl<D, V> fmt::Debug for Field<D, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.path.to_string()).finish()
    }
}

impl<D, V: Entity> Field<D, V> {
    pub fn new(path: FieldPath) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Decodes the field from a document body. `Ok(None)` when absent.
    pub fn read(&self, doc: &Value) -> Result<Option<V>> {
        match self.path.get(doc) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn update(&self, doc: &DocPath, value: &V) -> Result<Mutation> {
        Ok(Mutation::update(doc.clone(), self.path.clone(), serde_json::to_value(value)?))
    }

    pub fn delete(&self, doc: &DocPath) -> Mutation {
        Mutation::delete_field(doc.clone(), self.path.clone())
    }
}
