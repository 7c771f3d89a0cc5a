use std::fmt;
use std::sync::Arc;

use vista_schema::ObjectSchema;
use vista_types::{ObjectKey, PropertyType, Value};

use crate::error::{SessionError, SessionResult};
use crate::object::Object;
use crate::session::Session;

/// A live view of one list property of one object.
///
/// Reads always reflect the owner's current value. The view becomes invalid
/// when the owner is deleted or the session closes; operations then fail with
/// `StaleView`.
#[derive(Clone)]
pub struct ListView {
    owner: Object,
    property: String,
    target: Arc<ObjectSchema>,
}

impl ListView {
    pub(crate) fn new(owner: Object, property: &str) -> SessionResult<Self> {
        let prop = owner
            .object_schema()
            .property(property)
            .ok_or_else(|| SessionError::UnknownProperty {
                object_type: owner.object_type().to_string(),
                property: property.to_string(),
            })?;
        let PropertyType::List(target) = &prop.property_type else {
            return Err(SessionError::TypeMismatch {
                object_type: owner.object_type().to_string(),
                property: property.to_string(),
                reason: format!("{} is not a list", prop.property_type),
            });
        };
        let target = owner.session().object_schema(target)?;
        Ok(Self {
            property: property.to_string(),
            target,
            owner,
        })
    }

    pub fn owner(&self) -> &Object {
        &self.owner
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    /// The type of the listed objects.
    pub fn object_type(&self) -> &str {
        &self.target.name
    }

    pub fn is_valid(&self) -> bool {
        self.owner.is_valid()
    }

    fn session(&self) -> &Session {
        self.owner.session()
    }

    /// Keys of the listed objects, in list order.
    pub fn keys(&self) -> SessionResult<Vec<ObjectKey>> {
        let value = self.owner.get(&self.property).map_err(stale)?;
        Ok(value.as_list().map(<[ObjectKey]>::to_vec).unwrap_or_default())
    }

    pub fn len(&self) -> SessionResult<usize> {
        Ok(self.keys()?.len())
    }

    pub fn is_empty(&self) -> SessionResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, index: usize) -> SessionResult<Object> {
        let keys = self.keys()?;
        let key = *keys.get(index).ok_or(SessionError::IndexOutOfRange {
            index,
            len: keys.len(),
        })?;
        Ok(self.object(key))
    }

    pub fn to_vec(&self) -> SessionResult<Vec<Object>> {
        Ok(self.keys()?.into_iter().map(|k| self.object(k)).collect())
    }

    fn object(&self, key: ObjectKey) -> Object {
        Object::new(self.session().clone(), Arc::clone(&self.target), key)
    }

    // -----------------------------------------------------------------------
    // Mutation (inside a write transaction)
    // -----------------------------------------------------------------------

    /// Append `object`, which must be of the listed type.
    pub fn push(&self, object: &Object) -> SessionResult<()> {
        if object.object_type() != self.target.name {
            return Err(SessionError::TypeMismatch {
                object_type: self.owner.object_type().to_string(),
                property: self.property.clone(),
                reason: format!("expected {}, got {}", self.target.name, object.object_type()),
            });
        }
        let mut keys = self.keys()?;
        keys.push(object.key());
        self.store(keys)
    }

    /// Remove the entry at `index` from the list. The object itself is not
    /// deleted.
    pub fn remove(&self, index: usize) -> SessionResult<Object> {
        let mut keys = self.keys()?;
        if index >= keys.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                len: keys.len(),
            });
        }
        let key = keys.remove(index);
        self.store(keys)?;
        Ok(self.object(key))
    }

    /// Empty the list without deleting the listed objects.
    pub fn clear(&self) -> SessionResult<()> {
        self.store(Vec::new())
    }

    fn store(&self, keys: Vec<ObjectKey>) -> SessionResult<()> {
        self.owner.set(&self.property, Value::List(keys)).map_err(stale)
    }
}

fn stale(e: SessionError) -> SessionError {
    match e {
        SessionError::DeletedObject(_) | SessionError::SessionClosed => SessionError::StaleView,
        other => other,
    }
}

impl fmt::Debug for ListView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListView")
            .field("owner", &self.owner)
            .field("property", &self.property)
            .field("type", &self.target.name)
            .finish()
    }
}

impl Session {
    /// A live view of the list property `property` of `object`.
    pub fn list(&self, object: &Object, property: &str) -> SessionResult<ListView> {
        self.handle()?;
        ListView::new(object.clone(), property)
    }
}
