use tracing::debug;
use vista_types::ObjectKey;

use crate::error::{SessionError, SessionResult};
use crate::list::ListView;
use crate::object::Object;
use crate::results::ResultView;
use crate::session::Session;

/// What [`Session::delete`] removes.
#[derive(Clone, Debug)]
pub enum DeleteTarget {
    Object(Object),
    /// Deleted last to first.
    Objects(Vec<Object>),
    /// Every object currently in the view.
    Results(ResultView),
    /// Every object in the list. The list itself ends up empty.
    List(ListView),
}

impl DeleteTarget {
    /// Materialize the target as `(type, key)` pairs.
    fn resolve(self) -> SessionResult<Vec<(String, ObjectKey)>> {
        let pairs = match self {
            Self::Object(object) => vec![(object.object_type().to_string(), object.key())],
            // Last to first, so each move_last_over leaves earlier targets
            // where the caller saw them.
            Self::Objects(objects) => objects
                .iter()
                .rev()
                .map(|o| (o.object_type().to_string(), o.key()))
                .collect(),
            Self::Results(view) => {
                let object_type = view.object_type().to_string();
                view.keys()?
                    .into_iter()
                    .map(|k| (object_type.clone(), k))
                    .collect()
            }
            Self::List(list) => {
                let object_type = list.object_type().to_string();
                list.keys()?
                    .into_iter()
                    .map(|k| (object_type.clone(), k))
                    .collect()
            }
        };
        Ok(pairs)
    }
}

impl From<Object> for DeleteTarget {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl From<&Object> for DeleteTarget {
    fn from(object: &Object) -> Self {
        Self::Object(object.clone())
    }
}

impl From<Vec<Object>> for DeleteTarget {
    fn from(objects: Vec<Object>) -> Self {
        Self::Objects(objects)
    }
}

impl From<&[Object]> for DeleteTarget {
    fn from(objects: &[Object]) -> Self {
        Self::Objects(objects.to_vec())
    }
}

impl From<ResultView> for DeleteTarget {
    fn from(view: ResultView) -> Self {
        Self::Results(view)
    }
}

impl From<&ResultView> for DeleteTarget {
    fn from(view: &ResultView) -> Self {
        Self::Results(view.clone())
    }
}

impl From<ListView> for DeleteTarget {
    fn from(list: ListView) -> Self {
        Self::List(list)
    }
}

impl From<&ListView> for DeleteTarget {
    fn from(list: &ListView) -> Self {
        Self::List(list.clone())
    }
}

impl Session {
    /// Delete the objects `target` names. Returns how many were deleted.
    ///
    /// The target is resolved to keys first; each object is then removed
    /// by moving the last row of its table into its place. Links to a
    /// deleted object become null and list entries for it are dropped.
    /// Objects that no longer exist are skipped.
    pub fn delete(&self, target: impl Into<DeleteTarget>) -> SessionResult<usize> {
        self.handle()?;
        if !self.is_in_transaction() {
            return Err(SessionError::NotInTransaction);
        }
        let targets = target.into().resolve()?;
        let deleted = self.write(|group| {
            let mut deleted = 0;
            for (object_type, key) in &targets {
                if group.delete_object(object_type, *key)? {
                    deleted += 1;
                }
            }
            Ok(deleted)
        })?;
        debug!(requested = targets.len(), deleted, "deleted objects");
        Ok(deleted)
    }

    /// Delete every object of every type.
    pub fn delete_all(&self) -> SessionResult<usize> {
        let names: Vec<String> = self.schema().names().into_iter().map(str::to_string).collect();
        let deleted = self.write(|group| {
            let mut deleted = 0;
            for name in &names {
                deleted += group.clear_table(name)?;
            }
            Ok(deleted)
        })?;
        debug!(deleted, "deleted all objects");
        Ok(deleted)
    }
}
