//! Object handles.

use crate::database::Database;
use crate::id::ObjectId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Weak;

/// A non-owning reference to an object in a store.
///
/// A handle is a (store, id) pair: it does not keep the object — or the
/// store — alive, it is purely a capability to look the object up. A handle
/// is valid iff its store is still alive, the slot index is in range, the
/// slot's generation matches the id's generation field, and the slot holds
/// a live object. After the object is deleted the handle goes stale and
/// every access through it fails; a later reuse of the slot does not
/// resurrect it, because the reuse bumps the slot's generation.
///
/// Handles are cheap to clone, compare and hash, so the UI layer can key
/// per-object widget state on them.
#[derive(Clone)]
pub struct ObjectHandle {
    db: Weak<Database>,
    id: ObjectId,
}

impl ObjectHandle {
    pub(crate) fn new(db: Weak<Database>, id: ObjectId) -> Self {
        Self { db, id }
    }

    /// Creates a handle that references no store and no object.
    #[must_use]
    pub fn null() -> Self {
        Self {
            db: Weak::new(),
            id: ObjectId::NONE,
        }
    }

    /// Returns the object id this handle refers to.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Returns `true` if the handle currently resolves to a live object.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self.db.upgrade() {
            Some(db) => db.is_valid_id(self.id),
            None => false,
        }
    }

    /// Returns the stored type name, or `None` if the handle is invalid.
    #[must_use]
    pub fn type_name(&self) -> Option<&'static str> {
        self.db.upgrade().and_then(|db| db.type_name_of(self.id))
    }

    /// Returns `true` if this handle was minted by `db`.
    pub(crate) fn belongs_to(&self, db: &Database) -> bool {
        std::ptr::eq(self.db.as_ptr(), db)
    }
}

impl Default for ObjectHandle {
    fn default() -> Self {
        Self::null()
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.db, &other.db) && self.id == other.id
    }
}

impl Eq for ObjectHandle {}

impl Hash for ObjectHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.db.as_ptr() as usize).hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .finish()
    }
}
