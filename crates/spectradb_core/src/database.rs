//! The object store.

use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use crate::handle::ObjectHandle;
use crate::id::ObjectId;
use crate::record::{Payload, Record};
use crate::registry::TypeRegistry;
use crate::transaction::{SlotSnapshot, TxnOp, TxnOpKind, TxnRecord, TxnState};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Weak};

/// A live object: its type tag and its value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Entry {
    pub type_name: &'static str,
    pub payload: Payload,
}

/// One position in the store's backing array, reused across object
/// lifetimes. The generation counter is bumped each time the slot is
/// reclaimed for a new object.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub generation: u16,
    pub alive: bool,
    pub entry: Option<Entry>,
}

impl Slot {
    pub(crate) fn vacant() -> Self {
        Self {
            generation: 0,
            alive: false,
            entry: None,
        }
    }
}

/// Everything guarded by the store's single reader/writer lock.
pub(crate) struct State {
    pub slots: Vec<Slot>,
    pub free: BTreeSet<u16>,
    pub root: Option<ObjectId>,
    pub txn: Option<TxnState>,
    pub undo: VecDeque<TxnRecord>,
    pub redo: VecDeque<TxnRecord>,
    pub undo_capacity: usize,
    /// Signed distance from the last saved state: commits increment,
    /// undo decrements, redo increments. Zero means unmodified.
    pub modified: i64,
    pub file_path: Option<PathBuf>,
}

impl State {
    pub(crate) fn blank(undo_capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: BTreeSet::new(),
            root: None,
            txn: None,
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            undo_capacity,
            modified: 0,
            file_path: None,
        }
    }

    pub(crate) fn is_valid(&self, id: ObjectId) -> bool {
        match self.slots.get(usize::from(id.index())) {
            Some(slot) => slot.alive && slot.generation == id.generation(),
            None => false,
        }
    }

    /// Recomputes the free-slot set from the alive flags.
    pub(crate) fn rebuild_free(&mut self) {
        self.free = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.alive)
            .map(|(index, _)| index as u16)
            .collect();
    }

    pub(crate) fn alive_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.alive).count()
    }
}

/// The object store backing every editable entity.
///
/// A `Database` owns all record payloads by value; external code reaches
/// them only through [`ObjectHandle`]s. All mutation goes through
/// [`create`](Database::create) / [`modify`](Database::modify) /
/// [`remove`](Database::remove), normally inside a transaction so the
/// change lands on the undo stack as one unit.
///
/// One reader/writer lock guards the whole store: queries take it shared,
/// mutation (including load/save and undo/redo) takes it exclusive. There
/// is no internal fine-grained locking and no operation suspends while
/// holding the lock, apart from file I/O during load/save which
/// deliberately blocks all other access.
pub struct Database {
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) config: DbConfig,
    pub(crate) state: RwLock<State>,
    pub(crate) self_ref: Weak<Database>,
}

impl Database {
    /// Creates an empty store using the given registry.
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Arc<Self> {
        Self::with_config(registry, DbConfig::default())
    }

    /// Creates an empty store with custom configuration.
    #[must_use]
    pub fn with_config(registry: Arc<TypeRegistry>, config: DbConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            registry,
            state: RwLock::new(State::blank(config.undo_capacity)),
            config,
            self_ref: self_ref.clone(),
        })
    }

    /// Returns the registry this store was created with.
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Returns this store's configuration.
    #[must_use]
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Builds a handle for a raw object id.
    ///
    /// The handle is not checked; resolve or validate it to find out
    /// whether the id still names a live object.
    #[must_use]
    pub fn handle(&self, id: ObjectId) -> ObjectHandle {
        ObjectHandle::new(self.self_ref.clone(), id)
    }

    /// Creates a new object and returns a handle to it.
    ///
    /// A free slot index is reused (bumping its generation) if one exists,
    /// otherwise a new slot is appended. Inside a transaction the creation
    /// is recorded for undo.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownType`] if `T` is not registered, or
    /// [`DbError::Failure`] if the slot space is exhausted.
    pub fn create<T: Record>(&self, value: T) -> DbResult<ObjectHandle> {
        if !self.registry.contains::<T>() {
            return Err(DbError::unknown_type(T::TYPE_NAME));
        }

        let mut state = self.state.write();
        let state = &mut *state;

        let reused = state.free.iter().next().copied();
        let index = match reused {
            Some(index) => index,
            None => {
                let next = state.slots.len();
                if next > usize::from(ObjectId::MAX_INDEX) {
                    return Err(DbError::failure("slot space exhausted"));
                }
                next as u16
            }
        };

        if state.txn.is_some() {
            let snapshot = SlotSnapshot::of(&state.slots, index);
            if let Some(txn) = state.txn.as_mut() {
                txn.workspace.entry(index).or_insert(snapshot);
            }
        }

        let payload = value.into_payload();
        let op_payload = state.txn.as_ref().map(|_| payload.clone());
        let generation = match reused {
            Some(index) => {
                state.free.remove(&index);
                let slot = &mut state.slots[usize::from(index)];
                slot.generation = slot.generation.wrapping_add(1);
                slot.alive = true;
                slot.entry = Some(Entry {
                    type_name: T::TYPE_NAME,
                    payload,
                });
                slot.generation
            }
            None => {
                state.slots.push(Slot {
                    generation: 0,
                    alive: true,
                    entry: Some(Entry {
                        type_name: T::TYPE_NAME,
                        payload,
                    }),
                });
                0
            }
        };

        let id = ObjectId::new(index, generation);
        if let Some(txn) = state.txn.as_mut() {
            txn.ops.push(TxnOp {
                kind: TxnOpKind::Create,
                id,
                type_name: T::TYPE_NAME,
                before: None,
                after: op_payload,
            });
        }

        Ok(self.handle(id))
    }

    /// Deletes the object behind `handle`.
    ///
    /// The slot is marked dead, its payload cleared and its index freed for
    /// reuse; the generation bump happens at the next create of that slot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidHandle`] if the handle belongs to another
    /// store, its index is out of range, or the stored object is not a `T`;
    /// [`DbError::ObjectNotFound`] if the slot is dead or the id does not
    /// match; [`DbError::UnknownType`] if `T` is not registered.
    pub fn remove<T: Record>(&self, handle: &ObjectHandle) -> DbResult<()> {
        if !self.registry.contains::<T>() {
            return Err(DbError::unknown_type(T::TYPE_NAME));
        }
        if !handle.belongs_to(self) {
            return Err(DbError::InvalidHandle);
        }

        let mut state = self.state.write();
        let state = &mut *state;
        let id = handle.id();
        let index = id.index();
        let idx = usize::from(index);

        if idx >= state.slots.len() {
            return Err(DbError::InvalidHandle);
        }
        {
            let slot = &state.slots[idx];
            if !slot.alive || slot.generation != id.generation() {
                return Err(DbError::ObjectNotFound);
            }
            match slot.entry.as_ref() {
                Some(entry) if entry.type_name == T::TYPE_NAME => {}
                _ => return Err(DbError::InvalidHandle),
            }
        }

        if state.txn.is_some() {
            let snapshot = SlotSnapshot::of(&state.slots, index);
            let before = state.slots[idx]
                .entry
                .as_ref()
                .map(|entry| entry.payload.clone());
            if let Some(txn) = state.txn.as_mut() {
                txn.workspace.entry(index).or_insert(snapshot);
                txn.ops.push(TxnOp {
                    kind: TxnOpKind::Delete,
                    id,
                    type_name: T::TYPE_NAME,
                    before,
                    after: None,
                });
            }
        }

        let slot = &mut state.slots[idx];
        slot.alive = false;
        slot.entry = None;
        state.free.insert(index);
        Ok(())
    }

    /// Replaces the object behind `handle` with `value`.
    ///
    /// Mutation is whole-record replacement: callers clone the current
    /// record, change fields, and submit the result. The prior value is
    /// captured for undo when a transaction is open.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Database::remove`]; both the slot index and
    /// the generation must match the handle's id.
    pub fn modify<T: Record>(&self, handle: &ObjectHandle, value: T) -> DbResult<()> {
        if !self.registry.contains::<T>() {
            return Err(DbError::unknown_type(T::TYPE_NAME));
        }
        if !handle.belongs_to(self) {
            return Err(DbError::InvalidHandle);
        }

        let mut state = self.state.write();
        let state = &mut *state;
        let id = handle.id();
        let idx = usize::from(id.index());

        if idx >= state.slots.len() {
            return Err(DbError::InvalidHandle);
        }
        {
            let slot = &state.slots[idx];
            if !slot.alive || slot.generation != id.generation() {
                return Err(DbError::ObjectNotFound);
            }
            match slot.entry.as_ref() {
                Some(entry) if entry.type_name == T::TYPE_NAME => {}
                _ => return Err(DbError::InvalidHandle),
            }
        }

        let payload = value.into_payload();

        if state.txn.is_some() {
            let snapshot = SlotSnapshot::of(&state.slots, id.index());
            let before = state.slots[idx]
                .entry
                .as_ref()
                .map(|entry| entry.payload.clone());
            if let Some(txn) = state.txn.as_mut() {
                txn.workspace.entry(id.index()).or_insert(snapshot);
                txn.ops.push(TxnOp {
                    kind: TxnOpKind::Modify,
                    id,
                    type_name: T::TYPE_NAME,
                    before,
                    after: Some(payload.clone()),
                });
            }
        }

        state.slots[idx].entry = Some(Entry {
            type_name: T::TYPE_NAME,
            payload,
        });
        Ok(())
    }

    /// Returns a read-only typed view of the object behind `handle`.
    ///
    /// The store's shared lock is held for as long as the returned guard
    /// lives. Returns `None` on any validity failure or if the stored
    /// object is not a `T`.
    #[must_use]
    pub fn get<T: Record>(&self, handle: &ObjectHandle) -> Option<MappedRwLockReadGuard<'_, T>> {
        if !handle.belongs_to(self) {
            return None;
        }
        let id = handle.id();
        let state = self.state.read();
        RwLockReadGuard::try_map(state, |state| {
            let slot = state.slots.get(usize::from(id.index()))?;
            if !slot.alive || slot.generation != id.generation() {
                return None;
            }
            T::from_payload(&slot.entry.as_ref()?.payload)
        })
        .ok()
    }

    /// Designates the object behind `handle` as the root object.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidHandle`] if the handle does not resolve to
    /// a live object in this store.
    pub fn set_root(&self, handle: &ObjectHandle) -> DbResult<()> {
        if !handle.belongs_to(self) {
            return Err(DbError::InvalidHandle);
        }
        let mut state = self.state.write();
        if !state.is_valid(handle.id()) {
            return Err(DbError::InvalidHandle);
        }
        state.root = Some(handle.id());
        Ok(())
    }

    /// Returns a handle to the root object, revalidating liveness and
    /// generation first.
    #[must_use]
    pub fn root(&self) -> Option<ObjectHandle> {
        let state = self.state.read();
        let id = state.root?;
        if state.is_valid(id) {
            Some(self.handle(id))
        } else {
            None
        }
    }

    /// Returns the number of live objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.state.read().alive_count()
    }

    /// Reports whether the store differs from its last saved state.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.state.read().modified != 0
    }

    pub(crate) fn is_valid_id(&self, id: ObjectId) -> bool {
        self.state.read().is_valid(id)
    }

    pub(crate) fn type_name_of(&self, id: ObjectId) -> Option<&'static str> {
        let state = self.state.read();
        let slot = state.slots.get(usize::from(id.index()))?;
        if slot.alive && slot.generation == id.generation() {
            slot.entry.as_ref().map(|entry| entry.type_name)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Database")
            .field("objects", &state.alive_count())
            .field("slots", &state.slots.len())
            .field("in_transaction", &state.txn.is_some())
            .field("undo_depth", &state.undo.len())
            .field("redo_depth", &state.redo.len())
            .field("modified", &(state.modified != 0))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Model, Scene, Wave};

    fn create_db() -> Arc<Database> {
        Database::new(Arc::new(TypeRegistry::with_defaults()))
    }

    #[test]
    fn create_then_get_roundtrip() {
        let db = create_db();
        let model = Model {
            name: "teapot".to_string(),
            location: [1.0, 2.0, 3.0],
            ..Default::default()
        };

        let handle = db.create(model.clone()).unwrap();
        assert!(handle.is_valid());
        assert_eq!(handle.type_name(), Some("Model"));

        let stored = db.get::<Model>(&handle).unwrap();
        assert_eq!(*stored, model);
    }

    #[test]
    fn get_with_wrong_type_is_none() {
        let db = create_db();
        let handle = db.create(Scene::default()).unwrap();
        assert!(db.get::<Model>(&handle).is_none());
        assert!(db.get::<Scene>(&handle).is_some());
    }

    #[test]
    fn unregistered_type_is_rejected() {
        let db = Database::new(Arc::new(TypeRegistry::new()));
        let result = db.create(Scene::default());
        assert!(matches!(result, Err(DbError::UnknownType { .. })));
    }

    #[test]
    fn remove_invalidates_handle() {
        let db = create_db();
        let handle = db.create(Wave::default()).unwrap();

        db.remove::<Wave>(&handle).unwrap();
        assert!(!handle.is_valid());
        assert!(db.get::<Wave>(&handle).is_none());
        assert_eq!(handle.type_name(), None);

        let result = db.remove::<Wave>(&handle);
        assert!(matches!(result, Err(DbError::ObjectNotFound)));
    }

    #[test]
    fn slot_reuse_bumps_generation() {
        let db = create_db();
        let old = db.create(Wave::default()).unwrap();
        let old_id = old.id();

        db.remove::<Wave>(&old).unwrap();
        let new = db.create(Wave::default()).unwrap();

        // Same slot, new generation: the stale handle stays invalid.
        assert_eq!(new.id().index(), old_id.index());
        assert_eq!(new.id().generation(), old_id.generation() + 1);
        assert!(!old.is_valid());
        assert!(new.is_valid());
        assert!(db.get::<Wave>(&old).is_none());
    }

    #[test]
    fn modify_replaces_whole_record() {
        let db = create_db();
        let handle = db
            .create(Model {
                name: "before".to_string(),
                ..Default::default()
            })
            .unwrap();

        let mut updated = Model::clone(&db.get::<Model>(&handle).unwrap());
        updated.name = "after".to_string();
        updated.visible = false;
        db.modify(&handle, updated.clone()).unwrap();

        assert_eq!(*db.get::<Model>(&handle).unwrap(), updated);
    }

    #[test]
    fn modify_with_stale_generation_fails() {
        let db = create_db();
        let old = db.create(Wave::default()).unwrap();
        db.remove::<Wave>(&old).unwrap();
        let _new = db.create(Wave::default()).unwrap();

        let result = db.modify(&old, Wave::default());
        assert!(matches!(result, Err(DbError::ObjectNotFound)));
    }

    #[test]
    fn handle_from_other_store_is_rejected() {
        let registry = Arc::new(TypeRegistry::with_defaults());
        let db_a = Database::new(Arc::clone(&registry));
        let db_b = Database::new(registry);

        let handle = db_a.create(Scene::default()).unwrap();
        assert!(db_b.get::<Scene>(&handle).is_none());
        assert!(matches!(
            db_b.remove::<Scene>(&handle),
            Err(DbError::InvalidHandle)
        ));
    }

    #[test]
    fn root_object_revalidates() {
        let db = create_db();
        let scene = db.create(Scene::default()).unwrap();

        assert!(db.root().is_none());
        db.set_root(&scene).unwrap();
        assert_eq!(db.root().unwrap(), scene);

        db.remove::<Scene>(&scene).unwrap();
        assert!(db.root().is_none());
    }

    #[test]
    fn null_handle_is_invalid_everywhere() {
        let db = create_db();
        let null = ObjectHandle::null();
        assert!(!null.is_valid());
        assert!(db.get::<Scene>(&null).is_none());
        assert!(matches!(db.set_root(&null), Err(DbError::InvalidHandle)));
    }

    #[test]
    fn object_count_tracks_alive_objects() {
        let db = create_db();
        assert_eq!(db.object_count(), 0);

        let a = db.create(Wave::default()).unwrap();
        let _b = db.create(Wave::default()).unwrap();
        assert_eq!(db.object_count(), 2);

        db.remove::<Wave>(&a).unwrap();
        assert_eq!(db.object_count(), 1);
    }

    #[test]
    fn handles_key_associative_containers() {
        use std::collections::HashMap;

        let db = create_db();
        let a = db.create(Wave::default()).unwrap();
        let b = db.create(Wave::default()).unwrap();

        let mut widget_state: HashMap<ObjectHandle, &str> = HashMap::new();
        widget_state.insert(a.clone(), "expanded");
        widget_state.insert(b.clone(), "collapsed");

        assert_eq!(widget_state[&a], "expanded");
        assert_eq!(widget_state[&b], "collapsed");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
