//! Transactions, undo/redo history, and the scope guard.

use crate::database::{Database, Entry, Slot, State};
use crate::error::{DbError, DbResult};
use crate::handle::ObjectHandle;
use crate::id::ObjectId;
use crate::record::Payload;
use std::collections::{BTreeSet, HashMap};

/// The kind of change an op records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxnOpKind {
    /// An object was created.
    Create,
    /// An object's value was replaced.
    Modify,
    /// An object was deleted.
    Delete,
}

/// One recorded change: the diff unit replayed by undo/redo.
///
/// Alive-ness on each side is carried by payload presence: `before` is
/// `None` for a create, `after` is `None` for a delete.
#[derive(Debug, Clone)]
pub(crate) struct TxnOp {
    pub kind: TxnOpKind,
    pub id: ObjectId,
    pub type_name: &'static str,
    pub before: Option<Payload>,
    pub after: Option<Payload>,
}

/// The ordered ops of one committed transaction: one logical user action,
/// potentially touching many objects.
pub(crate) type TxnRecord = Vec<TxnOp>;

/// Pre-transaction image of one slot, captured lazily the first time the
/// slot is touched during the transaction.
#[derive(Debug, Clone)]
pub(crate) enum SlotSnapshot {
    /// The slot did not exist before the transaction.
    Missing,
    /// The slot's full prior state.
    Present {
        generation: u16,
        alive: bool,
        entry: Option<Entry>,
    },
}

impl SlotSnapshot {
    pub(crate) fn of(slots: &[Slot], index: u16) -> Self {
        match slots.get(usize::from(index)) {
            Some(slot) => Self::Present {
                generation: slot.generation,
                alive: slot.alive,
                entry: slot.entry.clone(),
            },
            None => Self::Missing,
        }
    }
}

/// State of the one open transaction.
#[derive(Debug, Default)]
pub(crate) struct TxnState {
    pub ops: Vec<TxnOp>,
    pub workspace: HashMap<u16, SlotSnapshot>,
}

/// Which side of a recorded op to restore.
#[derive(Clone, Copy)]
enum Side {
    Before,
    After,
}

impl State {
    /// Restores one slot to the given side of an op, maintaining the free
    /// set and re-animating freed slots with the op's generation.
    fn apply_side(&mut self, op: &TxnOp, side: Side) {
        let payload = match side {
            Side::Before => &op.before,
            Side::After => &op.after,
        };
        let index = op.id.index();
        let idx = usize::from(index);
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, Slot::vacant);
        }
        let slot = &mut self.slots[idx];
        slot.generation = op.id.generation();
        match payload {
            Some(payload) => {
                slot.alive = true;
                slot.entry = Some(Entry {
                    type_name: op.type_name,
                    payload: payload.clone(),
                });
                self.free.remove(&index);
            }
            None => {
                slot.alive = false;
                slot.entry = None;
                self.free.insert(index);
            }
        }
    }
}

impl Database {
    /// Opens a transaction. No-op if one is already open (no nesting).
    pub fn begin_transaction(&self) {
        let mut state = self.state.write();
        if state.txn.is_none() {
            state.txn = Some(TxnState::default());
        }
    }

    /// Returns `true` if a transaction is currently open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.state.read().txn.is_some()
    }

    /// Commits the open transaction.
    ///
    /// No-op if no transaction is open. A transaction that touched nothing
    /// leaves no history entry and does not count as a modification.
    /// Otherwise the recorded ops are pushed onto the undo stack (evicting
    /// the oldest entry at capacity) and the redo stack is cleared.
    pub fn commit_transaction(&self) {
        let mut state = self.state.write();
        let Some(txn) = state.txn.take() else {
            return;
        };
        if txn.ops.is_empty() {
            return;
        }
        let (creates, modifies, deletes) =
            txn.ops.iter().fold((0, 0, 0), |acc, op| match op.kind {
                TxnOpKind::Create => (acc.0 + 1, acc.1, acc.2),
                TxnOpKind::Modify => (acc.0, acc.1 + 1, acc.2),
                TxnOpKind::Delete => (acc.0, acc.1, acc.2 + 1),
            });
        tracing::debug!(creates, modifies, deletes, "transaction committed");
        if state.undo_capacity > 0 {
            while state.undo.len() >= state.undo_capacity {
                state.undo.pop_front();
            }
            state.undo.push_back(txn.ops);
        }
        state.redo.clear();
        state.modified += 1;
    }

    /// Rolls back the open transaction.
    ///
    /// No-op if no transaction is open. Every slot touched during the
    /// transaction is restored from its before-image and the free-slot set
    /// is recomputed from scratch.
    pub fn rollback_transaction(&self) {
        let mut state = self.state.write();
        let Some(txn) = state.txn.take() else {
            return;
        };
        tracing::debug!(slots = txn.workspace.len(), "transaction rolled back");
        let state = &mut *state;
        for (index, snapshot) in txn.workspace {
            let idx = usize::from(index);
            match snapshot {
                SlotSnapshot::Present {
                    generation,
                    alive,
                    entry,
                } => {
                    if idx >= state.slots.len() {
                        state.slots.resize_with(idx + 1, Slot::vacant);
                    }
                    let slot = &mut state.slots[idx];
                    slot.generation = generation;
                    slot.alive = alive;
                    slot.entry = entry;
                }
                SlotSnapshot::Missing => {
                    if let Some(slot) = state.slots.get_mut(idx) {
                        slot.alive = false;
                        slot.entry = None;
                    }
                }
            }
        }
        state.rebuild_free();
    }

    /// Returns `true` if there is a transaction record to undo.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        let state = self.state.read();
        state.txn.is_none() && !state.undo.is_empty()
    }

    /// Returns `true` if there is a transaction record to redo.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        let state = self.state.read();
        state.txn.is_none() && !state.redo.is_empty()
    }

    /// Number of transaction records available to undo.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.state.read().undo.len()
    }

    /// Number of transaction records available to redo.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.state.read().redo.len()
    }

    /// Reverts the most recently committed transaction.
    ///
    /// The record's ops are validated first and then replayed in reverse,
    /// restoring each touched slot to its "before" side; no slot is mutated
    /// if any op is not replayable. On success the record moves to the redo
    /// stack and the handles of every touched object are returned so
    /// dependent views can refresh.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Failure`] if a transaction is open or there is
    /// nothing to undo, or [`DbError::UnknownType`] if a recorded type is
    /// no longer registered.
    pub fn undo(&self) -> DbResult<Vec<ObjectHandle>> {
        let mut state = self.state.write();
        if state.txn.is_some() {
            return Err(DbError::failure("cannot undo during an open transaction"));
        }
        {
            let record = state
                .undo
                .back()
                .ok_or_else(|| DbError::failure("nothing to undo"))?;
            self.ensure_replayable(record)?;
        }
        let Some(record) = state.undo.pop_back() else {
            return Err(DbError::failure("nothing to undo"));
        };

        let touched = {
            let state = &mut *state;
            let mut touched = Vec::new();
            let mut seen = BTreeSet::new();
            for op in record.iter().rev() {
                state.apply_side(op, Side::Before);
                if seen.insert(op.id) {
                    touched.push(self.handle(op.id));
                }
            }
            touched
        };

        tracing::debug!(ops = record.len(), "undo applied");
        state.redo.push_back(record);
        state.modified -= 1;
        Ok(touched)
    }

    /// Re-applies the most recently undone transaction.
    ///
    /// The record's ops are validated first and then replayed in order,
    /// restoring each touched slot to its "after" side. On success the
    /// record moves back to the undo stack and the handles of every
    /// touched object are returned.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Failure`] if a transaction is open or there is
    /// nothing to redo, or [`DbError::UnknownType`] if a recorded type is
    /// no longer registered.
    pub fn redo(&self) -> DbResult<Vec<ObjectHandle>> {
        let mut state = self.state.write();
        if state.txn.is_some() {
            return Err(DbError::failure("cannot redo during an open transaction"));
        }
        {
            let record = state
                .redo
                .back()
                .ok_or_else(|| DbError::failure("nothing to redo"))?;
            self.ensure_replayable(record)?;
        }
        let Some(record) = state.redo.pop_back() else {
            return Err(DbError::failure("nothing to redo"));
        };

        let touched = {
            let state = &mut *state;
            let mut touched = Vec::new();
            let mut seen = BTreeSet::new();
            for op in record.iter() {
                state.apply_side(op, Side::After);
                if seen.insert(op.id) {
                    touched.push(self.handle(op.id));
                }
            }
            touched
        };

        tracing::debug!(ops = record.len(), "redo applied");
        if state.undo_capacity > 0 {
            while state.undo.len() >= state.undo_capacity {
                state.undo.pop_front();
            }
            state.undo.push_back(record);
        }
        state.modified += 1;
        Ok(touched)
    }

    /// Sets the undo stack capacity, evicting oldest entries immediately.
    pub fn set_undo_capacity(&self, capacity: usize) {
        let mut state = self.state.write();
        state.undo_capacity = capacity;
        while state.undo.len() > capacity {
            state.undo.pop_front();
        }
    }

    /// Returns the undo stack capacity.
    #[must_use]
    pub fn undo_capacity(&self) -> usize {
        self.state.read().undo_capacity
    }

    /// Opens a transaction and returns a guard that rolls it back on drop
    /// unless [`TxnGuard::commit`] is called first.
    ///
    /// If a transaction is already open the guard attaches to it without
    /// owning it: committing or dropping the inner guard is then a no-op
    /// and the outer guard stays in control.
    pub fn transaction(&self) -> TxnGuard<'_> {
        let owns = {
            let mut state = self.state.write();
            if state.txn.is_some() {
                false
            } else {
                state.txn = Some(TxnState::default());
                true
            }
        };
        TxnGuard {
            db: self,
            owns,
            committed: false,
        }
    }

    /// Runs `f` inside a transaction, committing only if it returns `Ok`.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `f`; the transaction is rolled
    /// back in that case.
    pub fn with_transaction<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Self) -> DbResult<T>,
    {
        let guard = self.transaction();
        match f(self) {
            Ok(value) => {
                guard.commit();
                Ok(value)
            }
            Err(e) => {
                drop(guard);
                Err(e)
            }
        }
    }

    /// Two-phase apply, first phase: every op must be replayable before any
    /// slot is mutated, so a failed undo/redo leaves state untouched.
    fn ensure_replayable(&self, record: &TxnRecord) -> DbResult<()> {
        for op in record {
            if !self.registry.contains_name(op.type_name) {
                return Err(DbError::unknown_type(op.type_name));
            }
        }
        Ok(())
    }
}

/// Scope guard ensuring a transaction is committed or rolled back on every
/// exit path, including early returns and panics.
#[must_use = "dropping the guard immediately rolls the transaction back"]
pub struct TxnGuard<'db> {
    db: &'db Database,
    owns: bool,
    committed: bool,
}

impl TxnGuard<'_> {
    /// Commits the transaction this guard opened.
    pub fn commit(mut self) {
        self.committed = true;
        if self.owns {
            self.db.commit_transaction();
        }
    }
}

impl Drop for TxnGuard<'_> {
    fn drop(&mut self) {
        if self.owns && !self.committed {
            self.db.rollback_transaction();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Model, Scene, Wave};
    use crate::registry::TypeRegistry;
    use std::sync::Arc;

    fn create_db() -> Arc<Database> {
        Database::new(Arc::new(TypeRegistry::with_defaults()))
    }

    fn named_wave(name: &str) -> Wave {
        Wave {
            name: name.to_string(),
            samples: Vec::new(),
        }
    }

    #[test]
    fn commit_pushes_one_record() {
        let db = create_db();
        assert_eq!(db.undo_depth(), 0);

        db.begin_transaction();
        db.create(named_wave("a")).unwrap();
        db.create(named_wave("b")).unwrap();
        db.commit_transaction();

        assert_eq!(db.undo_depth(), 1);
        assert!(db.can_undo());
        assert!(!db.can_redo());
    }

    #[test]
    fn empty_transaction_leaves_no_trace() {
        let db = create_db();
        db.begin_transaction();
        db.commit_transaction();

        assert_eq!(db.undo_depth(), 0);
        assert!(!db.is_modified());
    }

    #[test]
    fn rollback_restores_pre_transaction_state() {
        let db = create_db();

        // Pre-existing objects: B gets modified, C gets removed.
        let b = db.create(named_wave("b")).unwrap();
        let c = db.create(named_wave("c")).unwrap();
        let b_value = Wave::clone(&db.get::<Wave>(&b).unwrap());

        db.begin_transaction();
        let a = db.create(named_wave("a")).unwrap();
        db.modify(&b, named_wave("b-changed")).unwrap();
        db.remove::<Wave>(&c).unwrap();
        db.rollback_transaction();

        assert!(!a.is_valid());
        assert_eq!(*db.get::<Wave>(&b).unwrap(), b_value);
        assert!(c.is_valid());
        assert_eq!(db.object_count(), 2);

        // The slot A occupied is free again: the next create reuses it.
        let reused = db.create(named_wave("d")).unwrap();
        assert_eq!(reused.id().index(), a.id().index());
        assert!(!a.is_valid());
    }

    #[test]
    fn rollback_restores_reused_slot_generation() {
        let db = create_db();
        let old = db.create(named_wave("old")).unwrap();
        db.remove::<Wave>(&old).unwrap();

        db.begin_transaction();
        let reborn = db.create(named_wave("reborn")).unwrap();
        assert_eq!(reborn.id().generation(), old.id().generation() + 1);
        db.rollback_transaction();

        assert!(!reborn.is_valid());
        // Creating again after rollback bumps from the restored generation.
        let again = db.create(named_wave("again")).unwrap();
        assert_eq!(again.id().generation(), old.id().generation() + 1);
    }

    #[test]
    fn undo_redo_symmetry() {
        let db = create_db();

        let handles: Vec<_> = (0..3)
            .map(|i| {
                db.with_transaction(|db| db.create(named_wave(&format!("wave-{i}"))))
                    .unwrap()
            })
            .collect();

        let final_names: Vec<String> = handles
            .iter()
            .map(|h| db.get::<Wave>(h).unwrap().name.clone())
            .collect();

        db.undo().unwrap();
        db.undo().unwrap();
        db.undo().unwrap();
        assert_eq!(db.object_count(), 0);
        assert!(!db.can_undo());

        db.redo().unwrap();
        db.redo().unwrap();
        db.redo().unwrap();
        assert_eq!(db.object_count(), 3);

        let replayed: Vec<String> = handles
            .iter()
            .map(|h| db.get::<Wave>(h).unwrap().name.clone())
            .collect();
        assert_eq!(replayed, final_names);
    }

    #[test]
    fn undo_returns_touched_handles() {
        let db = create_db();

        let a = db.create(named_wave("a")).unwrap();
        let b = db
            .with_transaction(|db| {
                let b = db.create(named_wave("b"))?;
                db.modify(&a, named_wave("a2"))?;
                Ok(b)
            })
            .unwrap();

        let touched = db.undo().unwrap();
        let ids: BTreeSet<_> = touched.iter().map(ObjectHandle::id).collect();
        assert_eq!(ids, BTreeSet::from([a.id(), b.id()]));

        let touched = db.redo().unwrap();
        let ids: BTreeSet<_> = touched.iter().map(ObjectHandle::id).collect();
        assert_eq!(ids, BTreeSet::from([a.id(), b.id()]));
    }

    #[test]
    fn undo_fails_during_open_transaction() {
        let db = create_db();
        db.with_transaction(|db| db.create(named_wave("a"))).unwrap();

        db.begin_transaction();
        assert!(db.undo().is_err());
        assert!(!db.can_undo());
        db.rollback_transaction();
        assert!(db.can_undo());
    }

    #[test]
    fn undo_on_empty_stack_fails() {
        let db = create_db();
        assert!(db.undo().is_err());
        assert!(db.redo().is_err());
    }

    #[test]
    fn commit_clears_redo() {
        let db = create_db();
        db.with_transaction(|db| db.create(named_wave("a"))).unwrap();
        db.undo().unwrap();
        assert!(db.can_redo());

        db.with_transaction(|db| db.create(named_wave("b"))).unwrap();
        assert!(!db.can_redo());
    }

    #[test]
    fn undo_capacity_evicts_oldest() {
        let db = create_db();
        db.set_undo_capacity(2);

        for i in 0..5 {
            db.with_transaction(|db| db.create(named_wave(&format!("w{i}"))))
                .unwrap();
        }
        assert_eq!(db.undo_depth(), 2);

        // Shrinking evicts immediately.
        db.set_undo_capacity(1);
        assert_eq!(db.undo_depth(), 1);
    }

    #[test]
    fn modified_counter_returns_to_zero_after_undo() {
        let db = create_db();
        assert!(!db.is_modified());

        db.with_transaction(|db| db.create(named_wave("a"))).unwrap();
        assert!(db.is_modified());

        db.undo().unwrap();
        assert!(!db.is_modified());

        db.redo().unwrap();
        assert!(db.is_modified());
    }

    #[test]
    fn guard_rolls_back_on_drop() {
        let db = create_db();
        let handle = {
            let _guard = db.transaction();
            db.create(named_wave("a")).unwrap()
            // guard dropped without commit
        };
        assert!(!handle.is_valid());
        assert!(!db.in_transaction());
        assert_eq!(db.undo_depth(), 0);
    }

    #[test]
    fn guard_commit_keeps_changes() {
        let db = create_db();
        let guard = db.transaction();
        let handle = db.create(named_wave("a")).unwrap();
        guard.commit();

        assert!(handle.is_valid());
        assert_eq!(db.undo_depth(), 1);
    }

    #[test]
    fn nested_guard_does_not_steal_the_transaction() {
        let db = create_db();
        let outer = db.transaction();
        let a = db.create(named_wave("a")).unwrap();
        {
            let inner = db.transaction();
            db.create(named_wave("b")).unwrap();
            inner.commit();
        }
        // Inner guard neither committed nor rolled back the outer txn.
        assert!(db.in_transaction());
        outer.commit();

        assert_eq!(db.undo_depth(), 1);
        assert!(a.is_valid());
        assert_eq!(db.object_count(), 2);
    }

    #[test]
    fn with_transaction_rolls_back_on_error() {
        let db = create_db();
        let scene = db.create(Scene::default()).unwrap();

        let result: DbResult<()> = db.with_transaction(|db| {
            db.modify(
                &scene,
                Scene {
                    name: "changed".to_string(),
                    ..Default::default()
                },
            )?;
            Err(DbError::failure("domain logic refused"))
        });

        assert!(result.is_err());
        assert_eq!(db.get::<Scene>(&scene).unwrap().name, "");
        assert!(!db.in_transaction());
    }

    #[test]
    fn interleaved_scene_and_model_edit_undoes_as_one_action() {
        let db = create_db();
        let scene = db.create(Scene::default()).unwrap();
        let model = db
            .create(Model {
                name: "m".to_string(),
                location: [1.0, 2.0, 3.0],
                ..Default::default()
            })
            .unwrap();

        // One transaction links the model into the scene.
        db.with_transaction(|db| {
            let mut record = Scene::clone(&db.get::<Scene>(&scene).unwrap());
            record.models.push(crate::id::OwnedId::new(model.id()));
            db.modify(&scene, record)
        })
        .unwrap();

        db.undo().unwrap();
        assert!(db.get::<Scene>(&scene).unwrap().models.is_empty());
        assert!(model.is_valid(), "only the link was undone, not the create");

        db.redo().unwrap();
        assert_eq!(
            db.get::<Scene>(&scene).unwrap().models,
            vec![crate::id::OwnedId::new(model.id())]
        );
    }
}
