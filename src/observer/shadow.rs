use std::cell::RefCell;
use std::collections::HashMap;

use crate::host::{ObjectId, ObjectRef, Value, WeakObjectRef};

struct ShadowEntry {
    owner: WeakObjectRef,
    fields: HashMap<String, Value>,
}

/// Logical values of instrumented fields, keyed by owner identity.
///
/// Once a data field is instrumented this is the only place its value lives;
/// the field's getter reads from here and its setter writes here.
///
/// Invariant: owners are held weakly. Entries of dropped owners are pruned on
/// the next insertion of a new owner or by [`ShadowStore::prune`].
#[derive(Default)]
pub struct ShadowStore {
    entries: RefCell<HashMap<ObjectId, ShadowEntry>>,
}

impl ShadowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical value. Reading an owner never written creates its
    /// (empty) entry and yields `Undefined`.
    pub fn get(&self, owner: &ObjectRef, field: &str) -> Value {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(owner.id()).or_insert_with(|| ShadowEntry {
            owner: owner.downgrade(),
            fields: HashMap::new(),
        });
        entry.fields.get(field).cloned().unwrap_or_default()
    }

    pub fn set(&self, owner: &ObjectRef, field: &str, value: Value) {
        if !self.entries.borrow().contains_key(&owner.id()) {
            self.prune();
        }
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(owner.id()).or_insert_with(|| ShadowEntry {
            owner: owner.downgrade(),
            fields: HashMap::new(),
        });
        entry.fields.insert(field.to_string(), value);
    }

    pub fn contains(&self, owner: &ObjectRef, field: &str) -> bool {
        self.entries
            .borrow()
            .get(&owner.id())
            .is_some_and(|entry| entry.fields.contains_key(field))
    }

    /// Number of owners with an entry.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Drop entries whose owner no longer exists. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, entry| entry.owner.is_alive());
        before - entries.len()
    }
}
