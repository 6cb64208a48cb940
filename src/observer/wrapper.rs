use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use tracing::debug;

use super::engine::{diagnostic_label, VisitedSet};
use super::recorder::{AssignmentRecorder, ObservedWrite};
use crate::error::HostResult;
use crate::host::{CallTrace, FieldInterceptor, ObjectId, ObjectRef, Value, WeakObjectRef};

/// Keeps objects that arrive after the initial walk observable.
///
/// Instead of handing out a proxy, the wrapper attaches a [`FieldInterceptor`]
/// to the object itself, so identity is preserved: the value stored is the
/// value the host assigned. Objects reachable from a wrapped object are
/// wrapped lazily, when they are read out of it.
///
/// Objects already hooked by the graph walk are never wrapped.
pub struct NestedValueWrapper {
    recorder: Rc<AssignmentRecorder>,
    visited: Rc<VisitedSet>,
    field_deny_list: HashSet<String>,
    shimmed: RefCell<HashMap<ObjectId, WeakObjectRef>>,
}

impl NestedValueWrapper {
    pub fn new(
        recorder: Rc<AssignmentRecorder>,
        visited: Rc<VisitedSet>,
        field_deny_list: HashSet<String>,
    ) -> Rc<Self> {
        Rc::new(Self {
            recorder,
            visited,
            field_deny_list,
            shimmed: RefCell::new(HashMap::new()),
        })
    }

    /// Wrap `value` if it is an object neither walked nor wrapped yet.
    /// Returns whether a new shim was attached.
    pub fn adopt(self: &Rc<Self>, value: &Value) -> bool {
        match value {
            Value::Object(object) => self.wrap(object),
            _ => false,
        }
    }

    pub fn wrap(self: &Rc<Self>, object: &ObjectRef) -> bool {
        if self.visited.contains(object) || self.is_wrapped(object) {
            return false;
        }
        // Another observer's shim is left alone.
        if object.has_interceptor() {
            return false;
        }

        let label = diagnostic_label(object);
        debug!(object = %label, "wrapping late value");
        object.attach_interceptor(Rc::new(ValueShim {
            wrapper: Rc::downgrade(self),
            label,
        }));

        let mut shimmed = self.shimmed.borrow_mut();
        shimmed.retain(|_, owner| owner.is_alive());
        shimmed.insert(object.id(), object.downgrade());
        true
    }

    /// Detach this wrapper's shim from `object`. Returns whether one was
    /// attached.
    pub fn release(&self, object: &ObjectRef) -> bool {
        if self.shimmed.borrow_mut().remove(&object.id()).is_none() {
            return false;
        }
        object.detach_interceptor()
    }

    pub fn is_wrapped(&self, object: &ObjectRef) -> bool {
        self.shimmed.borrow().contains_key(&object.id())
    }

    /// Live wrapped objects.
    pub fn wrapped_count(&self) -> usize {
        self.shimmed
            .borrow()
            .values()
            .filter(|owner| owner.is_alive())
            .count()
    }
}

struct ValueShim {
    wrapper: Weak<NestedValueWrapper>,
    label: String,
}

impl FieldInterceptor for ValueShim {
    fn before_set(
        &self,
        target: &ObjectRef,
        field: &str,
        value: &Value,
        previous: Option<&Value>,
    ) -> HostResult<()> {
        let Some(wrapper) = self.wrapper.upgrade() else {
            return Ok(());
        };
        if field.is_empty() || wrapper.field_deny_list.contains(field) {
            return Ok(());
        }
        wrapper.recorder.record(ObservedWrite {
            target,
            target_label: &self.label,
            field,
            new_value: value,
            old_value: previous.cloned(),
            context: CallTrace::capture(),
        });
        wrapper.adopt(value);
        Ok(())
    }

    fn after_get(&self, _target: &ObjectRef, _field: &str, value: Value) -> Value {
        if let Some(wrapper) = self.wrapper.upgrade() {
            wrapper.adopt(&value);
        }
        value
    }
}
