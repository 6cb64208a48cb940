//! Graph walk and field redefinition.
//!
//! # Invariants
//!
//! 1. An object is visited at most once per engine lifetime. The visited set is
//!    keyed by identity, never by value equality.
//! 2. A field the host already made non-configurable is left untouched.
//! 3. Every hooked field ends non-configurable, so the host can neither remove
//!    nor re-instrument the hook.
//! 4. Nested object values are enqueued before the field is hooked; the
//!    visited check, not the worklist, terminates cycles.
//!
//! # Failure Modes
//!
//! - **Guarded object**: field listing fails. The object is skipped, the walk
//!   continues.
//! - **Opaque field**: metadata read or redefinition fails. That field is
//!   skipped, the rest of the object is still hooked.
//! - **Unlabellable object**: `toString` throws. The placeholder label is used.
//!
//! The only error surfaced later to calling code is `ReadOnlyViolation`, from
//! writes to fields that were non-writable when hooked.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::recorder::{AssignmentRecorder, ObservedWrite};
use super::shadow::ShadowStore;
use super::wrapper::NestedValueWrapper;
use crate::error::{HostError, HostResult};
use crate::host::{CallTrace, FieldDescriptor, Getter, ObjectId, ObjectRef, Reflect, Setter, Value};

/// Label used when an object cannot describe itself.
pub const UNLABELLED: &str = "<unlabelled object>";

/// Best-effort diagnostic label. Never fails.
pub fn diagnostic_label(object: &ObjectRef) -> String {
    object.label().unwrap_or_else(|err| {
        debug!(object = %object, error = %err, "falling back to placeholder label");
        UNLABELLED.to_string()
    })
}

/// Identity-keyed record of objects the engine has walked.
#[derive(Debug, Default)]
pub struct VisitedSet {
    ids: RefCell<HashSet<ObjectId>>,
}

impl VisitedSet {
    /// Returns `false` if the object was already present.
    pub fn insert(&self, object: &ObjectRef) -> bool {
        self.ids.borrow_mut().insert(object.id())
    }

    pub fn contains(&self, object: &ObjectRef) -> bool {
        self.ids.borrow().contains(&object.id())
    }

    pub fn len(&self) -> usize {
        self.ids.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.borrow().is_empty()
    }
}

/// Outcome of one `instrument` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkReport {
    pub objects_visited: usize,
    /// Objects reached again (cycles, shared values, earlier walks).
    pub already_visited: usize,
    pub fields_hooked: usize,
    pub fields_skipped: usize,
    /// Contained introspection/commit failures.
    pub failures: usize,
}

impl WalkReport {
    fn absorb(&mut self, outcome: FieldOutcome) {
        match outcome {
            FieldOutcome::Hooked => self.fields_hooked += 1,
            FieldOutcome::Skipped => self.fields_skipped += 1,
        }
    }
}

enum FieldOutcome {
    Hooked,
    Skipped,
}

/// Walks the object graph from a set of roots and reroutes every
/// configurable own field through the shadow store and the recorder.
pub struct InterceptionEngine {
    shadow: Rc<ShadowStore>,
    recorder: Rc<AssignmentRecorder>,
    wrapper: Rc<NestedValueWrapper>,
    visited: Rc<VisitedSet>,
    field_deny_list: HashSet<String>,
    wrap_late_values: bool,
}

impl InterceptionEngine {
    pub fn new(
        shadow: Rc<ShadowStore>,
        recorder: Rc<AssignmentRecorder>,
        field_deny_list: impl IntoIterator<Item = String>,
    ) -> Self {
        let field_deny_list: HashSet<String> = field_deny_list.into_iter().collect();
        let visited = Rc::new(VisitedSet::default());
        let wrapper = NestedValueWrapper::new(
            Rc::clone(&recorder),
            Rc::clone(&visited),
            field_deny_list.clone(),
        );
        Self {
            shadow,
            recorder,
            wrapper,
            visited,
            field_deny_list,
            wrap_late_values: true,
        }
    }

    #[must_use]
    pub fn with_late_wrapping(mut self, enabled: bool) -> Self {
        self.wrap_late_values = enabled;
        self
    }

    pub fn shadow(&self) -> &Rc<ShadowStore> {
        &self.shadow
    }

    pub fn wrapper(&self) -> &Rc<NestedValueWrapper> {
        &self.wrapper
    }

    pub fn is_visited(&self, object: &ObjectRef) -> bool {
        self.visited.contains(object)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Breadth-first walk from `roots`. Objects seen by an earlier call are
    /// skipped, so repeated calls never double-hook a field.
    pub fn instrument<I>(&self, roots: I) -> WalkReport
    where
        I: IntoIterator<Item = ObjectRef>,
    {
        let mut worklist: VecDeque<ObjectRef> = roots.into_iter().collect();
        let mut report = WalkReport::default();

        while let Some(object) = worklist.pop_front() {
            if !self.visited.insert(&object) {
                report.already_visited += 1;
                continue;
            }
            report.objects_visited += 1;
            // Walked objects are hooked per field; a shim would double-record.
            self.wrapper.release(&object);
            self.observe_object(&object, &mut worklist, &mut report);
        }

        info!(
            objects = report.objects_visited,
            hooked = report.fields_hooked,
            skipped = report.fields_skipped,
            failures = report.failures,
            "instrumentation walk complete"
        );
        report
    }

    fn observe_object(
        &self,
        object: &ObjectRef,
        worklist: &mut VecDeque<ObjectRef>,
        report: &mut WalkReport,
    ) {
        let names = match object.own_field_names() {
            Ok(names) => names,
            Err(err) => {
                warn!(object = %object, error = %err, "cannot enumerate fields, skipping object");
                report.failures += 1;
                return;
            }
        };
        let label = diagnostic_label(object);

        for name in names.iter().filter(|name| !name.is_empty()) {
            match self.observe_field(object, &label, name, worklist) {
                Ok(outcome) => report.absorb(outcome),
                Err(err) => {
                    warn!(object = %label, field = %name, error = %err, "field left unobserved");
                    report.failures += 1;
                }
            }
        }
    }

    fn observe_field(
        &self,
        object: &ObjectRef,
        label: &str,
        name: &str,
        worklist: &mut VecDeque<ObjectRef>,
    ) -> HostResult<FieldOutcome> {
        let Some(descriptor) = object.own_field(name)? else {
            // Removed by a side effect earlier in this walk.
            return Ok(FieldOutcome::Skipped);
        };

        if let Some(Value::Object(nested)) = descriptor.value() {
            worklist.push_back(nested.clone());
        }

        if !descriptor.is_configurable() || self.field_deny_list.contains(name) {
            return Ok(FieldOutcome::Skipped);
        }

        match descriptor {
            FieldDescriptor::Data {
                value, writable, ..
            } => {
                let hooked = FieldDescriptor::Accessor {
                    get: Some(self.shadow_getter(object, name)),
                    set: Some(if writable {
                        self.shadow_setter(object, label, name)
                    } else {
                        read_only_setter(label, name)
                    }),
                    configurable: false,
                };
                object.define_field(name, hooked)?;
                // Committed only once the hook is in place.
                self.shadow.set(object, name, value);
            }
            FieldDescriptor::Accessor { get, set, .. } => {
                let hooked = FieldDescriptor::Accessor {
                    get,
                    set: set.map(|native| self.wrap_native_setter(object, label, name, native)),
                    configurable: false,
                };
                object.define_field(name, hooked)?;
            }
        }

        debug!("define property object: {}, property: {}", label, name);
        Ok(FieldOutcome::Hooked)
    }

    /// Reads always resolve against the owner's shadow entry, whichever
    /// object the read went through.
    fn shadow_getter(&self, owner: &ObjectRef, name: &str) -> Getter {
        let shadow = Rc::clone(&self.shadow);
        let owner = owner.downgrade();
        let field = name.to_string();
        Rc::new(move |_receiver: &ObjectRef| {
            Ok(owner
                .upgrade()
                .map(|owner| shadow.get(&owner, &field))
                .unwrap_or_default())
        })
    }

    fn shadow_setter(&self, owner: &ObjectRef, label: &str, name: &str) -> Setter {
        let shadow = Rc::clone(&self.shadow);
        let recorder = Rc::clone(&self.recorder);
        let wrapper = self.wrap_late_values.then(|| Rc::clone(&self.wrapper));
        let owner = owner.downgrade();
        let label = label.to_string();
        let field = name.to_string();
        Rc::new(move |_receiver: &ObjectRef, value: Value| {
            let Some(owner) = owner.upgrade() else {
                return Ok(());
            };
            let previous = shadow.get(&owner, &field);
            recorder.record(ObservedWrite {
                target: &owner,
                target_label: &label,
                field: &field,
                new_value: &value,
                old_value: Some(previous),
                context: CallTrace::capture(),
            });
            shadow.set(&owner, &field, value.clone());
            // Labelling runs host code, which may write; those writes follow this one.
            if let Some(wrapper) = &wrapper {
                wrapper.adopt(&value);
            }
            Ok(())
        })
    }

    /// Records the write, then hands it to the native setter with the same
    /// receiver and value. The native result is returned unchanged.
    fn wrap_native_setter(&self, owner: &ObjectRef, label: &str, name: &str, native: Setter) -> Setter {
        let recorder = Rc::clone(&self.recorder);
        let owner = owner.downgrade();
        let label = label.to_string();
        let field = name.to_string();
        Rc::new(move |receiver: &ObjectRef, value: Value| {
            if let Some(owner) = owner.upgrade() {
                recorder.record(ObservedWrite {
                    target: &owner,
                    target_label: &label,
                    field: &field,
                    new_value: &value,
                    old_value: None,
                    context: CallTrace::capture(),
                });
            }
            native(receiver, value)
        })
    }
}

fn read_only_setter(label: &str, name: &str) -> Setter {
    let label = label.to_string();
    let field = name.to_string();
    Rc::new(move |_receiver: &ObjectRef, _value: Value| {
        Err(HostError::ReadOnlyViolation {
            target: label.clone(),
            field: field.clone(),
        })
    })
}
