use std::cell::{Cell, RefCell};
use std::fmt;

use serde::{Serialize, Serializer};
use tracing::{info, trace};

use super::time::Timestamp;
use crate::host::{CallTrace, ObjectId, ObjectRef, Value, WeakObjectRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Assignment,
}

/// One observed write to an instrumented field.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentEvent {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    pub kind: EventKind,
    pub target: ObjectId,
    #[serde(skip)]
    pub target_ref: WeakObjectRef,
    pub target_label: String,
    pub field: String,
    pub new_value: EventValue,
    /// Present when it was cheap to obtain (shadowed data fields).
    pub old_value: Option<EventValue>,
    pub timestamp: Timestamp,
    pub context: CallTrace,
}

impl AssignmentEvent {
    /// The written object, if it still exists.
    pub fn target(&self) -> Option<ObjectRef> {
        self.target_ref.upgrade()
    }
}

/// A value as it is kept in the log.
///
/// Objects are held by identity and a weak handle only, so logging an
/// assignment never extends the life of the assigned object.
#[derive(Debug, Clone)]
pub enum EventValue {
    /// Any non-object value.
    Primitive(Value),
    Object {
        id: ObjectId,
        display: String,
        handle: WeakObjectRef,
    },
}

impl EventValue {
    /// The logged value, or `None` once a logged object has been dropped.
    pub fn upgrade(&self) -> Option<Value> {
        match self {
            EventValue::Primitive(value) => Some(value.clone()),
            EventValue::Object { handle, .. } => handle.upgrade().map(Value::Object),
        }
    }

    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            EventValue::Object { id, .. } => Some(*id),
            EventValue::Primitive(_) => None,
        }
    }
}

impl From<&Value> for EventValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Object(object) => EventValue::Object {
                id: object.id(),
                display: object.to_string(),
                handle: object.downgrade(),
            },
            other => EventValue::Primitive(other.clone()),
        }
    }
}

impl From<Value> for EventValue {
    fn from(value: Value) -> Self {
        EventValue::from(&value)
    }
}

impl PartialEq for EventValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EventValue::Primitive(a), EventValue::Primitive(b)) => a == b,
            (EventValue::Object { id: a, .. }, EventValue::Object { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl PartialEq<Value> for EventValue {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (EventValue::Object { id, .. }, Value::Object(object)) => *id == object.id(),
            (EventValue::Primitive(value), other) => value == other,
            _ => false,
        }
    }
}

impl fmt::Display for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventValue::Primitive(value) => write!(f, "{value}"),
            EventValue::Object { display, .. } => f.write_str(display),
        }
    }
}

impl Serialize for EventValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EventValue::Primitive(value) => value.serialize(serializer),
            EventValue::Object { display, .. } => serializer.serialize_str(display),
        }
    }
}

/// A write as seen at its observation point, before it is logged.
#[derive(Debug, Clone)]
pub struct ObservedWrite<'a> {
    pub target: &'a ObjectRef,
    pub target_label: &'a str,
    pub field: &'a str,
    pub new_value: &'a Value,
    pub old_value: Option<Value>,
    pub context: CallTrace,
}

/// Classifies writes issued by known non-host origins.
///
/// Matching is exact-substring against each frame of the captured call
/// trace. Keep the list narrow: a false match silently drops a real write.
#[derive(Debug, Clone, Default)]
pub struct NoiseFilter {
    deny: Vec<String>,
}

impl NoiseFilter {
    pub fn new<I, S>(deny: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deny: deny
                .into_iter()
                .map(Into::into)
                .filter(|origin: &String| !origin.is_empty())
                .collect(),
        }
    }

    pub fn is_noise(&self, context: &CallTrace) -> bool {
        self.deny.iter().any(|origin| context.mentions(origin))
    }
}

/// Selects events by target identity and/or field name.
#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub target: Option<ObjectId>,
    pub field: Option<String>,
}

impl AssignmentFilter {
    pub fn target(target: &ObjectRef) -> Self {
        Self {
            target: Some(target.id()),
            field: None,
        }
    }

    pub fn field(field: impl Into<String>) -> Self {
        Self {
            target: None,
            field: Some(field.into()),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn matches(&self, event: &AssignmentEvent) -> bool {
        self.target.map_or(true, |target| target == event.target)
            && self.field.as_deref().map_or(true, |field| field == event.field)
    }
}

/// Append-only log of observed writes.
///
/// Invariant: events appear in the order their writes were observed. A write
/// nested inside another write's propagation is observed, and logged, after
/// the outer one. No borrow is held while control is outside the recorder,
/// so recursive recording is safe.
#[derive(Debug, Default)]
pub struct AssignmentRecorder {
    log: RefCell<Vec<AssignmentEvent>>,
    noise: NoiseFilter,
    suppressed: Cell<u64>,
    log_writes: bool,
}

impl AssignmentRecorder {
    pub fn new(noise: NoiseFilter) -> Self {
        Self {
            noise,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_write_logging(mut self, enabled: bool) -> Self {
        self.log_writes = enabled;
        self
    }

    /// Log a write unless it is noise. Returns whether it was logged.
    pub fn record(&self, write: ObservedWrite<'_>) -> bool {
        if self.noise.is_noise(&write.context) {
            self.suppressed.set(self.suppressed.get() + 1);
            trace!(field = write.field, origin = ?write.context.origin(), "suppressed noise write");
            return false;
        }

        if self.log_writes {
            info!("set object: {}, property: {}, value: {}", write.target_label, write.field, write.new_value);
        } else {
            trace!(target_label = write.target_label, field = write.field, value = %write.new_value, "assignment");
        }

        let mut log = self.log.borrow_mut();
        let sequence = log.len() as u64;
        log.push(AssignmentEvent {
            sequence,
            kind: EventKind::Assignment,
            target: write.target.id(),
            target_ref: write.target.downgrade(),
            target_label: write.target_label.to_string(),
            field: write.field.to_string(),
            new_value: EventValue::from(write.new_value),
            old_value: write.old_value.as_ref().map(EventValue::from),
            timestamp: Timestamp::now(),
            context: write.context,
        });
        true
    }

    /// Snapshot of the log, optionally filtered. Does not mutate state.
    pub fn assignments(&self, filter: Option<&AssignmentFilter>) -> Vec<AssignmentEvent> {
        let log = self.log.borrow();
        match filter {
            Some(filter) => log.iter().filter(|event| filter.matches(event)).cloned().collect(),
            None => log.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    /// Writes dropped as noise so far.
    pub fn suppressed(&self) -> u64 {
        self.suppressed.get()
    }
}
