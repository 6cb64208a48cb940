use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::field::{FieldDescriptor, FieldInterceptor, FieldRef, Setter};
use super::value::Value;
use crate::error::{HostError, HostResult};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique object identity. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Native body of a callable object: `(this, args) -> result`.
pub type NativeFn = Rc<dyn Fn(&ObjectRef, &[Value]) -> HostResult<Value>>;

enum ObjectKind {
    Plain,
    Function { name: String, body: NativeFn },
}

/// Defensive behaviour of host objects that refuse generic reflection.
#[derive(Debug, Clone, Default)]
pub struct Guards {
    /// Listing fields or reading any field metadata fails.
    pub deny_introspection: bool,
    /// Reading metadata of these particular fields fails.
    pub opaque_fields: Vec<String>,
}

/// Reflective access to an object's own fields.
pub trait Reflect {
    /// Own field names in definition order. Inherited fields are excluded.
    fn own_field_names(&self) -> HostResult<Vec<String>>;

    fn own_field(&self, name: &str) -> HostResult<Option<FieldDescriptor>>;

    /// Replace or create an own field. Rejected when the existing field is
    /// non-configurable.
    fn define_field(&self, name: &str, descriptor: FieldDescriptor) -> HostResult<()>;

    /// Human-readable identity, produced by the object's own `toString`
    /// when it has a callable one.
    fn label(&self) -> HostResult<String>;
}

struct ObjectInner {
    id: ObjectId,
    kind: ObjectKind,
    prototype: RefCell<Option<ObjectRef>>,
    fields: RefCell<IndexMap<String, FieldDescriptor>>,
    extensible: Cell<bool>,
    guards: RefCell<Guards>,
    interceptor: RefCell<Option<Rc<dyn FieldInterceptor>>>,
}

/// Shared handle to a host object or function.
#[derive(Clone)]
pub struct ObjectRef {
    inner: Rc<ObjectInner>,
}

/// Non-owning handle; used by every side table keyed on object identity.
#[derive(Clone)]
pub struct WeakObjectRef {
    id: ObjectId,
    inner: Weak<ObjectInner>,
}

enum SetPlan {
    Own { previous: Value },
    Call(Setter),
    Create,
}

impl ObjectRef {
    pub fn new() -> Self {
        Self::from_kind(ObjectKind::Plain)
    }

    pub fn with_prototype(prototype: &ObjectRef) -> Self {
        let object = Self::new();
        *object.inner.prototype.borrow_mut() = Some(prototype.clone());
        object
    }

    /// Callable object. Its body runs natively and is never instrumented.
    pub fn function(
        name: impl Into<String>,
        body: impl Fn(&ObjectRef, &[Value]) -> HostResult<Value> + 'static,
    ) -> Self {
        Self::from_kind(ObjectKind::Function {
            name: name.into(),
            body: Rc::new(body),
        })
    }

    fn from_kind(kind: ObjectKind) -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                id: ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)),
                kind,
                prototype: RefCell::new(None),
                fields: RefCell::new(IndexMap::new()),
                extensible: Cell::new(true),
                guards: RefCell::new(Guards::default()),
                interceptor: RefCell::new(None),
            }),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.inner.kind, ObjectKind::Function { .. })
    }

    pub fn function_name(&self) -> Option<&str> {
        match &self.inner.kind {
            ObjectKind::Function { name, .. } => Some(name),
            ObjectKind::Plain => None,
        }
    }

    pub fn call(&self, this: &ObjectRef, args: &[Value]) -> HostResult<Value> {
        match &self.inner.kind {
            ObjectKind::Function { body, .. } => {
                let body = Rc::clone(body);
                body(this, args)
            }
            ObjectKind::Plain => Err(HostError::NotCallable),
        }
    }

    pub fn prototype(&self) -> Option<ObjectRef> {
        self.inner.prototype.borrow().clone()
    }

    /// Re-link the prototype. Rejects links that would make the chain cyclic.
    pub fn set_prototype(&self, prototype: Option<&ObjectRef>) -> HostResult<()> {
        let mut ancestor = prototype.cloned();
        while let Some(object) = ancestor {
            if object.ptr_eq(self) {
                return Err(HostError::PrototypeCycle);
            }
            ancestor = object.prototype();
        }
        *self.inner.prototype.borrow_mut() = prototype.cloned();
        Ok(())
    }

    pub fn is_extensible(&self) -> bool {
        self.inner.extensible.get()
    }

    pub fn prevent_extensions(&self) {
        self.inner.extensible.set(false);
    }

    pub fn set_guards(&self, guards: Guards) {
        *self.inner.guards.borrow_mut() = guards;
    }

    pub fn field(&self, name: impl Into<String>) -> FieldRef {
        FieldRef::new(self, name)
    }

    pub fn has_own_field(&self, name: &str) -> bool {
        self.inner.fields.borrow().contains_key(name)
    }

    pub fn field_count(&self) -> usize {
        self.inner.fields.borrow().len()
    }

    /// Define a plain writable, configurable data field.
    pub fn define_value(&self, name: &str, value: impl Into<Value>) -> HostResult<()> {
        self.define_field(name, FieldDescriptor::data(value))
    }

    /// Property read: own field first, then the prototype chain. Accessor
    /// getters run with `self` as receiver.
    pub fn get(&self, name: &str) -> HostResult<Value> {
        let value = self.lookup(name)?;
        let interceptor = self.inner.interceptor.borrow().clone();
        Ok(match interceptor {
            Some(interceptor) => interceptor.after_get(self, name, value),
            None => value,
        })
    }

    /// Property write.
    ///
    /// Own writable data slots are updated in place; own or inherited setters
    /// run with `self` as receiver; non-writable data slots fail with
    /// `ReadOnlyViolation`; anything else creates a new own data field.
    pub fn set(&self, name: &str, value: Value) -> HostResult<()> {
        let plan = self.plan_set(name)?;

        let interceptor = self.inner.interceptor.borrow().clone();
        if let Some(interceptor) = interceptor {
            let previous = match &plan {
                SetPlan::Own { previous } => Some(previous),
                _ => None,
            };
            interceptor.before_set(self, name, &value, previous)?;
        }

        match plan {
            SetPlan::Own { .. } => {
                let mut fields = self.inner.fields.borrow_mut();
                match fields.get_mut(name) {
                    Some(FieldDescriptor::Data { value: slot, .. }) => *slot = value,
                    _ => {
                        fields.insert(name.to_string(), FieldDescriptor::data(value));
                    }
                }
                Ok(())
            }
            SetPlan::Call(setter) => setter(self, value),
            SetPlan::Create => {
                self.inner
                    .fields
                    .borrow_mut()
                    .insert(name.to_string(), FieldDescriptor::data(value));
                Ok(())
            }
        }
    }

    fn lookup(&self, name: &str) -> HostResult<Value> {
        let mut current = Some(self.clone());
        while let Some(object) = current {
            let descriptor = object.inner.fields.borrow().get(name).cloned();
            match descriptor {
                Some(FieldDescriptor::Data { value, .. }) => return Ok(value),
                Some(FieldDescriptor::Accessor { get: Some(getter), .. }) => return getter(self),
                Some(FieldDescriptor::Accessor { get: None, .. }) => return Ok(Value::Undefined),
                None => current = object.prototype(),
            }
        }
        Ok(Value::Undefined)
    }

    fn plan_set(&self, name: &str) -> HostResult<SetPlan> {
        let mut current = Some(self.clone());
        while let Some(object) = current {
            let descriptor = object.inner.fields.borrow().get(name).cloned();
            let is_own = object.ptr_eq(self);
            match descriptor {
                Some(FieldDescriptor::Data { writable: true, value, .. }) => {
                    return Ok(if is_own {
                        SetPlan::Own { previous: value }
                    } else {
                        self.plan_create(name)?
                    });
                }
                Some(FieldDescriptor::Data { writable: false, .. }) => {
                    return Err(HostError::ReadOnlyViolation {
                        target: object.to_string(),
                        field: name.to_string(),
                    });
                }
                Some(FieldDescriptor::Accessor { set: Some(setter), .. }) => {
                    return Ok(SetPlan::Call(setter));
                }
                Some(FieldDescriptor::Accessor { set: None, .. }) => {
                    return Err(HostError::MissingSetter {
                        field: name.to_string(),
                    });
                }
                None => current = object.prototype(),
            }
        }
        self.plan_create(name)
    }

    fn plan_create(&self, name: &str) -> HostResult<SetPlan> {
        if self.is_extensible() {
            Ok(SetPlan::Create)
        } else {
            Err(HostError::NotExtensible {
                field: name.to_string(),
            })
        }
    }

    pub fn attach_interceptor(&self, interceptor: Rc<dyn FieldInterceptor>) {
        *self.inner.interceptor.borrow_mut() = Some(interceptor);
    }

    /// Returns whether an interceptor was attached.
    pub fn detach_interceptor(&self) -> bool {
        self.inner.interceptor.borrow_mut().take().is_some()
    }

    pub fn has_interceptor(&self) -> bool {
        self.inner.interceptor.borrow().is_some()
    }

    fn check_introspection(&self) -> HostResult<()> {
        if self.inner.guards.borrow().deny_introspection {
            return Err(HostError::IntrospectionFailure {
                reason: format!("{self} refuses reflection"),
            });
        }
        Ok(())
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

impl Reflect for ObjectRef {
    fn own_field_names(&self) -> HostResult<Vec<String>> {
        self.check_introspection()?;
        Ok(self.inner.fields.borrow().keys().cloned().collect())
    }

    fn own_field(&self, name: &str) -> HostResult<Option<FieldDescriptor>> {
        self.check_introspection()?;
        if self.inner.guards.borrow().opaque_fields.iter().any(|f| f == name) {
            return Err(HostError::IntrospectionFailure {
                reason: format!("field `{name}` of {self} refuses reflection"),
            });
        }
        Ok(self.inner.fields.borrow().get(name).cloned())
    }

    fn define_field(&self, name: &str, descriptor: FieldDescriptor) -> HostResult<()> {
        let mut fields = self.inner.fields.borrow_mut();
        let existing = fields.get(name).map(FieldDescriptor::is_configurable);
        match existing {
            Some(false) => Err(HostError::DefineRejected {
                field: name.to_string(),
            }),
            None if !self.is_extensible() => Err(HostError::NotExtensible {
                field: name.to_string(),
            }),
            _ => {
                fields.insert(name.to_string(), descriptor);
                Ok(())
            }
        }
    }

    fn label(&self) -> HostResult<String> {
        let failure = |err: HostError| HostError::StringificationFailure {
            reason: err.to_string(),
        };
        match self.get("toString").map_err(failure)? {
            Value::Object(to_string) if to_string.is_callable() => {
                match to_string.call(self, &[]).map_err(failure)? {
                    Value::Str(label) => Ok(label),
                    other => Ok(other.to_string()),
                }
            }
            _ => Ok(self.to_string()),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            ObjectKind::Plain => write!(f, "[{}]", self.inner.id),
            ObjectKind::Function { name, .. } => write!(f, "[function {name} {}]", self.inner.id),
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({})", self.inner.id)
    }
}

impl WeakObjectRef {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.inner.upgrade().map(|inner| ObjectRef { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for WeakObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakObjectRef({}, alive: {})", self.id, self.is_alive())
    }
}
