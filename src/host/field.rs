use std::fmt;
use std::rc::Rc;

use super::object::ObjectRef;
use super::value::Value;
use crate::error::HostResult;

/// Computes a field's value for a receiver.
pub type Getter = Rc<dyn Fn(&ObjectRef) -> HostResult<Value>>;

/// Stores a value on behalf of a receiver.
pub type Setter = Rc<dyn Fn(&ObjectRef, Value) -> HostResult<()>>;

/// Storage strategy and metadata of one own field.
#[derive(Clone)]
pub enum FieldDescriptor {
    /// Plain value slot.
    Data {
        value: Value,
        writable: bool,
        configurable: bool,
    },
    /// Computed field backed by a getter and/or setter.
    Accessor {
        get: Option<Getter>,
        set: Option<Setter>,
        configurable: bool,
    },
}

impl FieldDescriptor {
    /// Writable, configurable data slot; what a plain assignment creates.
    pub fn data(value: impl Into<Value>) -> Self {
        Self::Data {
            value: value.into(),
            writable: true,
            configurable: true,
        }
    }

    /// Non-writable but still configurable data slot.
    pub fn read_only(value: impl Into<Value>) -> Self {
        Self::Data {
            value: value.into(),
            writable: false,
            configurable: true,
        }
    }

    /// Data slot the host has already locked down. Cannot be hooked.
    pub fn frozen(value: impl Into<Value>) -> Self {
        Self::Data {
            value: value.into(),
            writable: false,
            configurable: false,
        }
    }

    pub fn accessor(get: Option<Getter>, set: Option<Setter>) -> Self {
        Self::Accessor {
            get,
            set,
            configurable: true,
        }
    }

    pub fn is_configurable(&self) -> bool {
        match self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => *configurable,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data { .. })
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor { .. })
    }

    /// Accessors report `false`; writability is a data-slot notion.
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Data { writable: true, .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Data { value, .. } => Some(value),
            Self::Accessor { .. } => None,
        }
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data {
                value,
                writable,
                configurable,
            } => f
                .debug_struct("Data")
                .field("value", value)
                .field("writable", writable)
                .field("configurable", configurable)
                .finish(),
            Self::Accessor {
                get,
                set,
                configurable,
            } => f
                .debug_struct("Accessor")
                .field("get", &get.is_some())
                .field("set", &set.is_some())
                .field("configurable", configurable)
                .finish(),
        }
    }
}

/// Hook attached directly to an object that sees every assignment made
/// through it and every value read out of it.
///
/// `before_set` runs before the assignment commits; an error aborts the write.
pub trait FieldInterceptor {
    fn before_set(
        &self,
        target: &ObjectRef,
        field: &str,
        value: &Value,
        previous: Option<&Value>,
    ) -> HostResult<()>;

    fn after_get(&self, target: &ObjectRef, field: &str, value: Value) -> Value;
}

/// A named field of a particular object, read and written through the
/// object's normal property semantics.
#[derive(Clone, Debug)]
pub struct FieldRef {
    owner: ObjectRef,
    name: String,
}

impl FieldRef {
    pub fn new(owner: &ObjectRef, name: impl Into<String>) -> Self {
        Self {
            owner: owner.clone(),
            name: name.into(),
        }
    }

    pub fn owner(&self) -> &ObjectRef {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read(&self) -> HostResult<Value> {
        self.owner.get(&self.name)
    }

    pub fn write(&self, value: impl Into<Value>) -> HostResult<()> {
        self.owner.set(&self.name, value.into())
    }
}
