//! Host environment model.
//!
//! A schema-less property bag ([`object`]) with reflective access to each
//! object's own fields, the call-origin stack writes are attributed to
//! ([`trace`]), and a live node tree with batched change notification
//! ([`tree`]). The observer instruments these; it never owns them.

pub mod field;
pub mod object;
pub mod trace;
pub mod tree;
pub mod value;

pub use field::{FieldDescriptor, FieldInterceptor, FieldRef, Getter, Setter};
pub use object::{Guards, NativeFn, ObjectId, ObjectRef, Reflect, WeakObjectRef};
pub use trace::{CallFrame, CallTrace};
pub use tree::{Document, MutationKind, MutationRecord, MutationWatcher, Node, NodeId, WeakNode};
pub use value::Value;
