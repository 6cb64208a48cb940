//! Live node tree with deferred, batched change notification.
//!
//! Every structural operation queues a [`MutationRecord`] on the owning
//! [`Document`]. Records are handed to watchers only when the host reaches a
//! notification checkpoint ([`Document::deliver`]), so several changes arrive
//! coalesced into one batch, in the order they were made.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::TreeError;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
    },
    Text {
        data: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

/// One structural change, as queued by the tree.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: Node,
    pub added_nodes: Vec<Node>,
    pub removed_nodes: Vec<Node>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

/// Receives batches of mutation records at each notification checkpoint.
pub trait MutationWatcher {
    fn on_mutations(&self, batch: &[MutationRecord]);
}

struct NodeInner {
    id: NodeId,
    kind: RefCell<NodeKind>,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    document: Weak<DocumentInner>,
}

#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

#[derive(Clone)]
pub struct WeakNode {
    id: NodeId,
    inner: Weak<NodeInner>,
}

struct DocumentInner {
    root: Node,
    pending: RefCell<Vec<MutationRecord>>,
    watchers: RefCell<Vec<Weak<dyn MutationWatcher>>>,
}

/// Owner of a node tree and its change-notification queue.
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

impl Document {
    pub fn new() -> Self {
        let inner = Rc::new_cyclic(|document| DocumentInner {
            root: Node::create(
                document.clone(),
                NodeKind::Element {
                    tag: "html".to_string(),
                    attributes: IndexMap::new(),
                },
            ),
            pending: RefCell::new(Vec::new()),
            watchers: RefCell::new(Vec::new()),
        });
        Self { inner }
    }

    pub fn root(&self) -> Node {
        self.inner.root.clone()
    }

    pub fn create_element(&self, tag: &str) -> Node {
        Node::create(
            Rc::downgrade(&self.inner),
            NodeKind::Element {
                tag: tag.to_string(),
                attributes: IndexMap::new(),
            },
        )
    }

    pub fn create_text(&self, data: &str) -> Node {
        Node::create(
            Rc::downgrade(&self.inner),
            NodeKind::Text {
                data: data.to_string(),
            },
        )
    }

    /// Register a watcher. The document keeps only a weak reference.
    pub fn watch(&self, watcher: &Rc<dyn MutationWatcher>) {
        self.inner.watchers.borrow_mut().push(Rc::downgrade(watcher));
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Notification checkpoint: hand every queued record to every live
    /// watcher as one batch. Returns the batch size.
    ///
    /// Changes a watcher makes while handling the batch are queued for the
    /// next checkpoint.
    pub fn deliver(&self) -> usize {
        let batch = std::mem::take(&mut *self.inner.pending.borrow_mut());
        if batch.is_empty() {
            return 0;
        }
        let watchers: Vec<Rc<dyn MutationWatcher>> = {
            let mut registered = self.inner.watchers.borrow_mut();
            registered.retain(|watcher| watcher.strong_count() > 0);
            registered.iter().filter_map(Weak::upgrade).collect()
        };
        for watcher in watchers {
            watcher.on_mutations(&batch);
        }
        batch.len()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentInner {
    fn enqueue(&self, record: MutationRecord) {
        self.pending.borrow_mut().push(record);
    }
}

impl Node {
    fn create(document: Weak<DocumentInner>, kind: NodeKind) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                id: NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)),
                kind: RefCell::new(kind),
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                document,
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(*self.inner.kind.borrow(), NodeKind::Element { .. })
    }

    pub fn tag(&self) -> Option<String> {
        match &*self.inner.kind.borrow() {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn text(&self) -> Option<String> {
        match &*self.inner.kind.borrow() {
            NodeKind::Text { data } => Some(data.clone()),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        match &*self.inner.kind.borrow() {
            NodeKind::Element { attributes, .. } => attributes.get(name).cloned(),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn parent(&self) -> Option<Node> {
        self.inner.parent.borrow().upgrade().map(|inner| Node { inner })
    }

    pub fn children(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    /// True if `other` is this node or one of its descendants.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if node.ptr_eq(self) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// This node followed by all descendants, depth first.
    pub fn subtree(&self) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            stack.extend(node.children().into_iter().rev());
            nodes.push(node);
        }
        nodes
    }

    pub fn append_child(&self, child: &Node) -> Result<(), TreeError> {
        self.insert_before(child, None)
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None`. A child that already has a parent is detached first.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) -> Result<(), TreeError> {
        if !self.is_element() {
            return Err(TreeError::NotAContainer(self.id()));
        }
        if child.contains(self) {
            return Err(TreeError::HierarchyCycle(child.id()));
        }
        if let Some(reference) = reference {
            if !reference.parent().is_some_and(|parent| parent.ptr_eq(self)) {
                return Err(TreeError::NotAChild(reference.id()));
            }
        }
        if let Some(previous_parent) = child.parent() {
            previous_parent.remove_child(child)?;
        }

        {
            let mut children = self.inner.children.borrow_mut();
            let position = reference
                .and_then(|reference| children.iter().position(|c| c.ptr_eq(reference)))
                .unwrap_or(children.len());
            children.insert(position, child.clone());
        }
        *child.inner.parent.borrow_mut() = Rc::downgrade(&self.inner);

        self.enqueue(MutationRecord {
            kind: MutationKind::ChildList,
            target: self.clone(),
            added_nodes: vec![child.clone()],
            removed_nodes: Vec::new(),
            attribute_name: None,
            old_value: None,
        });
        Ok(())
    }

    pub fn remove_child(&self, child: &Node) -> Result<(), TreeError> {
        let removed = {
            let mut children = self.inner.children.borrow_mut();
            let position = children
                .iter()
                .position(|c| c.ptr_eq(child))
                .ok_or(TreeError::NotAChild(child.id()))?;
            children.remove(position)
        };
        *removed.inner.parent.borrow_mut() = Weak::new();

        self.enqueue(MutationRecord {
            kind: MutationKind::ChildList,
            target: self.clone(),
            added_nodes: Vec::new(),
            removed_nodes: vec![removed],
            attribute_name: None,
            old_value: None,
        });
        Ok(())
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> Result<(), TreeError> {
        let old_value = match &mut *self.inner.kind.borrow_mut() {
            NodeKind::Element { attributes, .. } => {
                attributes.insert(name.to_string(), value.to_string())
            }
            NodeKind::Text { .. } => return Err(TreeError::NotAnElement(self.id())),
        };
        self.enqueue_attribute(name, old_value);
        Ok(())
    }

    /// Removing an absent attribute is not a change and queues nothing.
    pub fn remove_attribute(&self, name: &str) -> Result<(), TreeError> {
        let old_value = match &mut *self.inner.kind.borrow_mut() {
            NodeKind::Element { attributes, .. } => attributes.shift_remove(name),
            NodeKind::Text { .. } => return Err(TreeError::NotAnElement(self.id())),
        };
        if old_value.is_some() {
            self.enqueue_attribute(name, old_value);
        }
        Ok(())
    }

    /// Replace the character data of a text node.
    pub fn set_text(&self, data: &str) -> Result<(), TreeError> {
        let old_value = match &mut *self.inner.kind.borrow_mut() {
            NodeKind::Text { data: current } => std::mem::replace(current, data.to_string()),
            NodeKind::Element { .. } => return Err(TreeError::NotText(self.id())),
        };
        self.enqueue(MutationRecord {
            kind: MutationKind::CharacterData,
            target: self.clone(),
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute_name: None,
            old_value: Some(old_value),
        });
        Ok(())
    }

    /// Short diagnostic rendering: an element's opening tag with its
    /// attributes, or a text node's data.
    pub fn describe(&self) -> String {
        match &*self.inner.kind.borrow() {
            NodeKind::Element { tag, attributes } => {
                let mut rendered = format!("<{tag}");
                for (name, value) in attributes {
                    rendered.push_str(&format!(" {name}=\"{value}\""));
                }
                rendered.push('>');
                rendered
            }
            NodeKind::Text { data } => format!("textNode: \"{data}\""),
        }
    }

    fn enqueue_attribute(&self, name: &str, old_value: Option<String>) {
        self.enqueue(MutationRecord {
            kind: MutationKind::Attributes,
            target: self.clone(),
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute_name: Some(name.to_string()),
            old_value,
        });
    }

    fn enqueue(&self, record: MutationRecord) {
        if let Some(document) = self.inner.document.upgrade() {
            document.enqueue(record);
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}, {})", self.inner.id, self.describe())
    }
}

impl WeakNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Node> {
        self.inner.upgrade().map(|inner| Node { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakNode({}, alive: {})", self.id, self.is_alive())
    }
}
