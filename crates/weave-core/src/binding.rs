//! Live handles connecting compiled dependencies to nodes of one instance.

use std::cell::RefCell;
use std::rc::Rc;

use crate::reconcile::list::ArrayBinding;
use crate::suspense::LazyComponent;
use crate::template::Statics;
use crate::value::{CapturedChildren, Callback, NodeRef, Value};
use crate::NodeId;

pub enum Binding {
    Node(NodeBinding),
    Attribute(AttributeBinding),
    Tag(TagBinding),
}

impl Binding {
    /// Point every binding aimed at `old` to `new` after a tag swap.
    pub(crate) fn retarget(&mut self, old: NodeId, new: NodeId) {
        match self {
            Binding::Node(_) => {}
            Binding::Attribute(binding) => {
                if binding.target == old {
                    binding.target = new;
                    if let AttributeKind::Ref { current: Some(node_ref) } = &binding.kind {
                        if node_ref.get() == Some(old) {
                            node_ref.set(Some(new));
                        }
                    }
                }
            }
            Binding::Tag(binding) => {
                if binding.target == old {
                    binding.target = new;
                }
            }
        }
    }

    pub fn target(&self) -> Option<NodeId> {
        match self {
            Binding::Node(_) => None,
            Binding::Attribute(binding) => Some(binding.target),
            Binding::Tag(binding) => Some(binding.target),
        }
    }
}

/// Region between two anchor comments.
pub struct NodeBinding {
    pub(crate) start: NodeId,
    pub(crate) end: NodeId,
    pub(crate) content: NodeContent,
}

pub(crate) enum NodeContent {
    Uninitialized,
    Empty,
    Text(NodeId),
    Template(Box<NestedTemplate>),
    Children(CapturedChildren),
    List(ArrayBinding),
}

/// Bindings of a nested template, kept with the statics and values they last applied.
pub(crate) struct NestedTemplate {
    pub statics: Statics,
    pub bindings: Vec<Binding>,
    pub values: Rc<[Value]>,
}

pub struct AttributeBinding {
    pub(crate) target: NodeId,
    pub(crate) name: Rc<str>,
    pub(crate) kind: AttributeKind,
}

pub(crate) enum AttributeKind {
    /// `@event` listener attached once, delegating to `handler`.
    Event {
        event: Rc<str>,
        handler: Rc<RefCell<Option<Callback>>>,
        attached: bool,
    },
    /// `ref` pointing a [`NodeRef`] at the element.
    Ref { current: Option<NodeRef> },
    /// One hole of an attribute interpolating several.
    Composed {
        group: Rc<RefCell<ComposedGroup>>,
        slot: usize,
    },
    /// `.name` assigned as a live property.
    Property { property: Rc<str> },
    /// Sole hole of a raw-text element body.
    TextContent,
    Plain,
}

/// Shared state of all holes interpolated into one attribute value.
pub(crate) struct ComposedGroup {
    pub statics: Rc<[String]>,
    pub parts: Vec<String>,
    pub text_content: bool,
}

impl ComposedGroup {
    pub fn new(statics: Rc<[String]>, text_content: bool) -> Self {
        let holes = statics.len().saturating_sub(1);
        Self {
            statics,
            parts: vec![String::new(); holes],
            text_content,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (index, literal) in self.statics.iter().enumerate() {
            out.push_str(literal);
            if let Some(part) = self.parts.get(index) {
                out.push_str(part);
            }
        }
        out
    }
}

/// Element whose tag comes from a value.
pub struct TagBinding {
    pub(crate) target: NodeId,
    pub(crate) closing: bool,
    pub(crate) pending: Option<LazyComponent>,
    pub(crate) failed: Option<LazyComponent>,
}

impl TagBinding {
    pub(crate) fn new(target: NodeId, closing: bool) -> Self {
        Self {
            target,
            closing,
            pending: None,
            failed: None,
        }
    }

    pub fn target(&self) -> NodeId {
        self.target
    }
}
