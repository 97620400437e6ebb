//! Arena backed host tree patched by the reconciler.
//!
//! Nodes are addressed by [`NodeId`] and ids are never reused, so a stale id
//! reports [`DomError::Missing`] instead of aliasing a newer node.

use std::fmt;
use std::fmt::Write as _;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::DomError;
use crate::value::Value;
use crate::NodeId;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

/// Elements whose tag contains a dash receive lifecycle records.
pub fn is_custom_tag(tag: &str) -> bool {
    tag.contains('-')
}

/// Event delivered to listeners.
#[derive(Clone, Debug)]
pub struct Event {
    pub name: Rc<str>,
    pub target: NodeId,
    pub detail: Value,
}

impl Event {
    pub fn new(name: &str, target: NodeId) -> Self {
        Self {
            name: Rc::from(name),
            target,
            detail: Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
        self.detail = detail.into();
        self
    }
}

#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event)>);

impl Listener {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Listener")
    }
}

/// Reactions queued for custom elements, drained by the runtime in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleRecord {
    Connected(NodeId),
    Disconnected(NodeId),
    AttributeChanged { node: NodeId, name: String },
}

#[derive(Clone, Debug)]
pub struct Element {
    tag: Rc<str>,
    attributes: IndexMap<String, String>,
    properties: IndexMap<String, Value>,
    listeners: Vec<(Rc<str>, Listener)>,
}

impl Element {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Document,
    Fragment,
    Element(Element),
    Text(String),
    Comment(String),
}

impl NodeKind {
    fn is_container(&self) -> bool {
        matches!(
            self,
            NodeKind::Document | NodeKind::Fragment | NodeKind::Element(_)
        )
    }
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    pinned: bool,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            pinned: false,
        }
    }
}

pub struct Document {
    nodes: Vec<Option<NodeData>>,
    root: NodeId,
    mutations: u64,
    listener_attachments: u64,
    records: Vec<LifecycleRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(NodeData::new(NodeKind::Document))],
            root: 0,
            mutations: 0,
            listener_attachments: 0,
            records: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of tree, attribute, property and text writes performed so far.
    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }

    /// Number of native listeners attached so far.
    pub fn listener_attachments(&self) -> u64 {
        self.listener_attachments
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Some(NodeData::new(kind)));
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element(Element {
            tag: Rc::from(tag),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            listeners: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_owned()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Comment(text.to_owned()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(NodeKind::Fragment)
    }

    fn data(&self, id: NodeId) -> Result<&NodeData, DomError> {
        self.nodes
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(DomError::Missing { id })
    }

    fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData, DomError> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(DomError::Missing { id })
    }

    fn element(&self, id: NodeId) -> Result<&Element, DomError> {
        match &self.data(id)?.kind {
            NodeKind::Element(element) => Ok(element),
            _ => Err(DomError::NotAnElement { id }),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element, DomError> {
        match &mut self.data_mut(id)?.kind {
            NodeKind::Element(element) => Ok(element),
            _ => Err(DomError::NotAnElement { id }),
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.data(id).is_ok()
    }

    pub fn kind(&self, id: NodeId) -> Result<&NodeKind, DomError> {
        Ok(&self.data(id)?.kind)
    }

    pub fn tag_name(&self, id: NodeId) -> Result<&str, DomError> {
        Ok(self.element(id)?.tag())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_ok()
    }

    /// Text of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.data(id).ok()?.kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).ok()?.parent
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], DomError> {
        Ok(&self.data(id)?.children)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).ok()?.children.first().copied()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = &self.data(parent).ok()?.children;
        let index = siblings.iter().position(|&c| c == id)?;
        siblings.get(index + 1).copied()
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return self.contains(node);
            }
            current = self.parent(node);
        }
        false
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            out.push(node);
            current = self.parent(node);
        }
        out
    }

    /// `id` followed by all of its descendants in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            let Ok(data) = self.data(node) else {
                continue;
            };
            out.push(node);
            stack.extend(data.children.iter().rev().copied());
        }
        out
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference`, moving it if it already has a parent.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if !self.data(parent)?.kind.is_container() {
            return Err(DomError::NotAContainer { id: parent });
        }
        if matches!(self.data(child)?.kind, NodeKind::Document | NodeKind::Fragment)
            || self.is_inclusive_ancestor(child, parent)
        {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if let Some(reference) = reference {
            if reference == child {
                return Ok(());
            }
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }

        let was_connected = self.is_connected(child);
        self.unlink(child)?;
        let index = match reference {
            Some(reference) => self
                .data(parent)?
                .children
                .iter()
                .position(|&c| c == reference)
                .ok_or(DomError::NotAChild {
                    parent,
                    child: reference,
                })?,
            None => self.data(parent)?.children.len(),
        };
        self.data_mut(parent)?.children.insert(index, child);
        self.data_mut(child)?.parent = Some(parent);
        self.mutations += 1;

        let now_connected = self.is_connected(parent);
        if was_connected {
            self.queue_subtree(child, LifecycleRecord::Disconnected);
        }
        if now_connected {
            self.queue_subtree(child, LifecycleRecord::Connected);
        }
        Ok(())
    }

    /// Move every child of `from` into `parent` before `reference`.
    pub fn move_children(
        &mut self,
        from: NodeId,
        parent: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let children = self.data(from)?.children.clone();
        for child in children {
            self.insert_before(parent, child, reference)?;
        }
        Ok(())
    }

    fn unlink(&mut self, child: NodeId) -> Result<(), DomError> {
        if let Some(parent) = self.data_mut(child)?.parent.take() {
            let siblings = &mut self.data_mut(parent)?.children;
            siblings.retain(|&c| c != child);
        }
        Ok(())
    }

    /// Detach `id` from its parent, keeping it alive for later reinsertion.
    pub fn detach(&mut self, id: NodeId) -> Result<(), DomError> {
        if self.data(id)?.parent.is_none() {
            return Ok(());
        }
        let was_connected = self.is_connected(id);
        self.unlink(id)?;
        self.mutations += 1;
        if was_connected {
            self.queue_subtree(id, LifecycleRecord::Disconnected);
        }
        Ok(())
    }

    /// Detach and free `id` with its subtree. Pinned nodes are only detached.
    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        self.detach(id)?;
        if !self.data(id)?.pinned {
            self.free(id);
        }
        Ok(())
    }

    fn free(&mut self, id: NodeId) {
        let Some(data) = self.nodes.get_mut(id).and_then(Option::take) else {
            return;
        };
        for child in data.children {
            let pinned = self
                .nodes
                .get_mut(child)
                .and_then(Option::as_mut)
                .map(|c| {
                    c.parent = None;
                    c.pinned
                })
                .unwrap_or(false);
            if !pinned {
                self.free(child);
            }
        }
    }

    /// Put `new` where `old` is and free `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<(), DomError> {
        let parent = self.parent(old).ok_or(DomError::Missing { id: old })?;
        self.insert_before(parent, new, Some(old))?;
        self.remove(old)
    }

    /// Keep `id` alive when an ancestor is removed.
    pub fn pin(&mut self, id: NodeId) -> Result<(), DomError> {
        self.data_mut(id)?.pinned = true;
        Ok(())
    }

    pub fn unpin(&mut self, id: NodeId) -> Result<(), DomError> {
        self.data_mut(id)?.pinned = false;
        Ok(())
    }

    fn queue_subtree(&mut self, id: NodeId, record: fn(NodeId) -> LifecycleRecord) {
        for node in self.descendants(id) {
            if self.element(node).is_ok_and(|e| is_custom_tag(e.tag())) {
                self.records.push(record(node));
            }
        }
    }

    fn queue_attribute_changed(&mut self, id: NodeId, name: &str) {
        if self.element(id).is_ok_and(|e| is_custom_tag(e.tag())) && self.is_connected(id) {
            self.records.push(LifecycleRecord::AttributeChanged {
                node: id,
                name: name.to_owned(),
            });
        }
    }

    pub fn take_records(&mut self) -> Vec<LifecycleRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .ok()?
            .attributes
            .get(name)
            .map(String::as_str)
    }

    pub fn attributes(&self, id: NodeId) -> Result<Vec<(String, String)>, DomError> {
        Ok(self
            .element(id)?
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// Set an attribute; writing the current value is not a mutation.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let element = self.element_mut(id)?;
        if element.attributes.get(name).map(String::as_str) == Some(value) {
            return Ok(());
        }
        element.attributes.insert(name.to_owned(), value.to_owned());
        self.mutations += 1;
        self.queue_attribute_changed(id, name);
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        if self.element_mut(id)?.attributes.shift_remove(name).is_some() {
            self.mutations += 1;
            self.queue_attribute_changed(id, name);
        }
        Ok(())
    }

    pub fn get_property(&self, id: NodeId, name: &str) -> Option<&Value> {
        self.element(id).ok()?.properties.get(name)
    }

    pub fn set_property(&mut self, id: NodeId, name: &str, value: Value) -> Result<(), DomError> {
        let element = self.element_mut(id)?;
        if element
            .properties
            .get(name)
            .is_some_and(|current| current.same(&value))
        {
            return Ok(());
        }
        element.properties.insert(name.to_owned(), value);
        self.mutations += 1;
        self.queue_attribute_changed(id, name);
        Ok(())
    }

    pub fn remove_property(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        if self.element_mut(id)?.properties.shift_remove(name).is_some() {
            self.mutations += 1;
            self.queue_attribute_changed(id, name);
        }
        Ok(())
    }

    /// Overwrite the data of a text or comment node.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.data_mut(id)?.kind {
            NodeKind::Text(current) | NodeKind::Comment(current) => {
                if current != text {
                    current.clear();
                    current.push_str(text);
                    self.mutations += 1;
                }
                Ok(())
            }
            _ => Err(DomError::NotAnElement { id }),
        }
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        let children = self.data(id)?.children.clone();
        if let [only] = children.as_slice() {
            if matches!(self.data(*only)?.kind, NodeKind::Text(_)) {
                return self.set_text(*only, text);
            }
        }
        for child in children {
            self.remove(child)?;
        }
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node)?;
        }
        Ok(())
    }

    pub fn add_listener(&mut self, id: NodeId, event: &str, listener: Listener) -> Result<(), DomError> {
        self.element_mut(id)?
            .listeners
            .push((Rc::from(event), listener));
        self.listener_attachments += 1;
        Ok(())
    }

    pub fn listeners(&self, id: NodeId, event: &str) -> Vec<Listener> {
        self.element(id)
            .map(|e| {
                e.listeners
                    .iter()
                    .filter(|(name, _)| &**name == event)
                    .map(|(_, l)| l.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn listener_count(&self, id: NodeId) -> usize {
        self.element(id).map(|e| e.listeners.len()).unwrap_or(0)
    }

    /// Invoke the listeners registered on `target` for `event`.
    ///
    /// Listeners may not borrow this document again; the runtime dispatches
    /// through [`crate::Runtime::dispatch_event`] instead.
    pub fn dispatch_event(&self, event: &Event) -> usize {
        let listeners = self.listeners(event.target, &event.name);
        for listener in &listeners {
            listener.call(event);
        }
        listeners.len()
    }

    /// Move attributes, properties, listeners and children from `from` onto `to`.
    pub fn transfer(&mut self, from: NodeId, to: NodeId) -> Result<(), DomError> {
        self.transfer_attributes(from, to)?;
        self.move_children(from, to, None)
    }

    /// Copy attributes and properties of `from` onto `to` and move its listeners over.
    pub fn transfer_attributes(&mut self, from: NodeId, to: NodeId) -> Result<(), DomError> {
        let source = self.element(from)?.clone();
        self.element(to)?;
        for (name, value) in &source.attributes {
            self.set_attribute(to, name, value)?;
        }
        for (name, value) in &source.properties {
            self.set_property(to, name, value.clone())?;
        }
        self.element_mut(to)?.listeners.extend(source.listeners);
        Ok(())
    }

    /// Concatenated text of all text descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            if let Ok(NodeKind::Text(text)) = self.kind(node) {
                out.push_str(text);
            }
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize(id, true, &mut out);
        out
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id).unwrap_or(&[]) {
            self.serialize(child, true, &mut out);
        }
        out
    }

    /// Inner markup of `id` with anchor comments left out.
    pub fn markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id).unwrap_or(&[]) {
            self.serialize(child, false, &mut out);
        }
        out
    }

    fn serialize(&self, id: NodeId, comments: bool, out: &mut String) {
        let Ok(data) = self.data(id) else {
            return;
        };
        match &data.kind {
            NodeKind::Document | NodeKind::Fragment => {
                for &child in &data.children {
                    self.serialize(child, comments, out);
                }
            }
            NodeKind::Text(text) => {
                let raw = data
                    .parent
                    .and_then(|p| self.tag_name(p).ok())
                    .is_some_and(is_raw_text);
                if raw {
                    out.push_str(text);
                } else {
                    escape_into(text, false, out);
                }
            }
            NodeKind::Comment(text) => {
                if comments {
                    let _ = write!(out, "<!--{text}-->");
                }
            }
            NodeKind::Element(element) => {
                let _ = write!(out, "<{}", element.tag);
                for (name, value) in &element.attributes {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        escape_into(value, true, out);
                        out.push('"');
                    }
                }
                out.push('>');
                if is_void(&element.tag) {
                    return;
                }
                for &child in &data.children {
                    self.serialize(child, comments, out);
                }
                let _ = write!(out, "</{}>", element.tag);
            }
        }
    }

    /// First element below `root` (inclusive) with the given tag.
    pub fn find_by_tag(&self, root: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|&n| self.tag_name(n).is_ok_and(|t| t == tag))
    }

    pub fn find_all_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&n| self.tag_name(n).is_ok_and(|t| t == tag))
            .collect()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.len())
            .field("mutations", &self.mutations)
            .field("html", &self.outer_html(self.root))
            .finish()
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}
