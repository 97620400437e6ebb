use std::rc::Rc;

use super::list::ArrayBinding;
use super::{patch, PatchContext};
use crate::binding::{NestedTemplate, NodeBinding, NodeContent};
use crate::dom::Document;
use crate::error::{DomError, PatchError};
use crate::instantiate::instantiate;
use crate::template::TemplateDescription;
use crate::value::{CapturedChildren, Value};
use crate::NodeId;

impl NodeBinding {
    pub(crate) fn new(start: NodeId, end: NodeId) -> Self {
        Self {
            start,
            end,
            content: NodeContent::Uninitialized,
        }
    }

    /// Append a fresh pair of anchors to `parent` and bind the region between them.
    pub fn append_to(doc: &mut Document, parent: NodeId) -> Result<Self, DomError> {
        let start = doc.create_comment("");
        let end = doc.create_comment("");
        doc.append_child(parent, start)?;
        doc.append_child(parent, end)?;
        Ok(Self::new(start, end))
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn end(&self) -> NodeId {
        self.end
    }

    fn parent(&self, doc: &Document) -> Result<NodeId, DomError> {
        doc.parent(self.start).ok_or(DomError::Missing { id: self.start })
    }

    /// Nodes currently between the anchors.
    pub fn nodes(&self, doc: &Document) -> Vec<NodeId> {
        let Some(parent) = doc.parent(self.start) else {
            return Vec::new();
        };
        let siblings = doc.children(parent).unwrap_or(&[]);
        let Some(start) = siblings.iter().position(|&n| n == self.start) else {
            return Vec::new();
        };
        siblings[start + 1..]
            .iter()
            .copied()
            .take_while(|&n| n != self.end)
            .collect()
    }

    pub(crate) fn is_settled(&self, doc: &Document) -> bool {
        match &self.content {
            NodeContent::Children(children) => self.nodes(doc) == children.nodes(),
            _ => true,
        }
    }

    /// Remove everything between the anchors.
    pub fn clear(&mut self, doc: &mut Document) -> Result<(), DomError> {
        for node in self.nodes(doc) {
            doc.remove(node)?;
        }
        self.content = NodeContent::Empty;
        Ok(())
    }

    /// Remove the region together with its anchors.
    pub(crate) fn dispose(mut self, doc: &mut Document) -> Result<(), DomError> {
        self.clear(doc)?;
        doc.remove(self.start)?;
        doc.remove(self.end)
    }

    pub fn update(&mut self, cx: &mut PatchContext<'_>, value: &Value) -> Result<(), PatchError> {
        if value.is_nothing() {
            if !matches!(self.content, NodeContent::Empty) {
                self.clear(cx.doc)?;
            }
            return Ok(());
        }
        match value {
            Value::Template(description) => self.update_template(cx, description),
            Value::Children(children) => self.update_children(cx.doc, children),
            Value::List(items) => {
                if !matches!(self.content, NodeContent::List(_)) {
                    self.clear(cx.doc)?;
                    self.content = NodeContent::List(ArrayBinding::default());
                }
                let parent = self.parent(cx.doc)?;
                match &mut self.content {
                    NodeContent::List(list) => list.update(cx, parent, self.end, items),
                    _ => Ok(()),
                }
            }
            primitive if primitive.is_primitive() => {
                let text = primitive.to_text().unwrap_or_default();
                self.update_text(cx.doc, &text)
            }
            other => Err(PatchError::UnsupportedValue {
                kind: other.kind_name(),
                binding: "node",
            }),
        }
    }

    fn update_text(&mut self, doc: &mut Document, text: &str) -> Result<(), PatchError> {
        if let NodeContent::Text(node) = self.content {
            if doc.contains(node) {
                doc.set_text(node, text)?;
                return Ok(());
            }
        }
        self.clear(doc)?;
        let node = doc.create_text(text);
        let parent = self.parent(doc)?;
        doc.insert_before(parent, node, Some(self.end))?;
        self.content = NodeContent::Text(node);
        Ok(())
    }

    fn update_template(
        &mut self,
        cx: &mut PatchContext<'_>,
        description: &TemplateDescription,
    ) -> Result<(), PatchError> {
        if let NodeContent::Template(nested) = &mut self.content {
            if nested.statics.structurally_eq(&description.statics()) {
                nested.values = patch(
                    cx,
                    &mut nested.bindings,
                    description.values(),
                    Some(&nested.values),
                )?;
                nested.statics = description.statics();
                return Ok(());
            }
        }

        description.check_arity()?;
        let compiled = cx.cache.get_or_compile(description.statics())?;
        let fragment = cx.doc.create_fragment();
        let built = instantiate(cx.doc, &compiled, fragment)
            .map_err(PatchError::from)
            .and_then(|mut bindings| {
                let values = patch(cx, &mut bindings, description.values(), None)?;
                Ok((bindings, values))
            });
        let (bindings, values) = match built {
            Ok(built) => built,
            Err(err) => {
                let _ = cx.doc.remove(fragment);
                return Err(err);
            }
        };

        self.clear(cx.doc)?;
        let parent = self.parent(cx.doc)?;
        cx.doc.move_children(fragment, parent, Some(self.end))?;
        cx.doc.remove(fragment)?;
        self.content = NodeContent::Template(Box::new(NestedTemplate {
            statics: description.statics(),
            bindings,
            values: Rc::clone(&values),
        }));
        Ok(())
    }

    fn update_children(
        &mut self,
        doc: &mut Document,
        children: &CapturedChildren,
    ) -> Result<(), PatchError> {
        if let NodeContent::Children(current) = &self.content {
            if current.ptr_eq(children) && self.is_settled(doc) {
                return Ok(());
            }
        }
        self.clear(doc)?;
        let parent = self.parent(doc)?;
        for &node in children.nodes() {
            doc.insert_before(parent, node, Some(self.end))?;
        }
        self.content = NodeContent::Children(children.clone());
        Ok(())
    }
}
