use super::PatchContext;
use crate::binding::{NodeBinding, TagBinding};
use crate::error::{LoadError, PatchError};
use crate::suspense::{LazyComponent, LazyStatus};
use crate::value::Value;
use crate::NodeId;

impl TagBinding {
    /// Swap the target element when the value names a different tag.
    ///
    /// Returns the replaced and replacing nodes so sibling bindings can be retargeted.
    pub(crate) fn update(
        &mut self,
        cx: &mut PatchContext<'_>,
        value: &Value,
    ) -> Result<Option<(NodeId, NodeId)>, PatchError> {
        if self.closing {
            return Ok(None);
        }
        let tag = match value {
            Value::Str(tag) => tag.to_ascii_lowercase(),
            Value::Component(def) => {
                if let Some(host) = cx.host() {
                    host.define(def);
                }
                def.tag().to_owned()
            }
            Value::Lazy(lazy) => match lazy.status() {
                LazyStatus::Ready(def) => {
                    if let Some(host) = cx.host() {
                        host.define(&def);
                    }
                    def.tag().to_owned()
                }
                LazyStatus::Failed(error) => {
                    self.fail(cx, lazy, &error)?;
                    return Ok(None);
                }
                LazyStatus::Pending => {
                    self.suspend(cx, lazy)?;
                    return Ok(None);
                }
            },
            nothing if nothing.is_nothing() => return Ok(None),
            other => {
                return Err(PatchError::UnsupportedValue {
                    kind: other.kind_name(),
                    binding: "tag",
                })
            }
        };

        let old = self.target;
        if cx.doc.tag_name(old)? == tag {
            self.settle(cx, old, old);
            return Ok(None);
        }
        let new = cx.doc.create_element(&tag);
        let captured = cx.host().and_then(|host| host.take_children(old));
        match captured {
            Some(children) => {
                cx.doc.transfer_attributes(old, new)?;
                for &child in children.nodes() {
                    cx.doc.append_child(new, child)?;
                }
            }
            None => cx.doc.transfer(old, new)?,
        }
        if cx.doc.parent(old).is_some() {
            cx.doc.replace(old, new)?;
        } else {
            cx.doc.remove(old)?;
        }
        self.target = new;
        self.failed = None;
        log::debug!("swapped <{tag}> in for node {old}");
        self.settle(cx, old, new);
        Ok(Some((old, new)))
    }

    fn settle(&mut self, cx: &mut PatchContext<'_>, placeholder: NodeId, replacement: NodeId) {
        if self.pending.take().is_some() {
            if let Some(host) = cx.host() {
                host.resolve(cx.doc, placeholder, replacement);
            }
        }
    }

    fn suspend(&mut self, cx: &mut PatchContext<'_>, lazy: &LazyComponent) -> Result<(), PatchError> {
        if self.pending.as_ref().is_some_and(|pending| pending.ptr_eq(lazy)) {
            return Ok(());
        }
        let host = cx.host().ok_or(PatchError::UnsupportedValue {
            kind: "lazy component",
            binding: "tag without a runtime",
        })?;
        host.suspend(cx.doc, self.target, lazy);
        self.pending = Some(lazy.clone());
        Ok(())
    }

    fn fail(
        &mut self,
        cx: &mut PatchContext<'_>,
        lazy: &LazyComponent,
        error: &LoadError,
    ) -> Result<(), PatchError> {
        if self.failed.as_ref().is_some_and(|failed| failed.ptr_eq(lazy)) {
            return Ok(());
        }
        let placeholder = self.target;
        if let Some(host) = cx.host() {
            let presentation = host.load_error(placeholder, error);
            for child in cx.doc.children(placeholder)?.to_vec() {
                cx.doc.remove(child)?;
            }
            let mut region = NodeBinding::append_to(cx.doc, placeholder)?;
            region.update(cx, &Value::Template(presentation))?;
        }
        self.failed = Some(lazy.clone());
        self.settle(cx, placeholder, placeholder);
        Ok(())
    }
}
