//! Applies new values to an instance's bindings.

mod attribute;
pub(crate) mod list;
mod node;
mod tag;

use std::rc::Rc;

use crate::binding::Binding;
use crate::component::ComponentDef;
use crate::dom::Document;
use crate::error::{LoadError, PatchError};
use crate::suspense::LazyComponent;
use crate::template::{TemplateCache, TemplateDescription};
use crate::value::{CapturedChildren, NodeRef, Value};
use crate::NodeId;

/// Services the reconciler needs from the runtime when a tag binding swaps elements.
pub trait ComponentHost {
    /// Make `def` known before an element with its tag is inserted.
    fn define(&self, def: &ComponentDef);

    /// Register `placeholder` as pending and start or join the load of `lazy`.
    fn suspend(&self, doc: &mut Document, placeholder: NodeId, lazy: &LazyComponent);

    /// Report that `placeholder` settled into `replacement`.
    fn resolve(&self, doc: &mut Document, placeholder: NodeId, replacement: NodeId);

    /// Presentation rendered into a placeholder whose component failed to load.
    fn load_error(&self, placeholder: NodeId, error: &LoadError) -> TemplateDescription;

    /// Hand over the children captured by the component instance on `node`, if one runs there.
    ///
    /// Its child list is then that component's own output and is dropped with it.
    fn take_children(&self, node: NodeId) -> Option<CapturedChildren> {
        let _ = node;
        None
    }
}

pub struct PatchContext<'a> {
    pub doc: &'a mut Document,
    pub cache: &'a mut TemplateCache,
    host: Option<&'a dyn ComponentHost>,
    refs: Vec<NodeRef>,
}

impl<'a> PatchContext<'a> {
    pub fn new(doc: &'a mut Document, cache: &'a mut TemplateCache) -> Self {
        Self {
            doc,
            cache,
            host: None,
            refs: Vec::new(),
        }
    }

    pub fn with_host(mut self, host: &'a dyn ComponentHost) -> Self {
        self.host = Some(host);
        self
    }

    pub(crate) fn host(&self) -> Option<&'a dyn ComponentHost> {
        self.host
    }

    /// Refs assigned during this patch; cleared when their owner is torn down.
    pub fn take_refs(&mut self) -> Vec<NodeRef> {
        std::mem::take(&mut self.refs)
    }
}

/// Apply `values` to `bindings`, returning the values to pass as `previous` next time.
///
/// Passing the same sequence as `values` and `previous` performs no work.
pub fn patch(
    cx: &mut PatchContext<'_>,
    bindings: &mut [Binding],
    values: &Rc<[Value]>,
    previous: Option<&Rc<[Value]>>,
) -> Result<Rc<[Value]>, PatchError> {
    if let Some(previous) = previous {
        if Rc::ptr_eq(previous, values) {
            return Ok(Rc::clone(previous));
        }
    }
    if bindings.len() != values.len() {
        return Err(PatchError::ArityMismatch {
            bindings: bindings.len(),
            values: values.len(),
        });
    }
    for index in 0..bindings.len() {
        let value = &values[index];
        let unchanged = previous
            .and_then(|previous| previous.get(index))
            .is_some_and(|previous| previous.same(value));
        if unchanged && bindings[index].is_settled(cx.doc) {
            continue;
        }
        let swapped = match &mut bindings[index] {
            Binding::Node(binding) => {
                binding.update(cx, value)?;
                None
            }
            Binding::Attribute(binding) => {
                binding.update(cx, value)?;
                None
            }
            Binding::Tag(binding) => binding.update(cx, value)?,
        };
        if let Some((old, new)) = swapped {
            for binding in bindings.iter_mut() {
                binding.retarget(old, new);
            }
        }
    }
    Ok(Rc::clone(values))
}

impl Binding {
    /// Whether an unchanged value can skip this binding.
    fn is_settled(&self, doc: &Document) -> bool {
        match self {
            Binding::Node(binding) => binding.is_settled(doc),
            Binding::Attribute(binding) => !binding.is_composed(),
            Binding::Tag(binding) => binding.pending.is_none(),
        }
    }
}

#[cfg(test)]
#[path = "../tests/reconcile_tests.rs"]
mod tests;
