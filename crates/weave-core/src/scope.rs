use std::future::Future;
use std::rc::Rc;

use crate::component::Styles;
use crate::hooks::{HookStore, PendingEffect};
use crate::instance::Instance;
use crate::runtime::{RuntimeHandle, RuntimeInner};
use crate::value::Value;
use crate::NodeId;

/// Context threaded through one render of one component instance.
///
/// Hook calls read and advance the instance's slot cursor through this scope.
pub struct RenderScope<'a> {
    pub(crate) instance: &'a Rc<Instance>,
    pub(crate) runtime: &'a Rc<RuntimeInner>,
    pub(crate) hooks: &'a mut HookStore,
    pub(crate) effects: Vec<PendingEffect>,
}

impl<'a> RenderScope<'a> {
    pub(crate) fn new(
        instance: &'a Rc<Instance>,
        runtime: &'a Rc<RuntimeInner>,
        hooks: &'a mut HookStore,
    ) -> Self {
        Self {
            instance,
            runtime,
            hooks,
            effects: Vec::new(),
        }
    }

    pub(crate) fn into_effects(self) -> Vec<PendingEffect> {
        self.effects
    }

    /// The element this component renders into.
    pub fn host(&self) -> NodeId {
        self.instance.host
    }

    pub fn tag(&self) -> &str {
        self.instance.def.tag()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        RuntimeHandle::new(Rc::downgrade(self.runtime))
    }

    /// A prop: the host's property `name`, else its attribute as a string.
    pub fn prop(&self, name: &str) -> Option<Value> {
        let doc = self.runtime.document.borrow();
        doc.get_property(self.instance.host, name)
            .cloned()
            .or_else(|| doc.get_attribute(self.instance.host, name).map(Value::str))
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        let doc = self.runtime.document.borrow();
        doc.get_attribute(self.instance.host, name).map(str::to_owned)
    }

    /// Children authored inside the host before it first connected.
    pub fn children(&self) -> Value {
        match self.instance.captured_children() {
            Some(children) if !children.is_empty() => Value::Children(children),
            _ => Value::Null,
        }
    }

    pub fn styles(&self) -> Option<Rc<Styles>> {
        self.instance.def.styles().cloned()
    }

    /// Scoped name for `class`, or `class` itself when the component has no table entry.
    pub fn class(&self, class: &str) -> String {
        self.instance
            .def
            .styles()
            .and_then(|styles| styles.get(class).cloned())
            .unwrap_or_else(|| class.to_owned())
    }

    /// Run `future` on the runtime; it is dropped unpolled once this instance disconnects.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.runtime
            .spawn_owned(Box::pin(future), Some(Rc::downgrade(self.instance)));
    }
}
