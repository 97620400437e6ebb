use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::binding::NodeBinding;
use crate::collections::map::HashMap;
use crate::component::ComponentDef;
use crate::error::{PatchError, RenderError};
use crate::hooks::HookStore;
use crate::lifecycle::{CancelToken, LifecycleState};
use crate::options::ErrorInfo;
use crate::reconcile::PatchContext;
use crate::runtime::{InstanceHost, Microtask, RuntimeInner};
use crate::scope::RenderScope;
use crate::value::{CapturedChildren, NodeRef, Value};
use crate::NodeId;

/// A component definition bound to one connected host element.
pub(crate) struct Instance {
    pub(crate) host: NodeId,
    pub(crate) def: ComponentDef,
    state: Cell<LifecycleState>,
    pub(crate) pending_render: Cell<bool>,
    hooks: RefCell<HookStore>,
    root: RefCell<Option<NodeBinding>>,
    children: RefCell<Option<CapturedChildren>>,
    refs: RefCell<Vec<NodeRef>>,
    provided: RefCell<HashMap<usize, Rc<dyn Any>>>,
    subscribers: RefCell<Vec<(usize, Weak<Instance>)>>,
    /// Bumped on every confirmed move so context lookups re-resolve.
    pub(crate) generation: Cell<u64>,
    pub(crate) uses_context: Cell<bool>,
    disconnect: RefCell<Option<CancelToken>>,
    renders: Cell<u64>,
}

impl Instance {
    pub(crate) fn new(host: NodeId, def: ComponentDef) -> Self {
        Self {
            host,
            def,
            state: Cell::new(LifecycleState::Unattached),
            pending_render: Cell::new(false),
            hooks: RefCell::new(HookStore::default()),
            root: RefCell::new(None),
            children: RefCell::new(None),
            refs: RefCell::new(Vec::new()),
            provided: RefCell::new(HashMap::new()),
            subscribers: RefCell::new(Vec::new()),
            generation: Cell::new(0),
            uses_context: Cell::new(false),
            disconnect: RefCell::new(None),
            renders: Cell::new(0),
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.state.get()
    }

    pub(crate) fn transition(&self, next: LifecycleState) {
        let current = self.state.get();
        if current == next {
            return;
        }
        if !current.can_transition_to(next) {
            log::warn!(
                "<{}> #{}: unexpected lifecycle transition {current:?} -> {next:?}",
                self.def.tag(),
                self.host
            );
        }
        log::trace!("<{}> #{}: {current:?} -> {next:?}", self.def.tag(), self.host);
        self.state.set(next);
    }

    pub(crate) fn render_count(&self) -> u64 {
        self.renders.get()
    }

    pub(crate) fn captured_children(&self) -> Option<CapturedChildren> {
        self.children.borrow().clone()
    }

    pub(crate) fn take_captured_children(&self) -> Option<CapturedChildren> {
        self.children.borrow_mut().take()
    }

    pub(crate) fn set_captured_children(&self, children: CapturedChildren) {
        *self.children.borrow_mut() = Some(children);
    }

    /// Arm the deferred disconnection check, cancelling any earlier one.
    pub(crate) fn arm_disconnect(&self) -> CancelToken {
        let token = CancelToken::new();
        if let Some(previous) = self.disconnect.borrow_mut().replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    pub(crate) fn cancel_disconnect(&self) {
        if let Some(token) = self.disconnect.borrow_mut().take() {
            token.cancel();
        }
    }

    /// Run the component function and patch its output into the host.
    pub(crate) fn render(self: &Rc<Self>, runtime: &Rc<RuntimeInner>) {
        let first = self.state() == LifecycleState::Connecting;
        self.transition(if first {
            LifecycleState::Initializing
        } else {
            LifecycleState::Updating
        });
        self.pending_render.set(false);
        self.renders.set(self.renders.get() + 1);

        let (result, effects) = {
            let mut hooks = self.hooks.borrow_mut();
            hooks.reset();
            let mut scope = RenderScope::new(self, runtime, &mut hooks);
            let result = self.def.render(&mut scope);
            (result, scope.into_effects())
        };

        let outcome = result.and_then(|description| {
            self.commit(runtime, &Value::Template(description))
                .map_err(RenderError::from)
        });
        match outcome {
            Ok(()) => {
                if !effects.is_empty() {
                    runtime.queue(Microtask::Effects(Rc::downgrade(self), effects));
                }
            }
            Err(err) => {
                log::error!("<{}> #{} failed to render: {err}", self.def.tag(), self.host);
                self.present_error(runtime, &err);
            }
        }
        if self.state() != LifecycleState::Disconnected {
            self.transition(LifecycleState::Idle);
        }
    }

    fn commit(self: &Rc<Self>, runtime: &Rc<RuntimeInner>, value: &Value) -> Result<(), PatchError> {
        let host = InstanceHost::new(runtime, Rc::downgrade(self));
        let mut doc = runtime.document.borrow_mut();
        let mut cache = runtime.templates.borrow_mut();
        let mut cx = PatchContext::new(&mut doc, &mut cache).with_host(&host);
        let mut root = self.root.borrow_mut();
        if root.is_none() {
            *root = Some(NodeBinding::append_to(cx.doc, self.host)?);
        }
        let result = match root.as_mut() {
            Some(root) => root.update(&mut cx, value),
            None => Ok(()),
        };
        let mut refs = self.refs.borrow_mut();
        for node_ref in cx.take_refs() {
            if !refs.iter().any(|known| known.ptr_eq(&node_ref)) {
                refs.push(node_ref);
            }
        }
        result
    }

    fn present_error(self: &Rc<Self>, runtime: &Rc<RuntimeInner>, err: &RenderError) {
        let info = ErrorInfo {
            tag: self.def.tag().to_owned(),
            host: self.host,
            message: err.to_string(),
        };
        let presentation = (runtime.options.error_presenter)(&info);
        if let Err(present_err) = self.commit(runtime, &Value::Template(presentation)) {
            log::error!(
                "<{}> #{}: error presenter failed: {present_err}",
                info.tag,
                info.host
            );
            let text = Value::str(format!("<{}> {}", info.tag, info.message));
            if let Err(text_err) = self.commit(runtime, &text) {
                log::error!("<{}> #{}: {text_err}", info.tag, info.host);
            }
        }
    }

    /// Terminal teardown after a confirmed disconnection.
    pub(crate) fn teardown(&self) {
        self.transition(LifecycleState::Disconnected);
        self.pending_render.set(false);
        self.cancel_disconnect();
        let mut hooks = std::mem::take(&mut *self.hooks.borrow_mut());
        hooks.dispose();
        for node_ref in self.refs.borrow_mut().drain(..) {
            node_ref.set(None);
        }
        self.provided.borrow_mut().clear();
        self.subscribers.borrow_mut().clear();
    }

    pub(crate) fn provides(&self, key: usize) -> bool {
        self.provided.borrow().contains_key(&key)
    }

    pub(crate) fn provided<T: Clone + 'static>(&self, key: usize) -> Option<T> {
        self.provided
            .borrow()
            .get(&key)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Store a provided value; true when it replaced a different one.
    pub(crate) fn provide(
        &self,
        key: usize,
        value: Rc<dyn Any>,
        differs: impl FnOnce(&dyn Any) -> bool,
    ) -> bool {
        let mut provided = self.provided.borrow_mut();
        let changed = provided
            .get(&key)
            .map(|current| differs(current.as_ref()));
        match changed {
            Some(false) => false,
            Some(true) => {
                provided.insert(key, value);
                true
            }
            None => {
                provided.insert(key, value);
                false
            }
        }
    }

    pub(crate) fn subscribe(&self, key: usize, subscriber: Weak<Instance>) {
        let mut subscribers = self.subscribers.borrow_mut();
        if !subscribers
            .iter()
            .any(|(k, known)| *k == key && known.ptr_eq(&subscriber))
        {
            subscribers.push((key, subscriber));
        }
    }

    pub(crate) fn unsubscribe(&self, key: usize, subscriber: &Weak<Instance>) {
        self.subscribers
            .borrow_mut()
            .retain(|(k, known)| !(*k == key && known.ptr_eq(subscriber)));
    }

    pub(crate) fn subscribers(&self, key: usize) -> Vec<Rc<Instance>> {
        self.subscribers
            .borrow()
            .iter()
            .filter(|(k, _)| *k == key)
            .filter_map(|(_, subscriber)| subscriber.upgrade())
            .collect()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}
