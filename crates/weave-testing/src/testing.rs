use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use weave_core::{
    ComponentDef, DefaultScheduler, DefineError, Document, DomError, Event, NodeId, Runtime,
    RuntimeHandle, RuntimeOptions, SuspenseBoundary,
};

/// Headless harness for exercising components in tests.
///
/// `WeaveTestRule` owns a runtime over an in-memory document and exposes
/// helpers that mutate the tree, fire events and flush until nothing is left
/// to do, so assertions always see a settled document.
pub struct WeaveTestRule {
    runtime: Runtime,
}

impl WeaveTestRule {
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    pub fn with_options(options: RuntimeOptions) -> Self {
        Self {
            runtime: Runtime::with_options(Arc::new(DefaultScheduler), options),
        }
    }

    pub fn define(&self, def: ComponentDef) -> Result<(), DefineError> {
        self.runtime.define(def)
    }

    /// Mount `tag` under the document root and settle.
    pub fn set_content(&self, tag: &str) -> Result<NodeId, DomError> {
        self.mount(self.runtime.root(), tag)
    }

    /// Mount `tag` under `parent` and settle.
    pub fn mount(&self, parent: NodeId, tag: &str) -> Result<NodeId, DomError> {
        let node = self.runtime.mount(parent, tag)?;
        self.pump_until_idle();
        Ok(node)
    }

    /// Flush until no record, microtask or ready task remains. Returns the steps taken.
    pub fn pump_until_idle(&self) -> usize {
        let mut steps = 0;
        loop {
            let taken = self.runtime.flush();
            steps += taken;
            if taken == 0 || self.runtime.is_idle() {
                break;
            }
        }
        steps
    }

    /// Apply `f` to the document, then settle.
    pub fn update<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let result = f(&mut self.runtime.document_mut());
        self.pump_until_idle();
        result
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.update(|doc| doc.set_attribute(node, name, value))
    }

    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        self.update(|doc| doc.remove(node))
    }

    /// Dispatch `name` at `target` and settle. Returns how many listeners ran.
    pub fn dispatch(&self, target: NodeId, name: &str) -> Result<usize, DomError> {
        let count = self.runtime.dispatch_event(&Event::new(name, target))?;
        self.pump_until_idle();
        Ok(count)
    }

    pub fn click(&self, target: NodeId) -> Result<usize, DomError> {
        self.dispatch(target, "click")
    }

    /// Markup of the whole document, anchors left out.
    pub fn markup(&self) -> String {
        let doc = self.runtime.document();
        doc.markup(doc.root())
    }

    /// Inner markup of `node`, anchors left out.
    pub fn markup_of(&self, node: NodeId) -> String {
        self.runtime.document().markup(node)
    }

    pub fn text_of(&self, node: NodeId) -> String {
        self.runtime.document().text_content(node)
    }

    /// First element with `tag` anywhere in the document.
    pub fn find(&self, tag: &str) -> Option<NodeId> {
        let doc = self.runtime.document();
        doc.find_by_tag(doc.root(), tag)
    }

    pub fn find_all(&self, tag: &str) -> Vec<NodeId> {
        let doc = self.runtime.document();
        doc.find_all_by_tag(doc.root(), tag)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }
}

impl Default for WeaveTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `WeaveTestRule`.
pub fn run_test_runtime<R>(f: impl FnOnce(&WeaveTestRule) -> R) -> R {
    let rule = WeaveTestRule::new();
    f(&rule)
}

struct DeferredState<T> {
    value: Option<T>,
    waker: Option<Waker>,
}

/// Completes a [`DeferredFuture`] from test code.
pub struct Deferred<T>(Rc<RefCell<DeferredState<T>>>);

impl<T> Deferred<T> {
    pub fn resolve(&self, value: T) {
        let waker = {
            let mut state = self.0.borrow_mut();
            state.value = Some(value);
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Whether the future was polled and is now waiting.
    pub fn is_awaited(&self) -> bool {
        self.0.borrow().waker.is_some()
    }
}

/// Future that stays pending until its [`Deferred`] is resolved.
pub struct DeferredFuture<T>(Rc<RefCell<DeferredState<T>>>);

impl<T> Future for DeferredFuture<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut state = self.0.borrow_mut();
        match state.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

pub fn deferred<T>() -> (Deferred<T>, DeferredFuture<T>) {
    let state = Rc::new(RefCell::new(DeferredState {
        value: None,
        waker: None,
    }));
    (Deferred(Rc::clone(&state)), DeferredFuture(state))
}

/// Suspense boundary that marks pending placeholders with `aria-busy`.
#[derive(Default)]
pub struct BusyBoundary {
    pending: RefCell<Vec<NodeId>>,
    resolved: RefCell<Vec<(NodeId, NodeId)>>,
}

impl BusyBoundary {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn pending(&self) -> Vec<NodeId> {
        self.pending.borrow().clone()
    }

    pub fn resolved(&self) -> Vec<(NodeId, NodeId)> {
        self.resolved.borrow().clone()
    }
}

impl SuspenseBoundary for BusyBoundary {
    fn register_pending(&self, doc: &mut Document, node: NodeId) {
        if let Err(err) = doc.set_attribute(node, "aria-busy", "true") {
            log::warn!("cannot mark node {node} busy: {err}");
        }
        self.pending.borrow_mut().push(node);
    }

    fn resolve_pending(&self, doc: &mut Document, node: NodeId, replacement: NodeId) {
        if let Err(err) = doc.remove_attribute(replacement, "aria-busy") {
            log::warn!("cannot clear busy mark on node {replacement}: {err}");
        }
        self.pending.borrow_mut().retain(|&pending| pending != node);
        self.resolved.borrow_mut().push((node, replacement));
    }
}
