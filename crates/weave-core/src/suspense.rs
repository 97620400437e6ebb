//! Lazily loaded components and the suspense boundary seam.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::component::ComponentDef;
use crate::dom::Document;
use crate::error::LoadError;
use crate::NodeId;

pub type LoadFuture = Pin<Box<dyn Future<Output = Result<ComponentDef, LoadError>>>>;

/// Receives placeholders that wait on a lazy component.
///
/// Rendering a fallback while nodes are pending is up to the implementation.
pub trait SuspenseBoundary {
    fn register_pending(&self, doc: &mut Document, node: NodeId);

    /// `replacement` is `node` itself when the load failed and an error was rendered in place.
    fn resolve_pending(&self, doc: &mut Document, node: NodeId, replacement: NodeId);
}

enum LazyState {
    Idle(Option<Box<dyn FnOnce() -> LoadFuture>>),
    Loading,
    Ready(ComponentDef),
    Failed(LoadError),
}

/// Snapshot of a lazy component's load.
pub enum LazyStatus {
    Pending,
    Ready(ComponentDef),
    Failed(LoadError),
}

struct LazyInner {
    state: RefCell<LazyState>,
    waiters: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// A component definition resolved by a future, loaded at most once.
#[derive(Clone)]
pub struct LazyComponent(Rc<LazyInner>);

impl LazyComponent {
    pub fn new<F>(loader: impl FnOnce() -> F + 'static) -> Self
    where
        F: Future<Output = Result<ComponentDef, LoadError>> + 'static,
    {
        let loader: Box<dyn FnOnce() -> LoadFuture> = Box::new(move || Box::pin(loader()));
        Self::with_state(LazyState::Idle(Some(loader)))
    }

    /// Already resolved to `def`.
    pub fn ready(def: ComponentDef) -> Self {
        Self::with_state(LazyState::Ready(def))
    }

    fn with_state(state: LazyState) -> Self {
        Self(Rc::new(LazyInner {
            state: RefCell::new(state),
            waiters: RefCell::new(Vec::new()),
        }))
    }

    pub fn status(&self) -> LazyStatus {
        match &*self.0.state.borrow() {
            LazyState::Idle(_) | LazyState::Loading => LazyStatus::Pending,
            LazyState::Ready(def) => LazyStatus::Ready(def.clone()),
            LazyState::Failed(error) => LazyStatus::Failed(error.clone()),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(&*self.0.state.borrow(), LazyState::Loading)
    }

    /// Take the load future if nobody started it yet.
    pub(crate) fn start(&self) -> Option<LoadFuture> {
        let mut state = self.0.state.borrow_mut();
        let LazyState::Idle(loader) = &mut *state else {
            return None;
        };
        let loader = loader.take()?;
        *state = LazyState::Loading;
        drop(state);
        Some(loader())
    }

    /// Run `f` once the load settles.
    pub(crate) fn on_settled(&self, f: Box<dyn FnOnce()>) {
        self.0.waiters.borrow_mut().push(f);
    }

    /// Store the outcome and hand back the continuations waiting for it.
    pub(crate) fn settle(&self, result: Result<ComponentDef, LoadError>) -> Vec<Box<dyn FnOnce()>> {
        *self.0.state.borrow_mut() = match result {
            Ok(def) => LazyState::Ready(def),
            Err(error) => LazyState::Failed(error),
        };
        std::mem::take(&mut *self.0.waiters.borrow_mut())
    }

    pub fn ptr_eq(&self, other: &LazyComponent) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for LazyComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &*self.0.state.borrow() {
            LazyState::Idle(_) => "idle",
            LazyState::Loading => "loading",
            LazyState::Ready(_) => "ready",
            LazyState::Failed(_) => "failed",
        };
        f.debug_tuple("LazyComponent").field(&status).finish()
    }
}
