use std::cell::{Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_task::ArcWake;

use crate::collections::map::{HashMap, HashSet};
use crate::component::{ComponentDef, DefineError, Registry};
use crate::dom::{Document, Event, LifecycleRecord};
use crate::error::{DomError, LoadError};
use crate::hooks::PendingEffect;
use crate::instance::Instance;
use crate::lifecycle::{CancelToken, LifecycleState};
use crate::options::{ErrorInfo, RuntimeOptions};
use crate::platform::RuntimeScheduler;
use crate::reconcile::ComponentHost;
use crate::suspense::{LazyComponent, SuspenseBoundary};
use crate::template::{TemplateCache, TemplateDescription};
use crate::value::CapturedChildren;
use crate::NodeId;

type LocalFuture = Pin<Box<dyn Future<Output = ()>>>;

pub(crate) enum Microtask {
    Render(Weak<Instance>),
    Effects(Weak<Instance>, Vec<PendingEffect>),
    DisconnectCheck(Weak<Instance>, CancelToken),
    Run(Box<dyn FnOnce()>),
}

struct Task {
    future: LocalFuture,
    /// Tasks bound to an instance are dropped once it is torn down.
    owner: Option<Weak<Instance>>,
}

impl Task {
    fn is_stale(&self) -> bool {
        match &self.owner {
            None => false,
            Some(owner) => owner
                .upgrade()
                .map_or(true, |owner| owner.state() == LifecycleState::Disconnected),
        }
    }
}

/// Waker shared by all runtime tasks: remembers the wake and asks for a flush.
struct TaskWake {
    woken: AtomicBool,
    scheduler: Arc<dyn RuntimeScheduler>,
}

impl ArcWake for TaskWake {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::SeqCst);
        arc_self.scheduler.request_flush();
    }
}

pub(crate) struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    pub(crate) options: RuntimeOptions,
    pub(crate) document: RefCell<Document>,
    pub(crate) templates: RefCell<TemplateCache>,
    registry: RefCell<Registry>,
    instances: RefCell<HashMap<NodeId, Rc<Instance>>>,
    microtasks: RefCell<VecDeque<Microtask>>,
    tasks: RefCell<Vec<Task>>,
    boundaries: RefCell<HashMap<NodeId, Rc<dyn SuspenseBoundary>>>,
    pending: RefCell<HashMap<NodeId, Rc<dyn SuspenseBoundary>>>,
    upgrades: RefCell<Vec<NodeId>>,
    wake: Arc<TaskWake>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>, options: RuntimeOptions) -> Self {
        let wake = Arc::new(TaskWake {
            woken: AtomicBool::new(false),
            scheduler: Arc::clone(&scheduler),
        });
        Self {
            scheduler,
            templates: RefCell::new(TemplateCache::with_debug(options.debug_templates)),
            options,
            document: RefCell::new(Document::new()),
            registry: RefCell::new(Registry::default()),
            instances: RefCell::new(HashMap::new()),
            microtasks: RefCell::new(VecDeque::new()),
            tasks: RefCell::new(Vec::new()),
            boundaries: RefCell::new(HashMap::new()),
            pending: RefCell::new(HashMap::new()),
            upgrades: RefCell::new(Vec::new()),
            wake,
        }
    }

    pub(crate) fn queue(&self, task: Microtask) {
        self.microtasks.borrow_mut().push_back(task);
        self.scheduler.request_flush();
    }

    pub(crate) fn spawn_owned(&self, future: LocalFuture, owner: Option<Weak<Instance>>) {
        self.tasks.borrow_mut().push(Task { future, owner });
        self.scheduler.request_flush();
    }

    /// Queue a render of `instance` unless one is already pending.
    pub(crate) fn request_render(&self, instance: &Rc<Instance>) {
        if !instance.state().is_live() {
            return;
        }
        if instance.pending_render.replace(true) {
            return;
        }
        self.queue(Microtask::Render(Rc::downgrade(instance)));
    }

    fn instance(&self, host: NodeId) -> Option<Rc<Instance>> {
        self.instances.borrow().get(&host).cloned()
    }

    /// Nearest ancestor instance of `host` publishing `key`.
    pub(crate) fn find_provider(&self, host: NodeId, key: usize) -> Option<Rc<Instance>> {
        let ancestors = self.document.borrow().ancestors(host);
        let instances = self.instances.borrow();
        ancestors
            .into_iter()
            .filter_map(|ancestor| instances.get(&ancestor))
            .find(|instance| instance.provides(key))
            .cloned()
    }

    fn boundary_for(&self, doc: &Document, node: NodeId) -> Option<Rc<dyn SuspenseBoundary>> {
        let boundaries = self.boundaries.borrow();
        std::iter::once(node)
            .chain(doc.ancestors(node))
            .find_map(|candidate| boundaries.get(&candidate).cloned())
    }

    fn process_records(self: &Rc<Self>) -> usize {
        let mut records = self.document.borrow_mut().take_records();
        records.extend(
            self.upgrades
                .borrow_mut()
                .drain(..)
                .map(LifecycleRecord::Connected),
        );
        let count = records.len();
        // First renders already saw every attribute change of their batch.
        let mut fresh = HashSet::new();
        for record in records {
            match record {
                LifecycleRecord::Connected(node) => {
                    if self.connected(node) {
                        fresh.insert(node);
                    }
                }
                LifecycleRecord::Disconnected(node) => self.disconnected(node),
                LifecycleRecord::AttributeChanged { node, name } => {
                    if fresh.contains(&node) {
                        continue;
                    }
                    if let Some(instance) = self.instance(node) {
                        if instance.state() == LifecycleState::Idle {
                            log::trace!("<{}> #{node}: prop {name} changed", instance.def.tag());
                            self.request_render(&instance);
                        }
                    }
                }
            }
        }
        count
    }

    /// Returns true when `node` got a new instance.
    fn connected(self: &Rc<Self>, node: NodeId) -> bool {
        if !self.document.borrow().is_connected(node) {
            return false;
        }
        if let Some(instance) = self.instance(node) {
            if instance.state() == LifecycleState::Moved {
                self.moved(&instance);
            }
            return false;
        }
        let def = {
            let doc = self.document.borrow();
            let Ok(tag) = doc.tag_name(node) else {
                return false;
            };
            self.registry.borrow().get(tag).cloned()
        };
        match def {
            Some(def) => {
                self.connect(node, def);
                true
            }
            None => false,
        }
    }

    fn connect(self: &Rc<Self>, node: NodeId, def: ComponentDef) {
        let instance = Rc::new(Instance::new(node, def));
        instance.transition(LifecycleState::Connecting);
        log::debug!("<{}> #{node} connected", instance.def.tag());
        self.instances
            .borrow_mut()
            .insert(node, Rc::clone(&instance));

        if let Err(err) = self.capture_children(&instance) {
            log::error!("<{}> #{node}: cannot capture children: {err}", instance.def.tag());
        }
        instance.render(self);
    }

    fn capture_children(&self, instance: &Instance) -> Result<(), DomError> {
        let mut doc = self.document.borrow_mut();
        let children = doc.children(instance.host)?.to_vec();
        for &child in &children {
            doc.pin(child)?;
            doc.detach(child)?;
        }
        instance.set_captured_children(CapturedChildren::new(children));
        Ok(())
    }

    fn moved(self: &Rc<Self>, instance: &Rc<Instance>) {
        instance.cancel_disconnect();
        instance.generation.set(instance.generation.get() + 1);
        instance.transition(LifecycleState::Idle);
        log::debug!("<{}> #{} moved", instance.def.tag(), instance.host);
        if instance.pending_render.get() {
            self.queue(Microtask::Render(Rc::downgrade(instance)));
        } else if instance.uses_context.get() {
            self.request_render(instance);
        }
    }

    fn disconnected(self: &Rc<Self>, node: NodeId) {
        let Some(instance) = self.instance(node) else {
            return;
        };
        if !instance.state().is_live() || instance.state() == LifecycleState::Moved {
            return;
        }
        instance.transition(LifecycleState::Moved);
        let token = instance.arm_disconnect();
        self.queue(Microtask::DisconnectCheck(Rc::downgrade(&instance), token));
    }

    fn run(self: &Rc<Self>, task: Microtask) {
        match task {
            Microtask::Render(instance) => {
                let Some(instance) = instance.upgrade() else {
                    return;
                };
                match instance.state() {
                    LifecycleState::Idle if instance.pending_render.get() => instance.render(self),
                    LifecycleState::Disconnected => log::trace!(
                        "dropping render of torn down <{}> #{}",
                        instance.def.tag(),
                        instance.host
                    ),
                    _ => {}
                }
            }
            Microtask::Effects(instance, effects) => {
                let live = instance
                    .upgrade()
                    .is_some_and(|instance| instance.state() != LifecycleState::Disconnected);
                if live {
                    for effect in effects {
                        effect.run();
                    }
                }
            }
            Microtask::DisconnectCheck(instance, token) => {
                if token.is_cancelled() {
                    return;
                }
                let Some(instance) = instance.upgrade() else {
                    return;
                };
                if self.document.borrow().is_connected(instance.host) {
                    self.moved(&instance);
                } else {
                    self.teardown(&instance);
                }
            }
            Microtask::Run(f) => f(),
        }
    }

    fn teardown(&self, instance: &Rc<Instance>) {
        log::debug!("<{}> #{} disconnected", instance.def.tag(), instance.host);
        self.instances.borrow_mut().remove(&instance.host);
        instance.teardown();
        {
            let doc = self.document.borrow();
            self.pending
                .borrow_mut()
                .retain(|&node, _| doc.is_connected(node));
        }
        if let Some(children) = instance.captured_children() {
            let mut doc = self.document.borrow_mut();
            for &child in children.nodes() {
                if doc.unpin(child).is_ok() && doc.parent(child).is_none() {
                    let _ = doc.remove(child);
                }
            }
        }
    }

    /// Poll every task once. True when any task finished, was dropped or woke up.
    fn poll_tasks(&self) -> bool {
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        if tasks.is_empty() {
            return false;
        }
        self.wake.woken.store(false, Ordering::SeqCst);
        let waker = futures_task::waker(Arc::clone(&self.wake));
        let mut cx = Context::from_waker(&waker);
        let mut progressed = false;
        let mut waiting = Vec::with_capacity(tasks.len());
        for mut task in tasks {
            if task.is_stale() {
                log::warn!("discarding task of a disconnected instance");
                progressed = true;
                continue;
            }
            match task.future.as_mut().poll(&mut cx) {
                Poll::Ready(()) => progressed = true,
                Poll::Pending => waiting.push(task),
            }
        }
        let mut queue = self.tasks.borrow_mut();
        let spawned = std::mem::take(&mut *queue);
        progressed |= !spawned.is_empty();
        *queue = waiting;
        queue.extend(spawned);
        progressed || self.wake.woken.load(Ordering::SeqCst)
    }
}

/// Component host used while patching on behalf of `owner`.
pub(crate) struct InstanceHost<'a> {
    runtime: &'a Rc<RuntimeInner>,
    owner: Weak<Instance>,
}

impl<'a> InstanceHost<'a> {
    pub(crate) fn new(runtime: &'a Rc<RuntimeInner>, owner: Weak<Instance>) -> Self {
        Self { runtime, owner }
    }
}

impl ComponentHost for InstanceHost<'_> {
    fn define(&self, def: &ComponentDef) {
        let mut registry = self.runtime.registry.borrow_mut();
        if registry.get(def.tag()).is_some_and(|known| known.ptr_eq(def)) {
            return;
        }
        if let Err(err) = registry.define(def.clone()) {
            log::warn!("{err}; keeping the first definition");
        }
    }

    fn suspend(&self, doc: &mut Document, placeholder: NodeId, lazy: &LazyComponent) {
        let scope = self.owner.upgrade().map_or(placeholder, |owner| owner.host);
        if let Some(boundary) = self.runtime.boundary_for(doc, scope) {
            boundary.register_pending(doc, placeholder);
            self.runtime
                .pending
                .borrow_mut()
                .insert(placeholder, boundary);
        }

        let runtime = Rc::downgrade(self.runtime);
        let owner = self.owner.clone();
        lazy.on_settled(Box::new(move || {
            let Some(runtime) = runtime.upgrade() else {
                return;
            };
            let owner = owner
                .upgrade()
                .filter(|owner| owner.state().is_live());
            let connected = runtime.document.borrow().is_connected(placeholder);
            match owner {
                Some(owner) if connected => runtime.request_render(&owner),
                _ => {
                    log::warn!("discarding lazy component for detached node {placeholder}");
                    runtime.pending.borrow_mut().remove(&placeholder);
                }
            }
        }));

        if let Some(load) = lazy.start() {
            let lazy = lazy.clone();
            self.runtime.spawn_owned(
                Box::pin(async move {
                    let result = load.await;
                    if let Err(err) = &result {
                        log::error!("{err}");
                    }
                    for waiter in lazy.settle(result) {
                        waiter();
                    }
                }),
                None,
            );
        }
    }

    fn resolve(&self, doc: &mut Document, placeholder: NodeId, replacement: NodeId) {
        let boundary = self.runtime.pending.borrow_mut().remove(&placeholder);
        if let Some(boundary) = boundary {
            boundary.resolve_pending(doc, placeholder, replacement);
        }
    }

    fn take_children(&self, node: NodeId) -> Option<CapturedChildren> {
        let instance = self.runtime.instance(node)?;
        log::trace!("<{}> #{node}: handing captured children to its replacement", instance.def.tag());
        Some(instance.take_captured_children().unwrap_or_else(|| CapturedChildren::new(Vec::new())))
    }

    fn load_error(&self, placeholder: NodeId, error: &LoadError) -> TemplateDescription {
        (self.runtime.options.error_presenter)(&ErrorInfo {
            tag: "lazy component".to_owned(),
            host: placeholder,
            message: error.to_string(),
        })
    }
}

/// Owns the document, component registry, template cache and every live instance.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self::with_options(scheduler, RuntimeOptions::default())
    }

    pub fn with_options(scheduler: Arc<dyn RuntimeScheduler>, options: RuntimeOptions) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler, options)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.inner.options
    }

    /// Register a component. Connected elements with its tag are upgraded on the next flush.
    pub fn define(&self, def: ComponentDef) -> Result<(), DefineError> {
        let tag = def.tag().to_owned();
        self.inner.registry.borrow_mut().define(def)?;
        let doc = self.inner.document.borrow();
        let instances = self.inner.instances.borrow();
        let waiting: Vec<NodeId> = doc
            .find_all_by_tag(doc.root(), &tag)
            .into_iter()
            .filter(|node| !instances.contains_key(node))
            .collect();
        if !waiting.is_empty() {
            self.inner.upgrades.borrow_mut().extend(waiting);
            self.inner.scheduler.request_flush();
        }
        Ok(())
    }

    pub fn is_defined(&self, tag: &str) -> bool {
        self.inner.registry.borrow().contains(tag)
    }

    pub fn document(&self) -> Ref<'_, Document> {
        self.inner.document.borrow()
    }

    /// Mutable access to the host tree. Lifecycle reactions run on the next flush.
    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.inner.scheduler.request_flush();
        self.inner.document.borrow_mut()
    }

    pub fn root(&self) -> NodeId {
        self.inner.document.borrow().root()
    }

    /// Create an element with `tag` and append it to `parent`.
    pub fn mount(&self, parent: NodeId, tag: &str) -> Result<NodeId, DomError> {
        let mut doc = self.document_mut();
        let node = doc.create_element(tag);
        doc.append_child(parent, node)?;
        Ok(node)
    }

    /// Attach a suspense boundary to `node`; lazy tags below it report there.
    pub fn set_suspense_boundary(&self, node: NodeId, boundary: Rc<dyn SuspenseBoundary>) {
        self.inner.boundaries.borrow_mut().insert(node, boundary);
    }

    /// Deliver `event` to the listeners of its target.
    pub fn dispatch_event(&self, event: &Event) -> Result<usize, DomError> {
        let listeners = {
            let doc = self.inner.document.borrow();
            if !doc.contains(event.target) {
                return Err(DomError::Missing { id: event.target });
            }
            doc.listeners(event.target, &event.name)
        };
        for listener in &listeners {
            listener.call(event);
        }
        Ok(listeners.len())
    }

    /// Run lifecycle reactions, microtasks and ready tasks until nothing is left.
    ///
    /// Returns the number of steps taken.
    pub fn flush(&self) -> usize {
        let inner = &self.inner;
        let mut steps = 0;
        loop {
            if steps >= inner.options.max_flush_steps {
                log::warn!("flush stopped after {steps} steps with work still queued");
                break;
            }
            let records = inner.process_records();
            if records > 0 {
                steps += records;
                continue;
            }
            let next = inner.microtasks.borrow_mut().pop_front();
            if let Some(task) = next {
                inner.run(task);
                steps += 1;
                continue;
            }
            if inner.poll_tasks() {
                steps += 1;
                continue;
            }
            break;
        }
        log::trace!("flush finished after {steps} steps");
        steps
    }

    /// Nothing queued that a flush would act on right now.
    pub fn is_idle(&self) -> bool {
        !self.inner.document.borrow().has_records()
            && self.inner.upgrades.borrow().is_empty()
            && self.inner.microtasks.borrow().is_empty()
            && !self.inner.wake.woken.load(Ordering::SeqCst)
    }

    pub fn pending_tasks(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.inner.spawn_owned(Box::pin(future), None);
    }

    pub fn queue_microtask(&self, f: impl FnOnce() + 'static) {
        self.inner.queue(Microtask::Run(Box::new(f)));
    }

    pub fn lifecycle_state(&self, host: NodeId) -> Option<LifecycleState> {
        self.inner.instance(host).map(|instance| instance.state())
    }

    /// Number of completed renders of the instance on `host`.
    pub fn render_count(&self, host: NodeId) -> Option<u64> {
        self.inner.instance(host).map(|instance| instance.render_count())
    }

    pub fn instance_count(&self) -> usize {
        self.inner.instances.borrow().len()
    }

    /// Consumers currently subscribed to contexts provided on `host`.
    pub fn subscriber_count(&self, host: NodeId) -> usize {
        self.inner
            .instance(host)
            .map_or(0, |instance| instance.subscriber_count())
    }

    pub fn template_count(&self) -> usize {
        self.inner.templates.borrow().len()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Arc::new(DefaultScheduler))
    }
}

/// Weak handle for code that must not keep the runtime alive.
#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub(crate) fn new(inner: Weak<RuntimeInner>) -> Self {
        Self(inner)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        if let Some(inner) = self.0.upgrade() {
            inner.spawn_owned(Box::pin(future), None);
        }
    }

    pub fn queue_microtask(&self, f: impl FnOnce() + 'static) {
        if let Some(inner) = self.0.upgrade() {
            inner.queue(Microtask::Run(Box::new(f)));
        }
    }

    pub fn request_flush(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.scheduler.request_flush();
        }
    }

    pub(crate) fn request_render(&self, instance: &Rc<Instance>) {
        if let Some(inner) = self.0.upgrade() {
            inner.request_render(instance);
        }
    }
}

/// Scheduler for hosts that call [`Runtime::flush`] on their own.
#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn request_flush(&self) {}
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
