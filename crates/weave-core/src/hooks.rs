//! Per-instance hook slots and the stateful primitives built on them.
//!
//! Slot identity is positional: the Nth hook call of a render reads slot N.
//! Calling hooks in a different order between renders is a caller error; a
//! slot whose kind or type no longer matches is dropped together with every
//! slot after it and recreated.

use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::dom::Event;
use crate::hash::hash_one;
use crate::instance::Instance;
use crate::owned::Owned;
use crate::runtime::RuntimeHandle;
use crate::scope::RenderScope;
use crate::value::{Callback, NodeRef};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HookKind {
    State,
    Reducer,
    Effect,
    Memo,
    Ref,
    Context,
}

struct HookSlot {
    kind: HookKind,
    value: Box<dyn Any>,
}

#[derive(Default)]
pub(crate) struct HookStore {
    slots: Vec<HookSlot>,
    cursor: usize,
}

impl HookStore {
    pub(crate) fn reset(&mut self) {
        self.cursor = 0;
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Claim the slot at the cursor, creating it with `init` on first use.
    ///
    /// Returns a handle sharing the slot's value.
    pub(crate) fn slot<T: 'static>(&mut self, kind: HookKind, init: impl FnOnce() -> T) -> Owned<T> {
        let cursor = self.cursor;
        self.cursor += 1;
        if let Some(slot) = self.slots.get(cursor) {
            if slot.kind == kind {
                if let Some(existing) = slot.value.downcast_ref::<Owned<T>>() {
                    return existing.clone();
                }
            }
            log::warn!(
                "hook {cursor} changed from {:?} to {kind:?}; dropping {} slots",
                slot.kind,
                self.slots.len() - cursor
            );
            self.slots.truncate(cursor);
        }
        let value = Owned::new(init());
        self.slots.push(HookSlot {
            kind,
            value: Box::new(value.clone()),
        });
        value
    }

    /// Drop every slot in declaration order, running effect cleanups.
    pub(crate) fn dispose(&mut self) {
        self.cursor = 0;
        for slot in std::mem::take(&mut self.slots) {
            drop(slot);
        }
    }
}

/// Requests a render of the instance that created it.
#[derive(Clone)]
pub(crate) struct RenderRequester {
    instance: Weak<Instance>,
    runtime: RuntimeHandle,
}

impl RenderRequester {
    pub(crate) fn new(instance: Weak<Instance>, runtime: RuntimeHandle) -> Self {
        Self { instance, runtime }
    }

    pub(crate) fn request(&self) {
        if let Some(instance) = self.instance.upgrade() {
            self.runtime.request_render(&instance);
        }
    }
}

/// Writes a state slot; a write that changes the value requests a render.
pub struct Setter<T> {
    cell: Owned<T>,
    requester: RenderRequester,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            requester: self.requester.clone(),
        }
    }
}

impl<T: PartialEq + 'static> Setter<T> {
    pub fn set(&self, value: T) {
        let changed = self.cell.with(|current| *current != value);
        if changed {
            self.cell.replace(value);
            self.requester.request();
        }
    }

    /// Derive the next value from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = self.cell.with(f);
        self.set(next);
    }
}

impl<T: Clone> Setter<T> {
    /// Value as of the latest write, which may be newer than the rendered one.
    pub fn get(&self) -> T {
        self.cell.get()
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Setter")
    }
}

/// Sends actions to a reducer slot.
pub struct Dispatch<A>(Rc<dyn Fn(A)>);

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<A> Dispatch<A> {
    pub fn dispatch(&self, action: A) {
        (self.0)(action)
    }
}

/// Teardown returned by an effect, run before the effect runs again or on disconnection.
#[derive(Default)]
pub struct Cleanup(Option<Box<dyn FnOnce()>>);

impl Cleanup {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    fn run(self) {
        if let Some(f) = self.0 {
            f();
        }
    }
}

struct EffectSlot {
    deps: Option<u64>,
    cleanup: Owned<Cleanup>,
}

impl Drop for EffectSlot {
    fn drop(&mut self) {
        self.cleanup.replace(Cleanup::none()).run();
    }
}

/// An effect queued to run after its render commits.
pub(crate) struct PendingEffect {
    cleanup: Owned<Cleanup>,
    effect: Box<dyn FnOnce() -> Cleanup>,
}

impl PendingEffect {
    pub(crate) fn run(self) {
        self.cleanup.replace(Cleanup::none()).run();
        let next = (self.effect)();
        self.cleanup.replace(next);
    }
}

struct MemoSlot<T> {
    deps: u64,
    value: T,
}

struct ReducerSlot<S, A> {
    state: Owned<S>,
    dispatch: Dispatch<A>,
}

impl RenderScope<'_> {
    fn requester(&self) -> RenderRequester {
        RenderRequester::new(Rc::downgrade(self.instance), self.runtime_handle())
    }

    /// Local state. The setter compares with `PartialEq` and skips equal writes.
    pub fn use_state<T: Clone + PartialEq + 'static>(&mut self, init: impl FnOnce() -> T) -> (T, Setter<T>) {
        let requester = self.requester();
        let cell = self.hooks.slot(HookKind::State, init);
        let value = cell.get();
        (value, Setter { cell, requester })
    }

    /// State advanced by `reducer`. The reducer of the first render is kept.
    pub fn use_reducer<S, A>(
        &mut self,
        reducer: impl Fn(&S, A) -> S + 'static,
        init: impl FnOnce() -> S,
    ) -> (S, Dispatch<A>)
    where
        S: Clone + PartialEq + 'static,
        A: 'static,
    {
        let requester = self.requester();
        let slot = self.hooks.slot(HookKind::Reducer, || {
            let state = Owned::new(init());
            let cell = state.clone();
            let dispatch = Dispatch(Rc::new(move |action: A| {
                let next = cell.with(|current| reducer(current, action));
                let changed = cell.with(|current| *current != next);
                if changed {
                    cell.replace(next);
                    requester.request();
                }
            }));
            ReducerSlot { state, dispatch }
        });
        slot.with(|slot| (slot.state.get(), slot.dispatch.clone()))
    }

    /// Run `effect` after this render commits when `deps` hash differently than last time.
    pub fn use_effect<D: Hash>(&mut self, deps: D, effect: impl FnOnce() -> Cleanup + 'static) {
        self.effect(Some(hash_one(&deps)), Box::new(effect));
    }

    /// Run `effect` after every render.
    pub fn use_effect_always(&mut self, effect: impl FnOnce() -> Cleanup + 'static) {
        self.effect(None, Box::new(effect));
    }

    fn effect(&mut self, deps: Option<u64>, effect: Box<dyn FnOnce() -> Cleanup>) {
        let mut first = false;
        let slot = self.hooks.slot(HookKind::Effect, || {
            first = true;
            EffectSlot {
                deps,
                cleanup: Owned::new(Cleanup::none()),
            }
        });
        let due = slot.update(|slot| {
            let due = first || deps.is_none() || slot.deps != deps;
            slot.deps = deps;
            due.then(|| slot.cleanup.clone())
        });
        if let Some(cleanup) = due {
            self.effects.push(PendingEffect { cleanup, effect });
        }
    }

    /// Cache `compute()` until `deps` change.
    pub fn use_memo<D: Hash, T: Clone + 'static>(&mut self, deps: D, compute: impl FnOnce() -> T) -> T {
        let key = hash_one(&deps);
        let slot = self.hooks.slot(HookKind::Memo, || None::<MemoSlot<T>>);
        let cached = slot.with(|memo| {
            memo.as_ref()
                .filter(|memo| memo.deps == key)
                .map(|memo| memo.value.clone())
        });
        if let Some(value) = cached {
            return value;
        }
        let value = compute();
        slot.replace(Some(MemoSlot {
            deps: key,
            value: value.clone(),
        }));
        value
    }

    /// A callback that keeps its identity until `deps` change.
    pub fn use_callback<D: Hash>(&mut self, deps: D, f: impl Fn(&Event) + 'static) -> Callback {
        self.use_memo(deps, || Callback::new(f))
    }

    /// Mutable storage that survives renders without requesting them.
    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Owned<T> {
        self.hooks.slot(HookKind::Ref, init)
    }

    /// A [`NodeRef`] to hand to a `ref` attribute.
    pub fn use_node_ref(&mut self) -> NodeRef {
        self.hooks.slot(HookKind::Ref, NodeRef::new).get()
    }
}
