//! Values published by an ancestor instance and read by descendants.

use std::any::Any;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::hooks::HookKind;
use crate::instance::Instance;
use crate::scope::RenderScope;

static NEXT_CONTEXT_KEY: AtomicUsize = AtomicUsize::new(1);

/// Identity of one context value type.
pub struct ContextKey<T> {
    id: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    pub fn new() -> Self {
        Self {
            id: NEXT_CONTEXT_KEY.fetch_add(1, Ordering::Relaxed),
            _marker: PhantomData,
        }
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

impl<T> Default for ContextKey<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Membership of a consumer in a provider's subscriber set; leaves it on drop.
struct Subscription {
    provider: Weak<Instance>,
    subscriber: Weak<Instance>,
    key: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.upgrade() {
            provider.unsubscribe(self.key, &self.subscriber);
        }
    }
}

#[derive(Default)]
struct ContextSlot {
    key: usize,
    generation: u64,
    subscription: Option<Subscription>,
}

impl ContextSlot {
    fn provider(&self) -> Option<Rc<Instance>> {
        self.subscription.as_ref()?.provider.upgrade()
    }
}

impl RenderScope<'_> {
    /// Publish `value` to descendants. A changed value re-renders subscribers.
    pub fn provide<T: Clone + PartialEq + 'static>(&mut self, key: &ContextKey<T>, value: T) {
        let changed = self.instance.provide(key.id(), Rc::new(value.clone()) as Rc<dyn Any>, |current| {
            current
                .downcast_ref::<T>()
                .map_or(true, |current| *current != value)
        });
        if changed {
            for subscriber in self.instance.subscribers(key.id()) {
                self.runtime.request_render(&subscriber);
            }
        }
    }

    /// Value published by the nearest ancestor providing `key`.
    ///
    /// The provider is cached in the slot and looked up again after the host moves.
    pub fn use_context<T: Clone + 'static>(&mut self, key: &ContextKey<T>) -> Option<T> {
        self.instance.uses_context.set(true);
        let generation = self.instance.generation.get();
        let instance = Rc::clone(self.instance);
        let runtime = Rc::clone(self.runtime);
        let slot = self.hooks.slot(HookKind::Context, ContextSlot::default);
        let provider = slot.update(|slot| {
            let stale = slot.key != key.id()
                || slot.generation != generation
                || slot.provider().map_or(true, |p| !p.state().is_live());
            if stale {
                let provider = runtime.find_provider(instance.host, key.id());
                let unchanged = match (&provider, slot.provider()) {
                    (Some(next), Some(current)) => Rc::ptr_eq(next, &current),
                    _ => false,
                };
                if !unchanged {
                    slot.subscription = provider.as_ref().map(|provider| {
                        provider.subscribe(key.id(), Rc::downgrade(&instance));
                        Subscription {
                            provider: Rc::downgrade(provider),
                            subscriber: Rc::downgrade(&instance),
                            key: key.id(),
                        }
                    });
                }
                slot.key = key.id();
                slot.generation = generation;
            }
            slot.provider()
        });
        provider?.provided::<T>(key.id())
    }
}
