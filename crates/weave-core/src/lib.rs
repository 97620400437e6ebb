#![doc = r"Template compilation, instantiation and reconciliation for custom-element components."]

extern crate self as weave_core;

pub mod binding;
pub mod collections;
mod component;
mod context;
pub mod dom;
mod error;
pub mod hash;
mod hooks;
mod instance;
mod instantiate;
mod lifecycle;
mod options;
pub mod owned;
pub mod platform;
pub mod reconcile;
pub mod runtime;
mod scope;
pub mod suspense;
pub mod template;
mod value;

pub use binding::{Binding, NodeBinding};
pub use component::{ComponentDef, DefineError, Registry, Styles};
pub use context::ContextKey;
pub use dom::{Document, Event, LifecycleRecord, Listener, NodeKind};
pub use error::{DomError, LoadError, PatchError, RenderError, TemplateError};
pub use hooks::{Cleanup, Dispatch, Setter};
pub use instantiate::instantiate;
pub use lifecycle::{CancelToken, LifecycleState};
pub use options::{default_error_presenter, ErrorInfo, ErrorPresenter, RuntimeOptions};
pub use owned::Owned;
pub use platform::RuntimeScheduler;
pub use reconcile::{patch, ComponentHost, PatchContext};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use scope::RenderScope;
pub use suspense::{LazyComponent, LazyStatus, LoadFuture, SuspenseBoundary};
pub use template::{compile, CompiledTemplate, Statics, TemplateCache, TemplateDescription, TemplateKey};
pub use value::{Callback, CapturedChildren, NodeRef, Value};

pub type NodeId = usize;
