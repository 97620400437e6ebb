//! Testing utilities and headless harness for Weave

pub mod testing;

pub use testing::*;
pub use weave_macros::{component, html};

pub mod prelude {
    pub use crate::testing::*;
    pub use weave_core::{
        Callback, Cleanup, ComponentDef, ContextKey, Event, LazyComponent, LifecycleState, LoadError,
        NodeId, RenderError, RenderScope, TemplateDescription, Value,
    };
    pub use weave_macros::{component, html};
}
