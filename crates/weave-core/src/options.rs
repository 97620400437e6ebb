use std::fmt;
use std::rc::Rc;

use crate::template::TemplateDescription;
use crate::NodeId;

/// Identity of a failing element and the error it raised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorInfo {
    pub tag: String,
    pub host: NodeId,
    pub message: String,
}

pub type ErrorPresenter = Rc<dyn Fn(&ErrorInfo) -> TemplateDescription>;

#[derive(Clone)]
pub struct RuntimeOptions {
    /// Content shown in place of a component that failed to render or load.
    pub error_presenter: ErrorPresenter,
    /// Log the structure and dependencies of every compiled template.
    pub debug_templates: bool,
    /// Upper bound on records, microtasks and task polls handled by one flush.
    pub max_flush_steps: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            error_presenter: Rc::new(default_error_presenter),
            debug_templates: std::env::var("WEAVE_DEBUG").is_ok(),
            max_flush_steps: 100_000,
        }
    }
}

impl fmt::Debug for RuntimeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeOptions")
            .field("debug_templates", &self.debug_templates)
            .field("max_flush_steps", &self.max_flush_steps)
            .finish_non_exhaustive()
    }
}

static ERROR_PANEL: &[&str] = &[
    "<div class=\"weave-error\" role=\"alert\"><strong>&lt;",
    "&gt;</strong> ",
    "</div>",
];

/// Inline alert naming the failing element.
pub fn default_error_presenter(info: &ErrorInfo) -> TemplateDescription {
    TemplateDescription::new(
        ERROR_PANEL,
        vec![info.tag.as_str().into(), info.message.as_str().into()],
    )
}
