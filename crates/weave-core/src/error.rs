use std::fmt;

use crate::NodeId;

/// Failure while compiling a template description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A hole sits somewhere a binding cannot be attached, e.g. inside a comment.
    UnplaceableHole { index: usize, context: &'static str },
    /// The number of values does not match the number of holes.
    ArityMismatch { holes: usize, values: usize },
    /// A closing tag hole appeared without an open dynamic tag.
    UnpairedTagHole { index: usize },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::UnplaceableHole { index, context } => {
                write!(f, "hole {index} cannot be bound inside {context}")
            }
            TemplateError::ArityMismatch { holes, values } => {
                write!(f, "template has {holes} holes but {values} values were supplied")
            }
            TemplateError::UnpairedTagHole { index } => {
                write!(f, "closing tag hole {index} has no matching opening tag hole")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Failure reported by the host [`Document`](crate::dom::Document).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    Missing { id: NodeId },
    NotAnElement { id: NodeId },
    NotAContainer { id: NodeId },
    NotAChild { parent: NodeId, child: NodeId },
    HierarchyRequest { parent: NodeId, child: NodeId },
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::Missing { id } => write!(f, "node {id} missing"),
            DomError::NotAnElement { id } => write!(f, "node {id} is not an element"),
            DomError::NotAContainer { id } => write!(f, "node {id} cannot hold children"),
            DomError::NotAChild { parent, child } => {
                write!(f, "node {child} is not a child of {parent}")
            }
            DomError::HierarchyRequest { parent, child } => {
                write!(f, "cannot insert node {child} into {parent}")
            }
        }
    }
}

impl std::error::Error for DomError {}

/// Failure while applying values to a template instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    Dom(DomError),
    Template(TemplateError),
    ArityMismatch { bindings: usize, values: usize },
    UnsupportedValue { kind: &'static str, binding: &'static str },
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchError::Dom(err) => write!(f, "host tree: {err}"),
            PatchError::Template(err) => write!(f, "template: {err}"),
            PatchError::ArityMismatch { bindings, values } => {
                write!(f, "instance has {bindings} bindings but {values} values were supplied")
            }
            PatchError::UnsupportedValue { kind, binding } => {
                write!(f, "{kind} value cannot be applied to a {binding} binding")
            }
        }
    }
}

impl std::error::Error for PatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PatchError::Dom(err) => Some(err),
            PatchError::Template(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DomError> for PatchError {
    fn from(err: DomError) -> Self {
        PatchError::Dom(err)
    }
}

impl From<TemplateError> for PatchError {
    fn from(err: TemplateError) -> Self {
        PatchError::Template(err)
    }
}

/// Failure raised while a component renders.
#[derive(Debug)]
pub struct RenderError {
    message: String,
    source: Option<Box<dyn std::error::Error + 'static>>,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref()
    }
}

impl From<PatchError> for RenderError {
    fn from(err: PatchError) -> Self {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<TemplateError> for RenderError {
    fn from(err: TemplateError) -> Self {
        PatchError::Template(err).into()
    }
}

impl From<DomError> for RenderError {
    fn from(err: DomError) -> Self {
        PatchError::Dom(err).into()
    }
}

/// Failure while resolving a lazily loaded component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    message: String,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component failed to load: {}", self.message)
    }
}

impl std::error::Error for LoadError {}
