use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::collections::map::HashMap;
use crate::dom::is_custom_tag;
use crate::error::RenderError;
use crate::scope::RenderScope;
use crate::template::TemplateDescription;

/// Class name to scoped class name, supplied by an external stylesheet scoper.
pub type Styles = IndexMap<String, String>;

type RenderFn = dyn Fn(&mut RenderScope<'_>) -> Result<TemplateDescription, RenderError>;

struct ComponentInner {
    tag: String,
    render: Box<RenderFn>,
    styles: Option<Rc<Styles>>,
}

/// A component definition: a custom tag bound to a render function.
#[derive(Clone)]
pub struct ComponentDef(Rc<ComponentInner>);

impl ComponentDef {
    pub fn new(
        tag: impl Into<String>,
        render: impl Fn(&mut RenderScope<'_>) -> Result<TemplateDescription, RenderError> + 'static,
    ) -> Self {
        Self(Rc::new(ComponentInner {
            tag: tag.into().to_ascii_lowercase(),
            render: Box::new(render),
            styles: None,
        }))
    }

    pub fn with_styles(
        tag: impl Into<String>,
        styles: Styles,
        render: impl Fn(&mut RenderScope<'_>) -> Result<TemplateDescription, RenderError> + 'static,
    ) -> Self {
        Self(Rc::new(ComponentInner {
            tag: tag.into().to_ascii_lowercase(),
            render: Box::new(render),
            styles: Some(Rc::new(styles)),
        }))
    }

    pub fn tag(&self) -> &str {
        &self.0.tag
    }

    pub fn styles(&self) -> Option<&Rc<Styles>> {
        self.0.styles.as_ref()
    }

    pub(crate) fn render(&self, scope: &mut RenderScope<'_>) -> Result<TemplateDescription, RenderError> {
        (self.0.render)(scope)
    }

    pub fn ptr_eq(&self, other: &ComponentDef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef").field("tag", &self.0.tag).finish()
    }
}

/// Error returned when a definition cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefineError {
    InvalidTag(String),
    AlreadyDefined(String),
}

impl fmt::Display for DefineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefineError::InvalidTag(tag) => write!(f, "<{tag}> is not a valid custom tag"),
            DefineError::AlreadyDefined(tag) => write!(f, "<{tag}> is already defined"),
        }
    }
}

impl std::error::Error for DefineError {}

/// Tag name to definition. A tag can be defined once.
#[derive(Default)]
pub struct Registry {
    defs: HashMap<String, ComponentDef>,
}

impl Registry {
    pub fn define(&mut self, def: ComponentDef) -> Result<(), DefineError> {
        if !is_custom_tag(def.tag()) {
            return Err(DefineError::InvalidTag(def.tag().to_owned()));
        }
        match self.defs.get(def.tag()) {
            Some(existing) if existing.ptr_eq(&def) => Ok(()),
            Some(_) => Err(DefineError::AlreadyDefined(def.tag().to_owned())),
            None => {
                log::debug!("defined <{}>", def.tag());
                self.defs.insert(def.tag().to_owned(), def);
                Ok(())
            }
        }
    }

    pub fn get(&self, tag: &str) -> Option<&ComponentDef> {
        self.defs.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.defs.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
