//! Template descriptions and their compiled form.

mod cache;
mod compiler;
mod parser;
mod scanner;

use std::fmt;
use std::rc::Rc;

pub use cache::TemplateCache;
pub use compiler::{compile, ComposedAttribute, CompiledTemplate, Dependency, DependencyKind};
pub(crate) use compiler::TEXT_CONTENT;
pub use parser::TemplateNode;

use crate::error::TemplateError;
use crate::value::Value;

/// The static text of a template, split at its holes.
#[derive(Clone, Copy)]
pub struct Statics(&'static [&'static str]);

impl Statics {
    pub fn new(fragments: &'static [&'static str]) -> Self {
        Self(fragments)
    }

    pub fn fragments(&self) -> &'static [&'static str] {
        self.0
    }

    pub fn holes(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn key(&self) -> TemplateKey {
        TemplateKey {
            ptr: self.0.as_ptr() as usize,
            len: self.0.len(),
        }
    }

    pub fn ptr_eq(&self, other: &Statics) -> bool {
        self.key() == other.key()
    }

    /// Element-wise equality of the fragments; decides patch-in-place versus rebuild.
    pub fn structurally_eq(&self, other: &Statics) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl fmt::Debug for Statics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// Identity of a static fragment slice, used as the template cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    ptr: usize,
    len: usize,
}

/// One render output: static fragments paired with the values for their holes.
#[derive(Clone)]
pub struct TemplateDescription {
    statics: Statics,
    values: Rc<[Value]>,
}

impl TemplateDescription {
    pub fn new(statics: &'static [&'static str], values: Vec<Value>) -> Self {
        Self {
            statics: Statics(statics),
            values: values.into(),
        }
    }

    pub fn with_values(statics: Statics, values: Rc<[Value]>) -> Self {
        Self { statics, values }
    }

    pub fn statics(&self) -> Statics {
        self.statics
    }

    pub fn values(&self) -> &Rc<[Value]> {
        &self.values
    }

    pub fn check_arity(&self) -> Result<(), TemplateError> {
        if self.statics.0.len() == self.values.len() + 1 {
            Ok(())
        } else {
            Err(TemplateError::ArityMismatch {
                holes: self.statics.holes(),
                values: self.values.len(),
            })
        }
    }

    pub fn structurally_eq(&self, other: &TemplateDescription) -> bool {
        self.statics.structurally_eq(&other.statics)
    }

    /// Same statics and the very same value sequence.
    pub fn same(&self, other: &TemplateDescription) -> bool {
        self.statics.ptr_eq(&other.statics) && Rc::ptr_eq(&self.values, &other.values)
    }
}

impl fmt::Debug for TemplateDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateDescription")
            .field("statics", &self.statics)
            .field("values", &self.values)
            .finish()
    }
}
