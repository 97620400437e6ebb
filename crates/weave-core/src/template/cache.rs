use std::rc::Rc;

use super::{compile, CompiledTemplate, Statics, TemplateKey};
use crate::collections::map::HashMap;
use crate::error::TemplateError;

/// Compiled templates memoized by their static fragments.
///
/// Written once per distinct template and never evicted.
#[derive(Default)]
pub struct TemplateCache {
    compiled: HashMap<TemplateKey, Rc<CompiledTemplate>>,
    debug: bool,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dump every newly compiled template through `log::debug!`.
    pub fn with_debug(debug: bool) -> Self {
        Self {
            compiled: HashMap::new(),
            debug,
        }
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    pub fn contains(&self, statics: Statics) -> bool {
        self.compiled.contains_key(&statics.key())
    }

    pub fn get_or_compile(&mut self, statics: Statics) -> Result<Rc<CompiledTemplate>, TemplateError> {
        if let Some(compiled) = self.compiled.get(&statics.key()) {
            return Ok(Rc::clone(compiled));
        }
        let compiled = Rc::new(compile(statics)?);
        log::debug!(
            "compiled template with {} holes into {} nodes",
            compiled.dependencies.len(),
            compiled.node_count()
        );
        if self.debug {
            log::debug!("  statics: {:?}", statics);
            log::debug!("  structure: {:?}", compiled.structure);
            log::debug!("  dependencies: {:?}", compiled.dependencies);
        }
        self.compiled.insert(statics.key(), Rc::clone(&compiled));
        Ok(compiled)
    }
}
