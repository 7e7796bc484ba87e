use std::collections::HashMap;

use tracing::debug;

use crate::error::Diagnostic;
use crate::macro_def::MacroDefinition;

/// Mapping from macro name to its active definition.
///
/// Mutation needs `&mut self`, so a table borrowed by running expansions
/// cannot change underneath them.
#[derive(Clone, Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, MacroDefinition>,
}

impl MacroTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or overwrite a definition.
    ///
    /// Returns a diagnostic when a different definition was replaced.
    pub fn define(&mut self, definition: MacroDefinition) -> Option<Diagnostic> {
        debug!(
            name = definition.name(),
            function_like = definition.is_function_like(),
            "defining macro"
        );
        let diagnostic = match self.macros.get(&definition.name) {
            Some(previous) if !previous.is_equivalent(&definition) => {
                Some(Diagnostic::MacroRedefined {
                    name: definition.name.clone(),
                    previous: previous.location,
                })
            }
            _ => None,
        };
        self.macros.insert(definition.name.clone(), definition);
        diagnostic
    }

    /// Get a definition by name
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&MacroDefinition> {
        self.macros.get(name)
    }

    /// Remove a definition; absent names are ignored
    pub fn undefine(&mut self, name: &str) -> Option<MacroDefinition> {
        debug!(name, "undefining macro");
        self.macros.remove(name)
    }

    /// Check if a macro is defined
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Number of definitions
    #[must_use]
    pub fn len(&self) -> usize {
        self.macros.len()
    }

    /// Whether the table has no definitions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Definitions sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &MacroDefinition> {
        let mut defs: Vec<&MacroDefinition> = self.macros.values().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs.into_iter()
    }
}
