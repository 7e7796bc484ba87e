use std::fmt;
use std::sync::Arc;

use crate::error::Diagnostic;

/// Type alias for diagnostic handler function
pub type DiagnosticHandler = Arc<dyn Fn(&Diagnostic) + Send + Sync>;

/// Default maximum nesting depth for macro expansion
pub const DEFAULT_RECURSION_LIMIT: usize = 128;

/// Configuration for the expansion engine
#[derive(Clone)]
pub struct EngineConfig {
    /// Maximum recursion depth for macro expansion
    pub recursion_limit: usize,
    /// Optional handler receiving advisory diagnostics such as redefinitions
    pub diagnostic_handler: Option<DiagnosticHandler>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("recursion_limit", &self.recursion_limit)
            .field("diagnostic_handler", &self.diagnostic_handler.is_some())
            .finish()
    }
}

impl EngineConfig {
    /// Create the default configuration
    #[must_use]
    pub const fn new() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            diagnostic_handler: None,
        }
    }

    /// Override the recursion limit
    #[must_use]
    pub const fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Set a handler for advisory diagnostics
    #[must_use]
    pub fn with_diagnostic_handler(mut self, handler: DiagnosticHandler) -> Self {
        self.diagnostic_handler = Some(handler);
        self
    }
}
