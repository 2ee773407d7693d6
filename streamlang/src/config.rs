//! Interpreter configuration

/// What to do with a self-recursive function that has no termination path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TerminationCheck {
    /// Skip the check
    Off,
    /// Log a warning and keep the declaration (default)
    #[default]
    Warn,
    /// Reject the declaration with a fault
    Deny,
}

/// Where `print` writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Stdout,
    /// Collect lines in the context, for embedding and tests
    Capture,
}

/// Interpreter configuration
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Recursion cap per function name
    pub max_recursion_depth: usize,
    pub termination_check: TerminationCheck,
    /// Run the static type pass before evaluating
    pub type_check: bool,
    pub output: OutputMode,
}

impl InterpreterConfig {
    pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            max_recursion_depth: Self::DEFAULT_MAX_RECURSION_DEPTH,
            termination_check: TerminationCheck::Warn,
            type_check: true,
            output: OutputMode::Stdout,
        }
    }

    /// Set the recursion cap
    pub fn max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn termination_check(mut self, check: TerminationCheck) -> Self {
        self.termination_check = check;
        self
    }

    pub fn type_check(mut self, enabled: bool) -> Self {
        self.type_check = enabled;
        self
    }

    pub fn output(mut self, mode: OutputMode) -> Self {
        self.output = mode;
        self
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self::new()
    }
}
