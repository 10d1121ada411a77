//! Training progress logging.

use serde::{Deserialize, Serialize};

/// Logging verbosity level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Verbosity {
    /// No output.
    Silent,
    /// Progress messages.
    #[default]
    Info,
    /// Detailed diagnostics.
    Debug,
}

/// Writes training progress to stderr, gated by a [`Verbosity`] level.
#[derive(Debug, Clone)]
pub struct TrainingLogger {
    verbosity: Verbosity,
}

impl TrainingLogger {
    /// Create a logger with the given verbosity.
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// Log a progress message at info level.
    pub fn info(&self, msg: &str) {
        if self.verbosity >= Verbosity::Info {
            eprintln!("[arbor] {}", msg);
        }
    }

    /// Log a diagnostic message at debug level.
    pub fn debug(&self, msg: &str) {
        if self.verbosity >= Verbosity::Debug {
            eprintln!("[arbor] {}", msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_is_ordered() {
        assert!(Verbosity::Silent < Verbosity::Info);
        assert!(Verbosity::Info < Verbosity::Debug);
    }
}
