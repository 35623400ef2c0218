//! Named-validator pipeline.
//!
//! A [`ValidationPipeline`] is an ordered list of `(name, check)` pairs run
//! against a value. Callers compose pipelines from independent checks rather
//! than extending a base validator type; later crates append their own checks
//! (for example, redirect-domain validation) to the pipeline built here.

use tracing::debug;

use crate::error::{GuardError, GuardResult};

type Check<T> = Box<dyn Fn(&T) -> GuardResult<()> + Send + Sync>;

/// Ordered collection of named checks over a value of type `T`.
pub struct ValidationPipeline<T> {
    checks: Vec<(&'static str, Check<T>)>,
}

impl<T> ValidationPipeline<T> {
    /// Create an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Append a named check.
    #[must_use]
    pub fn with(
        mut self,
        name: &'static str,
        check: impl Fn(&T) -> GuardResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.checks.push((name, Box::new(check)));
        self
    }

    /// Names of the registered checks, in run order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|(name, _)| *name).collect()
    }

    /// Run every check in order, stopping at the first failure.
    pub fn run(&self, value: &T) -> GuardResult<()> {
        for (name, check) in &self.checks {
            debug!(validator = name, "running validator");
            check(value)?;
        }
        Ok(())
    }

    /// Run every check and collect all failures.
    pub fn run_all(&self, value: &T) -> Vec<(&'static str, GuardError)> {
        self.checks
            .iter()
            .filter_map(|(name, check)| check(value).err().map(|err| (*name, err)))
            .collect()
    }
}

impl<T> Default for ValidationPipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ValidationPipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("checks", &self.names())
            .finish()
    }
}
