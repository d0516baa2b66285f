//! Task loader port: turns task source text into task classes.
//!
//! The loader is the sandbox. It evaluates candidate source in an isolated
//! namespace and reports the class definitions it produced. The verifier
//! checks conformance before anything else touches the result.

use super::sim::BenchmarkTask;
use super::BoxError;

/// A class definition produced by loading task source.
pub trait TaskClass: Send {
    /// Declared class name.
    fn name(&self) -> &str;

    /// Whether the class is a subtype of the benchmark's task base type.
    fn extends_base_task(&self) -> bool;

    /// Instantiates the class with default parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the constructor raises.
    fn instantiate(&self, debug: bool) -> Result<Box<dyn BenchmarkTask>, BoxError>;
}

/// The classes defined by one load, in definition order.
#[derive(Default)]
pub struct LoadedNamespace {
    classes: Vec<Box<dyn TaskClass>>,
}

impl LoadedNamespace {
    /// Wraps the classes produced by a load.
    #[must_use]
    pub fn new(classes: Vec<Box<dyn TaskClass>>) -> Self {
        Self { classes }
    }

    /// Names of all classes in the namespace.
    #[must_use]
    pub fn class_names(&self) -> Vec<&str> {
        self.classes.iter().map(|c| c.name()).collect()
    }

    /// Removes and returns the class called `name`.
    pub fn take(&mut self, name: &str) -> Option<Box<dyn TaskClass>> {
        let index = self.classes.iter().position(|c| c.name() == name)?;
        Some(self.classes.remove(index))
    }
}

impl std::fmt::Debug for LoadedNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedNamespace").field("classes", &self.class_names()).finish()
    }
}

/// Evaluates task source text in an isolated namespace.
pub trait TaskLoader: Send + Sync {
    /// Loads `code` and returns the classes it defines.
    ///
    /// # Errors
    ///
    /// Returns an error on syntax errors, disallowed imports, or any other
    /// load-time failure; the message is used as the diagnostic.
    fn load(&self, code: &str) -> Result<LoadedNamespace, BoxError>;
}
