use crate::scheduler::Scheduler;
use std::{fmt, sync::Arc};

/// Per-promise configuration. Derived promises inherit their parent's.
///
/// `extensions` (on by default) controls two behaviors:
/// - the delivery pass that hands the outcome to registered continuations
///   goes through the scheduler instead of running inline;
/// - fulfillment values exposing a `then` are adopted instead of being
///   stored as they are.
///
/// # Examples
///
/// ```
/// use thenable::{Config, TaskQueue};
/// let config = Config::new(TaskQueue::new());
/// assert!(config.extensions_enabled());
/// let plain = config.clone().with_extensions(false);
/// assert!(!plain.extensions_enabled());
/// ```
#[derive(Clone)]
pub struct Config {
    scheduler: Arc<dyn Scheduler>,
    extensions: bool,
}

impl Config {
    pub fn new<S: Scheduler + 'static>(scheduler: S) -> Self {
        Self::shared(Arc::new(scheduler))
    }

    /// Build from a scheduler that is already shared.
    pub fn shared(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            extensions: true,
        }
    }

    pub fn with_extensions(mut self, enabled: bool) -> Self {
        self.extensions = enabled;
        self
    }

    pub fn extensions_enabled(&self) -> bool {
        self.extensions
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}
