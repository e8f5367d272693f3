//! Core collector trait and construction types.

use std::sync::Arc;

use regex::Regex;

use crate::config::Config;
use crate::event::EventBus;

/// Everything a collector factory needs to build an instance.
///
/// Bundles the caller's filter pattern with the injected collaborators so a
/// collector never reaches for process globals.
#[derive(Debug, Clone)]
pub struct CollectorContext {
    /// Optional payload filter; `None` matches everything not excluded by
    /// category.
    pub pattern: Option<Regex>,
    /// Event source the collector subscribes to.
    pub bus: Arc<EventBus>,
    /// Shared runtime configuration.
    pub config: Arc<Config>,
}

impl CollectorContext {
    /// Create a construction context.
    pub fn new(pattern: Option<Regex>, bus: Arc<EventBus>, config: Arc<Config>) -> Self {
        Self {
            pattern,
            bus,
            config,
        }
    }
}

/// Factory building one collector kind from a [`CollectorContext`].
pub type CollectorFactory = Arc<dyn Fn(CollectorContext) -> Box<dyn Collector> + Send + Sync>;

/// Core trait for scoped event accumulation.
///
/// A collector is constructed with an immutable filter pattern, attached to
/// the event source with [`subscribe`](Collector::subscribe), and detached
/// and emptied with [`reset`](Collector::reset). Accumulation is delimited
/// entirely by those two calls; no time bound applies.
///
/// # Lifecycle
///
/// Pair every `subscribe` with a `reset` (or drop-time cleanup of your own).
/// A collector discarded while still subscribed leaks a live callback
/// registration on the bus that keeps appending to a list nobody reads.
/// Tolerable for a short-lived test-scoped object, but the caller's
/// responsibility.
pub trait Collector: Send + Sync {
    /// Attach to the event source.
    ///
    /// At most one subscription is ever live per collector: calling
    /// `subscribe` again releases the previous registration first.
    fn subscribe(&mut self);

    /// Detach from the event source (a no-op when not subscribed) and clear
    /// the accumulated queries. Idempotent.
    fn reset(&mut self);

    /// Snapshot of the accepted payloads, in emission order.
    fn queries(&self) -> Vec<String>;
}
