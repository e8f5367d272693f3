//! nplusone - N+1 Query Detection Core
//!
//! This crate collects instrumented query events emitted during a scoped
//! execution window, filters them by pattern, and compares the populations
//! observed at two different input scales. A workload whose query count
//! grows with a scale that should not affect it is an N+1 pattern; the
//! reporter explains which tables and operations grew.
//!
//! # Architecture
//!
//! - **Event layer**: [`Event`] record plus an in-process [`EventBus`] the
//!   collectors subscribe to
//! - **Collectors**: the [`Collector`] trait, a [`CollectorRegistry`] of
//!   pluggable collector kinds, and the concrete [`QueryCollector`]
//! - **Reporting**: [`Reporter`] diffs two [`ScaledRun`]s and renders the
//!   failure message, including per-table usage stats
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use nplusone::{
//!     Collector, CollectorContext, CollectorRegistry, Config, Event, EventBus, ScaledRun,
//! };
//!
//! let bus = Arc::new(EventBus::new());
//! let config = Arc::new(Config::default());
//!
//! let factory = CollectorRegistry::global().slice(&["db"]).unwrap()["db"].clone();
//! let mut collector = factory(CollectorContext::new(None, bus.clone(), config.clone()));
//!
//! collector.subscribe();
//! bus.publish(&config.event_topic, &Event::new("Item Load", "SELECT * FROM items"));
//! let before = ScaledRun::single(1, "db", collector.queries());
//! collector.reset();
//! assert_eq!(before.data["db"].len(), 1);
//! ```

pub mod collector;
pub mod config;
pub mod event;
pub mod report;

pub use collector::{
    Collector, CollectorContext, CollectorFactory, CollectorRegistry, QueryCollector,
    RegistryError,
};
pub use config::{BacktraceCleaner, Config, ConfigError};
pub use event::{Event, EventBus, Subscription};
pub use report::{Expectation, Reporter, ScaledRun, TRACE_MARKER};
