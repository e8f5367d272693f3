//! Collector Layer
//!
//! Event collection framework with pluggable collector kinds. A collector
//! passively accumulates matching events between `subscribe()` and
//! `reset()`; the registry maps kind names to factories so test drivers can
//! look collectors up by key.
//!
//! # Architecture
//!
//! - [`Collector`]: core trait for scoped event accumulation
//! - [`CollectorRegistry`]: kind-name to factory mapping with validated lookup
//! - [`QueryCollector`]: the query collector kind (pattern filter, category
//!   exclusion, optional source-location annotation)
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use nplusone::{Config, Event, EventBus, CollectorContext, QueryCollector, Collector};
//!
//! let bus = Arc::new(EventBus::new());
//! let config = Arc::new(Config::default());
//! let mut collector = QueryCollector::new(CollectorContext::new(None, bus.clone(), config.clone()));
//!
//! collector.subscribe();
//! bus.publish(&config.event_topic, &Event::new("Item Load", "SELECT * FROM items"));
//! assert_eq!(collector.queries(), vec!["SELECT * FROM items"]);
//! collector.reset();
//! assert!(collector.queries().is_empty());
//! ```

mod db;
mod registry;
mod traits;

pub use db::QueryCollector;
pub use registry::{CollectorRegistry, RegistryError};
pub use traits::{Collector, CollectorContext, CollectorFactory};
