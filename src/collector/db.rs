//! Query collector: the `db` collector kind.
//!
//! Accumulates query payloads published on the event bus, excluding cache
//! and schema traffic and anything the caller's pattern rejects. In verbose
//! mode each accepted query is annotated with cleaned call-site locations.

use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use regex::Regex;

use crate::collector::traits::{Collector, CollectorContext, CollectorFactory};
use crate::config::{BacktraceCleaner, Config};
use crate::event::{Event, EventBus, Subscription};
use crate::report::TRACE_MARKER;

/// Categories excluded regardless of pattern: cache hits and schema
/// introspection are not substantive queries.
const EXCLUDED_CATEGORIES: [&str; 2] = ["CACHE", "SCHEMA"];

/// Collector for instrumented query events.
///
/// The accumulated queries live behind a shared handle: the bus-side
/// callback appends while the owning test reads snapshots via
/// [`Collector::queries`].
pub struct QueryCollector {
    pattern: Option<Regex>,
    bus: Arc<EventBus>,
    config: Arc<Config>,
    queries: Arc<Mutex<Vec<String>>>,
    subscription: Option<Subscription>,
}

impl QueryCollector {
    /// Create a collector from a construction context.
    pub fn new(ctx: CollectorContext) -> Self {
        Self {
            pattern: ctx.pattern,
            bus: ctx.bus,
            config: ctx.config,
            queries: Arc::new(Mutex::new(Vec::new())),
            subscription: None,
        }
    }

    /// Factory for registering this kind with a
    /// [`CollectorRegistry`](crate::collector::CollectorRegistry).
    pub fn factory() -> CollectorFactory {
        Arc::new(|ctx| Box::new(QueryCollector::new(ctx)) as Box<dyn Collector>)
    }

    fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.bus.unsubscribe(subscription);
        }
    }
}

impl Collector for QueryCollector {
    fn subscribe(&mut self) {
        // At most one live subscription per collector.
        self.unsubscribe();

        let pattern = self.pattern.clone();
        let config = Arc::clone(&self.config);
        let queries = Arc::clone(&self.queries);

        let subscription = self.bus.subscribe(
            &self.config.event_topic,
            Arc::new(move |event: &Event| {
                if let Some(query) = accept(&pattern, &config, event) {
                    queries
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(query);
                }
            }),
        );
        self.subscription = Some(subscription);
    }

    fn reset(&mut self) {
        self.unsubscribe();
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for QueryCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCollector")
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("subscribed", &self.subscription.is_some())
            .finish_non_exhaustive()
    }
}

/// Decide whether an event is recorded, and in what form.
///
/// Runs inside the bus dispatch and therefore never panics: a misbehaving
/// trace annotation degrades to the plain payload.
fn accept(pattern: &Option<Regex>, config: &Config, event: &Event) -> Option<String> {
    if EXCLUDED_CATEGORIES.contains(&event.category.as_str()) {
        return None;
    }

    if let Some(pattern) = pattern {
        if !pattern.is_match(&event.payload) {
            return None;
        }
    }

    let mut query = event.payload.clone();

    if config.verbose {
        if let Some(cleaner) = &config.backtrace_cleaner {
            let source = query_source_location(cleaner, config.backtrace_length);
            if !source.is_empty() {
                query = format!("{query}{TRACE_MARKER}{}", source.join("\n"));
            }
        }
    }

    tracing::debug!(category = %event.category, "Query collected");
    Some(query)
}

/// Cleaned call-site locations for the query being recorded, at most
/// `length` frames. The injected cleaner is user code; a panic inside it is
/// absorbed and yields no annotation.
fn query_source_location(cleaner: &BacktraceCleaner, length: usize) -> Vec<String> {
    let frames: Vec<String> = Backtrace::force_capture()
        .to_string()
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    match panic::catch_unwind(AssertUnwindSafe(|| cleaner(frames))) {
        Ok(cleaned) => cleaned.into_iter().take(length).collect(),
        Err(_) => {
            tracing::warn!("Backtrace cleaner panicked; recording query without source location");
            Vec::new()
        }
    }
}
