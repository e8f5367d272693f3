//! Collector registry mapping kind names to factories.

use std::collections::BTreeMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use thiserror::Error;

use crate::collector::db::QueryCollector;
use crate::collector::traits::CollectorFactory;

/// Errors raised by registry lookups.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// One or more requested kinds are not registered.
    #[error("no collectors for keys: {missing}, existing collectors are: {existing}")]
    UnknownKeys {
        /// Requested keys with no registration, comma-joined in input order.
        missing: String,
        /// All currently registered keys, comma-joined.
        existing: String,
    },
}

/// Registry of pluggable collector kinds.
///
/// Mutation happens at test setup/teardown; reads during collection are safe
/// from any thread. Registering an existing key overwrites it.
#[derive(Default)]
pub struct CollectorRegistry {
    collectors: RwLock<BTreeMap<String, CollectorFactory>>,
}

impl CollectorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide convenience instance, with the `db` query collector
    /// kind pre-registered.
    ///
    /// Purely a boundary convenience; every operation works identically on
    /// an owned instance.
    pub fn global() -> &'static CollectorRegistry {
        static GLOBAL: OnceLock<CollectorRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let registry = CollectorRegistry::new();
            registry.register("db", QueryCollector::factory());
            registry
        })
    }

    /// Register a collector kind under `key`, overwriting any previous
    /// registration.
    pub fn register(&self, key: impl Into<String>, factory: CollectorFactory) {
        let key = key.into();
        tracing::debug!(key = %key, "Collector kind registered");
        self.collectors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, factory);
    }

    /// Return the sub-mapping for the requested keys.
    ///
    /// # Errors
    /// Fails with [`RegistryError::UnknownKeys`] when any requested key is
    /// absent; the message enumerates the missing keys and every key
    /// currently known.
    pub fn slice(&self, keys: &[&str]) -> Result<BTreeMap<String, CollectorFactory>, RegistryError> {
        let collectors = self
            .collectors
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let missing: Vec<&str> = keys
            .iter()
            .filter(|key| !collectors.contains_key(**key))
            .copied()
            .collect();

        if !missing.is_empty() {
            return Err(RegistryError::UnknownKeys {
                missing: missing.join(", "),
                existing: collectors.keys().cloned().collect::<Vec<_>>().join(", "),
            });
        }

        Ok(keys
            .iter()
            .map(|key| ((*key).to_string(), collectors[*key].clone()))
            .collect())
    }

    /// Remove the given kinds. Removing a key that was never registered is
    /// a no-op.
    pub fn unregister(&self, keys: &[&str]) {
        let mut collectors = self
            .collectors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            if collectors.remove(*key).is_some() {
                tracing::debug!(key, "Collector kind unregistered");
            }
        }
    }

    /// Currently registered kind names.
    pub fn keys(&self) -> Vec<String> {
        self.collectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field(
                "kind_count",
                &self.collectors.try_read().map(|c| c.len()).unwrap_or(0),
            )
            .finish_non_exhaustive()
    }
}
