//! Kind registries for decoding persisted handles and placeholders.
//!
//! Handles and placeholders are persisted as records: a `kind` string plus an
//! opaque JSON payload. A registry maps each kind to the factory that turns the
//! payload back into a live value, so the decoding side never needs
//! reflection.
//!
//! # Registry as Code, Not Data
//!
//! Factories are closures and the registry itself is never serialized. The
//! saving and loading processes both build it from the same code:
//!
//! ```rust,ignore
//! fn build_placeholder_registry() -> PlaceholderRegistry {
//!     let mut registry = PlaceholderRegistry::new();
//!     registry.register_serde::<FilePlaceholder>("file")?;
//!     registry
//! }
//!
//! // === Save side ===
//! snapshot.capture_placeholder("log", &FilePlaceholder::new("/var/log/run.log"))?;
//!
//! // === Load side (possibly a different process) ===
//! let registry = build_placeholder_registry();
//! let placeholder = registry.decode_placeholder(&snapshot.placeholders["log"])?;
//! let pending = placeholder.begin_rehydrate();
//! ```

use crate::error::RegistryError;
use crate::handle::{ExecutionHandle, HandleRecord};
use crate::placeholder::{Placeholder, PlaceholderRecord};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

/// A factory turning a record payload into a live value.
pub type DecodeFactory<T> =
    Box<dyn Fn(serde_json::Value) -> Result<T, RegistryError> + Send + Sync>;

/// Registry of decode factories keyed by kind.
pub struct KindRegistry<T> {
    factories: HashMap<String, DecodeFactory<T>>,
}

/// Decoders for persisted [`ExecutionHandle`]s.
pub type HandleRegistry = KindRegistry<Arc<dyn ExecutionHandle>>;

/// Decoders for persisted [`Placeholder`]s.
pub type PlaceholderRegistry = KindRegistry<Arc<dyn Placeholder>>;

impl<T> Default for KindRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> KindRegistry<T> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateKind`] if the kind is already taken.
    pub fn register<F>(&mut self, kind: &str, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(serde_json::Value) -> Result<T, RegistryError> + Send + Sync + 'static,
    {
        if self.factories.contains_key(kind) {
            return Err(RegistryError::DuplicateKind(kind.to_string()));
        }
        self.factories.insert(kind.to_string(), Box::new(factory));
        Ok(())
    }

    /// Decode a payload recorded under `kind`.
    pub fn decode(&self, kind: &str, payload: serde_json::Value) -> Result<T, RegistryError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))?;
        factory(payload)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, in no particular order.
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Deserialize a payload, attributing failures to `kind`.
pub fn decode_payload<P: DeserializeOwned>(
    kind: &str,
    payload: serde_json::Value,
) -> Result<P, RegistryError> {
    serde_json::from_value(payload).map_err(|source| RegistryError::Payload {
        kind: kind.to_string(),
        source,
    })
}

impl PlaceholderRegistry {
    /// Register a placeholder type whose payload is its own serde form.
    pub fn register_serde<P>(&mut self, kind: &str) -> Result<(), RegistryError>
    where
        P: Placeholder + DeserializeOwned + 'static,
    {
        let owned = kind.to_string();
        self.register(kind, move |payload| {
            let placeholder: P = decode_payload(&owned, payload)?;
            Ok(Arc::new(placeholder) as Arc<dyn Placeholder>)
        })
    }

    pub fn decode_placeholder(
        &self,
        record: &PlaceholderRecord,
    ) -> Result<Arc<dyn Placeholder>, RegistryError> {
        self.decode(&record.kind, record.payload.clone())
    }
}

impl HandleRegistry {
    pub fn decode_handle(
        &self,
        record: &HandleRecord,
    ) -> Result<Arc<dyn ExecutionHandle>, RegistryError> {
        self.decode(&record.kind, record.payload.clone())
    }
}
