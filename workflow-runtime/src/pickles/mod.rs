//! Built-in placeholders for common live resources.

mod endpoint;
mod file;

pub use endpoint::{EndpointPlaceholder, LiveConnection};
pub use file::{FilePlaceholder, LiveFile};

use workflow_core::error::RegistryError;
use workflow_core::registry::PlaceholderRegistry;

/// Register every built-in placeholder kind.
pub fn register_builtin(registry: &mut PlaceholderRegistry) -> Result<(), RegistryError> {
    registry.register_serde::<FilePlaceholder>(FilePlaceholder::KIND)?;
    registry.register_serde::<EndpointPlaceholder>(EndpointPlaceholder::KIND)?;
    Ok(())
}
