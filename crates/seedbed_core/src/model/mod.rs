//! Entity-type descriptors and bundled models.
//!
//! # Responsibility
//! - Define the declarative table description consumed by the registry.
//! - Ship the built-in models registered at startup, in fixed order.
//!
//! # Invariants
//! - `default_models()` order is deterministic; referenced tables come first.

pub mod app_config;
pub mod entity;

use entity::{EntityDefinitionError, EntityType};

/// Built-in entity types in registration order.
pub fn default_models() -> Result<Vec<EntityType>, EntityDefinitionError> {
    Ok(vec![app_config::entity_type()?])
}
