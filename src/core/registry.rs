//! Operation registry - the catalogue of steps a pipeline may use
//!
//! The registry is filled once at startup and then shared behind an `Arc`.
//! Registration needs `&mut self`, so once shared it can only be read.

use crate::core::{error::RegistryError, operation::OperationDescriptor};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Mapping from operation id to its descriptor
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<OperationDescriptor>>,
}

impl OperationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the reference operations
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        crate::operations::register_builtins(&mut registry)?;
        Ok(registry)
    }

    /// Register an operation; ids must be unique
    pub fn register(&mut self, descriptor: OperationDescriptor) -> Result<(), RegistryError> {
        if self.operations.contains_key(&descriptor.id) {
            return Err(RegistryError::DuplicateOperation(descriptor.id));
        }
        debug!(
            "Registered operation {} ({} -> {})",
            descriptor.id, descriptor.input, descriptor.output
        );
        self.operations
            .insert(descriptor.id.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Look up an operation by id
    pub fn lookup(&self, id: &str) -> Result<Arc<OperationDescriptor>, RegistryError> {
        self.operations
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownOperation(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.operations.contains_key(id)
    }

    /// All operations ordered by id
    pub fn iter(&self) -> Vec<&OperationDescriptor> {
        let mut all: Vec<_> = self.operations.values().map(Arc::as_ref).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
