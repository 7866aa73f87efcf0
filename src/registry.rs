// Endpoint registry.
// Static descriptions of every REST operation: method, URL template,
// query/mutation kind, and the tags used for invalidation.

use std::collections::HashMap;
use std::fmt;

use reqwest::Method;

use crate::error::{PlinthError, Result};

/// Opaque label grouping cache entries for bulk invalidation.
///
/// Queries attach tags to the entries they produce; mutations declare
/// which tags they invalidate on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub &'static str);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Whether an endpoint reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Query,
    Mutation,
}

/// Immutable description of one REST operation.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    pub name: &'static str,
    pub kind: EndpointKind,
    pub method: Method,
    /// Path relative to the base URL. `{name}` segments are filled
    /// from the request arguments.
    pub url_template: &'static str,
    pub tags: Vec<Tag>,
}

/// Registry of all endpoints, populated once at startup and read-only
/// thereafter.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<&'static str, EndpointDescriptor>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint. Fails if the name is already taken.
    pub fn register(&mut self, descriptor: EndpointDescriptor) -> Result<()> {
        if self.endpoints.contains_key(descriptor.name) {
            return Err(PlinthError::DuplicateEndpoint(descriptor.name.to_string()));
        }
        self.endpoints.insert(descriptor.name, descriptor);
        Ok(())
    }

    /// Look up an endpoint by name.
    pub fn resolve(&self, name: &str) -> Result<&EndpointDescriptor> {
        self.endpoints
            .get(name)
            .ok_or_else(|| PlinthError::UnknownEndpoint(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
