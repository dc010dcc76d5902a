//! Cache keys.

use std::fmt;

use serde_json::{Map, Value};

use crate::services::Params;

/// Identity of a cacheable call: service, operation and canonicalized params.
///
/// The registration generation keeps a service re-registered under the same
/// name from seeing results produced by its predecessor.
///
/// Params are rendered as compact JSON with keys in sorted order, so two
/// maps holding the same pairs always produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    service: String,
    generation: u64,
    operation: String,
    params: String,
}

impl CacheKey {
    pub fn new(service: &str, operation: &str, params: &Params) -> Self {
        Self {
            service: service.to_string(),
            generation: 0,
            operation: operation.to_string(),
            params: canonicalize(params),
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn params(&self) -> &str {
        &self.params
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}?{}", self.service, self.operation, self.params)
    }
}

fn canonicalize(params: &Params) -> String {
    let object: Map<String, Value> = params
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Value::Object(object).to_string()
}
