use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

/// Attributes that live for the duration of one request.
///
/// The worker and the response writer of the same request share a scope, which
/// is how a "force callback" decision made while processing reaches the code
/// that renders the response.
#[derive(Debug, Default)]
pub struct RequestScope {
    attributes: Mutex<HashMap<String, Value>>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: Value) {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }

    pub fn remove_attribute(&self, key: &str) -> Option<Value> {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}
