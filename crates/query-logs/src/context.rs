// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Execution context of a unit of work.
//!
//! Hosting frameworks describe the request or job currently running (controller,
//! action, job class, ...) by writing symbolic keys into an [`ExecutionContext`].
//! Tag handlers read from it when a query comment is computed.
//!
//! The context is owned by a single unit of work. Mutate it through
//! [`UnitOfWork`](crate::cache::UnitOfWork) so that the cached comment of that
//! unit is invalidated on every change.

use std::collections::hash_map::{self, HashMap};

use crate::tags::TagValue;

/// Key/value state describing the current unit of work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    values: HashMap<String, TagValue>,
}

impl ExecutionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.values.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Stores `value` under `key` and returns the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Option<TagValue> {
        self.values.insert(key.into(), value.into())
    }

    pub fn extend<I, K, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<TagValue>,
    {
        let values = values.into_iter().map(|(k, v)| (k.into(), v.into()));
        self.values.extend(values);
    }

    pub fn remove(&mut self, key: &str) -> Option<TagValue> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, TagValue> {
        self.values.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for ExecutionContext
where
    K: Into<String>,
    V: Into<TagValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Self::new();
        context.extend(iter);
        context
    }
}

impl From<HashMap<String, TagValue>> for ExecutionContext {
    fn from(values: HashMap<String, TagValue>) -> Self {
        Self { values }
    }
}

impl<'a> IntoIterator for &'a ExecutionContext {
    type Item = (&'a String, &'a TagValue);
    type IntoIter = hash_map::Iter<'a, String, TagValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_returns_previous_value() {
        let mut context = ExecutionContext::new();
        assert_eq!(context.set("controller", "users"), None);
        assert_eq!(context.set("controller", "posts"), Some(json!("users")));
        assert_eq!(context.get("controller"), Some(&json!("posts")));
    }

    #[test]
    fn test_from_iter_and_extend() {
        let pairs = [("controller", "users"), ("action", "index")];
        let mut context: ExecutionContext = pairs.into_iter().collect();
        context.extend([("job", json!("Worker")), ("attempt", json!(2))]);

        assert_eq!(context.len(), 4);
        assert_eq!(context.get("attempt"), Some(&json!(2)));
        assert!(context.contains_key("job"));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut context: ExecutionContext = [("job", "Worker")].into_iter().collect();
        assert_eq!(context.remove("job"), Some(json!("Worker")));
        assert_eq!(context.remove("job"), None);

        context.set("a", 1);
        context.clear();
        assert!(context.is_empty());
    }
}
