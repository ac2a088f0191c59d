// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per unit of work state: execution context and cached comment.
//!
//! Every request or job owns one [`UnitOfWork`]. The hosting framework writes
//! into its context at boundaries (request start, job perform, ...) and passes
//! it to [`QueryLogs::tag_sql`](crate::QueryLogs::tag_sql) for each query.
//!
//! Any context change through the unit drops the cached comment. The cache also
//! remembers the configuration generation it was computed under, so a comment
//! computed before a configuration change is never served after it.

use tracing::{debug, trace};

use crate::context::ExecutionContext;
use crate::error::QueryLogsError;
use crate::tags::TagValue;

#[derive(Debug, Clone, PartialEq)]
struct CachedComment {
    generation: u64,
    comment: Option<String>,
}

/// Holds the last comment computed for a unit of work.
///
/// "Computed, but no tags resolved" is cached as well.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentCache {
    slot: Option<CachedComment>,
}

impl CommentCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached comment if it was computed under `generation`.
    #[must_use]
    pub fn get(&self, generation: u64) -> Option<Option<&str>> {
        self.slot
            .as_ref()
            .filter(|cached| cached.generation == generation)
            .map(|cached| cached.comment.as_deref())
    }

    pub fn store(&mut self, generation: u64, comment: Option<String>) {
        self.slot = Some(CachedComment {
            generation,
            comment,
        });
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    pub(crate) fn get_or_try_compute<F>(
        &mut self,
        generation: u64,
        compute: F,
    ) -> Result<Option<String>, QueryLogsError>
    where
        F: FnOnce() -> Result<Option<String>, QueryLogsError>,
    {
        if let Some(comment) = self.get(generation) {
            debug!("Serving cached query comment");
            return Ok(comment.map(str::to_string));
        }

        let comment = compute()?;
        self.store(generation, comment.clone());
        Ok(comment)
    }
}

/// One request, job or task: its execution context and comment cache.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    context: ExecutionContext,
    cache: CommentCache,
}

impl UnitOfWork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_context(context: ExecutionContext) -> Self {
        Self {
            context,
            cache: CommentCache::new(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    #[must_use]
    pub fn cache(&self) -> &CommentCache {
        &self.cache
    }

    /// Sets a context value. Invalidates the cached comment.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Option<TagValue> {
        self.invalidate();
        self.context.set(key, value)
    }

    /// Sets several context values. Invalidates the cached comment.
    pub fn extend<I, K, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<TagValue>,
    {
        self.invalidate();
        self.context.extend(values);
    }

    /// Removes a context value. Invalidates the cached comment.
    pub fn remove(&mut self, key: &str) -> Option<TagValue> {
        self.invalidate();
        self.context.remove(key)
    }

    /// Clears the context and the cached comment, e.g. when a pooled worker
    /// picks up a new job.
    pub fn reset(&mut self) {
        self.context.clear();
        self.invalidate();
    }

    /// Drops the cached comment without touching the context.
    pub fn invalidate(&mut self) {
        if !self.cache.is_empty() {
            trace!("Invalidating cached query comment");
        }
        self.cache.clear();
    }

    /// Runs `f` with `values` merged into the context, then restores the
    /// previous values. The cached comment is invalidated on entry and on exit.
    pub fn with_scope<I, K, V, F, R>(&mut self, values: I, f: F) -> R
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<TagValue>,
        F: FnOnce(&mut Self) -> R,
    {
        let previous: Vec<(String, Option<TagValue>)> = values
            .into_iter()
            .map(|(key, value)| {
                let key = key.into();
                let old = self.context.set(key.clone(), value);
                (key, old)
            })
            .collect();
        self.invalidate();

        let result = f(self);

        for (key, old) in previous.into_iter().rev() {
            match old {
                Some(value) => {
                    self.context.set(key, value);
                }
                None => {
                    self.context.remove(&key);
                }
            }
        }
        self.invalidate();

        result
    }

    pub(crate) fn cached_comment<F>(
        &mut self,
        generation: u64,
        compute: F,
    ) -> Result<Option<String>, QueryLogsError>
    where
        F: FnOnce(&ExecutionContext) -> Result<Option<String>, QueryLogsError>,
    {
        let context = &self.context;
        self.cache.get_or_try_compute(generation, || compute(context))
    }
}
