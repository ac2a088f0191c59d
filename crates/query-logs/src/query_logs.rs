// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Query tagging entry point.
//!
//! [`QueryLogs`] owns the process-wide configuration and tag registry and turns
//! raw SQL into tagged SQL:
//!
//! ```text
//! tag_sql(unit, sql)
//!   ↓
//! cached comment for this unit? ── yes ──┐
//!   ↓ no                                 │
//! resolve tags (spec + registry + context)
//!   ↓                                    │
//! format body, escape, wrap in /* */     │
//!   ↓                                    │
//! "{comment} {sql}" or "{sql} {comment}" ◄┘
//! ```
//!
//! A single instance is meant to be shared (`Arc<QueryLogs>`) by every request
//! and job. Each of those owns its [`UnitOfWork`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::cache::UnitOfWork;
use crate::config::QueryLogsConfig;
use crate::context::ExecutionContext;
use crate::error::QueryLogsError;
use crate::escape::escape_sql_comment;
use crate::formatter::TagsFormatter;
use crate::tags::{resolve, Handler, TagRegistry, TagSpec};

/// Tags SQL queries with a comment describing the current unit of work.
#[derive(Debug)]
pub struct QueryLogs {
    config: RwLock<QueryLogsConfig>,
    registry: RwLock<Arc<TagRegistry>>,
    generation: AtomicU64,
}

impl Default for QueryLogs {
    fn default() -> Self {
        Self::new(QueryLogsConfig::default())
    }
}

impl QueryLogs {
    /// Creates a tagger with the built-in taggings registered.
    #[must_use]
    pub fn new(config: QueryLogsConfig) -> Self {
        Self::with_registry(config, TagRegistry::with_defaults())
    }

    #[must_use]
    pub fn with_registry(config: QueryLogsConfig, registry: TagRegistry) -> Self {
        Self {
            config: RwLock::new(config),
            registry: RwLock::new(Arc::new(registry)),
            generation: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> QueryLogsConfig {
        self.read_config().clone()
    }

    /// Incremented on every configuration change.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Selects the formatter by name (`legacy` or `sqlcommenter`).
    pub fn set_formatter_by_name(&self, name: &str) -> Result<(), QueryLogsError> {
        let formatter = name.parse::<TagsFormatter>()?;
        self.set_formatter(formatter);
        Ok(())
    }

    pub fn set_formatter(&self, formatter: TagsFormatter) {
        self.update(|config| config.format = formatter);
        debug!("Query logs formatter set to {}", formatter);
    }

    pub fn set_tags(&self, tags: TagSpec) {
        let count = tags.len();
        self.update(|config| config.tags = tags);
        debug!("Query logs tags updated, {} declarations", count);
    }

    pub fn set_prepend_comment(&self, prepend: bool) {
        self.update(|config| config.prepend_comment = prepend);
        debug!("Query logs prepend_comment set to {}", prepend);
    }

    pub fn set_cache_comment(&self, cache: bool) {
        self.update(|config| config.cache_comment = cache);
        debug!("Query logs cache_comment set to {}", cache);
    }

    /// Registers the default handler used for bare `key` declarations.
    pub fn register_tagging(&self, key: impl Into<String>, handler: Handler) {
        let key = key.into();
        debug!("Registering query logs tagging for '{}'", key);
        {
            let mut guard = self.registry.write().unwrap_or_else(PoisonError::into_inner);
            let registry: &mut Arc<TagRegistry> = &mut guard;
            Arc::make_mut(registry).register(key, handler);
        }
        self.bump_generation();
    }

    /// Returns `sql` with the comment of `unit` prepended or appended, or `sql`
    /// unchanged when no tag resolves to a value.
    pub fn tag_sql(&self, unit: &mut UnitOfWork, sql: &str) -> Result<String, QueryLogsError> {
        let Some(comment) = self.comment(unit)? else {
            return Ok(sql.to_string());
        };

        if self.read_config().prepend_comment {
            Ok(format!("{comment} {sql}"))
        } else {
            Ok(format!("{sql} {comment}"))
        }
    }

    /// The `/* ... */` comment for `unit`, from its cache when caching is enabled.
    pub fn comment(&self, unit: &mut UnitOfWork) -> Result<Option<String>, QueryLogsError> {
        let cache_comment = self.read_config().cache_comment;
        if !cache_comment {
            return self.uncached_comment(unit.context());
        }

        let generation = self.generation();
        unit.cached_comment(generation, |context| self.uncached_comment(context))
    }

    /// The formatted tags for `context`, without comment delimiters.
    pub fn tag_content(&self, context: &ExecutionContext) -> Result<String, QueryLogsError> {
        // Handlers run on shared snapshots, without holding the locks.
        let (tags, formatter) = {
            let config = self.read_config();
            (config.tags.clone(), config.format)
        };
        let registry = self.registry();

        let resolved = resolve(&tags, context, &registry)?;
        Ok(formatter.format(&resolved))
    }

    fn uncached_comment(
        &self,
        context: &ExecutionContext,
    ) -> Result<Option<String>, QueryLogsError> {
        let content = self.tag_content(context)?;
        if content.is_empty() {
            debug!("No query log tags resolved, leaving query untouched");
            return Ok(None);
        }

        let comment = format!("/*{}*/", escape_sql_comment(content));
        debug!("Computed query comment {}", comment);
        Ok(Some(comment))
    }

    fn update<F: FnOnce(&mut QueryLogsConfig)>(&self, f: F) {
        f(&mut self.write_config());
        self.bump_generation();
    }

    fn registry(&self) -> Arc<TagRegistry> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&registry)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn read_config(&self) -> RwLockReadGuard<'_, QueryLogsConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_config(&self) -> RwLockWriteGuard<'_, QueryLogsConfig> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }
}
