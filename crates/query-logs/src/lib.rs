// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Query Logs
//!
//! Tags SQL queries with a block comment describing the request or job that
//! issued them, so database-side tooling can attribute queries to application
//! code:
//!
//! ```text
//! SELECT * FROM users /*application='MyApp',controller='users',action='index'*/
//! ```
//!
//! ## Architecture
//!
//! - [`escape`]: keeps tag values from breaking out of the comment
//! - [`formatter`]: `legacy` and `sqlcommenter` comment bodies
//! - [`tags`]: tag declarations, default taggings and resolution
//! - [`context`]: execution context written by the hosting framework
//! - [`cache`]: per request/job state and comment cache
//! - [`query_logs`]: the [`QueryLogs`] entry point and its setters
//!
//! ## Usage
//!
//! ```
//! use query_logs::{QueryLogs, QueryLogsConfig, TagSpec, UnitOfWork};
//!
//! let query_logs = QueryLogs::new(QueryLogsConfig {
//!     tags: TagSpec::new().with_value("application", "MyApp").with_key("controller"),
//!     ..QueryLogsConfig::default()
//! });
//!
//! let mut unit = UnitOfWork::new();
//! unit.set("controller", "users");
//!
//! let sql = query_logs.tag_sql(&mut unit, "SELECT 1").unwrap();
//! assert_eq!(sql, "SELECT 1 /*application='MyApp',controller='users'*/");
//! ```

#![deny(clippy::all)]
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]
#![deny(unused_extern_crates)]
#![deny(unreachable_pub)]

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod escape;
pub mod formatter;
pub mod query_logs;
pub mod tags;

pub use cache::{CommentCache, UnitOfWork};
pub use config::QueryLogsConfig;
pub use context::ExecutionContext;
pub use error::QueryLogsError;
pub use formatter::TagsFormatter;
pub use query_logs::QueryLogs;
pub use tags::{
    Handler, HandlerResult, ResolvedTag, TagDeclaration, TagRegistry, TagSpec, TagValue,
};
