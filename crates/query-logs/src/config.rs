// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::QueryLogsError;
use crate::formatter::TagsFormatter;
use crate::tags::TagSpec;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;

const DEFAULT_TAGS: [&str; 4] = ["application", "controller", "action", "job"];

/// Configuration for query log tagging
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryLogsConfig {
    /// Tags attached to every query, in order
    pub tags: TagSpec,
    /// Comment body format
    #[serde(alias = "tags_formatter")]
    pub format: TagsFormatter,
    /// Put the comment before the query instead of after it
    pub prepend_comment: bool,
    /// Reuse the comment for the whole unit of work until its context changes
    #[serde(alias = "cache_query_log_tags")]
    pub cache_comment: bool,
}

impl Default for QueryLogsConfig {
    fn default() -> Self {
        Self {
            tags: DEFAULT_TAGS.into_iter().collect(),
            format: TagsFormatter::Legacy,
            prepend_comment: false,
            cache_comment: false,
        }
    }
}

impl QueryLogsConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, QueryLogsError> {
        let defaults = Self::default();

        let tags = match env::var("DD_QUERY_LOGS_TAGS") {
            Ok(val) => val
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .collect(),
            Err(_) => defaults.tags,
        };
        let format = match env::var("DD_QUERY_LOGS_FORMAT") {
            Ok(val) => val.parse::<TagsFormatter>()?,
            Err(_) => defaults.format,
        };
        let prepend_comment =
            parse_bool_env("DD_QUERY_LOGS_PREPEND_COMMENT", defaults.prepend_comment)?;
        let cache_comment = parse_bool_env("DD_QUERY_LOGS_CACHE_COMMENT", defaults.cache_comment)?;

        let config = Self {
            tags,
            format,
            prepend_comment,
            cache_comment,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), QueryLogsError> {
        let mut seen = HashSet::new();
        for key in self.tags.keys() {
            if key.is_empty() {
                return Err(QueryLogsError::InvalidConfig(
                    "tag keys cannot be empty".to_string(),
                ));
            }

            // Keys are written into the comment unescaped
            if let Some(invalid_char) = key
                .chars()
                .find(|&ch| !ch.is_ascii_alphanumeric() && !matches!(ch, '_' | '.' | '-'))
            {
                return Err(QueryLogsError::InvalidConfig(format!(
                    "tag key '{key}' contains invalid character '{invalid_char}'. \
                     Only ASCII alphanumerics, underscores, periods, and dashes are allowed"
                )));
            }

            if !seen.insert(key) {
                return Err(QueryLogsError::InvalidConfig(format!(
                    "tag key '{key}' is declared more than once"
                )));
            }
        }

        Ok(())
    }
}

fn parse_bool_env(name: &str, default: bool) -> Result<bool, QueryLogsError> {
    match env::var(name) {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(QueryLogsError::InvalidConfig(format!(
                "{name} must be true or false, got '{val}'"
            ))),
        },
        Err(_) => Ok(default),
    }
}
