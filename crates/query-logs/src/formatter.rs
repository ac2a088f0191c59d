// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Comment body formats.
//!
//! # Formats
//!
//! - **Legacy**: `key='value'` pairs joined by `,`, in declaration order
//! - **SQLCommenter**: `key='percent-encoded value'` pairs joined by `,`, sorted by key,
//!   then by encoded value
//!
//! ```text
//! legacy        application='MyApp',controller='users',action='index'
//! sqlcommenter  action='index',application='MyApp',controller='users'
//! ```
//!
//! Values always go through [`escape_sql_comment`] before being quoted. Keys
//! come from configuration and are written as-is.
//!
//! The SQLCommenter specification lives at <https://google.github.io/sqlcommenter/spec/>.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer};
use tracing::error;

use crate::error::QueryLogsError;
use crate::escape::escape_sql_comment;
use crate::tags::ResolvedTag;

/// Format of the comment body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagsFormatter {
    /// Declaration order, values escaped but not encoded.
    #[default]
    Legacy,
    /// Sorted by key, values escaped then percent-encoded.
    SqlCommenter,
}

impl TagsFormatter {
    /// Formats `tags` as a comment body, without the `/*` `*/` delimiters.
    ///
    /// An empty slice yields an empty string.
    #[must_use]
    pub fn format(&self, tags: &[ResolvedTag]) -> String {
        match self {
            TagsFormatter::Legacy => tags
                .iter()
                .map(|tag| format!("{}='{}'", tag.key, escape_sql_comment(tag.value_string())))
                .collect::<Vec<_>>()
                .join(","),
            TagsFormatter::SqlCommenter => {
                let mut pairs: Vec<(&str, String)> = tags
                    .iter()
                    .map(|tag| {
                        let escaped = escape_sql_comment(tag.value_string());
                        (tag.key.as_str(), urlencoding::encode(&escaped).into_owned())
                    })
                    .collect();
                // Equal keys are ordered by value so permutations of the same
                // tags always produce the same comment.
                pairs.sort();
                pairs
                    .iter()
                    .map(|(key, value)| format!("{key}='{value}'"))
                    .collect::<Vec<_>>()
                    .join(",")
            }
        }
    }
}

/// Parses formatter names (case-insensitive, surrounding whitespace ignored).
///
/// - `"legacy"` → `TagsFormatter::Legacy`
/// - `"sqlcommenter"` → `TagsFormatter::SqlCommenter`
///
/// Any other name is rejected with [`QueryLogsError::UnsupportedFormatter`].
impl FromStr for TagsFormatter {
    type Err = QueryLogsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(TagsFormatter::Legacy),
            "sqlcommenter" => Ok(TagsFormatter::SqlCommenter),
            _ => {
                error!("Query logs formatter is unsupported: {:?}", s);
                Err(QueryLogsError::UnsupportedFormatter(s.to_string()))
            }
        }
    }
}

impl Display for TagsFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TagsFormatter::Legacy => "legacy",
            TagsFormatter::SqlCommenter => "sqlcommenter",
        };
        write!(f, "{name}")
    }
}

impl<'de> Deserialize<'de> for TagsFormatter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TagsFormatter::from_str(&s).map_err(serde::de::Error::custom)
    }
}
