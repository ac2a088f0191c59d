// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sanitization of SQL comment payloads.

/// Escapes content so it can be embedded in a SQL block comment.
///
/// The content is stringified, then:
/// - one leading comment opener (`/*`, an optional `+` hint marker and one
///   optional whitespace character) is removed from the very start
/// - one trailing comment closer (one optional whitespace character and `*/`)
///   is removed from the very end
/// - every remaining `*/` becomes `* /` and every remaining `/*` becomes `/ *`
///
/// Outer delimiters are stripped before the inner ones are neutralized so a
/// payload that was already wrapped by the caller is not mangled.
///
/// # Examples
///
/// ```
/// use query_logs::escape::escape_sql_comment;
///
/// assert_eq!(escape_sql_comment("/* app:web */"), "app:web");
/// assert_eq!(escape_sql_comment("*/DROP TABLE x;/*"), "* /DROP TABLE x;/ *");
/// assert_eq!(escape_sql_comment(42), "42");
/// ```
pub fn escape_sql_comment(content: impl std::fmt::Display) -> String {
    let content = content.to_string();
    strip_outer_delimiters(&content)
        .replace("*/", "* /")
        .replace("/*", "/ *")
}

fn strip_outer_delimiters(content: &str) -> &str {
    let mut stripped = content;

    if let Some(rest) = stripped.strip_prefix("/*") {
        let rest = rest.strip_prefix('+').unwrap_or(rest);
        stripped = match rest.chars().next() {
            Some(ch) if ch.is_ascii_whitespace() => &rest[1..],
            _ => rest,
        };
    }

    if let Some(rest) = stripped.strip_suffix("*/") {
        stripped = match rest.chars().next_back() {
            Some(ch) if ch.is_ascii_whitespace() => &rest[..rest.len() - 1],
            _ => rest,
        };
    }

    stripped
}
