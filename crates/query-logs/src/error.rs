// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors that can occur when configuring query logs or tagging a query
#[derive(Debug, thiserror::Error)]
pub enum QueryLogsError {
    #[error("Formatter is unsupported: {0}")]
    UnsupportedFormatter(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tag handler for '{key}' failed: {source}")]
    Handler {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}
