// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Tags SQL statements read from stdin, one per line.
//!
//! ```text
//! $ echo "SELECT 1" | DD_QUERY_LOGS_FORMAT=sqlcommenter query-logs application=MyApp job=Worker
//! SELECT 1 /*application='MyApp',job='Worker'*/
//! ```

use std::env;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use query_logs::{QueryLogs, QueryLogsConfig, UnitOfWork};

pub fn main() -> ExitCode {
    let log_level = env::var("DD_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = match EnvFilter::try_new(&log_level) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("could not parse log level {log_level:?} in configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("could not install logger: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    debug!(
        "Starting query logs with format={} prepend_comment={} cache_comment={}",
        config.format, config.prepend_comment, config.cache_comment
    );

    let mut unit = match parse_context_args(env::args().skip(1)) {
        Ok(unit) => unit,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let query_logs = QueryLogs::new(config);
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let sql = match line {
            Ok(sql) => sql,
            Err(e) => {
                error!("Failed to read from stdin: {e}");
                return ExitCode::FAILURE;
            }
        };
        if sql.trim().is_empty() {
            continue;
        }

        let tagged = match query_logs.tag_sql(&mut unit, &sql) {
            Ok(tagged) => tagged,
            Err(e) => {
                error!("Failed to tag query: {e}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = writeln!(stdout, "{tagged}") {
            error!("Failed to write to stdout: {e}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn load_config() -> Result<QueryLogsConfig, String> {
    QueryLogsConfig::from_env().map_err(|e| format!("Query logs not started: {e}"))
}

/// Builds the unit of work from `key=value` arguments.
fn parse_context_args<I>(args: I) -> Result<UnitOfWork, String>
where
    I: IntoIterator<Item = String>,
{
    let mut unit = UnitOfWork::new();
    for arg in args {
        match arg.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                unit.set(key, value);
            }
            _ => {
                return Err(format!(
                    "Context arguments must look like key=value, got: {arg:?}"
                ));
            }
        }
    }
    Ok(unit)
}
