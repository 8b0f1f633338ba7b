use chrono::DateTime;
use dockhand_common::api::{ContainerLogsResponse, LogEntry};
use dockhand_common::{ContainerEngine, LogQuery, LogTail, Result};
use tracing::{debug, instrument};

use crate::resolve_container;

/// Default number of trailing lines when no cursor is given.
pub const DEFAULT_LOG_TAIL: usize = 500;

/// Split a timestamped engine line into its timestamp and message.
pub fn parse_line(line: &str) -> LogEntry {
    if let Some((head, rest)) = line.split_once(' ') {
        if DateTime::parse_from_rfc3339(head).is_ok() {
            return LogEntry {
                timestamp: Some(head.to_string()),
                message: rest.to_string(),
            };
        }
    }
    LogEntry {
        timestamp: None,
        message: line.to_string(),
    }
}

/// Fetch one page of logs.
///
/// With a `since` cursor the full range after the cursor is requested,
/// starting one second past it so the boundary line is not repeated.
#[instrument(skip(engine))]
pub async fn query_logs(
    engine: &dyn ContainerEngine,
    container: &str,
    tail: usize,
    since: Option<i64>,
    until: Option<i64>,
) -> Result<ContainerLogsResponse> {
    let record = resolve_container(engine, container).await?;

    let query = match since {
        Some(cursor) => LogQuery {
            tail: LogTail::All,
            since: Some(cursor.saturating_add(1)),
            until,
            timestamps: true,
        },
        None => LogQuery {
            tail: LogTail::Lines(tail),
            since: None,
            until,
            timestamps: true,
        },
    };

    let lines = engine.container_logs(&record.id, query).await?;
    let logs: Vec<LogEntry> = lines
        .iter()
        .filter(|line| !line.is_empty())
        .map(|line| parse_line(line))
        .collect();

    let next_since = logs
        .iter()
        .rev()
        .filter_map(|entry| entry.timestamp.as_deref())
        .find_map(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.timestamp());

    debug!(container = %record.name, count = logs.len(), ?next_since, "Fetched logs");
    Ok(ContainerLogsResponse {
        count: logs.len(),
        logs,
        next_since,
    })
}
