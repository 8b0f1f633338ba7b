use dockhand_common::{ContainerEngine, ContainerStatus, LogQuery};
use tracing::warn;

/// Number of trailing log lines scanned for error signals.
pub const ERROR_SCAN_WINDOW: usize = 100;

const ERROR_KEYWORDS: [&str; 3] = ["error", "fail", "exception"];

pub fn classify_status(raw: &str) -> ContainerStatus {
    match raw {
        "running" => ContainerStatus::Running,
        "exited" => ContainerStatus::Stopped,
        "restarting" => ContainerStatus::Restarted,
        _ => ContainerStatus::Failed,
    }
}

/// Count lines in the last `window` lines that look like errors and return
/// the most recent one, lowercased.
pub fn detect_errors<S: AsRef<str>>(lines: &[S], window: usize) -> (usize, Option<String>) {
    let start = lines.len().saturating_sub(window);
    let matches: Vec<String> = lines[start..]
        .iter()
        .map(|line| line.as_ref().to_lowercase())
        .filter(|line| ERROR_KEYWORDS.iter().any(|kw| line.contains(kw)))
        .collect();
    let count = matches.len();
    (count, matches.into_iter().last())
}

/// Scan a container's recent logs for errors. Never fails: an unreadable
/// log counts as no errors.
pub async fn scan_container_errors(
    engine: &dyn ContainerEngine,
    container_id: &str,
    container_name: &str,
) -> (usize, Option<String>) {
    match engine
        .container_logs(container_id, LogQuery::tail(ERROR_SCAN_WINDOW))
        .await
    {
        Ok(lines) => detect_errors(&lines, ERROR_SCAN_WINDOW),
        Err(e) => {
            warn!(container = %container_name, error = %e, "Could not read logs");
            (0, None)
        }
    }
}
