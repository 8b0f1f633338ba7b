//! Derived metrics computed from raw engine counters.
//!
//! Every function here is pure and total: malformed or missing counters
//! produce zeroes (or `None`), never an error.

use chrono::{DateTime, Utc};
use dockhand_common::model::CpuStats;
use dockhand_common::StatsSample;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkIo {
    pub rx: u64,
    pub tx: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockIo {
    pub read: u64,
    pub write: u64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// CPU usage in percent of one core times the number of reported cores.
pub fn cpu_percent(current: &CpuStats, previous: &CpuStats) -> f64 {
    let cpu_delta =
        current.cpu_usage.total_usage as f64 - previous.cpu_usage.total_usage as f64;
    let system_delta = current.system_cpu_usage.unwrap_or(0) as f64
        - previous.system_cpu_usage.unwrap_or(0) as f64;

    if system_delta <= 0.0 || cpu_delta < 0.0 {
        return 0.0;
    }

    let online_cpus = current
        .cpu_usage
        .percpu_usage
        .as_ref()
        .map(Vec::len)
        .filter(|n| *n > 0)
        .unwrap_or(1) as f64;

    round2(cpu_delta / system_delta * online_cpus * 100.0)
}

pub fn sample_cpu_percent(sample: &StatsSample) -> f64 {
    cpu_percent(&sample.cpu_stats, &sample.precpu_stats)
}

/// Configured CPU limit in cores, when both quota and period are set.
pub fn cpu_limit_cores(quota: Option<i64>, period: Option<i64>) -> Option<f64> {
    match (quota, period) {
        (Some(q), Some(p)) if q > 0 && p > 0 => Some(round2(q as f64 / p as f64)),
        _ => None,
    }
}

pub fn network_io(sample: &StatsSample) -> NetworkIo {
    sample
        .networks
        .as_ref()
        .map(|networks| {
            networks.values().fold(NetworkIo::default(), |acc, n| NetworkIo {
                rx: acc.rx.saturating_add(n.rx_bytes),
                tx: acc.tx.saturating_add(n.tx_bytes),
            })
        })
        .unwrap_or_default()
}

pub fn block_io(sample: &StatsSample) -> BlockIo {
    let mut io = BlockIo::default();
    for entry in sample
        .blkio_stats
        .io_service_bytes_recursive
        .iter()
        .flatten()
    {
        if entry.op.eq_ignore_ascii_case("read") {
            io.read = io.read.saturating_add(entry.value);
        } else if entry.op.eq_ignore_ascii_case("write") {
            io.write = io.write.saturating_add(entry.value);
        }
    }
    io
}

pub fn memory_percent(usage: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    round2(usage as f64 / limit as f64 * 100.0)
}

/// Whole seconds since `started_at` (RFC 3339). `None` when the timestamp
/// is missing, unparsable or in the future.
pub fn uptime_seconds(started_at: Option<&str>, now: DateTime<Utc>) -> Option<i64> {
    let started = DateTime::parse_from_rfc3339(started_at?).ok()?;
    let elapsed = now.signed_duration_since(started.with_timezone(&Utc));
    (elapsed.num_seconds() >= 0).then(|| elapsed.num_seconds())
}
