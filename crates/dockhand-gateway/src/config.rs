//! Gateway settings read from `DOCKHAND_*` environment variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dockhand_engine::logs::DEFAULT_LOG_TAIL;
use dockhand_engine::streaming::{DEFAULT_STATS_INTERVAL, DEFAULT_TERMINAL_QUEUE};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Allowed CORS origins. `["*"]` allows any origin.
    pub cors_origins: Vec<String>,
    pub log_dir: PathBuf,
    pub stats_interval: Duration,
    pub terminal_shell: Vec<String>,
    pub terminal_queue: usize,
    pub log_tail: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            log_dir: PathBuf::from("logs"),
            stats_interval: DEFAULT_STATS_INTERVAL,
            terminal_shell: vec!["/bin/sh".to_string()],
            terminal_queue: DEFAULT_TERMINAL_QUEUE,
            log_tail: DEFAULT_LOG_TAIL,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset or blank variables
    /// keep their defaults; unparsable ones are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(host) = parse_var(&get, "DOCKHAND_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&get, "DOCKHAND_PORT") {
            config.port = port;
        }
        if let Some(origins) = get("DOCKHAND_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(dir) = get("DOCKHAND_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(ms) =
            parse_var::<u64>(&get, "DOCKHAND_STATS_INTERVAL_MS").filter(|ms| *ms > 0)
        {
            config.stats_interval = Duration::from_millis(ms);
        }
        if let Some(shell) = get("DOCKHAND_TERMINAL_SHELL") {
            config.terminal_shell = shell.split_whitespace().map(str::to_string).collect();
        }
        if let Some(queue) =
            parse_var::<usize>(&get, "DOCKHAND_TERMINAL_QUEUE").filter(|q| *q > 0)
        {
            config.terminal_queue = queue;
        }
        if let Some(tail) = parse_var(&get, "DOCKHAND_LOG_TAIL") {
            config.log_tail = tail;
        }
        config
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_var<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = key, value = %raw, "Ignoring invalid setting, using default");
            None
        }
    }
}
