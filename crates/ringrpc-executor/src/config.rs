//! Server configuration.
//!
//! Defaults: port 8000, backlog 10, a 256-entry ring, 8 KiB read
//! buffers and a 1024-byte request-line bound.
//! Every field can be overridden from the environment:
//!
//! | Variable                    | Field            |
//! |-----------------------------|------------------|
//! | `RINGRPC_PORT`              | `port`           |
//! | `RINGRPC_BACKLOG`           | `backlog`        |
//! | `RINGRPC_RING_ENTRIES`      | `ring_entries`   |
//! | `RINGRPC_READ_BUF`          | `read_buf_size`  |
//! | `RINGRPC_MAX_LINE`          | `max_line`       |
//! | `RINGRPC_MAX_CONNS`         | `max_conns`      |
//! | `RINGRPC_CONTINUE_ON_ERROR` | `error_policy`   |
//! | `RINGRPC_STATS_SECS`        | `stats_interval` |

use ringrpc_core::env::{env_get, env_get_bool};
use ringrpc_core::error::ErrorPolicy;

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub backlog: i32,
    /// Submission queue depth of the ring.
    pub ring_entries: u32,
    /// Capacity of each request read buffer.
    pub read_buf_size: usize,
    /// How far into the request the CRLF is searched for.
    pub max_line: usize,
    /// Live connections admitted at once; extra accepts are closed.
    pub max_conns: usize,
    pub error_policy: ErrorPolicy,
    /// Zero disables the periodic stats line.
    pub stats_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            backlog: 10,
            ring_entries: 256,
            read_buf_size: 8192,
            max_line: 1024,
            // One accept plus one operation per connection fits the ring.
            max_conns: 255,
            error_policy: ErrorPolicy::Exit,
            stats_interval: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with any `RINGRPC_*` variables that are set.
    pub fn from_env() -> Self {
        let d = Self::default();
        let continue_on_error = env_get_bool(
            "RINGRPC_CONTINUE_ON_ERROR",
            d.error_policy == ErrorPolicy::Continue,
        );
        Self {
            port: env_get("RINGRPC_PORT", d.port),
            backlog: env_get("RINGRPC_BACKLOG", d.backlog),
            ring_entries: env_get("RINGRPC_RING_ENTRIES", d.ring_entries),
            read_buf_size: env_get("RINGRPC_READ_BUF", d.read_buf_size),
            max_line: env_get("RINGRPC_MAX_LINE", d.max_line),
            max_conns: env_get("RINGRPC_MAX_CONNS", d.max_conns),
            error_policy: if continue_on_error {
                ErrorPolicy::Continue
            } else {
                ErrorPolicy::Exit
            },
            stats_interval: Duration::from_secs(env_get(
                "RINGRPC_STATS_SECS",
                d.stats_interval.as_secs(),
            )),
        }
    }

    /// Clamp values that would make the loop unusable.
    pub fn normalized(mut self) -> Self {
        self.ring_entries = self.ring_entries.max(2);
        self.read_buf_size = self.read_buf_size.max(2);
        self.max_line = self.max_line.max(1);
        self.max_conns = self.max_conns.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ServerConfig::default();
        assert_eq!(c.port, 8000);
        assert_eq!(c.backlog, 10);
        assert_eq!(c.ring_entries, 256);
        assert_eq!(c.read_buf_size, 8192);
        assert_eq!(c.max_line, 1024);
        assert_eq!(c.error_policy, ErrorPolicy::Exit);
    }

    #[test]
    fn env_overrides() {
        std::env::set_var("RINGRPC_MAX_CONNS", "17");
        std::env::set_var("RINGRPC_CONTINUE_ON_ERROR", "yes");
        let c = ServerConfig::from_env();
        assert_eq!(c.max_conns, 17);
        assert_eq!(c.error_policy, ErrorPolicy::Continue);
        std::env::remove_var("RINGRPC_MAX_CONNS");
        std::env::remove_var("RINGRPC_CONTINUE_ON_ERROR");
    }

    #[test]
    fn normalized_clamps_zeroes() {
        let c = ServerConfig {
            ring_entries: 0,
            read_buf_size: 0,
            max_line: 0,
            max_conns: 0,
            ..ServerConfig::default()
        }
        .normalized();
        assert_eq!(c.ring_entries, 2);
        assert_eq!(c.max_conns, 1);
        assert_eq!(c.max_line, 1);
    }
}
