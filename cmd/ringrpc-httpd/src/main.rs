//! ringrpc demo server
//!
//! Answers `POST /<n>` with the n-th Fibonacci number as the body.
//!
//! Usage:
//!     cargo build --release -p ringrpc-httpd
//!     ./target/release/ringrpc-httpd [--port 8000] [--max-conns 255]
//!         [--ring-entries 256] [--backlog 10] [--continue-on-error]
//!
//! Test with:
//!     curl -X POST http://localhost:8000/10      # → 55
//!     curl http://localhost:8000/10              # → 400
//!
//! Every option can also come from the environment (`RINGRPC_PORT`, ...);
//! the command line wins. `RINGRPC_LOG_LEVEL` picks the log verbosity.

use ringrpc_core::error::ErrorPolicy;
use ringrpc_core::logging;
use ringrpc_executor::config::ServerConfig;

use tracing::{error, info};

/// Largest n whose Fibonacci number fits in an i64.
const FIB_MAX_N: i64 = 92;

/// fib(0) = 0, fib(1) = 1. Negative input gives 0; n above 92 answers
/// fib(92), so no request can keep the loop busy.
fn fib(n: i64) -> i64 {
    let (mut a, mut b) = (0i64, 1i64);
    for _ in 0..n.clamp(0, FIB_MAX_N) {
        let next = a.wrapping_add(b);
        a = b;
        b = next;
    }
    a
}

/// Overlay command-line flags on `config`. Unparsable values keep the
/// previous setting; unknown flags are ignored.
fn apply_args(mut config: ServerConfig, args: &[String]) -> ServerConfig {
    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).map(String::as_str);
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                config.port = value.and_then(|v| v.parse().ok()).unwrap_or(config.port);
            }
            "--max-conns" => {
                i += 1;
                config.max_conns = value.and_then(|v| v.parse().ok()).unwrap_or(config.max_conns);
            }
            "--ring-entries" => {
                i += 1;
                config.ring_entries = value.and_then(|v| v.parse().ok()).unwrap_or(config.ring_entries);
            }
            "--backlog" => {
                i += 1;
                config.backlog = value.and_then(|v| v.parse().ok()).unwrap_or(config.backlog);
            }
            "--continue-on-error" => config.error_policy = ErrorPolicy::Continue,
            s => {
                if let Ok(port) = s.parse::<u16>() {
                    config.port = port;
                }
            }
        }
        i += 1;
    }
    config
}

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let config = apply_args(ServerConfig::from_env(), &args);

    match ringrpc_executor::serve(config, fib) {
        Ok(stats) => info!("served {} responses, bye", stats.responses),
        Err(e) => {
            error!("ringrpc-httpd: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("ringrpc-httpd")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn fib_values() {
        assert_eq!(fib(0), 0);
        assert_eq!(fib(1), 1);
        assert_eq!(fib(10), 55);
        assert_eq!(fib(90), 2_880_067_194_370_816_120);
        assert_eq!(fib(-3), 0);
    }

    #[test]
    fn fib_caps_huge_arguments() {
        assert_eq!(fib(FIB_MAX_N), 7_540_113_804_746_346_429);
        assert_eq!(fib(i64::MAX), fib(FIB_MAX_N));
    }

    #[test]
    fn flags_override_config() {
        let c = apply_args(
            ServerConfig::default(),
            &args(&["--port", "9001", "--max-conns", "7", "--ring-entries", "64", "--backlog", "3", "--continue-on-error"]),
        );
        assert_eq!(c.port, 9001);
        assert_eq!(c.max_conns, 7);
        assert_eq!(c.ring_entries, 64);
        assert_eq!(c.backlog, 3);
        assert_eq!(c.error_policy, ErrorPolicy::Continue);
    }

    #[test]
    fn bare_port_and_bad_values() {
        let c = apply_args(ServerConfig::default(), &args(&["8123", "-p", "nope", "--backlog"]));
        assert_eq!(c.port, 8123);
        assert_eq!(c.backlog, 10);
        assert_eq!(c.error_policy, ErrorPolicy::Exit);
    }
}
