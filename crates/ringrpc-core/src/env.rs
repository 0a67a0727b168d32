//! Environment variable configuration.
//!
//! Every tunable of the server can be overridden with a `RINGRPC_*`
//! variable. Unset or unparsable values fall back to the default.
//!
//! ```ignore
//! use ringrpc_core::env::{env_get, env_get_bool};
//!
//! let port: u16 = env_get("RINGRPC_PORT", 8000);
//! let keep_going = env_get_bool("RINGRPC_CONTINUE_ON_ERROR", false);
//! ```

use std::str::FromStr;

/// Parse `key` as `T`, or return `default`.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// `Some(T)` only if `key` is set and parses.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// "1", "true", "yes", "on" (any case) are true; any other set value is
/// false; unset returns `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => parse_bool(&val),
        Err(_) => default,
    }
}

/// Flag-style boolean used by both env vars and CLI values.
pub fn parse_bool(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
