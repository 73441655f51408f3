//! Server configuration from environment variables.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `LIME_ADDR` | listen address (`host:port`) | `127.0.0.1:8000` |
//! | `LIME_REQUEST_TIMEOUT_SECS` | per-request budget; `0` disables | `30` |
//! | `LIME_SESSION_TTL_SECS` | session and `auth` cookie lifetime | `3600` |
//! | `LIME_SESSION_SWEEP_SECS` | expired-session sweep period; `0` disables | `60` |
//! | `LIME_MAX_BODY_BYTES` | largest accepted request body; larger gets `413` | `1048576` |
//!
//! A value that does not parse is logged and replaced by its default, so a
//! typo never keeps the server from starting.
//!
//! ```rust
//! use lime::Config;
//!
//! let config = Config::from_env();
//! println!("listening on {}", config.addr);
//! ```

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const ADDR_VAR: &str = "LIME_ADDR";
pub const REQUEST_TIMEOUT_VAR: &str = "LIME_REQUEST_TIMEOUT_SECS";
pub const SESSION_TTL_VAR: &str = "LIME_SESSION_TTL_SECS";
pub const SESSION_SWEEP_VAR: &str = "LIME_SESSION_SWEEP_SECS";
pub const MAX_BODY_VAR: &str = "LIME_MAX_BODY_BYTES";

const DEFAULT_ADDR: SocketAddr = SocketAddr::V4(std::net::SocketAddrV4::new(
    std::net::Ipv4Addr::LOCALHOST,
    8000,
));
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;
const DEFAULT_SESSION_SWEEP_SECS: u64 = 60;
const DEFAULT_MAX_BODY_BYTES: usize = 1_048_576;

/// Runtime settings for [`Server`](crate::Server).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub addr: SocketAddr,
    /// Upper bound on middleware + handler time for one request. `None`
    /// waits forever.
    pub request_timeout: Option<Duration>,
    /// Lifetime of sessions and their `auth` cookies. Applied through
    /// [`App::with_config`](crate::App::with_config).
    pub session_ttl: Duration,
    /// How often expired sessions are purged. `None` never purges.
    pub session_sweep_interval: Option<Duration>,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR,
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            session_sweep_interval: Some(Duration::from_secs(DEFAULT_SESSION_SWEEP_SECS)),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str, default: u64| parse_or(&lookup, key, default);
        let optional = |n: u64| (n > 0).then(|| Duration::from_secs(n));

        Self {
            addr: parse_or(&lookup, ADDR_VAR, DEFAULT_ADDR),
            request_timeout: optional(secs(REQUEST_TIMEOUT_VAR, DEFAULT_REQUEST_TIMEOUT_SECS)),
            session_ttl: Duration::from_secs(secs(SESSION_TTL_VAR, DEFAULT_SESSION_TTL_SECS)),
            session_sweep_interval: optional(secs(SESSION_SWEEP_VAR, DEFAULT_SESSION_SWEEP_SECS)),
            max_body_bytes: parse_or(&lookup, MAX_BODY_VAR, DEFAULT_MAX_BODY_BYTES),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(key, value = %raw, "invalid configuration value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(from_pairs(&[]), Config::default());
        assert_eq!(Config::default().addr.to_string(), "127.0.0.1:8000");
    }

    #[test]
    fn reads_all_variables() {
        let config = from_pairs(&[
            (ADDR_VAR, "0.0.0.0:9000"),
            (REQUEST_TIMEOUT_VAR, "5"),
            (SESSION_TTL_VAR, " 120 "),
            (SESSION_SWEEP_VAR, "10"),
            (MAX_BODY_VAR, "4096"),
        ]);
        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.session_ttl, Duration::from_secs(120));
        assert_eq!(config.session_sweep_interval, Some(Duration::from_secs(10)));
        assert_eq!(config.max_body_bytes, 4096);
    }

    #[test]
    fn zero_disables_timeout_and_sweep() {
        let config = from_pairs(&[(REQUEST_TIMEOUT_VAR, "0"), (SESSION_SWEEP_VAR, "0")]);
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.session_sweep_interval, None);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = from_pairs(&[
            (ADDR_VAR, "localhost"),
            (SESSION_TTL_VAR, "an hour"),
            (MAX_BODY_VAR, "-1"),
        ]);
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.session_ttl, Duration::from_secs(DEFAULT_SESSION_TTL_SECS));
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }
}
