//! Application Configuration
//!
//! Configuration for the server and client binaries, read from the
//! environment through [`platform::config`].

use std::time::Duration;

use kernel::error::app_error::{AppError, AppResult};
use platform::config::{Env, FromEnv};
use platform::framing::DEFAULT_MAX_FRAME_LEN;
use platform::telemetry::LoggerConfig;
use tokio::sync::Semaphore;

use crate::domain::codec::CHALLENGE_LEN;
use crate::domain::hashcash::Hashcash;
use crate::domain::value_objects::Difficulty;

/// PoW configuration (`POW_*` keys)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowConfig {
    /// Difficulty in leading zero bits. The client treats it as a ceiling.
    pub difficulty_bits: u8,
    /// Freshness window for issued challenges
    pub challenge_ttl: Duration,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            difficulty_bits: Difficulty::DEFAULT.bits(),
            challenge_ttl: Duration::from_secs(60),
        }
    }
}

impl PowConfig {
    pub fn hashcash(&self) -> AppResult<Hashcash> {
        Hashcash::new(self.difficulty_bits, self.challenge_ttl)
            .map_err(|e| AppError::config(format!("POW_COMPLEXITY: {e}")))
    }
}

impl FromEnv for PowConfig {
    fn from_env(env: &Env<'_>) -> AppResult<Self> {
        let defaults = Self::default();
        let config = Self {
            difficulty_bits: env.parse("POW_COMPLEXITY", defaults.difficulty_bits)?,
            challenge_ttl: env.duration("POW_CHALLENGE_TTL", defaults.challenge_ttl)?,
        };
        config.hashcash()?;
        Ok(config)
    }
}

/// Server configuration (`SERVER_*`, `FRAME_MAX_BYTES`, `POW_*`, `LOGGER_*`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    /// TCP keep-alive; zero disables it
    pub keep_alive: Duration,
    /// Budget for a whole handshake, counted from dispatch
    pub conn_deadline: Duration,
    /// How long an accepted socket may wait for a queue slot
    pub accept_timeout: Duration,
    /// Admission queue capacity
    pub workers: usize,
    /// Cap on concurrently running handlers; `None` is unbounded
    pub max_handlers: Option<usize>,
    pub max_frame_len: usize,
    pub pow: PowConfig,
    pub logger: LoggerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8000".to_string(),
            keep_alive: Duration::from_secs(15),
            conn_deadline: Duration::from_secs(10),
            accept_timeout: Duration::from_secs(3),
            workers: 1,
            max_handlers: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            pow: PowConfig::default(),
            logger: LoggerConfig::default(),
        }
    }
}

impl FromEnv for ServerConfig {
    fn from_env(env: &Env<'_>) -> AppResult<Self> {
        let defaults = Self::default();

        let workers = env.parse("SERVER_WORKERS", defaults.workers)?;
        if workers == 0 {
            return Err(AppError::config("SERVER_WORKERS must be at least 1"));
        }
        check_slots("SERVER_WORKERS", workers)?;
        let max_handlers = match env.parse("SERVER_MAX_HANDLERS", 0usize)? {
            0 => None,
            n => Some(check_slots("SERVER_MAX_HANDLERS", n)?),
        };

        Ok(Self {
            addr: env.string("SERVER_ADDR", &defaults.addr),
            keep_alive: env.duration("SERVER_KEEP_ALIVE", defaults.keep_alive)?,
            conn_deadline: env.duration("SERVER_CONN_DEADLINE", defaults.conn_deadline)?,
            accept_timeout: env.duration("SERVER_ACCEPT_TIMEOUT", defaults.accept_timeout)?,
            workers,
            max_handlers,
            max_frame_len: frame_max_bytes(env)?,
            pow: PowConfig::from_env(env)?,
            logger: LoggerConfig::from_env(env)?,
        })
    }
}

/// Client configuration (`CLIENT_*`, `SERVER_ADDR`, `FRAME_MAX_BYTES`, `POW_*`, `LOGGER_*`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_addr: String,
    pub request_count: usize,
    pub keep_alive: Duration,
    /// Per-step timeout for dialing and each framed read/write
    pub io_timeout: Duration,
    pub max_frame_len: usize,
    pub pow: PowConfig,
    pub logger: LoggerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8000".to_string(),
            request_count: 100,
            keep_alive: Duration::from_secs(15),
            io_timeout: Duration::from_secs(10),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            pow: PowConfig::default(),
            logger: LoggerConfig::default(),
        }
    }
}

impl FromEnv for ClientConfig {
    fn from_env(env: &Env<'_>) -> AppResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            server_addr: env.string("SERVER_ADDR", &defaults.server_addr),
            request_count: env.parse("CLIENT_REQUEST_COUNT", defaults.request_count)?,
            keep_alive: env.duration("CLIENT_KEEP_ALIVE", defaults.keep_alive)?,
            io_timeout: env.duration("CLIENT_IO_TIMEOUT", defaults.io_timeout)?,
            max_frame_len: frame_max_bytes(env)?,
            pow: PowConfig::from_env(env)?,
            logger: LoggerConfig::from_env(env)?,
        })
    }
}

/// Queue and handler slots are backed by tokio semaphores.
fn check_slots(key: &str, n: usize) -> AppResult<usize> {
    if n > Semaphore::MAX_PERMITS {
        return Err(AppError::config(format!(
            "{key} must be at most {}",
            Semaphore::MAX_PERMITS
        )));
    }
    Ok(n)
}

fn frame_max_bytes(env: &Env<'_>) -> AppResult<usize> {
    let max = env.parse("FRAME_MAX_BYTES", DEFAULT_MAX_FRAME_LEN)?;
    if max < CHALLENGE_LEN {
        return Err(AppError::config(format!(
            "FRAME_MAX_BYTES must be at least {CHALLENGE_LEN}"
        )));
    }
    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::error::kind::ErrorKind;

    #[test]
    fn test_server_defaults() {
        let env: [(&str, &str); 0] = [];
        let config = ServerConfig::from_env(&Env::new(&env)).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.addr, "0.0.0.0:8000");
        assert_eq!(config.workers, 1);
        assert_eq!(config.max_handlers, None);
        assert_eq!(config.pow.difficulty_bits, 20);
    }

    #[test]
    fn test_client_defaults() {
        let env: [(&str, &str); 0] = [];
        let config = ClientConfig::from_env(&Env::new(&env)).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.server_addr, "127.0.0.1:8000");
        assert_eq!(config.request_count, 100);
    }

    #[test]
    fn test_server_overrides() {
        let env = [
            ("SERVER_ADDR", "127.0.0.1:9000"),
            ("SERVER_CONN_DEADLINE", "250ms"),
            ("SERVER_WORKERS", "4"),
            ("SERVER_MAX_HANDLERS", "8"),
            ("POW_COMPLEXITY", "12"),
            ("POW_CHALLENGE_TTL", "2m"),
            ("LOGGER_LEVEL", "warn"),
        ];
        let config = ServerConfig::from_env(&Env::new(&env)).unwrap();
        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.conn_deadline, Duration::from_millis(250));
        assert_eq!(config.workers, 4);
        assert_eq!(config.max_handlers, Some(8));
        assert_eq!(config.pow.difficulty_bits, 12);
        assert_eq!(config.pow.challenge_ttl, Duration::from_secs(120));
        assert_eq!(config.logger.level, platform::telemetry::LogLevel::Warn);
    }

    #[test]
    fn test_validation() {
        for env in [
            [("SERVER_WORKERS", "0")],
            [("POW_COMPLEXITY", "0")],
            [("POW_COMPLEXITY", "40")],
            [("FRAME_MAX_BYTES", "16")],
            [("SERVER_KEEP_ALIVE", "soon")],
        ] {
            let err = ServerConfig::from_env(&Env::new(&env)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{env:?}");
        }
    }

    #[test]
    fn test_slot_counts_are_bounded() {
        let largest = Semaphore::MAX_PERMITS.to_string();
        let too_many = (Semaphore::MAX_PERMITS + 1).to_string();
        let saturated = usize::MAX.to_string();

        for key in ["SERVER_WORKERS", "SERVER_MAX_HANDLERS"] {
            for value in [&too_many, &saturated] {
                let env = [(key, value.as_str())];
                let err = ServerConfig::from_env(&Env::new(&env)).unwrap_err();
                assert_eq!(err.kind(), ErrorKind::Configuration, "{key}={value}");
                assert!(err.message().contains(key), "{err}");
            }

            let env = [(key, largest.as_str())];
            assert!(ServerConfig::from_env(&Env::new(&env)).is_ok(), "{key}");
        }
    }
}
