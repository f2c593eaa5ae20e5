//! Environment Configuration
//!
//! Typed getters over a key/value source, shared by the server and client
//! configuration types. Unset or blank keys fall back to their defaults;
//! present but unparsable values are configuration errors naming the key.

use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::time::Duration;

use kernel::error::app_error::{AppError, AppResult};

/// Where configuration values are looked up
pub trait Source {
    fn get(&self, key: &str) -> Option<String>;
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Source for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Source for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl<const N: usize> Source for [(&str, &str); N] {
    fn get(&self, key: &str) -> Option<String> {
        self.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| (*v).to_string())
    }
}

/// Configuration types that can be built from an [`Env`]
pub trait FromEnv: Sized {
    fn from_env(env: &Env<'_>) -> AppResult<Self>;
}

/// Load `C` from the process environment, after applying an optional `.env`
/// file from the working directory.
pub fn load<C: FromEnv>() -> AppResult<C> {
    dotenvy::dotenv().ok();
    C::from_env(&Env::new(&ProcessEnv))
}

/// Typed view over a [`Source`]
pub struct Env<'a> {
    source: &'a dyn Source,
}

impl<'a> Env<'a> {
    pub fn new(source: &'a dyn Source) -> Self {
        Self { source }
    }

    fn raw(&self, key: &str) -> Option<String> {
        self.source
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn string(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or_else(|| default.to_string())
    }

    pub fn parse<T>(&self, key: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: Error + Send + Sync + 'static,
    {
        match self.raw(key) {
            Some(raw) => raw.parse().map_err(|e| invalid(key, &raw).with_source(e)),
            None => Ok(default),
        }
    }

    /// Durations use humantime syntax: `15s`, `250ms`, `1m 30s`.
    pub fn duration(&self, key: &str, default: Duration) -> AppResult<Duration> {
        match self.raw(key) {
            Some(raw) => {
                humantime::parse_duration(&raw).map_err(|e| invalid(key, &raw).with_source(e))
            }
            None => Ok(default),
        }
    }

    pub fn bool(&self, key: &str, default: bool) -> AppResult<bool> {
        match self.raw(key) {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(invalid(key, &raw)),
            },
            None => Ok(default),
        }
    }
}

fn invalid(key: &str, raw: &str) -> AppError {
    AppError::config(format!("{key}: invalid value {raw:?}"))
}
