//! Environment variable loading.

use std::env;
use std::str::FromStr;

use super::ServerConfig;
use super::{merge, validation};

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// Missing values fall back to defaults. Required values (connection
    /// string, callback host, Voice Live endpoint and key) must be set.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

/// Read a variable, treating empty or whitespace-only values as unset.
pub(super) fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable.
pub(super) fn parse<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name} ({raw}): {e}").into()),
        None => Ok(None),
    }
}

/// Read a boolean flag. Accepts true/false, 1/0, yes/no and on/off.
pub(super) fn flag(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match var(name) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(format!("Invalid boolean for {name}: {raw}").into()),
        },
        None => Ok(None),
    }
}
