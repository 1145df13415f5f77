//! Loading and saving `ProxyConfig`
//!
//! File format is one `key=value` per line; blank lines and lines starting
//! with `#` are skipped. Environment variables use the `ANON_` names listed
//! in [`ENV_KEYS`] and take precedence over the file.

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use super::types::ProxyConfig;

/// Config file read by [`ProxyConfig::load`] when `ANON_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "config.txt";

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "ANON_CONFIG";

/// Environment variable → config key
pub const ENV_KEYS: &[(&str, &str)] = &[
    ("ANON_PORT", "port"),
    ("ANON_BIND_ADDRESS", "bind_address"),
    ("ANON_BACKEND_URL", "backend_api_url"),
    ("ANON_BACKEND_TIMEOUT_MS", "backend_timeout_ms"),
    ("ANON_CONNECT_TIMEOUT_MS", "connect_timeout_ms"),
    ("ANON_MAX_CONNECTIONS", "max_connections"),
    ("ANON_HASH_SALT", "hash_salt"),
    ("ANON_CACHE_MAX_ENTRIES", "cache_max_entries"),
    ("ANON_CACHE_EVICT_CHUNK", "cache_evict_chunk"),
    ("ANON_JITTER_MIN_MS", "jitter_min_ms"),
    ("ANON_JITTER_MAX_MS", "jitter_max_ms"),
    ("ANON_BATCH_SIZE", "batch_size"),
    ("ANON_TIMEOUT_GRACE_MS", "timeout_grace_ms"),
];

/// Keys accepted by older deployments that no longer have an effect
const RETIRED_KEYS: &[&str] = &[
    "ssl_port",
    "ssl_cert_file",
    "ssl_key_file",
    "enable_ssl",
    "thread_pool_size",
    "connection_timeout",
];

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| anyhow!("Invalid value '{value}' for '{key}': {e}"))
}

impl ProxyConfig {
    /// Defaults, overlaid with the config file (if present) and then the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// contains a malformed value, or if an `ANON_*` variable is malformed.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let mut config = Self::load_file_or_default(Path::new(&path))?;
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    /// Read `path` if it exists; fall back to defaults if it does not
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_file_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Defaults overlaid with the contents of `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is malformed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open config file: {}", path.display()))?;
        let mut config = Self::default();
        config
            .apply_file_contents(&contents)
            .with_context(|| format!("In config file {}", path.display()))?;
        Ok(config)
    }

    /// Apply `key=value` lines
    ///
    /// # Errors
    ///
    /// Returns an error on the first malformed value.
    pub fn apply_file_contents(&mut self, contents: &str) -> Result<()> {
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!("Ignoring config line {}: no '=' found", line_no + 1);
                continue;
            };
            self.set(key.trim(), value.trim())
                .with_context(|| format!("line {}", line_no + 1))?;
        }
        Ok(())
    }

    /// Apply recognised `ANON_*` variables from `vars`
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable whose value is malformed.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if let Some((_, key)) = ENV_KEYS.iter().find(|(env, _)| *env == name) {
                self.set(key, &value)
                    .with_context(|| format!("Environment variable {name}"))?;
            }
        }
        Ok(())
    }

    /// Set one setting by its config-file key
    ///
    /// Unknown keys are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not parse for that key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "port" => self.port = parse_value(key, value)?,
            "bind_address" => self.bind_address = value.to_string(),
            "backend_api_url" => self.backend_api_url = value.to_string(),
            "backend_timeout_ms" => self.backend_timeout_ms = parse_value(key, value)?,
            "connect_timeout_ms" => self.connect_timeout_ms = parse_value(key, value)?,
            "max_connections" => self.max_connections = parse_value(key, value)?,
            "hash_salt" => self.hash_salt = value.to_string(),
            "cache_max_entries" => self.cache_max_entries = parse_value(key, value)?,
            "cache_evict_chunk" => self.cache_evict_chunk = parse_value(key, value)?,
            "jitter_min_ms" => self.jitter_min_ms = parse_value(key, value)?,
            "jitter_max_ms" => self.jitter_max_ms = parse_value(key, value)?,
            "batch_size" => self.batch_size = parse_value(key, value)?,
            "timeout_grace_ms" => self.timeout_grace_ms = parse_value(key, value)?,
            retired if RETIRED_KEYS.contains(&retired) => {
                warn!("Config key '{retired}' is no longer supported and is ignored");
            }
            unknown => warn!("Unknown config key '{unknown}' ignored"),
        }
        Ok(())
    }

    /// Render in the config-file format
    #[must_use]
    pub fn to_file_contents(&self) -> String {
        let mut out = String::from("# Anoverif Configuration File\n");
        let _ = writeln!(out, "port={}", self.port);
        let _ = writeln!(out, "bind_address={}", self.bind_address);
        let _ = writeln!(out, "backend_api_url={}", self.backend_api_url);
        let _ = writeln!(out, "backend_timeout_ms={}", self.backend_timeout_ms);
        let _ = writeln!(out, "connect_timeout_ms={}", self.connect_timeout_ms);
        let _ = writeln!(out, "max_connections={}", self.max_connections);
        let _ = writeln!(out, "hash_salt={}", self.hash_salt);
        let _ = writeln!(out, "cache_max_entries={}", self.cache_max_entries);
        let _ = writeln!(out, "cache_evict_chunk={}", self.cache_evict_chunk);
        let _ = writeln!(out, "jitter_min_ms={}", self.jitter_min_ms);
        let _ = writeln!(out, "jitter_max_ms={}", self.jitter_max_ms);
        let _ = writeln!(out, "batch_size={}", self.batch_size);
        let _ = writeln!(out, "timeout_grace_ms={}", self.timeout_grace_ms);
        out
    }

    /// Write every setting to `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_file_contents())
            .with_context(|| format!("Cannot create config file: {}", path.display()))
    }
}
