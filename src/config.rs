//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::proxy::ProxySettings;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of cached items
    pub max_item_entries: usize,
    /// Maximum number of cached query pages (and, separately, scan pages)
    pub max_query_entries: usize,
    /// Item TTL in seconds
    pub item_ttl: u64,
    /// Query page TTL in seconds
    pub query_ttl: u64,
    /// Scan page TTL in seconds
    pub scan_ttl: u64,
    /// Table schema TTL in seconds
    pub schema_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Log every cache hit, miss, set and invalidation
    pub debug: bool,
    /// Tables to cache; empty caches all of them
    pub allowed_tables: Vec<String>,
    /// Request old/new images from the store to sharpen invalidation
    pub upgrade_return_values: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ITEM_ENTRIES` - Maximum cached items (default: 10000)
    /// - `MAX_QUERY_ENTRIES` - Maximum cached query or scan pages (default: 1000)
    /// - `ITEM_TTL` - Item TTL in seconds (default: 900)
    /// - `QUERY_TTL` - Query TTL in seconds (default: 300)
    /// - `SCAN_TTL` - Scan TTL in seconds (default: 300)
    /// - `SCHEMA_TTL` - Schema TTL in seconds (default: 86400)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `CACHE_DEBUG` - Debug logging of cache decisions (default: false)
    /// - `ALLOWED_TABLES` - Comma separated tables to cache (default: all)
    /// - `UPGRADE_RETURN_VALUES` - Request return images (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_item_entries: parse_var("MAX_ITEM_ENTRIES").unwrap_or(defaults.max_item_entries),
            max_query_entries: parse_var("MAX_QUERY_ENTRIES")
                .unwrap_or(defaults.max_query_entries),
            item_ttl: parse_var("ITEM_TTL").unwrap_or(defaults.item_ttl),
            query_ttl: parse_var("QUERY_TTL").unwrap_or(defaults.query_ttl),
            scan_ttl: parse_var("SCAN_TTL").unwrap_or(defaults.scan_ttl),
            schema_ttl: parse_var("SCHEMA_TTL").unwrap_or(defaults.schema_ttl),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            debug: parse_var("CACHE_DEBUG").unwrap_or(defaults.debug),
            allowed_tables: env::var("ALLOWED_TABLES")
                .map(|v| parse_table_list(&v))
                .unwrap_or(defaults.allowed_tables),
            upgrade_return_values: parse_var("UPGRADE_RETURN_VALUES")
                .unwrap_or(defaults.upgrade_return_values),
        }
    }

    /// Proxy tunables derived from this configuration.
    pub fn proxy_settings(&self) -> ProxySettings {
        ProxySettings {
            item_ttl: Duration::from_secs(self.item_ttl),
            query_ttl: Duration::from_secs(self.query_ttl),
            scan_ttl: Duration::from_secs(self.scan_ttl),
            schema_ttl: Duration::from_secs(self.schema_ttl),
            max_item_entries: self.max_item_entries,
            max_query_entries: self.max_query_entries,
            upgrade_return_values: self.upgrade_return_values,
            allowed_tables: self.allowed_tables.clone(),
            debug: self.debug,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_item_entries: 10_000,
            max_query_entries: 1_000,
            item_ttl: 900,
            query_ttl: 300,
            scan_ttl: 300,
            schema_ttl: 86_400,
            server_port: 3000,
            cleanup_interval: 1,
            debug: false,
            allowed_tables: Vec::new(),
            upgrade_return_values: true,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_table_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
