//! Zelana Configuration
//!
//! Shared configuration crate for the Zelana stealth components.
//!
//! Handles loading configuration from:
//! 1. ZL_CONFIG env var (explicit path)
//! 2. ./config.toml (current directory)
//! 3. ~/.zelana/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.
//!
//! Cryptographic constants (generator, domain tags, curve) are fixed in the
//! stealth crate and cannot be configured here.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<ZelanaConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".zelana";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_TREE_DEPTH: usize = 20;
const DEFAULT_ROOT_HISTORY_SIZE: usize = 100;
/// 21M BTC in satoshis
const DEFAULT_MAX_AMOUNT_SATS: u64 = 2_100_000_000_000_000;
const DEFAULT_LOG_FILTER: &str = "info";

const MAX_TREE_DEPTH: usize = 32;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZelanaConfig {
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Accumulator and amount bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default = "default_tree_depth")]
    pub tree_depth: usize,
    #[serde(default = "default_root_history_size")]
    pub root_history_size: usize,
    #[serde(default = "default_max_amount_sats")]
    pub max_amount_sats: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            tree_depth: DEFAULT_TREE_DEPTH,
            root_history_size: DEFAULT_ROOT_HISTORY_SIZE,
            max_amount_sats: DEFAULT_MAX_AMOUNT_SATS,
        }
    }
}

fn default_tree_depth() -> usize {
    DEFAULT_TREE_DEPTH
}
fn default_root_history_size() -> usize {
    DEFAULT_ROOT_HISTORY_SIZE
}
fn default_max_amount_sats() -> u64 {
    DEFAULT_MAX_AMOUNT_SATS
}

/// Stealth domain for TOML config
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DomainToml {
    #[default]
    Transfer,
    YieldPool,
}

/// Commitment formula for TOML config
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentToml {
    #[default]
    Transfer,
    Timelocked,
}

impl FromStr for DomainToml {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "transfer" => Ok(DomainToml::Transfer),
            "yield_pool" | "yield-pool" | "yield" => Ok(DomainToml::YieldPool),
            other => bail!("unknown stealth domain: {other:?} (expected transfer or yield_pool)"),
        }
    }
}

impl FromStr for CommitmentToml {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "transfer" => Ok(CommitmentToml::Transfer),
            "timelocked" => Ok(CommitmentToml::Timelocked),
            other => bail!("unknown commitment scheme: {other:?} (expected transfer or timelocked)"),
        }
    }
}

/// Scanner settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// 0 = rayon's global pool
    #[serde(default)]
    pub worker_threads: usize,
    #[serde(default)]
    pub domain: DomainToml,
    #[serde(default)]
    pub commitment: CommitmentToml,
    /// Only used with `commitment = "timelocked"`
    #[serde(default)]
    pub epoch: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.into()
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(lookup: &impl Fn(&str) -> Option<String>, key: &str, field: &mut String) {
    if let Some(v) = lookup(key) {
        *field = v;
    }
}

/// Set field from env var if present; a value that does not parse is an error
fn env_parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, field: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(v) = lookup(key) {
        *field = v
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={v:?}: {e}"))?;
    }
    Ok(())
}

// ============================================================================
// Implementation
// ============================================================================

impl ZelanaConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::parse_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check ZL_CONFIG env var
        if let Ok(path) = env::var("ZL_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check ./config.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.zelana/config.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from `lookup`, rejecting values that do not parse
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        // Protocol
        env_parse(&lookup, "ZL_TREE_DEPTH", &mut self.protocol.tree_depth)?;
        env_parse(&lookup, "ZL_ROOT_HISTORY_SIZE", &mut self.protocol.root_history_size)?;
        env_parse(&lookup, "ZL_MAX_AMOUNT_SATS", &mut self.protocol.max_amount_sats)?;

        // Scan
        env_parse(&lookup, "ZL_SCAN_THREADS", &mut self.scan.worker_threads)?;
        env_parse(&lookup, "ZL_STEALTH_DOMAIN", &mut self.scan.domain)?;
        env_parse(&lookup, "ZL_COMMITMENT_SCHEME", &mut self.scan.commitment)?;
        env_parse(&lookup, "ZL_EPOCH", &mut self.scan.epoch)?;

        // Logging
        env_string(&lookup, "RUST_LOG", &mut self.logging.filter);
        Ok(())
    }

    /// Reject values the stealth crate cannot work with
    pub fn validate(&self) -> Result<()> {
        let p = &self.protocol;
        if p.tree_depth == 0 || p.tree_depth > MAX_TREE_DEPTH {
            bail!("tree_depth must be in 1..={MAX_TREE_DEPTH}, got {}", p.tree_depth);
        }
        if p.root_history_size == 0 {
            bail!("root_history_size must be at least 1");
        }
        if p.max_amount_sats == 0 {
            bail!("max_amount_sats must be positive");
        }
        Ok(())
    }

    /// Install env_logger with the configured filter.
    ///
    /// Safe to call more than once; later calls are ignored.
    pub fn init_logging(&self) {
        let _ = env_logger::Builder::new()
            .parse_filters(&self.logging.filter)
            .try_init();
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.scan.worker_threads = 4;
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static ZelanaConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Try to get the global config instance.
    ///
    /// Returns `None` if config hasn't been initialized yet.
    pub fn try_global() -> Option<&'static ZelanaConfig> {
        GLOBAL_CONFIG.get()
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: ZelanaConfig) -> Result<(), ZelanaConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `ZelanaConfig::global()`.
#[inline]
pub fn global_config() -> &'static ZelanaConfig {
    ZelanaConfig::global()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ZelanaConfig::default();
        assert_eq!(config.protocol.tree_depth, DEFAULT_TREE_DEPTH);
        assert_eq!(config.protocol.root_history_size, DEFAULT_ROOT_HISTORY_SIZE);
        assert_eq!(config.protocol.max_amount_sats, 2_100_000_000_000_000);
        assert_eq!(config.scan.domain, DomainToml::Transfer);
        assert_eq!(config.scan.worker_threads, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generate_sample() {
        let sample = ZelanaConfig::generate_sample();
        assert!(sample.contains("[protocol]"));
        assert!(sample.contains("[scan]"));
        assert!(sample.contains("[logging]"));
    }

    #[test]
    fn test_parse_sample() {
        let sample = ZelanaConfig::generate_sample();
        let parsed: ZelanaConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.scan.worker_threads, 4);
        assert_eq!(parsed.protocol.tree_depth, DEFAULT_TREE_DEPTH);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: ZelanaConfig = toml::from_str(
            r#"
            [scan]
            domain = "yield_pool"
            commitment = "timelocked"
            epoch = 42
            "#,
        )
        .unwrap();
        assert_eq!(parsed.scan.domain, DomainToml::YieldPool);
        assert_eq!(parsed.scan.commitment, CommitmentToml::Timelocked);
        assert_eq!(parsed.scan.epoch, 42);
        assert_eq!(parsed.protocol.root_history_size, DEFAULT_ROOT_HISTORY_SIZE);
        assert_eq!(parsed.logging.filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[protocol]\ntree_depth = 16\nroot_history_size = 8").unwrap();
        let config = ZelanaConfig::load_from(file.path()).unwrap();
        assert_eq!(config.protocol.root_history_size, 8);
        assert_eq!(config.protocol.max_amount_sats, DEFAULT_MAX_AMOUNT_SATS);
    }

    #[test]
    fn test_load_from_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[protocol]\ntree_depth = 64").unwrap();
        let err = ZelanaConfig::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("tree_depth"), "got: {err}");

        let mut garbage = tempfile::NamedTempFile::new().unwrap();
        writeln!(garbage, "[protocol\n").unwrap();
        assert!(ZelanaConfig::load_from(garbage.path()).is_err());
    }

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut config = ZelanaConfig::default();
        config
            .apply_overrides(overrides(&[
                ("ZL_STEALTH_DOMAIN", "yield-pool"),
                ("ZL_COMMITMENT_SCHEME", "Timelocked"),
                ("ZL_EPOCH", "7"),
                ("ZL_MAX_AMOUNT_SATS", "1000"),
            ]))
            .unwrap();
        assert_eq!(config.scan.domain, DomainToml::YieldPool);
        assert_eq!(config.scan.commitment, CommitmentToml::Timelocked);
        assert_eq!(config.scan.epoch, 7);
        assert_eq!(config.protocol.max_amount_sats, 1000);
    }

    #[test]
    fn test_env_overrides_reject_unknown_values() {
        let mut config = ZelanaConfig::default();
        let err = config
            .apply_overrides(overrides(&[("ZL_STEALTH_DOMAIN", "yeild_pool")]))
            .unwrap_err();
        assert!(err.to_string().contains("ZL_STEALTH_DOMAIN"), "got: {err}");
        assert_eq!(
            config.scan.domain,
            DomainToml::Transfer,
            "a typo must not change the domain"
        );

        let err = config
            .apply_overrides(overrides(&[("ZL_COMMITMENT_SCHEME", "timelock")]))
            .unwrap_err();
        assert!(err.to_string().contains("ZL_COMMITMENT_SCHEME"), "got: {err}");

        assert!(
            config
                .apply_overrides(overrides(&[("ZL_TREE_DEPTH", "twenty")]))
                .is_err(),
            "unparseable numbers are rejected too"
        );
    }

    #[test]
    fn test_validate() {
        let mut config = ZelanaConfig::default();
        config.protocol.root_history_size = 0;
        assert!(config.validate().is_err());

        let mut config = ZelanaConfig::default();
        config.protocol.max_amount_sats = 0;
        assert!(config.validate().is_err());
    }
}
