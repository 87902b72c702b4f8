//! Configuration management.

use anyhow::{bail, Context, Result};
use bitframe_codec::{DecodeLimits, Variant};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server listen address (e.g., "0.0.0.0:8686")
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Artifact cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Source fetch configuration
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Values used when a request leaves a parameter out
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Duplicate-work suppression for concurrent identical requests
    #[serde(default)]
    pub single_flight: SingleFlightConfig,

    /// Request limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Cache backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// One directory per fingerprint under `dir`.
    #[default]
    Disk,
    /// Process memory, lost on restart.
    Memory,
}

/// Artifact cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Storage backend
    #[serde(default)]
    pub backend: CacheBackend,

    /// Root directory for the disk backend
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            dir: default_cache_dir(),
        }
    }
}

/// Source fetch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Whole-request deadline in seconds
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Maximum redirects followed
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Largest accepted source body in bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// User-Agent header sent upstream
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            max_redirects: default_max_redirects(),
            max_bytes: default_max_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

/// Target canvas size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    fn for_variant(variant: Variant) -> Self {
        let (width, height) = variant.default_dimensions();
        Self { width, height }
    }
}

/// Request parameter defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Source image used when no `url` is given
    #[serde(default = "default_url")]
    pub url: String,

    /// Canvas size for the mono variant
    #[serde(default = "default_mono_dimensions")]
    pub mono: Dimensions,

    /// Canvas size for the color variant
    #[serde(default = "default_color_dimensions")]
    pub color: Dimensions,
}

impl DefaultsConfig {
    /// Default canvas for a variant.
    pub fn dimensions(&self, variant: Variant) -> Dimensions {
        match variant {
            Variant::Mono => self.mono,
            Variant::Color => self.color,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            mono: default_mono_dimensions(),
            color: default_color_dimensions(),
        }
    }
}

/// Single-flight configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleFlightConfig {
    /// Whether concurrent identical requests share one computation
    #[serde(default = "default_true")]
    pub enable: bool,

    /// How long a follower waits before computing on its own
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,
}

impl Default for SingleFlightConfig {
    fn default() -> Self {
        Self {
            enable: true,
            wait_secs: default_wait_secs(),
        }
    }
}

/// Request and decode limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest accepted target width or height
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,

    /// Largest accepted source image width or height
    #[serde(default = "default_max_source_dimension")]
    pub max_source_dimension: u32,

    /// Most bytes all decoded frames of one source may occupy
    #[serde(default = "default_max_decoded_bytes")]
    pub max_decoded_bytes: u64,
}

impl LimitsConfig {
    /// Bounds handed to the frame decoder.
    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_dimension: self.max_source_dimension,
            max_decoded_bytes: self.max_decoded_bytes,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_max_dimension(),
            max_source_dimension: default_max_source_dimension(),
            max_decoded_bytes: default_max_decoded_bytes(),
        }
    }
}

// Default value functions
fn default_listen() -> String {
    "0.0.0.0:8686".to_string()
}

fn default_cache_dir() -> String {
    "cache".to_string()
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_bytes() -> u64 {
    32 * 1024 * 1024
}

fn default_user_agent() -> String {
    format!("bitframe/{}", env!("CARGO_PKG_VERSION"))
}

fn default_url() -> String {
    "http://electricimp.com/images/imp-logo-trim.png".to_string()
}

fn default_mono_dimensions() -> Dimensions {
    Dimensions::for_variant(Variant::Mono)
}

fn default_color_dimensions() -> Dimensions {
    Dimensions::for_variant(Variant::Color)
}

fn default_true() -> bool {
    true
}

fn default_wait_secs() -> u64 {
    60
}

fn default_max_dimension() -> u32 {
    bitframe_codec::MAX_DIMENSION
}

fn default_max_source_dimension() -> u32 {
    DecodeLimits::DEFAULT_MAX_DIMENSION
}

fn default_max_decoded_bytes() -> u64 {
    DecodeLimits::DEFAULT_MAX_DECODED_BYTES
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot constrain.
    pub fn validate(&self) -> Result<()> {
        let max = self.limits.max_dimension;
        if max == 0 || max > bitframe_codec::MAX_DIMENSION {
            bail!(
                "limits.max_dimension must be between 1 and {}, got {}",
                bitframe_codec::MAX_DIMENSION,
                max
            );
        }
        for variant in [Variant::Mono, Variant::Color] {
            let dims = self.defaults.dimensions(variant);
            if dims.width == 0 || dims.height == 0 || dims.width > max || dims.height > max {
                bail!(
                    "defaults.{} is {}x{}, outside 1..={}",
                    variant,
                    dims.width,
                    dims.height,
                    max
                );
            }
        }
        if self.limits.max_source_dimension == 0 || self.limits.max_decoded_bytes == 0 {
            bail!("limits.max_source_dimension and limits.max_decoded_bytes must be positive");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            cache: CacheConfig::default(),
            fetch: FetchConfig::default(),
            defaults: DefaultsConfig::default(),
            single_flight: SingleFlightConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}
