//! Output pixel encodings.
//!
//! The device firmware understands exactly two formats. `Mono` is the
//! thresholded 1-bit bitmap with an embedded size header; `Color` is
//! headerless RGB565 whose dimensions travel with the request instead.

use crate::{Error, Result};
use std::str::FromStr;

/// Device pixel encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variant {
    /// 1 bit per pixel, rows padded to whole bytes, inverted polarity.
    #[default]
    Mono,
    /// 16 bits per pixel, big-endian RGB565.
    Color,
}

impl Variant {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Mono => "mono",
            Variant::Color => "color",
        }
    }

    /// Target canvas used when a request names no size.
    pub fn default_dimensions(&self) -> (u32, u32) {
        match self {
            Variant::Mono => (384, 384),
            Variant::Color => (128, 160),
        }
    }

    /// Returns true if the encoding embeds its own dimensions.
    pub fn has_header(&self) -> bool {
        matches!(self, Variant::Mono)
    }
}

impl FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mono" | "bw" | "bandw" => Ok(Variant::Mono),
            "color" | "colour" | "rgb565" => Ok(Variant::Color),
            _ => Err(Error::InvalidVariant(s.to_string())),
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
