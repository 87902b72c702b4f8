//! Transcode requests and their cache fingerprints.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bitframe_codec::Variant;
use sha2::{Digest, Sha256};

use crate::config::{DefaultsConfig, LimitsConfig};
use crate::error::TranscodeError;

/// Parameters consumed by the pipeline itself.
const RESERVED: [&str; 4] = ["url", "width", "height", "variant"];

/// A fully resolved transcode request.
///
/// Parameters the pipeline does not use are carried in `extra` so that
/// they still separate cache entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub variant: Variant,
    pub extra: BTreeMap<String, String>,
}

impl TranscodeRequest {
    /// Builds a request from query parameters, filling gaps from `defaults`.
    pub fn from_params(
        variant: Variant,
        params: &HashMap<String, String>,
        defaults: &DefaultsConfig,
        limits: &LimitsConfig,
    ) -> Result<Self, TranscodeError> {
        let fallback = defaults.dimensions(variant);
        let url = params
            .get("url")
            .filter(|u| !u.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| defaults.url.clone());

        let max = limits.max_dimension.min(bitframe_codec::MAX_DIMENSION);
        let width = parse_dimension(params, "width", fallback.width, max)?;
        let height = parse_dimension(params, "height", fallback.height, max)?;

        let extra = params
            .iter()
            .filter(|(k, _)| !RESERVED.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            url,
            width,
            height,
            variant,
            extra,
        })
    }

    /// Stable text form of every parameter, sorted by name.
    pub fn canonical(&self) -> String {
        let mut fields: BTreeMap<&str, String> = self
            .extra
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        fields.insert("url", self.url.clone());
        fields.insert("width", self.width.to_string());
        fields.insert("height", self.height.to_string());
        fields.insert("variant", self.variant.to_string());

        fields
            .iter()
            .map(|(k, v)| format!("{:?}={:?}\n", k, v))
            .collect()
    }

    /// Content hash naming this request's cache entry.
    pub fn fingerprint(&self) -> Fingerprint {
        let digest = Sha256::digest(self.canonical().as_bytes());
        Fingerprint(hex::encode(digest))
    }
}

fn parse_dimension(
    params: &HashMap<String, String>,
    name: &'static str,
    fallback: u32,
    max: u32,
) -> Result<u32, TranscodeError> {
    let Some(raw) = params.get(name) else {
        return Ok(fallback);
    };
    let value: u32 = raw.trim().parse().map_err(|_| TranscodeError::InvalidParameter {
        name,
        reason: format!("{:?} is not a positive integer", raw),
    })?;
    if value == 0 || value > max {
        return Err(TranscodeError::InvalidParameter {
            name,
            reason: format!("must be between 1 and {}", max),
        });
    }
    Ok(value)
}

/// Lowercase hex SHA-256 of a request's canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
