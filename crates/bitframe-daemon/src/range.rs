//! Single-range byte serving.
//!
//! Supported request forms are `bytes=S-E` and `bytes=S-`. When several
//! ranges are listed only the first is honored. Suffix ranges, other units
//! and malformed values are ignored, which makes the response a plain 200.

use axum::http::StatusCode;
use tracing::debug;

/// Parsed `Range` header. `end` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

/// Parses a `Range` header value. `None` means the header is ignored.
pub fn parse_range_header(value: &str) -> Option<ByteRange> {
    let (unit, spec) = value.trim().split_once('=')?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return None;
    }

    let mut ranges = spec.split(',');
    let first = ranges.next()?.trim();
    if ranges.next().is_some() {
        debug!("Multi-range request {:?}, serving first range only", value);
    }

    let (start, end) = first.split_once('-')?;
    let start = parse_offset(start)?;
    let end = match end.trim() {
        "" => None,
        e => Some(parse_offset(e)?),
    };

    if end.is_some_and(|e| e < start) {
        return None;
    }
    Some(ByteRange { start, end })
}

fn parse_offset(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// What to send for a resource of `total` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Whole resource, 200.
    Full { total: u64 },
    /// Inclusive slice, 206.
    Partial { start: u64, end: u64, total: u64 },
    /// Start lies past the end, 416.
    Unsatisfiable { total: u64 },
}

impl RangeOutcome {
    /// Resolves an optional request range against a resource size.
    pub fn resolve(range: Option<ByteRange>, total: u64) -> Self {
        let Some(range) = range else {
            return RangeOutcome::Full { total };
        };
        if range.start >= total {
            return RangeOutcome::Unsatisfiable { total };
        }
        let last = total - 1;
        let end = range.end.map_or(last, |e| e.min(last));
        RangeOutcome::Partial {
            start: range.start,
            end,
            total,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RangeOutcome::Full { .. } => StatusCode::OK,
            RangeOutcome::Partial { .. } => StatusCode::PARTIAL_CONTENT,
            RangeOutcome::Unsatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
        }
    }

    /// Body length in bytes.
    pub fn content_length(&self) -> u64 {
        match *self {
            RangeOutcome::Full { total } => total,
            RangeOutcome::Partial { start, end, .. } => end - start + 1,
            RangeOutcome::Unsatisfiable { .. } => 0,
        }
    }

    /// `Content-Range` header value, if the outcome carries one.
    pub fn content_range(&self) -> Option<String> {
        match *self {
            RangeOutcome::Full { .. } => None,
            RangeOutcome::Partial { start, end, total } => {
                Some(format!("bytes {}-{}/{}", start, end, total))
            }
            RangeOutcome::Unsatisfiable { total } => Some(format!("bytes */{}", total)),
        }
    }
}
