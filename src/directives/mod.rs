//! Transform directive parsing and canonical serialization
//!
//! A directive set is built from one request's query parameters (at the
//! edge) or re-parsed from the final path segment (at the compute tier).
//! Serialization always emits keys in a FIXED order so that two requests
//! with the same logical intent produce byte-identical cache keys no matter
//! how the query string was ordered or cased.
//!
//! Malformed values are never errors here: unknown keys are dropped,
//! out-of-range integers are clamped, non-positive or unparseable integers
//! are discarded. Whatever survives is in-range by construction.

use crate::constants::{MAX_DIMENSION, MAX_QUALITY, ORIGINAL_SENTINEL};
use crate::formats;

/// Validated transform options for one request.
///
/// An all-`None` set is the sentinel `original`: return the source
/// unchanged, invoke no transform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformDirectives {
    /// Registered format name (already validated against the registries)
    pub format: Option<String>,
    pub quality: Option<u8>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Verbatim bitrate string, e.g. `64k` (audio profile only)
    pub bitrate: Option<String>,
}

impl TransformDirectives {
    /// Build a directive set from decoded query pairs.
    ///
    /// Implements the edge normalization rules: keys and values are
    /// lower-cased, only the recognized keys survive, `format=auto` is
    /// resolved against the Accept header, integers are clamped or dropped.
    /// Later occurrences of a key override earlier ones.
    pub fn from_query(
        pairs: &[(String, String)],
        accept_header: Option<&str>,
        audio_enabled: bool,
    ) -> Self {
        let mut directives = Self::default();

        for (raw_key, raw_value) in pairs {
            let key = raw_key.to_lowercase();
            let value = raw_value.to_lowercase();

            match key.as_str() {
                "format" => {
                    if value == "auto" {
                        directives.format = resolve_auto_format(accept_header, audio_enabled)
                            .map(|f| f.name.to_string());
                    } else if formats::is_supported_format(&value, audio_enabled) {
                        directives.format = Some(value);
                    } else {
                        directives.format = None;
                    }
                }
                "quality" => {
                    directives.quality = parse_clamped(&value, MAX_QUALITY as u32).map(|q| q as u8);
                }
                "width" => {
                    directives.width = parse_clamped(&value, MAX_DIMENSION);
                }
                "height" => {
                    directives.height = parse_clamped(&value, MAX_DIMENSION);
                }
                "bitrate" if audio_enabled => {
                    if !value.is_empty() {
                        directives.bitrate = Some(value);
                    }
                }
                // Unrecognized keys are dropped silently, never an error
                _ => {}
            }
        }

        directives
    }

    /// Re-parse a directive string from a canonical path segment.
    ///
    /// The compute tier runs values through the same clamp/drop rules even
    /// though a well-behaved edge only emits in-range values; an unparseable
    /// segment degrades to the empty set, which short-circuits to
    /// no-transform downstream.
    pub fn parse(directive_string: &str) -> Self {
        if directive_string == ORIGINAL_SENTINEL {
            return Self::default();
        }

        let pairs: Vec<(String, String)> = directive_string
            .split(',')
            .filter_map(|part| {
                part.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
            })
            .collect();

        // Audio keys are always recognized here; kind gating happens against
        // the fetched content type, not the deployment profile.
        Self::from_query(&pairs, None, true)
    }

    /// Serialize in the fixed canonical order, or the `original` sentinel.
    pub fn serialize(&self) -> String {
        let mut parts = Vec::new();

        if let Some(ref format) = self.format {
            parts.push(format!("format={}", format));
        }
        if let Some(quality) = self.quality {
            parts.push(format!("quality={}", quality));
        }
        if let Some(width) = self.width {
            parts.push(format!("width={}", width));
        }
        if let Some(height) = self.height {
            parts.push(format!("height={}", height));
        }
        if let Some(ref bitrate) = self.bitrate {
            parts.push(format!("bitrate={}", bitrate));
        }

        if parts.is_empty() {
            ORIGINAL_SENTINEL.to_string()
        } else {
            parts.join(",")
        }
    }

    /// Serialize as a query string for redirect responses, reusing the
    /// canonical order.
    pub fn to_query_string(&self) -> Option<String> {
        let serialized = self.serialize();
        if serialized == ORIGINAL_SENTINEL {
            None
        } else {
            Some(serialized.replace(',', "&"))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.format.is_none()
            && self.quality.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.bitrate.is_none()
    }

    /// Whether any key relevant to image transformation is present.
    pub fn has_image_directive(&self) -> bool {
        self.format.is_some()
            || self.quality.is_some()
            || self.width.is_some()
            || self.height.is_some()
    }

    /// Whether any key relevant to audio transformation is present.
    pub fn has_audio_directive(&self) -> bool {
        self.format.is_some() || self.bitrate.is_some()
    }
}

/// Resolve `format=auto` by scanning the lower-cased Accept header for the
/// first registered format name appearing as a substring, in registry
/// declaration order. No match means the format key is omitted entirely.
fn resolve_auto_format(
    accept_header: Option<&str>,
    audio_enabled: bool,
) -> Option<&'static formats::MediaFormat> {
    let accept = accept_header?.to_lowercase();

    for format in formats::IMAGE_FORMATS {
        if accept.contains(format.name) {
            return Some(format);
        }
    }
    if audio_enabled {
        for format in formats::AUDIO_FORMATS {
            if accept.contains(format.name) {
                return Some(format);
            }
        }
    }
    None
}

/// Positive-integer parse with clamping: non-positive and unparseable
/// values are rejected (dropped), values above `max` are clamped to it.
fn parse_clamped(value: &str, max: u32) -> Option<u32> {
    match value.parse::<u64>() {
        Ok(0) => None,
        Ok(n) => Some((n.min(max as u64)) as u32),
        Err(_) => None,
    }
}

/// Build the cache-tier storage key for an object path and its directives.
pub fn canonical_key(original_path: &str, directives: &TransformDirectives) -> String {
    format!(
        "{}/{}",
        original_path.trim_start_matches('/'),
        directives.serialize()
    )
}

/// Split a canonical request path into the original object path and the
/// trailing directive string.
///
/// The directive string is the final path segment; the original path is
/// every preceding segment joined, with the leading empty segment from the
/// root `/` discarded. Returns `None` for paths without at least one object
/// segment ahead of the directive segment.
pub fn split_canonical_path(path: &str) -> Option<(String, &str)> {
    let trimmed = path.trim_start_matches('/');
    let (original_path, directive_string) = trimmed.rsplit_once('/')?;
    if original_path.is_empty() || directive_string.is_empty() {
        return None;
    }
    Some((original_path.to_string(), directive_string))
}
