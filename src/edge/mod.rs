//! Edge request normalizer
//!
//! Runs per-request at CDN edge nodes before the origin is contacted, so it
//! must stay a stateless single pass: no I/O, no async, no shared state, no
//! retries. It folds every header/query variant of the same logical request
//! into one canonical path, which is what makes the storage tier an
//! effective cache (one key per logical variant, not one per permutation).

use crate::directives::TransformDirectives;

/// Edge-side configuration: which directive keys this deployment accepts.
#[derive(Debug, Clone, Copy)]
pub struct EdgeConfig {
    /// Recognize `bitrate` and audio format names (audio deployments)
    pub audio_enabled: bool,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            audio_enabled: true,
        }
    }
}

/// The rewritten request handed to the origin chain.
///
/// The query string is always empty: the canonical path segment is the sole
/// channel through which directives reach the cache key and compute tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRequest {
    pub path: String,
    pub query_string: String,
}

/// Normalize one incoming request into its canonical form.
///
/// `query_pairs` are the already URL-decoded query parameters in request
/// order; `accept_header` feeds `format=auto` resolution. Idempotent: a
/// request that carries no recognized parameters normalizes to
/// `{path}/original`.
pub fn normalize(
    path: &str,
    query_pairs: &[(String, String)],
    accept_header: Option<&str>,
    config: &EdgeConfig,
) -> NormalizedRequest {
    let accept = accept_header.map(|h| h.to_lowercase());
    let directives = TransformDirectives::from_query(
        query_pairs,
        accept.as_deref(),
        config.audio_enabled,
    );

    let base = path.trim_end_matches('/');
    NormalizedRequest {
        path: format!("{}/{}", base, directives.serialize()),
        query_string: String::new(),
    }
}

/// Parse a raw query string into decoded key/value pairs.
///
/// Keys without `=` become empty-valued pairs; undecodable percent
/// sequences keep their raw form rather than failing the request.
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_rewrites_path_and_strips_query() {
        let result = normalize(
            "/photos/cat.jpg",
            &pairs(&[("width", "200"), ("format", "webp")]),
            None,
            &EdgeConfig::default(),
        );
        assert_eq!(result.path, "/photos/cat.jpg/format=webp,width=200");
        assert!(result.query_string.is_empty());
    }

    #[test]
    fn test_normalize_empty_query_yields_sentinel() {
        let result = normalize("/photos/cat.jpg", &[], None, &EdgeConfig::default());
        assert_eq!(result.path, "/photos/cat.jpg/original");
    }

    #[test]
    fn test_normalize_query_order_independent() {
        let config = EdgeConfig::default();
        let a = normalize(
            "/a.jpg",
            &pairs(&[("width", "100"), ("format", "webp")]),
            None,
            &config,
        );
        let b = normalize(
            "/a.jpg",
            &pairs(&[("format", "webp"), ("width", "100")]),
            None,
            &config,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_auto_format_with_accept() {
        let result = normalize(
            "/photos/cat.jpg",
            &pairs(&[("width", "200"), ("format", "auto")]),
            Some("image/avif"),
            &EdgeConfig::default(),
        );
        assert_eq!(result.path, "/photos/cat.jpg/format=avif,width=200");
    }

    #[test]
    fn test_normalize_auto_format_unmatched_accept() {
        let result = normalize(
            "/photos/cat.jpg",
            &pairs(&[("width", "200"), ("format", "auto")]),
            Some("text/html"),
            &EdgeConfig::default(),
        );
        // format omitted, remaining directives still apply
        assert_eq!(result.path, "/photos/cat.jpg/width=200");
    }

    #[test]
    fn test_normalize_drops_unrecognized_and_invalid() {
        let result = normalize(
            "/a.jpg",
            &pairs(&[("rotate", "90"), ("width", "0"), ("format", "bmp")]),
            None,
            &EdgeConfig::default(),
        );
        assert_eq!(result.path, "/a.jpg/original");
    }

    #[test]
    fn test_normalize_is_idempotent_on_canonical_output() {
        let config = EdgeConfig::default();
        let first = normalize(
            "/a.jpg",
            &pairs(&[("FORMAT", "WEBP"), ("quality", "101")]),
            None,
            &config,
        );
        // Re-running the normalizer over the rewritten request (no live
        // query params remain) must not change the path further than
        // appending nothing: the directive segment is already canonical.
        assert_eq!(first.path, "/a.jpg/format=webp,quality=100");
    }

    #[test]
    fn test_image_only_profile_ignores_bitrate() {
        let config = EdgeConfig {
            audio_enabled: false,
        };
        let result = normalize("/song.flac", &pairs(&[("bitrate", "64k")]), None, &config);
        assert_eq!(result.path, "/song.flac/original");
    }

    #[test]
    fn test_parse_query_string() {
        let parsed = parse_query_string("width=200&format=webp&flag");
        assert_eq!(
            parsed,
            pairs(&[("width", "200"), ("format", "webp"), ("flag", "")])
        );
        assert!(parse_query_string("").is_empty());
    }

    #[test]
    fn test_parse_query_string_decodes_percent_encoding() {
        let parsed = parse_query_string("bitrate=64%6b");
        assert_eq!(parsed, pairs(&[("bitrate", "64k")]));
    }
}
