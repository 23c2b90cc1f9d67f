// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Directive bounds
// =============================================================================

/// Maximum accepted output width in pixels; larger requests are clamped
pub const MAX_DIMENSION: u32 = 4000;

/// Maximum accepted quality value; larger requests are clamped
pub const MAX_QUALITY: u8 = 100;

/// Path segment marking "no transform requested"
pub const ORIGINAL_SENTINEL: &str = "original";

// =============================================================================
// Audio defaults
// =============================================================================

/// Bitrate applied when the effective format supports bitrate but the
/// request carries none
pub const DEFAULT_AUDIO_BITRATE: &str = "64k";

// =============================================================================
// Cache tier defaults
// =============================================================================

/// Cache-Control applied to materialized variants (~1 year)
pub const DEFAULT_CACHE_CONTROL: &str = "max-age=31622400";

/// Default cache object expiration in days
pub const DEFAULT_CACHE_EXPIRATION_DAYS: u32 = 90;

/// Default CDN-layer TTL in seconds
pub const DEFAULT_CDN_TTL_SECS: u64 = 86400;

/// Default CDN-layer minimum TTL in seconds
pub const DEFAULT_CDN_MIN_TTL_SECS: u64 = 0;

/// Default CDN-layer maximum TTL in seconds
pub const DEFAULT_CDN_MAX_TTL_SECS: u64 = 31_536_000;

// =============================================================================
// Compute tier defaults
// =============================================================================

/// Header carrying the shared secret from the CDN layer to the compute tier
pub const ORIGIN_SECRET_HEADER: &str = "x-origin-secret-header";

/// Prefix for propagated user metadata headers on inline responses
pub const METADATA_HEADER_PREFIX: &str = "x-amz-meta-";

/// Default listen address for server mode
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";

/// Default listen port for server mode
pub const DEFAULT_LISTEN_PORT: u16 = 8080;
