// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::constants::{
    DEFAULT_CACHE_CONTROL, DEFAULT_CACHE_EXPIRATION_DAYS, DEFAULT_CDN_MAX_TTL_SECS,
    DEFAULT_CDN_MIN_TTL_SECS, DEFAULT_CDN_TTL_SECS, DEFAULT_LISTEN_ADDRESS, DEFAULT_LISTEN_PORT,
};

/// Deployment-wide configuration, constructed once at startup and passed by
/// reference into the engine. Transform logic never reads ambient global
/// state; everything it needs arrives through this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bucket holding the source objects. Required; startup fails without it.
    pub origin_bucket: String,

    /// Deployment identity the shared secret is derived from
    pub deployment_id: String,

    #[serde(default)]
    pub cache: CacheTierConfig,

    #[serde(default)]
    pub cdn: CdnConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Recognize audio directives and formats
    #[serde(default = "default_true")]
    pub audio_enabled: bool,

    /// Attach permissive CORS headers to engine responses
    #[serde(default)]
    pub cors_enabled: bool,

    /// Emit per-stage timing fields in logs
    #[serde(default)]
    pub timing_logs: bool,

    /// Answer cache misses with a 302 back through the storage tier instead
    /// of inline bytes (for deployments with a hard response-size ceiling)
    #[serde(default)]
    pub redirect_responses: bool,

    /// AWS region override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// S3-compatible endpoint override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTierConfig {
    /// Whether materialized variants are persisted at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache bucket name; falls back to the origin bucket when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Lifecycle expiration for cached variants, in days
    #[serde(default = "default_expiration_days")]
    pub expiration_days: u32,

    /// Cache-Control applied to materialized variants
    #[serde(default = "default_cache_control")]
    pub cache_control: String,

    /// Primary-tier HTTP statuses treated as "object absent"
    #[serde(default = "default_absent_statuses")]
    pub absent_statuses: Vec<u16>,
}

impl Default for CacheTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bucket: None,
            expiration_days: DEFAULT_CACHE_EXPIRATION_DAYS,
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            absent_statuses: default_absent_statuses(),
        }
    }
}

/// TTL bounds handed to the CDN distribution in front of the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdnConfig {
    #[serde(default = "default_cdn_ttl")]
    pub default_ttl_secs: u64,
    #[serde(default = "default_cdn_min_ttl")]
    pub min_ttl_secs: u64,
    #[serde(default = "default_cdn_max_ttl")]
    pub max_ttl_secs: u64,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: DEFAULT_CDN_TTL_SECS,
            min_ttl_secs: DEFAULT_CDN_MIN_TTL_SECS,
            max_ttl_secs: DEFAULT_CDN_MAX_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_LISTEN_ADDRESS.to_string(),
            port: DEFAULT_LISTEN_PORT,
        }
    }
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // Check that all referenced environment variables exist before
        // substituting any of them
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap() // Safe because we checked above
        });

        let config: Config = serde_yaml::from_str(&substituted).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.origin_bucket.is_empty() {
            return Err("origin_bucket is required and cannot be empty".to_string());
        }
        if self.deployment_id.is_empty() {
            return Err("deployment_id is required and cannot be empty".to_string());
        }
        if self.cache.enabled {
            if let Some(bucket) = &self.cache.bucket {
                if bucket.is_empty() {
                    return Err("cache.bucket cannot be empty when set".to_string());
                }
            }
        }
        if self.cdn.min_ttl_secs > self.cdn.max_ttl_secs {
            return Err("cdn.min_ttl_secs cannot exceed cdn.max_ttl_secs".to_string());
        }
        if self.cdn.default_ttl_secs < self.cdn.min_ttl_secs
            || self.cdn.default_ttl_secs > self.cdn.max_ttl_secs
        {
            return Err("cdn.default_ttl_secs must lie within [min, max]".to_string());
        }
        Ok(())
    }

    /// The per-deployment shared secret proving a compute-tier request came
    /// through the trusted CDN layer. Derived deterministically from the
    /// deployment identity so both tiers agree without distributing a
    /// user-supplied token.
    pub fn shared_secret(&self) -> String {
        let digest = Sha256::digest(format!("mediax-origin-secret/{}", self.deployment_id));
        hex::encode(digest)
    }

    /// Cache bucket name, falling back to the origin bucket.
    pub fn cache_bucket(&self) -> &str {
        self.cache
            .bucket
            .as_deref()
            .unwrap_or(&self.origin_bucket)
    }
}

fn default_true() -> bool {
    true
}

fn default_expiration_days() -> u32 {
    DEFAULT_CACHE_EXPIRATION_DAYS
}

fn default_cache_control() -> String {
    DEFAULT_CACHE_CONTROL.to_string()
}

fn default_absent_statuses() -> Vec<u16> {
    vec![403, 404]
}

fn default_cdn_ttl() -> u64 {
    DEFAULT_CDN_TTL_SECS
}

fn default_cdn_min_ttl() -> u64 {
    DEFAULT_CDN_MIN_TTL_SECS
}

fn default_cdn_max_ttl() -> u64 {
    DEFAULT_CDN_MAX_TTL_SECS
}

fn default_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        "origin_bucket: media-origin\ndeployment_id: prod-eu-1\n"
    }

    #[test]
    fn test_minimal_config_loads_with_defaults() {
        let config = Config::from_yaml_with_env(minimal_yaml()).unwrap();
        assert_eq!(config.origin_bucket, "media-origin");
        assert!(config.cache.enabled);
        assert_eq!(config.cache.expiration_days, 90);
        assert_eq!(config.cache.cache_control, "max-age=31622400");
        assert_eq!(config.cache.absent_statuses, vec![403, 404]);
        assert!(config.audio_enabled);
        assert!(!config.redirect_responses);
        assert_eq!(config.cache_bucket(), "media-origin");
    }

    #[test]
    fn test_missing_origin_bucket_is_fatal() {
        let result = Config::from_yaml_with_env("deployment_id: x\norigin_bucket: \"\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("MEDIAX_TEST_BUCKET", "bucket-from-env");
        let config = Config::from_yaml_with_env(
            "origin_bucket: ${MEDIAX_TEST_BUCKET}\ndeployment_id: dev\n",
        )
        .unwrap();
        assert_eq!(config.origin_bucket, "bucket-from-env");
    }

    #[test]
    fn test_env_substitution_missing_var_fails() {
        let result = Config::from_yaml_with_env(
            "origin_bucket: ${MEDIAX_TEST_UNSET_VAR}\ndeployment_id: dev\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_shared_secret_is_deterministic() {
        let a = Config::from_yaml_with_env(minimal_yaml()).unwrap();
        let b = Config::from_yaml_with_env(minimal_yaml()).unwrap();
        assert_eq!(a.shared_secret(), b.shared_secret());
        assert_eq!(a.shared_secret().len(), 64);

        let other = Config::from_yaml_with_env(
            "origin_bucket: media-origin\ndeployment_id: staging\n",
        )
        .unwrap();
        assert_ne!(a.shared_secret(), other.shared_secret());
    }

    #[test]
    fn test_cdn_ttl_bounds_validated() {
        let yaml = "origin_bucket: b\ndeployment_id: d\ncdn:\n  min_ttl_secs: 100\n  max_ttl_secs: 10\n";
        assert!(Config::from_yaml_with_env(yaml).is_err());
    }

    #[test]
    fn test_cache_bucket_override() {
        let yaml = "origin_bucket: origin\ndeployment_id: d\ncache:\n  bucket: variants\n";
        let config = Config::from_yaml_with_env(yaml).unwrap();
        assert_eq!(config.cache_bucket(), "variants");
    }
}
