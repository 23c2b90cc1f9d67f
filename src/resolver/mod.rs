//! Tiered origin resolver
//!
//! Two-origin fallback chain: the PRIMARY tier is the cache bucket holding
//! already-materialized variants keyed by canonical path; the FALLBACK tier
//! is the transform engine. Exactly one transition exists, PRIMARY →
//! FALLBACK, taken only on the primary tier's configured "absent" signal.
//! There is no transition back and no repeat of either tier; a FALLBACK
//! failure propagates to the client as-is.
//!
//! Fallback requests carry the deployment's shared secret so the compute
//! tier can tell CDN-originated traffic from direct hits.

use std::sync::Arc;

use crate::constants::ORIGIN_SECRET_HEADER;
use crate::engine::{EngineRequest, EngineResponse, TransformEngine};
use crate::storage::ObjectStore;

/// Which tier produced a response; carried in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginTier {
    Primary,
    Fallback,
}

pub struct TieredResolver {
    primary: Arc<dyn ObjectStore>,
    fallback: Arc<TransformEngine>,
    shared_secret: String,
    cache_control: String,
    cors_enabled: bool,
}

impl TieredResolver {
    pub fn new(
        primary: Arc<dyn ObjectStore>,
        fallback: Arc<TransformEngine>,
        shared_secret: String,
        cache_control: String,
        cors_enabled: bool,
    ) -> Self {
        Self {
            primary,
            fallback,
            shared_secret,
            cache_control,
            cors_enabled,
        }
    }

    /// Resolve one canonical path through the tier chain.
    pub async fn resolve(&self, canonical_path: &str) -> (OriginTier, EngineResponse) {
        let key = canonical_path.trim_start_matches('/');

        match self.primary.get(key).await {
            Ok(object) => {
                tracing::debug!(key = key, "primary tier hit");
                let response = EngineResponse::inline(
                    &object.body,
                    object.content_type.as_deref(),
                    &self.cache_control,
                    &object.metadata,
                    self.cors_enabled,
                );
                (OriginTier::Primary, response)
            }
            Err(err) if err.is_absent() => {
                tracing::debug!(key = key, "primary tier absent, switching to compute tier");
                let request = EngineRequest::get(canonical_path)
                    .with_header(ORIGIN_SECRET_HEADER, self.shared_secret.clone());
                (OriginTier::Fallback, self.fallback.handle(&request).await)
            }
            Err(err) => {
                // Anything other than the absent signal is a primary-tier
                // failure, not a miss; it must not reach the compute tier.
                tracing::error!(key = key, error = %err, "primary tier failed");
                let response = EngineResponse {
                    status_code: 500,
                    headers: Default::default(),
                    body: format!("Primary tier failure: {err}"),
                    is_base64_encoded: false,
                };
                (OriginTier::Primary, response)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::{MemoryObjectStore, StoredObject};
    use bytes::Bytes;

    fn test_config() -> Config {
        Config::from_yaml_with_env("origin_bucket: origin\ndeployment_id: test\n").unwrap()
    }

    struct Fixture {
        cache: Arc<MemoryObjectStore>,
        resolver: TieredResolver,
    }

    fn fixture_with_origin(seed: &[(&str, StoredObject)]) -> Fixture {
        let config = test_config();
        let origin = Arc::new(MemoryObjectStore::new());
        for (key, object) in seed {
            origin.insert(key.to_string(), object.clone());
        }
        let cache = Arc::new(MemoryObjectStore::new());
        let engine = Arc::new(TransformEngine::new(
            config.clone(),
            origin,
            cache.clone(),
        ));
        let resolver = TieredResolver::new(
            cache.clone(),
            engine,
            config.shared_secret(),
            config.cache.cache_control.clone(),
            false,
        );
        Fixture { cache, resolver }
    }

    #[tokio::test]
    async fn test_primary_hit_skips_compute() {
        let fixture = fixture_with_origin(&[]);
        let variant = StoredObject::new(Bytes::from_static(b"cached"), Some("image/png".into()));
        fixture.cache.insert("a.png/original", variant);

        let (tier, response) = fixture.resolver.resolve("/a.png/original").await;
        assert_eq!(tier, OriginTier::Primary);
        assert_eq!(response.status_code, 200);
        assert!(response.is_base64_encoded);
    }

    #[tokio::test]
    async fn test_absent_falls_back_to_compute_once() {
        let source = StoredObject::new(Bytes::from_static(b"plain text"), Some("text/plain".into()));
        let fixture = fixture_with_origin(&[("notes.txt", source)]);

        let (tier, response) = fixture.resolver.resolve("/notes.txt/original").await;
        assert_eq!(tier, OriginTier::Fallback);
        assert_eq!(response.status_code, 200);
        // Compute populated the primary tier for the next request
        assert!(fixture.cache.contains("notes.txt/original"));

        let (tier, _) = fixture.resolver.resolve("/notes.txt/original").await;
        assert_eq!(tier, OriginTier::Primary);
    }

    #[tokio::test]
    async fn test_fallback_failure_propagates_as_is() {
        // Origin is empty, so the compute tier's download stage fails
        let fixture = fixture_with_origin(&[]);
        let (tier, response) = fixture.resolver.resolve("/missing.jpg/original").await;
        assert_eq!(tier, OriginTier::Fallback);
        assert_eq!(response.status_code, 500);
        assert!(response.body.contains("download"));
    }
}
