//! Transform engine - the compute tier
//!
//! Invoked only when the storage tier misses. One request runs one strictly
//! ordered pipeline: validate entry → split the canonical path → download
//! the original → decide applicability → transform → persist the variant →
//! respond. No stage is retried; every failure is terminal for the request
//! and reported as a 500 with a stage-identifying body.
//!
//! Concurrent misses for the same canonical key are not coalesced: each
//! request transforms independently and the last cache write wins.

pub mod audio;
pub mod encoder;
pub mod image;

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;
use bytes::Bytes;

use crate::config::Config;
use crate::constants::{METADATA_HEADER_PREFIX, ORIGIN_SECRET_HEADER};
use crate::directives::{self, TransformDirectives};
use crate::error::EngineError;
use crate::storage::{ObjectStore, StoredObject};

/// The request fields the engine consumes. Header keys are expected
/// lower-cased (HTTP/1 header names are case-insensitive).
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
}

impl EngineRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }
}

/// The wire response shape of the compute tier.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl EngineResponse {
    /// Inline success: base64 body plus serving headers and propagated
    /// user metadata.
    pub fn inline(
        body: &[u8],
        content_type: Option<&str>,
        cache_control: &str,
        metadata: &HashMap<String, String>,
        cors_enabled: bool,
    ) -> Self {
        let mut headers = BTreeMap::new();
        if let Some(content_type) = content_type {
            headers.insert("Content-Type".to_string(), content_type.to_string());
        }
        headers.insert("Cache-Control".to_string(), cache_control.to_string());
        for (key, value) in metadata {
            headers.insert(format!("{}{}", METADATA_HEADER_PREFIX, key), value.clone());
        }
        if cors_enabled {
            headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
        }

        Self {
            status_code: 200,
            headers,
            body: base64::engine::general_purpose::STANDARD.encode(body),
            is_base64_encoded: true,
        }
    }

    /// Redirect success: send the client back through the origin chain,
    /// which now hits the freshly populated storage tier.
    pub fn redirect(location: String) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Location".to_string(), location);
        headers.insert("Cache-Control".to_string(), "no-cache".to_string());
        Self {
            status_code: 302,
            headers,
            body: String::new(),
            is_base64_encoded: false,
        }
    }

    pub fn error(err: &EngineError) -> Self {
        Self {
            status_code: err.status_code(),
            headers: BTreeMap::new(),
            body: err.to_string(),
            is_base64_encoded: false,
        }
    }
}

/// Which transform routine applies to one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applicability {
    None,
    Image,
    Audio,
}

/// The compute tier. Stateless across requests; all state is one request's
/// own pipeline.
pub struct TransformEngine {
    config: Config,
    origin: Arc<dyn ObjectStore>,
    cache: Arc<dyn ObjectStore>,
    shared_secret: String,
}

impl TransformEngine {
    pub fn new(config: Config, origin: Arc<dyn ObjectStore>, cache: Arc<dyn ObjectStore>) -> Self {
        let shared_secret = config.shared_secret();
        Self {
            config,
            origin,
            cache,
            shared_secret,
        }
    }

    /// Handle one compute-tier request end to end.
    pub async fn handle(&self, request: &EngineRequest) -> EngineResponse {
        match self.process(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(stage = err.stage(), error = %err, path = %request.path, "request failed");
                EngineResponse::error(&err)
            }
        }
    }

    async fn process(&self, request: &EngineRequest) -> Result<EngineResponse, EngineError> {
        // Entry contract: reject before touching storage
        if request.method != "GET" {
            return Err(EngineError::MethodNotAllowed);
        }
        let presented = request
            .headers
            .get(ORIGIN_SECRET_HEADER)
            .map(String::as_str)
            .unwrap_or_default();
        if presented != self.shared_secret {
            return Err(EngineError::Unauthorized);
        }

        let (original_path, directive_string) = directives::split_canonical_path(&request.path)
            .ok_or_else(|| EngineError::InvalidPath(request.path.clone()))?;

        let download_started = Instant::now();
        let object = self
            .origin
            .get(&original_path)
            .await
            .map_err(|e| EngineError::OriginDownloadFailed(e.to_string()))?;
        self.log_stage("download", download_started, &original_path);

        // The edge only emits in-range values, but the engine re-validates
        // anyway; garbage degrades to the empty set and passes through.
        let parsed = TransformDirectives::parse(directive_string);
        let applicability = decide_applicability(&object, &parsed);

        let transform_started = Instant::now();
        let (body, content_type) = match applicability {
            Applicability::None => (object.body.clone(), object.content_type.clone()),
            Applicability::Image => {
                let (data, content_type) = image::transform(&object, &parsed)?;
                (Bytes::from(data), Some(content_type))
            }
            Applicability::Audio => {
                let (data, content_type) =
                    audio::transcode(&object, &original_path, &parsed).await?;
                (Bytes::from(data), Some(content_type))
            }
        };
        self.log_stage("transform", transform_started, &original_path);

        // Persist under the exact key the storage tier was asked for, so
        // the next resolution of this canonical path is a primary hit.
        let variant = StoredObject {
            body: body.clone(),
            content_type: content_type.clone(),
            metadata: object.metadata.clone(),
        };
        if self.config.cache.enabled {
            let upload_started = Instant::now();
            let cache_key = request.path.trim_start_matches('/');
            self.cache
                .put(cache_key, &variant, &self.config.cache.cache_control)
                .await
                .map_err(|e| EngineError::CacheUploadFailed(e.to_string()))?;
            self.log_stage("upload", upload_started, cache_key);
        }

        if self.config.redirect_responses {
            let location = match parsed.to_query_string() {
                Some(query) => format!("/{}?{}", original_path, query),
                None => format!("/{}", original_path),
            };
            Ok(EngineResponse::redirect(location))
        } else {
            Ok(EngineResponse::inline(
                &variant.body,
                variant.content_type.as_deref(),
                &self.config.cache.cache_control,
                &variant.metadata,
                self.config.cors_enabled,
            ))
        }
    }

    fn log_stage(&self, stage: &str, started: Instant, key: &str) {
        if self.config.timing_logs {
            tracing::info!(
                stage = stage,
                elapsed_ms = started.elapsed().as_millis() as u64,
                key = key,
                "stage completed"
            );
        }
    }
}

/// Decide whether any transform applies.
///
/// The `original` sentinel, a non-media content type, or a directive set
/// with no key relevant to the fetched kind all mean passthrough: persist
/// and return the source unchanged.
fn decide_applicability(object: &StoredObject, parsed: &TransformDirectives) -> Applicability {
    if parsed.is_empty() {
        return Applicability::None;
    }
    let content_type = object.content_type.as_deref().unwrap_or_default();
    if content_type.starts_with("image") && parsed.has_image_directive() {
        Applicability::Image
    } else if content_type.starts_with("audio") && parsed.has_audio_directive() {
        Applicability::Audio
    } else {
        Applicability::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(content_type: &str) -> StoredObject {
        StoredObject::new(Bytes::from_static(b"data"), Some(content_type.to_string()))
    }

    #[test]
    fn test_applicability_sentinel_short_circuits() {
        let parsed = TransformDirectives::parse("original");
        assert_eq!(
            decide_applicability(&object("image/jpeg"), &parsed),
            Applicability::None
        );
    }

    #[test]
    fn test_applicability_non_media_passthrough() {
        let parsed = TransformDirectives::parse("width=100");
        assert_eq!(
            decide_applicability(&object("application/pdf"), &parsed),
            Applicability::None
        );
    }

    #[test]
    fn test_applicability_kind_relevance() {
        let bitrate_only = TransformDirectives::parse("bitrate=64k");
        assert_eq!(
            decide_applicability(&object("image/png"), &bitrate_only),
            Applicability::None
        );

        let width_only = TransformDirectives::parse("width=100");
        assert_eq!(
            decide_applicability(&object("audio/flac"), &width_only),
            Applicability::None
        );

        assert_eq!(
            decide_applicability(&object("image/png"), &width_only),
            Applicability::Image
        );
        assert_eq!(
            decide_applicability(&object("audio/flac"), &bitrate_only),
            Applicability::Audio
        );
    }

    #[test]
    fn test_applicability_missing_content_type() {
        let parsed = TransformDirectives::parse("width=100");
        let no_type = StoredObject::new(Bytes::from_static(b"data"), None);
        assert_eq!(decide_applicability(&no_type, &parsed), Applicability::None);
    }

    #[test]
    fn test_inline_response_shape() {
        let mut metadata = HashMap::new();
        metadata.insert("owner".to_string(), "alice".to_string());
        let response =
            EngineResponse::inline(b"abc", Some("image/webp"), "max-age=60", &metadata, true);

        assert_eq!(response.status_code, 200);
        assert!(response.is_base64_encoded);
        assert_eq!(response.body, "YWJj");
        assert_eq!(response.headers.get("Content-Type").unwrap(), "image/webp");
        assert_eq!(response.headers.get("Cache-Control").unwrap(), "max-age=60");
        assert_eq!(response.headers.get("x-amz-meta-owner").unwrap(), "alice");
        assert_eq!(
            response.headers.get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );
    }

    #[test]
    fn test_redirect_response_shape() {
        let response = EngineResponse::redirect("/image.jpg?format=webp".to_string());
        assert_eq!(response.status_code, 302);
        assert_eq!(
            response.headers.get("Location").unwrap(),
            "/image.jpg?format=webp"
        );
        assert_eq!(response.headers.get("Cache-Control").unwrap(), "no-cache");
        assert!(!response.is_base64_encoded);
    }

    #[test]
    fn test_response_serializes_to_wire_names() {
        let response = EngineResponse::error(&EngineError::Unauthorized);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["statusCode"], 500);
        assert_eq!(json["body"], "Request unauthorized");
        assert_eq!(json["isBase64Encoded"], false);
    }
}
