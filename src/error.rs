// Error types module

use thiserror::Error;

/// Terminal error taxonomy for one compute-tier request.
///
/// Every variant ends the current request; nothing here is retried by the
/// engine itself. The only retry-like behavior in the system lives in the
/// tiered origin resolver, which switches to the compute tier exactly once
/// on the storage tier's "absent" signal.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Shared secret header missing or not matching the deployment secret
    #[error("Request unauthorized")]
    Unauthorized,

    /// Compute tier only serves GET
    #[error("Only GET method is supported")]
    MethodNotAllowed,

    /// Request path carries no directive segment; rejected before any
    /// storage access
    #[error("Invalid canonical request path: {0}")]
    InvalidPath(String),

    /// Fetching the original object from the origin tier failed
    #[error("Failed to download original object: {0}")]
    OriginDownloadFailed(String),

    /// Image decode/resize/encode failed
    #[error("Image transformation failed: {0}")]
    ImageTransformFailed(String),

    /// External transcoding engine failed or could not be invoked
    #[error("Audio transformation failed: {0}")]
    AudioTransformFailed(String),

    /// Persisting the variant to the cache tier failed
    #[error("Failed to upload variant to cache tier: {0}")]
    CacheUploadFailed(String),

    /// Startup/configuration problems (missing origin bucket, bad YAML)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// HTTP status reported to the client.
    ///
    /// The taxonomy exists for operability; clients uniformly see a
    /// 500-class response with a short stage-identifying body.
    pub fn status_code(&self) -> u16 {
        500
    }

    /// Stage label used in structured logs.
    pub fn stage(&self) -> &'static str {
        match self {
            EngineError::Unauthorized => "auth",
            EngineError::MethodNotAllowed => "auth",
            EngineError::InvalidPath(_) => "entry",
            EngineError::OriginDownloadFailed(_) => "download",
            EngineError::ImageTransformFailed(_) => "transform",
            EngineError::AudioTransformFailed(_) => "transform",
            EngineError::CacheUploadFailed(_) => "upload",
            EngineError::Config(_) => "startup",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_match_contract() {
        assert_eq!(EngineError::Unauthorized.to_string(), "Request unauthorized");
        assert_eq!(
            EngineError::MethodNotAllowed.to_string(),
            "Only GET method is supported"
        );
    }

    #[test]
    fn test_all_errors_map_to_500() {
        let errors = [
            EngineError::Unauthorized,
            EngineError::MethodNotAllowed,
            EngineError::InvalidPath("/loneseg".into()),
            EngineError::OriginDownloadFailed("timeout".into()),
            EngineError::ImageTransformFailed("decode".into()),
            EngineError::AudioTransformFailed("exit 1".into()),
            EngineError::CacheUploadFailed("denied".into()),
        ];
        for e in errors {
            assert_eq!(e.status_code(), 500);
        }
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(EngineError::InvalidPath("x".into()).stage(), "entry");
        assert_eq!(
            EngineError::OriginDownloadFailed("x".into()).stage(),
            "download"
        );
        assert_eq!(
            EngineError::ImageTransformFailed("x".into()).stage(),
            "transform"
        );
        assert_eq!(EngineError::CacheUploadFailed("x".into()).stage(), "upload");
    }
}
