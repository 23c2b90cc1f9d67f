//! Single-binary HTTP front
//!
//! Wires the two independently deployable pure functions together: every
//! request passes through the edge normalizer (request→request, no I/O)
//! and then the tiered origin resolver. The two stay separate components
//! even here because the edge half must remain runnable in an environment
//! with no network access and a strict time budget.

use std::convert::Infallible;
use std::sync::Arc;

use base64::Engine as _;
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::edge::{self, EdgeConfig};
use crate::engine::{EngineResponse, TransformEngine};
use crate::resolver::TieredResolver;
use crate::storage::{s3, S3ObjectStore};

/// Handle one front-door request: normalize, then resolve through the
/// tier chain. Generic over the body type because the pipeline never
/// consumes a request body.
pub async fn handle_request<B>(
    request: Request<B>,
    edge_config: EdgeConfig,
    resolver: Arc<TieredResolver>,
) -> Response<Full<Bytes>> {
    if request.method() != hyper::Method::GET {
        return to_http(EngineResponse {
            status_code: 500,
            headers: Default::default(),
            body: "Only GET method is supported".to_string(),
            is_base64_encoded: false,
        });
    }

    let accept = request
        .headers()
        .get(hyper::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let query_pairs = edge::parse_query_string(request.uri().query().unwrap_or(""));
    let normalized = edge::normalize(
        request.uri().path(),
        &query_pairs,
        accept.as_deref(),
        &edge_config,
    );

    let (tier, response) = resolver.resolve(&normalized.path).await;
    tracing::info!(
        path = %normalized.path,
        tier = ?tier,
        status = response.status_code,
        "request resolved"
    );
    to_http(response)
}

/// Convert the engine's wire shape into an HTTP response, decoding the
/// base64 body back into raw bytes.
fn to_http(response: EngineResponse) -> Response<Full<Bytes>> {
    let body = if response.is_base64_encoded {
        Bytes::from(
            base64::engine::general_purpose::STANDARD
                .decode(&response.body)
                .unwrap_or_default(),
        )
    } else {
        Bytes::from(response.body)
    };

    let mut builder = Response::builder().status(response.status_code);
    for (name, value) in &response.headers {
        builder = builder.header(name, value);
    }
    builder.body(Full::new(body)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to build response");
        Response::builder()
            .status(500)
            .body(Full::new(Bytes::from_static(b"Internal error")))
            .expect("static fallback response")
    })
}

/// Build the tier chain from configuration and serve until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let client = s3::build_client(config.region.clone(), config.endpoint_url.clone()).await;
    let origin = Arc::new(S3ObjectStore::new(
        client.clone(),
        config.origin_bucket.clone(),
        config.cache.absent_statuses.clone(),
    ));
    let cache = Arc::new(S3ObjectStore::new(
        client,
        config.cache_bucket().to_string(),
        config.cache.absent_statuses.clone(),
    ));

    let engine = Arc::new(TransformEngine::new(
        config.clone(),
        origin,
        cache.clone(),
    ));
    let resolver = Arc::new(TieredResolver::new(
        cache,
        engine,
        config.shared_secret(),
        config.cache.cache_control.clone(),
        config.cors_enabled,
    ));
    let edge_config = EdgeConfig {
        audio_enabled: config.audio_enabled,
    };

    let listen_addr = format!("{}:{}", config.server.address, config.server.port);
    let listener = TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "mediax listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let resolver = resolver.clone();

        tokio::spawn(async move {
            let service = service_fn(move |request| {
                let resolver = resolver.clone();
                async move {
                    Ok::<_, Infallible>(handle_request(request, edge_config, resolver).await)
                }
            });
            if let Err(err) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(peer = %peer, error = %err, "connection closed with error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryObjectStore, StoredObject};

    fn test_resolver(seed_cache: &[(&str, StoredObject)]) -> Arc<TieredResolver> {
        let config =
            Config::from_yaml_with_env("origin_bucket: origin\ndeployment_id: test\n").unwrap();
        let origin = Arc::new(MemoryObjectStore::new());
        let cache = Arc::new(MemoryObjectStore::new());
        for (key, object) in seed_cache {
            cache.insert(key.to_string(), object.clone());
        }
        let engine = Arc::new(TransformEngine::new(config.clone(), origin, cache.clone()));
        Arc::new(TieredResolver::new(
            cache,
            engine,
            config.shared_secret(),
            config.cache.cache_control.clone(),
            false,
        ))
    }

    #[tokio::test]
    async fn test_front_serves_cached_variant() {
        let variant =
            StoredObject::new(Bytes::from_static(b"imgbytes"), Some("image/webp".into()));
        let resolver = test_resolver(&[("a.jpg/format=webp", variant)]);

        let request = Request::builder()
            .method("GET")
            .uri("/a.jpg?format=webp")
            .body(())
            .unwrap();
        let response = handle_request(request, EdgeConfig::default(), resolver).await;

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "image/webp"
        );
    }

    #[tokio::test]
    async fn test_front_rejects_non_get() {
        let resolver = test_resolver(&[]);
        let request = Request::builder()
            .method("POST")
            .uri("/a.jpg")
            .body(())
            .unwrap();
        let response = handle_request(request, EdgeConfig::default(), resolver).await;
        assert_eq!(response.status(), 500);
    }

    #[test]
    fn test_to_http_decodes_base64_body() {
        let engine_response = EngineResponse::inline(
            b"raw",
            Some("image/png"),
            "max-age=1",
            &Default::default(),
            false,
        );
        let response = to_http(engine_response);
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "max-age=1");
    }
}
