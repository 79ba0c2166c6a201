//! Frame classification
//!
//! The image model is an external collaborator behind the [`Classifier`]
//! trait. The shipped implementation posts base64-encoded frames to an
//! inference sidecar and maps its ranked predictions back.

use super::capture::Frame;
use super::DetectionCandidate;
use crate::config::ClassifierConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

/// Ranks a frame against the food label vocabulary
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one frame into ranked candidates
    ///
    /// Probabilities need not sum to 1 and the order is unspecified; the
    /// stability filter does its own selection. Failures are transient:
    /// the caller skips the cycle and classifies the next frame.
    async fn classify(&self, frame: &Frame) -> Result<Vec<DetectionCandidate>>;
}

/// Classify request body
#[derive(Debug, Serialize)]
struct ClassifyRequest {
    /// Base64-encoded JPEG
    image: String,
}

/// Classify response body
#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    predictions: Vec<DetectionCandidate>,
}

/// Classifier backed by an HTTP inference service
pub struct HttpClassifier {
    http_client: reqwest::Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Classification(format!("Failed to build classifier client: {}", e)))?;

        Ok(Self {
            http_client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, frame: &Frame) -> Result<Vec<DetectionCandidate>> {
        let image = general_purpose::STANDARD.encode(&frame.data);

        let response = self
            .http_client
            .post(&self.url)
            .json(&ClassifyRequest { image })
            .send()
            .await
            .map_err(|e| Error::Classification(format!("Classify request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Classification(format!(
                "Classifier returned {}",
                status.as_u16()
            )));
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| Error::Classification(format!("Classify response parse failed: {}", e)))?;

        tracing::trace!(
            frame = frame.sequence,
            candidates = body.predictions.len(),
            "Frame classified"
        );

        Ok(body.predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::net::SocketAddr;

    async fn serve_stub(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn classifier_for(addr: SocketAddr) -> HttpClassifier {
        let config = ClassifierConfig {
            url: format!("http://{}/classify", addr),
            timeout_ms: 2000,
        };
        HttpClassifier::new(&config).unwrap()
    }

    fn frame(data: &[u8]) -> Frame {
        Frame {
            data: data.to_vec(),
            captured_at: chrono::Utc::now(),
            sequence: 1,
        }
    }

    #[tokio::test]
    async fn test_classify_encodes_frame_and_maps_predictions() {
        let router = Router::new().route(
            "/classify",
            post(|Json(body): Json<serde_json::Value>| async move {
                // [0xFF, 0xD8, 0xFF] base64-encodes to "/9j/"
                assert_eq!(body["image"], "/9j/");
                Json(serde_json::json!({
                    "predictions": [
                        { "label": "Caesar Salad", "probability": 0.91 },
                        { "label": "Breakfast Sandwich", "probability": 0.04 }
                    ]
                }))
            }),
        );
        let addr = serve_stub(router).await;
        let classifier = classifier_for(addr);

        let candidates = classifier
            .classify(&frame(&[0xFF, 0xD8, 0xFF]))
            .await
            .unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].label, "Caesar Salad");
        assert_eq!(candidates[0].probability, 0.91);
    }

    #[tokio::test]
    async fn test_classify_empty_predictions() {
        let router = Router::new().route(
            "/classify",
            post(|| async { Json(serde_json::json!({})) }),
        );
        let addr = serve_stub(router).await;
        let classifier = classifier_for(addr);

        let candidates = classifier.classify(&frame(b"x")).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_classify_error_status() {
        let router = Router::new().route(
            "/classify",
            post(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let addr = serve_stub(router).await;
        let classifier = classifier_for(addr);

        match classifier.classify(&frame(b"x")).await {
            Err(Error::Classification(detail)) => assert!(detail.contains("500")),
            other => panic!("expected Classification error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_classify_malformed_body() {
        let router = Router::new().route(
            "/classify",
            post(|| async { ([("content-type", "application/json")], "nope") }),
        );
        let addr = serve_stub(router).await;
        let classifier = classifier_for(addr);

        assert!(matches!(
            classifier.classify(&frame(b"x")).await,
            Err(Error::Classification(_))
        ));
    }
}
