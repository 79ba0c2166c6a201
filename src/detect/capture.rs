//! Frame capture
//!
//! The camera is an external collaborator behind the [`FrameSource`] trait:
//! acquired in `start()`, one frame per `next_frame()`, released in
//! `stop()`. The shipped implementation pulls JPEG stills from a snapshot
//! endpoint (IP camera or capture sidecar).

use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// One captured frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Encoded image bytes (JPEG)
    pub data: Vec<u8>,
    /// When the frame was captured
    pub captured_at: chrono::DateTime<chrono::Utc>,
    /// Monotonic frame counter within the source
    pub sequence: u64,
}

/// Produces frames on demand; owns its own device lifecycle
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Acquire the device
    ///
    /// A failure here is fatal to the session and must leave the source
    /// released, so a later `start()` can try again cleanly.
    async fn start(&self) -> Result<()>;

    /// Produce the next frame
    ///
    /// Failures are transient: the caller skips the cycle and asks again.
    async fn next_frame(&self) -> Result<Frame>;

    /// Release the device
    ///
    /// Must be safe to call repeatedly and after a failed `start()`.
    async fn stop(&self);
}

/// Frame source reading JPEG stills from an HTTP snapshot endpoint
pub struct SnapshotSource {
    http_client: reqwest::Client,
    url: String,
    started: AtomicBool,
    sequence: AtomicU64,
}

impl SnapshotSource {
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Capture(format!("Failed to build capture client: {}", e)))?;

        Ok(Self {
            http_client,
            url: config.url.clone(),
            started: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
        })
    }

    async fn fetch(&self) -> Result<Vec<u8>> {
        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Capture(format!("Snapshot request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Capture(format!(
                "Snapshot endpoint returned {}",
                status.as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Capture(format!("Snapshot body read failed: {}", e)))?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl FrameSource for SnapshotSource {
    /// Probe the endpoint once; the camera is "acquired" when it answers
    async fn start(&self) -> Result<()> {
        self.fetch().await?;
        self.started.store(true, Ordering::SeqCst);
        tracing::info!(url = %self.url, "Snapshot source started");
        Ok(())
    }

    async fn next_frame(&self) -> Result<Frame> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(Error::Capture("Snapshot source not started".to_string()));
        }

        let data = self.fetch().await?;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Frame {
            data,
            captured_at: chrono::Utc::now(),
            sequence,
        })
    }

    async fn stop(&self) {
        if self.started.swap(false, Ordering::SeqCst) {
            tracing::info!(url = %self.url, "Snapshot source stopped");
        }
    }
}
