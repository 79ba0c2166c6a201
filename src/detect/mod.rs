//! Frame detection tier
//!
//! Everything between the camera and the session state: frame capture,
//! classification, the label stability filter, and the loop driver that
//! ties them together.

pub mod capture;
pub mod classifier;
pub mod engine;
pub mod filter;

pub use capture::{Frame, FrameSource, SnapshotSource};
pub use classifier::{Classifier, HttpClassifier};
pub use engine::DetectionEngine;

use serde::{Deserialize, Serialize};

/// One ranked prediction for a frame
///
/// Many per classification call; not retained across cycles. Probabilities
/// need not sum to 1 and arrive in no particular order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionCandidate {
    /// Predicted food label
    pub label: String,
    /// Confidence in [0, 1]
    pub probability: f64,
}

/// A label the stability filter let through
///
/// At most one "current" value per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedDetection {
    /// Accepted food label
    pub label: String,
    /// Winning probability at acceptance time
    pub probability: f64,
    /// When the filter accepted the label
    pub accepted_at: chrono::DateTime<chrono::Utc>,
}
