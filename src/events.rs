//! Event types for the platemate event system
//!
//! Provides the event definitions and EventBus used by the detection engine
//! and the SSE endpoint.

use crate::state::IngredientResolution;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// platemate event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. All events use this central enum for type safety and
/// exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DetectionEvent {
    /// Detection session started, camera acquired
    ///
    /// Triggers:
    /// - SSE: Switch UI into live-detection mode
    SessionStarted {
        /// Session UUID
        session_id: Uuid,
        /// When the session started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Detection session stopped, camera released
    SessionStopped {
        /// Session UUID
        session_id: Uuid,
        /// When the session stopped
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The stability filter accepted a new label
    ///
    /// Emitted only on change: repeats of the current label are suppressed
    /// at the filter, so each event marks the start of a new cycle.
    DetectionAccepted {
        /// Accepted food label
        label: String,
        /// Winning probability (threshold already applied)
        probability: f64,
        /// Cycle this detection opened
        cycle: u64,
        /// When the detection was accepted
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One classification cycle failed (frame fetch or classifier call)
    ///
    /// The loop continues with the next cycle; session state is unchanged.
    CycleFailed {
        /// Human-readable failure description
        detail: String,
        /// When the cycle failed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Accepted label has no recipe in the catalog
    LookupMissed {
        /// Label that missed
        label: String,
        /// When the lookup missed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Product resolution round started for a recipe's ingredients
    ResolutionStarted {
        /// Recipe label being resolved
        label: String,
        /// Cycle the round belongs to
        cycle: u64,
        /// Ingredient names being resolved, one matcher call each
        ingredients: Vec<String>,
        /// When the round started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Product resolution skipped because the rate-limit gate was closed
    ///
    /// The detection itself still went through; only the matcher fan-out
    /// was suppressed.
    ResolutionSkipped {
        /// Recipe label that was detected
        label: String,
        /// Cycle of the detection
        cycle: u64,
        /// When the round was skipped
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One ingredient finished resolving (success or failure)
    ///
    /// Triggers:
    /// - SSE: Update the ingredient's product card
    IngredientResolved {
        /// Cycle the result belongs to
        cycle: u64,
        /// Final per-ingredient record
        resolution: IngredientResolution,
        /// When the ingredient resolved
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A matcher result arrived after its cycle was superseded
    ///
    /// The result was discarded without touching session state.
    StaleResolutionDiscarded {
        /// Cycle the late result was tagged with
        cycle: u64,
        /// Cycle the session is currently on
        current_cycle: u64,
        /// Ingredient whose result was dropped
        ingredient: String,
        /// When the result was discarded
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl DetectionEvent {
    /// Event type name as serialized in the `type` field
    pub fn event_type(&self) -> &'static str {
        match self {
            DetectionEvent::SessionStarted { .. } => "SessionStarted",
            DetectionEvent::SessionStopped { .. } => "SessionStopped",
            DetectionEvent::DetectionAccepted { .. } => "DetectionAccepted",
            DetectionEvent::CycleFailed { .. } => "CycleFailed",
            DetectionEvent::LookupMissed { .. } => "LookupMissed",
            DetectionEvent::ResolutionStarted { .. } => "ResolutionStarted",
            DetectionEvent::ResolutionSkipped { .. } => "ResolutionSkipped",
            DetectionEvent::IngredientResolved { .. } => "IngredientResolved",
            DetectionEvent::StaleResolutionDiscarded { .. } => "StaleResolutionDiscarded",
        }
    }
}

/// Event bus for broadcasting events to multiple subscribers
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DetectionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<DetectionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: DetectionEvent,
    ) -> Result<usize, broadcast::error::SendError<DetectionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// This is useful for non-critical events where it's acceptable if
    /// no component is currently listening.
    pub fn emit_lossy(&self, event: DetectionEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    ///
    /// Useful for debugging and monitoring
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
