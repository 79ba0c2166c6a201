//! Shared session state
//!
//! Thread-safe state for one detection session, shared between the loop
//! driver, resolver completions, and the HTTP API. The driver is the only
//! writer of `current` and the rate-limit stamp; resolver completions only
//! touch their own ingredient's entry, after proving their cycle is still
//! the current one.

use crate::detect::AcceptedDetection;
use crate::resolver::ProductMatch;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Per-ingredient resolution lifecycle
///
/// Transitions Idle -> Loading -> {Loaded | Failed}, terminal once set.
/// A new accepted detection starts fresh entries rather than reusing these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ResolutionStatus {
    /// Not yet dispatched
    Idle,
    /// Matcher call in flight
    Loading,
    /// Matcher answered; zero matches is still Loaded
    Loaded {
        /// Products for this ingredient, already normalized
        matches: Vec<ProductMatch>,
    },
    /// Matcher call failed; siblings are unaffected
    Failed {
        /// Failure description for display
        error: String,
    },
}

impl ResolutionStatus {
    /// Whether the entry is still awaiting its matcher result
    pub fn is_loading(&self) -> bool {
        matches!(self, ResolutionStatus::Loading)
    }
}

/// Resolution state of one ingredient within the current cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientResolution {
    /// Ingredient name, also the map key and the matcher query
    pub ingredient: String,
    /// Lifecycle state with its payload
    #[serde(flatten)]
    pub status: ResolutionStatus,
}

/// Read-only view of the session for the API
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Active session id, None when stopped
    pub session_id: Option<Uuid>,
    /// Current detection cycle number
    pub cycle: u64,
    /// Last accepted detection, None before the first acceptance
    pub current: Option<AcceptedDetection>,
    /// Per-ingredient resolution states, sorted by ingredient name
    pub resolutions: Vec<IngredientResolution>,
}

/// Shared state for one detection session
///
/// Uses RwLock for concurrent read access with rare writes. The cycle
/// counter is atomic so resolver completions can be validated without
/// taking a lock on the hot path.
pub struct SessionState {
    /// Active session id, set on start and cleared on stop
    session_id: RwLock<Option<Uuid>>,

    /// Last accepted detection ("currentLabel" plus its metadata)
    current: RwLock<Option<AcceptedDetection>>,

    /// When the last resolution fan-out was dispatched
    last_resolution_at: RwLock<Option<Instant>>,

    /// Per-ingredient resolution states for the current round
    resolutions: RwLock<HashMap<String, IngredientResolution>>,

    /// Detection cycle generation counter
    ///
    /// Bumped on every accepted detection and on reset. Fan-out tasks carry
    /// the value they were dispatched under; a mismatch on completion means
    /// the result is stale and must be discarded.
    cycle: AtomicU64,
}

impl SessionState {
    /// Create new session state with default values
    pub fn new() -> Self {
        Self {
            session_id: RwLock::new(None),
            current: RwLock::new(None),
            last_resolution_at: RwLock::new(None),
            resolutions: RwLock::new(HashMap::new()),
            cycle: AtomicU64::new(0),
        }
    }

    /// Mark the session started, returning its fresh id
    pub async fn begin_session(&self) -> Uuid {
        let id = Uuid::new_v4();
        *self.session_id.write().await = Some(id);
        id
    }

    /// Mark the session stopped, returning the id it ran under
    pub async fn end_session(&self) -> Option<Uuid> {
        self.session_id.write().await.take()
    }

    /// Get the active session id
    pub async fn get_session_id(&self) -> Option<Uuid> {
        *self.session_id.read().await
    }

    /// Get the current accepted detection
    pub async fn get_current(&self) -> Option<AcceptedDetection> {
        self.current.read().await.clone()
    }

    /// Current detection cycle number
    pub fn current_cycle(&self) -> u64 {
        self.cycle.load(Ordering::Relaxed)
    }

    /// Record an accepted detection and open its cycle
    ///
    /// Returns the new cycle number. Does not touch `resolutions`: the
    /// previous round stays visible until a new fan-out replaces it.
    pub async fn begin_cycle(&self, detection: AcceptedDetection) -> u64 {
        let cycle = self.cycle.fetch_add(1, Ordering::Relaxed) + 1;
        *self.current.write().await = Some(detection);
        cycle
    }

    /// Check the resolution rate-limit gate, stamping it when it opens
    ///
    /// The gate is open when no fan-out has happened yet or when more than
    /// `window` has elapsed since the last one. The stamp is only advanced
    /// when the gate opens, so a run of skipped cycles does not push the
    /// next allowed fan-out further into the future.
    pub async fn try_open_resolution_gate(&self, window: Duration) -> bool {
        let mut last = self.last_resolution_at.write().await;
        let open = match *last {
            None => true,
            Some(at) => at.elapsed() > window,
        };
        if open {
            *last = Some(Instant::now());
        }
        open
    }

    /// Replace the resolution store with fresh Loading entries
    pub async fn start_resolution(&self, ingredients: &[String]) {
        let mut map = HashMap::with_capacity(ingredients.len());
        for name in ingredients {
            map.insert(
                name.clone(),
                IngredientResolution {
                    ingredient: name.clone(),
                    status: ResolutionStatus::Loading,
                },
            );
        }
        *self.resolutions.write().await = map;
    }

    /// Apply one ingredient's terminal resolution state
    ///
    /// `cycle` is the generation the fan-out was dispatched under. Returns
    /// false without writing anything when that cycle is no longer current;
    /// the caller decides how to report the discard.
    pub async fn apply_resolution(&self, cycle: u64, resolution: IngredientResolution) -> bool {
        // The cycle check happens under the map lock so it is ordered
        // against start_resolution() and reset().
        let mut map = self.resolutions.write().await;
        if cycle != self.current_cycle() {
            return false;
        }
        map.insert(resolution.ingredient.clone(), resolution);
        true
    }

    /// Get one ingredient's resolution state
    pub async fn get_resolution(&self, ingredient: &str) -> Option<IngredientResolution> {
        self.resolutions.read().await.get(ingredient).cloned()
    }

    /// Clear all per-session state
    ///
    /// Also bumps the cycle counter so results still in flight from the
    /// cleared session can never land in the next one.
    pub async fn reset(&self) {
        let mut map = self.resolutions.write().await;
        map.clear();
        self.cycle.fetch_add(1, Ordering::Relaxed);
        drop(map);
        *self.current.write().await = None;
        *self.last_resolution_at.write().await = None;
    }

    /// Snapshot the session for the API
    pub async fn snapshot(&self) -> SessionSnapshot {
        let mut resolutions: Vec<IngredientResolution> =
            self.resolutions.read().await.values().cloned().collect();
        resolutions.sort_by(|a, b| a.ingredient.cmp(&b.ingredient));
        SessionSnapshot {
            session_id: self.get_session_id().await,
            cycle: self.current_cycle(),
            current: self.get_current().await,
            resolutions,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
