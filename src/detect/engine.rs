//! Detection loop driver
//!
//! Top-level coordinator for the detection-to-resolution pipeline: pulls
//! frames, classifies them, feeds the stability filter, and on an accepted
//! label change looks up the recipe and fans out product resolution.
//!
//! The loop itself is strictly sequential (frame, classify, filter, maybe
//! resolve, next tick); resolver calls are the only concurrency. Each
//! fan-out task carries the cycle number it was dispatched under and its
//! result is discarded when that cycle is no longer current.

use crate::config::Config;
use crate::error::Result;
use crate::events::{DetectionEvent, EventBus};
use crate::kb::FoodKb;
use crate::resolver::ProductResolver;
use crate::state::{IngredientResolution, ResolutionStatus, SessionState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::capture::FrameSource;
use super::classifier::Classifier;
use super::filter;
use super::AcceptedDetection;

/// Detection engine - orchestrates the capture/classify/resolve pipeline
pub struct DetectionEngine {
    /// Shared session state
    state: Arc<SessionState>,

    /// Event broadcaster
    event_bus: EventBus,

    /// Recipe catalog
    kb: Arc<FoodKb>,

    /// Camera collaborator
    source: Arc<dyn FrameSource>,

    /// Classifier collaborator
    classifier: Arc<dyn Classifier>,

    /// Product matcher collaborator
    resolver: Arc<dyn ProductResolver>,

    /// Detection loop running flag
    running: Arc<RwLock<bool>>,

    /// Acceptance threshold (inclusive)
    threshold: f64,

    /// Delay between classification cycles
    poll_interval: Duration,

    /// Minimum interval between resolution fan-outs
    rate_limit_window: Duration,

    /// Lowercased labels the filter drops before selection
    ignored_labels: Vec<String>,
}

impl DetectionEngine {
    /// Create new detection engine
    pub fn new(
        config: &Config,
        state: Arc<SessionState>,
        event_bus: EventBus,
        kb: Arc<FoodKb>,
        source: Arc<dyn FrameSource>,
        classifier: Arc<dyn Classifier>,
        resolver: Arc<dyn ProductResolver>,
    ) -> Self {
        let ignored_labels = config
            .detection
            .ignored_labels
            .iter()
            .map(|l| l.to_lowercase())
            .collect();

        Self {
            state,
            event_bus,
            kb,
            source,
            classifier,
            resolver,
            running: Arc::new(RwLock::new(false)),
            threshold: config.detection.threshold,
            poll_interval: config.poll_interval(),
            rate_limit_window: config.rate_limit_window(),
            ignored_labels,
        }
    }

    /// Start a detection session
    ///
    /// Acquires the camera, resets session state, and spawns the detection
    /// loop. A camera failure is returned to the caller and leaves the
    /// source released; the session does not auto-retry. Starting an
    /// already-running engine is a no-op.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if *running {
            warn!("Detection engine already running, ignoring start");
            return Ok(());
        }

        info!("Starting detection engine");

        if let Err(e) = self.source.start().await {
            // Release whatever the failed acquisition left behind
            self.source.stop().await;
            return Err(e);
        }

        self.state.reset().await;
        let session_id = self.state.begin_session().await;
        *running = true;
        drop(running);

        let self_clone = self.clone_handles();
        tokio::spawn(async move {
            self_clone.detection_loop().await;
        });

        self.event_bus.emit_lossy(DetectionEvent::SessionStarted {
            session_id,
            timestamp: chrono::Utc::now(),
        });

        info!(session_id = %session_id, "Detection engine started");
        Ok(())
    }

    /// Stop the detection session
    ///
    /// Always releases the camera and clears session state, whether or not
    /// a session is running; safe to call repeatedly and after a failed
    /// `start()`. Outstanding resolver calls are not aborted, but the state
    /// reset makes their cycles stale so their results are discarded.
    pub async fn stop(&self) {
        let was_running = {
            let mut running = self.running.write().await;
            std::mem::replace(&mut *running, false)
        };

        self.source.stop().await;

        let session_id = self.state.end_session().await;
        self.state.reset().await;

        if let Some(session_id) = session_id {
            self.event_bus.emit_lossy(DetectionEvent::SessionStopped {
                session_id,
                timestamp: chrono::Utc::now(),
            });
        }

        if was_running {
            info!("Detection engine stopped");
        } else {
            debug!("Stop on idle detection engine");
        }
    }

    /// Whether a detection session is running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Main detection loop
    async fn detection_loop(&self) {
        let mut tick = interval(self.poll_interval);
        // A slow classifier should delay cycles, not queue them up
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick.tick().await;

            // Check if we should continue running
            if !*self.running.read().await {
                debug!("Detection loop stopping");
                break;
            }

            // A failed cycle is logged and skipped; only stop() ends the loop
            if let Err(e) = self.run_cycle().await {
                if *self.running.read().await {
                    warn!("Detection cycle failed: {}", e);
                    self.event_bus.emit_lossy(DetectionEvent::CycleFailed {
                        detail: e.to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                }
            }
        }
    }

    /// Run one capture/classify/filter cycle
    ///
    /// One step of the detection loop, awaiting the classifier before
    /// returning so cycles never overlap. Does nothing once the engine is
    /// stopped.
    pub async fn run_cycle(&self) -> Result<()> {
        let frame = self.source.next_frame().await?;
        let candidates = self.classifier.classify(&frame).await?;

        // Holding the read guard serializes acceptance handling against
        // stop(): a cycle that gets past this check finishes its state
        // writes before stop() clears them.
        let running = self.running.read().await;
        if !*running {
            return Ok(());
        }

        let current = self.state.get_current().await;
        let accepted = filter::accept(
            &candidates,
            current.as_ref(),
            self.threshold,
            &self.ignored_labels,
        );

        if let Some(detection) = accepted {
            self.handle_accepted(detection).await;
        }

        Ok(())
    }

    /// React to an accepted label change
    async fn handle_accepted(&self, detection: AcceptedDetection) {
        let cycle = self.state.begin_cycle(detection.clone()).await;
        info!(
            label = %detection.label,
            probability = detection.probability,
            cycle,
            "Accepted new detection"
        );
        self.event_bus.emit_lossy(DetectionEvent::DetectionAccepted {
            label: detection.label.clone(),
            probability: detection.probability,
            cycle,
            timestamp: chrono::Utc::now(),
        });

        let recipe = match self.kb.lookup(&detection.label) {
            Some(recipe) => recipe,
            None => {
                info!(label = %detection.label, "No recipe for label");
                self.event_bus.emit_lossy(DetectionEvent::LookupMissed {
                    label: detection.label,
                    timestamp: chrono::Utc::now(),
                });
                return;
            }
        };

        if !self
            .state
            .try_open_resolution_gate(self.rate_limit_window)
            .await
        {
            // Previously displayed resolutions stay in place
            debug!(
                label = %detection.label,
                cycle,
                "Resolution gate closed, skipping fan-out"
            );
            self.event_bus.emit_lossy(DetectionEvent::ResolutionSkipped {
                label: detection.label,
                cycle,
                timestamp: chrono::Utc::now(),
            });
            return;
        }

        let ingredients: Vec<String> = recipe
            .ingredients
            .iter()
            .map(|i| i.name.clone())
            .collect();
        self.state.start_resolution(&ingredients).await;
        self.event_bus.emit_lossy(DetectionEvent::ResolutionStarted {
            label: detection.label,
            cycle,
            ingredients: ingredients.clone(),
            timestamp: chrono::Utc::now(),
        });

        // One independent call per ingredient, no concurrency cap and no
        // ordering guarantee among completions
        for ingredient in ingredients {
            let self_clone = self.clone_handles();
            tokio::spawn(async move {
                self_clone.resolve_ingredient(cycle, ingredient).await;
            });
        }
    }

    /// Resolve one ingredient and write its terminal state
    ///
    /// Runs detached from the loop. Failure lands in this ingredient's
    /// entry and nowhere else; a stale cycle means the result is dropped.
    async fn resolve_ingredient(&self, cycle: u64, ingredient: String) {
        let status = match self.resolver.resolve(&ingredient).await {
            Ok(matches) => ResolutionStatus::Loaded { matches },
            Err(e) => {
                warn!(ingredient = %ingredient, error = %e, "Ingredient resolution failed");
                ResolutionStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        let resolution = IngredientResolution {
            ingredient: ingredient.clone(),
            status,
        };

        if self.state.apply_resolution(cycle, resolution.clone()).await {
            self.event_bus.emit_lossy(DetectionEvent::IngredientResolved {
                cycle,
                resolution,
                timestamp: chrono::Utc::now(),
            });
        } else {
            let current_cycle = self.state.current_cycle();
            debug!(
                ingredient = %ingredient,
                cycle,
                current_cycle,
                "Discarding stale resolution result"
            );
            self.event_bus
                .emit_lossy(DetectionEvent::StaleResolutionDiscarded {
                    cycle,
                    current_cycle,
                    ingredient,
                    timestamp: chrono::Utc::now(),
                });
        }
    }

    /// Clone the engine's shared handles for a spawned task
    fn clone_handles(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            event_bus: self.event_bus.clone(),
            kb: Arc::clone(&self.kb),
            source: Arc::clone(&self.source),
            classifier: Arc::clone(&self.classifier),
            resolver: Arc::clone(&self.resolver),
            running: Arc::clone(&self.running),
            threshold: self.threshold,
            poll_interval: self.poll_interval,
            rate_limit_window: self.rate_limit_window,
            ignored_labels: self.ignored_labels.clone(),
        }
    }
}
