//! Shared test fixtures
//!
//! Scripted collaborators standing in for the camera, the classifier, and
//! the product matcher, plus a harness that wires them into an engine.

#![allow(dead_code)]

use async_trait::async_trait;
use platemate::config::Config;
use platemate::detect::{
    Classifier, DetectionCandidate, DetectionEngine, Frame, FrameSource,
};
use platemate::error::{Error, Result};
use platemate::events::{DetectionEvent, EventBus};
use platemate::kb::FoodKb;
use platemate::resolver::{ProductMatch, ProductResolver, RawProductMatch, ResolverError};
use platemate::state::SessionState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

/// Camera stand-in with scriptable failures
pub struct FakeFrameSource {
    started: AtomicBool,
    fail_start: AtomicBool,
    fail_next_frame: AtomicBool,
    stop_calls: AtomicU64,
    frames: AtomicU64,
}

impl FakeFrameSource {
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
            fail_next_frame: AtomicBool::new(false),
            stop_calls: AtomicU64::new(0),
            frames: AtomicU64::new(0),
        }
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_next_frame(&self, fail: bool) {
        self.fail_next_frame.store(fail, Ordering::SeqCst);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// How many times stop() has been called
    pub fn stop_count(&self) -> u64 {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for FakeFrameSource {
    async fn start(&self) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Error::Capture("scripted acquisition failure".to_string()));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn next_frame(&self) -> Result<Frame> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(Error::Capture("source not started".to_string()));
        }
        if self.fail_next_frame.load(Ordering::SeqCst) {
            return Err(Error::Capture("scripted frame failure".to_string()));
        }
        let sequence = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Frame {
            data: vec![0xFF, 0xD8, 0xFF],
            captured_at: chrono::Utc::now(),
            sequence,
        })
    }

    async fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Classifier stand-in returning a programmable candidate set
pub struct FakeClassifier {
    response: Mutex<Vec<DetectionCandidate>>,
    fail: AtomicBool,
}

impl FakeClassifier {
    pub fn new() -> Self {
        Self {
            response: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Candidates every subsequent classify() call will return
    pub fn set_response(&self, candidates: Vec<(&str, f64)>) {
        let candidates = candidates
            .into_iter()
            .map(|(label, probability)| DetectionCandidate {
                label: label.to_string(),
                probability,
            })
            .collect();
        *self.response.lock().unwrap() = candidates;
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, _frame: &Frame) -> Result<Vec<DetectionCandidate>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Classification("scripted classify failure".to_string()));
        }
        Ok(self.response.lock().unwrap().clone())
    }
}

/// Per-ingredient behavior of the fake matcher
#[derive(Clone)]
pub enum ScriptedResolution {
    Succeed(Vec<ProductMatch>),
    SucceedEmpty,
    Fail(String),
    /// Block until release_held() fires, then succeed
    HoldThenSucceed(Vec<ProductMatch>),
}

/// Product matcher stand-in with per-ingredient scripts
pub struct FakeResolver {
    script: Mutex<HashMap<String, ScriptedResolution>>,
    calls: Mutex<Vec<String>>,
    release: Notify,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            release: Notify::new(),
        }
    }

    pub fn script(&self, ingredient: &str, behavior: ScriptedResolution) {
        self.script
            .lock()
            .unwrap()
            .insert(ingredient.to_string(), behavior);
    }

    /// Unblock every currently held resolution
    pub fn release_held(&self) {
        self.release.notify_waiters();
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, ingredient: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == ingredient)
            .count()
    }

    /// Wait until the matcher has been called for `ingredient`
    pub async fn wait_for_call(&self, ingredient: &str) {
        for _ in 0..500 {
            if self.calls_for(ingredient) > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("matcher never called for '{}'", ingredient);
    }
}

#[async_trait]
impl ProductResolver for FakeResolver {
    async fn resolve(&self, ingredient: &str) -> std::result::Result<Vec<ProductMatch>, ResolverError> {
        let behavior = self
            .script
            .lock()
            .unwrap()
            .get(ingredient)
            .cloned()
            .unwrap_or(ScriptedResolution::SucceedEmpty);
        self.calls.lock().unwrap().push(ingredient.to_string());

        match behavior {
            ScriptedResolution::Succeed(matches) => Ok(matches),
            ScriptedResolution::SucceedEmpty => Ok(Vec::new()),
            ScriptedResolution::Fail(message) => Err(ResolverError::NetworkError(message)),
            ScriptedResolution::HoldThenSucceed(matches) => {
                self.release.notified().await;
                Ok(matches)
            }
        }
    }
}

/// One product match built through the real normalization path
pub fn product(name: &str, raw_sales: f64) -> ProductMatch {
    ProductMatch::from_raw(RawProductMatch {
        product: name.to_string(),
        product_id: format!("P-{}", name.len()),
        sales: raw_sales,
        zero_waste: false,
        popularity: 1,
        suggested_addons: Vec::new(),
    })
}

/// Engine wired to scripted collaborators
pub struct Harness {
    pub engine: Arc<DetectionEngine>,
    pub state: Arc<SessionState>,
    pub bus: EventBus,
    pub kb: Arc<FoodKb>,
    pub source: Arc<FakeFrameSource>,
    pub classifier: Arc<FakeClassifier>,
    pub resolver: Arc<FakeResolver>,
}

/// Test config: a quiet loop so tests can step cycles by hand
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.detection.poll_interval_ms = 60_000;
    config
}

pub fn harness_with(config: Config) -> Harness {
    let state = Arc::new(SessionState::new());
    let bus = EventBus::new(64);
    let kb = Arc::new(FoodKb::builtin().unwrap());
    let source = Arc::new(FakeFrameSource::new());
    let classifier = Arc::new(FakeClassifier::new());
    let resolver = Arc::new(FakeResolver::new());

    let engine = Arc::new(DetectionEngine::new(
        &config,
        Arc::clone(&state),
        bus.clone(),
        Arc::clone(&kb),
        Arc::clone(&source) as Arc<dyn FrameSource>,
        Arc::clone(&classifier) as Arc<dyn Classifier>,
        Arc::clone(&resolver) as Arc<dyn ProductResolver>,
    ));

    Harness {
        engine,
        state,
        bus,
        kb,
        source,
        classifier,
        resolver,
    }
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

/// Wait until every tracked resolution has left Loading
pub async fn wait_resolutions_settled(state: &SessionState) {
    for _ in 0..500 {
        let snapshot = state.snapshot().await;
        if !snapshot.resolutions.is_empty()
            && snapshot.resolutions.iter().all(|r| !r.status.is_loading())
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("resolutions did not settle within 1s");
}

/// Pull everything already sitting in the event channel
pub fn drain_events(rx: &mut broadcast::Receiver<DetectionEvent>) -> Vec<DetectionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Wait for the next event matching the predicate, skipping others
pub async fn next_matching<F>(
    rx: &mut broadcast::Receiver<DetectionEvent>,
    mut predicate: F,
) -> DetectionEvent
where
    F: FnMut(&DetectionEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("matching event not observed within 2s")
}
