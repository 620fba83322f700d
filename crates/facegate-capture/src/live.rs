//! Periodic capture → recognize → overlay loop.
//!
//! Each tick grabs one frame and dispatches a recognize call on its own
//! task. A successful response redraws the overlay; a failed one is logged
//! and the previous overlay stays on screen.

use crate::camera::FrameSource;
use crate::client::{ClientError, EdgeClient};
use crate::overlay::{render, Overlay};
use facegate_core::RecognitionResult;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Something that can run recognition on an encoded frame.
pub trait RecognizeEndpoint: Send + Sync + 'static {
    type Error: Display + Send + 'static;

    /// `image` is a data URL.
    fn recognize_frame(
        &self,
        image: String,
    ) -> impl Future<Output = Result<RecognitionResult, Self::Error>> + Send;
}

impl RecognizeEndpoint for EdgeClient {
    type Error = ClientError;

    fn recognize_frame(
        &self,
        image: String,
    ) -> impl Future<Output = Result<RecognitionResult, ClientError>> + Send {
        async move { self.recognize(&image).await }
    }
}

/// What to do when a tick fires while a previous call is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Skip the tick; at most one call is in flight.
    #[default]
    Skip,
    /// Dispatch anyway. Responses that arrive after a fresher one has been
    /// drawn are discarded.
    Allow,
}

#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub interval: Duration,
    pub overlap: OverlapPolicy,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            overlap: OverlapPolicy::Skip,
        }
    }
}

/// Counters reported when the loop stops.
///
/// `rendered`, `failed` and `stale` are snapshots; calls still in flight at
/// shutdown finish afterwards and are not counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub dispatched: u64,
    pub skipped_in_flight: u64,
    pub no_frame: u64,
    pub capture_errors: u64,
    pub rendered: u64,
    pub failed: u64,
    pub stale: u64,
}

/// State shared between the loop and its dispatched calls.
#[derive(Default)]
struct Dispatch {
    in_flight: AtomicUsize,
    /// Tick number of the result currently on the overlay (0 = none).
    last_rendered: AtomicU64,
    rendered: AtomicU64,
    failed: AtomicU64,
    stale: AtomicU64,
}

/// Counts one call as in flight until dropped, including on panic.
struct InFlight(Arc<Dispatch>);

impl InFlight {
    fn enter(dispatch: Arc<Dispatch>) -> Self {
        dispatch.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(dispatch)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Dispatch {
    fn complete<O: Overlay>(&self, tick: u64, results: &RecognitionResult, overlay: &Mutex<O>) {
        let mut overlay = overlay.lock().unwrap_or_else(PoisonError::into_inner);
        if self.last_rendered.load(Ordering::SeqCst) >= tick {
            tracing::debug!(tick, "discarding result older than the one on screen");
            self.stale.fetch_add(1, Ordering::SeqCst);
            return;
        }
        render(&mut *overlay, results);
        self.last_rendered.store(tick, Ordering::SeqCst);
        self.rendered.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(tick, faces = results.len(), "overlay redrawn");
    }
}

pub struct LiveLoop {
    config: LiveConfig,
}

impl LiveLoop {
    pub fn new(config: LiveConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` changes or its sender is dropped.
    ///
    /// Stopping the loop prevents further ticks but does not abort a call
    /// that is already in flight.
    pub async fn run<S, E, O>(
        &self,
        mut source: S,
        endpoint: Arc<E>,
        overlay: Arc<Mutex<O>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> LoopStats
    where
        S: FrameSource + Send,
        E: RecognizeEndpoint,
        O: Overlay + Send + 'static,
    {
        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let dispatch = Arc::new(Dispatch::default());
        let mut stats = LoopStats::default();

        tracing::info!(
            interval_ms = period.as_millis() as u64,
            overlap = ?self.config.overlap,
            "live loop started"
        );

        let cancelled = *shutdown.borrow();
        if !cancelled {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                }
                stats.ticks += 1;
                let tick = stats.ticks;

                if self.config.overlap == OverlapPolicy::Skip
                    && dispatch.in_flight.load(Ordering::SeqCst) > 0
                {
                    tracing::debug!(tick, "previous call still in flight; skipping tick");
                    stats.skipped_in_flight += 1;
                    continue;
                }

                let frame = match source.capture() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        stats.no_frame += 1;
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(tick, error = %e, "frame capture failed");
                        stats.capture_errors += 1;
                        continue;
                    }
                };

                let image = frame.to_data_url();
                let endpoint = endpoint.clone();
                let overlay = overlay.clone();
                let guard = InFlight::enter(dispatch.clone());
                stats.dispatched += 1;

                tokio::spawn(async move {
                    let dispatch = &guard.0;
                    match endpoint.recognize_frame(image).await {
                        Ok(results) => dispatch.complete(tick, &results, &overlay),
                        Err(e) => {
                            tracing::warn!(tick, error = %e, "recognition failed; keeping previous overlay");
                            dispatch.failed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        }

        stats.rendered = dispatch.rendered.load(Ordering::SeqCst);
        stats.failed = dispatch.failed.load(Ordering::SeqCst);
        stats.stale = dispatch.stale.load(Ordering::SeqCst);
        tracing::info!(?stats, "live loop stopped");
        stats
    }
}
