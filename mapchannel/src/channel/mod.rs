//! Map channel: owns the window and pipeline set, runs processing passes and
//! reports results to a receiver.
//!
//! # Passes and generations
//!
//! Every mutation ([`MapChannel::set_map_window`],
//! [`MapChannel::set_pipelines`], [`MapChannel::reprocess`], a settings
//! change) bumps the channel's generation, cancels the pass in flight and
//! schedules a new one on the runtime. A pass delivers only if its generation
//! is still current at delivery time. Bumping and delivering both happen under
//! the same delivery lock, so once a setter returns no older pass can reach
//! the receiver.
//!
//! # Work placement
//!
//! Source fetches for all pipelines run concurrently, each attempt on the
//! blocking pool. Retryable failures are retried per the channel's
//! [`RetryPolicy`](crate::pipeline::RetryPolicy) with a backoff that wakes
//! early on cancellation. Stages and the composite then run in one blocking
//! task.

mod config;
mod pass;
mod receiver;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::join_all;
use parking_lot::{Mutex, ReentrantMutex};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use config::ChannelConfig;
pub use pass::{PassHandle, PassOutcome};
pub use receiver::{MapChannelReceiver, MapResult, MapUpdate};

use crate::geo::GeoRequest;
use crate::pipeline::{Pipeline, PipelineError};
use crate::raster::{ChangedArea, MapData};
use crate::settings::{ChangeListener, Subscription};
use crate::source::MapSource;
use crate::stage::StageOutput;

/// Mutable channel state, swapped as a whole by the setters.
struct ChannelState {
    window: Option<GeoRequest>,
    pipelines: Arc<[Pipeline]>,
    subscriptions: Vec<Subscription>,
    cancel: CancellationToken,
    shut_down: bool,
}

/// Forwards settings changes to the channel as reprocess requests.
struct ChannelListener {
    channel: Weak<MapChannel>,
}

impl ChangeListener for ChannelListener {
    fn settings_changed(&self) {
        if let Some(channel) = self.channel.upgrade() {
            debug!("Stage settings changed, reprocessing");
            channel.reprocess();
        }
    }
}

/// Marks a pass settled when its task ends, including by panic or abort.
struct SettleOnDrop {
    channel: Arc<MapChannel>,
    generation: u64,
}

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        self.channel.settle(self.generation);
    }
}

/// Drives a set of pipelines over a moving map window.
pub struct MapChannel {
    runtime: Handle,
    config: ChannelConfig,
    receiver: Arc<dyn MapChannelReceiver>,
    state: Mutex<ChannelState>,
    generation: AtomicU64,
    delivery: ReentrantMutex<()>,
    settled: watch::Sender<u64>,
    listener: Arc<ChannelListener>,
    self_ref: Weak<MapChannel>,
}

impl MapChannel {
    /// Create an idle channel that runs its passes on `runtime`.
    pub fn new(
        runtime: Handle,
        config: ChannelConfig,
        receiver: Arc<dyn MapChannelReceiver>,
    ) -> Arc<Self> {
        let (settled, _) = watch::channel(0);
        Arc::new_cyclic(|weak| Self {
            runtime,
            config,
            receiver,
            state: Mutex::new(ChannelState {
                window: None,
                pipelines: Arc::from(Vec::new()),
                subscriptions: Vec::new(),
                cancel: CancellationToken::new(),
                shut_down: false,
            }),
            generation: AtomicU64::new(0),
            delivery: ReentrantMutex::new(()),
            settled,
            listener: Arc::new(ChannelListener {
                channel: weak.clone(),
            }),
            self_ref: weak.clone(),
        })
    }

    /// Current generation. Increases with every scheduled pass.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Current map window, if set.
    pub fn window(&self) -> Option<GeoRequest> {
        self.state.lock().window
    }

    /// Active pipelines.
    pub fn pipelines(&self) -> Arc<[Pipeline]> {
        Arc::clone(&self.state.lock().pipelines)
    }

    /// Channel configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Move the window and reprocess.
    pub fn set_map_window(&self, request: GeoRequest) -> PassHandle {
        debug!(request = %request, "Map window changed");
        self.schedule(|state| state.window = Some(request))
    }

    /// Replace the active pipeline set and reprocess.
    ///
    /// All pipelines must feed the same composite, there may be no more of
    /// them than the composite has inputs (exactly one for a composite with
    /// no inputs), and each pipeline's output must be accepted by the
    /// composite input at its position. An empty set idles the channel.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidPipeline`] or a format error; the previous
    /// pipeline set stays active.
    pub fn set_pipelines(&self, pipelines: Vec<Pipeline>) -> Result<PassHandle, PipelineError> {
        validate_pipelines(&pipelines)?;

        let listener = Arc::downgrade(&self.listener) as Weak<dyn ChangeListener>;
        let subscriptions: Vec<Subscription> = pipelines
            .iter()
            .flat_map(|p| p.stages().iter())
            .filter_map(|stage| stage.subscribe(listener.clone()))
            .collect();

        let mut replaced = Vec::new();
        let handle = self.schedule(|state| {
            let previous = state.pipelines.first().map(|p| Arc::clone(p.composite()));
            if let (Some(prev), Some(next)) = (previous, pipelines.first()) {
                if !std::ptr::eq(
                    Arc::as_ptr(&prev) as *const (),
                    Arc::as_ptr(next.composite()) as *const (),
                ) {
                    next.composite().reset();
                }
            }
            state.pipelines = Arc::from(pipelines);
            replaced = std::mem::replace(&mut state.subscriptions, subscriptions);
        });
        drop(replaced);
        Ok(handle)
    }

    /// Run a new pass with unchanged parameters.
    pub fn reprocess(&self) -> PassHandle {
        self.schedule(|_| {})
    }

    /// Wait until every pass scheduled so far has settled.
    pub async fn flush(&self) {
        let target = self.generation();
        let mut settled = self.settled.subscribe();
        // The sender lives as long as self, so this cannot fail
        let _ = settled.wait_for(|g| *g >= target).await;
    }

    /// Cancel in-flight work and stop scheduling passes.
    ///
    /// Later setter calls return idle handles.
    pub fn shutdown(&self) {
        let mut replaced = Vec::new();
        let _ = self.schedule(|state| {
            state.shut_down = true;
            replaced = std::mem::take(&mut state.subscriptions);
        });
        drop(replaced);
        info!("Map channel shut down");
    }

    /// True after [`MapChannel::shutdown`].
    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }

    /// Apply `update` and start a new pass, superseding the current one.
    fn schedule<F: FnOnce(&mut ChannelState)>(&self, update: F) -> PassHandle {
        let _delivery = self.delivery.lock();
        let mut state = self.state.lock();
        update(&mut state);

        state.cancel.cancel();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let request = match state.window {
            Some(request) if !state.shut_down && !state.pipelines.is_empty() => request,
            _ => {
                drop(state);
                self.settle(generation);
                return PassHandle::idle(generation);
            }
        };
        let Some(channel) = self.self_ref.upgrade() else {
            drop(state);
            self.settle(generation);
            return PassHandle::idle(generation);
        };

        let cancel = CancellationToken::new();
        state.cancel = cancel.clone();
        let pipelines = Arc::clone(&state.pipelines);
        drop(state);

        let task = self.runtime.spawn(async move {
            let _settle = SettleOnDrop {
                channel: Arc::clone(&channel),
                generation,
            };
            channel
                .run_pass(generation, request, pipelines, cancel)
                .await
        });
        PassHandle::spawned(generation, task)
    }

    fn settle(&self, generation: u64) {
        self.settled.send_if_modified(|settled| {
            if generation > *settled {
                *settled = generation;
                true
            } else {
                false
            }
        });
    }

    #[instrument(skip(self, request, pipelines, cancel), fields(request = %request))]
    async fn run_pass(
        &self,
        generation: u64,
        request: GeoRequest,
        pipelines: Arc<[Pipeline]>,
        cancel: CancellationToken,
    ) -> PassOutcome {
        let result = self.render(request, pipelines, &cancel).await;

        match result {
            Ok(output) => {
                let update = MapUpdate::Ready(MapResult {
                    data: output.data,
                    changed: output.changed,
                    generation,
                });
                if self.deliver(generation, update) {
                    info!(generation, "Pass delivered");
                    PassOutcome::Delivered
                } else {
                    PassOutcome::Superseded
                }
            }
            Err(PipelineError::Cancelled) => {
                debug!(generation, "Pass cancelled");
                PassOutcome::Superseded
            }
            Err(error) => {
                warn!(generation, error = %error, "Pass failed");
                let update = MapUpdate::Failed {
                    request,
                    error: error.clone(),
                    generation,
                };
                if self.deliver(generation, update) {
                    PassOutcome::Failed(error)
                } else {
                    PassOutcome::Superseded
                }
            }
        }
    }

    /// Hand `update` to the receiver if `generation` is still current.
    fn deliver(&self, generation: u64, update: MapUpdate) -> bool {
        let _delivery = self.delivery.lock();
        let current = self.generation.load(Ordering::SeqCst);
        if current != generation {
            debug!(generation, current, "Dropping superseded pass");
            return false;
        }
        self.receiver.map_changed(update);
        true
    }

    async fn render(
        &self,
        request: GeoRequest,
        pipelines: Arc<[Pipeline]>,
        cancel: &CancellationToken,
    ) -> Result<StageOutput, PipelineError> {
        let fetches = pipelines
            .iter()
            .map(|p| self.fetch_with_retry(Arc::clone(p.source()), request, cancel));
        let tiles = join_all(fetches)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || composite_pass(&pipelines, tiles, &request, &cancel))
            .await
            .map_err(|e| PipelineError::TaskFailed(e.to_string()))?
    }

    async fn fetch_with_retry(
        &self,
        source: Arc<dyn MapSource>,
        request: GeoRequest,
        cancel: &CancellationToken,
    ) -> Result<MapData, PipelineError> {
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            attempt += 1;

            let src = Arc::clone(&source);
            let result = tokio::task::spawn_blocking(move || src.fetch_tile(&request))
                .await
                .map_err(|e| PipelineError::TaskFailed(e.to_string()))?;

            let error = match result {
                Ok(data) => return Ok(data),
                Err(error) if error.is_retryable() => error,
                Err(error) => return Err(error),
            };

            let Some(delay) = self.config.retry.delay_for_attempt(attempt) else {
                return Err(if attempt > 1 {
                    PipelineError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(error),
                    }
                } else {
                    error
                });
            };

            warn!(
                source = source.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Source unavailable, retrying"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl std::fmt::Debug for MapChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MapChannel")
            .field("generation", &self.generation())
            .field("window", &state.window)
            .field("pipelines", &state.pipelines.len())
            .field("shut_down", &state.shut_down)
            .finish()
    }
}

/// Check a pipeline set against its shared composite.
fn validate_pipelines(pipelines: &[Pipeline]) -> Result<(), PipelineError> {
    let Some(first) = pipelines.first() else {
        return Ok(());
    };
    if let Some(other) = pipelines.iter().find(|p| !p.shares_composite_with(first)) {
        return Err(PipelineError::InvalidPipeline(format!(
            "pipeline '{}' feeds a different composite than '{}'",
            other.name(),
            first.name()
        )));
    }

    let composite = first.composite();
    let capacity = composite.input_count().max(1);
    if pipelines.len() > capacity {
        return Err(PipelineError::InvalidPipeline(format!(
            "{} accepts {} pipeline(s), got {}",
            composite.name(),
            capacity,
            pipelines.len()
        )));
    }

    for (index, pipeline) in pipelines.iter().enumerate() {
        pipeline.validate_composite_input(index)?;
    }
    Ok(())
}

/// Run fetched tiles through their stages and fold them into the composite.
///
/// Every fetched tile starts with its whole extent marked changed. The
/// result is the output of the last composite call, with the union of all
/// changed areas clipped to the request.
fn composite_pass(
    pipelines: &[Pipeline],
    tiles: Vec<MapData>,
    request: &GeoRequest,
    cancel: &CancellationToken,
) -> Result<StageOutput, PipelineError> {
    let mut changed = ChangedArea::empty();
    let mut last = None;

    for (index, (pipeline, tile)) in pipelines.iter().zip(tiles).enumerate() {
        let fetched = ChangedArea::full(tile.request());
        let staged = pipeline.run_stages(tile, fetched, cancel)?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let composite = pipeline.composite();
        let output = if composite.input_count() == 0 {
            staged
        } else {
            composite.process(index, &staged.data, staged.changed)?
        };

        changed = changed.union(&output.changed);
        last = Some(output.data);
    }

    let data = last.ok_or_else(|| PipelineError::InvalidPipeline("no pipelines".to_string()))?;
    Ok(StageOutput::new(data, changed.clip_to(&request.extent())))
}
