//! Application bootstrap implementation.
//!
//! `MapApp` owns the resources that would otherwise be process-wide lazy
//! globals: the runtime handle passes run on and the shared tile cache.
//! They are created at start and torn down at shutdown.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::{Handle, Runtime};
use tracing::info;

use super::config::AppConfig;
use super::error::AppError;
use crate::channel::{MapChannel, MapChannelReceiver};
use crate::settings::BuildContext;
use crate::source::TileCache;

/// Map application with explicit resource lifecycle.
///
/// # Example
///
/// ```ignore
/// use mapchannel::app::{AppConfig, MapApp};
///
/// let app = MapApp::start_sync(AppConfig::default())?;
/// let channel = app.create_channel(view.clone());
/// channel.set_pipelines(session.build(&app.build_context())?)?;
///
/// // Later: graceful shutdown
/// app.shutdown();
/// ```
pub struct MapApp {
    config: AppConfig,
    handle: Handle,
    tile_cache: Option<TileCache>,
    channels: Mutex<Vec<Weak<MapChannel>>>,
    shut_down: AtomicBool,

    /// Owned runtime when created via `start_sync()`.
    runtime: Option<Runtime>,
}

impl MapApp {
    /// Start on the caller's runtime.
    pub async fn start(config: AppConfig) -> Result<Self, AppError> {
        Ok(Self::start_on(config, Handle::current(), None))
    }

    /// Start the application synchronously (creates its own runtime).
    ///
    /// Useful from non-async contexts such as CLI commands. The runtime is
    /// kept alive for the lifetime of the app.
    pub fn start_sync(config: AppConfig) -> Result<Self, AppError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("mapchannel-worker")
            .build()
            .map_err(|e| AppError::RuntimeCreation(e.to_string()))?;
        let handle = runtime.handle().clone();
        Ok(Self::start_on(config, handle, Some(runtime)))
    }

    fn start_on(config: AppConfig, handle: Handle, runtime: Option<Runtime>) -> Self {
        let tile_cache = (config.cache.max_tiles > 0)
            .then(|| TileCache::new(config.cache.max_tiles, config.cache.ttl));

        info!(
            cache_tiles = config.cache.max_tiles,
            retry_attempts = config.channel.retry.max_attempts(),
            owns_runtime = runtime.is_some(),
            "Map application started"
        );

        Self {
            config,
            handle,
            tile_cache,
            channels: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
            runtime,
        }
    }

    /// Create a channel delivering to `receiver`.
    pub fn create_channel(&self, receiver: Arc<dyn MapChannelReceiver>) -> Arc<MapChannel> {
        let channel = MapChannel::new(self.handle.clone(), self.config.channel.clone(), receiver);
        if self.is_shut_down() {
            channel.shutdown();
        }
        let mut channels = self.channels.lock();
        channels.retain(|c| c.strong_count() > 0);
        channels.push(Arc::downgrade(&channel));
        channel
    }

    /// Context for building sessions against this app's shared resources.
    pub fn build_context(&self) -> BuildContext {
        let ctx = BuildContext::default().with_http_timeout(self.config.http_timeout_secs);
        match &self.tile_cache {
            Some(cache) => ctx.with_cache(cache.clone()),
            None => ctx,
        }
    }

    /// The shared tile cache, if enabled.
    pub fn tile_cache(&self) -> Option<&TileCache> {
        self.tile_cache.as_ref()
    }

    /// Runtime handle passes run on.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run a future to completion from synchronous code.
    ///
    /// Must not be called from within an async context.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output, AppError> {
        if self.is_shut_down() {
            return Err(AppError::ShutDown);
        }
        Ok(self.handle.block_on(future))
    }

    /// True after [`MapApp::shutdown`].
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Shut down every channel and drop cached tiles.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let channels: Vec<Arc<MapChannel>> = self
            .channels
            .lock()
            .drain(..)
            .filter_map(|c| c.upgrade())
            .collect();
        for channel in &channels {
            channel.shutdown();
        }
        if let Some(cache) = &self.tile_cache {
            cache.invalidate_all();
        }
        info!(channels = channels.len(), "Map application shut down");
    }
}

impl Drop for MapApp {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
