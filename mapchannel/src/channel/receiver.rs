//! The channel's consumer-side contract.

use crate::geo::GeoRequest;
use crate::pipeline::PipelineError;
use crate::raster::{ChangedArea, MapData};

/// A composited image ready to draw.
#[derive(Debug, Clone)]
pub struct MapResult {
    /// The composited raster and the request it was rendered for.
    pub data: MapData,
    /// World area of `data` that differs from the previous result.
    pub changed: ChangedArea,
    /// Pass generation that produced this result.
    pub generation: u64,
}

/// What a channel reports at the end of a pass.
#[derive(Debug, Clone)]
pub enum MapUpdate {
    /// The pass succeeded.
    Ready(MapResult),
    /// The pass failed permanently, or ran out of retries.
    Failed {
        request: GeoRequest,
        error: PipelineError,
        generation: u64,
    },
}

impl MapUpdate {
    /// Request the pass was run for.
    pub fn request(&self) -> &GeoRequest {
        match self {
            MapUpdate::Ready(result) => result.data.request(),
            MapUpdate::Failed { request, .. } => request,
        }
    }

    /// Generation of the pass.
    pub fn generation(&self) -> u64 {
        match self {
            MapUpdate::Ready(result) => result.generation,
            MapUpdate::Failed { generation, .. } => *generation,
        }
    }
}

/// Receives the results of a channel's passes.
///
/// Called from a runtime worker thread, at most once per pass and only for
/// the channel's current generation. Implementations may call back into the
/// channel (for example to change the window) from inside `map_changed`.
pub trait MapChannelReceiver: Send + Sync {
    fn map_changed(&self, update: MapUpdate);
}
