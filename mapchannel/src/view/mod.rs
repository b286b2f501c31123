//! Offscreen view: the drawing side of a channel.
//!
//! An [`OffscreenView`] keeps an RGBA buffer for its own window and paints
//! each delivered result into it through the world-to-image mapping of the
//! two requests. Only the changed area is repainted, and a failed pass
//! leaves the buffer exactly as it was.

use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::channel::{MapChannelReceiver, MapResult, MapUpdate};
use crate::geo::GeoRequest;
use crate::pipeline::PipelineError;

struct ViewState {
    request: GeoRequest,
    buffer: RgbaImage,
    redraws: u64,
    last_error: Option<PipelineError>,
    last_generation: Option<u64>,
}

/// RGBA canvas fed by a [`MapChannel`](crate::channel::MapChannel).
pub struct OffscreenView {
    state: Mutex<ViewState>,
}

impl OffscreenView {
    /// Create a transparent view for `request`.
    pub fn new(request: GeoRequest) -> Self {
        Self {
            state: Mutex::new(ViewState {
                request,
                buffer: RgbaImage::new(request.width_px(), request.height_px()),
                redraws: 0,
                last_error: None,
                last_generation: None,
            }),
        }
    }

    /// Move the view to a new window, clearing its content.
    pub fn set_request(&self, request: GeoRequest) {
        let mut state = self.state.lock();
        state.request = request;
        state.buffer = RgbaImage::new(request.width_px(), request.height_px());
    }

    /// The view's window.
    pub fn request(&self) -> GeoRequest {
        self.state.lock().request
    }

    /// Copy of the current canvas.
    pub fn snapshot(&self) -> RgbaImage {
        self.state.lock().buffer.clone()
    }

    /// Number of results painted so far.
    pub fn redraw_count(&self) -> u64 {
        self.state.lock().redraws
    }

    /// Most recent failure reported by the channel, cleared by the next
    /// successful result.
    pub fn last_error(&self) -> Option<PipelineError> {
        self.state.lock().last_error.clone()
    }

    /// Generation of the last update received.
    pub fn last_generation(&self) -> Option<u64> {
        self.state.lock().last_generation
    }

    fn paint(state: &mut ViewState, result: &MapResult) {
        let view = state.request;
        let source = result.data.request();
        if source.projection() != view.projection() {
            warn!(
                view = %view.projection(),
                result = %source.projection(),
                "Ignoring result rendered in a different projection"
            );
            return;
        }

        let src = result.data.image().to_rgba8();
        let (src_w, src_h) = (src.width() as f64, src.height() as f64);
        let rects = result.changed.clip_to(&view.extent()).pixel_rects(&view);

        for rect in &rects {
            for row in rect.y..rect.bottom() {
                for col in rect.x..rect.right() {
                    let (x, y) = view.pixel_center_world(col, row);
                    let (sx, sy) = source.world_to_pixel(x, y);
                    if sx < 0.0 || sy < 0.0 || sx >= src_w || sy >= src_h {
                        continue;
                    }
                    let over = *src.get_pixel(sx as u32, sy as u32);
                    let dst = state.buffer.get_pixel_mut(col, row);
                    *dst = source_over(over, *dst);
                }
            }
        }
        debug!(rects = rects.len(), "Painted map result");
    }
}

/// Porter-Duff source-over for 8-bit RGBA.
fn source_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src.0[3] as f32 / 255.0;
    if sa >= 1.0 {
        return src;
    }
    if sa <= 0.0 {
        return dst;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = (src.0[i] as f32 * sa + dst.0[i] as f32 * da * (1.0 - sa)) / out_a;
        out[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round() as u8;
    Rgba(out)
}

impl MapChannelReceiver for OffscreenView {
    fn map_changed(&self, update: MapUpdate) {
        let mut state = self.state.lock();
        state.last_generation = Some(update.generation());
        match update {
            MapUpdate::Ready(result) => {
                Self::paint(&mut state, &result);
                state.redraws += 1;
                state.last_error = None;
            }
            MapUpdate::Failed { error, request, .. } => {
                warn!(request = %request, error = %error, "Keeping previous map content");
                state.last_error = Some(error);
            }
        }
    }
}

impl std::fmt::Debug for OffscreenView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("OffscreenView")
            .field("request", &state.request)
            .field("redraws", &state.redraws)
            .finish()
    }
}
