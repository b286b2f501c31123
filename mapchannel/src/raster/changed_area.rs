//! Changed-area bookkeeping.
//!
//! A [`ChangedArea`] records which part of a pipeline's latest output
//! differs from the previous output. It starts empty for each pass, grows or
//! shrinks as data moves through the stages, and is consumed once by the
//! receiver so it can repaint incrementally.

use crate::geo::{GeoRect, GeoRequest, PixelRect};

/// Set of world rectangles that changed during a processing pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangedArea {
    rects: Vec<GeoRect>,
}

impl ChangedArea {
    /// Nothing changed.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The whole extent of `request` changed.
    pub fn full(request: &GeoRequest) -> Self {
        Self::from_rect(request.extent())
    }

    /// A single rectangle changed.
    pub fn from_rect(rect: GeoRect) -> Self {
        let mut area = Self::empty();
        area.add(rect);
        area
    }

    /// Add a rectangle, skipping it if already covered.
    ///
    /// Rectangles made redundant by the new one are dropped.
    pub fn add(&mut self, rect: GeoRect) {
        if rect.is_empty() || self.rects.iter().any(|r| r.contains_rect(&rect)) {
            return;
        }
        self.rects.retain(|r| !rect.contains_rect(r));
        self.rects.push(rect);
    }

    /// Combine two areas.
    pub fn union(mut self, other: &ChangedArea) -> Self {
        for rect in &other.rects {
            self.add(*rect);
        }
        self
    }

    /// Restrict the area to `extent`.
    pub fn clip_to(&self, extent: &GeoRect) -> ChangedArea {
        let mut clipped = Self::empty();
        for rect in &self.rects {
            if let Some(r) = rect.intersection(extent) {
                clipped.add(r);
            }
        }
        clipped
    }

    /// True if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// The rectangles making up the area.
    pub fn rects(&self) -> &[GeoRect] {
        &self.rects
    }

    /// Bounding box of all rectangles.
    pub fn bounds(&self) -> Option<GeoRect> {
        self.rects
            .iter()
            .copied()
            .reduce(|acc, r| acc.union(&r))
    }

    /// True if a single rectangle of the area covers all of `extent`.
    pub fn covers(&self, extent: &GeoRect) -> bool {
        self.rects.iter().any(|r| r.contains_rect(extent))
    }

    /// True if the area covers the whole extent of `request`.
    pub fn is_full_for(&self, request: &GeoRequest) -> bool {
        self.covers(&request.extent())
    }

    /// Pixel rectangles of `request`'s raster touched by the area.
    ///
    /// Rectangles are rounded outward and clamped; parts outside the
    /// request's extent are ignored.
    pub fn pixel_rects(&self, request: &GeoRequest) -> Vec<PixelRect> {
        self.rects
            .iter()
            .filter_map(|r| request.pixel_rect(r))
            .collect()
    }
}
