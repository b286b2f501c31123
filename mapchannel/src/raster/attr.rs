//! Band-format descriptors for rasters flowing through a pipeline.

use image::{ColorType, DynamicImage};
use serde::{Deserialize, Serialize};

/// Band layout of a raster.
///
/// Stages declare which layouts they consume and which they produce. Two
/// attributes are compatible when they agree on band count and alpha, so
/// [`MapAttr::SingleBand`] data may feed a stage that asks for
/// [`MapAttr::Gray`] and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapAttr {
    /// One numeric band (elevation, albedo, a mask).
    SingleBand,
    /// One displayable gray band.
    Gray,
    /// Gray plus alpha.
    GrayAlpha,
    /// Red, green and blue.
    Color,
    /// Red, green, blue and alpha.
    ColorAlpha,
}

/// Formats a compositor can display.
pub const DISPLAYABLE: &[MapAttr] = &[
    MapAttr::SingleBand,
    MapAttr::Gray,
    MapAttr::GrayAlpha,
    MapAttr::Color,
    MapAttr::ColorAlpha,
];

/// Single-band formats.
pub const SINGLE_BAND: &[MapAttr] = &[MapAttr::SingleBand, MapAttr::Gray];

impl MapAttr {
    /// Describe the layout of an image.
    pub fn of_image(image: &DynamicImage) -> Self {
        Self::from_color_type(image.color())
    }

    /// Describe the layout of an `image` color type.
    pub fn from_color_type(color: ColorType) -> Self {
        match (color.channel_count(), color.has_alpha()) {
            (1, _) => MapAttr::Gray,
            (2, _) => MapAttr::GrayAlpha,
            (3, _) => MapAttr::Color,
            _ => MapAttr::ColorAlpha,
        }
    }

    /// Total number of bands, including alpha.
    pub fn band_count(&self) -> u8 {
        match self {
            MapAttr::SingleBand | MapAttr::Gray => 1,
            MapAttr::GrayAlpha => 2,
            MapAttr::Color => 3,
            MapAttr::ColorAlpha => 4,
        }
    }

    /// Number of non-alpha bands.
    pub fn color_bands(&self) -> u8 {
        if self.has_alpha() {
            self.band_count() - 1
        } else {
            self.band_count()
        }
    }

    /// True if the last band is alpha.
    pub fn has_alpha(&self) -> bool {
        matches!(self, MapAttr::GrayAlpha | MapAttr::ColorAlpha)
    }

    /// Structural equality: same band count and alpha.
    pub fn is_compatible_with(&self, other: &MapAttr) -> bool {
        self.band_count() == other.band_count() && self.has_alpha() == other.has_alpha()
    }

    /// True if any of `accepted` is structurally compatible with `self`.
    pub fn is_accepted_by(&self, accepted: &[MapAttr]) -> bool {
        accepted.iter().any(|a| a.is_compatible_with(self))
    }

    /// The same layout with an alpha band added.
    pub fn with_alpha(&self) -> MapAttr {
        match self {
            MapAttr::SingleBand | MapAttr::Gray | MapAttr::GrayAlpha => MapAttr::GrayAlpha,
            MapAttr::Color | MapAttr::ColorAlpha => MapAttr::ColorAlpha,
        }
    }
}

impl std::fmt::Display for MapAttr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MapAttr::SingleBand => "single-band",
            MapAttr::Gray => "gray",
            MapAttr::GrayAlpha => "gray+alpha",
            MapAttr::Color => "rgb",
            MapAttr::ColorAlpha => "rgba",
        };
        write!(f, "{}", name)
    }
}
