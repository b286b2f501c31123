//! Raster data handed between pipeline stages.

use std::sync::Arc;

use image::DynamicImage;

use super::attr::MapAttr;
use crate::geo::GeoRequest;
use crate::pipeline::PipelineError;

/// A raster rendered for a specific [`GeoRequest`].
///
/// The image buffer is shared read-only. Cloning a `MapData` is cheap and
/// never aliases a mutable buffer: the only way to write pixels is through
/// [`MapData::image_mut`], which copies the buffer first if anyone else still
/// holds it, or through an explicit [`MapData::deep_copy_shell`].
#[derive(Debug, Clone)]
pub struct MapData {
    image: Arc<DynamicImage>,
    request: GeoRequest,
}

impl MapData {
    /// Wrap an image rendered for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::RasterSize`] if the image dimensions do not
    /// match the request's pixel dimensions.
    pub fn new(image: DynamicImage, request: GeoRequest) -> Result<Self, PipelineError> {
        Self::from_shared(Arc::new(image), request)
    }

    /// Wrap an already shared image.
    pub fn from_shared(image: Arc<DynamicImage>, request: GeoRequest) -> Result<Self, PipelineError> {
        if image.width() != request.width_px() || image.height() != request.height_px() {
            return Err(PipelineError::RasterSize {
                width: request.width_px(),
                height: request.height_px(),
                actual_width: image.width(),
                actual_height: image.height(),
            });
        }
        Ok(Self { image, request })
    }

    /// Read-only access to the raster.
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Shared handle to the raster buffer.
    pub fn shared_image(&self) -> Arc<DynamicImage> {
        Arc::clone(&self.image)
    }

    /// The request this raster was rendered for.
    pub fn request(&self) -> &GeoRequest {
        &self.request
    }

    /// Band layout of the raster.
    pub fn attr(&self) -> MapAttr {
        MapAttr::of_image(&self.image)
    }

    /// Raster width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Raster height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// A copy with its own, freshly allocated buffer.
    pub fn deep_copy_shell(&self) -> MapData {
        Self {
            image: Arc::new(self.image.as_ref().clone()),
            request: self.request,
        }
    }

    /// Mutable access to the raster, copying the buffer first if shared.
    pub fn image_mut(&mut self) -> &mut DynamicImage {
        Arc::make_mut(&mut self.image)
    }

    /// True if both values point at the same buffer.
    pub fn shares_buffer_with(&self, other: &MapData) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }

    /// Take the raster out, copying only if it is still shared.
    pub fn into_image(self) -> DynamicImage {
        Arc::unwrap_or_clone(self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{GeoRect, Projection};
    use image::{GenericImageView, GrayImage, Luma};

    fn request() -> GeoRequest {
        GeoRequest::new(GeoRect::new(0.0, 0.0, 4.0, 2.0), 1.0, Projection::Equirectangular)
            .unwrap()
    }

    #[test]
    fn test_new_checks_dimensions() {
        let ok = MapData::new(DynamicImage::ImageLuma8(GrayImage::new(4, 2)), request());
        assert!(ok.is_ok());

        let bad = MapData::new(DynamicImage::ImageLuma8(GrayImage::new(3, 2)), request());
        assert!(matches!(bad, Err(PipelineError::RasterSize { .. })));
    }

    #[test]
    fn test_clone_shares_buffer() {
        let data = MapData::new(DynamicImage::ImageLuma8(GrayImage::new(4, 2)), request()).unwrap();
        let clone = data.clone();
        assert!(clone.shares_buffer_with(&data));
    }

    #[test]
    fn test_deep_copy_shell_does_not_share() {
        let data = MapData::new(DynamicImage::ImageLuma8(GrayImage::new(4, 2)), request()).unwrap();
        let copy = data.deep_copy_shell();
        assert!(!copy.shares_buffer_with(&data));
        assert_eq!(copy.request(), data.request());
    }

    #[test]
    fn test_image_mut_copies_on_write() {
        let original =
            MapData::new(DynamicImage::ImageLuma8(GrayImage::new(4, 2)), request()).unwrap();
        let mut writer = original.clone();

        if let DynamicImage::ImageLuma8(img) = writer.image_mut() {
            img.put_pixel(0, 0, Luma([200]));
        }

        assert!(!writer.shares_buffer_with(&original));
        assert_eq!(original.image().get_pixel(0, 0).0[0], 0);
        assert_eq!(writer.image().get_pixel(0, 0).0[0], 200);
    }

    #[test]
    fn test_attr() {
        let data = MapData::new(DynamicImage::ImageLuma8(GrayImage::new(4, 2)), request()).unwrap();
        assert_eq!(data.attr(), MapAttr::Gray);
    }
}
