// ============================================================================
// Mask compilation: drawing surface → binary black/white PNG
// ============================================================================

use std::path::Path;

use image::{Rgba, RgbaImage};
use log::debug;
use rayon::prelude::*;
use thiserror::Error;

use crate::canvas::{DrawingSurface, PixelBounds};
use crate::io::EncodedImage;

pub const MASK_WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const MASK_BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const MASK_MIME: &str = "image/png";

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("could not write mask: {0}")]
    Io(#[from] std::io::Error),
}

/// Binary mask: white = eligible for modification, black = protected.
/// Every pixel is exactly one of the two, fully opaque.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskImage {
    pixels: RgbaImage,
}

/// Compile the surface into a mask of identical dimensions. Only the alpha
/// channel is read: any alpha above zero becomes white.
pub fn compile(surface: &DrawingSurface) -> MaskImage {
    let src = surface.as_image();
    let (w, h) = src.dimensions();
    let mut pixels = RgbaImage::new(w, h);

    let row_bytes = w as usize * 4;
    if row_bytes > 0 {
        pixels
            .par_chunks_mut(row_bytes)
            .zip(src.as_raw().par_chunks(row_bytes))
            .for_each(|(dst_row, src_row)| {
                for (dst, px) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                    let value = if px[3] > 0 { MASK_WHITE } else { MASK_BLACK };
                    dst.copy_from_slice(&value.0);
                }
            });
    }

    let mask = MaskImage { pixels };
    debug!(
        "compiled {}x{} mask, {} pixels selected",
        w,
        h,
        mask.white_pixel_count()
    );
    mask
}

impl MaskImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.pixels.get_pixel_checked(x, y).copied()
    }

    pub fn white_pixel_count(&self) -> usize {
        self.pixels
            .as_raw()
            .par_chunks(4)
            .filter(|px| px[0] == 255)
            .count()
    }

    /// True when no pixel is selected (an all-black mask).
    pub fn is_empty(&self) -> bool {
        !self.pixels.as_raw().par_chunks(4).any(|px| px[0] == 255)
    }

    /// Inclusive bounding box of the white region.
    pub fn white_bounds(&self) -> Option<PixelBounds> {
        let mut bounds: Option<PixelBounds> = None;
        for (x, y, px) in self.pixels.enumerate_pixels() {
            if px[0] != 255 {
                continue;
            }
            let here = PixelBounds {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            };
            bounds = Some(bounds.map_or(here, |b| b.union(here)));
        }
        bounds
    }

    /// Lossless PNG encoding. Identical masks always give identical bytes.
    pub fn encode_png(&self) -> Result<Vec<u8>, MaskError> {
        let (w, h) = self.dimensions();
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, w, h);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_compression(png::Compression::Default);
            encoder.set_filter(png::FilterType::NoFilter);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(self.pixels.as_raw())?;
            writer.finish()?;
        }
        Ok(out)
    }

    pub fn to_encoded(&self) -> Result<EncodedImage, MaskError> {
        Ok(EncodedImage::new(MASK_MIME, self.encode_png()?))
    }

    pub fn save(&self, path: &Path) -> Result<(), MaskError> {
        std::fs::write(path, self.encode_png()?)?;
        Ok(())
    }
}
