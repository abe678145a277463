use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{DrawingSurface, composite_over};

/// What the user sees while painting: the highlight strokes laid over the
/// photo. Returns `None` if the two sizes disagree.
pub fn render_overlay(photo: &RgbaImage, surface: &DrawingSurface) -> Option<RgbaImage> {
    if photo.dimensions() != surface.dimensions() {
        return None;
    }
    let mut out = photo.clone();
    out.par_chunks_mut(4)
        .zip(surface.as_image().as_raw().par_chunks(4))
        .for_each(|(dst, src)| {
            let blended = composite_over(
                Rgba([dst[0], dst[1], dst[2], dst[3]]),
                Rgba([src[0], src[1], src[2], src[3]]),
            );
            dst.copy_from_slice(&blended.0);
        });
    Some(out)
}
