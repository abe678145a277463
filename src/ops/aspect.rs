// ============================================================================
// Aspect-ratio inference for the generation request
// ============================================================================

use log::warn;

/// Ratios the image generator accepts, as (label, width, height).
pub const SUPPORTED_RATIOS: &[(&str, u32, u32)] = &[
    ("1:1", 1, 1),
    ("2:3", 2, 3),
    ("3:2", 3, 2),
    ("3:4", 3, 4),
    ("4:3", 4, 3),
    ("4:5", 4, 5),
    ("5:4", 5, 4),
    ("9:16", 9, 16),
    ("16:9", 16, 9),
    ("21:9", 21, 9),
];

/// Used when the photo could not be measured.
pub const FALLBACK_RATIO: &str = "1:1";

/// Nearest supported ratio to `width`:`height`, compared in log space so
/// 2:1 and 1:2 are equally far from 1:1.
pub fn nearest_aspect_ratio(width: u32, height: u32) -> &'static str {
    if width == 0 || height == 0 {
        return FALLBACK_RATIO;
    }
    let target = (width as f64 / height as f64).ln();
    SUPPORTED_RATIOS
        .iter()
        .map(|&(label, w, h)| (label, ((w as f64 / h as f64).ln() - target).abs()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(label, _)| label)
        .unwrap_or(FALLBACK_RATIO)
}

/// Aspect ratio for a photo whose measurement may have failed. A failure
/// does not block the flow; it is logged because framing may suffer.
pub fn infer_aspect_ratio<E: std::fmt::Display>(dimensions: Result<(u32, u32), E>) -> &'static str {
    match dimensions {
        Ok((w, h)) => nearest_aspect_ratio(w, h),
        Err(e) => {
            warn!(
                "could not measure photo ({}); assuming {} aspect ratio",
                e, FALLBACK_RATIO
            );
            FALLBACK_RATIO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_ratios_match_themselves() {
        assert_eq!(nearest_aspect_ratio(1920, 1080), "16:9");
        assert_eq!(nearest_aspect_ratio(800, 600), "4:3");
        assert_eq!(nearest_aspect_ratio(1080, 1350), "4:5");
        assert_eq!(nearest_aspect_ratio(512, 512), "1:1");
    }

    #[test]
    fn odd_sizes_snap_to_nearest() {
        assert_eq!(nearest_aspect_ratio(3000, 1000), "21:9");
        assert_eq!(nearest_aspect_ratio(1000, 3000), "9:16");
        assert_eq!(nearest_aspect_ratio(1010, 1000), "1:1");
    }

    #[test]
    fn failed_measurement_falls_back() {
        assert_eq!(infer_aspect_ratio::<&str>(Err("bad header")), FALLBACK_RATIO);
        assert_eq!(nearest_aspect_ratio(0, 10), FALLBACK_RATIO);
        assert_eq!(infer_aspect_ratio::<&str>(Ok((1600, 900))), "16:9");
    }
}
