//! Pure calculation functions for image dimensions.

/// Fit `original` inside a `max_edge` × `max_edge` box.
///
/// Aspect ratio is preserved and images are never upscaled. Returns `None`
/// when the original already fits (or `max_edge` is 0), meaning no copy is
/// needed.
///
/// # Examples
/// ```
/// # use alt_scout::imaging::calculate_fit_dimensions;
/// assert_eq!(calculate_fit_dimensions((4000, 3000), 1600), Some((1600, 1200)));
/// assert_eq!(calculate_fit_dimensions((800, 600), 1600), None);
/// ```
pub fn calculate_fit_dimensions(original: (u32, u32), max_edge: u32) -> Option<(u32, u32)> {
    let (orig_w, orig_h) = original;
    if max_edge == 0 || (orig_w <= max_edge && orig_h <= max_edge) {
        return None;
    }

    if orig_w >= orig_h {
        // Landscape or square
        let ratio = max_edge as f64 / orig_w as f64;
        let h = ((orig_h as f64 * ratio).round() as u32).max(1);
        Some((max_edge, h))
    } else {
        // Portrait
        let ratio = max_edge as f64 / orig_h as f64;
        let w = ((orig_w as f64 * ratio).round() as u32).max(1);
        Some((w, max_edge))
    }
}
