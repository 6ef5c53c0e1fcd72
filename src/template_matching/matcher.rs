//! Template matcher implementation
//!
//! Sliding-window search with quick-reject sampling and row skip-ahead.
//! A template pixel with alpha = 0 is a wildcard and never constrains the
//! match, which lets irregularly shaped markers be cut out of rectangular
//! PNG files.

use image::RgbaImage;

use super::types::{Match, Region};

/// Probe points sampled before the full per-pixel comparison.
///
/// Checking 2-3 spread-out pixels rejects the overwhelming majority of
/// candidate positions without touching the rest of the template.
struct Probe {
    dx: u32,
    dy: u32,
    rgb: [u8; 3],
}

/// Find every position where `template` matches `frame` within `tolerance`.
///
/// `tolerance` is a Euclidean RGB distance on the 0-255-per-channel scale.
/// Matches are reported in scan order (row-major, top-to-bottom then
/// left-to-right). After a hit the scan cursor advances by half the template
/// width so overlapping near-duplicates of the same object collapse into one
/// report. A frame smaller than the template yields no matches.
pub fn find_all(frame: &RgbaImage, template: &RgbaImage, tolerance: f32) -> Vec<Match> {
    scan(frame, template, 0, 0, frame.width(), frame.height(), tolerance)
}

/// Like [`find_all`] but restricted to `region`, clipped to the frame.
///
/// An empty or fully out-of-frame region falls back to a full-frame search;
/// callers derive regions from previously seen entities and a stale region
/// must never hide the rest of the screen.
pub fn find_all_in_region(
    frame: &RgbaImage,
    template: &RgbaImage,
    region: Region,
    tolerance: f32,
) -> Vec<Match> {
    match region.clipped(frame.width(), frame.height()) {
        Some((x, y, width, height)) => scan(frame, template, x, y, width, height, tolerance),
        None => {
            log::trace!("degenerate search region {region:?}, falling back to full frame");
            find_all(frame, template, tolerance)
        }
    }
}

/// First match in scan order, or `None`.
pub fn find_first(frame: &RgbaImage, template: &RgbaImage, tolerance: f32) -> Option<Match> {
    // A dedicated early-exit scan would save little: the quick-reject probes
    // already dominate, and most callers probe small screens-state markers.
    find_all(frame, template, tolerance).into_iter().next()
}

fn scan(
    frame: &RgbaImage,
    template: &RgbaImage,
    region_x: u32,
    region_y: u32,
    region_width: u32,
    region_height: u32,
    tolerance: f32,
) -> Vec<Match> {
    let tw = template.width();
    let th = template.height();

    if tw == 0 || th == 0 || region_width < tw || region_height < th {
        return Vec::new();
    }

    let tolerance_sq = tolerance * tolerance;
    let probes = probe_points(template);
    let skip = (tw / 2).max(1);

    let x_end = region_x + region_width - tw; // inclusive
    let y_end = region_y + region_height - th; // inclusive

    let mut matches = Vec::new();

    for y in region_y..=y_end {
        let mut x = region_x;
        while x <= x_end {
            if probes_pass(frame, x, y, &probes, tolerance_sq)
                && match_at(frame, template, x, y, tolerance_sq)
            {
                matches.push(Match::new(x, y));
                x += skip;
            } else {
                x += 1;
            }
        }
    }

    matches
}

/// Sample the template's top-left, center, and bottom-right pixels,
/// dropping any that are wildcards.
fn probe_points(template: &RgbaImage) -> Vec<Probe> {
    let tw = template.width();
    let th = template.height();

    [(0, 0), (tw / 2, th / 2), (tw - 1, th - 1)]
        .into_iter()
        .filter_map(|(dx, dy)| {
            let p = template.get_pixel(dx, dy).0;
            (p[3] != 0).then_some(Probe {
                dx,
                dy,
                rgb: [p[0], p[1], p[2]],
            })
        })
        .collect()
}

fn probes_pass(frame: &RgbaImage, x: u32, y: u32, probes: &[Probe], tolerance_sq: f32) -> bool {
    probes.iter().all(|probe| {
        let f = frame.get_pixel(x + probe.dx, y + probe.dy).0;
        color_distance_sq(probe.rgb, [f[0], f[1], f[2]]) <= tolerance_sq
    })
}

/// Full per-pixel comparison at one candidate position.
///
/// Rejects as soon as any compared pixel exceeds the tolerance. A template
/// whose pixels are all wildcards never matches.
fn match_at(frame: &RgbaImage, template: &RgbaImage, x: u32, y: u32, tolerance_sq: f32) -> bool {
    let mut compared = 0u32;

    for (tx, ty, pixel) in template.enumerate_pixels() {
        let t = pixel.0;
        if t[3] == 0 {
            continue;
        }

        let f = frame.get_pixel(x + tx, y + ty).0;
        if color_distance_sq([t[0], t[1], t[2]], [f[0], f[1], f[2]]) > tolerance_sq {
            return false;
        }
        compared += 1;
    }

    compared > 0
}

fn color_distance_sq(a: [u8; 3], b: [u8; 3]) -> f32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    (dr * dr + dg * dg + db * db) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template_matching::Region;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    fn paint(frame: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, rgb: [u8; 3]) {
        for dy in 0..height {
            for dx in 0..width {
                frame.put_pixel(x + dx, y + dy, image::Rgba([rgb[0], rgb[1], rgb[2], 255]));
            }
        }
    }

    #[test]
    fn test_exact_match_position() {
        let mut frame = solid_frame(100, 80, [0, 0, 0]);
        paint(&mut frame, 40, 20, 10, 10, [200, 50, 50]);
        let template = solid_frame(10, 10, [200, 50, 50]);

        let matches = find_all(&frame, &template, 10.0);
        assert_eq!(matches, vec![Match::new(40, 20)]);
    }

    #[test]
    fn test_tolerance_boundary() {
        // Distance between the colors is exactly 60 on the red channel.
        let frame = solid_frame(10, 10, [160, 100, 100]);
        let template = solid_frame(10, 10, [100, 100, 100]);

        assert_eq!(find_all(&frame, &template, 60.0).len(), 1);
        assert!(find_all(&frame, &template, 59.9).is_empty());
    }

    #[test]
    fn test_transparent_pixels_never_affect_result() {
        let mut frame = solid_frame(60, 60, [10, 10, 10]);
        paint(&mut frame, 25, 25, 8, 8, [240, 240, 240]);

        let mut template_a = solid_frame(8, 8, [240, 240, 240]);
        let mut template_b = template_a.clone();
        // Same wildcard hole, arbitrarily recolored under alpha = 0.
        template_a.put_pixel(3, 3, image::Rgba([0, 0, 0, 0]));
        template_b.put_pixel(3, 3, image::Rgba([255, 0, 255, 0]));

        let a = find_all(&frame, &template_a, 20.0);
        let b = find_all(&frame, &template_b, 20.0);
        assert_eq!(a, b);
        assert_eq!(a, vec![Match::new(25, 25)]);
    }

    #[test]
    fn test_fully_transparent_template_matches_nothing() {
        let frame = solid_frame(30, 30, [50, 50, 50]);
        let template = RgbaImage::from_pixel(5, 5, image::Rgba([50, 50, 50, 0]));
        assert!(find_all(&frame, &template, 60.0).is_empty());
    }

    #[test]
    fn test_frame_smaller_than_template() {
        let frame = solid_frame(5, 5, [50, 50, 50]);
        let template = solid_frame(10, 10, [50, 50, 50]);
        assert!(find_all(&frame, &template, 60.0).is_empty());
    }

    #[test]
    fn test_skip_ahead_collapses_overlapping_matches() {
        // A 30px-wide bright strip contains many positions where a 10px-wide
        // template matches; skip-ahead must thin them out.
        let mut frame = solid_frame(60, 20, [0, 0, 0]);
        paint(&mut frame, 10, 5, 30, 10, [220, 220, 220]);
        let template = solid_frame(10, 10, [220, 220, 220]);

        let matches = find_all(&frame, &template, 10.0);
        // Valid start positions are x = 10..=30; with a skip of 5 that is
        // x = 10, 15, 20, 25, 30 rather than all 21 positions.
        assert_eq!(matches.len(), 5);
        assert_eq!(matches[0], Match::new(10, 5));
    }

    #[test]
    fn test_distinct_objects_all_reported_in_scan_order() {
        let mut frame = solid_frame(120, 60, [0, 0, 0]);
        paint(&mut frame, 10, 10, 10, 10, [200, 30, 30]);
        paint(&mut frame, 80, 10, 10, 10, [200, 30, 30]);
        paint(&mut frame, 40, 40, 10, 10, [200, 30, 30]);
        let template = solid_frame(10, 10, [200, 30, 30]);

        let matches = find_all(&frame, &template, 10.0);
        assert_eq!(
            matches,
            vec![Match::new(10, 10), Match::new(80, 10), Match::new(40, 40)]
        );
    }

    #[test]
    fn test_region_restricts_search() {
        let mut frame = solid_frame(200, 200, [0, 0, 0]);
        paint(&mut frame, 20, 20, 10, 10, [200, 30, 30]);
        paint(&mut frame, 150, 150, 10, 10, [200, 30, 30]);
        let template = solid_frame(10, 10, [200, 30, 30]);

        let region = Region::new(0, 0, 100, 100);
        let matches = find_all_in_region(&frame, &template, region, 10.0);
        assert_eq!(matches, vec![Match::new(20, 20)]);
    }

    #[test]
    fn test_empty_region_falls_back_to_full_frame() {
        let mut frame = solid_frame(100, 100, [0, 0, 0]);
        paint(&mut frame, 70, 70, 10, 10, [200, 30, 30]);
        let template = solid_frame(10, 10, [200, 30, 30]);

        let matches = find_all_in_region(&frame, &template, Region::default(), 10.0);
        assert_eq!(matches, vec![Match::new(70, 70)]);
    }

    #[test]
    fn test_region_extending_past_frame_is_clipped() {
        let mut frame = solid_frame(100, 100, [0, 0, 0]);
        paint(&mut frame, 85, 85, 10, 10, [200, 30, 30]);
        let template = solid_frame(10, 10, [200, 30, 30]);

        // Margin-expanded region hangs off the bottom-right corner.
        let region = Region::new(60, 60, 200, 200);
        let matches = find_all_in_region(&frame, &template, region, 10.0);
        assert_eq!(matches, vec![Match::new(85, 85)]);
    }

    #[test]
    fn test_find_first() {
        let mut frame = solid_frame(100, 50, [0, 0, 0]);
        paint(&mut frame, 60, 10, 10, 10, [200, 30, 30]);
        paint(&mut frame, 10, 30, 10, 10, [200, 30, 30]);
        let template = solid_frame(10, 10, [200, 30, 30]);

        // Row-major order: the y=10 hit comes first even though its x is larger.
        assert_eq!(find_first(&frame, &template, 10.0), Some(Match::new(60, 10)));
        assert_eq!(find_first(&frame, &solid_frame(10, 10, [1, 99, 1]), 10.0), None);
    }
}
