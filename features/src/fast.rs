//! FAST 9-16 corner test and score.

use image::GrayImage;
use rayon::prelude::*;

/// Bresenham circle of radius 3, clockwise from twelve o'clock.
pub const CIRCLE_OFFSETS: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Contiguous arc length required for a corner.
pub const ARC_LENGTH: usize = 9;

/// Pixels closer than this to the border have no full circle.
pub const FAST_BORDER: u32 = 3;

/// Largest `t` for which the pixel is a FAST 9-16 corner, i.e. the best arc
/// of nine whose pixels are all brighter than `p + t` (or all darker than
/// `p - t`). Returns 0 when the pixel is not a corner at `threshold`.
///
/// The caller must keep `(x, y)` at least [`FAST_BORDER`] pixels inside.
pub fn fast_score(image: &GrayImage, x: i32, y: i32, threshold: u8) -> u8 {
    let w = image.width() as usize;
    let raw = image.as_raw();
    let at = |dx: i32, dy: i32| raw[(y + dy) as usize * w + (x + dx) as usize] as i16;
    let p = at(0, 0);
    let t = threshold as i16;

    // Any arc of nine covers at least two of the four cardinal pixels.
    let mut bright = 0;
    let mut dark = 0;
    for k in [0usize, 4, 8, 12] {
        let (dx, dy) = CIRCLE_OFFSETS[k];
        let v = at(dx, dy);
        if v > p + t {
            bright += 1;
        } else if v < p - t {
            dark += 1;
        }
    }
    if bright < 2 && dark < 2 {
        return 0;
    }

    let mut diff = [0i16; 16];
    for (d, &(dx, dy)) in diff.iter_mut().zip(CIRCLE_OFFSETS.iter()) {
        *d = at(dx, dy) - p;
    }

    let mut best_bright = i16::MIN;
    let mut best_dark = i16::MIN;
    for start in 0..16 {
        let mut min_bright = i16::MAX;
        let mut min_dark = i16::MAX;
        for k in 0..ARC_LENGTH {
            let d = diff[(start + k) % 16];
            min_bright = min_bright.min(d);
            min_dark = min_dark.min(-d);
        }
        best_bright = best_bright.max(min_bright);
        best_dark = best_dark.max(min_dark);
    }

    let score = best_bright.max(best_dark) - 1;
    if score >= t && score > 0 {
        score.min(255) as u8
    } else {
        0
    }
}

/// Dense FAST score map (row-major, same size as the image); pixels that
/// are not corners at `threshold`, or lie in the border band, are 0.
pub fn fast_score_map(image: &GrayImage, threshold: u8) -> Vec<u8> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let mut scores = vec![0u8; width * height];
    let b = FAST_BORDER as usize;
    if width <= 2 * b || height <= 2 * b {
        return scores;
    }

    scores
        .par_chunks_mut(width)
        .enumerate()
        .skip(b)
        .take(height - 2 * b)
        .for_each(|(y, row)| {
            for x in b..width - b {
                row[x] = fast_score(image, x as i32, y as i32, threshold);
            }
        });
    scores
}

/// True if `scores[idx]` is a strict local maximum over its 3x3
/// neighbourhood, with ties resolved in favour of the first pixel in
/// raster order.
pub fn is_local_max(scores: &[u8], width: usize, x: usize, y: usize) -> bool {
    let s = scores[y * width + x];
    if s == 0 {
        return false;
    }
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let n = scores[(y as i32 + dy) as usize * width + (x as i32 + dx) as usize];
            let earlier = dy < 0 || (dy == 0 && dx < 0);
            if n > s || (earlier && n == s) {
                return false;
            }
        }
    }
    true
}
