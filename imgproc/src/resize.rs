use image::GrayImage;
use rayon::prelude::*;

/// Per destination index, the contributing source indices and their
/// overlap weights (summing to 1).
fn area_weights(src_len: u32, dst_len: u32) -> Vec<Vec<(u32, f32)>> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let start = d as f64 * scale;
            let end = ((d + 1) as f64 * scale).min(src_len as f64);
            let mut taps = Vec::new();
            let mut s = start.floor() as u32;
            while (s as f64) < end && s < src_len {
                let lo = start.max(s as f64);
                let hi = end.min(s as f64 + 1.0);
                if hi > lo {
                    taps.push((s, ((hi - lo) / (end - start)) as f32));
                }
                s += 1;
            }
            taps
        })
        .collect()
}

/// Box-filter (pixel area) downsampling, the anti-aliased choice for
/// building scale spaces.
pub fn resize_area(src: &GrayImage, width: u32, height: u32) -> GrayImage {
    if width == 0 || height == 0 || src.width() == 0 || src.height() == 0 {
        return GrayImage::new(width, height);
    }

    let x_taps = area_weights(src.width(), width);
    let y_taps = area_weights(src.height(), height);
    let src_w = src.width() as usize;
    let raw = src.as_raw();

    let mut dst = GrayImage::new(width, height);
    dst.as_mut()
        .par_chunks_mut(width as usize)
        .zip(y_taps.par_iter())
        .for_each(|(row, ys)| {
            for (out, xs) in row.iter_mut().zip(&x_taps) {
                let mut acc = 0.0f32;
                for &(sy, wy) in ys {
                    let line = &raw[sy as usize * src_w..(sy as usize + 1) * src_w];
                    for &(sx, wx) in xs {
                        acc += line[sx as usize] as f32 * wx * wy;
                    }
                }
                *out = acc.round().clamp(0.0, 255.0) as u8;
            }
        });
    dst
}

/// Half resolution in both directions (2x2 block mean).
pub fn downsample_half(src: &GrayImage) -> GrayImage {
    resize_area(src, src.width() / 2, src.height() / 2)
}

/// Two-thirds resolution in both directions (3x3 blocks to 2x2).
pub fn downsample_two_thirds(src: &GrayImage) -> GrayImage {
    resize_area(src, src.width() * 2 / 3, src.height() * 2 / 3)
}
