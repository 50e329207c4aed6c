use crate::{ImgprocError, Result};
use image::RgbImage;
use nalgebra::{Matrix3, Point2};
use rayon::prelude::*;

const CHANNELS: usize = 3;

/// Borrowed interleaved RGB raster.
#[derive(Clone, Copy)]
struct RasterView<'a> {
    raw: &'a [u8],
    width: usize,
    height: usize,
}

impl RasterView<'_> {
    /// Channel `c` at `(x, y)`, or `fill` outside the raster.
    fn sample(&self, x: isize, y: isize, c: usize, fill: u8) -> f32 {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return fill as f32;
        }
        self.raw[(y as usize * self.width + x as usize) * CHANNELS + c] as f32
    }

    fn bilinear(&self, x: f32, y: f32, fill: u8, out: &mut [u8]) {
        let x0 = x.floor() as isize;
        let y0 = y.floor() as isize;
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        for (c, o) in out.iter_mut().enumerate() {
            let v00 = self.sample(x0, y0, c, fill);
            let v10 = self.sample(x0 + 1, y0, c, fill);
            let v01 = self.sample(x0, y0 + 1, c, fill);
            let v11 = self.sample(x0 + 1, y0 + 1, c, fill);

            let v0 = v00 * (1.0 - fx) + v10 * fx;
            let v1 = v01 * (1.0 - fx) + v11 * fx;
            *o = (v0 * (1.0 - fy) + v1 * fy).round().clamp(0.0, 255.0) as u8;
        }
    }

    /// Whether `(x, y)` has at least one bilinear tap inside the raster.
    fn touches(&self, x: f32, y: f32) -> bool {
        x > -1.0 && y > -1.0 && x < self.width as f32 && y < self.height as f32
    }
}

/// Apply a 3x3 projective transform to a point.
///
/// Returns `None` when the point maps to infinity.
pub fn transform_point(matrix: &Matrix3<f64>, pt: &Point2<f64>) -> Option<Point2<f64>> {
    let w = matrix[(2, 0)] * pt.x + matrix[(2, 1)] * pt.y + matrix[(2, 2)];
    if w.abs() < 1e-12 {
        return None;
    }
    Some(Point2::new(
        (matrix[(0, 0)] * pt.x + matrix[(0, 1)] * pt.y + matrix[(0, 2)]) / w,
        (matrix[(1, 0)] * pt.x + matrix[(1, 1)] * pt.y + matrix[(1, 2)]) / w,
    ))
}

fn invert_homography(homography: &Matrix3<f64>) -> Result<Matrix3<f64>> {
    if homography.iter().any(|v| !v.is_finite()) {
        return Err(ImgprocError::AlgorithmError(
            "transform contains non-finite entries".into(),
        ));
    }
    homography.try_inverse().ok_or_else(|| {
        ImgprocError::AlgorithmError("transform is singular and cannot be inverted".into())
    })
}

/// Warp a colour image into a `width`x`height` frame through the forward
/// transform `homography` (source plane -> destination plane).
///
/// Each output pixel pulls a bilinear sample from its preimage. Taps outside
/// the source read as `fill`, and pixels with no preimage take `fill` in
/// every channel.
pub fn warp_perspective_rgb(
    src: &RgbImage,
    homography: &Matrix3<f64>,
    width: u32,
    height: u32,
    fill: u8,
) -> Result<RgbImage> {
    let inverse = invert_homography(homography)?;
    let view = RasterView {
        raw: src.as_raw(),
        width: src.width() as usize,
        height: src.height() as usize,
    };

    let mut dst = RgbImage::new(width, height);
    let row_len = width as usize * CHANNELS;
    if row_len == 0 {
        return Ok(dst);
    }

    dst.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
                match transform_point(&inverse, &Point2::new(x as f64, y as f64)) {
                    Some(s) if view.touches(s.x as f32, s.y as f32) => {
                        view.bilinear(s.x as f32, s.y as f32, fill, px)
                    }
                    _ => px.fill(fill),
                }
            }
        });
    Ok(dst)
}

pub fn get_translation_matrix(dx: f64, dy: f64) -> Matrix3<f64> {
    Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn identity_preserves_pixels() {
        let mut img = RgbImage::new(7, 7);
        img.put_pixel(5, 4, Rgb([180, 1, 2]));
        let out = warp_perspective_rgb(&img, &Matrix3::identity(), 7, 7, 0).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn forward_translation_moves_pixels_and_fills_border() {
        let mut img = RgbImage::from_pixel(8, 8, Rgb([10, 20, 30]));
        img.put_pixel(2, 2, Rgb([255, 0, 0]));

        let h = get_translation_matrix(2.0, 1.0);
        let out = warp_perspective_rgb(&img, &h, 8, 8, 7).unwrap();

        assert_eq!(out.get_pixel(4, 3).0, [255, 0, 0]);
        assert_eq!(out.get_pixel(5, 5).0, [10, 20, 30]);
        // Column 0 and row 0 have no preimage.
        assert_eq!(out.get_pixel(0, 4).0, [7, 7, 7]);
        assert_eq!(out.get_pixel(4, 0).0, [7, 7, 7]);
    }

    #[test]
    fn output_has_requested_size() {
        let img = RgbImage::new(10, 6);
        let zoom = Matrix3::new(2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0);
        let out = warp_perspective_rgb(&img, &zoom, 31, 17, 0).unwrap();
        assert_eq!(out.dimensions(), (31, 17));
    }

    #[test]
    fn singular_or_non_finite_transform_is_rejected() {
        let img = RgbImage::new(4, 4);
        let singular = Matrix3::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0, 0.0, 0.0, 1.0);
        assert!(warp_perspective_rgb(&img, &singular, 4, 4, 0).is_err());

        let nan = Matrix3::from_element(f64::NAN);
        assert!(warp_perspective_rgb(&img, &nan, 4, 4, 0).is_err());
    }

    #[test]
    fn point_at_infinity_has_no_image() {
        let h = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0);
        assert!(transform_point(&h, &Point2::new(0.0, 3.0)).is_none());
        assert_eq!(
            transform_point(&h, &Point2::new(2.0, 3.0)),
            Some(Point2::new(1.0, 1.5))
        );
    }
}
