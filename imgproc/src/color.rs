use crate::{ImgprocError, Result};
use image::{DynamicImage, GrayImage, RgbImage};
use rayon::prelude::*;

// BT.601 luma weights in Q14 fixed point; they sum to 1 << 14.
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let acc = LUMA_R * r as u32 + LUMA_G * g as u32 + LUMA_B * b as u32;
    ((acc + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8
}

pub fn convert_rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    let (w, h) = rgb.dimensions();
    let gray_data: Vec<u8> = rgb
        .as_raw()
        .par_chunks_exact(3)
        .map(|p| luma(p[0], p[1], p[2]))
        .collect();
    // from_raw only fails on a length mismatch, which the 3:1 chunking rules out.
    GrayImage::from_raw(w, h, gray_data).unwrap_or_else(|| GrayImage::new(w, h))
}

pub fn convert_gray_to_rgb(gray: &GrayImage) -> RgbImage {
    let (w, h) = gray.dimensions();
    let mut rgb = RgbImage::new(w, h);
    rgb.as_mut()
        .par_chunks_exact_mut(3)
        .zip(gray.as_raw().par_iter())
        .for_each(|(px, &g)| {
            px[0] = g;
            px[1] = g;
            px[2] = g;
        });
    rgb
}

/// Single-channel intensity of any decoded raster.
///
/// Gray inputs are taken as-is, everything else goes through the luma weights
/// (alpha is ignored, wide samples are reduced to 8 bits first).
pub fn to_gray(img: &DynamicImage) -> GrayImage {
    match img {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
            img.to_luma8()
        }
        _ => convert_rgb_to_gray(&img.to_rgb8()),
    }
}

/// Hue/saturation/value raster.
///
/// Hue is in degrees `[0, 360)`, saturation in `[0, 1]`, value in `[0, 255]`.
/// Samples are kept in `f32` so that converting back only rounds once.
#[derive(Debug, Clone, PartialEq)]
pub struct HsvImage {
    width: u32,
    height: u32,
    data: Vec<[f32; 3]>,
}

impl HsvImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![[0.0; 3]; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> [f32; 3] {
        self.data[self.index(x, y)]
    }

    pub fn put(&mut self, x: u32, y: u32, hsv: [f32; 3]) {
        let idx = self.index(x, y);
        self.data[idx] = hsv;
    }

    pub fn pixels(&self) -> &[[f32; 3]] {
        &self.data
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

pub fn rgb_pixel_to_hsv(r: u8, g: u8, b: u8) -> [f32; 3] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let chroma = v - min;

    let s = if v > 0.0 { chroma / v } else { 0.0 };

    let h = if chroma <= 0.0 {
        0.0
    } else if v == r {
        60.0 * ((g - b) / chroma)
    } else if v == g {
        60.0 * ((b - r) / chroma) + 120.0
    } else {
        60.0 * ((r - g) / chroma) + 240.0
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [h, s, v]
}

pub fn hsv_pixel_to_rgb(hsv: [f32; 3]) -> [u8; 3] {
    let [h, s, v] = hsv;
    let s = s.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 255.0);
    let chroma = v * s;
    let sector = h.rem_euclid(360.0) / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let m = v - chroma;

    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    [
        (r + m).round().clamp(0.0, 255.0) as u8,
        (g + m).round().clamp(0.0, 255.0) as u8,
        (b + m).round().clamp(0.0, 255.0) as u8,
    ]
}

pub fn rgb_to_hsv(rgb: &RgbImage) -> HsvImage {
    let (w, h) = rgb.dimensions();
    let data = rgb
        .as_raw()
        .par_chunks_exact(3)
        .map(|p| rgb_pixel_to_hsv(p[0], p[1], p[2]))
        .collect();
    HsvImage {
        width: w,
        height: h,
        data,
    }
}

pub fn hsv_to_rgb(hsv: &HsvImage) -> RgbImage {
    let mut rgb = RgbImage::new(hsv.width, hsv.height);
    rgb.as_mut()
        .par_chunks_exact_mut(3)
        .zip(hsv.data.par_iter())
        .for_each(|(px, &sample)| px.copy_from_slice(&hsv_pixel_to_rgb(sample)));
    rgb
}

/// Overwrite the brightness plane with `value`, keeping hue and saturation.
pub fn replace_value(hsv: &mut HsvImage, value: &GrayImage) -> Result<()> {
    if hsv.dimensions() != value.dimensions() {
        return Err(ImgprocError::DimensionMismatch(format!(
            "HSV image is {:?} but value plane is {:?}",
            hsv.dimensions(),
            value.dimensions()
        )));
    }

    hsv.data
        .par_iter_mut()
        .zip(value.as_raw().par_iter())
        .for_each(|(sample, &v)| sample[2] = v as f32);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn luma_of_neutral_is_identity() {
        for v in [0u8, 1, 77, 128, 254, 255] {
            assert_eq!(luma(v, v, v), v);
        }
    }

    #[test]
    fn luma_rounds_weighted_sum() {
        // 0.299*100 + 0.587*150 + 0.114*200 = 140.75
        assert_eq!(luma(100, 150, 200), 141);
        assert_eq!(luma(255, 0, 0), 76);
        assert_eq!(luma(0, 255, 0), 150);
        assert_eq!(luma(0, 0, 255), 29);
    }

    #[test]
    fn primaries_have_expected_hue() {
        assert_eq!(rgb_pixel_to_hsv(255, 0, 0), [0.0, 1.0, 255.0]);
        assert_eq!(rgb_pixel_to_hsv(0, 255, 0), [120.0, 1.0, 255.0]);
        assert_eq!(rgb_pixel_to_hsv(0, 0, 255), [240.0, 1.0, 255.0]);
        assert_eq!(rgb_pixel_to_hsv(255, 0, 255)[0], 300.0);
        assert_eq!(rgb_pixel_to_hsv(0, 0, 0), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn hsv_round_trip_every_hue_step() {
        for r in (0..=255u32).step_by(15) {
            for g in (0..=255u32).step_by(17) {
                for b in (0..=255u32).step_by(51) {
                    let rgb = [r as u8, g as u8, b as u8];
                    let back = hsv_pixel_to_rgb(rgb_pixel_to_hsv(rgb[0], rgb[1], rgb[2]));
                    for c in 0..3 {
                        assert!(
                            (rgb[c] as i32 - back[c] as i32).abs() <= 1,
                            "{rgb:?} -> {back:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn replace_value_sets_max_channel() {
        let mut rgb = RgbImage::new(2, 1);
        rgb.put_pixel(0, 0, Rgb([200, 100, 50]));
        rgb.put_pixel(1, 0, Rgb([10, 10, 10]));
        let mut hsv = rgb_to_hsv(&rgb);

        let mut v = GrayImage::new(2, 1);
        v.put_pixel(0, 0, Luma([100]));
        v.put_pixel(1, 0, Luma([240]));
        replace_value(&mut hsv, &v).unwrap();

        let out = hsv_to_rgb(&hsv);
        assert_eq!(out.get_pixel(0, 0).0, [100, 50, 25]);
        assert_eq!(out.get_pixel(1, 0).0, [240, 240, 240]);
    }

    #[test]
    fn replace_value_rejects_mismatched_dimensions() {
        let mut hsv = HsvImage::new(4, 4);
        let v = GrayImage::new(4, 3);
        assert!(matches!(
            replace_value(&mut hsv, &v),
            Err(ImgprocError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn to_gray_passes_gray_through() {
        let mut g = GrayImage::new(3, 3);
        g.put_pixel(1, 1, Luma([42]));
        let out = to_gray(&DynamicImage::ImageLuma8(g.clone()));
        assert_eq!(out, g);
    }
}
