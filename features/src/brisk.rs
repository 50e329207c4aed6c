//! BRISK (Binary Robust Invariant Scalable Keypoints)
//!
//! Keypoints are FAST maxima in a scale space of octaves and intra-octaves,
//! refined to subpixel position and continuous scale. The descriptor is a
//! 512-bit string of intensity comparisons between smoothed samples of a
//! concentric-ring pattern, rotated to the keypoint's dominant gradient.

use crate::descriptor::{DescriptorExtractor, FeatureDetector};
use crate::fast::{fast_score_map, is_local_max, FAST_BORDER};
use cv_core::{Descriptor, Descriptors, KeyPoint, KeyPoints};
use cv_imgproc::{downsample_half, downsample_two_thirds};
use image::GrayImage;
use rayon::prelude::*;
use std::f64::consts::PI;
use tracing::debug;

/// Keypoint diameter at unit scale.
pub const BASIC_SIZE: f64 = 12.0;
pub const DESCRIPTOR_BITS: usize = 512;
pub const DESCRIPTOR_BYTES: usize = DESCRIPTOR_BITS / 8;

const RING_RADII: [f64; 5] = [0.0, 2.9, 4.9, 7.4, 10.8];
const RING_POINTS: [usize; 5] = [1, 10, 14, 15, 20];
const RING_FACTOR: f64 = 0.85;
const SIGMA_FACTOR: f64 = 1.3;
/// Pairs longer than this (unit pattern, before `RING_FACTOR`) vote for orientation.
const LONG_PAIR_MIN: f64 = 8.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BriskParams {
    /// FAST threshold applied in every layer.
    pub threshold: u8,
    /// Number of octaves; the scale space holds `2 * octaves` layers
    /// (a single full-resolution layer when zero).
    pub octaves: usize,
    /// Multiplier on the sampling pattern radii.
    pub pattern_scale: f64,
    /// Keep only the strongest responses.
    pub max_keypoints: Option<usize>,
}

impl Default for BriskParams {
    fn default() -> Self {
        Self {
            threshold: 30,
            octaves: 3,
            pattern_scale: 1.0,
            max_keypoints: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PatternPoint {
    x: f64,
    y: f64,
    sigma: f64,
}

#[derive(Debug, Clone, Copy)]
struct LongPair {
    i: usize,
    j: usize,
    /// Pair offset divided by its squared length.
    wx: f64,
    wy: f64,
}

#[derive(Debug, Clone)]
struct SamplingPattern {
    points: Vec<PatternPoint>,
    short_pairs: Vec<(usize, usize)>,
    long_pairs: Vec<LongPair>,
    /// Farthest reach of any smoothing box, in unit-scale pixels.
    extent: f64,
}

impl SamplingPattern {
    fn new(pattern_scale: f64) -> Self {
        let f = RING_FACTOR * pattern_scale;
        let mut points = Vec::new();
        for (&radius, &n) in RING_RADII.iter().zip(RING_POINTS.iter()) {
            let r = radius * f;
            let sigma = if n == 1 {
                SIGMA_FACTOR * 0.5 * pattern_scale
            } else {
                SIGMA_FACTOR * r * (PI / n as f64).sin()
            };
            for k in 0..n {
                let theta = 2.0 * PI * k as f64 / n as f64;
                points.push(PatternPoint {
                    x: r * theta.cos(),
                    y: r * theta.sin(),
                    sigma,
                });
            }
        }

        let mut pairs = Vec::with_capacity(points.len() * (points.len() - 1) / 2);
        for i in 0..points.len() {
            for j in i + 1..points.len() {
                let dx = points[j].x - points[i].x;
                let dy = points[j].y - points[i].y;
                pairs.push((i, j, dx, dy, (dx * dx + dy * dy).sqrt()));
            }
        }

        let long_min = LONG_PAIR_MIN * f;
        let long_pairs = pairs
            .iter()
            .filter(|p| p.4 > long_min)
            .map(|&(i, j, dx, dy, d)| LongPair {
                i,
                j,
                wx: dx / (d * d),
                wy: dy / (d * d),
            })
            .collect();

        pairs.sort_by(|a, b| a.4.total_cmp(&b.4).then((a.0, a.1).cmp(&(b.0, b.1))));
        let short_pairs = pairs
            .iter()
            .take(DESCRIPTOR_BITS)
            .map(|p| (p.0, p.1))
            .collect();

        let extent = points
            .iter()
            .map(|p| (p.x * p.x + p.y * p.y).sqrt() + p.sigma)
            .fold(0.0, f64::max);

        Self {
            points,
            short_pairs,
            long_pairs,
            extent,
        }
    }
}

/// Summed-area table over pixel squares `[x, x+1) x [y, y+1)`.
///
/// Bilinear lookups into the table integrate the piecewise-constant image
/// exactly, so box means work at fractional centres and sizes.
struct IntegralImage {
    stride: usize,
    width: f64,
    height: f64,
    data: Vec<f64>,
}

impl IntegralImage {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut data = vec![0.0; stride * (h + 1)];
        let raw = image.as_raw();
        for y in 0..h {
            let mut row_sum = 0.0;
            for x in 0..w {
                row_sum += raw[y * w + x] as f64;
                data[(y + 1) * stride + x + 1] = data[y * stride + x + 1] + row_sum;
            }
        }
        Self {
            stride,
            width: w as f64,
            height: h as f64,
            data,
        }
    }

    fn at(&self, x: f64, y: f64) -> f64 {
        let x = x.clamp(0.0, self.width);
        let y = y.clamp(0.0, self.height);
        let x0 = (x.floor() as usize).min(self.stride - 2);
        let y0 = (y.floor() as usize).min(self.data.len() / self.stride - 2);
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;
        let v = |xx: usize, yy: usize| self.data[yy * self.stride + xx];
        let top = v(x0, y0) * (1.0 - fx) + v(x0 + 1, y0) * fx;
        let bottom = v(x0, y0 + 1) * (1.0 - fx) + v(x0 + 1, y0 + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Mean intensity of the square of half-size `half` centred on `(cx, cy)`
    /// in continuous coordinates.
    fn box_mean(&self, cx: f64, cy: f64, half: f64) -> f64 {
        let (x0, x1) = (cx - half, cx + half);
        let (y0, y1) = (cy - half, cy + half);
        let sum = self.at(x1, y1) - self.at(x0, y1) - self.at(x1, y0) + self.at(x0, y0);
        sum / (4.0 * half * half)
    }
}

struct Layer {
    image: GrayImage,
    scale: f64,
    offset: f64,
    scores: Vec<u8>,
}

impl Layer {
    fn new(image: GrayImage, scale: f64, threshold: u8) -> Self {
        let scores = fast_score_map(&image, threshold);
        Self {
            image,
            scale,
            offset: 0.5 * scale - 0.5,
            scores,
        }
    }

    fn width(&self) -> usize {
        self.image.width() as usize
    }

    fn height(&self) -> usize {
        self.image.height() as usize
    }

    fn to_original(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.offset, y * self.scale + self.offset)
    }

    /// Strongest score in the 3x3 window around an original-image position.
    fn max_score_near(&self, x: f64, y: f64) -> u8 {
        let lx = ((x - self.offset) / self.scale).round() as i64;
        let ly = ((y - self.offset) / self.scale).round() as i64;
        let (w, h) = (self.width() as i64, self.height() as i64);
        let mut best = 0;
        for yy in (ly - 1).max(0)..=(ly + 1).min(h - 1) {
            for xx in (lx - 1).max(0)..=(lx + 1).min(w - 1) {
                best = best.max(self.scores[(yy * w + xx) as usize]);
            }
        }
        best
    }

    /// Quadratic fit of the score surface around a local maximum.
    fn subpixel_offset(&self, x: usize, y: usize) -> (f64, f64) {
        let w = self.width();
        let s = |dx: isize, dy: isize| {
            self.scores[(y as isize + dy) as usize * w + (x as isize + dx) as usize] as f64
        };
        let c = s(0, 0);
        let gx = 0.5 * (s(1, 0) - s(-1, 0));
        let gy = 0.5 * (s(0, 1) - s(0, -1));
        let dxx = s(1, 0) - 2.0 * c + s(-1, 0);
        let dyy = s(0, 1) - 2.0 * c + s(0, -1);
        let dxy = 0.25 * (s(1, 1) - s(1, -1) - s(-1, 1) + s(-1, -1));

        let det = dxx * dyy - dxy * dxy;
        if det.abs() < 1e-9 {
            return (0.0, 0.0);
        }
        let ox = -(dyy * gx - dxy * gy) / det;
        let oy = -(dxx * gy - dxy * gx) / det;
        if ox.abs() > 1.0 || oy.abs() > 1.0 || !ox.is_finite() || !oy.is_finite() {
            (0.0, 0.0)
        } else {
            (ox, oy)
        }
    }
}

fn too_small(image: &GrayImage) -> bool {
    let min = 2 * FAST_BORDER + 3;
    image.width() < min || image.height() < min
}

fn build_scale_space(image: &GrayImage, octaves: usize, threshold: u8) -> Vec<Layer> {
    let mut layers = vec![Layer::new(image.clone(), 1.0, threshold)];
    if octaves == 0 {
        return layers;
    }

    let mut intra = downsample_two_thirds(image);
    if too_small(&intra) {
        return layers;
    }
    let mut octave = image.clone();
    layers.push(Layer::new(intra.clone(), 1.5, threshold));

    for i in 1..octaves {
        octave = downsample_half(&octave);
        if too_small(&octave) {
            break;
        }
        let scale = (1u64 << i) as f64;
        layers.push(Layer::new(octave.clone(), scale, threshold));

        intra = downsample_half(&intra);
        if too_small(&intra) {
            break;
        }
        layers.push(Layer::new(intra.clone(), 1.5 * scale, threshold));
    }
    layers
}

/// Vertex of the parabola through three (log-scale, score) samples,
/// clamped to the bracketing interval.
fn refine_scale(points: [(f64, f64); 3]) -> Option<f64> {
    let [(x0, y0), (x1, y1), (x2, y2)] = points;
    let denom = (x0 - x1) * (x0 - x2) * (x1 - x2);
    if denom.abs() < 1e-12 {
        return None;
    }
    let a = (x2 * (y1 - y0) + x1 * (y0 - y2) + x0 * (y2 - y1)) / denom;
    let b = (x2 * x2 * (y0 - y1) + x1 * x1 * (y2 - y0) + x0 * x0 * (y1 - y2)) / denom;
    if a >= 0.0 {
        return None;
    }
    Some((-b / (2.0 * a)).clamp(x0, x2))
}

fn detect_in_layer(layers: &[Layer], index: usize) -> Vec<KeyPoint> {
    let layer = &layers[index];
    let below = index.checked_sub(1).map(|i| &layers[i]);
    let above = layers.get(index + 1);
    let (w, h) = (layer.width(), layer.height());
    let b = FAST_BORDER as usize;

    let mut keypoints = Vec::new();
    if w <= 2 * b || h <= 2 * b {
        return keypoints;
    }

    for y in b..h - b {
        for x in b..w - b {
            if !is_local_max(&layer.scores, w, x, y) {
                continue;
            }
            let score = layer.scores[y * w + x];
            let (cx, cy) = layer.to_original(x as f64, y as f64);

            // Ties go to the finer layer.
            let score_below = below.map(|l| l.max_score_near(cx, cy));
            let score_above = above.map(|l| l.max_score_near(cx, cy));
            if score_below.is_some_and(|s| s > score) || score_above.is_some_and(|s| s >= score) {
                continue;
            }

            let scale = match (below, score_below, above, score_above) {
                (Some(lb), Some(sb), Some(la), Some(sa)) => refine_scale([
                    (lb.scale.log2(), sb as f64),
                    (layer.scale.log2(), score as f64),
                    (la.scale.log2(), sa as f64),
                ])
                .map_or(layer.scale, f64::exp2),
                _ => layer.scale,
            };

            let (ox, oy) = layer.subpixel_offset(x, y);
            let (px, py) = layer.to_original(x as f64 + ox, y as f64 + oy);
            keypoints.push(
                KeyPoint::new(px, py)
                    .with_size(BASIC_SIZE * scale)
                    .with_response(score as f64)
                    .with_octave(index as i32),
            );
        }
    }
    keypoints
}

/// BRISK detector and descriptor extractor.
#[derive(Debug, Clone)]
pub struct Brisk {
    params: BriskParams,
    pattern: SamplingPattern,
}

impl Default for Brisk {
    fn default() -> Self {
        Self::new(BriskParams::default())
    }
}

impl Brisk {
    pub fn new(params: BriskParams) -> Self {
        Self {
            params,
            pattern: SamplingPattern::new(params.pattern_scale),
        }
    }

    pub fn params(&self) -> &BriskParams {
        &self.params
    }

    pub fn with_threshold(self, threshold: u8) -> Self {
        Self::new(BriskParams {
            threshold,
            ..self.params
        })
    }

    pub fn with_octaves(self, octaves: usize) -> Self {
        Self::new(BriskParams {
            octaves,
            ..self.params
        })
    }

    pub fn with_pattern_scale(self, pattern_scale: f64) -> Self {
        Self::new(BriskParams {
            pattern_scale,
            ..self.params
        })
    }

    pub fn with_max_keypoints(self, max_keypoints: usize) -> Self {
        Self::new(BriskParams {
            max_keypoints: Some(max_keypoints),
            ..self.params
        })
    }

    pub fn descriptor_size(&self) -> usize {
        DESCRIPTOR_BYTES
    }

    pub fn detect_and_compute(&self, image: &GrayImage) -> (KeyPoints, Descriptors) {
        crate::descriptor::detect_and_compute(self, image)
    }

    fn sample(
        &self,
        integral: &IntegralImage,
        kp: &KeyPoint,
        scale: f64,
        (cos, sin): (f64, f64),
        out: &mut [f64],
    ) {
        for (value, p) in out.iter_mut().zip(&self.pattern.points) {
            let x = (p.x * cos - p.y * sin) * scale;
            let y = (p.x * sin + p.y * cos) * scale;
            let half = (p.sigma * scale).max(0.5);
            *value = integral.box_mean(kp.x + x + 0.5, kp.y + y + 0.5, half);
        }
    }

    fn describe(&self, integral: &IntegralImage, kp: &KeyPoint) -> Option<Descriptor> {
        let scale = kp.size / BASIC_SIZE;
        let margin = self.pattern.extent * scale + 1.0;
        if kp.x < margin
            || kp.y < margin
            || kp.x + margin > integral.width
            || kp.y + margin > integral.height
        {
            return None;
        }

        let mut values = vec![0.0; self.pattern.points.len()];
        self.sample(integral, kp, scale, (1.0, 0.0), &mut values);

        let (mut gx, mut gy) = (0.0, 0.0);
        for pair in &self.pattern.long_pairs {
            let diff = values[pair.j] - values[pair.i];
            gx += diff * pair.wx;
            gy += diff * pair.wy;
        }
        let theta = gy.atan2(gx);

        self.sample(integral, kp, scale, (theta.cos(), theta.sin()), &mut values);

        let mut data = vec![0u8; DESCRIPTOR_BYTES];
        for (bit, &(i, j)) in self.pattern.short_pairs.iter().enumerate() {
            if values[i] > values[j] {
                data[bit / 8] |= 1 << (bit % 8);
            }
        }

        let oriented = kp.with_angle(theta.to_degrees().rem_euclid(360.0));
        Some(Descriptor::new(data, oriented))
    }
}

impl FeatureDetector for Brisk {
    fn detect(&self, image: &GrayImage) -> KeyPoints {
        let layers = build_scale_space(image, self.params.octaves, self.params.threshold);

        let per_layer: Vec<Vec<KeyPoint>> = (0..layers.len())
            .into_par_iter()
            .map(|i| detect_in_layer(&layers, i))
            .collect();

        for (i, kps) in per_layer.iter().enumerate() {
            debug!(layer = i, scale = layers[i].scale, count = kps.len(), "BRISK layer maxima");
        }

        let mut keypoints: Vec<KeyPoint> = per_layer.into_iter().flatten().collect();
        keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
        if let Some(max) = self.params.max_keypoints {
            keypoints.truncate(max);
        }
        KeyPoints::from(keypoints)
    }
}

impl DescriptorExtractor for Brisk {
    fn extract(&self, image: &GrayImage, keypoints: &KeyPoints) -> Descriptors {
        let integral = IntegralImage::new(image);
        let descriptors: Vec<Descriptor> = keypoints
            .keypoints
            .par_iter()
            .filter_map(|kp| self.describe(&integral, kp))
            .collect();

        debug!(
            kept = descriptors.len(),
            dropped = keypoints.len() - descriptors.len(),
            "BRISK descriptors"
        );
        Descriptors::from(descriptors)
    }
}
