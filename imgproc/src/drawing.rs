//! Overlay rendering for inspecting detector output.

use crate::color::convert_gray_to_rgb;
use cv_core::KeyPoint;
use image::{GrayImage, Rgb, RgbImage};

fn put_checked(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u64) < img.width() as u64 && (y as u64) < img.height() as u64 {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Midpoint circle outline, clipped to the image.
pub fn draw_circle(img: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
    if radius <= 0 {
        put_checked(img, cx, cy, color);
        return;
    }
    let mut x = radius;
    let mut y = 0i64;
    let mut err = 1 - radius;
    while x >= y {
        for (dx, dy) in [
            (x, y),
            (y, x),
            (-y, x),
            (-x, y),
            (-x, -y),
            (-y, -x),
            (y, -x),
            (x, -y),
        ] {
            put_checked(img, cx + dx, cy + dy, color);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

/// Bresenham line segment, clipped to the image.
pub fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_checked(img, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Render keypoints over a gray image: a circle of the keypoint's diameter
/// and, when known, a radius showing its orientation.
pub fn draw_keypoints(image: &GrayImage, keypoints: &[KeyPoint], color: Rgb<u8>) -> RgbImage {
    let mut canvas = convert_gray_to_rgb(image);

    for kp in keypoints {
        let (x, y) = (kp.x, kp.y);
        let radius = (kp.size / 2.0).max(3.0);
        let cx = x.round() as i64;
        let cy = y.round() as i64;
        draw_circle(&mut canvas, cx, cy, radius.round() as i64, color);

        if kp.has_angle() {
            let rad = kp.angle.to_radians();
            let tip = (
                (x + radius * rad.cos()).round() as i64,
                (y + radius * rad.sin()).round() as i64,
            );
            draw_line(&mut canvas, (cx, cy), tip, color);
        }
    }

    canvas
}
