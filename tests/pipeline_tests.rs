use aci_colorize::imgproc::{convert_rgb_to_gray, luma, rgb_pixel_to_hsv};
use aci_colorize::{
    colorize, load_image, save_image, ColorizeConfig, ColorizeError, Colorization,
    HeadlessPresenter, Presenter,
};
use image::{imageops, ColorType, DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SHIFT: u32 = 10;

/// Colour scene of 4-pixel cells with random colours.
fn scene(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let cols = width.div_ceil(4);
    let rows = height.div_ceil(4);
    let colours: Vec<[u8; 3]> = (0..cols * rows).map(|_| rng.gen()).collect();
    RgbImage::from_fn(width, height, |x, y| Rgb(colours[((y / 4) * cols + x / 4) as usize]))
}

/// WATSON sees the scene from `(SHIFT, SHIFT)` in colour, the ACI sees it
/// from the origin in noisy gray, so WATSON `p` lands on ACI `p + SHIFT`.
fn synthetic_pair(
    size: u32,
    aci_size: (u32, u32),
    seed: u64,
) -> (DynamicImage, DynamicImage, RgbImage) {
    let world = scene(size + SHIFT, size + SHIFT, seed);
    let watson = imageops::crop_imm(&world, SHIFT, SHIFT, size, size).to_image();

    let mut rng = StdRng::seed_from_u64(seed ^ 0xACE);
    let (w, h) = aci_size;
    let aci = GrayImage::from_fn(w, h, |x, y| {
        let p = world.get_pixel(x, y);
        // Box-Muller, sigma 2.
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen();
        let noise = 2.0 * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        let v = luma(p[0], p[1], p[2]) as f64 + noise;
        Luma([v.round().clamp(0.0, 255.0) as u8])
    });

    (
        DynamicImage::ImageRgb8(watson),
        DynamicImage::ImageLuma8(aci),
        world,
    )
}

#[derive(Default)]
struct RecordingPresenter {
    shown: Vec<(String, (u32, u32))>,
}

impl Presenter for RecordingPresenter {
    fn present(&mut self, title: &str, image: &RgbImage) -> aci_colorize::Result<()> {
        self.shown.push((title.to_string(), image.dimensions()));
        Ok(())
    }
}

fn seeded() -> ColorizeConfig {
    ColorizeConfig::default().with_seed(2024)
}

#[test]
fn test_colorizes_shifted_noisy_view() {
    let (watson, aci, world) = synthetic_pair(512, (500, 480), 1);
    let aci_gray = aci.to_luma8();
    let mut presenter = RecordingPresenter::default();

    let outcome = colorize(&watson, &aci, &seeded(), &mut presenter).unwrap();
    assert!(outcome.match_count() > 30, "only {} matches", outcome.match_count());

    let Colorization::Colorized {
        image,
        homography,
        matches,
        inliers,
    } = outcome
    else {
        panic!("expected a colorized result");
    };

    assert_eq!(image.dimensions(), (500, 480));
    assert!(inliers >= 4 && inliers <= matches.len());
    assert_eq!(matches.num_inliers(), Some(inliers));
    assert!((homography[(0, 2)] - SHIFT as f64).abs() < 0.5, "{homography}");
    assert!((homography[(1, 2)] - SHIFT as f64).abs() < 0.5, "{homography}");

    // The brightest channel reproduces the ACI gray everywhere.
    for (out, gray) in image.pixels().zip(aci_gray.pixels()) {
        let v = out[0].max(out[1]).max(out[2]);
        assert!((v as i32 - gray[0] as i32).abs() <= 1);
    }

    // Cell interiors carry the scene hue.
    let mut checked = 0;
    let mut agreeing = 0;
    // Offsets 1 and 2 inside a 4-pixel cell keep bilinear taps in the cell.
    for y in (20..470).step_by(4).map(|y| y + 1) {
        for x in (20..490).step_by(4).map(|x| x + 2) {
            let truth = world.get_pixel(x, y);
            let [th, ts, _] = rgb_pixel_to_hsv(truth[0], truth[1], truth[2]);
            if ts < 0.5 || aci_gray.get_pixel(x, y)[0] < 60 {
                continue;
            }
            let out = image.get_pixel(x, y);
            let [oh, _, _] = rgb_pixel_to_hsv(out[0], out[1], out[2]);
            let diff = (th - oh).abs();
            checked += 1;
            if diff.min(360.0 - diff) < 6.0 {
                agreeing += 1;
            }
        }
    }
    assert!(checked > 500);
    assert!(agreeing * 100 >= checked * 95, "{agreeing}/{checked}");

    let titles: Vec<&str> = presenter.shown.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(titles, vec!["watson", "aci"]);
    assert_eq!(presenter.shown[0].1, (512, 512));
    assert_eq!(presenter.shown[1].1, (500, 480));
}

#[test]
fn test_featureless_inputs_pass_grayscale_through() {
    let watson = DynamicImage::ImageRgb8(RgbImage::from_pixel(128, 96, Rgb([200, 30, 60])));
    let aci_gray = GrayImage::from_pixel(120, 90, Luma([77]));
    let aci = DynamicImage::ImageLuma8(aci_gray.clone());
    let mut presenter = RecordingPresenter::default();

    let outcome = colorize(&watson, &aci, &seeded(), &mut presenter).unwrap();
    match &outcome {
        Colorization::InsufficientMatches { grayscale, matches } => {
            assert_eq!(grayscale, &aci_gray);
            assert!(matches.is_empty());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(outcome.match_count(), 0);
    assert_eq!(presenter.shown.len(), 2);
}

#[test]
fn test_colour_aci_passes_through_as_its_gray_conversion() {
    let watson = DynamicImage::ImageRgb8(RgbImage::from_pixel(96, 96, Rgb([10, 200, 90])));
    // A colour-encoded ACI, as produced by three-channel readers.
    let aci_rgb = RgbImage::from_fn(90, 70, |x, y| {
        Rgb([(x * 2) as u8, (y * 3) as u8, ((x + y) % 256) as u8])
    });
    let aci = DynamicImage::ImageRgb8(aci_rgb.clone());

    let outcome = colorize(&watson, &aci, &seeded(), &mut HeadlessPresenter).unwrap();
    match outcome {
        Colorization::InsufficientMatches { grayscale, .. } => {
            assert_eq!(grayscale, convert_rgb_to_gray(&aci_rgb));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn test_match_threshold_is_strict() {
    let (watson, aci, _) = synthetic_pair(256, (256, 256), 7);
    let outcome = colorize(&watson, &aci, &seeded(), &mut HeadlessPresenter).unwrap();
    let n = outcome.match_count();
    assert!(n > 4, "only {n} matches");

    let at_limit = seeded().with_min_matches(n);
    let outcome = colorize(&watson, &aci, &at_limit, &mut HeadlessPresenter).unwrap();
    assert!(!outcome.is_colorized());
    assert_eq!(outcome.match_count(), n);

    let below_limit = seeded().with_min_matches(n - 1);
    let outcome = colorize(&watson, &aci, &below_limit, &mut HeadlessPresenter).unwrap();
    assert!(outcome.is_colorized());
    assert_eq!(outcome.dimensions(), (256, 256));
}

#[test]
fn test_save_and_reload_outputs() {
    let dir = tempfile::tempdir().unwrap();

    let gray = GrayImage::from_pixel(6, 5, Luma([42]));
    let pass_through = Colorization::InsufficientMatches {
        grayscale: gray,
        matches: Default::default(),
    };
    let gray_path = dir.path().join("gray.png");
    save_image(&gray_path, &pass_through).unwrap();
    let reloaded = load_image(&gray_path).unwrap();
    assert_eq!(reloaded.color(), ColorType::L8);
    assert_eq!(reloaded.to_luma8().get_pixel(3, 3)[0], 42);

    let colour = Colorization::Colorized {
        image: RgbImage::from_pixel(4, 3, Rgb([1, 2, 3])),
        homography: nalgebra::Matrix3::identity(),
        matches: Default::default(),
        inliers: 0,
    };
    let colour_path = dir.path().join("colour.png");
    save_image(&colour_path, &colour).unwrap();
    let reloaded = load_image(&colour_path).unwrap();
    assert_eq!(reloaded.color(), ColorType::Rgb8);
    assert_eq!(reloaded.to_rgb8().get_pixel(0, 0), &Rgb([1, 2, 3]));
}

#[test]
fn test_missing_input_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.png");
    match load_image(&missing) {
        Err(ColorizeError::Load { path, .. }) => assert_eq!(path, missing),
        other => panic!("unexpected {other:?}"),
    }

    let garbage = dir.path().join("garbage.png");
    std::fs::write(&garbage, b"not an image").unwrap();
    assert!(matches!(load_image(&garbage), Err(ColorizeError::Load { .. })));
}

#[test]
fn test_unwritable_output_is_a_save_error() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = Colorization::InsufficientMatches {
        grayscale: GrayImage::new(2, 2),
        matches: Default::default(),
    };
    let path = dir.path().join("missing-dir").join("out.png");
    assert!(matches!(
        save_image(&path, &outcome),
        Err(ColorizeError::Save { .. })
    ));
}
