use image::{ColorType, GrayImage, Luma, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::process::{Command, Output};

const BIN: &str = env!("CARGO_BIN_EXE_aci-colorize");

fn run_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(BIN)
        .current_dir(dir)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

/// Writes `watson.png` (colour crop at (8, 8)) and `aci.png` (gray crop at
/// the origin) of the same 4-pixel random-cell scene.
fn write_scene(dir: &Path, size: u32) {
    let mut rng = StdRng::seed_from_u64(31);
    let world_size = size + 8;
    let cols = world_size.div_ceil(4);
    let colours: Vec<[u8; 3]> = (0..cols * cols).map(|_| rng.gen()).collect();
    let world = RgbImage::from_fn(world_size, world_size, |x, y| {
        Rgb(colours[((y / 4) * cols + x / 4) as usize])
    });

    let watson = image::imageops::crop_imm(&world, 8, 8, size, size).to_image();
    let aci = GrayImage::from_fn(size, size, |x, y| {
        let p = world.get_pixel(x, y);
        Luma([aci_colorize::imgproc::luma(p[0], p[1], p[2])])
    });
    watson.save(dir.join("watson.png")).unwrap();
    aci.save(dir.join("aci.png")).unwrap();
}

fn reported_matches(stdout: &[u8]) -> usize {
    let text = String::from_utf8_lossy(stdout);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2, "stdout: {text}");
    assert_eq!(lines[0], "Number of Matches:");
    lines[1].trim().parse().unwrap()
}

#[test]
fn test_cli_writes_fixed_output_and_reports_matches() {
    let dir = tempfile::tempdir().unwrap();
    write_scene(dir.path(), 256);

    let out = run_in(dir.path(), &["--no-display", "--seed", "7"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(reported_matches(&out.stdout) > 30);

    let written = image::open(dir.path().join("colorized_aci.png")).unwrap();
    assert_eq!(written.color(), ColorType::Rgb8);
    assert_eq!((written.width(), written.height()), (256, 256));
}

#[test]
fn test_cli_passes_featureless_input_through() {
    let dir = tempfile::tempdir().unwrap();
    RgbImage::from_pixel(64, 64, Rgb([90, 40, 10]))
        .save(dir.path().join("watson.png"))
        .unwrap();
    let aci = GrayImage::from_pixel(50, 40, Luma([123]));
    aci.save(dir.path().join("aci.png")).unwrap();

    let out = run_in(dir.path(), &["--no-display"]);
    assert!(out.status.success());
    assert_eq!(reported_matches(&out.stdout), 0);

    let written = image::open(dir.path().join("colorized_aci.png")).unwrap();
    assert_eq!(written.color(), ColorType::L8);
    assert_eq!(written.to_luma8(), aci);
}

#[test]
fn test_cli_fails_on_missing_input() {
    let dir = tempfile::tempdir().unwrap();

    let out = run_in(dir.path(), &["--no-display"]);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("cannot load image aci.png"), "stderr: {stderr}");
    assert!(!dir.path().join("colorized_aci.png").exists());
}

#[test]
fn test_cli_reads_paths_from_flags() {
    let dir = tempfile::tempdir().unwrap();
    write_scene(dir.path(), 128);
    std::fs::rename(dir.path().join("aci.png"), dir.path().join("frame.png")).unwrap();

    let out = run_in(dir.path(), &["--no-display", "--aci", "frame.png"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    reported_matches(&out.stdout);
    assert!(dir.path().join("colorized_aci.png").exists());
}
