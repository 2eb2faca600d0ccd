use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use pixbatch_core::config::TransformConfig;
use pixbatch_core::Config;
use std::path::{Path, PathBuf};

/// Deterministic test image with some structure for the filters to bite on.
pub fn write_image(path: &Path, width: u32, height: u32, seed: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 3 + seed) % 256) as u8,
            ((y * 5 + seed * 7) % 256) as u8,
            ((x ^ y) % 256) as u8,
        ])
    });
    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
    DynamicImage::ImageRgb8(img)
        .save_with_format(path, format)
        .unwrap();
}

/// Create `input/` holding `names` as small images and return
/// `(input, output)`.
pub fn fixture_dirs(root: &Path, names: &[&str]) -> (PathBuf, PathBuf) {
    let input = root.join("input");
    std::fs::create_dir_all(&input).unwrap();
    for (i, name) in names.iter().enumerate() {
        write_image(&input.join(name), 48, 36, i as u32);
    }
    (input, root.join("output"))
}

/// Config with a small resize target so tests stay fast.
pub fn small_config(workers: usize) -> Config {
    let mut config = Config::default();
    config.transform = TransformConfig {
        resize: (24, 18),
        ..TransformConfig::default()
    };
    config.processing.parallel_workers = Some(workers);
    config.pipeline.buffer_size = 4;
    config
}

/// Snapshot of every file under `dir` as `(name, bytes)`, sorted by name.
pub fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            (
                entry.file_name().to_string_lossy().into_owned(),
                std::fs::read(entry.path()).unwrap(),
            )
        })
        .collect();
    files.sort();
    files
}
