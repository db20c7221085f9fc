//! Synthetic on-disk datasets for integration tests.
#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const IMAGE_WIDTH: u32 = 20;
pub const IMAGE_HEIGHT: u32 = 24;

pub const BOX_WIDTH: u32 = 10;
pub const BOX_HEIGHT: u32 = 12;
/// Pixels outside the face box.
pub const BACKGROUND: u8 = 255;

/// Face box of image `sequence` as `(left, top)`; it moves from image to image.
pub fn box_origin(sequence: usize) -> (u32, u32) {
    (1 + (sequence % 5) as u32, 2 + (sequence % 4) as u32)
}

/// Annotation column for image `sequence`: four corners, BL TL TR BR.
pub fn face_box(sequence: usize) -> [f64; 8] {
    let (left, top) = box_origin(sequence);
    let (l, t) = (left as f64, top as f64);
    let (r, b) = ((left + BOX_WIDTH) as f64, (top + BOX_HEIGHT) as f64);
    [l, b, l, t, r, t, r, b]
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn element(data_type: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(data_type.to_le_bytes());
    out.extend((payload.len() as u32).to_le_bytes());
    out.extend(payload);
    while out.len() % 8 != 0 {
        out.push(0);
    }
    out
}

/// Encode a level 5 MAT file holding one double matrix, column-major.
pub fn mat5_bytes(name: &str, rows: usize, cols: usize, column_major: &[f64]) -> Vec<u8> {
    let mut file = b"MATLAB 5.0 MAT-file, Platform: test, Created by: faceset tests".to_vec();
    file.resize(116, b' ');
    file.extend([0u8; 8]);
    file.extend(0x0100u16.to_le_bytes());
    file.extend(b"IM");

    let mut flags = 6u32.to_le_bytes().to_vec();
    flags.extend(0u32.to_le_bytes());
    let mut dims = (rows as i32).to_le_bytes().to_vec();
    dims.extend((cols as i32).to_le_bytes());
    let values: Vec<u8> = column_major.iter().flat_map(|v| v.to_le_bytes()).collect();

    let mut body = element(6, &flags);
    body.extend(element(5, &dims));
    body.extend(element(1, name.as_bytes()));
    body.extend(element(9, &values));
    file.extend(element(14, &body));
    file
}

/// `8 x n` box matrix, column `k - 1` holding the box of image `k`.
pub fn box_matrix(n: usize) -> Vec<f64> {
    (1..=n).flat_map(face_box).collect()
}

/// A dataset laid out as `<root>/<label>/image_NNNN.png` plus `ImageData.mat`.
///
/// Images are numbered from 1 in sorted path order. Inside its own face box
/// image `k` has intensity `k`; everything else is [`BACKGROUND`]. A face
/// cropped with the right row is flat `k`, while any other row's box pulls in
/// background.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub images: Vec<(PathBuf, String, u8)>,
}

impl Fixture {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Label that image intensity `k` belongs to.
    pub fn label_of(&self, intensity: u8) -> &str {
        self.images
            .iter()
            .find(|(_, _, k)| *k == intensity)
            .map(|(_, label, _)| label.as_str())
            .expect("unknown intensity")
    }

    pub fn path_of(&self, label: &str, sequence: usize) -> PathBuf {
        self.root()
            .join(label)
            .join(format!("image_{:04}.png", sequence))
    }
}

pub fn build_images(counts: &[(&str, usize)]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut labels: Vec<_> = counts.to_vec();
    labels.sort_by_key(|(label, _)| label.to_string());

    let mut images = Vec::new();
    let mut sequence = 1;
    for (label, n) in labels {
        let folder = dir.path().join(label);
        fs::create_dir_all(&folder).unwrap();
        for _ in 0..n {
            let intensity = sequence as u8;
            let path = folder.join(format!("image_{:04}.png", sequence));
            let (left, top) = box_origin(sequence);
            image::RgbImage::from_fn(IMAGE_WIDTH, IMAGE_HEIGHT, |x, y| {
                let inside = (left..left + BOX_WIDTH).contains(&x)
                    && (top..top + BOX_HEIGHT).contains(&y);
                let v = if inside { intensity } else { BACKGROUND };
                image::Rgb([v, v, v])
            })
            .save(&path)
            .unwrap();
            images.push((path, label.to_string(), intensity));
            sequence += 1;
        }
    }

    Fixture { dir, images }
}

pub fn write_annotations(root: &Path, file_name: &str, variable: &str, rows: usize) {
    let bytes = mat5_bytes(variable, 8, rows, &box_matrix(rows));
    fs::write(root.join(file_name), bytes).unwrap();
}

pub fn write_annotations_bz2(root: &Path, file_name: &str, variable: &str, rows: usize) {
    let bytes = mat5_bytes(variable, 8, rows, &box_matrix(rows));
    let file = fs::File::create(root.join(file_name)).unwrap();
    let mut encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
    encoder.write_all(&bytes).unwrap();
    encoder.finish().unwrap();
}

/// Images plus a matching `ImageData.mat` / `SubDir_Data`.
pub fn build_dataset(counts: &[(&str, usize)]) -> Fixture {
    let fixture = build_images(counts);
    let total = fixture.images.len();
    write_annotations(fixture.root(), "ImageData.mat", "SubDir_Data", total);
    fixture
}
