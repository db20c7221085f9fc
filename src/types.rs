use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::annotations::BoxColumns;
use crate::error::{Error, Result};
use crate::gray::{GrayImage, ImageAccess};

/// An image file paired with the annotation row it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub path: PathBuf,
    /// Zero-based row in the annotation table.
    pub sequence_index: usize,
}

/// One annotation row: the four corners of a face box as
/// `(xBL, yBL, xTL, yTL, xTR, yTR, xBR, yBR)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRow(pub [i64; 8]);

impl AnnotationRow {
    pub const fn new(values: [i64; 8]) -> Self {
        Self(values)
    }

    pub fn bottom_left(&self) -> (i64, i64) {
        (self.0[0], self.0[1])
    }

    pub fn top_left(&self) -> (i64, i64) {
        (self.0[2], self.0[3])
    }

    pub fn top_right(&self) -> (i64, i64) {
        (self.0[4], self.0[5])
    }

    pub fn bottom_right(&self) -> (i64, i64) {
        (self.0[6], self.0[7])
    }

    /// Read the crop rectangle out of this row using a fixed column mapping.
    ///
    /// Coordinates are taken verbatim from the mapped columns; they are never
    /// re-sorted or recomputed from the other corners.
    pub fn crop_rect(&self, columns: &BoxColumns) -> CropRect {
        CropRect {
            left: self.0[columns.left],
            top: self.0[columns.top],
            right: self.0[columns.right],
            bottom: self.0[columns.bottom],
        }
    }
}

/// Pixel rectangle `[top, bottom) x [left, right)`, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl CropRect {
    pub const fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[x {}..{}, y {}..{}]",
            self.left, self.right, self.top, self.bottom
        )
    }
}

/// Grayscale face pixels, either as a 2D grid or linearized row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pixels {
    Grid(GrayImage),
    Flat(Vec<u8>),
}

impl Pixels {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Pixels::Grid(image) => image.as_raw(),
            Pixels::Flat(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// `(width, height)` for grids, `None` once flattened.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Pixels::Grid(image) => Some((image.width(), image.height())),
            Pixels::Flat(_) => None,
        }
    }

    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.as_slice().iter().map(|&p| p as f32).collect()
    }
}

/// An extracted face with its class label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub pixels: Pixels,
    pub label: String,
}

impl Sample {
    pub fn new(pixels: Pixels, label: impl Into<String>) -> Self {
        Self {
            pixels,
            label: label.into(),
        }
    }
}

/// Which side of the split a [`SampleSet`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitName {
    Training,
    Testing,
}

impl SplitName {
    pub fn as_str(self) -> &'static str {
        match self {
            SplitName::Training => "training",
            SplitName::Testing => "testing",
        }
    }
}

impl fmt::Display for SplitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One partition of the dataset: pixel buffers and labels, index-aligned.
///
/// `data()[i]` and `target()[i]` always describe the same face. The only way
/// to build a set is from whole [`Sample`]s, so the two sequences can never
/// drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSet {
    name: SplitName,
    data: Vec<Pixels>,
    target: Vec<String>,
}

impl SampleSet {
    pub fn from_samples(name: SplitName, samples: Vec<Sample>) -> Self {
        let (data, target) = samples
            .into_iter()
            .map(|sample| (sample.pixels, sample.label))
            .unzip();
        Self { name, data, target }
    }

    pub fn name(&self) -> SplitName {
        self.name
    }

    pub fn data(&self) -> &[Pixels] {
        &self.data
    }

    pub fn target(&self) -> &[String] {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Pixels, &str)> {
        self.data
            .iter()
            .zip(self.target.iter().map(String::as_str))
    }

    /// Number of samples per label, in label order.
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.target {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Stack every sample into an `n x d` matrix, one row per face.
    pub fn feature_matrix(&self) -> Result<Array2<f32>> {
        let width = self.data.first().map_or(0, Pixels::len);
        let mut values = Vec::with_capacity(self.len() * width);
        for (i, pixels) in self.data.iter().enumerate() {
            if pixels.len() != width {
                return Err(Error::InvalidSampleSet(format!(
                    "Sample {} has {} values, expected {}",
                    i,
                    pixels.len(),
                    width
                )));
            }
            values.extend(pixels.as_slice().iter().map(|&p| p as f32));
        }
        Array2::from_shape_vec((self.len(), width), values)
            .map_err(|e| Error::InvalidSampleSet(e.to_string()))
    }

    /// Load a sample set from a binary file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let set: Self = bincode::deserialize(&bytes)?;
        Ok(set)
    }

    /// Save the sample set to a binary file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let bytes = bincode::serialize(self)?;
        writer.write_all(&bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(values: &[u8], label: &str) -> Sample {
        Sample::new(Pixels::Flat(values.to_vec()), label)
    }

    #[test]
    fn crop_rect_uses_mapped_columns() {
        // Corners deliberately out of order to make sure nothing is sorted.
        let row = AnnotationRow::new([1, 90, 40, 10, 80, 12, 70, 95]);
        let rect = row.crop_rect(&BoxColumns::default());
        assert_eq!(rect, CropRect::new(40, 10, 70, 95));

        assert_eq!(row.top_left(), (40, 10));
        assert_eq!(row.bottom_right(), (70, 95));
        assert_eq!(row.bottom_left(), (1, 90));
        assert_eq!(row.top_right(), (80, 12));
    }

    #[test]
    fn sample_set_keeps_alignment() {
        let set = SampleSet::from_samples(
            SplitName::Training,
            vec![flat(&[1, 2], "a"), flat(&[3, 4], "b"), flat(&[5, 6], "a")],
        );

        assert_eq!(set.len(), 3);
        assert_eq!(set.name().to_string(), "training");
        assert_eq!(set.target(), ["a", "b", "a"]);
        assert_eq!(set.data()[1].as_slice(), &[3, 4]);

        let pairs: Vec<_> = set.iter().map(|(p, l)| (p.as_slice()[0], l)).collect();
        assert_eq!(pairs, vec![(1, "a"), (3, "b"), (5, "a")]);

        let counts = set.class_counts();
        assert_eq!(counts["a"], 2);
        assert_eq!(counts["b"], 1);
    }

    #[test]
    fn grid_pixels_report_dimensions() {
        let grid = Pixels::Grid(GrayImage::from_fn(3, 2, |x, y| (x + y) as u8));
        assert_eq!(grid.dimensions(), Some((3, 2)));
        assert_eq!(grid.len(), 6);
        assert_eq!(Pixels::Flat(vec![0; 6]).dimensions(), None);
    }

    #[test]
    fn feature_matrix_shape() {
        let set = SampleSet::from_samples(
            SplitName::Testing,
            vec![flat(&[0, 10, 20], "a"), flat(&[30, 40, 50], "b")],
        );
        let matrix = set.feature_matrix().unwrap();
        assert_eq!(matrix.dim(), (2, 3));
        assert_eq!(matrix[[1, 2]], 50.0);

        let grid = GrayImage::new(vec![1, 2, 3, 4], 2, 2);
        let set = SampleSet::from_samples(
            SplitName::Testing,
            vec![Sample::new(Pixels::Grid(grid), "a")],
        );
        assert_eq!(set.feature_matrix().unwrap().dim(), (1, 4));
    }

    #[test]
    fn feature_matrix_rejects_ragged_rows() {
        let set = SampleSet::from_samples(
            SplitName::Testing,
            vec![flat(&[0, 1, 2], "a"), flat(&[3, 4], "b")],
        );
        assert!(matches!(
            set.feature_matrix(),
            Err(Error::InvalidSampleSet(_))
        ));
    }

    #[test]
    fn save_and_load_sample_set() {
        let set = SampleSet::from_samples(
            SplitName::Testing,
            vec![flat(&[9, 8, 7], "x"), flat(&[6, 5, 4], "y")],
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testing.bin");
        set.save(&path).unwrap();

        let loaded = SampleSet::load(&path).unwrap();
        assert_eq!(loaded, set);
    }
}
