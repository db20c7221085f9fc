use serde::{Deserialize, Serialize};

use crate::annotations::BoxColumns;
use crate::error::{Error, Result};
use crate::gray::LumaWeights;

/// Canonical `(width, height)` every face is resized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceSize {
    pub width: u32,
    pub height: u32,
}

impl FaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for FaceSize {
    fn default() -> Self {
        Self::new(47, 62)
    }
}

/// What the extractor does with an image that fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeErrorPolicy {
    /// Stop the run with `Error::ImageDecode`.
    #[default]
    Abort,
    /// Log a warning, record the path and leave the image out.
    Skip,
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Faces a label needs to be kept, and the per-label count when
    /// `equal_samples` is set.
    pub min_faces: usize,
    pub face_size: FaceSize,
    pub equal_samples: bool,
    /// Share of the sampled faces that goes to the testing set, in `[0, 1)`.
    pub test_fraction: f64,
    pub seed: u64,
    pub flatten: bool,
    /// Annotation file name, relative to the dataset root.
    pub annotation_file: String,
    /// Matrix variable inside the annotation file.
    pub annotation_variable: String,
    pub box_columns: BoxColumns,
    pub luma: LumaWeights,
    pub on_decode_error: DecodeErrorPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            min_faces: 10,
            face_size: FaceSize::default(),
            equal_samples: true,
            test_fraction: 0.33,
            seed: 42,
            flatten: false,
            annotation_file: "ImageData.mat".into(),
            annotation_variable: "SubDir_Data".into(),
            box_columns: BoxColumns::default(),
            luma: LumaWeights::default(),
            on_decode_error: DecodeErrorPolicy::default(),
        }
    }
}

impl LoadOptions {
    pub fn builder() -> LoadOptionsBuilder {
        LoadOptionsBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_faces == 0 {
            return Err(Error::InvalidConfig("min_faces must be at least 1".into()));
        }
        if self.face_size.width == 0 || self.face_size.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "face_size must be non-zero, got {}x{}",
                self.face_size.width, self.face_size.height
            )));
        }
        check_test_fraction(self.test_fraction)?;
        if self.annotation_file.is_empty() {
            return Err(Error::InvalidConfig("annotation_file is empty".into()));
        }
        if self.annotation_variable.is_empty() {
            return Err(Error::InvalidConfig("annotation_variable is empty".into()));
        }
        self.box_columns.validate()?;
        self.luma.validate()
    }
}

pub(crate) fn check_test_fraction(test_fraction: f64) -> Result<()> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(Error::InvalidConfig(format!(
            "test_fraction must be in [0, 1), got {}",
            test_fraction
        )));
    }
    Ok(())
}

/// Builder for [`LoadOptions`], validated on `build`.
pub struct LoadOptionsBuilder {
    options: LoadOptions,
}

impl LoadOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: LoadOptions::default(),
        }
    }

    pub fn min_faces(mut self, min_faces: usize) -> Self {
        self.options.min_faces = min_faces;
        self
    }

    pub fn face_size(mut self, width: u32, height: u32) -> Self {
        self.options.face_size = FaceSize::new(width, height);
        self
    }

    pub fn equal_samples(mut self, equal_samples: bool) -> Self {
        self.options.equal_samples = equal_samples;
        self
    }

    pub fn test_fraction(mut self, test_fraction: f64) -> Self {
        self.options.test_fraction = test_fraction;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.options.seed = seed;
        self
    }

    pub fn flatten(mut self, flatten: bool) -> Self {
        self.options.flatten = flatten;
        self
    }

    pub fn annotation_file(mut self, file_name: impl Into<String>) -> Self {
        self.options.annotation_file = file_name.into();
        self
    }

    pub fn annotation_variable(mut self, variable: impl Into<String>) -> Self {
        self.options.annotation_variable = variable.into();
        self
    }

    pub fn box_columns(mut self, columns: BoxColumns) -> Self {
        self.options.box_columns = columns;
        self
    }

    pub fn luma(mut self, weights: LumaWeights) -> Self {
        self.options.luma = weights;
        self
    }

    pub fn on_decode_error(mut self, policy: DecodeErrorPolicy) -> Self {
        self.options.on_decode_error = policy;
        self
    }

    /// Build the options.
    pub fn build(self) -> Result<LoadOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}

impl Default for LoadOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
