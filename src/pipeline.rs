use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::LoadOptions;
use crate::error::Result;
use crate::extract::extract_faces;
use crate::loader::scan_dataset;
use crate::sampler::stratified_sample;
use crate::split::split_samples;
use crate::types::SampleSet;

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceDataset {
    pub training: SampleSet,
    pub testing: SampleSet,
    /// Label of every extracted face, before sampling, in image order.
    pub labels: Vec<String>,
    /// Images left out under the skip decode policy.
    pub skipped: Vec<PathBuf>,
}

impl FaceDataset {
    /// `(training, testing, labels)`.
    pub fn into_parts(self) -> (SampleSet, SampleSet, Vec<String>) {
        (self.training, self.testing, self.labels)
    }
}

/// Load a face dataset and produce a seeded, class-balanced train/test split.
///
/// The stages run strictly in order: scan, extract, sample, split. One
/// generator seeded from `options.seed` serves every random draw, so the same
/// inputs and options always give the same result.
///
/// # Example
///
/// ```ignore
/// use faceset::{load_faces, LoadOptions};
///
/// let options = LoadOptions::builder()
///     .min_faces(21)
///     .flatten(true)
///     .test_fraction(0.25)
///     .build()?;
/// let (training, testing, labels) = load_faces("caltech_faces", &options)?.into_parts();
/// ```
pub fn load_faces<P: AsRef<Path>>(dataset: P, options: &LoadOptions) -> Result<FaceDataset> {
    options.validate()?;

    let index = scan_dataset(dataset, options)?;
    let extraction = extract_faces(&index, options)?;
    let labels = extraction.labels();

    let mut rng = StdRng::seed_from_u64(options.seed);
    let sampled = stratified_sample(
        extraction.samples,
        options.min_faces,
        options.equal_samples,
        &mut rng,
    )?;
    let (training, testing) = split_samples(sampled, options.test_fraction, &mut rng)?;

    Ok(FaceDataset {
        training,
        testing,
        labels,
        skipped: extraction.skipped,
    })
}
