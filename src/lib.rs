//! # faceset
//!
//! Pure Rust loading and splitting of annotated face image datasets.
//!
//! This crate provides:
//! - **Annotation ingestion**: MATLAB MAT files (level 4 and 5, zlib or bzip2)
//!   holding one bounding box per image
//! - **Face extraction**: grayscale conversion, annotation-driven cropping and
//!   bilinear resizing to a canonical face size
//! - **Balanced splits**: per-label quota sampling and a seeded train/test
//!   partition that is reproducible run to run
//!
//! ## Pipeline Overview
//!
//! 1. List every image under the dataset root in sorted path order and read
//!    the bounding-box matrix next to it
//! 2. For each image:
//!    - Decode and convert to luma
//!    - Resolve its annotation row from the `_NNNN` number in the file name
//!    - Crop to the annotated box and resize; optionally flatten
//!    - Label it with its parent directory name
//! 3. Keep labels with at least `min_faces` faces, drawing exactly `min_faces`
//!    of each, then shuffle
//! 4. Shuffle once more and cut into training and testing sets
//!
//! Steps 3 and 4 draw from a single generator seeded once per run.
//!
//! ## Quick Start
//!
//! ```rust
//! use faceset::{split_samples, stratified_sample, Pixels, Sample};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Samples normally come from `extract_faces`; any labeled pixels work.
//! let samples: Vec<Sample> = (0..30u8)
//!     .map(|i| Sample::new(Pixels::Flat(vec![i; 4]), if i < 12 { "ann" } else { "bob" }))
//!     .collect();
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let balanced = stratified_sample(samples, 10, true, &mut rng).unwrap();
//! let (training, testing) = split_samples(balanced, 0.25, &mut rng).unwrap();
//!
//! assert_eq!(training.len(), 15);
//! assert_eq!(testing.len(), 5);
//! ```
//!
//! Loading a dataset from disk in one call:
//!
//! ```ignore
//! use faceset::{load_faces, LoadOptions};
//!
//! let options = LoadOptions::builder().min_faces(21).flatten(true).build()?;
//! let faces = load_faces("caltech_faces", &options)?;
//! println!("{} training faces", faces.training.len());
//! ```
//!
//! ## Custom Index Conventions
//!
//! Implement [`IndexResolver`] (or pass a closure) when file names encode the
//! annotation row differently:
//!
//! ```rust
//! use std::path::Path;
//! use faceset::{FaceExtractor, LoadOptions, Result};
//!
//! let extractor = FaceExtractor::new(&LoadOptions::default())
//!     .with_resolver(|path: &Path| -> Result<usize> {
//!         // e.g. "0007.jpg" -> row 7
//!         let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("0");
//!         Ok(stem.parse().unwrap_or(0))
//!     });
//! # let _ = extractor;
//! ```

pub mod annotations;
mod config;
mod error;
mod extract;
mod gray;
mod loader;
pub mod mat;
mod pipeline;
mod sampler;
mod split;
mod types;

pub use annotations::{
    resolve_annotation_index, AnnotationTable, BoxColumns, IndexResolver, SequenceSuffix,
};
pub use config::{DecodeErrorPolicy, FaceSize, LoadOptions, LoadOptionsBuilder};
pub use error::{Error, Result};
pub use extract::{decode_gray, extract_faces, label_for, Extraction, FaceExtractor};
pub use gray::{crop, resize_bilinear, GrayImage, ImageAccess, LumaWeights};
pub use loader::{list_images, locate_annotation_file, scan_dataset, DatasetIndex, IMAGE_EXTENSIONS};
pub use pipeline::{load_faces, FaceDataset};
pub use sampler::{stratified_indices, stratified_sample};
pub use split::{split_indices, split_point, split_samples};
pub use types::{AnnotationRow, CropRect, ImageRecord, Pixels, Sample, SampleSet, SplitName};
