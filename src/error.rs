use std::path::PathBuf;

use thiserror::Error;

use crate::types::CropRect;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Dataset not found: {}", path.display())]
    DatasetNotFound { path: PathBuf },

    #[error("Malformed annotation matrix: {0}")]
    AnnotationFormat(String),

    #[error("Failed to decode image {}: {source}", path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("No annotation row for {}: {message}", path.display())]
    AnnotationIndex { path: PathBuf, message: String },

    #[error(
        "Crop rectangle {rect} is empty inside {width}x{height} image {}",
        path.display()
    )]
    InvalidCrop {
        path: PathBuf,
        rect: CropRect,
        width: u32,
        height: u32,
    },

    #[error("No samples left: {labels} label(s) seen, none with at least {min_faces} faces")]
    InsufficientSamples { min_faces: usize, labels: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid sample set: {0}")]
    InvalidSampleSet(String),
}

pub type Result<T> = std::result::Result<T, Error>;
