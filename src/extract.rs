//! Face extraction: decode, grayscale, crop to the annotated box, resize.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageDecoder, ImageReader};
use log::{info, warn};

use crate::annotations::{AnnotationTable, BoxColumns, IndexResolver, SequenceSuffix};
use crate::config::{DecodeErrorPolicy, FaceSize, LoadOptions};
use crate::error::{Error, Result};
use crate::gray::{crop, resize_bilinear, GrayImage, ImageAccess, LumaWeights};
use crate::loader::DatasetIndex;
use crate::types::{ImageRecord, Pixels, Sample};

/// Samples in image enumeration order, plus the images left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub samples: Vec<Sample>,
    /// Images that failed to decode under [`DecodeErrorPolicy::Skip`].
    pub skipped: Vec<PathBuf>,
}

impl Extraction {
    /// Label of every extracted sample, index-aligned with `samples`.
    pub fn labels(&self) -> Vec<String> {
        self.samples.iter().map(|s| s.label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Name of the directory directly containing `path`.
pub fn label_for(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Decode an image file and convert it to luma.
///
/// The format is sniffed from the file contents, so a misnamed file still
/// decodes. EXIF orientation, when the format carries it, is applied before
/// conversion.
pub fn decode_gray(path: &Path, weights: &LumaWeights) -> Result<GrayImage> {
    let decoded = read_oriented(path).map_err(|source| Error::ImageDecode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(GrayImage::from_rgb(&decoded.to_rgb8(), weights))
}

fn read_oriented(path: &Path) -> image::ImageResult<DynamicImage> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut decoded = DynamicImage::from_decoder(decoder)?;
    decoded.apply_orientation(orientation);
    Ok(decoded)
}

/// Turns annotated images into fixed-size grayscale faces.
#[derive(Debug, Clone)]
pub struct FaceExtractor<R = SequenceSuffix> {
    face_size: FaceSize,
    flatten: bool,
    box_columns: BoxColumns,
    luma: LumaWeights,
    policy: DecodeErrorPolicy,
    resolver: R,
}

impl FaceExtractor<SequenceSuffix> {
    pub fn new(options: &LoadOptions) -> Self {
        Self {
            face_size: options.face_size,
            flatten: options.flatten,
            box_columns: options.box_columns,
            luma: options.luma,
            policy: options.on_decode_error,
            resolver: SequenceSuffix::default(),
        }
    }
}

impl<R: IndexResolver> FaceExtractor<R> {
    /// Swap the filename-to-row convention.
    pub fn with_resolver<T: IndexResolver>(self, resolver: T) -> FaceExtractor<T> {
        FaceExtractor {
            face_size: self.face_size,
            flatten: self.flatten,
            box_columns: self.box_columns,
            luma: self.luma,
            policy: self.policy,
            resolver,
        }
    }

    /// Resolve the annotation row for `path`.
    pub fn record(&self, path: &Path, annotations: &AnnotationTable) -> Result<ImageRecord> {
        let sequence_index = self.resolver.resolve(path)?;
        annotations.lookup(path, sequence_index)?;
        Ok(ImageRecord {
            path: path.to_path_buf(),
            sequence_index,
        })
    }

    /// Cut the annotated face out of an already-gray image.
    pub fn face_from_gray<I: ImageAccess>(
        &self,
        gray: &I,
        record: &ImageRecord,
        annotations: &AnnotationTable,
    ) -> Result<Pixels> {
        let rect = annotations
            .lookup(&record.path, record.sequence_index)?
            .crop_rect(&self.box_columns);

        let face = crop(gray, &rect).ok_or_else(|| Error::InvalidCrop {
            path: record.path.clone(),
            rect,
            width: gray.width(),
            height: gray.height(),
        })?;
        let face = resize_bilinear(&face, self.face_size.width, self.face_size.height);

        Ok(if self.flatten {
            Pixels::Flat(face.into_raw())
        } else {
            Pixels::Grid(face)
        })
    }

    /// Decode, convert, crop, resize and label one resolved image.
    pub fn extract_record(
        &self,
        record: &ImageRecord,
        annotations: &AnnotationTable,
    ) -> Result<Sample> {
        let gray = decode_gray(&record.path, &self.luma)?;
        let pixels = self.face_from_gray(&gray, record, annotations)?;
        Ok(Sample::new(pixels, label_for(&record.path)))
    }

    /// Full per-image work for a bare path.
    pub fn extract_one(&self, path: &Path, annotations: &AnnotationTable) -> Result<Sample> {
        let record = self.record(path, annotations)?;
        self.extract_record(&record, annotations)
    }

    /// Apply the decode policy to one result, keeping enumeration order.
    fn settle(&self, path: &Path, result: Result<Sample>, out: &mut Extraction) -> Result<()> {
        match result {
            Ok(sample) => out.samples.push(sample),
            Err(err @ Error::ImageDecode { .. }) => match self.policy {
                DecodeErrorPolicy::Abort => return Err(err),
                DecodeErrorPolicy::Skip => {
                    warn!("Skipping {}: {}", path.display(), err);
                    out.skipped.push(path.to_path_buf());
                }
            },
            Err(err) => return Err(err),
        }
        Ok(())
    }
}

impl<R: IndexResolver + Sync> FaceExtractor<R> {
    /// Extract every image of the dataset, in the dataset's sorted order.
    ///
    /// All annotation rows are resolved before the first image is decoded.
    pub fn extract_all(&self, dataset: &DatasetIndex) -> Result<Extraction> {
        let records = dataset.records(&self.resolver)?;
        let mut out = Extraction::default();

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            // Indexed collect keeps every result in its image's slot.
            let results: Vec<Result<Sample>> = records
                .par_iter()
                .map(|record| self.extract_record(record, &dataset.annotations))
                .collect();
            for (record, result) in records.iter().zip(results) {
                self.settle(&record.path, result, &mut out)?;
            }
        }

        #[cfg(not(feature = "parallel"))]
        for record in &records {
            let result = self.extract_record(record, &dataset.annotations);
            self.settle(&record.path, result, &mut out)?;
        }

        info!(
            "Extracted {} faces ({} skipped)",
            out.samples.len(),
            out.skipped.len()
        );
        Ok(out)
    }
}

/// Extract all faces of a scanned dataset with the default index convention.
pub fn extract_faces(dataset: &DatasetIndex, options: &LoadOptions) -> Result<Extraction> {
    FaceExtractor::new(options).extract_all(dataset)
}
