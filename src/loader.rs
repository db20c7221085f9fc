use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::annotations::{AnnotationTable, IndexResolver};
use crate::config::LoadOptions;
use crate::error::{Error, Result};
use crate::types::ImageRecord;

/// Extensions recognized as images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// Everything the extractor needs from disk: sorted image paths and boxes.
#[derive(Debug, Clone)]
pub struct DatasetIndex {
    pub root: PathBuf,
    /// Image paths in byte-wise sorted order.
    pub images: Vec<PathBuf>,
    pub annotations: AnnotationTable,
}

impl DatasetIndex {
    /// Pair every image with its annotation row.
    ///
    /// Fails on the first image whose row cannot be resolved or is out of
    /// range, before any pixels are read.
    pub fn records<R: IndexResolver + ?Sized>(&self, resolver: &R) -> Result<Vec<ImageRecord>> {
        self.images
            .iter()
            .map(|path| {
                let sequence_index = resolver.resolve(path)?;
                self.annotations.lookup(path, sequence_index)?;
                Ok(ImageRecord {
                    path: path.clone(),
                    sequence_index,
                })
            })
            .collect()
    }
}

fn has_image_extension(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    IMAGE_EXTENSIONS
        .iter()
        .any(|allowed| ext.eq_ignore_ascii_case(allowed))
}

/// Recursively list image files under `root`, sorted by path.
pub fn list_images(root: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() && has_image_extension(entry.path()) {
            images.push(entry.into_path());
        }
    }

    images.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(images)
}

/// Find the annotation file, falling back to a `.bz2` sibling.
pub fn locate_annotation_file(root: &Path, file_name: &str) -> Result<PathBuf> {
    let plain = root.join(file_name);
    if plain.is_file() {
        return Ok(plain);
    }

    let compressed = root.join(format!("{}.bz2", file_name));
    if compressed.is_file() {
        return Ok(compressed);
    }

    Err(Error::DatasetNotFound { path: plain })
}

/// Enumerate images and load the bounding-box table for a dataset directory.
pub fn scan_dataset<P: AsRef<Path>>(root: P, options: &LoadOptions) -> Result<DatasetIndex> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::DatasetNotFound {
            path: root.to_path_buf(),
        });
    }

    let annotation_path = locate_annotation_file(root, &options.annotation_file)?;
    debug!("Reading annotations from {}", annotation_path.display());
    let annotations = AnnotationTable::load(&annotation_path, &options.annotation_variable)?;

    let images = list_images(root)?;
    info!(
        "Scanned {}: {} images, {} annotation rows",
        root.display(),
        images.len(),
        annotations.len()
    );

    Ok(DatasetIndex {
        root: root.to_path_buf(),
        images,
        annotations,
    })
}
