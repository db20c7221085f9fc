//! Bounding-box annotations and the filename convention that indexes them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mat::{read_mat, MatMatrix};
use crate::types::AnnotationRow;

/// Number of coordinates per annotation row.
pub const ROW_WIDTH: usize = 8;

/// Which annotation columns hold the crop rectangle.
///
/// Defaults to the `xTL, yTL, xBR, yBR` columns of the
/// `(xBL, yBL, xTL, yTL, xTR, yTR, xBR, yBR)` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxColumns {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

impl BoxColumns {
    pub fn validate(&self) -> Result<()> {
        for (role, column) in [
            ("left", self.left),
            ("top", self.top),
            ("right", self.right),
            ("bottom", self.bottom),
        ] {
            if column >= ROW_WIDTH {
                return Err(Error::InvalidConfig(format!(
                    "Box column for {} is {}, rows only have {} columns",
                    role, column, ROW_WIDTH
                )));
            }
        }
        Ok(())
    }
}

impl Default for BoxColumns {
    fn default() -> Self {
        Self {
            left: 2,
            top: 3,
            right: 6,
            bottom: 7,
        }
    }
}

/// Face boxes, one row per sequence index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationTable {
    rows: Vec<AnnotationRow>,
}

impl AnnotationTable {
    pub fn from_rows(rows: Vec<AnnotationRow>) -> Self {
        Self { rows }
    }

    /// Build the table from an `8 x N` matrix, one column per image.
    ///
    /// The matrix is column-major, so each run of eight values in its data is
    /// one image. Values are truncated toward zero.
    pub fn from_matrix(matrix: &MatMatrix) -> Result<Self> {
        if matrix.rows != ROW_WIDTH {
            return Err(Error::AnnotationFormat(format!(
                "Variable '{}' is {}x{}, expected {} rows of coordinates",
                matrix.name, matrix.rows, matrix.cols, ROW_WIDTH
            )));
        }

        let mut rows = Vec::with_capacity(matrix.cols);
        for (i, chunk) in matrix.data().chunks_exact(ROW_WIDTH).enumerate() {
            let mut values = [0i64; ROW_WIDTH];
            for (slot, &v) in values.iter_mut().zip(chunk) {
                if !v.is_finite() {
                    return Err(Error::AnnotationFormat(format!(
                        "Row {} of '{}' holds non-finite value {}",
                        i, matrix.name, v
                    )));
                }
                *slot = v.trunc() as i64;
            }
            rows.push(AnnotationRow::new(values));
        }

        Ok(Self { rows })
    }

    /// Read `variable` out of a MAT file.
    pub fn load<P: AsRef<Path>>(path: P, variable: &str) -> Result<Self> {
        let file = read_mat(path)?;
        let matrix = file.get(variable).ok_or_else(|| {
            Error::AnnotationFormat(format!(
                "Variable '{}' not found (numeric variables: {:?})",
                variable,
                file.names()
            ))
        })?;
        Self::from_matrix(matrix)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[AnnotationRow] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&AnnotationRow> {
        self.rows.get(index)
    }

    /// Row for `index`, or an `AnnotationIndex` error naming `path`.
    pub fn lookup(&self, path: &Path, index: usize) -> Result<&AnnotationRow> {
        self.rows.get(index).ok_or_else(|| Error::AnnotationIndex {
            path: path.to_path_buf(),
            message: format!(
                "index {} is out of range for {} annotation rows",
                index,
                self.rows.len()
            ),
        })
    }
}

/// Maps an image path to its zero-based annotation row.
pub trait IndexResolver {
    fn resolve(&self, path: &Path) -> Result<usize>;
}

impl<F> IndexResolver for F
where
    F: Fn(&Path) -> Result<usize>,
{
    fn resolve(&self, path: &Path) -> Result<usize> {
        self(path)
    }
}

/// Sequence number after the last `_` in the file stem, e.g. `image_0042.jpg`.
///
/// At most `digits` characters of the token are read, and all of them must be
/// ASCII digits. `first` is the number of the first image, so the row index is
/// `number - first`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSuffix {
    pub digits: usize,
    pub first: usize,
}

impl Default for SequenceSuffix {
    fn default() -> Self {
        Self {
            digits: 4,
            first: 1,
        }
    }
}

impl IndexResolver for SequenceSuffix {
    fn resolve(&self, path: &Path) -> Result<usize> {
        let fail = |message: String| Error::AnnotationIndex {
            path: path.to_path_buf(),
            message,
        };

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| fail("file name is not valid UTF-8".into()))?;
        let token = stem
            .rfind('_')
            .map(|pos| &stem[pos + 1..])
            .ok_or_else(|| fail(format!("no '_' in file name '{}'", stem)))?;

        let digits: String = token.chars().take(self.digits).collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(fail(format!("'{}' is not a sequence number", digits)));
        }

        let number: usize = digits
            .parse()
            .map_err(|_| fail(format!("'{}' is not a sequence number", digits)))?;
        number
            .checked_sub(self.first)
            .ok_or_else(|| fail(format!("sequence number {} is below {}", number, self.first)))
    }
}

/// Resolve a path with the default `_NNNN` convention.
pub fn resolve_annotation_index(path: &Path) -> Result<usize> {
    SequenceSuffix::default().resolve(path)
}
