//! Reader for MATLAB MAT files.
//!
//! Pure Rust parser for the two binary layouts MATLAB has used for numeric
//! matrices, supporting both raw `.mat` files and bzip2-compressed `.mat.bz2`
//! files:
//!
//! - Level 5: a 128-byte text header followed by tagged data elements.
//!   `miCOMPRESSED` elements are zlib streams wrapping another element.
//! - Level 4: a sequence of fixed 20-byte matrix headers, each followed by the
//!   variable name and column-major data.
//!
//! Only real numeric matrices are returned. Strings, cells, structs, sparse
//! and object arrays are skipped. Imaginary parts are dropped.
//!
//! # Example
//!
//! ```ignore
//! use faceset::mat::read_mat;
//!
//! let file = read_mat("ImageData.mat")?;
//! let boxes = file.get("SubDir_Data").unwrap().transpose();
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use bzip2::read::BzDecoder;
use flate2::read::ZlibDecoder;
use log::debug;

use crate::error::{Error, Result};

const LEVEL5_HEADER_LEN: usize = 128;

// Level 5 data types.
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

// Level 5 array classes: double through uint64 are numeric.
const MX_DOUBLE_CLASS: u8 = 6;
const MX_UINT64_CLASS: u8 = 15;
const COMPLEX_FLAG: u32 = 0x0800;

fn format_error(message: impl Into<String>) -> Error {
    Error::AnnotationFormat(message.into())
}

/// A real numeric matrix stored column-major, as MATLAB keeps it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatMatrix {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    data: Vec<f64>,
}

impl MatMatrix {
    pub fn new(name: impl Into<String>, rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(format_error(format!(
                "Variable '{}' declares {}x{} but holds {} values",
                name,
                rows,
                cols,
                data.len()
            )));
        }
        Ok(Self {
            name,
            rows,
            cols,
            data,
        })
    }

    /// Column-major values.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(self.data[col * self.rows + row])
    }

    pub fn row(&self, row: usize) -> Option<Vec<f64>> {
        if row >= self.rows {
            return None;
        }
        Some(
            (0..self.cols)
                .map(|col| self.data[col * self.rows + row])
                .collect(),
        )
    }

    pub fn transpose(&self) -> Self {
        let mut data = Vec::with_capacity(self.data.len());
        for row in 0..self.rows {
            for col in 0..self.cols {
                data.push(self.data[col * self.rows + row]);
            }
        }
        Self {
            name: self.name.clone(),
            rows: self.cols,
            cols: self.rows,
            data,
        }
    }
}

/// All numeric variables found in a MAT file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatFile {
    variables: Vec<MatMatrix>,
}

impl MatFile {
    pub fn variables(&self) -> &[MatMatrix] {
        &self.variables
    }

    pub fn get(&self, name: &str) -> Option<&MatMatrix> {
        self.variables.iter().find(|m| m.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.variables.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Cursor over an in-memory MAT byte stream.
///
/// Every multi-byte value is decoded in the byte order the file declares.
/// Running off the end is reported as a format error, never as I/O.
struct MatReader<'a> {
    buf: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> MatReader<'a> {
    fn new(buf: &'a [u8], big_endian: bool) -> Self {
        Self {
            buf,
            pos: 0,
            big_endian,
        }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(format_error(format!(
                "Unexpected end of data at byte {}: wanted {} more, {} left",
                self.pos,
                n,
                self.remaining()
            )));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(if self.big_endian {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        })
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Read one level 5 data element and return `(type, payload)`.
    ///
    /// Handles the small element form, where a payload of up to 4 bytes is
    /// packed into the tag itself, and skips the 8-byte alignment padding
    /// after regular elements.
    fn read_element(&mut self) -> Result<(u32, &'a [u8])> {
        let first = self.read_u32()?;
        let small_len = (first >> 16) as usize;
        if small_len != 0 {
            if small_len > 4 {
                return Err(format_error(format!(
                    "Small data element claims {} bytes",
                    small_len
                )));
            }
            let packed = self.take(4)?;
            return Ok((first & 0xFFFF, &packed[..small_len]));
        }

        let data_type = first;
        let len = self.read_u32()? as usize;
        let payload = self.take(len)?;
        if data_type != MI_COMPRESSED {
            let padding = (8 - len % 8) % 8;
            self.pos += padding.min(self.remaining());
        }
        Ok((data_type, payload))
    }
}

/// Decode fixed-width values, swapping byte order for big-endian files.
fn decode<const N: usize>(bytes: &[u8], big_endian: bool, convert: fn([u8; N]) -> f64) -> Vec<f64> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut raw = [0u8; N];
            raw.copy_from_slice(chunk);
            if big_endian {
                raw.reverse();
            }
            convert(raw)
        })
        .collect()
}

fn decode_numeric(data_type: u32, bytes: &[u8], big_endian: bool) -> Result<Vec<f64>> {
    let width = match data_type {
        MI_INT8 | MI_UINT8 => 1,
        MI_INT16 | MI_UINT16 => 2,
        MI_INT32 | MI_UINT32 | MI_SINGLE => 4,
        MI_DOUBLE | MI_INT64 | MI_UINT64 => 8,
        other => {
            return Err(format_error(format!(
                "Unsupported numeric data type {}",
                other
            )))
        }
    };
    if bytes.len() % width != 0 {
        return Err(format_error(format!(
            "Numeric payload of {} bytes is not a multiple of {}",
            bytes.len(),
            width
        )));
    }

    let values = match data_type {
        MI_INT8 => decode::<1>(bytes, big_endian, |b| i8::from_le_bytes(b) as f64),
        MI_UINT8 => decode::<1>(bytes, big_endian, |b| u8::from_le_bytes(b) as f64),
        MI_INT16 => decode::<2>(bytes, big_endian, |b| i16::from_le_bytes(b) as f64),
        MI_UINT16 => decode::<2>(bytes, big_endian, |b| u16::from_le_bytes(b) as f64),
        MI_INT32 => decode::<4>(bytes, big_endian, |b| i32::from_le_bytes(b) as f64),
        MI_UINT32 => decode::<4>(bytes, big_endian, |b| u32::from_le_bytes(b) as f64),
        MI_SINGLE => decode::<4>(bytes, big_endian, |b| f32::from_le_bytes(b) as f64),
        MI_INT64 => decode::<8>(bytes, big_endian, |b| i64::from_le_bytes(b) as f64),
        MI_UINT64 => decode::<8>(bytes, big_endian, |b| u64::from_le_bytes(b) as f64),
        _ => decode::<8>(bytes, big_endian, f64::from_le_bytes),
    };
    Ok(values)
}

/// Load a MAT file from disk. A `.bz2` extension is decompressed first.
pub fn read_mat<P: AsRef<Path>>(path: P) -> Result<MatFile> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let is_bz2 = path.extension().is_some_and(|ext| ext == "bz2");

    if is_bz2 {
        read_mat_from_reader(BzDecoder::new(reader))
    } else {
        read_mat_from_reader(reader)
    }
}

/// Load a MAT file from an already-opened reader.
pub fn read_mat_from_reader<R: Read>(mut reader: R) -> Result<MatFile> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| format_error(format!("Failed to read MAT data: {}", e)))?;
    parse_mat(&bytes)
}

/// Parse a complete MAT file held in memory.
pub fn parse_mat(bytes: &[u8]) -> Result<MatFile> {
    if bytes.len() >= LEVEL5_HEADER_LEN {
        match &bytes[126..128] {
            b"IM" => return parse_level5(bytes, false),
            b"MI" => return parse_level5(bytes, true),
            _ => {}
        }
    }
    parse_level4(bytes)
}

fn parse_level5(bytes: &[u8], big_endian: bool) -> Result<MatFile> {
    let raw = [bytes[124], bytes[125]];
    let version = if big_endian {
        u16::from_be_bytes(raw)
    } else {
        u16::from_le_bytes(raw)
    };
    if version != 0x0100 {
        return Err(format_error(format!(
            "Unsupported MAT level 5 version {:#06x} (HDF5-based files are not supported)",
            version
        )));
    }

    let mut variables = Vec::new();
    let mut r = MatReader::new(&bytes[LEVEL5_HEADER_LEN..], big_endian);

    while !r.is_empty() {
        let (data_type, payload) = r.read_element()?;
        match data_type {
            MI_MATRIX => {
                if let Some(matrix) = parse_matrix_element(payload, big_endian)? {
                    variables.push(matrix);
                }
            }
            MI_COMPRESSED => {
                let mut inflated = Vec::new();
                ZlibDecoder::new(payload)
                    .read_to_end(&mut inflated)
                    .map_err(|e| format_error(format!("Failed to inflate element: {}", e)))?;

                let mut inner = MatReader::new(&inflated, big_endian);
                while !inner.is_empty() {
                    let (inner_type, inner_payload) = inner.read_element()?;
                    if inner_type == MI_MATRIX {
                        if let Some(matrix) = parse_matrix_element(inner_payload, big_endian)? {
                            variables.push(matrix);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(MatFile { variables })
}

/// Parse the sub-elements of one `miMATRIX`: flags, dimensions, name, real part.
fn parse_matrix_element(payload: &[u8], big_endian: bool) -> Result<Option<MatMatrix>> {
    if payload.is_empty() {
        return Ok(None);
    }
    let mut r = MatReader::new(payload, big_endian);

    let (flags_type, flags) = r.read_element()?;
    if flags_type != MI_UINT32 || flags.len() < 4 {
        return Err(format_error("Matrix element is missing its array flags"));
    }
    let flag_word = MatReader::new(flags, big_endian).read_u32()?;
    let class = (flag_word & 0xFF) as u8;
    let is_complex = flag_word & COMPLEX_FLAG != 0;

    let (dims_type, dims_raw) = r.read_element()?;
    if dims_type != MI_INT32 {
        return Err(format_error("Matrix element is missing its dimensions"));
    }
    let mut dims_reader = MatReader::new(dims_raw, big_endian);
    let mut dims = Vec::with_capacity(dims_raw.len() / 4);
    while !dims_reader.is_empty() {
        dims.push(dims_reader.read_i32()?);
    }

    let (_, name_raw) = r.read_element()?;
    let name = String::from_utf8_lossy(name_raw).into_owned();

    if !(MX_DOUBLE_CLASS..=MX_UINT64_CLASS).contains(&class) {
        return Ok(None);
    }

    if dims.len() != 2 || dims.iter().any(|&d| d < 0) {
        return Err(format_error(format!(
            "Variable '{}' has unsupported dimensions {:?}",
            name, dims
        )));
    }
    let (rows, cols) = (dims[0] as usize, dims[1] as usize);

    let (real_type, real) = r.read_element()?;
    let data = decode_numeric(real_type, real, big_endian)?;
    if is_complex {
        debug!("Dropping imaginary part of '{}'", name);
    }

    MatMatrix::new(name, rows, cols, data).map(Some)
}

/// Byte width for a level 4 precision digit.
fn level4_width(precision: i32) -> Option<usize> {
    match precision {
        0 => Some(8),
        1 | 2 => Some(4),
        3 | 4 => Some(2),
        5 => Some(1),
        _ => None,
    }
}

fn decode_level4(precision: i32, bytes: &[u8], big_endian: bool) -> Vec<f64> {
    match precision {
        0 => decode::<8>(bytes, big_endian, f64::from_le_bytes),
        1 => decode::<4>(bytes, big_endian, |b| f32::from_le_bytes(b) as f64),
        2 => decode::<4>(bytes, big_endian, |b| i32::from_le_bytes(b) as f64),
        3 => decode::<2>(bytes, big_endian, |b| i16::from_le_bytes(b) as f64),
        4 => decode::<2>(bytes, big_endian, |b| u16::from_le_bytes(b) as f64),
        _ => decode::<1>(bytes, big_endian, |b| u8::from_le_bytes(b) as f64),
    }
}

fn parse_level4(bytes: &[u8]) -> Result<MatFile> {
    if bytes.is_empty() {
        return Err(format_error("Empty MAT file"));
    }

    let mut variables = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        // The thousands digit of MOPT names the byte order: 0 little, 1 big.
        let rest = &bytes[pos..];
        let little = MatReader::new(rest, false).read_i32()?;
        let big_endian = match little {
            0..=999 => false,
            _ => {
                let big = MatReader::new(rest, true).read_i32()?;
                if !(1000..=1999).contains(&big) {
                    return Err(format_error(format!(
                        "Unrecognized MAT header at byte {}",
                        pos
                    )));
                }
                true
            }
        };

        let mut r = MatReader::new(rest, big_endian);
        let mopt = r.read_i32()? % 1000;
        let rows = r.read_i32()?;
        let cols = r.read_i32()?;
        let imagf = r.read_i32()?;
        let namlen = r.read_i32()?;

        let (order, precision, kind) = (mopt / 100, (mopt / 10) % 10, mopt % 10);
        let width = match level4_width(precision) {
            Some(width) if order == 0 && rows >= 0 && cols >= 0 && namlen >= 0 => width,
            _ => {
                return Err(format_error(format!(
                    "Invalid MAT level 4 header at byte {}",
                    pos
                )))
            }
        };
        let (rows, cols) = (rows as usize, cols as usize);

        let name_raw = r.take(namlen as usize)?;
        let name = String::from_utf8_lossy(name_raw)
            .trim_end_matches('\0')
            .to_string();

        let part_len = rows
            .checked_mul(cols)
            .and_then(|n| n.checked_mul(width))
            .ok_or_else(|| {
                format_error(format!(
                    "Variable '{}' is too large: {}x{} values of {} bytes",
                    name, rows, cols, width
                ))
            })?;
        let real = r.take(part_len)?;
        if imagf != 0 {
            r.take(part_len)?;
        }

        if kind == 0 {
            let data = decode_level4(precision, real, big_endian);
            variables.push(MatMatrix::new(name, rows, cols, data)?);
        }

        pos += r.pos;
    }

    Ok(MatFile { variables })
}
