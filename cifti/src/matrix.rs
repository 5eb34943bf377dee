//! Row oriented access to the data in a CIFTI matrix file.
//!
//! File layout (all integers Big Endian):
//!
//! | field                                    | type          |
//! |------------------------------------------|---------------|
//! | magic number                             | u16           |
//! | format version                           | u32           |
//! | data type code                           | i32           |
//! | number of dimensions (always 2)          | u32           |
//! | columns, rows (CIFTI dimension order)    | u64 each      |
//! | length of XML document                   | u32           |
//! | XML document                             | UTF-8 bytes   |
//! | padding to a multiple of 16 bytes        |               |
//! | cells, row major, Big Endian floats      |               |
//!
//! Because every row has the same width, any row can be read or written with a single seek.
//! Memory use is one row's worth of bytes, regardless of the size of the matrix.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use num_traits::Float;

use crate::{
    errors::{Error, Result},
    extio::{ExtendedRead, ExtendedWrite},
    header::{MatrixHeader, ALONG_COLUMN, ALONG_ROW},
    xml::CiftiVersion,
};

const MAGIC_NUMBER: u16 = 0xC1F7;
const FORMAT_VERSION: u32 = 1;
const ALIGNMENT: u64 = 16;

const TYPE_F32: i32 = 16;
const TYPE_F64: i32 = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Float32,
    Float64,
}

impl DataType {
    fn code(&self) -> i32 {
        match self {
            DataType::Float32 => TYPE_F32,
            DataType::Float64 => TYPE_F64,
        }
    }

    fn from_code(code: i32) -> Result<Self> {
        match code {
            TYPE_F32 => Ok(DataType::Float32),
            TYPE_F64 => Ok(DataType::Float64),
            _ => Err(Error::format(format!("unsupported data type code {code}"))),
        }
    }

    pub fn word_size(&self) -> usize {
        match self {
            DataType::Float32 => 4,
            DataType::Float64 => 8,
        }
    }

    fn decode(&self, bytes: &[u8], row: &mut [f32]) {
        match self {
            DataType::Float32 => decode_words(bytes, row, f32::from_be_bytes),
            DataType::Float64 => decode_words(bytes, row, f64::from_be_bytes),
        }
    }

    fn encode(&self, row: &[f32], bytes: &mut Vec<u8>) {
        bytes.clear();
        match self {
            DataType::Float32 => {
                for value in row {
                    bytes.extend_from_slice(&value.to_be_bytes());
                }
            }
            DataType::Float64 => {
                for value in row {
                    bytes.extend_from_slice(&f64::from(*value).to_be_bytes());
                }
            }
        }
    }
}

fn decode_words<F, const N: usize>(bytes: &[u8], row: &mut [f32], from_be_bytes: fn([u8; N]) -> F)
where
    F: Float,
{
    for (chunk, value) in bytes.chunks_exact(N).zip(row.iter_mut()) {
        let mut word = [0; N];
        word.copy_from_slice(chunk);
        *value = from_be_bytes(word).to_f32().unwrap_or(f32::NAN);
    }
}

/// A two dimensional CIFTI matrix, on disk or in memory.
///
/// Rows are indexed along CIFTI dimension 1 and columns along dimension 0, so
/// `row_count() == header.dimension_length(1)` and
/// `column_count() == header.dimension_length(0)`.
///
/// The file handle is owned exclusively, callers wanting to share a matrix between components
/// pass it by reference.
///
pub struct MatrixFile {
    header: MatrixHeader,
    rows: usize,
    cols: usize,
    storage: Storage,
}

enum Storage {
    Memory(Array2<f32>),
    Disk(DiskMatrix),
}

struct DiskMatrix {
    path: PathBuf,
    file: File,
    data_type: DataType,
    data_offset: u64,
    scratch: Vec<u8>,
}

impl DiskMatrix {
    fn row_bytes(&self, cols: usize) -> u64 {
        (cols * self.data_type.word_size()) as u64
    }

    fn seek_row(&mut self, index: usize, cols: usize) -> io::Result<()> {
        let offset = self.data_offset + index as u64 * self.row_bytes(cols);
        self.file.seek(SeekFrom::Start(offset))?;

        Ok(())
    }
}

impl MatrixFile {
    /// Open an existing matrix file for reading.
    ///
    /// Series lengths missing from a legacy header are filled in from the matrix dimensions
    /// stored in the file, so the header of an opened file is always fully resolved.
    ///
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;

        let magic_number = file.read_u16()?;
        if magic_number != MAGIC_NUMBER {
            return Err(Error::format(format!(
                "{} is not a CIFTI matrix file",
                path.display()
            )));
        }
        let version = file.read_u32()?;
        if version != FORMAT_VERSION {
            return Err(Error::format(format!(
                "unrecognized format version {version}"
            )));
        }
        let data_type = DataType::from_code(file.read_i32()?)?;
        let axes = file.read_u32()? as usize;
        if axes != 2 {
            return Err(Error::AxisCount(axes));
        }
        let cols = file.read_u64()?;
        let rows = file.read_u64()?;
        let file_len = file.metadata()?.len();

        let xml_len = file.read_u32()? as usize;
        if preamble_size(xml_len) > file_len {
            return Err(Error::format(format!(
                "{} is truncated within its header",
                path.display()
            )));
        }
        let data_offset = align(preamble_size(xml_len));
        let data_end = data_size(rows, cols, data_type)
            .and_then(|size| size.checked_add(data_offset))
            .ok_or_else(|| Error::format(format!("matrix of {cols} x {rows} is too large")))?;
        let (Ok(rows), Ok(cols)) = (usize::try_from(rows), usize::try_from(cols)) else {
            return Err(Error::format(format!("matrix of {cols} x {rows} is too large")));
        };

        let mut xml = vec![0; xml_len];
        file.read_exact(&mut xml)?;
        let xml = String::from_utf8(xml)
            .map_err(|_| Error::format("header XML is not valid UTF-8"))?;

        let mut header = MatrixHeader::from_xml(&xml)?;
        header.resolve_series_lengths(&[cols, rows]);
        if header.dimensions() != [Some(cols), Some(rows)] {
            return Err(Error::format(format!(
                "header describes dimensions {:?}, but the matrix is {cols} x {rows}",
                header.dimensions()
            )));
        }

        if file_len < data_end {
            return Err(Error::format(format!("{} is truncated", path.display())));
        }

        tracing::debug!(path = %path.display(), rows, cols, "opened CIFTI matrix");

        Ok(Self {
            header,
            rows,
            cols,
            storage: Storage::Disk(DiskMatrix {
                path: path.to_path_buf(),
                file,
                data_type,
                data_offset,
                scratch: vec![],
            }),
        })
    }

    /// Create a new matrix file, with a CIFTI-2 header, ready for rows to be written.
    pub fn create<P: AsRef<Path>>(path: P, header: MatrixHeader) -> Result<Self> {
        Self::create_with_version(path, header, CiftiVersion::V2)
    }

    /// Create a new matrix file, writing the header in the given XML version.
    ///
    /// The file is extended to its full size immediately, so rows may be written in any order.
    /// Rows that are never written read back as zeros.
    ///
    pub fn create_with_version<P: AsRef<Path>>(
        path: P,
        header: MatrixHeader,
        version: CiftiVersion,
    ) -> Result<Self> {
        let path = path.as_ref();
        let (rows, cols) = matrix_shape(&header)?;
        let xml = header.to_xml(version)?;
        let xml_len = xml.len();

        let mut preamble = Vec::new();
        preamble.write_u16(MAGIC_NUMBER)?;
        preamble.write_u32(FORMAT_VERSION)?;
        preamble.write_i32(DataType::Float32.code())?;
        preamble.write_u32(2)?;
        preamble.write_u64(cols as u64)?;
        preamble.write_u64(rows as u64)?;
        preamble.write_u32(xml_len as u32)?;
        preamble.write_all(xml.as_bytes())?;

        let data_offset = align(preamble_size(xml_len));
        let data_end = data_size(rows as u64, cols as u64, DataType::Float32)
            .and_then(|size| size.checked_add(data_offset))
            .ok_or_else(|| Error::format(format!("matrix of {cols} x {rows} is too large")))?;
        preamble.resize(data_offset as usize, 0);

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&preamble)?;
        file.set_len(data_end)?;

        tracing::debug!(path = %path.display(), rows, cols, ?version, "created CIFTI matrix");

        Ok(Self {
            header,
            rows,
            cols,
            storage: Storage::Disk(DiskMatrix {
                path: path.to_path_buf(),
                file,
                data_type: DataType::Float32,
                data_offset,
                scratch: vec![],
            }),
        })
    }

    /// A matrix held in memory, initialized to zeros.
    pub fn in_memory(header: MatrixHeader) -> Result<Self> {
        let (rows, cols) = matrix_shape(&header)?;
        Self::from_array(header, Array2::zeros((rows, cols)))
    }

    /// A matrix held in memory, wrapping existing data of shape (rows, columns).
    pub fn from_array(header: MatrixHeader, data: Array2<f32>) -> Result<Self> {
        let (rows, cols) = matrix_shape(&header)?;
        if data.shape() != [rows, cols] {
            return Err(Error::format(format!(
                "data has shape {:?}, header describes {rows} x {cols}",
                data.shape()
            )));
        }

        Ok(Self {
            header,
            rows,
            cols,
            storage: Storage::Memory(data),
        })
    }

    pub fn header(&self) -> &MatrixHeader {
        &self.header
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.cols
    }

    /// Path of the backing file, `None` for matrices held in memory.
    pub fn path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::Memory(_) => None,
            Storage::Disk(disk) => Some(&disk.path),
        }
    }

    /// Read one row into a caller supplied buffer of length `column_count()`.
    pub fn read_row(&mut self, index: usize, row: &mut [f32]) -> Result<()> {
        self.check_row(index, row.len())?;
        match &mut self.storage {
            Storage::Memory(data) => {
                for (value, cell) in row.iter_mut().zip(data.row(index)) {
                    *value = *cell;
                }
            }
            Storage::Disk(disk) => {
                disk.seek_row(index, self.cols)?;
                disk.scratch.resize(disk.row_bytes(self.cols) as usize, 0);
                disk.file.read_exact(&mut disk.scratch)?;
                disk.data_type.decode(&disk.scratch, row);
            }
        }

        Ok(())
    }

    /// Write one row of length `column_count()`.
    pub fn write_row(&mut self, index: usize, row: &[f32]) -> Result<()> {
        self.check_row(index, row.len())?;
        match &mut self.storage {
            Storage::Memory(data) => {
                for (cell, value) in data.row_mut(index).iter_mut().zip(row) {
                    *cell = *value;
                }
            }
            Storage::Disk(disk) => {
                disk.seek_row(index, self.cols)?;
                disk.data_type.encode(row, &mut disk.scratch);
                disk.file.write_all(&disk.scratch)?;
            }
        }

        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Storage::Disk(disk) = &mut self.storage {
            disk.file.flush()?;
        }

        Ok(())
    }

    /// Read the whole matrix. Only sensible for small matrices.
    pub fn to_array(&mut self) -> Result<Array2<f32>> {
        let mut data = Array2::zeros((self.rows, self.cols));
        let mut row = vec![0.0; self.cols];
        for index in 0..self.rows {
            self.read_row(index, &mut row)?;
            for (cell, value) in data.row_mut(index).iter_mut().zip(&row) {
                *cell = *value;
            }
        }

        Ok(data)
    }

    fn check_row(&self, index: usize, len: usize) -> Result<()> {
        if index >= self.rows {
            return Err(Error::RowIndex {
                index,
                rows: self.rows,
            });
        }
        if len != self.cols {
            return Err(Error::RowLength {
                expected: self.cols,
                actual: len,
            });
        }

        Ok(())
    }
}

/// (rows, columns) of the matrix a header describes.
fn matrix_shape(header: &MatrixHeader) -> Result<(usize, usize)> {
    if header.axis_count() != 2 {
        return Err(Error::AxisCount(header.axis_count()));
    }
    let rows = header
        .dimension_length(ALONG_COLUMN)
        .ok_or(Error::UnresolvedLength(ALONG_COLUMN))?;
    let cols = header
        .dimension_length(ALONG_ROW)
        .ok_or(Error::UnresolvedLength(ALONG_ROW))?;

    Ok((rows, cols))
}

fn preamble_size(xml_len: usize) -> u64 {
    // magic + version + type + axes + 2 dims + xml length
    (2 + 4 + 4 + 4 + 8 + 8 + 4) + xml_len as u64
}

/// Bytes of cell data, or `None` if that doesn't fit in a `u64`.
fn data_size(rows: u64, cols: u64, data_type: DataType) -> Option<u64> {
    rows.checked_mul(cols)?
        .checked_mul(data_type.word_size() as u64)
}

fn align(offset: u64) -> u64 {
    (offset + ALIGNMENT - 1) / ALIGNMENT * ALIGNMENT
}
