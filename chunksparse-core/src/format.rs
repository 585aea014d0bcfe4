//! Compressed matrix format definitions
//!
//! This module defines the format tag, element data types and the shape
//! bookkeeping that maps (rows, cols) onto (major, minor) axes.

/// Compressed layout of a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MatrixFormat {
    /// Compressed Sparse Row: major axis is rows
    Csr,
    /// Compressed Sparse Column: major axis is columns
    Csc,
}

impl MatrixFormat {
    /// The dual layout, used by transpose
    pub const fn flipped(self) -> Self {
        match self {
            MatrixFormat::Csr => MatrixFormat::Csc,
            MatrixFormat::Csc => MatrixFormat::Csr,
        }
    }
}

impl core::fmt::Display for MatrixFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MatrixFormat::Csr => write!(f, "CSR"),
            MatrixFormat::Csc => write!(f, "CSC"),
        }
    }
}

/// Element data types that can back a values array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DataType {
    F32,
    F64,
    I32,
    I64,
    U32,
    U64,
}

impl DataType {
    /// Get the size in bytes for this data type
    pub const fn size_bytes(&self) -> usize {
        match self {
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 | DataType::I64 | DataType::U64 => 8,
        }
    }
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DataType::F32 => write!(f, "f32"),
            DataType::F64 => write!(f, "f64"),
            DataType::I32 => write!(f, "i32"),
            DataType::I64 => write!(f, "i64"),
            DataType::U32 => write!(f, "u32"),
            DataType::U64 => write!(f, "u64"),
        }
    }
}

/// Matrix dimensions as (rows, cols)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
}

impl Shape {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Build a shape from major/minor extents under the given layout
    pub const fn from_major_minor(format: MatrixFormat, major: usize, minor: usize) -> Self {
        match format {
            MatrixFormat::Csr => Self::new(major, minor),
            MatrixFormat::Csc => Self::new(minor, major),
        }
    }

    /// Extent of the segmented axis
    pub const fn major(&self, format: MatrixFormat) -> usize {
        match format {
            MatrixFormat::Csr => self.rows,
            MatrixFormat::Csc => self.cols,
        }
    }

    /// Extent of the axis stored inside each segment
    pub const fn minor(&self, format: MatrixFormat) -> usize {
        match format {
            MatrixFormat::Csr => self.cols,
            MatrixFormat::Csc => self.rows,
        }
    }

    /// Order a (row, col) pair as (major, minor)
    pub fn to_major_minor<A>(format: MatrixFormat, row: A, col: A) -> (A, A) {
        match format {
            MatrixFormat::Csr => (row, col),
            MatrixFormat::Csc => (col, row),
        }
    }

    pub const fn transposed(&self) -> Self {
        Self::new(self.cols, self.rows)
    }

    /// Number of cells if the matrix were dense
    pub const fn size(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }
}

impl From<(usize, usize)> for Shape {
    fn from((rows, cols): (usize, usize)) -> Self {
        Self::new(rows, cols)
    }
}

impl core::fmt::Display for Shape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Metadata record persisted alongside the three arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatrixMetadata {
    pub shape: Shape,
    pub data_type: DataType,
    pub format: MatrixFormat,
    /// Layout version of the persisted record
    pub version: u8,
}

impl MatrixMetadata {
    /// Current layout version
    pub const VERSION: u8 = 1;

    pub const fn new(shape: Shape, data_type: DataType, format: MatrixFormat) -> Self {
        Self {
            shape,
            data_type,
            format,
            version: Self::VERSION,
        }
    }

    /// Validate the record version
    pub fn is_valid(&self) -> bool {
        self.version >= 1 && self.version <= Self::VERSION
    }
}
