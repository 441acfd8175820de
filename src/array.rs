// stream-v2 - Detector stream v2 message decoding
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Typed n-dimensional arrays
//!
//! This module defines the array values produced by the tag registry and the
//! channel dispatcher:
//! - Element kinds, widths and byte orders
//! - Reinterpretation of raw bytes as flat typed arrays
//! - Reshaping in row-major or column-major element order

use crate::error::ArrayError;
use crate::value::Value;
use half::f16;
use ndarray::{Array1, ArrayD, IxDyn, ShapeBuilder};
use std::fmt;

/// Numeric class of an array element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Unsigned integer
    Unsigned,
    /// Two's complement signed integer
    Signed,
    /// IEEE 754 binary float
    Float,
    /// Boxed [`Value`] (heterogeneous contents)
    Object,
}

impl ElementKind {
    fn name(&self) -> &'static str {
        match self {
            Self::Unsigned => "unsigned integer",
            Self::Signed => "signed integer",
            Self::Float => "float",
            Self::Object => "object",
        }
    }
}

/// Byte order of multi-byte elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Most significant byte first
    #[default]
    BigEndian,
    /// Least significant byte first
    LittleEndian,
}

/// Element order used when flattening or filling an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    /// C order, last axis varies fastest
    #[default]
    RowMajor,
    /// Fortran order, first axis varies fastest
    ColumnMajor,
}

/// Fixed-width element encoding of a typed array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementFormat {
    kind: ElementKind,
    width: usize,
    order: ByteOrder,
}

impl ElementFormat {
    /// Create a format, rejecting combinations with no element type
    pub fn new(kind: ElementKind, width: usize, order: ByteOrder) -> Result<Self, ArrayError> {
        let supported = match kind {
            ElementKind::Unsigned | ElementKind::Signed => matches!(width, 1 | 2 | 4 | 8),
            ElementKind::Float => matches!(width, 2 | 4 | 8 | 16),
            ElementKind::Object => false,
        };
        if !supported {
            return Err(ArrayError::UnsupportedFormat {
                kind: kind.name(),
                width,
            });
        }
        Ok(Self { kind, width, order })
    }

    pub(crate) const fn unsigned(width: usize, order: ByteOrder) -> Self {
        Self {
            kind: ElementKind::Unsigned,
            width,
            order,
        }
    }

    pub(crate) const fn signed(width: usize, order: ByteOrder) -> Self {
        Self {
            kind: ElementKind::Signed,
            width,
            order,
        }
    }

    pub(crate) const fn float(width: usize, order: ByteOrder) -> Self {
        Self {
            kind: ElementKind::Float,
            width,
            order,
        }
    }

    /// Element kind
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Element width in bytes
    pub fn width(&self) -> usize {
        self.width
    }

    /// Byte order (meaningless for width 1)
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Reinterpret `bytes` as a flat, one-dimensional array of this format
    pub fn decode(&self, bytes: &[u8]) -> Result<NdArray, ArrayError> {
        if bytes.len() % self.width != 0 {
            return Err(ArrayError::ByteLengthMismatch {
                length: bytes.len(),
                element_width: self.width,
            });
        }

        let big = self.order == ByteOrder::BigEndian;
        let array = match (self.kind, self.width) {
            (ElementKind::Unsigned, 1) => NdArray::U8(flat(bytes.to_vec())),
            (ElementKind::Unsigned, 2) => {
                NdArray::U16(elements(bytes, big, u16::from_be_bytes, u16::from_le_bytes))
            }
            (ElementKind::Unsigned, 4) => {
                NdArray::U32(elements(bytes, big, u32::from_be_bytes, u32::from_le_bytes))
            }
            (ElementKind::Unsigned, 8) => {
                NdArray::U64(elements(bytes, big, u64::from_be_bytes, u64::from_le_bytes))
            }
            (ElementKind::Signed, 1) => NdArray::I8(flat(read(bytes, i8::from_be_bytes))),
            (ElementKind::Signed, 2) => {
                NdArray::I16(elements(bytes, big, i16::from_be_bytes, i16::from_le_bytes))
            }
            (ElementKind::Signed, 4) => {
                NdArray::I32(elements(bytes, big, i32::from_be_bytes, i32::from_le_bytes))
            }
            (ElementKind::Signed, 8) => {
                NdArray::I64(elements(bytes, big, i64::from_be_bytes, i64::from_le_bytes))
            }
            (ElementKind::Float, 2) => {
                let bits = elements(bytes, big, u16::from_be_bytes, u16::from_le_bytes);
                NdArray::F16(bits.mapv(f16::from_bits))
            }
            (ElementKind::Float, 4) => {
                NdArray::F32(elements(bytes, big, f32::from_be_bytes, f32::from_le_bytes))
            }
            (ElementKind::Float, 8) => {
                NdArray::F64(elements(bytes, big, f64::from_be_bytes, f64::from_le_bytes))
            }
            (ElementKind::Float, 16) => {
                NdArray::F128(elements(bytes, big, u128::from_be_bytes, u128::from_le_bytes))
            }
            (kind, width) => {
                return Err(ArrayError::UnsupportedFormat {
                    kind: kind.name(),
                    width,
                })
            }
        };
        Ok(array)
    }
}

impl fmt::Display for ElementFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = match (self.width, self.order) {
            (1, _) => '|',
            (_, ByteOrder::BigEndian) => '>',
            (_, ByteOrder::LittleEndian) => '<',
        };
        let kind = match self.kind {
            ElementKind::Unsigned => 'u',
            ElementKind::Signed => 'i',
            ElementKind::Float => 'f',
            ElementKind::Object => 'O',
        };
        write!(f, "{}{}{}", order, kind, self.width)
    }
}

fn elements<const N: usize, T>(
    bytes: &[u8],
    big_endian: bool,
    be: fn([u8; N]) -> T,
    le: fn([u8; N]) -> T,
) -> ArrayD<T> {
    flat(read(bytes, if big_endian { be } else { le }))
}

/// Split `bytes` into `N`-byte elements; callers check the length first
fn read<const N: usize, T>(bytes: &[u8], convert: fn([u8; N]) -> T) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut buf = [0u8; N];
            buf.copy_from_slice(chunk);
            convert(buf)
        })
        .collect()
}

fn flat<T>(elements: Vec<T>) -> ArrayD<T> {
    Array1::from_vec(elements).into_dyn()
}

/// Number of elements described by `dimensions`, `None` on overflow
pub fn element_count(dimensions: &[usize]) -> Option<usize> {
    dimensions
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// Reshape `array` to `dimensions`, reading and filling in `layout` order
fn reshape_elements<T: Clone>(
    array: ArrayD<T>,
    dimensions: &[usize],
    layout: Layout,
) -> Result<ArrayD<T>, ArrayError> {
    let mismatch = || ArrayError::ShapeMismatch {
        dimensions: dimensions.to_vec(),
        element_count: array.len(),
    };
    match element_count(dimensions) {
        Some(n) if n == array.len() => {}
        _ => return Err(mismatch()),
    }

    let result = match layout {
        Layout::RowMajor => {
            let elements = if array.is_standard_layout() {
                array.into_raw_vec()
            } else {
                array.iter().cloned().collect()
            };
            ArrayD::from_shape_vec(IxDyn(dimensions), elements)
        }
        Layout::ColumnMajor => {
            // The transposed view iterates the source in Fortran order.
            let elements: Vec<T> = array.t().iter().cloned().collect();
            ArrayD::from_shape_vec(IxDyn(dimensions).f(), elements)
        }
    };
    result.map_err(|e| ArrayError::MalformedPayload(format!("reshape failed: {}", e)))
}

/// A decoded n-dimensional array of one element type
#[derive(Debug, Clone, PartialEq)]
pub enum NdArray {
    /// Unsigned 8-bit
    U8(ArrayD<u8>),
    /// Unsigned 16-bit
    U16(ArrayD<u16>),
    /// Unsigned 32-bit
    U32(ArrayD<u32>),
    /// Unsigned 64-bit
    U64(ArrayD<u64>),
    /// Signed 8-bit
    I8(ArrayD<i8>),
    /// Signed 16-bit
    I16(ArrayD<i16>),
    /// Signed 32-bit
    I32(ArrayD<i32>),
    /// Signed 64-bit
    I64(ArrayD<i64>),
    /// IEEE half precision
    F16(ArrayD<f16>),
    /// IEEE single precision
    F32(ArrayD<f32>),
    /// IEEE double precision
    F64(ArrayD<f64>),
    /// IEEE quad precision, kept as the raw binary128 bit pattern
    F128(ArrayD<u128>),
    /// Boxed heterogeneous elements
    Object(ArrayD<Value>),
}

macro_rules! each_array {
    ($value:expr, $array:ident => $body:expr) => {
        match $value {
            NdArray::U8($array) => $body,
            NdArray::U16($array) => $body,
            NdArray::U32($array) => $body,
            NdArray::U64($array) => $body,
            NdArray::I8($array) => $body,
            NdArray::I16($array) => $body,
            NdArray::I32($array) => $body,
            NdArray::I64($array) => $body,
            NdArray::F16($array) => $body,
            NdArray::F32($array) => $body,
            NdArray::F64($array) => $body,
            NdArray::F128($array) => $body,
            NdArray::Object($array) => $body,
        }
    };
}

macro_rules! map_array {
    ($value:expr, $array:ident => $body:expr) => {
        match $value {
            NdArray::U8($array) => NdArray::U8($body),
            NdArray::U16($array) => NdArray::U16($body),
            NdArray::U32($array) => NdArray::U32($body),
            NdArray::U64($array) => NdArray::U64($body),
            NdArray::I8($array) => NdArray::I8($body),
            NdArray::I16($array) => NdArray::I16($body),
            NdArray::I32($array) => NdArray::I32($body),
            NdArray::I64($array) => NdArray::I64($body),
            NdArray::F16($array) => NdArray::F16($body),
            NdArray::F32($array) => NdArray::F32($body),
            NdArray::F64($array) => NdArray::F64($body),
            NdArray::F128($array) => NdArray::F128($body),
            NdArray::Object($array) => NdArray::Object($body),
        }
    };
}

impl NdArray {
    /// Box a sequence of values as a flat object array
    pub fn from_values(values: Vec<Value>) -> Self {
        Self::Object(flat(values))
    }

    /// Array dimensions
    pub fn shape(&self) -> &[usize] {
        each_array!(self, a => a.shape())
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        each_array!(self, a => a.len())
    }

    /// Check if the array has no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element kind
    pub fn element_kind(&self) -> ElementKind {
        match self {
            Self::U8(_) | Self::U16(_) | Self::U32(_) | Self::U64(_) => ElementKind::Unsigned,
            Self::I8(_) | Self::I16(_) | Self::I32(_) | Self::I64(_) => ElementKind::Signed,
            Self::F16(_) | Self::F32(_) | Self::F64(_) | Self::F128(_) => ElementKind::Float,
            Self::Object(_) => ElementKind::Object,
        }
    }

    /// Elements as integers, for integer arrays only (row-major order)
    pub fn to_integers(&self) -> Option<Vec<i128>> {
        let values = match self {
            Self::U8(a) => a.iter().map(|&v| i128::from(v)).collect(),
            Self::U16(a) => a.iter().map(|&v| i128::from(v)).collect(),
            Self::U32(a) => a.iter().map(|&v| i128::from(v)).collect(),
            Self::U64(a) => a.iter().map(|&v| i128::from(v)).collect(),
            Self::I8(a) => a.iter().map(|&v| i128::from(v)).collect(),
            Self::I16(a) => a.iter().map(|&v| i128::from(v)).collect(),
            Self::I32(a) => a.iter().map(|&v| i128::from(v)).collect(),
            Self::I64(a) => a.iter().map(|&v| i128::from(v)).collect(),
            _ => return None,
        };
        Some(values)
    }

    /// Reshape to `dimensions`, reading and filling elements in `layout` order
    pub fn reshape(self, dimensions: &[usize], layout: Layout) -> Result<Self, ArrayError> {
        Ok(map_array!(self, a => reshape_elements(a, dimensions, layout)?))
    }
}

impl fmt::Display for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dtype = match self {
            Self::U8(_) => "uint8",
            Self::U16(_) => "uint16",
            Self::U32(_) => "uint32",
            Self::U64(_) => "uint64",
            Self::I8(_) => "int8",
            Self::I16(_) => "int16",
            Self::I32(_) => "int32",
            Self::I64(_) => "int64",
            Self::F16(_) => "float16",
            Self::F32(_) => "float32",
            Self::F64(_) => "float64",
            Self::F128(_) => "float128",
            Self::Object(_) => "object",
        };
        write!(f, "array(shape={:?}, dtype={})", self.shape(), dtype)
    }
}
