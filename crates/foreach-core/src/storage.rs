//! Typed, flat element buffers.

use half::{bf16, f16};
use num_complex::Complex;

use crate::scalar::Scalar;
use crate::types::DType;

/// Flat element buffer, one variant per dtype.
///
/// Storage is always host memory; a tensor's `Device` tag does not change
/// where the bytes live.
#[derive(Clone, Debug, PartialEq)]
pub enum Storage {
    Bool(Vec<bool>),
    U8(Vec<u8>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F16(Vec<f16>),
    BF16(Vec<bf16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    C64(Vec<Complex<f32>>),
    C128(Vec<Complex<f64>>),
}

/// Apply `$body` to the inner vector of any storage variant.
macro_rules! each_variant {
    ($storage:expr, $data:ident => $body:expr) => {
        match $storage {
            Storage::Bool($data) => $body,
            Storage::U8($data) => $body,
            Storage::I8($data) => $body,
            Storage::I16($data) => $body,
            Storage::I32($data) => $body,
            Storage::I64($data) => $body,
            Storage::F16($data) => $body,
            Storage::BF16($data) => $body,
            Storage::F32($data) => $body,
            Storage::F64($data) => $body,
            Storage::C64($data) => $body,
            Storage::C128($data) => $body,
        }
    };
}

impl Storage {
    /// Zero-initialized storage of `len` elements.
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::Bool => Storage::Bool(vec![false; len]),
            DType::U8 => Storage::U8(vec![0; len]),
            DType::I8 => Storage::I8(vec![0; len]),
            DType::I16 => Storage::I16(vec![0; len]),
            DType::I32 => Storage::I32(vec![0; len]),
            DType::I64 => Storage::I64(vec![0; len]),
            DType::F16 => Storage::F16(vec![f16::ZERO; len]),
            DType::BF16 => Storage::BF16(vec![bf16::ZERO; len]),
            DType::F32 => Storage::F32(vec![0.0; len]),
            DType::F64 => Storage::F64(vec![0.0; len]),
            DType::C64 => Storage::C64(vec![Complex::new(0.0, 0.0); len]),
            DType::C128 => Storage::C128(vec![Complex::new(0.0, 0.0); len]),
        }
    }

    /// Storage of `len` copies of `value`, cast to `dtype`.
    pub fn full(dtype: DType, len: usize, value: Scalar) -> Self {
        let mut storage = Self::zeros(dtype, len);
        for i in 0..len {
            storage.set(i, value);
        }
        storage
    }

    /// Build storage of `dtype` from values, casting each one.
    pub fn from_scalars(dtype: DType, values: &[Scalar]) -> Self {
        let mut storage = Self::zeros(dtype, values.len());
        for (i, &v) in values.iter().enumerate() {
            storage.set(i, v);
        }
        storage
    }

    pub fn dtype(&self) -> DType {
        match self {
            Storage::Bool(_) => DType::Bool,
            Storage::U8(_) => DType::U8,
            Storage::I8(_) => DType::I8,
            Storage::I16(_) => DType::I16,
            Storage::I32(_) => DType::I32,
            Storage::I64(_) => DType::I64,
            Storage::F16(_) => DType::F16,
            Storage::BF16(_) => DType::BF16,
            Storage::F32(_) => DType::F32,
            Storage::F64(_) => DType::F64,
            Storage::C64(_) => DType::C64,
            Storage::C128(_) => DType::C128,
        }
    }

    pub fn len(&self) -> usize {
        each_variant!(self, data => data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read element `idx` as a scalar of this storage's category.
    ///
    /// Panics if `idx` is out of bounds, like slice indexing.
    pub fn get(&self, idx: usize) -> Scalar {
        match self {
            Storage::Bool(d) => Scalar::Bool(d[idx]),
            Storage::U8(d) => Scalar::Int(d[idx] as i64),
            Storage::I8(d) => Scalar::Int(d[idx] as i64),
            Storage::I16(d) => Scalar::Int(d[idx] as i64),
            Storage::I32(d) => Scalar::Int(d[idx] as i64),
            Storage::I64(d) => Scalar::Int(d[idx]),
            Storage::F16(d) => Scalar::Float(d[idx].to_f64()),
            Storage::BF16(d) => Scalar::Float(d[idx].to_f64()),
            Storage::F32(d) => Scalar::Float(d[idx] as f64),
            Storage::F64(d) => Scalar::Float(d[idx]),
            Storage::C64(d) => Scalar::Complex(Complex::new(d[idx].re as f64, d[idx].im as f64)),
            Storage::C128(d) => Scalar::Complex(d[idx]),
        }
    }

    /// Write `value` at `idx`, casting it to this storage's dtype.
    ///
    /// Integer narrowing wraps, float to integer truncates toward zero, and
    /// complex to real keeps the real part.
    pub fn set(&mut self, idx: usize, value: Scalar) {
        match self {
            Storage::Bool(d) => d[idx] = value.as_bool(),
            Storage::U8(d) => d[idx] = value.as_i64() as u8,
            Storage::I8(d) => d[idx] = value.as_i64() as i8,
            Storage::I16(d) => d[idx] = value.as_i64() as i16,
            Storage::I32(d) => d[idx] = value.as_i64() as i32,
            Storage::I64(d) => d[idx] = value.as_i64(),
            Storage::F16(d) => d[idx] = f16::from_f64(value.as_f64()),
            Storage::BF16(d) => d[idx] = bf16::from_f64(value.as_f64()),
            Storage::F32(d) => d[idx] = value.as_f64() as f32,
            Storage::F64(d) => d[idx] = value.as_f64(),
            Storage::C64(d) => {
                let c = value.as_complex();
                d[idx] = Complex::new(c.re as f32, c.im as f32);
            }
            Storage::C128(d) => d[idx] = value.as_complex(),
        }
    }
}
