//! Element trait for mapping Rust types to DType.

use half::{bf16, f16};
use num_complex::Complex;

use crate::scalar::Scalar;
use crate::storage::Storage;
use crate::types::DType;

/// Trait for Rust types that can be elements of a tensor.
///
/// Connects the static Rust type to the runtime dtype tag and to the
/// matching `Storage` variant.
pub trait Element: Copy + Send + Sync + 'static {
    /// The corresponding DType for this Rust type.
    const DTYPE: DType;

    /// Wrap a vector of elements as typed storage.
    fn into_storage(data: Vec<Self>) -> Storage;

    /// Borrow the typed vector out of `storage`, if the dtype matches.
    fn slice(storage: &Storage) -> Option<&[Self]>;

    fn to_scalar(self) -> Scalar;
}

macro_rules! impl_element {
    ($ty:ty, $dtype:ident, |$v:ident| $to_scalar:expr) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;

            fn into_storage(data: Vec<Self>) -> Storage {
                Storage::$dtype(data)
            }

            fn slice(storage: &Storage) -> Option<&[Self]> {
                match storage {
                    Storage::$dtype(data) => Some(data),
                    _ => None,
                }
            }

            #[inline]
            fn to_scalar(self) -> Scalar {
                let $v = self;
                $to_scalar
            }
        }
    };
}

impl_element!(bool, Bool, |v| Scalar::Bool(v));
impl_element!(u8, U8, |v| Scalar::Int(v as i64));
impl_element!(i8, I8, |v| Scalar::Int(v as i64));
impl_element!(i16, I16, |v| Scalar::Int(v as i64));
impl_element!(i32, I32, |v| Scalar::Int(v as i64));
impl_element!(i64, I64, |v| Scalar::Int(v));
impl_element!(f16, F16, |v| Scalar::Float(v.to_f64()));
impl_element!(bf16, BF16, |v| Scalar::Float(v.to_f64()));
impl_element!(f32, F32, |v| Scalar::Float(v as f64));
impl_element!(f64, F64, |v| Scalar::Float(v));
impl_element!(Complex<f32>, C64, |v| Scalar::Complex(Complex::new(
    v.re as f64,
    v.im as f64
)));
impl_element!(Complex<f64>, C128, |v| Scalar::Complex(v));
