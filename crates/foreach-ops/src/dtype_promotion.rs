//! DType promotion rules.
//!
//! Tensor/tensor promotion is a fixed lookup table indexed by
//! [`DType::index`]. Tensor/scalar promotion only compares categories: a
//! scalar moves the result to a wider category, never to a wider dtype within
//! the tensor's own category.

use foreach_core::{Category, DType};

use foreach_core::DType::{BF16, Bool, C64, C128, F16, F32, F64, I8, I16, I32, I64, U8};

/// Result dtype of a binary op between tensors of the row and column dtypes.
///
/// Row/column order is `DType::ALL`.
#[rustfmt::skip]
const PROMOTION_TABLE: [[DType; 12]; 12] = [
    /*       Bool  U8    I8    I16   I32   I64   F16   BF16  F32   F64   C64   C128 */
    /* Bool */ [Bool, U8,   I8,   I16,  I32,  I64,  F16,  BF16, F32,  F64,  C64,  C128],
    /* U8   */ [U8,   U8,   I16,  I16,  I32,  I64,  F16,  BF16, F32,  F64,  C64,  C128],
    /* I8   */ [I8,   I16,  I8,   I16,  I32,  I64,  F16,  BF16, F32,  F64,  C64,  C128],
    /* I16  */ [I16,  I16,  I16,  I16,  I32,  I64,  F16,  BF16, F32,  F64,  C64,  C128],
    /* I32  */ [I32,  I32,  I32,  I32,  I32,  I64,  F16,  BF16, F32,  F64,  C64,  C128],
    /* I64  */ [I64,  I64,  I64,  I64,  I64,  I64,  F16,  BF16, F32,  F64,  C64,  C128],
    /* F16  */ [F16,  F16,  F16,  F16,  F16,  F16,  F16,  F32,  F32,  F64,  C64,  C128],
    /* BF16 */ [BF16, BF16, BF16, BF16, BF16, BF16, F32,  BF16, F32,  F64,  C64,  C128],
    /* F32  */ [F32,  F32,  F32,  F32,  F32,  F32,  F32,  F32,  F32,  F64,  C64,  C128],
    /* F64  */ [F64,  F64,  F64,  F64,  F64,  F64,  F64,  F64,  F64,  F64,  C128, C128],
    /* C64  */ [C64,  C64,  C64,  C64,  C64,  C64,  C64,  C64,  C64,  C128, C64,  C128],
    /* C128 */ [C128, C128, C128, C128, C128, C128, C128, C128, C128, C128, C128, C128],
];

/// Promote two tensor dtypes to a common result dtype.
pub fn promote(a: DType, b: DType) -> DType {
    PROMOTION_TABLE[a.index()][b.index()]
}

/// Result dtype of a tensor of `dtype` combined with a scalar of `kind`.
///
/// - scalar category not above the tensor's → the tensor dtype
/// - int scalar with a bool tensor → I64
/// - float scalar with a bool/integral tensor → F32
/// - complex scalar with a real tensor → C128 for F64, otherwise C64
pub fn promote_with_scalar(dtype: DType, kind: Category) -> DType {
    if kind <= dtype.category() {
        return dtype;
    }
    match kind {
        Category::Bool => dtype,
        Category::Integral => DType::DEFAULT_INT,
        Category::Floating => DType::DEFAULT_FLOAT,
        Category::Complex => dtype.to_complex(),
    }
}

/// Whether a value of dtype `from` may be stored into a tensor of `to`.
///
/// Complex to real, floating to integral/bool, and anything but bool to bool
/// are rejected; every other conversion is allowed.
pub fn can_cast(from: DType, to: DType) -> bool {
    if from.is_complex() && !to.is_complex() {
        return false;
    }
    if from.is_floating() && (to.is_integral() || to.is_bool()) {
        return false;
    }
    if !from.is_bool() && to.is_bool() {
        return false;
    }
    true
}
