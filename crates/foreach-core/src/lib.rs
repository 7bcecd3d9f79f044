//! Tensor primitives for batched elementwise operations.
//!
//! `foreach-core` provides the foundational types (`Tensor`, `Device`,
//! `DType`, `Shape`, `Scalar`) shared by the op layer and the foreach engine.
//! Tensors are strided views over host storage behind an `Arc<RwLock<_>>`, so
//! handles are cheap to clone and views alias their source.

pub mod element;
pub mod layout;
pub mod scalar;
pub mod storage;
pub mod tensor;
pub mod types;

pub use element::Element;
pub use layout::Layout;
pub use num_complex::{Complex, Complex32, Complex64};
pub use scalar::Scalar;
pub use storage::Storage;
pub use tensor::{Device, Tensor};
pub use types::{Category, DType, Shape};

pub type Result<T> = std::result::Result<T, TensorError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    #[error("tensor lists must have the same length, got {lhs} and {rhs}")]
    LengthMismatch { lhs: usize, rhs: usize },

    #[error("all tensors must have dtype {expected}, got {got}")]
    DtypeMismatch { expected: DType, got: DType },

    #[error("all tensors must be on device {expected}, got {got}")]
    DeviceMismatch { expected: Device, got: Device },

    #[error("{op} is not supported for dtype {dtype}")]
    Unsupported { op: &'static str, dtype: DType },

    #[error("result type {from} can't be cast to the desired output type {to}")]
    UnsafeCast { from: DType, to: DType },

    #[error("value cannot be converted to type {dtype} without overflow: {value}")]
    Overflow { dtype: DType, value: Scalar },

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
