//! Type promotion, broadcasting rules, op inference, and per-tensor kernels.
//!
//! Everything here works on one tensor (or one index of a batched call) at a
//! time. `foreach-engine` builds list validation and fused dispatch on top.

pub mod broadcast;
pub mod dtype_promotion;
pub mod kernels;
pub mod op;
pub mod pointwise;

pub use broadcast::{broadcast_all, broadcast_shapes};
pub use dtype_promotion::{can_cast, promote, promote_with_scalar};
pub use op::{OpKind, OperandType, check_inplace, infer_dtype, infer_shape};
pub use pointwise::{Operand, PointwiseExt};
