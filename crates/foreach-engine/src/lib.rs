//! Batched ("foreach") elementwise ops over lists of tensors.
//!
//! Each `foreach_*` function applies one op to every index of its tensor
//! lists in a single call. Lists are validated as a whole (lengths, dtype,
//! device, per-index shapes and promotion) before anything runs. Eligible
//! batches then execute on a fused, chunked path; everything else loops over
//! the per-tensor ops in `foreach-ops`. Both paths produce identical results.
//!
//! The free functions use a process-wide [`Engine`] configured from
//! `FOREACH_RS_DISPATCH` and `FOREACH_RS_CHUNK_SIZE`. Construct an `Engine`
//! directly for an explicit configuration.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod fused;
pub mod rhs;
pub mod validate;

pub use config::{DispatchConfig, DispatchMode};
pub use dispatch::{DispatchPath, FallbackReason, FusedPlan};
pub use engine::{DispatchStats, Engine, default_engine};
pub use rhs::Rhs;
pub use validate::Batch;

use foreach_core::{Result, Scalar, Tensor};

pub fn foreach_add<'a>(
    list: &'a [Tensor],
    other: impl Into<Rhs<'a>>,
    alpha: Option<Scalar>,
) -> Result<Vec<Tensor>> {
    default_engine().add(list, other, alpha)
}

pub fn foreach_add_<'a>(
    list: &'a [Tensor],
    other: impl Into<Rhs<'a>>,
    alpha: Option<Scalar>,
) -> Result<()> {
    default_engine().add_(list, other, alpha)
}

pub fn foreach_sub<'a>(
    list: &'a [Tensor],
    other: impl Into<Rhs<'a>>,
    alpha: Option<Scalar>,
) -> Result<Vec<Tensor>> {
    default_engine().sub(list, other, alpha)
}

pub fn foreach_sub_<'a>(
    list: &'a [Tensor],
    other: impl Into<Rhs<'a>>,
    alpha: Option<Scalar>,
) -> Result<()> {
    default_engine().sub_(list, other, alpha)
}

pub fn foreach_mul<'a>(list: &'a [Tensor], other: impl Into<Rhs<'a>>) -> Result<Vec<Tensor>> {
    default_engine().mul(list, other)
}

pub fn foreach_mul_<'a>(list: &'a [Tensor], other: impl Into<Rhs<'a>>) -> Result<()> {
    default_engine().mul_(list, other)
}

/// Fails with `Unsupported` when the result dtype is integral or bool.
pub fn foreach_div<'a>(list: &'a [Tensor], other: impl Into<Rhs<'a>>) -> Result<Vec<Tensor>> {
    default_engine().div(list, other)
}

pub fn foreach_div_<'a>(list: &'a [Tensor], other: impl Into<Rhs<'a>>) -> Result<()> {
    default_engine().div_(list, other)
}

pub fn foreach_addcmul(
    list: &[Tensor],
    a: &[Tensor],
    b: &[Tensor],
    value: impl Into<Scalar>,
) -> Result<Vec<Tensor>> {
    default_engine().addcmul(list, a, b, value)
}

pub fn foreach_addcmul_(
    list: &[Tensor],
    a: &[Tensor],
    b: &[Tensor],
    value: impl Into<Scalar>,
) -> Result<()> {
    default_engine().addcmul_(list, a, b, value)
}

pub fn foreach_addcdiv(
    list: &[Tensor],
    a: &[Tensor],
    b: &[Tensor],
    value: impl Into<Scalar>,
) -> Result<Vec<Tensor>> {
    default_engine().addcdiv(list, a, b, value)
}

pub fn foreach_addcdiv_(
    list: &[Tensor],
    a: &[Tensor],
    b: &[Tensor],
    value: impl Into<Scalar>,
) -> Result<()> {
    default_engine().addcdiv_(list, a, b, value)
}

pub fn foreach_sqrt(list: &[Tensor]) -> Result<Vec<Tensor>> {
    default_engine().sqrt(list)
}

pub fn foreach_sqrt_(list: &[Tensor]) -> Result<()> {
    default_engine().sqrt_(list)
}

pub fn foreach_exp(list: &[Tensor]) -> Result<Vec<Tensor>> {
    default_engine().exp(list)
}

pub fn foreach_exp_(list: &[Tensor]) -> Result<()> {
    default_engine().exp_(list)
}

pub fn foreach_neg(list: &[Tensor]) -> Result<Vec<Tensor>> {
    default_engine().neg(list)
}

pub fn foreach_neg_(list: &[Tensor]) -> Result<()> {
    default_engine().neg_(list)
}
