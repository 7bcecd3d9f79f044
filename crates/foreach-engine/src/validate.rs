//! List validation for batched calls.
//!
//! Every index is checked before anything executes, so a rejected in-place
//! call leaves all of its tensors untouched.

use foreach_core::{Category, DType, Device, Result, Scalar, Tensor, TensorError};
use foreach_ops::OpKind;
use foreach_ops::pointwise::{Operand, Prepared, prepare, prepare_inplace};
use smallvec::SmallVec;

use crate::rhs::Rhs;

/// One batched call: `op` applied to `base[i]` and the `i`-th entry of every
/// argument.
#[derive(Clone, Debug)]
pub struct Batch<'a> {
    pub op: OpKind,
    pub base: &'a [Tensor],
    pub args: SmallVec<[Rhs<'a>; 2]>,
    pub coeff: Option<Scalar>,
    pub inplace: bool,
}

impl<'a> Batch<'a> {
    pub fn new(op: OpKind, base: &'a [Tensor], inplace: bool) -> Self {
        Self {
            op,
            base,
            args: SmallVec::new(),
            coeff: None,
            inplace,
        }
    }

    pub fn arg(mut self, rhs: Rhs<'a>) -> Self {
        self.args.push(rhs);
        self
    }

    pub fn coeff(mut self, coeff: Option<Scalar>) -> Self {
        self.coeff = coeff;
        self
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Operands for index `i`, base tensor first.
    pub fn operands(&self, i: usize) -> SmallVec<[Operand<'a>; 3]> {
        let mut ops = SmallVec::new();
        ops.push(Operand::Tensor(&self.base[i]));
        for arg in &self.args {
            ops.push(match *arg {
                Rhs::Scalar(s) => Operand::Scalar(s),
                Rhs::Scalars(s) => Operand::Scalar(s[i]),
                Rhs::Tensors(t) => Operand::Tensor(&t[i]),
            });
        }
        ops
    }

    /// Every tensor list in the call, base first.
    pub fn tensor_lists(&self) -> impl Iterator<Item = &'a [Tensor]> + '_ {
        std::iter::once(self.base).chain(self.args.iter().filter_map(|arg| match *arg {
            Rhs::Tensors(t) => Some(t),
            _ => None,
        }))
    }
}

/// Validate `batch` and infer each index's result dtype and shape.
///
/// An empty batch validates to an empty result.
pub fn validate(batch: &Batch<'_>) -> Result<Vec<Prepared>> {
    let n = batch.len();
    for arg in &batch.args {
        if let Some(len) = arg.len()
            && len != n
        {
            return Err(TensorError::LengthMismatch { lhs: n, rhs: len });
        }
    }
    let Some(first) = batch.base.first() else {
        return Ok(Vec::new());
    };

    let (dtype, device) = (first.dtype(), *first.device());
    for list in batch.tensor_lists() {
        for t in list {
            if t.dtype() != dtype {
                return Err(TensorError::DtypeMismatch {
                    expected: dtype,
                    got: t.dtype(),
                });
            }
            if *t.device() != device {
                return Err(TensorError::DeviceMismatch {
                    expected: device,
                    got: *t.device(),
                });
            }
        }
    }

    (0..n)
        .map(|i| {
            let operands = batch.operands(i);
            check_overflow(&operands, dtype, device)?;
            if batch.inplace {
                prepare_inplace(batch.op, &operands, batch.coeff)
            } else {
                prepare(batch.op, &operands, batch.coeff)
            }
        })
        .collect()
}

/// On `Gpu`, a complex scalar with a non-zero imaginary part can't be
/// combined with a real floating tensor.
fn check_overflow(operands: &[Operand<'_>], dtype: DType, device: Device) -> Result<()> {
    if device != Device::Gpu || dtype.category() != Category::Floating {
        return Ok(());
    }
    for operand in operands {
        if let Operand::Scalar(value @ Scalar::Complex(c)) = *operand
            && c.im != 0.0
        {
            return Err(TensorError::Overflow { dtype, value });
        }
    }
    Ok(())
}
