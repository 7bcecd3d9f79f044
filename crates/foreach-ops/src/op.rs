//! Op descriptors and result inference.
//!
//! Given an `OpKind` and its operand types, computes the result dtype and
//! shape, and rejects dtype/op combinations the kernels do not support.

use foreach_core::{Category, DType, Result, Scalar, Shape, TensorError};

use crate::dtype_promotion::{can_cast, promote, promote_with_scalar};

/// Elementwise operation kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// `a + alpha * b`
    Add,
    /// `a - alpha * b`
    Sub,
    Mul,
    Div,
    /// `base + value * a * b`
    Addcmul,
    /// `base + value * (a / b)`
    Addcdiv,
    Sqrt,
    Exp,
    Neg,
}

impl OpKind {
    /// Number of operands, including the tensor the op is applied to.
    pub fn arity(self) -> usize {
        match self {
            OpKind::Sqrt | OpKind::Exp | OpKind::Neg => 1,
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div => 2,
            OpKind::Addcmul | OpKind::Addcdiv => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Mul => "mul",
            OpKind::Div => "div",
            OpKind::Addcmul => "addcmul",
            OpKind::Addcdiv => "addcdiv",
            OpKind::Sqrt => "sqrt",
            OpKind::Exp => "exp",
            OpKind::Neg => "neg",
        }
    }

    /// Name of the scalar multiplier this op accepts, if any.
    pub fn coefficient_name(self) -> Option<&'static str> {
        match self {
            OpKind::Add | OpKind::Sub => Some("alpha"),
            OpKind::Addcmul | OpKind::Addcdiv => Some("value"),
            _ => None,
        }
    }

    /// Ops that always produce a floating (or complex) result.
    pub fn is_float_op(self) -> bool {
        matches!(self, OpKind::Sqrt | OpKind::Exp)
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Type information for one operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandType {
    Tensor(DType),
    Scalar(Category),
}

/// Infer the result dtype of `op` over `operands`.
///
/// The first operand must be a tensor. Tensor dtypes are promoted through
/// the table first; scalars can then only raise the result's category.
pub fn infer_dtype(op: OpKind, operands: &[OperandType], coeff: Option<Scalar>) -> Result<DType> {
    if operands.len() != op.arity() {
        return Err(TensorError::InvalidArgument(format!(
            "{op} expects {} operands, got {}",
            op.arity(),
            operands.len()
        )));
    }
    let mut dtype = match operands.first() {
        Some(OperandType::Tensor(d)) => *d,
        _ => {
            return Err(TensorError::InvalidArgument(format!(
                "{op} must be applied to a tensor"
            )));
        }
    };
    for operand in operands {
        if let OperandType::Tensor(d) = operand {
            dtype = promote(dtype, *d);
        }
    }
    for operand in operands {
        if let OperandType::Scalar(kind) = operand {
            dtype = promote_with_scalar(dtype, *kind);
        }
    }
    if op.is_float_op() && !(dtype.is_floating() || dtype.is_complex()) {
        dtype = DType::DEFAULT_FLOAT;
    }

    check_support(op, dtype)?;
    if let Some(c) = coeff {
        check_coefficient(op, c, dtype)?;
    }
    Ok(dtype)
}

/// Reject op/dtype pairs without a kernel.
pub fn check_support(op: OpKind, dtype: DType) -> Result<()> {
    let supported = match op {
        OpKind::Sub | OpKind::Neg | OpKind::Addcmul => !dtype.is_bool(),
        OpKind::Div | OpKind::Addcdiv => dtype.is_floating() || dtype.is_complex(),
        OpKind::Add | OpKind::Mul | OpKind::Sqrt | OpKind::Exp => true,
    };
    if supported {
        Ok(())
    } else {
        Err(TensorError::Unsupported {
            op: op.name(),
            dtype,
        })
    }
}

/// Validate an `alpha`/`value` multiplier against the result dtype.
pub fn check_coefficient(op: OpKind, coeff: Scalar, result: DType) -> Result<()> {
    let name = op.coefficient_name().ok_or_else(|| {
        TensorError::InvalidArgument(format!("{op} does not take a scalar multiplier"))
    })?;
    if matches!(coeff, Scalar::Bool(_)) && !result.is_bool() {
        return Err(TensorError::InvalidArgument(format!(
            "boolean {name} only supported for boolean results"
        )));
    }
    if (result.is_integral() || result.is_bool()) && !coeff.is_integral(true) {
        return Err(TensorError::InvalidArgument(format!(
            "for integral input tensors, argument {name} must not be a floating point number"
        )));
    }
    if matches!(coeff, Scalar::Complex(_)) && !result.is_complex() {
        return Err(TensorError::InvalidArgument(format!(
            "complex {name} requires a complex result, got {result}"
        )));
    }
    Ok(())
}

/// Broadcast the shapes of all tensor operands.
pub fn infer_shape(shapes: &[&Shape]) -> Result<Shape> {
    let mut acc = Shape::scalar();
    for s in shapes {
        acc = crate::broadcast_shapes(&acc, s).ok_or_else(|| TensorError::ShapeMismatch {
            expected: acc.0.clone(),
            got: s.0.clone(),
        })?;
    }
    Ok(acc)
}

/// Check that a result can be written back into an in-place destination.
pub fn check_inplace(
    result_dtype: DType,
    result_shape: &Shape,
    dest_dtype: DType,
    dest_shape: &Shape,
) -> Result<()> {
    if !can_cast(result_dtype, dest_dtype) {
        return Err(TensorError::UnsafeCast {
            from: result_dtype,
            to: dest_dtype,
        });
    }
    if result_shape != dest_shape {
        return Err(TensorError::ShapeMismatch {
            expected: dest_shape.0.clone(),
            got: result_shape.0.clone(),
        });
    }
    Ok(())
}
