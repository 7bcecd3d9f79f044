//! Per-tensor elementwise ops with broadcasting and type promotion.
//!
//! These are the building blocks the foreach engine falls back to when a
//! batch cannot take the fused path. Each op reads a snapshot of every
//! operand before anything is written, so in-place ops on aliased or
//! expanded tensors see the original values.

use foreach_core::{Complex64, DType, Device, Result, Scalar, Shape, Tensor, TensorError};

use crate::kernels::{eval_binary, eval_ternary, eval_unary};
use crate::op::{OpKind, OperandType, check_inplace, infer_dtype, infer_shape};

/// A tensor or scalar argument to an elementwise op.
#[derive(Clone, Copy, Debug)]
pub enum Operand<'a> {
    Tensor(&'a Tensor),
    Scalar(Scalar),
}

impl Operand<'_> {
    pub fn operand_type(&self) -> OperandType {
        match self {
            Operand::Tensor(t) => OperandType::Tensor(t.dtype()),
            Operand::Scalar(s) => OperandType::Scalar(s.category()),
        }
    }
}

impl<'a> From<&'a Tensor> for Operand<'a> {
    fn from(t: &'a Tensor) -> Self {
        Operand::Tensor(t)
    }
}

macro_rules! impl_scalar_operand {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand<'_> {
                fn from(v: $t) -> Self {
                    Operand::Scalar(Scalar::from(v))
                }
            }
        )*
    };
}

impl_scalar_operand!(Scalar, bool, i32, i64, f32, f64, Complex64);

/// Result dtype, shape and device of one op application.
#[derive(Clone, Debug, PartialEq)]
pub struct Prepared {
    pub dtype: DType,
    pub shape: Shape,
    pub device: Device,
}

/// Validate operands and infer the result. `operands[0]` must be a tensor.
pub fn prepare(op: OpKind, operands: &[Operand<'_>], coeff: Option<Scalar>) -> Result<Prepared> {
    let Some(Operand::Tensor(first)) = operands.first() else {
        return Err(TensorError::InvalidArgument(format!(
            "{op} must be applied to a tensor"
        )));
    };
    let device = *first.device();
    let mut shapes = Vec::with_capacity(operands.len());
    for operand in operands {
        if let Operand::Tensor(t) = operand {
            if *t.device() != device {
                return Err(TensorError::DeviceMismatch {
                    expected: device,
                    got: *t.device(),
                });
            }
            shapes.push(t.shape());
        }
    }
    let types: Vec<OperandType> = operands.iter().map(Operand::operand_type).collect();
    let dtype = infer_dtype(op, &types, coeff)?;
    let shape = infer_shape(&shapes)?;
    Ok(Prepared {
        dtype,
        shape,
        device,
    })
}

/// Like [`prepare`], and also check the result fits back into `operands[0]`.
pub fn prepare_inplace(
    op: OpKind,
    operands: &[Operand<'_>],
    coeff: Option<Scalar>,
) -> Result<Prepared> {
    let prepared = prepare(op, operands, coeff)?;
    if let Some(Operand::Tensor(dest)) = operands.first() {
        check_inplace(prepared.dtype, &prepared.shape, dest.dtype(), dest.shape())?;
    }
    Ok(prepared)
}

enum Column {
    Values(Vec<Scalar>),
    Splat(Scalar),
}

impl Column {
    fn get(&self, i: usize) -> Scalar {
        match self {
            Column::Values(v) => v[i],
            Column::Splat(s) => *s,
        }
    }
}

/// Evaluate `op` elementwise over the broadcast operands.
pub fn compute(
    op: OpKind,
    operands: &[Operand<'_>],
    prepared: &Prepared,
    coeff: Option<Scalar>,
) -> Result<Vec<Scalar>> {
    let columns = operands
        .iter()
        .map(|operand| match operand {
            Operand::Tensor(t) => Ok(Column::Values(t.expand(&prepared.shape)?.to_scalars())),
            Operand::Scalar(s) => Ok(Column::Splat(*s)),
        })
        .collect::<Result<Vec<_>>>()?;
    let category = prepared.dtype.category();
    let coeff = coeff.unwrap_or(Scalar::Int(1));
    let n = prepared.shape.numel();

    let values = match columns.as_slice() {
        [x] => (0..n).map(|i| eval_unary(op, category, x.get(i))).collect(),
        [a, b] => (0..n)
            .map(|i| eval_binary(op, category, a.get(i), b.get(i), coeff))
            .collect(),
        [base, a, b] => (0..n)
            .map(|i| eval_ternary(op, category, base.get(i), a.get(i), b.get(i), coeff))
            .collect(),
        _ => {
            return Err(TensorError::InvalidArgument(format!(
                "{op} expects {} operands, got {}",
                op.arity(),
                operands.len()
            )));
        }
    };
    Ok(values)
}

/// Apply `op` out-of-place, allocating a new tensor.
pub fn apply(op: OpKind, operands: &[Operand<'_>], coeff: Option<Scalar>) -> Result<Tensor> {
    let prepared = prepare(op, operands, coeff)?;
    let values = compute(op, operands, &prepared, coeff)?;
    Tensor::from_scalars(&values, &prepared.shape, prepared.dtype, &prepared.device)
}

/// Apply `op` in place, writing the result into `operands[0]`.
pub fn apply_(op: OpKind, operands: &[Operand<'_>], coeff: Option<Scalar>) -> Result<()> {
    let prepared = prepare_inplace(op, operands, coeff)?;
    let values = compute(op, operands, &prepared, coeff)?;
    match operands.first() {
        Some(Operand::Tensor(dest)) => dest.write_scalars(&values),
        _ => Err(TensorError::InvalidArgument(format!(
            "{op} must be applied to a tensor"
        ))),
    }
}

pub fn unary(op: OpKind, x: &Tensor) -> Result<Tensor> {
    apply(op, &[Operand::Tensor(x)], None)
}

pub fn unary_(op: OpKind, x: &Tensor) -> Result<()> {
    apply_(op, &[Operand::Tensor(x)], None)
}

pub fn binary<'a>(
    op: OpKind,
    x: &'a Tensor,
    other: Operand<'a>,
    coeff: Option<Scalar>,
) -> Result<Tensor> {
    apply(op, &[Operand::Tensor(x), other], coeff)
}

pub fn binary_<'a>(
    op: OpKind,
    x: &'a Tensor,
    other: Operand<'a>,
    coeff: Option<Scalar>,
) -> Result<()> {
    apply_(op, &[Operand::Tensor(x), other], coeff)
}

pub fn ternary<'a>(
    op: OpKind,
    base: &'a Tensor,
    a: Operand<'a>,
    b: Operand<'a>,
    value: Option<Scalar>,
) -> Result<Tensor> {
    apply(op, &[Operand::Tensor(base), a, b], value)
}

pub fn ternary_<'a>(
    op: OpKind,
    base: &'a Tensor,
    a: Operand<'a>,
    b: Operand<'a>,
    value: Option<Scalar>,
) -> Result<()> {
    apply_(op, &[Operand::Tensor(base), a, b], value)
}

// ── Method syntax ───────────────────────────────────────────────────────

/// Elementwise ops as methods on [`Tensor`].
///
/// Methods ending in `_` update `self` in place and fail if the promoted
/// result cannot be cast back to `self`'s dtype or broadcasts beyond its
/// shape.
pub trait PointwiseExt {
    fn add<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<Tensor>;
    fn add_alpha<'a>(
        &'a self,
        other: impl Into<Operand<'a>>,
        alpha: impl Into<Scalar>,
    ) -> Result<Tensor>;
    fn sub<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<Tensor>;
    fn sub_alpha<'a>(
        &'a self,
        other: impl Into<Operand<'a>>,
        alpha: impl Into<Scalar>,
    ) -> Result<Tensor>;
    fn mul<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<Tensor>;
    fn div<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<Tensor>;
    fn addcmul(&self, a: &Tensor, b: &Tensor, value: impl Into<Scalar>) -> Result<Tensor>;
    fn addcdiv(&self, a: &Tensor, b: &Tensor, value: impl Into<Scalar>) -> Result<Tensor>;
    fn sqrt(&self) -> Result<Tensor>;
    fn exp(&self) -> Result<Tensor>;
    fn neg(&self) -> Result<Tensor>;

    fn add_<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<()>;
    fn add_alpha_<'a>(
        &'a self,
        other: impl Into<Operand<'a>>,
        alpha: impl Into<Scalar>,
    ) -> Result<()>;
    fn sub_<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<()>;
    fn sub_alpha_<'a>(
        &'a self,
        other: impl Into<Operand<'a>>,
        alpha: impl Into<Scalar>,
    ) -> Result<()>;
    fn mul_<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<()>;
    fn div_<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<()>;
    fn addcmul_(&self, a: &Tensor, b: &Tensor, value: impl Into<Scalar>) -> Result<()>;
    fn addcdiv_(&self, a: &Tensor, b: &Tensor, value: impl Into<Scalar>) -> Result<()>;
    fn sqrt_(&self) -> Result<()>;
    fn exp_(&self) -> Result<()>;
    fn neg_(&self) -> Result<()>;
}

impl PointwiseExt for Tensor {
    fn add<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<Tensor> {
        binary(OpKind::Add, self, other.into(), None)
    }

    fn add_alpha<'a>(
        &'a self,
        other: impl Into<Operand<'a>>,
        alpha: impl Into<Scalar>,
    ) -> Result<Tensor> {
        binary(OpKind::Add, self, other.into(), Some(alpha.into()))
    }

    fn sub<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<Tensor> {
        binary(OpKind::Sub, self, other.into(), None)
    }

    fn sub_alpha<'a>(
        &'a self,
        other: impl Into<Operand<'a>>,
        alpha: impl Into<Scalar>,
    ) -> Result<Tensor> {
        binary(OpKind::Sub, self, other.into(), Some(alpha.into()))
    }

    fn mul<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<Tensor> {
        binary(OpKind::Mul, self, other.into(), None)
    }

    fn div<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<Tensor> {
        binary(OpKind::Div, self, other.into(), None)
    }

    fn addcmul(&self, a: &Tensor, b: &Tensor, value: impl Into<Scalar>) -> Result<Tensor> {
        ternary(OpKind::Addcmul, self, a.into(), b.into(), Some(value.into()))
    }

    fn addcdiv(&self, a: &Tensor, b: &Tensor, value: impl Into<Scalar>) -> Result<Tensor> {
        ternary(OpKind::Addcdiv, self, a.into(), b.into(), Some(value.into()))
    }

    fn sqrt(&self) -> Result<Tensor> {
        unary(OpKind::Sqrt, self)
    }

    fn exp(&self) -> Result<Tensor> {
        unary(OpKind::Exp, self)
    }

    fn neg(&self) -> Result<Tensor> {
        unary(OpKind::Neg, self)
    }

    fn add_<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<()> {
        binary_(OpKind::Add, self, other.into(), None)
    }

    fn add_alpha_<'a>(
        &'a self,
        other: impl Into<Operand<'a>>,
        alpha: impl Into<Scalar>,
    ) -> Result<()> {
        binary_(OpKind::Add, self, other.into(), Some(alpha.into()))
    }

    fn sub_<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<()> {
        binary_(OpKind::Sub, self, other.into(), None)
    }

    fn sub_alpha_<'a>(
        &'a self,
        other: impl Into<Operand<'a>>,
        alpha: impl Into<Scalar>,
    ) -> Result<()> {
        binary_(OpKind::Sub, self, other.into(), Some(alpha.into()))
    }

    fn mul_<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<()> {
        binary_(OpKind::Mul, self, other.into(), None)
    }

    fn div_<'a>(&'a self, other: impl Into<Operand<'a>>) -> Result<()> {
        binary_(OpKind::Div, self, other.into(), None)
    }

    fn addcmul_(&self, a: &Tensor, b: &Tensor, value: impl Into<Scalar>) -> Result<()> {
        ternary_(OpKind::Addcmul, self, a.into(), b.into(), Some(value.into()))
    }

    fn addcdiv_(&self, a: &Tensor, b: &Tensor, value: impl Into<Scalar>) -> Result<()> {
        ternary_(OpKind::Addcdiv, self, a.into(), b.into(), Some(value.into()))
    }

    fn sqrt_(&self) -> Result<()> {
        unary_(OpKind::Sqrt, self)
    }

    fn exp_(&self) -> Result<()> {
        unary_(OpKind::Exp, self)
    }

    fn neg_(&self) -> Result<()> {
        unary_(OpKind::Neg, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu() -> Device {
        Device::Cpu
    }

    fn s(dims: &[usize]) -> Shape {
        Shape::new(dims.to_vec())
    }

    #[test]
    fn test_add_tensor() {
        let a = Tensor::from_f32(&[1.0, 2.0, 3.0], &s(&[3]), &cpu()).unwrap();
        let b = Tensor::from_f32(&[10.0, 20.0, 30.0], &s(&[3]), &cpu()).unwrap();
        let c = a.add(&b).unwrap();
        assert_eq!(c.to_vec::<f32>().unwrap(), vec![11.0, 22.0, 33.0]);
    }

    #[test]
    fn test_add_alpha() {
        let a = Tensor::from_slice(&[1i64, 1], &s(&[2]), &cpu()).unwrap();
        let b = Tensor::from_slice(&[2i64, 3], &s(&[2]), &cpu()).unwrap();
        let c = a.add_alpha(&b, 2).unwrap();
        assert_eq!(c.to_vec::<i64>().unwrap(), vec![5, 7]);
        assert!(a.add_alpha(&b, 0.5).is_err());
    }

    #[test]
    fn test_int_tensor_float_scalar_promotes() {
        let a = Tensor::from_slice(&[1i32, 2], &s(&[2]), &cpu()).unwrap();
        let c = a.add(1.5).unwrap();
        assert_eq!(c.dtype(), DType::F32);
        assert_eq!(c.to_vec::<f32>().unwrap(), vec![2.5, 3.5]);
    }

    #[test]
    fn test_inplace_unsafe_cast() {
        let a = Tensor::from_slice(&[1i32, 2], &s(&[2]), &cpu()).unwrap();
        let err = a.add_(1.5).unwrap_err();
        assert_eq!(
            err,
            TensorError::UnsafeCast {
                from: DType::F32,
                to: DType::I32
            }
        );
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_broadcast() {
        let a = Tensor::from_f32(&[1.0, 2.0], &s(&[2, 1]), &cpu()).unwrap();
        let b = Tensor::from_f32(&[10.0, 20.0, 30.0], &s(&[3]), &cpu()).unwrap();
        let c = a.mul(&b).unwrap();
        assert_eq!(c.shape(), &s(&[2, 3]));
        assert_eq!(
            c.to_vec::<f32>().unwrap(),
            vec![10.0, 20.0, 30.0, 20.0, 40.0, 60.0]
        );
        // in-place can't grow the destination
        assert!(matches!(
            a.mul_(&b),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_inplace_on_expanded_view() {
        let base = Tensor::ones(&s(&[1, 1]), DType::I64, &cpu());
        let view = base.expand(&s(&[2, 1, 3])).unwrap();
        view.add_(1).unwrap();
        assert_eq!(view.to_vec::<i64>().unwrap(), vec![2; 6]);
        assert_eq!(base.to_vec::<i64>().unwrap(), vec![2]);
    }

    #[test]
    fn test_sqrt_int_out_of_place() {
        let a = Tensor::from_slice(&[4i32, 9], &s(&[2]), &cpu()).unwrap();
        let r = a.sqrt().unwrap();
        assert_eq!(r.dtype(), DType::F32);
        assert_eq!(r.to_vec::<f32>().unwrap(), vec![2.0, 3.0]);
        assert!(matches!(a.sqrt_(), Err(TensorError::UnsafeCast { .. })));
    }

    #[test]
    fn test_div_int_rejected() {
        let a = Tensor::from_slice(&[4i32, 9], &s(&[2]), &cpu()).unwrap();
        assert!(matches!(
            a.div(&a),
            Err(TensorError::Unsupported { op: "div", .. })
        ));
        let r = a.div(2.0).unwrap();
        assert_eq!(r.to_vec::<f32>().unwrap(), vec![2.0, 4.5]);
    }

    #[test]
    fn test_bool_ops() {
        let a = Tensor::from_slice(&[true, false, false], &s(&[3]), &cpu()).unwrap();
        let b = Tensor::from_slice(&[true, true, false], &s(&[3]), &cpu()).unwrap();
        assert_eq!(a.add(&b).unwrap().to_vec::<bool>().unwrap(), vec![true, true, false]);
        assert_eq!(a.mul(&b).unwrap().to_vec::<bool>().unwrap(), vec![true, false, false]);
        assert!(a.sub(&b).is_err());
        assert!(a.neg().is_err());
        assert_eq!(a.add(1).unwrap().dtype(), DType::I64);
    }

    #[test]
    fn test_addcmul_addcdiv() {
        let base = Tensor::from_f32(&[1.0, 1.0], &s(&[2]), &cpu()).unwrap();
        let a = Tensor::from_f32(&[2.0, 4.0], &s(&[2]), &cpu()).unwrap();
        let b = Tensor::from_f32(&[2.0, 2.0], &s(&[2]), &cpu()).unwrap();
        let r = base.addcmul(&a, &b, 0.5).unwrap();
        assert_eq!(r.to_vec::<f32>().unwrap(), vec![3.0, 5.0]);
        base.addcdiv_(&a, &b, 2).unwrap();
        assert_eq!(base.to_vec::<f32>().unwrap(), vec![3.0, 5.0]);
    }

    #[test]
    fn test_device_mismatch() {
        let a = Tensor::zeros(&s(&[2]), DType::F32, &Device::Cpu);
        let b = Tensor::zeros(&s(&[2]), DType::F32, &Device::Gpu);
        assert_eq!(
            a.add(&b).unwrap_err(),
            TensorError::DeviceMismatch {
                expected: Device::Cpu,
                got: Device::Gpu
            }
        );
    }

    #[test]
    fn test_complex_scalar() {
        let a = Tensor::zeros(&s(&[2]), DType::F64, &cpu());
        let r = a.add(Complex64::new(3.0, 5.0)).unwrap();
        assert_eq!(r.dtype(), DType::C128);
        assert_eq!(r.to_vec::<Complex64>().unwrap(), vec![Complex64::new(3.0, 5.0); 2]);
    }
}
