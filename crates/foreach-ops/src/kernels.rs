//! Scalar elementwise kernels, shared by the per-tensor and fused paths.
//!
//! Operands are converted to the result category before computing:
//! integers in wrapping i64, floats in f64, complex in Complex<f64>. The
//! caller narrows the result when storing it. Bool results are computed as
//! integers and then tested against zero, so add is OR and mul is AND.
//!
//! Every kernel is total. Combinations `op::check_support` rejects still
//! produce a value here; they are never reached through the public ops.

use foreach_core::{Category, Complex64, Scalar};

use crate::op::OpKind;

pub fn eval_unary(op: OpKind, category: Category, x: Scalar) -> Scalar {
    match category {
        Category::Bool => Scalar::Bool(int_unary(op, x.as_i64()) != 0),
        Category::Integral => Scalar::Int(int_unary(op, x.as_i64())),
        Category::Floating => Scalar::Float(float_unary(op, x.as_f64())),
        Category::Complex => Scalar::Complex(complex_unary(op, x.as_complex())),
    }
}

pub fn eval_binary(op: OpKind, category: Category, a: Scalar, b: Scalar, alpha: Scalar) -> Scalar {
    match category {
        Category::Bool | Category::Integral => {
            let r = int_binary(op, a.as_i64(), b.as_i64(), alpha.as_i64());
            Scalar::Int(r).to_category(category)
        }
        Category::Floating => {
            Scalar::Float(float_binary(op, a.as_f64(), b.as_f64(), alpha.as_f64()))
        }
        Category::Complex => Scalar::Complex(complex_binary(
            op,
            a.as_complex(),
            b.as_complex(),
            alpha.as_complex(),
        )),
    }
}

pub fn eval_ternary(
    op: OpKind,
    category: Category,
    base: Scalar,
    a: Scalar,
    b: Scalar,
    value: Scalar,
) -> Scalar {
    match category {
        Category::Bool | Category::Integral => {
            let r = int_ternary(op, base.as_i64(), a.as_i64(), b.as_i64(), value.as_i64());
            Scalar::Int(r).to_category(category)
        }
        Category::Floating => Scalar::Float(float_ternary(
            op,
            base.as_f64(),
            a.as_f64(),
            b.as_f64(),
            value.as_f64(),
        )),
        Category::Complex => Scalar::Complex(complex_ternary(
            op,
            base.as_complex(),
            a.as_complex(),
            b.as_complex(),
            value.as_complex(),
        )),
    }
}

fn int_unary(op: OpKind, x: i64) -> i64 {
    match op {
        OpKind::Neg => x.wrapping_neg(),
        OpKind::Sqrt => (x as f64).sqrt() as i64,
        OpKind::Exp => (x as f64).exp() as i64,
        _ => x,
    }
}

fn float_unary(op: OpKind, x: f64) -> f64 {
    match op {
        OpKind::Neg => -x,
        OpKind::Sqrt => x.sqrt(),
        OpKind::Exp => x.exp(),
        _ => x,
    }
}

fn complex_unary(op: OpKind, x: Complex64) -> Complex64 {
    match op {
        OpKind::Neg => -x,
        OpKind::Sqrt => x.sqrt(),
        OpKind::Exp => x.exp(),
        _ => x,
    }
}

fn int_binary(op: OpKind, a: i64, b: i64, alpha: i64) -> i64 {
    match op {
        OpKind::Add => a.wrapping_add(alpha.wrapping_mul(b)),
        OpKind::Sub => a.wrapping_sub(alpha.wrapping_mul(b)),
        OpKind::Mul => a.wrapping_mul(b),
        OpKind::Div => a.checked_div(b).unwrap_or(0),
        _ => a,
    }
}

fn float_binary(op: OpKind, a: f64, b: f64, alpha: f64) -> f64 {
    match op {
        OpKind::Add => a + alpha * b,
        OpKind::Sub => a - alpha * b,
        OpKind::Mul => a * b,
        OpKind::Div => a / b,
        _ => a,
    }
}

fn complex_binary(op: OpKind, a: Complex64, b: Complex64, alpha: Complex64) -> Complex64 {
    match op {
        OpKind::Add => a + alpha * b,
        OpKind::Sub => a - alpha * b,
        OpKind::Mul => a * b,
        OpKind::Div => a / b,
        _ => a,
    }
}

fn int_ternary(op: OpKind, base: i64, a: i64, b: i64, value: i64) -> i64 {
    match op {
        OpKind::Addcmul => base.wrapping_add(value.wrapping_mul(a).wrapping_mul(b)),
        OpKind::Addcdiv => base.wrapping_add(value.wrapping_mul(a.checked_div(b).unwrap_or(0))),
        _ => base,
    }
}

fn float_ternary(op: OpKind, base: f64, a: f64, b: f64, value: f64) -> f64 {
    match op {
        OpKind::Addcmul => base + value * a * b,
        OpKind::Addcdiv => base + value * (a / b),
        _ => base,
    }
}

fn complex_ternary(
    op: OpKind,
    base: Complex64,
    a: Complex64,
    b: Complex64,
    value: Complex64,
) -> Complex64 {
    match op {
        OpKind::Addcmul => base + value * a * b,
        OpKind::Addcdiv => base + value * (a / b),
        _ => base,
    }
}
