//! Right-hand operands of batched binary ops.

use foreach_core::{Complex64, Scalar, Tensor};

/// The second operand of a batched binary op: one scalar for the whole
/// list, one scalar per tensor, or one tensor per tensor.
#[derive(Clone, Copy, Debug)]
pub enum Rhs<'a> {
    Scalar(Scalar),
    Scalars(&'a [Scalar]),
    Tensors(&'a [Tensor]),
}

impl Rhs<'_> {
    /// List length, or `None` for a single broadcast scalar.
    pub fn len(&self) -> Option<usize> {
        match self {
            Rhs::Scalar(_) => None,
            Rhs::Scalars(s) => Some(s.len()),
            Rhs::Tensors(t) => Some(t.len()),
        }
    }
}

impl<'a> From<&'a [Tensor]> for Rhs<'a> {
    fn from(t: &'a [Tensor]) -> Self {
        Rhs::Tensors(t)
    }
}

impl<'a> From<&'a Vec<Tensor>> for Rhs<'a> {
    fn from(t: &'a Vec<Tensor>) -> Self {
        Rhs::Tensors(t)
    }
}

impl<'a> From<&'a [Scalar]> for Rhs<'a> {
    fn from(s: &'a [Scalar]) -> Self {
        Rhs::Scalars(s)
    }
}

impl<'a> From<&'a Vec<Scalar>> for Rhs<'a> {
    fn from(s: &'a Vec<Scalar>) -> Self {
        Rhs::Scalars(s)
    }
}

macro_rules! impl_scalar_rhs {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Rhs<'_> {
                fn from(v: $t) -> Self {
                    Rhs::Scalar(Scalar::from(v))
                }
            }
        )*
    };
}

impl_scalar_rhs!(Scalar, bool, i32, i64, f32, f64, Complex64);
