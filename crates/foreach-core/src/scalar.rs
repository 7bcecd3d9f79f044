//! Dynamically typed scalar values.
//!
//! A `Scalar` is both the user-facing scalar operand of a batched op and the
//! value type kernels compute on. Each variant holds the widest Rust type of
//! its category, so narrowing only happens when a value is stored.

use num_complex::Complex64;

use crate::types::Category;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex64),
}

impl Scalar {
    pub fn category(self) -> Category {
        match self {
            Scalar::Bool(_) => Category::Bool,
            Scalar::Int(_) => Category::Integral,
            Scalar::Float(_) => Category::Floating,
            Scalar::Complex(_) => Category::Complex,
        }
    }

    pub fn is_integral(self, include_bool: bool) -> bool {
        match self {
            Scalar::Int(_) => true,
            Scalar::Bool(_) => include_bool,
            _ => false,
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            Scalar::Bool(b) => b,
            Scalar::Int(i) => i != 0,
            Scalar::Float(f) => f != 0.0,
            Scalar::Complex(c) => c.re != 0.0 || c.im != 0.0,
        }
    }

    /// Integer view; floats truncate toward zero, complex drops the imaginary part.
    pub fn as_i64(self) -> i64 {
        match self {
            Scalar::Bool(b) => b as i64,
            Scalar::Int(i) => i,
            Scalar::Float(f) => f as i64,
            Scalar::Complex(c) => c.re as i64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Scalar::Int(i) => i as f64,
            Scalar::Float(f) => f,
            Scalar::Complex(c) => c.re,
        }
    }

    pub fn as_complex(self) -> Complex64 {
        match self {
            Scalar::Complex(c) => c,
            other => Complex64::new(other.as_f64(), 0.0),
        }
    }

    /// Convert into the canonical variant of `category`.
    pub fn to_category(self, category: Category) -> Scalar {
        match category {
            Category::Bool => Scalar::Bool(self.as_bool()),
            Category::Integral => Scalar::Int(self.as_i64()),
            Category::Floating => Scalar::Float(self.as_f64()),
            Category::Complex => Scalar::Complex(self.as_complex()),
        }
    }

    /// Approximate equality: NaNs compare equal to NaNs, and the tolerance is
    /// `atol + rtol * |other|` on the (complex) distance.
    pub fn is_close(self, other: Scalar, rtol: f64, atol: f64) -> bool {
        let a = self.as_complex();
        let b = other.as_complex();
        let a_nan = a.re.is_nan() || a.im.is_nan();
        let b_nan = b.re.is_nan() || b.im.is_nan();
        if a_nan || b_nan {
            return a_nan && b_nan;
        }
        if a == b {
            return true;
        }
        (a - b).norm() <= atol + rtol * b.norm()
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Complex(c) => write!(f, "({}{:+}j)", c.re, c.im),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Scalar::Float(v as f64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<Complex64> for Scalar {
    fn from(v: Complex64) -> Self {
        Scalar::Complex(v)
    }
}
