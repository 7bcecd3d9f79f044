//! Core type definitions: DType, Category, Shape.

/// Supported data types for tensor elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    U8,
    I8,
    I16,
    I32,
    I64,
    F16,
    BF16,
    F32,
    F64,
    /// Complex with f32 real and imaginary parts.
    C64,
    /// Complex with f64 real and imaginary parts.
    C128,
}

/// Coarse element kind, ordered from narrowest to widest.
///
/// Scalars carry a category instead of a dtype; promotion between a tensor
/// and a scalar only looks at categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Bool,
    Integral,
    Floating,
    Complex,
}

impl DType {
    /// Every dtype, in promotion-table order.
    pub const ALL: [DType; 12] = [
        DType::Bool,
        DType::U8,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::F16,
        DType::BF16,
        DType::F32,
        DType::F64,
        DType::C64,
        DType::C128,
    ];

    /// Default dtype for float scalars promoted against integral tensors.
    pub const DEFAULT_FLOAT: DType = DType::F32;

    /// Default dtype for int scalars promoted against bool tensors.
    pub const DEFAULT_INT: DType = DType::I64;

    /// Size in bytes of a single element.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::Bool | DType::U8 | DType::I8 => 1,
            DType::I16 | DType::F16 | DType::BF16 => 2,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 | DType::C64 => 8,
            DType::C128 => 16,
        }
    }

    /// Position of this dtype in [`DType::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn category(self) -> Category {
        match self {
            DType::Bool => Category::Bool,
            DType::U8 | DType::I8 | DType::I16 | DType::I32 | DType::I64 => Category::Integral,
            DType::F16 | DType::BF16 | DType::F32 | DType::F64 => Category::Floating,
            DType::C64 | DType::C128 => Category::Complex,
        }
    }

    pub fn is_bool(self) -> bool {
        self == DType::Bool
    }

    /// Integer dtypes, excluding bool.
    pub fn is_integral(self) -> bool {
        self.category() == Category::Integral
    }

    pub fn is_floating(self) -> bool {
        self.category() == Category::Floating
    }

    pub fn is_complex(self) -> bool {
        self.category() == Category::Complex
    }

    /// Complex dtype whose components have this dtype's precision.
    ///
    /// Only F64 maps to C128; every narrower real dtype maps to C64.
    pub fn to_complex(self) -> DType {
        match self {
            DType::F64 | DType::C128 => DType::C128,
            _ => DType::C64,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::U8 => "u8",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::C64 => "c64",
            DType::C128 => "c128",
        };
        f.write_str(name)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Bool => "bool",
            Category::Integral => "int",
            Category::Floating => "float",
            Category::Complex => "complex",
        };
        f.write_str(name)
    }
}

/// Tensor shape (dimensions).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Shape(pub Vec<usize>);

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    /// Scalar (rank-0) shape.
    pub fn scalar() -> Self {
        Self(vec![])
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Get dimension at axis (supports negative indexing).
    pub fn dim(&self, axis: i32) -> Option<usize> {
        let ndim = self.0.len() as i32;
        let idx = if axis < 0 { ndim + axis } else { axis };
        if idx >= 0 && idx < ndim {
            Some(self.0[idx as usize])
        } else {
            None
        }
    }

    /// Compute the broadcast shape of two shapes, or None if incompatible.
    pub fn broadcast_shapes(a: &Shape, b: &Shape) -> Option<Shape> {
        let a_dims = &a.0;
        let b_dims = &b.0;
        let max_ndim = a_dims.len().max(b_dims.len());

        let mut result = Vec::with_capacity(max_ndim);

        for i in 0..max_ndim {
            let da = if i < a_dims.len() {
                a_dims[a_dims.len() - 1 - i]
            } else {
                1
            };
            let db = if i < b_dims.len() {
                b_dims[b_dims.len() - 1 - i]
            } else {
                1
            };

            if da == db {
                result.push(da);
            } else if da == 1 {
                result.push(db);
            } else if db == 1 {
                result.push(da);
            } else {
                return None;
            }
        }

        result.reverse();
        Some(Shape::new(result))
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self(dims.to_vec())
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}
