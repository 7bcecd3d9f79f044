//! Layout: shape, strides, and offset for tensor memory layout.

use smallvec::SmallVec;

use crate::types::Shape;

/// Most tensors have 4 or fewer dimensions.
const STACK_DIMS: usize = 4;

/// Element strides (not bytes). A zero stride marks a broadcast dimension.
pub type Strides = SmallVec<[usize; STACK_DIMS]>;

/// Maps a logical index to a storage position:
///   offset + i0 * strides[0] + ... + in * strides[n]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Strides,
    offset: usize,
}

impl Layout {
    /// Row-major layout starting at storage position 0.
    pub fn contiguous(shape: &Shape) -> Self {
        Self {
            strides: contiguous_strides(shape.dims()),
            shape: shape.clone(),
            offset: 0,
        }
    }

    pub fn new(shape: Shape, strides: Strides, offset: usize) -> Self {
        debug_assert_eq!(shape.ndim(), strides.len());
        Self {
            shape,
            strides,
            offset,
        }
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// True when the logical elements occupy `offset..offset + numel` in
    /// row-major order. Strides of size-1 dimensions are ignored.
    pub fn is_contiguous(&self) -> bool {
        if self.numel() == 0 {
            return true;
        }
        let expected = contiguous_strides(self.shape.dims());
        self.shape
            .dims()
            .iter()
            .zip(self.strides.iter().zip(expected.iter()))
            .all(|(&d, (&s, &e))| d == 1 || s == e)
    }

    /// View this layout under a broadcast `target` shape, or None when the
    /// shapes are incompatible. New leading dimensions and expanded size-1
    /// dimensions get stride 0.
    pub fn broadcast_to(&self, target: &Shape) -> Option<Layout> {
        let in_ndim = self.shape.ndim();
        let out_ndim = target.ndim();
        if in_ndim > out_ndim {
            return None;
        }
        let pad = out_ndim - in_ndim;
        let mut strides: Strides = SmallVec::from_elem(0, out_ndim);
        for i in 0..in_ndim {
            let in_dim = self.shape.0[i];
            let out_dim = target.0[pad + i];
            if in_dim == out_dim {
                strides[pad + i] = self.strides[i];
            } else if in_dim != 1 {
                return None;
            }
        }
        Some(Layout::new(target.clone(), strides, self.offset))
    }

    /// Storage positions of every logical element, in row-major order.
    pub fn offsets(&self) -> Offsets<'_> {
        Offsets {
            layout: self,
            index: SmallVec::from_elem(0, self.shape.ndim()),
            next: self.offset,
            remaining: self.numel(),
        }
    }
}

fn contiguous_strides(dims: &[usize]) -> Strides {
    let mut strides: Strides = SmallVec::from_elem(0, dims.len());
    let mut stride = 1usize;
    for (i, &d) in dims.iter().enumerate().rev() {
        strides[i] = stride;
        stride *= d.max(1);
    }
    strides
}

/// Iterator over storage positions of a layout, walking the logical index
/// like an odometer.
pub struct Offsets<'a> {
    layout: &'a Layout,
    index: SmallVec<[usize; STACK_DIMS]>,
    next: usize,
    remaining: usize,
}

impl Iterator for Offsets<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next;
        self.remaining -= 1;
        if self.remaining > 0 {
            let dims = self.layout.shape.dims();
            let strides = self.layout.strides();
            for axis in (0..dims.len()).rev() {
                self.index[axis] += 1;
                self.next += strides[axis];
                if self.index[axis] < dims[axis] {
                    break;
                }
                self.next -= strides[axis] * dims[axis];
                self.index[axis] = 0;
            }
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Offsets<'_> {}
