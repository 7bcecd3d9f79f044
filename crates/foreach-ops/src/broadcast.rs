//! Broadcasting rules following NumPy semantics.

use foreach_core::Shape;

/// Compute the broadcast shape of two shapes, or None if incompatible.
///
/// Rules (NumPy-style):
/// 1. Align shapes from the trailing dimension.
/// 2. For each dimension pair: must be equal, or one must be 1.
/// 3. The output dimension is the max of the two.
pub fn broadcast_shapes(a: &Shape, b: &Shape) -> Option<Shape> {
    Shape::broadcast_shapes(a, b)
}

/// Broadcast any number of shapes. An empty input yields the scalar shape.
pub fn broadcast_all(shapes: &[&Shape]) -> Option<Shape> {
    shapes
        .iter()
        .try_fold(Shape::scalar(), |acc, s| broadcast_shapes(&acc, s))
}
