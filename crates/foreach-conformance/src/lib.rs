//! Conformance testing infrastructure for batched ops.
//!
//! Dtype/device inventories for instantiating scenarios, tensor-list
//! builders, deterministic data, and comparisons with per-dtype tolerances.

use foreach_core::{DType, Device, Scalar, Shape, Tensor};

/// Devices every scenario is instantiated for.
pub const DEVICES: [Device; 2] = [Device::Cpu, Device::Gpu];

pub fn all_dtypes() -> Vec<DType> {
    DType::ALL.to_vec()
}

pub fn integral_dtypes() -> Vec<DType> {
    vec![DType::U8, DType::I8, DType::I16, DType::I32, DType::I64]
}

pub fn floating_and_complex_dtypes() -> Vec<DType> {
    vec![DType::F32, DType::F64, DType::C64, DType::C128]
}

/// Every dtype except bool, bf16 and the complex types.
pub fn real_dtypes_without_bf16() -> Vec<DType> {
    vec![
        DType::U8,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::F16,
        DType::F32,
        DType::F64,
    ]
}

/// `(atol, rtol)` for comparing results of `dtype`.
pub fn tolerance(dtype: DType) -> (f64, f64) {
    match dtype {
        DType::F16 => (1e-3, 1e-3),
        DType::BF16 => (1e-2, 1e-2),
        DType::F32 | DType::C64 => (1e-5, 1.3e-6),
        DType::F64 | DType::C128 => (1e-7, 1e-7),
        _ => (0.0, 0.0),
    }
}

/// `n` tensors of shape `dims`, each filled with `value`.
pub fn full_list(
    n: usize,
    dims: &[usize],
    value: impl Into<Scalar>,
    dtype: DType,
    device: Device,
) -> Vec<Tensor> {
    let value = value.into();
    let shape = Shape::new(dims.to_vec());
    (0..n)
        .map(|_| Tensor::full(&shape, value, dtype, &device))
        .collect()
}

pub fn zeros_list(n: usize, dims: &[usize], dtype: DType, device: Device) -> Vec<Tensor> {
    full_list(n, dims, 0, dtype, device)
}

pub fn ones_list(n: usize, dims: &[usize], dtype: DType, device: Device) -> Vec<Tensor> {
    full_list(n, dims, 1, dtype, device)
}

/// Deterministic data in [-1, 1].
pub fn gen_data(n: usize, seed: u64) -> Vec<f32> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / (1u64 << 31) as f64 * 2.0 - 1.0) as f32
        })
        .collect()
}

/// Deterministic data in (0, 1], for ops that need positive inputs.
pub fn gen_positive_data(n: usize, seed: u64) -> Vec<f32> {
    gen_data(n, seed).iter().map(|x| x.abs() + 0.01).collect()
}

/// Assert two scalar slices are element-wise close.
pub fn assert_allclose(actual: &[Scalar], expected: &[Scalar], atol: f64, rtol: f64) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "length mismatch: actual={} expected={}",
        actual.len(),
        expected.len()
    );
    for (i, (x, y)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            x.is_close(*y, rtol, atol),
            "mismatch at [{i}]: actual={x} expected={y} atol={atol} rtol={rtol}"
        );
    }
}

/// Assert two tensor lists match in length, dtype, shape and values, with
/// the tolerance of each tensor's dtype.
pub fn assert_tensor_lists_close(actual: &[Tensor], expected: &[Tensor]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "list length mismatch: actual={} expected={}",
        actual.len(),
        expected.len()
    );
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(a.dtype(), e.dtype(), "dtype mismatch at list index {i}");
        assert_eq!(a.shape(), e.shape(), "shape mismatch at list index {i}");
        let (atol, rtol) = tolerance(e.dtype());
        assert_allclose(&a.to_scalars(), &e.to_scalars(), atol, rtol);
    }
}
