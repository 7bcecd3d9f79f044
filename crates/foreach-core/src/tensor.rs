//! Tensor type: a strided view over shared, lockable storage.
//!
//! Cloning a `Tensor` clones the handle, not the data. Views created with
//! `expand` share storage with their source, so in-place writes through one
//! handle are visible through every other.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::element::Element;
use crate::layout::Layout;
use crate::scalar::Scalar;
use crate::storage::Storage;
use crate::{DType, Result, Shape, TensorError};

/// Compute device.
///
/// Storage always lives in host memory. The tag selects device-specific
/// dispatch defaults and numeric checks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Gpu => f.write_str("gpu"),
        }
    }
}

/// A tensor handle.
#[derive(Clone)]
pub struct Tensor {
    storage: Arc<RwLock<Storage>>,
    layout: Layout,
    dtype: DType,
    device: Device,
}

impl Tensor {
    // ── Constructors ────────────────────────────────────────────────────

    /// Create a tensor filled with zeros.
    pub fn zeros(shape: &Shape, dtype: DType, device: &Device) -> Self {
        Self::from_storage_unchecked(Storage::zeros(dtype, shape.numel()), shape, device)
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: &Shape, dtype: DType, device: &Device) -> Self {
        Self::full(shape, Scalar::Int(1), dtype, device)
    }

    /// Create a tensor filled with `value` cast to `dtype`.
    pub fn full(shape: &Shape, value: impl Into<Scalar>, dtype: DType, device: &Device) -> Self {
        let storage = Storage::full(dtype, shape.numel(), value.into());
        Self::from_storage_unchecked(storage, shape, device)
    }

    /// Create a tensor from typed data.
    pub fn from_slice<T: Element>(data: &[T], shape: &Shape, device: &Device) -> Result<Self> {
        check_len(data.len(), shape)?;
        Ok(Self::from_storage_unchecked(
            T::into_storage(data.to_vec()),
            shape,
            device,
        ))
    }

    /// Create a tensor from f32 data.
    pub fn from_f32(data: &[f32], shape: &Shape, device: &Device) -> Result<Self> {
        Self::from_slice(data, shape, device)
    }

    /// Create a tensor from scalars, casting each to `dtype`.
    pub fn from_scalars(
        values: &[Scalar],
        shape: &Shape,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        check_len(values.len(), shape)?;
        Ok(Self::from_storage_unchecked(
            Storage::from_scalars(dtype, values),
            shape,
            device,
        ))
    }

    fn from_storage_unchecked(storage: Storage, shape: &Shape, device: &Device) -> Self {
        Self {
            dtype: storage.dtype(),
            storage: Arc::new(RwLock::new(storage)),
            layout: Layout::contiguous(shape),
            device: *device,
        }
    }

    // ── Views ───────────────────────────────────────────────────────────

    /// Broadcast view with a larger logical shape sharing this storage.
    pub fn expand(&self, shape: &Shape) -> Result<Tensor> {
        let layout = self.layout.broadcast_to(shape).ok_or_else(|| {
            TensorError::InvalidArgument(format!(
                "cannot expand shape {} to {}",
                self.shape(),
                shape
            ))
        })?;
        Ok(Tensor {
            storage: Arc::clone(&self.storage),
            layout,
            dtype: self.dtype,
            device: self.device,
        })
    }

    /// Copy into fresh contiguous storage.
    pub fn contiguous(&self) -> Tensor {
        self.to_dtype(self.dtype)
    }

    /// Copy into fresh contiguous storage of `dtype`.
    pub fn to_dtype(&self, dtype: DType) -> Tensor {
        let values = self.to_scalars();
        Self::from_storage_unchecked(
            Storage::from_scalars(dtype, &values),
            self.shape(),
            &self.device,
        )
    }

    // ── Element access ──────────────────────────────────────────────────

    /// Logical elements in row-major order.
    pub fn to_scalars(&self) -> Vec<Scalar> {
        let storage = self.storage.read();
        self.layout.offsets().map(|i| storage.get(i)).collect()
    }

    /// Copy data out as `Vec<T>`; `T` must match the tensor dtype.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(TensorError::DtypeMismatch {
                expected: self.dtype,
                got: T::DTYPE,
            });
        }
        let storage = self.storage.read();
        let data = T::slice(&storage).ok_or(TensorError::DtypeMismatch {
            expected: self.dtype,
            got: T::DTYPE,
        })?;
        Ok(self.layout.offsets().map(|i| data[i]).collect())
    }

    /// Read `len` logical elements starting at logical position `start`.
    ///
    /// Only defined for contiguous tensors, where logical and storage order
    /// coincide.
    pub fn read_range(&self, start: usize, len: usize) -> Result<Vec<Scalar>> {
        let base = self.contiguous_base(start, len)?;
        let storage = self.storage.read();
        Ok((base..base + len).map(|i| storage.get(i)).collect())
    }

    /// Write `values` at logical positions `start..start + values.len()` of a
    /// contiguous tensor, casting to its dtype.
    pub fn write_range(&self, start: usize, values: &[Scalar]) -> Result<()> {
        let base = self.contiguous_base(start, values.len())?;
        let mut storage = self.storage.write();
        for (i, &v) in values.iter().enumerate() {
            storage.set(base + i, v);
        }
        Ok(())
    }

    /// Write one value per logical element, in row-major order, through this
    /// tensor's strides. Elements that share a storage slot are written in
    /// order, so the last write wins.
    pub fn write_scalars(&self, values: &[Scalar]) -> Result<()> {
        if values.len() != self.numel() {
            return Err(TensorError::InvalidArgument(format!(
                "expected {} values for shape {}, got {}",
                self.numel(),
                self.shape(),
                values.len()
            )));
        }
        let mut storage = self.storage.write();
        for (offset, &v) in self.layout.offsets().zip(values.iter()) {
            storage.set(offset, v);
        }
        Ok(())
    }

    fn contiguous_base(&self, start: usize, len: usize) -> Result<usize> {
        if !self.is_contiguous() {
            return Err(TensorError::InvalidArgument(
                "range access requires a contiguous tensor".into(),
            ));
        }
        if start + len > self.numel() {
            return Err(TensorError::InvalidArgument(format!(
                "range {start}..{} out of bounds for {} elements",
                start + len,
                self.numel()
            )));
        }
        Ok(self.layout.offset() + start)
    }

    // ── Comparison ──────────────────────────────────────────────────────

    /// Same shape, dtype and exactly equal values.
    pub fn equal(&self, other: &Tensor) -> bool {
        self.dtype == other.dtype
            && self.shape() == other.shape()
            && self.to_scalars() == other.to_scalars()
    }

    /// Same shape and dtype, values within `atol + rtol * |other|`.
    pub fn allclose(&self, other: &Tensor, rtol: f64, atol: f64) -> bool {
        self.dtype == other.dtype
            && self.shape() == other.shape()
            && self
                .to_scalars()
                .iter()
                .zip(other.to_scalars().iter())
                .all(|(&a, &b)| a.is_close(b, rtol, atol))
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// Get the tensor shape.
    pub fn shape(&self) -> &Shape {
        self.layout.shape()
    }

    /// Get the tensor dtype.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Get the tensor device.
    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.layout.numel()
    }

    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// True if both handles refer to the same storage buffer.
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// True if some storage slot backs more than one logical element.
    pub fn has_internal_overlap(&self) -> bool {
        self.layout
            .shape()
            .dims()
            .iter()
            .zip(self.layout.strides())
            .any(|(&d, &s)| d > 1 && s == 0)
    }
}

fn check_len(len: usize, shape: &Shape) -> Result<()> {
    let expected = shape.numel();
    if len != expected {
        return Err(TensorError::InvalidArgument(format!(
            "data length {len} does not match shape {shape} (expected {expected})"
        )));
    }
    Ok(())
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", self.shape())
            .field("dtype", &self.dtype)
            .field("device", &self.device)
            .field("strides", &self.layout.strides())
            .finish_non_exhaustive()
    }
}
