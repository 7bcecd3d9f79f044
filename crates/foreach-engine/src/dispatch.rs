//! Fused vs per-tensor dispatch decisions and fused launch planning.
//!
//! A fused plan splits every tensor of the batch into fixed-size chunks and
//! packs them into launches. Each launch touches a bounded number of tensors,
//! tighter the more lists (depth) it reads and writes.

use foreach_core::Device;
use foreach_ops::pointwise::Prepared;

use crate::config::{DispatchConfig, DispatchMode};
use crate::validate::Batch;

/// Maximum tensors per launch, indexed by `depth - 1`.
pub const MAX_TENSORS_PER_DEPTH: [usize; 5] = [110, 64, 48, 36, 30];

/// Maximum chunks per launch.
pub const MAX_CHUNKS_PER_LAUNCH: usize = 320;

/// Why a batch did not take the fused path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FallbackReason {
    /// Dispatch mode is `PerTensor`.
    Disabled,
    /// Mode is `Auto` and the tensors live on the cpu.
    CpuDevice,
    /// Some index's result dtype differs from its input dtype.
    Promotion,
    NonContiguous,
    /// Tensors at some index differ in shape and need broadcasting.
    ShapeMismatch,
    /// An in-place destination shares storage with another entry of the call.
    Aliasing,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FallbackReason::Disabled => "disabled",
            FallbackReason::CpuDevice => "cpu device",
            FallbackReason::Promotion => "type promotion",
            FallbackReason::NonContiguous => "non-contiguous tensor",
            FallbackReason::ShapeMismatch => "shape mismatch",
            FallbackReason::Aliasing => "aliased destination",
        };
        f.write_str(s)
    }
}

/// A contiguous element range of one tensor of the batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Index into the tensor lists.
    pub tensor: usize,
    pub start: usize,
    pub len: usize,
}

/// One unit of fused work.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Launch {
    pub chunks: Vec<Chunk>,
}

impl Launch {
    /// Number of distinct tensors this launch touches.
    pub fn num_tensors(&self) -> usize {
        let mut n = 0;
        let mut last = None;
        for c in &self.chunks {
            if last != Some(c.tensor) {
                n += 1;
                last = Some(c.tensor);
            }
        }
        n
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FusedPlan {
    /// Tensor lists touched per launch, outputs included.
    pub depth: usize,
    pub launches: Vec<Launch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchPath {
    Fused(FusedPlan),
    PerTensor(FallbackReason),
}

/// Tensor lists a batch touches: its inputs, plus the output list when not
/// in place.
pub fn depth(batch: &Batch<'_>) -> usize {
    batch.tensor_lists().count() + usize::from(!batch.inplace)
}

/// Choose how to execute a validated batch.
pub fn choose_path(
    batch: &Batch<'_>,
    prepared: &[Prepared],
    config: &DispatchConfig,
) -> DispatchPath {
    if let Some(reason) = fallback_reason(batch, prepared, config) {
        return DispatchPath::PerTensor(reason);
    }
    let depth = depth(batch);
    let numels = prepared.iter().map(|p| p.shape.numel());
    DispatchPath::Fused(plan_launches(numels, depth, config.chunk_size))
}

/// The first reason `batch` can't be fused, if any.
pub fn fallback_reason(
    batch: &Batch<'_>,
    prepared: &[Prepared],
    config: &DispatchConfig,
) -> Option<FallbackReason> {
    match config.mode {
        DispatchMode::PerTensor => return Some(FallbackReason::Disabled),
        DispatchMode::Auto => {
            if batch.base.first().is_some_and(|t| *t.device() == Device::Cpu) {
                return Some(FallbackReason::CpuDevice);
            }
        }
        DispatchMode::Fused => {}
    }

    if batch
        .base
        .iter()
        .zip(prepared)
        .any(|(t, p)| t.dtype() != p.dtype)
    {
        return Some(FallbackReason::Promotion);
    }

    let lists: Vec<_> = batch.tensor_lists().collect();
    if lists.iter().flat_map(|l| l.iter()).any(|t| !t.is_contiguous()) {
        return Some(FallbackReason::NonContiguous);
    }
    for (i, t) in batch.base.iter().enumerate() {
        if lists.iter().any(|l| l[i].shape() != t.shape()) {
            return Some(FallbackReason::ShapeMismatch);
        }
    }

    if batch.inplace {
        for (i, dest) in batch.base.iter().enumerate() {
            for list in &lists {
                for (j, other) in list.iter().enumerate() {
                    let same_slot = std::ptr::eq(dest, other);
                    if same_slot || !dest.shares_storage(other) {
                        continue;
                    }
                    // Same index, same elements: each chunk is read before
                    // it is written.
                    if i == j && dest.layout().offset() == other.layout().offset() {
                        continue;
                    }
                    return Some(FallbackReason::Aliasing);
                }
            }
        }
    }
    None
}

/// Pack `numels` (one per tensor) into launches of `chunk_size` element
/// chunks.
pub fn plan_launches(
    numels: impl IntoIterator<Item = usize>,
    depth: usize,
    chunk_size: usize,
) -> FusedPlan {
    let chunk_size = chunk_size.max(1);
    let max_tensors = MAX_TENSORS_PER_DEPTH
        .get(depth.saturating_sub(1))
        .copied()
        .unwrap_or(MAX_TENSORS_PER_DEPTH[MAX_TENSORS_PER_DEPTH.len() - 1]);

    let mut launches = Vec::new();
    let mut current = Launch::default();
    let mut tensors_in_launch = 0;

    for (i, numel) in numels.into_iter().enumerate() {
        let mut start = 0;
        while start < numel {
            let len = chunk_size.min(numel - start);
            let new_tensor = current.chunks.last().is_none_or(|c| c.tensor != i);
            if current.chunks.len() == MAX_CHUNKS_PER_LAUNCH
                || (new_tensor && tensors_in_launch == max_tensors)
            {
                launches.push(std::mem::take(&mut current));
                tensors_in_launch = 0;
            }
            if current.chunks.last().is_none_or(|c| c.tensor != i) {
                tensors_in_launch += 1;
            }
            current.chunks.push(Chunk {
                tensor: i,
                start,
                len,
            });
            start += len;
        }
    }
    if !current.chunks.is_empty() {
        launches.push(current);
    }
    FusedPlan { depth, launches }
}
