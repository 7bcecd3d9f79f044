//! Fused execution of a planned batch.
//!
//! Each chunk reads its input ranges into owned buffers, releasing the read
//! locks, before the result range is written. A destination that is also an
//! input at the same index therefore sees its original values.

use foreach_core::{Result, Scalar, Tensor};
use foreach_ops::kernels::{eval_binary, eval_ternary, eval_unary};
use foreach_ops::pointwise::{Operand, Prepared};
use smallvec::SmallVec;
use tracing::trace;

use crate::dispatch::{Chunk, FusedPlan};
use crate::validate::Batch;

enum Range {
    Values(Vec<Scalar>),
    Splat(Scalar),
}

impl Range {
    fn get(&self, i: usize) -> Scalar {
        match self {
            Range::Values(v) => v[i],
            Range::Splat(s) => *s,
        }
    }
}

/// Allocate one contiguous output per index.
pub fn alloc_outputs(prepared: &[Prepared]) -> Vec<Tensor> {
    prepared
        .iter()
        .map(|p| Tensor::zeros(&p.shape, p.dtype, &p.device))
        .collect()
}

/// Run every launch of `plan`, writing index `i`'s result into `dests[i]`.
pub fn execute(
    batch: &Batch<'_>,
    prepared: &[Prepared],
    plan: &FusedPlan,
    dests: &[Tensor],
) -> Result<()> {
    for (n, launch) in plan.launches.iter().enumerate() {
        trace!(
            op = %batch.op,
            launch = n,
            tensors = launch.num_tensors(),
            chunks = launch.chunks.len(),
            "fused launch"
        );
        for chunk in &launch.chunks {
            run_chunk(batch, &prepared[chunk.tensor], chunk, &dests[chunk.tensor])?;
        }
    }
    Ok(())
}

fn run_chunk(batch: &Batch<'_>, prepared: &Prepared, chunk: &Chunk, dest: &Tensor) -> Result<()> {
    let ranges = batch
        .operands(chunk.tensor)
        .iter()
        .map(|operand| match operand {
            Operand::Tensor(t) => Ok(Range::Values(t.read_range(chunk.start, chunk.len)?)),
            Operand::Scalar(s) => Ok(Range::Splat(*s)),
        })
        .collect::<Result<SmallVec<[Range; 3]>>>()?;

    let op = batch.op;
    let category = prepared.dtype.category();
    let coeff = batch.coeff.unwrap_or(Scalar::Int(1));
    let out: Vec<Scalar> = match ranges.as_slice() {
        [x] => (0..chunk.len)
            .map(|i| eval_unary(op, category, x.get(i)))
            .collect(),
        [a, b] => (0..chunk.len)
            .map(|i| eval_binary(op, category, a.get(i), b.get(i), coeff))
            .collect(),
        [base, a, b] => (0..chunk.len)
            .map(|i| eval_ternary(op, category, base.get(i), a.get(i), b.get(i), coeff))
            .collect(),
        _ => Vec::new(),
    };
    dest.write_range(chunk.start, &out)
}
