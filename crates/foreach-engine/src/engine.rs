//! The foreach engine: validation, dispatch and execution of batched ops.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use foreach_core::{Result, Scalar, Tensor};
use foreach_ops::OpKind;
use foreach_ops::pointwise::{Prepared, compute};
use tracing::debug;

use crate::config::DispatchConfig;
use crate::dispatch::{DispatchPath, choose_path};
use crate::fused;
use crate::rhs::Rhs;
use crate::validate::{Batch, validate};

/// Snapshot of dispatch counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Calls executed on the fused path.
    pub fused_calls: u64,
    /// Launches issued by fused calls.
    pub fused_launches: u64,
    /// Calls executed with the per-tensor loop.
    pub per_tensor_calls: u64,
}

#[derive(Default)]
struct Counters {
    fused_calls: AtomicU64,
    fused_launches: AtomicU64,
    per_tensor_calls: AtomicU64,
}

/// Executes batched elementwise ops under a [`DispatchConfig`].
pub struct Engine {
    config: DispatchConfig,
    counters: Counters,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}

impl Engine {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            counters: Counters::default(),
        }
    }

    /// Engine configured from `FOREACH_RS_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(DispatchConfig::from_env())
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            fused_calls: self.counters.fused_calls.load(Ordering::Relaxed),
            fused_launches: self.counters.fused_launches.load(Ordering::Relaxed),
            per_tensor_calls: self.counters.per_tensor_calls.load(Ordering::Relaxed),
        }
    }

    /// Dispatch path `batch` would take, after validation.
    pub fn plan(&self, batch: &Batch<'_>) -> Result<DispatchPath> {
        let prepared = validate(batch)?;
        Ok(choose_path(batch, &prepared, &self.config))
    }

    // ── Execution ───────────────────────────────────────────────────────

    /// Run an out-of-place batch, returning one new tensor per index.
    pub fn run(&self, batch: &Batch<'_>) -> Result<Vec<Tensor>> {
        let prepared = validate(batch)?;
        if prepared.is_empty() {
            return Ok(Vec::new());
        }
        match self.dispatch(batch, &prepared) {
            DispatchPath::Fused(plan) => {
                let outputs = fused::alloc_outputs(&prepared);
                fused::execute(batch, &prepared, &plan, &outputs)?;
                Ok(outputs)
            }
            DispatchPath::PerTensor(_) => (0..batch.len())
                .map(|i| {
                    let operands = batch.operands(i);
                    let p = &prepared[i];
                    let values = compute(batch.op, &operands, p, batch.coeff)?;
                    Tensor::from_scalars(&values, &p.shape, p.dtype, &p.device)
                })
                .collect(),
        }
    }

    /// Run an in-place batch, writing each result into `batch.base[i]`.
    pub fn run_(&self, batch: &Batch<'_>) -> Result<()> {
        let prepared = validate(batch)?;
        if prepared.is_empty() {
            return Ok(());
        }
        match self.dispatch(batch, &prepared) {
            DispatchPath::Fused(plan) => fused::execute(batch, &prepared, &plan, batch.base),
            DispatchPath::PerTensor(_) => {
                for (i, dest) in batch.base.iter().enumerate() {
                    let operands = batch.operands(i);
                    let values = compute(batch.op, &operands, &prepared[i], batch.coeff)?;
                    dest.write_scalars(&values)?;
                }
                Ok(())
            }
        }
    }

    fn dispatch(&self, batch: &Batch<'_>, prepared: &[Prepared]) -> DispatchPath {
        let path = choose_path(batch, prepared, &self.config);
        match &path {
            DispatchPath::Fused(plan) => {
                debug!(
                    op = %batch.op,
                    len = batch.len(),
                    inplace = batch.inplace,
                    depth = plan.depth,
                    launches = plan.launches.len(),
                    "foreach fused"
                );
                self.counters.fused_calls.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .fused_launches
                    .fetch_add(plan.launches.len() as u64, Ordering::Relaxed);
            }
            DispatchPath::PerTensor(reason) => {
                debug!(
                    op = %batch.op,
                    len = batch.len(),
                    inplace = batch.inplace,
                    reason = %reason,
                    "foreach per-tensor fallback"
                );
                self.counters.per_tensor_calls.fetch_add(1, Ordering::Relaxed);
            }
        }
        path
    }

    // ── Binary ops ──────────────────────────────────────────────────────

    /// `list[i] + alpha * other[i]`
    pub fn add<'a>(
        &self,
        list: &'a [Tensor],
        other: impl Into<Rhs<'a>>,
        alpha: Option<Scalar>,
    ) -> Result<Vec<Tensor>> {
        self.run(&binary(OpKind::Add, list, other.into(), alpha, false))
    }

    pub fn add_<'a>(
        &self,
        list: &'a [Tensor],
        other: impl Into<Rhs<'a>>,
        alpha: Option<Scalar>,
    ) -> Result<()> {
        self.run_(&binary(OpKind::Add, list, other.into(), alpha, true))
    }

    /// `list[i] - alpha * other[i]`
    pub fn sub<'a>(
        &self,
        list: &'a [Tensor],
        other: impl Into<Rhs<'a>>,
        alpha: Option<Scalar>,
    ) -> Result<Vec<Tensor>> {
        self.run(&binary(OpKind::Sub, list, other.into(), alpha, false))
    }

    pub fn sub_<'a>(
        &self,
        list: &'a [Tensor],
        other: impl Into<Rhs<'a>>,
        alpha: Option<Scalar>,
    ) -> Result<()> {
        self.run_(&binary(OpKind::Sub, list, other.into(), alpha, true))
    }

    pub fn mul<'a>(&self, list: &'a [Tensor], other: impl Into<Rhs<'a>>) -> Result<Vec<Tensor>> {
        self.run(&binary(OpKind::Mul, list, other.into(), None, false))
    }

    pub fn mul_<'a>(&self, list: &'a [Tensor], other: impl Into<Rhs<'a>>) -> Result<()> {
        self.run_(&binary(OpKind::Mul, list, other.into(), None, true))
    }

    pub fn div<'a>(&self, list: &'a [Tensor], other: impl Into<Rhs<'a>>) -> Result<Vec<Tensor>> {
        self.run(&binary(OpKind::Div, list, other.into(), None, false))
    }

    pub fn div_<'a>(&self, list: &'a [Tensor], other: impl Into<Rhs<'a>>) -> Result<()> {
        self.run_(&binary(OpKind::Div, list, other.into(), None, true))
    }

    // ── Pointwise ───────────────────────────────────────────────────────

    /// `list[i] + value * a[i] * b[i]`
    pub fn addcmul(
        &self,
        list: &[Tensor],
        a: &[Tensor],
        b: &[Tensor],
        value: impl Into<Scalar>,
    ) -> Result<Vec<Tensor>> {
        self.run(&ternary(OpKind::Addcmul, list, a, b, value.into(), false))
    }

    pub fn addcmul_(
        &self,
        list: &[Tensor],
        a: &[Tensor],
        b: &[Tensor],
        value: impl Into<Scalar>,
    ) -> Result<()> {
        self.run_(&ternary(OpKind::Addcmul, list, a, b, value.into(), true))
    }

    /// `list[i] + value * (a[i] / b[i])`
    pub fn addcdiv(
        &self,
        list: &[Tensor],
        a: &[Tensor],
        b: &[Tensor],
        value: impl Into<Scalar>,
    ) -> Result<Vec<Tensor>> {
        self.run(&ternary(OpKind::Addcdiv, list, a, b, value.into(), false))
    }

    pub fn addcdiv_(
        &self,
        list: &[Tensor],
        a: &[Tensor],
        b: &[Tensor],
        value: impl Into<Scalar>,
    ) -> Result<()> {
        self.run_(&ternary(OpKind::Addcdiv, list, a, b, value.into(), true))
    }

    // ── Unary ops ───────────────────────────────────────────────────────

    pub fn sqrt(&self, list: &[Tensor]) -> Result<Vec<Tensor>> {
        self.run(&Batch::new(OpKind::Sqrt, list, false))
    }

    pub fn sqrt_(&self, list: &[Tensor]) -> Result<()> {
        self.run_(&Batch::new(OpKind::Sqrt, list, true))
    }

    pub fn exp(&self, list: &[Tensor]) -> Result<Vec<Tensor>> {
        self.run(&Batch::new(OpKind::Exp, list, false))
    }

    pub fn exp_(&self, list: &[Tensor]) -> Result<()> {
        self.run_(&Batch::new(OpKind::Exp, list, true))
    }

    pub fn neg(&self, list: &[Tensor]) -> Result<Vec<Tensor>> {
        self.run(&Batch::new(OpKind::Neg, list, false))
    }

    pub fn neg_(&self, list: &[Tensor]) -> Result<()> {
        self.run_(&Batch::new(OpKind::Neg, list, true))
    }
}

fn binary<'a>(
    op: OpKind,
    list: &'a [Tensor],
    other: Rhs<'a>,
    coeff: Option<Scalar>,
    inplace: bool,
) -> Batch<'a> {
    Batch::new(op, list, inplace).arg(other).coeff(coeff)
}

fn ternary<'a>(
    op: OpKind,
    list: &'a [Tensor],
    a: &'a [Tensor],
    b: &'a [Tensor],
    value: Scalar,
    inplace: bool,
) -> Batch<'a> {
    Batch::new(op, list, inplace)
        .arg(Rhs::Tensors(a))
        .arg(Rhs::Tensors(b))
        .coeff(Some(value))
}

static DEFAULT_ENGINE: LazyLock<Engine> = LazyLock::new(Engine::from_env);

/// The process-wide engine, configured from the environment on first use.
pub fn default_engine() -> &'static Engine {
    &DEFAULT_ENGINE
}
