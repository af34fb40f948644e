//! `tk-ops` - Operators built on the tk-core kernel contract.
//!
//! This crate provides:
//! - `ElementwiseKernel`: broadcasting add, sub and mul with wrap or saturate
//!   narrowing, including QAsymm8
//! - `ActivationKernel`: relu, bounded relu, logistic, silu and linear
//! - `UpsampleKernel`: nearest-neighbour upsampling by an integer stride
//! - `Operator`, a tag that selects the kernel for a backend at runtime
//!
//! Every kernel exists for both backends (`CpuXxxKernel` / `GpuXxxKernel`)
//! and shares its compute code between them.

pub mod activation;
pub mod common;
pub mod elementwise;
pub mod upsample;

pub use activation::{ActivationFunction, ActivationKernel, CpuActivationKernel, GpuActivationKernel};
pub use elementwise::{
    BinaryOp, ConvertPolicy, CpuElementwiseKernel, ElementwiseKernel, ElementwiseParams,
    GpuElementwiseKernel,
};
pub use upsample::{
    CpuUpsampleKernel, GpuUpsampleKernel, InterpolationPolicy, Size2D, UpsampleKernel,
    UpsampleParams,
};

use tk_core::{Backend, ComputeContext, Kernel, KernelOperator, Status, StatusError};
use tk_tensor::{Tensor, TensorInfo};

/// An operator together with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operator {
    Elementwise(ElementwiseParams),
    Activation(ActivationFunction),
    Upsample(UpsampleParams),
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Elementwise(_) => "elementwise",
            Operator::Activation(_) => "activation",
            Operator::Upsample(_) => "upsample",
        }
    }
}

/// Check whether `op` can be configured for these descriptors. The checks
/// are the same for every backend.
pub fn validate(op: &Operator, inputs: &[&TensorInfo], output: &TensorInfo) -> Status {
    match op {
        Operator::Elementwise(p) => CpuElementwiseKernel::validate(inputs, output, p),
        Operator::Activation(f) => CpuActivationKernel::validate(inputs, output, f),
        Operator::Upsample(p) => CpuUpsampleKernel::validate(inputs, output, p),
    }
}

fn boxed<'a, K: KernelOperator<'a>>(
    inputs: &[&'a Tensor],
    output: &'a mut Tensor,
    params: K::Params,
) -> Result<Box<dyn Kernel + 'a>, StatusError> {
    Ok(Box::new(K::try_configure(inputs, output, params)?))
}

/// Validate, then configure the kernel implementing `op` on `backend`.
pub fn configure<'a>(
    backend: Backend,
    op: &Operator,
    inputs: &[&'a Tensor],
    output: &'a mut Tensor,
) -> Result<Box<dyn Kernel + 'a>, StatusError> {
    match (backend, *op) {
        (Backend::Cpu, Operator::Elementwise(p)) => boxed::<CpuElementwiseKernel<'a>>(inputs, output, p),
        (Backend::Gpu, Operator::Elementwise(p)) => boxed::<GpuElementwiseKernel<'a>>(inputs, output, p),
        (Backend::Cpu, Operator::Activation(f)) => boxed::<CpuActivationKernel<'a>>(inputs, output, f),
        (Backend::Gpu, Operator::Activation(f)) => boxed::<GpuActivationKernel<'a>>(inputs, output, f),
        (Backend::Cpu, Operator::Upsample(p)) => boxed::<CpuUpsampleKernel<'a>>(inputs, output, p),
        (Backend::Gpu, Operator::Upsample(p)) => boxed::<GpuUpsampleKernel<'a>>(inputs, output, p),
    }
}

/// Validate, configure and run `op` on `backend`, returning once the output
/// is complete.
pub fn execute(
    ctx: &ComputeContext,
    backend: Backend,
    op: &Operator,
    inputs: &[&Tensor],
    output: &mut Tensor,
) -> Status {
    let kernel = configure(backend, op, inputs, output)?;
    log::debug!("execute {} on {}", op.name(), backend);
    ctx.scheduler(backend).schedule(kernel.as_ref());
    Ok(())
}
