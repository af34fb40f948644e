//! The kernel contract: validate, configure, run.
//!
//! `validate` is a pure associated function over descriptors and may be
//! called speculatively any number of times. `configure` binds tensors and
//! computes the kernel's window; it panics if `validate` would have failed.
//! `run` executes a sub-window of the configured window on an execution
//! context and panics if handed anything else.

use std::fmt;

use tk_tensor::{Tensor, TensorInfo};

use crate::scheduler::queue::QueueScope;
use crate::status::{Status, StatusError};
use crate::window::Window;
use crate::{contract_assert, contract_violation};

/// Compute backend a kernel is implemented for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Cpu,
    Gpu,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cpu => write!(f, "cpu"),
            Backend::Gpu => write!(f, "gpu"),
        }
    }
}

/// Position of a CPU run within its dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo {
    pub thread_id: usize,
    pub num_threads: usize,
}

impl ThreadInfo {
    /// A run that is the only unit of its dispatch.
    pub fn single() -> Self {
        ThreadInfo {
            thread_id: 0,
            num_threads: 1,
        }
    }
}

/// Where a `run` call executes.
///
/// CPU runs compute synchronously on the calling thread. GPU runs enqueue
/// their work on the command queue of the scope they are given; the work is
/// complete once that scope has been drained.
pub enum ExecutionContext<'s, 'env> {
    Cpu(ThreadInfo),
    Gpu(&'s QueueScope<'env>),
}

impl ExecutionContext<'_, '_> {
    pub fn backend(&self) -> Backend {
        match self {
            ExecutionContext::Cpu(_) => Backend::Cpu,
            ExecutionContext::Gpu(_) => Backend::Gpu,
        }
    }
}

/// A configured unit of computation over a [`Window`].
///
/// # Safety
///
/// Implementors guarantee that `run` only writes output elements produced by
/// the iterations of the window it is given, so that runs over disjoint
/// sub-windows of [`Kernel::window`] never write the same byte. Schedulers
/// rely on this to run partitions concurrently without locking.
pub unsafe trait Kernel: Send + Sync {
    fn name(&self) -> &'static str;

    fn backend(&self) -> Backend;

    /// The full window computed by `configure`.
    fn window(&self) -> &Window;

    /// Dimension the scheduler splits along by default.
    fn split_dimension(&self) -> usize {
        self.window().outermost_splittable_dimension()
    }

    /// Kernels with cross-iteration dependencies return false and are always
    /// run as a single unit.
    fn is_parallelisable(&self) -> bool {
        true
    }

    /// Execute `window`, which must be a subset of [`Kernel::window`].
    ///
    /// # Panics
    /// Panics with a programmer contract violation if `window` is not a
    /// subset of the configured window or `ctx` belongs to another backend.
    ///
    /// # Safety
    /// Calls that may overlap in time must be given disjoint windows.
    unsafe fn run<'k>(&'k self, window: &Window, ctx: &ExecutionContext<'_, 'k>);

    /// Safe variant of [`Kernel::run`] for callers that hold the kernel
    /// exclusively.
    fn run_exclusive<'k>(&'k mut self, window: &Window, ctx: &ExecutionContext<'_, 'k>) {
        // SAFETY: the exclusive borrow rules out any other run on this kernel
        // until the work launched here is no longer referenced.
        unsafe { self.run(window, ctx) }
    }
}

/// Construction side of the contract, implemented by every concrete
/// operator for every backend it supports.
pub trait KernelOperator<'a>: Kernel + Sized + 'a {
    type Params: Clone + fmt::Debug;

    /// Check that `configure` followed by `run` over the full window would
    /// succeed for these descriptors and parameters. Pure.
    fn validate(inputs: &[&TensorInfo], output: &TensorInfo, params: &Self::Params) -> Status;

    /// Bind the tensors and compute the window.
    ///
    /// # Panics
    /// Panics with a programmer contract violation if `validate` fails for
    /// the same tensors and parameters.
    fn configure(inputs: &[&'a Tensor], output: &'a mut Tensor, params: Self::Params) -> Self;

    /// Validate, then configure. Entry point for user-supplied shapes.
    fn try_configure(
        inputs: &[&'a Tensor],
        output: &'a mut Tensor,
        params: Self::Params,
    ) -> Result<Self, StatusError> {
        let infos: Vec<&TensorInfo> = inputs.iter().map(|t| t.info()).collect();
        Self::validate(&infos, output.info(), &params)?;
        Ok(Self::configure(inputs, output, params))
    }
}

/// Abort unless a configure call's arguments passed validation.
pub fn expect_valid(kernel: &str, status: Status) {
    if let Err(e) = status {
        contract_violation!("{} configured with arguments that fail validation: {}", kernel, e);
    }
}

/// Abort unless `window` is a subset of the kernel's configured window.
pub fn check_run_window(kernel: &str, configured: &Window, window: &Window) {
    contract_assert!(
        window.is_subset_of(configured),
        "{} run on window {} outside its configured window {}",
        kernel,
        window,
        configured
    );
}

/// Static backend selection for kernels that share their compute code
/// between backends.
pub trait BackendTag: Send + Sync + 'static {
    const BACKEND: Backend;

    /// Execute `job` the way this backend runs work: inline on the CPU, or
    /// enqueued on the GPU command queue.
    fn launch<'k, F>(ctx: &ExecutionContext<'_, 'k>, job: F)
    where
        F: FnOnce() + Send + 'k;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Cpu;

#[derive(Debug, Clone, Copy, Default)]
pub struct Gpu;

impl BackendTag for Cpu {
    const BACKEND: Backend = Backend::Cpu;

    fn launch<'k, F>(ctx: &ExecutionContext<'_, 'k>, job: F)
    where
        F: FnOnce() + Send + 'k,
    {
        match ctx {
            ExecutionContext::Cpu(_) => job(),
            other => contract_violation!("cpu kernel launched on a {} context", other.backend()),
        }
    }
}

impl BackendTag for Gpu {
    const BACKEND: Backend = Backend::Gpu;

    fn launch<'k, F>(ctx: &ExecutionContext<'_, 'k>, job: F)
    where
        F: FnOnce() + Send + 'k,
    {
        match ctx {
            ExecutionContext::Gpu(scope) => scope.enqueue(job),
            other => contract_violation!("gpu kernel launched on a {} context", other.backend()),
        }
    }
}
