//! Partitioning a kernel's window and driving its `run` calls.
//!
//! Every scheduler follows the same dispatch-and-wait contract: split the
//! kernel's window along one dimension into at most as many partitions as
//! there are execution units, run each partition, and return only once all
//! of them have completed.

pub mod cpu;
pub mod gpu;
pub mod queue;

pub use cpu::CpuScheduler;
pub use gpu::GpuScheduler;
pub use queue::{CommandQueue, QueueScope};

use crate::contract_assert;
use crate::kernel::{Backend, Kernel};
use crate::window::Window;
use tk_tensor::MAX_DIMS;

/// Per-dispatch overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hints {
    /// Dimension to split along instead of the kernel's preference.
    pub split_dimension: Option<usize>,
    /// Upper bound on the number of partitions, below the scheduler's own.
    pub max_units: Option<usize>,
}

impl Hints {
    pub fn split_dimension(dim: usize) -> Self {
        Hints {
            split_dimension: Some(dim),
            max_units: None,
        }
    }

    pub fn with_max_units(mut self, max_units: usize) -> Self {
        self.max_units = Some(max_units);
        self
    }
}

pub trait Scheduler: Send + Sync {
    fn backend(&self) -> Backend;

    /// Number of execution units work can be spread over.
    fn num_units(&self) -> usize;

    /// Run `kernel` over its full window and wait for completion.
    fn schedule_with_hints(&self, kernel: &dyn Kernel, hints: Hints);

    fn schedule(&self, kernel: &dyn Kernel) {
        self.schedule_with_hints(kernel, Hints::default());
    }

    /// Run several kernels in order, each over its full window.
    fn schedule_all(&self, kernels: &[&dyn Kernel]) {
        for kernel in kernels {
            self.schedule(*kernel);
        }
    }
}

/// Partitions a scheduler with `units` execution units dispatches for
/// `kernel`: never more than the units, the hint, or the iterations of the
/// split dimension, and a single partition for non-parallelisable kernels.
pub fn plan_partitions(kernel: &dyn Kernel, units: usize, hints: Hints) -> (usize, Vec<Window>) {
    let window = kernel.window();
    let dim = hints
        .split_dimension
        .unwrap_or_else(|| kernel.split_dimension());
    contract_assert!(
        dim < MAX_DIMS,
        "{}: split dimension {} out of range for {} dimensions",
        kernel.name(),
        dim,
        MAX_DIMS
    );
    let mut limit = hints.max_units.map_or(units, |m| m.min(units));
    if !kernel.is_parallelisable() {
        limit = 1;
    }
    (dim, window.split_dimension(dim, limit))
}

pub(crate) fn check_backend(scheduler: Backend, kernel: &dyn Kernel) {
    contract_assert!(
        kernel.backend() == scheduler,
        "{} kernel {} handed to the {} scheduler",
        kernel.backend(),
        kernel.name(),
        scheduler
    );
}
