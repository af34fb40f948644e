use std::sync::Arc;

use super::{check_backend, plan_partitions, CommandQueue, Hints, Scheduler};
use crate::kernel::{Backend, ExecutionContext, Kernel};

/// Enqueues kernel partitions on an in-order command queue and waits for the
/// queue to drain.
///
/// Commands execute sequentially, so splitting a dispatch into several
/// partitions only changes the granularity of the enqueued work.
#[derive(Debug)]
pub struct GpuScheduler {
    queue: Arc<CommandQueue>,
    max_partitions: usize,
}

impl GpuScheduler {
    pub fn new(queue: Arc<CommandQueue>, max_partitions: usize) -> Self {
        GpuScheduler {
            queue,
            max_partitions: max_partitions.max(1),
        }
    }

    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }
}

impl Scheduler for GpuScheduler {
    fn backend(&self) -> Backend {
        Backend::Gpu
    }

    fn num_units(&self) -> usize {
        self.max_partitions
    }

    fn schedule_with_hints(&self, kernel: &dyn Kernel, hints: Hints) {
        check_backend(Backend::Gpu, kernel);
        let (dim, partitions) = plan_partitions(kernel, self.max_partitions, hints);
        log::debug!(
            "{}: enqueue {} partition(s) along dim {} on {}",
            kernel.name(),
            partitions.len(),
            dim,
            self.queue.name()
        );
        self.queue.scope(|scope| {
            let ctx = ExecutionContext::Gpu(scope);
            for window in &partitions {
                // SAFETY: the partitions are disjoint and the queue runs one
                // command at a time.
                unsafe { kernel.run(window, &ctx) };
            }
        });
    }

    /// Enqueue every kernel before a single drain. Later kernels observe the
    /// outputs of earlier ones because the queue preserves submission order.
    fn schedule_all(&self, kernels: &[&dyn Kernel]) {
        for kernel in kernels {
            check_backend(Backend::Gpu, *kernel);
        }
        log::debug!("enqueue {} kernel(s) on {}", kernels.len(), self.queue.name());
        self.queue.scope(|scope| {
            let ctx = ExecutionContext::Gpu(scope);
            for kernel in kernels {
                let (_, partitions) = plan_partitions(*kernel, self.max_partitions, Hints::default());
                for window in &partitions {
                    // SAFETY: as in `schedule_with_hints`; commands of
                    // different kernels never overlap in time either.
                    unsafe { kernel.run(window, &ctx) };
                }
            }
        });
    }
}
