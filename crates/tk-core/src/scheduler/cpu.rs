use rayon::{ThreadPool, ThreadPoolBuilder};

use super::{check_backend, plan_partitions, Hints, Scheduler};
use crate::kernel::{Backend, ExecutionContext, Kernel, ThreadInfo};

/// Runs kernel partitions on a fixed pool of worker threads.
pub struct CpuScheduler {
    pool: ThreadPool,
    num_threads: usize,
}

impl CpuScheduler {
    pub fn new(num_threads: usize, name_prefix: &str) -> Result<Self, rayon::ThreadPoolBuildError> {
        let num_threads = num_threads.max(1);
        let prefix = name_prefix.to_string();
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(move |i| format!("{}-worker-{}", prefix, i))
            .build()?;
        log::info!("cpu scheduler started with {} workers", num_threads);
        Ok(CpuScheduler { pool, num_threads })
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}

impl Scheduler for CpuScheduler {
    fn backend(&self) -> Backend {
        Backend::Cpu
    }

    fn num_units(&self) -> usize {
        self.num_threads
    }

    fn schedule_with_hints(&self, kernel: &dyn Kernel, hints: Hints) {
        check_backend(Backend::Cpu, kernel);
        let (dim, partitions) = plan_partitions(kernel, self.num_threads, hints);
        log::debug!(
            "{}: {} partition(s) along dim {} of {}",
            kernel.name(),
            partitions.len(),
            dim,
            kernel.window()
        );

        if partitions.len() == 1 {
            // SAFETY: a single run covering the whole window overlaps nothing.
            unsafe { kernel.run(&partitions[0], &ExecutionContext::Cpu(ThreadInfo::single())) };
            return;
        }

        let num_threads = partitions.len();
        self.pool.scope(|s| {
            for (thread_id, window) in partitions.iter().enumerate() {
                s.spawn(move |_| {
                    log::trace!("{} partition {}/{}: {}", kernel.name(), thread_id, num_threads, window);
                    let ctx = ExecutionContext::Cpu(ThreadInfo {
                        thread_id,
                        num_threads,
                    });
                    // SAFETY: the partitions of one split are pairwise disjoint.
                    unsafe { kernel.run(window, &ctx) };
                });
            }
        });
    }
}

impl std::fmt::Debug for CpuScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuScheduler")
            .field("num_threads", &self.num_threads)
            .finish()
    }
}
