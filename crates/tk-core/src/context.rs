use std::sync::Arc;

use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::config::RuntimeConfig;
use crate::kernel::Backend;
use crate::scheduler::{CommandQueue, CpuScheduler, GpuScheduler, Scheduler};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to build the cpu worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to start the device thread: {0}")]
    DeviceThread(#[from] std::io::Error),
}

/// The execution resources kernels are dispatched on: a CPU worker pool and
/// a GPU command queue, each behind its scheduler.
#[derive(Debug)]
pub struct ComputeContext {
    config: RuntimeConfig,
    cpu: CpuScheduler,
    gpu: GpuScheduler,
}

static GLOBAL: OnceCell<ComputeContext> = OnceCell::new();

impl ComputeContext {
    pub fn new(config: RuntimeConfig) -> Result<Self, ContextError> {
        let cpu = CpuScheduler::new(config.resolved_num_threads(), &config.thread_name_prefix)?;
        let queue = CommandQueue::new(format!(
            "{}-{}",
            config.thread_name_prefix, config.device_name
        ))?;
        let gpu = GpuScheduler::new(Arc::new(queue), config.gpu_max_partitions);
        log::info!(
            "compute context ready: {} cpu workers, device {} ({} partition(s) per dispatch)",
            cpu.num_threads(),
            config.device_name,
            gpu.num_units()
        );
        Ok(ComputeContext { config, cpu, gpu })
    }

    /// The process-wide context, created from [`RuntimeConfig::from_env`] on
    /// first use.
    pub fn global() -> Result<&'static ComputeContext, ContextError> {
        GLOBAL.get_or_try_init(|| ComputeContext::new(RuntimeConfig::from_env()))
    }

    /// Create the process-wide context from `config`. Returns false if it
    /// already existed, in which case `config` is ignored.
    pub fn init_global(config: RuntimeConfig) -> Result<bool, ContextError> {
        let mut created = false;
        GLOBAL.get_or_try_init(|| {
            created = true;
            ComputeContext::new(config)
        })?;
        Ok(created)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn cpu(&self) -> &CpuScheduler {
        &self.cpu
    }

    pub fn gpu(&self) -> &GpuScheduler {
        &self.gpu
    }

    pub fn scheduler(&self, backend: Backend) -> &dyn Scheduler {
        match backend {
            Backend::Cpu => &self.cpu,
            Backend::Gpu => &self.gpu,
        }
    }
}
