//! `tk-core` - Kernel execution machinery for tensor-kernels.
//!
//! This crate provides:
//! - `Window`, the immutable N-dimensional iteration domain, and its
//!   step-aligned splitting
//! - The `Kernel` contract (validate, configure, run) and the `BackendTag`
//!   dispatch shared by CPU and GPU kernels
//! - `CpuScheduler` (rayon worker pool) and `GpuScheduler` (in-order
//!   command queue), both following a dispatch-and-wait contract
//! - Shape, dtype and stride validation reported through `Status`
//! - `ComputeContext`, the process-wide owner of the schedulers

pub mod binding;
pub mod config;
pub mod context;
pub mod kernel;
pub mod scheduler;
pub mod status;
pub mod validate;
pub mod window;

// Re-export primary types at the crate root for convenience.
pub use binding::OutputBinding;
pub use config::RuntimeConfig;
pub use context::{ComputeContext, ContextError};
pub use kernel::{
    Backend, BackendTag, Cpu, ExecutionContext, Gpu, Kernel, KernelOperator, ThreadInfo,
};
pub use scheduler::{CommandQueue, CpuScheduler, GpuScheduler, Hints, QueueScope, Scheduler};
pub use status::{ErrorKind, Status, StatusError};
pub use window::{Dimension, Window, DIM_X, DIM_Y, DIM_Z};
