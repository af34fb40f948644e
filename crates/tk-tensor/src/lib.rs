//! `tk-tensor` - Tensor geometry and CPU storage for tensor-kernels.
//!
//! This crate provides:
//! - `TensorShape` and `Coordinates`, stored innermost dimension first
//! - `TensorInfo`, the descriptor kernels validate against (dtype, byte
//!   strides, first-element offset, quantization, resizable flag)
//! - Broadcasting rules shared by every operator
//! - A `Tensor` type backed by typed CPU storage

pub mod dtype;
pub mod error;
pub mod info;
pub mod shape;
pub mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use dtype::{DType, Element};
pub use error::{Result, TensorError};
pub use info::{QuantizationInfo, TensorInfo};
pub use shape::{Coordinates, TensorShape, MAX_DIMS};
pub use storage::CpuStorage;
pub use tensor::Tensor;

pub use half::f16;
