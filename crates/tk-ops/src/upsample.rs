//! Integer-factor upsampling of the two innermost dimensions.
//!
//! Every input element at `(x, y, ...)` is replicated into the
//! `stride.width x stride.height` block of the output starting at
//! `(x * stride.width, y * stride.height, ...)`. The window is defined over
//! the input, so disjoint input windows always map to disjoint output
//! blocks.

use std::fmt;
use std::marker::PhantomData;

use tk_core::kernel::{check_run_window, expect_valid};
use tk_core::validate::{
    check_data_type, check_not_empty, check_same_data_type, check_same_quantization, check_strides,
};
use tk_core::{
    ensure_status, Backend, BackendTag, Cpu, ExecutionContext, Gpu, Kernel, KernelOperator,
    OutputBinding, Status, StatusError, Window, DIM_X, DIM_Y,
};
use tk_core::status::ErrorKind;
use tk_tensor::{DType, Tensor, TensorInfo, TensorShape};

use crate::common::for_each_element;

/// Input elements processed per iteration along dimension 0.
pub const ELEMENTS_PER_ITERATION: usize = 8;

/// Upsampling factors of dimensions 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size2D {
    pub width: usize,
    pub height: usize,
}

impl Size2D {
    pub fn new(width: usize, height: usize) -> Self {
        Size2D { width, height }
    }
}

impl fmt::Display for Size2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterpolationPolicy {
    #[default]
    NearestNeighbor,
    Bilinear,
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsampleParams {
    pub stride: Size2D,
    pub policy: InterpolationPolicy,
}

impl UpsampleParams {
    pub fn nearest(width: usize, height: usize) -> Self {
        UpsampleParams {
            stride: Size2D::new(width, height),
            policy: InterpolationPolicy::NearestNeighbor,
        }
    }
}

/// Shape produced by upsampling `input` by `stride`.
///
/// # Panics
/// If a stride is zero or an upsampled extent overflows `usize`.
pub fn output_shape(input: &TensorShape, stride: Size2D) -> TensorShape {
    match checked_output_shape(input, stride) {
        Some(shape) => shape,
        None => panic!("upsampling {} by {} has no valid output shape", input, stride),
    }
}

/// Like [`output_shape`], returning `None` for a zero stride or an extent
/// that overflows.
pub fn checked_output_shape(input: &TensorShape, stride: Size2D) -> Option<TensorShape> {
    if stride.width == 0 || stride.height == 0 {
        return None;
    }
    let x = input.x().checked_mul(stride.width)?;
    let y = input.y().checked_mul(stride.height)?;
    Some(input.with_dim(DIM_X, x).with_dim(DIM_Y, y))
}

pub const SUPPORTED_TYPES: [DType; 9] = [
    DType::U8,
    DType::S8,
    DType::QAsymm8,
    DType::U16,
    DType::S16,
    DType::U32,
    DType::S32,
    DType::F16,
    DType::F32,
];

pub struct UpsampleKernel<'a, B: BackendTag> {
    input: &'a Tensor,
    output: OutputBinding<'a>,
    stride: Size2D,
    window: Window,
    _backend: PhantomData<B>,
}

pub type CpuUpsampleKernel<'a> = UpsampleKernel<'a, Cpu>;
pub type GpuUpsampleKernel<'a> = UpsampleKernel<'a, Gpu>;

impl<B: BackendTag> UpsampleKernel<'_, B> {
    /// Output region written by a run over the input `window`.
    pub fn output_window(&self, window: &Window) -> Window {
        window
            .with_step(DIM_X, 1)
            .scale(DIM_X, self.stride.width)
            .scale(DIM_Y, self.stride.height)
    }

    /// # Safety
    /// No concurrent call may be given an overlapping window.
    unsafe fn compute(&self, window: &Window) {
        let (ii, oi) = (self.input.info(), self.output.info());
        let src = self.input.storage().as_bytes();
        let size = ii.element_size();
        let Size2D { width, height } = self.stride;

        for_each_element(window, ii.shape().x(), |c| {
            let offset = ii.offset_element_in_bytes(c);
            let element = &src[offset..offset + size];
            let mut dst = *c;
            for dy in 0..height {
                dst.set(DIM_Y, c.y() * height as isize + dy as isize);
                for dx in 0..width {
                    dst.set(DIM_X, c.x() * width as isize + dx as isize);
                    self.output
                        .write_bytes(oi.offset_element_in_bytes(&dst), element);
                }
            }
        });
    }
}

unsafe impl<B: BackendTag> Kernel for UpsampleKernel<'_, B> {
    fn name(&self) -> &'static str {
        "upsample"
    }

    fn backend(&self) -> Backend {
        B::BACKEND
    }

    fn window(&self) -> &Window {
        &self.window
    }

    unsafe fn run<'k>(&'k self, window: &Window, ctx: &ExecutionContext<'_, 'k>) {
        check_run_window(self.name(), &self.window, window);
        log::trace!("upsample {} writes {}", window, self.output_window(window));
        let window = window.clone();
        B::launch(ctx, move || {
            // SAFETY: forwarded from the caller of `run`; disjoint input
            // windows write disjoint output blocks.
            unsafe { self.compute(&window) }
        });
    }
}

impl<'a, B: BackendTag> KernelOperator<'a> for UpsampleKernel<'a, B> {
    type Params = UpsampleParams;

    fn validate(inputs: &[&TensorInfo], output: &TensorInfo, params: &UpsampleParams) -> Status {
        ensure_status!(
            inputs.len() == 1,
            UnsupportedParameterCombination,
            "upsample takes 1 input, got {}",
            inputs.len()
        );
        let input = inputs[0];
        check_not_empty(input)?;
        check_strides(input)?;
        check_strides(output)?;
        check_data_type(input, &SUPPORTED_TYPES)?;
        check_same_data_type(input, output)?;
        ensure_status!(
            params.policy == InterpolationPolicy::NearestNeighbor,
            UnsupportedParameterCombination,
            "{:?} interpolation is not supported",
            params.policy
        );
        ensure_status!(
            params.stride.width >= 1 && params.stride.height >= 1,
            UnsupportedParameterCombination,
            "upsample stride {} must be at least 1x1",
            params.stride
        );
        let Some(expected) = checked_output_shape(input.shape(), params.stride) else {
            return Err(StatusError::new(
                ErrorKind::UnsupportedParameterCombination,
                format!("upsampling {} by {} overflows", input.shape(), params.stride),
            ));
        };
        ensure_status!(
            *output.shape() == expected,
            ShapeMismatch,
            "upsampling {} by {} gives {}, the output is {}",
            input.shape(),
            params.stride,
            expected,
            output.shape()
        );
        check_same_quantization(input, output)?;
        Ok(())
    }

    fn configure(inputs: &[&'a Tensor], output: &'a mut Tensor, params: UpsampleParams) -> Self {
        let infos: Vec<&TensorInfo> = inputs.iter().map(|t| t.info()).collect();
        expect_valid("upsample", Self::validate(&infos, output.info(), &params));

        let input = inputs[0];
        UpsampleKernel {
            input,
            output: OutputBinding::new(output),
            stride: params.stride,
            window: Window::from_shape(input.shape(), ELEMENTS_PER_ITERATION),
            _backend: PhantomData,
        }
    }
}
