//! Broadcasting elementwise arithmetic: `output = lhs <op> rhs`.
//!
//! Integer types compute in `i64` and narrow according to the
//! [`ConvertPolicy`]; floating point types compute in `f64`. QAsymm8
//! operands are dequantized with their own quantization parameters and the
//! result is requantized with the output's, which always saturates.

use std::fmt;
use std::marker::PhantomData;

use half::f16;
use tk_core::kernel::{check_run_window, expect_valid};
use tk_core::validate::{check_data_type, check_not_empty, validate_shapes};
use tk_core::{
    contract_violation, ensure_status, Backend, BackendTag, Cpu, ExecutionContext, Gpu, Kernel,
    KernelOperator, OutputBinding, Status, Window,
};
use tk_tensor::{DType, Element, Tensor, TensorInfo};

use crate::common::{broadcast_coords, elements, for_each_element, load, vector_step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
}

impl BinaryOp {
    fn apply_i64(self, a: i64, b: i64) -> i64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
        }
    }

    fn apply_f64(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "add"),
            BinaryOp::Sub => write!(f, "sub"),
            BinaryOp::Mul => write!(f, "mul"),
        }
    }
}

/// Narrowing behaviour of integer results that overflow the output type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConvertPolicy {
    /// Keep the low bits.
    Wrap,
    /// Clamp to the representable range.
    #[default]
    Saturate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementwiseParams {
    pub op: BinaryOp,
    pub policy: ConvertPolicy,
}

impl ElementwiseParams {
    pub fn new(op: BinaryOp, policy: ConvertPolicy) -> Self {
        ElementwiseParams { op, policy }
    }

    pub fn add() -> Self {
        Self::new(BinaryOp::Add, ConvertPolicy::Saturate)
    }

    pub fn sub() -> Self {
        Self::new(BinaryOp::Sub, ConvertPolicy::Saturate)
    }

    pub fn mul() -> Self {
        Self::new(BinaryOp::Mul, ConvertPolicy::Saturate)
    }
}

pub const SUPPORTED_TYPES: [DType; 6] = [
    DType::U8,
    DType::S16,
    DType::S32,
    DType::F16,
    DType::F32,
    DType::QAsymm8,
];

pub struct ElementwiseKernel<'a, B: BackendTag> {
    lhs: &'a Tensor,
    rhs: &'a Tensor,
    output: OutputBinding<'a>,
    params: ElementwiseParams,
    window: Window,
    _backend: PhantomData<B>,
}

pub type CpuElementwiseKernel<'a> = ElementwiseKernel<'a, Cpu>;
pub type GpuElementwiseKernel<'a> = ElementwiseKernel<'a, Gpu>;

impl<'a, B: BackendTag> ElementwiseKernel<'a, B> {
    pub fn params(&self) -> ElementwiseParams {
        self.params
    }

    /// Compute every output element inside `window`.
    ///
    /// # Safety
    /// No concurrent call may be given an overlapping window.
    unsafe fn compute(&self, window: &Window) {
        match self.output.info().dtype() {
            DType::U8 => self.compute_int::<u8>(window),
            DType::S16 => self.compute_int::<i16>(window),
            DType::S32 => self.compute_int::<i32>(window),
            DType::F16 => self.compute_float::<f16>(window),
            DType::F32 => self.compute_float::<f32>(window),
            DType::QAsymm8 => self.compute_quantized(window),
            other => contract_violation!("elementwise kernel bound to a {} output", other),
        }
    }

    unsafe fn compute_int<T: Element>(&self, window: &Window) {
        let (a, b) = (elements::<T>(self.name(), self.lhs), elements::<T>(self.name(), self.rhs));
        let (ai, bi, oi) = (self.lhs.info(), self.rhs.info(), self.output.info());
        let ElementwiseParams { op, policy } = self.params;
        for_each_element(window, oi.shape().x(), |c| {
            let x = load(a, ai, &broadcast_coords(c, ai.shape())).to_i64();
            let y = load(b, bi, &broadcast_coords(c, bi.shape())).to_i64();
            let r = op.apply_i64(x, y);
            let v = match policy {
                ConvertPolicy::Wrap => T::wrap_from_i64(r),
                ConvertPolicy::Saturate => T::saturate_from_i64(r),
            };
            self.output.write(oi.offset_element_in_bytes(c), v);
        });
    }

    unsafe fn compute_float<T: Element>(&self, window: &Window) {
        let (a, b) = (elements::<T>(self.name(), self.lhs), elements::<T>(self.name(), self.rhs));
        let (ai, bi, oi) = (self.lhs.info(), self.rhs.info(), self.output.info());
        let op = self.params.op;
        for_each_element(window, oi.shape().x(), |c| {
            let x = load(a, ai, &broadcast_coords(c, ai.shape())).to_f64();
            let y = load(b, bi, &broadcast_coords(c, bi.shape())).to_f64();
            self.output
                .write(oi.offset_element_in_bytes(c), T::from_f64(op.apply_f64(x, y)));
        });
    }

    unsafe fn compute_quantized(&self, window: &Window) {
        let (a, b) = (elements::<u8>(self.name(), self.lhs), elements::<u8>(self.name(), self.rhs));
        let (ai, bi, oi) = (self.lhs.info(), self.rhs.info(), self.output.info());
        let (qa, qb, qo) = (ai.quantization(), bi.quantization(), oi.quantization());
        let op = self.params.op;
        for_each_element(window, oi.shape().x(), |c| {
            let x = qa.dequantize(load(a, ai, &broadcast_coords(c, ai.shape())) as i32);
            let y = qb.dequantize(load(b, bi, &broadcast_coords(c, bi.shape())) as i32);
            let r = op.apply_f64(x as f64, y as f64) as f32;
            self.output.write(oi.offset_element_in_bytes(c), qo.quantize_u8(r));
        });
    }
}

unsafe impl<B: BackendTag> Kernel for ElementwiseKernel<'_, B> {
    fn name(&self) -> &'static str {
        "elementwise"
    }

    fn backend(&self) -> Backend {
        B::BACKEND
    }

    fn window(&self) -> &Window {
        &self.window
    }

    unsafe fn run<'k>(&'k self, window: &Window, ctx: &ExecutionContext<'_, 'k>) {
        check_run_window(self.name(), &self.window, window);
        let window = window.clone();
        B::launch(ctx, move || {
            // SAFETY: forwarded from the caller of `run`.
            unsafe { self.compute(&window) }
        });
    }
}

impl<'a, B: BackendTag> KernelOperator<'a> for ElementwiseKernel<'a, B> {
    type Params = ElementwiseParams;

    fn validate(inputs: &[&TensorInfo], output: &TensorInfo, params: &ElementwiseParams) -> Status {
        ensure_status!(
            inputs.len() == 2,
            UnsupportedParameterCombination,
            "{} takes 2 inputs, got {}",
            params.op,
            inputs.len()
        );
        check_not_empty(output)?;
        check_data_type(output, &SUPPORTED_TYPES)?;
        validate_shapes(inputs, output)?;
        ensure_status!(
            !(output.dtype().is_quantized() && params.policy == ConvertPolicy::Wrap),
            UnsupportedParameterCombination,
            "{} only supports the saturate policy",
            output.dtype()
        );
        Ok(())
    }

    fn configure(inputs: &[&'a Tensor], output: &'a mut Tensor, params: ElementwiseParams) -> Self {
        let infos: Vec<&TensorInfo> = inputs.iter().map(|t| t.info()).collect();
        expect_valid("elementwise", Self::validate(&infos, output.info(), &params));

        let window = Window::from_shape(output.shape(), vector_step(output.info()));
        log::trace!("elementwise {} configured over {}", params.op, window);
        ElementwiseKernel {
            lhs: inputs[0],
            rhs: inputs[1],
            output: OutputBinding::new(output),
            params,
            window,
            _backend: PhantomData,
        }
    }
}
