use std::marker::PhantomData;

use half::f16;
use tk_core::kernel::{check_run_window, expect_valid};
use tk_core::validate::{check_data_type, check_not_empty, check_same_shape, validate_shapes};
use tk_core::{
    contract_violation, ensure_status, Backend, BackendTag, Cpu, ExecutionContext, Gpu, Kernel,
    KernelOperator, OutputBinding, Status, Window,
};
use tk_tensor::{DType, Element, Tensor, TensorInfo};

use crate::common::{elements, for_each_element, load, vector_step};

/// Pointwise activation functions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivationFunction {
    /// `max(0, x)`
    Relu,
    /// `min(upper, max(0, x))`
    BoundedRelu { upper: f32 },
    /// `1 / (1 + e^-x)`
    Logistic,
    /// `x / (1 + e^-x)`
    Silu,
    /// `a * x + b`
    Linear { a: f32, b: f32 },
}

impl ActivationFunction {
    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            ActivationFunction::Relu => x.max(0.0),
            ActivationFunction::BoundedRelu { upper } => x.max(0.0).min(upper as f64),
            ActivationFunction::Logistic => 1.0 / (1.0 + (-x).exp()),
            ActivationFunction::Silu => x / (1.0 + (-x).exp()),
            ActivationFunction::Linear { a, b } => a as f64 * x + b as f64,
        }
    }
}

pub const SUPPORTED_TYPES: [DType; 2] = [DType::F16, DType::F32];

pub struct ActivationKernel<'a, B: BackendTag> {
    input: &'a Tensor,
    output: OutputBinding<'a>,
    function: ActivationFunction,
    window: Window,
    _backend: PhantomData<B>,
}

pub type CpuActivationKernel<'a> = ActivationKernel<'a, Cpu>;
pub type GpuActivationKernel<'a> = ActivationKernel<'a, Gpu>;

impl<B: BackendTag> ActivationKernel<'_, B> {
    /// # Safety
    /// No concurrent call may be given an overlapping window.
    unsafe fn compute(&self, window: &Window) {
        match self.output.info().dtype() {
            DType::F16 => self.compute_typed::<f16>(window),
            DType::F32 => self.compute_typed::<f32>(window),
            other => contract_violation!("activation kernel bound to a {} output", other),
        }
    }

    unsafe fn compute_typed<T: Element>(&self, window: &Window) {
        let src = elements::<T>(self.name(), self.input);
        let (ii, oi) = (self.input.info(), self.output.info());
        let f = self.function;
        for_each_element(window, oi.shape().x(), |c| {
            let v = f.apply(load(src, ii, c).to_f64());
            self.output.write(oi.offset_element_in_bytes(c), T::from_f64(v));
        });
    }
}

unsafe impl<B: BackendTag> Kernel for ActivationKernel<'_, B> {
    fn name(&self) -> &'static str {
        "activation"
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

impl<'a, B: BackendTag> KernelOperator<'a> for ActivationKernel<'a, B> {
    type Params = ActivationFunction;

    fn validate(inputs: &[&TensorInfo], output: &TensorInfo, function: &ActivationFunction) -> Status {
        ensure_status!(
            inputs.len() == 1,
            UnsupportedParameterCombination,
            "activation takes 1 input, got {}",
            inputs.len()
        );
        check_not_empty(output)?;
        check_data_type(output, &SUPPORTED_TYPES)?;
        validate_shapes(inputs, output)?;
        check_same_shape(inputs[0], output)?;
        if let ActivationFunction::BoundedRelu { upper } = function {
            ensure_status!(
                *upper >= 0.0,
                UnsupportedParameterCombination,
                "bounded relu upper bound {} is negative",
                upper
            );
        }
        Ok(())
    }

    fn configure(inputs: &[&'a Tensor], output: &'a mut Tensor, function: ActivationFunction) -> Self {
        let infos: Vec<&TensorInfo> = inputs.iter().map(|t| t.info()).collect();
        expect_valid("activation", Self::validate(&infos, output.info(), &function));

        ActivationKernel {
            input: inputs[0],
            window: Window::from_shape(output.shape(), vector_step(output.info())),
            output: OutputBinding::new(output),
            function,
            _backend: PhantomData,
        }
    }
}
