use std::panic::{self, AssertUnwindSafe};

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tk_core::scheduler::plan_partitions;
use tk_core::status::ErrorKind;
use tk_core::{
    Backend, ComputeContext, ExecutionContext, Hints, Kernel, KernelOperator, RuntimeConfig,
    Scheduler, ThreadInfo, Window, DIM_X, DIM_Y,
};
use tk_ops::upsample::checked_output_shape;
use tk_ops::{
    ActivationFunction, BinaryOp, ConvertPolicy, CpuActivationKernel, CpuElementwiseKernel,
    CpuUpsampleKernel, ElementwiseParams, GpuActivationKernel, GpuElementwiseKernel,
    GpuUpsampleKernel, InterpolationPolicy, Operator, Size2D, UpsampleParams,
};
use tk_tensor::{DType, Tensor, TensorInfo, TensorShape};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn context(threads: usize, gpu_partitions: usize) -> ComputeContext {
    ComputeContext::new(RuntimeConfig {
        num_threads: Some(threads),
        gpu_max_partitions: gpu_partitions,
        ..RuntimeConfig::default()
    })
    .unwrap()
}

fn random_f32(shape: TensorShape, seed: u64) -> Tensor {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f32> = (0..shape.total_size()).map(|_| rng.gen_range(-10.0..10.0)).collect();
    Tensor::from_vec(shape, data).unwrap()
}

fn random_s16(shape: TensorShape, seed: u64) -> Tensor {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<i16> = (0..shape.total_size()).map(|_| rng.gen()).collect();
    Tensor::from_vec(shape, data).unwrap()
}

fn cpu_ctx<'s, 'env>() -> ExecutionContext<'s, 'env> {
    ExecutionContext::Cpu(ThreadInfo::single())
}

#[test]
fn test_split_rows_matches_whole() {
    let shape = TensorShape::new(&[4, 4]);
    let a = random_f32(shape, 1);
    let b = random_f32(shape, 2);

    let mut whole = Tensor::zeros(shape, DType::F32);
    {
        let mut k = CpuElementwiseKernel::configure(&[&a, &b], &mut whole, ElementwiseParams::add());
        let window = k.window().clone();
        k.run_exclusive(&window, &cpu_ctx());
    }

    let mut split = Tensor::zeros(shape, DType::F32);
    {
        let mut k = CpuElementwiseKernel::configure(&[&a, &b], &mut split, ElementwiseParams::add());
        let parts = k.window().split_dimension(DIM_Y, 2);
        assert_eq!(parts.len(), 2);
        assert_eq!((parts[0].y().start(), parts[0].y().end()), (0, 2));
        assert_eq!((parts[1].y().start(), parts[1].y().end()), (2, 4));
        for part in &parts {
            assert_eq!(part.x(), k.window().x());
            k.run_exclusive(part, &cpu_ctx());
        }
    }

    assert_eq!(whole, split);
}

#[test]
fn test_mismatched_shapes_rejected() {
    let a = TensorInfo::new(TensorShape::new(&[3, 3]), DType::F32);
    let b = TensorInfo::new(TensorShape::new(&[4, 4]), DType::F32);
    let op = Operator::Elementwise(ElementwiseParams::add());
    let err = tk_ops::validate(&op, &[&a, &b], &b).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);

    let ta = Tensor::zeros(*a.shape(), DType::F32);
    let tb = Tensor::zeros(*b.shape(), DType::F32);
    let mut out = Tensor::zeros(*b.shape(), DType::F32);
    let ctx = context(2, 1);
    let err = tk_ops::execute(&ctx, Backend::Cpu, &op, &[&ta, &tb], &mut out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
}

#[test]
#[should_panic(expected = "programmer contract violation")]
fn test_run_past_window_end_panics() {
    let shape = TensorShape::new(&[4, 4]);
    let a = Tensor::zeros(shape, DType::F32);
    let mut out = Tensor::zeros(shape, DType::F32);
    let mut k = CpuElementwiseKernel::configure(&[&a, &a], &mut out, ElementwiseParams::add());
    let past_end = k.window().shift(DIM_Y, 1);
    k.run_exclusive(&past_end, &cpu_ctx());
}

#[test]
fn test_partitions_clamped_to_iterations() {
    let shape = TensorShape::new(&[4, 3]);
    let a = Tensor::zeros(shape, DType::F32);
    let mut out = Tensor::zeros(shape, DType::F32);
    let k = CpuElementwiseKernel::configure(&[&a, &a], &mut out, ElementwiseParams::add());
    let (dim, parts) = plan_partitions(&k, 8, Hints::default());
    assert_eq!(dim, DIM_Y);
    assert_eq!(parts.len(), 3);
    assert!(parts.iter().all(|w| !w.is_empty()));
}

#[test]
fn test_execute_cpu_matches_gpu() {
    init();
    let ctx = context(4, 3);
    let shape = TensorShape::new(&[13, 7, 2]);
    let a = random_f32(shape, 3);
    let b = random_f32(TensorShape::new(&[13, 1, 2]), 4);
    let ops = [
        Operator::Elementwise(ElementwiseParams::sub()),
        Operator::Elementwise(ElementwiseParams::mul()),
    ];
    for op in &ops {
        let mut on_cpu = Tensor::zeros(shape, DType::F32);
        let mut on_gpu = Tensor::zeros(shape, DType::F32);
        tk_ops::execute(&ctx, Backend::Cpu, op, &[&a, &b], &mut on_cpu).unwrap();
        tk_ops::execute(&ctx, Backend::Gpu, op, &[&a, &b], &mut on_gpu).unwrap();
        assert_eq!(on_cpu, on_gpu);
    }

    let relu = Operator::Activation(ActivationFunction::Relu);
    let mut on_cpu = Tensor::zeros(shape, DType::F32);
    let mut on_gpu = Tensor::zeros(shape, DType::F32);
    tk_ops::execute(&ctx, Backend::Cpu, &relu, &[&a], &mut on_cpu).unwrap();
    tk_ops::execute(&ctx, Backend::Gpu, &relu, &[&a], &mut on_gpu).unwrap();
    assert_eq!(on_cpu, on_gpu);
    assert!(on_cpu.to_vec::<f32>().unwrap().iter().all(|&v| v >= 0.0));

    let upsample = Operator::Upsample(UpsampleParams::nearest(2, 3));
    let out_shape = tk_ops::upsample::output_shape(&shape, UpsampleParams::nearest(2, 3).stride);
    let mut on_cpu = Tensor::zeros(out_shape, DType::F32);
    let mut on_gpu = Tensor::zeros(out_shape, DType::F32);
    tk_ops::execute(&ctx, Backend::Cpu, &upsample, &[&a], &mut on_cpu).unwrap();
    tk_ops::execute(&ctx, Backend::Gpu, &upsample, &[&a], &mut on_gpu).unwrap();
    assert_eq!(on_cpu, on_gpu);
}

#[test]
fn test_gpu_schedule_all_chains_operators() {
    init();
    let ctx = context(2, 2);
    let shape = TensorShape::new(&[6, 4]);
    let a = random_f32(shape, 5);
    let b = random_f32(shape, 6);

    let mut sum = Tensor::zeros(shape, DType::F32);
    let mut copied = Tensor::zeros(shape, DType::F32);
    {
        let add_op = Operator::Elementwise(ElementwiseParams::add());
        let add = tk_ops::configure(Backend::Gpu, &add_op, &[&a, &b], &mut sum).unwrap();
        let copy = tk_ops::configure(
            Backend::Gpu,
            &Operator::Activation(ActivationFunction::Linear { a: 1.0, b: 0.0 }),
            &[&a],
            &mut copied,
        )
        .unwrap();
        ctx.scheduler(Backend::Gpu).schedule_all(&[add.as_ref(), copy.as_ref()]);
    }
    let sum = sum.to_vec::<f32>().unwrap();
    let av = a.to_vec::<f32>().unwrap();
    let bv = b.to_vec::<f32>().unwrap();
    for i in 0..sum.len() {
        assert_eq!(sum[i], av[i] + bv[i]);
    }
    assert_eq!(copied.to_vec::<f32>().unwrap(), av);
}

#[test]
fn test_wrap_on_gpu() {
    let ctx = context(1, 1);
    let shape = TensorShape::new(&[3]);
    let a = Tensor::from_vec(shape, vec![i16::MAX, i16::MIN, 5]).unwrap();
    let b = Tensor::from_vec(shape, vec![1i16, -1, 5]).unwrap();
    let mut out = Tensor::zeros(shape, DType::S16);
    let op = Operator::Elementwise(ElementwiseParams::new(BinaryOp::Add, ConvertPolicy::Wrap));
    tk_ops::execute(&ctx, Backend::Gpu, &op, &[&a, &b], &mut out).unwrap();
    assert_eq!(out.to_vec::<i16>().unwrap(), vec![i16::MIN, i16::MAX, 10]);
}

/// Configure through the panicking constructor of the kernel for `op`.
fn configure_unchecked<'a>(
    backend: Backend,
    op: &Operator,
    inputs: &[&'a Tensor],
    output: &'a mut Tensor,
) -> Box<dyn Kernel + 'a> {
    match (backend, *op) {
        (Backend::Cpu, Operator::Elementwise(p)) => Box::new(CpuElementwiseKernel::configure(inputs, output, p)),
        (Backend::Gpu, Operator::Elementwise(p)) => Box::new(GpuElementwiseKernel::configure(inputs, output, p)),
        (Backend::Cpu, Operator::Activation(f)) => Box::new(CpuActivationKernel::configure(inputs, output, f)),
        (Backend::Gpu, Operator::Activation(f)) => Box::new(GpuActivationKernel::configure(inputs, output, f)),
        (Backend::Cpu, Operator::Upsample(p)) => Box::new(CpuUpsampleKernel::configure(inputs, output, p)),
        (Backend::Gpu, Operator::Upsample(p)) => Box::new(GpuUpsampleKernel::configure(inputs, output, p)),
    }
}

#[derive(Debug, Clone, Copy)]
enum Layout {
    Contiguous,
    /// Rows padded by `pad` elements, data starting `offset` elements in.
    Padded { pad: usize, offset: usize },
    /// Rows one element apart, so rows alias once they are wider than one.
    Overlapping,
    /// First element one byte in.
    Misaligned,
}

fn tensor_with_layout(dims: &[usize], dtype: DType, layout: Layout) -> Tensor {
    let shape = TensorShape::new(dims);
    let elem = dtype.size_in_bytes();
    let mut info = TensorInfo::new(shape, dtype);
    match layout {
        Layout::Contiguous => {}
        Layout::Padded { pad, offset } => {
            info.set_strides(&[elem, (shape.x() + pad) * elem], offset * elem).unwrap();
        }
        Layout::Overlapping => info.set_strides(&[elem, elem], 0).unwrap(),
        Layout::Misaligned => info.set_strides(&[elem], 1).unwrap(),
    }
    Tensor::new(info)
}

fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..5, 1..4)
}

fn dtype_strategy() -> impl Strategy<Value = DType> {
    prop::sample::select(DType::ALL.to_vec())
}

fn layout_strategy() -> impl Strategy<Value = Layout> {
    prop_oneof![
        4 => Just(Layout::Contiguous),
        2 => (0usize..3, 0usize..3).prop_map(|(pad, offset)| Layout::Padded { pad, offset }),
        1 => Just(Layout::Overlapping),
        1 => Just(Layout::Misaligned),
    ]
}

fn stride_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![4 => 0usize..4, 1 => Just(1usize << 63)]
}

fn operator_strategy() -> impl Strategy<Value = Operator> {
    let elementwise = (
        prop::sample::select(vec![BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul]),
        any::<bool>(),
    )
        .prop_map(|(op, wrap)| {
            let policy = if wrap { ConvertPolicy::Wrap } else { ConvertPolicy::Saturate };
            Operator::Elementwise(ElementwiseParams::new(op, policy))
        });
    let activation = prop_oneof![
        Just(ActivationFunction::Relu),
        (-1.0f32..4.0).prop_map(|upper| ActivationFunction::BoundedRelu { upper }),
        Just(ActivationFunction::Logistic),
        Just(ActivationFunction::Silu),
        Just(ActivationFunction::Linear { a: 2.0, b: -1.0 }),
    ]
    .prop_map(Operator::Activation);
    let upsample = (stride_strategy(), stride_strategy(), prop::bool::weighted(0.1)).prop_map(
        |(width, height, bilinear)| {
            let policy = if bilinear {
                InterpolationPolicy::Bilinear
            } else {
                InterpolationPolicy::NearestNeighbor
            };
            Operator::Upsample(UpsampleParams {
                stride: Size2D::new(width, height),
                policy,
            })
        },
    );
    prop_oneof![elementwise, activation, upsample]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_validate_configure_equivalence(
        op in operator_strategy(),
        a in shape_strategy(),
        b in shape_strategy(),
        out in shape_strategy(),
        matching in prop::bool::weighted(0.7),
        dtype in dtype_strategy(),
        layouts in prop::array::uniform3(layout_strategy()),
        gpu in any::<bool>(),
    ) {
        let backend = if gpu { Backend::Gpu } else { Backend::Cpu };
        // Shapes that line up for the operator, so both sides of the
        // equivalence get exercised.
        let (b, out) = match op {
            _ if !matching => (b, out),
            Operator::Elementwise(_) | Operator::Activation(_) => (a.clone(), a.clone()),
            Operator::Upsample(p) => {
                let expected = checked_output_shape(&TensorShape::new(&a), p.stride);
                (b, expected.map_or(out, |s| s.dims().to_vec()))
            }
        };

        let ta = tensor_with_layout(&a, dtype, layouts[0]);
        let tb = tensor_with_layout(&b, dtype, layouts[1]);
        let mut tout = tensor_with_layout(&out, dtype, layouts[2]);
        let inputs: Vec<&Tensor> = match op {
            Operator::Elementwise(_) => vec![&ta, &tb],
            _ => vec![&ta],
        };
        let infos: Vec<&TensorInfo> = inputs.iter().map(|t| t.info()).collect();

        let status = tk_ops::validate(&op, &infos, tout.info());
        let valid = status.is_ok();
        if let Err(e) = &status {
            prop_assert!(e.kind() != ErrorKind::ProgrammerContractViolation);
        }

        let mut scratch = tout.clone();
        let configured = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = configure_unchecked(backend, &op, &inputs, &mut scratch);
        }))
        .is_ok();
        prop_assert_eq!(valid, configured);

        let mut scratch = tout.clone();
        let dispatched = tk_ops::configure(backend, &op, &inputs, &mut scratch).map(|_| ());
        prop_assert_eq!(dispatched, status);

        if valid {
            let ctx = ComputeContext::global().unwrap();
            let kernel = configure_unchecked(backend, &op, &inputs, &mut tout);
            ctx.scheduler(backend).schedule(kernel.as_ref());
        }
    }

    #[test]
    fn test_split_is_idempotent(
        dims in prop::collection::vec(1usize..9, 1..4),
        units in 1usize..9,
        split_x in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let shape = TensorShape::new(&dims);
        let a = random_s16(shape, seed);
        let b = random_s16(shape, seed.wrapping_add(1));
        let params = ElementwiseParams::mul();

        let mut reference = Tensor::zeros(shape, DType::S16);
        {
            let mut k = CpuElementwiseKernel::configure(&[&a, &b], &mut reference, params);
            let window: Window = k.window().clone();
            k.run_exclusive(&window, &cpu_ctx());
        }

        let hints = if split_x { Hints::split_dimension(DIM_X) } else { Hints::default() };
        let ctx = context(units, units);
        for backend in [Backend::Cpu, Backend::Gpu] {
            let mut out = Tensor::zeros(shape, DType::S16);
            {
                let k = tk_ops::configure(backend, &Operator::Elementwise(params), &[&a, &b], &mut out).unwrap();
                ctx.scheduler(backend).schedule_with_hints(k.as_ref(), hints.with_max_units(units));
            }
            prop_assert_eq!(&out, &reference);
        }
    }
}
