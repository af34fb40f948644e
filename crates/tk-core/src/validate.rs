//! Pure descriptor checks shared by every operator's `validate`.

use tk_tensor::{DType, TensorInfo, TensorShape};

use crate::ensure_status;
use crate::status::{Status, StatusError};

/// Returns true if `a` and `b` can be broadcast against each other:
/// comparing from the innermost dimension, extents are equal or one is 1.
pub fn broadcast_compatible(a: &TensorShape, b: &TensorShape) -> bool {
    TensorShape::broadcast_shape(a, b).is_ok()
}

/// Shape obtained by broadcasting all `inputs` together.
pub fn broadcast_shape(inputs: &[&TensorInfo]) -> Result<TensorShape, StatusError> {
    let (first, rest) = match inputs.split_first() {
        Some(split) => split,
        None => {
            return Err(StatusError::new(
                crate::status::ErrorKind::UnsupportedParameterCombination,
                "at least one input is required",
            ))
        }
    };
    rest.iter().try_fold(*first.shape(), |acc, info| {
        TensorShape::broadcast_shape(&acc, info.shape()).map_err(StatusError::from)
    })
}

/// Generic consistency check of an elementwise-style computation: every
/// descriptor has consistent strides, all element types match the output's,
/// and broadcasting the inputs together yields exactly the output shape.
pub fn validate_shapes(inputs: &[&TensorInfo], output: &TensorInfo) -> Status {
    for info in inputs.iter().copied().chain(std::iter::once(output)) {
        check_strides(info)?;
    }
    for input in inputs {
        check_same_data_type(input, output)?;
    }
    let shape = broadcast_shape(inputs)?;
    ensure_status!(
        shape == *output.shape(),
        ShapeMismatch,
        "inputs broadcast to {} but the output is {}",
        shape,
        output.shape()
    );
    Ok(())
}

pub fn check_strides(info: &TensorInfo) -> Status {
    info.check_strides().map_err(StatusError::from)
}

pub fn check_not_empty(info: &TensorInfo) -> Status {
    ensure_status!(!info.shape().is_empty(), ShapeMismatch, "tensor shape is empty");
    Ok(())
}

pub fn check_data_type(info: &TensorInfo, supported: &[DType]) -> Status {
    ensure_status!(
        supported.contains(&info.dtype()),
        UnsupportedDataType,
        "{} is not one of {:?}",
        info.dtype(),
        supported
    );
    Ok(())
}

pub fn check_same_data_type(a: &TensorInfo, b: &TensorInfo) -> Status {
    ensure_status!(
        a.dtype() == b.dtype(),
        UnsupportedDataType,
        "mismatching data types {} and {}",
        a.dtype(),
        b.dtype()
    );
    Ok(())
}

pub fn check_same_shape(a: &TensorInfo, b: &TensorInfo) -> Status {
    ensure_status!(
        a.shape() == b.shape(),
        ShapeMismatch,
        "mismatching shapes {} and {}",
        a.shape(),
        b.shape()
    );
    Ok(())
}

pub fn check_same_quantization(a: &TensorInfo, b: &TensorInfo) -> Status {
    ensure_status!(
        !a.dtype().is_quantized() || a.quantization() == b.quantization(),
        UnsupportedParameterCombination,
        "mismatching quantization {:?} and {:?}",
        a.quantization(),
        b.quantization()
    );
    Ok(())
}
