//! Element access shared by the kernels.

use tk_core::contract_violation;
use tk_core::window::{Window, DIM_X};
use tk_tensor::{Coordinates, Element, Tensor, TensorInfo, TensorShape, MAX_DIMS};

/// Bytes processed per iteration along dimension 0 by the vectorised kernels.
pub const VECTOR_BYTES: usize = 16;

/// Elements per iteration for a vector of [`VECTOR_BYTES`].
pub fn vector_step(info: &TensorInfo) -> usize {
    (VECTOR_BYTES / info.element_size()).max(1)
}

/// Typed view of a bound tensor's storage.
pub(crate) fn elements<'t, T: Element>(kernel: &str, tensor: &'t Tensor) -> &'t [T] {
    match T::slice(tensor.storage()) {
        Some(data) => data,
        None => contract_violation!(
            "{} reads a {} tensor as {}",
            kernel,
            tensor.dtype(),
            T::DTYPE
        ),
    }
}

#[inline]
pub(crate) fn load<T: Element>(data: &[T], info: &TensorInfo, coords: &Coordinates) -> T {
    data[info.offset_element_in_bytes(coords) / std::mem::size_of::<T>()]
}

/// Coordinates of the element of a broadcast operand: dimensions where the
/// operand has extent 1 are pinned to 0.
#[inline]
pub(crate) fn broadcast_coords(coords: &Coordinates, shape: &TensorShape) -> Coordinates {
    let mut out = *coords;
    for dim in 0..MAX_DIMS {
        if shape.dim(dim) == 1 {
            out.set(dim, 0);
        }
    }
    out
}

/// Visit every element covered by `window`, expanding the vector step of
/// dimension 0 and clipping the last vector of each row at `width`.
pub(crate) fn for_each_element(window: &Window, width: usize, mut f: impl FnMut(&Coordinates)) {
    let step = window.x().step();
    let width = width as isize;
    window.for_each(|coords| {
        let end = (coords.x() + step).min(width);
        let mut c = *coords;
        for x in coords.x()..end {
            c.set(DIM_X, x);
            f(&c);
        }
    });
}
