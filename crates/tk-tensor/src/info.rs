use std::fmt;

use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::{Coordinates, TensorShape, MAX_DIMS};

/// Per-tensor quantization parameters.
///
/// `real = scale * (quantized - offset)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizationInfo {
    pub scale: f32,
    pub offset: i32,
}

impl QuantizationInfo {
    pub fn new(scale: f32, offset: i32) -> Self {
        QuantizationInfo { scale, offset }
    }

    /// Dequantize a stored value.
    pub fn dequantize(&self, value: i32) -> f32 {
        self.scale * (value - self.offset) as f32
    }

    /// Quantize a real value to an asymmetric u8, rounding to nearest and
    /// saturating.
    pub fn quantize_u8(&self, value: f32) -> u8 {
        let q = (value / self.scale).round() as i64 + self.offset as i64;
        q.clamp(0, 255) as u8
    }
}

impl Default for QuantizationInfo {
    fn default() -> Self {
        QuantizationInfo {
            scale: 1.0,
            offset: 0,
        }
    }
}

/// Describes a tensor's geometry: shape, element type, byte strides, offset
/// of the first element and quantization parameters.
///
/// Strides default to the contiguous layout. A descriptor starts out
/// resizable; while it is, strides may be overridden to describe padded
/// layouts. Allocating storage for it locks the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorInfo {
    shape: TensorShape,
    dtype: DType,
    strides: [usize; MAX_DIMS],
    offset_first_element: usize,
    quantization: QuantizationInfo,
    is_resizable: bool,
}

impl TensorInfo {
    /// Create a contiguous descriptor.
    pub fn new(shape: TensorShape, dtype: DType) -> Self {
        TensorInfo {
            shape,
            dtype,
            strides: Self::contiguous_strides(&shape, dtype),
            offset_first_element: 0,
            quantization: QuantizationInfo::default(),
            is_resizable: true,
        }
    }

    /// Create a contiguous quantized descriptor.
    pub fn new_quantized(shape: TensorShape, dtype: DType, quantization: QuantizationInfo) -> Self {
        TensorInfo::new(shape, dtype).with_quantization(quantization)
    }

    pub fn with_quantization(mut self, quantization: QuantizationInfo) -> Self {
        self.quantization = quantization;
        self
    }

    fn contiguous_strides(shape: &TensorShape, dtype: DType) -> [usize; MAX_DIMS] {
        let mut strides = [0usize; MAX_DIMS];
        let mut acc = dtype.size_in_bytes();
        for (i, stride) in strides.iter_mut().enumerate() {
            *stride = acc;
            acc *= shape.dim(i).max(1);
        }
        strides
    }

    /// Override the byte strides and first-element offset for a padded layout.
    ///
    /// Strides beyond `strides.len()` keep stacking contiguously on top of
    /// the last given one. Only the descriptor's own bookkeeping is checked
    /// here; whether the layout is consistent is decided by
    /// [`TensorInfo::check_strides`].
    pub fn set_strides(&mut self, strides: &[usize], offset_first_element: usize) -> Result<()> {
        if !self.is_resizable {
            return Err(TensorError::NotResizable);
        }
        if strides.is_empty() || strides.len() > MAX_DIMS {
            return Err(TensorError::Other(format!(
                "expected between 1 and {} strides, got {}",
                MAX_DIMS,
                strides.len()
            )));
        }
        self.strides[..strides.len()].copy_from_slice(strides);
        for i in strides.len()..MAX_DIMS {
            self.strides[i] = self.strides[i - 1] * self.shape.dim(i - 1).max(1);
        }
        self.offset_first_element = offset_first_element;
        Ok(())
    }

    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn element_size(&self) -> usize {
        self.dtype.size_in_bytes()
    }

    /// Byte strides, innermost first, for the significant dimensions.
    pub fn strides_in_bytes(&self) -> &[usize] {
        &self.strides[..self.shape.num_dimensions()]
    }

    pub fn stride(&self, dim: usize) -> usize {
        self.strides[dim]
    }

    pub fn offset_first_element_in_bytes(&self) -> usize {
        self.offset_first_element
    }

    pub fn quantization(&self) -> QuantizationInfo {
        self.quantization
    }

    pub fn is_resizable(&self) -> bool {
        self.is_resizable
    }

    pub fn set_resizable(&mut self, resizable: bool) {
        self.is_resizable = resizable;
    }

    /// Number of logical elements.
    pub fn num_elements(&self) -> usize {
        self.shape.total_size()
    }

    /// Bytes of storage needed to hold every addressable element.
    pub fn total_size(&self) -> usize {
        if self.shape.is_empty() {
            return 0;
        }
        let last: usize = (0..MAX_DIMS)
            .map(|i| (self.shape.dim(i) - 1) * self.strides[i])
            .sum();
        self.offset_first_element + last + self.element_size()
    }

    /// Byte offset of the element at `coords`.
    ///
    /// # Panics
    /// Panics in debug builds if the coordinates fall outside the shape.
    pub fn offset_element_in_bytes(&self, coords: &Coordinates) -> usize {
        debug_assert!(
            self.shape.contains(coords),
            "coordinates {:?} out of bounds for shape {}",
            coords.as_slice(),
            self.shape
        );
        (0..MAX_DIMS).fold(self.offset_first_element, |acc, i| {
            acc + coords[i] as usize * self.strides[i]
        })
    }

    /// Returns true if the strides describe the densely packed layout.
    pub fn is_contiguous(&self) -> bool {
        self.offset_first_element == 0
            && self.strides == Self::contiguous_strides(&self.shape, self.dtype)
    }

    /// Check that the byte strides are consistent with the shape and element
    /// size: every stride is a multiple of the element size, the innermost
    /// stride holds at least one element, and each outer stride spans the
    /// full extent of the dimension below it so that no two elements alias.
    pub fn check_strides(&self) -> Result<()> {
        let elem = self.element_size();
        if self.offset_first_element % elem != 0 {
            return Err(TensorError::InvalidStride {
                dim: 0,
                stride: self.offset_first_element,
                reason: format!("first element offset is not a multiple of {} bytes", elem),
            });
        }
        for dim in 0..self.shape.num_dimensions() {
            let stride = self.strides[dim];
            if stride == 0 || stride % elem != 0 {
                return Err(TensorError::InvalidStride {
                    dim,
                    stride,
                    reason: format!("must be a non-zero multiple of {} bytes", elem),
                });
            }
            let min = if dim == 0 {
                elem
            } else {
                self.strides[dim - 1] * self.shape.dim(dim - 1)
            };
            if stride < min {
                return Err(TensorError::InvalidStride {
                    dim,
                    stride,
                    reason: format!("elements overlap, need at least {} bytes", min),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for TensorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.dtype, self.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_contiguous_layout() {
        let info = TensorInfo::new(TensorShape::new(&[4, 3, 2]), DType::F32);
        assert_eq!(info.strides_in_bytes(), &[4, 16, 48]);
        assert_eq!(info.total_size(), 96);
        assert_eq!(info.num_elements(), 24);
        assert!(info.is_contiguous());
        assert!(info.check_strides().is_ok());
    }

    #[test]
    fn test_offset_element() {
        let info = TensorInfo::new(TensorShape::new(&[4, 3]), DType::S16);
        let off = info.offset_element_in_bytes(&Coordinates::new(&[1, 2]));
        assert_eq!(off, 2 + 2 * 8);
    }

    #[test]
    fn test_padded_layout() {
        let mut info = TensorInfo::new(TensorShape::new(&[3, 2]), DType::F32);
        info.set_strides(&[4, 32], 8).unwrap();
        assert!(info.check_strides().is_ok());
        assert!(!info.is_contiguous());
        assert_eq!(info.offset_element_in_bytes(&Coordinates::new(&[2, 1])), 8 + 8 + 32);
        assert_eq!(info.total_size(), 8 + 8 + 32 + 4);
    }

    #[test]
    fn test_invalid_strides() {
        let mut info = TensorInfo::new(TensorShape::new(&[4, 2]), DType::F32);
        info.set_strides(&[4, 8], 0).unwrap();
        assert!(matches!(
            info.check_strides(),
            Err(TensorError::InvalidStride { dim: 1, .. })
        ));

        let mut info = TensorInfo::new(TensorShape::new(&[4, 2]), DType::F32);
        info.set_strides(&[6, 24], 0).unwrap();
        assert!(matches!(
            info.check_strides(),
            Err(TensorError::InvalidStride { dim: 0, .. })
        ));
    }

    #[test]
    fn test_locked_layout() {
        let mut info = TensorInfo::new(TensorShape::new(&[4]), DType::U8);
        info.set_resizable(false);
        assert_eq!(info.set_strides(&[2], 0), Err(TensorError::NotResizable));
    }

    #[test]
    fn test_quantization_roundtrip_value() {
        let q = QuantizationInfo::new(0.5, 10);
        assert_relative_eq!(q.dequantize(14), 2.0);
        assert_eq!(q.quantize_u8(2.0), 14);
        assert_eq!(q.quantize_u8(1000.0), 255);
        assert_eq!(q.quantize_u8(-1000.0), 0);
    }
}
