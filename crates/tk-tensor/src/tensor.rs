use crate::dtype::{DType, Element};
use crate::error::{Result, TensorError};
use crate::info::TensorInfo;
use crate::shape::{Coordinates, TensorShape, MAX_DIMS};
use crate::storage::CpuStorage;

/// A tensor backed by CPU storage.
///
/// The descriptor decides how logical coordinates map onto bytes of the
/// storage, so a tensor may be padded or otherwise non-contiguous. Creating
/// a tensor locks its descriptor's layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    storage: CpuStorage,
    info: TensorInfo,
}

impl Tensor {
    /// Allocate zero-filled storage for the given descriptor.
    pub fn new(mut info: TensorInfo) -> Self {
        let elem = info.element_size();
        let n = info.total_size().div_ceil(elem);
        info.set_resizable(false);
        Tensor {
            storage: CpuStorage::zeros(info.dtype(), n),
            info,
        }
    }

    /// Create a zero-filled contiguous tensor.
    pub fn zeros(shape: TensorShape, dtype: DType) -> Self {
        Tensor::new(TensorInfo::new(shape, dtype))
    }

    /// Create a contiguous tensor of `T::DTYPE` from logical elements in
    /// order (dimension 0 fastest).
    pub fn from_vec<T: Element>(shape: TensorShape, data: Vec<T>) -> Result<Self> {
        Tensor::from_vec_with_info(TensorInfo::new(shape, T::DTYPE), data)
    }

    /// Create a tensor for an arbitrary descriptor from logical elements in
    /// order. The elements are scattered according to the descriptor's
    /// strides.
    pub fn from_vec_with_info<T: Element>(info: TensorInfo, data: Vec<T>) -> Result<Self> {
        if !T::accepts(info.dtype()) {
            return Err(TensorError::DTypeMismatch {
                expected: info.dtype().to_string(),
                got: T::DTYPE.to_string(),
            });
        }
        if data.len() != info.num_elements() {
            return Err(TensorError::ShapeMismatch {
                expected: info.shape().dims().to_vec(),
                got: vec![data.len()],
            });
        }
        info.check_strides()?;

        if info.is_contiguous() {
            let mut info = info;
            info.set_resizable(false);
            return Ok(Tensor {
                storage: T::into_storage(data),
                info,
            });
        }

        let mut tensor = Tensor::new(info);
        let shape = *tensor.shape();
        for (i, value) in data.into_iter().enumerate() {
            tensor.set(&linear_to_coordinates(&shape, i), value)?;
        }
        Ok(tensor)
    }

    pub fn info(&self) -> &TensorInfo {
        &self.info
    }

    pub fn shape(&self) -> &TensorShape {
        self.info.shape()
    }

    pub fn dtype(&self) -> DType {
        self.info.dtype()
    }

    /// Returns the underlying storage reference.
    pub fn storage(&self) -> &CpuStorage {
        &self.storage
    }

    /// Split borrow of the descriptor and the storage, used to bind the
    /// tensor as a kernel output.
    pub fn parts_mut(&mut self) -> (&TensorInfo, &mut CpuStorage) {
        (&self.info, &mut self.storage)
    }

    /// Typed view of the storage.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        T::slice(&self.storage).ok_or_else(|| self.dtype_mismatch::<T>())
    }

    /// Read the element at a byte offset into the storage.
    pub fn read<T: Element>(&self, byte_offset: usize) -> Result<T> {
        let data = self.as_slice::<T>()?;
        let size = std::mem::size_of::<T>();
        if byte_offset % size != 0 {
            return Err(TensorError::Other(format!(
                "misaligned element offset {} for {}",
                byte_offset,
                T::DTYPE
            )));
        }
        data.get(byte_offset / size).copied().ok_or_else(|| {
            TensorError::Other(format!(
                "byte offset {} past the end of {} bytes of storage",
                byte_offset,
                self.storage.len_in_bytes()
            ))
        })
    }

    /// Element at `coords`.
    pub fn get<T: Element>(&self, coords: &Coordinates) -> Result<T> {
        self.check_coords(coords)?;
        let data = self.as_slice::<T>()?;
        let offset = self.info.offset_element_in_bytes(coords);
        Ok(data[offset / std::mem::size_of::<T>()])
    }

    /// Overwrite the element at `coords`.
    pub fn set<T: Element>(&mut self, coords: &Coordinates, value: T) -> Result<()> {
        self.check_coords(coords)?;
        let offset = self.info.offset_element_in_bytes(coords);
        match T::slice_mut(&mut self.storage) {
            Some(data) => {
                data[offset / std::mem::size_of::<T>()] = value;
                Ok(())
            }
            None => Err(self.dtype_mismatch::<T>()),
        }
    }

    /// Logical elements in order (dimension 0 fastest), skipping padding.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let shape = self.shape();
        (0..shape.total_size())
            .map(|i| self.get(&linear_to_coordinates(shape, i)))
            .collect()
    }

    fn check_coords(&self, coords: &Coordinates) -> Result<()> {
        if self.shape().contains(coords) {
            Ok(())
        } else {
            Err(TensorError::OutOfBounds {
                coords: coords.as_slice().to_vec(),
                shape: self.shape().dims().to_vec(),
            })
        }
    }

    fn dtype_mismatch<T: Element>(&self) -> TensorError {
        TensorError::DTypeMismatch {
            expected: self.dtype().to_string(),
            got: T::DTYPE.to_string(),
        }
    }
}

fn linear_to_coordinates(shape: &TensorShape, mut index: usize) -> Coordinates {
    let mut coords = Coordinates::default();
    for dim in 0..MAX_DIMS {
        let extent = shape.dim(dim);
        coords.set(dim, (index % extent) as isize);
        index /= extent;
    }
    coords
}
