use half::f16;

use crate::dtype::DType;

/// CPU-side tensor storage, one variant per backing scalar type.
///
/// Quantized dtypes share the variant of their storage integer type
/// (QAsymm8 lives in `U8`, QSymm8 in `I8`).
#[derive(Debug, Clone, PartialEq)]
pub enum CpuStorage {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    F16(Vec<f16>),
    F32(Vec<f32>),
}

macro_rules! dispatch {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            CpuStorage::U8($v) => $body,
            CpuStorage::I8($v) => $body,
            CpuStorage::U16($v) => $body,
            CpuStorage::I16($v) => $body,
            CpuStorage::U32($v) => $body,
            CpuStorage::I32($v) => $body,
            CpuStorage::F16($v) => $body,
            CpuStorage::F32($v) => $body,
        }
    };
}

impl CpuStorage {
    /// Create zero-filled storage holding `n` elements of `dtype`.
    pub fn zeros(dtype: DType, n: usize) -> Self {
        match dtype {
            DType::U8 | DType::QAsymm8 => CpuStorage::U8(vec![0; n]),
            DType::S8 | DType::QSymm8 => CpuStorage::I8(vec![0; n]),
            DType::U16 => CpuStorage::U16(vec![0; n]),
            DType::S16 => CpuStorage::I16(vec![0; n]),
            DType::U32 => CpuStorage::U32(vec![0; n]),
            DType::S32 => CpuStorage::I32(vec![0; n]),
            DType::F16 => CpuStorage::F16(vec![f16::ZERO; n]),
            DType::F32 => CpuStorage::F32(vec![0.0; n]),
        }
    }

    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of one stored element in bytes.
    pub fn element_size(&self) -> usize {
        match self {
            CpuStorage::U8(_) | CpuStorage::I8(_) => 1,
            CpuStorage::U16(_) | CpuStorage::I16(_) | CpuStorage::F16(_) => 2,
            CpuStorage::U32(_) | CpuStorage::I32(_) | CpuStorage::F32(_) => 4,
        }
    }

    /// Size of the storage in bytes.
    pub fn len_in_bytes(&self) -> usize {
        self.len() * self.element_size()
    }

    /// Returns true if this storage can back a tensor of `dtype`.
    pub fn backs(&self, dtype: DType) -> bool {
        matches!(
            (self, dtype),
            (CpuStorage::U8(_), DType::U8 | DType::QAsymm8)
                | (CpuStorage::I8(_), DType::S8 | DType::QSymm8)
                | (CpuStorage::U16(_), DType::U16)
                | (CpuStorage::I16(_), DType::S16)
                | (CpuStorage::U32(_), DType::U32)
                | (CpuStorage::I32(_), DType::S32)
                | (CpuStorage::F16(_), DType::F16)
                | (CpuStorage::F32(_), DType::F32)
        )
    }

    /// Raw bytes of the storage.
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.len_in_bytes();
        // SAFETY: every variant is a Vec of plain integers or floats with no
        // padding or invalid bit patterns, so viewing its initialized
        // elements as bytes is valid for the lifetime of `&self`.
        dispatch!(self, v => unsafe {
            std::slice::from_raw_parts(v.as_ptr() as *const u8, len)
        })
    }

    /// Pointer to the first byte, for bindings that write through raw
    /// offsets. The pointer is aligned for the stored element type.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        dispatch!(self, v => v.as_mut_ptr() as *mut u8)
    }
}
