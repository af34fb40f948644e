use std::fmt;

use half::f16;

use crate::storage::CpuStorage;

/// Closed set of element types a tensor descriptor may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 8-bit integer.
    S8,
    /// Asymmetric 8-bit quantized (u8 storage with scale and zero-point offset).
    QAsymm8,
    /// Symmetric 8-bit quantized (i8 storage with scale, offset is always 0).
    QSymm8,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 16-bit integer.
    S16,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 32-bit integer.
    S32,
    /// 16-bit floating point (IEEE 754 half-precision, via the `half` crate).
    F16,
    /// 32-bit floating point.
    F32,
}

impl DType {
    /// Every element type, in declaration order.
    pub const ALL: [DType; 10] = [
        DType::U8,
        DType::S8,
        DType::QAsymm8,
        DType::QSymm8,
        DType::U16,
        DType::S16,
        DType::U32,
        DType::S32,
        DType::F16,
        DType::F32,
    ];

    /// Returns the size in bytes of a single element.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::U8 | DType::S8 | DType::QAsymm8 | DType::QSymm8 => 1,
            DType::U16 | DType::S16 | DType::F16 => 2,
            DType::U32 | DType::S32 | DType::F32 => 4,
        }
    }

    /// Returns true if this dtype carries quantization parameters.
    pub fn is_quantized(&self) -> bool {
        matches!(self, DType::QAsymm8 | DType::QSymm8)
    }

    /// Returns true for floating point dtypes.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F16 | DType::F32)
    }

    /// Returns true for dtypes that can represent negative values.
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            DType::S8 | DType::QSymm8 | DType::S16 | DType::S32 | DType::F16 | DType::F32
        )
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::U8 => "u8",
            DType::S8 => "s8",
            DType::QAsymm8 => "qasymm8",
            DType::QSymm8 => "qsymm8",
            DType::U16 => "u16",
            DType::S16 => "s16",
            DType::U32 => "u32",
            DType::S32 => "s32",
            DType::F16 => "f16",
            DType::F32 => "f32",
        };
        f.write_str(name)
    }
}

/// A Rust scalar type that can back tensor storage.
///
/// Kernels are written generically over `Element` and monomorphized per
/// dtype. Conversions go through `f64` for floating point math and through
/// `i64` for integer math so that wrap/saturate policies can be applied once
/// at the end.
pub trait Element: Copy + Send + Sync + fmt::Debug + PartialEq + 'static {
    /// The canonical dtype for this scalar type.
    const DTYPE: DType;

    /// Returns true if storage of this type can back a tensor of `dtype`.
    fn accepts(dtype: DType) -> bool {
        dtype == Self::DTYPE
    }

    fn to_f64(self) -> f64;

    fn to_i64(self) -> i64;

    /// Converts from `f64`, rounding to nearest and saturating for integers.
    fn from_f64(v: f64) -> Self;

    /// Converts from `i64`, discarding high bits for integers.
    fn wrap_from_i64(v: i64) -> Self;

    /// Converts from `i64`, clamping to the representable range for integers.
    fn saturate_from_i64(v: i64) -> Self;

    fn into_storage(data: Vec<Self>) -> CpuStorage;

    fn slice(storage: &CpuStorage) -> Option<&[Self]>;

    fn slice_mut(storage: &mut CpuStorage) -> Option<&mut [Self]>;
}

macro_rules! impl_int_element {
    ($t:ty, $dtype:expr, $variant:ident $(, $alias:expr)?) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;

            fn accepts(dtype: DType) -> bool {
                dtype == Self::DTYPE $(|| dtype == $alias)?
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn to_i64(self) -> i64 {
                self as i64
            }

            fn from_f64(v: f64) -> Self {
                // Float-to-int `as` casts saturate and map NaN to 0.
                v.round() as $t
            }

            fn wrap_from_i64(v: i64) -> Self {
                v as $t
            }

            fn saturate_from_i64(v: i64) -> Self {
                v.clamp(<$t>::MIN as i64, <$t>::MAX as i64) as $t
            }

            fn into_storage(data: Vec<Self>) -> CpuStorage {
                CpuStorage::$variant(data)
            }

            fn slice(storage: &CpuStorage) -> Option<&[Self]> {
                match storage {
                    CpuStorage::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            fn slice_mut(storage: &mut CpuStorage) -> Option<&mut [Self]> {
                match storage {
                    CpuStorage::$variant(v) => Some(v.as_mut_slice()),
                    _ => None,
                }
            }
        }
    };
}

impl_int_element!(u8, DType::U8, U8, DType::QAsymm8);
impl_int_element!(i8, DType::S8, I8, DType::QSymm8);
impl_int_element!(u16, DType::U16, U16);
impl_int_element!(i16, DType::S16, I16);
impl_int_element!(u32, DType::U32, U32);
impl_int_element!(i32, DType::S32, I32);

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn to_i64(self) -> i64 {
        self as i64
    }

    fn from_f64(v: f64) -> Self {
        v as f32
    }

    fn wrap_from_i64(v: i64) -> Self {
        v as f32
    }

    fn saturate_from_i64(v: i64) -> Self {
        v as f32
    }

    fn into_storage(data: Vec<Self>) -> CpuStorage {
        CpuStorage::F32(data)
    }

    fn slice(storage: &CpuStorage) -> Option<&[Self]> {
        match storage {
            CpuStorage::F32(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn slice_mut(storage: &mut CpuStorage) -> Option<&mut [Self]> {
        match storage {
            CpuStorage::F32(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }
}

impl Element for f16 {
    const DTYPE: DType = DType::F16;

    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }

    fn to_i64(self) -> i64 {
        f16::to_f64(self) as i64
    }

    fn from_f64(v: f64) -> Self {
        f16::from_f64(v)
    }

    fn wrap_from_i64(v: i64) -> Self {
        f16::from_f64(v as f64)
    }

    fn saturate_from_i64(v: i64) -> Self {
        f16::from_f64(v as f64)
    }

    fn into_storage(data: Vec<Self>) -> CpuStorage {
        CpuStorage::F16(data)
    }

    fn slice(storage: &CpuStorage) -> Option<&[Self]> {
        match storage {
            CpuStorage::F16(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn slice_mut(storage: &mut CpuStorage) -> Option<&mut [Self]> {
        match storage {
            CpuStorage::F16(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }
}
