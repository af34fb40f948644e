use std::marker::PhantomData;
use std::ptr::NonNull;

use tk_tensor::{Element, Tensor, TensorInfo};

/// Exclusive binding of a kernel's output tensor.
///
/// Created from `&'a mut Tensor`, so the kernel holding it can never outlive
/// the tensor and nothing else can touch the tensor while it is bound. Writes
/// go through raw byte offsets so that the scheduler can hand disjoint
/// sub-windows of one kernel to several threads at once; keeping those
/// writes disjoint is the obligation of [`Kernel`](crate::kernel::Kernel)
/// implementors.
#[derive(Debug)]
pub struct OutputBinding<'a> {
    info: TensorInfo,
    ptr: NonNull<u8>,
    len: usize,
    _marker: PhantomData<&'a mut [u8]>,
}

// SAFETY: the binding is an exclusive borrow of the tensor storage, like
// `&mut [u8]`. Shared use across threads only reaches the storage through
// the unsafe `write*` methods whose callers guarantee disjoint offsets.
unsafe impl Send for OutputBinding<'_> {}
unsafe impl Sync for OutputBinding<'_> {}

impl<'a> OutputBinding<'a> {
    pub fn new(tensor: &'a mut Tensor) -> Self {
        let (info, storage) = tensor.parts_mut();
        let info = info.clone();
        let len = storage.len_in_bytes();
        debug_assert!(
            storage.backs(info.dtype()),
            "storage does not back a {} tensor",
            info.dtype()
        );
        debug_assert!(
            len >= info.total_size(),
            "storage of {} bytes cannot hold a {} descriptor of {} bytes",
            len,
            info,
            info.total_size()
        );
        let ptr = NonNull::new(storage.as_mut_ptr()).unwrap_or(NonNull::dangling());
        OutputBinding {
            info,
            ptr,
            len,
            _marker: PhantomData,
        }
    }

    pub fn info(&self) -> &TensorInfo {
        &self.info
    }

    /// Write one element at a byte offset.
    ///
    /// # Safety
    /// `T` must be the storage type of the bound tensor, `offset` must be an
    /// element-aligned offset inside the storage, and no other thread may
    /// access the same element concurrently.
    pub unsafe fn write<T: Element>(&self, offset: usize, value: T) {
        debug_assert!(offset + std::mem::size_of::<T>() <= self.len);
        debug_assert_eq!(offset % std::mem::size_of::<T>(), 0);
        self.ptr.as_ptr().add(offset).cast::<T>().write(value);
    }

    /// Copy raw bytes to a byte offset.
    ///
    /// # Safety
    /// `offset + bytes.len()` must lie inside the storage, `bytes` must be a
    /// valid encoding of whole elements, and no other thread may access the
    /// same bytes concurrently.
    pub unsafe fn write_bytes(&self, offset: usize, bytes: &[u8]) {
        debug_assert!(offset + bytes.len() <= self.len);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.as_ptr().add(offset), bytes.len());
    }
}
