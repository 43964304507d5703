//! Utilities for raw pointer and slice handling.
//!
//! Capture deals in memory the application and the driver own: client arrays
//! passed to GL entry points, and pointers returned by `glMapBuffer`. This
//! module keeps the unsafe parts of that in one place.

use std::alloc::{self, Layout};
use std::os::raw::{c_char, c_void};
use std::ptr;

/// A marker trait for types that can be serialized by simply writing out their bytes.
pub unsafe trait Simple: Copy { }

/// Given a reference, return a byte slice of the value's representation.
pub fn as_bytes<T: Simple>(r: &T) -> &[u8] {
    slice_as_bytes(std::slice::from_ref(r))
}

/// Given a slice, return a byte slice of its contents.
pub fn slice_as_bytes<T: Simple>(r: &[T]) -> &[u8] {
    // Safe because `T::Simple`.
    unsafe { std::slice::from_raw_parts(r.as_ptr() as *const u8, std::mem::size_of_val(r)) }
}

/// Reinterpret `bytes` as a sequence of `T` values in host byte order. A
/// partial element at the end is dropped.
pub fn from_bytes<T: Simple>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(std::mem::size_of::<T>())
        // Safe because `T: Simple`, and the chunk is exactly one `T` long.
        .map(|chunk| unsafe { ptr::read_unaligned(chunk.as_ptr() as *const T) })
        .collect()
}

macro_rules! implement_simple {
    ( $( $type:ty ),* ) => {
        $(
            unsafe impl Simple for $type { }
        )*
    }
}

implement_simple!(u8, u16, u32, u64, usize,
                  i8, i16, i32, i64, isize,
                  f32, f64);

/// A pointer to application memory passed to a GL entry point, whose length
/// we don't know until the pointer-length resolver has looked at the call.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClientPtr(*const c_void);

impl ClientPtr {
    /// Wrap a pointer the application passed to GL.
    ///
    /// Safety: `ptr` must either be null, be an offset into a bound buffer
    /// object, or point to at least as many readable bytes as the
    /// pointer-length resolver computes for the call that carries it, for as
    /// long as the `ClientPtr` exists.
    pub unsafe fn new_unchecked(ptr: *const c_void) -> ClientPtr {
        ClientPtr(ptr)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// The pointer's value, for when it is really an offset into a buffer object.
    pub fn addr(&self) -> usize {
        self.0 as usize
    }

    /// The length of the NUL-terminated string this points to, not counting
    /// the terminator.
    pub fn c_str_len(&self) -> usize {
        if self.0.is_null() {
            return 0;
        }
        // Safe because of the contract on `new_unchecked`: for a string
        // argument, the resolver's length is the string's.
        unsafe { std::ffi::CStr::from_ptr(self.0 as *const c_char).to_bytes().len() }
    }

    /// Copy `len` bytes out of the application's memory.
    pub fn copy(&self, len: usize) -> Vec<u8> {
        if self.0.is_null() || len == 0 {
            return Vec::new();
        }
        // Safe because of the contract on `new_unchecked`.
        unsafe { std::slice::from_raw_parts(self.0 as *const u8, len).to_vec() }
    }
}

/// Memory returned by the driver from `glMapBuffer` or `glMapBufferRange`.
#[derive(Debug, PartialEq)]
pub struct DriverMapping {
    ptr: *mut u8,
    len: usize,
}

impl DriverMapping {
    /// Safety: `ptr` must point to `len` bytes the driver has mapped for
    /// reading and writing, and stay valid until the buffer is unmapped.
    pub unsafe fn new_unchecked(ptr: *mut c_void, len: usize) -> DriverMapping {
        DriverMapping { ptr: ptr as *mut u8, len }
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr as *mut c_void
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // Safe because of the contract on `new_unchecked`.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Copy `src` into the mapping at `offset`, clipping to the mapped length.
    pub fn write_at(&mut self, offset: usize, src: &[u8]) {
        if offset >= self.len {
            return;
        }
        let count = src.len().min(self.len - offset);
        // Safe because of the contract on `new_unchecked`, and the clipping above.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), self.ptr.add(offset), count);
        }
    }
}

/// A heap block with a caller-chosen alignment.
///
/// The application writes through a mapped buffer's shadow as though it were
/// the driver's memory, so the shadow has to honor `GL_MIN_MAP_BUFFER_ALIGNMENT`.
pub struct AlignedBuf {
    ptr: ptr::NonNull<u8>,
    layout: Layout,
    len: usize,
}

impl AlignedBuf {
    /// Allocate a block holding a copy of `contents`, aligned to `align`.
    ///
    /// `align` is rounded up to a power of two. Return `None` if the
    /// allocation fails.
    pub fn from_slice(contents: &[u8], align: usize) -> Option<AlignedBuf> {
        let align = align.max(1).next_power_of_two();
        // Zero-size allocations aren't allowed, so always ask for at least one byte.
        let layout = Layout::from_size_align(contents.len().max(1), align).ok()?;
        // Safe because `layout` has a nonzero size.
        let ptr = ptr::NonNull::new(unsafe { alloc::alloc(layout) })?;
        unsafe {
            ptr::copy_nonoverlapping(contents.as_ptr(), ptr.as_ptr(), contents.len());
        }
        Some(AlignedBuf { ptr, layout, len: contents.len() })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn align(&self) -> usize {
        self.layout.align()
    }

    /// The pointer handed to the application.
    pub fn as_mut_ptr(&mut self) -> *mut c_void {
        self.ptr.as_ptr() as *mut c_void
    }

    pub fn as_slice(&self) -> &[u8] {
        // Safe: we own `len` initialized bytes. The application may have
        // scribbled on them, but any bit pattern is a valid `u8`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        // Safe because `ptr` came from `alloc` with this same layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl std::fmt::Debug for AlignedBuf {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "AlignedBuf({} bytes, align {})", self.len(), self.align())
    }
}

#[test]
fn test_aligned_buf() {
    let contents: Vec<u8> = (0..100).collect();
    for &align in &[1, 4, 16, 64, 48] {
        let mut buf = AlignedBuf::from_slice(&contents, align).unwrap();
        assert_eq!(buf.as_mut_ptr() as usize % buf.align(), 0);
        assert!(buf.align() >= align);
        assert_eq!(buf.as_slice(), &contents[..]);
    }

    let empty = AlignedBuf::from_slice(&[], 16).unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.as_slice(), &[] as &[u8]);
}

#[test]
fn test_driver_mapping_write_clips() {
    let mut memory = vec![0_u8; 8];
    let mut mapping = unsafe {
        DriverMapping::new_unchecked(memory.as_mut_ptr() as *mut c_void, memory.len())
    };
    mapping.write_at(6, &[1, 2, 3, 4]);
    mapping.write_at(9, &[5]);
    assert_eq!(mapping.as_slice(), &[0, 0, 0, 0, 0, 0, 1, 2]);
}

#[test]
fn test_client_ptr() {
    let name = b"position\0";
    let ptr = unsafe { ClientPtr::new_unchecked(name.as_ptr() as *const c_void) };
    assert_eq!(ptr.c_str_len(), 8);
    assert_eq!(ptr.copy(3), b"pos".to_vec());

    let null = unsafe { ClientPtr::new_unchecked(ptr::null()) };
    assert!(null.is_null());
    assert_eq!(null.c_str_len(), 0);
    assert!(null.copy(16).is_empty());

    let floats: Vec<f32> = from_bytes(slice_as_bytes(&[1.0_f32, -2.5]));
    assert_eq!(floats, vec![1.0, -2.5]);
    assert_eq!(from_bytes::<u32>(&[1, 0, 0]), Vec::<u32>::new());
}
