//! # Allocator Backends
//!
//! The four primitives every [`Pool`](crate::Pool) and
//! [`Address`](crate::Address) delegates to:
//!
//! ```text
//!   allocate(n)          >= n uninitialized bytes
//!   allocate_zeroed(n)   >= n zeroed bytes
//!   reallocate(p, n)     >= n bytes, prefix preserved
//!   release(p)           give the block back
//! ```
//!
//! [`SystemBackend`] binds them to the C allocator. [`CustomBackend`] binds
//! them to whatever routines a C library wants its memory to come from.

use std::{
  ptr::NonNull,
  sync::{Arc, OnceLock},
};

use libc::{c_void, size_t};

/// `malloc(size)`
pub type MallocFn = unsafe extern "C" fn(size_t) -> *mut c_void;
/// `calloc(count, elem_size)`
pub type CallocFn = unsafe extern "C" fn(size_t, size_t) -> *mut c_void;
/// `realloc(ptr, size)`
pub type ReallocFn = unsafe extern "C" fn(*mut c_void, size_t) -> *mut c_void;
/// `free(ptr)`
pub type FreeFn = unsafe extern "C" fn(*mut c_void);

/// Capability set of four allocation primitives.
///
/// Implementations must be stateless with respect to any particular pool so
/// one instance can be shared by many pools and addresses.
///
/// # Safety
///
/// All methods are `unsafe`: callers guarantee that pointers passed to
/// [`reallocate`](Self::reallocate) and [`release`](Self::release) came from
/// the same backend and have not been released yet.
pub trait AllocatorBackend: Send + Sync {
  /// Returns at least `size` uninitialized bytes, or `None`.
  unsafe fn allocate(
    &self,
    size: usize,
  ) -> Option<NonNull<u8>>;

  /// Returns at least `size` zeroed bytes, or `None`.
  unsafe fn allocate_zeroed(
    &self,
    size: usize,
  ) -> Option<NonNull<u8>>;

  /// Resizes `ptr` to at least `size` bytes, keeping the common prefix.
  ///
  /// Follows C `realloc`: on success `ptr` is invalidated and the returned
  /// block replaces it; on failure (`None`) `ptr` is untouched and still
  /// owned by the caller.
  unsafe fn reallocate(
    &self,
    ptr: NonNull<u8>,
    size: usize,
  ) -> Option<NonNull<u8>>;

  /// Gives `ptr` back. Called at most once per block.
  unsafe fn release(
    &self,
    ptr: NonNull<u8>,
  );
}

/// Backend bound to the process allocator (`libc` malloc family).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBackend;

impl AllocatorBackend for SystemBackend {
  unsafe fn allocate(
    &self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    NonNull::new(unsafe { libc::malloc(size) } as *mut u8)
  }

  unsafe fn allocate_zeroed(
    &self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    NonNull::new(unsafe { libc::calloc(1, size) } as *mut u8)
  }

  unsafe fn reallocate(
    &self,
    ptr: NonNull<u8>,
    size: usize,
  ) -> Option<NonNull<u8>> {
    NonNull::new(unsafe { libc::realloc(ptr.as_ptr() as *mut c_void, size) } as *mut u8)
  }

  unsafe fn release(
    &self,
    ptr: NonNull<u8>,
  ) {
    unsafe { libc::free(ptr.as_ptr() as *mut c_void) }
  }
}

/// Backend built from four caller-supplied C routines.
///
/// Immutable once constructed; copy it freely.
///
/// ```rust,ignore
/// let backend = CustomBackend::new(my_malloc, my_calloc, my_realloc, my_free);
/// let pool = Pool::with_backend(Arc::new(backend));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CustomBackend {
  malloc: MallocFn,
  calloc: CallocFn,
  realloc: ReallocFn,
  free: FreeFn,
}

impl CustomBackend {
  /// Binds the four primitives.
  ///
  /// The routines must behave like their C standard library namesakes,
  /// including `realloc` leaving the original block valid when it fails.
  pub const fn new(
    malloc: MallocFn,
    calloc: CallocFn,
    realloc: ReallocFn,
    free: FreeFn,
  ) -> Self {
    Self {
      malloc,
      calloc,
      realloc,
      free,
    }
  }
}

impl AllocatorBackend for CustomBackend {
  unsafe fn allocate(
    &self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    NonNull::new(unsafe { (self.malloc)(size) } as *mut u8)
  }

  unsafe fn allocate_zeroed(
    &self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    NonNull::new(unsafe { (self.calloc)(1, size) } as *mut u8)
  }

  unsafe fn reallocate(
    &self,
    ptr: NonNull<u8>,
    size: usize,
  ) -> Option<NonNull<u8>> {
    NonNull::new(unsafe { (self.realloc)(ptr.as_ptr() as *mut c_void, size) } as *mut u8)
  }

  unsafe fn release(
    &self,
    ptr: NonNull<u8>,
  ) {
    unsafe { (self.free)(ptr.as_ptr() as *mut c_void) }
  }
}

/// Process-wide [`SystemBackend`] shared by every pool built without one.
pub fn default_backend() -> Arc<dyn AllocatorBackend> {
  static DEFAULT: OnceLock<Arc<dyn AllocatorBackend>> = OnceLock::new();

  DEFAULT.get_or_init(|| Arc::new(SystemBackend)).clone()
}

/// Bytes actually requested from a backend for a `bytes`-sized block.
///
/// Zero-byte requests are rounded up to one so every tracked block has a
/// unique, non-null address.
pub(crate) const fn request_size(bytes: usize) -> usize {
  if bytes == 0 { 1 } else { bytes }
}

#[cfg(test)]
pub(crate) mod counting {
  use std::{
    ptr::NonNull,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
  };

  use parking_lot::Mutex;

  use super::{AllocatorBackend, SystemBackend};

  /// Wraps [`SystemBackend`] and records every call.
  #[derive(Default)]
  pub(crate) struct CountingBackend {
    pub allocs: AtomicUsize,
    pub zeroed_allocs: AtomicUsize,
    pub reallocs: AtomicUsize,
    pub releases: AtomicUsize,
    pub released: Mutex<Vec<usize>>,
    pub fail_allocs: AtomicBool,
    pub fail_reallocs: AtomicBool,
  }

  impl CountingBackend {
    pub(crate) fn releases(&self) -> usize {
      self.releases.load(Ordering::SeqCst)
    }

    pub(crate) fn zeroed_allocs(&self) -> usize {
      self.zeroed_allocs.load(Ordering::SeqCst)
    }

    pub(crate) fn reallocs(&self) -> usize {
      self.reallocs.load(Ordering::SeqCst)
    }
  }

  impl AllocatorBackend for CountingBackend {
    unsafe fn allocate(
      &self,
      size: usize,
    ) -> Option<NonNull<u8>> {
      self.allocs.fetch_add(1, Ordering::SeqCst);
      if self.fail_allocs.load(Ordering::SeqCst) {
        return None;
      }
      unsafe { SystemBackend.allocate(size) }
    }

    unsafe fn allocate_zeroed(
      &self,
      size: usize,
    ) -> Option<NonNull<u8>> {
      self.zeroed_allocs.fetch_add(1, Ordering::SeqCst);
      if self.fail_allocs.load(Ordering::SeqCst) {
        return None;
      }
      unsafe { SystemBackend.allocate_zeroed(size) }
    }

    unsafe fn reallocate(
      &self,
      ptr: NonNull<u8>,
      size: usize,
    ) -> Option<NonNull<u8>> {
      self.reallocs.fetch_add(1, Ordering::SeqCst);
      if self.fail_reallocs.load(Ordering::SeqCst) {
        return None;
      }
      unsafe { SystemBackend.reallocate(ptr, size) }
    }

    unsafe fn release(
      &self,
      ptr: NonNull<u8>,
    ) {
      self.releases.fetch_add(1, Ordering::SeqCst);
      self.released.lock().push(ptr.as_ptr() as usize);
      unsafe { SystemBackend.release(ptr) }
    }
  }
}
