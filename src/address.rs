use std::{fmt, ptr::NonNull, sync::Arc};

use tracing::{trace, warn};

use crate::{
  backend::{AllocatorBackend, default_backend, request_size},
  config::PoolConfig,
  error::{Error, Result, byte_count},
};

/// Owner of exactly one zeroed heap block.
///
/// The block is allocated on construction and released when the `Address`
/// is dropped. A construction that fails leaves nothing to release.
///
/// ```rust
/// use rpool::Address;
///
/// let addr = Address::new(10, 8).unwrap();
/// let values = addr.cast::<u64>();
///
/// unsafe { values.add(9).write(7) };
/// assert_eq!(addr.len(), 80);
/// ```
pub struct Address {
  ptr: NonNull<u8>,
  len: usize,
  backend: Arc<dyn AllocatorBackend>,
}

// SAFETY: `Address` owns its block outright, like a `Box<[u8]>`, and the
// backend is `Send + Sync`.
unsafe impl Send for Address {}
unsafe impl Sync for Address {}

impl Address {
  /// Allocates `count * elem_size` zeroed bytes on the default backend.
  pub fn new(
    count: usize,
    elem_size: usize,
  ) -> Result<Self> {
    Self::with_backend(count, elem_size, default_backend())
  }

  /// Allocates `count * elem_size` zeroed bytes through `backend`, using
  /// the process-wide settings.
  pub fn with_backend(
    count: usize,
    elem_size: usize,
    backend: Arc<dyn AllocatorBackend>,
  ) -> Result<Self> {
    Self::with_backend_and_config(count, elem_size, backend, PoolConfig::default())
  }

  /// Allocates `count * elem_size` zeroed bytes through `backend` with
  /// explicit settings.
  pub fn with_backend_and_config(
    count: usize,
    elem_size: usize,
    backend: Arc<dyn AllocatorBackend>,
    config: PoolConfig,
  ) -> Result<Self> {
    let len = byte_count(count, elem_size)?;

    if len == 0 && config.warn_zero_alloc {
      warn!(count, elem_size, "zero-byte allocation requested for address");
    }

    let ptr = unsafe { backend.allocate_zeroed(request_size(len)) }
      .ok_or(Error::OutOfMemory { bytes: len })?;
    trace!(addr = ptr.as_ptr() as usize, bytes = len, "address alloc");

    Ok(Self { ptr, len, backend })
  }

  /// Raw pointer to the first byte of the block.
  #[inline]
  pub const fn as_ptr(&self) -> *mut u8 {
    self.ptr.as_ptr()
  }

  /// Raw pointer to the block, cast to `T`.
  #[inline]
  pub const fn cast<T>(&self) -> *mut T {
    self.ptr.as_ptr().cast()
  }

  /// Integer identity of the block.
  #[inline]
  pub fn addr(&self) -> usize {
    self.ptr.as_ptr() as usize
  }

  /// Size of the block in bytes.
  #[inline]
  pub const fn len(&self) -> usize {
    self.len
  }

  /// Returns `true` for a zero-byte block.
  #[inline]
  pub const fn is_empty(&self) -> bool {
    self.len == 0
  }
}

impl fmt::Debug for Address {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Address")
      .field("addr", &format_args!("{:#x}", self.addr()))
      .field("len", &self.len)
      .finish()
  }
}

impl Drop for Address {
  fn drop(&mut self) {
    trace!(addr = self.addr(), bytes = self.len, "address release");
    unsafe { self.backend.release(self.ptr) };
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::Ordering;

  use super::*;
  use crate::{backend::counting::CountingBackend, config::capture::capture_logs};

  #[test]
  fn test_address_lifecycle() {
    let backend = Arc::new(CountingBackend::default());

    let addr = Address::with_backend(10, 8, backend.clone()).unwrap();
    let ptr = addr.addr();

    assert!(!addr.as_ptr().is_null());
    assert_eq!(addr.len(), 80);
    unsafe {
      let data = std::slice::from_raw_parts(addr.as_ptr(), 80);
      assert!(data.iter().all(|b| *b == 0));
    }
    assert_eq!(backend.zeroed_allocs(), 1);

    drop(addr);

    assert_eq!(backend.releases(), 1);
    assert_eq!(*backend.released.lock(), vec![ptr]);
  }

  #[test]
  fn test_address_out_of_memory() {
    let backend = Arc::new(CountingBackend::default());
    backend.fail_allocs.store(true, Ordering::SeqCst);

    let result = Address::with_backend(4, 4, backend.clone());

    assert_eq!(result.err(), Some(Error::OutOfMemory { bytes: 16 }));
    assert_eq!(backend.releases(), 0);
  }

  #[test]
  fn test_address_overflow() {
    assert!(matches!(
      Address::new(usize::MAX, usize::MAX),
      Err(Error::SizeOverflow { .. })
    ));
  }

  #[test]
  fn test_zero_length_address() {
    let addr = Address::new(0, 16).unwrap();

    assert!(addr.is_empty());
    assert!(!addr.as_ptr().is_null());
  }

  #[test]
  fn test_typed_access() {
    let addr = Address::new(4, std::mem::size_of::<u32>()).unwrap();
    let values = addr.cast::<u32>();

    unsafe {
      for i in 0..4 {
        values.add(i).write(i as u32 * 10);
      }
      assert_eq!(values.add(3).read(), 30);
    }
  }

  #[test]
  fn test_zero_byte_advisory_follows_config() {
    let quiet = capture_logs(|| {
      let config = PoolConfig::default().warn_zero_alloc(false);
      Address::with_backend_and_config(0, 8, default_backend(), config).unwrap();
    });
    assert_eq!(quiet.count("zero-byte"), 0);

    let loud = capture_logs(|| {
      let config = PoolConfig::default().warn_zero_alloc(true);
      Address::with_backend_and_config(0, 8, default_backend(), config).unwrap();
      Address::with_backend_and_config(2, 8, default_backend(), config).unwrap();
    });
    assert_eq!(loud.count("zero-byte allocation requested for address"), 1);
  }
}
