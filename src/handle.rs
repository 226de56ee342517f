use std::{fmt, ptr::NonNull};

/// Opaque reference to one block issued by a [`Pool`](crate::Pool).
///
/// A handle pairs the block's address with the sequence number the pool
/// assigned when it recorded the block. Backends may hand the same address
/// out again after a free; the sequence number is what tells the new block
/// apart from a stale handle to the old one.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
  ptr: NonNull<u8>,
  seq: u64,
}

// SAFETY: a handle is a token. Reading or writing through it already needs
// `unsafe`, and the pool's table is what decides whether it is still live.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Handle {
  pub(crate) const fn new(
    ptr: NonNull<u8>,
    seq: u64,
  ) -> Self {
    Self { ptr, seq }
  }

  pub(crate) const fn seq(&self) -> u64 {
    self.seq
  }

  pub(crate) const fn non_null(&self) -> NonNull<u8> {
    self.ptr
  }

  /// Raw pointer to the first byte of the block.
  #[inline]
  pub const fn as_ptr(&self) -> *mut u8 {
    self.ptr.as_ptr()
  }

  /// Raw pointer to the block, cast to `T`.
  ///
  /// The pool's backend returns memory aligned for any fundamental type,
  /// so the cast is aligned for ordinary scalar and `repr(C)` types.
  #[inline]
  pub const fn cast<T>(&self) -> *mut T {
    self.ptr.as_ptr().cast()
  }

  /// Integer identity of the block, for logging and comparison.
  #[inline]
  pub fn addr(&self) -> usize {
    self.ptr.as_ptr() as usize
  }
}

impl fmt::Debug for Handle {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Handle")
      .field("addr", &format_args!("{:#x}", self.addr()))
      .field("seq", &self.seq)
      .finish()
  }
}
