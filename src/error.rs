use thiserror::Error;

/// Result type for pool and address operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by [`Pool`](crate::Pool) and [`Address`](crate::Address).
///
/// Every variant leaves the bookkeeping table consistent: a failed call has
/// no effect on what the pool tracks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
  /// The backend could not provide the requested block.
  #[error("out of memory: backend could not provide {bytes} bytes")]
  OutOfMemory {
    /// Number of bytes requested from the backend.
    bytes: usize,
  },

  /// The handle is not tracked by this pool (double free, stale or foreign handle).
  #[error("handle {addr:#x} is not tracked by this pool")]
  NotFound {
    /// Address carried by the rejected handle.
    addr: usize,
  },

  /// `realloc` must strictly grow the block.
  #[error("invalid realloc: new size {new_size} must be non-zero and larger than {old_size}")]
  InvalidArgument {
    /// Size currently recorded for the block.
    old_size: usize,
    /// Size that was requested.
    new_size: usize,
  },

  /// `count * elem_size` does not fit in `usize`.
  #[error("allocation size overflow: {count} * {elem_size}")]
  SizeOverflow {
    /// Number of elements requested.
    count: usize,
    /// Size of one element.
    elem_size: usize,
  },
}

/// Computes `count * elem_size`, rejecting overflow before any backend call.
pub(crate) fn byte_count(
  count: usize,
  elem_size: usize,
) -> Result<usize> {
  count
    .checked_mul(elem_size)
    .ok_or(Error::SizeOverflow { count, elem_size })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_byte_count() {
    assert_eq!(byte_count(4, 4), Ok(16));
    assert_eq!(byte_count(0, 8), Ok(0));
    assert_eq!(
      byte_count(usize::MAX, 2),
      Err(Error::SizeOverflow {
        count: usize::MAX,
        elem_size: 2
      })
    );
  }

  #[test]
  fn test_display() {
    let err = Error::InvalidArgument {
      old_size: 16,
      new_size: 8,
    };
    assert_eq!(
      err.to_string(),
      "invalid realloc: new size 8 must be non-zero and larger than 16"
    );
    assert_eq!(
      Error::NotFound { addr: 0x10 }.to_string(),
      "handle 0x10 is not tracked by this pool"
    );
  }
}
