use std::{any::Any, collections::HashMap, fmt, ptr::NonNull, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{
  backend::{AllocatorBackend, default_backend, request_size},
  config::PoolConfig,
  error::{Error, Result, byte_count},
  handle::Handle,
};

/// One tracked block.
struct Record {
  ptr: NonNull<u8>,
  seq: u64,
  size: usize,
}

// SAFETY: the record only carries the address so the pool can release it;
// the block itself is never accessed through the table.
unsafe impl Send for Record {}

/// Everything the pool mutates, behind a single lock.
#[derive(Default)]
struct Table {
  records: HashMap<usize, Record>,
  total_size: usize,
  owned: Vec<Box<dyn Any + Send + Sync>>,
  next_seq: u64,
}

impl Table {
  fn insert(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  ) -> Handle {
    self.next_seq += 1;
    let seq = self.next_seq;

    self.records.insert(ptr.as_ptr() as usize, Record { ptr, seq, size });
    self.total_size += size;

    Handle::new(ptr, seq)
  }

  fn lookup(
    &self,
    handle: Handle,
  ) -> Result<&Record> {
    self
      .records
      .get(&handle.addr())
      .filter(|record| record.seq == handle.seq())
      .ok_or(Error::NotFound {
        addr: handle.addr(),
      })
  }

  fn remove(
    &mut self,
    handle: Handle,
  ) -> Result<Record> {
    self.lookup(handle)?;

    let record = self
      .records
      .remove(&handle.addr())
      .ok_or(Error::NotFound {
        addr: handle.addr(),
      })?;
    self.total_size -= record.size;

    Ok(record)
  }
}

/// Arena that ties any number of zeroed heap blocks to one lifetime.
///
/// Blocks are requested with [`alloc`](Self::alloc), optionally grown with
/// [`realloc`](Self::realloc) or given back early with [`free`](Self::free).
/// Whatever is still tracked when the pool is dropped is released through
/// the backend, exactly once per block.
///
/// ```text
///   Pool
///   ├── backend        shared, immutable
///   └── Mutex<Table>
///       ├── records    addr -> (seq, size)
///       ├── total_size sum of record sizes
///       └── owned      objects kept alive until drop
/// ```
///
/// # Thread Safety
///
/// `Pool` is `Send + Sync`. Every operation takes `&self` and runs its
/// bookkeeping under one table lock, so a pool can be shared as
/// `Arc<Pool>`. Teardown happens when the last owner drops it.
///
/// # Example
///
/// ```rust
/// use rpool::Pool;
///
/// let pool = Pool::new();
/// let block = pool.alloc(4, 8).unwrap();
///
/// unsafe { block.cast::<u64>().write(42) };
/// assert_eq!(pool.total_size(), 32);
/// // block is released when `pool` goes out of scope
/// ```
pub struct Pool {
  table: Mutex<Table>,
  backend: Arc<dyn AllocatorBackend>,
  config: PoolConfig,
}

impl Pool {
  /// Creates a pool on the default backend with the process-wide settings.
  pub fn new() -> Self {
    Self::with_backend_and_config(default_backend(), PoolConfig::default())
  }

  /// Creates a pool that allocates through `backend`.
  pub fn with_backend(backend: Arc<dyn AllocatorBackend>) -> Self {
    Self::with_backend_and_config(backend, PoolConfig::default())
  }

  /// Creates a pool on the default backend with explicit settings.
  pub fn with_config(config: PoolConfig) -> Self {
    Self::with_backend_and_config(default_backend(), config)
  }

  /// Creates a pool on `backend` with explicit settings.
  pub fn with_backend_and_config(
    backend: Arc<dyn AllocatorBackend>,
    config: PoolConfig,
  ) -> Self {
    Self {
      table: Mutex::new(Table::default()),
      backend,
      config,
    }
  }

  /// Allocates `count * elem_size` zeroed bytes and tracks them.
  ///
  /// A zero-byte request still yields a unique block; it is recorded with
  /// size zero and, if enabled, logged as a warning.
  pub fn alloc(
    &self,
    count: usize,
    elem_size: usize,
  ) -> Result<Handle> {
    let bytes = byte_count(count, elem_size)?;

    if bytes == 0 && self.config.warn_zero_alloc {
      warn!(count, elem_size, "zero-byte allocation requested from pool");
    }

    let ptr = unsafe { self.backend.allocate_zeroed(request_size(bytes)) }
      .ok_or(Error::OutOfMemory { bytes })?;

    let handle = self.table.lock().insert(ptr, bytes);
    trace!(addr = handle.addr(), bytes, "pool alloc");

    Ok(handle)
  }

  /// Grows a tracked block to `new_size` bytes.
  ///
  /// The old contents are kept and the added bytes are zeroed. `handle` is
  /// consumed on success; use the returned one from then on. On any error
  /// the original block stays tracked and unchanged.
  pub fn realloc(
    &self,
    handle: Handle,
    new_size: usize,
  ) -> Result<Handle> {
    let mut table = self.table.lock();

    let old_size = table.lookup(handle)?.size;
    if new_size == 0 || new_size <= old_size {
      return Err(Error::InvalidArgument { old_size, new_size });
    }

    // The lock stays held across the backend call: a concurrent free of the
    // old handle must not release the block while it is being moved.
    let ptr = unsafe { self.backend.reallocate(handle.non_null(), new_size) }
      .ok_or(Error::OutOfMemory { bytes: new_size })?;

    unsafe { ptr.as_ptr().add(old_size).write_bytes(0, new_size - old_size) };

    table.remove(handle)?;
    let grown = table.insert(ptr, new_size);
    drop(table);

    trace!(
      from = handle.addr(),
      to = grown.addr(),
      old_size,
      new_size,
      "pool realloc"
    );

    Ok(grown)
  }

  /// Stops tracking `handle` and releases its block.
  ///
  /// Freeing a handle twice, or one this pool never issued, fails with
  /// [`Error::NotFound`] and touches nothing.
  pub fn free(
    &self,
    handle: Handle,
  ) -> Result<()> {
    let record = self.table.lock().remove(handle)?;

    unsafe { self.backend.release(record.ptr) };
    trace!(addr = handle.addr(), bytes = record.size, "pool free");

    Ok(())
  }

  /// Keeps `object` alive until the pool is dropped.
  pub fn own_ref<T>(
    &self,
    object: T,
  ) where
    T: Any + Send + Sync,
  {
    self.table.lock().owned.push(Box::new(object));
  }

  /// Sum of the sizes of all tracked blocks.
  pub fn total_size(&self) -> usize {
    self.table.lock().total_size
  }

  /// Number of tracked blocks.
  pub fn len(&self) -> usize {
    self.table.lock().records.len()
  }

  /// Returns `true` if no block is tracked.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns `true` if `handle` is live in this pool.
  pub fn contains(
    &self,
    handle: Handle,
  ) -> bool {
    self.table.lock().lookup(handle).is_ok()
  }

  /// Recorded size of `handle`, if it is tracked.
  pub fn size_of(
    &self,
    handle: Handle,
  ) -> Option<usize> {
    self.table.lock().lookup(handle).ok().map(|record| record.size)
  }

  /// Snapshot of every tracked handle, in no particular order.
  pub fn handles(&self) -> Vec<Handle> {
    self
      .table
      .lock()
      .records
      .values()
      .map(|record| Handle::new(record.ptr, record.seq))
      .collect()
  }

  /// Number of objects kept alive through [`own_ref`](Self::own_ref).
  pub fn owned_len(&self) -> usize {
    self.table.lock().owned.len()
  }

  /// Settings fixed when the pool was built.
  pub fn config(&self) -> PoolConfig {
    self.config
  }
}

impl Default for Pool {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Pool {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let table = self.table.lock();

    f.debug_struct("Pool")
      .field("blocks", &table.records.len())
      .field("total_size", &table.total_size)
      .field("owned", &table.owned.len())
      .field("config", &self.config)
      .finish()
  }
}

impl Drop for Pool {
  fn drop(&mut self) {
    // No other owner can exist here, so the lock is bypassed.
    let table = self.table.get_mut();
    let released = table.records.len();
    let bytes = table.total_size;

    for (_, record) in table.records.drain() {
      unsafe { self.backend.release(record.ptr) };
    }
    table.total_size = 0;
    table.owned.clear();

    if released > 0 {
      debug!(released, bytes, "pool torn down");
    }
  }
}
