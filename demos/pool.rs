use std::sync::Arc;

use rpool::{Address, CustomBackend, Pool, PoolConfig, config};
use tracing_subscriber::EnvFilter;

/// Prints the pool's bookkeeping after a step.
fn print_pool(
  label: &str,
  pool: &Pool,
) {
  println!(
    "[{}] blocks = {}, total_size = {} bytes",
    label,
    pool.len(),
    pool.total_size(),
  );
}

fn main() {
  // RUST_LOG=rpool=trace shows every alloc/realloc/free.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  config::init_from_env();

  let pool = Pool::with_config(PoolConfig::default().warn_zero_alloc(true));

  // --------------------------------------------------------------------
  // 1) Allocate a [u32; 4]. Pool memory always starts zeroed.
  // --------------------------------------------------------------------
  let first = pool.alloc(4, 4).expect("alloc [u32; 4]");
  unsafe { first.cast::<u32>().write(0xDEADBEEF) };
  println!("\n[1] Allocated {:?}", first);
  print_pool("1", &pool);

  // --------------------------------------------------------------------
  // 2) Allocate a [u64; 2] and fill it.
  // --------------------------------------------------------------------
  let second = pool.alloc(2, 8).expect("alloc [u64; 2]");
  unsafe {
    second.cast::<u64>().write(0x1122334455667788);
    second.cast::<u64>().add(1).write(0x99AABBCCDDEEFF00);
  }
  println!("\n[2] Allocated {:?}", second);
  print_pool("2", &pool);

  // --------------------------------------------------------------------
  // 3) Grow the second block. The prefix survives, the tail is zero.
  // --------------------------------------------------------------------
  let second = pool.realloc(second, 64).expect("grow to 64 bytes");
  let (head, tail) = unsafe { (second.cast::<u64>().read(), second.cast::<u64>().add(7).read()) };
  println!("\n[3] Grew to {:?}: head = 0x{:X}, tail = {}", second, head, tail);
  print_pool("3", &pool);

  // --------------------------------------------------------------------
  // 4) Shrinking is rejected and the block stays as it was.
  // --------------------------------------------------------------------
  match pool.realloc(second, 8) {
    Ok(_) => println!("\n[4] Unexpected shrink"),
    Err(err) => println!("\n[4] Shrink rejected: {}", err),
  }

  // --------------------------------------------------------------------
  // 5) Free the first block, then try again.
  // --------------------------------------------------------------------
  pool.free(first).expect("first free");
  println!("\n[5] Freed {:?}", first);
  if let Err(err) = pool.free(first) {
    println!("[5] Second free reported: {}", err);
  }
  print_pool("5", &pool);

  // --------------------------------------------------------------------
  // 6) A zero-byte request is allowed but logged.
  // --------------------------------------------------------------------
  let empty = pool.alloc(0, 16).expect("zero-byte alloc");
  println!("\n[6] Zero-byte block {:?}, size = {:?}", empty, pool.size_of(empty));

  // --------------------------------------------------------------------
  // 7) Keep an outside object alive for as long as the pool.
  // --------------------------------------------------------------------
  let label = Arc::new(String::from("owned by the pool"));
  pool.own_ref(Arc::clone(&label));
  println!("\n[7] '{}' strong count = {}", label, Arc::strong_count(&label));

  // --------------------------------------------------------------------
  // 8) A second pool on a custom backend, plus a single Address.
  // --------------------------------------------------------------------
  let backend = Arc::new(CustomBackend::new(libc::malloc, libc::calloc, libc::realloc, libc::free));
  let custom = Pool::with_backend(backend.clone());
  custom.alloc(128, 1).expect("alloc on custom backend");
  print_pool("8 custom", &custom);

  let addr = Address::with_backend(10, 8, backend).expect("address");
  println!("[8] {:?} at {:#x}", addr, addr.addr());

  // --------------------------------------------------------------------
  // 9) End of demo. Dropping the pools releases every tracked block.
  // --------------------------------------------------------------------
  drop(custom);
  drop(pool);
  println!("\n[9] Pools dropped, '{}' strong count = {}", label, Arc::strong_count(&label));
}
