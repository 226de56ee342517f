//! # rpool - Lifetime-Scoped Memory Pools
//!
//! This crate groups raw heap allocations under one owner so that nothing
//! is ever freed by hand. Blocks come from a pluggable backend (the C
//! allocator by default) and are all released when their owner is dropped.
//!
//! ## Overview
//!
//! ```text
//!   Pool Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                              POOL                                    │
//!   │                                                                      │
//!   │   table                                    backend                   │
//!   │   ┌─────────────┬──────┐                   ┌────────────────────┐    │
//!   │   │ 0x5591..a0  │  16  │ ───── alloc ────▶ │ allocate_zeroed(n) │    │
//!   │   │ 0x5591..c0  │  64  │ ──── realloc ───▶ │ reallocate(p, n)   │    │
//!   │   │ 0x5591..f0  │   8  │ ───── free ─────▶ │ release(p)         │    │
//!   │   └─────────────┴──────┘                   └────────────────────┘    │
//!   │   total_size = 88                                                    │
//!   │                                                                      │
//!   │   owned: [Arc<..>, Box<..>]   kept alive until the pool drops        │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Drop(pool): release(p) once for every row still in the table.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rpool
//!   ├── backend    - AllocatorBackend trait, SystemBackend, CustomBackend
//!   ├── pool       - Pool, the multi-block arena
//!   ├── address    - Address, the single-block owner
//!   ├── handle     - Handle, opaque reference to a pool block
//!   ├── config     - process-wide settings and PoolConfig
//!   └── error      - Error and Result
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rpool::{Address, Pool};
//!
//! let pool = Pool::new();
//!
//! let a = pool.alloc(4, 4).unwrap(); // 16 zeroed bytes
//! let b = pool.alloc(2, 8).unwrap(); // 16 zeroed bytes
//! assert_eq!(pool.total_size(), 32);
//!
//! pool.free(a).unwrap();
//! assert_eq!(pool.total_size(), 16);
//! assert!(pool.free(a).is_err()); // double free is reported, not fatal
//!
//! let b = pool.realloc(b, 64).unwrap(); // growth only
//! assert_eq!(pool.size_of(b), Some(64));
//!
//! let single = Address::new(10, 8).unwrap();
//! assert_eq!(single.len(), 80);
//! // `pool` releases `b` and `single` releases its block here
//! ```
//!
//! ## Custom Backends
//!
//! A C library with its own allocation routines binds them once with
//! [`CustomBackend::new`] and hands the result to any number of pools:
//!
//! ```rust,ignore
//! let backend: Arc<dyn AllocatorBackend> =
//!     Arc::new(CustomBackend::new(lib_malloc, lib_calloc, lib_realloc, lib_free));
//!
//! let pool = Pool::with_backend(backend.clone());
//! let addr = Address::with_backend(1, 256, backend)?;
//! ```
//!
//! ## Guarantees
//!
//! - **Zeroed memory**: every byte a pool or address hands out starts at zero,
//!   including the bytes added by `realloc`
//! - **Exact accounting**: `total_size` always equals the sum of tracked sizes
//! - **Safe misuse**: double frees, stale handles and shrinking reallocs
//!   return an [`Error`] and leave the table untouched
//! - **Shared use**: a `Pool` is `Send + Sync`; share it as `Arc<Pool>`
//!
//! ## Safety
//!
//! Handles and addresses expose raw pointers. Reading or writing through
//! them is `unsafe` and only valid while the block is still tracked.

mod address;
pub mod backend;
pub mod config;
mod error;
mod handle;
mod pool;

pub use address::Address;
pub use backend::{AllocatorBackend, CustomBackend, SystemBackend, default_backend};
pub use config::PoolConfig;
pub use error::{Error, Result};
pub use handle::Handle;
pub use pool::Pool;
