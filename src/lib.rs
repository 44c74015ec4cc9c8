//! # bfalloc - A Best-Fit Heap Over One Fixed Region
//!
//! This crate provides a single-threaded **best-fit allocator** that carves
//! `malloc`/`free`-style blocks out of one page-rounded region mapped from the
//! OS with `mmap(2)` exactly once per process.
//!
//! ## Overview
//!
//! The heap is an implicit list of blocks. Every block starts with a 4-byte
//! header holding its size, so walking the heap is just adding sizes:
//!
//! ```text
//!   Heap Region (one mmap, page-rounded):
//!
//!   ┌─────┬──────────────┬──────────┬────────────────────────────────┬─────┐
//!   │ pad │   Block 1    │ Block 2  │            Block 3             │ END │
//!   │ 4 B │  allocated   │   free   │           allocated            │ 4 B │
//!   └─────┴──────────────┴──────────┴────────────────────────────────┴─────┘
//!         ▲              ▲          ▲                                ▲
//!         │              │          │                                │
//!       offset 4    4 + size1   + size2                       end marker
//!                                                           (word == 0b01)
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   bfalloc
//!   ├── align      - Double-word alignment macros (align!, align_to!)
//!   ├── block      - Header/footer word codec
//!   ├── region     - One-shot page-rounded mmap reservation
//!   ├── heap       - Heap: allocate, free, coalesce, block walk
//!   ├── dump       - Printable block listing
//!   └── error      - InitError, FreeError
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bfalloc::Heap;
//!
//! let mut heap = Heap::init(4096).expect("heap");
//!
//! let ptr = heap.allocate(100).expect("room for 100 bytes");
//! unsafe { ptr.as_ptr().write_bytes(0xAB, 100) };
//!
//! heap.free(ptr.as_ptr()).expect("allocated by this heap");
//! heap.coalesce();
//!
//! print!("{}", heap.dump());
//! ```
//!
//! ## How It Works
//!
//! Each block carries its metadata inline:
//!
//! ```text
//!   Allocated block:                  Free block:
//!   ┌────────┬────────────────────┐   ┌────────┬─────────────┬────────┐
//!   │ header │      payload       │   │ header │   unused    │ footer │
//!   │ size|pa│ (8-byte aligned)   │   │ size|p0│             │  size  │
//!   └────────┴────────────────────┘   └────────┴─────────────┴────────┘
//!            ▲
//!            └── Pointer returned to user
//! ```
//!
//! Bit 0 of a header says whether the block is allocated, bit 1 whether the
//! block before it is. Sizes are multiples of 8 and include the header.
//!
//! - **allocate** scans every block and picks the smallest free one that
//!   fits, stopping early on an exact fit. If what is left over can stand as
//!   a free block (16 bytes or more) the block is split.
//! - **free** flips the allocated bit and tells the next block. It never
//!   merges.
//! - **coalesce** sweeps the heap once and merges every run of adjacent free
//!   blocks.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: `Heap` is neither `Send` nor `Sync`
//! - **One heap per process**: a second [`Heap::init`] fails
//! - **Fixed size**: the region never grows
//! - **8-byte alignment**: no larger alignments
//! - **Unix-only**: Requires `libc` and `mmap`
//!
//! ## Logging
//!
//! Operations report through the [`log`] facade; install any logger (for
//! example `env_logger` with `RUST_LOG=bfalloc=debug`) to see them.

pub mod align;
mod block;
mod dump;
mod error;
mod heap;
mod region;

pub use block::{FOOTER_SIZE, HEADER_SIZE, MIN_FREE_BLOCK};
pub use dump::HeapDump;
pub use error::{FreeError, InitError};
pub use heap::{BlockInfo, Blocks, HEAD_PAD, Heap};
pub use region::page_size;
