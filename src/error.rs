use std::io;

use thiserror::Error;

/// Failures of [`Heap::init`](crate::Heap::init). All are terminal for the
/// call; no heap exists afterwards.
#[derive(Debug, Error)]
pub enum InitError {
  #[error("heap already initialized in this process")]
  AlreadyInitialized,

  #[error("requested region size must be positive")]
  NonPositiveSize,

  #[error("region of {size} bytes does not fit a block header")]
  RegionTooLarge { size: usize },

  #[error("cannot reserve {size} bytes from the OS")]
  Reserve {
    size: usize,
    #[source]
    source: io::Error,
  },
}

/// Rejected [`Heap::free`](crate::Heap::free) calls. The heap is left
/// untouched whenever one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FreeError {
  #[error("cannot free a null pointer")]
  Null,

  #[error("address {addr:#x} is not 8-byte aligned")]
  Misaligned { addr: usize },

  #[error("address {addr:#x} is outside the heap")]
  OutOfRange { addr: usize },

  #[error("address {addr:#x} is not an allocated block")]
  NotAllocated { addr: usize },
}
