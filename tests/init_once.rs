//! The heap guard is process-wide, so everything touching `Heap::init` lives
//! in this one test binary and runs as a single test.

use bfalloc::{Heap, InitError};
use test_log::test;

#[test]
fn test_init_once_per_process() {
  // Rejected sizes do not use up the one initialization.
  assert!(matches!(Heap::init(0), Err(InitError::NonPositiveSize)));
  assert!(matches!(
    Heap::init(usize::MAX),
    Err(InitError::RegionTooLarge { .. })
  ));

  let mut heap = Heap::init(4096).unwrap();
  assert_eq!(heap.region_size() % bfalloc::page_size().unwrap(), 0);

  let blocks: Vec<_> = heap.blocks().collect();
  assert_eq!(blocks.len(), 1);
  assert!(!blocks[0].allocated);
  assert!(blocks[0].prev_allocated);
  assert_eq!(blocks[0].size, heap.region_size() - 8);

  let ptr = heap.allocate(100).unwrap();
  assert_eq!(ptr.as_ptr() as usize % 8, 0);

  assert!(matches!(
    Heap::init(4096),
    Err(InitError::AlreadyInitialized)
  ));
  assert!(matches!(Heap::init(0), Err(InitError::AlreadyInitialized)));

  heap.free(ptr.as_ptr()).unwrap();
  heap.coalesce();
  drop(heap);

  assert!(matches!(
    Heap::init(4096),
    Err(InitError::AlreadyInitialized)
  ));
}
