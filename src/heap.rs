use std::{
  ptr::NonNull,
  sync::atomic::{AtomicBool, Ordering},
};

use log::{debug, trace, warn};

use crate::{
  align::{ALIGNMENT, checked_align},
  block::{Block, END_MARK, FOOTER_SIZE, HEADER_SIZE, MIN_FREE_BLOCK},
  dump::HeapDump,
  error::{FreeError, InitError},
  region::Region,
};

/// Bytes skipped before the first header so payloads land on 8-byte
/// boundaries.
pub const HEAD_PAD: usize = 4;

/// Set once a heap has been built in this process.
static HEAP_CLAIMED: AtomicBool = AtomicBool::new(false);

/// The process-wide best-fit heap.
///
/// Blocks form an implicit list: each header carries its block's size, so the
/// next header is always `offset + size`. All metadata access goes through
/// offsets into the owned [`Region`]; raw pointers only appear in the values
/// handed to and taken from callers.
pub struct Heap {
  region: Region,
}

impl Heap {
  /// Reserves `size` bytes (rounded up to whole pages) and lays out one free
  /// block over it. Succeeds at most once per process.
  pub fn init(size: usize) -> Result<Self, InitError> {
    if HEAP_CLAIMED.load(Ordering::Acquire) {
      warn!("heap init refused: already initialized");
      return Err(InitError::AlreadyInitialized);
    }

    if size == 0 {
      warn!("heap init refused: requested size is zero");
      return Err(InitError::NonPositiveSize);
    }

    if HEAP_CLAIMED
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      return Err(InitError::AlreadyInitialized);
    }

    match Region::reserve(size) {
      Ok(region) => Ok(Self::on_region(region)),
      Err(err) => {
        // Nothing was mapped, so a later call may try again.
        HEAP_CLAIMED.store(false, Ordering::Release);
        warn!("heap init failed: {err}");
        Err(err)
      }
    }
  }

  /// Formats a fresh region: pad, one free block, end marker.
  pub(crate) fn on_region(region: Region) -> Self {
    let mut heap = Self { region };

    let size = heap.end_offset() - HEAD_PAD;
    let first = Block::new(size, false, true);
    heap.set_header(HEAD_PAD, first);
    heap.write_footer(HEAD_PAD, first);
    heap.set_word(heap.end_offset(), END_MARK);

    debug!(
      "heap ready: {} byte region at {:#x}, first block {} bytes",
      heap.region.len(),
      heap.region.addr(),
      size
    );

    heap
  }

  /// Total bytes of the reservation, pad and end marker included.
  pub fn region_size(&self) -> usize {
    self.region.len()
  }

  /// Allocates at least `size` bytes and returns the payload address, which is
  /// always 8-byte aligned. Returns `None` for a zero size or when no free
  /// block is large enough.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    if size < 1 {
      debug!("allocate(0) refused");
      return None;
    }

    let required = size.checked_add(HEADER_SIZE).and_then(checked_align)?;

    let Some(offset) = self.best_fit(required) else {
      debug!("allocate({size}): no free block of {required} bytes");
      return None;
    };

    let candidate = self.header(offset);
    let remainder = candidate.size - required;

    if remainder >= MIN_FREE_BLOCK {
      self.set_header(
        offset,
        Block::new(required, true, candidate.prev_allocated),
      );

      let split = offset + required;
      let rest = Block::new(remainder, false, true);
      self.set_header(split, rest);
      self.write_footer(split, rest);
      self.set_prev_allocated(split + remainder, false);

      debug!(
        "allocate({size}): split block at {offset:#x} into {required} + {remainder}"
      );
    } else {
      self.set_header(
        offset,
        Block {
          allocated: true,
          ..candidate
        },
      );
      self.set_prev_allocated(offset + candidate.size, true);

      debug!(
        "allocate({size}): took whole {} byte block at {offset:#x}",
        candidate.size
      );
    }

    Some(self.region.ptr_at(offset + HEADER_SIZE))
  }

  /// Smallest free block of at least `required` bytes; the lowest address
  /// wins among equals. An exact fit ends the scan.
  fn best_fit(
    &self,
    required: usize,
  ) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;

    for block in self.blocks() {
      trace!(
        "best-fit: #{} at {:#x} size {} {}",
        block.index,
        block.offset,
        block.size,
        if block.allocated { "alloc" } else { "free" }
      );

      if block.allocated || block.size < required {
        continue;
      }

      if best.is_none_or(|(_, size)| block.size < size) {
        best = Some((block.offset, block.size));
        if block.size == required {
          break;
        }
      }
    }

    best.map(|(offset, _)| offset)
  }

  /// Releases the block whose payload starts at `ptr`. Neighbouring free
  /// blocks are left as they are until [`Heap::coalesce`] runs.
  pub fn free(
    &mut self,
    ptr: *mut u8,
  ) -> Result<(), FreeError> {
    let offset = self.validate_free(ptr).inspect_err(|err| {
      warn!("free({ptr:?}) rejected: {err}");
    })?;

    let mut block = self.header(offset);
    block.allocated = false;
    self.set_header(offset, block);
    self.write_footer(offset, block);
    self.set_prev_allocated(offset + block.size, false);

    debug!("free: released {} byte block at {offset:#x}", block.size);
    Ok(())
  }

  /// Maps a payload address to its block's header offset, or says why it
  /// cannot be freed.
  fn validate_free(
    &self,
    ptr: *mut u8,
  ) -> Result<usize, FreeError> {
    if ptr.is_null() {
      return Err(FreeError::Null);
    }

    let addr = ptr as usize;
    if addr % ALIGNMENT != 0 {
      return Err(FreeError::Misaligned { addr });
    }

    let base = self.region.addr();
    let first_payload = base + HEAD_PAD + HEADER_SIZE;
    let end = base + self.end_offset();
    if addr < first_payload || addr >= end {
      return Err(FreeError::OutOfRange { addr });
    }

    let offset = addr - base - HEADER_SIZE;
    let allocated = self
      .blocks()
      .find(|block| block.offset >= offset)
      .is_some_and(|block| block.offset == offset && block.allocated);

    if !allocated {
      return Err(FreeError::NotAllocated { addr });
    }

    Ok(offset)
  }

  /// Merges every run of adjacent free blocks into one block.
  pub fn coalesce(&mut self) {
    let end = self.end_offset();
    let mut offset = HEAD_PAD;
    let mut merged = 0;

    while offset != end {
      let mut block = self.header(offset);

      if !block.allocated {
        let mut next = offset + block.size;
        while next != end && !self.header(next).allocated {
          block.size += self.header(next).size;
          next = offset + block.size;
          merged += 1;
        }

        self.set_header(offset, block);
        self.write_footer(offset, block);
        self.set_prev_allocated(next, false);
      }

      offset += block.size;
    }

    debug!("coalesce: merged {merged} block(s)");
  }

  /// Walks the blocks in address order, end marker excluded.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      heap: self,
      offset: HEAD_PAD,
      index: 1,
    }
  }

  /// Printable block table with usage totals.
  pub fn dump(&self) -> HeapDump<'_> {
    HeapDump::new(self)
  }

  fn end_offset(&self) -> usize {
    self.region.len() - HEADER_SIZE
  }

  fn word(
    &self,
    offset: usize,
  ) -> u32 {
    let mut bytes = [0u8; HEADER_SIZE];
    bytes.copy_from_slice(&self.region.as_slice()[offset..offset + HEADER_SIZE]);
    u32::from_ne_bytes(bytes)
  }

  fn set_word(
    &mut self,
    offset: usize,
    word: u32,
  ) {
    self.region.as_mut_slice()[offset..offset + HEADER_SIZE].copy_from_slice(&word.to_ne_bytes());
  }

  fn header(
    &self,
    offset: usize,
  ) -> Block {
    Block::decode(self.word(offset))
  }

  fn set_header(
    &mut self,
    offset: usize,
    block: Block,
  ) {
    self.set_word(offset, block.encode());
  }

  fn write_footer(
    &mut self,
    offset: usize,
    block: Block,
  ) {
    self.set_word(offset + block.size - FOOTER_SIZE, block.footer());
  }

  /// Updates the cached predecessor bit of the block at `offset`. The end
  /// marker keeps its fixed word.
  fn set_prev_allocated(
    &mut self,
    offset: usize,
    prev_allocated: bool,
  ) {
    if offset == self.end_offset() {
      debug_assert!(Block::is_end_mark(self.word(offset)));
      return;
    }

    let mut block = self.header(offset);
    block.prev_allocated = prev_allocated;
    self.set_header(offset, block);
  }
}

/// One block as seen by [`Heap::blocks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  /// 1-based position in address order.
  pub index: usize,
  /// Header offset from the start of the region.
  pub offset: usize,
  /// Header address.
  pub address: usize,
  pub size: usize,
  pub allocated: bool,
  pub prev_allocated: bool,
}

impl BlockInfo {
  /// Address of the last byte of the block.
  pub fn end_address(&self) -> usize {
    self.address + self.size - 1
  }

  /// Address handed out for this block by [`Heap::allocate`].
  pub fn payload(&self) -> usize {
    self.address + HEADER_SIZE
  }
}

pub struct Blocks<'a> {
  heap: &'a Heap,
  offset: usize,
  index: usize,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<Self::Item> {
    if self.offset >= self.heap.end_offset() {
      return None;
    }

    let block = self.heap.header(self.offset);
    // Only a header smashed by a payload overrun reads as zero.
    if block.size == 0 {
      return None;
    }

    let info = BlockInfo {
      index: self.index,
      offset: self.offset,
      address: self.heap.region.addr() + self.offset,
      size: block.size,
      allocated: block.allocated,
      prev_allocated: block.prev_allocated,
    };

    self.offset += block.size;
    self.index += 1;
    Some(info)
  }
}
