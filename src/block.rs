use std::mem;

/// Width of a block header word.
pub const HEADER_SIZE: usize = mem::size_of::<u32>();

/// Width of the size-only footer trailing every free block.
pub const FOOTER_SIZE: usize = mem::size_of::<u32>();

/// Smallest block that can still be a valid free block: header, footer and
/// one double word of payload.
pub const MIN_FREE_BLOCK: usize = HEADER_SIZE + FOOTER_SIZE + 8;

/// Raw word of the end marker: allocated, size zero.
pub const END_MARK: u32 = ALLOCATED_BIT;

const ALLOCATED_BIT: u32 = 0b01;
const PREV_ALLOCATED_BIT: u32 = 0b10;
const STATUS_MASK: u32 = ALLOCATED_BIT | PREV_ALLOCATED_BIT;

/// Decoded header word.
///
/// ```text
///   31                                   2   1   0
///   ┌────────────────────────────────────┬───┬───┐
///   │ size (multiple of 8)               │ p │ a │
///   └────────────────────────────────────┴───┴───┘
///                                          │   └── this block allocated
///                                          └────── previous block allocated
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
  pub size: usize,
  pub allocated: bool,
  pub prev_allocated: bool,
}

impl Block {
  pub fn new(
    size: usize,
    allocated: bool,
    prev_allocated: bool,
  ) -> Self {
    Self {
      size,
      allocated,
      prev_allocated,
    }
  }

  pub fn decode(word: u32) -> Self {
    Self {
      size: (word & !STATUS_MASK) as usize,
      allocated: word & ALLOCATED_BIT != 0,
      prev_allocated: word & PREV_ALLOCATED_BIT != 0,
    }
  }

  /// Packs the block into a header word. The size must already be a
  /// multiple of 8 that fits the word; the heap never builds anything else.
  pub fn encode(&self) -> u32 {
    debug_assert_eq!(self.size % 8, 0, "unaligned block size {}", self.size);
    debug_assert!(self.size <= u32::MAX as usize);

    let mut word = self.size as u32;
    if self.allocated {
      word |= ALLOCATED_BIT;
    }
    if self.prev_allocated {
      word |= PREV_ALLOCATED_BIT;
    }
    word
  }

  pub fn is_end_mark(word: u32) -> bool {
    word == END_MARK
  }

  /// Footer word for a free block of this size.
  pub fn footer(&self) -> u32 {
    self.size as u32
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decode_status_bits() {
    let block = Block::decode(4088 | 0b10);
    assert_eq!(block, Block::new(4088, false, true));

    let block = Block::decode(104 | 0b01);
    assert_eq!(block, Block::new(104, true, false));

    let block = Block::decode(16 | 0b11);
    assert_eq!(block, Block::new(16, true, true));
  }

  #[test]
  fn test_encode_matches_decode() {
    for word in [0b10, 24 | 0b01, 4088 | 0b10, 3984 | 0b11] {
      assert_eq!(Block::decode(word).encode(), word);
    }
  }

  #[test]
  fn test_end_mark() {
    assert!(Block::is_end_mark(END_MARK));
    assert_eq!(Block::decode(END_MARK), Block::new(0, true, false));
    // A real allocated block always has a non-zero size.
    assert!(!Block::is_end_mark(Block::new(8, true, false).encode()));
    assert!(!Block::is_end_mark(Block::new(0, true, true).encode()));
  }

  #[test]
  fn test_footer_has_no_status() {
    let block = Block::new(40, false, true);
    assert_eq!(block.footer(), 40);
  }

  #[test]
  fn test_min_free_block() {
    assert_eq!(HEADER_SIZE, 4);
    assert_eq!(MIN_FREE_BLOCK, 16);
  }
}
