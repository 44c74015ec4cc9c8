use std::fmt;

use crate::heap::Heap;

const RULE: &str =
  "---------------------------------------------------------------------------------";
const BANNER: &str =
  "*********************************************************************************";

/// Block listing of a [`Heap`], produced by [`Heap::dump`].
///
/// ```text
///   No.   Status  Prev    t_Begin         t_End           t_Size
///   1     alloc   alloc   0x7f3a2c000004  0x7f3a2c00006b   104
///   2     FREE    alloc   0x7f3a2c00006c  0x7f3a2c000ffb  3984
/// ```
pub struct HeapDump<'a> {
  heap: &'a Heap,
}

impl<'a> HeapDump<'a> {
  pub(crate) fn new(heap: &'a Heap) -> Self {
    Self { heap }
  }

  /// Bytes held by allocated blocks, headers included.
  pub fn used(&self) -> usize {
    self
      .heap
      .blocks()
      .filter(|block| block.allocated)
      .map(|block| block.size)
      .sum()
  }

  /// Bytes held by free blocks.
  pub fn free(&self) -> usize {
    self
      .heap
      .blocks()
      .filter(|block| !block.allocated)
      .map(|block| block.size)
      .sum()
  }
}

fn status(allocated: bool) -> &'static str {
  if allocated { "alloc" } else { "FREE " }
}

impl fmt::Display for HeapDump<'_> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(
      f,
      "*********************************** HEAP: Block List ****************************"
    )?;
    writeln!(f, "No.\tStatus\tPrev\tt_Begin\t\tt_End\t\tt_Size")?;
    writeln!(f, "{RULE}")?;

    let mut used = 0;
    let mut free = 0;

    for block in self.heap.blocks() {
      if block.allocated {
        used += block.size;
      } else {
        free += block.size;
      }

      writeln!(
        f,
        "{}\t{}\t{}\t{:#010x}\t{:#010x}\t{:4}",
        block.index,
        status(block.allocated),
        status(block.prev_allocated),
        block.address,
        block.end_address(),
        block.size
      )?;
    }

    writeln!(f, "{RULE}")?;
    writeln!(f, "{BANNER}")?;
    writeln!(f, "Total used size = {used:4}")?;
    writeln!(f, "Total free size = {free:4}")?;
    writeln!(f, "Total size      = {:4}", used + free)?;
    writeln!(f, "{BANNER}")
  }
}

#[cfg(test)]
mod tests {
  use test_log::test;

  use crate::region::Region;

  use super::*;

  #[test]
  fn test_totals() {
    let mut heap = Heap::on_region(Region::reserve(4096).unwrap());
    assert_eq!(heap.dump().used(), 0);
    assert_eq!(heap.dump().free(), 4088);

    let ptr = heap.allocate(100).unwrap();
    heap.allocate(1).unwrap();
    let dump = heap.dump();
    assert_eq!(dump.used(), 112);
    assert_eq!(dump.free(), 3976);

    heap.free(ptr.as_ptr()).unwrap();
    assert_eq!(heap.dump().used(), 8);
  }

  #[test]
  fn test_listing() {
    let mut heap = Heap::on_region(Region::reserve(4096).unwrap());
    heap.allocate(100).unwrap();

    let text = heap.dump().to_string();
    let rows: Vec<&str> = text
      .lines()
      .filter(|line| line.starts_with(|c: char| c.is_ascii_digit()))
      .collect();

    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("1\talloc\talloc\t"), "{}", rows[0]);
    assert!(rows[0].ends_with(" 104"), "{}", rows[0]);
    assert!(rows[1].starts_with("2\tFREE \talloc\t"), "{}", rows[1]);
    assert!(rows[1].ends_with("3984"), "{}", rows[1]);

    let first = heap.blocks().next().unwrap();
    assert!(rows[0].contains(&format!("{:#010x}", first.address)));
    assert!(rows[0].contains(&format!("{:#010x}", first.address + 103)));

    assert!(text.contains("Total used size =  104"));
    assert!(text.contains("Total free size = 3984"));
    assert!(text.contains("Total size      = 4088"));
  }

  #[test]
  fn test_dump_does_not_mutate() {
    let mut heap = Heap::on_region(Region::reserve(4096).unwrap());
    let ptr = heap.allocate(40).unwrap();
    heap.free(ptr.as_ptr()).unwrap();

    let before: Vec<_> = heap.blocks().collect();
    let _ = heap.dump().to_string();
    let after: Vec<_> = heap.blocks().collect();
    assert_eq!(before, after);
  }
}
