use std::{io, ptr::NonNull, slice};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, _SC_PAGESIZE, c_void};
use log::debug;

use crate::{align_to, error::InitError};

/// Page size reported by the OS.
pub fn page_size() -> Result<usize, io::Error> {
  let size = unsafe { libc::sysconf(_SC_PAGESIZE) };
  if size <= 0 {
    return Err(io::Error::last_os_error());
  }
  Ok(size as usize)
}

/// One page-rounded, zero-filled mapping owned for the life of the heap.
///
/// The mapping is private and anonymous, so the kernel hands it back zeroed
/// and nothing else in the process aliases it. It is unmapped on drop.
pub struct Region {
  base: NonNull<u8>,
  len: usize,
}

impl Region {
  /// Maps `requested` bytes rounded up to whole pages. `requested` must be
  /// non-zero; the caller checks that.
  pub fn reserve(requested: usize) -> Result<Self, InitError> {
    let page = page_size().map_err(|source| InitError::Reserve {
      size: requested,
      source,
    })?;

    if requested > usize::MAX - (page - 1) {
      return Err(InitError::RegionTooLarge { size: requested });
    }
    let len = align_to!(requested, page);

    // Block sizes live in a 32-bit header word.
    if len > u32::MAX as usize {
      return Err(InitError::RegionTooLarge { size: len });
    }

    let addr = unsafe {
      libc::mmap(
        std::ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if addr == MAP_FAILED {
      return Err(InitError::Reserve {
        size: len,
        source: io::Error::last_os_error(),
      });
    }

    let base = NonNull::new(addr as *mut u8).ok_or_else(|| InitError::Reserve {
      size: len,
      source: io::Error::other("mmap returned a null mapping"),
    })?;

    debug!(
      "reserved {} bytes at {:?} (requested {}, page size {})",
      len, base, requested, page
    );

    Ok(Self { base, len })
  }

  pub fn len(&self) -> usize {
    self.len
  }

  /// Address of the first byte of the mapping.
  pub fn addr(&self) -> usize {
    self.base.as_ptr() as usize
  }

  /// Pointer `offset` bytes into the mapping.
  pub fn ptr_at(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    assert!(offset < self.len, "offset {offset} past region of {}", self.len);
    // SAFETY: `offset` is inside the mapping, checked above.
    unsafe { self.base.add(offset) }
  }

  pub fn as_slice(&self) -> &[u8] {
    // SAFETY: the mapping is `len` readable bytes owned by `self` until drop.
    unsafe { slice::from_raw_parts(self.base.as_ptr(), self.len) }
  }

  pub fn as_mut_slice(&mut self) -> &mut [u8] {
    // SAFETY: as above, and `&mut self` makes this the only live view.
    unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.len) }
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    let rc = unsafe { libc::munmap(self.base.as_ptr() as *mut c_void, self.len) };
    if rc != 0 {
      log::warn!(
        "munmap of {} bytes at {:?} failed: {}",
        self.len,
        self.base,
        io::Error::last_os_error()
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rounds_to_pages() {
    let page = page_size().unwrap();

    let region = Region::reserve(1).unwrap();
    assert_eq!(region.len(), page);

    let region = Region::reserve(page).unwrap();
    assert_eq!(region.len(), page);

    let region = Region::reserve(page + 1).unwrap();
    assert_eq!(region.len(), 2 * page);
  }

  #[test]
  fn test_zero_filled_and_page_aligned() {
    let region = Region::reserve(5000).unwrap();
    assert_eq!(region.addr() % page_size().unwrap(), 0);
    assert!(region.as_slice().iter().all(|&b| b == 0));
  }

  #[test]
  fn test_too_large() {
    assert!(matches!(
      Region::reserve(usize::MAX),
      Err(InitError::RegionTooLarge { .. })
    ));
    assert!(matches!(
      Region::reserve(u32::MAX as usize + 1),
      Err(InitError::RegionTooLarge { .. })
    ));
  }

  #[test]
  fn test_writes_are_visible() {
    let mut region = Region::reserve(64).unwrap();
    region.as_mut_slice()[8] = 0xAB;
    assert_eq!(unsafe { region.ptr_at(8).read() }, 0xAB);
  }
}
