use std::{env, io::Read, process::ExitCode, ptr};

use bfalloc::Heap;

/// Waits until the user presses ENTER, when `PAUSE` is set.
/// Useful when you want to inspect the mapping with `pmap` or `gdb` between
/// steps.
fn block_until_enter_pressed() {
  if env::var_os("PAUSE").is_none() {
    return;
  }
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn show(
  heap: &Heap,
  label: &str,
) {
  println!("\n[{label}]");
  print!("{}", heap.dump());
  block_until_enter_pressed();
}

fn main() -> ExitCode {
  env_logger::init();

  // Region size from the first argument; one page by default.
  let size = match env::args().nth(1).map(|arg| arg.parse::<usize>()) {
    None => 4096,
    Some(Ok(size)) => size,
    Some(Err(err)) => {
      eprintln!("usage: walkthrough [REGION_BYTES]: {err}");
      return ExitCode::FAILURE;
    }
  };

  let mut heap = match Heap::init(size) {
    Ok(heap) => heap,
    Err(err) => {
      eprintln!("cannot initialize heap: {err}");
      return ExitCode::FAILURE;
    }
  };

  println!("PID = {}, region = {} bytes", std::process::id(), heap.region_size());
  show(&heap, "fresh heap");

  // --------------------------------------------------------------------
  // 1) Allocate 100 bytes: the one free block is split in two.
  // --------------------------------------------------------------------
  let Some(first) = heap.allocate(100) else {
    eprintln!("region too small for the walkthrough");
    return ExitCode::FAILURE;
  };
  unsafe { ptr::write_bytes(first.as_ptr(), 0xAB, 100) };
  println!("\n[1] allocate(100) = {first:?}, aligned: {}", first.as_ptr() as usize % 8 == 0);
  show(&heap, "after allocate(100)");

  // --------------------------------------------------------------------
  // 2) Two more blocks, then free the middle one.
  // --------------------------------------------------------------------
  let second = heap.allocate(20);
  let third = heap.allocate(8);
  println!("\n[2] allocate(20) = {second:?}, allocate(8) = {third:?}");
  if let Some(second) = second {
    if let Err(err) = heap.free(second.as_ptr()) {
      eprintln!("free failed: {err}");
    }
  }
  show(&heap, "after freeing the 20 byte block");

  // --------------------------------------------------------------------
  // 3) Best fit: a 16 byte request lands in the freed 24 byte hole.
  // --------------------------------------------------------------------
  let reused = heap.allocate(16);
  println!(
    "\n[3] allocate(16) = {reused:?}, reused hole? {}",
    reused == second
  );
  show(&heap, "after allocate(16)");

  // --------------------------------------------------------------------
  // 4) Double free is refused and changes nothing.
  // --------------------------------------------------------------------
  let _ = heap.free(first.as_ptr());
  match heap.free(first.as_ptr()) {
    Ok(()) => println!("\n[4] second free unexpectedly succeeded"),
    Err(err) => println!("\n[4] second free refused: {err}"),
  }

  // --------------------------------------------------------------------
  // 5) Free everything: the blocks stay separate until coalesce.
  // --------------------------------------------------------------------
  for block in [reused, third].into_iter().flatten() {
    let _ = heap.free(block.as_ptr());
  }
  show(&heap, "everything freed, not yet coalesced");

  heap.coalesce();
  show(&heap, "after coalesce");

  ExitCode::SUCCESS
}
