//! Conservative root discovery.
//!
//! Roots are not registered anywhere: every aligned word between the current
//! stack pointer and the recorded stack bottom, and every word of a fresh
//! register snapshot, is offered to the marker. Whatever passes the
//! candidate test is treated as a pointer.

use crate::scan;
use crate::stack::{self, RegisterSnapshot, StackBottom};

/// What a root scan looked at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RootScan {
    /// Words read from the stack.
    pub stack_words: usize,
    /// Words read from the register snapshot.
    pub register_words: usize,
    /// Words the visitor accepted as candidate roots.
    pub roots: usize,
}

/// Scan the calling thread's stack and registers.
///
/// `visit` receives every word and returns whether it was a candidate root.
/// Must run on the thread whose stack `bottom` belongs to.
#[inline(never)]
pub fn scan_roots<F>(bottom: StackBottom, registers: &mut RegisterSnapshot, mut visit: F) -> RootScan
where
    F: FnMut(usize) -> bool,
{
    let mut result = RootScan::default();

    stack::capture_registers(registers);
    let top = stack::current_stack_pointer();

    // SAFETY: everything between the live stack pointer and the bottom of the
    // same thread's stack is mapped and readable.
    unsafe {
        scan::scan_between(top, bottom.addr(), |word| {
            result.stack_words += 1;
            if visit(word) {
                result.roots += 1;
            }
        });
    }

    let snapshot = registers.words();
    // SAFETY: the snapshot is a live, initialized buffer.
    unsafe {
        scan::scan_words(
            snapshot.as_ptr() as usize,
            std::mem::size_of_val(snapshot),
            |word| {
                result.register_words += 1;
                if visit(word) {
                    result.roots += 1;
                }
            },
        );
    }

    crate::tracing::internal::log_roots_scanned(
        result.stack_words,
        result.register_words,
        result.roots,
    );
    result
}
