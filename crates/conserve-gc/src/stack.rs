//! Platform layer for conservative root discovery.
//!
//! Everything that depends on the CPU or the operating system lives here:
//! spilling callee-saved registers into a buffer, reading the stack pointer
//! and locating the far end of the current thread's stack. The rest of the
//! collector only ever sees plain addresses.

/// Number of words reserved for the register snapshot.
pub const REGISTER_WORDS: usize = 16;

/// The end of the stack that the root scan runs towards.
///
/// Whatever lies between this marker and the stack pointer at collection
/// time is scanned, so it must be captured in a frame that outlives every
/// frame holding pointers into the collected heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBottom(usize);

impl StackBottom {
    /// Marks the caller's frame as the bottom of the scanned stack.
    #[inline(always)]
    #[must_use]
    pub fn here() -> Self {
        let marker = 0u8;
        Self(std::hint::black_box(std::ptr::addr_of!(marker)) as usize)
    }

    /// The far end of the current thread's stack as reported by the OS.
    ///
    /// Falls back to [`StackBottom::here`] where the platform offers no query.
    #[inline(always)]
    #[must_use]
    pub fn thread() -> Self {
        match get_stack_bounds() {
            Some(bounds) => Self(bounds.bottom),
            None => Self::here(),
        }
    }

    /// Uses an address the embedder captured itself.
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    /// The marker address.
    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }
}

/// Bounds of a thread's stack.
#[derive(Debug, Clone, Copy)]
pub struct StackBounds {
    /// The bottom of the stack (highest address).
    pub bottom: usize,
    /// The top of the stack (lowest address).
    #[allow(dead_code)]
    pub top: usize,
}

/// Retrieve the stack bounds for the current thread.
#[cfg(miri)]
pub const fn get_stack_bounds() -> Option<StackBounds> {
    // Miri cannot read the stack it does not own; the caller's marker is used.
    None
}

/// Retrieve the stack bounds for the current thread.
#[cfg(all(target_os = "linux", not(miri)))]
pub fn get_stack_bounds() -> Option<StackBounds> {
    use libc::{
        pthread_attr_destroy, pthread_attr_getstack, pthread_attr_t, pthread_getattr_np,
        pthread_self,
    };

    unsafe {
        let mut attr: pthread_attr_t = std::mem::zeroed();
        if pthread_getattr_np(pthread_self(), &raw mut attr) != 0 {
            return None;
        }

        let mut stackaddr: *mut libc::c_void = std::ptr::null_mut();
        let mut stacksize: libc::size_t = 0;
        let ret = pthread_attr_getstack(&raw const attr, &raw mut stackaddr, &raw mut stacksize);
        pthread_attr_destroy(&raw mut attr);
        if ret != 0 {
            return None;
        }

        let top = stackaddr as usize;
        Some(StackBounds {
            bottom: top + stacksize,
            top,
        })
    }
}

/// Retrieve the stack bounds for the current thread.
#[cfg(all(target_vendor = "apple", not(miri)))]
pub fn get_stack_bounds() -> Option<StackBounds> {
    unsafe {
        let thread = libc::pthread_self();
        let bottom = libc::pthread_get_stackaddr_np(thread) as usize;
        let size = libc::pthread_get_stacksize_np(thread);
        Some(StackBounds {
            bottom,
            top: bottom - size,
        })
    }
}

/// Retrieve the stack bounds for the current thread.
#[cfg(all(windows, not(miri)))]
pub fn get_stack_bounds() -> Option<StackBounds> {
    use windows_sys::Win32::System::Threading::GetCurrentThreadStackLimits;

    let mut low = 0usize;
    let mut high = 0usize;
    unsafe { GetCurrentThreadStackLimits(&raw mut low, &raw mut high) };
    (high != 0).then_some(StackBounds {
        bottom: high,
        top: low,
    })
}

/// Retrieve the stack bounds for the current thread (no query on this platform).
#[cfg(all(
    not(any(target_os = "linux", target_vendor = "apple", windows)),
    not(miri)
))]
pub const fn get_stack_bounds() -> Option<StackBounds> {
    None
}

/// Callee-saved registers captured at the start of a collection.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct RegisterSnapshot {
    words: [usize; REGISTER_WORDS],
}

impl RegisterSnapshot {
    /// An all-zero snapshot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: [0; REGISTER_WORDS],
        }
    }

    /// The captured words.
    #[must_use]
    pub const fn words(&self) -> &[usize; REGISTER_WORDS] {
        &self.words
    }
}

impl Default for RegisterSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Spill the callee-saved general-purpose registers into `snapshot`.
///
/// Caller-saved registers that hold live values have already been spilled to
/// the stack by the compiler around this call, so the stack scan sees them.
#[inline(never)]
pub fn capture_registers(snapshot: &mut RegisterSnapshot) {
    snapshot.words = [0; REGISTER_WORDS];
    let buf = snapshot.words.as_mut_ptr();

    #[cfg(all(target_arch = "x86_64", not(miri)))]
    unsafe {
        std::arch::asm!(
            "mov [{0}], rbx",
            "mov [{0} + 8], rbp",
            "mov [{0} + 16], r12",
            "mov [{0} + 24], r13",
            "mov [{0} + 32], r14",
            "mov [{0} + 40], r15",
            in(reg) buf,
            options(nostack, preserves_flags),
        );
    }

    #[cfg(all(target_arch = "aarch64", not(miri)))]
    unsafe {
        std::arch::asm!(
            "stp x19, x20, [{0}]",
            "stp x21, x22, [{0}, #16]",
            "stp x23, x24, [{0}, #32]",
            "stp x25, x26, [{0}, #48]",
            "stp x27, x28, [{0}, #64]",
            "str x29, [{0}, #80]",
            in(reg) buf,
            options(nostack, preserves_flags),
        );
    }

    std::hint::black_box(buf);
}

/// Current stack pointer of the calling frame (or a close approximation).
#[inline(never)]
#[must_use]
pub fn current_stack_pointer() -> usize {
    #[cfg(all(target_arch = "x86_64", not(miri)))]
    {
        let sp: usize;
        unsafe {
            std::arch::asm!("mov {}, rsp", out(reg) sp, options(nomem, nostack, preserves_flags));
        }
        sp
    }

    #[cfg(all(target_arch = "aarch64", not(miri)))]
    {
        let sp: usize;
        unsafe {
            std::arch::asm!("mov {}, sp", out(reg) sp, options(nomem, nostack, preserves_flags));
        }
        sp
    }

    #[cfg(any(not(any(target_arch = "x86_64", target_arch = "aarch64")), miri))]
    {
        let marker = 0usize;
        std::hint::black_box(std::ptr::addr_of!(marker)) as usize
    }
}

/// Clear CPU registers to prevent "False Roots" from lingering values.
///
/// Tests use this so that an address left behind in a callee-saved register
/// by a returned helper does not keep its object alive.
#[inline(never)]
pub unsafe fn clear_registers() {
    #[cfg(all(target_arch = "x86_64", not(miri)))]
    unsafe {
        // RBX and RBP are reserved by LLVM and left alone.
        std::arch::asm!(
            "xor r12, r12",
            "xor r13, r13",
            "xor r14, r14",
            "xor r15, r15",
            out("r12") _,
            out("r13") _,
            out("r14") _,
            out("r15") _,
        );
    }
    #[cfg(all(target_arch = "aarch64", not(miri)))]
    unsafe {
        std::arch::asm!(
            "mov x20, xzr",
            "mov x21, xzr",
            "mov x22, xzr",
            "mov x23, xzr",
            "mov x24, xzr",
            "mov x25, xzr",
            "mov x26, xzr",
            "mov x27, xzr",
            "mov x28, xzr",
            out("x20") _,
            out("x21") _,
            out("x22") _,
            out("x23") _,
            out("x24") _,
            out("x25") _,
            out("x26") _,
            out("x27") _,
            out("x28") _,
        );
    }
    #[cfg(any(not(any(target_arch = "x86_64", target_arch = "aarch64")), miri))]
    std::hint::black_box(());
}
