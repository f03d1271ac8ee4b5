use std::io::{self, Error};
use std::mem;
use std::ptr;

#[cfg(not(miri))]
use windows_sys::Win32::System::Memory::{
    VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE,
};
#[cfg(not(miri))]
use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

pub fn page_size() -> usize {
    #[cfg(miri)]
    {
        4096
    }
    #[cfg(not(miri))]
    unsafe {
        let mut info: SYSTEM_INFO = mem::zeroed();
        GetSystemInfo(&mut info);
        match info.dwPageSize as usize {
            0 => 4096,
            size => size,
        }
    }
}

pub struct MmapInner {
    ptr: *mut std::ffi::c_void,
    len: usize,
}

impl MmapInner {
    /// Reserves and commits `len` bytes of read/write memory.
    ///
    /// Pages are zero-filled by the system, so `populate` has no effect.
    pub unsafe fn map_anon(len: usize, _populate: bool) -> io::Result<Self> {
        #[cfg(miri)]
        {
            use std::alloc::{alloc_zeroed, Layout};
            let layout = Layout::from_size_align(len, page_size())
                .map_err(|_| Error::from(io::ErrorKind::InvalidInput))?;
            let ptr = unsafe { alloc_zeroed(layout) };
            if ptr.is_null() {
                return Err(Error::from(io::ErrorKind::OutOfMemory));
            }
            Ok(Self {
                ptr: ptr.cast::<std::ffi::c_void>(),
                len,
            })
        }
        #[cfg(not(miri))]
        {
            let ptr = unsafe {
                VirtualAlloc(ptr::null(), len, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE)
            };
            if ptr.is_null() {
                return Err(Error::last_os_error());
            }
            Ok(Self { ptr, len })
        }
    }

    pub const fn ptr(&self) -> *mut u8 {
        self.ptr.cast::<u8>()
    }

    pub const fn len(&self) -> usize {
        self.len
    }
}

impl Drop for MmapInner {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        unsafe {
            #[cfg(miri)]
            {
                use std::alloc::{dealloc, Layout};
                if let Ok(layout) = Layout::from_size_align(self.len, page_size()) {
                    dealloc(self.ptr.cast::<u8>(), layout);
                }
            }
            #[cfg(not(miri))]
            {
                // MEM_RELEASE requires dwSize to be 0
                VirtualFree(self.ptr, 0, MEM_RELEASE);
            }
        }
    }
}
