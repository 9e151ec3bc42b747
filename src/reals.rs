use libc::{c_char, c_void};
use std::sync::atomic::{AtomicPtr, Ordering};

/// Lazily-resolved libc entry point, cached for the life of the process.
///
/// `dlsym(RTLD_NEXT, ...)` is resolved on first use rather than at load
/// time so the shim carries no link-time dependency on symbol order.
/// Concurrent callers racing on first resolution just call `dlsym` more
/// than once; the result is the same address either way, so no extra
/// synchronization beyond the atomic store is needed.
pub struct RealSymbol {
    ptr: AtomicPtr<c_void>,
    name: &'static str,
}

impl RealSymbol {
    pub const fn new(name: &'static str) -> Self {
        Self {
            ptr: AtomicPtr::new(std::ptr::null_mut()),
            name,
        }
    }

    pub unsafe fn get(&self) -> *mut c_void {
        let p = self.ptr.load(Ordering::Acquire);
        if !p.is_null() {
            return p;
        }
        let f = libc::dlsym(libc::RTLD_NEXT, self.name.as_ptr() as *const c_char);
        self.ptr.store(f, Ordering::Release);
        f
    }
}

// SAFETY: each RealSymbol only ever holds a function pointer returned by
// dlsym; it is not dereferenced here, only cached.
unsafe impl Sync for RealSymbol {}

pub static REAL_OPEN: RealSymbol = RealSymbol::new("open\0");
pub static REAL_CLOSE: RealSymbol = RealSymbol::new("close\0");
pub static REAL_READ: RealSymbol = RealSymbol::new("read\0");
pub static REAL_WRITE: RealSymbol = RealSymbol::new("write\0");
pub static REAL_FCNTL: RealSymbol = RealSymbol::new("fcntl\0");
pub static REAL_FSTAT: RealSymbol = RealSymbol::new("fstat\0");
pub static REAL_LSEEK: RealSymbol = RealSymbol::new("lseek\0");
pub static REAL_PREAD: RealSymbol = RealSymbol::new("pread\0");
pub static REAL_FOPEN: RealSymbol = RealSymbol::new("fopen\0");
pub static REAL_FDOPEN: RealSymbol = RealSymbol::new("fdopen\0");
pub static REAL_FCLOSE: RealSymbol = RealSymbol::new("fclose\0");
pub static REAL_FREAD: RealSymbol = RealSymbol::new("fread\0");
pub static REAL_FWRITE: RealSymbol = RealSymbol::new("fwrite\0");
pub static REAL_FGETC: RealSymbol = RealSymbol::new("fgetc\0");
pub static REAL_FGETS: RealSymbol = RealSymbol::new("fgets\0");
pub static REAL_CLEARERR: RealSymbol = RealSymbol::new("clearerr\0");
pub static REAL_FEOF: RealSymbol = RealSymbol::new("feof\0");
pub static REAL_FERROR: RealSymbol = RealSymbol::new("ferror\0");
pub static REAL_FILENO: RealSymbol = RealSymbol::new("fileno\0");
pub static REAL_FILENO_UNLOCKED: RealSymbol = RealSymbol::new("fileno_unlocked\0");
pub static REAL_FSEEKO64: RealSymbol = RealSymbol::new("fseeko64\0");
pub static REAL_FTELLO64: RealSymbol = RealSymbol::new("ftello64\0");
pub static REAL_MMAP: RealSymbol = RealSymbol::new("mmap\0");
pub static REAL_MUNMAP: RealSymbol = RealSymbol::new("munmap\0");
