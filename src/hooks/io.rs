use crate::core::{copy_from_offset, set_errno, stream_to_fd};
use crate::macros::get_real;
use crate::reals::{REAL_FGETC, REAL_FGETS, REAL_FREAD, REAL_FWRITE, REAL_PREAD, REAL_READ, REAL_WRITE};
use crate::state::{ShimGuard, ShimState};
use libc::{c_char, c_int, c_void, off_t, size_t, ssize_t, FILE};

type ReadFn = unsafe extern "C" fn(c_int, *mut c_void, size_t) -> ssize_t;
type WriteFn = unsafe extern "C" fn(c_int, *const c_void, size_t) -> ssize_t;
type PreadFn = unsafe extern "C" fn(c_int, *mut c_void, size_t, off_t) -> ssize_t;
type FreadFn = unsafe extern "C" fn(*mut c_void, size_t, size_t, *mut FILE) -> size_t;
type FwriteFn = unsafe extern "C" fn(*const c_void, size_t, size_t, *mut FILE) -> size_t;
type FgetcFn = unsafe extern "C" fn(*mut FILE) -> c_int;
type FgetsFn = unsafe extern "C" fn(*mut c_char, c_int, *mut FILE) -> *mut c_char;

#[no_mangle]
pub unsafe extern "C" fn read(fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t {
    let real = get_real!(REAL_READ, ReadFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(fd, buf, count),
    };
    if let Some(state) = ShimState::get() {
        let mut tables = state.tables();
        if let Some(desc) = tables.descriptors.get_mut(fd) {
            return copy_from_offset(desc, buf as *mut u8, count) as ssize_t;
        }
    }
    real(fd, buf, count)
}

/// `write(2)` on a virtual descriptor always fails (§4.5, §7): writes to
/// intercepted files are unsupported.
#[no_mangle]
pub unsafe extern "C" fn write(fd: c_int, buf: *const c_void, count: size_t) -> ssize_t {
    let real = get_real!(REAL_WRITE, WriteFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(fd, buf, count),
    };
    if let Some(state) = ShimState::get() {
        if state.tables().descriptors.contains(fd) {
            set_errno(libc::EIO);
            return -1;
        }
    }
    real(fd, buf, count)
}

/// `pread(2)`: read at `offset` without disturbing the descriptor's own
/// seek position (§4.5, §8 "pread ... leaves the seek offset unchanged").
#[no_mangle]
pub unsafe extern "C" fn pread(fd: c_int, buf: *mut c_void, count: size_t, offset: off_t) -> ssize_t {
    let real = get_real!(REAL_PREAD, PreadFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(fd, buf, count, offset),
    };
    if let Some(state) = ShimState::get() {
        let mut tables = state.tables();
        if let Some(desc) = tables.descriptors.get_mut(fd) {
            let saved = desc.offset;
            desc.offset = offset as i64;
            let n = copy_from_offset(desc, buf as *mut u8, count);
            desc.offset = saved;
            return n as ssize_t;
        }
    }
    real(fd, buf, count, offset)
}

#[no_mangle]
pub unsafe extern "C" fn fread(ptr: *mut c_void, size: size_t, nitems: size_t, stream: *mut FILE) -> size_t {
    let real = get_real!(REAL_FREAD, FreadFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(ptr, size, nitems, stream),
    };
    let fd = stream_to_fd(stream);
    if let Some(state) = ShimState::get() {
        let mut tables = state.tables();
        if let Some(desc) = tables.descriptors.get_mut(fd) {
            if size == 0 {
                return 0;
            }
            let n = copy_from_offset(desc, ptr as *mut u8, size.saturating_mul(nitems));
            return n / size;
        }
    }
    real(ptr, size, nitems, stream)
}

/// `fwrite(3)` on a virtual stream always fails (§4.5, §7).
#[no_mangle]
pub unsafe extern "C" fn fwrite(ptr: *const c_void, size: size_t, nitems: size_t, stream: *mut FILE) -> size_t {
    let real = get_real!(REAL_FWRITE, FwriteFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(ptr, size, nitems, stream),
    };
    let fd = stream_to_fd(stream);
    if let Some(state) = ShimState::get() {
        if state.tables().descriptors.contains(fd) {
            set_errno(libc::EIO);
            return 0;
        }
    }
    real(ptr, size, nitems, stream)
}

#[no_mangle]
pub unsafe extern "C" fn fgetc(stream: *mut FILE) -> c_int {
    let real = get_real!(REAL_FGETC, FgetcFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(stream),
    };
    let fd = stream_to_fd(stream);
    if let Some(state) = ShimState::get() {
        let mut tables = state.tables();
        if let Some(desc) = tables.descriptors.get_mut(fd) {
            let mut byte = [0u8; 1];
            return if copy_from_offset(desc, byte.as_mut_ptr(), 1) == 1 {
                byte[0] as c_int
            } else {
                libc::EOF
            };
        }
    }
    real(stream)
}

/// Unimplemented for virtual streams (§4.5, §9 open question): returns
/// the null/empty result rather than attempting a line read.
#[no_mangle]
pub unsafe extern "C" fn fgets(s: *mut c_char, size: c_int, stream: *mut FILE) -> *mut c_char {
    let real = get_real!(REAL_FGETS, FgetsFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(s, size, stream),
    };
    let fd = stream_to_fd(stream);
    if let Some(state) = ShimState::get() {
        if state.tables().descriptors.contains(fd) {
            return std::ptr::null_mut();
        }
    }
    real(s, size, stream)
}
