use crate::core::{clear_errno, stream_to_fd};
use crate::macros::get_real;
use crate::reals::{REAL_CLEARERR, REAL_FEOF, REAL_FERROR, REAL_FILENO, REAL_FILENO_UNLOCKED};
use crate::state::{ShimGuard, ShimState};
use libc::{c_int, FILE};

type ClearerrFn = unsafe extern "C" fn(*mut FILE);
type FeofFn = unsafe extern "C" fn(*mut FILE) -> c_int;
type FerrorFn = unsafe extern "C" fn(*mut FILE) -> c_int;
type FilenoFn = unsafe extern "C" fn(*mut FILE) -> c_int;

#[no_mangle]
pub unsafe extern "C" fn clearerr(stream: *mut FILE) {
    let real = get_real!(REAL_CLEARERR, ClearerrFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(stream),
    };
    let fd = stream_to_fd(stream);
    if let Some(state) = ShimState::get() {
        if state.tables().descriptors.contains(fd) {
            clear_errno();
            return;
        }
    }
    real(stream)
}

/// True once the descriptor's offset has reached the end of its buffer
/// (§4.5) — a virtual stream never sets a separate sticky eof bit.
#[no_mangle]
pub unsafe extern "C" fn feof(stream: *mut FILE) -> c_int {
    let real = get_real!(REAL_FEOF, FeofFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(stream),
    };
    let fd = stream_to_fd(stream);
    if let Some(state) = ShimState::get() {
        if let Some(desc) = state.tables().descriptors.get(fd) {
            return (desc.offset >= desc.buffer.len() as i64) as c_int;
        }
    }
    real(stream)
}

/// A virtual stream never enters an error state (§4.5, §7).
#[no_mangle]
pub unsafe extern "C" fn ferror(stream: *mut FILE) -> c_int {
    let real = get_real!(REAL_FERROR, FerrorFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(stream),
    };
    let fd = stream_to_fd(stream);
    if let Some(state) = ShimState::get() {
        if state.tables().descriptors.contains(fd) {
            return 0;
        }
    }
    real(stream)
}

#[no_mangle]
pub unsafe extern "C" fn fileno(stream: *mut FILE) -> c_int {
    let real = get_real!(REAL_FILENO, FilenoFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(stream),
    };
    let fd = stream_to_fd(stream);
    if let Some(state) = ShimState::get() {
        if state.tables().descriptors.contains(fd) {
            return fd;
        }
    }
    real(stream)
}

#[no_mangle]
pub unsafe extern "C" fn fileno_unlocked(stream: *mut FILE) -> c_int {
    let real = get_real!(REAL_FILENO_UNLOCKED, FilenoFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(stream),
    };
    let fd = stream_to_fd(stream);
    if let Some(state) = ShimState::get() {
        if state.tables().descriptors.contains(fd) {
            return fd;
        }
    }
    real(stream)
}
