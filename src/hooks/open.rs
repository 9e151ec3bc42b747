use crate::core::{fd_to_stream, open_virtual};
use crate::macros::get_real;
use crate::reals::{REAL_FDOPEN, REAL_FOPEN, REAL_OPEN};
use crate::state::{ShimGuard, ShimState};
use libc::{c_char, c_int, mode_t, FILE};
use std::ffi::CStr;

type OpenFn = unsafe extern "C" fn(*const c_char, c_int, mode_t) -> c_int;
type FopenFn = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut FILE;
type FdopenFn = unsafe extern "C" fn(c_int, *const c_char) -> *mut FILE;

/// `open(2)`. Real third argument (`mode`) is only meaningful with
/// `O_CREAT`; we accept it unconditionally like the real symbol does,
/// matching the calling convention for the common non-variadic-call case.
#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let real = get_real!(REAL_OPEN, OpenFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(path, flags, mode),
    };
    if path.is_null() {
        return real(path, flags, mode);
    }
    let path_str = match CStr::from_ptr(path).to_str() {
        Ok(s) => s,
        Err(_) => return real(path, flags, mode),
    };
    match open_virtual(path_str) {
        Some(fd) => fd,
        None => real(path, flags, mode),
    }
}

#[no_mangle]
pub unsafe extern "C" fn fopen(path: *const c_char, mode: *const c_char) -> *mut FILE {
    let real = get_real!(REAL_FOPEN, FopenFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(path, mode),
    };
    if path.is_null() {
        return real(path, mode);
    }
    let path_str = match CStr::from_ptr(path).to_str() {
        Ok(s) => s,
        Err(_) => return real(path, mode),
    };
    match open_virtual(path_str) {
        Some(fd) => fd_to_stream(fd),
        None => real(path, mode),
    }
}

/// `fdopen(3)`: if `fd` is one of ours, hand back the same id
/// reinterpreted as a stream (§4.5); otherwise passthrough.
#[no_mangle]
pub unsafe extern "C" fn fdopen(fd: c_int, mode: *const c_char) -> *mut FILE {
    let real = get_real!(REAL_FDOPEN, FdopenFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(fd, mode),
    };
    if let Some(state) = ShimState::get() {
        if state.tables().descriptors.contains(fd) {
            return fd_to_stream(fd);
        }
    }
    real(fd, mode)
}
