use crate::core::{clear_errno, stream_to_fd};
use crate::macros::get_real;
use crate::reals::{REAL_CLOSE, REAL_FCLOSE};
use crate::state::{ShimGuard, ShimState};
use libc::{c_int, FILE};

type CloseFn = unsafe extern "C" fn(c_int) -> c_int;
type FcloseFn = unsafe extern "C" fn(*mut FILE) -> c_int;

#[no_mangle]
pub unsafe extern "C" fn close(fd: c_int) -> c_int {
    let real = get_real!(REAL_CLOSE, CloseFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(fd),
    };
    if let Some(state) = ShimState::get() {
        if state.tables().descriptors.remove(fd).is_some() {
            clear_errno();
            return 0;
        }
    }
    real(fd)
}

#[no_mangle]
pub unsafe extern "C" fn fclose(stream: *mut FILE) -> c_int {
    let real = get_real!(REAL_FCLOSE, FcloseFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(stream),
    };
    let fd = stream_to_fd(stream);
    if let Some(state) = ShimState::get() {
        if state.tables().descriptors.remove(fd).is_some() {
            return 0;
        }
    }
    real(stream)
}
