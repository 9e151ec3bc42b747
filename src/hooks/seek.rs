use crate::core::{compute_seek, set_errno, stream_to_fd};
use crate::macros::get_real;
use crate::reals::{REAL_FSEEKO64, REAL_FTELLO64, REAL_LSEEK};
use crate::state::{ShimGuard, ShimState};
use libc::{c_int, off_t, FILE};

type LseekFn = unsafe extern "C" fn(c_int, off_t, c_int) -> off_t;
type Fseeko64Fn = unsafe extern "C" fn(*mut FILE, i64, c_int) -> c_int;
type Ftello64Fn = unsafe extern "C" fn(*mut FILE) -> i64;

#[no_mangle]
pub unsafe extern "C" fn lseek(fd: c_int, offset: off_t, whence: c_int) -> off_t {
    let real = get_real!(REAL_LSEEK, LseekFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(fd, offset, whence),
    };
    if let Some(state) = ShimState::get() {
        let mut tables = state.tables();
        if let Some(desc) = tables.descriptors.get_mut(fd) {
            return match compute_seek(desc, offset, whence) {
                Some(new_offset) => {
                    desc.offset = new_offset;
                    new_offset as off_t
                }
                None => {
                    set_errno(libc::EINVAL);
                    -1
                }
            };
        }
    }
    real(fd, offset, whence)
}

/// `fseeko64`: same whence arithmetic as `lseek`, but the libc contract
/// here is success/failure (0 / -1), not the new offset (§4.5).
#[no_mangle]
pub unsafe extern "C" fn fseeko64(stream: *mut FILE, offset: i64, whence: c_int) -> c_int {
    let real = get_real!(REAL_FSEEKO64, Fseeko64Fn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(stream, offset, whence),
    };
    let fd = stream_to_fd(stream);
    if let Some(state) = ShimState::get() {
        let mut tables = state.tables();
        if let Some(desc) = tables.descriptors.get_mut(fd) {
            return match compute_seek(desc, offset as off_t, whence) {
                Some(new_offset) => {
                    desc.offset = new_offset;
                    0
                }
                None => {
                    set_errno(libc::EINVAL);
                    -1
                }
            };
        }
    }
    real(stream, offset, whence)
}

#[no_mangle]
pub unsafe extern "C" fn ftello64(stream: *mut FILE) -> i64 {
    let real = get_real!(REAL_FTELLO64, Ftello64Fn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(stream),
    };
    let fd = stream_to_fd(stream);
    if let Some(state) = ShimState::get() {
        if let Some(desc) = state.tables().descriptors.get(fd) {
            return desc.offset;
        }
    }
    real(stream)
}
