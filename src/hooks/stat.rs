use crate::macros::get_real;
use crate::reals::REAL_FSTAT;
use crate::state::{ShimGuard, ShimState};
use libc::{c_int, stat as stat_t};

type FstatFn = unsafe extern "C" fn(c_int, *mut stat_t) -> c_int;

/// `fstat(2)` on a virtual descriptor zeroes the caller's buffer and
/// reports success (§4.5, §7) — there is no backing inode to describe,
/// and the spec makes no promise about field contents beyond "succeeds".
#[no_mangle]
pub unsafe extern "C" fn fstat(fd: c_int, buf: *mut stat_t) -> c_int {
    let real = get_real!(REAL_FSTAT, FstatFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(fd, buf),
    };
    if let Some(state) = ShimState::get() {
        if state.tables().descriptors.contains(fd) {
            if !buf.is_null() {
                std::ptr::write_bytes(buf, 0, 1);
            }
            return 0;
        }
    }
    real(fd, buf)
}
