use crate::macros::get_real;
use crate::reals::REAL_FCNTL;
use crate::state::{ShimGuard, ShimState};
use libc::{c_int, c_long};

type FcntlFn = unsafe extern "C" fn(c_int, c_int, c_long) -> c_int;

/// `fcntl(2)` is variadic in real libc; like the rest of the corpus we
/// shim the common one-extra-argument call shape (`arg` as a `long`,
/// wide enough to carry either an int flag or a pointer bit pattern).
///
/// For a virtual descriptor this is a pure no-op success (§4.5, §7):
/// there is nothing backing it to duplicate, lock, or reconfigure.
#[no_mangle]
pub unsafe extern "C" fn fcntl(fd: c_int, cmd: c_int, arg: c_long) -> c_int {
    let real = get_real!(REAL_FCNTL, FcntlFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(fd, cmd, arg),
    };
    if let Some(state) = ShimState::get() {
        if state.tables().descriptors.contains(fd) {
            return 0;
        }
    }
    real(fd, cmd, arg)
}
