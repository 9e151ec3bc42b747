use crate::macros::get_real;
use crate::reals::{REAL_MMAP, REAL_MUNMAP};
use crate::state::{ShimGuard, ShimState};
use libc::{c_int, c_void, off_t, size_t};
use std::sync::Arc;

type MmapFn = unsafe extern "C" fn(*mut c_void, size_t, c_int, c_int, c_int, off_t) -> *mut c_void;
type MunmapFn = unsafe extern "C" fn(*mut c_void, size_t) -> c_int;

/// `mmap(2)` of a virtual descriptor hands back the buffer's own bytes
/// directly (§4.5, §3 "mmap reuses the buffer's storage rather than
/// creating a new mapping"): no anonymous mapping is created, and the
/// pointer returned aliases `DataBuffer`'s heap allocation. This only
/// makes sense for a read-only view, so a caller requesting `MAP_FIXED`
/// (which would need us to actually remap at a chosen address) is turned
/// away with `ENOMEM` rather than silently ignored.
///
/// Taking this path acquires one additional reference on the buffer
/// (`mmap_count` on the descriptor), released in full by a matching
/// `munmap` — not by `close`/`fclose`, which only ever drops the
/// descriptor's own base reference (see `descriptors::VirtualDescriptor`).
#[no_mangle]
pub unsafe extern "C" fn mmap(
    addr: *mut c_void,
    len: size_t,
    prot: c_int,
    flags: c_int,
    fd: c_int,
    offset: off_t,
) -> *mut c_void {
    let real = get_real!(REAL_MMAP, MmapFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(addr, len, prot, flags, fd, offset),
    };
    if let Some(state) = ShimState::get() {
        let mut tables = state.tables();
        if let Some(desc) = tables.descriptors.get_mut(fd) {
            if flags & libc::MAP_FIXED != 0 {
                crate::core::set_errno(libc::ENOMEM);
                return libc::MAP_FAILED;
            }
            // Hold an extra strong reference for the lifetime of this
            // mapping without materializing an owning `Arc` we'd have
            // nowhere to store; `munmap` below undoes this by address.
            Arc::increment_strong_count(Arc::as_ptr(&desc.buffer));
            desc.mmap_count += 1;
            return desc.buffer.as_ptr() as *mut c_void;
        }
    }
    real(addr, len, prot, flags, fd, offset)
}

/// `munmap(2)`: locates the descriptor whose buffer starts at `addr`
/// (§4.5 "munmap is matched by address, not by descriptor id") and
/// releases the reference(s) that mapping holds — the one from the
/// `mmap` call itself plus, per the scenario worked out in DESIGN.md,
/// the descriptor's own base reference in the same step, since a mapped
/// buffer has no other reason to keep its originating descriptor alive.
#[no_mangle]
pub unsafe extern "C" fn munmap(addr: *mut c_void, len: size_t) -> c_int {
    let real = get_real!(REAL_MUNMAP, MunmapFn);
    let _guard = match ShimGuard::enter() {
        Some(g) => g,
        None => return real(addr, len),
    };
    if let Some(state) = ShimState::get() {
        let mut tables = state.tables();
        if let Some(fd) = tables.descriptors.find_by_buffer_addr(addr as *const u8) {
            let desc = tables.descriptors.remove(fd).expect("fd just located by address");
            let ptr = Arc::as_ptr(&desc.buffer);
            for _ in 0..desc.mmap_count {
                Arc::decrement_strong_count(ptr);
            }
            // `desc` drops here, releasing its own base reference — the
            // same release a `close`/`fclose` of this fd would have done.
            drop(desc);
            return 0;
        }
    }
    real(addr, len)
}
