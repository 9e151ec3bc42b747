//! Logic shared by more than one hook: path resolution against the cache
//! and IPC channel (§4.5 "Path-keyed hooks"), buffer copies, seeking, and
//! the small conventions (errno, stream/fd reinterpretation) every hook
//! leans on.

use crate::buffer::DataBuffer;
use crate::channel::ChannelResponse;
use crate::descriptors::VirtualDescriptor;
use crate::filename_cache::Lookup;
use crate::state::ShimState;
use libc::{c_int, off_t};
use std::sync::Arc;

/// Resolves `path_str` against the path cache and, on a cache miss,
/// performs the IPC round trip — the logic shared by `open` and `fopen`
/// (§4.5). Returns the new virtual descriptor id on success, or `None`
/// when the caller should pass through to the real libc entry point
/// (not applicable, shim not good, or the controller has no image).
pub fn open_virtual(path_str: &str) -> Option<c_int> {
    if crate::path::is_proc_path(path_str) {
        return None;
    }
    let state = ShimState::get()?;
    let canonical = crate::path::canonicalize(path_str)?;
    let canonical_str = canonical.to_str()?.to_string();

    {
        let mut tables = state.tables();
        match tables.filenames.lookup(&canonical_str) {
            Lookup::Negative => return None,
            Lookup::Positive(buf) => {
                return Some(tables.descriptors.insert(buf));
            }
            Lookup::Missing => {}
        }
    }

    // The round trip happens with no table lock held (§5: the shim
    // mutex is never held across the semaphore wait).
    let response = {
        let mut channel = state.channel();
        channel.request(canonical_str.as_bytes()).ok()?
    };

    let mut tables = state.tables();
    // Another thread may have raced this one and already installed an
    // entry for this exact path while we were blocked on the round trip.
    if let Lookup::Positive(buf) = tables.filenames.lookup(&canonical_str) {
        return Some(tables.descriptors.insert(buf));
    }
    match response {
        ChannelResponse::NotServed => {
            tables.filenames.insert_negative(canonical_str);
            None
        }
        ChannelResponse::Body(bytes) => {
            let buffer = DataBuffer::new(bytes, Some(canonical_str.clone()));
            tables
                .filenames
                .insert_positive(canonical_str, Arc::clone(&buffer));
            Some(tables.descriptors.insert(buffer))
        }
    }
}

/// Copies up to `count` bytes from `desc`'s buffer starting at its
/// current offset into `dst`, advancing the offset, and returns the
/// number of bytes copied. An offset at or past the end of the buffer
/// (or negative, see `descriptors::VirtualDescriptor::offset`) copies
/// zero bytes without error (§4.5 `read`/`fread`).
///
/// # Safety
/// `dst` must be valid for writes of at least `count` bytes.
pub unsafe fn copy_from_offset(desc: &mut VirtualDescriptor, dst: *mut u8, count: usize) -> usize {
    let len = desc.buffer.len() as i64;
    if desc.offset < 0 || desc.offset >= len {
        return 0;
    }
    let remaining = (len - desc.offset) as usize;
    let n = count.min(remaining);
    if n > 0 {
        std::ptr::copy_nonoverlapping(desc.buffer.as_slice().as_ptr().add(desc.offset as usize), dst, n);
    }
    desc.offset += n as i64;
    n
}

/// `lseek`/`fseeko64` base-offset arithmetic (§4.5). Returns the new
/// offset on a recognized `whence`, or `None` for an invalid one.
pub fn compute_seek(desc: &VirtualDescriptor, offset: off_t, whence: c_int) -> Option<i64> {
    match whence {
        libc::SEEK_SET => Some(offset as i64),
        libc::SEEK_CUR => Some(desc.offset + offset as i64),
        libc::SEEK_END => Some(desc.buffer.len() as i64 + offset as i64),
        _ => None,
    }
}

/// Reinterprets a virtual descriptor id as a stream handle, and back
/// (§9 "Stream handle reuse of descriptor integers").
pub unsafe fn fd_to_stream(fd: c_int) -> *mut libc::FILE {
    fd as usize as *mut libc::FILE
}

pub unsafe fn stream_to_fd(stream: *mut libc::FILE) -> c_int {
    stream as usize as c_int
}

#[cfg(target_os = "linux")]
pub unsafe fn set_errno(value: c_int) {
    *libc::__errno_location() = value;
}

#[cfg(target_os = "linux")]
pub unsafe fn clear_errno() {
    set_errno(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::VirtualDescriptor;

    fn desc(bytes: &[u8], offset: i64) -> VirtualDescriptor {
        VirtualDescriptor {
            buffer: DataBuffer::new(bytes.to_vec(), None),
            offset,
            mmap_count: 0,
        }
    }

    #[test]
    fn copy_from_offset_reads_available_bytes() {
        let mut d = desc(b"0123456789", 0);
        let mut buf = [0u8; 4];
        let n = unsafe { copy_from_offset(&mut d, buf.as_mut_ptr(), 4) };
        assert_eq!(n, 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(d.offset, 4);
    }

    #[test]
    fn copy_from_offset_at_end_returns_zero() {
        let mut d = desc(b"0123456789", 10);
        let mut buf = [0u8; 1];
        let n = unsafe { copy_from_offset(&mut d, buf.as_mut_ptr(), 1) };
        assert_eq!(n, 0);
    }

    #[test]
    fn copy_from_offset_past_end_clamps_to_remaining() {
        let mut d = desc(b"0123456789", 8);
        let mut buf = [0u8; 10];
        let n = unsafe { copy_from_offset(&mut d, buf.as_mut_ptr(), 10) };
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], b"89");
    }

    #[test]
    fn copy_from_offset_negative_offset_returns_zero() {
        let mut d = desc(b"0123456789", -5);
        let mut buf = [0u8; 1];
        let n = unsafe { copy_from_offset(&mut d, buf.as_mut_ptr(), 1) };
        assert_eq!(n, 0);
    }

    #[test]
    fn seek_set_cur_end_and_invalid_whence() {
        let d = desc(b"0123456789", 4);
        assert_eq!(compute_seek(&d, 2, libc::SEEK_SET), Some(2));
        assert_eq!(compute_seek(&d, 3, libc::SEEK_CUR), Some(7));
        assert_eq!(compute_seek(&d, 0, libc::SEEK_END), Some(10));
        assert_eq!(compute_seek(&d, 0, 99), None);
    }

    #[test]
    fn seek_cur_zero_is_a_no_op_query() {
        let d = desc(b"0123456789", 4);
        assert_eq!(compute_seek(&d, 0, libc::SEEK_CUR), Some(4));
    }
}
