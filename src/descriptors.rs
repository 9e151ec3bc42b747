//! The descriptor table (§4.5, §3): open virtual descriptors, each with
//! its own seek offset and a reference into the buffer pool.

use crate::buffer::DataBuffer;
use libc::c_int;
use std::collections::HashMap;
use std::sync::Arc;

/// Virtual descriptor ids are drawn from this floor upward, monotonically,
/// never reused within a process lifetime (§3).
pub const FIRST_VIRTUAL_FD: c_int = 65535;

pub struct VirtualDescriptor {
    pub buffer: Arc<DataBuffer>,
    /// Signed so that `lseek`'s "seeking before zero is not constrained"
    /// (§4.5) can be represented directly rather than clamped; reads at a
    /// negative offset simply produce zero bytes, the same as reads past
    /// the end of the buffer.
    pub offset: i64,
    /// Number of references this descriptor has additionally acquired on
    /// behalf of an active `mmap` of it (see the `mmap`/`munmap` hooks
    /// and the DESIGN.md note on mmap refcounting). Closing the
    /// descriptor via `close`/`fclose` releases only the descriptor's
    /// own base reference; `munmap` is what reclaims these.
    pub mmap_count: u32,
}

#[derive(Default)]
pub struct FdTable {
    entries: HashMap<c_int, VirtualDescriptor>,
    next_fd: c_int,
}

impl FdTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_fd: FIRST_VIRTUAL_FD,
        }
    }

    /// Installs a new virtual descriptor bound to `buffer` at offset 0
    /// and returns its freshly-minted id.
    pub fn insert(&mut self, buffer: Arc<DataBuffer>) -> c_int {
        let fd = self.next_fd;
        self.next_fd += 1;
        self.entries.insert(
            fd,
            VirtualDescriptor {
                buffer,
                offset: 0i64,
                mmap_count: 0,
            },
        );
        fd
    }

    pub fn get(&self, fd: c_int) -> Option<&VirtualDescriptor> {
        self.entries.get(&fd)
    }

    pub fn get_mut(&mut self, fd: c_int) -> Option<&mut VirtualDescriptor> {
        self.entries.get_mut(&fd)
    }

    pub fn contains(&self, fd: c_int) -> bool {
        self.entries.contains_key(&fd)
    }

    /// Removes and returns the descriptor, releasing its base buffer
    /// reference as part of the caller dropping the returned value.
    pub fn remove(&mut self, fd: c_int) -> Option<VirtualDescriptor> {
        self.entries.remove(&fd)
    }

    /// Finds the (fd, descriptor) pair whose buffer's byte address
    /// matches `addr` — the search `munmap` performs (§4.5).
    pub fn find_by_buffer_addr(&self, addr: *const u8) -> Option<c_int> {
        self.entries
            .iter()
            .find(|(_, d)| d.buffer.as_ptr() == addr)
            .map(|(fd, _)| *fd)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::DataBuffer;

    #[test]
    fn ids_start_at_the_floor_and_increase_monotonically() {
        let mut table = FdTable::new();
        let buf = DataBuffer::new(b"a".to_vec(), None);
        let d1 = table.insert(Arc::clone(&buf));
        let d2 = table.insert(Arc::clone(&buf));
        assert_eq!(d1, FIRST_VIRTUAL_FD);
        assert!(d2 > d1);
        assert_ne!(d1, d2);
    }

    #[test]
    fn closed_descriptor_is_no_longer_observable() {
        let mut table = FdTable::new();
        let buf = DataBuffer::new(b"a".to_vec(), None);
        let fd = table.insert(buf);
        assert!(table.contains(fd));
        table.remove(fd);
        assert!(!table.contains(fd));
    }

    #[test]
    fn find_by_buffer_addr_locates_the_owning_descriptor() {
        let mut table = FdTable::new();
        let buf = DataBuffer::new(b"0123456789".to_vec(), None);
        let fd = table.insert(Arc::clone(&buf));
        let addr = buf.as_ptr();
        assert_eq!(table.find_by_buffer_addr(addr), Some(fd));
        assert_eq!(table.find_by_buffer_addr(std::ptr::null()), None);
    }
}
