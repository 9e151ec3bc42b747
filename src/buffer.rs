//! The data buffer pool (§4.4): reference-counted heap-owned file bodies
//! shared across every virtual descriptor and `mmap` derived from the same
//! path.
//!
//! `Arc` already implements exactly the refcounting rule the spec
//! describes — increment on acquire, decrement on release, free at zero —
//! so a buffer is simply an `Arc<DataBuffer>`; `Arc::strong_count` is the
//! refcount the testable properties in §8 talk about. The one piece the
//! spec calls out that `Arc` alone doesn't give us is the *non-owning*
//! back-reference from the buffer to the filename entry that names it
//! (§9 "Lifetime cycles"): that is modeled as a plain lookup key, a path
//! string, not a second `Arc`, so it can never keep the buffer alive by
//! itself.

use std::sync::Arc;

pub struct DataBuffer {
    bytes: Box<[u8]>,
    /// Lookup key for the filename entry that owns this buffer, if any.
    /// `None` for a buffer that was never attached to the filename cache
    /// (the §9 open question: such a buffer simply frees itself on
    /// refcount zero without touching the cache).
    filename_key: Option<String>,
}

impl DataBuffer {
    pub fn new(bytes: Vec<u8>, filename_key: Option<String>) -> Arc<DataBuffer> {
        Arc::new(DataBuffer {
            bytes: bytes.into_boxed_slice(),
            filename_key,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    pub fn filename_key(&self) -> Option<&str> {
        self.filename_key.as_deref()
    }
}

/// The buffer's refcount per §4.4: live descriptors + mmaps + the
/// filename entry's own reference.
pub fn refcount(buffer: &Arc<DataBuffer>) -> usize {
    Arc::strong_count(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_buffer_has_refcount_one_until_shared() {
        let buf = DataBuffer::new(b"0123456789".to_vec(), Some("/tmp/x".into()));
        assert_eq!(refcount(&buf), 1);
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.as_slice(), b"0123456789");
    }

    #[test]
    fn cloning_the_arc_is_acquiring_a_reference() {
        let buf = DataBuffer::new(b"hi".to_vec(), None);
        let second = Arc::clone(&buf);
        assert_eq!(refcount(&buf), 2);
        drop(second);
        assert_eq!(refcount(&buf), 1);
    }

    #[test]
    fn byte_pointer_is_stable_across_clones() {
        let buf = DataBuffer::new(b"stable".to_vec(), None);
        let ptr_before = buf.as_ptr();
        let clone = Arc::clone(&buf);
        assert_eq!(ptr_before, clone.as_ptr());
    }

    #[test]
    fn unattached_buffer_has_no_filename_key() {
        let buf = DataBuffer::new(b"x".to_vec(), None);
        assert_eq!(buf.filename_key(), None);
    }
}
