use std::io;

/// Errors internal to the shim's own bootstrap and IPC plumbing.
///
/// Never surfaced across a libc hook boundary: hooks speak only in raw
/// `c_int`/`errno` (see the hook modules under `crate::hooks`). This type
/// exists for the handful of places that have an actual `Result` to give —
/// opening the semaphore, mapping the segment, framing a round-trip.
#[derive(thiserror::Error, Debug)]
pub enum ShimError {
    #[error("failed to resolve host name: {0}")]
    HostName(#[source] io::Error),

    #[error("failed to open semaphore {name}: {source}")]
    SemaphoreOpen {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to open shared memory segment {name}: {source}")]
    SegmentOpen {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to map shared memory segment: {0}")]
    Mmap(#[source] io::Error),

    #[error("controller response exceeded channel capacity ({0} bytes)")]
    ResponseTooLarge(u32),
}

pub type Result<T> = std::result::Result<T, ShimError>;
