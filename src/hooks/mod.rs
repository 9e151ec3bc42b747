//! The 24 intercepted libc entry points (§6). Every `#[no_mangle] extern
//! "C"` function here is resolved ahead of the real symbol via
//! `LD_PRELOAD` (§9 "Interposition mechanism"): the dynamic linker binds
//! callers to these definitions first, and each one falls through to the
//! real libc implementation — resolved lazily through `crate::reals` —
//! whenever the call isn't ours to serve.

pub mod close;
pub mod fcntl;
pub mod io;
pub mod mmap;
pub mod open;
pub mod seek;
pub mod stat;
pub mod status;
