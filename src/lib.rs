//! # pgdb-shim
//!
//! `LD_PRELOAD` shim that serves a small set of intercepted file paths
//! out of a shared-memory image pushed by an out-of-process controller,
//! falling back to the real libc entry points for everything else.

#![allow(clippy::missing_safety_doc)]

mod buffer;
mod channel;
mod core;
mod descriptors;
mod error;
mod filename_cache;
mod hooks;
mod macros;
mod path;
mod reals;
mod state;

/// Pre-main constructor (§4.1, §10.1): reads `PGDB_SHIM_DEBUG` before any
/// hook can run. The shim's own IPC channel is opened lazily, on first
/// hook call, not here — so a process that never touches an intercepted
/// path pays no shared-memory or semaphore setup cost at all.
#[used]
#[cfg_attr(target_os = "linux", link_section = ".init_array")]
static INIT: unsafe extern "C" fn() = {
    unsafe extern "C" fn init() {
        state::check_debug_env();
    }
    init
};

/// Destructor (§4.1): tears the shim down if it was ever brought up,
/// unmapping the shared-memory segment and unlinking the semaphore
/// before the process exits.
#[used]
#[cfg_attr(target_os = "linux", link_section = ".fini_array")]
static FINI: unsafe extern "C" fn() = {
    unsafe extern "C" fn fini() {
        state::ShimState::shutdown();
    }
    fini
};

// Every `#[no_mangle]` hook function lives under `hooks`; the dynamic
// linker resolves them by symbol name regardless of module path, which
// is exactly what `LD_PRELOAD` needs — no re-export required here.
