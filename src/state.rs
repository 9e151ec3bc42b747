//! The shim singleton (§9 "Global mutable state"): one process-wide
//! instance owning the IPC channel, the path cache, and the descriptor
//! table, behind a single mutex per the concurrency model in §5.

use crate::channel::Channel;
use crate::descriptors::FdTable;
use crate::filename_cache::FilenameCache;
use std::cell::Cell;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};

const UNINIT: u8 = 0;
const INITIALIZING: u8 = 1;
const GOOD: u8 = 2;
const FAILED: u8 = 3;

static INIT_STATE: AtomicU8 = AtomicU8::new(UNINIT);
static SHIM_STATE: std::sync::atomic::AtomicPtr<ShimState> = std::sync::atomic::AtomicPtr::new(ptr::null_mut());

/// Set once at process bootstrap from the pre-main constructor, before
/// `ShimState::get()` is ever called, by reading `PGDB_SHIM_DEBUG`
/// through `libc::getenv` directly (§10.3) — not `std::env::var`, which
/// would take the standard library's environment lock during a window
/// where that lock's own internals may not yet be safe to call into.
pub static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Tables guarded by the single shim-wide mutex (§5): the path cache and
/// the descriptor table. The IPC channel is deliberately a separate
/// mutex (below) so that the wait loop's blocking `sem_wait` never holds
/// this one.
pub struct ShimTables {
    pub filenames: FilenameCache,
    pub descriptors: FdTable,
}

pub struct ShimState {
    channel: Mutex<Channel>,
    tables: Mutex<ShimTables>,
}

impl ShimState {
    /// Returns the process-wide singleton, initializing it on first call.
    /// Returns `None` if initialization failed or is still in progress on
    /// another thread — both cases are handled identically by callers:
    /// pass through to the real libc symbol (§4.1 "good" flag).
    pub fn get() -> Option<&'static ShimState> {
        loop {
            match INIT_STATE.load(Ordering::Acquire) {
                GOOD => {
                    let p = SHIM_STATE.load(Ordering::Acquire);
                    debug_assert!(!p.is_null());
                    return Some(unsafe { &*p });
                }
                FAILED => return None,
                INITIALIZING => {
                    std::thread::yield_now();
                    continue;
                }
                _ => {
                    if INIT_STATE
                        .compare_exchange(UNINIT, INITIALIZING, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        Self::init_once();
                    }
                }
            }
        }
    }

    fn init_once() {
        match Channel::open() {
            Ok(channel) => {
                init_logging();
                let state = ShimState {
                    channel: Mutex::new(channel),
                    tables: Mutex::new(ShimTables {
                        filenames: FilenameCache::new(),
                        descriptors: FdTable::new(),
                    }),
                };
                let boxed = Box::into_raw(Box::new(state));
                SHIM_STATE.store(boxed, Ordering::Release);
                INIT_STATE.store(GOOD, Ordering::Release);
            }
            Err(err) => {
                tracing::warn!(%err, "shim initialization failed; every hook will pass through");
                INIT_STATE.store(FAILED, Ordering::Release);
            }
        }
    }

    pub fn channel(&self) -> MutexGuard<'_, Channel> {
        self.channel.lock().expect("shim channel mutex poisoned")
    }

    pub fn tables(&self) -> MutexGuard<'_, ShimTables> {
        self.tables.lock().expect("shim tables mutex poisoned")
    }

    /// Runs process teardown (§4.1): reclaims the singleton so no further
    /// hook observes it as good, then unmaps/unlinks the channel.
    /// Called exactly once, from the destructor installed in `lib.rs`.
    pub fn shutdown() {
        let prior = INIT_STATE.swap(FAILED, Ordering::SeqCst);
        if prior != GOOD {
            return;
        }
        let p = SHIM_STATE.swap(ptr::null_mut(), Ordering::AcqRel);
        if p.is_null() {
            return;
        }
        let state = unsafe { Box::from_raw(p) };
        let channel = state
            .channel
            .into_inner()
            .expect("shim channel mutex poisoned");
        channel.close();
    }
}

fn init_logging() {
    if DEBUG_ENABLED.load(Ordering::Relaxed) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Reads `PGDB_SHIM_DEBUG` via the raw libc entry point — safe to call
/// from the pre-main constructor, before it would be sound to touch
/// `std::env`.
pub fn check_debug_env() {
    let val = unsafe { libc::getenv(c"PGDB_SHIM_DEBUG".as_ptr()) };
    DEBUG_ENABLED.store(!val.is_null(), Ordering::Relaxed);
}

thread_local! {
    static IN_SHIM: Cell<bool> = const { Cell::new(false) };
}

/// RAII recursion guard (§5 "Recursion"): every hook enters one before
/// touching shim state; a thread already inside the shim gets `None` and
/// must fall straight through to the real libc symbol.
pub struct ShimGuard(());

impl ShimGuard {
    pub fn enter() -> Option<ShimGuard> {
        let already_in = IN_SHIM.with(|f| f.replace(true));
        if already_in {
            return None;
        }
        Some(ShimGuard(()))
    }
}

impl Drop for ShimGuard {
    fn drop(&mut self) {
        IN_SHIM.with(|f| f.set(false));
    }
}
