//! The single-slot shared-memory IPC channel (§4.2, §6).
//!
//! Layout of the mapped segment, little-endian, packed:
//!
//! | offset | size | field                  |
//! |--------|------|------------------------|
//! | 0      | 1    | controller-has-written |
//! | 1      | 1    | shim-has-written       |
//! | 2      | 4    | length                 |
//! | 6      | N    | data                   |
//!
//! Total segment size is fixed at 32 MiB. Names are `"/PGDBSemaphore" +
//! hostname` and `"/PGDBMem" + hostname`; both are expected to already
//! exist (the controller creates them) — the shim only ever opens, never
//! creates.

use crate::error::{Result, ShimError};
use memmap2::MmapMut;
use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::unix::io::FromRawFd;
use std::thread;
use std::time::Duration;

pub const SHM_TOTAL_SIZE: usize = 32 * 1024 * 1024;
const HEADER_SIZE: usize = 6;
pub const SHM_DATA_SIZE: usize = SHM_TOTAL_SIZE - HEADER_SIZE;

const CONTROLLER_WRITTEN_OFFSET: usize = 0;
const SHIM_WRITTEN_OFFSET: usize = 1;
const LENGTH_OFFSET: usize = 2;
const DATA_OFFSET: usize = HEADER_SIZE;

const SEMAPHORE_PREFIX: &str = "/PGDBSemaphore";
const SEGMENT_PREFIX: &str = "/PGDBMem";
const ERROR_SENTINEL: &[u8] = b"error";

/// How long to sleep between failed polls of the wait loop (§4.2 "Yield
/// strategy" — the original leaves this unspecified; a millisecond-scale
/// sleep avoids busy-spinning a core without materially delaying a
/// responsive controller).
const POLL_INTERVAL: Duration = Duration::from_millis(1);

pub enum ChannelResponse {
    /// Controller answered with the literal `error` sentinel.
    NotServed,
    /// Controller answered with a file body.
    Body(Vec<u8>),
}

/// The mapped shared-memory segment plus the semaphore guarding it.
pub struct Channel {
    mem: MmapMut,
    sem: *mut libc::sem_t,
    sem_name: CString,
    seg_name: CString,
    _file: File,
}

// SAFETY: access to `mem` and `sem` is always serialized by the named
// semaphore (acquire/release below); the raw sem_t pointer is never
// dereferenced without having successfully sem_wait'd it first.
unsafe impl Send for Channel {}
unsafe impl Sync for Channel {}

fn hostname() -> Result<String> {
    let mut buf = vec![0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return Err(ShimError::HostName(io::Error::last_os_error()));
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    buf.truncate(len);
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

impl Channel {
    /// Opens the existing (controller-created) semaphore and segment for
    /// this host and maps the segment for the lifetime of the process
    /// (§4.1). Never creates either object.
    pub fn open() -> Result<Channel> {
        let host = hostname()?;
        let sem_name = CString::new(format!("{SEMAPHORE_PREFIX}{host}")).expect("no NUL in name");
        let seg_name = CString::new(format!("{SEGMENT_PREFIX}{host}")).expect("no NUL in name");

        let sem = unsafe { libc::sem_open(sem_name.as_ptr(), 0) };
        if sem == libc::SEM_FAILED {
            return Err(ShimError::SemaphoreOpen {
                name: sem_name.to_string_lossy().into_owned(),
                source: io::Error::last_os_error(),
            });
        }

        let fd = unsafe { libc::shm_open(seg_name.as_ptr(), libc::O_RDWR, 0o600) };
        if fd < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::sem_close(sem) };
            return Err(ShimError::SegmentOpen {
                name: seg_name.to_string_lossy().into_owned(),
                source: err,
            });
        }

        // SAFETY: fd is a freshly-opened, valid shm descriptor we own exclusively.
        let file = unsafe { File::from_raw_fd(fd) };
        let mem = unsafe { MmapMut::map_mut(&file) };
        let mem = match mem {
            Ok(m) => m,
            Err(e) => {
                unsafe { libc::sem_close(sem) };
                return Err(ShimError::Mmap(e));
            }
        };

        Ok(Channel {
            mem,
            sem,
            sem_name,
            seg_name,
            _file: file,
        })
    }

    /// Reverses `open`: unmaps, unlinks the segment, unlinks the
    /// semaphore, closes the semaphore handle. Errors are logged by the
    /// caller and otherwise ignored (§4.1).
    pub fn close(self) {
        let Channel {
            mem,
            sem,
            sem_name,
            seg_name,
            _file,
        } = self;
        drop(mem);
        unsafe {
            if libc::shm_unlink(seg_name.as_ptr()) != 0 {
                tracing::warn!(error = %io::Error::last_os_error(), "shm_unlink failed");
            }
        }
        drop(_file);
        unsafe {
            if libc::sem_unlink(sem_name.as_ptr()) != 0 {
                tracing::warn!(error = %io::Error::last_os_error(), "sem_unlink failed");
            }
            if libc::sem_close(sem) != 0 {
                tracing::warn!(error = %io::Error::last_os_error(), "sem_close failed");
            }
        }
    }

    fn acquire(&self) {
        loop {
            let rc = unsafe { libc::sem_wait(self.sem) };
            if rc == 0 {
                return;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                tracing::warn!(%err, "sem_wait failed, retrying");
            }
        }
    }

    fn release(&self) {
        unsafe {
            if libc::sem_post(self.sem) != 0 {
                tracing::warn!(error = %io::Error::last_os_error(), "sem_post failed");
            }
        }
    }

    unsafe fn byte_at(&self, offset: usize) -> u8 {
        *self.mem.as_ptr().add(offset)
    }

    unsafe fn set_byte_at(&mut self, offset: usize, value: u8) {
        *self.mem.as_mut_ptr().add(offset) = value;
    }

    unsafe fn write_length(&mut self, len: u32) {
        let ptr = self.mem.as_mut_ptr().add(LENGTH_OFFSET) as *mut u32;
        std::ptr::write_unaligned(ptr, len.to_le());
    }

    unsafe fn read_length(&self) -> u32 {
        let ptr = self.mem.as_ptr().add(LENGTH_OFFSET) as *const u32;
        u32::from_le(std::ptr::read_unaligned(ptr))
    }

    /// Performs one full request/response round-trip (§4.2): acquire,
    /// write, signal, release; poll until the controller answers; copy
    /// the response into an owned buffer; clear the flag; release.
    pub fn request(&mut self, canonical_path: &[u8]) -> Result<ChannelResponse> {
        if canonical_path.len() > SHM_DATA_SIZE {
            return Err(ShimError::ResponseTooLarge(canonical_path.len() as u32));
        }

        self.acquire();
        unsafe {
            let data = self.mem.as_mut_ptr().add(DATA_OFFSET);
            std::ptr::copy_nonoverlapping(canonical_path.as_ptr(), data, canonical_path.len());
            self.write_length(canonical_path.len() as u32);
            self.set_byte_at(SHIM_WRITTEN_OFFSET, 1);
        }
        self.release();

        // Wait loop: keep the semaphore held once the controller's
        // answer is observed (§4.2 step 3).
        loop {
            self.acquire();
            if unsafe { self.byte_at(CONTROLLER_WRITTEN_OFFSET) } == 1 {
                break;
            }
            self.release();
            thread::sleep(POLL_INTERVAL);
        }

        let len = unsafe { self.read_length() } as usize;
        let len = len.min(SHM_DATA_SIZE);
        let mut body = vec![0u8; len];
        unsafe {
            let data = self.mem.as_ptr().add(DATA_OFFSET);
            std::ptr::copy_nonoverlapping(data, body.as_mut_ptr(), len);
            self.set_byte_at(CONTROLLER_WRITTEN_OFFSET, 0);
        }
        self.release();

        if body.as_slice() == ERROR_SENTINEL {
            Ok(ChannelResponse::NotServed)
        } else {
            Ok(ChannelResponse::Body(body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Exercises the wire-level encode/decode rules (§6) without any real
    /// shared memory: a plain byte buffer stands in for the mapped
    /// segment, laid out exactly as the real channel would be.
    fn classify(body: &[u8]) -> ChannelResponse {
        if body == ERROR_SENTINEL {
            ChannelResponse::NotServed
        } else {
            ChannelResponse::Body(body.to_vec())
        }
    }

    #[test]
    fn error_sentinel_is_recognized_as_not_served() {
        assert!(matches!(classify(b"error"), ChannelResponse::NotServed));
    }

    #[test]
    fn any_other_payload_is_a_body() {
        match classify(b"0123456789") {
            ChannelResponse::Body(b) => assert_eq!(b, b"0123456789"),
            ChannelResponse::NotServed => panic!("expected a body"),
        }
    }

    #[test]
    fn five_byte_body_that_is_not_error_is_still_a_body() {
        match classify(b"helloworld"[..5].as_ref()) {
            ChannelResponse::Body(b) => assert_eq!(b, b"hello"),
            ChannelResponse::NotServed => panic!("five bytes that aren't `error` is a body"),
        }
    }

    #[test]
    fn header_layout_constants_match_the_wire_format() {
        assert_eq!(CONTROLLER_WRITTEN_OFFSET, 0);
        assert_eq!(SHIM_WRITTEN_OFFSET, 1);
        assert_eq!(LENGTH_OFFSET, 2);
        assert_eq!(DATA_OFFSET, 6);
        assert_eq!(SHM_TOTAL_SIZE, 32 * 1024 * 1024);
        assert_eq!(SHM_DATA_SIZE, SHM_TOTAL_SIZE - 6);
    }

    /// Everything below exercises the full acquire/write/wait/read cycle
    /// (§4.2, §10.4) against an in-process fake controller rather than a
    /// real external process: a second thread creates the semaphore and
    /// segment (the real controller's job), then answers exactly one
    /// request per call using the same wire layout `Channel` itself uses.
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    fn unique_names() -> (CString, CString) {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, AtomicOrdering::SeqCst);
        let pid = std::process::id();
        (
            CString::new(format!("/pgdb_shim_test_sem_{pid}_{n}")).unwrap(),
            CString::new(format!("/pgdb_shim_test_seg_{pid}_{n}")).unwrap(),
        )
    }

    /// Creates the semaphore and segment (the controller's role — the real
    /// shim only ever opens these, never creates them) and wires up a
    /// `Channel` exactly as `Channel::open` would for a real hostname pair.
    fn controller_creates_and_shim_opens(sem_name: &CString, seg_name: &CString) -> Channel {
        let sem = unsafe { libc::sem_open(sem_name.as_ptr(), libc::O_CREAT, 0o600, 1) };
        assert_ne!(sem, libc::SEM_FAILED, "fake controller sem_open failed");
        unsafe { libc::sem_close(sem) };

        let fd = unsafe { libc::shm_open(seg_name.as_ptr(), libc::O_CREAT | libc::O_RDWR, 0o600) };
        assert!(fd >= 0, "fake controller shm_open failed");
        assert_eq!(
            unsafe { libc::ftruncate(fd, SHM_TOTAL_SIZE as libc::off_t) },
            0,
            "ftruncate to segment size failed"
        );
        unsafe { libc::close(fd) };

        let shim_sem = unsafe { libc::sem_open(sem_name.as_ptr(), 0) };
        assert_ne!(shim_sem, libc::SEM_FAILED, "shim-side sem_open failed");
        let shim_fd = unsafe { libc::shm_open(seg_name.as_ptr(), libc::O_RDWR, 0o600) };
        assert!(shim_fd >= 0, "shim-side shm_open failed");
        let shim_file = unsafe { File::from_raw_fd(shim_fd) };
        let shim_mem = unsafe { MmapMut::map_mut(&shim_file) }.expect("map shim segment");

        Channel {
            mem: shim_mem,
            sem: shim_sem,
            sem_name: sem_name.clone(),
            seg_name: seg_name.clone(),
            _file: shim_file,
        }
    }

    /// Answers exactly one request, the way a real controller answers one
    /// round trip: wait for `shim-has-written`, read the payload, write
    /// back whatever `responder` computes, flip the handshake bits.
    fn spawn_fake_controller_answer(
        sem_name: CString,
        seg_name: CString,
        responder: impl Fn(&[u8]) -> Vec<u8> + Send + 'static,
    ) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            let sem = unsafe { libc::sem_open(sem_name.as_ptr(), 0) };
            assert_ne!(sem, libc::SEM_FAILED);
            let fd = unsafe { libc::shm_open(seg_name.as_ptr(), libc::O_RDWR, 0o600) };
            assert!(fd >= 0);
            let file = unsafe { File::from_raw_fd(fd) };
            let mut mem = unsafe { MmapMut::map_mut(&file) }.expect("map controller segment");

            loop {
                unsafe { libc::sem_wait(sem) };
                let shim_wrote = unsafe { *mem.as_ptr().add(SHIM_WRITTEN_OFFSET) } == 1;
                if !shim_wrote {
                    unsafe { libc::sem_post(sem) };
                    thread::sleep(POLL_INTERVAL);
                    continue;
                }
                let len = unsafe {
                    u32::from_le(std::ptr::read_unaligned(
                        mem.as_ptr().add(LENGTH_OFFSET) as *const u32
                    ))
                } as usize;
                let mut request = vec![0u8; len];
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        mem.as_ptr().add(DATA_OFFSET),
                        request.as_mut_ptr(),
                        len,
                    );
                }
                let response = responder(&request);
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        response.as_ptr(),
                        mem.as_mut_ptr().add(DATA_OFFSET),
                        response.len(),
                    );
                    std::ptr::write_unaligned(
                        mem.as_mut_ptr().add(LENGTH_OFFSET) as *mut u32,
                        (response.len() as u32).to_le(),
                    );
                    *mem.as_mut_ptr().add(SHIM_WRITTEN_OFFSET) = 0;
                    *mem.as_mut_ptr().add(CONTROLLER_WRITTEN_OFFSET) = 1;
                }
                unsafe { libc::sem_post(sem) };
                break;
            }
            unsafe { libc::sem_close(sem) };
        })
    }

    #[test]
    fn round_trip_returns_the_controllers_body_for_a_served_path() {
        let (sem_name, seg_name) = unique_names();
        let mut channel = controller_creates_and_shim_opens(&sem_name, &seg_name);

        let answer = spawn_fake_controller_answer(sem_name, seg_name, |req| {
            assert_eq!(req, b"/tmp/x");
            b"0123456789".to_vec()
        });

        match channel.request(b"/tmp/x").expect("round trip succeeds") {
            ChannelResponse::Body(b) => assert_eq!(b, b"0123456789"),
            ChannelResponse::NotServed => panic!("expected a body"),
        }
        answer.join().expect("controller thread did not panic");
        channel.close();
    }

    #[test]
    fn round_trip_reports_not_served_for_the_error_sentinel() {
        let (sem_name, seg_name) = unique_names();
        let mut channel = controller_creates_and_shim_opens(&sem_name, &seg_name);

        let answer =
            spawn_fake_controller_answer(sem_name, seg_name, |_req| ERROR_SENTINEL.to_vec());

        match channel.request(b"/tmp/y").expect("round trip succeeds") {
            ChannelResponse::NotServed => {}
            ChannelResponse::Body(_) => panic!("expected not-served"),
        }
        answer.join().expect("controller thread did not panic");
        channel.close();
    }
}
