//! Host operation handlers
//!
//! Thin wrappers around the host primitives. Each one reports failure as
//! an [`ErrorKind`] via the errno table and never retries.

use crate::abi::{Access, ErrorKind, Fd, OpenFlags, SysResult};
use crate::errno;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::libc;
use nix::sys::stat::Mode;
use std::time::Duration;

/// Translate guest open flags into host flags
pub fn oflags(flags: OpenFlags) -> SysResult<OFlag> {
    let mut oflag = match flags.access().ok_or(ErrorKind::Invalid)? {
        Access::ReadOnly => OFlag::O_RDONLY,
        Access::WriteOnly => OFlag::O_WRONLY,
        Access::ReadWrite => OFlag::O_RDWR,
    };
    if flags.is_append() {
        oflag |= OFlag::O_APPEND;
    }
    if flags.is_create() {
        oflag |= OFlag::O_CREAT;
    }
    if flags.is_truncate() {
        oflag |= OFlag::O_TRUNC;
    }
    if flags.is_exclusive() {
        oflag |= OFlag::O_EXCL;
    }
    Ok(oflag)
}

/// Open or create a host file
pub fn open(path: &[u8], flags: OpenFlags, mode: u32) -> SysResult<Fd> {
    let oflag = oflags(flags)?;
    let mode = Mode::from_bits_truncate(mode as libc::mode_t);
    nix::fcntl::open(path, oflag, mode)
        .map(Fd)
        .map_err(errno::from_errno)
}

pub fn close(fd: Fd) -> SysResult<()> {
    nix::unistd::close(fd.0).map_err(errno::from_errno)
}

/// Read up to `buf.len()` bytes; 0 means end of stream
pub fn read(fd: Fd, buf: &mut [u8]) -> SysResult<usize> {
    nix::unistd::read(fd.0, buf).map_err(errno::from_errno)
}

pub fn write(fd: Fd, buf: &[u8]) -> SysResult<usize> {
    nix::unistd::write(fd.0, buf).map_err(errno::from_errno)
}

/// Why a sleep ended early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepError {
    /// A signal arrived before the duration elapsed
    Interrupted { remaining: Duration },
    /// The host rejected the request
    Failed(ErrorKind),
}

impl From<SleepError> for ErrorKind {
    fn from(e: SleepError) -> Self {
        match e {
            SleepError::Interrupted { .. } => ErrorKind::Canceled,
            SleepError::Failed(kind) => kind,
        }
    }
}

/// Block the calling thread for the given time
///
/// Out-of-range nanoseconds are passed through for the host to reject.
pub fn sleep(seconds: u64, nanoseconds: u64) -> Result<(), SleepError> {
    let invalid = |_| SleepError::Failed(ErrorKind::Invalid);
    let tv_sec = libc::time_t::try_from(seconds).map_err(invalid)?;
    let tv_nsec = libc::c_long::try_from(nanoseconds).map_err(invalid)?;
    let req = libc::timespec { tv_sec, tv_nsec };
    let mut rem = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    // SAFETY: both pointers refer to live, initialised timespecs.
    let r = unsafe { libc::nanosleep(&req, &mut rem) };
    if r == 0 {
        return Ok(());
    }
    match Errno::last() {
        Errno::EINTR => Err(SleepError::Interrupted {
            remaining: Duration::new(
                rem.tv_sec.max(0) as u64,
                rem.tv_nsec.clamp(0, 999_999_999) as u32,
            ),
        }),
        e => Err(SleepError::Failed(errno::from_errno(e))),
    }
}

/// Terminate the process immediately
pub fn exit(status: i32) -> ! {
    log::logger().flush();
    std::process::exit(status)
}
