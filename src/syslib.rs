//! Caller-side helpers
//!
//! Safe, typed wrappers that issue calls through [`sys_syscall`] the way a
//! guest would, and turn the wire word back into a `Result`.

use crate::abi::{self, ErrorKind, Fd, OpenFlags, Opcode, SysResult};
use crate::host;
use crate::sys_syscall;
use std::ffi::{CStr, c_void};
use std::time::Duration;

/// Completion callback signature a guest registers with `init`
pub type Callback = extern "C" fn(result: isize, userdata: *mut c_void);

fn syscall(op: Opcode, a1: isize, a2: isize, a3: isize) -> isize {
    // SAFETY: every pointer word passed here is derived from a live Rust
    // reference that outlives the call.
    unsafe { sys_syscall(op.num(), a1, a2, a3, 0, 0) }
}

fn fd(ret: isize) -> SysResult<Fd> {
    let n = abi::check(ret)?;
    i32::try_from(n).map(Fd).map_err(|_| ErrorKind::Invalid)
}

pub fn init(callback: Option<Callback>, userdata: *mut c_void) -> SysResult<()> {
    let callback = callback.map_or(0, |f| f as usize);
    abi::check(syscall(Opcode::Init, callback as isize, userdata as isize, 0)).map(|_| ())
}

/// Ask whether an opcode is supported
pub fn test(op: u32) -> SysResult<()> {
    abi::check(syscall(Opcode::Test, op as isize, 0, 0)).map(|_| ())
}

pub fn exit(status: i32) -> ! {
    syscall(Opcode::Exit, status as isize, 0, 0);
    // Only reached if the gateway could not take the call
    host::exit(status)
}

pub fn open(path: &CStr, flags: OpenFlags, mode: u32) -> SysResult<Fd> {
    fd(syscall(
        Opcode::Open,
        path.as_ptr() as isize,
        flags.0 as isize,
        mode as isize,
    ))
}

/// Create or truncate a file for writing
pub fn create(path: &CStr, mode: u32) -> SysResult<Fd> {
    open(
        path,
        OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE,
        mode,
    )
}

pub fn close(fd: Fd) -> SysResult<()> {
    abi::check(syscall(Opcode::Close, fd.0 as isize, 0, 0)).map(|_| ())
}

pub fn read(fd: Fd, buf: &mut [u8]) -> SysResult<usize> {
    abi::check(syscall(
        Opcode::Read,
        fd.0 as isize,
        buf.as_mut_ptr() as isize,
        buf.len() as isize,
    ))
}

pub fn write(fd: Fd, buf: &[u8]) -> SysResult<usize> {
    abi::check(syscall(
        Opcode::Write,
        fd.0 as isize,
        buf.as_ptr() as isize,
        buf.len() as isize,
    ))
}

/// Write the whole buffer, retrying short writes
pub fn write_all(fd: Fd, mut buf: &[u8]) -> SysResult<()> {
    while !buf.is_empty() {
        match write(fd, buf)? {
            0 => return Err(ErrorKind::End),
            n => buf = &buf[n..],
        }
    }
    Ok(())
}

pub fn sleep(duration: Duration) -> SysResult<()> {
    let seconds = isize::try_from(duration.as_secs()).map_err(|_| ErrorKind::Invalid)?;
    let nanoseconds = duration.subsec_nanos() as isize;
    abi::check(syscall(Opcode::Sleep, seconds, nanoseconds, 0)).map(|_| ())
}

pub fn errname(kind: ErrorKind) -> &'static str {
    kind.name()
}
