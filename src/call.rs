//! Typed calls
//!
//! The wire form is an opcode plus five words whose meaning depends on the
//! opcode. [`Syscall`] gives each opcode its own variant with named,
//! typed fields; conversion happens only here, at the boundary.

use crate::abi::{ErrorKind, Fd, OpenFlags, Opcode, SysResult};

/// Five argument words, as passed by the guest
pub type Args = [isize; 5];

/// A decoded call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    /// Register a completion callback
    Init { callback: usize, userdata: usize },
    /// Ask whether an opcode is supported; the whole word is kept
    Test { op: usize },
    /// Terminate the process
    Exit { status: i32 },
    /// Open or create a file; `path` points to a NUL-terminated string
    Open {
        path: usize,
        flags: OpenFlags,
        mode: u32,
    },
    Close { fd: Fd },
    Read { fd: Fd, buf: usize, len: usize },
    Write { fd: Fd, buf: usize, len: usize },
    Sleep { seconds: u64, nanoseconds: u64 },
}

fn length(word: isize) -> SysResult<usize> {
    usize::try_from(word).map_err(|_| ErrorKind::Invalid)
}

fn flags(word: isize) -> SysResult<OpenFlags> {
    let flags = OpenFlags(word as u32);
    // access mode 3 is undefined
    flags.access().ok_or(ErrorKind::Invalid)?;
    Ok(flags)
}

impl Syscall {
    /// Decode a wire call
    ///
    /// Unknown opcodes fail with `bad syscall op`. Argument words that can
    /// never be valid for the opcode fail before any host interaction.
    pub fn decode(op: u32, args: Args) -> SysResult<Syscall> {
        let opcode = Opcode::from_u32(op).ok_or(ErrorKind::BadSyscallOp)?;
        let [a1, a2, a3, _, _] = args;
        let call = match opcode {
            Opcode::Init => Syscall::Init {
                callback: a1 as usize,
                userdata: a2 as usize,
            },
            // Negative words wrap, landing above every real opcode
            Opcode::Test => Syscall::Test { op: a1 as usize },
            Opcode::Exit => Syscall::Exit { status: a1 as i32 },
            Opcode::Open => Syscall::Open {
                path: a1 as usize,
                flags: flags(a2)?,
                mode: a3 as u32,
            },
            Opcode::Close => Syscall::Close {
                fd: Fd::from_word(a1)?,
            },
            Opcode::Read => Syscall::Read {
                fd: Fd::from_word(a1)?,
                buf: a2 as usize,
                len: length(a3)?,
            },
            Opcode::Write => Syscall::Write {
                fd: Fd::from_word(a1)?,
                buf: a2 as usize,
                len: length(a3)?,
            },
            Opcode::Sleep => Syscall::Sleep {
                seconds: length(a1)? as u64,
                nanoseconds: length(a2)? as u64,
            },
        };
        Ok(call)
    }

    /// Flatten back into the wire form; unused words are 0
    pub fn encode(&self) -> (u32, Args) {
        let (op, args) = match *self {
            Syscall::Init { callback, userdata } => {
                (Opcode::Init, [callback as isize, userdata as isize, 0, 0, 0])
            }
            Syscall::Test { op } => (Opcode::Test, [op as isize, 0, 0, 0, 0]),
            Syscall::Exit { status } => (Opcode::Exit, [status as isize, 0, 0, 0, 0]),
            Syscall::Open { path, flags, mode } => (
                Opcode::Open,
                [path as isize, flags.0 as isize, mode as isize, 0, 0],
            ),
            Syscall::Close { fd } => (Opcode::Close, [fd.0 as isize, 0, 0, 0, 0]),
            Syscall::Read { fd, buf, len } => (
                Opcode::Read,
                [fd.0 as isize, buf as isize, len as isize, 0, 0],
            ),
            Syscall::Write { fd, buf, len } => (
                Opcode::Write,
                [fd.0 as isize, buf as isize, len as isize, 0, 0],
            ),
            Syscall::Sleep {
                seconds,
                nanoseconds,
            } => (
                Opcode::Sleep,
                [seconds as isize, nanoseconds as isize, 0, 0, 0],
            ),
        };
        (op.num(), args)
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Syscall::Init { .. } => Opcode::Init,
            Syscall::Test { .. } => Opcode::Test,
            Syscall::Exit { .. } => Opcode::Exit,
            Syscall::Open { .. } => Opcode::Open,
            Syscall::Close { .. } => Opcode::Close,
            Syscall::Read { .. } => Opcode::Read,
            Syscall::Write { .. } => Opcode::Write,
            Syscall::Sleep { .. } => Opcode::Sleep,
        }
    }
}
