//! Gateway ABI types and constants
//!
//! This module defines the stable wire interface between a guest and the
//! gateway: opcode numbers, open flags, error codes and the encoding of a
//! call result into one signed machine word.

use std::ffi::CStr;
use std::fmt;

/// ABI version number, reported by `/sys/uname`
pub const ABI_VERSION: u32 = 1;

/// A descriptor as seen by the guest; 0, 1 and 2 are the standard streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fd(pub i32);

impl Fd {
    pub const STDIN: Fd = Fd(0);
    pub const STDOUT: Fd = Fd(1);
    pub const STDERR: Fd = Fd(2);

    /// Decode a descriptor word; anything outside `i32` can never name a
    /// descriptor.
    pub fn from_word(word: isize) -> Result<Fd, ErrorKind> {
        i32::try_from(word).map(Fd).map_err(|_| ErrorKind::BadDescriptor)
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd:{}", self.0)
    }
}

/// Operation codes
///
/// These numbers are part of the wire contract and must not be
/// renumbered without bumping [`ABI_VERSION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum Opcode {
    Init = 0,
    Test = 1,
    Exit = 2,
    Open = 3,
    Close = 4,
    Read = 5,
    Write = 6,
    Sleep = 7,
}

impl Opcode {
    pub const ALL: [Opcode; 8] = [
        Opcode::Init,
        Opcode::Test,
        Opcode::Exit,
        Opcode::Open,
        Opcode::Close,
        Opcode::Read,
        Opcode::Write,
        Opcode::Sleep,
    ];

    /// Highest opcode that `test` reports as supported
    pub const LAST_SUPPORTED: Opcode = Opcode::Write;

    pub fn from_u32(op: u32) -> Option<Opcode> {
        Self::ALL.get(op as usize).copied()
    }

    /// Get the opcode name (for tracing/debugging)
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Init => "init",
            Opcode::Test => "test",
            Opcode::Exit => "exit",
            Opcode::Open => "open",
            Opcode::Close => "close",
            Opcode::Read => "read",
            Opcode::Write => "write",
            Opcode::Sleep => "sleep",
        }
    }

    pub fn num(&self) -> u32 {
        *self as u32
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.num())
    }
}

/// Open flags for the `open` operation
///
/// Bits 0-1 select the access mode, the remaining defined bits are
/// modifiers. Undefined high bits are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags(pub u32);

/// Access mode encoded in the two low bits of [`OpenFlags`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl OpenFlags {
    pub const READ_ONLY: OpenFlags = OpenFlags(0);
    pub const WRITE_ONLY: OpenFlags = OpenFlags(1);
    pub const READ_WRITE: OpenFlags = OpenFlags(2);
    pub const APPEND: OpenFlags = OpenFlags(1 << 2);
    pub const CREATE: OpenFlags = OpenFlags(1 << 3);
    pub const TRUNCATE: OpenFlags = OpenFlags(1 << 4);
    pub const EXCLUSIVE: OpenFlags = OpenFlags(1 << 5);

    const ACCESS_MASK: u32 = 3;

    /// Access mode, or `None` for the undefined mode 3
    pub fn access(&self) -> Option<Access> {
        match self.0 & Self::ACCESS_MASK {
            0 => Some(Access::ReadOnly),
            1 => Some(Access::WriteOnly),
            2 => Some(Access::ReadWrite),
            _ => None,
        }
    }

    pub fn is_append(&self) -> bool {
        self.0 & Self::APPEND.0 != 0
    }

    pub fn is_create(&self) -> bool {
        self.0 & Self::CREATE.0 != 0
    }

    pub fn is_truncate(&self) -> bool {
        self.0 & Self::TRUNCATE.0 != 0
    }

    pub fn is_exclusive(&self) -> bool {
        self.0 & Self::EXCLUSIVE.0 != 0
    }
}

impl std::ops::BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

/// Error kinds returned (negated) by every operation
///
/// The discriminants are the wire codes. `None` exists for completeness
/// of the numbering and is never produced as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    /// No error
    None = 0,
    /// Invalid file descriptor
    BadDescriptor = 1,
    /// Invalid data or argument
    Invalid = 2,
    /// Invalid syscall op or syscall op data
    BadSyscallOp = 3,
    /// Malformed name
    BadName = 4,
    /// Resource not found
    NotFound = 5,
    /// Name too long
    NameTooLong = 6,
    /// Operation canceled
    Canceled = 7,
    /// Functionality not supported
    NotSupported = 8,
    /// Already exists
    AlreadyExists = 9,
    /// End of stream
    End = 10,
    /// Permission denied
    Access = 11,
}

impl ErrorKind {
    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::BadDescriptor),
            2 => Some(Self::Invalid),
            3 => Some(Self::BadSyscallOp),
            4 => Some(Self::BadName),
            5 => Some(Self::NotFound),
            6 => Some(Self::NameTooLong),
            7 => Some(Self::Canceled),
            8 => Some(Self::NotSupported),
            9 => Some(Self::AlreadyExists),
            10 => Some(Self::End),
            11 => Some(Self::Access),
            _ => None,
        }
    }

    /// Stable short name, NUL-terminated for `sys_errname`
    pub fn name_cstr(&self) -> &'static CStr {
        match self {
            Self::None => c"none",
            Self::BadDescriptor => c"badfd",
            Self::Invalid => c"invalid",
            Self::BadSyscallOp => c"sys_op",
            Self::BadName => c"bad_name",
            Self::NotFound => c"not_found",
            Self::NameTooLong => c"name_too_long",
            Self::Canceled => c"canceled",
            Self::NotSupported => c"not_supported",
            Self::AlreadyExists => c"exists",
            Self::End => c"end",
            Self::Access => c"access",
        }
    }

    /// Stable short name
    pub fn name(&self) -> &'static str {
        // every name is ASCII
        self.name_cstr().to_str().unwrap_or("?")
    }

    /// Negated wire form
    pub fn to_ret(&self) -> isize {
        -(self.code() as isize)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::None => "no error",
            Self::BadDescriptor => "bad file descriptor",
            Self::Invalid => "invalid argument",
            Self::BadSyscallOp => "bad syscall op",
            Self::BadName => "bad name",
            Self::NotFound => "not found",
            Self::NameTooLong => "name too long",
            Self::Canceled => "canceled",
            Self::NotSupported => "not supported",
            Self::AlreadyExists => "already exists",
            Self::End => "end of stream",
            Self::Access => "permission denied",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ErrorKind {}

pub type SysResult<T> = Result<T, ErrorKind>;

/// Encode a handler result into the wire word
///
/// A payload too large for `isize` cannot be represented and is reported
/// as `invalid`; `None` as an error is reported as `invalid` too so that a
/// negative result always carries a non-zero kind.
pub fn encode_result(result: SysResult<usize>) -> isize {
    match result {
        Ok(n) => isize::try_from(n).unwrap_or(ErrorKind::Invalid.to_ret()),
        Err(ErrorKind::None) => ErrorKind::Invalid.to_ret(),
        Err(e) => e.to_ret(),
    }
}

/// Interpret a wire result on the caller side
///
/// Codes outside the closed set decode as `invalid`.
pub fn check(ret: isize) -> SysResult<usize> {
    if ret >= 0 {
        return Ok(ret as usize);
    }
    let code = u32::try_from(ret.unsigned_abs()).unwrap_or(u32::MAX);
    match ErrorKind::from_code(code) {
        Some(ErrorKind::None) | None => Err(ErrorKind::Invalid),
        Some(kind) => Err(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_numbers_are_stable() {
        let nums: Vec<u32> = Opcode::ALL.iter().map(|op| op.num()).collect();
        assert_eq!(nums, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(Opcode::from_u32(3), Some(Opcode::Open));
        assert_eq!(Opcode::from_u32(8), None);
        assert_eq!(Opcode::from_u32(u32::MAX), None);
        assert_eq!(Opcode::Read.to_string(), "read(5)");
    }

    #[test]
    fn test_error_codes_are_stable() {
        for code in 0..=11 {
            let kind = ErrorKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert_eq!(ErrorKind::from_code(12), None);
        assert_eq!(ErrorKind::Access.to_ret(), -11);
        assert_eq!(ErrorKind::NotFound.name(), "not_found");
        assert_eq!(ErrorKind::BadSyscallOp.name(), "sys_op");
    }

    #[test]
    fn test_error_names_single_table() {
        let mut seen = std::collections::HashSet::new();
        for code in 0..=11 {
            let kind = ErrorKind::from_code(code).unwrap();
            assert_eq!(kind.name().as_bytes(), kind.name_cstr().to_bytes());
            assert!(seen.insert(kind.name()), "duplicate name {}", kind.name());
        }
    }

    #[test]
    fn test_open_flags_access_modes() {
        assert_eq!(OpenFlags::READ_ONLY.access(), Some(Access::ReadOnly));
        assert_eq!(OpenFlags::WRITE_ONLY.access(), Some(Access::WriteOnly));
        assert_eq!(OpenFlags::READ_WRITE.access(), Some(Access::ReadWrite));
        assert_eq!(OpenFlags(3).access(), None);

        let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE;
        assert_eq!(flags.0, 0b11001);
        assert!(flags.is_create());
        assert!(flags.is_truncate());
        assert!(!flags.is_append());
        assert!(!flags.is_exclusive());
        assert!((OpenFlags(0x100) | OpenFlags::EXCLUSIVE).is_exclusive());
    }

    #[test]
    fn test_encode_result() {
        assert_eq!(encode_result(Ok(0)), 0);
        assert_eq!(encode_result(Ok(42)), 42);
        assert_eq!(encode_result(Err(ErrorKind::NotFound)), -5);
        assert_eq!(encode_result(Err(ErrorKind::None)), -2);
        assert_eq!(encode_result(Ok(usize::MAX)), -2);
    }

    #[test]
    fn test_check() {
        assert_eq!(check(7), Ok(7));
        assert_eq!(check(-8), Err(ErrorKind::NotSupported));
        assert_eq!(check(-99), Err(ErrorKind::Invalid));
        assert_eq!(check(isize::MIN), Err(ErrorKind::Invalid));
    }

    #[test]
    fn test_fd_from_word() {
        assert_eq!(Fd::from_word(1), Ok(Fd::STDOUT));
        assert_eq!(Fd::from_word(-1), Ok(Fd(-1)));
        assert_eq!(Fd::from_word(isize::MAX), Err(ErrorKind::BadDescriptor));
    }
}
