//! Host error translation
//!
//! Every host failure crosses the boundary as exactly one [`ErrorKind`].
//! The mapping is total: codes without a dedicated entry become
//! `invalid`, so a raw errno never reaches the guest.

use crate::abi::ErrorKind;
use nix::errno::Errno;
use std::io;

/// Translate a host errno into an error kind
pub fn from_errno(e: Errno) -> ErrorKind {
    match e {
        Errno::EBADF => ErrorKind::BadDescriptor,
        Errno::EINVAL | Errno::EFAULT | Errno::EISDIR => ErrorKind::Invalid,
        Errno::ENOENT | Errno::ENOTDIR => ErrorKind::NotFound,
        Errno::EILSEQ => ErrorKind::BadName,
        Errno::ENAMETOOLONG | Errno::ELOOP => ErrorKind::NameTooLong,
        Errno::EINTR | Errno::ECANCELED => ErrorKind::Canceled,
        Errno::ENOSYS | Errno::EOPNOTSUPP | Errno::ESPIPE | Errno::ENXIO | Errno::ENODEV => {
            ErrorKind::NotSupported
        }
        Errno::EEXIST => ErrorKind::AlreadyExists,
        Errno::EPIPE => ErrorKind::End,
        Errno::EACCES | Errno::EPERM | Errno::EROFS | Errno::ETXTBSY => ErrorKind::Access,
        _ => ErrorKind::Invalid,
    }
}

/// Translate a raw errno value, including values the host never defines
pub fn from_raw(code: i32) -> ErrorKind {
    from_errno(Errno::from_i32(code))
}

/// Translate a `std::io::Error`
///
/// Errors carrying an OS code go through the errno table; synthetic
/// errors are classified by their kind.
pub fn from_io(e: &io::Error) -> ErrorKind {
    if let Some(code) = e.raw_os_error() {
        return from_raw(code);
    }
    match e.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::Access,
        io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
        io::ErrorKind::Interrupted => ErrorKind::Canceled,
        io::ErrorKind::Unsupported => ErrorKind::NotSupported,
        io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => ErrorKind::End,
        _ => ErrorKind::Invalid,
    }
}
