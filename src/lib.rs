//! sysgate - a minimal syscall gateway for sandboxed guests
//!
//! A guest issues one fixed-arity call, an opcode plus five machine words,
//! and gets back one signed word. Non-negative results are payloads,
//! negative results are `-(ErrorKind)`.
//!
//! Layers, leaves first:
//! - `abi`: wire types (opcodes, open flags, error kinds, result encoding)
//! - `errno`: host error translation
//! - `sysfs`: the virtual `/sys/` namespace
//! - `stream`: host and synthetic descriptors behind one handle
//! - `host`: host primitives
//! - `gateway`: decode, dispatch, encode
//!
//! Native callers go through [`sys_syscall`]; embedders that own a guest
//! memory build their own [`Gateway`] over a [`LinearMemory`].

pub mod abi;
pub mod call;
pub mod config;
pub mod errno;
pub mod gateway;
pub mod host;
pub mod memory;
pub mod registration;
pub mod stream;
pub mod sysfs;
pub mod syslib;
pub mod trace;

pub use abi::{ABI_VERSION, ErrorKind, Fd, OpenFlags, Opcode, SysResult};
pub use call::{Args, Syscall};
pub use config::{ConfigError, GatewayConfig};
pub use gateway::Gateway;
pub use memory::{GuestMemory, LinearMemory, NativeMemory};
pub use registration::Registration;
pub use trace::{TraceSummary, Tracer};

use std::cell::RefCell;
use std::ffi::c_char;
use std::panic::{self, AssertUnwindSafe};

thread_local! {
    /// The gateway behind the exported entry point
    static GATEWAY: RefCell<Gateway<NativeMemory>> = RefCell::new(native_gateway());
}

fn native_gateway() -> Gateway<NativeMemory> {
    // SAFETY: pointer words reaching this gateway come from callers of
    // `sys_syscall`, whose contract is the one `NativeMemory` requires.
    let memory = || unsafe { NativeMemory::new() };
    Gateway::with_config(memory(), GatewayConfig::from_env()).unwrap_or_else(|e| {
        log::warn!("{}; using defaults", e);
        Gateway::new(memory())
    })
}

/// Run `f` against this thread's native gateway
///
/// Returns `None` if the gateway is already borrowed (from inside a call)
/// or the thread is shutting down.
pub fn with_native_gateway<R>(f: impl FnOnce(&mut Gateway<NativeMemory>) -> R) -> Option<R> {
    GATEWAY
        .try_with(|g| g.try_borrow_mut().ok().map(|mut g| f(&mut g)))
        .ok()
        .flatten()
}

/// The single foreign entry point
///
/// # Safety
///
/// Pointer arguments must be null or valid for the access the operation
/// makes: a NUL-terminated string for `open`, `len` readable bytes for
/// `write`, `len` writable bytes for `read`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sys_syscall(
    op: u32,
    a1: isize,
    a2: isize,
    a3: isize,
    a4: isize,
    a5: isize,
) -> isize {
    let args = [a1, a2, a3, a4, a5];
    let result =
        panic::catch_unwind(AssertUnwindSafe(|| with_native_gateway(|g| g.call(op, args))));
    match result {
        Ok(Some(ret)) => ret,
        Ok(None) => {
            log::debug!("op {} rejected: gateway busy", op);
            ErrorKind::Invalid.to_ret()
        }
        Err(_) => {
            log::error!("op {} panicked", op);
            ErrorKind::Invalid.to_ret()
        }
    }
}

/// Static name of an error code; `"?"` for codes outside the set
#[unsafe(no_mangle)]
pub extern "C" fn sys_errname(err: u32) -> *const c_char {
    ErrorKind::from_code(err)
        .map_or(c"?", |kind| kind.name_cstr())
        .as_ptr()
}
