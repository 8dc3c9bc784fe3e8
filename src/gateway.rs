//! The ABI gateway
//!
//! This is the boundary between a guest and the host. Every request goes
//! through [`Gateway::call`], which:
//! - decodes the opcode and argument words into a [`Syscall`]
//! - dispatches it with a single `match`
//! - translates the outcome back into one signed word
//!
//! A gateway owns all of its state (guest memory view, synthetic streams,
//! callback registration, tracer), so independent instances never
//! interfere with each other.

use crate::abi::{ErrorKind, Fd, OpenFlags, Opcode, SysResult, encode_result};
use crate::call::{Args, Syscall};
use crate::config::{ConfigError, GatewayConfig};
use crate::host::{self, SleepError};
use crate::memory::GuestMemory;
use crate::registration::{CallbackSlot, Registration};
use crate::stream::{StreamTable, SyntheticStream};
use crate::sysfs::{self, RouteContext};
use crate::trace::Tracer;
use std::time::{Duration, Instant};

pub struct Gateway<M: GuestMemory> {
    memory: M,
    streams: StreamTable,
    callbacks: CallbackSlot,
    config: GatewayConfig,
    tracer: Tracer,
    /// Time left when the last sleep was interrupted
    last_sleep_remaining: Option<Duration>,
}

impl<M: GuestMemory> Gateway<M> {
    pub fn new(memory: M) -> Self {
        Self::build(memory, GatewayConfig::default())
    }

    /// Build a gateway from an explicit configuration
    ///
    /// The configuration is validated first; a synthetic base that would
    /// shadow the standard descriptors is rejected.
    pub fn with_config(memory: M, config: GatewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(memory, config))
    }

    fn build(memory: M, config: GatewayConfig) -> Self {
        let mut tracer = Tracer::new(config.trace_buffer);
        if config.trace {
            tracer.enable();
        }
        Self {
            memory,
            streams: StreamTable::new(config.synthetic_fd_base),
            callbacks: CallbackSlot::new(),
            config,
            tracer,
            last_sleep_remaining: None,
        }
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn tracer_mut(&mut self) -> &mut Tracer {
        &mut self.tracer
    }

    /// The pair stored by the last `init`, for the embedding host
    pub fn registration(&self) -> Option<Registration> {
        self.callbacks.get()
    }

    /// Number of open synthetic streams
    pub fn open_streams(&self) -> usize {
        self.streams.len()
    }

    /// Remaining time of the last interrupted sleep
    ///
    /// The wire result of an interrupted sleep is only `canceled`; the
    /// remainder is kept here until the next sleep.
    pub fn last_sleep_remaining(&self) -> Option<Duration> {
        self.last_sleep_remaining
    }

    /// Handle one wire call
    pub fn call(&mut self, op: u32, args: Args) -> isize {
        let start = Instant::now();
        let result = Syscall::decode(op, args).and_then(|call| self.dispatch(call));
        let ret = encode_result(result);

        match Opcode::from_u32(op) {
            Some(opcode) => log::trace!("{} {:?} -> {}", opcode, args, ret),
            None => log::debug!("rejected opcode {}", op),
        }
        self.tracer.record(op, args, ret, start.elapsed());
        ret
    }

    /// Run a decoded call
    pub fn dispatch(&mut self, call: Syscall) -> SysResult<usize> {
        match call {
            Syscall::Init { callback, userdata } => {
                self.sys_init(callback, userdata);
                Ok(0)
            }
            Syscall::Test { op } => self.sys_test(op).map(|()| 0),
            Syscall::Exit { status } => self.sys_exit(status),
            Syscall::Open { path, flags, mode } => {
                self.sys_open(path, flags, mode).map(|fd| fd.0 as usize)
            }
            Syscall::Close { fd } => self.sys_close(fd).map(|()| 0),
            Syscall::Read { fd, buf, len } => self.sys_read(fd, buf, len),
            Syscall::Write { fd, buf, len } => self.sys_write(fd, buf, len),
            Syscall::Sleep {
                seconds,
                nanoseconds,
            } => self.sys_sleep(seconds, nanoseconds).map(|()| 0),
        }
    }

    // ========== HANDLERS ==========

    /// Register the completion callback; last write wins
    pub fn sys_init(&mut self, callback: usize, userdata: usize) {
        self.callbacks.register(Registration { callback, userdata });
    }

    /// Check whether an opcode is supported
    ///
    /// Only an upper bound is checked: everything up to `write` is
    /// reported as supported, `sleep` and above are not.
    pub fn sys_test(&self, op: usize) -> SysResult<()> {
        if op > Opcode::LAST_SUPPORTED.num() as usize {
            return Err(ErrorKind::NotSupported);
        }
        Ok(())
    }

    /// Terminate the process, abandoning anything pending
    pub fn sys_exit(&mut self, status: i32) -> ! {
        log::debug!("exit({})", status);
        host::exit(status)
    }

    /// Open a file, or a virtual file under `/sys/`
    pub fn sys_open(&mut self, path: usize, flags: OpenFlags, mode: u32) -> SysResult<Fd> {
        let path = self.memory.read_cstr(path)?;

        if sysfs::is_sys_path(path) {
            let ctx = RouteContext {
                platform: &self.config.platform,
                abi_version: self.config.abi_version,
            };
            let (name, content) = sysfs::open(path, &ctx)?;
            return self.streams.insert(SyntheticStream::new(name, content));
        }

        host::open(path, flags, mode)
    }

    pub fn sys_close(&mut self, fd: Fd) -> SysResult<()> {
        self.streams.close(fd)
    }

    /// Read into guest memory; 0 means end of stream
    pub fn sys_read(&mut self, fd: Fd, buf: usize, len: usize) -> SysResult<usize> {
        let stream = self.streams.resolve(fd)?;
        let buf = self.memory.slice_mut(buf, len)?;
        stream.read(buf)
    }

    pub fn sys_write(&mut self, fd: Fd, buf: usize, len: usize) -> SysResult<usize> {
        let stream = self.streams.resolve(fd)?;
        let buf = self.memory.slice(buf, len)?;
        stream.write(buf)
    }

    /// Sleep; an interruption is reported as `canceled`
    pub fn sys_sleep(&mut self, seconds: u64, nanoseconds: u64) -> SysResult<()> {
        self.last_sleep_remaining = None;
        match host::sleep(seconds, nanoseconds) {
            Ok(()) => Ok(()),
            Err(SleepError::Interrupted { remaining }) => {
                log::debug!("sleep interrupted with {:?} left", remaining);
                self.last_sleep_remaining = Some(remaining);
                Err(ErrorKind::Canceled)
            }
            Err(SleepError::Failed(kind)) => Err(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::LinearMemory;

    const PATH: usize = 0x100;
    const BUF: usize = 0x400;

    fn gateway() -> Gateway<LinearMemory> {
        let config = GatewayConfig {
            platform: "unit-x64".to_string(),
            trace: true,
            ..GatewayConfig::default()
        };
        Gateway::with_config(LinearMemory::new(0x1000), config).unwrap()
    }

    fn open(g: &mut Gateway<LinearMemory>, path: &str, flags: OpenFlags) -> isize {
        assert!(g.memory_mut().write_cstr(PATH, path));
        g.call(3, [PATH as isize, flags.0 as isize, 0o644, 0, 0])
    }

    #[test]
    fn test_rejects_unknown_opcode() {
        let mut g = gateway();
        for op in [8, 9, 100, u32::MAX] {
            assert_eq!(g.call(op, [0; 5]), -3);
        }
        assert_eq!(g.tracer().summary().rejected, 4);
    }

    #[test]
    fn test_test_upper_bound() {
        let mut g = gateway();
        for op in 0..=6 {
            assert_eq!(g.call(1, [op, 0, 0, 0, 0]), 0, "op {}", op);
        }
        assert_eq!(g.call(1, [7, 0, 0, 0, 0]), -8);
        assert_eq!(g.call(1, [1000, 0, 0, 0, 0]), -8);
        assert_eq!(g.call(1, [-1, 0, 0, 0, 0]), -8);
        assert_eq!(g.call(1, [isize::MIN, 0, 0, 0, 0]), -8);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_test_checks_high_bits() {
        let mut g = gateway();
        // Low 32 bits name `open`
        let word = (1isize << 32) + Opcode::Open.num() as isize;
        assert_eq!(g.call(1, [word, 0, 0, 0, 0]), -8);
        assert_eq!(g.call(1, [u32::MAX as isize + 1, 0, 0, 0, 0]), -8);
    }

    #[test]
    fn test_init_overwrites() {
        let mut g = gateway();
        assert_eq!(g.registration(), None);
        assert_eq!(g.call(0, [0x10, 0x20, 0, 0, 0]), 0);
        assert_eq!(g.call(0, [0x30, 0x40, 0, 0, 0]), 0);
        assert_eq!(
            g.registration(),
            Some(Registration {
                callback: 0x30,
                userdata: 0x40
            })
        );
    }

    #[test]
    fn test_uname_read_then_end() {
        let mut g = gateway();
        let fd = open(&mut g, "/sys/uname", OpenFlags::READ_ONLY);
        assert!(fd >= g.config().synthetic_fd_base as isize);
        assert_eq!(g.open_streams(), 1);

        let n = g.call(5, [fd, BUF as isize, 64, 0, 0]);
        assert_eq!(n, 11);
        assert_eq!(g.memory().read(BUF, 11), b"unit-x64 1\n");

        assert_eq!(g.call(5, [fd, BUF as isize, 64, 0, 0]), 0);
        assert_eq!(g.call(4, [fd, 0, 0, 0, 0]), 0);
        assert_eq!(g.open_streams(), 0);

        // Use after close
        assert_eq!(g.call(5, [fd, BUF as isize, 64, 0, 0]), -1);
        assert_eq!(g.call(4, [fd, 0, 0, 0, 0]), -1);
    }

    #[test]
    fn test_uname_write_not_supported() {
        let mut g = gateway();
        let fd = open(&mut g, "/sys/uname", OpenFlags::READ_WRITE);
        assert!(fd >= 0);
        assert!(g.memory_mut().write(BUF, b"x"));
        assert_eq!(g.call(6, [fd, BUF as isize, 1, 0, 0]), -8);
    }

    #[test]
    fn test_unknown_virtual_route() {
        let mut g = gateway();
        assert_eq!(open(&mut g, "/sys/doesnotexist", OpenFlags::READ_ONLY), -5);
        assert_eq!(open(&mut g, "/sys/", OpenFlags::READ_ONLY), -5);
        assert_eq!(g.open_streams(), 0);
    }

    #[test]
    fn test_bad_pointers() {
        let mut g = gateway();
        // Path pointer outside memory
        assert_eq!(g.call(3, [0x10_0000, 0, 0, 0, 0]), -2);
        // Buffer overruns memory
        let fd = open(&mut g, "/sys/uname", OpenFlags::READ_ONLY);
        assert_eq!(g.call(5, [fd, 0xff0, 0x100, 0, 0]), -2);
    }

    #[test]
    fn test_host_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hi.txt");
        let path = path.to_str().unwrap();
        let mut g = gateway();

        let fd = open(
            &mut g,
            path,
            OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE,
        );
        assert!(fd >= 3 && fd < g.config().synthetic_fd_base as isize);
        assert!(g.memory_mut().write(BUF, b"hi\n"));
        assert_eq!(g.call(6, [fd, BUF as isize, 3, 0, 0]), 3);
        assert_eq!(g.call(4, [fd, 0, 0, 0, 0]), 0);

        let fd = open(&mut g, path, OpenFlags::READ_ONLY);
        assert!(fd >= 0);
        assert_eq!(g.call(5, [fd, 0x800, 3, 0, 0]), 3);
        assert_eq!(g.memory().read(0x800, 3), b"hi\n");
        assert_eq!(g.call(4, [fd, 0, 0, 0, 0]), 0);

        let open_stats = g.tracer().counters(Opcode::Open);
        assert_eq!(open_stats.count, 2);
    }

    #[test]
    fn test_missing_host_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.txt");
        let mut g = gateway();
        let r = open(&mut g, path.to_str().unwrap(), OpenFlags::READ_ONLY);
        assert_eq!(r, ErrorKind::NotFound.to_ret());
        assert_eq!(g.tracer().counters(Opcode::Open).errors, 1);
    }

    #[test]
    fn test_sleep() {
        let mut g = gateway();
        let start = Instant::now();
        assert_eq!(g.call(7, [0, 10_000_000, 0, 0, 0]), 0);
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert_eq!(g.last_sleep_remaining(), None);
        assert_eq!(g.call(7, [0, 2_000_000_000, 0, 0, 0]), -2);
    }

    #[test]
    fn test_rejects_invalid_config() {
        for base in [0, 1, 2, -1] {
            let config = GatewayConfig {
                synthetic_fd_base: base,
                ..GatewayConfig::default()
            };
            let r = Gateway::with_config(LinearMemory::new(16), config);
            assert!(matches!(r, Err(ConfigError::Invalid(_))), "base {}", base);
        }
    }

    #[test]
    fn test_standard_streams_stay_host() {
        let mut g = Gateway::new(LinearMemory::new(16));
        // Zero-length writes reach the host without printing anything
        assert_eq!(g.call(6, [1, 0, 0, 0, 0]), 0);
        assert_eq!(g.call(6, [2, 0, 0, 0, 0]), 0);

        let config = GatewayConfig {
            synthetic_fd_base: 3,
            ..GatewayConfig::default()
        };
        let mut g = Gateway::with_config(LinearMemory::new(0x1000), config).unwrap();
        assert_eq!(g.call(6, [1, 0, 0, 0, 0]), 0);
        assert_eq!(open(&mut g, "/sys/uname", OpenFlags::READ_ONLY), 3);
    }

    #[test]
    fn test_instances_are_independent() {
        let mut a = gateway();
        let mut b = gateway();
        a.call(0, [1, 2, 0, 0, 0]);
        let fd = open(&mut a, "/sys/uname", OpenFlags::READ_ONLY);
        assert!(fd >= 0);
        assert_eq!(b.registration(), None);
        assert_eq!(b.open_streams(), 0);
        assert_eq!(b.call(5, [fd, BUF as isize, 8, 0, 0]), -1);
    }
}
