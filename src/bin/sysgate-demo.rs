//! sysgate-demo - exercise the gateway the way a guest would
//!
//! Every byte of output goes through the gateway's own write calls.
//!
//! Usage: sysgate-demo [DIR]
//!
//! Writes `hello.txt` into DIR (default: the current directory).
//! Set `SYSGATE_TRACE_JSON=1` to print the call trace summary at the end.

use std::ffi::CString;
use std::time::Duration;
use sysgate::syslib;
use sysgate::{ErrorKind, Fd, OpenFlags, SysResult};

const MESSAGE: &[u8] = b"Hello, world!\n";

/// A failed step and what it was doing
struct Failure {
    kind: ErrorKind,
    context: String,
}

trait Context<T> {
    fn context(self, context: impl Into<String>) -> Result<T, Failure>;
}

impl<T> Context<T> for SysResult<T> {
    fn context(self, context: impl Into<String>) -> Result<T, Failure> {
        self.map_err(|kind| Failure {
            kind,
            context: context.into(),
        })
    }
}

fn print(text: &str) -> Result<(), Failure> {
    syslib::write_all(Fd::STDOUT, text.as_bytes()).context("write stdout")
}

fn read_to_end(fd: Fd, context: &str) -> Result<Vec<u8>, Failure> {
    let mut out = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = syslib::read(fd, &mut buf).context(context)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

fn run(dir: &str) -> Result<(), Failure> {
    for i in 1..=2 {
        print(&format!("sleep {}: 200ms\n", i))?;
        syslib::sleep(Duration::from_millis(200)).context("sleep")?;
    }

    let uname = syslib::open(c"/sys/uname", OpenFlags::READ_ONLY, 0).context("open /sys/uname")?;
    let text = read_to_end(uname, "read /sys/uname")?;
    syslib::close(uname).context("close /sys/uname")?;
    print(&format!("uname: {}", String::from_utf8_lossy(&text)))?;

    let path = format!("{}/hello.txt", dir.trim_end_matches('/'));
    let cpath = CString::new(path.clone()).map_err(|_| Failure {
        kind: ErrorKind::BadName,
        context: path.clone(),
    })?;

    let out = syslib::create(&cpath, 0o644).context(format!("create {}", path))?;
    syslib::write_all(out, MESSAGE).context(format!("write {}", path))?;
    syslib::close(out).context(format!("close {}", path))?;

    let input = syslib::open(&cpath, OpenFlags::READ_ONLY, 0).context(format!("open {}", path))?;
    let back = read_to_end(input, &format!("read {}", path))?;
    syslib::close(input).context(format!("close {}", path))?;
    if back != MESSAGE {
        return Err(Failure {
            kind: ErrorKind::Invalid,
            context: format!("{} read back {} bytes", path, back.len()),
        });
    }
    print(&format!("{}: {}", path, String::from_utf8_lossy(&back)))?;

    if tracing_requested() {
        let summary = sysgate::with_native_gateway(|g| g.tracer().summary());
        if let Some(summary) = summary {
            let json = serde_json::to_string_pretty(&summary).map_err(|_| Failure {
                kind: ErrorKind::Invalid,
                context: "trace summary".to_string(),
            })?;
            print(&format!("{}\n", json))?;
        }
    }
    Ok(())
}

fn tracing_requested() -> bool {
    std::env::var("SYSGATE_TRACE_JSON").is_ok_and(|v| v == "1")
}

fn main() {
    env_logger::init();

    if tracing_requested() {
        sysgate::with_native_gateway(|g| g.tracer_mut().enable());
    }

    let dir = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    match run(&dir) {
        Ok(()) => syslib::exit(0),
        Err(failure) => {
            let line = format!(
                "error: {} ({})\n",
                syslib::errname(failure.kind),
                failure.context
            );
            let _ = syslib::write_all(Fd::STDERR, line.as_bytes());
            syslib::exit(1)
        }
    }
}
