//! /sys virtual namespace
//!
//! Paths under `/sys/` never touch the host filesystem. The remainder of
//! the path is looked up by exact name in a fixed route table and the
//! matching generator produces the file's content.

use crate::abi::{ErrorKind, SysResult};

/// Reserved prefix, without the trailing separator
pub const PREFIX: &str = "/sys";

/// Inputs available to content generators
#[derive(Debug, Clone)]
pub struct RouteContext<'a> {
    pub platform: &'a str,
    pub abi_version: u32,
}

/// A named content generator
pub struct Route {
    pub name: &'static str,
    pub generate: fn(&RouteContext<'_>) -> Vec<u8>,
}

/// All virtual files
pub static ROUTES: &[Route] = &[Route {
    name: "uname",
    generate: uname,
}];

fn uname(ctx: &RouteContext<'_>) -> Vec<u8> {
    format!("{} {}\n", ctx.platform, ctx.abi_version).into_bytes()
}

/// Check if a path is in the virtual namespace
///
/// `/sys` alone is not; it is an ordinary host path.
pub fn is_sys_path(path: &[u8]) -> bool {
    path.len() > PREFIX.len() && path.starts_with(b"/sys/")
}

/// Look up the route for a virtual path
pub fn route(path: &[u8]) -> SysResult<&'static Route> {
    let rest = path.strip_prefix(b"/sys/").ok_or(ErrorKind::NotFound)?;
    ROUTES
        .iter()
        .find(|r| r.name.as_bytes() == rest)
        .ok_or(ErrorKind::NotFound)
}

/// Resolve a virtual path to its generated content
pub fn open(path: &[u8], ctx: &RouteContext<'_>) -> SysResult<(&'static str, Vec<u8>)> {
    let route = route(path)?;
    log::debug!("sysfs: route {} matched", route.name);
    Ok((route.name, (route.generate)(ctx)))
}

/// Default platform identifier, `<os>-<arch>`
pub fn platform_id() -> String {
    let arch = match std::env::consts::ARCH {
        "x86" => "x86",
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "arm" => "arm32",
        "powerpc" | "powerpc64" => "ppc",
        other => other,
    };
    format!("{}-{}", std::env::consts::OS, arch)
}
