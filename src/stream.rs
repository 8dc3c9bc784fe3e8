//! Descriptor streams
//!
//! A descriptor either names a host-owned resource or one of the
//! gateway's synthetic streams. Both are reached through [`StreamRef`], so
//! handlers never care which kind they were given.
//!
//! Synthetic descriptors are numbered from a base far above anything the
//! host hands out. Host descriptors are never recorded here.

use crate::abi::{ErrorKind, Fd, SysResult};
use crate::host;
use slab::Slab;

/// Default first synthetic descriptor
pub const DEFAULT_SYNTHETIC_BASE: i32 = 0x4000_0000;

/// Read-only in-memory stream backing a virtual file
#[derive(Debug, Clone)]
pub struct SyntheticStream {
    /// Route that produced the content
    pub name: String,
    data: Vec<u8>,
    position: usize,
}

impl SyntheticStream {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            position: 0,
        }
    }

    /// Read the next chunk; 0 once the content is exhausted
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let available = &self.data[self.position.min(self.data.len())..];
        let n = buf.len().min(available.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        n
    }
}

/// A resolved descriptor
pub enum StreamRef<'a> {
    Host(Fd),
    Synthetic(&'a mut SyntheticStream),
}

impl StreamRef<'_> {
    pub fn read(self, buf: &mut [u8]) -> SysResult<usize> {
        match self {
            StreamRef::Host(fd) => host::read(fd, buf),
            StreamRef::Synthetic(s) => Ok(s.read(buf)),
        }
    }

    /// Synthetic streams refuse writes with `not supported`
    pub fn write(self, buf: &[u8]) -> SysResult<usize> {
        match self {
            StreamRef::Host(fd) => host::write(fd, buf),
            StreamRef::Synthetic(_) => Err(ErrorKind::NotSupported),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, StreamRef::Synthetic(_))
    }
}

/// Open synthetic streams, keyed by descriptor
#[derive(Debug)]
pub struct StreamTable {
    streams: Slab<SyntheticStream>,
    base: i32,
}

impl StreamTable {
    pub fn new(base: i32) -> Self {
        Self {
            streams: Slab::new(),
            base,
        }
    }

    /// Register a stream and return its descriptor
    pub fn insert(&mut self, stream: SyntheticStream) -> SysResult<Fd> {
        let entry = self.streams.vacant_entry();
        let offset = i32::try_from(entry.key()).map_err(|_| ErrorKind::Invalid)?;
        let fd = self.base.checked_add(offset).ok_or(ErrorKind::Invalid)?;
        entry.insert(stream);
        Ok(Fd(fd))
    }

    fn key(&self, fd: Fd) -> Option<usize> {
        if fd.0 >= self.base {
            Some((fd.0 - self.base) as usize)
        } else {
            None
        }
    }

    /// Resolve a descriptor
    ///
    /// Anything below the base belongs to the host and is passed through
    /// for the host to validate. A synthetic number that is not open is
    /// a bad descriptor.
    pub fn resolve(&mut self, fd: Fd) -> SysResult<StreamRef<'_>> {
        match self.key(fd) {
            None => Ok(StreamRef::Host(fd)),
            Some(key) => self
                .streams
                .get_mut(key)
                .map(StreamRef::Synthetic)
                .ok_or(ErrorKind::BadDescriptor),
        }
    }

    /// Close a descriptor of either kind
    pub fn close(&mut self, fd: Fd) -> SysResult<()> {
        match self.key(fd) {
            None => host::close(fd),
            Some(key) => self
                .streams
                .try_remove(key)
                .map(|_| ())
                .ok_or(ErrorKind::BadDescriptor),
        }
    }

    /// Number of open synthetic streams
    pub(crate) fn len(&self) -> usize {
        self.streams.len()
    }
}

impl Default for StreamTable {
    fn default() -> Self {
        Self::new(DEFAULT_SYNTHETIC_BASE)
    }
}
