//! Completion callback registration
//!
//! `init` stores one (callback, userdata) pair per gateway. Nothing in
//! this crate invokes the callback: all operations complete synchronously.
//! The pair is kept as raw words because its meaning depends on the guest
//! (a host function pointer for native callers, a table index for WASM).

/// A registered callback and its opaque userdata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub callback: usize,
    pub userdata: usize,
}

/// Holds at most one registration; set by `init`, never cleared
#[derive(Debug, Default)]
pub struct CallbackSlot {
    current: Option<Registration>,
}

impl CallbackSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a registration, replacing any previous one
    pub fn register(&mut self, registration: Registration) -> Option<Registration> {
        self.current.replace(registration)
    }

    pub fn get(&self) -> Option<Registration> {
        self.current
    }
}
