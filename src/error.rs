//! Error classification shared by every layer of the driver.
//!
//! Each module keeps its own `thiserror` enum; [`ErrorKind`] is the flat
//! taxonomy they all reduce to, mirroring the libusb error codes the device
//! stack reports plus the driver-level `Unknown` used for protocol violations.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    InvalidParam,
    Access,
    NoDevice,
    NotFound,
    Busy,
    Timeout,
    Overflow,
    Pipe,
    Interrupted,
    NoMemory,
    NotSupported,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Io => "I/O error",
            Self::InvalidParam => "invalid parameter",
            Self::Access => "insufficient permissions",
            Self::NoDevice => "device not available",
            Self::NotFound => "entity not found",
            Self::Busy => "resource busy",
            Self::Timeout => "operation timed out",
            Self::Overflow => "overflow",
            Self::Pipe => "pipe error",
            Self::Interrupted => "system call interrupted",
            Self::NoMemory => "insufficient memory",
            Self::NotSupported => "operation not supported",
            Self::Unknown => "unknown error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
