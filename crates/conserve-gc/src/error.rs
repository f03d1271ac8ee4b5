//! Error types.

use std::fmt;
use std::io;

/// Failure to create a collector.
#[derive(Debug)]
pub enum GcError {
    /// The operating system refused to map the arena.
    ArenaMap {
        /// Requested arena size in bytes.
        size: usize,
        /// Error reported by the operating system.
        source: io::Error,
    },
    /// The configuration cannot describe a working collector.
    InvalidConfig(&'static str),
}

impl fmt::Display for GcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArenaMap { size, source } => {
                write!(f, "failed to map {size} byte arena: {source}")
            }
            Self::InvalidConfig(msg) => write!(f, "invalid collector configuration: {msg}"),
        }
    }
}

impl std::error::Error for GcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ArenaMap { source, .. } => Some(source),
            Self::InvalidConfig(_) => None,
        }
    }
}

/// Failure to satisfy an allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No free span is large enough, even after a full collection.
    OutOfMemory {
        /// Payload bytes requested by the caller.
        requested: usize,
    },
    /// `count * size` does not fit in `usize`.
    SizeOverflow {
        /// Number of elements requested.
        count: usize,
        /// Size of each element.
        size: usize,
    },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory allocating {requested} bytes")
            }
            Self::SizeOverflow { count, size } => {
                write!(f, "allocation size overflow: {count} x {size} bytes")
            }
        }
    }
}

impl std::error::Error for AllocError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_messages() {
        let oom = AllocError::OutOfMemory { requested: 4096 };
        assert_eq!(oom.to_string(), "out of memory allocating 4096 bytes");

        let overflow = AllocError::SizeOverflow {
            count: usize::MAX,
            size: 2,
        };
        assert!(overflow.to_string().starts_with("allocation size overflow"));
    }

    #[test]
    fn test_arena_error_exposes_source() {
        let err = GcError::ArenaMap {
            size: 1024,
            source: io::Error::from(io::ErrorKind::OutOfMemory),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("1024 byte arena"));
        assert!(GcError::InvalidConfig("x").source().is_none());
    }
}
