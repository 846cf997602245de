use crate::ConstantPoolTag;
use derive_more::Display;
use java_string::Utf8Error;
use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClassFileError {
    #[error("failed to allocate constant pool index: {0}")]
    AllocationFailed(TryReserveError),
    #[error("bad constant pool index: {index}, len {len}")]
    BadConstantPoolIndex { index: u16, len: usize },
    #[error("no entry at constant pool index: {0}")]
    BadConstantPoolIndexNoEntry(u16),
    #[error("bad constant pool tag: {0}")]
    BadConstantPoolTag(u8),
    #[error("bad constant pool tag: {actual}, expected {expected}")]
    BadConstantPoolType {
        expected: ConstantPoolTag,
        actual: ConstantPoolTag,
    },
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantPoolType { index: u16, tag: u8 },
    #[error("requested interface index out of range: {index}, count {count}")]
    BadInterfaceIndex { index: usize, count: u16 },
    #[error("bad magic number")]
    BadMagic,
    #[error("read past the end of the class file, index {index}, len {len}")]
    OutOfBounds { index: usize, len: usize },
    #[error("class file too small: {len} bytes, need at least {required}")]
    TooSmall { len: usize, required: usize },
    #[error("utf8 error: {0}")]
    Utf8(#[from] Utf8Error),
}

/// Coarse classification of a [`ClassFileError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
pub enum ClassFileErrorKind {
    InvalidMagic,
    TooSmall,
    AllocationFailed,
    Malformed,
    IndexOutOfRange,
    WrongTag,
    BadEncoding,
}

impl ClassFileError {
    pub fn kind(&self) -> ClassFileErrorKind {
        match self {
            ClassFileError::BadMagic => ClassFileErrorKind::InvalidMagic,
            ClassFileError::TooSmall { .. } => ClassFileErrorKind::TooSmall,
            ClassFileError::AllocationFailed(_) => ClassFileErrorKind::AllocationFailed,
            ClassFileError::OutOfBounds { .. } | ClassFileError::BadConstantPoolTag(_) => {
                ClassFileErrorKind::Malformed
            }
            ClassFileError::BadConstantPoolIndex { .. }
            | ClassFileError::BadConstantPoolIndexNoEntry(_)
            | ClassFileError::BadInterfaceIndex { .. } => ClassFileErrorKind::IndexOutOfRange,
            ClassFileError::BadConstantPoolType { .. }
            | ClassFileError::UnknownConstantPoolType { .. } => ClassFileErrorKind::WrongTag,
            ClassFileError::Utf8(_) => ClassFileErrorKind::BadEncoding,
        }
    }

    /// Errors that reject the whole class buffer. These only come out of
    /// [`ParsedClass::build`](crate::ParsedClass::build).
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind(),
            ClassFileErrorKind::InvalidMagic
                | ClassFileErrorKind::TooSmall
                | ClassFileErrorKind::AllocationFailed
                | ClassFileErrorKind::Malformed
        )
    }

    /// Errors raised by a single lookup; the parsed class stays usable.
    pub fn is_lookup(&self) -> bool {
        !self.is_structural()
    }
}

pub type ClassFileResult<T> = Result<T, ClassFileError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("short write: {actual} of {expected} bytes")]
    ShortWrite { expected: usize, actual: usize },
    #[error("short read: {actual} of {expected} bytes")]
    ShortRead { expected: usize, actual: usize },
    #[error("payload size {len} exceeds maximum {max}")]
    PayloadTooLarge { len: u64, max: u32 },
    #[error("failed to allocate message buffer: {0}")]
    AllocationFailed(TryReserveError),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
pub enum ChannelErrorKind {
    TransportFailure,
    Protocol,
    AllocationFailed,
}

impl ChannelError {
    pub fn kind(&self) -> ChannelErrorKind {
        match self {
            ChannelError::Io(_) | ChannelError::ShortWrite { .. } | ChannelError::ShortRead { .. } => {
                ChannelErrorKind::TransportFailure
            }
            ChannelError::PayloadTooLarge { .. } => ChannelErrorKind::Protocol,
            ChannelError::AllocationFailed(_) => ChannelErrorKind::AllocationFailed,
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.kind() == ChannelErrorKind::TransportFailure
    }
}

pub type ChannelResult<T> = Result<T, ChannelError>;
