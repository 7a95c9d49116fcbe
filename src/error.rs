use std::{error::Error as StdError, fmt};

/// Tagged failure kind, surfaced instead of distinct exception types.
///
/// See spec.md §7 for the propagation policy attached to each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The buffer pool could not allocate a new page during a split or
    /// new-tree operation.
    OutOfMemory,
    /// An iterator was dereferenced or advanced past `End`.
    OutOfRange,
    /// A lock was requested by a transaction already in `SHRINKING`.
    LockOnShrinking,
    /// A shared lock was requested under `READ_UNCOMMITTED`.
    LockSharedOnReadUncommitted,
    /// A second upgrade was requested on a queue that already has one
    /// pending.
    UpgradeConflict,
    /// The transaction was aborted to break a deadlock cycle.
    Deadlock,
    /// Catch-all for invariant violations that are programming errors
    /// rather than expected runtime outcomes (invalid page category,
    /// missing sibling, etc).
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::OutOfRange => "out of range",
            ErrorKind::LockOnShrinking => "lock requested while shrinking",
            ErrorKind::LockSharedOnReadUncommitted => {
                "shared lock requested under read uncommitted"
            }
            ErrorKind::UpgradeConflict => "conflicting lock upgrade",
            ErrorKind::Deadlock => "transaction aborted to break deadlock",
            ErrorKind::Internal => "internal invariant violation",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    detail: String,
}

impl Error {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, detail)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl StdError for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for operations that either succeed or fail, with no payload.
pub type VoidResult = Result<()>;
