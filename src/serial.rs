//! Submission serials.
//!
//! A [`Serial`] identifies one submission epoch: the span between two flush
//! points of a recording context. Resource trackers stamp the serial of the
//! epoch they last recorded in, which lets them detect that their cached
//! node references belong to an already-flushed graph and must be dropped.

use std::fmt;

/// Monotonically increasing submission epoch.
///
/// `Serial::zero()` precedes every real submission; a freshly created
/// tracker therefore always reconciles on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Serial(u64);

impl Serial {
    /// The serial that precedes all submissions.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// The following submission epoch.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw epoch counter, for logging.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
