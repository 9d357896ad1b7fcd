//! Resume tokens for paged scans
//!
//! A token marks where the next call of a scan picks up. It carries a key plus
//! a flag saying whether that key itself is still to be visited. The flag is
//! read in the direction of the scan, so `after(k)` in a reverse scan means
//! "continue with keys strictly below `k`".

use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Bound;

/// Position at which a scan resumes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResumeToken {
    /// Key the position is anchored at
    pub key: Key,
    /// Whether `key` itself is still to be visited
    pub inclusive: bool,
}

impl ResumeToken {
    /// Resume at `key`, visiting it
    pub fn at(key: Key) -> Self {
        ResumeToken {
            key,
            inclusive: true,
        }
    }

    /// Resume just past `key`
    pub fn after(key: Key) -> Self {
        ResumeToken {
            key,
            inclusive: false,
        }
    }

    /// The scan position this token designates
    pub fn position(&self) -> Bound<&Key> {
        if self.inclusive {
            Bound::Included(&self.key)
        } else {
            Bound::Excluded(&self.key)
        }
    }
}

impl fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inclusive {
            write!(f, "at({})", self.key)
        } else {
            write!(f, "after({})", self.key)
        }
    }
}
