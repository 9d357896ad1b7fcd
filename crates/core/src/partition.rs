//! Range partitions
//!
//! The keyspace is split into contiguous ranges by an ordered list of split
//! points. Partition `p{i}` owns `[split[i-1], split[i])`; the first partition
//! has no lower bound and the last has no upper bound.
//!
//! ```text
//! split points: [g, p]
//!
//!   p1: (-inf, g)   p2: [g, p)   p3: [p, +inf)
//! ```
//!
//! Scans address positions rather than keys. A position is a
//! `Bound<&Key>` read in the direction of the scan: `Included(k)` starts at
//! `k`, `Excluded(k)` starts just past `k`, `Unbounded` starts at the
//! beginning of the keyspace for that direction.

use crate::key::{Key, ScanOrder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Bound;
use thiserror::Error;

/// Opaque partition identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionId(u32);

impl PartitionId {
    /// Wrap a raw identifier
    pub const fn new(raw: u32) -> Self {
        PartitionId(raw)
    }

    /// Raw identifier
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Key bounds of one partition: `lower` inclusive, `upper` exclusive
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionBounds {
    /// Inclusive lower bound (`None` = start of keyspace)
    pub lower: Option<Key>,
    /// Exclusive upper bound (`None` = end of keyspace)
    pub upper: Option<Key>,
}

impl PartitionBounds {
    /// Bounds covering the whole keyspace
    pub fn unbounded() -> Self {
        PartitionBounds::default()
    }

    /// Does this partition own `key`?
    pub fn contains(&self, key: &Key) -> bool {
        let above = self.lower.as_ref().map_or(true, |lower| key >= lower);
        let below = self.upper.as_ref().map_or(true, |upper| key < upper);
        above && below
    }

    /// Does a scan starting at `position` in `order` start inside this partition?
    ///
    /// Ascending scans own a position when the first key they could visit lies
    /// here. Descending scans additionally own `Excluded(upper)`, since every
    /// key strictly below the upper bound down to `lower` belongs here.
    pub fn owns_position(&self, position: Bound<&Key>, order: ScanOrder) -> bool {
        match (order, position) {
            (ScanOrder::Ascending, Bound::Unbounded) => self.lower.is_none(),
            (ScanOrder::Ascending, Bound::Included(k) | Bound::Excluded(k)) => self.contains(k),
            (ScanOrder::Descending, Bound::Unbounded) => self.upper.is_none(),
            (ScanOrder::Descending, Bound::Included(k)) => self.contains(k),
            (ScanOrder::Descending, Bound::Excluded(k)) => {
                let above = self.lower.as_ref().map_or(true, |lower| lower < k);
                let below = self.upper.as_ref().map_or(true, |upper| k <= upper);
                above && below
            }
        }
    }
}

impl fmt::Display for PartitionBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lower {
            Some(lower) => write!(f, "[{}", lower)?,
            None => write!(f, "(-inf")?,
        }
        match &self.upper {
            Some(upper) => write!(f, ", {})", upper),
            None => write!(f, ", +inf)"),
        }
    }
}

/// Partition map construction errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PartitionError {
    /// The root key cannot split the keyspace
    #[error("Split point cannot be the root key")]
    RootSplitPoint,

    /// The same split point was given twice
    #[error("Duplicate split point: {0}")]
    DuplicateSplitPoint(String),
}

/// Layout of the keyspace across range partitions
///
/// Partition ids are assigned `1..=n` in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMap {
    split_points: Vec<Key>,
    bounds: Vec<PartitionBounds>,
}

impl PartitionMap {
    /// A single partition owning the whole keyspace
    pub fn single() -> Self {
        PartitionMap {
            split_points: Vec::new(),
            bounds: vec![PartitionBounds::unbounded()],
        }
    }

    /// Build from split points (any order)
    pub fn from_split_points(mut split_points: Vec<Key>) -> Result<Self, PartitionError> {
        if split_points.iter().any(Key::is_root) {
            return Err(PartitionError::RootSplitPoint);
        }
        split_points.sort();
        if let Some(pair) = split_points.windows(2).find(|w| w[0] == w[1]) {
            return Err(PartitionError::DuplicateSplitPoint(pair[0].to_string()));
        }

        let mut bounds = Vec::with_capacity(split_points.len() + 1);
        let mut lower = None;
        for point in &split_points {
            bounds.push(PartitionBounds {
                lower: lower.take(),
                upper: Some(point.clone()),
            });
            lower = Some(point.clone());
        }
        bounds.push(PartitionBounds { lower, upper: None });

        Ok(PartitionMap {
            split_points,
            bounds,
        })
    }

    /// Number of partitions
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Always false: a map has at least one partition
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// All partitions in key order
    pub fn partitions(&self) -> impl Iterator<Item = (PartitionId, &PartitionBounds)> {
        self.bounds
            .iter()
            .enumerate()
            .map(|(idx, bounds)| (id_for_index(idx), bounds))
    }

    /// Bounds of a partition
    pub fn bounds(&self, id: PartitionId) -> Option<&PartitionBounds> {
        let idx = (id.as_u32() as usize).checked_sub(1)?;
        self.bounds.get(idx)
    }

    /// The partition that owns `key`
    pub fn partition_for(&self, key: &Key) -> PartitionId {
        id_for_index(self.index_for(key))
    }

    /// The partition where a scan starting at `position` begins
    pub fn locate(&self, position: Bound<&Key>, order: ScanOrder) -> PartitionId {
        let idx = match (order, position) {
            (ScanOrder::Ascending, Bound::Unbounded) => 0,
            (ScanOrder::Descending, Bound::Unbounded) => self.bounds.len() - 1,
            (_, Bound::Included(k)) | (ScanOrder::Ascending, Bound::Excluded(k)) => {
                self.index_for(k)
            }
            (ScanOrder::Descending, Bound::Excluded(k)) => {
                let idx = self.index_for(k);
                if idx > 0 && self.bounds[idx].lower.as_ref() == Some(k) {
                    idx - 1
                } else {
                    idx
                }
            }
        };
        id_for_index(idx)
    }

    fn index_for(&self, key: &Key) -> usize {
        self.split_points.partition_point(|point| point <= key)
    }
}

fn id_for_index(idx: usize) -> PartitionId {
    PartitionId::new(idx as u32 + 1)
}
