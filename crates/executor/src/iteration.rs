//! Resumable range iteration
//!
//! A scan covers the subtree of a parent key, optionally narrowed by a
//! [`KeyRange`] on the component directly below the parent and by a [`Depth`].
//! It is executed one partition at a time, one batch per call:
//!
//! 1. The caller routes the call with [`route`] (or [`ResumableScan::route`]).
//! 2. The partition's handler runs the scan, which walks the intersection
//!    of the requested window and the partition's bounds.
//! 3. The returned [`ResumeToken`] says where the next call starts. It is
//!    `None` only once the whole requested window has been visited.
//!
//! A full batch always carries a token, even if nothing is left; the next call
//! then returns zero entries. Partition boundaries never show up in the
//! results: when a partition's share runs out, the token points at the
//! boundary key and routing sends the next call to the neighbour.
//!
//! A tombstone hides only itself. Keys below a tombstoned key are still
//! visited.

use partis_core::{
    Depth, Key, KeyRange, PartitionBounds, PartitionId, PartitionMap, ResumeToken, ScanOrder,
    StoredRecord, Transaction,
};
use std::ops::Bound;

use crate::error::{Error, IterationError};
use crate::operation::IterationRequest;
use crate::result::IterationBatch;
use crate::throughput::Accountant;
use crate::Result;

/// Progress of a scan across calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationState {
    /// No call made yet
    Start,
    /// At least one call made; continue from the token
    InProgress(ResumeToken),
    /// The whole range has been visited
    Exhausted,
}

/// How visited records are charged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanCharge {
    /// Full record size (values are read)
    Values,
    /// Minimum read per record (keys and metadata only)
    KeysOnly,
}

impl ScanCharge {
    fn charge(self, acct: &mut Accountant<'_>, record: &StoredRecord) {
        match self {
            ScanCharge::Values => acct.read_record(record.storage_size),
            ScanCharge::KeysOnly => acct.min_read(),
        }
    }
}

fn subtree_end(key: &Key) -> Result<Key> {
    key.subtree_end()
        .ok_or_else(|| Error::internal("the root key has no subtree end"))
}

fn bound_key<'a>(bound: &'a Bound<Key>) -> Option<&'a Key> {
    match bound {
        Bound::Included(k) | Bound::Excluded(k) => Some(k),
        Bound::Unbounded => None,
    }
}

/// The larger of two lower bounds
fn tighter_lower(a: Bound<Key>, b: Bound<Key>) -> Bound<Key> {
    match (&a, &b) {
        (Bound::Unbounded, _) => b,
        (_, Bound::Unbounded) => a,
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            if x > y {
                a
            } else if y > x {
                b
            } else if matches!(a, Bound::Excluded(_)) {
                a
            } else {
                b
            }
        }
    }
}

/// The smaller of two upper bounds
fn tighter_upper(a: Bound<Key>, b: Bound<Key>) -> Bound<Key> {
    match (&a, &b) {
        (Bound::Unbounded, _) => b,
        (_, Bound::Unbounded) => a,
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            if x < y {
                a
            } else if y < x {
                b
            } else if matches!(a, Bound::Excluded(_)) {
                a
            } else {
                b
            }
        }
    }
}

fn owned(bound: Bound<&Key>) -> Bound<Key> {
    match bound {
        Bound::Included(k) => Bound::Included(k.clone()),
        Bound::Excluded(k) => Bound::Excluded(k.clone()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn render(position: Bound<&Key>) -> String {
    match position {
        Bound::Included(k) => format!("at({})", k),
        Bound::Excluded(k) => format!("after({})", k),
        Bound::Unbounded => "unbounded".to_string(),
    }
}

/// Where a key sits relative to the scan's selection
#[derive(Debug, PartialEq, Eq)]
enum Placement {
    /// Part of the result
    Select,
    /// Inside the window but not selected
    Skip,
    /// Between the parent and the first admitted child
    BeforeChildren,
    /// Below a direct child in a children-only scan
    Deeper(Key),
}

/// Key window of a scan, independent of partitioning
#[derive(Debug, Clone)]
pub(crate) struct ScanPlan {
    parent: Key,
    depth: Depth,
    children_lower: Bound<Key>,
    children_upper: Bound<Key>,
    lower: Bound<Key>,
    upper: Bound<Key>,
}

impl ScanPlan {
    pub(crate) fn new(parent: &Key, range: Option<&KeyRange>, depth: Depth) -> Result<Self> {
        let start = range.and_then(|r| r.start().map(|s| (s, r.start_inclusive())));
        let end = range.and_then(|r| r.end().map(|e| (e, r.end_inclusive())));

        let children_lower = match start {
            None => Bound::Excluded(parent.clone()),
            Some((s, true)) => Bound::Included(parent.child(s)?),
            Some((s, false)) => Bound::Included(subtree_end(&parent.child(s)?)?),
        };
        let children_upper = match end {
            None => parent.subtree_end().map_or(Bound::Unbounded, Bound::Excluded),
            Some((e, true)) => Bound::Excluded(subtree_end(&parent.child(e)?)?),
            Some((e, false)) => Bound::Excluded(parent.child(e)?),
        };
        let lower = if depth.includes_parent() {
            Bound::Included(parent.clone())
        } else {
            children_lower.clone()
        };
        let upper = children_upper.clone();

        Ok(ScanPlan {
            parent: parent.clone(),
            depth,
            children_lower,
            children_upper,
            lower,
            upper,
        })
    }

    /// Where a call starts: the token's position, else the window's edge
    pub(crate) fn start_position<'a>(
        &'a self,
        resume: Option<&'a ResumeToken>,
        order: ScanOrder,
    ) -> Bound<&'a Key> {
        match (resume, order) {
            (Some(token), _) => token.position(),
            (None, ScanOrder::Ascending) => self.lower.as_ref(),
            (None, ScanOrder::Descending) => self.upper.as_ref(),
        }
    }

    /// Does `token` lie within the closed hull of the window?
    fn admits_token(&self, token: &ResumeToken) -> bool {
        let key = &token.key;
        let above = bound_key(&self.lower).map_or(true, |l| key >= l);
        let below = bound_key(&self.upper).map_or(true, |u| key <= u);
        above && below
    }

    fn in_children(&self, key: &Key) -> bool {
        let above = match &self.children_lower {
            Bound::Included(l) => key >= l,
            Bound::Excluded(l) => key > l,
            Bound::Unbounded => true,
        };
        let below = match &self.children_upper {
            Bound::Included(u) => key <= u,
            Bound::Excluded(u) => key < u,
            Bound::Unbounded => true,
        };
        above && below
    }

    fn classify(&self, key: &Key) -> Placement {
        if key == &self.parent {
            return if self.depth.includes_parent() {
                Placement::Select
            } else {
                Placement::Skip
            };
        }
        if !self.parent.is_prefix_of(key) {
            return Placement::Skip;
        }
        if !self.in_children(key) {
            return Placement::BeforeChildren;
        }
        let child_len = self.parent.len() + 1;
        if key.len() == child_len || self.depth.includes_descendants() {
            Placement::Select
        } else {
            Placement::Deeper(key.truncated(child_len))
        }
    }
}

/// One record returned by [`ScanCursor::next`]
#[derive(Debug)]
pub(crate) struct Visited {
    pub(crate) key: Key,
    pub(crate) record: StoredRecord,
    /// Whether the key is part of the selection
    pub(crate) selected: bool,
}

/// Walks a [`ScanPlan`] inside one partition
///
/// Every stored record the cursor lands on is reported, selected or not, so
/// the caller can charge for it. Keys that cannot be selected are jumped over
/// rather than visited one by one.
#[derive(Debug)]
pub(crate) struct ScanCursor {
    plan: ScanPlan,
    order: ScanOrder,
    lower: Bound<Key>,
    upper: Bound<Key>,
}

impl ScanCursor {
    pub(crate) fn new(
        plan: ScanPlan,
        order: ScanOrder,
        resume: Option<&ResumeToken>,
        bounds: &PartitionBounds,
    ) -> Self {
        let mut lower = plan.lower.clone();
        let mut upper = plan.upper.clone();
        if let Some(token) = resume {
            match order {
                ScanOrder::Ascending => lower = tighter_lower(lower, owned(token.position())),
                ScanOrder::Descending => upper = tighter_upper(upper, owned(token.position())),
            }
        }
        if let Some(l) = &bounds.lower {
            lower = tighter_lower(lower, Bound::Included(l.clone()));
        }
        if let Some(u) = &bounds.upper {
            upper = tighter_upper(upper, Bound::Excluded(u.clone()));
        }
        ScanCursor {
            plan,
            order,
            lower,
            upper,
        }
    }

    pub(crate) fn next(&mut self, txn: &mut dyn Transaction) -> Result<Option<Visited>> {
        let Some((key, record)) = txn.scan_next(self.lower.as_ref(), self.upper.as_ref(), self.order)?
        else {
            return Ok(None);
        };
        let selected = match self.plan.classify(&key) {
            Placement::Select => true,
            Placement::Skip => false,
            Placement::BeforeChildren => {
                match self.order {
                    ScanOrder::Ascending => {
                        self.lower = tighter_lower(
                            Bound::Excluded(key.clone()),
                            self.plan.children_lower.clone(),
                        )
                    }
                    ScanOrder::Descending => {
                        self.upper = tighter_upper(
                            Bound::Excluded(key.clone()),
                            Bound::Included(self.plan.parent.clone()),
                        )
                    }
                }
                return Ok(Some(Visited {
                    key,
                    record,
                    selected: false,
                }));
            }
            Placement::Deeper(child) => {
                match self.order {
                    ScanOrder::Ascending => {
                        self.lower = tighter_lower(
                            Bound::Excluded(key.clone()),
                            Bound::Included(subtree_end(&child)?),
                        )
                    }
                    ScanOrder::Descending => {
                        self.upper =
                            tighter_upper(Bound::Excluded(key.clone()), Bound::Included(child))
                    }
                }
                return Ok(Some(Visited {
                    key,
                    record,
                    selected: false,
                }));
            }
        };
        match self.order {
            ScanOrder::Ascending => self.lower = Bound::Excluded(key.clone()),
            ScanOrder::Descending => self.upper = Bound::Excluded(key.clone()),
        }
        Ok(Some(Visited {
            key,
            record,
            selected,
        }))
    }

    /// Token for the neighbouring partition once this one is exhausted, if
    /// the window continues past the boundary
    fn boundary_token(&self, bounds: &PartitionBounds) -> Option<ResumeToken> {
        match self.order {
            ScanOrder::Ascending => {
                let high = bounds.upper.as_ref()?;
                let continues = match &self.plan.upper {
                    Bound::Unbounded => true,
                    Bound::Excluded(u) => high < u,
                    Bound::Included(u) => high <= u,
                };
                continues.then(|| ResumeToken::at(high.clone()))
            }
            ScanOrder::Descending => {
                let low = bounds.lower.as_ref()?;
                let continues = bound_key(&self.plan.lower).map_or(true, |l| l < low);
                continues.then(|| ResumeToken::after(low.clone()))
            }
        }
    }
}

fn check_start(
    plan: &ScanPlan,
    resume: Option<&ResumeToken>,
    order: ScanOrder,
    bounds: &PartitionBounds,
    partition: PartitionId,
) -> Result<()> {
    if let Some(token) = resume {
        if !plan.admits_token(token) {
            return Err(IterationError::ResumeOutOfRange {
                token: token.to_string(),
            }
            .into());
        }
    }
    let start = plan.start_position(resume, order);
    if !bounds.owns_position(start, order) {
        return Err(IterationError::PositionNotInPartition {
            position: render(start),
            partition,
        }
        .into());
    }
    Ok(())
}

/// Run one call of a scan in the transaction's partition
///
/// `emit` turns each selected record into a result entry. Every visited
/// record is charged per `charge`; a call that visits nothing is charged the
/// minimum read.
pub(crate) fn run_scan<E>(
    request: &IterationRequest,
    txn: &mut dyn Transaction,
    batch_size: usize,
    charge: ScanCharge,
    acct: &mut Accountant<'_>,
    mut emit: impl FnMut(&Key, StoredRecord) -> Result<E>,
) -> Result<IterationBatch<E>> {
    let plan = ScanPlan::new(&request.parent, request.range.as_ref(), request.depth)?;
    let order = request.direction.scan_order();
    let bounds = txn.bounds().clone();
    check_start(&plan, request.resume.as_ref(), order, &bounds, txn.partition())?;

    let mut cursor = ScanCursor::new(plan, order, request.resume.as_ref(), &bounds);
    let mut entries = Vec::new();
    let mut last_emitted = None;
    while let Some(visit) = cursor.next(txn)? {
        charge.charge(acct, &visit.record);
        if !visit.selected || (visit.record.tombstone && request.exclude_tombstones) {
            continue;
        }
        entries.push(emit(&visit.key, visit.record)?);
        if entries.len() >= batch_size {
            last_emitted = Some(visit.key);
            break;
        }
    }
    acct.ensure_min_read();

    let resume = match last_emitted {
        Some(key) => Some(ResumeToken::after(key)),
        None => cursor.boundary_token(&bounds),
    };
    Ok(IterationBatch { entries, resume })
}

/// The partition that must serve the next call of `request`
pub fn route(map: &PartitionMap, request: &IterationRequest) -> Result<PartitionId> {
    let plan = ScanPlan::new(&request.parent, request.range.as_ref(), request.depth)?;
    let order = request.direction.scan_order();
    Ok(map.locate(plan.start_position(request.resume.as_ref(), order), order))
}

/// Drives a scan across calls and partitions
///
/// ```
/// use partis_core::{Key, PartitionMap};
/// use partis_executor::{IterationRequest, IterationState, ResumableScan};
///
/// let map = PartitionMap::single();
/// let mut scan = ResumableScan::new(IterationRequest::new(Key::parse("users").unwrap()));
/// assert_eq!(scan.state(), &IterationState::Start);
/// let partition = scan.route(&map).unwrap().unwrap();
/// assert_eq!(partition, map.partitions().next().unwrap().0);
/// scan.advance(None);
/// assert!(scan.is_exhausted());
/// assert!(scan.next_request().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ResumableScan {
    request: IterationRequest,
    state: IterationState,
}

impl ResumableScan {
    /// Track `request`; a request already carrying a token starts in progress
    pub fn new(request: IterationRequest) -> Self {
        let state = match &request.resume {
            Some(token) => IterationState::InProgress(token.clone()),
            None => IterationState::Start,
        };
        ResumableScan { request, state }
    }

    /// Current state
    pub fn state(&self) -> &IterationState {
        &self.state
    }

    /// Has the whole range been visited?
    pub fn is_exhausted(&self) -> bool {
        self.state == IterationState::Exhausted
    }

    /// The request for the next call, or `None` when exhausted
    pub fn next_request(&self) -> Option<IterationRequest> {
        match &self.state {
            IterationState::Exhausted => None,
            IterationState::Start => Some(self.request.clone()),
            IterationState::InProgress(token) => {
                Some(self.request.clone().resume_from(token.clone()))
            }
        }
    }

    /// Partition for the next call, or `None` when exhausted
    pub fn route(&self, map: &PartitionMap) -> Result<Option<PartitionId>> {
        self.next_request()
            .map(|request| route(map, &request))
            .transpose()
    }

    /// Record the token returned by the last call
    pub fn advance(&mut self, resume: Option<ResumeToken>) {
        self.state = match resume {
            Some(token) => IterationState::InProgress(token),
            None => IterationState::Exhausted,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> Key {
        Key::parse(path).unwrap()
    }

    #[test]
    fn test_tighter_bounds() {
        let a = Bound::Included(key("a"));
        let b = Bound::Excluded(key("b"));
        assert_eq!(tighter_lower(a.clone(), b.clone()), b);
        assert_eq!(tighter_upper(a.clone(), b.clone()), a);
        assert_eq!(
            tighter_lower(Bound::Included(key("a")), Bound::Excluded(key("a"))),
            Bound::Excluded(key("a"))
        );
        assert_eq!(
            tighter_upper(Bound::Unbounded, Bound::Excluded(key("z"))),
            Bound::Excluded(key("z"))
        );
    }

    #[test]
    fn test_children_window() {
        let plan = ScanPlan::new(&key("a"), None, Depth::Children).unwrap();
        assert_eq!(plan.lower, Bound::Excluded(key("a")));
        assert_eq!(plan.upper, Bound::Excluded(key("a").subtree_end().unwrap()));
        assert_eq!(plan.classify(&key("a")), Placement::Skip);
        assert_eq!(plan.classify(&key("a/b")), Placement::Select);
        assert_eq!(plan.classify(&key("a/b/c")), Placement::Deeper(key("a/b")));
    }

    #[test]
    fn test_ranged_window() {
        let range = KeyRange::new(Some("c"), false, Some("m"), true).unwrap();
        let plan = ScanPlan::new(&key("t"), Some(&range), Depth::ParentAndDescendants).unwrap();
        assert_eq!(plan.lower, Bound::Included(key("t")));
        assert_eq!(
            plan.children_lower,
            Bound::Included(key("t/c").subtree_end().unwrap())
        );
        assert_eq!(plan.classify(&key("t")), Placement::Select);
        assert_eq!(plan.classify(&key("t/c/x")), Placement::BeforeChildren);
        assert_eq!(plan.classify(&key("t/d")), Placement::Select);
        assert_eq!(plan.classify(&key("t/m/z")), Placement::Select);
    }

    #[test]
    fn test_root_window_is_unbounded_above() {
        let plan = ScanPlan::new(&Key::root(), None, Depth::Descendants).unwrap();
        assert_eq!(plan.upper, Bound::Unbounded);
        assert_eq!(
            plan.start_position(None, ScanOrder::Descending),
            Bound::Unbounded
        );
    }

    #[test]
    fn test_token_hull() {
        let range = KeyRange::between("c", "f").unwrap();
        let plan = ScanPlan::new(&key("t"), Some(&range), Depth::Children).unwrap();
        assert!(plan.admits_token(&ResumeToken::after(key("t/d"))));
        assert!(plan.admits_token(&ResumeToken::at(key("t/c"))));
        assert!(!plan.admits_token(&ResumeToken::after(key("t/a"))));
        assert!(!plan.admits_token(&ResumeToken::after(key("u"))));
    }

    #[test]
    fn test_resumable_scan_states() {
        let mut scan = ResumableScan::new(IterationRequest::new(key("t")));
        assert_eq!(scan.state(), &IterationState::Start);
        assert!(scan.next_request().unwrap().resume.is_none());

        scan.advance(Some(ResumeToken::after(key("t/b"))));
        assert_eq!(
            scan.next_request().unwrap().resume,
            Some(ResumeToken::after(key("t/b")))
        );

        scan.advance(None);
        assert!(scan.is_exhausted());
        assert_eq!(scan.route(&PartitionMap::single()).unwrap(), None);
    }

    #[test]
    fn test_route_follows_token() {
        let map = PartitionMap::from_split_points(vec![key("m")]).unwrap();
        let req = IterationRequest::new(Key::root());
        let first = route(&map, &req).unwrap();
        let second = route(&map, &req.clone().resume_from(ResumeToken::at(key("m")))).unwrap();
        assert_ne!(first, second);

        let reverse = req.direction(partis_core::Direction::Reverse);
        assert_eq!(route(&map, &reverse).unwrap(), second);
        let back = reverse.resume_from(ResumeToken::after(key("m")));
        assert_eq!(route(&map, &back).unwrap(), first);
    }
}
