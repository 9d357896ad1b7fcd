//! Shared helpers: executors, stores laid out over several partitions, and a
//! driver that runs a scan to completion the way a coordinator would.

use std::collections::BTreeSet;
use std::sync::Arc;

use partis_core::{Clock, Depth, Key, KeyRange, PartitionId, PartitionMap, Timestamp};
use partis_storage::MemoryStore;

use crate::iteration;
use crate::{
    DeleteOp, Error, Executor, ExecutorConfig, GrantAuthorizer, HandlerRegistry,
    IterationRequest, OpResult, Operation, PutOp, ResumableScan, Result, Subject,
};

pub fn key(path: &str) -> Key {
    Key::parse(path).unwrap()
}

pub fn admin() -> Subject {
    Subject::superuser("admin")
}

pub fn executor() -> Executor {
    executor_with(ExecutorConfig::default())
}

pub fn executor_with(config: ExecutorConfig) -> Executor {
    Executor::new(config, Arc::new(GrantAuthorizer::default())).unwrap()
}

/// Executor whose handlers read time from `clock`
pub fn executor_with_clock(clock: Arc<dyn Clock>) -> Executor {
    let registry = HandlerRegistry::builder(ExecutorConfig::default())
        .clock(clock)
        .build()
        .unwrap();
    Executor::with_registry(Arc::new(registry), Arc::new(GrantAuthorizer::default()))
}

/// Start of hour 10, plus one millisecond
pub fn ten_hours() -> Timestamp {
    Timestamp::from_millis(10 * 3_600_000 + 1)
}

// =============================================================================
// Cluster
// =============================================================================

/// A memory store plus the executor that serves it
pub struct Cluster {
    pub store: MemoryStore,
    pub executor: Executor,
}

impl Cluster {
    pub fn single() -> Self {
        Cluster {
            store: MemoryStore::single(),
            executor: executor(),
        }
    }

    pub fn split(points: &[&str]) -> Self {
        let map = PartitionMap::from_split_points(points.iter().map(|p| key(p)).collect()).unwrap();
        Cluster {
            store: MemoryStore::new(map),
            executor: executor(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.executor = executor_with(config);
        self
    }

    pub fn partition_of(&self, path: &str) -> PartitionId {
        self.store.partition_map().partition_for(&key(path))
    }

    /// Run `op` in its own transaction on `partition`, committing on success
    pub fn run(&self, op: &mut Operation, partition: PartitionId) -> Result<OpResult> {
        let mut txn = self.store.begin(partition)?;
        let result = self.executor.execute(&admin(), op, &mut txn, partition)?;
        txn.commit()?;
        Ok(result)
    }

    pub fn put(&self, path: &str, value: &[u8]) {
        let mut op = Operation::put(PutOp::new(key(path), value.to_vec()));
        self.run(&mut op, self.partition_of(path)).unwrap();
    }

    pub fn tombstone(&self, path: &str) {
        let mut op = Operation::delete(DeleteOp::new(key(path)).with_tombstone());
        match self.run(&mut op, self.partition_of(path)).unwrap() {
            OpResult::Delete { deleted, .. } => assert!(deleted, "no live record at {}", path),
            other => panic!("expected Delete, got {:?}", other),
        }
    }

    pub fn get(&self, path: &str) -> OpResult {
        let mut op = Operation::get(key(path));
        self.run(&mut op, self.partition_of(path)).unwrap()
    }

    /// Every call of a scan, routed per call
    pub fn scan(&self, request: IterationRequest, keys_only: bool) -> Result<ScanRun> {
        let mut scan = ResumableScan::new(request);
        let mut run = ScanRun::default();
        while let Some(next) = scan.next_request() {
            let partition = iteration::route(self.store.partition_map(), &next)?;
            let limit = next.batch_size as usize;
            let mut op = if keys_only {
                Operation::keys_iterate(next)
            } else {
                Operation::iterate(next)
            };
            let before = run.entries.len();
            let resume = match self.run(&mut op, partition)? {
                OpResult::Iterate(batch) => {
                    run.entries
                        .extend(batch.entries.into_iter().map(|e| (e.key, e.tombstone)));
                    batch.resume
                }
                OpResult::KeysIterate(batch) => {
                    run.entries
                        .extend(batch.entries.into_iter().map(|e| (e.key, e.tombstone)));
                    batch.resume
                }
                other => return Err(Error::internal(format!("unexpected {:?}", other))),
            };
            if limit > 0 {
                assert!(run.entries.len() - before <= limit, "batch over {}", limit);
            }
            run.calls += 1;
            run.read_units += op.throughput().read_units();
            assert!(run.calls <= 10_000, "scan did not terminate");
            scan.advance(resume);
        }
        Ok(run)
    }
}

/// Everything a completed scan returned
#[derive(Debug, Default)]
pub struct ScanRun {
    /// `(key, tombstone)` in the order received
    pub entries: Vec<(Key, bool)>,
    pub calls: usize,
    pub read_units: u32,
}

impl ScanRun {
    pub fn keys(&self) -> Vec<Key> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn rendered(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(k, tombstone)| {
                if *tombstone {
                    format!("{}†", k)
                } else {
                    k.to_string()
                }
            })
            .collect()
    }
}

// =============================================================================
// Selection model
// =============================================================================

/// Keys of `stored` a scan over `parent` selects, ascending
///
/// Judged one key at a time, independently of how the handlers compute their
/// key windows.
pub fn expected_selection(
    stored: &BTreeSet<Key>,
    parent: &Key,
    range: Option<&KeyRange>,
    depth: Depth,
) -> Vec<Key> {
    stored
        .iter()
        .filter(|k| {
            if *k == parent {
                return depth.includes_parent();
            }
            if !parent.is_prefix_of(k) {
                return false;
            }
            let child = &k.components()[parent.len()];
            let in_range = range.map_or(true, |r| r.contains(child));
            in_range && (k.len() == parent.len() + 1 || depth.includes_descendants())
        })
        .cloned()
        .collect()
}
