//! End-to-end tests: a coordinator speaking bytes to a node
//!
//! Requests are encoded, routed to the owning partition, executed inside a
//! storage transaction and decoded again, the way a remote peer sees them.

use std::sync::Arc;

use partis::core::{Depth, Direction, Key, PartitionId, PartitionMap};
use partis::security::{KeyScope, Privilege, PrivilegeSet};
use partis::storage::MemoryStore;
use partis::wire::{decode_response, encode_operation};
use partis::{
    AccessMode, DeleteOp, Error, ErrorKind, Executor, ExecutorConfig, GrantAuthorizer,
    IterationRequest, OpResult, Operation, ProtocolVersion, PutOp, ResumableScan, Response,
    Subject,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn key(path: &str) -> Key {
    Key::parse(path).unwrap()
}

struct Node {
    store: MemoryStore,
    executor: Executor,
}

impl Node {
    fn new(split_points: &[&str], mode: AccessMode) -> Self {
        let map = PartitionMap::from_split_points(split_points.iter().map(|p| key(p)).collect())
            .unwrap();
        Node {
            store: MemoryStore::new(map),
            executor: Executor::new(ExecutorConfig::default(), Arc::new(GrantAuthorizer::new(mode)))
                .unwrap(),
        }
    }

    fn send(
        &self,
        subject: &Subject,
        op: &Operation,
        partition: PartitionId,
        version: ProtocolVersion,
    ) -> Result<Response, Error> {
        let request = encode_operation(op, version)?;
        let mut txn = self.store.begin(partition)?;
        let reply = self
            .executor
            .execute_bytes(subject, &request, version, &mut txn, partition)?;
        txn.commit()?;
        Ok(decode_response(&reply, version)?)
    }

    fn send_to_owner(&self, subject: &Subject, op: &Operation) -> Result<Response, Error> {
        let owner = match op.body() {
            partis::OperationBody::Get(get) => self.store.partition_map().partition_for(&get.key),
            partis::OperationBody::Put(put) => self.store.partition_map().partition_for(&put.key),
            partis::OperationBody::Delete(delete) => {
                self.store.partition_map().partition_for(&delete.key)
            }
            _ => PartitionId::new(1),
        };
        self.send(subject, op, owner, ProtocolVersion::CURRENT)
    }

    /// Run a paged scan to completion, one call per batch
    fn scan(&self, subject: &Subject, request: IterationRequest) -> Result<Vec<String>, Error> {
        let mut scan = ResumableScan::new(request);
        let mut keys = Vec::new();
        while let Some(partition) = scan.route(self.store.partition_map())? {
            let next = match scan.next_request() {
                Some(next) => next,
                None => break,
            };
            let response = self.send(
                subject,
                &Operation::keys_iterate(next),
                partition,
                ProtocolVersion::CURRENT,
            )?;
            match response.result {
                OpResult::KeysIterate(batch) => {
                    keys.extend(batch.entries.iter().map(|e| e.key.to_string()));
                    scan.advance(batch.resume);
                }
                other => panic!("expected KeysIterate, got {:?}", other),
            }
        }
        Ok(keys)
    }
}

fn admin() -> Subject {
    Subject::superuser("admin")
}

fn orders_clerk() -> Subject {
    let scope = KeyScope::of(&key("orders"));
    let granted: PrivilegeSet = [
        Privilege::read(&scope),
        Privilege::insert(&scope),
        Privilege::delete(&scope),
    ]
    .into_iter()
    .collect();
    Subject::new("clerk", granted)
}

fn seed(node: &Node, subject: &Subject, paths: &[&str]) {
    for path in paths {
        let op = Operation::put(PutOp::new(key(path), path.as_bytes().to_vec()));
        node.send_to_owner(subject, &op).unwrap();
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_paged_scan_spans_partitions() {
    let node = Node::new(&["orders/g", "orders/p"], AccessMode::ReadWrite);
    let paths = [
        "orders/a", "orders/c", "orders/g", "orders/h", "orders/k", "orders/p", "orders/q",
        "orders/z",
    ];
    seed(&node, &admin(), &paths);

    let request = IterationRequest::new(key("orders"))
        .depth(Depth::Children)
        .batch_size(3);
    assert_eq!(node.scan(&admin(), request).unwrap(), paths.to_vec());

    let reverse = IterationRequest::new(key("orders"))
        .depth(Depth::Children)
        .direction(Direction::Reverse)
        .batch_size(2);
    let mut expected = paths.to_vec();
    expected.reverse();
    assert_eq!(node.scan(&admin(), reverse).unwrap(), expected);
}

#[test]
fn test_table_scoped_subject() {
    let node = Node::new(&["orders/m"], AccessMode::ReadWrite);
    let clerk = orders_clerk();
    seed(&node, &clerk, &["orders/a", "orders/z"]);

    let request = IterationRequest::new(key("orders")).depth(Depth::Children);
    assert_eq!(node.scan(&clerk, request).unwrap(), vec!["orders/a", "orders/z"]);

    let elsewhere = Operation::put(PutOp::new(key("users/a"), b"x".to_vec()));
    let err = node.send_to_owner(&clerk, &elsewhere).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(node.store.total_entries(), 2);
}

#[test]
fn test_read_only_node_refuses_writes() {
    let node = Node::new(&[], AccessMode::ReadOnly);
    let put = Operation::put(PutOp::new(key("orders/a"), b"x".to_vec()));
    let err = node.send_to_owner(&admin(), &put).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let get = Operation::get(key("orders/a"));
    let response = node.send_to_owner(&admin(), &get).unwrap();
    assert_eq!(response.result, OpResult::Get(None));
}

#[test]
fn test_misrouted_operation_is_rejected() {
    let node = Node::new(&["m"], AccessMode::ReadWrite);
    let put = Operation::put(PutOp::new(key("z"), b"x".to_vec()));
    let err = node
        .send(&admin(), &put, PartitionId::new(1), ProtocolVersion::CURRENT)
        .unwrap_err();
    assert!(matches!(err, Error::WrongPartition { .. }));
    assert_eq!(node.store.total_entries(), 0);
}

#[test]
fn test_tombstones_survive_the_wire_only_for_new_peers() {
    let node = Node::new(&[], AccessMode::ReadWrite);
    seed(&node, &admin(), &["t/a", "t/b"]);
    let tombstone = Operation::delete(DeleteOp::new(key("t/a")).with_tombstone());
    node.send_to_owner(&admin(), &tombstone).unwrap();

    let keys = Operation::keys_iterate(IterationRequest::new(key("t")).depth(Depth::Children));
    let p1 = PartitionId::new(1);

    match node.send(&admin(), &keys, p1, ProtocolVersion::V3).unwrap().result {
        OpResult::KeysIterate(batch) => {
            let flags: Vec<bool> = batch.entries.iter().map(|e| e.tombstone).collect();
            assert_eq!(flags, vec![true, false]);
        }
        other => panic!("expected KeysIterate, got {:?}", other),
    }
    match node.send(&admin(), &keys, p1, ProtocolVersion::V2).unwrap().result {
        OpResult::KeysIterate(batch) => {
            assert_eq!(batch.entries.len(), 2);
            assert!(batch.entries.iter().all(|e| !e.tombstone));
        }
        other => panic!("expected KeysIterate, got {:?}", other),
    }
}
