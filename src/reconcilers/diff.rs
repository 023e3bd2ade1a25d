// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record differ.
//!
//! Computes the operations that turn the observed record sets of one zone into the desired
//! ones. The differ is pure: it only looks at its arguments, and identical inputs produce
//! identical output.
//!
//! # Ordering
//!
//! Operations are stable-sorted by `(type, canonical name)`. A `Delete` of an A or CNAME record
//! is then moved in front of an `Upsert` of the other type at the same name, so the cloud never
//! holds an A and a CNAME with one name.

use crate::records::{ManagedSet, ObservedRecordSet, Op, RecordKey, RecordSet};
use std::collections::{BTreeMap, BTreeSet};

/// Compute the operations converging `observed` onto `desired`.
///
/// Observed record sets outside `managed` are ignored. Only TTL and payload are compared;
/// server-side fields such as provisioning state or metadata never force an update.
#[must_use]
pub fn diff(desired: &[RecordSet], observed: &[ObservedRecordSet], managed: &ManagedSet) -> Vec<Op> {
    let observed_by_key: BTreeMap<RecordKey, &ObservedRecordSet> = observed
        .iter()
        .filter(|record| managed.contains(record))
        .map(|record| (record.key(), record))
        .collect();

    // First desired entry per key wins
    let mut desired_keys: BTreeSet<RecordKey> = BTreeSet::new();
    let mut ops: Vec<Op> = Vec::new();

    for record in desired {
        let key = record.key();
        if !desired_keys.insert(key.clone()) {
            continue;
        }
        match observed_by_key.get(&key) {
            Some(current) if current.matches(record) => {}
            _ => ops.push(Op::Upsert(record.clone())),
        }
    }

    for (key, record) in &observed_by_key {
        if !desired_keys.contains(key) {
            ops.push(Op::Delete {
                name: record.name.clone(),
                record_type: record.record_type,
            });
        }
    }

    ops.sort_by_key(Op::sort_key);
    hoist_exclusive_deletes(ops)
}

/// Move each A/CNAME delete in front of an upsert of the other type with the same name.
fn hoist_exclusive_deletes(mut ops: Vec<Op>) -> Vec<Op> {
    let mut i = 0;
    while i < ops.len() {
        if let Op::Upsert(record) = &ops[i] {
            let key = record.key();
            let blocking = ops.iter().enumerate().skip(i + 1).find_map(|(j, op)| {
                let is_blocking = matches!(op, Op::Delete { .. })
                    && op.record_type().excludes(key.record_type)
                    && op.sort_key().1 == key.name;
                is_blocking.then_some(j)
            });
            if let Some(j) = blocking {
                let delete = ops.remove(j);
                ops.insert(i, delete);
                i += 1;
            }
        }
        i += 1;
    }
    ops
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
