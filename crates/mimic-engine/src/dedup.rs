// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Fixed-size ring buffer of recently-processed transaction ids. A
//! replayed transaction older than the window re-applies — accepted
//! behavior, not a bug.

use std::collections::{HashSet, VecDeque};

use mimic_core::TransactionId;

pub struct DedupRingBuffer {
    order: VecDeque<TransactionId>,
    members: HashSet<TransactionId>,
    capacity: usize,
}

impl DedupRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity.min(4096)),
            members: HashSet::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.members.contains(id)
    }

    /// Insert `id`, evicting the oldest entry first if at capacity.
    pub fn insert(&mut self, id: TransactionId) {
        if self.members.contains(&id) {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.order.push_back(id.clone());
        self.members.insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn contains_is_false_for_unseen_id() {
        let buf = DedupRingBuffer::new(4);
        assert!(!buf.contains(&TransactionId::new("t1")));
    }

    #[test]
    fn insert_then_contains_is_true() {
        let mut buf = DedupRingBuffer::new(4);
        buf.insert(TransactionId::new("t1"));
        assert!(buf.contains(&TransactionId::new("t1")));
    }

    #[test]
    fn capacity_overflow_evicts_oldest() {
        let mut buf = DedupRingBuffer::new(2);
        buf.insert(TransactionId::new("t1"));
        buf.insert(TransactionId::new("t2"));
        buf.insert(TransactionId::new("t3"));
        assert!(!buf.contains(&TransactionId::new("t1")));
        assert!(buf.contains(&TransactionId::new("t2")));
        assert!(buf.contains(&TransactionId::new("t3")));
    }

    #[test]
    fn re_inserting_an_existing_id_does_not_evict() {
        let mut buf = DedupRingBuffer::new(2);
        buf.insert(TransactionId::new("t1"));
        buf.insert(TransactionId::new("t2"));
        buf.insert(TransactionId::new("t1"));
        assert!(buf.contains(&TransactionId::new("t1")));
        assert!(buf.contains(&TransactionId::new("t2")));
    }

    proptest! {
        /// Whatever order ids arrive in, membership always matches "one of the
        /// last `capacity` distinct ids seen" — a re-insert never refreshes
        /// an id's place in the eviction order.
        #[test]
        fn retains_exactly_the_last_capacity_distinct_ids(
            raw_ids in prop::collection::vec("[a-z]{1,6}", 1..200),
            capacity in 1usize..16,
        ) {
            let mut buf = DedupRingBuffer::new(capacity);
            let mut first_seen_order = Vec::new();
            for raw in &raw_ids {
                if !first_seen_order.contains(raw) {
                    first_seen_order.push(raw.clone());
                }
                buf.insert(TransactionId::new(raw.clone()));
            }

            let retained: HashSet<&String> = first_seen_order
                .iter()
                .rev()
                .take(capacity)
                .collect();

            for raw in &first_seen_order {
                let id = TransactionId::new(raw.clone());
                prop_assert_eq!(buf.contains(&id), retained.contains(raw));
            }
            prop_assert!(first_seen_order.len().min(capacity) <= capacity);
        }
    }
}
