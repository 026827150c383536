//! Read and write sets accumulated by a transaction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scan::KeyRange;

/// Buffered writes, keyed and ordered by world-state key.
///
/// `None` marks a delete.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBatch {
    writes: BTreeMap<String, Option<Vec<u8>>>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &str, value: &[u8]) {
        self.writes.insert(key.to_string(), Some(value.to_vec()));
    }

    pub fn delete(&mut self, key: &str) {
        self.writes.insert(key.to_string(), None);
    }

    /// The pending write for `key`: `Some(None)` is a pending delete,
    /// `None` means the batch does not touch the key.
    pub fn get(&self, key: &str) -> Option<Option<&[u8]>> {
        self.writes.get(key).map(|w| w.as_deref())
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&[u8]>)> {
        self.writes.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

/// A range scanned by a transaction and the `(key, version)` pairs it saw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeRead {
    pub range: KeyRange,
    pub observed: Vec<(String, u64)>,
}

/// Versions observed by a transaction, validated at commit.
///
/// A point read records the version the key had (`None` if absent). The first
/// observation of a key wins; later reads of the same key see the same
/// committed state or the transaction's own writes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadSet {
    points: BTreeMap<String, Option<u64>>,
    ranges: Vec<RangeRead>,
}

impl ReadSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: &str, version: Option<u64>) {
        self.points.entry(key.to_string()).or_insert(version);
    }

    pub fn record_range(&mut self, range: KeyRange, observed: Vec<(String, u64)>) {
        self.ranges.push(RangeRead { range, observed });
    }

    pub fn points(&self) -> impl Iterator<Item = (&str, Option<u64>)> {
        self.points.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn ranges(&self) -> &[RangeRead] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_write_to_same_key_wins() {
        let mut batch = WriteBatch::new();
        batch.put("a", b"1");
        batch.delete("a");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.get("a"), Some(None));

        batch.put("a", b"2");
        assert_eq!(batch.get("a"), Some(Some(&b"2"[..])));
        assert_eq!(batch.get("b"), None);
    }

    #[test]
    fn batch_iterates_in_key_order() {
        let mut batch = WriteBatch::new();
        batch.put("b", b"2");
        batch.put("a", b"1");
        batch.delete("c");
        let keys: Vec<&str> = batch.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn first_observed_version_is_kept() {
        let mut reads = ReadSet::new();
        reads.record("a", Some(3));
        reads.record("a", Some(7));
        reads.record("b", None);
        let points: Vec<_> = reads.points().collect();
        assert_eq!(points, vec![("a", Some(3)), ("b", None)]);
    }
}
