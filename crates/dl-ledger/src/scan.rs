//! Ordered range scans over world state.
//!
//! A [`RangeScan`] is a scoped resource: it counts as open from the moment a
//! backend hands it out until it is closed explicitly with
//! [`RangeScan::close`] or dropped. Backends share a [`ScanTracker`] with
//! every scan they issue, so a scan that outlives its operation shows up in
//! [`ScanTracker::open_scans`].

use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// A single world-state entry returned by a range scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

/// A half-open key range `[start, end)`.
///
/// An empty start means "from the first key"; an empty end means "through
/// the last key". The empty pair is the full namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    start: String,
    end: String,
}

impl KeyRange {
    /// Build a range, rejecting a start that sorts after the end.
    pub fn new(start: &str, end: &str) -> LedgerResult<Self> {
        if !start.is_empty() && !end.is_empty() && start > end {
            return Err(LedgerError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self {
            start: start.to_string(),
            end: end.to_string(),
        })
    }

    /// The unbounded range covering every key.
    pub fn full() -> Self {
        Self::default()
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }

    pub fn is_full(&self) -> bool {
        self.start.is_empty() && self.end.is_empty()
    }

    /// Whether `key` falls inside the range.
    pub fn contains(&self, key: &str) -> bool {
        (self.start.is_empty() || key >= self.start.as_str())
            && (self.end.is_empty() || key < self.end.as_str())
    }

    /// Bounds suitable for `BTreeMap::range` over `String` keys.
    pub fn bounds(&self) -> (Bound<&str>, Bound<&str>) {
        let lower = if self.start.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Included(self.start.as_str())
        };
        let upper = if self.end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(self.end.as_str())
        };
        (lower, upper)
    }
}

/// Counts range scans that have been opened but not yet released.
#[derive(Clone, Debug, Default)]
pub struct ScanTracker {
    open: Arc<AtomicUsize>,
}

impl ScanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scans currently open.
    pub fn open_scans(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    fn acquire(&self) -> ScanLease {
        self.open.fetch_add(1, Ordering::AcqRel);
        ScanLease {
            open: Arc::clone(&self.open),
        }
    }
}

/// Releases its slot in the tracker exactly once, on drop.
#[derive(Debug)]
struct ScanLease {
    open: Arc<AtomicUsize>,
}

impl Drop for ScanLease {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::AcqRel);
    }
}

/// An open, ordered iterator over a key range.
///
/// Yields entries in ascending key order. Once closed it yields nothing.
pub struct RangeScan<'a> {
    entries: Box<dyn Iterator<Item = LedgerResult<KeyValue>> + 'a>,
    lease: Option<ScanLease>,
}

impl<'a> RangeScan<'a> {
    /// Open a scan over `entries`, registering it with `tracker`.
    pub fn new<I>(entries: I, tracker: &ScanTracker) -> Self
    where
        I: IntoIterator<Item = LedgerResult<KeyValue>>,
        I::IntoIter: 'a,
    {
        Self {
            entries: Box::new(entries.into_iter()),
            lease: Some(tracker.acquire()),
        }
    }

    /// Release the scan. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.lease.take();
    }

    pub fn is_closed(&self) -> bool {
        self.lease.is_none()
    }
}

impl Iterator for RangeScan<'_> {
    type Item = LedgerResult<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.lease.is_none() {
            return None;
        }
        self.entries.next()
    }
}

impl std::fmt::Debug for RangeScan<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeScan")
            .field("closed", &self.is_closed())
            .finish()
    }
}
