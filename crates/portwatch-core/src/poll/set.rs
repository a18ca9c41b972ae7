//! ID-keyed descriptor sets.

use std::time::Duration;

use super::{CHUNK_SLICE_MS, DEFAULT_CAPACITY, WaitPrimitive, Waitable, native, wait_all};
use crate::config::PollConfig;
use crate::error::{Error, Result};

/// One registered object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// Caller-chosen identifier, unique within the set.
    pub id: u32,
    /// The object waited on.
    pub waitable: Waitable,
}

/// A bounded collection of `(id, waitable)` pairs polled together.
///
/// IDs are unique. Insertion order is preserved and poll results list IDs
/// in that order.
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    entries: Vec<Entry>,
    capacity: usize,
    chunk_slice_ms: i32,
}

impl Default for DescriptorSet {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorSet {
    /// Creates an empty set with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty set accepting at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
            chunk_slice_ms: CHUNK_SLICE_MS,
        }
    }

    /// Creates an empty set sized and tuned by `config`.
    #[must_use]
    pub fn from_config(config: &PollConfig) -> Self {
        Self {
            entries: Vec::new(),
            capacity: config.descriptor_capacity,
            chunk_slice_ms: config.chunk_slice_ms,
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Registers `waitable` under `id`.
    ///
    /// Fails with `Invalid` when the set is full, `id` is already present, or
    /// the waitable cannot name an object. The set is unchanged on failure.
    pub fn add(&mut self, id: u32, waitable: Waitable) -> Result<()> {
        if self.entries.len() >= self.capacity {
            return Err(Error::invalid(format!(
                "Descriptor set is full (capacity {})",
                self.capacity
            )));
        }
        if self.contains(id) {
            return Err(Error::invalid(format!("Descriptor id {id} is already in the set")));
        }
        if !waitable.is_valid() {
            return Err(Error::invalid(format!("Cannot add invalid {waitable} to descriptor set")));
        }
        self.entries.push(Entry { id, waitable });
        Ok(())
    }

    /// Removes the entry with `id`. Returns whether one was removed.
    pub fn remove(&mut self, id: u32) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Whether an entry with `id` exists.
    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// The waitable registered under `id`.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<Waitable> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.waitable)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Waits with the native primitive. See [`DescriptorSet::poll_with`].
    pub fn poll(&self, timeout_ms: i32) -> Result<Vec<u32>> {
        self.poll_with(&native(), timeout_ms)
    }

    /// Waits until at least one entry is ready or `timeout_ms` elapses.
    ///
    /// Returns the IDs of every ready entry (empty on timeout). A negative
    /// timeout waits forever, which is `Invalid` on an empty set.
    pub fn poll_with(&self, primitive: &dyn WaitPrimitive, timeout_ms: i32) -> Result<Vec<u32>> {
        if self.entries.is_empty() {
            if timeout_ms < 0 {
                return Err(Error::invalid("Cannot wait forever on an empty descriptor set"));
            }
            std::thread::sleep(Duration::from_millis(timeout_ms.unsigned_abs().into()));
            return Ok(Vec::new());
        }

        let objects: Vec<Waitable> = self.entries.iter().map(|e| e.waitable).collect();
        let ready = wait_all(primitive, &objects, timeout_ms, self.chunk_slice_ms)?;
        Ok(ready.into_iter().map(|i| self.entries[i].id).collect())
    }
}

impl<'a> IntoIterator for &'a DescriptorSet {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
