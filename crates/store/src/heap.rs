//! Record heap - contiguous embedding storage keyed by primary key
//!
//! Embeddings live in one `Vec<f32>` for cache-friendly scanning; text and
//! dynamic fields sit beside the slot offset. A `BTreeMap` keyed by primary
//! key gives deterministic iteration order, which brute-force search relies
//! on for reproducible ranking.
//!
//! # Invariants
//!
//! - `slots` is the sole source of truth for live records
//! - a re-upserted key keeps its slot and is overwritten in place
//! - freed slots are zeroed and reused before the buffer grows

use std::collections::BTreeMap;

use ragline_core::{DocId, Metadata, Record};

/// Stored non-vector part of a record
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    /// Offset in `data`, in floats
    offset: usize,
    pub(crate) text: String,
    pub(crate) extra: Metadata,
}

/// Per-collection record storage
pub(crate) struct RecordHeap {
    dimension: usize,

    /// Layout: [r0_dim0, ..., r0_dimN, r1_dim0, ...]
    data: Vec<f32>,

    slots: BTreeMap<DocId, Slot>,

    free_slots: Vec<usize>,
}

impl RecordHeap {
    pub(crate) fn new(dimension: usize) -> Self {
        RecordHeap {
            dimension,
            data: Vec::new(),
            slots: BTreeMap::new(),
            free_slots: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Insert or overwrite a record. The caller has validated its dimension.
    ///
    /// Returns true if an existing record was replaced.
    pub(crate) fn upsert(&mut self, record: Record) -> bool {
        debug_assert_eq!(record.vector.len(), self.dimension);

        if let Some(slot) = self.slots.get_mut(&record.id) {
            let start = slot.offset;
            self.data[start..start + self.dimension].copy_from_slice(&record.vector);
            slot.text = record.text;
            slot.extra = record.extra;
            return true;
        }

        let offset = if let Some(offset) = self.free_slots.pop() {
            self.data[offset..offset + self.dimension].copy_from_slice(&record.vector);
            offset
        } else {
            let offset = self.data.len();
            self.data.extend_from_slice(&record.vector);
            offset
        };

        self.slots.insert(
            record.id,
            Slot {
                offset,
                text: record.text,
                extra: record.extra,
            },
        );
        false
    }

    /// Remove a record. Returns true if it existed.
    pub(crate) fn delete(&mut self, id: DocId) -> bool {
        match self.slots.remove(&id) {
            Some(slot) => {
                self.data[slot.offset..slot.offset + self.dimension].fill(0.0);
                self.free_slots.push(slot.offset);
                true
            }
            None => false,
        }
    }

    /// Embedding for a key
    #[cfg(test)]
    pub(crate) fn embedding(&self, id: DocId) -> Option<&[f32]> {
        let slot = self.slots.get(&id)?;
        Some(&self.data[slot.offset..slot.offset + self.dimension])
    }

    /// Reassemble the full record for a key
    pub(crate) fn get(&self, id: DocId) -> Option<Record> {
        let slot = self.slots.get(&id)?;
        Some(Record {
            id,
            vector: self.data[slot.offset..slot.offset + self.dimension].to_vec(),
            text: slot.text.clone(),
            extra: slot.extra.clone(),
        })
    }

    pub(crate) fn slot(&self, id: DocId) -> Option<&Slot> {
        self.slots.get(&id)
    }

    /// Iterate live records in ascending primary-key order
    pub(crate) fn iter(&self) -> impl Iterator<Item = (DocId, &[f32])> {
        self.slots.iter().map(|(&id, slot)| {
            (
                id,
                &self.data[slot.offset..slot.offset + self.dimension],
            )
        })
    }

    #[cfg(test)]
    fn raw_len(&self) -> usize {
        self.data.len()
    }
}
