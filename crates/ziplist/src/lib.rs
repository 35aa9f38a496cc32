//! `PackedEntrySeq`: a contiguous byte buffer of length-prefixed entries.
//!
//! This is the `ziplist`-like collaborator the quicklist, hash, and
//! sorted-set engines build on: entries carry either a short byte string
//! or a small integer, packed back to back with no per-entry heap
//! allocation. Every entry also carries the byte length of the entry
//! immediately before it ("prevlen"), so the sequence can be walked in
//! either direction from any entry without an auxiliary index.
//!
//! ## Layout
//!
//! ```text
//! [ prevlen | header | payload ] [ prevlen | header | payload ] ...
//! ```
//!
//! - `prevlen` is 1 byte for predecessor entries under 254 bytes total, or
//!   a marker byte (`254`) followed by a 4-byte little-endian `u32` for
//!   larger ones. It stores the *total* on-disk size of the predecessor
//!   entry (prevlen field included), so the predecessor's start is simply
//!   `this_entry_start - prevlen_value`.
//! - `header` distinguishes integers (`0xFF` tag + 8-byte LE `i64`) from
//!   strings, which use a 1/2/5-byte length encoding depending on size.
//!
//! A cursor is a byte offset of an entry's `prevlen` field. **Every cursor
//! is invalidated by any mutation** and must be re-derived — callers that
//! need to keep iterating across a mutation should re-resolve their
//! position via `next`/`prev` relative to a cursor obtained *after* the
//! mutation.

use ks_core::numeric::parse_strict_i64;

mod entry;

pub use entry::Entry;
use entry::{read_header, read_prevlen, write_prevlen, EntryHeader, PREVLEN_MARKER};

/// Byte offset of an entry's `prevlen` field within the packed buffer.
pub type Cursor = usize;

/// Which end of the sequence to operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    /// The first entry.
    Head,
    /// The last entry.
    Tail,
}

/// A contiguous, length-prefixed sequence of entries.
#[derive(Debug, Clone, Default)]
pub struct PackedEntrySeq {
    buf: Vec<u8>,
    count: usize,
}

impl PackedEntrySeq {
    /// Create an empty sequence.
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            count: 0,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the sequence holds no entries.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Total packed byte length of the sequence.
    pub fn byte_len(&self) -> usize {
        self.buf.len()
    }

    /// Cursor of the first entry, if any.
    pub fn first(&self) -> Option<Cursor> {
        if self.buf.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    /// Cursor of the last entry, if any.
    pub fn last(&self) -> Option<Cursor> {
        if self.buf.is_empty() {
            return None;
        }
        let mut c = 0;
        loop {
            match self.next(c) {
                Some(n) => c = n,
                None => return Some(c),
            }
        }
    }

    /// Cursor of the entry following `cursor`, or `None` at the tail.
    pub fn next(&self, cursor: Cursor) -> Option<Cursor> {
        let (_, prevlen_width) = read_prevlen(&self.buf, cursor);
        let header = read_header(&self.buf, cursor + prevlen_width);
        let next = cursor + prevlen_width + header.header_len + header.payload_len;
        if next >= self.buf.len() {
            None
        } else {
            Some(next)
        }
    }

    /// Cursor of the entry preceding `cursor`, or `None` at the head.
    pub fn prev(&self, cursor: Cursor) -> Option<Cursor> {
        let (prevlen, _) = read_prevlen(&self.buf, cursor);
        if prevlen == 0 {
            None
        } else {
            Some(cursor - prevlen)
        }
    }

    /// Resolve a logical 0-based index to a cursor. Negative indices count
    /// from the tail (`-1` is the last entry).
    pub fn index(&self, i: i64) -> Option<Cursor> {
        if self.count == 0 {
            return None;
        }
        if i >= 0 {
            let i = i as usize;
            if i >= self.count {
                return None;
            }
            let mut c = self.first()?;
            for _ in 0..i {
                c = self.next(c)?;
            }
            Some(c)
        } else {
            let from_tail = (-i) as usize;
            if from_tail > self.count {
                return None;
            }
            let mut c = self.last()?;
            for _ in 0..(from_tail - 1) {
                c = self.prev(c)?;
            }
            Some(c)
        }
    }

    /// Decode the entry at `cursor`.
    pub fn get(&self, cursor: Cursor) -> Entry {
        let (_, prevlen_width) = read_prevlen(&self.buf, cursor);
        let header = read_header(&self.buf, cursor + prevlen_width);
        let payload_start = cursor + prevlen_width + header.header_len;
        let payload = &self.buf[payload_start..payload_start + header.payload_len];
        match header.kind {
            entry::EntryKind::Int => {
                let mut b = [0u8; 8];
                b.copy_from_slice(payload);
                Entry::Int(i64::from_le_bytes(b))
            }
            entry::EntryKind::Str => Entry::Bytes(payload.to_vec()),
        }
    }

    /// Compare the entry at `cursor` against `bytes` without allocating
    /// when the entry is integer-encoded but `bytes` also parses as the
    /// same integer.
    pub fn compare(&self, cursor: Cursor, bytes: &[u8]) -> bool {
        match self.get(cursor) {
            Entry::Bytes(b) => b == bytes,
            Entry::Int(i) => match parse_strict_i64(bytes) {
                Some(j) => i == j,
                None => false,
            },
        }
    }

    /// Total on-disk size (prevlen field included) of the entry at `cursor`.
    fn entry_total_size(&self, cursor: Cursor) -> usize {
        let (_, prevlen_width) = read_prevlen(&self.buf, cursor);
        let header = read_header(&self.buf, cursor + prevlen_width);
        prevlen_width + header.header_len + header.payload_len
    }

    /// Encode `data` (auto-detecting integers) plus its prevlen field given
    /// the predecessor's total size, returning the bytes to splice in.
    fn encode_entry(data: &[u8], predecessor_total_size: usize) -> Vec<u8> {
        let header = match parse_strict_i64(data) {
            Some(i) => EntryHeader::for_int(i),
            None => EntryHeader::for_bytes(data),
        };
        let mut out = Vec::with_capacity(5 + header.header_len + header.payload_len);
        write_prevlen(&mut out, predecessor_total_size);
        header.write_header(&mut out);
        header.write_payload(&mut out, data);
        out
    }

    /// Push a new entry at either end.
    pub fn push(&mut self, end: End, data: &[u8]) -> Cursor {
        match end {
            End::Tail => {
                let pred_size = self.last().map(|c| self.entry_total_size(c)).unwrap_or(0);
                let cursor = self.buf.len();
                let bytes = Self::encode_entry(data, pred_size);
                self.buf.extend_from_slice(&bytes);
                self.count += 1;
                cursor
            }
            End::Head => self.insert_before(self.first(), data),
        }
    }

    /// Insert `data` immediately before `cursor` (or at the tail if `cursor`
    /// is `None`), returning the cursor of the newly inserted entry.
    pub fn insert_before(&mut self, cursor: Option<Cursor>, data: &[u8]) -> Cursor {
        let Some(cursor) = cursor else {
            return self.push(End::Tail, data);
        };
        let pred_size = self.prev(cursor).map(|c| self.entry_total_size(c)).unwrap_or(0);
        let bytes = Self::encode_entry(data, pred_size);
        let inserted_len = bytes.len();
        self.buf.splice(cursor..cursor, bytes);
        self.count += 1;
        // The entry that used to start at `cursor` (now shifted forward by
        // `inserted_len`) must have its prevlen field updated to point at
        // the entry we just inserted (whose size we already know exactly),
        // which may itself cascade further down the buffer.
        self.cascade_fix(cursor + inserted_len, inserted_len);
        cursor
    }

    /// Insert `data` immediately after `cursor`.
    pub fn insert_after(&mut self, cursor: Cursor, data: &[u8]) -> Cursor {
        match self.next(cursor) {
            Some(next) => self.insert_before(Some(next), data),
            None => self.push(End::Tail, data),
        }
    }

    /// Delete the entry at `cursor`, returning the cursor that now occupies
    /// its position (the following entry), if any.
    pub fn delete_at(&mut self, cursor: Cursor) -> Option<Cursor> {
        // Capture the deleted entry's own predecessor size before its
        // (still-valid) prevlen field is removed along with it.
        let pred_size = self.prev(cursor).map(|c| self.entry_total_size(c)).unwrap_or(0);
        let total = self.entry_total_size(cursor);
        self.buf.drain(cursor..cursor + total);
        self.count -= 1;
        if cursor >= self.buf.len() {
            None
        } else {
            self.cascade_fix(cursor, pred_size);
            Some(cursor)
        }
    }

    /// Delete `count` entries starting at `start` (forward direction).
    /// Returns the number of entries actually deleted.
    pub fn delete_range(&mut self, start: Cursor, count: usize) -> usize {
        let mut cursor = Some(start);
        let mut deleted = 0;
        while deleted < count {
            match cursor {
                Some(c) => {
                    cursor = self.delete_at(c);
                    deleted += 1;
                }
                None => break,
            }
        }
        deleted
    }

    /// Rewrite the `prevlen` field at `cursor` to `actual_pred_size` (the
    /// now-correct size of its predecessor), and keep propagating forward
    /// as long as the rewrite itself changes this entry's total on-disk
    /// size (crossing the 1-byte/5-byte prevlen-width boundary). Terminates
    /// as soon as a rewrite is a no-op or the tail is reached.
    fn cascade_fix(&mut self, mut cursor: Cursor, mut actual_pred_size: usize) {
        loop {
            if cursor >= self.buf.len() {
                return;
            }
            let (stored_pred_size, old_width) = read_prevlen(&self.buf, cursor);
            if stored_pred_size == actual_pred_size {
                return;
            }
            let new_width = if actual_pred_size < PREVLEN_MARKER as usize {
                1
            } else {
                5
            };
            let mut encoded = Vec::with_capacity(new_width);
            write_prevlen(&mut encoded, actual_pred_size);
            self.buf.splice(cursor..cursor + old_width, encoded);
            if new_width == old_width {
                return;
            }
            // This entry's total size shifted by the prevlen-width delta;
            // the entry after it now has a stale prevlen in turn.
            let header = read_header(&self.buf, cursor + new_width);
            let new_total = new_width + header.header_len + header.payload_len;
            let next_cursor = cursor + new_total;
            actual_pred_size = new_total;
            cursor = next_cursor;
        }
    }

    /// Merge two sequences, consuming both and returning the concatenation
    /// of `a` followed by `b`.
    pub fn merge(a: PackedEntrySeq, b: PackedEntrySeq) -> PackedEntrySeq {
        if a.is_empty() {
            return b;
        }
        if b.is_empty() {
            return a;
        }
        let pred_size = a.last().map(|c| a.entry_total_size(c)).unwrap_or(0);
        let mut merged = a;
        let boundary = merged.buf.len();
        merged.buf.extend_from_slice(&b.buf);
        merged.count += b.count;
        merged.cascade_fix(boundary, pred_size);
        merged
    }

    /// Raw packed bytes, for callers (the quicklist node compressor) that
    /// need to serialize the whole sequence opaquely.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Rebuild a sequence from bytes previously returned by
    /// [`PackedEntrySeq::as_bytes`] together with the entry count they held.
    pub fn from_raw(buf: Vec<u8>, count: usize) -> Self {
        PackedEntrySeq { buf, count }
    }

    /// Iterate entries from head to tail.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            seq: self,
            cursor: self.first(),
        }
    }
}

/// Forward iterator over a [`PackedEntrySeq`].
pub struct Iter<'a> {
    seq: &'a PackedEntrySeq,
    cursor: Option<Cursor>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        let c = self.cursor?;
        let entry = self.seq.get(c);
        self.cursor = self.seq.next(c);
        Some(entry)
    }
}

/// Estimate the on-disk size an entry of `payload_len` bytes would occupy,
/// including its prevlen field, using the worst case (5-byte prevlen).
/// Used by the quicklist's node-fit policy, which only needs an estimate,
/// not an exact figure (mutations may still cascade-update neighbours).
pub fn estimate_entry_size(payload_len: usize) -> usize {
    let header_len = if payload_len < 64 {
        1
    } else if payload_len < 16384 {
        2
    } else {
        5
    };
    5 + header_len + payload_len
}
