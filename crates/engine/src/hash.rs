//! Hash container engine: packed-entry-seq for small hashes, promoting to
//! a [`Dict`] once the field count or any field/value length crosses the
//! configured threshold.

use ks_core::numeric::{parse_finite_f64, parse_strict_i64};
use ks_core::{EngineConfig, EngineError, EngineResult};
use ks_dict::Dict;
use ks_ziplist::{End, Entry, PackedEntrySeq};

fn entry_bytes(entry: Entry) -> Vec<u8> {
    match entry {
        Entry::Bytes(b) => b,
        Entry::Int(i) => i.to_string().into_bytes(),
    }
}

enum Body {
    Listpack(PackedEntrySeq),
    Hashtable(Dict<Vec<u8>, Vec<u8>>),
}

/// The internal representation currently in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashEncoding {
    /// Packed, cache-friendly representation for small hashes.
    Listpack,
    /// Full hash table, used once the hash outgrows the listpack limits.
    Hashtable,
}

/// A Redis-style hash value.
pub struct HashEngine {
    body: Body,
}

impl HashEngine {
    /// Create an empty hash, starting in the packed encoding.
    pub fn new() -> Self {
        HashEngine {
            body: Body::Listpack(PackedEntrySeq::new()),
        }
    }

    /// The encoding currently in use.
    pub fn encoding(&self) -> HashEncoding {
        match self.body {
            Body::Listpack(_) => HashEncoding::Listpack,
            Body::Hashtable(_) => HashEncoding::Hashtable,
        }
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        match &self.body {
            Body::Listpack(seq) => seq.len() / 2,
            Body::Hashtable(dict) => dict.len(),
        }
    }

    /// Whether the hash holds no fields.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a field's value.
    pub fn get(&self, field: &[u8]) -> Option<Vec<u8>> {
        match &self.body {
            Body::Listpack(seq) => {
                let mut cursor = seq.first();
                while let Some(c) = cursor {
                    if seq.compare(c, field) {
                        let value_cursor = seq.next(c)?;
                        return Some(entry_bytes(seq.get(value_cursor)));
                    }
                    cursor = seq.next(c).and_then(|v| seq.next(v));
                }
                None
            }
            Body::Hashtable(dict) => dict.find(&field.to_vec()).cloned(),
        }
    }

    /// Whether `field` is present.
    pub fn contains(&self, field: &[u8]) -> bool {
        self.get(field).is_some()
    }

    fn field_cursor(seq: &PackedEntrySeq, field: &[u8]) -> Option<ks_ziplist::Cursor> {
        let mut cursor = seq.first();
        while let Some(c) = cursor {
            if seq.compare(c, field) {
                return Some(c);
            }
            cursor = seq.next(c).and_then(|v| seq.next(v));
        }
        None
    }

    /// Set `field` to `value`. Returns `true` if the field was newly
    /// created. May convert the encoding to `Hashtable`.
    pub fn set(&mut self, field: &[u8], value: &[u8], config: &EngineConfig) -> bool {
        let created = match &mut self.body {
            Body::Listpack(seq) => {
                if let Some(fc) = Self::field_cursor(seq, field) {
                    let vc = seq.next(fc).expect("field entry always has a paired value");
                    seq.delete_at(vc);
                    seq.insert_after(fc, value);
                    false
                } else {
                    seq.push(End::Tail, field);
                    seq.push(End::Tail, value);
                    true
                }
            }
            Body::Hashtable(dict) => dict.replace(field.to_vec(), value.to_vec()).is_none(),
        };
        self.maybe_convert(config);
        created
    }

    /// Remove `field`. Returns `true` if it was present.
    pub fn delete(&mut self, field: &[u8]) -> bool {
        match &mut self.body {
            Body::Listpack(seq) => match Self::field_cursor(seq, field) {
                Some(fc) => {
                    seq.delete_range(fc, 2);
                    true
                }
                None => false,
            },
            Body::Hashtable(dict) => dict.delete(&field.to_vec()),
        }
    }

    /// Apply a signed integer delta to a field's value (creating it at
    /// `0` first if absent).
    pub fn incr_by(&mut self, field: &[u8], delta: i64, config: &EngineConfig) -> EngineResult<i64> {
        let current = match self.get(field) {
            Some(bytes) => parse_strict_i64(&bytes).ok_or(EngineError::NotInteger)?,
            None => 0,
        };
        let next = current.checked_add(delta).ok_or(EngineError::Overflow)?;
        self.set(field, next.to_string().as_bytes(), config);
        Ok(next)
    }

    /// Apply a floating-point delta to a field's value (creating it at
    /// `0` first if absent). The command layer replicates this downstream
    /// as an equivalent `set` rather than the delta itself, to avoid
    /// precision drift across replicas.
    pub fn incr_by_float(&mut self, field: &[u8], delta: f64, config: &EngineConfig) -> EngineResult<f64> {
        let current = match self.get(field) {
            Some(bytes) => parse_finite_f64(&bytes).ok_or(EngineError::NotFloat)?,
            None => 0.0,
        };
        let next = current + delta;
        if !next.is_finite() {
            return Err(EngineError::Overflow);
        }
        let rendered = if next.fract() == 0.0 && next.abs() < 1e17 {
            format!("{}", next as i64)
        } else {
            format!("{next}")
        };
        self.set(field, rendered.as_bytes(), config);
        Ok(next)
    }

    /// Byte length of a field's value, or `None` if the field is absent.
    pub fn value_length(&self, field: &[u8]) -> Option<usize> {
        self.get(field).map(|v| v.len())
    }

    /// All `(field, value)` pairs.
    pub fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        match &self.body {
            Body::Listpack(seq) => {
                let mut out = Vec::with_capacity(seq.len() / 2);
                let mut cursor = seq.first();
                while let Some(fc) = cursor {
                    let vc = seq.next(fc).expect("field entry always has a paired value");
                    out.push((entry_bytes(seq.get(fc)), entry_bytes(seq.get(vc))));
                    cursor = seq.next(vc);
                }
                out
            }
            Body::Hashtable(dict) => dict.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    fn maybe_convert(&mut self, config: &EngineConfig) {
        let should_convert = match &self.body {
            Body::Listpack(seq) => {
                seq.len() > config.hash_max_listpack_entries * 2
                    || seq.iter().any(|e| match e {
                        Entry::Bytes(b) => b.len() > config.hash_max_listpack_value,
                        Entry::Int(_) => false,
                    })
            }
            Body::Hashtable(_) => false,
        };
        if !should_convert {
            return;
        }
        if let Body::Listpack(seq) = &self.body {
            let mut dict = Dict::new();
            let mut cursor = seq.first();
            while let Some(fc) = cursor {
                let vc = seq.next(fc).expect("field entry always has a paired value");
                dict.replace(entry_bytes(seq.get(fc)), entry_bytes(seq.get(vc)));
                cursor = seq.next(vc);
            }
            tracing::debug!(fields = dict.len(), "hash converted to hashtable encoding");
            self.body = Body::Hashtable(dict);
        }
    }
}

impl Default for HashEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete_roundtrip() {
        let cfg = EngineConfig::default();
        let mut h = HashEngine::new();
        assert!(h.set(b"f1", b"v1", &cfg));
        assert!(!h.set(b"f1", b"v1-updated", &cfg));
        assert_eq!(h.get(b"f1"), Some(b"v1-updated".to_vec()));
        assert!(h.delete(b"f1"));
        assert_eq!(h.get(b"f1"), None);
    }

    #[test]
    fn converts_to_hashtable_past_entry_threshold() {
        let mut cfg = EngineConfig::default();
        cfg.hash_max_listpack_entries = 4;
        let mut h = HashEngine::new();
        for i in 0..4 {
            h.set(format!("f{i}").as_bytes(), b"v", &cfg);
        }
        assert_eq!(h.encoding(), HashEncoding::Listpack);
        h.set(b"f4", b"v", &cfg);
        assert_eq!(h.encoding(), HashEncoding::Hashtable);
        assert_eq!(h.len(), 5);
    }

    #[test]
    fn converts_to_hashtable_past_value_length_threshold() {
        let mut cfg = EngineConfig::default();
        cfg.hash_max_listpack_value = 4;
        let mut h = HashEngine::new();
        h.set(b"f", b"short", &cfg);
        assert_eq!(h.encoding(), HashEncoding::Listpack);
        h.set(b"g", b"this is definitely too long", &cfg);
        assert_eq!(h.encoding(), HashEncoding::Hashtable);
    }

    #[test]
    fn incr_by_creates_and_accumulates() {
        let cfg = EngineConfig::default();
        let mut h = HashEngine::new();
        assert_eq!(h.incr_by(b"counter", 5, &cfg), Ok(5));
        assert_eq!(h.incr_by(b"counter", -2, &cfg), Ok(3));
        h.set(b"nan", b"not-a-number", &cfg);
        assert_eq!(h.incr_by(b"nan", 1, &cfg), Err(EngineError::NotInteger));
    }

    #[test]
    fn incr_by_float_accumulates_and_rejects_non_numeric() {
        let cfg = EngineConfig::default();
        let mut h = HashEngine::new();
        assert_eq!(h.incr_by_float(b"counter", 1.5, &cfg), Ok(1.5));
        assert_eq!(h.incr_by_float(b"counter", 0.5, &cfg), Ok(2.0));
        assert_eq!(h.get(b"counter"), Some(b"2".to_vec()));
        h.set(b"nan", b"not-a-number", &cfg);
        assert_eq!(h.incr_by_float(b"nan", 1.0, &cfg), Err(EngineError::NotFloat));
    }

    #[test]
    fn value_length_reports_byte_length() {
        let cfg = EngineConfig::default();
        let mut h = HashEngine::new();
        h.set(b"f", b"hello", &cfg);
        assert_eq!(h.value_length(b"f"), Some(5));
        assert_eq!(h.value_length(b"missing"), None);
    }

    #[test]
    fn entries_survive_conversion() {
        let mut cfg = EngineConfig::default();
        cfg.hash_max_listpack_entries = 2;
        let mut h = HashEngine::new();
        for i in 0..10 {
            h.set(format!("f{i}").as_bytes(), format!("v{i}").as_bytes(), &cfg);
        }
        assert_eq!(h.encoding(), HashEncoding::Hashtable);
        let mut entries = h.entries();
        entries.sort();
        assert_eq!(entries.len(), 10);
        assert_eq!(h.get(b"f3"), Some(b"v3".to_vec()));
    }
}
