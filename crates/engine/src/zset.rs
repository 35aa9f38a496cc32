//! Sorted set container engine: a packed entry sequence for small sets,
//! promoting to a score [`Dict`] paired with an [`OrderedScoreIndex`] skip
//! list once the set outgrows the packed limits.

use ks_core::{EngineConfig, EngineError, EngineResult};
use ks_dict::Dict;
use ks_skiplist::{LexBound, OrderedScoreIndex, ScoreBound};
use ks_ziplist::{End, Entry, PackedEntrySeq};

fn entry_string(entry: Entry) -> String {
    match entry {
        Entry::Bytes(b) => String::from_utf8_lossy(&b).into_owned(),
        Entry::Int(i) => i.to_string(),
    }
}

fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.abs() < 1e17 {
        format!("{}", score as i64)
    } else {
        format!("{score}")
    }
}

fn listpack_find(seq: &PackedEntrySeq, member: &str) -> Option<(ks_ziplist::Cursor, f64)> {
    let mut cursor = seq.first();
    while let Some(c) = cursor {
        if seq.compare(c, member.as_bytes()) {
            let sc = seq.next(c).expect("member entry always has a paired score");
            let score: f64 = entry_string(seq.get(sc)).parse().unwrap_or(0.0);
            return Some((c, score));
        }
        cursor = seq.next(c).and_then(|v| seq.next(v));
    }
    None
}

fn all_pairs_listpack(seq: &PackedEntrySeq) -> Vec<(String, f64)> {
    let mut out = Vec::with_capacity(seq.len() / 2);
    let mut cursor = seq.first();
    while let Some(mc) = cursor {
        let sc = seq.next(mc).expect("member entry always has a paired score");
        let member = entry_string(seq.get(mc));
        let score: f64 = entry_string(seq.get(sc)).parse().unwrap_or(0.0);
        out.push((member, score));
        cursor = seq.next(sc);
    }
    out
}

/// Insert `member`/`score` at the position that keeps the sequence ordered
/// by `(score, member)`, the same order [`OrderedScoreIndex`] maintains for
/// the skiplist encoding. Kept as an invariant of the stored bytes rather
/// than sorted only on read, so a direct dump of the packed sequence is
/// already in rank order.
fn listpack_insert_sorted(seq: &mut PackedEntrySeq, member: &str, score: f64) {
    let mut cursor = seq.first();
    while let Some(mc) = cursor {
        let sc = seq.next(mc).expect("member entry always has a paired score");
        let existing_member = entry_string(seq.get(mc));
        let existing_score: f64 = entry_string(seq.get(sc)).parse().unwrap_or(0.0);
        if (existing_score, existing_member.as_str()) > (score, member) {
            let inserted = seq.insert_before(Some(mc), member.as_bytes());
            seq.insert_after(inserted, format_score(score).as_bytes());
            return;
        }
        cursor = seq.next(sc);
    }
    seq.push(End::Tail, member.as_bytes());
    seq.push(End::Tail, format_score(score).as_bytes());
}

struct Big {
    scores: Dict<String, f64>,
    index: OrderedScoreIndex,
}

enum Body {
    Listpack(PackedEntrySeq),
    Big(Box<Big>),
}

/// The internal representation currently in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortedSetEncoding {
    /// Packed `(member, score)` pairs, for small sorted sets.
    Listpack,
    /// A score dict paired with a rank-capable skip list.
    Skiplist,
}

/// A Redis-style sorted set value.
pub struct SortedSetEngine {
    body: Body,
}

impl SortedSetEngine {
    /// Create an empty sorted set, starting in the packed encoding.
    pub fn new() -> Self {
        SortedSetEngine {
            body: Body::Listpack(PackedEntrySeq::new()),
        }
    }

    /// The encoding currently in use.
    pub fn encoding(&self) -> SortedSetEncoding {
        match &self.body {
            Body::Listpack(_) => SortedSetEncoding::Listpack,
            Body::Big(_) => SortedSetEncoding::Skiplist,
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        match &self.body {
            Body::Listpack(seq) => seq.len() / 2,
            Body::Big(big) => big.scores.len(),
        }
    }

    /// Whether the sorted set holds no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// This member's current score.
    pub fn score(&self, member: &str) -> Option<f64> {
        match &self.body {
            Body::Listpack(seq) => listpack_find(seq, member).map(|(_, score)| score),
            Body::Big(big) => big.scores.find(&member.to_string()).copied(),
        }
    }

    /// Insert or update `member`'s score. Returns the previous score, if
    /// any. May convert the encoding.
    pub fn add(&mut self, member: &str, score: f64, config: &EngineConfig) -> Option<f64> {
        let previous = match &mut self.body {
            Body::Listpack(seq) => {
                let previous = match listpack_find(seq, member) {
                    Some((c, old)) => {
                        seq.delete_range(c, 2);
                        Some(old)
                    }
                    None => None,
                };
                listpack_insert_sorted(seq, member, score);
                previous
            }
            Body::Big(big) => {
                let old = big.scores.replace(member.to_string(), score);
                if let Some(old_score) = old {
                    big.index.remove(member, old_score);
                }
                big.index.insert(member.to_string(), score);
                old
            }
        };
        self.maybe_convert(config);
        previous
    }

    /// Remove `member`. Returns `true` if it was present.
    pub fn remove(&mut self, member: &str) -> bool {
        match &mut self.body {
            Body::Listpack(seq) => match listpack_find(seq, member) {
                Some((c, _)) => {
                    seq.delete_range(c, 2);
                    true
                }
                None => false,
            },
            Body::Big(big) => match big.scores.unlink(&member.to_string()) {
                Some((m, score)) => {
                    big.index.remove(&m, score);
                    true
                }
                None => false,
            },
        }
    }

    /// This member's rank, 0-based from lowest score.
    pub fn rank(&self, member: &str) -> Option<usize> {
        match &self.body {
            Body::Listpack(seq) => {
                // The sequence is kept in (score, member) order on insert,
                // so position in the walk below is already the rank.
                let mut idx = 0;
                let mut cursor = seq.first();
                while let Some(mc) = cursor {
                    let sc = seq.next(mc).expect("member entry always has a paired score");
                    if seq.compare(mc, member.as_bytes()) {
                        return Some(idx);
                    }
                    cursor = seq.next(sc);
                    idx += 1;
                }
                None
            }
            Body::Big(big) => {
                let score = *big.scores.find(&member.to_string())?;
                big.index.rank(member, score)
            }
        }
    }

    fn sorted_pairs(&self) -> Vec<(String, f64)> {
        match &self.body {
            // Already ordered by (score, member) as a stored invariant.
            Body::Listpack(seq) => all_pairs_listpack(seq),
            Body::Big(big) => big.index.iter().map(|(m, s)| (m.to_string(), s)).collect(),
        }
    }

    /// Members and scores within rank range `[start, stop]` inclusive
    /// (negative indices count from the end).
    pub fn range_by_rank(&self, start: i64, stop: i64, rev: bool) -> Vec<(String, f64)> {
        match &self.body {
            Body::Big(big) => big.index.range_by_rank(start, stop, rev),
            Body::Listpack(_) => {
                let mut pairs = self.sorted_pairs();
                if rev {
                    pairs.reverse();
                }
                let len = pairs.len() as i64;
                if len == 0 {
                    return Vec::new();
                }
                let s = if start < 0 { (len + start).max(0) } else { start };
                let e = if stop < 0 { len + stop } else { stop.min(len - 1) };
                if s > e || s >= len || e < 0 {
                    return Vec::new();
                }
                pairs[s as usize..=(e as usize)].to_vec()
            }
        }
    }

    /// Members and scores within `[min, max]`, optionally reversed and
    /// limited.
    pub fn range_by_score(
        &self,
        min: ScoreBound,
        max: ScoreBound,
        rev: bool,
        limit: Option<(usize, usize)>,
    ) -> Vec<(String, f64)> {
        match &self.body {
            Body::Big(big) => big.index.range_by_score(min, max, rev, limit),
            Body::Listpack(_) => {
                let mut pairs = self.sorted_pairs();
                pairs.retain(|(_, s)| min.satisfies_lower(*s) && max.satisfies_upper(*s));
                if rev {
                    pairs.reverse();
                }
                apply_limit(pairs, limit)
            }
        }
    }

    /// Members and scores within a lexicographic range (valid only when
    /// every member shares the same score).
    pub fn range_by_lex(&self, min: &LexBound, max: &LexBound, rev: bool) -> Vec<(String, f64)> {
        match &self.body {
            Body::Big(big) => big.index.range_by_lex(min, max, rev),
            Body::Listpack(_) => {
                let mut pairs = self.sorted_pairs();
                pairs.retain(|(m, _)| min.satisfies_lower(m) && max.satisfies_upper(m));
                if rev {
                    pairs.reverse();
                }
                pairs
            }
        }
    }

    /// Apply a signed delta to `member`'s score (creating it at `0` first
    /// if absent). Errors if the result would not be finite.
    pub fn incr_by(&mut self, member: &str, delta: f64, config: &EngineConfig) -> EngineResult<f64> {
        let current = self.score(member).unwrap_or(0.0);
        let next = current + delta;
        if !next.is_finite() {
            return Err(EngineError::Overflow);
        }
        self.add(member, next, config);
        Ok(next)
    }

    fn maybe_convert(&mut self, config: &EngineConfig) {
        let should_convert = match &self.body {
            Body::Listpack(seq) => {
                seq.len() > config.zset_max_listpack_entries * 2
                    || seq.iter().any(|e| match e {
                        Entry::Bytes(b) => b.len() > config.zset_max_listpack_value,
                        Entry::Int(_) => false,
                    })
            }
            Body::Big(_) => false,
        };
        if !should_convert {
            return;
        }
        if let Body::Listpack(seq) = &self.body {
            let mut scores = Dict::new();
            let mut index = OrderedScoreIndex::new();
            for (member, score) in all_pairs_listpack(seq) {
                scores.replace(member.clone(), score);
                index.insert(member, score);
            }
            tracing::debug!(members = scores.len(), "sorted set converted to skiplist encoding");
            self.body = Body::Big(Box::new(Big { scores, index }));
        }
    }
}

fn apply_limit(pairs: Vec<(String, f64)>, limit: Option<(usize, usize)>) -> Vec<(String, f64)> {
    match limit {
        Some((offset, count)) => pairs.into_iter().skip(offset).take(count).collect(),
        None => pairs,
    }
}

impl Default for SortedSetEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_update_and_score_roundtrip() {
        let cfg = EngineConfig::default();
        let mut z = SortedSetEngine::new();
        assert_eq!(z.add("alice", 1.0, &cfg), None);
        assert_eq!(z.add("alice", 2.0, &cfg), Some(1.0));
        assert_eq!(z.score("alice"), Some(2.0));
    }

    #[test]
    fn rank_and_range_by_rank_reflect_score_order() {
        let cfg = EngineConfig::default();
        let mut z = SortedSetEngine::new();
        z.add("b", 2.0, &cfg);
        z.add("a", 1.0, &cfg);
        z.add("c", 3.0, &cfg);
        assert_eq!(z.rank("a"), Some(0));
        assert_eq!(z.rank("c"), Some(2));
        let all = z.range_by_rank(0, -1, false);
        assert_eq!(
            all,
            vec![("a".to_string(), 1.0), ("b".to_string(), 2.0), ("c".to_string(), 3.0)]
        );
    }

    #[test]
    fn converts_to_skiplist_past_entry_threshold() {
        let mut cfg = EngineConfig::default();
        cfg.zset_max_listpack_entries = 3;
        let mut z = SortedSetEngine::new();
        for i in 0..3 {
            z.add(&format!("m{i}"), i as f64, &cfg);
        }
        assert_eq!(z.encoding(), SortedSetEncoding::Listpack);
        z.add("m3", 3.0, &cfg);
        assert_eq!(z.encoding(), SortedSetEncoding::Skiplist);
        assert_eq!(z.len(), 4);
        assert_eq!(z.rank("m3"), Some(3));
    }

    #[test]
    fn incr_by_creates_and_accumulates() {
        let cfg = EngineConfig::default();
        let mut z = SortedSetEngine::new();
        assert_eq!(z.incr_by("x", 5.0, &cfg), Ok(5.0));
        assert_eq!(z.incr_by("x", -2.5, &cfg), Ok(2.5));
    }

    #[test]
    fn remove_drops_member_in_both_encodings() {
        let mut cfg = EngineConfig::default();
        cfg.zset_max_listpack_entries = 2;
        let mut z = SortedSetEngine::new();
        z.add("a", 1.0, &cfg);
        z.add("b", 2.0, &cfg);
        z.add("c", 3.0, &cfg);
        assert_eq!(z.encoding(), SortedSetEncoding::Skiplist);
        assert!(z.remove("b"));
        assert!(!z.remove("b"));
        assert_eq!(z.len(), 2);
        assert_eq!(z.rank("c"), Some(1));
    }

    #[test]
    fn range_by_score_respects_bounds_and_limit() {
        let cfg = EngineConfig::default();
        let mut z = SortedSetEngine::new();
        for i in 0..10 {
            z.add(&format!("m{i}"), i as f64, &cfg);
        }
        let got = z.range_by_score(ScoreBound::Value(3.0, true), ScoreBound::Value(7.0, true), false, Some((1, 2)));
        assert_eq!(got, vec![("m4".to_string(), 4.0), ("m5".to_string(), 5.0)]);
    }
}
