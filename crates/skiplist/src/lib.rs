//! `OrderedScoreIndex`: a score-ordered multimap backed by a skip list.
//!
//! This is the `skiplist`-like collaborator the sorted-set engine
//! delegates to once it outgrows its packed-entry-seq encoding. Entries
//! are ordered by `(score, member)` — ties broken lexicographically on
//! the member, matching the sorted-set's tie-break invariant. The index
//! does not itself provide O(1) member→score lookup: the sorted-set
//! engine pairs it with a `Dict<member, score>` for that, and passes the
//! current score into [`OrderedScoreIndex::remove`] so the skip list can
//! locate the right node directly rather than searching by member alone.
//!
//! ## Representation
//!
//! Nodes live in an arena (`Vec<Option<Node>>`) addressed by index rather
//! than raw pointers, with a free list recycling slots vacated by
//! deletion — the arena-indexed-links approach the design notes call for
//! in place of C's raw forward/backward pointers.

use rand::Rng;
use std::cmp::Ordering;

const MAX_LEVEL: usize = 32;
const P: f64 = 0.25;

#[derive(Debug, Clone)]
struct Level {
    forward: Option<usize>,
    span: usize,
}

#[derive(Debug, Clone)]
struct Node {
    member: String,
    score: f64,
    backward: Option<usize>,
    levels: Vec<Level>,
}

/// An inclusive/exclusive/unbounded endpoint for a score range query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    /// Unbounded below (`-inf`).
    NegInf,
    /// Unbounded above (`+inf`).
    PosInf,
    /// A concrete score, inclusive or exclusive.
    Value(f64, bool),
}

impl ScoreBound {
    pub fn satisfies_lower(&self, score: f64) -> bool {
        match self {
            ScoreBound::NegInf => true,
            ScoreBound::PosInf => false,
            ScoreBound::Value(v, inclusive) => {
                if *inclusive {
                    score >= *v
                } else {
                    score > *v
                }
            }
        }
    }

    pub fn satisfies_upper(&self, score: f64) -> bool {
        match self {
            ScoreBound::PosInf => true,
            ScoreBound::NegInf => false,
            ScoreBound::Value(v, inclusive) => {
                if *inclusive {
                    score <= *v
                } else {
                    score < *v
                }
            }
        }
    }
}

/// An inclusive/exclusive/unbounded endpoint for a lexicographic range
/// query (meaningful when every member shares a score).
#[derive(Debug, Clone, PartialEq)]
pub enum LexBound {
    /// Unbounded below (`-`).
    Min,
    /// Unbounded above (`+`).
    Max,
    /// A concrete member, inclusive or exclusive.
    Value(String, bool),
}

impl LexBound {
    pub fn satisfies_lower(&self, member: &str) -> bool {
        match self {
            LexBound::Min => true,
            LexBound::Max => false,
            LexBound::Value(v, inclusive) => {
                if *inclusive {
                    member >= v.as_str()
                } else {
                    member > v.as_str()
                }
            }
        }
    }

    pub fn satisfies_upper(&self, member: &str) -> bool {
        match self {
            LexBound::Max => true,
            LexBound::Min => false,
            LexBound::Value(v, inclusive) => {
                if *inclusive {
                    member <= v.as_str()
                } else {
                    member < v.as_str()
                }
            }
        }
    }
}

fn order_key(score: f64, member: &str) -> (f64, &str) {
    (score, member)
}

fn cmp_entries(a_score: f64, a_member: &str, b_score: f64, b_member: &str) -> Ordering {
    order_key(a_score, a_member)
        .partial_cmp(&order_key(b_score, b_member))
        .expect("scores are always finite, never NaN")
}

/// A score-ordered multimap, implemented as a skip list over `(score,
/// member)` pairs.
pub struct OrderedScoreIndex {
    arena: Vec<Option<Node>>,
    free: Vec<usize>,
    head_forward: Vec<Option<usize>>,
    head_span: Vec<usize>,
    level: usize,
    length: usize,
}

impl Default for OrderedScoreIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedScoreIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        OrderedScoreIndex {
            arena: Vec::new(),
            free: Vec::new(),
            head_forward: vec![None; MAX_LEVEL],
            head_span: vec![0; MAX_LEVEL],
            level: 1,
            length: 0,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn random_level(&self) -> usize {
        let mut lvl = 1;
        let mut rng = rand::thread_rng();
        while lvl < MAX_LEVEL && rng.gen::<f64>() < P {
            lvl += 1;
        }
        lvl
    }

    fn node(&self, idx: usize) -> &Node {
        self.arena[idx].as_ref().expect("arena slot must be occupied")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node {
        self.arena[idx].as_mut().expect("arena slot must be occupied")
    }

    fn forward(&self, idx: Option<usize>, level: usize) -> Option<usize> {
        match idx {
            None => self.head_forward[level],
            Some(i) => self.node(i).levels[level].forward,
        }
    }

    fn span(&self, idx: Option<usize>, level: usize) -> usize {
        match idx {
            None => self.head_span[level],
            Some(i) => self.node(i).levels[level].span,
        }
    }

    fn set_forward(&mut self, idx: Option<usize>, level: usize, value: Option<usize>) {
        match idx {
            None => self.head_forward[level] = value,
            Some(i) => self.node_mut(i).levels[level].forward = value,
        }
    }

    fn set_span(&mut self, idx: Option<usize>, level: usize, value: usize) {
        match idx {
            None => self.head_span[level] = value,
            Some(i) => self.node_mut(i).levels[level].span = value,
        }
    }

    /// Insert `(member, score)`. The caller must ensure `member` is not
    /// already present — sorted-set engines pair this index with a `Dict`
    /// that owns membership, so updates go through `remove` then `insert`.
    pub fn insert(&mut self, member: String, score: f64) {
        let mut update: Vec<Option<usize>> = vec![None; MAX_LEVEL];
        let mut rank = vec![0usize; MAX_LEVEL];
        let mut cur: Option<usize> = None;

        for lvl in (0..self.level).rev() {
            rank[lvl] = if lvl == self.level - 1 { 0 } else { rank[lvl + 1] };
            while let Some(next) = self.forward(cur, lvl) {
                let n = self.node(next);
                if cmp_entries(n.score, &n.member, score, &member) == Ordering::Less {
                    rank[lvl] += self.span(cur, lvl);
                    cur = Some(next);
                } else {
                    break;
                }
            }
            update[lvl] = cur;
        }

        let new_level = self.random_level();
        if new_level > self.level {
            for lvl in self.level..new_level {
                rank[lvl] = 0;
                update[lvl] = None;
                self.head_span[lvl] = self.length;
            }
            self.level = new_level;
        }

        let idx = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.arena.push(None);
                self.arena.len() - 1
            }
        };

        let levels = (0..new_level).map(|_| Level { forward: None, span: 0 }).collect();
        let backward = update[0];

        self.arena[idx] = Some(Node {
            member,
            score,
            backward,
            levels,
        });

        for lvl in 0..new_level {
            let next = self.forward(update[lvl], lvl);
            self.set_forward(Some(idx), lvl, next);
            self.set_forward(update[lvl], lvl, Some(idx));

            let new_span = self.span(update[lvl], lvl) - (rank[0] - rank[lvl]) + 1;
            self.node_mut(idx).levels[lvl].span = new_span;
            self.set_span(update[lvl], lvl, rank[0] - rank[lvl] + 1);
        }

        for lvl in new_level..self.level {
            self.set_span(update[lvl], lvl, self.span(update[lvl], lvl) + 1);
        }

        if let Some(next) = self.forward(Some(idx), 0) {
            self.node_mut(next).backward = Some(idx);
        }
        self.length += 1;
    }

    /// Remove the entry for `member` with the given `score`. Returns
    /// `true` if an entry was removed.
    pub fn remove(&mut self, member: &str, score: f64) -> bool {
        let mut update: Vec<Option<usize>> = vec![None; MAX_LEVEL];
        let mut cur: Option<usize> = None;

        for lvl in (0..self.level).rev() {
            while let Some(next) = self.forward(cur, lvl) {
                let n = self.node(next);
                if cmp_entries(n.score, &n.member, score, member) == Ordering::Less {
                    cur = Some(next);
                } else {
                    break;
                }
            }
            update[lvl] = cur;
        }

        let target = self.forward(cur, 0);
        let target = match target {
            Some(t) if self.node(t).member == member && self.node(t).score == score => t,
            _ => return false,
        };

        for lvl in 0..self.level {
            if self.forward(update[lvl], lvl) == Some(target) {
                let span = self.span(update[lvl], lvl) + self.span(Some(target), lvl) - 1;
                self.set_forward(update[lvl], lvl, self.forward(Some(target), lvl));
                self.set_span(update[lvl], lvl, span);
            } else {
                self.set_span(update[lvl], lvl, self.span(update[lvl], lvl).saturating_sub(1));
            }
        }

        if let Some(next) = self.forward(Some(target), 0) {
            self.node_mut(next).backward = self.node(target).backward;
        }

        while self.level > 1 && self.head_forward[self.level - 1].is_none() {
            self.level -= 1;
        }

        self.arena[target] = None;
        self.free.push(target);
        self.length -= 1;
        true
    }

    /// 0-based rank of `(member, score)`, or `None` if absent.
    pub fn rank(&self, member: &str, score: f64) -> Option<usize> {
        let mut cur: Option<usize> = None;
        let mut rank = 0usize;
        for lvl in (0..self.level).rev() {
            while let Some(next) = self.forward(cur, lvl) {
                let n = self.node(next);
                let ord = cmp_entries(n.score, &n.member, score, member);
                if ord == Ordering::Less || (ord == Ordering::Equal && n.member != member) {
                    rank += self.span(cur, lvl);
                    cur = Some(next);
                } else {
                    break;
                }
            }
        }
        let candidate = self.forward(cur, 0)?;
        let n = self.node(candidate);
        if n.member == member && n.score == score {
            Some(rank)
        } else {
            None
        }
    }

    /// Entries with rank in `[start, stop]` inclusive (Redis-style negative
    /// indices count from the tail). `rev` walks from the highest rank down.
    pub fn range_by_rank(&self, start: i64, stop: i64, rev: bool) -> Vec<(String, f64)> {
        let len = self.length as i64;
        if len == 0 {
            return Vec::new();
        }
        let mut start = if start < 0 { len + start } else { start };
        let mut stop = if stop < 0 { len + stop } else { stop };
        if start < 0 {
            start = 0;
        }
        if start > stop || start >= len {
            return Vec::new();
        }
        if stop >= len {
            stop = len - 1;
        }
        let start = start as usize;
        let stop = stop as usize;

        let mut out = Vec::with_capacity(stop - start + 1);
        let mut cur: Option<usize> = None;
        let mut rank = 0usize;
        for lvl in (0..self.level).rev() {
            while let Some(next) = self.forward(cur, lvl) {
                if rank + self.span(cur, lvl) > start {
                    break;
                }
                rank += self.span(cur, lvl);
                cur = Some(next);
            }
        }
        let mut node = self.forward(cur, 0);
        for _ in start..=stop {
            let Some(n) = node else { break };
            let entry = self.node(n);
            out.push((entry.member.clone(), entry.score));
            node = self.forward(Some(n), 0);
        }
        if rev {
            out.reverse();
        }
        out
    }

    /// Entries whose score falls within `[min, max]` (per the bound
    /// inclusivity), walked head-to-tail unless `rev`.
    pub fn range_by_score(
        &self,
        min: ScoreBound,
        max: ScoreBound,
        rev: bool,
        limit: Option<(usize, usize)>,
    ) -> Vec<(String, f64)> {
        let mut cur: Option<usize> = None;
        for lvl in (0..self.level).rev() {
            while let Some(next) = self.forward(cur, lvl) {
                let n = self.node(next);
                if !min.satisfies_lower(n.score) {
                    cur = Some(next);
                } else {
                    break;
                }
            }
        }
        let mut out = Vec::new();
        let mut node = self.forward(cur, 0);
        let (offset, count) = limit.unwrap_or((0, usize::MAX));
        let mut skipped = 0usize;
        while let Some(n) = node {
            let entry = self.node(n);
            if !max.satisfies_upper(entry.score) {
                break;
            }
            if min.satisfies_lower(entry.score) {
                if skipped < offset {
                    skipped += 1;
                } else if out.len() < count {
                    out.push((entry.member.clone(), entry.score));
                } else {
                    break;
                }
            }
            node = self.forward(Some(n), 0);
        }
        if rev {
            out.reverse();
        }
        out
    }

    /// Entries whose member falls within the lexicographic range
    /// `[min, max]`. Meaningful when every stored entry shares a score.
    pub fn range_by_lex(&self, min: &LexBound, max: &LexBound, rev: bool) -> Vec<(String, f64)> {
        let mut out = Vec::new();
        let mut node = self.forward(None, 0);
        while let Some(n) = node {
            let entry = self.node(n);
            if min.satisfies_lower(&entry.member) && max.satisfies_upper(&entry.member) {
                out.push((entry.member.clone(), entry.score));
            } else if !max.satisfies_upper(&entry.member) {
                break;
            }
            node = self.forward(Some(n), 0);
        }
        if rev {
            out.reverse();
        }
        out
    }

    /// Iterate all entries head-to-tail.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        let mut cur = self.forward(None, 0);
        std::iter::from_fn(move || {
            let n = cur?;
            let node = self.node(n);
            cur = self.forward(Some(n), 0);
            Some((node.member.as_str(), node.score))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(entries: &[(&str, f64)]) -> OrderedScoreIndex {
        let mut idx = OrderedScoreIndex::new();
        for (m, s) in entries {
            idx.insert(m.to_string(), *s);
        }
        idx
    }

    #[test]
    fn insert_keeps_order_by_score_then_member() {
        let idx = build(&[("b", 2.0), ("a", 1.0), ("c", 1.0)]);
        let all: Vec<_> = idx.iter().map(|(m, s)| (m.to_string(), s)).collect();
        assert_eq!(
            all,
            vec![
                ("a".to_string(), 1.0),
                ("c".to_string(), 1.0),
                ("b".to_string(), 2.0)
            ]
        );
    }

    #[test]
    fn rank_ties_broken_lexically() {
        let idx = build(&[("a", 1.0), ("b", 2.0), ("c", 1.0)]);
        assert_eq!(idx.rank("a", 1.0), Some(0));
        assert_eq!(idx.rank("c", 1.0), Some(1));
        assert_eq!(idx.rank("b", 2.0), Some(2));
        assert_eq!(idx.rank("missing", 9.0), None);
    }

    #[test]
    fn remove_then_rank_shifts_down() {
        let mut idx = build(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        assert!(idx.remove("b", 2.0));
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.rank("c", 3.0), Some(1));
        assert!(!idx.remove("b", 2.0));
    }

    #[test]
    fn range_by_rank_handles_negative_bounds() {
        let idx = build(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
        let all = idx.range_by_rank(0, -1, false);
        assert_eq!(all.len(), 4);
        let last_two = idx.range_by_rank(-2, -1, false);
        assert_eq!(
            last_two,
            vec![("c".to_string(), 3.0), ("d".to_string(), 4.0)]
        );
    }

    #[test]
    fn range_by_rank_empty_when_start_past_end() {
        let idx = build(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
        assert!(idx.range_by_rank(100, -1, false).is_empty());
        assert!(idx.range_by_rank(4, -1, false).is_empty());
        assert!(idx.range_by_rank(0, -100, false).is_empty());
    }

    #[test]
    fn range_by_score_respects_inclusivity() {
        let idx = build(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let r = idx.range_by_score(ScoreBound::Value(1.0, false), ScoreBound::PosInf, false, None);
        assert_eq!(
            r,
            vec![("b".to_string(), 2.0), ("c".to_string(), 3.0)]
        );
        let r = idx.range_by_score(ScoreBound::Value(1.0, true), ScoreBound::Value(2.0, true), false, None);
        assert_eq!(r, vec![("a".to_string(), 1.0), ("b".to_string(), 2.0)]);
    }

    #[test]
    fn range_by_score_respects_limit() {
        let idx = build(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
        let r = idx.range_by_score(ScoreBound::NegInf, ScoreBound::PosInf, false, Some((1, 2)));
        assert_eq!(r, vec![("b".to_string(), 2.0), ("c".to_string(), 3.0)]);
    }

    #[test]
    fn range_by_lex_orders_same_score_members() {
        let idx = build(&[("banana", 0.0), ("apple", 0.0), ("cherry", 0.0)]);
        let r = idx.range_by_lex(&LexBound::Min, &LexBound::Max, false);
        assert_eq!(
            r.iter().map(|(m, _)| m.as_str()).collect::<Vec<_>>(),
            vec!["apple", "banana", "cherry"]
        );
    }

    #[test]
    fn large_insert_remove_preserves_order_and_rank() {
        let mut idx = OrderedScoreIndex::new();
        for i in 0..500 {
            idx.insert(format!("m{i:04}"), (i % 97) as f64);
        }
        assert_eq!(idx.len(), 500);
        for i in (0..500).step_by(3) {
            assert!(idx.remove(&format!("m{i:04}"), (i % 97) as f64));
        }
        assert_eq!(idx.len(), 500 - (0..500).step_by(3).count());
        let all: Vec<_> = idx.iter().collect();
        for w in all.windows(2) {
            assert!(
                w[0].1 < w[1].1 || (w[0].1 == w[1].1 && w[0].0 <= w[1].0),
                "order violated: {:?} then {:?}",
                w[0],
                w[1]
            );
        }
    }
}
