//! Set container engine: an all-integer set stays packed in an
//! [`IntArraySet`]; the first non-integer member, or growth past the
//! configured entry limit, promotes it to a [`Dict`] with `()` values.

use ks_core::numeric::parse_strict_i64;
use ks_core::EngineConfig;
use ks_dict::Dict;
use ks_intset::IntArraySet;
use rand::Rng;

enum Body {
    Intset(IntArraySet),
    Hashtable(Dict<Vec<u8>, ()>),
}

/// The internal representation currently in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetEncoding {
    /// Every member is a canonical integer, packed into a sorted array.
    Intset,
    /// A full hash table, used once the set outgrows the int-array or
    /// gains a non-integer member.
    Hashtable,
}

/// A Redis-style set value.
pub struct SetEngine {
    body: Body,
}

impl SetEngine {
    /// Create an empty set, starting in the `Intset` encoding.
    pub fn new() -> Self {
        SetEngine {
            body: Body::Intset(IntArraySet::new()),
        }
    }

    /// The encoding currently in use.
    pub fn encoding(&self) -> SetEncoding {
        match &self.body {
            Body::Intset(_) => SetEncoding::Intset,
            Body::Hashtable(_) => SetEncoding::Hashtable,
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        match &self.body {
            Body::Intset(s) => s.len(),
            Body::Hashtable(dict) => dict.len(),
        }
    }

    /// Whether the set holds no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `member` is present.
    pub fn contains(&self, member: &[u8]) -> bool {
        match &self.body {
            Body::Intset(s) => match parse_strict_i64(member) {
                Some(i) => s.contains(i),
                None => false,
            },
            Body::Hashtable(dict) => dict.find(&member.to_vec()).is_some(),
        }
    }

    /// Insert `member`. Returns `true` if newly added. May convert the
    /// encoding to `Hashtable`.
    pub fn add(&mut self, member: &[u8], config: &EngineConfig) -> bool {
        let as_int = parse_strict_i64(member);
        let added = match (&mut self.body, as_int) {
            (Body::Intset(s), Some(i)) => s.add(i),
            (Body::Intset(_), None) => {
                self.convert_to_hashtable();
                let Body::Hashtable(dict) = &mut self.body else {
                    unreachable!("just converted")
                };
                dict.replace(member.to_vec(), ()).is_none()
            }
            (Body::Hashtable(dict), _) => dict.replace(member.to_vec(), ()).is_none(),
        };
        if added {
            self.maybe_convert(config);
        }
        added
    }

    /// Remove `member`. Returns `true` if it was present.
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match &mut self.body {
            Body::Intset(s) => match parse_strict_i64(member) {
                Some(i) => s.remove(i),
                None => false,
            },
            Body::Hashtable(dict) => dict.delete(&member.to_vec()),
        }
    }

    /// All members.
    pub fn members(&self) -> Vec<Vec<u8>> {
        match &self.body {
            Body::Intset(s) => s.iter().map(|i| i.to_string().into_bytes()).collect(),
            Body::Hashtable(dict) => dict.iter().map(|(k, _)| k.clone()).collect(),
        }
    }

    /// A uniformly random member, or `None` if empty.
    pub fn random_member(&self) -> Option<Vec<u8>> {
        match &self.body {
            Body::Intset(s) => {
                let mut rng = rand::thread_rng();
                s.random(&mut rng).map(|i| i.to_string().into_bytes())
            }
            Body::Hashtable(dict) => dict.random_entry().map(|(k, _)| k.clone()),
        }
    }

    /// Remove and return up to `count` members.
    ///
    /// For small `count` relative to what remains, repeatedly draw a
    /// random member and remove it; once `count` would remove most or
    /// all of the set, it is cheaper to snapshot the whole membership
    /// and drain it directly.
    pub fn pop(&mut self, count: usize) -> Vec<Vec<u8>> {
        let remaining = self.len();
        if count >= remaining {
            let all = self.members();
            for m in &all {
                self.remove(m);
            }
            return all;
        }
        if count * 2 > remaining {
            let mut all = self.members();
            all.truncate(remaining - count);
            let kept: std::collections::HashSet<Vec<u8>> = all.into_iter().collect();
            let popped: Vec<Vec<u8>> = self
                .members()
                .into_iter()
                .filter(|m| !kept.contains(m))
                .collect();
            for m in &popped {
                self.remove(m);
            }
            return popped;
        }
        let mut popped = Vec::with_capacity(count);
        for _ in 0..count {
            match self.random_member() {
                Some(m) => {
                    self.remove(&m);
                    popped.push(m);
                }
                None => break,
            }
        }
        popped
    }

    fn convert_to_hashtable(&mut self) {
        let mut dict = Dict::new();
        match &self.body {
            Body::Intset(s) => {
                for i in s.iter() {
                    dict.replace(i.to_string().into_bytes(), ());
                }
            }
            Body::Hashtable(_) => return,
        }
        tracing::debug!(members = dict.len(), "set converted to hashtable encoding");
        self.body = Body::Hashtable(dict);
    }

    fn maybe_convert(&mut self, config: &EngineConfig) {
        if let Body::Intset(s) = &self.body {
            if s.len() > config.set_max_intset_entries {
                self.convert_to_hashtable();
            }
        }
    }
}

impl Default for SetEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Members present in every set in `sets`. Iterates the smallest set and
/// probes the rest, so the work scales with the smallest input rather
/// than the largest.
pub fn intersect(sets: &[&SetEngine]) -> Vec<Vec<u8>> {
    if sets.is_empty() {
        return Vec::new();
    }
    let mut order: Vec<&&SetEngine> = sets.iter().collect();
    order.sort_by_key(|s| s.len());
    let smallest = order[0];
    if smallest.is_empty() {
        return Vec::new();
    }
    smallest
        .members()
        .into_iter()
        .filter(|m| order[1..].iter().all(|s| s.contains(m)))
        .collect()
}

/// Members present in any set in `sets`, each appearing once.
pub fn union(sets: &[&SetEngine]) -> Vec<Vec<u8>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for s in sets {
        for m in s.members() {
            if seen.insert(m.clone()) {
                out.push(m);
            }
        }
    }
    out
}

/// Members of `first` absent from every set in `rest`.
///
/// Picks between two cost heuristics depending on relative size:
/// when `rest` is small relative to `first`, probe each of `first`'s
/// members against every other set; when `rest` is large, it is cheaper
/// to materialise the union of `rest` once and filter `first` against
/// that single set.
pub fn diff(first: &SetEngine, rest: &[&SetEngine]) -> Vec<Vec<u8>> {
    if rest.is_empty() {
        return first.members();
    }
    let rest_total: usize = rest.iter().map(|s| s.len()).sum();
    if rest_total < first.len() {
        first
            .members()
            .into_iter()
            .filter(|m| !rest.iter().any(|s| s.contains(m)))
            .collect()
    } else {
        let excluded: std::collections::HashSet<Vec<u8>> =
            rest.iter().flat_map(|s| s.members()).collect();
        first
            .members()
            .into_iter()
            .filter(|m| !excluded.contains(m))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_integer_set_stays_intset() {
        let cfg = EngineConfig::default();
        let mut s = SetEngine::new();
        for v in [b"1".as_slice(), b"2", b"3"] {
            assert!(s.add(v, &cfg));
        }
        assert_eq!(s.encoding(), SetEncoding::Intset);
        assert!(s.contains(b"2"));
        assert!(!s.add(b"2", &cfg));
    }

    #[test]
    fn non_integer_member_converts_to_hashtable() {
        let cfg = EngineConfig::default();
        let mut s = SetEngine::new();
        s.add(b"1", &cfg);
        s.add(b"2", &cfg);
        s.add(b"not-a-number", &cfg);
        assert_eq!(s.encoding(), SetEncoding::Hashtable);
        assert!(s.contains(b"1"));
        assert!(s.contains(b"not-a-number"));
    }

    #[test]
    fn exceeding_intset_entries_limit_converts_to_hashtable() {
        let mut cfg = EngineConfig::default();
        cfg.set_max_intset_entries = 4;
        let mut s = SetEngine::new();
        for i in 0..4 {
            s.add(i.to_string().as_bytes(), &cfg);
        }
        assert_eq!(s.encoding(), SetEncoding::Intset);
        s.add(b"4", &cfg);
        assert_eq!(s.encoding(), SetEncoding::Hashtable);
        assert_eq!(s.len(), 5);
    }

    #[test]
    fn remove_and_members_consistent_across_encodings() {
        let cfg = EngineConfig::default();
        let mut s = SetEngine::new();
        s.add(b"1", &cfg);
        s.add(b"two", &cfg);
        assert!(s.remove(b"1"));
        assert!(!s.remove(b"1"));
        let members = s.members();
        assert_eq!(members, vec![b"two".to_vec()]);
    }

    #[test]
    fn pop_all_when_count_exceeds_size() {
        let cfg = EngineConfig::default();
        let mut s = SetEngine::new();
        s.add(b"1", &cfg);
        s.add(b"2", &cfg);
        let popped = s.pop(10);
        assert_eq!(popped.len(), 2);
        assert!(s.is_empty());
    }

    #[test]
    fn pop_exact_count_leaves_remainder() {
        let cfg = EngineConfig::default();
        let mut s = SetEngine::new();
        for i in 0..10 {
            s.add(i.to_string().as_bytes(), &cfg);
        }
        let popped = s.pop(3);
        assert_eq!(popped.len(), 3);
        assert_eq!(s.len(), 7);
        for m in &popped {
            assert!(!s.contains(m));
        }
    }

    #[test]
    fn intersect_keeps_only_common_members() {
        let cfg = EngineConfig::default();
        let mut a = SetEngine::new();
        let mut b = SetEngine::new();
        for v in [b"1".as_slice(), b"2", b"3"] {
            a.add(v, &cfg);
        }
        for v in [b"2".as_slice(), b"3", b"4"] {
            b.add(v, &cfg);
        }
        let mut result = intersect(&[&a, &b]);
        result.sort();
        assert_eq!(result, vec![b"2".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn union_deduplicates_across_sets() {
        let cfg = EngineConfig::default();
        let mut a = SetEngine::new();
        let mut b = SetEngine::new();
        a.add(b"1", &cfg);
        a.add(b"2", &cfg);
        b.add(b"2", &cfg);
        b.add(b"3", &cfg);
        let mut result = union(&[&a, &b]);
        result.sort();
        assert_eq!(result, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn diff_removes_members_present_in_rest() {
        let cfg = EngineConfig::default();
        let mut a = SetEngine::new();
        let mut b = SetEngine::new();
        for v in [b"1".as_slice(), b"2", b"3"] {
            a.add(v, &cfg);
        }
        b.add(b"2", &cfg);
        let mut result = diff(&a, &[&b]);
        result.sort();
        assert_eq!(result, vec![b"1".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn diff_with_no_other_sets_returns_all_members() {
        let cfg = EngineConfig::default();
        let mut a = SetEngine::new();
        a.add(b"1", &cfg);
        assert_eq!(diff(&a, &[]), vec![b"1".to_vec()]);
    }
}
