//! `Dict`: a two-table hash map that rehashes incrementally.
//!
//! Growing or shrinking a hash table all at once means a single
//! operation can block for as long as it takes to rehash every entry.
//! `Dict` instead keeps both the old table (`tables[0]`) and the new one
//! (`tables[1]`) live at once while a rehash is in progress, and moves
//! one bucket's worth of entries per mutating call (`find`, `replace`,
//! `unlink`, ...) until the move is done — the cost of growing is spread
//! across the operations that follow it instead of paid up front.
//!
//! Keys are hashed with a process-wide random seed
//! ([`ks_core::hash::process_seed`]) so that an adversary who controls
//! key contents cannot force every key into the same bucket.
//!
//! Entries live in an arena (`Vec<Option<Entry<K, V>>>`) addressed by
//! index, with buckets holding the arena index of their chain head and
//! each entry pointing at the next index in its chain — the same
//! indexed-link style used by [`ks_skiplist`] and [`ks_ziplist`], kept
//! here instead of raw pointers so the whole structure stays safe code.

use std::hash::{Hash, Hasher};

const INITIAL_SIZE: usize = 4;
const EMPTY_BUCKET_SCAN_LIMIT: usize = 10;

/// Errors a [`Dict`] operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictError {
    /// `add_or_err` was called with a key that is already present.
    KeyExists,
}

struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
    next: Option<usize>,
}

struct Table {
    buckets: Vec<Option<usize>>,
    used: usize,
}

impl Table {
    fn empty() -> Self {
        Table {
            buckets: Vec::new(),
            used: 0,
        }
    }

    fn mask(&self) -> u64 {
        self.buckets.len().saturating_sub(1) as u64
    }
}

/// A keyed hasher seeded from the process-wide random seed, used in
/// place of `DefaultHasher` to resist hash-flooding.
struct SeededHasher {
    state: u64,
}

impl SeededHasher {
    fn new() -> Self {
        let seed = ks_core::hash::process_seed();
        SeededHasher {
            state: seed.0 ^ seed.1.rotate_left(32),
        }
    }
}

impl Hasher for SeededHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state ^= b as u64;
            self.state = self.state.wrapping_mul(0x0000_0100_0000_01b3);
            self.state ^= self.state >> 33;
        }
    }

    fn finish(&self) -> u64 {
        self.state
    }
}

fn hash_of<K: Hash>(key: &K) -> u64 {
    let mut hasher = SeededHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// An incrementally-rehashed hash map.
pub struct Dict<K, V> {
    tables: [Table; 2],
    arena: Vec<Option<Entry<K, V>>>,
    free: Vec<usize>,
    rehash_idx: Option<usize>,
    safe_iterators: i64,
}

impl<K, V> Default for Dict<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Dict<K, V>
where
    K: Hash + Eq,
{
    /// Create an empty dict. No table is allocated until the first insert.
    pub fn new() -> Self {
        Dict {
            tables: [Table::empty(), Table::empty()],
            arena: Vec::new(),
            free: Vec::new(),
            rehash_idx: None,
            safe_iterators: 0,
        }
    }

    /// Total number of entries across both tables.
    pub fn len(&self) -> usize {
        self.tables[0].used + self.tables[1].used
    }

    /// Whether the dict holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an incremental rehash is currently in progress.
    pub fn is_rehashing(&self) -> bool {
        self.rehash_idx.is_some()
    }

    /// Pause incremental rehashing for the lifetime of an unsafe-free
    /// traversal. Must be paired with [`Dict::end_safe_iter`].
    pub fn begin_safe_iter(&mut self) {
        self.safe_iterators += 1;
    }

    /// Resume incremental rehashing after a safe traversal completes.
    pub fn end_safe_iter(&mut self) {
        self.safe_iterators -= 1;
    }

    fn find_entry_idx(&self, key: &K) -> Option<usize> {
        let hash = hash_of(key);
        for t in 0..2 {
            if self.tables[t].buckets.is_empty() {
                continue;
            }
            let bucket = (hash & self.tables[t].mask()) as usize;
            let mut cur = self.tables[t].buckets[bucket];
            while let Some(idx) = cur {
                let entry = self.arena[idx].as_ref().expect("arena slot occupied");
                if &entry.key == key {
                    return Some(idx);
                }
                cur = entry.next;
            }
        }
        None
    }

    /// Look up a key's value.
    pub fn find(&self, key: &K) -> Option<&V> {
        self.find_entry_idx(key)
            .map(|idx| &self.arena[idx].as_ref().expect("arena slot occupied").value)
    }

    /// Look up a key's value by cloning it out.
    pub fn fetch_value(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.find(key).cloned()
    }

    /// Look up a key's value for in-place mutation, piggybacking a rehash
    /// step the same way the other mutating operations do.
    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        self.rehash_step();
        self.find_entry_idx(key)
            .map(move |idx| &mut self.arena[idx].as_mut().expect("arena slot occupied").value)
    }

    fn insert_new(&mut self, key: K, value: V) -> usize {
        if self.tables[0].buckets.is_empty() {
            self.resize(INITIAL_SIZE);
        }
        let hash = hash_of(&key);
        let target = if self.is_rehashing() { 1 } else { 0 };
        let bucket = (hash & self.tables[target].mask()) as usize;
        let next = self.tables[target].buckets[bucket];
        let entry = Entry {
            key,
            value,
            hash,
            next,
        };
        let idx = match self.free.pop() {
            Some(i) => {
                self.arena[i] = Some(entry);
                i
            }
            None => {
                self.arena.push(Some(entry));
                self.arena.len() - 1
            }
        };
        self.tables[target].buckets[bucket] = Some(idx);
        self.tables[target].used += 1;
        if !self.is_rehashing() && self.tables[0].used > self.tables[0].buckets.len() {
            self.expand();
        }
        idx
    }

    /// Insert `key` with `value`. Fails with [`DictError::KeyExists`] if
    /// the key is already present.
    pub fn add_or_err(&mut self, key: K, value: V) -> Result<(), DictError> {
        self.rehash_step();
        if self.find(&key).is_some() {
            return Err(DictError::KeyExists);
        }
        self.insert_new(key, value);
        Ok(())
    }

    /// Insert `key` with `value`, overwriting and returning any previous
    /// value.
    pub fn replace(&mut self, key: K, value: V) -> Option<V> {
        self.rehash_step();
        if let Some(idx) = self.find_entry_idx(&key) {
            let slot = self.arena[idx].as_mut().expect("arena slot occupied");
            Some(std::mem::replace(&mut slot.value, value))
        } else {
            self.insert_new(key, value);
            None
        }
    }

    /// Return a mutable reference to `key`'s value, inserting
    /// `make()`'s result first if absent. The second element is `true`
    /// when a new entry was created.
    pub fn add_or_find(&mut self, key: K, make: impl FnOnce() -> V) -> (&mut V, bool) {
        self.rehash_step();
        let (idx, created) = match self.find_entry_idx(&key) {
            Some(idx) => (idx, false),
            None => (self.insert_new(key, make()), true),
        };
        (&mut self.arena[idx].as_mut().expect("arena slot occupied").value, created)
    }

    /// Remove `key`, returning `true` if it was present.
    pub fn delete(&mut self, key: &K) -> bool {
        self.unlink(key).is_some()
    }

    /// Remove and return `key`'s entry.
    pub fn unlink(&mut self, key: &K) -> Option<(K, V)> {
        self.rehash_step();
        let hash = hash_of(key);
        for t in 0..2 {
            if self.tables[t].buckets.is_empty() {
                continue;
            }
            let bucket = (hash & self.tables[t].mask()) as usize;
            let mut prev: Option<usize> = None;
            let mut cur = self.tables[t].buckets[bucket];
            while let Some(idx) = cur {
                let next = self.arena[idx].as_ref().expect("arena slot occupied").next;
                let is_match = &self.arena[idx].as_ref().expect("arena slot occupied").key == key;
                if is_match {
                    match prev {
                        Some(p) => self.arena[p].as_mut().expect("arena slot occupied").next = next,
                        None => self.tables[t].buckets[bucket] = next,
                    }
                    self.tables[t].used -= 1;
                    let entry = self.arena[idx].take().expect("arena slot occupied");
                    self.free.push(idx);
                    return Some((entry.key, entry.value));
                }
                prev = Some(idx);
                cur = next;
            }
        }
        None
    }

    /// Grow to the next power of two above the current size.
    pub fn expand(&mut self) {
        let current = self.tables[0].buckets.len().max(INITIAL_SIZE);
        self.resize(current * 2);
    }

    /// Begin (or immediately complete, if no entries need moving) a
    /// rehash targeting a table sized to hold at least `size_hint`
    /// entries.
    pub fn resize(&mut self, size_hint: usize) {
        if self.is_rehashing() {
            return;
        }
        let minimal = size_hint.max(self.tables[0].used).max(1);
        let new_size = minimal.next_power_of_two().max(INITIAL_SIZE);
        if self.tables[0].buckets.len() == new_size {
            return;
        }
        self.tables[1] = Table {
            buckets: vec![None; new_size],
            used: 0,
        };
        if self.tables[0].buckets.is_empty() {
            self.tables[0] = std::mem::replace(&mut self.tables[1], Table::empty());
            return;
        }
        tracing::debug!(
            from = self.tables[0].buckets.len(),
            to = new_size,
            "dict rehash started"
        );
        self.rehash_idx = Some(0);
    }

    fn move_entry_to_table1(&mut self, entry_idx: usize) {
        let hash = self.arena[entry_idx].as_ref().expect("arena slot occupied").hash;
        let new_bucket = (hash & self.tables[1].mask()) as usize;
        let old_head = self.tables[1].buckets[new_bucket];
        self.arena[entry_idx].as_mut().expect("arena slot occupied").next = old_head;
        self.tables[1].buckets[new_bucket] = Some(entry_idx);
        self.tables[0].used -= 1;
        self.tables[1].used += 1;
    }

    /// Perform one incremental rehash step: move one non-empty bucket's
    /// chain (skipping up to [`EMPTY_BUCKET_SCAN_LIMIT`] empty buckets
    /// first) from the old table into the new one. A no-op if no rehash
    /// is in progress or a safe iterator has it paused.
    pub fn rehash_step(&mut self) {
        if self.safe_iterators > 0 {
            return;
        }
        let Some(mut idx) = self.rehash_idx else {
            return;
        };
        let table_len = self.tables[0].buckets.len();
        let mut empty_seen = 0;
        while idx < table_len && empty_seen < EMPTY_BUCKET_SCAN_LIMIT {
            match self.tables[0].buckets[idx] {
                None => {
                    idx += 1;
                    empty_seen += 1;
                }
                Some(head) => {
                    let mut cur = Some(head);
                    while let Some(e) = cur {
                        let next = self.arena[e].as_ref().expect("arena slot occupied").next;
                        self.move_entry_to_table1(e);
                        cur = next;
                    }
                    self.tables[0].buckets[idx] = None;
                    idx += 1;
                    break;
                }
            }
        }
        if idx >= table_len {
            self.finish_rehash();
        } else {
            self.rehash_idx = Some(idx);
        }
    }

    fn finish_rehash(&mut self) {
        self.tables[0] = std::mem::replace(&mut self.tables[1], Table::empty());
        self.rehash_idx = None;
        tracing::debug!(buckets = self.tables[0].buckets.len(), "dict rehash finished");
    }

    /// Run rehash steps for up to `budget`, returning the number of
    /// steps performed. Stops early once the rehash completes.
    pub fn rehash_for(&mut self, budget: std::time::Duration) -> usize {
        let start = std::time::Instant::now();
        let mut steps = 0;
        while self.is_rehashing() && start.elapsed() < budget {
            self.rehash_step();
            steps += 1;
        }
        steps
    }

    fn emit_bucket<F: FnMut(&K, &V)>(&self, table: &Table, bucket: usize, visitor: &mut F) {
        if table.buckets.is_empty() {
            return;
        }
        let mut cur = table.buckets[bucket];
        while let Some(idx) = cur {
            let entry = self.arena[idx].as_ref().expect("arena slot occupied");
            visitor(&entry.key, &entry.value);
            cur = entry.next;
        }
    }

    fn next_cursor(cursor: u64, mask: u64) -> u64 {
        let mut v = cursor | !mask;
        v = v.reverse_bits();
        v = v.wrapping_add(1);
        v.reverse_bits()
    }

    /// Visit a slice of the dict's entries and return the cursor to
    /// resume from. A full scan is complete once the returned cursor is
    /// `0` again (after the first call, which must start at `0`). Safe
    /// to call while the dict is being mutated between calls — it may
    /// miss entries that are deleted before being visited or duplicate
    /// ones that move due to rehashing, but it never skips an entry that
    /// is present for the whole scan.
    pub fn scan<F: FnMut(&K, &V)>(&self, cursor: u64, mut visitor: F) -> u64 {
        if self.is_empty() {
            return 0;
        }
        if !self.is_rehashing() {
            let mask = self.tables[0].mask();
            let bucket = (cursor & mask) as usize;
            self.emit_bucket(&self.tables[0], bucket, &mut visitor);
            return Self::next_cursor(cursor, mask);
        }

        let (small, large) = if self.tables[0].buckets.len() <= self.tables[1].buckets.len() {
            (0, 1)
        } else {
            (1, 0)
        };
        let small_mask = self.tables[small].mask();
        let large_mask = self.tables[large].mask();
        self.emit_bucket(&self.tables[small], (cursor & small_mask) as usize, &mut visitor);
        let mut c = cursor;
        loop {
            self.emit_bucket(&self.tables[large], (c & large_mask) as usize, &mut visitor);
            c = Self::next_cursor(c, large_mask);
            if c & small_mask == cursor & small_mask {
                break;
            }
        }
        Self::next_cursor(c, large_mask)
    }

    /// A uniformly-ish random entry, or `None` if the dict is empty.
    pub fn random_entry(&self) -> Option<(&K, &V)> {
        if self.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();
        let total = self.len();
        for _ in 0..10_000 {
            let t = if self.tables[1].used > 0
                && rand::Rng::gen_bool(&mut rng, self.tables[1].used as f64 / total as f64)
            {
                1
            } else {
                0
            };
            if self.tables[t].buckets.is_empty() {
                continue;
            }
            let bucket = rand::Rng::gen_range(&mut rng, 0..self.tables[t].buckets.len());
            if let Some(head) = self.tables[t].buckets[bucket] {
                let mut len = 0usize;
                let mut cur = Some(head);
                while let Some(i) = cur {
                    len += 1;
                    cur = self.arena[i].as_ref().expect("arena slot occupied").next;
                }
                let pick = rand::Rng::gen_range(&mut rng, 0..len);
                let mut cur = head;
                for _ in 0..pick {
                    cur = self.arena[cur].as_ref().expect("arena slot occupied").next.unwrap();
                }
                let entry = self.arena[cur].as_ref().expect("arena slot occupied");
                return Some((&entry.key, &entry.value));
            }
        }
        self.iter().next()
    }

    /// Up to `n` entries with no duplicates, suitable for eviction-candidate
    /// sampling, per the bucket-walk strategy: first advance the rehash by
    /// up to `n` steps (concentrating entries into the larger table, making
    /// the walk below cheaper), then repeatedly visit a random bucket
    /// masked by the larger table's size, collecting every entry of each
    /// bucket the first time it is visited. Buckets in `[0, rehashidx)` of
    /// `T[0]` are skipped while rehashing -- they are guaranteed empty,
    /// their keys already migrated to `T[1]`, which is visited at the same
    /// masked index regardless. An empty-streak counter (capped at
    /// `max(n, 5)`) triggers a fresh random bucket once walking
    /// consecutively yields nothing new. Terminates once `n` entries are
    /// collected or every bucket has been tried.
    pub fn sample(&mut self, n: usize) -> Vec<(&K, &V)> {
        if self.is_empty() || n == 0 {
            return Vec::new();
        }
        for _ in 0..n {
            if !self.is_rehashing() {
                break;
            }
            self.rehash_step();
        }

        let mut rng = rand::thread_rng();
        let masked = self.tables[0].mask().max(self.tables[1].mask());
        let total_buckets = masked + 1;
        let empty_streak_limit = (n as u64).max(5) + 1;

        let mut table_seen: [std::collections::HashSet<usize>; 2] =
            [std::collections::HashSet::new(), std::collections::HashSet::new()];
        let mut collected: Vec<usize> = Vec::with_capacity(n);
        let mut i = rand::Rng::gen_range(&mut rng, 0..total_buckets);
        let mut empty_streak: u64 = 0;
        let mut steps: u64 = 0;

        while collected.len() < n && steps < total_buckets {
            steps += 1;
            let mut found_any = false;
            for t in 0..2 {
                if self.tables[t].buckets.is_empty() {
                    continue;
                }
                if t == 0 {
                    if let Some(ridx) = self.rehash_idx {
                        if (i as usize) < ridx {
                            continue;
                        }
                    }
                }
                let bucket = (i & self.tables[t].mask()) as usize;
                if !table_seen[t].insert(bucket) {
                    continue;
                }
                let mut cur = self.tables[t].buckets[bucket];
                while let Some(idx) = cur {
                    collected.push(idx);
                    found_any = true;
                    cur = self.arena[idx].as_ref().expect("arena slot occupied").next;
                }
            }

            if found_any {
                empty_streak = 0;
            } else {
                empty_streak += 1;
            }

            if empty_streak >= empty_streak_limit {
                i = rand::Rng::gen_range(&mut rng, 0..total_buckets);
                empty_streak = 0;
            } else {
                i = (i + 1) & masked;
            }
        }

        collected
            .into_iter()
            .map(|idx| {
                let entry = self.arena[idx].as_ref().expect("arena slot occupied");
                (&entry.key, &entry.value)
            })
            .collect()
    }

    /// Iterate every entry. Holds only an immutable borrow, so (unlike
    /// the fingerprinted "unsafe iterator" this is modeled on) the borrow
    /// checker rules out the rehash-during-iteration hazard it guards
    /// against; callers that need rehashing paused across a longer-lived
    /// traversal still use [`Dict::begin_safe_iter`].
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            dict: self,
            table: 0,
            bucket: 0,
            cur: None,
        }
    }
}

/// Iterator over every `(key, value)` pair in a [`Dict`].
pub struct Iter<'a, K, V> {
    dict: &'a Dict<K, V>,
    table: usize,
    bucket: usize,
    cur: Option<usize>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V>
where
    K: Hash + Eq,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(idx) = self.cur {
                let entry = self.dict.arena[idx].as_ref().expect("arena slot occupied");
                self.cur = entry.next;
                return Some((&entry.key, &entry.value));
            }
            loop {
                if self.table >= 2 {
                    return None;
                }
                let table = &self.dict.tables[self.table];
                if self.bucket >= table.buckets.len() {
                    self.table += 1;
                    self.bucket = 0;
                    continue;
                }
                let head = table.buckets[self.bucket];
                self.bucket += 1;
                if let Some(h) = head {
                    self.cur = Some(h);
                    break;
                }
            }
        }
    }
}
