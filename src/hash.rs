//! Hashed associative containers.
//!
//! [`HashMap`] is a hybrid: every hash bucket holds the root of its own
//! red-black tree (so a degenerate or adversarial key distribution costs
//! `O(log n)` per bucket instead of `O(n)`), while a separate doubly
//! linked list threads all nodes in insertion order. Rehashing moves
//! nodes between bucket trees but never touches the list, so iteration
//! order is stable across any capacity change.
//!
//! Keys are hashed with SipHash-1-3 under a random per-process key, the
//! same keyed-hash discipline the rest of the ecosystem uses for
//! untrusted input. Keys need `Hash + Ord` — `Ord` orders nodes inside a
//! bucket tree and makes duplicate-key (multimap) support structural
//! rather than bolted on.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use rand::RngCore;
use siphasher::sip::SipHasher13;

use crate::tree::{self, Arena, Links, NodeId, TreeNode};

/// Bucket count allocated on first insert.
pub const DEFAULT_CAPACITY_MIN: usize = 16;

/// Hard ceiling for the bucket array.
pub const DEFAULT_CAPACITY_MAX: usize = 1 << 30;

/// One process-wide random SipHash key, drawn once.
fn process_sip_key() -> (u64, u64) {
    static KEY: OnceLock<(u64, u64)> = OnceLock::new();
    *KEY.get_or_init(|| {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        (
            u64::from_le_bytes(bytes[..8].try_into().unwrap()),
            u64::from_le_bytes(bytes[8..].try_into().unwrap()),
        )
    })
}

fn normalize_range(min: usize, max: usize) -> (usize, usize) {
    let min = if min == 0 {
        DEFAULT_CAPACITY_MIN
    } else {
        min.next_power_of_two()
    };
    let max = if max == 0 {
        DEFAULT_CAPACITY_MAX
    } else {
        max.next_power_of_two()
    };
    let max = max.clamp(min, DEFAULT_CAPACITY_MAX);
    (min.min(max), max)
}

pub(crate) struct HashNode<K, V> {
    key: K,
    value: V,
    hash: u64,
    links: Links,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

impl<K, V> TreeNode for HashNode<K, V> {
    type Key = K;
    type Value = V;

    fn new(key: K, value: V) -> Self {
        HashNode {
            key,
            value,
            hash: 0,
            links: Links::default(),
            prev: None,
            next: None,
        }
    }

    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }

    fn key(&self) -> &K {
        &self.key
    }

    fn value(&self) -> &V {
        &self.value
    }

    fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}

/// A hashed map with per-bucket trees, insertion-order iteration, and
/// duplicate-key support.
pub struct HashMap<K, V> {
    arena: Arena<HashNode<K, V>>,
    /// Empty vector while the container is in its unallocated state.
    buckets: Vec<Option<NodeId>>,
    count: usize,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    capacity_min: usize,
    capacity_max: usize,
    sip_key: (u64, u64),
}

impl<K: Hash + Ord, V> HashMap<K, V> {
    pub fn new() -> Self {
        Self::with_capacity_range(DEFAULT_CAPACITY_MIN, DEFAULT_CAPACITY_MAX)
    }

    /// A map whose bucket array stays within `[min, max]`, both rounded up
    /// to powers of two (`0` selects the default bound).
    pub fn with_capacity_range(min: usize, max: usize) -> Self {
        let (capacity_min, capacity_max) = normalize_range(min, max);
        HashMap {
            arena: Arena::with_key(),
            buckets: Vec::new(),
            count: 0,
            head: None,
            tail: None,
            capacity_min,
            capacity_max,
            sip_key: process_sip_key(),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Current bucket count; zero until the first insert and after
    /// [`clear`](HashMap::clear).
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub fn capacity_min(&self) -> usize {
        self.capacity_min
    }

    pub fn capacity_max(&self) -> usize {
        self.capacity_max
    }

    fn hash_of<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(self.sip_key.0, self.sip_key.1);
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    fn probe<'a, Q>(key: &'a Q) -> impl Fn(&K) -> Ordering + 'a
    where
        K: Borrow<Q> + 'a,
        Q: Ord + ?Sized,
    {
        move |stored| stored.borrow().cmp(key)
    }

    fn threshold_up(&self) -> usize {
        self.buckets.len()
    }

    fn threshold_down(&self) -> usize {
        self.buckets.len() / 4
    }

    fn link_tail(&mut self, id: NodeId) {
        let prev_tail = self.tail;
        {
            let node = &mut self.arena[id];
            node.prev = prev_tail;
            node.next = None;
        }
        match prev_tail {
            Some(t) => self.arena[t].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    fn unlink(&mut self, id: NodeId) {
        let (prev, next) = {
            let node = &self.arena[id];
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.arena[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.arena[n].prev = prev,
            None => self.tail = prev,
        }
    }

    /// Rebuilds every bucket tree at `new_capacity` by walking the global
    /// list and re-threading each node by its stored hash. Node storage and
    /// list order are untouched.
    fn rebuild(&mut self, new_capacity: usize) {
        self.buckets.clear();
        self.buckets.resize(new_capacity, None);
        let mask = new_capacity - 1;
        let mut walk = self.head;
        while let Some(id) = walk {
            walk = self.arena[id].next;
            self.arena[id].links.clear();
            let idx = (self.arena[id].hash as usize) & mask;
            let mut root = self.buckets[idx];
            tree::attach(&mut self.arena, &mut root, id, K::cmp);
            self.buckets[idx] = root;
        }
    }

    fn ensure_buckets(&mut self) {
        if self.buckets.is_empty() {
            self.buckets.resize(self.capacity_min, None);
        }
    }

    fn expand_if_loaded(&mut self) {
        let capacity = self.buckets.len();
        if self.count >= self.threshold_up() && capacity < self.capacity_max {
            self.rebuild(capacity * 2);
        }
    }

    fn shrink_if_sparse(&mut self) {
        let capacity = self.buckets.len();
        if capacity == 0 {
            return;
        }
        let mut target = capacity;
        while target > self.capacity_min && self.count <= target / 4 {
            target /= 2;
        }
        if target < capacity {
            self.rebuild(target);
        }
    }

    /// Rounds the bucket array down to fit the current count, bounded below
    /// by the minimum capacity.
    pub fn shrink_to_fit(&mut self) {
        if self.buckets.is_empty() {
            return;
        }
        let target = self.count.next_power_of_two().max(self.capacity_min);
        if target < self.buckets.len() {
            self.rebuild(target);
        }
    }

    /// Re-clamps the capacity bounds, rebuilding when the current bucket
    /// array falls outside them.
    pub fn set_capacity_range(&mut self, min: usize, max: usize) {
        let (min, max) = normalize_range(min, max);
        self.capacity_min = min;
        self.capacity_max = max;
        let capacity = self.buckets.len();
        if capacity == 0 {
            return;
        }
        if capacity < min {
            self.rebuild(min);
        } else if capacity > max {
            self.rebuild(max);
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        if self.buckets.is_empty() {
            return None;
        }
        let idx = self.bucket_of(self.hash_of(key));
        let id = tree::find(&self.arena, self.buckets[idx], Self::probe(key))?;
        Some(self.arena[id].value())
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        if self.buckets.is_empty() {
            return None;
        }
        let idx = self.bucket_of(self.hash_of(key));
        let id = tree::find(&self.arena, self.buckets[idx], Self::probe(key))?;
        Some(self.arena[id].value_mut())
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// The run of equal keys inside one bucket tree, as node ids in tree
    /// order.
    fn key_run<Q>(&self, key: &Q) -> Vec<NodeId>
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        let mut out = Vec::new();
        if self.buckets.is_empty() {
            return out;
        }
        let idx = self.bucket_of(self.hash_of(key));
        if let Some((lo, hi)) = tree::equal_range(&self.arena, self.buckets[idx], Self::probe(key)) {
            let mut walk = Some(lo);
            while let Some(id) = walk {
                out.push(id);
                if id == hi {
                    break;
                }
                walk = tree::next(&self.arena, id);
            }
        }
        out
    }

    /// Every value bound to `key`, duplicates included.
    pub fn get_values<Q>(&self, key: &Q) -> Vec<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.key_run(key)
            .into_iter()
            .map(|id| self.arena[id].value())
            .collect()
    }

    /// Binds `key` to `value`, overwriting the first equal binding.
    /// Returns the displaced value (`None` means a fresh insertion).
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_of(&key);
        self.ensure_buckets();
        let idx = self.bucket_of(hash);
        let mut root = self.buckets[idx];
        let (id, old) = tree::put(&mut self.arena, &mut root, &mut self.count, key, value, K::cmp);
        self.buckets[idx] = root;
        if old.is_none() {
            self.arena[id].hash = hash;
            self.link_tail(id);
            self.expand_if_loaded();
        }
        old
    }

    /// Always inserts, even when `key` is already bound (multimap).
    pub fn add(&mut self, key: K, value: V) {
        let hash = self.hash_of(&key);
        self.ensure_buckets();
        let idx = self.bucket_of(hash);
        let mut root = self.buckets[idx];
        let id = tree::add(&mut self.arena, &mut root, &mut self.count, key, value, K::cmp);
        self.buckets[idx] = root;
        self.arena[id].hash = hash;
        self.link_tail(id);
        self.expand_if_loaded();
    }

    /// Inserts only when `key` is unbound; returns whether it inserted.
    pub fn emplace(&mut self, key: K, value: V) -> bool {
        let hash = self.hash_of(&key);
        self.ensure_buckets();
        let idx = self.bucket_of(hash);
        let mut root = self.buckets[idx];
        let (inserted, id) =
            tree::emplace(&mut self.arena, &mut root, &mut self.count, key, value, K::cmp);
        self.buckets[idx] = root;
        if inserted {
            self.arena[id].hash = hash;
            self.link_tail(id);
            self.expand_if_loaded();
        }
        inserted
    }

    /// Unlinks one node from the list and its bucket tree. No shrink; the
    /// public removal operations shrink once at the end.
    fn detach_entry(&mut self, bucket: usize, id: NodeId) -> (K, V) {
        self.unlink(id);
        let mut root = self.buckets[bucket];
        let pair = tree::remove_node(&mut self.arena, &mut root, &mut self.count, id);
        self.buckets[bucket] = root;
        pair
    }

    /// Removes the first binding of `key` and returns its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        if self.buckets.is_empty() {
            return None;
        }
        let idx = self.bucket_of(self.hash_of(key));
        let id = tree::find(&self.arena, self.buckets[idx], Self::probe(key))?;
        let (_, value) = self.detach_entry(idx, id);
        self.shrink_if_sparse();
        Some(value)
    }

    /// Removes every binding of `key`; returns how many went away.
    pub fn remove_items<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        let run = self.key_run(key);
        if run.is_empty() {
            return 0;
        }
        let idx = self.bucket_of(self.hash_of(key));
        let removed = run.len();
        for id in run {
            self.detach_entry(idx, id);
        }
        self.shrink_if_sparse();
        removed
    }

    /// Removes every binding of `key` and returns the values.
    pub fn take_values<Q>(&mut self, key: &Q) -> Vec<V>
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        let run = self.key_run(key);
        if run.is_empty() {
            return Vec::new();
        }
        let idx = self.bucket_of(self.hash_of(key));
        let values = run
            .into_iter()
            .map(|id| self.detach_entry(idx, id).1)
            .collect();
        self.shrink_if_sparse();
        values
    }

    /// Removes the first binding matching both `key` and `value`.
    pub fn remove_key_value<Q>(&mut self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
        V: PartialEq,
    {
        let run = self.key_run(key);
        let Some(id) = run.into_iter().find(|id| self.arena[*id].value() == value) else {
            return false;
        };
        let idx = self.bucket_of(self.hash_of(key));
        self.detach_entry(idx, id);
        self.shrink_if_sparse();
        true
    }

    /// Frees everything, including the bucket array; the container returns
    /// to its unallocated state.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.buckets = Vec::new();
        self.count = 0;
        self.head = None;
        self.tail = None;
    }

    /// Iterates in insertion order, unaffected by rehashing.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            map: self,
            next: self.head,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    /// Threads a pre-hashed node in at the list tail; used by `clone`.
    fn insert_threaded(&mut self, key: K, value: V, hash: u64) {
        let id = self.arena.insert(HashNode {
            key,
            value,
            hash,
            links: Links::default(),
            prev: None,
            next: None,
        });
        let idx = self.bucket_of(hash);
        let mut root = self.buckets[idx];
        tree::attach(&mut self.arena, &mut root, id, K::cmp);
        self.buckets[idx] = root;
        self.count += 1;
        self.link_tail(id);
    }
}

impl<K: Hash + Ord, V> Default for HashMap<K, V> {
    fn default() -> Self {
        HashMap::new()
    }
}

impl<K: Hash + Ord + Clone, V: Clone> Clone for HashMap<K, V> {
    /// Deep copy preserving insertion order and the capacity
    /// configuration.
    fn clone(&self) -> Self {
        let mut out = HashMap {
            arena: Arena::with_key(),
            buckets: vec![None; self.buckets.len()],
            count: 0,
            head: None,
            tail: None,
            capacity_min: self.capacity_min,
            capacity_max: self.capacity_max,
            sip_key: self.sip_key,
        };
        let mut walk = self.head;
        while let Some(id) = walk {
            let node = &self.arena[id];
            walk = node.next;
            out.insert_threaded(node.key.clone(), node.value.clone(), node.hash);
        }
        out
    }
}

/// Insertion-order iterator over `(&K, &V)`.
pub struct Iter<'a, K, V> {
    map: &'a HashMap<K, V>,
    next: Option<NodeId>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = &self.map.arena[id];
        self.next = node.next;
        Some((&node.key, &node.value))
    }
}

impl<'a, K: Hash + Ord, V> IntoIterator for &'a HashMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<K: Hash + Ord, V> Extend<(K, V)> for HashMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.put(k, v);
        }
    }
}

impl<K: Hash + Ord, V> FromIterator<(K, V)> for HashMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HashMap::new();
        map.extend(iter);
        map
    }
}

fn multiset_eq<V: PartialEq>(a: &[&V], b: &[&V]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    'outer: for x in a {
        for (i, y) in b.iter().enumerate() {
            if !used[i] && *x == *y {
                used[i] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

impl<K: Hash + Ord, V: PartialEq> PartialEq for HashMap<K, V> {
    /// Equality by key→values multisets; insertion order does not matter.
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count
            && self
                .iter()
                .all(|(k, _)| multiset_eq(&self.get_values(k), &other.get_values(k)))
    }
}

impl<K: Hash + Ord, V: Eq> Eq for HashMap<K, V> {}

impl<K: Hash + Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for HashMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// A hashed set; a [`HashMap`] with unit values.
pub struct HashSet<T> {
    map: HashMap<T, ()>,
}

impl<T: Hash + Ord> HashSet<T> {
    pub fn new() -> Self {
        HashSet {
            map: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Inserts unless an equal element exists; returns whether it did.
    pub fn insert(&mut self, value: T) -> bool {
        self.map.emplace(value, ())
    }

    /// Inserts unconditionally, keeping duplicates (multiset).
    pub fn insert_dup(&mut self, value: T) {
        self.map.add(value, ());
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.map.contains_key(value)
    }

    /// Removes one equal element; returns whether anything was removed.
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.map.remove(value).is_some()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.map.keys()
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl<T: Hash + Ord> Default for HashSet<T> {
    fn default() -> Self {
        HashSet::new()
    }
}

impl<T: Hash + Ord + Clone> Clone for HashSet<T> {
    fn clone(&self) -> Self {
        HashSet {
            map: self.map.clone(),
        }
    }
}

impl<T: Hash + Ord> Extend<T> for HashSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: Hash + Ord> FromIterator<T> for HashSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = HashSet::new();
        set.extend(iter);
        set
    }
}

impl<T: Hash + Ord + fmt::Debug> fmt::Debug for HashSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
