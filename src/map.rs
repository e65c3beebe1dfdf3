//! Ordered associative containers.
//!
//! [`OrdMap`] is a red-black tree keyed by `Ord` with multimap support:
//! [`put`](OrdMap::put) overwrites, [`add`](OrdMap::add) inserts duplicate
//! keys, and the `*_items`/`get_values` family operates on the whole run of
//! a key. [`OrdSet`] is the value-less facade.
//!
//! A container is single-threaded by itself; wrap it as
//! `Shared<OrdMap<K, V>>` (see [`crate::sync::Shared`]) to get the
//! one-coarse-lock-per-container form, and keep multi-step iterations
//! inside a single `with` call.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;

use crate::tree::{self, Arena, Links, NodeId, TreeNode};

pub(crate) struct MapNode<K, V> {
    key: K,
    value: V,
    links: Links,
}

impl<K, V> TreeNode for MapNode<K, V> {
    type Key = K;
    type Value = V;

    fn new(key: K, value: V) -> Self {
        MapNode {
            key,
            value,
            links: Links::default(),
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

/// An ordered map (red-black tree) with duplicate-key support.
pub struct OrdMap<K, V> {
    arena: Arena<MapNode<K, V>>,
    root: Option<NodeId>,
    count: usize,
}

impl<K: Ord, V> OrdMap<K, V> {
    pub fn new() -> Self {
        OrdMap {
            arena: Arena::with_key(),
            root: None,
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn probe<'a, Q>(key: &'a Q) -> impl Fn(&K) -> Ordering + 'a
    where
        K: Borrow<Q> + 'a,
        Q: Ord + ?Sized,
    {
        move |stored| stored.borrow().cmp(key)
    }

    /// First value bound to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let id = tree::find(&self.arena, self.root, Self::probe(key))?;
        Some(self.arena[id].value())
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let id = tree::find(&self.arena, self.root, Self::probe(key))?;
        Some(self.arena[id].value_mut())
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        tree::find(&self.arena, self.root, Self::probe(key)).is_some()
    }

    /// Every value bound to `key` — the whole duplicate run, in tree order.
    pub fn get_values<Q>(&self, key: &Q) -> Vec<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut out = Vec::new();
        if let Some((lo, hi)) = tree::equal_range(&self.arena, self.root, Self::probe(key)) {
            let mut walk = Some(lo);
            while let Some(id) = walk {
                out.push(self.arena[id].value());
                if id == hi {
                    break;
                }
                walk = tree::next(&self.arena, id);
            }
        }
        out
    }

    /// Binds `key` to `value`, overwriting the first equal binding.
    /// Returns the displaced value (`None` means a fresh insertion).
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        tree::put(&mut self.arena, &mut self.root, &mut self.count, key, value, K::cmp).1
    }

    /// Always inserts, even when `key` is already bound (multimap).
    pub fn add(&mut self, key: K, value: V) {
        tree::add(&mut self.arena, &mut self.root, &mut self.count, key, value, K::cmp);
    }

    /// Inserts only when `key` is unbound; returns whether it inserted.
    pub fn emplace(&mut self, key: K, value: V) -> bool {
        tree::emplace(&mut self.arena, &mut self.root, &mut self.count, key, value, K::cmp).0
    }

    /// Removes the first binding of `key` and returns its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let id = tree::find(&self.arena, self.root, Self::probe(key))?;
        Some(tree::remove_node(&mut self.arena, &mut self.root, &mut self.count, id).1)
    }

    /// Removes every binding of `key`; returns how many went away.
    pub fn remove_items<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match tree::equal_range(&self.arena, self.root, Self::probe(key)) {
            Some((lo, hi)) => {
                tree::remove_range(&mut self.arena, &mut self.root, &mut self.count, Some(lo), hi)
            }
            None => 0,
        }
    }

    /// Removes every binding of `key` and returns the values, in tree
    /// order.
    pub fn take_values<Q>(&mut self, key: &Q) -> Vec<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut out = Vec::new();
        let Some((lo, hi)) = tree::equal_range(&self.arena, self.root, Self::probe(key)) else {
            return out;
        };
        let mut node = lo;
        loop {
            let is_last = node == hi;
            let successor = (!is_last).then(|| tree::next(&self.arena, node)).flatten();
            let (_, value) =
                tree::remove_node(&mut self.arena, &mut self.root, &mut self.count, node);
            out.push(value);
            match successor {
                Some(s) => node = s,
                None => break,
            }
        }
        out
    }

    /// Removes the first binding matching both `key` and `value`.
    pub fn remove_key_value<Q>(&mut self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
        V: PartialEq,
    {
        let Some((lo, hi)) = tree::equal_range(&self.arena, self.root, Self::probe(key)) else {
            return false;
        };
        let mut walk = Some(lo);
        while let Some(id) = walk {
            if self.arena[id].value() == value {
                tree::remove_node(&mut self.arena, &mut self.root, &mut self.count, id);
                return true;
            }
            if id == hi {
                break;
            }
            walk = tree::next(&self.arena, id);
        }
        false
    }

    fn entry(&self, id: NodeId) -> (&K, &V) {
        let node = &self.arena[id];
        (node.key(), node.value())
    }

    pub fn first(&self) -> Option<(&K, &V)> {
        tree::first(&self.arena, self.root).map(|id| self.entry(id))
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        tree::last(&self.arena, self.root).map(|id| self.entry(id))
    }

    /// `(last binding <= key, first binding >= key)`.
    pub fn nearest<Q>(&self, key: &Q) -> (Option<(&K, &V)>, Option<(&K, &V)>)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (le, ge) = tree::nearest(&self.arena, self.root, Self::probe(key));
        (le.map(|id| self.entry(id)), ge.map(|id| self.entry(id)))
    }

    /// First binding with a key `>=` the probe.
    pub fn lower_bound<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        tree::lower_bound(&self.arena, self.root, Self::probe(key)).map(|id| self.entry(id))
    }

    /// First binding with a key `>` the probe.
    pub fn upper_bound<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        tree::upper_bound(&self.arena, self.root, Self::probe(key)).map(|id| self.entry(id))
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            map: self,
            next: tree::first(&self.arena, self.root),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.root = None;
        self.count = 0;
    }
}

impl<K: Ord, V> Default for OrdMap<K, V> {
    fn default() -> Self {
        OrdMap::new()
    }
}

impl<K: Ord + Clone, V: Clone> Clone for OrdMap<K, V> {
    fn clone(&self) -> Self {
        let mut arena = Arena::with_key();
        let root = tree::duplicate(&self.arena, self.root, &mut arena);
        OrdMap {
            arena,
            root,
            count: self.count,
        }
    }
}

/// In-order iterator over `(&K, &V)`.
pub struct Iter<'a, K, V> {
    map: &'a OrdMap<K, V>,
    next: Option<NodeId>,
}

impl<'a, K: Ord, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = tree::next(&self.map.arena, id);
        Some(self.map.entry(id))
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a OrdMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<K: Ord, V> Extend<(K, V)> for OrdMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.put(k, v);
        }
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for OrdMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrdMap::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord, V: PartialEq> PartialEq for OrdMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count && self.iter().eq(other.iter())
    }
}

impl<K: Ord, V: Eq> Eq for OrdMap<K, V> {}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for OrdMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// An ordered set; an [`OrdMap`] with unit values.
pub struct OrdSet<T> {
    map: OrdMap<T, ()>,
}

impl<T: Ord> OrdSet<T> {
    pub fn new() -> Self {
        OrdSet { map: OrdMap::new() }
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
        Q: Ord + ?Sized,
    {
        self.map.contains_key(value)
    }

    /// Removes one equal element; returns whether anything was removed.
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.map.remove(value).is_some()
    }

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

impl<T: Ord> Default for OrdSet<T> {
    fn default() -> Self {
        OrdSet::new()
    }
}

impl<T: Ord + Clone> Clone for OrdSet<T> {
    fn clone(&self) -> Self {
        OrdSet {
            map: self.map.clone(),
        }
    }
}

impl<T: Ord> Extend<T> for OrdSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: Ord> FromIterator<T> for OrdSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = OrdSet::new();
        set.extend(iter);
        set
    }
}

impl<T: Ord> PartialEq for OrdSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<T: Ord> Eq for OrdSet<T> {}

impl<T: Ord + fmt::Debug> fmt::Debug for OrdSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
