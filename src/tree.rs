//! Red-black tree engine.
//!
//! A pure algorithm over externally owned nodes. Nodes live in a
//! [`slotmap`] arena and carry their links and color inline; the engine
//! only ever touches the surface exposed by [`TreeNode`], so a single
//! arena can host any number of independent roots (the hashed containers
//! keep one tree per bucket inside one arena).
//!
//! Search operations take a probe closure that compares a *stored* key
//! against the target and returns its [`Ordering`]: `Greater` descends
//! left, `Less` descends right. Insert operations take a two-key
//! comparator instead. Duplicate keys are allowed — [`add`] always
//! inserts, placing equal keys to the right of existing ones, and
//! [`equal_range`] recovers the full run.

use std::cmp::Ordering;

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable handle of one tree node inside its arena.
    pub struct NodeId;
}

/// Node storage shared by every tree in the crate.
pub type Arena<N> = SlotMap<NodeId, N>;

/// Intrusive link block: parent/left/right and the color bit.
#[derive(Clone, Copy, Debug, Default)]
pub struct Links {
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub red: bool,
}

impl Links {
    /// Resets to a detached black node; used when nodes are re-threaded
    /// into fresh trees (bucket rebuilds).
    pub fn clear(&mut self) {
        *self = Links::default();
    }
}

/// The surface a node must expose to the engine.
pub trait TreeNode: Sized {
    type Key;
    type Value;

    /// A fresh, detached node.
    fn new(key: Self::Key, value: Self::Value) -> Self;

    fn links(&self) -> &Links;
    fn links_mut(&mut self) -> &mut Links;
    fn key(&self) -> &Self::Key;
    fn value(&self) -> &Self::Value;
    fn value_mut(&mut self) -> &mut Self::Value;
    fn into_pair(self) -> (Self::Key, Self::Value);

    fn replace_value(&mut self, value: Self::Value) -> Self::Value {
        std::mem::replace(self.value_mut(), value)
    }
}

fn parent<N: TreeNode>(a: &Arena<N>, id: NodeId) -> Option<NodeId> {
    a[id].links().parent
}

fn left<N: TreeNode>(a: &Arena<N>, id: NodeId) -> Option<NodeId> {
    a[id].links().left
}

fn right<N: TreeNode>(a: &Arena<N>, id: NodeId) -> Option<NodeId> {
    a[id].links().right
}

fn set_parent<N: TreeNode>(a: &mut Arena<N>, id: NodeId, p: Option<NodeId>) {
    a[id].links_mut().parent = p;
}

fn set_left<N: TreeNode>(a: &mut Arena<N>, id: NodeId, l: Option<NodeId>) {
    a[id].links_mut().left = l;
}

fn set_right<N: TreeNode>(a: &mut Arena<N>, id: NodeId, r: Option<NodeId>) {
    a[id].links_mut().right = r;
}

fn set_red<N: TreeNode>(a: &mut Arena<N>, id: NodeId, red: bool) {
    a[id].links_mut().red = red;
}

fn node_is_red<N: TreeNode>(a: &Arena<N>, id: NodeId) -> bool {
    a[id].links().red
}

/// Absent children count as black.
fn is_red<N: TreeNode>(a: &Arena<N>, id: Option<NodeId>) -> bool {
    id.map(|id| node_is_red(a, id)).unwrap_or(false)
}

fn subtree_min<N: TreeNode>(a: &Arena<N>, mut n: NodeId) -> NodeId {
    while let Some(l) = left(a, n) {
        n = l;
    }
    n
}

fn subtree_max<N: TreeNode>(a: &Arena<N>, mut n: NodeId) -> NodeId {
    while let Some(r) = right(a, n) {
        n = r;
    }
    n
}

/// Leftmost node of the tree.
pub fn first<N: TreeNode>(a: &Arena<N>, root: Option<NodeId>) -> Option<NodeId> {
    root.map(|r| subtree_min(a, r))
}

/// Rightmost node of the tree.
pub fn last<N: TreeNode>(a: &Arena<N>, root: Option<NodeId>) -> Option<NodeId> {
    root.map(|r| subtree_max(a, r))
}

/// In-order successor.
pub fn next<N: TreeNode>(a: &Arena<N>, mut n: NodeId) -> Option<NodeId> {
    if let Some(r) = right(a, n) {
        return Some(subtree_min(a, r));
    }
    loop {
        let p = parent(a, n)?;
        if left(a, p) == Some(n) {
            return Some(p);
        }
        n = p;
    }
}

/// In-order predecessor.
pub fn prev<N: TreeNode>(a: &Arena<N>, mut n: NodeId) -> Option<NodeId> {
    if let Some(l) = left(a, n) {
        return Some(subtree_max(a, l));
    }
    loop {
        let p = parent(a, n)?;
        if right(a, p) == Some(n) {
            return Some(p);
        }
        n = p;
    }
}

/// Descends from `look` and returns the last node visited together with
/// how its key compared. `Equal` means a match; otherwise the returned
/// node is the attachment point for an insertion on the reported side.
pub fn try_find<N: TreeNode>(
    a: &Arena<N>,
    mut look: NodeId,
    probe: impl Fn(&N::Key) -> Ordering,
) -> (NodeId, Ordering) {
    loop {
        match probe(a[look].key()) {
            Ordering::Equal => return (look, Ordering::Equal),
            Ordering::Greater => match left(a, look) {
                Some(l) => look = l,
                None => return (look, Ordering::Greater),
            },
            Ordering::Less => match right(a, look) {
                Some(r) => look = r,
                None => return (look, Ordering::Less),
            },
        }
    }
}

/// First node matching the probe, if any.
pub fn find<N: TreeNode>(
    a: &Arena<N>,
    root: Option<NodeId>,
    probe: impl Fn(&N::Key) -> Ordering,
) -> Option<NodeId> {
    let r = root?;
    let (node, ord) = try_find(a, r, probe);
    (ord == Ordering::Equal).then_some(node)
}

/// Inclusive `[first, last]` span of nodes the probe reports `Equal` for.
pub fn equal_range<N: TreeNode>(
    a: &Arena<N>,
    root: Option<NodeId>,
    probe: impl Fn(&N::Key) -> Ordering,
) -> Option<(NodeId, NodeId)> {
    let r = root?;
    let (node, ord) = try_find(a, r, &probe);
    if ord != Ordering::Equal {
        return None;
    }
    let mut first = node;
    if let Some(l) = left(a, node) {
        let mut walk = l;
        loop {
            if probe(a[walk].key()) == Ordering::Equal {
                first = walk;
                match left(a, walk) {
                    Some(l) => walk = l,
                    None => break,
                }
            } else {
                match right(a, walk) {
                    Some(r) => walk = r,
                    None => break,
                }
            }
        }
    }
    let mut last = node;
    if let Some(r) = right(a, node) {
        let mut walk = r;
        loop {
            if probe(a[walk].key()) == Ordering::Equal {
                last = walk;
                match right(a, walk) {
                    Some(r) => walk = r,
                    None => break,
                }
            } else {
                match left(a, walk) {
                    Some(l) => walk = l,
                    None => break,
                }
            }
        }
    }
    Some((first, last))
}

/// Boundary pair around the probe: `(last <=, first >=)`. A match fills
/// both sides with the matching node.
pub fn nearest<N: TreeNode>(
    a: &Arena<N>,
    root: Option<NodeId>,
    probe: impl Fn(&N::Key) -> Ordering,
) -> (Option<NodeId>, Option<NodeId>) {
    let Some(r) = root else {
        return (None, None);
    };
    let (node, ord) = try_find(a, r, probe);
    match ord {
        Ordering::Equal => (Some(node), Some(node)),
        Ordering::Greater => (prev(a, node), Some(node)),
        Ordering::Less => (Some(node), next(a, node)),
    }
}

/// First node the probe reports `Greater` or `Equal` for.
pub fn lower_bound<N: TreeNode>(
    a: &Arena<N>,
    root: Option<NodeId>,
    probe: impl Fn(&N::Key) -> Ordering,
) -> Option<NodeId> {
    let mut look = root?;
    let mut found = None;
    loop {
        if probe(a[look].key()) != Ordering::Less {
            found = Some(look);
            match left(a, look) {
                Some(l) => look = l,
                None => break,
            }
        } else {
            match right(a, look) {
                Some(r) => look = r,
                None => break,
            }
        }
    }
    found
}

/// First node the probe reports strictly `Greater` for.
pub fn upper_bound<N: TreeNode>(
    a: &Arena<N>,
    root: Option<NodeId>,
    probe: impl Fn(&N::Key) -> Ordering,
) -> Option<NodeId> {
    let mut look = root?;
    let mut found = None;
    loop {
        if probe(a[look].key()) == Ordering::Greater {
            found = Some(look);
            match left(a, look) {
                Some(l) => look = l,
                None => break,
            }
        } else {
            match right(a, look) {
                Some(r) => look = r,
                None => break,
            }
        }
    }
    found
}

fn rotate_left<N: TreeNode>(a: &mut Arena<N>, root: &mut Option<NodeId>, x: NodeId) {
    let y = right(a, x).expect("left rotation requires a right child");
    let yl = left(a, y);
    set_right(a, x, yl);
    if let Some(yl) = yl {
        set_parent(a, yl, Some(x));
    }
    let xp = parent(a, x);
    set_parent(a, y, xp);
    match xp {
        None => *root = Some(y),
        Some(p) => {
            if left(a, p) == Some(x) {
                set_left(a, p, Some(y));
            } else {
                set_right(a, p, Some(y));
            }
        }
    }
    set_left(a, y, Some(x));
    set_parent(a, x, Some(y));
}

fn rotate_right<N: TreeNode>(a: &mut Arena<N>, root: &mut Option<NodeId>, x: NodeId) {
    let y = left(a, x).expect("right rotation requires a left child");
    let yr = right(a, y);
    set_left(a, x, yr);
    if let Some(yr) = yr {
        set_parent(a, yr, Some(x));
    }
    let xp = parent(a, x);
    set_parent(a, y, xp);
    match xp {
        None => *root = Some(y),
        Some(p) => {
            if left(a, p) == Some(x) {
                set_left(a, p, Some(y));
            } else {
                set_right(a, p, Some(y));
            }
        }
    }
    set_right(a, y, Some(x));
    set_parent(a, x, Some(y));
}

fn insert_fixup<N: TreeNode>(a: &mut Arena<N>, root: &mut Option<NodeId>, mut z: NodeId) {
    loop {
        let p = match parent(a, z) {
            Some(p) if node_is_red(a, p) => p,
            _ => break,
        };
        let g = parent(a, p).expect("a red node always has a parent");
        if Some(p) == left(a, g) {
            let uncle = right(a, g);
            if is_red(a, uncle) {
                set_red(a, p, false);
                set_red(a, uncle.expect("red uncle exists"), false);
                set_red(a, g, true);
                z = g;
            } else {
                if Some(z) == right(a, p) {
                    z = p;
                    rotate_left(a, root, z);
                }
                let p = parent(a, z).expect("rotated node has a parent");
                let g = parent(a, p).expect("a red node always has a parent");
                set_red(a, p, false);
                set_red(a, g, true);
                rotate_right(a, root, g);
            }
        } else {
            let uncle = left(a, g);
            if is_red(a, uncle) {
                set_red(a, p, false);
                set_red(a, uncle.expect("red uncle exists"), false);
                set_red(a, g, true);
                z = g;
            } else {
                if Some(z) == left(a, p) {
                    z = p;
                    rotate_right(a, root, z);
                }
                let p = parent(a, z).expect("rotated node has a parent");
                let g = parent(a, p).expect("a red node always has a parent");
                set_red(a, p, false);
                set_red(a, g, true);
                rotate_left(a, root, g);
            }
        }
    }
    if let Some(r) = *root {
        set_red(a, r, false);
    }
}

/// Threads an existing detached node into the tree ordered by `cmp`.
/// Equal keys descend right, so a fresh duplicate follows its equals in
/// traversal order. The node's links must be cleared beforehand.
pub fn attach<N: TreeNode>(
    a: &mut Arena<N>,
    root: &mut Option<NodeId>,
    node: NodeId,
    cmp: impl Fn(&N::Key, &N::Key) -> Ordering,
) {
    let Some(mut look) = *root else {
        *root = Some(node);
        set_red(a, node, false);
        return;
    };
    loop {
        if cmp(a[look].key(), a[node].key()) == Ordering::Greater {
            match left(a, look) {
                Some(l) => look = l,
                None => {
                    set_left(a, look, Some(node));
                    break;
                }
            }
        } else {
            match right(a, look) {
                Some(r) => look = r,
                None => {
                    set_right(a, look, Some(node));
                    break;
                }
            }
        }
    }
    set_parent(a, node, Some(look));
    set_red(a, node, true);
    insert_fixup(a, root, node);
}

fn attach_at<N: TreeNode>(
    a: &mut Arena<N>,
    root: &mut Option<NodeId>,
    node: NodeId,
    at: NodeId,
    side: Ordering,
) {
    if side == Ordering::Greater {
        set_left(a, at, Some(node));
    } else {
        set_right(a, at, Some(node));
    }
    set_parent(a, node, Some(at));
    set_red(a, node, true);
    insert_fixup(a, root, node);
}

/// Overwrites the value of an equal node, or inserts a new one. Returns
/// the node and the displaced value (`None` means an insertion happened).
pub fn put<N: TreeNode>(
    a: &mut Arena<N>,
    root: &mut Option<NodeId>,
    count: &mut usize,
    key: N::Key,
    value: N::Value,
    cmp: impl Fn(&N::Key, &N::Key) -> Ordering,
) -> (NodeId, Option<N::Value>) {
    match *root {
        None => {
            let id = a.insert(N::new(key, value));
            *root = Some(id);
            *count += 1;
            (id, None)
        }
        Some(r) => {
            let (at, ord) = try_find(a, r, |stored| cmp(stored, &key));
            if ord == Ordering::Equal {
                let old = a[at].replace_value(value);
                (at, Some(old))
            } else {
                let id = a.insert(N::new(key, value));
                attach_at(a, root, id, at, ord);
                *count += 1;
                (id, None)
            }
        }
    }
}

/// Always inserts, even when an equal key exists (multimap semantics).
pub fn add<N: TreeNode>(
    a: &mut Arena<N>,
    root: &mut Option<NodeId>,
    count: &mut usize,
    key: N::Key,
    value: N::Value,
    cmp: impl Fn(&N::Key, &N::Key) -> Ordering,
) -> NodeId {
    let id = a.insert(N::new(key, value));
    attach(a, root, id, cmp);
    *count += 1;
    id
}

/// Inserts only when no equal key exists; first equal wins. Returns
/// whether an insertion happened and the resulting node. The value is
/// dropped when an equal node was already present.
pub fn emplace<N: TreeNode>(
    a: &mut Arena<N>,
    root: &mut Option<NodeId>,
    count: &mut usize,
    key: N::Key,
    value: N::Value,
    cmp: impl Fn(&N::Key, &N::Key) -> Ordering,
) -> (bool, NodeId) {
    match *root {
        None => {
            let id = a.insert(N::new(key, value));
            *root = Some(id);
            *count += 1;
            (true, id)
        }
        Some(r) => {
            let (at, ord) = try_find(a, r, |stored| cmp(stored, &key));
            if ord == Ordering::Equal {
                (false, at)
            } else {
                let id = a.insert(N::new(key, value));
                attach_at(a, root, id, at, ord);
                *count += 1;
                (true, id)
            }
        }
    }
}

/// Replaces the subtree rooted at `u` with `v` in `u`'s parent.
fn transplant<N: TreeNode>(
    a: &mut Arena<N>,
    root: &mut Option<NodeId>,
    u: NodeId,
    v: Option<NodeId>,
) {
    let p = parent(a, u);
    match p {
        None => *root = v,
        Some(p) => {
            if left(a, p) == Some(u) {
                set_left(a, p, v);
            } else {
                set_right(a, p, v);
            }
        }
    }
    if let Some(v) = v {
        set_parent(a, v, p);
    }
}

fn delete_fixup<N: TreeNode>(
    a: &mut Arena<N>,
    root: &mut Option<NodeId>,
    mut x: Option<NodeId>,
    mut x_parent: Option<NodeId>,
) {
    while x != *root && !is_red(a, x) {
        let p = match x_parent {
            Some(p) => p,
            None => break,
        };
        if left(a, p) == x {
            let mut w = match right(a, p) {
                Some(w) => w,
                None => break,
            };
            if node_is_red(a, w) {
                set_red(a, w, false);
                set_red(a, p, true);
                rotate_left(a, root, p);
                w = match right(a, p) {
                    Some(w) => w,
                    None => break,
                };
            }
            if !is_red(a, left(a, w)) && !is_red(a, right(a, w)) {
                set_red(a, w, true);
                x = Some(p);
                x_parent = parent(a, p);
            } else {
                if !is_red(a, right(a, w)) {
                    if let Some(wl) = left(a, w) {
                        set_red(a, wl, false);
                    }
                    set_red(a, w, true);
                    rotate_right(a, root, w);
                    w = match right(a, p) {
                        Some(w) => w,
                        None => break,
                    };
                }
                set_red(a, w, node_is_red(a, p));
                set_red(a, p, false);
                if let Some(wr) = right(a, w) {
                    set_red(a, wr, false);
                }
                rotate_left(a, root, p);
                x = *root;
                x_parent = None;
            }
        } else {
            let mut w = match left(a, p) {
                Some(w) => w,
                None => break,
            };
            if node_is_red(a, w) {
                set_red(a, w, false);
                set_red(a, p, true);
                rotate_right(a, root, p);
                w = match left(a, p) {
                    Some(w) => w,
                    None => break,
                };
            }
            if !is_red(a, left(a, w)) && !is_red(a, right(a, w)) {
                set_red(a, w, true);
                x = Some(p);
                x_parent = parent(a, p);
            } else {
                if !is_red(a, left(a, w)) {
                    if let Some(wr) = right(a, w) {
                        set_red(a, wr, false);
                    }
                    set_red(a, w, true);
                    rotate_left(a, root, w);
                    w = match left(a, p) {
                        Some(w) => w,
                        None => break,
                    };
                }
                set_red(a, w, node_is_red(a, p));
                set_red(a, p, false);
                if let Some(wl) = left(a, w) {
                    set_red(a, wl, false);
                }
                rotate_right(a, root, p);
                x = *root;
                x_parent = None;
            }
        }
    }
    if let Some(x) = x {
        set_red(a, x, false);
    }
}

fn detach<N: TreeNode>(a: &mut Arena<N>, root: &mut Option<NodeId>, z: NodeId) {
    let z_left = left(a, z);
    let z_right = right(a, z);
    let fix_needed;
    let x;
    let x_parent;
    if z_left.is_none() || z_right.is_none() {
        let child = z_left.or(z_right);
        let zp = parent(a, z);
        fix_needed = !node_is_red(a, z);
        transplant(a, root, z, child);
        x = child;
        x_parent = zp;
    } else {
        let zr = z_right.expect("checked above");
        let y = subtree_min(a, zr);
        let y_was_red = node_is_red(a, y);
        let yr = right(a, y);
        if parent(a, y) == Some(z) {
            x_parent = Some(y);
        } else {
            x_parent = parent(a, y);
            transplant(a, root, y, yr);
            set_right(a, y, Some(zr));
            set_parent(a, zr, Some(y));
        }
        transplant(a, root, z, Some(y));
        let zl = z_left.expect("checked above");
        set_left(a, y, Some(zl));
        set_parent(a, zl, Some(y));
        set_red(a, y, node_is_red(a, z));
        fix_needed = !y_was_red;
        x = yr;
    }
    if fix_needed {
        delete_fixup(a, root, x, x_parent);
    }
}

/// Unlinks one node with the standard delete fixup and releases it from
/// the arena, returning its key and value.
pub fn remove_node<N: TreeNode>(
    a: &mut Arena<N>,
    root: &mut Option<NodeId>,
    count: &mut usize,
    node: NodeId,
) -> (N::Key, N::Value) {
    detach(a, root, node);
    *count -= 1;
    a.remove(node)
        .expect("a detached node is still arena-resident")
        .into_pair()
}

/// Removes up to `limit` nodes starting at `node` and following in-order
/// succession; returns how many were removed.
pub fn remove_nodes<N: TreeNode>(
    a: &mut Arena<N>,
    root: &mut Option<NodeId>,
    count: &mut usize,
    mut node: NodeId,
    limit: usize,
) -> usize {
    let mut removed = 0;
    while removed < limit {
        let successor = next(a, node);
        remove_node(a, root, count, node);
        removed += 1;
        match successor {
            Some(s) if removed < limit => node = s,
            _ => break,
        }
    }
    removed
}

/// Removes the inclusive in-order run from `first` (the tree's first node
/// when `None`) through `last`; returns how many nodes went away.
pub fn remove_range<N: TreeNode>(
    a: &mut Arena<N>,
    root: &mut Option<NodeId>,
    count: &mut usize,
    first: Option<NodeId>,
    last: NodeId,
) -> usize {
    let mut node = match first {
        Some(n) => n,
        None => match self::first(a, *root) {
            Some(n) => n,
            None => return 0,
        },
    };
    let mut removed = 0;
    loop {
        removed += 1;
        if node == last {
            remove_node(a, root, count, node);
            return removed;
        }
        let successor = next(a, node);
        remove_node(a, root, count, node);
        match successor {
            Some(s) => node = s,
            None => return removed,
        }
    }
}

/// Deep structural copy of a subtree into `dst`, preserving shape and
/// colors. Returns the new root.
pub fn duplicate<N: TreeNode>(
    src: &Arena<N>,
    src_root: Option<NodeId>,
    dst: &mut Arena<N>,
) -> Option<NodeId>
where
    N::Key: Clone,
    N::Value: Clone,
{
    fn clone_one<N: TreeNode>(src: &Arena<N>, dst: &mut Arena<N>, s: NodeId) -> NodeId
    where
        N::Key: Clone,
        N::Value: Clone,
    {
        let node = &src[s];
        let id = dst.insert(N::new(node.key().clone(), node.value().clone()));
        dst[id].links_mut().red = node.links().red;
        id
    }

    let s_root = src_root?;
    let d_root = clone_one(src, dst, s_root);
    let mut stack = vec![(s_root, d_root)];
    while let Some((s, d)) = stack.pop() {
        if let Some(sl) = left(src, s) {
            let dl = clone_one(src, dst, sl);
            dst[dl].links_mut().parent = Some(d);
            dst[d].links_mut().left = Some(dl);
            stack.push((sl, dl));
        }
        if let Some(sr) = right(src, s) {
            let dr = clone_one(src, dst, sr);
            dst[dr].links_mut().parent = Some(d);
            dst[d].links_mut().right = Some(dr);
            stack.push((sr, dr));
        }
    }
    Some(d_root)
}

/// Releases every node of a subtree back to the arena; returns how many.
pub fn free_subtree<N: TreeNode>(a: &mut Arena<N>, root: Option<NodeId>) -> usize {
    let mut stack = match root {
        Some(r) => vec![r],
        None => return 0,
    };
    let mut freed = 0;
    while let Some(id) = stack.pop() {
        let node = a.remove(id).expect("subtree node is arena-resident");
        if let Some(l) = node.links().left {
            stack.push(l);
        }
        if let Some(r) = node.links().right {
            stack.push(r);
        }
        freed += 1;
    }
    freed
}

/// Walks the whole tree asserting the red-black and threading invariants;
/// returns the node count. Test builds only.
#[cfg(test)]
pub(crate) fn check_tree<N: TreeNode>(
    a: &Arena<N>,
    root: Option<NodeId>,
    cmp: &dyn Fn(&N::Key, &N::Key) -> Ordering,
) -> usize {
    fn check_node<N: TreeNode>(a: &Arena<N>, id: NodeId, count: &mut usize) -> usize {
        *count += 1;
        let links = a[id].links();
        if links.red {
            assert!(!is_red(a, links.left), "red node has a red left child");
            assert!(!is_red(a, links.right), "red node has a red right child");
        }
        let lh = match links.left {
            Some(l) => {
                assert_eq!(parent(a, l), Some(id), "left child parent link broken");
                check_node(a, l, count)
            }
            None => 0,
        };
        let rh = match links.right {
            Some(r) => {
                assert_eq!(parent(a, r), Some(id), "right child parent link broken");
                check_node(a, r, count)
            }
            None => 0,
        };
        assert_eq!(lh, rh, "black height differs between children");
        lh + if links.red { 0 } else { 1 }
    }

    let Some(r) = root else {
        return 0;
    };
    assert_eq!(parent(a, r), None, "root has a parent");
    assert!(!node_is_red(a, r), "root is red");
    let mut count = 0;
    check_node(a, r, &mut count);

    // In-order keys never decrease.
    let mut walk = first(a, root);
    while let Some(n) = walk {
        if let Some(s) = next(a, n) {
            assert_ne!(
                cmp(a[n].key(), a[s].key()),
                Ordering::Greater,
                "in-order keys out of order"
            );
        }
        walk = next(a, n);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    struct TestNode {
        key: u16,
        value: u32,
        links: Links,
    }

    impl TreeNode for TestNode {
        type Key = u16;
        type Value = u32;

        fn new(key: u16, value: u32) -> Self {
            TestNode {
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

        fn key(&self) -> &u16 {
            &self.key
        }

        fn value(&self) -> &u32 {
            &self.value
        }

        fn value_mut(&mut self) -> &mut u32 {
            &mut self.value
        }

        fn into_pair(self) -> (u16, u32) {
            (self.key, self.value)
        }
    }

    fn cmp(a: &u16, b: &u16) -> Ordering {
        a.cmp(b)
    }

    struct Fixture {
        arena: Arena<TestNode>,
        root: Option<NodeId>,
        count: usize,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                arena: Arena::with_key(),
                root: None,
                count: 0,
            }
        }

        fn put(&mut self, key: u16, value: u32) -> Option<u32> {
            put(&mut self.arena, &mut self.root, &mut self.count, key, value, cmp).1
        }

        fn add(&mut self, key: u16, value: u32) {
            add(&mut self.arena, &mut self.root, &mut self.count, key, value, cmp);
        }

        fn remove(&mut self, key: u16) -> Option<u32> {
            let id = find(&self.arena, self.root, |k| k.cmp(&key))?;
            Some(remove_node(&mut self.arena, &mut self.root, &mut self.count, id).1)
        }

        fn keys(&self) -> Vec<u16> {
            let mut out = Vec::new();
            let mut walk = first(&self.arena, self.root);
            while let Some(n) = walk {
                out.push(*self.arena[n].key());
                walk = next(&self.arena, n);
            }
            out
        }

        fn check(&self) {
            let counted = check_tree(&self.arena, self.root, &cmp);
            assert_eq!(counted, self.count);
            assert_eq!(self.arena.len(), self.count);
        }
    }

    #[test]
    fn empty_tree() {
        let f = Fixture::new();
        assert_eq!(first(&f.arena, f.root), None);
        assert_eq!(f.keys(), Vec::<u16>::new());
    }

    #[test]
    fn put_overwrites_equal_key() {
        let mut f = Fixture::new();
        assert_eq!(f.put(5, 50), None);
        assert_eq!(f.put(5, 51), Some(50));
        assert_eq!(f.count, 1);
        f.check();
    }

    #[test]
    fn add_keeps_duplicates() {
        let mut f = Fixture::new();
        f.add(3, 1);
        f.add(3, 2);
        f.add(3, 3);
        f.add(1, 0);
        assert_eq!(f.count, 4);
        assert_eq!(f.keys(), vec![1, 3, 3, 3]);
        f.check();

        let (lo, hi) = equal_range(&f.arena, f.root, |k| k.cmp(&3)).unwrap();
        let mut values = Vec::new();
        let mut walk = Some(lo);
        while let Some(n) = walk {
            values.push(*f.arena[n].value());
            if n == hi {
                break;
            }
            walk = next(&f.arena, n);
        }
        assert_eq!(values.len(), 3);
        assert_eq!(values.iter().copied().sorted().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn duplicates_added_later_come_last() {
        let mut f = Fixture::new();
        f.add(7, 1);
        f.add(7, 2);
        let (lo, hi) = equal_range(&f.arena, f.root, |k| k.cmp(&7)).unwrap();
        assert_eq!(*f.arena[lo].value(), 1);
        assert_eq!(*f.arena[hi].value(), 2);
    }

    #[test]
    fn emplace_first_wins() {
        let mut f = Fixture::new();
        let (inserted, _) = emplace(&mut f.arena, &mut f.root, &mut f.count, 9, 1, cmp);
        assert!(inserted);
        let (inserted, at) = emplace(&mut f.arena, &mut f.root, &mut f.count, 9, 2, cmp);
        assert!(!inserted);
        assert_eq!(*f.arena[at].value(), 1);
        assert_eq!(f.count, 1);
    }

    #[test]
    fn bounds_and_nearest() {
        let mut f = Fixture::new();
        for k in [10u16, 20, 30, 40] {
            f.put(k, k as u32);
        }
        let lb = lower_bound(&f.arena, f.root, |k| k.cmp(&25)).unwrap();
        assert_eq!(*f.arena[lb].key(), 30);
        let ub = upper_bound(&f.arena, f.root, |k| k.cmp(&30)).unwrap();
        assert_eq!(*f.arena[ub].key(), 40);
        assert_eq!(upper_bound(&f.arena, f.root, |k| k.cmp(&40)), None);

        let (le, ge) = nearest(&f.arena, f.root, |k| k.cmp(&25));
        assert_eq!(*f.arena[le.unwrap()].key(), 20);
        assert_eq!(*f.arena[ge.unwrap()].key(), 30);

        let (le, ge) = nearest(&f.arena, f.root, |k| k.cmp(&30));
        assert_eq!(le, ge);

        let (le, ge) = nearest(&f.arena, f.root, |k| k.cmp(&5));
        assert_eq!(le, None);
        assert_eq!(*f.arena[ge.unwrap()].key(), 10);
    }

    #[test]
    fn remove_range_clears_span() {
        let mut f = Fixture::new();
        for k in 0u16..10 {
            f.put(k, k as u32);
        }
        let from = find(&f.arena, f.root, |k| k.cmp(&3)).unwrap();
        let to = find(&f.arena, f.root, |k| k.cmp(&6)).unwrap();
        let removed = remove_range(&mut f.arena, &mut f.root, &mut f.count, Some(from), to);
        assert_eq!(removed, 4);
        assert_eq!(f.keys(), vec![0, 1, 2, 7, 8, 9]);
        f.check();
    }

    #[test]
    fn remove_nodes_stops_at_tree_end() {
        let mut f = Fixture::new();
        for k in 0u16..4 {
            f.put(k, 0);
        }
        let from = find(&f.arena, f.root, |k| k.cmp(&2)).unwrap();
        let removed = remove_nodes(&mut f.arena, &mut f.root, &mut f.count, from, 10);
        assert_eq!(removed, 2);
        assert_eq!(f.keys(), vec![0, 1]);
        f.check();
    }

    #[test]
    fn duplicate_preserves_structure() {
        let mut f = Fixture::new();
        for k in [5u16, 2, 8, 1, 3, 7, 9] {
            f.put(k, k as u32 * 10);
        }
        let mut dst = Arena::with_key();
        let droot = duplicate(&f.arena, f.root, &mut dst);
        let counted = check_tree(&dst, droot, &cmp);
        assert_eq!(counted, f.count);

        let mut keys = Vec::new();
        let mut walk = first(&dst, droot);
        while let Some(n) = walk {
            keys.push(*dst[n].key());
            walk = next(&dst, n);
        }
        assert_eq!(keys, f.keys());
    }

    #[test]
    fn free_subtree_empties_arena() {
        let mut f = Fixture::new();
        for k in 0u16..100 {
            f.put(k, 0);
        }
        assert_eq!(free_subtree(&mut f.arena, f.root), 100);
        assert!(f.arena.is_empty());
    }

    proptest! {
        #[test]
        fn matches_model_and_keeps_invariants(
            ops in prop::collection::vec((any::<bool>(), 0u16..64, any::<u32>()), 1..400)
        ) {
            let mut f = Fixture::new();
            let mut model = BTreeMap::new();
            for (is_put, key, value) in ops {
                if is_put {
                    prop_assert_eq!(f.put(key, value), model.insert(key, value));
                } else {
                    prop_assert_eq!(f.remove(key), model.remove(&key));
                }
                f.check();
            }
            let keys: Vec<u16> = model.keys().copied().collect();
            prop_assert_eq!(f.keys(), keys);
        }

        #[test]
        fn multimap_equal_range_is_exact(
            keys in prop::collection::vec(0u16..16, 1..200),
            probe in 0u16..16,
        ) {
            let mut f = Fixture::new();
            for (i, key) in keys.iter().enumerate() {
                f.add(*key, i as u32);
            }
            f.check();
            let expected = keys.iter().filter(|k| **k == probe).count();
            match equal_range(&f.arena, f.root, |k| k.cmp(&probe)) {
                None => prop_assert_eq!(expected, 0),
                Some((lo, hi)) => {
                    let mut n = 0;
                    let mut walk = Some(lo);
                    while let Some(id) = walk {
                        prop_assert_eq!(*f.arena[id].key(), probe);
                        n += 1;
                        if id == hi { break; }
                        walk = next(&f.arena, id);
                    }
                    prop_assert_eq!(n, expected);
                }
            }
        }
    }
}
