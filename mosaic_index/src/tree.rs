// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamic AABB tree with fattened leaves and incremental rebalancing.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::ray::{RayCastInput, RayControl};
use crate::types::{Aabb2D, Scalar};
use crate::visit::{AreaVisitor, RayVisitor, VisitControl, Visitor};

/// Generational handle of a proxy (a leaf of the tree).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProxyId(u32, u32);

impl ProxyId {
    /// Sentinel for "not indexed".
    pub const INVALID: Self = Self(u32::MAX, 0);

    #[allow(
        clippy::cast_possible_truncation,
        reason = "Proxy ids are intentionally 32-bit; the arena never grows past u32::MAX nodes."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }

    /// Whether this is a real handle rather than [`ProxyId::INVALID`].
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl Default for ProxyId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Tuning for leaf fattening.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TreeConfig<T> {
    /// Margin added on every side of a leaf's AABB.
    pub aabb_margin: T,
    /// Multiplier applied to the displacement hint passed to [`DynamicTree::move_proxy`].
    pub displacement_multiplier: T,
}

impl<T: Scalar> Default for TreeConfig<T> {
    fn default() -> Self {
        Self {
            aabb_margin: T::from_f64(0.1),
            displacement_multiplier: T::from_f64(2.0),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct NodeIdx(usize);

impl NodeIdx {
    const fn get(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug)]
enum Kind<P> {
    Leaf(P),
    Internal([NodeIdx; 2]),
    Free,
}

#[derive(Clone, Debug)]
struct Node<T, P> {
    aabb: Aabb2D<T>,
    parent: Option<NodeIdx>,
    // Leaves are 0, free nodes -1.
    height: i32,
    generation: u32,
    kind: Kind<P>,
}

/// A dynamic AABB tree.
///
/// Each proxy stores a fattened copy of its AABB so small movements do not touch the
/// tree structure. Internal nodes are kept balanced with rotations on insert and remove.
pub struct DynamicTree<T, P> {
    nodes: Vec<Node<T, P>>,
    free_list: Vec<usize>,
    root: Option<NodeIdx>,
    proxy_count: usize,
    config: TreeConfig<T>,
}

impl<T: Scalar, P> Default for DynamicTree<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar, P> DynamicTree<T, P> {
    /// Create an empty tree with the default fattening margins.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create an empty tree with explicit fattening margins.
    pub fn with_config(config: TreeConfig<T>) -> Self {
        Self {
            nodes: Vec::new(),
            free_list: Vec::new(),
            root: None,
            proxy_count: 0,
            config,
        }
    }

    /// The fattening configuration.
    pub fn config(&self) -> &TreeConfig<T> {
        &self.config
    }

    /// Number of live proxies.
    pub fn len(&self) -> usize {
        self.proxy_count
    }

    /// Whether the tree has no proxies.
    pub fn is_empty(&self) -> bool {
        self.proxy_count == 0
    }

    /// Height of the root (0 for a single leaf, 0 for an empty tree).
    pub fn height(&self) -> i32 {
        self.root.map(|r| self.nodes[r.get()].height).unwrap_or(0)
    }

    /// Remove every proxy. All outstanding [`ProxyId`]s become stale.
    pub fn clear(&mut self) {
        self.root = None;
        self.proxy_count = 0;
        self.free_list.clear();
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.kind = Kind::Free;
            node.height = -1;
            node.parent = None;
            self.free_list.push(i);
        }
    }

    /// Insert a proxy for `aabb` and return its handle.
    pub fn create_proxy(&mut self, aabb: Aabb2D<T>, payload: P) -> ProxyId {
        let fat = aabb.fattened(self.config.aabb_margin);
        let leaf = self.allocate(fat, Kind::Leaf(payload));
        let node = &mut self.nodes[leaf.get()];
        node.generation = node.generation.wrapping_add(1);
        let id = ProxyId::new(leaf.get(), node.generation);
        self.insert_leaf(leaf);
        self.proxy_count += 1;
        id
    }

    /// Remove a proxy and return its payload.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale or invalid.
    pub fn destroy_proxy(&mut self, id: ProxyId) -> P {
        let leaf = self.leaf(id);
        self.remove_leaf(leaf);
        self.proxy_count -= 1;
        match self.free_node(leaf) {
            Kind::Leaf(payload) => payload,
            _ => unreachable!("live proxy was not a leaf"),
        }
    }

    /// Move a proxy to `aabb`, extending its fat bound along `displacement`.
    ///
    /// Returns `true` if the leaf had to be reinserted, `false` if the new AABB still fit
    /// inside the current fat bound.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale or invalid.
    pub fn move_proxy(&mut self, id: ProxyId, aabb: Aabb2D<T>, displacement: (T, T)) -> bool {
        let leaf = self.leaf(id);
        if self.nodes[leaf.get()].aabb.contains(&aabb) {
            return false;
        }
        self.remove_leaf(leaf);

        let mut fat = aabb.fattened(self.config.aabb_margin);
        let dx = self.config.displacement_multiplier * displacement.0;
        let dy = self.config.displacement_multiplier * displacement.1;
        if dx < T::zero() {
            fat.min_x = fat.min_x + dx;
        } else {
            fat.max_x = fat.max_x + dx;
        }
        if dy < T::zero() {
            fat.min_y = fat.min_y + dy;
        } else {
            fat.max_y = fat.max_y + dy;
        }
        self.nodes[leaf.get()].aabb = fat;
        self.insert_leaf(leaf);
        true
    }

    /// Whether `id` refers to a live proxy.
    pub fn contains(&self, id: ProxyId) -> bool {
        self.live_leaf(id).is_some()
    }

    /// Payload of a live proxy.
    pub fn payload(&self, id: ProxyId) -> Option<&P> {
        let leaf = self.live_leaf(id)?;
        match &self.nodes[leaf.get()].kind {
            Kind::Leaf(p) => Some(p),
            _ => None,
        }
    }

    /// Mutable payload of a live proxy.
    pub fn payload_mut(&mut self, id: ProxyId) -> Option<&mut P> {
        let leaf = self.live_leaf(id)?;
        match &mut self.nodes[leaf.get()].kind {
            Kind::Leaf(p) => Some(p),
            _ => None,
        }
    }

    /// Fattened AABB stored for a live proxy.
    pub fn fat_aabb(&self, id: ProxyId) -> Option<Aabb2D<T>> {
        self.live_leaf(id).map(|leaf| self.nodes[leaf.get()].aabb)
    }

    /// Iterate over live proxies with their fat bounds and payloads.
    pub fn proxies(&self) -> impl Iterator<Item = (ProxyId, &Aabb2D<T>, &P)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| match &n.kind {
                Kind::Leaf(p) => Some((ProxyId::new(i, n.generation), &n.aabb, p)),
                _ => None,
            })
    }

    /// Visit every proxy whose fat AABB overlaps `aabb`.
    ///
    /// The callback returns `false` to stop early.
    pub fn query<F>(&self, aabb: Aabb2D<T>, callback: F)
    where
        F: FnMut(ProxyId, &P) -> bool,
    {
        self.traverse(&mut AreaVisitor::new(aabb, callback));
    }

    /// Cast a segment through the tree.
    ///
    /// The callback sees the current (possibly clipped) input for each leaf whose fat
    /// AABB the segment touches, and steers the traversal with a [`RayControl`].
    pub fn ray_cast<F>(&self, input: RayCastInput<T>, callback: F)
    where
        F: FnMut(&RayCastInput<T>, ProxyId, &P) -> RayControl<T>,
    {
        self.traverse(&mut RayVisitor::new(input, callback));
    }

    /// Depth-first traversal driven by `visitor`.
    pub fn traverse<V: Visitor<T, P>>(&self, visitor: &mut V) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i.get()];
            if !visitor.overlaps(&node.aabb) {
                continue;
            }
            match &node.kind {
                Kind::Leaf(payload) => {
                    let id = ProxyId::new(i.get(), node.generation);
                    if visitor.visit_leaf(id, &node.aabb, payload) == VisitControl::Stop {
                        return;
                    }
                }
                Kind::Internal([a, b]) => {
                    stack.push(*a);
                    stack.push(*b);
                }
                // Free nodes are never linked into the tree.
                Kind::Free => {}
            }
        }
    }

    // --- internals ---

    fn live_leaf(&self, id: ProxyId) -> Option<NodeIdx> {
        let node = self.nodes.get(id.idx())?;
        match node.kind {
            Kind::Leaf(_) if node.generation == id.1 => Some(NodeIdx(id.idx())),
            _ => None,
        }
    }

    fn leaf(&self, id: ProxyId) -> NodeIdx {
        match self.live_leaf(id) {
            Some(leaf) => leaf,
            None => panic!("stale or invalid ProxyId {id:?}"),
        }
    }

    fn children(&self, i: NodeIdx) -> Option<[NodeIdx; 2]> {
        match self.nodes[i.get()].kind {
            Kind::Internal(c) => Some(c),
            _ => None,
        }
    }

    fn allocate(&mut self, aabb: Aabb2D<T>, kind: Kind<P>) -> NodeIdx {
        if let Some(i) = self.free_list.pop() {
            let node = &mut self.nodes[i];
            node.aabb = aabb;
            node.parent = None;
            node.height = 0;
            node.kind = kind;
            NodeIdx(i)
        } else {
            self.nodes.push(Node {
                aabb,
                parent: None,
                height: 0,
                generation: 0,
                kind,
            });
            NodeIdx(self.nodes.len() - 1)
        }
    }

    fn free_node(&mut self, i: NodeIdx) -> Kind<P> {
        let node = &mut self.nodes[i.get()];
        node.parent = None;
        node.height = -1;
        self.free_list.push(i.get());
        core::mem::replace(&mut node.kind, Kind::Free)
    }

    fn replace_child(&mut self, parent: Option<NodeIdx>, old: NodeIdx, new: NodeIdx) {
        match parent {
            Some(p) => {
                if let Kind::Internal(c) = &mut self.nodes[p.get()].kind {
                    if c[0] == old {
                        c[0] = new;
                    } else {
                        c[1] = new;
                    }
                }
            }
            None => self.root = Some(new),
        }
    }

    /// Recompute bound and height of `i` from its children.
    fn refit(&mut self, i: NodeIdx) {
        if let Some([a, b]) = self.children(i) {
            let (na, nb) = (&self.nodes[a.get()], &self.nodes[b.get()]);
            let aabb = na.aabb.union(&nb.aabb);
            let height = 1 + na.height.max(nb.height);
            let node = &mut self.nodes[i.get()];
            node.aabb = aabb;
            node.height = height;
        }
    }

    fn refit_ancestors(&mut self, mut index: Option<NodeIdx>) {
        while let Some(i) = index {
            let i = self.balance(i);
            self.refit(i);
            index = self.nodes[i.get()].parent;
        }
    }

    /// Cost of descending into `child` when inserting `leaf_aabb`.
    fn descend_cost(&self, child: NodeIdx, leaf_aabb: &Aabb2D<T>, inheritance: T::Acc) -> T::Acc {
        let node = &self.nodes[child.get()];
        let combined = leaf_aabb.union(&node.aabb).perimeter();
        match node.kind {
            Kind::Leaf(_) => combined + inheritance,
            _ => combined - node.aabb.perimeter() + inheritance,
        }
    }

    fn insert_leaf(&mut self, leaf: NodeIdx) {
        let Some(root) = self.root else {
            self.root = Some(leaf);
            self.nodes[leaf.get()].parent = None;
            return;
        };

        // Find the best sibling by the perimeter heuristic.
        let leaf_aabb = self.nodes[leaf.get()].aabb;
        let mut index = root;
        while let Some([c1, c2]) = self.children(index) {
            let node_aabb = self.nodes[index.get()].aabb;
            let area = node_aabb.perimeter();
            let combined = node_aabb.union(&leaf_aabb).perimeter();
            // Cost of making a new parent for this node and the leaf.
            let cost = combined + combined;
            // Minimum cost of pushing the leaf further down.
            let inheritance = (combined - area) + (combined - area);
            let cost1 = self.descend_cost(c1, &leaf_aabb, inheritance);
            let cost2 = self.descend_cost(c2, &leaf_aabb, inheritance);
            if cost < cost1 && cost < cost2 {
                break;
            }
            index = if cost1 < cost2 { c1 } else { c2 };
        }
        let sibling = index;

        let old_parent = self.nodes[sibling.get()].parent;
        let sibling_aabb = self.nodes[sibling.get()].aabb;
        let sibling_height = self.nodes[sibling.get()].height;
        let new_parent = self.allocate(
            leaf_aabb.union(&sibling_aabb),
            Kind::Internal([sibling, leaf]),
        );
        self.nodes[new_parent.get()].parent = old_parent;
        self.nodes[new_parent.get()].height = sibling_height + 1;
        self.replace_child(old_parent, sibling, new_parent);
        self.nodes[sibling.get()].parent = Some(new_parent);
        self.nodes[leaf.get()].parent = Some(new_parent);

        self.refit_ancestors(Some(new_parent));
    }

    fn remove_leaf(&mut self, leaf: NodeIdx) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }
        let Some(parent) = self.nodes[leaf.get()].parent else {
            return;
        };
        let Some([a, b]) = self.children(parent) else {
            return;
        };
        let sibling = if a == leaf { b } else { a };
        let grand_parent = self.nodes[parent.get()].parent;

        self.replace_child(grand_parent, parent, sibling);
        self.nodes[sibling.get()].parent = grand_parent;
        self.nodes[leaf.get()].parent = None;
        let _ = self.free_node(parent);

        self.refit_ancestors(grand_parent);
    }

    /// Rotate `a` if its children heights differ by more than one. Returns the new
    /// subtree root.
    fn balance(&mut self, a: NodeIdx) -> NodeIdx {
        if self.nodes[a.get()].height < 2 {
            return a;
        }
        let Some([b, c]) = self.children(a) else {
            return a;
        };
        let diff = self.nodes[c.get()].height - self.nodes[b.get()].height;
        if diff > 1 {
            self.rotate_up(a, 1)
        } else if diff < -1 {
            self.rotate_up(a, 0)
        } else {
            a
        }
    }

    /// Promote child `slot` of `a` into `a`'s place.
    ///
    /// The promoted node keeps its taller child and hands the shorter one down to `a`.
    fn rotate_up(&mut self, a: NodeIdx, slot: usize) -> NodeIdx {
        let Some(children) = self.children(a) else {
            return a;
        };
        let up = children[slot];
        let stay = children[1 - slot];
        let Some([f, g]) = self.children(up) else {
            return a;
        };

        let a_parent = self.nodes[a.get()].parent;
        self.nodes[up.get()].parent = a_parent;
        self.nodes[a.get()].parent = Some(up);
        self.replace_child(a_parent, a, up);

        let (keep, give) = if self.nodes[f.get()].height > self.nodes[g.get()].height {
            (f, g)
        } else {
            (g, f)
        };
        self.nodes[up.get()].kind = Kind::Internal([a, keep]);
        if let Kind::Internal(c) = &mut self.nodes[a.get()].kind {
            c[slot] = give;
        }
        self.nodes[give.get()].parent = Some(a);

        let a_aabb = self.nodes[stay.get()].aabb.union(&self.nodes[give.get()].aabb);
        let a_height = 1 + self.nodes[stay.get()].height.max(self.nodes[give.get()].height);
        let up_aabb = a_aabb.union(&self.nodes[keep.get()].aabb);
        let up_height = 1 + a_height.max(self.nodes[keep.get()].height);
        self.nodes[a.get()].aabb = a_aabb;
        self.nodes[a.get()].height = a_height;
        self.nodes[up.get()].aabb = up_aabb;
        self.nodes[up.get()].height = up_height;
        up
    }

    /// Check parent links, heights, bounds and leaf counts.
    #[cfg(test)]
    pub(crate) fn validate(&self) {
        fn walk<T: Scalar, P>(tree: &DynamicTree<T, P>, i: NodeIdx, leaves: &mut usize) -> i32 {
            let node = &tree.nodes[i.get()];
            match node.kind {
                Kind::Leaf(_) => {
                    assert_eq!(node.height, 0, "leaf height");
                    *leaves += 1;
                    0
                }
                Kind::Internal([a, b]) => {
                    assert_eq!(tree.nodes[a.get()].parent, Some(i), "child parent link");
                    assert_eq!(tree.nodes[b.get()].parent, Some(i), "child parent link");
                    assert!(
                        node.aabb.contains(&tree.nodes[a.get()].aabb)
                            && node.aabb.contains(&tree.nodes[b.get()].aabb),
                        "internal bound encloses children"
                    );
                    let ha = walk(tree, a, leaves);
                    let hb = walk(tree, b, leaves);
                    let h = 1 + ha.max(hb);
                    assert_eq!(node.height, h, "stored height");
                    h
                }
                Kind::Free => panic!("free node reachable from root"),
            }
        }
        let mut leaves = 0;
        if let Some(root) = self.root {
            assert_eq!(self.nodes[root.get()].parent, None, "root has no parent");
            walk(self, root, &mut leaves);
        }
        assert_eq!(leaves, self.proxy_count, "leaf count matches proxy count");
    }
}

impl<T: Debug, P> Debug for DynamicTree<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DynamicTree")
            .field("proxies", &self.proxy_count)
            .field("arena_nodes", &self.nodes.len())
            .field("free_list", &self.free_list.len())
            .field("has_root", &self.root.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Dynamic tree with f32 coordinates and f64 cost metrics.
pub type DynamicTreeF32<P> = DynamicTree<f32, P>;

/// Dynamic tree with f64 coordinates.
pub type DynamicTreeF64<P> = DynamicTree<f64, P>;
