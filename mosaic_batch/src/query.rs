// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-batch spatial index and its query result list.

use alloc::vec::Vec;
use core::fmt;

use kurbo::{Point, Rect, Vec2};
use mosaic_index::{DynamicTree, ProxyId, RayCastInput, RayControl, TreeConfig};

use crate::geometry::{Oobb, rect_ray_fraction, rect_to_aabb};
use crate::item::BatchItem;
use crate::pool::{ItemKey, ItemPool};

/// Length of the degenerate ray a point query casts.
const POINT_RAY_LENGTH: f64 = 1e-9;

/// One item found by a query.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QueryResult {
    /// The item.
    pub item: ItemKey,
    /// Its batch id.
    pub batch_id: u32,
    /// Entry fraction along the ray for ray and point queries, `0` otherwise.
    pub fraction: f64,
}

/// A dynamic AABB tree over one batch's items, plus the results of the last query.
///
/// Proxies carry the item's [`ItemKey`] as payload. Every query clears the previous results,
/// bumps the query epoch, and collects each item at most once.
pub struct BatchQuery {
    tree: DynamicTree<f64, ItemKey>,
    epoch: u64,
    // Last epoch each pool slot was collected in.
    visited: Vec<u64>,
    results: Vec<QueryResult>,
    is_raycast_result: bool,
}

impl fmt::Debug for BatchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchQuery")
            .field("proxies", &self.tree.len())
            .field("epoch", &self.epoch)
            .field("results", &self.results.len())
            .field("is_raycast_result", &self.is_raycast_result)
            .finish_non_exhaustive()
    }
}

impl Default for BatchQuery {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}

impl BatchQuery {
    /// Create an empty index.
    pub fn new(config: TreeConfig<f64>) -> Self {
        Self {
            tree: DynamicTree::with_config(config),
            epoch: 0,
            visited: Vec::new(),
            results: Vec::new(),
            is_raycast_result: false,
        }
    }

    /// Index `item` under `key` and store the proxy on the item.
    pub fn add(&mut self, key: ItemKey, item: &mut BatchItem) -> ProxyId {
        debug_assert!(!item.proxy.is_valid(), "item is already indexed");
        let proxy = self.tree.create_proxy(rect_to_aabb(item.local_aabb()), key);
        item.proxy = proxy;
        proxy
    }

    /// Remove `item`'s proxy and mark it unindexed.
    pub fn remove(&mut self, item: &mut BatchItem) {
        if item.proxy.is_valid() {
            self.tree.destroy_proxy(item.proxy);
            item.proxy = ProxyId::INVALID;
        }
    }

    /// Move `item`'s proxy to its current local AABB. No-op for unindexed items.
    ///
    /// Returns whether the proxy was reinserted.
    pub fn update(&mut self, item: &BatchItem, displacement: Vec2) -> bool {
        if !item.proxy.is_valid() {
            return false;
        }
        self.tree.move_proxy(
            item.proxy,
            rect_to_aabb(item.local_aabb()),
            (displacement.x, displacement.y),
        )
    }

    /// Collect items overlapping `area`. With `target_oobb`, items are tested by their
    /// oriented box rather than their AABB.
    pub fn query_area(&mut self, pool: &ItemPool, area: Rect, target_oobb: bool) -> usize {
        self.query_oobb(pool, &Oobb::from_rect(area), target_oobb)
    }

    /// Collect items overlapping an oriented `region`.
    pub fn query_oobb(&mut self, pool: &ItemPool, region: &Oobb, target_oobb: bool) -> usize {
        self.begin(pool, false);
        let Self {
            tree,
            epoch,
            visited,
            results,
            ..
        } = self;
        let bounds = region.bounding_rect();
        let axis_aligned = *region == Oobb::from_rect(bounds);
        tree.query(rect_to_aabb(bounds), |_, &key| {
            let Some(item) = pool.get(key) else {
                return true;
            };
            let hit = if target_oobb {
                item.local_oobb().overlaps(region)
            } else if axis_aligned {
                rect_to_aabb(item.local_aabb()).overlaps(&rect_to_aabb(bounds))
            } else {
                region.overlaps(&Oobb::from_rect(item.local_aabb()))
            };
            if hit && stamp(visited, *epoch, key) {
                results.push(QueryResult {
                    item: key,
                    batch_id: item.batch_id(),
                    fraction: 0.0,
                });
            }
            true
        });
        self.results.len()
    }

    /// Collect items hit by the segment `p1 → p2`, recording each entry fraction.
    ///
    /// Results are in traversal order; see [`sort_raycast_results`](Self::sort_raycast_results).
    pub fn query_ray(&mut self, pool: &ItemPool, p1: Point, p2: Point, target_oobb: bool) -> usize {
        self.begin(pool, true);
        let Self {
            tree,
            epoch,
            visited,
            results,
            ..
        } = self;
        let input = RayCastInput::new(p1.x, p1.y, p2.x, p2.y);
        tree.ray_cast(input, |_, _, &key| {
            let Some(item) = pool.get(key) else {
                return RayControl::Ignore;
            };
            let fraction = if target_oobb {
                item.local_oobb().ray_cast(p1, p2, 1.0)
            } else {
                rect_ray_fraction(item.local_aabb(), p1, p2)
            };
            if let Some(fraction) = fraction {
                if stamp(visited, *epoch, key) {
                    results.push(QueryResult {
                        item: key,
                        batch_id: item.batch_id(),
                        fraction,
                    });
                }
            }
            RayControl::Ignore
        });
        self.results.len()
    }

    /// Collect items containing `point`.
    ///
    /// Traversal uses a degenerate ray starting at `point`; every hit has fraction `0` and the
    /// results count as ray-cast results.
    pub fn query_point(&mut self, pool: &ItemPool, point: Point, target_oobb: bool) -> usize {
        self.begin(pool, true);
        let Self {
            tree,
            epoch,
            visited,
            results,
            ..
        } = self;
        let end = point + Vec2::new(POINT_RAY_LENGTH, POINT_RAY_LENGTH);
        let input = RayCastInput::new(point.x, point.y, end.x, end.y);
        tree.ray_cast(input, |_, _, &key| {
            let Some(item) = pool.get(key) else {
                return RayControl::Ignore;
            };
            let hit = if target_oobb {
                item.local_oobb().contains_point(point)
            } else {
                rect_to_aabb(item.local_aabb()).contains_point(point.x, point.y)
            };
            if hit && stamp(visited, *epoch, key) {
                results.push(QueryResult {
                    item: key,
                    batch_id: item.batch_id(),
                    fraction: 0.0,
                });
            }
            RayControl::Ignore
        });
        self.results.len()
    }

    /// Drop the current results. The index and epoch are untouched.
    pub fn clear_query(&mut self) {
        self.results.clear();
    }

    /// Stable-sort ray-cast results by ascending fraction. No-op for area results.
    pub fn sort_raycast_results(&mut self) {
        if !self.is_raycast_result || self.results.is_empty() {
            return;
        }
        self.results.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));
    }

    /// Results of the last query.
    pub fn results(&self) -> &[QueryResult] {
        &self.results
    }

    /// Whether the current results came from a ray or point query.
    pub fn is_raycast_result(&self) -> bool {
        self.is_raycast_result
    }

    /// Number of queries run so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of indexed items.
    pub fn proxy_count(&self) -> usize {
        self.tree.len()
    }

    /// The underlying tree.
    pub fn tree(&self) -> &DynamicTree<f64, ItemKey> {
        &self.tree
    }

    fn begin(&mut self, pool: &ItemPool, raycast: bool) {
        self.epoch += 1;
        self.is_raycast_result = raycast;
        self.results.clear();
        if self.visited.len() < pool.capacity() {
            self.visited.resize(pool.capacity(), 0);
        }
    }
}

/// Mark `key` as collected in `epoch`. Returns `false` if it already was.
fn stamp(visited: &mut Vec<u64>, epoch: u64, key: ItemKey) -> bool {
    let i = ItemPool::slot_index(key);
    if visited.len() <= i {
        visited.resize(i + 1, 0);
    }
    if visited[i] == epoch {
        return false;
    }
    visited[i] = epoch;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use kurbo::Size;

    fn place(pool: &mut ItemPool, query: &mut BatchQuery, id: u32, rect: Rect) -> ItemKey {
        let (key, item) = pool.checkout();
        item.batch_id = id;
        item.set_size(rect.size());
        item.set_local_position(rect.center());
        query.add(key, item);
        key
    }

    fn ids(query: &BatchQuery) -> Vec<u32> {
        let mut v: Vec<_> = query.results().iter().map(|r| r.batch_id).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn area_query_is_exact() {
        let mut pool = ItemPool::new();
        let mut q = BatchQuery::default();
        place(&mut pool, &mut q, 1, Rect::new(0.0, 0.0, 1.0, 1.0));
        place(&mut pool, &mut q, 2, Rect::new(5.0, 5.0, 6.0, 6.0));
        place(&mut pool, &mut q, 3, Rect::new(0.5, 0.5, 1.5, 1.5));
        // Fat bound of 1 reaches 2.1, but its tight bound does not.
        place(&mut pool, &mut q, 4, Rect::new(2.05, 0.0, 3.0, 1.0));
        assert_eq!(q.query_area(&pool, Rect::new(0.0, 0.0, 2.0, 2.0), false), 2);
        assert_eq!(ids(&q), vec![1, 3]);
        assert!(!q.is_raycast_result());
        assert_eq!(q.epoch(), 1);
    }

    #[test]
    fn ray_results_sort_by_fraction() {
        let mut pool = ItemPool::new();
        let mut q = BatchQuery::default();
        place(&mut pool, &mut q, 1, Rect::new(8.0, -1.0, 9.0, 1.0));
        place(&mut pool, &mut q, 2, Rect::new(3.0, -1.0, 4.0, 1.0));
        place(&mut pool, &mut q, 3, Rect::new(3.0, 5.0, 4.0, 6.0));
        assert_eq!(q.query_ray(&pool, Point::ORIGIN, Point::new(10.0, 0.0), false), 2);
        q.sort_raycast_results();
        let got: Vec<_> = q.results().iter().map(|r| (r.batch_id, r.fraction)).collect();
        assert_eq!(got, vec![(2, 0.3), (1, 0.8)]);
    }

    #[test]
    fn ray_sort_keeps_ties_in_order() {
        let mut pool = ItemPool::new();
        let mut q = BatchQuery::default();
        for id in 1..=5 {
            place(&mut pool, &mut q, id, Rect::new(3.0, -1.0, 4.0, 1.0));
        }
        place(&mut pool, &mut q, 6, Rect::new(1.0, -1.0, 2.0, 1.0));
        q.query_ray(&pool, Point::ORIGIN, Point::new(10.0, 0.0), false);
        let tied: Vec<_> = q
            .results()
            .iter()
            .filter(|r| r.fraction == 0.3)
            .map(|r| r.batch_id)
            .collect();
        q.sort_raycast_results();
        let after: Vec<_> = q.results().iter().map(|r| r.batch_id).collect();
        assert_eq!(after[0], 6);
        assert_eq!(after[1..], tied[..], "equal fractions keep their relative order");
    }

    #[test]
    fn sort_is_noop_for_area_results() {
        let mut pool = ItemPool::new();
        let mut q = BatchQuery::default();
        place(&mut pool, &mut q, 1, Rect::new(0.0, 0.0, 1.0, 1.0));
        place(&mut pool, &mut q, 2, Rect::new(0.0, 0.0, 1.0, 1.0));
        q.query_area(&pool, Rect::new(0.0, 0.0, 1.0, 1.0), false);
        let before = q.results().to_vec();
        q.sort_raycast_results();
        assert_eq!(q.results(), &before[..]);
    }

    #[test]
    fn point_query_uses_oriented_box() {
        let mut pool = ItemPool::new();
        let mut q = BatchQuery::default();
        let key = place(&mut pool, &mut q, 1, Rect::new(0.0, 0.0, 2.0, 2.0));
        let item = pool.get_mut(key).unwrap();
        item.set_angle(core::f64::consts::FRAC_PI_4);
        q.update(item, Vec2::ZERO);

        // Near a corner of the rotated box's AABB: inside the AABB, outside the box.
        let corner = Point::new(1.0 - 1.3, 1.0 - 1.3);
        assert_eq!(q.query_point(&pool, corner, false), 1);
        assert_eq!(q.query_point(&pool, corner, true), 0);
        assert_eq!(q.query_point(&pool, Point::new(1.0, 1.0), true), 1);
        assert!(q.is_raycast_result());
        assert_eq!(q.results()[0].fraction, 0.0);
    }

    #[test]
    fn remove_and_update_keep_proxy_in_sync() {
        let mut pool = ItemPool::new();
        let mut q = BatchQuery::default();
        let key = place(&mut pool, &mut q, 1, Rect::new(0.0, 0.0, 1.0, 1.0));
        let item = pool.get_mut(key).unwrap();
        item.set_local_position(Point::new(40.5, 0.5));
        assert!(q.update(item, Vec2::new(40.0, 0.0)), "far move reinserts");
        assert_eq!(q.query_area(&pool, Rect::new(0.0, 0.0, 1.0, 1.0), false), 0);
        assert_eq!(q.query_area(&pool, Rect::new(40.0, 0.0, 41.0, 1.0), false), 1);

        let item = pool.get_mut(key).unwrap();
        q.remove(item);
        assert!(!item.proxy().is_valid());
        assert!(!q.update(item, Vec2::ZERO), "unindexed update is a no-op");
        assert_eq!(q.proxy_count(), 0);
        assert!(pool.cache(key));
    }

    #[test]
    fn stamp_dedups_within_an_epoch() {
        let mut pool = ItemPool::new();
        let (key, _) = pool.checkout();
        let mut visited = Vec::new();
        assert!(stamp(&mut visited, 1, key));
        assert!(!stamp(&mut visited, 1, key));
        assert!(stamp(&mut visited, 2, key));
    }

    #[test]
    fn brute_force_parity() {
        let mut pool = ItemPool::new();
        let mut q = BatchQuery::default();
        let mut rects = Vec::new();
        for i in 0..200_u32 {
            let x = f64::from((i * 37) % 50);
            let y = f64::from((i * 11) % 40);
            let w = 0.5 + f64::from(i % 4);
            let r = Rect::from_origin_size((x, y), Size::new(w, 1.0));
            rects.push(r);
            place(&mut pool, &mut q, i + 1, r);
        }
        let area = Rect::new(10.0, 10.0, 22.0, 18.0);
        q.query_area(&pool, area, false);
        let expected: Vec<u32> = (1..=200)
            .filter(|&i| {
                rect_to_aabb(rects[i as usize - 1]).overlaps(&rect_to_aabb(area))
            })
            .collect();
        assert_eq!(ids(&q), expected);
    }
}
