// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The sprite batch: item directory, selection, index synchronization, and render preparation.

use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use kurbo::{Affine, Point, Rect, Size, Vec2};
use log::{debug, trace, warn};

use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::geometry::{Oobb, transform_rect_bbox};
use crate::intern::{Interner, Symbol};
use crate::item::{BatchItem, BlendFactor, Color, DataObjectId};
use crate::layout::BatchLayout;
use crate::logical::LogicalPosition;
use crate::pool::{ItemKey, ItemPool};
use crate::query::{BatchQuery, QueryResult};
use crate::render::{
    BatchRenderer, RenderQueue, RenderRequest, RenderSort, RenderTargetId, ViewState,
};

/// A set of items sharing one transform and an optional spatial index.
///
/// Items are addressed three ways: by batch id (assigned from 1 upward, never reused until
/// [`clear_all_items`](Self::clear_all_items)), by logical position, and by name. Most
/// per-item mutators act on the *selected* item; with nothing selected they log a warning and
/// return `false`.
///
/// While culling is enabled every item has a proxy in the batch's [`BatchQuery`]; while it is
/// disabled no item does.
pub struct SpriteBatch {
    pool: ItemPool,
    items: HashMap<u32, ItemKey>,
    by_logical: HashMap<LogicalPosition, ItemKey>,
    by_name: HashMap<Symbol, ItemKey>,
    interner: Interner,
    next_batch_id: u32,
    selected: Option<ItemKey>,
    transform: Affine,
    // `None` while the transform is singular.
    inverse: Option<Affine>,
    transform_version: u64,
    local_extents: Size,
    extents_dirty: bool,
    query: Option<BatchQuery>,
    config: BatchConfig,
}

impl fmt::Debug for SpriteBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpriteBatch")
            .field("items", &self.items.len())
            .field("next_batch_id", &self.next_batch_id)
            .field("selected", &self.selected)
            .field("transform_version", &self.transform_version)
            .field("local_extents", &self.local_extents)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl Default for SpriteBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl SpriteBatch {
    /// Create an empty batch with the default config (culling on).
    pub fn new() -> Self {
        Self::with_config(BatchConfig::default())
    }

    /// Create an empty batch.
    pub fn with_config(config: BatchConfig) -> Self {
        Self {
            pool: ItemPool::new(),
            items: HashMap::new(),
            by_logical: HashMap::new(),
            by_name: HashMap::new(),
            interner: Interner::new(),
            next_batch_id: 0,
            selected: None,
            transform: Affine::IDENTITY,
            inverse: Some(Affine::IDENTITY),
            transform_version: 0,
            local_extents: Size::new(1.0, 1.0),
            extents_dirty: false,
            query: config.culling.then(|| BatchQuery::new(config.tree_config())),
            config,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    // --- Item creation and removal ---

    /// Create an item, optionally at a logical position.
    ///
    /// The item gets the configured default size and angle, and a local position from the
    /// layout. It is indexed if culling is enabled. Selection is unchanged.
    pub fn try_create_item(&mut self, logical: LogicalPosition) -> Result<ItemKey, BatchError> {
        if logical.is_valid() && self.by_logical.contains_key(&logical) {
            return Err(BatchError::DuplicateLogicalPosition(logical));
        }
        let position = self.config.layout.place(&logical, self.config.default_stride)?;

        let (key, item) = self.pool.checkout();
        self.next_batch_id += 1;
        item.batch_id = self.next_batch_id;
        item.logical_position = logical;
        item.set_size(self.config.default_size);
        item.set_angle(self.config.default_angle);
        if let Some(position) = position {
            item.set_local_position(position);
        }
        if let Some(query) = &mut self.query {
            query.add(key, item);
        }

        self.items.insert(self.next_batch_id, key);
        if logical.is_valid() {
            self.by_logical.insert(logical, key);
        }
        self.extents_dirty = true;
        Ok(key)
    }

    /// Create an item, logging and returning `None` on failure.
    pub fn create_item(&mut self, logical: LogicalPosition) -> Option<ItemKey> {
        self.try_create_item(logical)
            .map_err(|e| warn!("create_item: {e}"))
            .ok()
    }

    /// Create an item, select it, and return its batch id, or `0` on failure.
    pub fn add_item(&mut self, logical: LogicalPosition) -> u32 {
        match self.try_create_item(logical) {
            Ok(key) => {
                self.selected = Some(key);
                self.extents_dirty = true;
                self.next_batch_id
            }
            Err(e) => {
                warn!("add_item: {e}");
                0
            }
        }
    }

    /// Remove the selected item and clear the selection.
    pub fn try_remove_selected_item(&mut self) -> Result<(), BatchError> {
        let key = self.selected.ok_or(BatchError::NothingSelected)?;
        self.destroy_item(key);
        Ok(())
    }

    /// Remove the selected item, logging and returning `false` if nothing is selected.
    pub fn remove_selected_item(&mut self) -> bool {
        self.try_remove_selected_item()
            .map_err(|e| warn!("remove_selected_item: {e}"))
            .is_ok()
    }

    /// Remove every item and reset batch ids so the next item gets id 1.
    ///
    /// Names and render groups are forgotten too, so symbols from before the clear no longer
    /// resolve.
    pub fn clear_all_items(&mut self) {
        self.selected = None;
        self.by_logical.clear();
        self.by_name.clear();
        let removed = self.items.len();
        for (_, key) in self.items.drain() {
            if let Some(item) = self.pool.get_mut(key) {
                if let Some(query) = &mut self.query {
                    query.remove(item);
                }
            }
            self.pool.cache(key);
        }
        self.interner.clear();
        self.next_batch_id = 0;
        self.extents_dirty = true;
        debug!("cleared {removed} items");
    }

    fn destroy_item(&mut self, key: ItemKey) {
        let Some(item) = self.pool.get_mut(key) else {
            return;
        };
        // Out of the index before the slot can be recycled.
        if let Some(query) = &mut self.query {
            query.remove(item);
        }
        self.items.remove(&item.batch_id);
        if item.logical_position.is_valid() {
            self.by_logical.remove(&item.logical_position);
        }
        if let Some(name) = item.name {
            self.by_name.remove(&name);
        }
        if self.selected == Some(key) {
            self.selected = None;
        }
        self.pool.cache(key);
        self.extents_dirty = true;
    }

    // --- Lookup ---

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item with batch id `id`.
    pub fn find_by_id(&self, id: u32) -> Option<ItemKey> {
        self.items.get(&id).copied()
    }

    /// Item at `logical`. Always `None` for an invalid position.
    pub fn find_by_logical_position(&self, logical: &LogicalPosition) -> Option<ItemKey> {
        if logical.is_invalid() {
            return None;
        }
        self.by_logical.get(logical).copied()
    }

    /// Item named `name`.
    pub fn find_by_name(&self, name: &str) -> Option<ItemKey> {
        let sym = self.interner.get(name)?;
        self.by_name.get(&sym).copied()
    }

    /// Live item for `key`.
    pub fn item(&self, key: ItemKey) -> Option<&BatchItem> {
        self.pool.get(key)
    }

    /// Live item for `key`, for changing visual state.
    pub fn item_mut(&mut self, key: ItemKey) -> Option<&mut BatchItem> {
        self.pool.get_mut(key)
    }

    /// All items, in no particular order.
    pub fn items(&self) -> impl Iterator<Item = (ItemKey, &BatchItem)> + '_ {
        self.pool.iter()
    }

    /// The string behind a name or render group symbol.
    pub fn resolve(&self, sym: Symbol) -> Option<&str> {
        self.interner.resolve(sym)
    }

    /// Name of the item for `key`.
    pub fn item_name(&self, key: ItemKey) -> Option<&str> {
        self.pool.get(key)?.name.and_then(|s| self.interner.resolve(s))
    }

    /// The item pool.
    pub fn pool(&self) -> &ItemPool {
        &self.pool
    }

    // --- Selection ---

    /// Select the item for `key`. Returns `false` for a stale key.
    pub fn select_item(&mut self, key: ItemKey) -> bool {
        if self.pool.get(key).is_none() {
            warn!("select_item: stale item key {key:?}");
            return false;
        }
        self.selected = Some(key);
        true
    }

    /// Select by batch id.
    pub fn select_item_by_id(&mut self, id: u32) -> bool {
        self.select_found(self.find_by_id(id), || BatchError::UnknownId(id))
    }

    /// Select by logical position.
    pub fn select_item_by_logical_position(&mut self, logical: &LogicalPosition) -> bool {
        self.select_found(self.find_by_logical_position(logical), || {
            BatchError::UnknownLogicalPosition(*logical)
        })
    }

    /// Select by name.
    pub fn select_item_by_name(&mut self, name: &str) -> bool {
        self.select_found(self.find_by_name(name), || {
            BatchError::UnknownName(name.into())
        })
    }

    fn select_found(&mut self, key: Option<ItemKey>, err: impl FnOnce() -> BatchError) -> bool {
        match key {
            Some(key) => {
                self.selected = Some(key);
                true
            }
            None => {
                warn!("select: {}", err());
                false
            }
        }
    }

    /// Clear the selection.
    pub fn deselect_item(&mut self) {
        self.selected = None;
    }

    /// Whether an item is selected.
    pub fn is_item_selected(&self) -> bool {
        self.selected.is_some()
    }

    /// Key of the selected item.
    pub fn selected(&self) -> Option<ItemKey> {
        self.selected
    }

    /// The selected item, logging a warning if nothing is selected.
    pub fn selected_item(&self) -> Option<&BatchItem> {
        let item = self.selected.and_then(|k| self.pool.get(k));
        if item.is_none() {
            warn!("selected_item: {}", BatchError::NothingSelected);
        }
        item
    }

    /// Batch id of the selected item.
    pub fn selected_item_id(&self) -> Option<u32> {
        self.selected_item().map(BatchItem::batch_id)
    }

    // --- Selected-item mutators ---

    fn with_selected(&mut self, op: &str, f: impl FnOnce(&mut BatchItem)) -> bool {
        let Some(item) = self.selected.and_then(|k| self.pool.get_mut(k)) else {
            warn!("{op}: {}", BatchError::NothingSelected);
            return false;
        };
        f(item);
        true
    }

    fn with_selected_geometry(&mut self, op: &str, f: impl FnOnce(&mut BatchItem)) -> bool {
        let Some(item) = self.selected.and_then(|k| self.pool.get_mut(k)) else {
            warn!("{op}: {}", BatchError::NothingSelected);
            return false;
        };
        let before = item.local_position();
        f(item);
        let displacement = item.local_position() - before;
        if let Some(query) = &mut self.query {
            query.update(item, displacement);
        }
        self.extents_dirty = true;
        true
    }

    /// Move the selected item in batch-local space.
    pub fn set_item_local_position(&mut self, position: Point) -> bool {
        self.with_selected_geometry("set_item_local_position", |i| {
            i.set_local_position(position);
        })
    }

    /// Rotate the selected item (radians).
    pub fn set_item_angle(&mut self, radians: f64) -> bool {
        self.with_selected_geometry("set_item_angle", |i| i.set_angle(radians))
    }

    /// Resize the selected item.
    pub fn set_item_size(&mut self, size: Size) -> bool {
        self.with_selected_geometry("set_item_size", |i| i.set_size(size))
    }

    /// Give the selected item explicit corners, or return it to size-derived geometry.
    pub fn set_item_explicit_vertices(&mut self, vertices: Option<[Point; 4]>) -> bool {
        self.with_selected_geometry("set_item_explicit_vertices", |i| {
            i.set_explicit_vertices(vertices);
        })
    }

    /// Show or hide the selected item.
    pub fn set_item_visible(&mut self, visible: bool) -> bool {
        self.with_selected("set_item_visible", |i| i.set_visible(visible))
    }

    /// Mirror the selected item.
    pub fn set_item_flip(&mut self, flip_x: bool, flip_y: bool) -> bool {
        self.with_selected("set_item_flip", |i| {
            i.set_flip_x(flip_x);
            i.set_flip_y(flip_y);
        })
    }

    /// Render depth of the selected item.
    pub fn set_item_depth(&mut self, depth: f64) -> bool {
        self.with_selected("set_item_depth", |i| i.set_depth(depth))
    }

    /// Sort point of the selected item.
    pub fn set_item_sort_point(&mut self, sort_point: Vec2) -> bool {
        self.with_selected("set_item_sort_point", |i| i.set_sort_point(sort_point))
    }

    /// Blending of the selected item.
    pub fn set_item_blend(
        &mut self,
        enabled: bool,
        src: BlendFactor,
        dst: BlendFactor,
        color: Color,
    ) -> bool {
        self.with_selected("set_item_blend", |i| {
            i.set_blend_mode(enabled);
            i.set_src_blend_factor(src);
            i.set_dst_blend_factor(dst);
            i.set_blend_color(color);
        })
    }

    /// Blend alpha of the selected item.
    pub fn set_item_blend_alpha(&mut self, alpha: f32) -> bool {
        self.with_selected("set_item_blend_alpha", |i| i.set_blend_alpha(alpha))
    }

    /// Alpha test threshold of the selected item; negative disables it.
    pub fn set_item_alpha_test(&mut self, threshold: f32) -> bool {
        self.with_selected("set_item_alpha_test", |i| i.set_alpha_test(threshold))
    }

    /// Draw an image frame on the selected item.
    pub fn set_item_image(&mut self, asset: &str, frame: u32) -> bool {
        self.with_selected("set_item_image", |i| i.set_image(asset, frame))
    }

    /// Draw a named image frame on the selected item.
    pub fn set_item_named_image_frame(&mut self, asset: &str, frame: &str) -> bool {
        self.with_selected("set_item_named_image_frame", |i| {
            i.set_named_image_frame(asset, frame);
        })
    }

    /// Play an animation on the selected item.
    pub fn set_item_animation(&mut self, asset: &str) -> bool {
        self.with_selected("set_item_animation", |i| i.set_animation(asset))
    }

    /// Remove the image or animation from the selected item.
    pub fn clear_item_frame(&mut self) -> bool {
        self.with_selected("clear_item_frame", BatchItem::clear_frame)
    }

    /// Attach a data object to the selected item.
    pub fn set_item_data_object(&mut self, object: Option<DataObjectId>) -> bool {
        self.with_selected("set_item_data_object", |i| i.set_data_object(object))
    }

    /// Attach application data to the selected item.
    pub fn set_item_user_data(&mut self, data: Option<&str>) -> bool {
        self.with_selected("set_item_user_data", |i| {
            i.set_user_data(data.map(Into::into));
        })
    }

    /// Put the selected item in a render group; `None` or `""` removes it.
    pub fn set_item_render_group(&mut self, group: Option<&str>) -> bool {
        let Some(key) = self.selected.filter(|&k| self.pool.get(k).is_some()) else {
            warn!("set_item_render_group: {}", BatchError::NothingSelected);
            return false;
        };
        let sym = group
            .filter(|g| !g.is_empty())
            .map(|g| self.interner.intern(g));
        if let Some(item) = self.pool.get_mut(key) {
            item.render_group = sym;
        }
        true
    }

    /// Rename the selected item; `""` removes the name.
    ///
    /// Fails if another item already has `name`.
    pub fn try_set_item_name(&mut self, name: &str) -> Result<(), BatchError> {
        let key = self.selected.ok_or(BatchError::NothingSelected)?;
        self.assign_name(key, name)
    }

    /// Rename the selected item, logging and returning `false` on failure.
    pub fn set_item_name(&mut self, name: &str) -> bool {
        self.try_set_item_name(name)
            .map_err(|e| warn!("set_item_name: {e}"))
            .is_ok()
    }

    fn assign_name(&mut self, key: ItemKey, name: &str) -> Result<(), BatchError> {
        if let Some(&owner) = self.interner.get(name).and_then(|s| self.by_name.get(&s)) {
            if owner == key {
                return Ok(());
            }
            return Err(BatchError::DuplicateName(name.into()));
        }
        if self.pool.get(key).is_none() {
            return Err(BatchError::NothingSelected);
        }
        let sym = (!name.is_empty()).then(|| self.interner.intern(name));
        let item = self.pool.get_mut(key).ok_or(BatchError::NothingSelected)?;
        if let Some(old) = item.name.take() {
            self.by_name.remove(&old);
        }
        item.name = sym;
        if let Some(sym) = sym {
            self.by_name.insert(sym, key);
        }
        Ok(())
    }

    // --- Transform and extents ---

    /// Batch-to-world transform.
    pub fn batch_transform(&self) -> Affine {
        self.transform
    }

    /// Replace the batch-to-world transform and bump the transform version.
    ///
    /// Picking and culling go through the inverse. While the transform is singular (for
    /// example `Affine::scale(0.0)`) the batch covers no area in world space: render
    /// preparation emits nothing, whether or not the index is enabled, and picks find nothing.
    pub fn set_batch_transform(&mut self, transform: Affine) {
        let det = transform.determinant();
        self.transform = transform;
        self.inverse = (det != 0.0 && det.is_finite()).then(|| transform.inverse());
        if self.inverse.is_none() {
            debug!("singular batch transform {transform:?}");
        }
        self.transform_version += 1;
    }

    /// Whether the batch transform can be inverted.
    pub fn is_transform_invertible(&self) -> bool {
        self.inverse.is_some()
    }

    /// Incremented on every [`set_batch_transform`](Self::set_batch_transform).
    pub fn transform_version(&self) -> u64 {
        self.transform_version
    }

    /// Cached symmetric extents. See [`update_local_extents`](Self::update_local_extents).
    pub fn local_extents(&self) -> Size {
        self.local_extents
    }

    /// Whether item geometry changed since extents were last computed.
    pub fn extents_dirty(&self) -> bool {
        self.extents_dirty
    }

    /// Recompute the local extents if dirty. Returns whether anything was recomputed.
    ///
    /// The extents are the smallest origin-centred box containing the union of all item
    /// AABBs, `2 * max(|min|, |max|)` per axis, or `1 x 1` for an empty batch. This is a
    /// sizing hint, not the true off-centre bound.
    pub fn update_local_extents(&mut self) -> bool {
        if !self.extents_dirty {
            return false;
        }
        self.extents_dirty = false;
        let mut aabbs = self.pool.iter().map(|(_, item)| item.local_aabb());
        self.local_extents = match aabbs.next() {
            None => Size::new(1.0, 1.0),
            Some(first) => {
                let u = aabbs.fold(first, |acc, r| acc.union(r));
                Size::new(
                    2.0 * u.x0.abs().max(u.x1.abs()),
                    2.0 * u.y0.abs().max(u.y1.abs()),
                )
            }
        };
        true
    }

    /// Bound in batch-local space of a world-space rectangle, or `None` while the batch
    /// transform is singular.
    pub fn calculate_local_aabb(&self, world: Rect) -> Option<Rect> {
        self.inverse.map(|inverse| transform_rect_bbox(inverse, world))
    }

    // --- Configuration ---

    /// Whether the spatial index is maintained.
    pub fn is_index_enabled(&self) -> bool {
        self.query.is_some()
    }

    /// Turn the spatial index on (indexing every existing item) or off (dropping it).
    pub fn set_index_enabled(&mut self, enabled: bool) {
        self.config.culling = enabled;
        if enabled == self.query.is_some() {
            return;
        }
        if enabled {
            let mut query = BatchQuery::new(self.config.tree_config());
            for (key, item) in self.pool.iter_mut() {
                query.add(key, item);
            }
            debug!("culling enabled, indexed {} items", query.proxy_count());
            self.query = Some(query);
        } else if let Some(mut query) = self.query.take() {
            for (_, item) in self.pool.iter_mut() {
                query.remove(item);
            }
            debug!("culling disabled");
        }
    }

    /// The spatial index, if enabled.
    pub fn query(&self) -> Option<&BatchQuery> {
        self.query.as_ref()
    }

    /// Sort mode handed to render queues.
    pub fn sort_mode(&self) -> RenderSort {
        self.config.sort_mode
    }

    /// Set the sort mode handed to render queues.
    pub fn set_sort_mode(&mut self, mode: RenderSort) {
        self.config.sort_mode = mode;
    }

    /// Stride used by grid layouts for new items.
    pub fn set_default_stride(&mut self, stride: Vec2) {
        self.config.default_stride = stride;
    }

    /// Size given to new items.
    pub fn set_default_size(&mut self, size: Size) {
        self.config.default_size = size;
    }

    /// Angle (radians) given to new items.
    pub fn set_default_angle(&mut self, radians: f64) {
        self.config.default_angle = radians;
    }

    /// Current layout.
    pub fn layout(&self) -> &BatchLayout {
        &self.config.layout
    }

    /// Change the layout. Rejected while the batch has items.
    pub fn try_set_layout(&mut self, layout: BatchLayout) -> Result<(), BatchError> {
        if !self.items.is_empty() {
            return Err(BatchError::LayoutLocked);
        }
        self.config.layout = layout;
        Ok(())
    }

    /// Change the layout, logging and returning `false` while the batch has items.
    pub fn set_layout(&mut self, layout: BatchLayout) -> bool {
        self.try_set_layout(layout)
            .map_err(|e| warn!("set_layout: {e}"))
            .is_ok()
    }

    // --- Local-space queries ---

    /// Area query in batch-local space. Returns the result count; `0` with culling disabled.
    pub fn query_area(&mut self, area: Rect, target_oobb: bool) -> usize {
        let Self { query, pool, .. } = self;
        let Some(query) = query.as_mut() else {
            warn!("query_area: {}", BatchError::IndexingDisabled);
            return 0;
        };
        query.query_area(pool, area, target_oobb)
    }

    /// Oriented-region query in batch-local space.
    pub fn query_oobb(&mut self, region: &Oobb, target_oobb: bool) -> usize {
        let Self { query, pool, .. } = self;
        let Some(query) = query.as_mut() else {
            warn!("query_oobb: {}", BatchError::IndexingDisabled);
            return 0;
        };
        query.query_oobb(pool, region, target_oobb)
    }

    /// Ray query in batch-local space.
    pub fn query_ray(&mut self, p1: Point, p2: Point, target_oobb: bool) -> usize {
        let Self { query, pool, .. } = self;
        let Some(query) = query.as_mut() else {
            warn!("query_ray: {}", BatchError::IndexingDisabled);
            return 0;
        };
        query.query_ray(pool, p1, p2, target_oobb)
    }

    /// Point query in batch-local space.
    pub fn query_point(&mut self, point: Point, target_oobb: bool) -> usize {
        let Self { query, pool, .. } = self;
        let Some(query) = query.as_mut() else {
            warn!("query_point: {}", BatchError::IndexingDisabled);
            return 0;
        };
        query.query_point(pool, point, target_oobb)
    }

    /// Results of the last query; empty with culling disabled.
    pub fn query_results(&self) -> &[QueryResult] {
        match &self.query {
            Some(query) => query.results(),
            None => &[],
        }
    }

    /// Drop the last query's results.
    pub fn clear_query(&mut self) {
        if let Some(query) = &mut self.query {
            query.clear_query();
        }
    }

    /// Sort ray results by fraction. No-op for area results.
    pub fn sort_raycast_results(&mut self) {
        if let Some(query) = &mut self.query {
            query.sort_raycast_results();
        }
    }

    // --- World-space picking ---

    /// Batch ids of items whose oriented box contains the world point.
    pub fn pick_point(&mut self, world: Point) -> Vec<u32> {
        let Some(inverse) = self.inverse else {
            return Vec::new();
        };
        let local = inverse * world;
        let Self { query, pool, .. } = self;
        let Some(query) = query.as_mut() else {
            warn!("pick_point: {}", BatchError::IndexingDisabled);
            return Vec::new();
        };
        query.query_point(pool, local, true);
        take_ids(query)
    }

    /// Batch ids of items whose oriented box overlaps the world rectangle.
    pub fn pick_area(&mut self, world: Rect) -> Vec<u32> {
        let Some(inverse) = self.inverse else {
            return Vec::new();
        };
        let region = Oobb::from_rect(world).transformed(inverse);
        let Self { query, pool, .. } = self;
        let Some(query) = query.as_mut() else {
            warn!("pick_area: {}", BatchError::IndexingDisabled);
            return Vec::new();
        };
        query.query_oobb(pool, &region, true);
        take_ids(query)
    }

    /// Batch ids of items the world segment passes through, nearest first.
    pub fn pick_ray(&mut self, world_p1: Point, world_p2: Point) -> Vec<u32> {
        let Some(inverse) = self.inverse else {
            return Vec::new();
        };
        let (p1, p2) = (inverse * world_p1, inverse * world_p2);
        let Self { query, pool, .. } = self;
        let Some(query) = query.as_mut() else {
            warn!("pick_ray: {}", BatchError::IndexingDisabled);
            return Vec::new();
        };
        query.query_ray(pool, p1, p2, true);
        query.sort_raycast_results();
        take_ids(query)
    }

    // --- Rendering ---

    /// Emit one render request per visible item in view.
    ///
    /// With culling enabled only items overlapping the view (in batch-local space) are
    /// considered; otherwise every item is. Returns the number of requests emitted.
    pub fn prepare_render<Q: RenderQueue + ?Sized>(
        &mut self,
        target: RenderTargetId,
        view: &ViewState,
        queue: &mut Q,
    ) -> usize {
        queue.set_sort_mode(self.config.sort_mode);
        let Some(local) = self.calculate_local_aabb(view.render_aabb) else {
            trace!("prepare_render: singular batch transform, nothing to emit");
            return 0;
        };
        let transform = self.transform;
        let version = self.transform_version;
        let mut emitted = 0;

        let Self { query, pool, .. } = self;
        match query {
            Some(query) => {
                query.clear_query();
                if query.query_area(pool, local, false) == 0 {
                    return 0;
                }
                for result in query.results() {
                    if let Some(item) = pool.get_mut(result.item) {
                        if emit(queue, target, result.item, item, transform, version) {
                            emitted += 1;
                        }
                    }
                }
                query.clear_query();
            }
            None => {
                for (key, item) in pool.iter_mut() {
                    if emit(queue, target, key, item, transform, version) {
                        emitted += 1;
                    }
                }
            }
        }
        trace!("prepare_render: {emitted} requests for {target:?}");
        emitted
    }

    /// Draw the item a request was emitted for. Returns `false` if the item is gone.
    pub fn render_request<R: BatchRenderer + ?Sized>(
        &mut self,
        request: &RenderRequest,
        renderer: &mut R,
    ) -> bool {
        let Some(item) = request.custom.and_then(|k| self.pool.get_mut(k)) else {
            return false;
        };
        item.render(renderer, request, self.transform);
        true
    }

    // --- Copy and persistence ---

    /// Replace `other`'s items with copies of this batch's items, in batch id order.
    ///
    /// Configuration, names, logical positions, and render groups are copied; batch ids come
    /// from `other`'s counter and the selection is not copied.
    pub fn copy_all_items_to(&self, other: &mut Self) {
        other.clear_all_items();
        let culling = self.is_index_enabled();
        other.config = self.config.clone();
        other.query = None;
        other.set_index_enabled(culling);

        for src in self.items_by_id() {
            let key = match other.try_create_item(src.logical_position) {
                Ok(key) => key,
                Err(e) => {
                    warn!("copy_all_items_to: {e}");
                    continue;
                }
            };
            let name = src.name.and_then(|s| self.interner.resolve(s));
            let group = src
                .render_group
                .and_then(|s| self.interner.resolve(s))
                .map(|g| other.interner.intern(g));
            if let Some(item) = other.pool.get_mut(key) {
                item.copy_state_from(src);
                item.render_group = group;
                if let Some(query) = &mut other.query {
                    query.update(item, Vec2::ZERO);
                }
            }
            if let Some(name) = name {
                if let Err(e) = other.assign_name(key, name) {
                    warn!("copy_all_items_to: {e}");
                }
            }
        }
    }

    fn items_by_id(&self) -> impl Iterator<Item = &BatchItem> + '_ {
        let mut ids: Vec<_> = self.items.iter().map(|(&id, &key)| (id, key)).collect();
        ids.sort_unstable_by_key(|&(id, _)| id);
        ids.into_iter().filter_map(|(_, key)| self.pool.get(key))
    }

    /// Capture every item, in batch id order.
    #[cfg(feature = "serde")]
    pub fn write_sprites(&self) -> crate::persist::SpritesNode {
        crate::persist::SpritesNode {
            sprites: self
                .items_by_id()
                .map(|item| crate::persist::SpriteRecord::from_item(item, &self.interner))
                .collect(),
        }
    }

    /// Add one item per record through the normal creation path, then apply its state.
    ///
    /// Records that cannot be created (duplicate logical position, layout mismatch) are
    /// skipped with a warning. Returns the number of items added.
    #[cfg(feature = "serde")]
    pub fn read_sprites(&mut self, node: &crate::persist::SpritesNode) -> usize {
        let mut added = 0;
        for record in &node.sprites {
            let key = match self.try_create_item(record.logical_position) {
                Ok(key) => key,
                Err(e) => {
                    warn!("read_sprites: {e}");
                    continue;
                }
            };
            let group = record
                .render_group
                .as_deref()
                .filter(|g| !g.is_empty())
                .map(|g| self.interner.intern(g));
            if let Some(item) = self.pool.get_mut(key) {
                record.apply(item);
                item.render_group = group;
                if let Some(query) = &mut self.query {
                    query.update(item, Vec2::ZERO);
                }
            }
            if let Some(name) = &record.name {
                if let Err(e) = self.assign_name(key, name) {
                    warn!("read_sprites: {e}");
                }
            }
            added += 1;
        }
        self.extents_dirty = true;
        added
    }
}

fn emit<Q: RenderQueue + ?Sized>(
    queue: &mut Q,
    target: RenderTargetId,
    key: ItemKey,
    item: &mut BatchItem,
    transform: Affine,
    version: u64,
) -> bool {
    if !item.visible() {
        return false;
    }
    let request = queue.create_request();
    item.prepare_render(request, transform, version);
    request.owner = target;
    request.custom = Some(key);
    true
}

fn take_ids(query: &mut BatchQuery) -> Vec<u32> {
    let ids = query.results().iter().map(|r| r.batch_id).collect();
    query.clear_query();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::VecRenderQueue;
    use alloc::vec;
    use core::f64::consts::FRAC_PI_4;

    /// Add an item covering `rect` and return its batch id.
    fn add_rect(batch: &mut SpriteBatch, rect: Rect) -> u32 {
        let id = batch.add_item(LogicalPosition::INVALID);
        assert!(batch.set_item_size(rect.size()));
        assert!(batch.set_item_local_position(rect.center()));
        id
    }

    fn sorted(mut ids: Vec<u32>) -> Vec<u32> {
        ids.sort_unstable();
        ids
    }

    fn result_ids(batch: &SpriteBatch) -> Vec<u32> {
        sorted(batch.query_results().iter().map(|r| r.batch_id).collect())
    }

    fn assert_index_parity(batch: &SpriteBatch) {
        let enabled = batch.is_index_enabled();
        for (_, item) in batch.items() {
            assert_eq!(item.proxy().is_valid(), enabled, "item {} proxy", item.batch_id());
        }
        if let Some(q) = batch.query() {
            assert_eq!(q.proxy_count(), batch.len());
        }
    }

    fn abc() -> (SpriteBatch, [u32; 3]) {
        let mut batch = SpriteBatch::new();
        let a = add_rect(&mut batch, Rect::new(0.0, 0.0, 1.0, 1.0));
        let b = add_rect(&mut batch, Rect::new(5.0, 5.0, 6.0, 6.0));
        let c = add_rect(&mut batch, Rect::new(0.5, 0.5, 1.5, 1.5));
        (batch, [a, b, c])
    }

    #[test]
    fn area_query_excludes_distant_item() {
        let (mut batch, [a, _, c]) = abc();
        assert_eq!(batch.query_area(Rect::new(0.0, 0.0, 2.0, 2.0), false), 2);
        assert_eq!(result_ids(&batch), vec![a, c]);
    }

    #[test]
    fn toggling_index_back_fills() {
        let (mut batch, [a, _, c]) = abc();
        batch.set_index_enabled(false);
        assert!(batch.query().is_none());
        assert_index_parity(&batch);
        assert_eq!(batch.query_area(Rect::new(0.0, 0.0, 2.0, 2.0), false), 0);

        batch.set_index_enabled(true);
        assert_index_parity(&batch);
        assert_eq!(batch.query().unwrap().proxy_count(), 3);
        let mut payloads: Vec<_> = batch
            .query()
            .unwrap()
            .tree()
            .proxies()
            .map(|(_, _, key)| batch.item(*key).unwrap().batch_id())
            .collect();
        payloads.sort_unstable();
        assert_eq!(payloads, vec![1, 2, 3], "each proxy points at a distinct item");

        assert_eq!(batch.query_area(Rect::new(0.0, 0.0, 2.0, 2.0), false), 2);
        assert_eq!(result_ids(&batch), vec![a, c]);
    }

    #[test]
    fn duplicate_logical_position_is_rejected() {
        let mut batch = SpriteBatch::new();
        let first = batch.add_item(LogicalPosition::xy(2, 3));
        assert_eq!(first, 1);
        assert_eq!(batch.add_item(LogicalPosition::xy(2, 3)), 0);
        assert_eq!(
            batch.try_create_item(LogicalPosition::xy(2, 3)),
            Err(BatchError::DuplicateLogicalPosition(LogicalPosition::xy(2, 3)))
        );
        assert_eq!(batch.len(), 1);
        let key = batch.find_by_logical_position(&LogicalPosition::xy(2, 3)).unwrap();
        assert_eq!(batch.item(key).unwrap().batch_id(), first);
        assert_eq!(batch.item(key).unwrap().local_position(), Point::new(2.0, 3.0));
        assert_eq!(batch.selected_item_id(), Some(first), "failed add keeps selection");
    }

    #[test]
    fn remove_with_nothing_selected_fails() {
        let (mut batch, _) = abc();
        batch.deselect_item();
        assert!(!batch.remove_selected_item());
        assert_eq!(
            batch.try_remove_selected_item(),
            Err(BatchError::NothingSelected)
        );
        assert_eq!(batch.len(), 3);
        assert!(!batch.set_item_angle(1.0), "mutators need a selection");
    }

    #[test]
    fn off_screen_batch_emits_nothing() {
        let mut batch = SpriteBatch::new();
        for i in 0..50 {
            add_rect(&mut batch, Rect::from_origin_size((f64::from(i), 0.0), (1.0, 1.0)));
        }
        let mut queue = VecRenderQueue::new();
        let view = ViewState::new(Rect::new(-100.0, -100.0, -90.0, -90.0));
        assert_eq!(batch.prepare_render(RenderTargetId(1), &view, &mut queue), 0);
        assert!(queue.is_empty());

        batch.set_index_enabled(false);
        // Without culling every visible item is emitted.
        assert_eq!(batch.prepare_render(RenderTargetId(1), &view, &mut queue), 50);
    }

    #[test]
    fn ray_query_sorts_nearest_first() {
        let mut batch = SpriteBatch::new();
        let far = add_rect(&mut batch, Rect::new(8.0, -1.0, 9.0, 1.0));
        let near = add_rect(&mut batch, Rect::new(3.0, -1.0, 4.0, 1.0));
        assert_eq!(batch.query_ray(Point::ORIGIN, Point::new(10.0, 0.0), false), 2);
        batch.sort_raycast_results();
        let got: Vec<_> = batch
            .query_results()
            .iter()
            .map(|r| (r.batch_id, r.fraction))
            .collect();
        assert_eq!(got, vec![(near, 0.3), (far, 0.8)]);
    }

    #[test]
    fn ids_are_unique_and_never_reused_until_clear() {
        let mut batch = SpriteBatch::new();
        let mut seen = Vec::new();
        for i in 0..20 {
            let id = batch.add_item(LogicalPosition::xy(i, 0));
            assert!(!seen.contains(&id));
            seen.push(id);
            if i % 3 == 0 {
                assert!(batch.remove_selected_item());
            }
        }
        assert_eq!(batch.len(), 13);
        assert_eq!(batch.add_item(LogicalPosition::INVALID), 21);
        assert_index_parity(&batch);

        batch.clear_all_items();
        assert!(batch.is_empty());
        assert!(!batch.is_item_selected());
        assert_eq!(batch.query().unwrap().proxy_count(), 0);
        assert_eq!(batch.add_item(LogicalPosition::INVALID), 1, "clear resets the counter");
    }

    #[test]
    fn removal_clears_secondary_indexes_and_selection() {
        let mut batch = SpriteBatch::new();
        batch.add_item(LogicalPosition::xy(1, 1));
        assert!(batch.set_item_name("hero"));
        assert!(batch.remove_selected_item());
        assert!(!batch.is_item_selected());
        assert_eq!(batch.find_by_name("hero"), None);
        assert_eq!(batch.find_by_logical_position(&LogicalPosition::xy(1, 1)), None);

        // Both keys are free again.
        batch.add_item(LogicalPosition::xy(1, 1));
        assert!(batch.set_item_name("hero"));
    }

    #[test]
    fn recycled_item_is_clean() {
        let mut batch = SpriteBatch::new();
        batch.add_item(LogicalPosition::xy(4, 4));
        assert!(batch.set_item_name("old"));
        assert!(batch.set_item_size(Size::new(9.0, 9.0)));
        let old = batch.selected().unwrap();
        assert!(batch.remove_selected_item());

        let key = batch.create_item(LogicalPosition::INVALID).unwrap();
        assert_ne!(key, old);
        assert_eq!(batch.pool().cached(), 0, "slot was reused");
        let item = batch.item(key).unwrap();
        assert!(item.name().is_none());
        assert!(item.logical_position().is_invalid());
        assert_eq!(item.size(), Size::new(1.0, 1.0));
        assert_ne!(batch.selected(), Some(key));
        assert!(item.proxy().is_valid(), "indexed afresh");
    }

    #[test]
    fn names_are_unique() {
        let mut batch = SpriteBatch::new();
        batch.add_item(LogicalPosition::INVALID);
        assert!(batch.set_item_name("a"));
        batch.add_item(LogicalPosition::INVALID);
        assert_eq!(
            batch.try_set_item_name("a"),
            Err(BatchError::DuplicateName("a".into()))
        );
        assert!(batch.set_item_name("b"));
        assert!(batch.set_item_name("c"), "rename");
        assert_eq!(batch.find_by_name("b"), None);
        assert_eq!(batch.find_by_name("c"), batch.selected());
        assert!(batch.set_item_name("c"), "same name again is fine");
        assert!(batch.set_item_name(""));
        assert_eq!(batch.find_by_name("c"), None);

        assert!(batch.select_item_by_name("a"));
        assert_eq!(batch.selected_item_id(), Some(1));
        assert!(!batch.select_item_by_name("zzz"));
        assert!(batch.select_item_by_id(2));
        assert!(!batch.select_item_by_id(99));
        assert!(!batch.select_item_by_logical_position(&LogicalPosition::INVALID));
    }

    #[test]
    fn invalid_logical_lookup_misses() {
        let mut batch = SpriteBatch::new();
        batch.add_item(LogicalPosition::INVALID);
        assert_eq!(batch.find_by_logical_position(&LogicalPosition::INVALID), None);
    }

    #[test]
    fn extents_are_centred_and_idempotent() {
        let mut batch = SpriteBatch::new();
        assert!(!batch.update_local_extents());
        assert_eq!(batch.local_extents(), Size::new(1.0, 1.0));

        add_rect(&mut batch, Rect::new(0.0, 0.0, 1.0, 1.0));
        add_rect(&mut batch, Rect::new(-3.0, -1.0, -2.0, 0.0));
        assert!(batch.extents_dirty());
        assert!(batch.update_local_extents());
        assert_eq!(batch.local_extents(), Size::new(6.0, 2.0));
        assert!(!batch.update_local_extents(), "second call recomputes nothing");
        assert_eq!(batch.local_extents(), Size::new(6.0, 2.0));

        assert!(batch.set_item_local_position(Point::new(-10.0, 0.0)));
        assert!(batch.extents_dirty());
        batch.clear_all_items();
        assert!(batch.update_local_extents());
        assert_eq!(batch.local_extents(), Size::new(1.0, 1.0));
    }

    #[test]
    fn moves_keep_index_in_sync() {
        let mut batch = SpriteBatch::new();
        let id = add_rect(&mut batch, Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(batch.set_item_local_position(Point::new(30.5, 30.5)));
        assert_eq!(batch.query_area(Rect::new(0.0, 0.0, 1.0, 1.0), false), 0);
        assert_eq!(batch.query_area(Rect::new(30.0, 30.0, 31.0, 31.0), false), 1);
        assert_eq!(result_ids(&batch), vec![id]);
        batch.clear_query();
        assert!(batch.query_results().is_empty());
    }

    #[test]
    fn prepare_render_stamps_requests() {
        let mut batch = SpriteBatch::new();
        batch.set_sort_mode(RenderSort::ZAxis);
        let a = add_rect(&mut batch, Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(batch.set_item_depth(1.0));
        let hidden = add_rect(&mut batch, Rect::new(1.0, 0.0, 2.0, 1.0));
        assert!(batch.set_item_visible(false));
        let b = add_rect(&mut batch, Rect::new(2.0, 0.0, 3.0, 1.0));
        assert!(batch.set_item_depth(5.0));
        assert!(batch.set_item_render_group(Some("fx")));
        batch.set_batch_transform(Affine::translate((100.0, 0.0)));

        let mut queue = VecRenderQueue::new();
        let view = ViewState::new(Rect::new(99.0, -1.0, 104.0, 2.0));
        assert_eq!(batch.prepare_render(RenderTargetId(7), &view, &mut queue), 2);
        assert_eq!(queue.sort_mode(), RenderSort::ZAxis);
        queue.sort();
        let serials: Vec<_> = queue.requests().iter().map(|r| r.serial_id).collect();
        assert_eq!(serials, vec![b, a]);
        assert!(!serials.contains(&hidden));

        let first = &queue.requests()[0];
        assert_eq!(first.owner, RenderTargetId(7));
        assert_eq!(first.transform_version, 1);
        assert_eq!(first.world_position, Point::new(102.5, 0.5));
        assert_eq!(first.render_group.and_then(|g| batch.resolve(g)), Some("fx"));
        let key = first.custom.unwrap();
        assert_eq!(batch.item(key).unwrap().batch_id(), b);
        assert!(batch.query_results().is_empty(), "query cleared after the pass");

        #[derive(Default)]
        struct Count(usize);
        impl BatchRenderer for Count {
            fn submit_quad(&mut self, _: &crate::render::QuadSubmission<'_>) {
                self.0 += 1;
            }
        }
        let mut renderer = Count::default();
        for r in queue.requests() {
            assert!(batch.render_request(r, &mut renderer));
        }
        assert_eq!(renderer.0, 2);
    }

    #[test]
    fn picks_use_world_space_and_oriented_boxes() {
        let mut batch = SpriteBatch::new();
        let id = add_rect(&mut batch, Rect::new(0.0, 0.0, 2.0, 2.0));
        assert!(batch.set_item_angle(FRAC_PI_4));
        let other = add_rect(&mut batch, Rect::new(6.0, 0.0, 7.0, 2.0));
        batch.set_batch_transform(Affine::translate((10.0, 10.0)));

        assert_eq!(batch.pick_point(Point::new(11.0, 11.0)), vec![id]);
        assert!(
            batch.pick_point(Point::new(9.7, 9.7)).is_empty(),
            "inside the AABB, outside the rotated box"
        );
        assert_eq!(
            sorted(batch.pick_area(Rect::new(10.5, 10.5, 16.5, 11.5))),
            vec![id, other]
        );
        assert_eq!(
            batch.pick_ray(Point::new(20.0, 11.0), Point::new(0.0, 11.0)),
            vec![other, id]
        );
        assert!(batch.query_results().is_empty(), "picks clear the query");

        batch.set_index_enabled(false);
        assert!(batch.pick_point(Point::new(11.0, 11.0)).is_empty());
    }

    #[test]
    fn calculate_local_aabb_inverts_transform() {
        let mut batch = SpriteBatch::new();
        batch.set_batch_transform(Affine::translate((5.0, 0.0)) * Affine::scale(2.0));
        let local = batch.calculate_local_aabb(Rect::new(5.0, 0.0, 9.0, 2.0));
        assert_eq!(local, Some(Rect::new(0.0, 0.0, 2.0, 1.0)));
    }

    #[test]
    fn singular_transform_hides_batch_on_both_paths() {
        let view = ViewState::new(Rect::new(-10.0, -10.0, 10.0, 10.0));
        for indexed in [true, false] {
            let mut batch = SpriteBatch::new();
            batch.set_index_enabled(indexed);
            add_rect(&mut batch, Rect::new(0.0, 0.0, 1.0, 1.0));
            add_rect(&mut batch, Rect::new(2.0, 2.0, 3.0, 3.0));

            batch.set_batch_transform(Affine::scale(0.0));
            assert!(!batch.is_transform_invertible());
            assert_eq!(batch.calculate_local_aabb(view.render_aabb), None);
            let mut queue = VecRenderQueue::new();
            assert_eq!(
                batch.prepare_render(RenderTargetId(1), &view, &mut queue),
                0,
                "indexed={indexed}"
            );
            assert!(queue.is_empty());
            assert!(batch.pick_point(Point::ORIGIN).is_empty());

            batch.set_batch_transform(Affine::IDENTITY);
            assert_eq!(batch.prepare_render(RenderTargetId(1), &view, &mut queue), 2);
        }
    }

    #[test]
    fn zero_size_item_is_picked_only_at_its_point() {
        let mut batch = SpriteBatch::new();
        let dot = batch.add_item(LogicalPosition::INVALID);
        assert!(batch.set_item_size(Size::ZERO));
        let tile = add_rect(&mut batch, Rect::new(2.5, -0.5, 3.5, 0.5));

        // Inside the dot's fat bound but not on the dot.
        assert!(batch.pick_point(Point::new(0.05, 0.05)).is_empty());
        assert_eq!(batch.pick_point(Point::ORIGIN), [dot]);
        assert_eq!(
            batch.pick_ray(Point::new(-5.0, 0.05), Point::new(5.0, 0.05)),
            [tile],
            "ray beside the dot only hits the tile"
        );
        assert_eq!(batch.pick_ray(Point::new(-5.0, 0.0), Point::new(5.0, 0.0)), [dot, tile]);

        assert_eq!(batch.query_ray(Point::new(-5.0, 0.05), Point::new(5.0, 0.05), true), 1);
        assert_eq!(batch.query_results()[0].batch_id, tile);
        assert!((batch.query_results()[0].fraction - 0.75).abs() < 1e-12);
        assert!(batch.pick_area(Rect::new(0.01, 0.01, 1.0, 1.0)).is_empty());
    }

    #[test]
    fn clear_forgets_names_and_groups() {
        let mut batch = SpriteBatch::new();
        for n in 0..100 {
            batch.add_item(LogicalPosition::INVALID);
            assert!(batch.set_item_name(&alloc::format!("bullet_{n}")));
            assert!(batch.set_item_render_group(Some("bullets")));
        }
        assert_eq!(batch.interner.len(), 101);

        batch.clear_all_items();
        assert!(batch.interner.is_empty(), "no strings survive a clear");
        assert_eq!(batch.find_by_name("bullet_5"), None);

        batch.deselect_item();
        assert!(!batch.set_item_render_group(Some("ghost")));
        assert!(!batch.set_item_name("ghost"));
        assert!(batch.interner.is_empty(), "failed calls intern nothing");

        batch.add_item(LogicalPosition::INVALID);
        assert!(batch.set_item_name("bullet_5"));
        assert!(batch.find_by_name("bullet_5").is_some());
    }

    #[test]
    fn layouts_place_items_and_lock() {
        let mut batch = SpriteBatch::new();
        assert!(batch.set_layout(BatchLayout::Rectilinear));
        batch.set_default_stride(Vec2::new(2.0, 3.0));
        assert_eq!(batch.add_item(LogicalPosition::INVALID), 0, "grid needs x y");
        let id = batch.add_item(LogicalPosition::xy(1, 2));
        let key = batch.find_by_id(id).unwrap();
        assert_eq!(batch.item(key).unwrap().local_position(), Point::new(2.0, 6.0));
        assert!(!batch.set_layout(BatchLayout::Isometric), "locked with items");
        batch.clear_all_items();
        assert!(batch.set_layout(BatchLayout::Isometric));
    }

    #[test]
    fn defaults_apply_to_new_items() {
        let mut batch = SpriteBatch::new();
        batch.set_default_size(Size::new(2.0, 4.0));
        batch.set_default_angle(0.5);
        let key = batch.create_item(LogicalPosition::INVALID).unwrap();
        let item = batch.item(key).unwrap();
        assert_eq!(item.size(), Size::new(2.0, 4.0));
        assert_eq!(item.angle(), 0.5);
        assert!(!batch.is_item_selected(), "create does not select");
    }

    #[test]
    fn copy_reassigns_ids_and_keeps_state() {
        let mut src = SpriteBatch::new();
        src.add_item(LogicalPosition::xy(0, 0));
        assert!(src.remove_selected_item());
        src.add_item(LogicalPosition::xy(3, 0));
        assert!(src.set_item_name("right"));
        assert!(src.set_item_render_group(Some("front")));
        assert!(src.set_item_flip(true, false));
        src.add_item(LogicalPosition::xy(5, 5));
        assert!(src.set_item_name("corner"));

        let mut dst = SpriteBatch::new();
        dst.add_item(LogicalPosition::INVALID);
        src.copy_all_items_to(&mut dst);
        assert_eq!(dst.len(), 2);
        assert!(!dst.is_item_selected());
        assert_index_parity(&dst);
        let key = dst.find_by_name("corner").unwrap();
        let item = dst.item(key).unwrap();
        assert_eq!(item.batch_id(), 2, "ids come from the target counter");
        assert_eq!(item.logical_position(), LogicalPosition::xy(5, 5));
        assert_eq!(item.local_position(), Point::new(5.0, 5.0));
        assert_eq!(dst.query_area(Rect::new(4.9, 4.9, 5.1, 5.1), false), 1);

        let right = dst.item(dst.find_by_name("right").unwrap()).unwrap();
        assert_eq!(right.batch_id(), 1);
        assert!(right.flags().contains(crate::ItemFlags::FLIP_X));
        assert_eq!(right.render_group().and_then(|g| dst.resolve(g)), Some("front"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn sprites_round_trip_through_json() {
        let mut batch = SpriteBatch::new();
        batch.add_item(LogicalPosition::xy(1, 2));
        assert!(batch.set_item_name("door"));
        assert!(batch.set_item_render_group(Some("walls")));
        assert!(batch.set_item_size(Size::new(2.0, 1.0)));
        batch.add_item(LogicalPosition::xy(4, 4));
        assert!(batch.set_item_image("tiles", 3));
        assert!(batch.set_item_visible(false));

        let json = serde_json::to_string(&batch.write_sprites()).unwrap();
        let node: crate::persist::SpritesNode = serde_json::from_str(&json).unwrap();

        let mut loaded = SpriteBatch::new();
        assert_eq!(loaded.read_sprites(&node), 2);
        assert_index_parity(&loaded);
        let door = loaded.find_by_name("door").unwrap();
        let item = loaded.item(door).unwrap();
        assert_eq!(item.logical_position(), LogicalPosition::xy(1, 2));
        assert_eq!(item.size(), Size::new(2.0, 1.0));
        assert_eq!(item.render_group().and_then(|g| loaded.resolve(g)), Some("walls"));
        let tile = loaded.find_by_logical_position(&LogicalPosition::xy(4, 4)).unwrap();
        assert!(!loaded.item(tile).unwrap().visible());
        assert_eq!(loaded.write_sprites(), batch.write_sprites());

        // Reading again collides on every logical position.
        assert_eq!(loaded.read_sprites(&node), 0);
        assert_eq!(loaded.len(), 2);
    }
}
