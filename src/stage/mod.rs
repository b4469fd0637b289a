//! The stage: scene container and per-frame orchestrator.
//!
//! A [`Stage`] owns every sprite active in a scene — the id index, the
//! per-category lists, the broad-phase [`grid`](crate::stage::grid), the
//! collision-layer list, and the pending-removal queue. Each frame runs a
//! strictly ordered state machine:
//!
//! 1. **mark** sprites whose grid cells intersect the viewport
//! 2. **prestep** stage notification
//! 3. **update** every root sprite (children recurse through their parent):
//!    per-sprite events and step hook, snapshot refresh, regrid
//! 4. **step** stage notification
//! 5. **deferred removal** — sprites queued with [`Stage::remove`] detach
//!    here, never mid-iteration
//! 6. **poststep** stage notification
//!
//! Rendering is a separate pass over the same items (z-sorted when enabled),
//! never interleaved with stepping.
//!
//! Submodules overview:
//! - [`grid`] – uniform broad-phase spatial index
//! - [`scene`] – named scene registry and per-scene stage options
//!
//! # Collision resolution
//!
//! [`Stage::collide`] is callable mid-step by entity logic: it refreshes the
//! probe's snapshot and grid cells, then runs up to `max_collisions` passes
//! against the collision layers and up to `max_collisions` passes against
//! grid candidates, firing `hit`/`hit.collision`/`hit.sprite` after each
//! found contact so the probe's own handlers can resolve before the retry.

pub mod grid;
pub mod scene;

use glam::Vec2;
use log::debug;
use smallvec::SmallVec;

use crate::canvas::Canvas;
use crate::collision::{self, Contact, ShapeRef, TileRef};
use crate::config::EngineConfig;
use crate::events::{Bind, BindSource, EventBus, EventData, HandlerRef, SpriteHandler, StageHandler};
use crate::sprites::{self, ColBox, Sprite, SpriteId};
use crate::components::viewport::Viewport;
use grid::{CellRange, SpatialGrid};
use rustc_hash::FxHashMap;

const DEFAULT_GRID_W: f32 = 400.0;
const DEFAULT_GRID_H: f32 = 400.0;
const DEFAULT_MAX_COLLISIONS: u32 = 3;

/// Stage-level tuning, merged from the engine config and scene options.
#[derive(Debug, Clone)]
pub struct StageOptions {
    /// Sort items by `z` before each render pass.
    pub sort: bool,
    pub grid_w: f32,
    pub grid_h: f32,
    /// Resolution pass cap per `collide` call.
    pub max_collisions: u32,
    pub x: f32,
    pub y: f32,
    /// View size, used by the mark phase and the viewport.
    pub w: f32,
    pub h: f32,
    pub gravity_x: f32,
    pub gravity_y: f32,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            sort: false,
            grid_w: DEFAULT_GRID_W,
            grid_h: DEFAULT_GRID_H,
            max_collisions: DEFAULT_MAX_COLLISIONS,
            x: 0.0,
            y: 0.0,
            w: 640.0,
            h: 360.0,
            gravity_x: 0.0,
            gravity_y: 9.8 * 100.0,
        }
    }
}

impl StageOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            grid_w: config.grid_w,
            grid_h: config.grid_h,
            max_collisions: config.max_collisions,
            w: config.width,
            h: config.height,
            gravity_x: config.gravity_x,
            gravity_y: config.gravity_y,
            ..Self::default()
        }
    }
}

/// Per-call overrides for [`Stage::collide`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CollideOpts {
    /// Candidate filter; defaults to the probe's own `collision_mask`.
    pub collision_mask: Option<u32>,
    /// Pass cap; defaults to the stage's `max_collisions`.
    pub max_collisions: Option<u32>,
    /// Suppress `hit.collision` on the probe and the mirrored notification
    /// of the other sprite.
    pub skip_events: bool,
}

/// A sensor tile the probe overlapped during a layer query.
#[derive(Debug, Clone, Copy)]
pub struct SensorHit {
    pub layer: SpriteId,
    pub tile: TileRef,
}

/// An off-stage query shape (a sprite's snapshot, or a synthetic point
/// probe for `locate`).
struct Probe<'a> {
    bbox: ColBox,
    shape: ShapeRef<'a>,
    range: CellRange,
    exclude: Option<SpriteId>,
}

pub struct Stage {
    pub options: StageOptions,
    pub time: f32,
    pub paused: bool,
    pub hidden: bool,
    pub viewport: Option<Viewport>,
    pub(crate) sprites: FxHashMap<SpriteId, Sprite>,
    pub(crate) items: Vec<SpriteId>,
    pub(crate) grid: SpatialGrid,
    lists: FxHashMap<String, Vec<SpriteId>>,
    collision_layers: Vec<SpriteId>,
    remove_list: Vec<SpriteId>,
    events: EventBus<StageHandler>,
    next_id: u64,
}

impl Stage {
    pub fn new(options: StageOptions) -> Self {
        let grid = SpatialGrid::new(options.grid_w, options.grid_h);
        Self {
            options,
            time: 0.0,
            paused: false,
            hidden: false,
            viewport: None,
            sprites: FxHashMap::default(),
            items: Vec::new(),
            grid,
            lists: FxHashMap::default(),
            collision_layers: Vec::new(),
            remove_list: Vec::new(),
            events: EventBus::default(),
            next_id: 0,
        }
    }

    // ---------------------------------------------------------------
    // Item bookkeeping
    // ---------------------------------------------------------------

    /// Insert a sprite directly into the stage. Assigns an id when the
    /// sprite has none, indexes it, fires "inserted" on both the stage and
    /// the sprite, and grids it.
    pub fn insert(&mut self, sprite: Sprite) -> SpriteId {
        self.insert_into(sprite, None)
    }

    /// Insert a sprite as a child of a container. The container owns the
    /// child list; children are updated and rendered through their parent.
    pub fn insert_into(&mut self, mut sprite: Sprite, container: Option<SpriteId>) -> SpriteId {
        let id = sprite.id.unwrap_or_else(|| {
            self.next_id += 1;
            SpriteId(self.next_id)
        });
        sprite.id = Some(id);
        sprite.container = container;
        sprite.generate_points(false);

        let name = sprite.props.name.clone();
        let component_names: Vec<&'static str> = sprite.components.names().collect();

        self.items.push(id);
        self.sprites.insert(id, sprite);
        if let Some(cid) = container
            && let Some(parent) = self.sprites.get_mut(&cid)
        {
            parent.children.push(id);
        }

        if !name.is_empty() {
            self.add_to_list(&name, id);
        }
        for list in component_names {
            self.add_to_list(list, id);
        }

        sprites::generate_collision_points(self, id);
        self.trigger_stage("inserted", &mut EventData::Sprite(id));
        self.trigger(id, "inserted", &mut EventData::None);
        self.regrid(id, false);
        id
    }

    /// Register a tile layer as a collision layer: kept out of the generic
    /// grid, appended to the layer list queried on every collision pass.
    pub fn collision_layer(&mut self, mut sprite: Sprite) -> SpriteId {
        if sprite.layer.is_none() {
            debug!("collision_layer called with a sprite that has no tile layer");
        }
        sprite.collision_layer = true;
        let id = self.insert(sprite);
        self.collision_layers.push(id);
        id
    }

    /// Unregister a collision layer (the sprite stays on the stage).
    pub fn remove_collision_layer(&mut self, id: SpriteId) {
        self.collision_layers.retain(|l| *l != id);
    }

    pub fn collision_layers(&self) -> &[SpriteId] {
        &self.collision_layers
    }

    /// Queue a sprite for removal. It leaves the grid immediately but stays
    /// in the index and item list until the deferred-removal phase, so
    /// in-flight iterations never lose their footing.
    pub fn remove(&mut self, id: SpriteId) {
        if let Some(sprite) = self.sprites.get_mut(&id)
            && let Some(range) = sprite.grid.take()
        {
            self.grid.del(range, id);
        }
        if !self.remove_list.contains(&id) {
            self.remove_list.push(id);
        }
    }

    /// Detach a sprite right now: index, lists, grid, parent's children,
    /// outbound event binds. Fires "removed" on the sprite, then on the
    /// stage. Idempotent.
    pub fn force_remove(&mut self, id: SpriteId) {
        if !self.sprites.contains_key(&id) {
            return;
        }
        self.trigger(id, "removed", &mut EventData::None);
        self.debind(id);

        let Some(mut sprite) = self.sprites.remove(&id) else {
            return;
        };
        if let Some(range) = sprite.grid.take() {
            self.grid.del(range, id);
        }
        self.items.retain(|item| *item != id);
        if !sprite.props.name.is_empty() {
            let name = sprite.props.name.clone();
            self.remove_from_list(&name, id);
        }
        let component_names: Vec<&'static str> = sprite.components.names().collect();
        for list in component_names {
            self.remove_from_list(list, id);
        }
        if let Some(cid) = sprite.container
            && let Some(parent) = self.sprites.get_mut(&cid)
        {
            parent.children.retain(|child| *child != id);
        }
        for child in &sprite.children {
            if let Some(child_sprite) = self.sprites.get_mut(child) {
                child_sprite.container = None;
            }
        }
        self.collision_layers.retain(|l| *l != id);

        self.trigger_stage("removed", &mut EventData::Sprite(id));
    }

    /// Look up a sprite by id.
    pub fn find(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.get(&id)
    }

    pub fn sprite(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.get(&id)
    }

    pub fn sprite_mut(&mut self, id: SpriteId) -> Option<&mut Sprite> {
        self.sprites.get_mut(&id)
    }

    pub fn items(&self) -> &[SpriteId] {
        &self.items
    }

    /// The broad-phase index (read-only).
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Category list for a class or component name.
    pub fn select(&self, list: &str) -> &[SpriteId] {
        self.lists.get(list).map(|l| l.as_slice()).unwrap_or(&[])
    }

    pub fn add_to_list(&mut self, list: &str, id: SpriteId) {
        self.lists.entry(list.to_owned()).or_default().push(id);
    }

    pub fn remove_from_list(&mut self, list: &str, id: SpriteId) {
        if let Some(entries) = self.lists.get_mut(list) {
            entries.retain(|e| *e != id);
        }
    }

    /// Run a callback for every item currently on the stage.
    pub fn each(&mut self, mut f: impl FnMut(&mut Stage, SpriteId)) {
        for id in self.items.clone() {
            if self.sprites.contains_key(&id) {
                f(self, id);
            }
        }
    }

    /// First item (in reverse insertion order) matching a predicate.
    pub fn detect(&self, f: impl Fn(&Sprite) -> bool) -> Option<SpriteId> {
        self.items
            .iter()
            .rev()
            .find(|id| self.sprites.get(id).map(&f).unwrap_or(false))
            .copied()
    }

    // ---------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------

    /// Subscribe to an event on a sprite. Cross-sprite subscriptions are
    /// recorded on the target so they are released when it detaches.
    pub fn on(&mut self, sprite: SpriteId, event: &str, target: SpriteId, handler: SpriteHandler) {
        let Some(s) = self.sprites.get_mut(&sprite) else {
            return;
        };
        s.events.on(event, target, handler);
        if target != sprite
            && target != SpriteId::STAGE
            && let Some(t) = self.sprites.get_mut(&target)
        {
            t.binds.push(Bind {
                source: BindSource::Sprite(sprite),
                event: event.to_owned(),
                handler: HandlerRef::Sprite(handler),
            });
        }
    }

    /// Unsubscribe from an event on a sprite by target and, optionally,
    /// specific handler.
    pub fn off(
        &mut self,
        sprite: SpriteId,
        event: &str,
        target: Option<SpriteId>,
        handler: Option<SpriteHandler>,
    ) {
        if let Some(s) = self.sprites.get_mut(&sprite) {
            s.events.off(event, target, handler);
        }
        if let Some(target) = target
            && target != sprite
            && target != SpriteId::STAGE
            && let Some(t) = self.sprites.get_mut(&target)
        {
            t.binds.retain(|b| {
                !(b.source == BindSource::Sprite(sprite)
                    && b.event == event
                    && handler
                        .map(|h| b.handler == HandlerRef::Sprite(h))
                        .unwrap_or(true))
            });
        }
    }

    /// Fire an event on a sprite, synchronously, in registration order.
    pub fn trigger(&mut self, sprite: SpriteId, event: &str, data: &mut EventData) {
        let listeners = match self.sprites.get(&sprite) {
            Some(s) => s.events.snapshot(event),
            None => return,
        };
        for (target, handler) in listeners {
            handler(self, sprite, target, data);
        }
    }

    /// Subscribe to a stage-level event.
    pub fn on_stage(&mut self, event: &str, target: SpriteId, handler: StageHandler) {
        self.events.on(event, target, handler);
        if target != SpriteId::STAGE
            && let Some(t) = self.sprites.get_mut(&target)
        {
            t.binds.push(Bind {
                source: BindSource::Stage,
                event: event.to_owned(),
                handler: HandlerRef::Stage(handler),
            });
        }
    }

    pub fn off_stage(&mut self, event: &str, target: Option<SpriteId>, handler: Option<StageHandler>) {
        self.events.off(event, target, handler);
        if let Some(target) = target
            && target != SpriteId::STAGE
            && let Some(t) = self.sprites.get_mut(&target)
        {
            t.binds.retain(|b| {
                !(b.source == BindSource::Stage
                    && b.event == event
                    && handler
                        .map(|h| b.handler == HandlerRef::Stage(h))
                        .unwrap_or(true))
            });
        }
    }

    /// Fire a stage-level event.
    pub fn trigger_stage(&mut self, event: &str, data: &mut EventData) {
        let listeners = self.events.snapshot(event);
        for (target, handler) in listeners {
            handler(self, target, data);
        }
    }

    /// Release every outbound subscription a sprite holds on the stage or
    /// on other sprites.
    pub fn debind(&mut self, id: SpriteId) {
        let binds = match self.sprites.get_mut(&id) {
            Some(s) => std::mem::take(&mut s.binds),
            None => return,
        };
        for bind in binds {
            match (bind.source, bind.handler) {
                (BindSource::Stage, HandlerRef::Stage(handler)) => {
                    self.events.off(&bind.event, Some(id), Some(handler));
                }
                (BindSource::Sprite(source), HandlerRef::Sprite(handler)) => {
                    if let Some(s) = self.sprites.get_mut(&source) {
                        s.events.off(&bind.event, Some(id), Some(handler));
                    }
                }
                _ => {}
            }
        }
    }

    /// Detach all entities' listeners and announce destruction. Called when
    /// a new scene replaces this stage.
    pub fn destroy(&mut self) {
        for id in self.items.clone() {
            self.debind(id);
        }
        self.trigger_stage("destroyed", &mut EventData::None);
    }

    // ---------------------------------------------------------------
    // Broad phase
    // ---------------------------------------------------------------

    /// Recompute the sprite's grid cell range. A no-op when the range is
    /// unchanged; otherwise the sprite moves cells in O(old + new range).
    /// Collision layers never enter the grid.
    pub fn regrid(&mut self, id: SpriteId, skip_add: bool) {
        let Some(sprite) = self.sprites.get_mut(&id) else {
            return;
        };
        if sprite.collision_layer {
            return;
        }
        let bbox = sprite.col_box();
        let kind = sprite.props.kind;
        let range = self.grid.range_for(&bbox);
        if sprite.grid != Some(range) {
            if let Some(old) = sprite.grid.take() {
                self.grid.del(old, id);
            }
            sprite.grid = Some(range);
            if !skip_add {
                self.grid.add(range, id, kind);
            }
        }
    }

    fn probe_for(&self, id: SpriteId) -> Option<Probe<'_>> {
        let sprite = self.sprites.get(&id)?;
        let bbox = sprite.col_box();
        let shape = Self::shape_of(sprite)?;
        let range = sprite
            .grid
            .unwrap_or_else(|| self.grid.range_for(&bbox));
        Some(Probe {
            bbox,
            shape,
            range,
            exclude: Some(id),
        })
    }

    fn shape_of(sprite: &Sprite) -> Option<ShapeRef<'_>> {
        match (&sprite.c, &sprite.props.points) {
            (Some(c), _) => Some(ShapeRef {
                points: &c.points,
                offset: None,
            }),
            (None, Some(points)) => Some(ShapeRef {
                points,
                offset: Some(Vec2::new(sprite.props.x, sprite.props.y)),
            }),
            (None, None) => None,
        }
    }

    /// First grid candidate that truly collides with the probe: cells are
    /// scanned row-major over the probe's range, entries in ascending id
    /// order; candidates pass the kind filter, then the AABB overlap test,
    /// then full SAT.
    fn grid_test(&self, probe: &Probe<'_>, mask: Option<u32>) -> Option<Contact> {
        for y in probe.range.y1..=probe.range.y2 {
            for x in probe.range.x1..=probe.range.x2 {
                let Some(cell) = self.grid.cell(x, y) else {
                    continue;
                };
                for (&other_id, &kind) in cell {
                    if Some(other_id) == probe.exclude {
                        continue;
                    }
                    if let Some(mask) = mask
                        && kind & mask == 0
                    {
                        continue;
                    }
                    let Some(other) = self.sprites.get(&other_id) else {
                        continue;
                    };
                    if !collision::overlap(&probe.bbox, &other.col_box()) {
                        continue;
                    }
                    let Some(other_shape) = Self::shape_of(other) else {
                        continue;
                    };
                    if let Some(mut col) = collision::collide(probe.shape, other_shape) {
                        col.obj = Some(other_id);
                        return Some(col);
                    }
                }
            }
        }
        None
    }

    /// Query the collision layers in registration order; the first layer
    /// reporting a contact wins. Sensor tiles from scanned layers are
    /// collected for the caller to notify.
    fn layer_test(
        &self,
        probe: &Probe<'_>,
        mask: Option<u32>,
    ) -> (Option<Contact>, SmallVec<[SensorHit; 4]>) {
        let mut sensors: SmallVec<[SensorHit; 4]> = SmallVec::new();
        for &layer_id in &self.collision_layers {
            let Some(layer_sprite) = self.sprites.get(&layer_id) else {
                continue;
            };
            if let Some(mask) = mask
                && layer_sprite.props.kind & mask == 0
            {
                continue;
            }
            let Some(layer) = &layer_sprite.layer else {
                continue;
            };
            let pos = Vec2::new(layer_sprite.props.x, layer_sprite.props.y);
            let (col, tiles) = layer.collide(pos, &probe.bbox, probe.shape);
            sensors.extend(tiles.into_iter().map(|tile| SensorHit {
                layer: layer_id,
                tile,
            }));
            if let Some(mut col) = col {
                col.obj = Some(layer_id);
                return (Some(col), sensors);
            }
        }
        (None, sensors)
    }

    fn fire_sensors(&mut self, id: SpriteId, sensors: SmallVec<[SensorHit; 4]>) {
        for hit in sensors {
            self.trigger(
                id,
                "sensor.tile",
                &mut EventData::Tile {
                    layer: hit.layer,
                    tile: hit.tile,
                },
            );
        }
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// One-shot collision query: layers first, then the grid. Fires sensor
    /// notifications but no hit events and no resolution passes.
    pub fn search(&mut self, id: SpriteId, mask: Option<u32>) -> Option<Contact> {
        if self.sprites.get(&id).map(|s| s.grid.is_none()).unwrap_or(true) {
            self.regrid(id, true);
        }
        let mask = mask.or_else(|| self.sprites.get(&id).and_then(|s| s.props.collision_mask));

        let (layer_col, sensors, grid_col) = {
            let Some(probe) = self.probe_for(id) else {
                return None;
            };
            let (layer_col, sensors) = self.layer_test(&probe, mask);
            let grid_col = if layer_col.is_none() {
                self.grid_test(&probe, mask)
            } else {
                None
            };
            (layer_col, sensors, grid_col)
        };
        self.fire_sensors(id, sensors);
        layer_col.or(grid_col)
    }

    /// Find the sprite colliding with the point (x, y), if any. The probe
    /// is a synthetic unit box; exact edge contact counts as a find.
    pub fn locate(&self, x: f32, y: f32, mask: Option<u32>) -> Option<SpriteId> {
        let points = [
            Vec2::new(-0.5, -0.5),
            Vec2::new(0.5, -0.5),
            Vec2::new(0.5, 0.5),
            Vec2::new(-0.5, 0.5),
        ];
        let bbox = ColBox {
            x,
            y,
            cx: 0.5,
            cy: 0.5,
            w: 1.0,
            h: 1.0,
        };
        let probe = Probe {
            bbox,
            shape: ShapeRef {
                points: &points,
                offset: Some(Vec2::new(x, y)),
            },
            range: self.grid.range_for(&bbox),
            exclude: None,
        };
        let (layer_col, _sensors) = self.layer_test(&probe, mask);
        layer_col
            .or_else(|| self.grid_test(&probe, mask))
            .and_then(|col| col.obj)
    }

    /// Multi-pass collision resolution for one probe sprite.
    ///
    /// The probe's snapshot and grid cells are refreshed first. Up to the
    /// pass cap, each found layer contact fires `hit`/`hit.collision` on
    /// the probe, then the probe is refreshed and the query retried — the
    /// probe's handlers are expected to move it out of the overlap. The
    /// same then happens against grid candidates with `hit`/`hit.sprite`;
    /// the other sprite is notified with a mirrored contact (normal
    /// negated, magnitude zeroed) unless events are suppressed.
    ///
    /// Returns the last sprite contact if any pass produced one, else the
    /// last layer contact.
    pub fn collide(&mut self, id: SpriteId, opts: CollideOpts) -> Option<Contact> {
        if !self.sprites.contains_key(&id) {
            return None;
        }
        let mask = opts
            .collision_mask
            .or_else(|| self.sprites.get(&id).and_then(|s| s.props.collision_mask));
        let max_collisions = opts.max_collisions.unwrap_or(self.options.max_collisions);

        sprites::generate_collision_points(self, id);
        self.regrid(id, false);

        let mut layer_col: Option<Contact> = None;
        let mut passes = max_collisions;
        while passes > 0 {
            let (col, sensors) = {
                let Some(probe) = self.probe_for(id) else {
                    break;
                };
                self.layer_test(&probe, mask)
            };
            self.fire_sensors(id, sensors);
            let Some(mut col) = col else {
                break;
            };
            if let Some(sprite) = self.sprites.get_mut(&id) {
                sprite.props.collisions.push(col.clone());
            }
            if !opts.skip_events {
                let mut data = EventData::Hit(&mut col);
                self.trigger(id, "hit", &mut data);
                self.trigger(id, "hit.collision", &mut data);
            }
            layer_col = Some(col);
            sprites::generate_collision_points(self, id);
            self.regrid(id, false);
            passes -= 1;
        }

        let mut sprite_col: Option<Contact> = None;
        passes = max_collisions;
        while passes > 0 {
            let col = {
                let Some(probe) = self.probe_for(id) else {
                    break;
                };
                self.grid_test(&probe, mask)
            };
            let Some(mut col) = col else {
                break;
            };
            {
                let mut data = EventData::Hit(&mut col);
                self.trigger(id, "hit", &mut data);
                self.trigger(id, "hit.sprite", &mut data);
            }
            sprite_col = Some(col.clone());
            if !opts.skip_events
                && let Some(other) = col.obj
            {
                // The passive side is informed, but with a zeroed contact so
                // the same overlap is never resolved from both ends.
                let mut mirrored = col.clone();
                mirrored.obj = Some(id);
                mirrored.normal = -col.normal;
                mirrored.distance = 0.0;
                mirrored.magnitude = 0.0;
                mirrored.separate = Vec2::ZERO;
                let mut data = EventData::Hit(&mut mirrored);
                self.trigger(other, "hit", &mut data);
                self.trigger(other, "hit.sprite", &mut data);
            }
            sprites::generate_collision_points(self, id);
            self.regrid(id, false);
            passes -= 1;
        }

        sprite_col.or(layer_col)
    }

    // ---------------------------------------------------------------
    // Frame state machine
    // ---------------------------------------------------------------

    /// Stamp sprites whose grid cells intersect the viewport with the
    /// current stage time; their containers are stamped too.
    fn mark_sprites(&mut self) {
        let (x, y, scale) = self
            .viewport
            .as_ref()
            .map(|v| (v.x, v.y, v.scale))
            .unwrap_or((0.0, 0.0, 1.0));
        let view_w = self.options.w / scale;
        let view_h = self.options.h / scale;
        let range = self.grid.range_for_view(x, y, view_w, view_h);

        let mut visible: SmallVec<[SpriteId; 32]> = SmallVec::new();
        for cell_y in range.y1..=range.y2 {
            for cell_x in range.x1..=range.x2 {
                if let Some(cell) = self.grid.cell(cell_x, cell_y) {
                    visible.extend(cell.keys().copied());
                }
            }
        }

        let time = self.time;
        for id in visible {
            let container = match self.sprites.get_mut(&id) {
                Some(sprite) => {
                    sprite.mark = time;
                    sprite.container
                }
                None => continue,
            };
            if let Some(cid) = container
                && let Some(parent) = self.sprites.get_mut(&cid)
            {
                parent.mark = time;
            }
        }
    }

    /// Run one sprite's update: `prestep` event, step hook, `step` event,
    /// snapshot refresh, recursive child updates, and clear the per-step
    /// contact record.
    pub fn update_sprite(&mut self, id: SpriteId, dt: f32) {
        let mut data = EventData::Step { dt };
        self.trigger(id, "prestep", &mut data);
        if let Some(step_fn) = self.sprites.get(&id).and_then(|s| s.step_fn) {
            step_fn(self, id, dt);
        }
        self.trigger(id, "step", &mut data);
        sprites::generate_collision_points(self, id);

        let children = self
            .sprites
            .get(&id)
            .map(|s| s.children.clone())
            .unwrap_or_default();
        if !children.is_empty() {
            self.update_sprites(&children, dt, true);
        }
        if let Some(sprite) = self.sprites.get_mut(&id) {
            sprite.props.collisions.clear();
        }
    }

    fn update_sprites(&mut self, ids: &[SpriteId], dt: f32, is_container: bool) {
        for &id in ids {
            let (skip, is_child) = match self.sprites.get(&id) {
                Some(sprite) => (
                    !is_container && sprite.props.visible_only && sprite.mark < self.time,
                    sprite.container.is_some(),
                ),
                None => continue,
            };
            if skip {
                continue;
            }
            if is_container || !is_child {
                self.update_sprite(id, dt);
                sprites::generate_collision_points(self, id);
                self.regrid(id, false);
            }
        }
    }

    /// Advance the stage one frame. See the module docs for the phase
    /// ordering. A paused stage skips this entirely (but still renders).
    pub fn step(&mut self, dt: f32) {
        if self.paused {
            return;
        }
        self.time += dt;
        self.mark_sprites();

        let mut data = EventData::Step { dt };
        self.trigger_stage("prestep", &mut data);

        let items = self.items.clone();
        self.update_sprites(&items, dt, false);
        self.trigger_stage("step", &mut data);

        // Deferred removal: everything queued during the phases above
        // detaches here, exactly once, never mid-iteration.
        if !self.remove_list.is_empty() {
            let pending = std::mem::take(&mut self.remove_list);
            for id in pending {
                self.force_remove(id);
            }
        }

        self.trigger_stage("poststep", &mut data);
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn unpause(&mut self) {
        self.paused = false;
    }

    pub fn hide(&mut self) {
        self.hidden = true;
    }

    pub fn show(&mut self) {
        self.hidden = false;
    }

    /// Hide and pause.
    pub fn stop(&mut self) {
        self.hide();
        self.pause();
    }

    /// Show and unpause.
    pub fn start(&mut self) {
        self.show();
        self.unpause();
    }

    // ---------------------------------------------------------------
    // Render pass
    // ---------------------------------------------------------------

    /// Render the stage: optional stable z-sort, render notifications, and
    /// a draw call per visible root sprite (children recurse). Hidden
    /// sprites and sprites not marked visible this frame are skipped unless
    /// they render always.
    pub fn render(&mut self, canvas: &mut dyn Canvas) {
        if self.hidden {
            return;
        }
        if self.options.sort {
            let Self { items, sprites, .. } = self;
            items.sort_by(|a, b| {
                let za = sprites.get(a).map(|s| s.props.z).unwrap_or(0.0);
                let zb = sprites.get(b).map(|s| s.props.z).unwrap_or(0.0);
                za.partial_cmp(&zb).unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        self.trigger_stage("prerender", &mut EventData::Canvas(&mut *canvas));
        self.trigger_stage("beforerender", &mut EventData::Canvas(&mut *canvas));

        for id in self.items.clone() {
            let renderable = match self.sprites.get(&id) {
                Some(sprite) => {
                    sprite.container.is_none()
                        && (sprite.props.render_always || sprite.mark >= self.time)
                }
                None => false,
            };
            if renderable {
                self.render_sprite(id, canvas);
            }
        }

        self.trigger_stage("render", &mut EventData::Canvas(&mut *canvas));
        self.trigger_stage("postrender", &mut EventData::Canvas(&mut *canvas));
    }

    /// Render one sprite and its children.
    pub fn render_sprite(&mut self, id: SpriteId, canvas: &mut dyn Canvas) {
        let skip = self
            .sprites
            .get(&id)
            .map(|s| s.props.hidden || s.props.opacity == 0.0)
            .unwrap_or(true);
        if skip {
            return;
        }

        self.trigger(id, "predraw", &mut EventData::Canvas(&mut *canvas));
        canvas.save();
        if let Some(sprite) = self.sprites.get(&id) {
            canvas.set_transform(&sprite.matrix);
        }
        self.trigger(id, "beforedraw", &mut EventData::Canvas(&mut *canvas));

        let has_layer = self
            .sprites
            .get(&id)
            .map(|s| s.layer.is_some())
            .unwrap_or(false);
        if has_layer {
            self.draw_tile_layer(id, canvas);
        } else if let Some(sprite) = self.sprites.get(&id) {
            canvas.draw_sprite(sprite);
        }

        self.trigger(id, "draw", &mut EventData::Canvas(&mut *canvas));
        canvas.restore();

        let children = match self.sprites.get(&id) {
            Some(sprite) if !sprite.children.is_empty() => {
                let mut children = sprite.children.clone();
                if sprite.props.sort {
                    let sprites = &self.sprites;
                    children.sort_by(|a, b| {
                        let za = sprites.get(a).map(|s| s.props.z).unwrap_or(0.0);
                        let zb = sprites.get(b).map(|s| s.props.z).unwrap_or(0.0);
                        za.partial_cmp(&zb).unwrap_or(std::cmp::Ordering::Equal)
                    });
                }
                children
            }
            _ => Vec::new(),
        };
        for child in children {
            self.render_sprite(child, canvas);
        }
        self.trigger(id, "postdraw", &mut EventData::Canvas(&mut *canvas));
    }

    /// Draw the blocks of a tile layer that intersect the view, marking
    /// each block's pre-render cache live as the host draws it.
    fn draw_tile_layer(&mut self, id: SpriteId, canvas: &mut dyn Canvas) {
        let (view_x, view_y, scale) = self
            .viewport
            .as_ref()
            .map(|v| (v.x, v.y, v.scale))
            .unwrap_or((0.0, 0.0, 1.0));
        let view_w = self.options.w / scale;
        let view_h = self.options.h / scale;

        let blocks: Vec<(i32, i32)> = match self.sprites.get(&id) {
            Some(sprite) => match &sprite.layer {
                Some(layer) => layer
                    .blocks_in_view(
                        Vec2::new(sprite.props.x, sprite.props.y),
                        view_x,
                        view_y,
                        view_w,
                        view_h,
                    )
                    .collect(),
                None => return,
            },
            None => return,
        };

        for (block_x, block_y) in blocks {
            if let Some(sprite) = self.sprites.get_mut(&id)
                && let Some(layer) = sprite.layer.as_mut()
            {
                layer.mark_block_cached(block_x, block_y);
            }
            if let Some(sprite) = self.sprites.get(&id) {
                canvas.draw_tile_block(sprite, block_x, block_y);
            }
        }
    }
}
