//! Sprites: the engine's entity type.
//!
//! A [`Sprite`] is a mutable record of positional props, an optional convex
//! collision polygon in local space, and a cached world-space collision
//! snapshot ([`WorldShape`]) that is recomputed lazily — only when position,
//! scale, or angle changed, or when the parent container moved. Sprites
//! compose behavior through a per-sprite component registry
//! ([`crate::components::ComponentSet`]) and react to lifecycle events
//! ("inserted", "removed", "step", "hit", ...) through the event bus.
//!
//! Submodules overview:
//! - [`sheet`] – sprite sheet geometry and per-frame collision overrides

pub mod sheet;

use glam::Vec2;

use crate::collision::Contact;
use crate::components::ComponentSet;
use crate::events::{Bind, EventBus, SpriteHandler};
use crate::math::Matrix2D;
use crate::stage::Stage;
use crate::stage::grid::CellRange;
use crate::tiles::TileLayer;

pub use sheet::{FrameProps, SpriteSheet};

/// Collision-class bits carried in [`Props::kind`] and matched against
/// collision masks.
pub const SPRITE_NONE: u32 = 0;
pub const SPRITE_DEFAULT: u32 = 1;
pub const SPRITE_PARTICLE: u32 = 2;
pub const SPRITE_ACTIVE: u32 = 4;
pub const SPRITE_FRIENDLY: u32 = 8;
pub const SPRITE_ENEMY: u32 = 16;
pub const SPRITE_POWERUP: u32 = 32;
pub const SPRITE_UI: u32 = 64;
pub const SPRITE_ALL: u32 = 0xFFFF;

/// Unique sprite identifier, assigned by the stage at insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpriteId(pub u64);

impl SpriteId {
    /// Reserved id used as the listener target for stage-owned listeners.
    /// Real sprite ids start at 1.
    pub const STAGE: SpriteId = SpriteId(0);
}

/// Per-sprite step hook, invoked between the "prestep" and "step" events.
pub type StepFn = fn(stage: &mut Stage, id: SpriteId, dt: f32);

/// Mutable sprite properties.
///
/// `x`/`y` is the sprite origin; `cx`/`cy` the offset from origin to the
/// top-left of the bounding box (defaults to half the size, i.e. the origin
/// sits at the center); `points` the collision polygon as local offsets from
/// the origin, convex and clockwise.
#[derive(Debug, Clone)]
pub struct Props {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
    pub h: f32,
    pub cx: f32,
    pub cy: f32,
    /// Rotation in degrees.
    pub angle: f32,
    /// Uniform scale. 1.0 takes the fast transform path.
    pub scale: f32,
    /// Collision-class bitmask of this sprite.
    pub kind: u32,
    /// Default candidate filter for collision queries. `None` collides with
    /// everything.
    pub collision_mask: Option<u32>,
    /// Category name; non-empty names index the sprite into the stage's
    /// per-category lists.
    pub name: String,
    /// Convex collision polygon, clockwise, local space. Generated as a
    /// centered rectangle on demand when absent.
    pub points: Option<Vec<Vec2>>,
    /// Set when the sprite's transform changed outside the snapshot's
    /// knowledge (e.g. the parent container moved).
    pub moved: bool,
    pub hidden: bool,
    pub opacity: f32,
    /// Only update/render this sprite when it was marked visible this frame.
    pub visible_only: bool,
    /// Render even when not marked visible (tile layers default to this).
    pub render_always: bool,
    /// Sort children by `z` before rendering them.
    pub sort: bool,
    /// Velocity and acceleration, integrated by the platformer component.
    pub vx: f32,
    pub vy: f32,
    pub ax: f32,
    pub ay: f32,
    /// Gravity multiplier (0 disables gravity for this sprite).
    pub gravity: f32,
    /// Per-sprite gravity overrides; `None` uses the stage's gravity.
    pub gravity_x: Option<f32>,
    pub gravity_y: Option<f32>,
    /// Collide and report, but never zero velocity on resolution.
    pub skip_collide: bool,
    /// This sprite detects overlap without physical separation.
    pub sensor: bool,
    pub flip_h: bool,
    pub flip_v: bool,
    /// Current sheet frame, for the renderer.
    pub frame: u32,
    /// Sheet name, for the renderer.
    pub sheet: Option<String>,
    /// Contacts recorded during the current step, cleared on update.
    pub collisions: Vec<Contact>,
}

impl Default for Props {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 0.0,
            h: 0.0,
            cx: 0.0,
            cy: 0.0,
            angle: 0.0,
            scale: 1.0,
            kind: SPRITE_DEFAULT | SPRITE_ACTIVE,
            collision_mask: None,
            name: String::new(),
            points: None,
            moved: false,
            hidden: false,
            opacity: 1.0,
            visible_only: false,
            render_always: false,
            sort: false,
            vx: 0.0,
            vy: 0.0,
            ax: 0.0,
            ay: 0.0,
            gravity: 1.0,
            gravity_x: None,
            gravity_y: None,
            skip_collide: false,
            sensor: false,
            flip_h: false,
            flip_v: false,
            frame: 0,
            sheet: None,
            collisions: Vec::new(),
        }
    }
}

/// Cached world-space collision snapshot.
///
/// `orig_*` record the prop values the snapshot was computed from; the
/// snapshot is stale once they differ or [`Props::moved`] is set.
#[derive(Debug, Clone)]
pub struct WorldShape {
    pub points: Vec<Vec2>,
    pub x: f32,
    pub y: f32,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub angle: f32,
    pub scale: f32,
    pub(crate) orig_x: f32,
    pub(crate) orig_y: f32,
    pub(crate) orig_scale: f32,
    pub(crate) orig_angle: f32,
}

/// Axis-aligned bounding box view used by the broad phase: origin, offset to
/// the top-left corner, and size.
#[derive(Debug, Clone, Copy)]
pub struct ColBox {
    pub x: f32,
    pub y: f32,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

impl ColBox {
    /// (min, max) corners.
    pub fn bounds(&self) -> (Vec2, Vec2) {
        let min = Vec2::new(self.x - self.cx, self.y - self.cy);
        (min, min + Vec2::new(self.w, self.h))
    }
}

/// The engine entity.
pub struct Sprite {
    pub props: Props,
    /// World-space collision snapshot; present from the first insertion on.
    pub c: Option<WorldShape>,
    /// Composed world transform (parent, translate, scale, rotate).
    pub matrix: Matrix2D,
    /// Parent container. The container owns the child list; this is only a
    /// back-reference.
    pub container: Option<SpriteId>,
    pub children: Vec<SpriteId>,
    /// Tile-layer payload; present on collision layers.
    pub layer: Option<TileLayer>,
    pub components: ComponentSet,
    pub step_fn: Option<StepFn>,
    /// Stage time at which this sprite was last marked visible.
    pub mark: f32,
    pub(crate) id: Option<SpriteId>,
    pub(crate) grid: Option<CellRange>,
    /// Registered as a collision layer: queried directly, never gridded.
    pub(crate) collision_layer: bool,
    pub(crate) events: EventBus<SpriteHandler>,
    pub(crate) binds: Vec<Bind>,
}

impl Sprite {
    /// The sprite's id. Only valid once inserted into a stage.
    pub fn id(&self) -> Option<SpriteId> {
        self.id
    }

    /// Recenter `cx`/`cy` to half the size so the origin is the sprite
    /// center. Call after changing `w`/`h` at runtime.
    pub fn size(&mut self) {
        self.props.cx = self.props.w / 2.0;
        self.props.cy = self.props.h / 2.0;
    }

    /// Generate the default collision polygon (a rectangle centered on the
    /// origin) if `points` is absent, or unconditionally with `force`.
    pub fn generate_points(&mut self, force: bool) {
        if self.props.points.is_some() && !force {
            return;
        }
        let half_w = self.props.w / 2.0;
        let half_h = self.props.h / 2.0;
        self.props.points = Some(vec![
            Vec2::new(-half_w, -half_h),
            Vec2::new(half_w, -half_h),
            Vec2::new(half_w, half_h),
            Vec2::new(-half_w, half_h),
        ]);
    }

    /// Mark the sprite as moved by an external force (parent transform,
    /// direct prop mutation), so the next snapshot refresh recomputes.
    pub fn moved(&mut self) {
        self.props.moved = true;
    }

    pub fn hide(&mut self) {
        self.props.hidden = true;
    }

    pub fn show(&mut self) {
        self.props.hidden = false;
    }

    /// True once the given component has been attached.
    pub fn has_component(&self, name: &str) -> bool {
        self.components.has(name)
    }

    /// Bounding box for broad-phase queries: the world snapshot when
    /// present, the raw props otherwise.
    pub fn col_box(&self) -> ColBox {
        match &self.c {
            Some(c) => ColBox {
                x: c.x,
                y: c.y,
                cx: c.cx,
                cy: c.cy,
                w: c.w,
                h: c.h,
            },
            None => ColBox {
                x: self.props.x,
                y: self.props.y,
                cx: self.props.cx,
                cy: self.props.cy,
                w: self.props.w,
                h: self.props.h,
            },
        }
    }
}

/// Builder for sprites, the construction contract external factories use.
pub struct SpriteBuilder {
    sprite: Sprite,
    center_set: bool,
}

impl Default for SpriteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SpriteBuilder {
    pub fn new() -> Self {
        Self {
            sprite: Sprite {
                props: Props::default(),
                c: None,
                matrix: Matrix2D::new(),
                container: None,
                children: Vec::new(),
                layer: None,
                components: ComponentSet::default(),
                step_fn: None,
                mark: -1.0,
                id: None,
                grid: None,
                collision_layer: false,
                events: EventBus::default(),
                binds: Vec::new(),
            },
            center_set: false,
        }
    }

    pub fn pos(mut self, x: f32, y: f32) -> Self {
        self.sprite.props.x = x;
        self.sprite.props.y = y;
        self
    }

    pub fn dims(mut self, w: f32, h: f32) -> Self {
        self.sprite.props.w = w;
        self.sprite.props.h = h;
        self
    }

    pub fn z(mut self, z: f32) -> Self {
        self.sprite.props.z = z;
        self
    }

    /// Explicit origin-to-corner offset, instead of the default centering.
    pub fn center(mut self, cx: f32, cy: f32) -> Self {
        self.sprite.props.cx = cx;
        self.sprite.props.cy = cy;
        self.center_set = true;
        self
    }

    pub fn angle(mut self, degrees: f32) -> Self {
        self.sprite.props.angle = degrees;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.sprite.props.scale = scale;
        self
    }

    pub fn kind(mut self, kind: u32) -> Self {
        self.sprite.props.kind = kind;
        self
    }

    pub fn collision_mask(mut self, mask: u32) -> Self {
        self.sprite.props.collision_mask = Some(mask);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.sprite.props.name = name.into();
        self
    }

    /// Override the collision polygon. Must be convex and clockwise.
    pub fn points(mut self, points: Vec<Vec2>) -> Self {
        self.sprite.props.points = Some(points);
        self
    }

    /// Copy frame dimensions from a sheet when no explicit size was given.
    pub fn sheet(mut self, sheet: &SpriteSheet) -> Self {
        if self.sprite.props.w == 0.0 && self.sprite.props.h == 0.0 {
            self.sprite.props.w = sheet.tile_w;
            self.sprite.props.h = sheet.tile_h;
        }
        self.sprite.props.sheet = Some(sheet.name.clone());
        self
    }

    /// Attach a tile-layer payload; the sprite takes the layer's pixel
    /// dimensions and renders always (layers are large and mostly static).
    pub fn tile_layer(mut self, layer: TileLayer) -> Self {
        self.sprite.props.w = layer.w();
        self.sprite.props.h = layer.h();
        self.sprite.props.cx = 0.0;
        self.sprite.props.cy = 0.0;
        self.sprite.props.render_always = true;
        self.sprite.layer = Some(layer);
        self
    }

    pub fn step(mut self, step_fn: StepFn) -> Self {
        self.sprite.step_fn = Some(step_fn);
        self
    }

    pub fn props(mut self, f: impl FnOnce(&mut Props)) -> Self {
        f(&mut self.sprite.props);
        self
    }

    pub fn build(mut self) -> Sprite {
        // Tile layers keep their top-left anchored cx/cy of zero.
        if self.sprite.layer.is_none() && !self.center_set {
            self.sprite.size();
        }
        self.sprite
    }
}

/// Recompute a sprite's world-space collision snapshot if it is stale.
///
/// The snapshot is stale when position, scale, or angle differ from the
/// values it was computed from, when the sprite has no snapshot yet, or when
/// `moved` was raised (the parent container moved). Parentless, unscaled,
/// unrotated sprites take the fast path: local point offsets are added to the
/// absolute position without touching the matrix-derived bounding box. All
/// other sprites run the full matrix transform and recompute cx/cy/w/h from
/// the transformed bounding box, keeping it tight to the actual shape.
pub(crate) fn generate_collision_points(stage: &mut Stage, id: SpriteId) {
    // Stale check plus parent-transform capture, all under a shared borrow.
    let parent = {
        let Some(sprite) = stage.sprite(id) else {
            return;
        };
        let p = &sprite.props;
        if let Some(c) = &sprite.c
            && !p.moved
            && c.orig_x == p.x
            && c.orig_y == p.y
            && c.orig_scale == p.scale
            && c.orig_angle == p.angle
        {
            return;
        }
        sprite.container.and_then(|cid| {
            stage.sprite(cid).map(|parent| {
                let (angle, scale) = match &parent.c {
                    Some(c) => (c.angle, c.scale),
                    None => (parent.props.angle, parent.props.scale),
                };
                (parent.matrix, angle, scale)
            })
        })
    };

    let children = {
        let Some(sprite) = stage.sprite_mut(id) else {
            return;
        };
        sprite.generate_points(false);

        // Rebuild the composed transform: parent, translate, scale, rotate.
        sprite.matrix.identity();
        if let Some((parent_matrix, _, _)) = &parent {
            sprite.matrix.multiply(parent_matrix);
        }
        sprite
            .matrix
            .translate(sprite.props.x, sprite.props.y);
        if sprite.props.scale != 1.0 {
            sprite.matrix.scale(sprite.props.scale, sprite.props.scale);
        }
        sprite.matrix.rotate_deg(sprite.props.angle);

        let Some(local) = sprite.props.points.clone() else {
            return;
        };
        let p = &sprite.props;

        let c = if parent.is_none() && p.scale == 1.0 && p.angle == 0.0 {
            // Fast path: a pure translation.
            let pos = Vec2::new(p.x, p.y);
            WorldShape {
                points: local.iter().map(|pt| pos + *pt).collect(),
                x: p.x,
                y: p.y,
                cx: p.cx,
                cy: p.cy,
                w: p.w,
                h: p.h,
                angle: 0.0,
                scale: 1.0,
                orig_x: p.x,
                orig_y: p.y,
                orig_scale: p.scale,
                orig_angle: p.angle,
            }
        } else {
            let (parent_matrix, parent_angle, parent_scale) = parent
                .as_ref()
                .map(|(m, a, s)| (*m, *a, *s))
                .unwrap_or((Matrix2D::new(), 0.0, 1.0));

            let x = parent_matrix.transform_x(p.x, p.y);
            let y = parent_matrix.transform_y(p.x, p.y);

            let mut min = Vec2::splat(f32::INFINITY);
            let mut max = Vec2::splat(f32::NEG_INFINITY);
            let points: Vec<Vec2> = local
                .iter()
                .map(|pt| {
                    let world = sprite.matrix.transform_point(*pt);
                    min = min.min(world);
                    max = max.max(world);
                    world
                })
                .collect();

            // Zero-area boxes break the broad phase; give them a unit of
            // extent instead of surfacing an error.
            if min.x == max.x {
                max.x += 1.0;
            }
            if min.y == max.y {
                max.y += 1.0;
            }

            WorldShape {
                points,
                x,
                y,
                cx: x - min.x,
                cy: y - min.y,
                w: max.x - min.x,
                h: max.y - min.y,
                angle: p.angle + parent_angle,
                scale: parent_scale * p.scale,
                orig_x: p.x,
                orig_y: p.y,
                orig_scale: p.scale,
                orig_angle: p.angle,
            }
        };

        sprite.c = Some(c);
        sprite.props.moved = false;
        sprite.children.clone()
    };

    // A container that moved invalidates every child's snapshot.
    for child in children {
        if let Some(sprite) = stage.sprite_mut(child) {
            sprite.moved();
        }
    }
}
