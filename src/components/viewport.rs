//! Stage camera.
//!
//! The viewport lives on the stage (not on a sprite): it tracks a world
//! offset and scale, optionally follows a sprite with soft centering after
//! each step, and wraps the render pass in save/translate/scale calls on
//! the canvas.

use crate::canvas::Canvas;
use crate::events::EventData;
use crate::sprites::SpriteId;
use crate::stage::Stage;

/// Which axes follow the target.
#[derive(Debug, Clone, Copy)]
pub struct FollowDirections {
    pub x: bool,
    pub y: bool,
}

impl Default for FollowDirections {
    fn default() -> Self {
        Self { x: true, y: true }
    }
}

/// World-space clamp for the camera, usually the tile map extents.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

#[derive(Debug, Clone)]
pub struct Viewport {
    /// World coordinate of the view's top-left corner.
    pub x: f32,
    pub y: f32,
    /// Follow offset applied to the target's position.
    pub offset_x: f32,
    pub offset_y: f32,
    /// World coordinate currently centered, updated each prerender.
    pub center_x: f32,
    pub center_y: f32,
    pub scale: f32,
    pub following: Option<SpriteId>,
    pub directions: FollowDirections,
    pub bounding_box: Option<BoundingBox>,
}

/// Install a viewport on the stage and hook the render pass.
pub fn attach(stage: &mut Stage) {
    stage.viewport = Some(Viewport {
        x: 0.0,
        y: 0.0,
        offset_x: 0.0,
        offset_y: 0.0,
        center_x: stage.options.w / 2.0,
        center_y: stage.options.h / 2.0,
        scale: 1.0,
        following: None,
        directions: FollowDirections::default(),
        bounding_box: None,
    });
    stage.on_stage("prerender", SpriteId::STAGE, viewport_prerender);
    stage.on_stage("render", SpriteId::STAGE, viewport_postrender);
}

/// Follow a sprite, optionally clamped. With no explicit bounding box the
/// first registered collision layer's extents are used when there is one.
pub fn follow(
    stage: &mut Stage,
    sprite: SpriteId,
    directions: FollowDirections,
    bounding_box: Option<BoundingBox>,
) {
    stage.off_stage("poststep", Some(SpriteId::STAGE), Some(viewport_follow));

    let bounding_box = bounding_box.or_else(|| {
        stage.collision_layers().first().and_then(|&layer_id| {
            stage.sprite(layer_id).map(|s| BoundingBox {
                min_x: 0.0,
                min_y: 0.0,
                max_x: s.props.w,
                max_y: s.props.h,
            })
        })
    });

    if let Some(vp) = stage.viewport.as_mut() {
        vp.following = Some(sprite);
        vp.directions = directions;
        vp.bounding_box = bounding_box;
    }
    stage.on_stage("poststep", SpriteId::STAGE, viewport_follow);
    follow_now(stage, true);
}

/// Stop following.
pub fn unfollow(stage: &mut Stage) {
    stage.off_stage("poststep", Some(SpriteId::STAGE), Some(viewport_follow));
}

fn viewport_follow(stage: &mut Stage, _target: SpriteId, _data: &mut EventData) {
    follow_now(stage, false);
}

fn follow_now(stage: &mut Stage, first: bool) {
    let Some(vp) = stage.viewport.as_ref() else {
        return;
    };
    let Some(target) = vp.following else {
        return;
    };
    let (offset_x, offset_y, dirs) = (vp.offset_x, vp.offset_y, vp.directions);
    let Some(sprite) = stage.sprite(target) else {
        return;
    };
    let x = dirs.x.then_some(sprite.props.x - offset_x);
    let y = dirs.y.then_some(sprite.props.y - offset_y);

    if first {
        center_on(stage, x, y);
    } else {
        soft_center_on(stage, x, y);
    }
}

/// Snap the view so (x, y) is centered. `None` leaves that axis alone.
pub fn center_on(stage: &mut Stage, x: Option<f32>, y: Option<f32>) {
    let (w, h) = (stage.options.w, stage.options.h);
    let Some(vp) = stage.viewport.as_mut() else {
        return;
    };
    if let Some(x) = x {
        vp.x = x - w / 2.0 / vp.scale;
    }
    if let Some(y) = y {
        vp.y = y - h / 2.0 / vp.scale;
    }
}

/// Ease the view a third of the way toward centering (x, y), clamped to the
/// bounding box when one is set.
pub fn soft_center_on(stage: &mut Stage, x: Option<f32>, y: Option<f32>) {
    let (w, h) = (stage.options.w, stage.options.h);
    let Some(vp) = stage.viewport.as_mut() else {
        return;
    };
    if let Some(x) = x {
        let dx = (x - w / 2.0 / vp.scale - vp.x) / 3.0;
        match vp.bounding_box {
            Some(bb) if vp.x + dx < bb.min_x => {
                vp.x = bb.min_x / vp.scale;
            }
            Some(bb) if vp.x + dx > (bb.max_x - w) / vp.scale => {
                vp.x = (bb.max_x - w).max(bb.min_x) / vp.scale;
            }
            _ => vp.x += dx,
        }
    }
    if let Some(y) = y {
        let dy = (y - h / 2.0 / vp.scale - vp.y) / 3.0;
        match vp.bounding_box {
            Some(bb) if vp.y + dy < bb.min_y => {
                vp.y = bb.min_y / vp.scale;
            }
            Some(bb) if vp.y + dy > (bb.max_y - h) / vp.scale => {
                vp.y = (bb.max_y - h).max(bb.min_y) / vp.scale;
            }
            _ => vp.y += dy,
        }
    }
}

/// Jump the view's top-left corner to (x, y).
pub fn move_to(stage: &mut Stage, x: Option<f32>, y: Option<f32>) {
    if let Some(vp) = stage.viewport.as_mut() {
        if let Some(x) = x {
            vp.x = x;
        }
        if let Some(y) = y {
            vp.y = y;
        }
    }
}

fn viewport_prerender(stage: &mut Stage, _target: SpriteId, data: &mut EventData) {
    let EventData::Canvas(canvas) = data else {
        return;
    };
    let (w, h) = (stage.options.w, stage.options.h);
    let Some(vp) = stage.viewport.as_mut() else {
        return;
    };
    vp.center_x = vp.x + w / 2.0 / vp.scale;
    vp.center_y = vp.y + h / 2.0 / vp.scale;

    let canvas: &mut dyn Canvas = &mut **canvas;
    canvas.save();
    canvas.translate((w / 2.0).floor(), (h / 2.0).floor());
    canvas.scale(vp.scale, vp.scale);
    canvas.translate(-vp.center_x.floor(), -vp.center_y.floor());
}

fn viewport_postrender(_stage: &mut Stage, _target: SpriteId, data: &mut EventData) {
    if let EventData::Canvas(canvas) = data {
        canvas.restore();
    }
}
