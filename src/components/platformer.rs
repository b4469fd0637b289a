//! Platformer physics component.
//!
//! Integrates velocity and gravity into position each step (in sub-steps so
//! a long frame never tunnels more than 1/30 s at a time), runs the stage's
//! collision resolution, and reacts to contacts: apply the separation
//! vector, zero the velocity component facing into the obstacle, and fire
//! `bump`/`bump.{top,bottom,left,right}` with the impact speed recorded on
//! the contact.
//!
//! Sprites flagged `sensor` are passed through: the sensor gets a "sensor"
//! event naming this sprite, and no separation happens.

use smallvec::SmallVec;

use crate::events::EventData;
use crate::sprites::{SPRITE_DEFAULT, SpriteId};
use crate::stage::{CollideOpts, Stage};

pub const NAME: &str = "platformer";

/// Integration never advances more than this per sub-step.
const MAX_SUB_STEP: f32 = 1.0 / 30.0;

/// Threshold on the contact normal below which an axis is not considered
/// "facing into" the obstacle.
const BUMP_THRESHOLD: f32 = 0.3;

/// Marker state; the moving parts (velocity, gravity factor) live on the
/// sprite's props where other components can see them.
#[derive(Debug, Default)]
pub struct Platformer;

/// Attach platformer behavior to a sprite already inserted into the stage.
pub fn attach(stage: &mut Stage, id: SpriteId) {
    if let Some(sprite) = stage.sprite_mut(id) {
        if sprite.props.collision_mask.is_none() {
            sprite.props.collision_mask = Some(SPRITE_DEFAULT);
        }
        sprite.components.add(NAME, Box::new(Platformer));
    } else {
        return;
    }
    stage.add_to_list(NAME, id);
    stage.on(id, "step", id, platformer_step);
    stage.on(id, "hit", id, platformer_collision);
}

/// Detach platformer behavior.
pub fn detach(stage: &mut Stage, id: SpriteId) {
    stage.off(id, "step", Some(id), Some(platformer_step));
    stage.off(id, "hit", Some(id), Some(platformer_collision));
    stage.remove_from_list(NAME, id);
    if let Some(sprite) = stage.sprite_mut(id) {
        sprite.components.remove(NAME);
    }
}

fn platformer_step(stage: &mut Stage, owner: SpriteId, _target: SpriteId, data: &mut EventData) {
    let dt = match data {
        EventData::Step { dt } => *dt,
        _ => return,
    };
    let (gx_default, gy_default) = (stage.options.gravity_x, stage.options.gravity_y);

    let mut dt_left = dt;
    while dt_left > 0.0 {
        let dt = dt_left.min(MAX_SUB_STEP);
        {
            let Some(sprite) = stage.sprite_mut(owner) else {
                return;
            };
            let p = &mut sprite.props;
            p.vx += p.ax * dt + p.gravity_x.unwrap_or(gx_default) * dt * p.gravity;
            p.vy += p.ay * dt + p.gravity_y.unwrap_or(gy_default) * dt * p.gravity;
            p.x += p.vx * dt;
            p.y += p.vy * dt;
        }
        stage.collide(owner, CollideOpts::default());
        dt_left -= dt;
    }
}

fn platformer_collision(stage: &mut Stage, owner: SpriteId, _target: SpriteId, data: &mut EventData) {
    let (separate, normal, other) = match data {
        EventData::Hit(col) => {
            col.impact = 0.0;
            (col.separate, col.normal, col.obj)
        }
        _ => return,
    };

    // Sensor sprites detect without separating: notify them and bail.
    if let Some(other) = other
        && stage.sprite(other).map(|s| s.props.sensor).unwrap_or(false)
    {
        let mut sensor_data = EventData::Sprite(owner);
        stage.trigger(other, "sensor", &mut sensor_data);
        return;
    }

    let mut bumps: SmallVec<[(&'static str, f32); 2]> = SmallVec::new();
    {
        let Some(sprite) = stage.sprite_mut(owner) else {
            return;
        };
        let p = &mut sprite.props;
        let impact_x = p.vx.abs();
        let impact_y = p.vy.abs();
        p.x -= separate.x;
        p.y -= separate.y;

        if normal.y < -BUMP_THRESHOLD {
            if !p.skip_collide && p.vy > 0.0 {
                p.vy = 0.0;
            }
            bumps.push(("bump.bottom", impact_y));
        }
        if normal.y > BUMP_THRESHOLD {
            if !p.skip_collide && p.vy < 0.0 {
                p.vy = 0.0;
            }
            bumps.push(("bump.top", impact_y));
        }
        if normal.x < -BUMP_THRESHOLD {
            if !p.skip_collide && p.vx > 0.0 {
                p.vx = 0.0;
            }
            bumps.push(("bump.right", impact_x));
        }
        if normal.x > BUMP_THRESHOLD {
            if !p.skip_collide && p.vx < 0.0 {
                p.vx = 0.0;
            }
            bumps.push(("bump.left", impact_x));
        }
    }

    for (event, impact) in bumps {
        if let EventData::Hit(col) = data {
            col.impact = impact;
        }
        stage.trigger(owner, event, data);
        stage.trigger(owner, "bump", data);
    }
}
