//! Bounce-off-walls behavior.
//!
//! Listens for the platformer's side bumps and reverses horizontal
//! direction using the recorded impact speed, flipping the sprite to face
//! its travel direction.

use crate::events::EventData;
use crate::sprites::SpriteId;
use crate::stage::Stage;

pub const NAME: &str = "aibounce";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Default)]
pub struct AiBounce {
    /// Which way the sprite's artwork faces when not flipped.
    pub default_direction: Direction,
}

pub fn attach(stage: &mut Stage, id: SpriteId, default_direction: Direction) {
    if let Some(sprite) = stage.sprite_mut(id) {
        sprite
            .components
            .add(NAME, Box::new(AiBounce { default_direction }));
    } else {
        return;
    }
    stage.add_to_list(NAME, id);
    stage.on(id, "bump.right", id, go_left);
    stage.on(id, "bump.left", id, go_right);
}

pub fn detach(stage: &mut Stage, id: SpriteId) {
    stage.off(id, "bump.right", Some(id), Some(go_left));
    stage.off(id, "bump.left", Some(id), Some(go_right));
    stage.remove_from_list(NAME, id);
    if let Some(sprite) = stage.sprite_mut(id) {
        sprite.components.remove(NAME);
    }
}

fn direction_of(stage: &Stage, id: SpriteId) -> Direction {
    stage
        .sprite(id)
        .and_then(|s| s.components.get::<AiBounce>(NAME))
        .map(|b| b.default_direction)
        .unwrap_or_default()
}

fn go_left(stage: &mut Stage, owner: SpriteId, _target: SpriteId, data: &mut EventData) {
    let EventData::Hit(col) = data else {
        return;
    };
    let impact = col.impact;
    let facing = direction_of(stage, owner);
    if let Some(sprite) = stage.sprite_mut(owner) {
        sprite.props.vx = -impact;
        sprite.props.flip_h = facing == Direction::Right;
    }
}

fn go_right(stage: &mut Stage, owner: SpriteId, _target: SpriteId, data: &mut EventData) {
    let EventData::Hit(col) = data else {
        return;
    };
    let impact = col.impact;
    let facing = direction_of(stage, owner);
    if let Some(sprite) = stage.sprite_mut(owner) {
        sprite.props.vx = impact;
        sprite.props.flip_h = facing == Direction::Left;
    }
}
